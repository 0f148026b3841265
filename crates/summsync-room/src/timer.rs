//! Per-entity timer state and its transitions.

use std::cmp::Ordering;

use summsync_protocol::ParticipantId;

use crate::{policy, Role, RoomError};

/// Remaining cooldown of one entity.
///
/// A tagged union rather than an `Option<u32>` with magic zero:
/// `Armed(0)` is never produced, the countdown goes `Armed(1) → Idle`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TimerState {
    #[default]
    Idle,
    Armed(u32),
}

impl TimerState {
    /// `true` while a countdown is running.
    pub fn is_armed(self) -> bool {
        matches!(self, Self::Armed(_))
    }

    /// Seconds left, `None` when idle.
    pub fn seconds(self) -> Option<u32> {
        match self {
            Self::Armed(n) => Some(n),
            Self::Idle => None,
        }
    }

    /// Reads the wire encoding, where `null` means idle. A stray `0` is
    /// read as idle too, since an armed timer never shows zero.
    pub fn from_wire(seconds: Option<u32>) -> Self {
        match seconds {
            Some(n) if n > 0 => Self::Armed(n),
            _ => Self::Idle,
        }
    }

    /// `true` if `self` is further along the same countdown than `other`.
    ///
    /// Only meaningful between two copies of the same edit: a finished
    /// countdown (`Idle`) is ahead of any running one, and fewer seconds
    /// left is ahead of more.
    pub fn is_ahead_of(self, other: Self) -> bool {
        match (self, other) {
            (Self::Idle, Self::Armed(_)) => true,
            (Self::Armed(a), Self::Armed(b)) => a < b,
            _ => false,
        }
    }
}

/// Which modifier a `SetModifier` action changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Modifier {
    /// Boots with summoner spell haste.
    LucidityBoots,
    /// The summoner spell haste rune.
    CosmicInsight,
}

/// The version of the last user edit to an entity.
///
/// Ordered by `counter`, then by `origin`: when two participants edit
/// the same role concurrently their counters can tie, and the
/// lexicographically larger participant id wins. Ticks don't produce
/// versions.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Version {
    pub counter: u64,
    pub origin: ParticipantId,
}

impl Version {
    pub fn new(counter: u64, origin: ParticipantId) -> Self {
        Self { counter, origin }
    }
}

/// One tracked entity: its countdown, its modifiers, and the version of
/// the last edit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityTimerState {
    pub(crate) role: Role,
    pub(crate) remaining: TimerState,
    pub(crate) lucidity_boots: bool,
    pub(crate) cosmic_insight: bool,
    pub(crate) version: Version,
}

impl EntityTimerState {
    /// An idle entity with no modifiers and the zero version.
    pub fn new(role: Role) -> Self {
        Self {
            role,
            remaining: TimerState::Idle,
            lucidity_boots: false,
            cosmic_insight: false,
            version: Version::default(),
        }
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn remaining(&self) -> TimerState {
        self.remaining
    }

    pub fn lucidity_boots(&self) -> bool {
        self.lucidity_boots
    }

    pub fn cosmic_insight(&self) -> bool {
        self.cosmic_insight
    }

    pub fn version(&self) -> &Version {
        &self.version
    }

    /// The cooldown `arm` would start with the current modifiers.
    pub fn cooldown(&self) -> u32 {
        policy::compute_cooldown(self.lucidity_boots, self.cosmic_insight)
    }

    /// Starts the countdown. Only legal from `Idle`; on error nothing
    /// changes.
    pub fn arm(&mut self) -> Result<u32, RoomError> {
        if self.remaining.is_armed() {
            return Err(RoomError::InvalidTransition {
                role: self.role,
                reason: "timer already running, clear it first",
            });
        }
        let seconds = self.cooldown();
        self.remaining = TimerState::Armed(seconds);
        Ok(seconds)
    }

    /// Advances the countdown by one second. Returns `false` on `Idle`.
    pub fn tick(&mut self) -> bool {
        match self.remaining {
            TimerState::Armed(n) => {
                self.remaining = policy::decrement(n);
                true
            }
            TimerState::Idle => false,
        }
    }

    /// Forces `Idle`. Returns whether anything changed.
    pub fn clear(&mut self) -> bool {
        let was_armed = self.remaining.is_armed();
        self.remaining = TimerState::Idle;
        was_armed
    }

    /// Changes a modifier; only future `arm` calls see it. Returns
    /// whether the value changed.
    pub fn set_modifier(&mut self, which: Modifier, value: bool) -> bool {
        let slot = match which {
            Modifier::LucidityBoots => &mut self.lucidity_boots,
            Modifier::CosmicInsight => &mut self.cosmic_insight,
        };
        let changed = *slot != value;
        *slot = value;
        changed
    }

    /// Whether `self` should replace `other` during a merge.
    ///
    /// A newer edit always wins. Two copies of the same edit differ only
    /// by how far their countdowns have run, and the more advanced one
    /// wins, so a participant that stalled catches up from its peers.
    pub fn supersedes(&self, other: &Self) -> bool {
        match self.version.cmp(&other.version) {
            Ordering::Greater => true,
            Ordering::Less => false,
            Ordering::Equal => self.remaining.is_ahead_of(other.remaining),
        }
    }
}
