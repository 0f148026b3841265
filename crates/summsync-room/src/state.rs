//! Room state, snapshots, and the merge rule.
//!
//! A [`RoomState`] is owned by exactly one session task. Everything that
//! leaves it is an immutable [`Snapshot`]; everything that comes back in
//! goes through [`RoomState::merge`].
//!
//! # Merge
//!
//! Each entity carries the [`Version`] of its last user edit. Merging a
//! remote snapshot keeps, per role, whichever copy
//! [supersedes](EntityTimerState::supersedes) the other: the newer
//! version, or on a tie the countdown that has run further. That makes
//! merge commutative, associative and idempotent, so reordered,
//! duplicated, or dropped snapshots all converge once the next one
//! arrives.

use std::collections::BTreeMap;

use summsync_protocol::{ParticipantId, RoomId, SyncMessage, WireEntity};
use tracing::{debug, warn};

use crate::{EntityTimerState, Modifier, Role, RoomError, TimerState, Version};

/// A user action on one entity. The only way local state changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Start the cooldown using the entity's current modifiers.
    Arm,
    /// Stop the cooldown.
    Clear,
    /// Toggle a modifier for future arms.
    SetModifier { modifier: Modifier, value: bool },
}

fn default_entities() -> [EntityTimerState; Role::COUNT] {
    Role::ALL.map(EntityTimerState::new)
}

// ---------------------------------------------------------------------------
// Snapshot
// ---------------------------------------------------------------------------

/// An immutable full copy of a room's entities, plus the logical counter
/// of the broadcast that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    room_id: RoomId,
    counter: u64,
    entities: [EntityTimerState; Role::COUNT],
}

impl Snapshot {
    pub fn room_id(&self) -> &RoomId {
        &self.room_id
    }

    pub fn counter(&self) -> u64 {
        self.counter
    }

    pub fn entity(&self, role: Role) -> &EntityTimerState {
        &self.entities[role.index()]
    }

    /// All entities, in [`Role::ALL`] order.
    pub fn entities(&self) -> impl Iterator<Item = &EntityTimerState> {
        self.entities.iter()
    }

    /// Shorthand for `entity(role).remaining()`.
    pub fn remaining(&self, role: Role) -> TimerState {
        self.entity(role).remaining()
    }

    /// `true` if both snapshots hold the same entities, whatever their
    /// broadcast counters.
    pub fn same_entities(&self, other: &Snapshot) -> bool {
        self.room_id == other.room_id && self.entities == other.entities
    }

    /// The `state-snapshot` message carrying this snapshot.
    pub fn to_message(&self) -> SyncMessage {
        let entities = self
            .entities
            .iter()
            .map(|e| {
                let wire = WireEntity {
                    remaining_seconds: e.remaining().seconds(),
                    modifier_a: e.lucidity_boots(),
                    modifier_b: e.cosmic_insight(),
                    counter: Some(e.version().counter),
                    origin: Some(e.version().origin.clone()),
                };
                (e.role().as_str().to_string(), wire)
            })
            .collect();

        SyncMessage::StateSnapshot {
            room_id: self.room_id.clone(),
            counter: self.counter,
            entities,
        }
    }

    /// Builds a snapshot from the fields of a `state-snapshot` message.
    ///
    /// Roles missing from `entities` get the default idle entity, which
    /// loses every merge. Entries without a version are stamped with the
    /// snapshot counter and `origin`, the sender of the envelope. Keys
    /// outside the role set are returned separately so the caller can
    /// log them.
    pub fn from_wire(
        room_id: RoomId,
        counter: u64,
        entities: &BTreeMap<String, WireEntity>,
        origin: &ParticipantId,
    ) -> (Self, Vec<String>) {
        let mut slots = default_entities();
        let mut unknown = Vec::new();

        for (key, wire) in entities {
            let role = match key.parse::<Role>() {
                Ok(role) => role,
                Err(_) => {
                    unknown.push(key.clone());
                    continue;
                }
            };
            slots[role.index()] = EntityTimerState {
                role,
                remaining: TimerState::from_wire(wire.remaining_seconds),
                lucidity_boots: wire.modifier_a,
                cosmic_insight: wire.modifier_b,
                version: Version::new(
                    wire.counter.unwrap_or(counter),
                    wire.origin.clone().unwrap_or_else(|| origin.clone()),
                ),
            };
        }

        let snapshot = Self {
            room_id,
            counter,
            entities: slots,
        };
        (snapshot, unknown)
    }
}

// ---------------------------------------------------------------------------
// MergeReport
// ---------------------------------------------------------------------------

/// What a merge did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeReport {
    /// Roles whose local copy was replaced by the remote one.
    pub applied: Vec<Role>,
    /// Wire keys that weren't roles and were dropped.
    pub unknown_keys: Vec<String>,
}

impl MergeReport {
    /// `true` if any local entity changed.
    pub fn changed(&self) -> bool {
        !self.applied.is_empty()
    }
}

// ---------------------------------------------------------------------------
// RoomState
// ---------------------------------------------------------------------------

/// The five timers of one room, as seen by one participant.
///
/// `clock` is a Lamport clock: local edits and broadcasts advance it,
/// merges pull it up to the highest counter seen. Edits are stamped with
/// `(clock, participant)`, so an edit made after seeing a peer's edit
/// always outranks it.
///
/// A running timer that adopts a peer's further-along copy of the same
/// edit skips its next local tick. Peers tick out of phase, and without
/// the skip each one would add its own second on top of the one it just
/// adopted. A peer's new edit is adopted as-is and counts down normally.
#[derive(Debug, Clone)]
pub struct RoomState {
    room_id: RoomId,
    participant: ParticipantId,
    clock: u64,
    entities: [EntityTimerState; Role::COUNT],
    caught_up: [bool; Role::COUNT],
}

/// Compares the replicated state only; the tick-skip flags are local.
impl PartialEq for RoomState {
    fn eq(&self, other: &Self) -> bool {
        self.room_id == other.room_id
            && self.participant == other.participant
            && self.clock == other.clock
            && self.entities == other.entities
    }
}

impl Eq for RoomState {}

impl RoomState {
    /// A fresh room with every role idle.
    pub fn new(room_id: RoomId, participant: ParticipantId) -> Self {
        Self {
            room_id,
            participant,
            clock: 0,
            entities: default_entities(),
            caught_up: [false; Role::COUNT],
        }
    }

    pub fn room_id(&self) -> &RoomId {
        &self.room_id
    }

    pub fn participant(&self) -> &ParticipantId {
        &self.participant
    }

    /// Current Lamport clock value.
    pub fn clock(&self) -> u64 {
        self.clock
    }

    pub fn entity(&self, role: Role) -> &EntityTimerState {
        &self.entities[role.index()]
    }

    /// Read-only view of the current state. Doesn't advance the clock.
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            room_id: self.room_id.clone(),
            counter: self.clock,
            entities: self.entities.clone(),
        }
    }

    /// A snapshot stamped with a fresh counter, ready to publish.
    pub fn broadcast_snapshot(&mut self) -> Snapshot {
        self.clock += 1;
        self.snapshot()
    }

    /// Applies a user action and returns the snapshot to broadcast.
    ///
    /// Actions that change nothing (clearing an idle timer, setting a
    /// modifier to its current value) keep the entity's version, so they
    /// can't override a peer's concurrent edit.
    ///
    /// # Errors
    ///
    /// [`RoomError::InvalidTransition`] when arming a running timer. The
    /// state is untouched and nothing should be broadcast.
    pub fn dispatch(&mut self, role: Role, action: Action) -> Result<Snapshot, RoomError> {
        let entity = &mut self.entities[role.index()];
        let changed = match action {
            Action::Arm => {
                let seconds = entity.arm()?;
                debug!(room_id = %self.room_id, %role, seconds, "timer armed");
                true
            }
            Action::Clear => entity.clear(),
            Action::SetModifier { modifier, value } => entity.set_modifier(modifier, value),
        };

        if changed {
            self.clock += 1;
            self.entities[role.index()].version = Version::new(self.clock, self.participant.clone());
            self.caught_up[role.index()] = false;
        }
        Ok(self.broadcast_snapshot())
    }

    /// Advances every armed timer by one second. Versions don't change.
    ///
    /// Returns how many timers advanced.
    pub fn tick(&mut self) -> usize {
        let mut advanced = 0;
        for (entity, caught_up) in self.entities.iter_mut().zip(&mut self.caught_up) {
            if std::mem::take(caught_up) {
                continue;
            }
            if entity.tick() {
                advanced += 1;
            }
        }
        advanced
    }

    /// Merges a remote snapshot into this state.
    ///
    /// # Errors
    ///
    /// [`RoomError::RoomMismatch`] if the snapshot belongs to another
    /// room. Nothing is merged in that case.
    pub fn merge(&mut self, remote: &Snapshot) -> Result<MergeReport, RoomError> {
        if remote.room_id != self.room_id {
            return Err(RoomError::RoomMismatch {
                expected: self.room_id.clone(),
                got: remote.room_id.clone(),
            });
        }

        let mut report = MergeReport::default();
        let mut highest = remote.counter;
        let slots = self.entities.iter_mut().zip(&mut self.caught_up);
        for ((local, caught_up), theirs) in slots.zip(&remote.entities) {
            highest = highest.max(theirs.version.counter);
            if theirs.supersedes(local) {
                *caught_up = theirs.version == local.version && theirs.remaining().is_armed();
                *local = theirs.clone();
                report.applied.push(local.role);
            }
        }
        self.clock = self.clock.max(highest);
        Ok(report)
    }

    /// Decodes and merges the fields of a `state-snapshot` from `origin`.
    ///
    /// Unknown keys are logged, counted in the report, and otherwise
    /// ignored.
    pub fn merge_wire(
        &mut self,
        origin: &ParticipantId,
        room_id: &RoomId,
        counter: u64,
        entities: &BTreeMap<String, WireEntity>,
    ) -> Result<MergeReport, RoomError> {
        let (remote, unknown) = Snapshot::from_wire(room_id.clone(), counter, entities, origin);
        for key in &unknown {
            warn!(room_id = %self.room_id, %origin, key = %key, "dropping unknown entity key");
        }
        let mut report = self.merge(&remote)?;
        report.unknown_keys = unknown;
        Ok(report)
    }
}

// =========================================================================
// Tests
// =========================================================================
