//! The join handshake.
//!
//! A newcomer starts with every timer idle, publishes `request-state`,
//! and stays [`Joining`](ChannelState::Joining) until the first snapshot
//! from a peer arrives. Participants already
//! [`Joined`](ChannelState::Joined) answer requests with their current
//! snapshot. Nobody answering before the deadline means the newcomer is
//! alone, and its idle state becomes the room's state.

use std::collections::HashSet;

use summsync_protocol::ParticipantId;
use summsync_room::Snapshot;

use crate::ChannelState;

/// Handshake bookkeeping for one session. Pure state, no I/O.
#[derive(Debug, Default)]
pub struct SessionBootstrap {
    state: ChannelState,
    last_broadcast: Option<Snapshot>,
    served: HashSet<ParticipantId>,
}

impl SessionBootstrap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> ChannelState {
        self.state
    }

    /// `Disconnected → Joining`. Returns `false` if already past that.
    pub fn begin_join(&mut self) -> bool {
        self.advance(ChannelState::Joining)
    }

    /// A peer's snapshot arrived. Returns `true` if this completed the
    /// join.
    pub fn on_snapshot(&mut self) -> bool {
        self.finish_join()
    }

    /// The join deadline passed. Returns `true` if nobody had answered,
    /// in which case this participant is now the authority.
    pub fn on_deadline(&mut self) -> bool {
        self.finish_join()
    }

    /// Back to `Disconnected`, forgetting everything.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Tick snapshots are only worth publishing once we know the room's
    /// state; before that they'd just be idle defaults.
    pub fn broadcasts_ticks(&self) -> bool {
        self.state == ChannelState::Joined
    }

    /// Remembers what was last published.
    pub fn record_broadcast(&mut self, snapshot: &Snapshot) {
        self.last_broadcast = Some(snapshot.clone());
    }

    /// Whether to answer a `request-state` from `requester`.
    ///
    /// Only joined participants answer. They do so when their state has
    /// changed since their last broadcast, or when this requester hasn't
    /// been answered before.
    pub fn should_answer(&mut self, requester: &ParticipantId, current: &Snapshot) -> bool {
        if self.state != ChannelState::Joined {
            return false;
        }
        let first_request = self.served.insert(requester.clone());
        let stale = self
            .last_broadcast
            .as_ref()
            .is_none_or(|last| !last.same_entities(current));
        first_request || stale
    }

    fn finish_join(&mut self) -> bool {
        self.state == ChannelState::Joining && self.advance(ChannelState::Joined)
    }

    fn advance(&mut self, target: ChannelState) -> bool {
        if self.state.can_transition_to(target) {
            self.state = target;
            true
        } else {
            false
        }
    }
}
