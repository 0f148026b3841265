//! The per-participant one-second ticker.
//!
//! Every participant runs its own [`LocalTicker`]; there's no elected
//! master clock. Ticks that drift apart between participants are
//! reconciled by the merge rule, which keeps the more advanced copy of
//! each countdown.

use summsync_tick::{TickConfig, TickInfo, TickMetrics, TickScheduler};
use tracing::trace;

use crate::{RoomState, Snapshot};

/// Callback invoked with the snapshot produced by each tick.
pub type TickSubscriber = Box<dyn FnMut(&Snapshot) + Send>;

/// Drives [`RoomState::tick`] at a fixed interval.
///
/// Waiting and firing are split so the ticker can sit in a
/// `tokio::select!` next to the inbound branch without holding the room:
///
/// ```ignore
/// tokio::select! {
///     info = ticker.wait() => {
///         let snapshot = ticker.fire(&mut room, &info);
///         channel.publish(&snapshot).await?;
///     }
///     msg = channel.recv() => { /* merge */ }
/// }
/// ```
pub struct LocalTicker {
    scheduler: TickScheduler,
    subscribers: Vec<TickSubscriber>,
}

impl LocalTicker {
    pub fn new(config: TickConfig) -> Self {
        Self {
            scheduler: TickScheduler::new(config),
            subscribers: Vec::new(),
        }
    }

    /// Registers a callback run after every tick.
    pub fn subscribe(&mut self, on_tick: impl FnMut(&Snapshot) + Send + 'static) {
        self.subscribers.push(Box::new(on_tick));
    }

    /// Waits for the next tick. Cancel-safe.
    pub async fn wait(&mut self) -> TickInfo {
        self.scheduler.wait_for_tick().await
    }

    /// Advances every armed timer by one second, plus one per interval
    /// the scheduler skipped while the caller was busy, and returns the
    /// snapshot to broadcast. Subscribers see the same snapshot.
    pub fn fire(&mut self, room: &mut RoomState, info: &TickInfo) -> Snapshot {
        let mut running = room.tick();
        for _ in 0..info.ticks_skipped {
            running = running.max(room.tick());
        }
        let snapshot = room.broadcast_snapshot();
        for subscriber in &mut self.subscribers {
            subscriber(&snapshot);
        }
        self.scheduler.record_tick_end();
        trace!(
            room_id = %room.room_id(),
            tick = self.scheduler.tick_count(),
            running,
            "room ticked"
        );
        snapshot
    }

    /// Ticks fired so far.
    pub fn tick_count(&self) -> u64 {
        self.scheduler.tick_count()
    }

    pub fn metrics(&self) -> &TickMetrics {
        self.scheduler.metrics()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use summsync_protocol::{ParticipantId, RoomId};
    use tokio::time::Instant;

    use super::*;
    use crate::{Action, Role, TimerState};

    fn room() -> RoomState {
        RoomState::new(RoomId::new("1"), ParticipantId::new("a"))
    }

    #[tokio::test(start_paused = true)]
    async fn test_fire_advances_room_every_second() {
        let start = Instant::now();
        let mut state = room();
        state.dispatch(Role::Mid, Action::Arm).unwrap();
        let mut ticker = LocalTicker::new(TickConfig::default());

        for _ in 0..5 {
            let info = ticker.wait().await;
            ticker.fire(&mut state, &info);
        }

        assert_eq!(state.entity(Role::Mid).remaining(), TimerState::Armed(295));
        assert_eq!(ticker.tick_count(), 5);
        assert_eq!(Instant::now() - start, Duration::from_secs(5));
    }

    #[tokio::test(start_paused = true)]
    async fn test_subscribers_see_each_tick_snapshot() {
        let mut state = room();
        state.dispatch(Role::Top, Action::Arm).unwrap();

        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut ticker = LocalTicker::new(TickConfig::default());
        {
            let seen = Arc::clone(&seen);
            ticker.subscribe(move |snap| {
                seen.lock().unwrap().push(snap.remaining(Role::Top));
            });
        }

        for _ in 0..3 {
            let info = ticker.wait().await;
            let snap = ticker.fire(&mut state, &info);
            assert_eq!(snap.counter(), state.clock());
        }

        let seen = seen.lock().unwrap();
        assert_eq!(
            *seen,
            vec![TimerState::Armed(299), TimerState::Armed(298), TimerState::Armed(297)]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_fire_on_idle_room_still_broadcasts() {
        let mut state = room();
        let before = state.snapshot();
        let mut ticker = LocalTicker::new(TickConfig::default());

        let info = ticker.wait().await;
        let snap = ticker.fire(&mut state, &info);

        assert!(snap.same_entities(&before));
        assert!(snap.counter() > before.counter());
    }

    #[tokio::test(start_paused = true)]
    async fn test_fire_makes_up_for_seconds_missed_while_busy() {
        let mut state = room();
        state.dispatch(Role::Adc, Action::Arm).unwrap();
        let mut ticker = LocalTicker::new(TickConfig::default());

        // The owner was blocked elsewhere and polls 2.5 s late.
        tokio::time::sleep(Duration::from_millis(3500)).await;
        let info = ticker.wait().await;
        assert_eq!(info.ticks_skipped, 2);

        ticker.fire(&mut state, &info);
        assert_eq!(state.entity(Role::Adc).remaining(), TimerState::Armed(297));
    }
}
