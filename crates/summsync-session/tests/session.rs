//! End-to-end session tests over the in-memory hub.
//!
//! All tests run with a paused clock: Tokio jumps straight to the next
//! timer whenever every task is idle, so minutes of ticking take
//! milliseconds and message exchanges finish before time moves.

use std::time::Duration;

use summsync_protocol::{ParticipantId, RoomId, SyncMessage};
use summsync_room::{Action, Modifier, Role, RoomError, TimerState};
use summsync_session::{
    ChannelState, MemoryHub, RoomSession, SessionConfig, SessionError, SessionHandle, SoloChannel,
    SyncChannel,
};
use tokio::time::{self, Instant};

// =========================================================================
// Helpers
// =========================================================================

fn room() -> RoomId {
    RoomId::new("482913")
}

fn config(name: &str) -> SessionConfig {
    SessionConfig {
        participant: ParticipantId::new(name),
        ..SessionConfig::default()
    }
}

async fn join(hub: &MemoryHub, name: &str) -> SessionHandle {
    let handle = RoomSession::join(hub.channel(), room(), config(name))
        .await
        .expect("join should succeed");
    handle.joined().await.expect("session should join");
    handle
}

fn seconds(handle: &SessionHandle, role: Role) -> Option<u32> {
    handle.snapshot().remaining(role).seconds()
}

// =========================================================================
// Join handshake
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_lonely_joiner_becomes_authority_after_timeout() {
    let start = Instant::now();
    let handle = RoomSession::join(SoloChannel::new(), room(), config("solo"))
        .await
        .unwrap();
    assert_eq!(handle.status(), ChannelState::Joining);

    handle.joined().await.unwrap();
    assert_eq!(Instant::now() - start, Duration::from_millis(1500));
    assert_eq!(handle.status(), ChannelState::Joined);

    // Offline mode still counts down: ticks at 2 s, 3 s and 4 s.
    handle.dispatch(Role::Mid, Action::Arm).await.unwrap();
    time::sleep(Duration::from_millis(3200)).await;
    assert_eq!(seconds(&handle, Role::Mid), Some(297));
}

#[tokio::test(start_paused = true)]
async fn test_newcomer_converges_to_existing_room() {
    let hub = MemoryHub::new();
    let veteran = join(&hub, "veteran").await;

    veteran.dispatch(Role::Jungle, Action::Arm).await.unwrap();
    time::sleep(Duration::from_secs(180)).await;
    let before = seconds(&veteran, Role::Jungle).unwrap();
    assert!((119..=121).contains(&before), "got {before}");

    let start = Instant::now();
    let newcomer = join(&hub, "newcomer").await;
    assert!(Instant::now() - start < Duration::from_millis(1500));

    let theirs = seconds(&veteran, Role::Jungle).unwrap();
    let ours = seconds(&newcomer, Role::Jungle).expect("newcomer should see JUNGLE armed");
    assert!(theirs.abs_diff(ours) <= 1, "veteran {theirs}, newcomer {ours}");
    for role in [Role::Top, Role::Mid, Role::Adc, Role::Support] {
        assert_eq!(newcomer.snapshot().remaining(role), TimerState::Idle);
    }
}

#[tokio::test(start_paused = true)]
async fn test_ticks_are_not_broadcast_while_joining() {
    let hub = MemoryHub::new();
    let mut observer = hub.channel();
    observer
        .join(&room(), &ParticipantId::new("observer"))
        .await
        .unwrap();

    let handle = RoomSession::join(
        hub.channel(),
        room(),
        SessionConfig {
            join_timeout: Duration::from_secs(10),
            ..config("quiet")
        },
    )
    .await
    .unwrap();

    let kinds: Vec<&str> = [
        observer.recv().await.unwrap().unwrap(),
        observer.recv().await.unwrap().unwrap(),
    ]
    .iter()
    .map(|env| env.payload.kind())
    .collect();
    assert_eq!(kinds, ["join-room", "request-state"]);

    // Five ticks fire, none of them reach the room.
    let silent = time::timeout(Duration::from_secs(5), observer.recv()).await;
    assert!(silent.is_err());
    assert_eq!(handle.status(), ChannelState::Joining);

    // Once the deadline passes the next tick goes out.
    let env = time::timeout(Duration::from_secs(10), observer.recv())
        .await
        .expect("tick broadcast after joining")
        .unwrap()
        .unwrap();
    assert_eq!(env.payload.kind(), "state-snapshot");
    assert_eq!(handle.status(), ChannelState::Joined);
}

#[tokio::test(start_paused = true)]
async fn test_any_snapshot_completes_join() {
    let hub = MemoryHub::new();
    let mut peer = hub.channel();
    peer.join(&room(), &ParticipantId::new("peer")).await.unwrap();

    let handle = RoomSession::join(hub.channel(), room(), config("new"))
        .await
        .unwrap();

    let mut entities = std::collections::BTreeMap::new();
    entities.insert(
        "ADC".to_string(),
        summsync_protocol::WireEntity {
            remaining_seconds: Some(42),
            modifier_a: false,
            modifier_b: false,
            counter: None,
            origin: None,
        },
    );
    peer.publish(SyncMessage::StateSnapshot {
        room_id: room(),
        counter: 9,
        entities,
    })
    .await
    .unwrap();

    let start = Instant::now();
    handle.joined().await.unwrap();
    assert!(Instant::now() - start < Duration::from_millis(1500));
    assert_eq!(seconds(&handle, Role::Adc), Some(42));
}

// =========================================================================
// Actions and convergence
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_dispatch_arm_twice_is_rejected() {
    let hub = MemoryHub::new();
    let handle = join(&hub, "a").await;

    let snap = handle
        .dispatch(
            Role::Top,
            Action::SetModifier {
                modifier: Modifier::LucidityBoots,
                value: true,
            },
        )
        .await
        .unwrap();
    assert_eq!(snap.remaining(Role::Top), TimerState::Idle);

    let snap = handle.dispatch(Role::Top, Action::Arm).await.unwrap();
    assert_eq!(snap.remaining(Role::Top), TimerState::Armed(268));

    let err = handle.dispatch(Role::Top, Action::Arm).await.unwrap_err();
    assert!(matches!(
        err,
        SessionError::Room(RoomError::InvalidTransition { role: Role::Top, .. })
    ));
    assert_eq!(seconds(&handle, Role::Top), Some(268));
}

#[tokio::test(start_paused = true)]
async fn test_subscribers_see_local_changes_and_ticks() {
    let hub = MemoryHub::new();
    let handle = join(&hub, "a").await;
    let mut updates = handle.subscribe();
    updates.mark_unchanged();

    handle.dispatch(Role::Support, Action::Arm).await.unwrap();
    updates.changed().await.unwrap();
    assert_eq!(updates.borrow_and_update().remaining(Role::Support), TimerState::Armed(300));

    updates.changed().await.unwrap();
    assert_eq!(updates.borrow_and_update().remaining(Role::Support), TimerState::Armed(299));
}

#[tokio::test(start_paused = true)]
async fn test_edits_propagate_between_joined_participants() {
    let hub = MemoryHub::new();
    let alice = join(&hub, "alice").await;
    let bob = join(&hub, "bob").await;

    alice.dispatch(Role::Mid, Action::Arm).await.unwrap();
    time::sleep(Duration::from_millis(10)).await;
    assert_eq!(seconds(&bob, Role::Mid), Some(300));

    bob.dispatch(Role::Mid, Action::Clear).await.unwrap();
    time::sleep(Duration::from_millis(10)).await;
    assert_eq!(seconds(&alice, Role::Mid), None);
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_arms_converge_on_one_winner() {
    let hub = MemoryHub::new();
    let alice = join(&hub, "alice").await;
    let bob = join(&hub, "bob").await;

    alice
        .dispatch(
            Role::Top,
            Action::SetModifier {
                modifier: Modifier::CosmicInsight,
                value: true,
            },
        )
        .await
        .unwrap();
    let (a, b) = tokio::join!(
        alice.dispatch(Role::Top, Action::Arm),
        bob.dispatch(Role::Top, Action::Arm),
    );
    a.unwrap();
    b.unwrap();

    time::sleep(Duration::from_millis(2500)).await;
    let a_top = alice.snapshot().entity(Role::Top).clone();
    let b_top = bob.snapshot().entity(Role::Top).clone();
    assert_eq!(a_top.version(), b_top.version());
    assert_eq!(a_top.cosmic_insight(), b_top.cosmic_insight());
    let (x, y) = (a_top.remaining().seconds().unwrap(), b_top.remaining().seconds().unwrap());
    assert!(x.abs_diff(y) <= 1);
}

#[tokio::test(start_paused = true)]
async fn test_dropped_snapshot_heals_within_one_tick() {
    let hub = MemoryHub::new();
    let alice = join(&hub, "alice").await;
    let bob = join(&hub, "bob").await;

    hub.drop_next(1);
    alice.dispatch(Role::Adc, Action::Arm).await.unwrap();
    time::sleep(Duration::from_millis(10)).await;
    assert_eq!(seconds(&bob, Role::Adc), None, "the arm broadcast was dropped");

    time::sleep(Duration::from_millis(1100)).await;
    let theirs = seconds(&alice, Role::Adc).unwrap();
    let ours = seconds(&bob, Role::Adc).expect("healed by the next tick broadcast");
    assert!(theirs.abs_diff(ours) <= 1);
}

// =========================================================================
// Teardown
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_leave_releases_channel_and_stops_session() {
    let hub = MemoryHub::new();
    let handle = join(&hub, "a").await;
    assert_eq!(hub.room_count().await, 1);

    handle.leave().await.unwrap();
    assert_eq!(handle.status(), ChannelState::Disconnected);
    assert_eq!(hub.room_count().await, 0);

    let err = handle.dispatch(Role::Top, Action::Arm).await.unwrap_err();
    assert!(matches!(err, SessionError::Ended));
    time::sleep(Duration::from_millis(10)).await;
    assert!(!handle.is_running());
}

#[tokio::test(start_paused = true)]
async fn test_dropping_every_handle_leaves_room() {
    let hub = MemoryHub::new();
    let handle = join(&hub, "a").await;
    let clone = handle.clone();
    drop(handle);
    time::sleep(Duration::from_millis(10)).await;
    assert_eq!(hub.room_count().await, 1);

    drop(clone);
    time::sleep(Duration::from_millis(10)).await;
    assert_eq!(hub.room_count().await, 0);
}

#[tokio::test(start_paused = true)]
async fn test_closed_channel_ends_session() {
    let hub = MemoryHub::new();
    let handle = join(&hub, "a").await;

    hub.close_room(&room()).await;
    time::sleep(Duration::from_millis(10)).await;

    assert_eq!(handle.status(), ChannelState::Disconnected);
    assert!(!handle.is_running());
}
