//! Cooldown durations and countdown formatting.
//!
//! Everything here is a pure function of its arguments.

use crate::{Role, TimerState};

/// Flash cooldown with no reductions, in seconds.
pub const BASE_COOLDOWN: u32 = 300;
/// With lucidity boots only.
pub const BOOTS_COOLDOWN: u32 = 268;
/// With cosmic insight only.
pub const RUNE_COOLDOWN: u32 = 255;
/// With both boots and rune.
pub const BOTH_COOLDOWN: u32 = 231;

/// Cooldown in seconds for the given modifiers.
///
/// | boots | rune | seconds |
/// |-------|------|---------|
/// | no    | no   | 300     |
/// | yes   | no   | 268     |
/// | no    | yes  | 255     |
/// | yes   | yes  | 231     |
pub fn compute_cooldown(lucidity_boots: bool, cosmic_insight: bool) -> u32 {
    match (lucidity_boots, cosmic_insight) {
        (true, true) => BOTH_COOLDOWN,
        (true, false) => BOOTS_COOLDOWN,
        (false, true) => RUNE_COOLDOWN,
        (false, false) => BASE_COOLDOWN,
    }
}

/// One second of countdown.
///
/// This is not a plain `n - 1`: `decrement(1)` is `Idle`, not
/// `Armed(0)`. It steps exactly as [`EntityTimerState::tick`] does, so a
/// display counting down locally agrees with the room and never shows
/// `0:00` on a running timer. `0` also maps to `Idle`.
///
/// [`EntityTimerState::tick`]: crate::EntityTimerState::tick
pub fn decrement(n: u32) -> TimerState {
    if n > 1 {
        TimerState::Armed(n - 1)
    } else {
        TimerState::Idle
    }
}

/// `M:SS`, minutes unpadded and seconds zero-padded: `263` → `"4:23"`.
pub fn format(n: u32) -> String {
    format!("{}:{:02}", n / 60, n % 60)
}

/// Display text for a timer, `None` when idle.
pub fn format_remaining(state: TimerState) -> Option<String> {
    match state {
        TimerState::Armed(n) => Some(format(n)),
        TimerState::Idle => None,
    }
}

/// The in-game time at which a summoner comes back, as players paste it
/// into chat: role name immediately followed by `M:SS`, e.g. `"MID17:32"`.
///
/// `game_elapsed` is the game clock when the summoner was used.
pub fn callout(role: Role, game_elapsed: u32, cooldown: u32) -> String {
    format!("{}{}", role, format(game_elapsed.saturating_add(cooldown)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compute_cooldown_table() {
        assert_eq!(compute_cooldown(false, false), 300);
        assert_eq!(compute_cooldown(true, false), 268);
        assert_eq!(compute_cooldown(false, true), 255);
        assert_eq!(compute_cooldown(true, true), 231);
    }

    #[test]
    fn test_decrement_stops_at_idle() {
        assert_eq!(decrement(300), TimerState::Armed(299));
        assert_eq!(decrement(2), TimerState::Armed(1));
        assert_eq!(decrement(1), TimerState::Idle);
        assert_eq!(decrement(0), TimerState::Idle);
    }

    #[test]
    fn test_decrement_matches_timer_tick_to_the_end() {
        let mut timer = crate::EntityTimerState::new(Role::Top);
        timer.arm().unwrap();
        while let Some(n) = timer.remaining().seconds() {
            assert!(timer.tick());
            assert_eq!(timer.remaining(), decrement(n));
            assert_ne!(timer.remaining(), TimerState::Armed(0));
        }
        assert_eq!(timer.remaining(), TimerState::Idle);
    }

    #[test]
    fn test_format_pads_seconds_only() {
        assert_eq!(format(263), "4:23");
        assert_eq!(format(300), "5:00");
        assert_eq!(format(65), "1:05");
        assert_eq!(format(9), "0:09");
        assert_eq!(format(0), "0:00");
        assert_eq!(format(600), "10:00");
    }

    #[test]
    fn test_format_remaining_is_absent_when_idle() {
        assert_eq!(format_remaining(TimerState::Armed(231)).as_deref(), Some("3:51"));
        assert_eq!(format_remaining(TimerState::Idle), None);
    }

    #[test]
    fn test_callout_adds_cooldown_to_game_clock() {
        // 12:00 into the game, plain flash: back at 17:00.
        assert_eq!(callout(Role::Top, 720, 300), "TOP17:00");
        assert_eq!(callout(Role::Support, 61, 231), "SUPPORT4:52");
    }
}
