use crate::utils::days_between;
use serde::Serialize;

pub const MAX_LEVEL: i64 = 10;

// Cumulative XP required to reach each level (index 0 = level 1). The span
// between levels grows by 25 XP per level: 50, 75, 100, ... 250.
pub const LEVEL_THRESHOLDS: [i64; 10] = [0, 50, 125, 225, 350, 500, 675, 875, 1100, 1350];

// At max level the band keeps the progression (span 275) so progress can
// still reach 1.0, which is what gates prestige.
const MAX_LEVEL_SPAN: i64 = 275;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LevelInfo {
    pub level: i64,
    pub current_level_xp: i64,
    pub next_level_xp: i64,
    pub xp_progress: f64,
}

/// Maps cumulative XP to level and in-level progress. Negative XP clamps to
/// zero; the level is capped at [`MAX_LEVEL`]. `current_level_xp` is XP earned
/// past the current threshold, `next_level_xp` is the cumulative XP of the
/// next threshold, and `xp_progress` fills the band in `[0, 1]`.
pub fn level_info(xp: i64) -> LevelInfo {
    let xp = xp.max(0);
    let mut level: i64 = 1;
    for (index, threshold) in LEVEL_THRESHOLDS.iter().enumerate() {
        if xp >= *threshold {
            level = index as i64 + 1;
        }
    }
    let floor = LEVEL_THRESHOLDS[(level - 1) as usize];
    let (span, next_level_xp) = if level >= MAX_LEVEL {
        (MAX_LEVEL_SPAN, floor + MAX_LEVEL_SPAN)
    } else {
        let next = LEVEL_THRESHOLDS[level as usize];
        (next - floor, next)
    };
    let into_level = (xp - floor).min(span);
    LevelInfo {
        level,
        current_level_xp: into_level,
        next_level_xp,
        xp_progress: into_level as f64 / span as f64,
    }
}

pub fn level_for_xp(xp: i64) -> i64 {
    level_info(xp).level
}

pub fn eligible_for_prestige(xp: i64) -> bool {
    let info = level_info(xp);
    info.level >= MAX_LEVEL && info.xp_progress >= 1.0
}

pub fn default_task_xp(priority: &str) -> i64 {
    match priority {
        "high" => 30,
        "low" => 10,
        _ => 20,
    }
}

/// Streak transition on a completion dated `today`: completing twice in one
/// day keeps the streak, a completion on the following calendar day extends
/// it, anything else starts over at 1.
pub fn next_streak(streak: i64, last_completed_date: Option<&str>, today: &str) -> i64 {
    match last_completed_date.and_then(|last| days_between(last, today)) {
        Some(0) => streak.max(1),
        Some(1) => streak + 1,
        _ => 1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_xp_is_level_one_with_no_progress() {
        let info = level_info(0);
        assert_eq!(info.level, 1);
        assert_eq!(info.current_level_xp, 0);
        assert_eq!(info.next_level_xp, 50);
        assert_eq!(info.xp_progress, 0.0);
    }

    #[test]
    fn negative_xp_clamps_to_zero() {
        assert_eq!(level_info(-500), level_info(0));
    }

    #[test]
    fn level_is_monotonic_and_bounded() {
        let mut previous = 0;
        for xp in 0..2000 {
            let info = level_info(xp);
            assert!(info.level >= previous, "level dropped at xp={xp}");
            assert!(info.level <= MAX_LEVEL);
            assert!((0.0..=1.0).contains(&info.xp_progress), "progress out of range at xp={xp}");
            previous = info.level;
        }
    }

    #[test]
    fn progress_is_zero_exactly_at_thresholds() {
        for threshold in LEVEL_THRESHOLDS {
            let info = level_info(threshold);
            assert_eq!(info.xp_progress, 0.0, "nonzero progress at threshold {threshold}");
            assert_eq!(info.current_level_xp, 0);
        }
    }

    #[test]
    fn hundred_xp_lands_in_level_two() {
        let info = level_info(100);
        assert_eq!(info.level, 2);
        assert_eq!(info.current_level_xp, 50);
        assert_eq!(info.next_level_xp, 125);
        assert!((info.xp_progress - 50.0 / 75.0).abs() < 1e-9);
    }

    #[test]
    fn max_level_progress_caps_at_one() {
        let info = level_info(1350);
        assert_eq!(info.level, MAX_LEVEL);
        assert_eq!(info.xp_progress, 0.0);
        assert!(!eligible_for_prestige(1350));

        let full = level_info(1625);
        assert_eq!(full.level, MAX_LEVEL);
        assert_eq!(full.xp_progress, 1.0);
        assert!(eligible_for_prestige(1625));

        let beyond = level_info(99_999);
        assert_eq!(beyond.level, MAX_LEVEL);
        assert_eq!(beyond.xp_progress, 1.0);
        assert_eq!(beyond.current_level_xp, 275);
    }

    #[test]
    fn streak_transitions() {
        assert_eq!(next_streak(0, None, "2026-03-10"), 1);
        assert_eq!(next_streak(4, Some("2026-03-10"), "2026-03-10"), 4);
        assert_eq!(next_streak(4, Some("2026-03-09"), "2026-03-10"), 5);
        assert_eq!(next_streak(4, Some("2026-03-01"), "2026-03-10"), 1);
        assert_eq!(next_streak(4, Some("garbage"), "2026-03-10"), 1);
    }

    #[test]
    fn default_xp_follows_priority() {
        assert_eq!(default_task_xp("high"), 30);
        assert_eq!(default_task_xp("medium"), 20);
        assert_eq!(default_task_xp("low"), 10);
        assert_eq!(default_task_xp("unknown"), 20);
    }
}
