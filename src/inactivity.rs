use crate::types::Goal;
use chrono::{DateTime, Utc};

pub const DEFAULT_INACTIVE_DAYS: i64 = 10;

/// A goal is inactive once strictly more than `threshold_days` whole days
/// have passed since its last activity. Unparseable timestamps never flag.
pub fn is_inactive(now: DateTime<Utc>, last_active_at: &str, threshold_days: i64) -> bool {
    let last = match DateTime::parse_from_rfc3339(last_active_at.trim()) {
        Ok(value) => value.with_timezone(&Utc),
        Err(_) => return false,
    };
    (now - last).num_days() > threshold_days
}

/// Filters the goals a user should be nudged about. Paused and archived
/// goals are deliberately dormant and stay out of the list.
pub fn inactive_goals(goals: &[Goal], now: DateTime<Utc>, threshold_days: i64) -> Vec<Goal> {
    goals
        .iter()
        .filter(|goal| !goal.archived && !goal.paused)
        .filter(|goal| is_inactive(now, &goal.last_active_at, threshold_days))
        .cloned()
        .collect()
}
