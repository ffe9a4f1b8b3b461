use serde::Serialize;

#[derive(Debug, Clone, Copy, Default)]
pub struct GoalStats {
    pub xp: i64,
    pub level: i64,
    pub streak: i64,
    pub prestige: i64,
    pub completed_tasks: i64,
}

pub struct Badge {
    pub id: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub icon: &'static str,
    pub predicate: fn(&GoalStats) -> bool,
}

// Fixed catalog; declaration order is the stable presentation order.
pub const CATALOG: &[Badge] = &[
    Badge {
        id: "first_step",
        name: "First Step",
        description: "Complete your first task",
        icon: "👣",
        predicate: |stats| stats.completed_tasks >= 1,
    },
    Badge {
        id: "on_a_roll",
        name: "On a Roll",
        description: "Complete 10 tasks",
        icon: "🎯",
        predicate: |stats| stats.completed_tasks >= 10,
    },
    Badge {
        id: "task_master",
        name: "Task Master",
        description: "Complete 50 tasks",
        icon: "🏗️",
        predicate: |stats| stats.completed_tasks >= 50,
    },
    Badge {
        id: "centurion",
        name: "Centurion",
        description: "Complete 100 tasks",
        icon: "🏛️",
        predicate: |stats| stats.completed_tasks >= 100,
    },
    Badge {
        id: "week_streak",
        name: "Seven Days Strong",
        description: "Keep a 7-day streak",
        icon: "🔥",
        predicate: |stats| stats.streak >= 7,
    },
    Badge {
        id: "month_streak",
        name: "Habit Formed",
        description: "Keep a 30-day streak",
        icon: "🌋",
        predicate: |stats| stats.streak >= 30,
    },
    Badge {
        id: "halfway_there",
        name: "Halfway There",
        description: "Reach level 5",
        icon: "⛰️",
        predicate: |stats| stats.level >= 5,
    },
    Badge {
        id: "summit",
        name: "Summit",
        description: "Reach level 10",
        icon: "🏔️",
        predicate: |stats| stats.level >= 10,
    },
    Badge {
        id: "reborn",
        name: "Reborn",
        description: "Prestige a goal",
        icon: "🌟",
        predicate: |stats| stats.prestige >= 1,
    },
];

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct BadgeView {
    pub id: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub icon: &'static str,
}

#[derive(Debug, Serialize)]
pub struct BadgeEvaluation {
    pub earned: Vec<BadgeView>,
    pub available: Vec<BadgeView>,
}

/// Partitions the catalog into earned and still-available badges for the
/// given goal stats, preserving catalog order in both halves.
pub fn evaluate(stats: &GoalStats) -> BadgeEvaluation {
    let mut earned = Vec::new();
    let mut available = Vec::new();
    for badge in CATALOG {
        let view = BadgeView {
            id: badge.id,
            name: badge.name,
            description: badge.description,
            icon: badge.icon,
        };
        if (badge.predicate)(stats) {
            earned.push(view);
        } else {
            available.push(view);
        }
    }
    BadgeEvaluation { earned, available }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(views: &[BadgeView]) -> Vec<&'static str> {
        views.iter().map(|v| v.id).collect()
    }

    #[test]
    fn fresh_goal_has_no_badges() {
        let result = evaluate(&GoalStats::default());
        assert!(result.earned.is_empty());
        assert_eq!(result.available.len(), CATALOG.len());
    }

    #[test]
    fn partition_is_exact_and_exhaustive() {
        let samples = [
            GoalStats::default(),
            GoalStats { completed_tasks: 1, ..Default::default() },
            GoalStats { completed_tasks: 120, streak: 9, level: 6, ..Default::default() },
            GoalStats { streak: 45, level: 10, prestige: 2, completed_tasks: 300, xp: 1625 },
        ];
        for stats in samples {
            let result = evaluate(&stats);
            assert_eq!(result.earned.len() + result.available.len(), CATALOG.len());
            for badge in &result.earned {
                assert!(!result.available.contains(badge));
            }
        }
    }

    #[test]
    fn thresholds_unlock_expected_badges() {
        let stats = GoalStats { completed_tasks: 10, streak: 7, level: 5, ..Default::default() };
        let result = evaluate(&stats);
        assert_eq!(
            ids(&result.earned),
            vec!["first_step", "on_a_roll", "week_streak", "halfway_there"]
        );
        assert!(ids(&result.available).contains(&"summit"));
    }

    #[test]
    fn catalog_ids_are_unique() {
        let mut seen = std::collections::HashSet::new();
        for badge in CATALOG {
            assert!(seen.insert(badge.id), "duplicate badge id {}", badge.id);
        }
    }
}
