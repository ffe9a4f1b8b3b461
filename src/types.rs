use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Goal {
    pub id: String,
    pub title: String,
    pub color: String,
    pub position: i64,
    pub task_ids: Vec<String>,
    pub streak: i64,
    pub last_completed_date: Option<String>,
    pub level: i64,
    pub xp: i64,
    pub prestige: i64,
    pub paused: bool,
    pub archived: bool,
    pub created_at: String,
    pub last_active_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub title: String,
    pub goal_id: Option<String>,
    pub due_date: Option<String>,
    pub suggested_due_date: Option<String>,
    pub tags: Vec<String>,
    pub priority: String,
    pub xp: i64,
    pub repeat: Option<String>,
    pub completed: bool,
    pub completed_at: Option<String>,
    pub archived: bool,
    pub created_at: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct GoalInput {
    pub title: String,
    pub color: Option<String>,
    pub position: Option<i64>,
}

#[derive(Debug, Default)]
pub struct GoalUpdate {
    pub title: Option<String>,
    pub color: Option<String>,
    pub position: Option<i64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TaskInput {
    pub title: String,
    pub goal_id: Option<String>,
    pub due_date: Option<String>,
    pub tags: Option<Vec<String>>,
    pub priority: Option<String>,
    pub xp: Option<i64>,
    pub repeat: Option<String>,
}

#[derive(Debug, Default)]
pub struct TaskUpdate {
    pub title: Option<String>,
    pub goal_id: Option<String>,
    pub due_date: Option<String>,
    pub tags: Option<Vec<String>>,
    pub priority: Option<String>,
    pub xp: Option<i64>,
    pub repeat: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ListGoalsOptions {
    pub include_archived: bool,
    pub include_paused: bool,
}

// Paused goals stay visible in listings by default; only archived goals are
// hidden unless asked for.
impl Default for ListGoalsOptions {
    fn default() -> Self {
        Self {
            include_archived: false,
            include_paused: true,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ListTasksOptions {
    pub goal_id: Option<String>,
    pub tag: Option<String>,
    pub include_completed: bool,
    pub include_archived: bool,
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct PrestigeResult {
    pub success: bool,
    pub prestige: i64,
    pub reason: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CompletionResult {
    pub task: Task,
    pub goal: Option<Goal>,
    pub leveled_up: bool,
    pub next_occurrence: Option<Task>,
}
