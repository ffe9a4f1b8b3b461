use crate::badges::GoalStats;
use crate::gamification::{default_task_xp, eligible_for_prestige, level_for_xp, next_streak, MAX_LEVEL};
use crate::types::{
    CompletionResult, Goal, GoalInput, GoalUpdate, ListGoalsOptions, ListTasksOptions,
    PrestigeResult, Task, TaskInput, TaskUpdate,
};
use crate::utils::{generate_id, now_iso, parse_ymd, today_ymd};
use chrono::Months;
use rusqlite::types::Value as SqlValue;
use rusqlite::{params, Connection, Row};

const GOAL_COLORS: [&str; 8] = [
    "#e74c3c", "#e67e22", "#f1c40f", "#2ecc71", "#1abc9c", "#3498db", "#9b59b6", "#e84393",
];

pub struct AchievoStore {
    conn: Connection,
}

impl AchievoStore {
    pub fn new(db_path: &str) -> Result<Self, String> {
        let conn = Connection::open(db_path).map_err(|err| err.to_string())?;
        conn.pragma_update(None, "journal_mode", "WAL")
            .map_err(|err| err.to_string())?;
        conn.pragma_update(None, "synchronous", "NORMAL")
            .map_err(|err| err.to_string())?;
        conn.execute_batch(
            r#"
      CREATE TABLE IF NOT EXISTS goals (
        id TEXT PRIMARY KEY,
        title TEXT NOT NULL,
        color TEXT NOT NULL,
        position INTEGER NOT NULL,
        task_ids_json TEXT NOT NULL,
        streak INTEGER NOT NULL,
        last_completed_date TEXT,
        level INTEGER NOT NULL,
        xp INTEGER NOT NULL,
        prestige INTEGER NOT NULL,
        paused INTEGER NOT NULL,
        archived INTEGER NOT NULL,
        created_at TEXT NOT NULL,
        last_active_at TEXT NOT NULL
      );
      CREATE INDEX IF NOT EXISTS goals_position_idx ON goals(position);
      CREATE INDEX IF NOT EXISTS goals_archived_idx ON goals(archived);

      CREATE TABLE IF NOT EXISTS tasks (
        id TEXT PRIMARY KEY,
        title TEXT NOT NULL,
        goal_id TEXT,
        due_date TEXT,
        suggested_due_date TEXT,
        tags_json TEXT NOT NULL,
        priority TEXT NOT NULL,
        xp INTEGER NOT NULL,
        repeat TEXT,
        completed INTEGER NOT NULL,
        completed_at TEXT,
        archived INTEGER NOT NULL,
        created_at TEXT NOT NULL
      );
      CREATE INDEX IF NOT EXISTS tasks_goal_idx ON tasks(goal_id);
      CREATE INDEX IF NOT EXISTS tasks_completed_idx ON tasks(completed);
      CREATE INDEX IF NOT EXISTS tasks_created_idx ON tasks(created_at);
      "#,
        )
        .map_err(|err| err.to_string())?;
        Ok(Self { conn })
    }

    pub fn add_goal(&self, input: GoalInput) -> Result<Goal, String> {
        let title = input.title.trim().to_string();
        if title.is_empty() {
            return Err("title is required".to_string());
        }
        let position = match input.position {
            Some(value) => value,
            None => self.next_goal_position()?,
        };
        let color = input
            .color
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
            .unwrap_or_else(|| GOAL_COLORS[position.unsigned_abs() as usize % GOAL_COLORS.len()].to_string());
        let now = now_iso();
        let goal = Goal {
            id: generate_id("goal"),
            title,
            color,
            position,
            task_ids: Vec::new(),
            streak: 0,
            last_completed_date: None,
            level: 1,
            xp: 0,
            prestige: 0,
            paused: false,
            archived: false,
            created_at: now.clone(),
            last_active_at: now,
        };
        self.conn
            .execute(
                r#"
        INSERT INTO goals (
          id, title, color, position, task_ids_json, streak, last_completed_date,
          level, xp, prestige, paused, archived, created_at, last_active_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)
        "#,
                params![
                    goal.id,
                    goal.title,
                    goal.color,
                    goal.position,
                    serde_json::to_string(&goal.task_ids).unwrap_or_else(|_| "[]".to_string()),
                    goal.streak,
                    goal.last_completed_date,
                    goal.level,
                    goal.xp,
                    goal.prestige,
                    goal.paused,
                    goal.archived,
                    goal.created_at,
                    goal.last_active_at
                ],
            )
            .map_err(|err| err.to_string())?;
        Ok(goal)
    }

    pub fn get_goal(&self, id: &str) -> Result<Option<Goal>, String> {
        let mut stmt = self
            .conn
            .prepare("SELECT * FROM goals WHERE id = ?1")
            .map_err(|err| err.to_string())?;
        let mut rows = stmt.query(params![id]).map_err(|err| err.to_string())?;
        if let Some(row) = rows.next().map_err(|err| err.to_string())? {
            Ok(Some(goal_from_row(row)?))
        } else {
            Ok(None)
        }
    }

    pub fn require_goal(&self, id: &str) -> Result<Goal, String> {
        self.get_goal(id)?.ok_or_else(|| format!("Goal not found: {id}"))
    }

    pub fn list_goals(&self, options: ListGoalsOptions) -> Result<Vec<Goal>, String> {
        let mut conditions = Vec::new();
        if !options.include_archived {
            conditions.push("archived = 0");
        }
        if !options.include_paused {
            conditions.push("paused = 0");
        }
        let where_clause = if conditions.is_empty() {
            "".to_string()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };
        let sql = format!("SELECT * FROM goals {} ORDER BY position, created_at", where_clause);
        let mut stmt = self.conn.prepare(&sql).map_err(|err| err.to_string())?;
        let mut rows = stmt.query([]).map_err(|err| err.to_string())?;
        let mut goals = Vec::new();
        while let Some(row) = rows.next().map_err(|err| err.to_string())? {
            goals.push(goal_from_row(row)?);
        }
        Ok(goals)
    }

    pub fn update_goal(&self, id: &str, patch: GoalUpdate) -> Result<Goal, String> {
        let mut existing = self.require_goal(id)?;
        if let Some(title) = patch.title {
            let trimmed = title.trim();
            if trimmed.is_empty() {
                return Err("title cannot be empty".to_string());
            }
            existing.title = trimmed.to_string();
        }
        if let Some(color) = patch.color {
            let trimmed = color.trim();
            if !trimmed.is_empty() {
                existing.color = trimmed.to_string();
            }
        }
        if let Some(position) = patch.position {
            existing.position = position;
        }
        existing.last_active_at = now_iso();
        write_goal(&self.conn, &existing)?;
        Ok(existing)
    }

    pub fn delete_goal(&mut self, id: &str) -> Result<(), String> {
        self.require_goal(id)?;
        let tx = self.conn.transaction().map_err(|err| err.to_string())?;
        // Detach rather than cascade: tasks are user data and outlive the goal.
        tx.execute("UPDATE tasks SET goal_id = NULL WHERE goal_id = ?1", params![id])
            .map_err(|err| err.to_string())?;
        tx.execute("DELETE FROM goals WHERE id = ?1", params![id])
            .map_err(|err| err.to_string())?;
        tx.commit().map_err(|err| err.to_string())
    }

    pub fn set_goal_archived(&self, id: &str, archived: bool) -> Result<Goal, String> {
        let mut goal = self.require_goal(id)?;
        goal.archived = archived;
        if !archived {
            goal.last_active_at = now_iso();
        }
        write_goal(&self.conn, &goal)?;
        Ok(goal)
    }

    pub fn set_goal_paused(&self, id: &str, paused: bool) -> Result<Goal, String> {
        let mut goal = self.require_goal(id)?;
        goal.paused = paused;
        if !paused {
            goal.last_active_at = now_iso();
        }
        write_goal(&self.conn, &goal)?;
        Ok(goal)
    }

    pub fn revive_goal(&self, id: &str) -> Result<Goal, String> {
        let mut goal = self.require_goal(id)?;
        goal.last_active_at = now_iso();
        write_goal(&self.conn, &goal)?;
        Ok(goal)
    }

    pub fn prestige_goal(&self, id: &str) -> Result<PrestigeResult, String> {
        let mut goal = self.require_goal(id)?;
        if !eligible_for_prestige(goal.xp) {
            return Ok(PrestigeResult {
                success: false,
                prestige: goal.prestige,
                reason: Some(format!(
                    "Prestige requires level {MAX_LEVEL} with a full XP bar (currently level {} with {} XP)",
                    goal.level, goal.xp
                )),
            });
        }
        goal.xp = 0;
        goal.level = 1;
        goal.prestige += 1;
        goal.last_active_at = now_iso();
        write_goal(&self.conn, &goal)?;
        Ok(PrestigeResult {
            success: true,
            prestige: goal.prestige,
            reason: None,
        })
    }

    pub fn goal_stats(&self, id: &str) -> Result<GoalStats, String> {
        let goal = self.require_goal(id)?;
        let completed_tasks: i64 = self
            .conn
            .query_row(
                "SELECT COUNT(*) FROM tasks WHERE goal_id = ?1 AND completed = 1",
                params![id],
                |row| row.get(0),
            )
            .map_err(|err| err.to_string())?;
        Ok(GoalStats {
            xp: goal.xp,
            level: goal.level,
            streak: goal.streak,
            prestige: goal.prestige,
            completed_tasks,
        })
    }

    pub fn add_task(&self, input: TaskInput) -> Result<Task, String> {
        let task = self.build_task(input)?;
        self.conn
            .execute(
                r#"
        INSERT INTO tasks (
          id, title, goal_id, due_date, suggested_due_date, tags_json, priority,
          xp, repeat, completed, completed_at, archived, created_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
        "#,
                params![
                    task.id,
                    task.title,
                    task.goal_id,
                    task.due_date,
                    task.suggested_due_date,
                    serde_json::to_string(&task.tags).unwrap_or_else(|_| "[]".to_string()),
                    task.priority,
                    task.xp,
                    task.repeat,
                    task.completed,
                    task.completed_at,
                    task.archived,
                    task.created_at
                ],
            )
            .map_err(|err| err.to_string())?;
        if let Some(goal_id) = &task.goal_id {
            refresh_task_ids(&self.conn, goal_id)?;
            touch_goal(&self.conn, goal_id)?;
        }
        Ok(task)
    }

    pub fn get_task(&self, id: &str) -> Result<Option<Task>, String> {
        let mut stmt = self
            .conn
            .prepare("SELECT * FROM tasks WHERE id = ?1")
            .map_err(|err| err.to_string())?;
        let mut rows = stmt.query(params![id]).map_err(|err| err.to_string())?;
        if let Some(row) = rows.next().map_err(|err| err.to_string())? {
            Ok(Some(task_from_row(row)?))
        } else {
            Ok(None)
        }
    }

    pub fn require_task(&self, id: &str) -> Result<Task, String> {
        self.get_task(id)?.ok_or_else(|| format!("Task not found: {id}"))
    }

    pub fn list_tasks(&self, options: ListTasksOptions) -> Result<Vec<Task>, String> {
        let limit = options.limit.unwrap_or(100).max(1);
        let mut conditions = Vec::new();
        let mut params = Vec::new();
        if let Some(goal_id) = options.goal_id {
            conditions.push("goal_id = ?".to_string());
            params.push(SqlValue::from(goal_id));
        }
        if !options.include_completed {
            conditions.push("completed = 0".to_string());
        }
        if !options.include_archived {
            conditions.push("archived = 0".to_string());
        }
        let where_clause = if conditions.is_empty() {
            "".to_string()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };
        let sql = format!("SELECT * FROM tasks {} ORDER BY created_at", where_clause);
        let mut stmt = self.conn.prepare(&sql).map_err(|err| err.to_string())?;
        let mut rows = stmt
            .query(rusqlite::params_from_iter(params))
            .map_err(|err| err.to_string())?;
        let mut tasks = Vec::new();
        while let Some(row) = rows.next().map_err(|err| err.to_string())? {
            tasks.push(task_from_row(row)?);
        }
        // The tag filter must run before the limit, otherwise a late match
        // hides behind rows the caller never sees.
        if let Some(tag) = options.tag {
            let needle = tag.trim().to_lowercase();
            tasks.retain(|task| task.tags.iter().any(|t| t.to_lowercase() == needle));
        }
        tasks.truncate(limit as usize);
        Ok(tasks)
    }

    pub fn update_task(&self, id: &str, patch: TaskUpdate) -> Result<Task, String> {
        let mut existing = self.require_task(id)?;
        let previous_goal = existing.goal_id.clone();
        let previous_xp = existing.xp;
        let was_completed = existing.completed;
        if let Some(title) = patch.title {
            let trimmed = title.trim();
            if trimmed.is_empty() {
                return Err("title cannot be empty".to_string());
            }
            existing.title = trimmed.to_string();
        }
        if let Some(goal_id) = patch.goal_id {
            let trimmed = goal_id.trim();
            if trimmed.is_empty() {
                existing.goal_id = None;
            } else {
                self.require_goal(trimmed)?;
                existing.goal_id = Some(trimmed.to_string());
            }
        }
        if let Some(due_date) = patch.due_date {
            let trimmed = due_date.trim();
            existing.due_date = if trimmed.is_empty() { None } else { Some(trimmed.to_string()) };
        }
        if let Some(tags) = patch.tags {
            existing.tags = normalize_tags(&tags);
        }
        if let Some(priority) = patch.priority {
            existing.priority = normalize_priority(&priority);
        }
        if let Some(xp) = patch.xp {
            existing.xp = xp.max(0);
        }
        if let Some(repeat) = patch.repeat {
            existing.repeat = normalize_repeat(Some(&repeat));
        }
        write_task(&self.conn, &existing)?;
        // A completed task has already granted XP; keep that grant in step
        // with edits so a later uncompletion reverses exactly what was given.
        if was_completed {
            if previous_goal != existing.goal_id {
                if let Some(goal_id) = &previous_goal {
                    self.adjust_goal_xp(goal_id, -previous_xp)?;
                }
                if let Some(goal_id) = &existing.goal_id {
                    self.adjust_goal_xp(goal_id, existing.xp)?;
                }
            } else if existing.xp != previous_xp {
                if let Some(goal_id) = &existing.goal_id {
                    self.adjust_goal_xp(goal_id, existing.xp - previous_xp)?;
                }
            }
        }
        if previous_goal != existing.goal_id {
            if let Some(goal_id) = &previous_goal {
                refresh_task_ids(&self.conn, goal_id)?;
            }
        }
        if let Some(goal_id) = &existing.goal_id {
            refresh_task_ids(&self.conn, goal_id)?;
            touch_goal(&self.conn, goal_id)?;
        }
        Ok(existing)
    }

    pub fn delete_task(&self, id: &str) -> Result<(), String> {
        let task = self.require_task(id)?;
        self.conn
            .execute("DELETE FROM tasks WHERE id = ?1", params![id])
            .map_err(|err| err.to_string())?;
        if let Some(goal_id) = &task.goal_id {
            refresh_task_ids(&self.conn, goal_id)?;
        }
        Ok(())
    }

    pub fn set_task_archived(&self, id: &str, archived: bool) -> Result<Task, String> {
        let mut task = self.require_task(id)?;
        task.archived = archived;
        write_task(&self.conn, &task)?;
        if let Some(goal_id) = &task.goal_id {
            refresh_task_ids(&self.conn, goal_id)?;
        }
        Ok(task)
    }

    pub fn complete_task(&mut self, id: &str) -> Result<CompletionResult, String> {
        let mut task = self.require_task(id)?;
        if task.completed {
            return Err(format!("Task already completed: {id}"));
        }
        let now = now_iso();
        let today = today_ymd();
        task.completed = true;
        task.completed_at = Some(now.clone());

        let goal = match &task.goal_id {
            Some(goal_id) => Some(self.require_goal(goal_id)?),
            None => None,
        };
        let next_task = task.repeat.as_deref().and_then(|repeat| {
            let anchor = task.due_date.clone().unwrap_or_else(today_ymd);
            let due = advance_date(&anchor, repeat)?;
            Some(Task {
                id: generate_id("task"),
                title: task.title.clone(),
                goal_id: task.goal_id.clone(),
                due_date: Some(due.clone()),
                suggested_due_date: Some(due),
                tags: task.tags.clone(),
                priority: task.priority.clone(),
                xp: task.xp,
                repeat: task.repeat.clone(),
                completed: false,
                completed_at: None,
                archived: false,
                created_at: now.clone(),
            })
        });

        let (goal, leveled_up) = match goal {
            Some(mut goal) => {
                let before = goal.level;
                goal.xp += task.xp;
                goal.level = level_for_xp(goal.xp);
                goal.streak = next_streak(goal.streak, goal.last_completed_date.as_deref(), &today);
                goal.last_completed_date = Some(today);
                goal.last_active_at = now;
                let leveled_up = goal.level > before;
                (Some(goal), leveled_up)
            }
            None => (None, false),
        };

        let tx = self.conn.transaction().map_err(|err| err.to_string())?;
        write_task(&tx, &task)?;
        if let Some(goal) = &goal {
            write_goal(&tx, goal)?;
        }
        if let Some(next) = &next_task {
            insert_task(&tx, next)?;
        }
        if let Some(goal_id) = &task.goal_id {
            refresh_task_ids(&tx, goal_id)?;
        }
        tx.commit().map_err(|err| err.to_string())?;

        let goal = match &task.goal_id {
            Some(goal_id) => self.get_goal(goal_id)?,
            None => None,
        };
        Ok(CompletionResult {
            task,
            goal,
            leveled_up,
            next_occurrence: next_task,
        })
    }

    pub fn uncomplete_task(&self, id: &str) -> Result<CompletionResult, String> {
        let mut task = self.require_task(id)?;
        if !task.completed {
            return Err(format!("Task is not completed: {id}"));
        }
        task.completed = false;
        task.completed_at = None;
        write_task(&self.conn, &task)?;
        let goal = match &task.goal_id {
            Some(goal_id) => {
                let mut goal = self.require_goal(goal_id)?;
                goal.xp = (goal.xp - task.xp).max(0);
                goal.level = level_for_xp(goal.xp);
                write_goal(&self.conn, &goal)?;
                Some(goal)
            }
            None => None,
        };
        Ok(CompletionResult {
            task,
            goal,
            leveled_up: false,
            next_occurrence: None,
        })
    }

    fn build_task(&self, input: TaskInput) -> Result<Task, String> {
        let title = input.title.trim().to_string();
        if title.is_empty() {
            return Err("title is required".to_string());
        }
        let goal_id = match input.goal_id.as_deref().map(str::trim) {
            Some(id) if !id.is_empty() => {
                self.require_goal(id)?;
                Some(id.to_string())
            }
            _ => None,
        };
        let priority = normalize_priority(input.priority.as_deref().unwrap_or("medium"));
        let due_date = input
            .due_date
            .map(|d| d.trim().to_string())
            .filter(|d| !d.is_empty());
        let suggested_due_date = match &due_date {
            Some(due) => Some(due.clone()),
            None => suggest_due_date(&priority),
        };
        Ok(Task {
            id: generate_id("task"),
            title,
            goal_id,
            due_date,
            suggested_due_date,
            tags: normalize_tags(&input.tags.unwrap_or_default()),
            xp: input.xp.map(|v| v.max(0)).unwrap_or_else(|| default_task_xp(&priority)),
            priority,
            repeat: normalize_repeat(input.repeat.as_deref()),
            completed: false,
            completed_at: None,
            archived: false,
            created_at: now_iso(),
        })
    }

    fn adjust_goal_xp(&self, goal_id: &str, delta: i64) -> Result<(), String> {
        let mut goal = self.require_goal(goal_id)?;
        goal.xp = (goal.xp + delta).max(0);
        goal.level = level_for_xp(goal.xp);
        write_goal(&self.conn, &goal)
    }

    fn next_goal_position(&self) -> Result<i64, String> {
        self.conn
            .query_row("SELECT COALESCE(MAX(position), -1) + 1 FROM goals", [], |row| row.get(0))
            .map_err(|err| err.to_string())
    }
}

fn write_goal(conn: &Connection, goal: &Goal) -> Result<(), String> {
    // Level is derived from XP; recompute on every write so the cached column
    // can never drift from the authoritative value.
    let level = level_for_xp(goal.xp);
    conn.execute(
        r#"
    UPDATE goals SET
      title = ?1,
      color = ?2,
      position = ?3,
      task_ids_json = ?4,
      streak = ?5,
      last_completed_date = ?6,
      level = ?7,
      xp = ?8,
      prestige = ?9,
      paused = ?10,
      archived = ?11,
      last_active_at = ?12
    WHERE id = ?13
    "#,
        params![
            goal.title,
            goal.color,
            goal.position,
            serde_json::to_string(&goal.task_ids).unwrap_or_else(|_| "[]".to_string()),
            goal.streak,
            goal.last_completed_date,
            level,
            goal.xp,
            goal.prestige,
            goal.paused,
            goal.archived,
            goal.last_active_at,
            goal.id
        ],
    )
    .map_err(|err| err.to_string())?;
    Ok(())
}

fn write_task(conn: &Connection, task: &Task) -> Result<(), String> {
    conn.execute(
        r#"
    UPDATE tasks SET
      title = ?1,
      goal_id = ?2,
      due_date = ?3,
      suggested_due_date = ?4,
      tags_json = ?5,
      priority = ?6,
      xp = ?7,
      repeat = ?8,
      completed = ?9,
      completed_at = ?10,
      archived = ?11
    WHERE id = ?12
    "#,
        params![
            task.title,
            task.goal_id,
            task.due_date,
            task.suggested_due_date,
            serde_json::to_string(&task.tags).unwrap_or_else(|_| "[]".to_string()),
            task.priority,
            task.xp,
            task.repeat,
            task.completed,
            task.completed_at,
            task.archived,
            task.id
        ],
    )
    .map_err(|err| err.to_string())?;
    Ok(())
}

fn insert_task(conn: &Connection, task: &Task) -> Result<(), String> {
    conn.execute(
        r#"
    INSERT INTO tasks (
      id, title, goal_id, due_date, suggested_due_date, tags_json, priority,
      xp, repeat, completed, completed_at, archived, created_at
    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
    "#,
        params![
            task.id,
            task.title,
            task.goal_id,
            task.due_date,
            task.suggested_due_date,
            serde_json::to_string(&task.tags).unwrap_or_else(|_| "[]".to_string()),
            task.priority,
            task.xp,
            task.repeat,
            task.completed,
            task.completed_at,
            task.archived,
            task.created_at
        ],
    )
    .map_err(|err| err.to_string())?;
    Ok(())
}

// Rebuilds the goal's ordered task id list from the tasks that point at it.
// Archived tasks drop out of the list but keep their goal_id.
fn refresh_task_ids(conn: &Connection, goal_id: &str) -> Result<(), String> {
    let mut stmt = conn
        .prepare("SELECT id FROM tasks WHERE goal_id = ?1 AND archived = 0 ORDER BY created_at, id")
        .map_err(|err| err.to_string())?;
    let mut rows = stmt.query(params![goal_id]).map_err(|err| err.to_string())?;
    let mut ids: Vec<String> = Vec::new();
    while let Some(row) = rows.next().map_err(|err| err.to_string())? {
        ids.push(row.get(0).map_err(|err| err.to_string())?);
    }
    conn.execute(
        "UPDATE goals SET task_ids_json = ?1 WHERE id = ?2",
        params![serde_json::to_string(&ids).unwrap_or_else(|_| "[]".to_string()), goal_id],
    )
    .map_err(|err| err.to_string())?;
    Ok(())
}

fn touch_goal(conn: &Connection, goal_id: &str) -> Result<(), String> {
    conn.execute(
        "UPDATE goals SET last_active_at = ?1 WHERE id = ?2",
        params![now_iso(), goal_id],
    )
    .map_err(|err| err.to_string())?;
    Ok(())
}

fn goal_from_row(row: &Row) -> Result<Goal, String> {
    let task_ids_json: String = row.get("task_ids_json").map_err(|err| err.to_string())?;
    Ok(Goal {
        id: row.get("id").map_err(|err| err.to_string())?,
        title: row.get("title").map_err(|err| err.to_string())?,
        color: row.get("color").map_err(|err| err.to_string())?,
        position: row.get("position").map_err(|err| err.to_string())?,
        task_ids: serde_json::from_str(&task_ids_json).unwrap_or_default(),
        streak: row.get("streak").map_err(|err| err.to_string())?,
        last_completed_date: row.get("last_completed_date").map_err(|err| err.to_string())?,
        level: row.get("level").map_err(|err| err.to_string())?,
        xp: row.get("xp").map_err(|err| err.to_string())?,
        prestige: row.get("prestige").map_err(|err| err.to_string())?,
        paused: row.get("paused").map_err(|err| err.to_string())?,
        archived: row.get("archived").map_err(|err| err.to_string())?,
        created_at: row.get("created_at").map_err(|err| err.to_string())?,
        last_active_at: row.get("last_active_at").map_err(|err| err.to_string())?,
    })
}

fn task_from_row(row: &Row) -> Result<Task, String> {
    let tags_json: String = row.get("tags_json").map_err(|err| err.to_string())?;
    Ok(Task {
        id: row.get("id").map_err(|err| err.to_string())?,
        title: row.get("title").map_err(|err| err.to_string())?,
        goal_id: row.get("goal_id").map_err(|err| err.to_string())?,
        due_date: row.get("due_date").map_err(|err| err.to_string())?,
        suggested_due_date: row.get("suggested_due_date").map_err(|err| err.to_string())?,
        tags: serde_json::from_str(&tags_json).unwrap_or_default(),
        priority: normalize_priority(&row.get::<_, String>("priority").map_err(|err| err.to_string())?),
        xp: row.get("xp").map_err(|err| err.to_string())?,
        repeat: row.get("repeat").map_err(|err| err.to_string())?,
        completed: row.get("completed").map_err(|err| err.to_string())?,
        completed_at: row.get("completed_at").map_err(|err| err.to_string())?,
        archived: row.get("archived").map_err(|err| err.to_string())?,
        created_at: row.get("created_at").map_err(|err| err.to_string())?,
    })
}

fn normalize_priority(value: &str) -> String {
    let v = value.trim().to_lowercase();
    if v == "high" || v == "low" || v == "medium" {
        v
    } else {
        "medium".to_string()
    }
}

fn normalize_tags(tags: &[String]) -> Vec<String> {
    tags.iter()
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .collect()
}

fn normalize_repeat(value: Option<&str>) -> Option<String> {
    let v = value.unwrap_or("").trim().to_lowercase();
    if v == "daily" || v == "weekly" || v == "monthly" {
        Some(v)
    } else {
        None
    }
}

fn suggest_due_date(priority: &str) -> Option<String> {
    let offset = match priority {
        "high" => 1,
        "low" => 7,
        _ => 3,
    };
    let today = parse_ymd(&today_ymd())?;
    Some((today + chrono::Duration::days(offset)).format("%Y-%m-%d").to_string())
}

fn advance_date(date: &str, repeat: &str) -> Option<String> {
    let parsed = parse_ymd(date)?;
    let next = match repeat {
        "daily" => parsed + chrono::Duration::days(1),
        "weekly" => parsed + chrono::Duration::days(7),
        "monthly" => parsed.checked_add_months(Months::new(1))?,
        _ => return None,
    };
    Some(next.format("%Y-%m-%d").to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open_store() -> AchievoStore {
        AchievoStore::new(":memory:").unwrap()
    }

    fn sample_goal(store: &AchievoStore, title: &str) -> Goal {
        store
            .add_goal(GoalInput {
                title: title.to_string(),
                ..Default::default()
            })
            .unwrap()
    }

    fn sample_task(store: &AchievoStore, goal_id: &str, xp: i64) -> Task {
        store
            .add_task(TaskInput {
                title: "Practice scales".to_string(),
                goal_id: Some(goal_id.to_string()),
                xp: Some(xp),
                ..Default::default()
            })
            .unwrap()
    }

    #[test]
    fn goal_crud_round_trip() {
        let store = open_store();
        let goal = sample_goal(&store, "Learn guitar");
        assert_eq!(goal.level, 1);
        assert_eq!(goal.xp, 0);
        assert!(!goal.color.is_empty());

        let fetched = store.get_goal(&goal.id).unwrap().unwrap();
        assert_eq!(fetched.title, "Learn guitar");

        let updated = store
            .update_goal(&goal.id, GoalUpdate { title: Some("Master guitar".to_string()), ..Default::default() })
            .unwrap();
        assert_eq!(updated.title, "Master guitar");

        let second = sample_goal(&store, "Read more");
        assert_eq!(second.position, goal.position + 1);

        let mut store = store;
        store.delete_goal(&goal.id).unwrap();
        assert!(store.get_goal(&goal.id).unwrap().is_none());
    }

    #[test]
    fn empty_title_is_rejected() {
        let store = open_store();
        let result = store.add_goal(GoalInput { title: "   ".to_string(), ..Default::default() });
        assert!(result.is_err());
    }

    #[test]
    fn adding_task_maintains_goal_task_ids() {
        let store = open_store();
        let goal = sample_goal(&store, "Learn guitar");
        let task = sample_task(&store, &goal.id, 20);

        let goal = store.get_goal(&goal.id).unwrap().unwrap();
        assert_eq!(goal.task_ids, vec![task.id.clone()]);

        store.set_task_archived(&task.id, true).unwrap();
        let goal = store.get_goal(&goal.id).unwrap().unwrap();
        assert!(goal.task_ids.is_empty());

        store.set_task_archived(&task.id, false).unwrap();
        store.delete_task(&task.id).unwrap();
        let goal = store.get_goal(&goal.id).unwrap().unwrap();
        assert!(goal.task_ids.is_empty());
    }

    #[test]
    fn task_with_unknown_goal_is_rejected() {
        let store = open_store();
        let result = store.add_task(TaskInput {
            title: "Orphan".to_string(),
            goal_id: Some("goal_missing".to_string()),
            ..Default::default()
        });
        assert!(result.is_err());
    }

    #[test]
    fn deleting_goal_detaches_tasks() {
        let mut store = open_store();
        let goal = sample_goal(&store, "Learn guitar");
        let task = sample_task(&store, &goal.id, 20);

        store.delete_goal(&goal.id).unwrap();
        let task = store.get_task(&task.id).unwrap().unwrap();
        assert!(task.goal_id.is_none());
    }

    #[test]
    fn completing_task_awards_xp_and_streak() {
        let mut store = open_store();
        let goal = sample_goal(&store, "Learn guitar");
        let task = sample_task(&store, &goal.id, 60);

        let result = store.complete_task(&task.id).unwrap();
        assert!(result.task.completed);
        assert!(result.task.completed_at.is_some());
        assert!(result.leveled_up);

        let goal = result.goal.unwrap();
        assert_eq!(goal.xp, 60);
        assert_eq!(goal.level, 2);
        assert_eq!(goal.streak, 1);
        assert_eq!(goal.last_completed_date, Some(today_ymd()));

        assert!(store.complete_task(&task.id).is_err());
    }

    #[test]
    fn same_day_completions_keep_streak() {
        let mut store = open_store();
        let goal = sample_goal(&store, "Learn guitar");
        let first = sample_task(&store, &goal.id, 10);
        let second = sample_task(&store, &goal.id, 10);

        store.complete_task(&first.id).unwrap();
        let result = store.complete_task(&second.id).unwrap();
        assert_eq!(result.goal.unwrap().streak, 1);
    }

    #[test]
    fn uncompleting_reverses_xp() {
        let mut store = open_store();
        let goal = sample_goal(&store, "Learn guitar");
        let task = sample_task(&store, &goal.id, 60);

        store.complete_task(&task.id).unwrap();
        let result = store.uncomplete_task(&task.id).unwrap();
        assert!(!result.task.completed);
        let goal = result.goal.unwrap();
        assert_eq!(goal.xp, 0);
        assert_eq!(goal.level, 1);

        assert!(store.uncomplete_task(&task.id).is_err());
    }

    #[test]
    fn completing_repeating_task_spawns_next_occurrence() {
        let mut store = open_store();
        let goal = sample_goal(&store, "Learn guitar");
        let task = store
            .add_task(TaskInput {
                title: "Weekly review".to_string(),
                goal_id: Some(goal.id.clone()),
                due_date: Some("2026-03-02".to_string()),
                repeat: Some("weekly".to_string()),
                ..Default::default()
            })
            .unwrap();

        let result = store.complete_task(&task.id).unwrap();
        let next = result.next_occurrence.unwrap();
        assert_eq!(next.due_date.as_deref(), Some("2026-03-09"));
        assert!(!next.completed);
        assert_eq!(next.repeat.as_deref(), Some("weekly"));

        let goal = store.get_goal(&goal.id).unwrap().unwrap();
        assert!(goal.task_ids.contains(&next.id));
    }

    #[test]
    fn advance_date_handles_month_rollover() {
        assert_eq!(advance_date("2026-01-31", "monthly").as_deref(), Some("2026-02-28"));
        assert_eq!(advance_date("2026-03-05", "daily").as_deref(), Some("2026-03-06"));
        assert_eq!(advance_date("garbage", "daily"), None);
    }

    #[test]
    fn prestige_requires_full_max_level() {
        let mut store = open_store();
        let goal = sample_goal(&store, "Learn guitar");

        let rejected = store.prestige_goal(&goal.id).unwrap();
        assert!(!rejected.success);
        assert_eq!(rejected.prestige, 0);
        assert!(rejected.reason.is_some());
        let unchanged = store.get_goal(&goal.id).unwrap().unwrap();
        assert_eq!(unchanged.xp, 0);
        assert_eq!(unchanged.prestige, 0);

        let task = sample_task(&store, &goal.id, 1700);
        store.complete_task(&task.id).unwrap();

        let granted = store.prestige_goal(&goal.id).unwrap();
        assert!(granted.success);
        assert_eq!(granted.prestige, 1);
        let reset = store.get_goal(&goal.id).unwrap().unwrap();
        assert_eq!(reset.xp, 0);
        assert_eq!(reset.level, 1);
        assert_eq!(reset.prestige, 1);

        let again = store.prestige_goal(&goal.id).unwrap();
        assert!(!again.success);
    }

    #[test]
    fn goal_stats_counts_completions() {
        let mut store = open_store();
        let goal = sample_goal(&store, "Learn guitar");
        let done = sample_task(&store, &goal.id, 20);
        sample_task(&store, &goal.id, 20);
        store.complete_task(&done.id).unwrap();

        let stats = store.goal_stats(&goal.id).unwrap();
        assert_eq!(stats.completed_tasks, 1);
        assert_eq!(stats.xp, 20);
    }

    #[test]
    fn list_filters_respect_flags() {
        let mut store = open_store();
        let goal = sample_goal(&store, "Learn guitar");
        let done = sample_task(&store, &goal.id, 20);
        let open_task = store
            .add_task(TaskInput {
                title: "Tune strings".to_string(),
                goal_id: Some(goal.id.clone()),
                tags: Some(vec!["music".to_string()]),
                ..Default::default()
            })
            .unwrap();
        store.complete_task(&done.id).unwrap();

        let open_only = store.list_tasks(ListTasksOptions::default()).unwrap();
        assert_eq!(open_only.len(), 1);
        assert_eq!(open_only[0].id, open_task.id);

        let all = store
            .list_tasks(ListTasksOptions { include_completed: true, ..Default::default() })
            .unwrap();
        assert_eq!(all.len(), 2);

        let tagged = store
            .list_tasks(ListTasksOptions { tag: Some("MUSIC".to_string()), ..Default::default() })
            .unwrap();
        assert_eq!(tagged.len(), 1);

        store.set_goal_archived(&goal.id, true).unwrap();
        assert!(store.list_goals(ListGoalsOptions::default()).unwrap().is_empty());
        let archived_included = store
            .list_goals(ListGoalsOptions { include_archived: true, include_paused: true })
            .unwrap();
        assert_eq!(archived_included.len(), 1);
    }

    #[test]
    fn editing_completed_task_xp_keeps_goal_in_sync() {
        let mut store = open_store();
        let goal = sample_goal(&store, "Learn guitar");
        let task = sample_task(&store, &goal.id, 60);
        store.complete_task(&task.id).unwrap();

        store
            .update_task(&task.id, TaskUpdate { xp: Some(10), ..Default::default() })
            .unwrap();
        let adjusted = store.get_goal(&goal.id).unwrap().unwrap();
        assert_eq!(adjusted.xp, 10);
        assert_eq!(adjusted.level, 1);

        let result = store.uncomplete_task(&task.id).unwrap();
        let goal = result.goal.unwrap();
        assert_eq!(goal.xp, 0);
        assert_eq!(goal.level, 1);
    }

    #[test]
    fn reassigning_completed_task_moves_its_xp() {
        let mut store = open_store();
        let first = sample_goal(&store, "Learn guitar");
        let second = sample_goal(&store, "Read more");
        let task = sample_task(&store, &first.id, 60);
        store.complete_task(&task.id).unwrap();

        store
            .update_task(&task.id, TaskUpdate { goal_id: Some(second.id.clone()), ..Default::default() })
            .unwrap();
        assert_eq!(store.get_goal(&first.id).unwrap().unwrap().xp, 0);
        assert_eq!(store.get_goal(&second.id).unwrap().unwrap().xp, 60);

        let result = store.uncomplete_task(&task.id).unwrap();
        assert_eq!(result.goal.unwrap().xp, 0);
    }

    #[test]
    fn tag_filter_sees_past_the_limit() {
        let store = open_store();
        let goal = sample_goal(&store, "Learn guitar");
        sample_task(&store, &goal.id, 10);
        sample_task(&store, &goal.id, 10);
        store
            .add_task(TaskInput {
                title: "Restring".to_string(),
                goal_id: Some(goal.id.clone()),
                tags: Some(vec!["gear".to_string()]),
                ..Default::default()
            })
            .unwrap();

        let tagged = store
            .list_tasks(ListTasksOptions {
                tag: Some("gear".to_string()),
                limit: Some(2),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(tagged.len(), 1);
        assert_eq!(tagged[0].title, "Restring");
    }

    #[test]
    fn paused_goals_are_listed_by_default() {
        let store = open_store();
        let goal = sample_goal(&store, "Learn guitar");
        store.set_goal_paused(&goal.id, true).unwrap();

        let listed = store.list_goals(ListGoalsOptions::default()).unwrap();
        assert_eq!(listed.len(), 1);

        let active_only = store
            .list_goals(ListGoalsOptions { include_paused: false, ..Default::default() })
            .unwrap();
        assert!(active_only.is_empty());
    }

    #[test]
    fn reassigning_task_moves_it_between_goals() {
        let store = open_store();
        let first = sample_goal(&store, "Learn guitar");
        let second = sample_goal(&store, "Read more");
        let task = sample_task(&store, &first.id, 20);

        store
            .update_task(&task.id, TaskUpdate { goal_id: Some(second.id.clone()), ..Default::default() })
            .unwrap();
        let first = store.get_goal(&first.id).unwrap().unwrap();
        let second = store.get_goal(&second.id).unwrap().unwrap();
        assert!(first.task_ids.is_empty());
        assert_eq!(second.task_ids, vec![task.id.clone()]);

        store
            .update_task(&task.id, TaskUpdate { goal_id: Some("  ".to_string()), ..Default::default() })
            .unwrap();
        let detached = store.get_task(&task.id).unwrap().unwrap();
        assert!(detached.goal_id.is_none());
    }

    #[test]
    fn suggested_due_date_follows_priority() {
        let store = open_store();
        let task = store
            .add_task(TaskInput {
                title: "Urgent thing".to_string(),
                priority: Some("high".to_string()),
                ..Default::default()
            })
            .unwrap();
        let expected = (parse_ymd(&today_ymd()).unwrap() + chrono::Duration::days(1))
            .format("%Y-%m-%d")
            .to_string();
        assert_eq!(task.suggested_due_date.as_deref(), Some(expected.as_str()));
        assert_eq!(task.xp, 30);
    }
}
