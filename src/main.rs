mod badges;
mod gamification;
mod inactivity;
mod mcp;
mod store;
mod types;
mod utils;

use crate::gamification::level_info;
use crate::inactivity::DEFAULT_INACTIVE_DAYS;
use crate::mcp::McpServer;
use crate::store::AchievoStore;
use crate::types::{GoalInput, GoalUpdate, ListGoalsOptions, ListTasksOptions, TaskInput, TaskUpdate};
use crate::utils::{ensure_dir, normalize_name, parse_args, resolve_state_dir};
use chrono::Utc;
use serde_json::{json, Value};
use std::cell::RefCell;
use std::env;
use std::rc::Rc;

fn main() {
    let argv: Vec<String> = env::args().skip(1).collect();
    let args = parse_args(&argv);
    if args.flags.contains("help") || args.flags.contains("h") {
        print_help();
        return;
    }

    let server_name = normalize_name(
        args.values
            .get("name")
            .map(String::as_str)
            .unwrap_or("achievo"),
    );
    let inactive_days = args
        .values
        .get("inactive-days")
        .and_then(|v| v.parse::<i64>().ok())
        .unwrap_or(DEFAULT_INACTIVE_DAYS);

    let state_dir = resolve_state_dir(&server_name);
    ensure_dir(&state_dir).expect("failed to create state directory");

    let db_path = args.values.get("db").cloned().unwrap_or_else(|| {
        state_dir
            .join(format!("{server_name}.db.sqlite"))
            .to_string_lossy()
            .to_string()
    });

    let store = AchievoStore::new(&db_path).expect("failed to open achievo db");
    let store = Rc::new(RefCell::new(store));

    let mut server = McpServer::new(server_name.clone(), "0.1.0");

    {
        let store = store.clone();
        server.register_tool(
            "add_goal",
            "Create a goal to track with streaks, XP and levels.",
            json!({
                "type": "object",
                "properties": {
                    "title": { "type": "string" },
                    "color": { "type": "string" },
                    "position": { "type": "integer" }
                },
                "required": ["title"]
            }),
            Box::new(move |args| {
                let input = GoalInput {
                    title: require_str(&args, "title")?,
                    color: opt_str(&args, "color"),
                    position: opt_i64(&args, "position"),
                };
                let goal = store.borrow().add_goal(input)?;
                Ok(text_result(json!({ "goal": goal })))
            }),
        );
    }

    {
        let store = store.clone();
        server.register_tool(
            "list_goals",
            "List goals ordered by display position. Paused goals are included unless include_paused is false; archived goals are hidden unless include_archived is true.",
            json!({
                "type": "object",
                "properties": {
                    "include_archived": { "type": "boolean" },
                    "include_paused": { "type": "boolean" }
                }
            }),
            Box::new(move |args| {
                let options = ListGoalsOptions {
                    include_archived: opt_bool(&args, "include_archived").unwrap_or(false),
                    include_paused: opt_bool(&args, "include_paused").unwrap_or(true),
                };
                let goals = store.borrow().list_goals(options)?;
                Ok(text_result(json!({ "count": goals.len(), "goals": goals })))
            }),
        );
    }

    {
        let store = store.clone();
        server.register_tool(
            "update_goal",
            "Update a goal's title, color or display position.",
            json!({
                "type": "object",
                "properties": {
                    "id": { "type": "string" },
                    "title": { "type": "string" },
                    "color": { "type": "string" },
                    "position": { "type": "integer" }
                },
                "required": ["id"]
            }),
            Box::new(move |args| {
                let id = require_str(&args, "id")?;
                let patch = GoalUpdate {
                    title: opt_str(&args, "title"),
                    color: opt_str(&args, "color"),
                    position: opt_i64(&args, "position"),
                };
                let goal = store.borrow().update_goal(&id, patch)?;
                Ok(text_result(json!({ "goal": goal })))
            }),
        );
    }

    {
        let store = store.clone();
        server.register_tool(
            "delete_goal",
            "Delete a goal permanently; its tasks are detached, not deleted.",
            json!({
                "type": "object",
                "properties": { "id": { "type": "string" } },
                "required": ["id"]
            }),
            Box::new(move |args| {
                let id = require_str(&args, "id")?;
                store.borrow_mut().delete_goal(&id)?;
                Ok(text_result(json!({ "deleted": id })))
            }),
        );
    }

    {
        let store = store.clone();
        server.register_tool(
            "archive_goal",
            "Soft-delete a goal by archiving it.",
            json!({
                "type": "object",
                "properties": { "id": { "type": "string" } },
                "required": ["id"]
            }),
            Box::new(move |args| {
                let id = require_str(&args, "id")?;
                let goal = store.borrow().set_goal_archived(&id, true)?;
                Ok(text_result(json!({ "goal": goal })))
            }),
        );
    }

    {
        let store = store.clone();
        server.register_tool(
            "unarchive_goal",
            "Restore an archived goal.",
            json!({
                "type": "object",
                "properties": { "id": { "type": "string" } },
                "required": ["id"]
            }),
            Box::new(move |args| {
                let id = require_str(&args, "id")?;
                let goal = store.borrow().set_goal_archived(&id, false)?;
                Ok(text_result(json!({ "goal": goal })))
            }),
        );
    }

    {
        let store = store.clone();
        server.register_tool(
            "pause_goal",
            "Pause a goal so it stops appearing in inactivity nudges.",
            json!({
                "type": "object",
                "properties": { "id": { "type": "string" } },
                "required": ["id"]
            }),
            Box::new(move |args| {
                let id = require_str(&args, "id")?;
                let goal = store.borrow().set_goal_paused(&id, true)?;
                Ok(text_result(json!({ "goal": goal })))
            }),
        );
    }

    {
        let store = store.clone();
        server.register_tool(
            "resume_goal",
            "Resume a paused goal.",
            json!({
                "type": "object",
                "properties": { "id": { "type": "string" } },
                "required": ["id"]
            }),
            Box::new(move |args| {
                let id = require_str(&args, "id")?;
                let goal = store.borrow().set_goal_paused(&id, false)?;
                Ok(text_result(json!({ "goal": goal })))
            }),
        );
    }

    {
        let store = store.clone();
        server.register_tool(
            "prestige_goal",
            "Reset a maxed-out goal's level and XP in exchange for a prestige star.",
            json!({
                "type": "object",
                "properties": { "id": { "type": "string" } },
                "required": ["id"]
            }),
            Box::new(move |args| {
                let id = require_str(&args, "id")?;
                let result = store.borrow().prestige_goal(&id)?;
                Ok(text_result(json!(result)))
            }),
        );
    }

    {
        let store = store.clone();
        server.register_tool(
            "goal_progress",
            "Show a goal's level, XP progress and badge status.",
            json!({
                "type": "object",
                "properties": { "id": { "type": "string" } },
                "required": ["id"]
            }),
            Box::new(move |args| {
                let id = require_str(&args, "id")?;
                let store = store.borrow();
                let goal = store.require_goal(&id)?;
                let stats = store.goal_stats(&id)?;
                let progress = level_info(stats.xp);
                let badges = badges::evaluate(&stats);
                Ok(text_result(json!({
                    "goal": goal,
                    "level": progress,
                    "streak": stats.streak,
                    "prestige": stats.prestige,
                    "completed_tasks": stats.completed_tasks,
                    "badges": badges
                })))
            }),
        );
    }

    {
        let store = store.clone();
        server.register_tool(
            "inactive_goals",
            "List goals with no activity past the inactivity threshold.",
            json!({
                "type": "object",
                "properties": {
                    "threshold_days": { "type": "integer", "minimum": 0 }
                }
            }),
            Box::new(move |args| {
                let threshold = opt_i64(&args, "threshold_days").unwrap_or(inactive_days);
                let goals = store.borrow().list_goals(ListGoalsOptions {
                    include_archived: false,
                    include_paused: true,
                })?;
                let flagged = inactivity::inactive_goals(&goals, Utc::now(), threshold);
                Ok(text_result(json!({
                    "threshold_days": threshold,
                    "count": flagged.len(),
                    "goals": flagged
                })))
            }),
        );
    }

    {
        let store = store.clone();
        server.register_tool(
            "revive_goal",
            "Mark an inactive goal as active again.",
            json!({
                "type": "object",
                "properties": { "id": { "type": "string" } },
                "required": ["id"]
            }),
            Box::new(move |args| {
                let id = require_str(&args, "id")?;
                let goal = store.borrow().revive_goal(&id)?;
                Ok(text_result(json!({ "goal": goal })))
            }),
        );
    }

    {
        let store = store.clone();
        server.register_tool(
            "add_task",
            "Create a task, optionally attached to a goal.",
            json!({
                "type": "object",
                "properties": {
                    "title": { "type": "string" },
                    "goalId": { "type": "string" },
                    "dueDate": { "type": "string", "description": "YYYY-MM-DD" },
                    "tags": { "type": "array", "items": { "type": "string" } },
                    "priority": { "type": "string", "enum": ["high","medium","low"] },
                    "xp": { "type": "integer", "minimum": 0 },
                    "repeat": { "type": "string", "enum": ["daily","weekly","monthly"] }
                },
                "required": ["title"]
            }),
            Box::new(move |args| {
                let input = TaskInput {
                    title: require_str(&args, "title")?,
                    goal_id: opt_str(&args, "goalId"),
                    due_date: opt_str(&args, "dueDate"),
                    tags: opt_str_array(&args, "tags"),
                    priority: opt_str(&args, "priority"),
                    xp: opt_i64(&args, "xp"),
                    repeat: opt_str(&args, "repeat"),
                };
                let task = store.borrow().add_task(input)?;
                Ok(text_result(json!({ "task": task })))
            }),
        );
    }

    {
        let store = store.clone();
        server.register_tool(
            "list_tasks",
            "List tasks with optional filters.",
            json!({
                "type": "object",
                "properties": {
                    "goalId": { "type": "string" },
                    "tag": { "type": "string" },
                    "include_completed": { "type": "boolean" },
                    "include_archived": { "type": "boolean" },
                    "limit": { "type": "integer", "minimum": 1, "maximum": 200 }
                }
            }),
            Box::new(move |args| {
                let options = ListTasksOptions {
                    goal_id: opt_str(&args, "goalId"),
                    tag: opt_str(&args, "tag"),
                    include_completed: opt_bool(&args, "include_completed").unwrap_or(false),
                    include_archived: opt_bool(&args, "include_archived").unwrap_or(false),
                    limit: opt_i64(&args, "limit"),
                };
                let tasks = store.borrow().list_tasks(options)?;
                Ok(text_result(json!({ "count": tasks.len(), "tasks": tasks })))
            }),
        );
    }

    {
        let store = store.clone();
        server.register_tool(
            "update_task",
            "Update an existing task. Pass an empty goalId to detach it.",
            json!({
                "type": "object",
                "properties": {
                    "id": { "type": "string" },
                    "title": { "type": "string" },
                    "goalId": { "type": "string" },
                    "dueDate": { "type": "string" },
                    "tags": { "type": "array", "items": { "type": "string" } },
                    "priority": { "type": "string", "enum": ["high","medium","low"] },
                    "xp": { "type": "integer", "minimum": 0 },
                    "repeat": { "type": "string", "enum": ["daily","weekly","monthly"] }
                },
                "required": ["id"]
            }),
            Box::new(move |args| {
                let id = require_str(&args, "id")?;
                let patch = TaskUpdate {
                    title: opt_str(&args, "title"),
                    goal_id: raw_str(&args, "goalId"),
                    due_date: raw_str(&args, "dueDate"),
                    tags: opt_str_array(&args, "tags"),
                    priority: opt_str(&args, "priority"),
                    xp: opt_i64(&args, "xp"),
                    repeat: opt_str(&args, "repeat"),
                };
                let task = store.borrow().update_task(&id, patch)?;
                Ok(text_result(json!({ "task": task })))
            }),
        );
    }

    {
        let store = store.clone();
        server.register_tool(
            "complete_task",
            "Complete a task, awarding its XP to the owning goal.",
            json!({
                "type": "object",
                "properties": { "id": { "type": "string" } },
                "required": ["id"]
            }),
            Box::new(move |args| {
                let id = require_str(&args, "id")?;
                let result = store.borrow_mut().complete_task(&id)?;
                Ok(text_result(json!(result)))
            }),
        );
    }

    {
        let store = store.clone();
        server.register_tool(
            "uncomplete_task",
            "Reopen a completed task and take back its XP.",
            json!({
                "type": "object",
                "properties": { "id": { "type": "string" } },
                "required": ["id"]
            }),
            Box::new(move |args| {
                let id = require_str(&args, "id")?;
                let result = store.borrow().uncomplete_task(&id)?;
                Ok(text_result(json!(result)))
            }),
        );
    }

    {
        let store = store.clone();
        server.register_tool(
            "delete_task",
            "Delete a task permanently.",
            json!({
                "type": "object",
                "properties": { "id": { "type": "string" } },
                "required": ["id"]
            }),
            Box::new(move |args| {
                let id = require_str(&args, "id")?;
                store.borrow().delete_task(&id)?;
                Ok(text_result(json!({ "deleted": id })))
            }),
        );
    }

    {
        let store = store.clone();
        server.register_tool(
            "archive_task",
            "Soft-delete a task by archiving it.",
            json!({
                "type": "object",
                "properties": { "id": { "type": "string" } },
                "required": ["id"]
            }),
            Box::new(move |args| {
                let id = require_str(&args, "id")?;
                let task = store.borrow().set_task_archived(&id, true)?;
                Ok(text_result(json!({ "task": task })))
            }),
        );
    }

    {
        let store = store.clone();
        server.register_tool(
            "unarchive_task",
            "Restore an archived task.",
            json!({
                "type": "object",
                "properties": { "id": { "type": "string" } },
                "required": ["id"]
            }),
            Box::new(move |args| {
                let id = require_str(&args, "id")?;
                let task = store.borrow().set_task_archived(&id, false)?;
                Ok(text_result(json!({ "task": task })))
            }),
        );
    }

    if let Err(err) = server.run_stdio() {
        eprintln!("[{server_name}] Achievo MCP server crashed: {err}");
        std::process::exit(1);
    }
}

fn require_str(args: &Value, key: &str) -> Result<String, String> {
    args.get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
        .ok_or_else(|| format!("{key} is required"))
}

fn opt_str(args: &Value, key: &str) -> Option<String> {
    args.get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

// Keeps empty strings, which patch semantics use to clear a field.
fn raw_str(args: &Value, key: &str) -> Option<String> {
    args.get(key).and_then(|v| v.as_str()).map(|s| s.to_string())
}

fn opt_i64(args: &Value, key: &str) -> Option<i64> {
    args.get(key).and_then(|v| v.as_i64())
}

fn opt_bool(args: &Value, key: &str) -> Option<bool> {
    args.get(key).and_then(|v| v.as_bool())
}

fn opt_str_array(args: &Value, key: &str) -> Option<Vec<String>> {
    args.get(key).and_then(|v| v.as_array()).map(|arr| {
        arr.iter()
            .filter_map(|v| v.as_str().map(|s| s.to_string()))
            .collect()
    })
}

fn text_result(data: Value) -> Value {
    let text = if data.is_string() {
        data.as_str().unwrap_or("").to_string()
    } else {
        serde_json::to_string_pretty(&data).unwrap_or_else(|_| "{}".to_string())
    };
    json!({
        "content": [
            { "type": "text", "text": text }
        ]
    })
}

fn print_help() {
    println!(
        "Usage: achievo-mcp-server-rs [--name <id>] [--db <path>] [--inactive-days <n>]\n\nOptions:\n  --name <id>          MCP server name (default achievo)\n  --db <path>          SQLite file path\n  --inactive-days <n>  Days without activity before a goal is flagged (default 10)\n  --help               Show help"
    );
}
