//! Task CRUD and cursor-paginated listing.

use super::{now_ms, Database};
use crate::error::ApiError;
use crate::types::{
    NewTask, Task, TaskFilters, TaskPage, TaskPatch, TaskStatus, PRIORITY_DEFAULT,
};
use crate::validate;
use crate::validate::TaskRef;
use anyhow::Result;
use rusqlite::{params, Connection, Row};
use std::collections::HashMap;
use uuid::Uuid;

pub fn parse_task_row(row: &Row) -> rusqlite::Result<Task> {
    let status: String = row.get("status")?;

    Ok(Task {
        id: row.get("id")?,
        user_id: row.get("user_id")?,
        title: row.get("title")?,
        description: row.get("description")?,
        due_date: row.get("due_date")?,
        priority: row.get("priority")?,
        estimated_minutes: row.get("estimated_minutes")?,
        energy_level: row.get("energy_level")?,
        category: row.get("category")?,
        status: TaskStatus::from_str(&status).unwrap_or(TaskStatus::Pending),
        completed_at: row.get("completed_at")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

/// Internal helper to get an owner-scoped task using an existing connection.
/// A task owned by someone else resolves to `None`, same as a missing row.
pub(crate) fn get_task_internal(
    conn: &Connection,
    owner: &str,
    task_id: &str,
) -> Result<Option<Task>> {
    let mut stmt = conn.prepare("SELECT * FROM tasks WHERE id = ?1 AND user_id = ?2")?;

    let result = stmt.query_row(params![task_id, owner], parse_task_row);

    match result {
        Ok(task) => Ok(Some(task)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Load owner/status pairs for a set of task IDs, keyed by ID.
/// Deliberately not owner-scoped: the ordering validator decides how
/// foreign tasks are reported.
pub(crate) fn load_task_refs(
    conn: &Connection,
    ids: &[String],
) -> Result<HashMap<String, TaskRef>> {
    if ids.is_empty() {
        return Ok(HashMap::new());
    }

    let placeholders: Vec<String> = ids.iter().map(|_| "?".to_string()).collect();
    let sql = format!(
        "SELECT id, user_id, status FROM tasks WHERE id IN ({})",
        placeholders.join(", ")
    );

    let params_refs: Vec<&dyn rusqlite::ToSql> =
        ids.iter().map(|id| id as &dyn rusqlite::ToSql).collect();

    let mut stmt = conn.prepare(&sql)?;
    let mut refs = HashMap::new();
    let rows = stmt.query_map(params_refs.as_slice(), |row| {
        let id: String = row.get(0)?;
        let user_id: String = row.get(1)?;
        let status: String = row.get(2)?;
        Ok((id, user_id, status))
    })?;

    for row in rows {
        let (id, user_id, status) = row?;
        refs.insert(
            id,
            TaskRef {
                user_id,
                status: TaskStatus::from_str(&status).unwrap_or(TaskStatus::Pending),
            },
        );
    }

    Ok(refs)
}

impl Database {
    /// Create a new task owned by `owner`.
    pub fn create_task(&self, owner: &str, input: NewTask) -> Result<Task> {
        validate::validate_title(&input.title)?;
        let priority = input.priority.unwrap_or(PRIORITY_DEFAULT);
        validate::validate_priority(priority)?;
        if let Some(minutes) = input.estimated_minutes {
            validate::validate_estimated_minutes(minutes)?;
        }
        if let Some(level) = input.energy_level {
            validate::validate_energy_level(level)?;
        }

        let task_id = Uuid::now_v7().to_string();
        let now = now_ms();

        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO tasks (
                    id, user_id, title, description, due_date, priority,
                    estimated_minutes, energy_level, category, status,
                    created_at, updated_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
                params![
                    &task_id,
                    owner,
                    &input.title,
                    &input.description,
                    input.due_date,
                    priority,
                    input.estimated_minutes,
                    input.energy_level,
                    &input.category,
                    TaskStatus::Pending.as_str(),
                    now,
                    now,
                ],
            )?;

            tracing::debug!(task_id = %task_id, owner, "task created");

            Ok(Task {
                id: task_id,
                user_id: owner.to_string(),
                title: input.title,
                description: input.description,
                due_date: input.due_date,
                priority,
                estimated_minutes: input.estimated_minutes,
                energy_level: input.energy_level,
                category: input.category,
                status: TaskStatus::Pending,
                completed_at: None,
                created_at: now,
                updated_at: now,
            })
        })
    }

    /// Get a task by ID, scoped to its owner.
    pub fn get_task(&self, owner: &str, task_id: &str) -> Result<Option<Task>> {
        self.with_conn(|conn| get_task_internal(conn, owner, task_id))
    }

    /// Apply a partial update. Omitted fields keep their current value.
    pub fn update_task(&self, owner: &str, task_id: &str, patch: TaskPatch) -> Result<Task> {
        let now = now_ms();

        if let Some(ref title) = patch.title {
            validate::validate_title(title)?;
        }
        if let Some(priority) = patch.priority {
            validate::validate_priority(priority)?;
        }
        if let Some(Some(minutes)) = patch.estimated_minutes {
            validate::validate_estimated_minutes(minutes)?;
        }
        if let Some(Some(level)) = patch.energy_level {
            validate::validate_energy_level(level)?;
        }

        self.with_conn(|conn| {
            let task = get_task_internal(conn, owner, task_id)?
                .ok_or_else(|| ApiError::task_not_found(task_id))?;

            let new_title = patch.title.unwrap_or(task.title.clone());
            let new_description = patch.description.unwrap_or(task.description.clone());
            let new_due_date = patch.due_date.unwrap_or(task.due_date);
            let new_priority = patch.priority.unwrap_or(task.priority);
            let new_estimated = patch.estimated_minutes.unwrap_or(task.estimated_minutes);
            let new_energy = patch.energy_level.unwrap_or(task.energy_level);
            let new_category = patch.category.unwrap_or(task.category.clone());
            let new_status = patch.status.unwrap_or(task.status);

            // completed_at tracks the status transition
            let completed_at = if new_status == TaskStatus::Completed {
                task.completed_at.or(Some(now))
            } else {
                task.completed_at
            };

            conn.execute(
                "UPDATE tasks SET
                    title = ?1, description = ?2, due_date = ?3, priority = ?4,
                    estimated_minutes = ?5, energy_level = ?6, category = ?7,
                    status = ?8, completed_at = ?9, updated_at = ?10
                WHERE id = ?11",
                params![
                    new_title,
                    new_description,
                    new_due_date,
                    new_priority,
                    new_estimated,
                    new_energy,
                    new_category,
                    new_status.as_str(),
                    completed_at,
                    now,
                    task_id,
                ],
            )?;

            Ok(Task {
                title: new_title,
                description: new_description,
                due_date: new_due_date,
                priority: new_priority,
                estimated_minutes: new_estimated,
                energy_level: new_energy,
                category: new_category,
                status: new_status,
                completed_at,
                updated_at: now,
                ..task
            })
        })
    }

    /// Soft-delete a task by moving it to the cancelled status.
    /// The row is retained; existing plan orders are not rewritten.
    pub fn cancel_task(&self, owner: &str, task_id: &str) -> Result<Task> {
        let now = now_ms();

        self.with_conn(|conn| {
            let task = get_task_internal(conn, owner, task_id)?
                .ok_or_else(|| ApiError::task_not_found(task_id))?;

            conn.execute(
                "UPDATE tasks SET status = ?1, updated_at = ?2 WHERE id = ?3",
                params![TaskStatus::Cancelled.as_str(), now, task_id],
            )?;

            Ok(Task {
                status: TaskStatus::Cancelled,
                updated_at: now,
                ..task
            })
        })
    }

    /// Mark a task completed. Idempotent: completing an already-completed
    /// task keeps its original completed_at.
    pub fn complete_task(
        &self,
        owner: &str,
        task_id: &str,
        completed_at: Option<i64>,
    ) -> Result<Task> {
        let now = now_ms();

        self.with_conn(|conn| {
            let task = get_task_internal(conn, owner, task_id)?
                .ok_or_else(|| ApiError::task_not_found(task_id))?;

            let completed_at = task.completed_at.or(completed_at).or(Some(now));

            conn.execute(
                "UPDATE tasks SET status = ?1, completed_at = ?2, updated_at = ?3 WHERE id = ?4",
                params![TaskStatus::Completed.as_str(), completed_at, now, task_id],
            )?;

            Ok(Task {
                status: TaskStatus::Completed,
                completed_at,
                updated_at: now,
                ..task
            })
        })
    }

    /// List tasks with conjunctive filters and cursor pagination.
    ///
    /// Ordering is `(created_at DESC, id DESC)`; the composite key breaks
    /// same-millisecond ties so the cursor is total-ordered and stable. The
    /// cursor is the ID of the last row of the previous page and must
    /// resolve to a task owned by the caller.
    pub fn list_tasks(
        &self,
        owner: &str,
        filters: &TaskFilters,
        cursor: Option<&str>,
        limit: i64,
    ) -> Result<TaskPage> {
        validate::validate_limit(limit)?;

        self.with_conn(|conn| {
            let mut sql = String::from("SELECT * FROM tasks t WHERE t.user_id = ?");
            let mut params_vec: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();
            params_vec.push(Box::new(owner.to_string()));

            if let Some(p) = filters.priority {
                sql.push_str(" AND t.priority = ?");
                params_vec.push(Box::new(p));
            }

            if let Some(s) = filters.status {
                sql.push_str(" AND t.status = ?");
                params_vec.push(Box::new(s.as_str().to_string()));
            } else if !filters.include_cancelled {
                // Cancelled rows are hidden unless asked for explicitly,
                // either via a status filter or the include flag.
                sql.push_str(" AND t.status != ?");
                params_vec.push(Box::new(TaskStatus::Cancelled.as_str().to_string()));
            }

            if let Some(ref c) = filters.category {
                sql.push_str(" AND t.category = ?");
                params_vec.push(Box::new(c.clone()));
            }

            if let Some(ref term) = filters.search {
                sql.push_str(" AND (t.title LIKE ? OR t.description LIKE ?)");
                let pattern = format!("%{}%", term);
                params_vec.push(Box::new(pattern.clone()));
                params_vec.push(Box::new(pattern));
            }

            if let Some(after) = filters.due_after {
                sql.push_str(" AND t.due_date >= ?");
                params_vec.push(Box::new(after));
            }

            if let Some(before) = filters.due_before {
                sql.push_str(" AND t.due_date <= ?");
                params_vec.push(Box::new(before));
            }

            if let Some(cursor_id) = cursor {
                // Resolve the cursor to its (created_at, id) key. An
                // unknown or foreign cursor is an error, never a silently
                // wrong page.
                let key: Option<(i64, String)> = conn
                    .query_row(
                        "SELECT created_at, id FROM tasks WHERE id = ?1 AND user_id = ?2",
                        params![cursor_id, owner],
                        |row| Ok((row.get(0)?, row.get(1)?)),
                    )
                    .map(Some)
                    .or_else(|e| match e {
                        rusqlite::Error::QueryReturnedNoRows => Ok(None),
                        other => Err(other),
                    })?;

                let (cursor_created, cursor_key_id) =
                    key.ok_or_else(|| ApiError::cursor_invalid(cursor_id))?;

                // Strictly less than the cursor key in (created_at, id)
                // descending order.
                sql.push_str(" AND (t.created_at < ? OR (t.created_at = ? AND t.id < ?))");
                params_vec.push(Box::new(cursor_created));
                params_vec.push(Box::new(cursor_created));
                params_vec.push(Box::new(cursor_key_id));
            }

            sql.push_str(" ORDER BY t.created_at DESC, t.id DESC LIMIT ?");
            // Overshoot by one row to learn whether another page exists.
            params_vec.push(Box::new(limit + 1));

            let params_refs: Vec<&dyn rusqlite::ToSql> =
                params_vec.iter().map(|b| b.as_ref()).collect();

            let mut stmt = conn.prepare(&sql)?;
            let mut tasks: Vec<Task> = stmt
                .query_map(params_refs.as_slice(), parse_task_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;

            let has_more = tasks.len() as i64 > limit;
            if has_more {
                tasks.truncate(limit as usize);
            }

            let next_cursor = if has_more {
                tasks.last().map(|t| t.id.clone())
            } else {
                None
            };

            Ok(TaskPage {
                tasks,
                has_more,
                next_cursor,
            })
        })
    }
}
