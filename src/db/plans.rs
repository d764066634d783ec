//! Daily plan storage and completion reconciliation.
//!
//! Plans are keyed by (owner, plan_date) with exactly one row per day. The
//! task order is a weak reference list: validated when written, never
//! rewritten by task lifecycle changes.

use super::tasks::{get_task_internal, load_task_refs};
use super::{now_ms, today_utc, Database};
use crate::error::ApiError;
use crate::types::{DailyPlan, ReflectionStats, TaskCompletion, TaskStatus};
use crate::validate;
use anyhow::Result;
use chrono::{Duration, NaiveDate};
use rusqlite::{params, Connection, Row};
use std::collections::HashMap;
use uuid::Uuid;

/// How far into the future a plan may be created, in days.
const PLAN_HORIZON_DAYS: i64 = 7;

fn parse_plan_row(row: &Row) -> rusqlite::Result<DailyPlan> {
    let plan_date: String = row.get("plan_date")?;
    let task_order_json: String = row.get("task_order")?;

    let plan_date = NaiveDate::parse_from_str(&plan_date, "%Y-%m-%d").map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e))
    })?;

    Ok(DailyPlan {
        id: row.get("id")?,
        user_id: row.get("user_id")?,
        plan_date,
        task_order: serde_json::from_str(&task_order_json).unwrap_or_default(),
        notes: row.get("notes")?,
        mood: row.get("mood")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

fn parse_completion_row(row: &Row) -> rusqlite::Result<TaskCompletion> {
    Ok(TaskCompletion {
        id: row.get("id")?,
        task_id: row.get("task_id")?,
        daily_plan_id: row.get("daily_plan_id")?,
        planned_position: row.get("planned_position")?,
        actual_completed: row.get("actual_completed")?,
        actual_minutes: row.get("actual_minutes")?,
        completed_at: row.get("completed_at")?,
        skipped_reason: row.get("skipped_reason")?,
    })
}

fn get_plan_internal(
    conn: &Connection,
    owner: &str,
    date: NaiveDate,
) -> Result<Option<DailyPlan>> {
    let mut stmt =
        conn.prepare("SELECT * FROM daily_plans WHERE user_id = ?1 AND plan_date = ?2")?;

    let result = stmt.query_row(params![owner, date.to_string()], parse_plan_row);

    match result {
        Ok(plan) => Ok(Some(plan)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Validate a supplied task order against the tasks table.
fn check_order(conn: &Connection, owner: &str, order: &[String]) -> Result<()> {
    let refs = load_task_refs(conn, order)?;
    validate::validate_task_order(owner, order, &refs)?;
    Ok(())
}

/// Sum of estimated minutes across the tasks in the order, if any carry one.
fn planned_minutes(conn: &Connection, order: &[String]) -> Result<Option<i64>> {
    if order.is_empty() {
        return Ok(None);
    }

    let placeholders: Vec<String> = order.iter().map(|_| "?".to_string()).collect();
    let sql = format!(
        "SELECT SUM(estimated_minutes), COUNT(estimated_minutes)
         FROM tasks WHERE id IN ({})",
        placeholders.join(", ")
    );
    let params_refs: Vec<&dyn rusqlite::ToSql> =
        order.iter().map(|id| id as &dyn rusqlite::ToSql).collect();

    let (sum, count): (Option<i64>, i64) =
        conn.query_row(&sql, params_refs.as_slice(), |row| {
            Ok((row.get(0)?, row.get(1)?))
        })?;

    Ok(if count > 0 { sum } else { None })
}

impl Database {
    /// Create or update the plan for (owner, date).
    ///
    /// Partial-update semantics: each of order/notes/mood is applied only
    /// when supplied; a supplied order replaces the existing one wholesale
    /// and must pass validation. Creation more than 7 days ahead fails.
    pub fn upsert_plan(
        &self,
        owner: &str,
        date: NaiveDate,
        order: Option<Vec<String>>,
        notes: Option<String>,
        mood: Option<i32>,
    ) -> Result<DailyPlan> {
        if date > today_utc() + Duration::days(PLAN_HORIZON_DAYS) {
            return Err(ApiError::date_too_far().into());
        }
        if let Some(m) = mood {
            validate::validate_mood(m)?;
        }

        let now = now_ms();

        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            if let Some(ref order) = order {
                check_order(&tx, owner, order)?;
            }

            let plan = match get_plan_internal(&tx, owner, date)? {
                Some(existing) => {
                    let new_order = order.unwrap_or(existing.task_order.clone());
                    let new_notes = notes.or(existing.notes.clone());
                    let new_mood = mood.or(existing.mood);

                    tx.execute(
                        "UPDATE daily_plans SET task_order = ?1, notes = ?2, mood = ?3,
                         updated_at = ?4 WHERE id = ?5",
                        params![
                            serde_json::to_string(&new_order)?,
                            new_notes,
                            new_mood,
                            now,
                            existing.id,
                        ],
                    )?;

                    DailyPlan {
                        task_order: new_order,
                        notes: new_notes,
                        mood: new_mood,
                        updated_at: now,
                        ..existing
                    }
                }
                None => {
                    let plan_id = Uuid::now_v7().to_string();
                    let task_order = order.unwrap_or_default();

                    tx.execute(
                        "INSERT INTO daily_plans (
                            id, user_id, plan_date, task_order, notes, mood,
                            created_at, updated_at
                        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                        params![
                            &plan_id,
                            owner,
                            date.to_string(),
                            serde_json::to_string(&task_order)?,
                            notes,
                            mood,
                            now,
                            now,
                        ],
                    )
                    .map_err(|e| match e {
                        rusqlite::Error::SqliteFailure(f, _)
                            if f.code == rusqlite::ErrorCode::ConstraintViolation =>
                        {
                            anyhow::Error::from(ApiError::already_exists(&format!(
                                "Plan for {}",
                                date
                            )))
                        }
                        other => other.into(),
                    })?;

                    DailyPlan {
                        id: plan_id,
                        user_id: owner.to_string(),
                        plan_date: date,
                        task_order,
                        notes,
                        mood,
                        created_at: now,
                        updated_at: now,
                    }
                }
            };

            tx.commit()?;
            tracing::debug!(owner, date = %date, "plan upserted");

            Ok(plan)
        })
    }

    /// Get the plan for (owner, date).
    pub fn get_plan(&self, owner: &str, date: NaiveDate) -> Result<Option<DailyPlan>> {
        self.with_conn(|conn| get_plan_internal(conn, owner, date))
    }

    /// List plans from the last `days` days, most recent plan date first.
    pub fn list_plans(&self, owner: &str, days: i64) -> Result<Vec<DailyPlan>> {
        let since = today_utc() - Duration::days(days);

        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT * FROM daily_plans
                 WHERE user_id = ?1 AND plan_date >= ?2
                 ORDER BY plan_date DESC",
            )?;

            let plans = stmt
                .query_map(params![owner, since.to_string()], parse_plan_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;

            Ok(plans)
        })
    }

    /// Replace the plan's task order wholesale. The new order must be
    /// non-empty and pass validation; this is not a diff merge.
    pub fn reorder_plan(
        &self,
        owner: &str,
        date: NaiveDate,
        new_order: Vec<String>,
    ) -> Result<DailyPlan> {
        let now = now_ms();

        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            let plan = get_plan_internal(&tx, owner, date)?
                .ok_or_else(|| ApiError::plan_not_found(&date.to_string()))?;

            check_order(&tx, owner, &new_order)?;

            tx.execute(
                "UPDATE daily_plans SET task_order = ?1, updated_at = ?2 WHERE id = ?3",
                params![serde_json::to_string(&new_order)?, now, plan.id],
            )?;

            tx.commit()?;

            Ok(DailyPlan {
                task_order: new_order,
                updated_at: now,
                ..plan
            })
        })
    }

    /// Reconcile a batch of completion outcomes against the plan for
    /// (owner, date), in one transaction.
    ///
    /// Outcome keys that do not resolve to a task owned by the caller are
    /// skipped silently: the map may reference tasks the caller no longer
    /// owns, and that is not an error. For each resolved task one
    /// completion record is written, and completed tasks transition to the
    /// completed status. Notes and mood patch the plan when supplied.
    ///
    /// The returned `completed_tasks` counts every true value in the
    /// submitted map, resolved or not; only row-writing and status updates
    /// skip unresolved keys.
    pub fn complete_plan(
        &self,
        owner: &str,
        date: NaiveDate,
        outcomes: &HashMap<String, bool>,
        notes: Option<String>,
        mood: Option<i32>,
    ) -> Result<ReflectionStats> {
        if let Some(m) = mood {
            validate::validate_mood(m)?;
        }

        let now = now_ms();

        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            let plan = get_plan_internal(&tx, owner, date)?
                .ok_or_else(|| ApiError::plan_not_found(&date.to_string()))?;

            for (task_id, &completed) in outcomes {
                let Some(task) = get_task_internal(&tx, owner, task_id)? else {
                    tracing::debug!(task_id, "unknown outcome key skipped");
                    continue;
                };

                let planned_position = plan
                    .task_order
                    .iter()
                    .position(|id| id == task_id)
                    .map(|idx| idx as i32 + 1)
                    .unwrap_or(0);

                tx.execute(
                    "INSERT INTO task_completions (
                        id, task_id, daily_plan_id, planned_position,
                        actual_completed, completed_at, skipped_reason
                    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                    params![
                        Uuid::now_v7().to_string(),
                        task_id,
                        &plan.id,
                        planned_position,
                        completed,
                        if completed { Some(now) } else { None },
                        if completed { None } else { notes.as_deref() },
                    ],
                )?;

                if completed {
                    // Idempotent on already-completed tasks.
                    let completed_at = task.completed_at.unwrap_or(now);
                    tx.execute(
                        "UPDATE tasks SET status = ?1, completed_at = ?2, updated_at = ?3
                         WHERE id = ?4",
                        params![TaskStatus::Completed.as_str(), completed_at, now, task_id],
                    )?;
                }
            }

            let new_notes = notes.or(plan.notes.clone());
            let new_mood = mood.or(plan.mood);
            tx.execute(
                "UPDATE daily_plans SET notes = ?1, mood = ?2, updated_at = ?3 WHERE id = ?4",
                params![new_notes, new_mood, now, plan.id],
            )?;

            let total_tasks = plan.task_order.len() as i64;
            let completed_tasks = outcomes.values().filter(|&&c| c).count() as i64;
            let completion_rate = if total_tasks > 0 {
                completed_tasks as f64 / total_tasks as f64
            } else {
                0.0
            };

            let total_planned_minutes = planned_minutes(&tx, &plan.task_order)?;
            let total_actual_minutes: Option<i64> = tx.query_row(
                "SELECT SUM(actual_minutes) FROM task_completions WHERE daily_plan_id = ?1",
                params![&plan.id],
                |row| row.get(0),
            )?;

            tx.commit()?;
            tracing::info!(owner, date = %date, completed_tasks, total_tasks, "plan reconciled");

            Ok(ReflectionStats {
                plan_date: date,
                total_tasks,
                completed_tasks,
                completion_rate,
                total_planned_minutes,
                total_actual_minutes,
                mood: new_mood,
            })
        })
    }

    /// Recompute reflection statistics read-only from persisted completion
    /// rows. Agrees with [`Database::complete_plan`] when every outcome key
    /// in the reconciled map resolved to an owned task.
    pub fn get_reflection(&self, owner: &str, date: NaiveDate) -> Result<ReflectionStats> {
        self.with_conn(|conn| {
            let plan = get_plan_internal(conn, owner, date)?
                .ok_or_else(|| ApiError::plan_not_found(&date.to_string()))?;

            let (completed_tasks, total_actual_minutes): (i64, Option<i64>) = conn.query_row(
                "SELECT COUNT(*) FILTER (WHERE actual_completed), SUM(actual_minutes)
                 FROM task_completions WHERE daily_plan_id = ?1",
                params![&plan.id],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )?;

            let total_tasks = plan.task_order.len() as i64;
            let completion_rate = if total_tasks > 0 {
                completed_tasks as f64 / total_tasks as f64
            } else {
                0.0
            };

            Ok(ReflectionStats {
                plan_date: date,
                total_tasks,
                completed_tasks,
                completion_rate,
                total_planned_minutes: planned_minutes(conn, &plan.task_order)?,
                total_actual_minutes,
                mood: plan.mood,
            })
        })
    }

    /// All completion records for the plan at (owner, date).
    pub fn plan_completions(&self, owner: &str, date: NaiveDate) -> Result<Vec<TaskCompletion>> {
        self.with_conn(|conn| {
            let plan = get_plan_internal(conn, owner, date)?
                .ok_or_else(|| ApiError::plan_not_found(&date.to_string()))?;

            let mut stmt =
                conn.prepare("SELECT * FROM task_completions WHERE daily_plan_id = ?1")?;
            let completions = stmt
                .query_map(params![&plan.id], parse_completion_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;

            Ok(completions)
        })
    }
}
