//! Core types for the daily planning engine.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Task priority as an integer, 1 (low) through 4 (urgent).
pub type Priority = i32;

pub const PRIORITY_LOW: Priority = 1;
pub const PRIORITY_MEDIUM: Priority = 2;
pub const PRIORITY_HIGH: Priority = 3;
pub const PRIORITY_URGENT: Priority = 4;
pub const PRIORITY_DEFAULT: Priority = PRIORITY_MEDIUM;

/// Task lifecycle status.
///
/// `Cancelled` is a terminal soft delete: the row is retained and excluded
/// from default listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    InProgress,
    Completed,
    Cancelled,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::InProgress => "in_progress",
            TaskStatus::Completed => "completed",
            TaskStatus::Cancelled => "cancelled",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(TaskStatus::Pending),
            "in_progress" => Some(TaskStatus::InProgress),
            "completed" => Some(TaskStatus::Completed),
            "cancelled" => Some(TaskStatus::Cancelled),
            _ => None,
        }
    }
}

/// A user's task. Timestamps are epoch milliseconds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub user_id: String,
    pub title: String,
    pub description: Option<String>,
    pub due_date: Option<i64>,
    pub priority: Priority,
    pub estimated_minutes: Option<i32>,
    pub energy_level: Option<i32>,
    pub category: Option<String>,
    pub status: TaskStatus,
    pub completed_at: Option<i64>,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Fields for creating a task. Omitted optionals stay unset.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewTask {
    pub title: String,
    pub description: Option<String>,
    pub due_date: Option<i64>,
    pub priority: Option<Priority>,
    pub estimated_minutes: Option<i32>,
    pub energy_level: Option<i32>,
    pub category: Option<String>,
}

/// Partial update for a task. Every field is applied only when supplied.
#[derive(Debug, Clone, Default)]
pub struct TaskPatch {
    pub title: Option<String>,
    pub description: Option<Option<String>>,
    pub due_date: Option<Option<i64>>,
    pub priority: Option<Priority>,
    pub estimated_minutes: Option<Option<i32>>,
    pub energy_level: Option<Option<i32>>,
    pub category: Option<Option<String>>,
    pub status: Option<TaskStatus>,
}

/// Conjunctive filters for task listing.
#[derive(Debug, Clone, Default)]
pub struct TaskFilters {
    pub priority: Option<Priority>,
    pub status: Option<TaskStatus>,
    pub category: Option<String>,
    /// Case-insensitive substring match over title and description.
    pub search: Option<String>,
    pub due_after: Option<i64>,
    pub due_before: Option<i64>,
    /// Include cancelled tasks even without an explicit status filter.
    pub include_cancelled: bool,
}

/// One page of tasks from a cursor-paginated listing.
#[derive(Debug, Clone, Serialize)]
pub struct TaskPage {
    pub tasks: Vec<Task>,
    pub has_more: bool,
    pub next_cursor: Option<String>,
}

/// A user's ordered plan for one calendar day.
///
/// `task_order` holds weak references: IDs are validated when the order is
/// written, but removing a task from the order does not touch the task and
/// cancelling a task does not rewrite existing plans.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DailyPlan {
    pub id: String,
    pub user_id: String,
    pub plan_date: NaiveDate,
    pub task_order: Vec<String>,
    pub notes: Option<String>,
    pub mood: Option<i32>,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Immutable record of one reconciliation outcome for a (task, plan) pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskCompletion {
    pub id: String,
    pub task_id: String,
    pub daily_plan_id: String,
    /// 1-based index the task held in the plan's order, 0 if completed
    /// outside the planned order.
    pub planned_position: i32,
    pub actual_completed: bool,
    pub actual_minutes: Option<i32>,
    pub completed_at: Option<i64>,
    pub skipped_reason: Option<String>,
}

/// End-of-day statistics derived from a plan and its completions.
#[derive(Debug, Clone, Serialize)]
pub struct ReflectionStats {
    pub plan_date: NaiveDate,
    pub total_tasks: i64,
    pub completed_tasks: i64,
    pub completion_rate: f64,
    pub total_planned_minutes: Option<i64>,
    pub total_actual_minutes: Option<i64>,
    pub mood: Option<i32>,
}

/// Why a task was placed where it was in a suggested order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuggestionReason {
    pub task_id: String,
    pub reason: String,
}

/// A caution attached to a suggested order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuggestionWarning {
    pub task_id: String,
    pub message: String,
}

/// Suggested task ordering. The oracle path may populate reasoning and
/// warnings; the deterministic fallback returns them empty. Both paths share
/// this shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Suggestion {
    pub task_order: Vec<String>,
    #[serde(default)]
    pub reasoning: Vec<SuggestionReason>,
    #[serde(default)]
    pub warnings: Vec<SuggestionWarning>,
}

/// Structured task fields extracted from natural-language input.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParsedTask {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub due_date: Option<NaiveDate>,
    #[serde(default = "default_priority")]
    pub priority: Priority,
    #[serde(default)]
    pub estimated_minutes: Option<i32>,
    #[serde(default)]
    pub energy_level: Option<i32>,
    #[serde(default)]
    pub category: Option<String>,
}

fn default_priority() -> Priority {
    PRIORITY_DEFAULT
}

/// Aggregated productivity insights over a trailing window.
#[derive(Debug, Clone, Serialize)]
pub struct Insights {
    pub period_start: i64,
    pub period_end: i64,
    pub total_completed: i64,
    pub most_completed_category: Option<String>,
    pub peak_completion_hour: u32,
    pub average_estimation_accuracy: Option<f64>,
}
