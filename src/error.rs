//! Structured error types surfaced to callers.

use serde::Serialize;
use std::fmt;

/// Error codes for programmatic error handling.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // Validation errors
    InvalidFieldValue,
    PlanInvalidDate,
    PlanDateTooFar,
    PlanEmptyTaskOrder,
    PlanDuplicateTask,
    PlanInvalidTask,
    PlanCancelledTask,
    CursorInvalid,

    // Not found errors
    TaskNotFound,
    PlanNotFound,

    // Conflict errors
    AlreadyExists,

    // Internal errors
    DatabaseError,
    InternalError,
}

/// Structured error carried across every core operation.
///
/// Ownership mismatches are reported as not-found so that the existence of
/// another user's rows never leaks.
#[derive(Debug, Serialize)]
pub struct ApiError {
    pub code: ErrorCode,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ApiError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            field: None,
            details: None,
        }
    }

    pub fn with_field(mut self, field: impl Into<String>) -> Self {
        self.field = Some(field.into());
        self
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    // Convenience constructors

    pub fn invalid_value(field: &str, reason: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidFieldValue, reason).with_field(field)
    }

    pub fn invalid_date(input: &str) -> Self {
        Self::new(
            ErrorCode::PlanInvalidDate,
            format!("Invalid date '{}'. Use YYYY-MM-DD", input),
        )
        .with_field("plan_date")
    }

    pub fn date_too_far() -> Self {
        Self::new(
            ErrorCode::PlanDateTooFar,
            "Plan date cannot be more than 7 days in the future",
        )
        .with_field("plan_date")
    }

    pub fn empty_task_order() -> Self {
        Self::new(
            ErrorCode::PlanEmptyTaskOrder,
            "At least one task must be included in the plan",
        )
        .with_field("task_order")
    }

    pub fn duplicate_task() -> Self {
        Self::new(
            ErrorCode::PlanDuplicateTask,
            "Duplicate task IDs are not allowed in task_order",
        )
        .with_field("task_order")
    }

    pub fn invalid_tasks(ids: &[String]) -> Self {
        Self::new(
            ErrorCode::PlanInvalidTask,
            format!("Unknown or foreign task IDs in order: {}", ids.join(", ")),
        )
        .with_field("task_order")
    }

    pub fn cancelled_tasks(ids: &[String]) -> Self {
        Self::new(
            ErrorCode::PlanCancelledTask,
            format!(
                "Cancelled tasks cannot be included in plan: {}",
                ids.join(", ")
            ),
        )
        .with_field("task_order")
    }

    pub fn cursor_invalid(cursor: &str) -> Self {
        Self::new(
            ErrorCode::CursorInvalid,
            format!("Cursor does not resolve to a known task: {}", cursor),
        )
        .with_field("cursor")
    }

    pub fn task_not_found(task_id: &str) -> Self {
        Self::new(
            ErrorCode::TaskNotFound,
            format!("Task not found: {}", task_id),
        )
    }

    pub fn plan_not_found(plan_date: &str) -> Self {
        Self::new(
            ErrorCode::PlanNotFound,
            format!("No plan found for date {}", plan_date),
        )
        .with_field("plan_date")
    }

    pub fn already_exists(what: &str) -> Self {
        Self::new(ErrorCode::AlreadyExists, format!("{} already exists", what))
    }

    pub fn database(err: impl fmt::Display) -> Self {
        Self::new(ErrorCode::DatabaseError, err.to_string())
    }

    pub fn internal(err: impl fmt::Display) -> Self {
        Self::new(ErrorCode::InternalError, err.to_string())
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for ApiError {}

// Allow using ? with anyhow errors by converting them
impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        // Try to downcast to ApiError first
        match err.downcast::<ApiError>() {
            Ok(api_err) => api_err,
            Err(err) => match err.downcast::<rusqlite::Error>() {
                Ok(db_err) => ApiError::database(db_err),
                Err(err) => ApiError::internal(err),
            },
        }
    }
}

/// Result type for core operations.
pub type ApiResult<T> = std::result::Result<T, ApiError>;

/// Extract the structured error code from an `anyhow::Error`, if the chain
/// bottoms out in an [`ApiError`].
pub fn error_code(err: &anyhow::Error) -> Option<ErrorCode> {
    err.downcast_ref::<ApiError>().map(|e| e.code)
}
