//! Pure validation for task orders and request fields.
//!
//! Nothing here touches storage: callers load the referenced tasks and hand
//! them in, and persistence happens only after an `Ok`.

use crate::error::ApiError;
use crate::types::{Priority, TaskStatus, PRIORITY_LOW, PRIORITY_URGENT};
use chrono::NaiveDate;
use std::collections::{HashMap, HashSet};

/// Owner and status of a task, as seen by the validator.
#[derive(Debug, Clone)]
pub struct TaskRef {
    pub user_id: String,
    pub status: TaskStatus,
}

/// Validate a proposed task order against ownership, duplication, and
/// cancellation rules. Checked in this order, first failure wins:
///
/// 1. non-empty
/// 2. no duplicate IDs
/// 3. every ID resolves to a task owned by `owner` (offenders named)
/// 4. no ID references a cancelled task (offenders named)
pub fn validate_task_order(
    owner: &str,
    proposed: &[String],
    existing: &HashMap<String, TaskRef>,
) -> Result<(), ApiError> {
    if proposed.is_empty() {
        return Err(ApiError::empty_task_order());
    }

    let unique: HashSet<&String> = proposed.iter().collect();
    if unique.len() != proposed.len() {
        return Err(ApiError::duplicate_task());
    }

    let mut unknown: Vec<String> = Vec::new();
    for id in proposed {
        match existing.get(id) {
            Some(t) if t.user_id == owner => {}
            // Foreign tasks are indistinguishable from missing ones.
            _ => unknown.push(id.clone()),
        }
    }
    if !unknown.is_empty() {
        return Err(ApiError::invalid_tasks(&unknown));
    }

    let cancelled: Vec<String> = proposed
        .iter()
        .filter(|id| {
            existing
                .get(*id)
                .is_some_and(|t| t.status == TaskStatus::Cancelled)
        })
        .cloned()
        .collect();
    if !cancelled.is_empty() {
        return Err(ApiError::cancelled_tasks(&cancelled));
    }

    Ok(())
}

/// Title must be non-empty (ignoring whitespace) and at most 500 characters.
pub fn validate_title(title: &str) -> Result<(), ApiError> {
    if title.trim().is_empty() {
        return Err(ApiError::invalid_value("title", "title must not be empty"));
    }
    if title.chars().count() > 500 {
        return Err(ApiError::invalid_value(
            "title",
            "title must be at most 500 characters",
        ));
    }
    Ok(())
}

/// Parse a plan date in ISO `YYYY-MM-DD` form.
pub fn parse_plan_date(input: &str) -> Result<NaiveDate, ApiError> {
    NaiveDate::parse_from_str(input, "%Y-%m-%d").map_err(|_| ApiError::invalid_date(input))
}

pub fn validate_priority(priority: Priority) -> Result<(), ApiError> {
    if !(PRIORITY_LOW..=PRIORITY_URGENT).contains(&priority) {
        return Err(ApiError::invalid_value(
            "priority",
            format!("priority must be between 1 and 4, got {}", priority),
        ));
    }
    Ok(())
}

pub fn validate_estimated_minutes(minutes: i32) -> Result<(), ApiError> {
    if minutes < 1 {
        return Err(ApiError::invalid_value(
            "estimated_minutes",
            "estimated_minutes must be positive",
        ));
    }
    Ok(())
}

pub fn validate_energy_level(level: i32) -> Result<(), ApiError> {
    if !(1..=3).contains(&level) {
        return Err(ApiError::invalid_value(
            "energy_level",
            format!("energy_level must be between 1 and 3, got {}", level),
        ));
    }
    Ok(())
}

pub fn validate_mood(mood: i32) -> Result<(), ApiError> {
    if !(1..=5).contains(&mood) {
        return Err(ApiError::invalid_value(
            "mood",
            format!("mood must be between 1 and 5, got {}", mood),
        ));
    }
    Ok(())
}

/// Page size must be in `[1, 100]`, checked before any query runs.
pub fn validate_limit(limit: i64) -> Result<(), ApiError> {
    if !(1..=100).contains(&limit) {
        return Err(ApiError::invalid_value(
            "limit",
            format!("limit must be between 1 and 100, got {}", limit),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;

    fn refs(entries: &[(&str, &str, TaskStatus)]) -> HashMap<String, TaskRef> {
        entries
            .iter()
            .map(|(id, owner, status)| {
                (
                    id.to_string(),
                    TaskRef {
                        user_id: owner.to_string(),
                        status: *status,
                    },
                )
            })
            .collect()
    }

    fn ids(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn valid_order_passes() {
        let existing = refs(&[
            ("t1", "alice", TaskStatus::Pending),
            ("t2", "alice", TaskStatus::InProgress),
        ]);
        assert!(validate_task_order("alice", &ids(&["t2", "t1"]), &existing).is_ok());
    }

    #[test]
    fn empty_order_rejected() {
        let err = validate_task_order("alice", &[], &HashMap::new()).unwrap_err();
        assert_eq!(err.code, ErrorCode::PlanEmptyTaskOrder);
    }

    #[test]
    fn duplicate_rejected_before_ownership() {
        // Duplicates win even when the IDs are otherwise bogus.
        let err = validate_task_order("alice", &ids(&["x", "x"]), &HashMap::new()).unwrap_err();
        assert_eq!(err.code, ErrorCode::PlanDuplicateTask);
    }

    #[test]
    fn foreign_task_reported_as_unknown() {
        let existing = refs(&[
            ("t1", "alice", TaskStatus::Pending),
            ("t2", "bob", TaskStatus::Pending),
        ]);
        let err = validate_task_order("alice", &ids(&["t1", "t2", "t3"]), &existing).unwrap_err();
        assert_eq!(err.code, ErrorCode::PlanInvalidTask);
        assert!(err.message.contains("t2"));
        assert!(err.message.contains("t3"));
        assert!(!err.message.contains("t1,"));
    }

    #[test]
    fn cancelled_task_rejected() {
        let existing = refs(&[
            ("t1", "alice", TaskStatus::Pending),
            ("t2", "alice", TaskStatus::Cancelled),
        ]);
        let err = validate_task_order("alice", &ids(&["t1", "t2"]), &existing).unwrap_err();
        assert_eq!(err.code, ErrorCode::PlanCancelledTask);
        assert!(err.message.contains("t2"));
    }

    #[test]
    fn unknown_checked_before_cancelled() {
        let existing = refs(&[("t1", "alice", TaskStatus::Cancelled)]);
        let err = validate_task_order("alice", &ids(&["t1", "missing"]), &existing).unwrap_err();
        assert_eq!(err.code, ErrorCode::PlanInvalidTask);
    }

    #[test]
    fn field_bounds() {
        assert!(validate_priority(1).is_ok());
        assert!(validate_priority(4).is_ok());
        assert!(validate_priority(0).is_err());
        assert!(validate_priority(5).is_err());

        assert!(validate_mood(5).is_ok());
        assert!(validate_mood(6).is_err());

        assert!(validate_energy_level(3).is_ok());
        assert!(validate_energy_level(0).is_err());

        assert!(validate_estimated_minutes(1).is_ok());
        assert!(validate_estimated_minutes(0).is_err());

        assert!(validate_limit(1).is_ok());
        assert!(validate_limit(100).is_ok());
        assert!(validate_limit(0).is_err());
        assert!(validate_limit(101).is_err());
    }

    #[test]
    fn plan_date_parses_iso_only() {
        assert_eq!(
            parse_plan_date("2026-08-24").unwrap(),
            NaiveDate::from_ymd_opt(2026, 8, 24).unwrap()
        );
        let err = parse_plan_date("24/08/2026").unwrap_err();
        assert_eq!(err.code, ErrorCode::PlanInvalidDate);
        assert_eq!(parse_plan_date("2026-02-30").unwrap_err().code, ErrorCode::PlanInvalidDate);
    }

    #[test]
    fn long_title_rejected() {
        assert!(validate_title(&"x".repeat(500)).is_ok());
        assert!(validate_title(&"x".repeat(501)).is_err());
        assert!(validate_title("   ").is_err());
    }
}
