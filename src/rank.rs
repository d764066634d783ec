//! Deterministic fallback ordering for suggestions.
//!
//! Used whenever the ranking oracle is unreachable, times out, or returns
//! output that fails schema validation.

use crate::types::{Suggestion, Task};

/// Order tasks by priority descending, then due date ascending with absent
/// due dates sorted after all present ones. The sort is stable, so tasks
/// tied on both keys keep their input order.
pub fn rank_tasks(tasks: &[Task]) -> Vec<String> {
    let mut sorted: Vec<&Task> = tasks.iter().collect();
    sorted.sort_by_key(|t| (-t.priority, t.due_date.unwrap_or(i64::MAX)));
    sorted.iter().map(|t| t.id.clone()).collect()
}

/// Build a fallback [`Suggestion`] in the same shape the oracle path
/// produces, with empty reasoning and warnings.
pub fn fallback_suggestion(tasks: &[Task]) -> Suggestion {
    Suggestion {
        task_order: rank_tasks(tasks),
        reasoning: Vec::new(),
        warnings: Vec::new(),
    }
}
