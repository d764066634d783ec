//! External oracle collaborators: task ordering and natural-language
//! parsing.
//!
//! Both oracles are black boxes behind the [`Oracle`] trait. Their failures
//! never reach the caller: the suggestion path falls back to the
//! deterministic ranker and the parse path to a truncated-title default.

use crate::rank;
use crate::types::{ParsedTask, Suggestion, Task, PRIORITY_DEFAULT, PRIORITY_LOW, PRIORITY_URGENT};
use async_trait::async_trait;
use chrono::NaiveDate;
use serde_json::json;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Failure modes of an oracle call.
#[derive(Debug, Error)]
pub enum OracleError {
    #[error("oracle request timed out")]
    Timeout,
    #[error("oracle unavailable: {0}")]
    Unavailable(String),
    #[error("oracle returned malformed output: {0}")]
    Malformed(String),
}

/// A prompt-completion collaborator.
#[async_trait]
pub trait Oracle: Send + Sync {
    async fn complete(&self, system: &str, user: &str) -> Result<String, OracleError>;
}

const SUGGESTION_PROMPT: &str = r#"Given tasks and user productivity patterns, suggest optimal order for today.
Return ONLY JSON:
{
    "task_order": ["id1", "id2", ...],
    "reasoning": [{"task_id": "...", "reason": "..."}],
    "warnings": [{"task_id": "...", "message": "..."}]
}"#;

const TASK_PARSE_PROMPT: &str = r#"You are a task parser for a daily planner app.
User timezone: {timezone} | Today: {today}

Extract structured fields from natural language input.
Return ONLY a JSON object:
- title (string, required)
- description (string or null)
- due_date (string YYYY-MM-DD or null, resolve relative dates from today)
- priority (integer 1-4, default 2)
- estimated_minutes (integer or null)
- energy_level (integer 1-3 or null)
- category (string or null)

No explanation, no markdown, just JSON."#;

/// Suggestion and parsing services backed by an injected oracle.
#[derive(Clone)]
pub struct IntelligenceService {
    oracle: Arc<dyn Oracle>,
    timeout: Duration,
}

impl IntelligenceService {
    pub fn new(oracle: Arc<dyn Oracle>) -> Self {
        Self {
            oracle,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// One oracle call with the service timeout applied. A call that
    /// outlives the deadline is reported as [`OracleError::Timeout`].
    async fn call(&self, system: &str, user: &str) -> Result<String, OracleError> {
        tokio::time::timeout(self.timeout, self.oracle.complete(system, user))
            .await
            .map_err(|_| OracleError::Timeout)?
    }

    /// Suggest an ordering for `tasks`. Tries the oracle first; on timeout,
    /// unavailability, or a reply that fails schema validation, falls back
    /// to the deterministic ranker. Both paths return the same shape.
    pub async fn suggest_order(&self, tasks: &[Task], patterns: &serde_json::Value) -> Suggestion {
        let task_data: Vec<serde_json::Value> = tasks
            .iter()
            .map(|t| {
                json!({
                    "id": t.id,
                    "title": t.title,
                    "priority": t.priority,
                    "due_date": t.due_date,
                    "category": t.category,
                    "estimated_minutes": t.estimated_minutes,
                })
            })
            .collect();

        let payload = json!({
            "tasks": task_data,
            "patterns": patterns,
        })
        .to_string();

        let reply = match self.call(SUGGESTION_PROMPT, &payload).await {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!(error = %e, "ranking oracle failed, using fallback order");
                return rank::fallback_suggestion(tasks);
            }
        };

        match validate_suggestion(&reply, tasks) {
            Ok(suggestion) => suggestion,
            Err(e) => {
                tracing::warn!(error = %e, "ranking oracle reply rejected, using fallback order");
                rank::fallback_suggestion(tasks)
            }
        }
    }

    /// Parse natural-language input into structured task fields. On any
    /// oracle failure the whole input becomes the title, truncated to 500
    /// characters, with every other field at its default.
    pub async fn parse_task(&self, text: &str, timezone: &str, today: NaiveDate) -> ParsedTask {
        let system = TASK_PARSE_PROMPT
            .replace("{timezone}", timezone)
            .replace("{today}", &today.to_string());

        let reply = match self.call(&system, text).await {
            Ok(reply) => reply,
            Err(e) => {
                tracing::warn!(error = %e, "parsing oracle failed, using raw title");
                return parse_fallback(text);
            }
        };

        match validate_parsed(&reply) {
            Ok(parsed) => parsed,
            Err(e) => {
                tracing::warn!(error = %e, "parsing oracle reply rejected, using raw title");
                parse_fallback(text)
            }
        }
    }
}

/// Deserialize and schema-check an oracle suggestion reply.
fn validate_suggestion(reply: &str, tasks: &[Task]) -> Result<Suggestion, OracleError> {
    let suggestion: Suggestion =
        serde_json::from_str(reply).map_err(|e| OracleError::Malformed(e.to_string()))?;

    let known: HashSet<&str> = tasks.iter().map(|t| t.id.as_str()).collect();
    for id in &suggestion.task_order {
        if !known.contains(id.as_str()) {
            return Err(OracleError::Malformed(format!(
                "order references unknown task ID {}",
                id
            )));
        }
    }

    Ok(suggestion)
}

/// Deserialize and bounds-check an oracle parse reply.
fn validate_parsed(reply: &str) -> Result<ParsedTask, OracleError> {
    let parsed: ParsedTask =
        serde_json::from_str(reply).map_err(|e| OracleError::Malformed(e.to_string()))?;

    if parsed.title.trim().is_empty() {
        return Err(OracleError::Malformed("empty title".to_string()));
    }
    if !(PRIORITY_LOW..=PRIORITY_URGENT).contains(&parsed.priority) {
        return Err(OracleError::Malformed(format!(
            "priority {} out of range",
            parsed.priority
        )));
    }
    if let Some(level) = parsed.energy_level {
        if !(1..=3).contains(&level) {
            return Err(OracleError::Malformed(format!(
                "energy_level {} out of range",
                level
            )));
        }
    }

    Ok(parsed)
}

/// Char-boundary-safe fallback: the raw input as title, capped at 500.
fn parse_fallback(text: &str) -> ParsedTask {
    ParsedTask {
        title: text.chars().take(500).collect(),
        description: None,
        due_date: None,
        priority: PRIORITY_DEFAULT,
        estimated_minutes: None,
        energy_level: None,
        category: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TaskStatus;

    struct StubOracle {
        reply: Result<String, fn() -> OracleError>,
    }

    impl StubOracle {
        fn replying(text: &str) -> Arc<Self> {
            Arc::new(Self {
                reply: Ok(text.to_string()),
            })
        }

        fn failing() -> Arc<Self> {
            Arc::new(Self {
                reply: Err(|| OracleError::Timeout),
            })
        }
    }

    #[async_trait]
    impl Oracle for StubOracle {
        async fn complete(&self, _system: &str, _user: &str) -> Result<String, OracleError> {
            match &self.reply {
                Ok(text) => Ok(text.clone()),
                Err(make) => Err(make()),
            }
        }
    }

    fn task(id: &str, priority: i32, due_date: Option<i64>) -> Task {
        Task {
            id: id.to_string(),
            user_id: "u".to_string(),
            title: id.to_string(),
            description: None,
            due_date,
            priority,
            estimated_minutes: None,
            energy_level: None,
            category: None,
            status: TaskStatus::Pending,
            completed_at: None,
            created_at: 0,
            updated_at: 0,
        }
    }

    #[tokio::test]
    async fn oracle_order_is_used_when_valid() {
        let svc = IntelligenceService::new(StubOracle::replying(
            r#"{"task_order": ["b", "a"],
                "reasoning": [{"task_id": "b", "reason": "deadline first"}],
                "warnings": []}"#,
        ));
        let tasks = vec![task("a", 4, None), task("b", 1, None)];

        let suggestion = svc.suggest_order(&tasks, &json!([])).await;

        assert_eq!(suggestion.task_order, vec!["b", "a"]);
        assert_eq!(suggestion.reasoning.len(), 1);
    }

    struct StalledOracle;

    #[async_trait]
    impl Oracle for StalledOracle {
        async fn complete(&self, _system: &str, _user: &str) -> Result<String, OracleError> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok("too late".to_string())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn stalled_oracle_times_out_and_falls_back() {
        let svc = IntelligenceService::new(Arc::new(StalledOracle))
            .with_timeout(Duration::from_millis(50));
        let tasks = vec![task("low", 1, None), task("high", 4, None)];

        let suggestion = svc.suggest_order(&tasks, &json!([])).await;

        assert_eq!(suggestion.task_order, vec!["high", "low"]);
    }

    #[tokio::test]
    async fn oracle_failure_falls_back_to_ranker() {
        let svc = IntelligenceService::new(StubOracle::failing());
        let tasks = vec![task("low", 1, None), task("high", 4, None)];

        let suggestion = svc.suggest_order(&tasks, &json!([])).await;

        assert_eq!(suggestion.task_order, vec!["high", "low"]);
        assert!(suggestion.reasoning.is_empty());
        assert!(suggestion.warnings.is_empty());
    }

    #[tokio::test]
    async fn malformed_oracle_json_falls_back() {
        let svc = IntelligenceService::new(StubOracle::replying("not json at all"));
        let tasks = vec![task("a", 2, Some(10)), task("b", 2, Some(5))];

        let suggestion = svc.suggest_order(&tasks, &json!([])).await;

        // due date ascending within equal priority
        assert_eq!(suggestion.task_order, vec!["b", "a"]);
    }

    #[tokio::test]
    async fn unknown_ids_in_oracle_order_fall_back() {
        let svc = IntelligenceService::new(StubOracle::replying(
            r#"{"task_order": ["a", "ghost"], "reasoning": [], "warnings": []}"#,
        ));
        let tasks = vec![task("a", 1, None), task("b", 3, None)];

        let suggestion = svc.suggest_order(&tasks, &json!([])).await;

        assert_eq!(suggestion.task_order, vec!["b", "a"]);
    }

    #[tokio::test]
    async fn missing_required_key_falls_back() {
        // No task_order key at all.
        let svc =
            IntelligenceService::new(StubOracle::replying(r#"{"reasoning": [], "warnings": []}"#));
        let tasks = vec![task("a", 1, None)];

        let suggestion = svc.suggest_order(&tasks, &json!([])).await;

        assert_eq!(suggestion.task_order, vec!["a"]);
    }

    #[tokio::test]
    async fn parse_uses_oracle_fields() {
        let svc = IntelligenceService::new(StubOracle::replying(
            r#"{"title": "Write report", "due_date": "2026-08-25",
                "priority": 3, "estimated_minutes": 90, "category": "work"}"#,
        ));

        let parsed = svc
            .parse_task("write the report by monday", "UTC", today())
            .await;

        assert_eq!(parsed.title, "Write report");
        assert_eq!(parsed.priority, 3);
        assert_eq!(parsed.due_date, NaiveDate::from_ymd_opt(2026, 8, 25));
        assert_eq!(parsed.estimated_minutes, Some(90));
    }

    #[tokio::test]
    async fn parse_failure_truncates_raw_text() {
        let svc = IntelligenceService::new(StubOracle::failing());
        let text = "x".repeat(600);

        let parsed = svc.parse_task(&text, "UTC", today()).await;

        assert_eq!(parsed.title.chars().count(), 500);
        assert_eq!(parsed.priority, PRIORITY_DEFAULT);
        assert!(parsed.due_date.is_none());
    }

    #[tokio::test]
    async fn parse_fallback_respects_char_boundaries() {
        let svc = IntelligenceService::new(StubOracle::failing());
        let text = "é".repeat(510);

        let parsed = svc.parse_task(&text, "UTC", today()).await;

        assert_eq!(parsed.title.chars().count(), 500);
    }

    #[tokio::test]
    async fn parse_out_of_range_priority_falls_back() {
        let svc = IntelligenceService::new(StubOracle::replying(
            r#"{"title": "Bad", "priority": 9}"#,
        ));

        let parsed = svc.parse_task("something", "UTC", today()).await;

        assert_eq!(parsed.title, "something");
        assert_eq!(parsed.priority, PRIORITY_DEFAULT);
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 8, 23).unwrap()
    }
}
