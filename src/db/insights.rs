//! Derived productivity insights over a trailing completion window.

use super::{now_ms, Database};
use crate::types::Insights;
use anyhow::Result;
use chrono::{TimeZone, Timelike, Utc};
use rusqlite::params;

/// Pick the key with the highest count, ties broken by first-encountered
/// order. The pairs must be in encounter order.
fn argmax_first<K: Clone>(counts: &[(K, i64)]) -> Option<K> {
    let mut best: Option<(&K, i64)> = None;
    for (key, count) in counts {
        match best {
            Some((_, best_count)) if *count <= best_count => {}
            _ => best = Some((key, *count)),
        }
    }
    best.map(|(k, _)| k.clone())
}

fn bump<K: PartialEq>(counts: &mut Vec<(K, i64)>, key: K) {
    match counts.iter_mut().find(|(k, _)| *k == key) {
        Some((_, count)) => *count += 1,
        None => counts.push((key, 1)),
    }
}

impl Database {
    /// Aggregate completion insights for the trailing `days`-day window.
    ///
    /// An empty window yields zero counts and absent optional fields
    /// rather than an error.
    pub fn get_insights(&self, owner: &str, days: i64) -> Result<Insights> {
        let period_end = now_ms();
        let period_start = period_end - days * 24 * 60 * 60 * 1000;

        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT t.category, t.estimated_minutes, c.actual_minutes, c.completed_at
                 FROM task_completions c
                 INNER JOIN tasks t ON c.task_id = t.id
                 WHERE t.user_id = ?1 AND c.completed_at >= ?2
                 ORDER BY c.completed_at DESC",
            )?;

            let rows = stmt.query_map(params![owner, period_start], |row| {
                let category: Option<String> = row.get(0)?;
                let estimated: Option<i32> = row.get(1)?;
                let actual: Option<i32> = row.get(2)?;
                let completed_at: Option<i64> = row.get(3)?;
                Ok((category, estimated, actual, completed_at))
            })?;

            let mut total_completed = 0i64;
            // Encounter-ordered so ties resolve deterministically.
            let mut categories: Vec<(String, i64)> = Vec::new();
            let mut hours: Vec<(u32, i64)> = Vec::new();
            let mut estimation_errors: Vec<f64> = Vec::new();

            for row in rows {
                let (category, estimated, actual, completed_at) = row?;
                total_completed += 1;

                bump(
                    &mut categories,
                    category.unwrap_or_else(|| "uncategorized".to_string()),
                );

                if let Some(ts) = completed_at {
                    if let Some(dt) = Utc.timestamp_millis_opt(ts).single() {
                        bump(&mut hours, dt.hour());
                    }
                }

                if let (Some(est), Some(act)) = (estimated, actual) {
                    if est > 0 {
                        estimation_errors.push((est - act).abs() as f64 / est as f64);
                    }
                }
            }

            let average_estimation_accuracy = if estimation_errors.is_empty() {
                None
            } else {
                Some(estimation_errors.iter().sum::<f64>() / estimation_errors.len() as f64)
            };

            Ok(Insights {
                period_start,
                period_end,
                total_completed,
                most_completed_category: argmax_first(&categories),
                peak_completion_hour: argmax_first(&hours).unwrap_or(0),
                average_estimation_accuracy,
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn argmax_prefers_first_encountered_on_tie() {
        let counts = vec![("a".to_string(), 2), ("b".to_string(), 2), ("c".to_string(), 1)];
        assert_eq!(argmax_first(&counts), Some("a".to_string()));
    }

    #[test]
    fn argmax_empty_is_none() {
        let counts: Vec<(String, i64)> = Vec::new();
        assert_eq!(argmax_first(&counts), None);
    }

    #[test]
    fn bump_keeps_encounter_order() {
        let mut counts: Vec<(String, i64)> = Vec::new();
        bump(&mut counts, "x".to_string());
        bump(&mut counts, "y".to_string());
        bump(&mut counts, "y".to_string());
        bump(&mut counts, "x".to_string());
        assert_eq!(counts[0].0, "x");
        assert_eq!(counts[0].1, 2);
        assert_eq!(counts[1].1, 2);
        // x and y tie at 2; x was seen first
        assert_eq!(argmax_first(&counts), Some("x".to_string()));
    }
}
