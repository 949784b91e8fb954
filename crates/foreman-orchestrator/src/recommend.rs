use crate::types::{BotRecommendation, ExecutionRecord};
use async_trait::async_trait;
use foreman_core::ForemanResult;
use std::collections::HashMap;

/// Sample count at which confidence reaches one half.
const CONFIDENCE_HALF_LIFE: f64 = 5.0;
/// Confidence ceiling; no amount of history makes a recommendation certain.
const CONFIDENCE_CAP: f64 = 0.99;

/// A provider that recommends the preferred worker for a task type given
/// historical execution records.
///
/// The response shape is a stable contract; the scoring internals are an
/// implementation choice of the provider.
#[async_trait]
pub trait BotRecommender: Send + Sync {
    /// Recommend a bot for `task_type` from `history`.
    async fn recommend(
        &self,
        task_type: &str,
        history: &[ExecutionRecord],
    ) -> ForemanResult<BotRecommendation>;
}

#[derive(Debug, Default, Clone, Copy)]
struct BotTally {
    executions: usize,
    successes: usize,
}

impl BotTally {
    fn success_rate(self) -> f64 {
        if self.executions == 0 {
            0.0
        } else {
            self.successes as f64 / self.executions as f64
        }
    }

    /// Confidence grows with sample count: n / (n + K), capped.
    fn confidence(self) -> f64 {
        let n = self.executions as f64;
        (n / (n + CONFIDENCE_HALF_LIFE)).min(CONFIDENCE_CAP)
    }

    /// Success rate discounted by how little evidence backs it.
    fn score(self) -> f64 {
        self.success_rate() * self.confidence()
    }
}

/// The default recommender: a confidence-gated blend of success rate and
/// sample count over the supplied history.
///
/// A bot with a perfect record over two runs scores below a bot with a
/// slightly worse record over fifty, so thin evidence cannot dominate.
/// Ordering is deterministic: ties resolve to the smaller bot id.
#[derive(Debug, Clone, Copy, Default)]
pub struct HistoryRecommender;

impl HistoryRecommender {
    /// Create the default recommender.
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl BotRecommender for HistoryRecommender {
    async fn recommend(
        &self,
        task_type: &str,
        history: &[ExecutionRecord],
    ) -> ForemanResult<BotRecommendation> {
        let mut tallies: HashMap<&str, BotTally> = HashMap::new();
        for record in history.iter().filter(|r| r.task_type == task_type) {
            let tally = tallies.entry(record.bot_id.as_str()).or_default();
            tally.executions += 1;
            if record.success {
                tally.successes += 1;
            }
        }

        if tallies.is_empty() {
            return Ok(BotRecommendation {
                task_type: task_type.to_string(),
                recommended_bot: None,
                confidence: 0.0,
                reason: format!("no execution history for task type '{task_type}'"),
                alternatives: Vec::new(),
            });
        }

        let mut ranked: Vec<(&str, BotTally)> =
            tallies.iter().map(|(id, tally)| (*id, *tally)).collect();
        ranked.sort_by(|(a_id, a), (b_id, b)| {
            b.score()
                .partial_cmp(&a.score())
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a_id.cmp(b_id))
        });

        let (best_id, best) = ranked[0];
        Ok(BotRecommendation {
            task_type: task_type.to_string(),
            recommended_bot: Some(best_id.to_string()),
            confidence: best.confidence(),
            reason: format!(
                "{best_id}: {}/{} successful for '{task_type}'",
                best.successes, best.executions
            ),
            alternatives: ranked[1..].iter().map(|(id, _)| (*id).to_string()).collect(),
        })
    }
}
