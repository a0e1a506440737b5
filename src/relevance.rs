use crate::classifier::Category;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RelevanceScore {
    pub scope_relevance: f64,
    pub priority_boost: f64,
    pub term_boost: f64,
    pub combined: f64,
}

/// Additive merge of scope relevance, priority and doc term signals.
///
/// Every signal can only raise the combined score and the sum is capped at
/// 1.0, so the result stays in `[0, 1]` and is monotonic in each input.
#[derive(Debug, Clone, Copy)]
pub struct RelevanceCombiner {
    pub priority_boost: f64,
    pub term_boost_divisor: f64,
    pub term_boost_cap: f64,
}

impl Default for RelevanceCombiner {
    fn default() -> Self {
        RelevanceCombiner {
            priority_boost: 0.3,
            term_boost_divisor: 20.0,
            term_boost_cap: 0.2,
        }
    }
}

impl RelevanceCombiner {
    pub fn combine(
        &self,
        scope_relevance: f64,
        category: Category,
        term_match_count: usize,
    ) -> RelevanceScore {
        let scope_relevance = scope_relevance.clamp(0.0, 1.0);
        let priority_boost = if category == Category::High {
            self.priority_boost
        } else {
            0.0
        };
        let term_boost = (term_match_count as f64 / self.term_boost_divisor).min(self.term_boost_cap);

        RelevanceScore {
            scope_relevance,
            priority_boost,
            term_boost,
            combined: (scope_relevance + priority_boost + term_boost).min(1.0),
        }
    }
}
