//! Prometheus metrics for the vote path, rendered in OpenMetrics text format
//! by `GET /metrics`.

use std::time::Duration;

use prometheus_client::encoding::text::encode;
use prometheus_client::encoding::EncodeLabelSet;
use prometheus_client::metrics::counter::Counter;
use prometheus_client::metrics::family::Family;
use prometheus_client::metrics::histogram::{exponential_buckets, Histogram};
use prometheus_client::registry::Registry;

#[derive(Debug, Clone, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct VoteLabels {
    pub outcome: String,
}

#[derive(Debug)]
pub struct ApiMetrics {
    registry: Registry,
    votes: Family<VoteLabels, Counter>,
    vote_duration: Histogram,
}

impl ApiMetrics {
    pub fn new() -> Self {
        let votes = Family::<VoteLabels, Counter>::default();
        // 1 ms to ~2 s
        let vote_duration = Histogram::new(exponential_buckets(0.001, 2.0, 12));

        let mut registry = Registry::default();
        // The encoder appends `_total` to counters.
        registry.register("give_votes", "Vote requests by outcome", votes.clone());
        registry.register(
            "give_vote_duration_seconds",
            "Time spent handling a vote request",
            vote_duration.clone(),
        );

        Self {
            registry,
            votes,
            vote_duration,
        }
    }

    pub fn observe_vote(&self, outcome: &str, elapsed: Duration) {
        self.votes
            .get_or_create(&VoteLabels {
                outcome: outcome.to_string(),
            })
            .inc();
        self.vote_duration.observe(elapsed.as_secs_f64());
    }

    pub fn render(&self) -> Result<String, std::fmt::Error> {
        let mut body = String::new();
        encode(&mut body, &self.registry)?;
        Ok(body)
    }
}

impl Default for ApiMetrics {
    fn default() -> Self {
        Self::new()
    }
}
