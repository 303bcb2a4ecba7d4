//! Prometheus metrics for the QVote engine.
//!
//! [`EngineMetrics`] owns a dedicated [`Registry`] that an exporter can encode
//! into the Prometheus text format via [`EngineMetrics::encode`].

use prometheus::{
    register_histogram_with_registry, register_int_counter_with_registry,
    register_int_gauge_with_registry, Encoder, Histogram, HistogramOpts, IntCounter, IntGauge,
    Opts, Registry, TextEncoder,
};

pub struct EngineMetrics {
    pub registry: Registry,

    // ── Counters ────────────────────────────────────────────────────────
    /// Vote flows started.
    pub votes_submitted: IntCounter,
    /// Vote flows that reached `Settled`.
    pub votes_confirmed: IntCounter,
    /// Vote and claim flows that ended `Rejected`.
    pub flows_rejected: IntCounter,
    /// Vote and claim flows that ended `Failed`.
    pub flows_failed: IntCounter,
    pub claims_paid: IntCounter,
    pub polls_created: IntCounter,

    // ── Gauges ──────────────────────────────────────────────────────────
    /// Flows parked with an unobserved write, waiting for a retry.
    pub ambiguous_flows: IntGauge,

    // ── Histograms ──────────────────────────────────────────────────────
    /// Submit-to-settle time of confirmed flows, in milliseconds.
    pub confirmation_latency_ms: Histogram,
}

impl EngineMetrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let votes_submitted = register_int_counter_with_registry!(
            Opts::new("qvote_votes_submitted_total", "Vote flows started"),
            registry
        )?;
        let votes_confirmed = register_int_counter_with_registry!(
            Opts::new("qvote_votes_confirmed_total", "Vote flows settled"),
            registry
        )?;
        let flows_rejected = register_int_counter_with_registry!(
            Opts::new("qvote_flows_rejected_total", "Flows refused by the user or the ledger"),
            registry
        )?;
        let flows_failed = register_int_counter_with_registry!(
            Opts::new("qvote_flows_failed_total", "Flows ended by transport or internal failure"),
            registry
        )?;
        let claims_paid = register_int_counter_with_registry!(
            Opts::new("qvote_claims_paid_total", "Payout claims settled"),
            registry
        )?;
        let polls_created = register_int_counter_with_registry!(
            Opts::new("qvote_polls_created_total", "Polls created"),
            registry
        )?;

        let ambiguous_flows = register_int_gauge_with_registry!(
            Opts::new("qvote_ambiguous_flows", "Flows awaiting retry after an unobserved write"),
            registry
        )?;

        // 1 ms to ~16 s.
        let confirmation_latency_ms = register_histogram_with_registry!(
            HistogramOpts::new(
                "qvote_confirmation_latency_ms",
                "Submit-to-settle latency in milliseconds"
            )
            .buckets(prometheus::exponential_buckets(1.0, 2.0, 15)?),
            registry
        )?;

        Ok(Self {
            registry,
            votes_submitted,
            votes_confirmed,
            flows_rejected,
            flows_failed,
            claims_paid,
            polls_created,
            ambiguous_flows,
            confirmation_latency_ms,
        })
    }

    /// Text exposition of every metric.
    pub fn encode(&self) -> Result<String, prometheus::Error> {
        let mut buf = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buf)?;
        String::from_utf8(buf).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registers_and_encodes() {
        let metrics = EngineMetrics::new().unwrap();
        metrics.votes_submitted.inc();
        metrics.confirmation_latency_ms.observe(12.0);
        let text = metrics.encode().unwrap();
        assert!(text.contains("qvote_votes_submitted_total 1"));
        assert!(text.contains("qvote_confirmation_latency_ms_bucket"));
    }

    #[test]
    fn instances_do_not_share_registries() {
        let a = EngineMetrics::new().unwrap();
        let b = EngineMetrics::new().unwrap();
        a.polls_created.inc();
        assert_eq!(b.polls_created.get(), 0);
    }
}
