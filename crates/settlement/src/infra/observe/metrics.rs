/// Metrics for the settlement service.
#[derive(Debug, Clone, prometheus_metric_storage::MetricStorage)]
pub struct Metrics {
    /// Settlement runs grouped by outcome.
    #[metric(labels("result"))]
    pub settlements: prometheus::IntCounterVec,
    /// Executed settlement stages grouped by stage and outcome.
    #[metric(labels("stage", "result"))]
    pub stages: prometheus::IntCounterVec,
    /// Aggregator requests that failed after all retries.
    #[metric(labels("endpoint"))]
    pub quote_failures: prometheus::IntCounterVec,
    /// Submitted transactions grouped by operation and outcome.
    #[metric(labels("kind", "result"))]
    pub transactions: prometheus::IntCounterVec,
    /// Seasonal reward transfers grouped by outcome.
    #[metric(labels("result"))]
    pub reward_transfers: prometheus::IntCounterVec,
    /// Season rollovers grouped by outcome.
    #[metric(labels("result"))]
    pub season_rollovers: prometheus::IntCounterVec,
    /// Queued auction jobs grouped by job kind and outcome.
    #[metric(labels("kind", "result"))]
    pub jobs: prometheus::IntCounterVec,
    /// Bidder reconciliations grouped by outcome.
    #[metric(labels("result"))]
    pub reconciliations: prometheus::IntCounterVec,
}

/// Setup the metrics registry.
pub fn init() {
    ::observe::metrics::setup_registry_reentrant(Some("settlement".to_owned()), None);
}

/// Get the metrics instance.
pub fn get() -> &'static Metrics {
    Metrics::instance(::observe::metrics::get_storage_registry())
        .expect("unexpected error getting metrics instance")
}

pub fn result<T, E>(result: &Result<T, E>) -> &'static str {
    match result {
        Ok(_) => "success",
        Err(_) => "failure",
    }
}
