use {
    prometheus::{
        Encoder,
        core::{AtomicF64, AtomicU64, GenericCounterVec},
    },
    std::{
        collections::HashMap,
        sync::OnceLock,
        time::Instant,
    },
};

/// Global metrics registry used by all components.
static REGISTRY: OnceLock<prometheus_metric_storage::StorageRegistry> = OnceLock::new();

/// Configure global metrics registry with a common prefix and common labels.
/// Can be called multiple times in a row, later calls are ignored.
///
/// # Panics
///
/// Panics if the registry configuration is invalid.
pub fn setup_registry_reentrant(prefix: Option<String>, labels: Option<HashMap<String, String>>) {
    let registry = prometheus::Registry::new_custom(prefix, labels).unwrap();
    let storage_registry = prometheus_metric_storage::StorageRegistry::new(registry);
    REGISTRY.set(storage_registry).ok();
}

/// Get the global instance of the metrics registry.
pub fn get_registry() -> &'static prometheus::Registry {
    get_storage_registry().registry()
}

/// Get the global instance of the metric storage registry.
///
/// If the registry was not configured with [`setup_registry_reentrant`] it is
/// initialized with a default value so unit tests don't need any setup.
pub fn get_storage_registry() -> &'static prometheus_metric_storage::StorageRegistry {
    REGISTRY.get_or_init(prometheus_metric_storage::StorageRegistry::default)
}

/// Renders all metrics of the registry in the prometheus text format.
pub fn encode(registry: &prometheus::Registry) -> String {
    let encoder = prometheus::TextEncoder::new();
    let mut buffer = Vec::new();
    if let Err(err) = encoder.encode(&registry.gather(), &mut buffer) {
        tracing::error!(?err, "failed to encode metrics");
    }
    String::from_utf8(buffer).unwrap_or_default()
}

/// Metrics shared by potentially all processes.
#[derive(prometheus_metric_storage::MetricStorage)]
pub struct Metrics {
    /// Seconds spent in each phase of a pipeline.
    #[metric(labels("pipeline", "phase"))]
    pub phase_time: GenericCounterVec<AtomicF64>,

    /// How many times each phase of a pipeline ran.
    #[metric(labels("pipeline", "phase"))]
    pub phase_count: GenericCounterVec<AtomicU64>,
}

impl Metrics {
    /// Returns a guard that records the time spent in the phase when it gets
    /// dropped.
    #[must_use]
    pub fn on_phase_start<'a, 'b, 'c>(
        &'a self,
        pipeline: &'b str,
        phase: &'c str,
    ) -> impl Drop + use<'a, 'b, 'c> {
        let start = Instant::now();
        scopeguard::guard(start, move |start| {
            self.measure_phase(start, pipeline, phase);
        })
    }

    pub fn measure_phase(&self, start: Instant, pipeline: &str, phase: &str) {
        self.phase_time
            .with_label_values(&[pipeline, phase])
            .inc_by(start.elapsed().as_secs_f64());

        self.phase_count
            .with_label_values(&[pipeline, phase])
            .inc()
    }
}

pub fn metrics() -> &'static Metrics {
    Metrics::instance(get_storage_registry()).expect("unexpected error getting metrics instance")
}
