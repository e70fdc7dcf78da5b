use prometheus::{Encoder, HistogramVec, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};

#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    pub polls_total: IntCounterVec,
    pub reconcile_latency_seconds: HistogramVec,
    pub status_updates_total: IntCounterVec,
    pub active_sessions: IntGauge,
}

impl Metrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        let polls_total = IntCounterVec::new(
            Opts::new("polls_total", "Route polls by resulting controller state"),
            &["outcome"],
        )
        .expect("valid polls_total metric");

        let reconcile_latency_seconds = HistogramVec::new(
            prometheus::HistogramOpts::new(
                "reconcile_latency_seconds",
                "Latency of one reconcile pass in seconds",
            ),
            &["outcome"],
        )
        .expect("valid reconcile_latency_seconds metric");

        let status_updates_total = IntCounterVec::new(
            Opts::new("status_updates_total", "Status update requests sent to the backend"),
            &["kind", "outcome"],
        )
        .expect("valid status_updates_total metric");

        let active_sessions = IntGauge::new("active_sessions", "Transporters with an active session")
            .expect("valid active_sessions metric");

        registry
            .register(Box::new(polls_total.clone()))
            .expect("register polls_total");
        registry
            .register(Box::new(reconcile_latency_seconds.clone()))
            .expect("register reconcile_latency_seconds");
        registry
            .register(Box::new(status_updates_total.clone()))
            .expect("register status_updates_total");
        registry
            .register(Box::new(active_sessions.clone()))
            .expect("register active_sessions");

        Self {
            registry,
            polls_total,
            reconcile_latency_seconds,
            status_updates_total,
            active_sessions,
        }
    }

    pub fn record_status_update(&self, kind: &str, ok: bool) {
        let outcome = if ok { "success" } else { "error" };
        self.status_updates_total
            .with_label_values(&[kind, outcome])
            .inc();
    }

    pub fn encode(&self) -> Result<String, String> {
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();

        TextEncoder::new()
            .encode(&metric_families, &mut buffer)
            .map_err(|err| format!("failed to encode metrics: {err}"))?;

        String::from_utf8(buffer).map_err(|err| format!("metrics are not valid utf8: {err}"))
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}
