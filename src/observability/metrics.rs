use prometheus::{Encoder, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};

#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    pub tracking_samples_total: IntCounterVec,
    pub active_tracking_sessions: IntGauge,
    pub nearby_queries_total: IntCounter,
    pub geolocation_failures_total: IntCounter,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        let tracking_samples_total = IntCounterVec::new(
            Opts::new("tracking_samples_total", "Tracking sample publishes by outcome"),
            &["outcome"],
        )
        .expect("valid tracking_samples_total metric");

        let active_tracking_sessions = IntGauge::new(
            "active_tracking_sessions",
            "Tracking sessions currently polling",
        )
        .expect("valid active_tracking_sessions metric");

        let nearby_queries_total =
            IntCounter::new("nearby_queries_total", "Nearby barber searches served")
                .expect("valid nearby_queries_total metric");

        let geolocation_failures_total = IntCounter::new(
            "geolocation_failures_total",
            "Position fixes that could not be acquired",
        )
        .expect("valid geolocation_failures_total metric");

        registry
            .register(Box::new(tracking_samples_total.clone()))
            .expect("register tracking_samples_total");
        registry
            .register(Box::new(active_tracking_sessions.clone()))
            .expect("register active_tracking_sessions");
        registry
            .register(Box::new(nearby_queries_total.clone()))
            .expect("register nearby_queries_total");
        registry
            .register(Box::new(geolocation_failures_total.clone()))
            .expect("register geolocation_failures_total");

        Self {
            registry,
            tracking_samples_total,
            active_tracking_sessions,
            nearby_queries_total,
            geolocation_failures_total,
        }
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
