use prometheus::{Encoder, IntCounterVec, Opts, Registry, TextEncoder};

/// Counters shared by the permission gate, the membership state machine and the
/// listing cache. One registry per process, rendered on `/metrics`.
#[derive(Clone)]
pub struct AccessMetrics {
    pub registry: Registry,
    pub authorization_decisions: IntCounterVec,
    pub membership_transitions: IntCounterVec,
    pub cache_lookups: IntCounterVec,
    pub cache_backend_errors: IntCounterVec,
    pub cache_invalidations: IntCounterVec,
}

impl AccessMetrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();
        let authorization_decisions = IntCounterVec::new(
            Opts::new(
                "access_authorization_decisions_total",
                "Permission gate decisions grouped by outcome",
            ),
            &["outcome"],
        )?;
        let membership_transitions = IntCounterVec::new(
            Opts::new(
                "access_membership_transitions_total",
                "Promotion and demotion attempts grouped by operation and outcome",
            ),
            &["operation", "outcome"],
        )?;
        let cache_lookups = IntCounterVec::new(
            Opts::new("access_cache_lookups_total", "Listing cache lookups by result"),
            &["result"],
        )?;
        let cache_backend_errors = IntCounterVec::new(
            Opts::new(
                "access_cache_backend_errors_total",
                "Cache backend failures swallowed by the fail-open policy",
            ),
            &["operation"],
        )?;
        let cache_invalidations = IntCounterVec::new(
            Opts::new(
                "access_cache_invalidations_total",
                "Cache keys deleted by post-write hooks",
            ),
            &["kind"],
        )?;
        registry.register(Box::new(authorization_decisions.clone()))?;
        registry.register(Box::new(membership_transitions.clone()))?;
        registry.register(Box::new(cache_lookups.clone()))?;
        registry.register(Box::new(cache_backend_errors.clone()))?;
        registry.register(Box::new(cache_invalidations.clone()))?;
        Ok(AccessMetrics {
            registry,
            authorization_decisions,
            membership_transitions,
            cache_lookups,
            cache_backend_errors,
            cache_invalidations,
        })
    }

    pub fn authorization(&self, allowed: bool) {
        let outcome = if allowed { "allowed" } else { "denied" };
        self.authorization_decisions.with_label_values(&[outcome]).inc();
    }

    pub fn transition(&self, operation: &str, outcome: &str) {
        self.membership_transitions
            .with_label_values(&[operation, outcome])
            .inc();
    }

    pub fn cache_lookup(&self, hit: bool) {
        let result = if hit { "hit" } else { "miss" };
        self.cache_lookups.with_label_values(&[result]).inc();
    }

    pub fn cache_error(&self, operation: &str) {
        self.cache_backend_errors.with_label_values(&[operation]).inc();
    }

    pub fn cache_invalidation(&self, kind: &str) {
        self.cache_invalidations.with_label_values(&[kind]).inc();
    }

    /// Prometheus text exposition of every registered metric.
    pub fn encode(&self) -> Result<String, prometheus::Error> {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder.encode(&self.registry.gather(), &mut buffer)?;
        Ok(String::from_utf8_lossy(&buffer).into_owned())
    }
}
