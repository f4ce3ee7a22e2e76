//! HTTP request metrics with bounded route labels.
//!
//! Every path is normalised before it becomes a label: item paths collapse to
//! `/<family>/:id`, known static routes pass through, and anything else is
//! reported as `unmatched`. Methods outside the standard verbs are reported
//! as `OTHER`. Both label sets are therefore fixed by configuration, not by
//! traffic.

use crate::error::CrudResult;
use prometheus::{HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry};
use std::time::Duration;

/// Request duration buckets (seconds)
const HTTP_LATENCY_BUCKETS: &[f64] = &[0.1, 0.5, 1.0, 2.0, 5.0, 10.0];

/// Route label for paths outside the known route table
pub const UNMATCHED_ROUTE: &str = "unmatched";

/// Method label for verbs outside [`KNOWN_METHODS`]
pub const OTHER_METHOD: &str = "OTHER";

pub const KNOWN_METHODS: &[&str] = &["GET", "POST", "PUT", "PATCH", "DELETE", "HEAD", "OPTIONS"];

/// Case-insensitive; never allocates a new label value
pub fn normalize_method(method: &str) -> &'static str {
    KNOWN_METHODS
        .iter()
        .find(|known| known.eq_ignore_ascii_case(method))
        .copied()
        .unwrap_or(OTHER_METHOD)
}

#[derive(Debug, Clone)]
pub struct RouteNormalizer {
    families: Vec<String>,
    static_routes: Vec<String>,
}

impl RouteNormalizer {
    pub fn new<F, S>(families: F, static_routes: S) -> Self
    where
        F: IntoIterator,
        F::Item: Into<String>,
        S: IntoIterator,
        S::Item: Into<String>,
    {
        Self {
            families: families.into_iter().map(Into::into).collect(),
            static_routes: static_routes.into_iter().map(Into::into).collect(),
        }
    }

    /// Route table shared by the task and user services
    pub fn for_services() -> Self {
        Self::new(
            ["users", "tasks"],
            [
                "/",
                "/health",
                "/health/redis",
                "/live",
                "/ready",
                "/metrics",
                "/users",
                "/tasks",
            ],
        )
    }

    pub fn normalize(&self, raw_path: &str) -> String {
        let path = raw_path
            .split(['?', '#'])
            .next()
            .unwrap_or_default();
        let path = match path.trim_end_matches('/') {
            "" => "/",
            trimmed => trimmed,
        };

        if self.static_routes.iter().any(|route| route == path) {
            return path.to_string();
        }

        let mut segments = path.trim_start_matches('/').split('/');
        if let (Some(family), Some(_id)) = (segments.next(), segments.next()) {
            if self.families.iter().any(|f| f == family) {
                return format!("/{family}/:id");
            }
        }

        UNMATCHED_ROUTE.to_string()
    }
}

#[derive(Debug, Clone)]
pub struct HttpMetrics {
    /// Labels: method, route, status_code
    requests_total: IntCounterVec,
    /// Labels: method, route, status_code
    request_duration: HistogramVec,
    normalizer: RouteNormalizer,
}

impl HttpMetrics {
    pub fn new(normalizer: RouteNormalizer) -> CrudResult<Self> {
        Ok(Self {
            requests_total: IntCounterVec::new(
                Opts::new("http_requests_total", "Total number of HTTP requests"),
                &["method", "route", "status_code"],
            )?,
            request_duration: HistogramVec::new(
                HistogramOpts::new(
                    "http_request_duration_seconds",
                    "Duration of HTTP requests in seconds",
                )
                .buckets(HTTP_LATENCY_BUCKETS.to_vec()),
                &["method", "route", "status_code"],
            )?,
            normalizer,
        })
    }

    pub(crate) fn register(&self, registry: &Registry) -> CrudResult<()> {
        registry.register(Box::new(self.requests_total.clone()))?;
        registry.register(Box::new(self.request_duration.clone()))?;
        Ok(())
    }

    pub fn normalizer(&self) -> &RouteNormalizer {
        &self.normalizer
    }

    /// Record one completed request. `raw_path` may contain identifiers.
    pub fn observe(&self, method: &str, raw_path: &str, status_code: u16, elapsed: Duration) {
        let route = self.normalizer.normalize(raw_path);
        let status = status_code.to_string();
        let labels = [normalize_method(method), route.as_str(), status.as_str()];

        self.request_duration
            .with_label_values(&labels)
            .observe(elapsed.as_secs_f64());
        self.requests_total.with_label_values(&labels).inc();
    }

    pub fn request_count(&self, method: &str, route: &str, status_code: u16) -> u64 {
        let status = status_code.to_string();
        self.requests_total
            .with_label_values(&[normalize_method(method), route, status.as_str()])
            .get()
    }
}
