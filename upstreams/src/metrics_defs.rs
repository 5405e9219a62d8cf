//! Metrics definitions for the upstream service clients.

use shared::metrics_defs::{MetricDef, MetricType};

pub const UPSTREAM_REQUEST_DURATION: MetricDef = MetricDef {
    name: "upstream.request.duration",
    metric_type: MetricType::Histogram,
    description: "Time spent on a single upstream HTTP attempt, tagged by service",
};

pub const UPSTREAM_RETRIES: MetricDef = MetricDef {
    name: "upstream.request.retries",
    metric_type: MetricType::Counter,
    description: "Upstream attempts retried after a retriable status",
};

pub const USER_CACHE_HIT: MetricDef = MetricDef {
    name: "upstream.user_cache.hit",
    metric_type: MetricType::Counter,
    description: "Usernames served from the user directory cache",
};

pub const USER_CACHE_MISS: MetricDef = MetricDef {
    name: "upstream.user_cache.miss",
    metric_type: MetricType::Counter,
    description: "Usernames fetched from the user directory",
};

pub const ALL_METRICS: &[MetricDef] = &[
    UPSTREAM_REQUEST_DURATION,
    UPSTREAM_RETRIES,
    USER_CACHE_HIT,
    USER_CACHE_MISS,
];
