use shared::metrics_defs::{MetricDef, MetricType};

pub const FANOUT_DURATION: MetricDef = MetricDef {
    name: "fanout.duration",
    metric_type: MetricType::Histogram,
    description: "Time until every branch of a fan-out was joined. Tagged with fanout.",
};

pub const FANOUT_BRANCH_FAILURES: MetricDef = MetricDef {
    name: "fanout.branch.failures",
    metric_type: MetricType::Counter,
    description: "Fan-out branches that did not complete. Tagged with fanout, reason.",
};

pub const PARTIAL_RESULTS: MetricDef = MetricDef {
    name: "aggregate.partial_results",
    metric_type: MetricType::Counter,
    description: "Best-effort aggregates returned with a section omitted. Tagged with aggregate.",
};

pub const API_REQUESTS: MetricDef = MetricDef {
    name: "api.requests",
    metric_type: MetricType::Counter,
    description: "REST requests handled. Tagged with route, status.",
};

pub const ALL_METRICS: &[MetricDef] = &[
    FANOUT_DURATION,
    FANOUT_BRANCH_FAILURES,
    PARTIAL_RESULTS,
    API_REQUESTS,
];
