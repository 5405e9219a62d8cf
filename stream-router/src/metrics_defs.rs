use shared::metrics_defs::{MetricDef, MetricType};

pub const EVENTS_RECEIVED: MetricDef = MetricDef {
    name: "stream.events.received",
    metric_type: MetricType::Counter,
    description: "Change events received. Tagged with action.",
};

pub const EVENTS_FAILED: MetricDef = MetricDef {
    name: "stream.events.failed",
    metric_type: MetricType::Counter,
    description: "Change events whose dispatch failed. Tagged with error kind.",
};

pub const EVENTS_UNROUTED: MetricDef = MetricDef {
    name: "stream.events.unrouted",
    metric_type: MetricType::Counter,
    description: "Change events with no handler registered for their table and action",
};

pub const HANDLER_DURATION: MetricDef = MetricDef {
    name: "stream.handler.duration",
    metric_type: MetricType::Histogram,
    description: "Handler duration in seconds. Tagged with handler.",
};

pub const ALL_METRICS: &[MetricDef] = &[
    EVENTS_RECEIVED,
    EVENTS_FAILED,
    EVENTS_UNROUTED,
    HANDLER_DURATION,
];
