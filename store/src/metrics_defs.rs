//! Metrics definitions for the store.

use shared::metrics_defs::{MetricDef, MetricType};

pub const KV_OPERATIONS: MetricDef = MetricDef {
    name: "store.kv.operations",
    metric_type: MetricType::Counter,
    description: "Key-value operations issued, tagged by op",
};

pub const COUNTER_INCREMENTS: MetricDef = MetricDef {
    name: "store.company_metric.increments",
    metric_type: MetricType::Counter,
    description: "Atomic project count increments applied to company metrics",
};

pub const SCAN_PAGES: MetricDef = MetricDef {
    name: "store.company_metric.scan_pages",
    metric_type: MetricType::Histogram,
    description: "Pages read by a full company metric scan",
};

pub const ALL_METRICS: &[MetricDef] = &[KV_OPERATIONS, COUNTER_INCREMENTS, SCAN_PAGES];
