use crate::config::{LoggingConfig, MetricsConfig};
use metrics_exporter_statsd::{StatsdBuilder, StatsdError};
use shared::metrics_defs::{MetricDef, describe_all};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[derive(thiserror::Error, Debug)]
pub enum MetricsInitError {
    #[error("could not build statsd recorder: {0}")]
    Statsd(#[from] StatsdError),
    #[error("a metrics recorder is already installed")]
    AlreadyInstalled,
}

/// Every metric the binary can emit.
pub fn all_metric_defs() -> impl Iterator<Item = &'static MetricDef> {
    store::metrics_defs::ALL_METRICS
        .iter()
        .chain(upstreams::metrics_defs::ALL_METRICS)
        .chain(stream_router::metrics_defs::ALL_METRICS)
        .chain(aggregator::metrics_defs::ALL_METRICS)
}

fn env_filter(config: &LoggingConfig) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Installs the fmt subscriber, plus sentry and its tracing layer when a DSN
/// is configured. The returned guard flushes sentry on drop.
pub fn init_logging(config: &LoggingConfig) -> Option<sentry::ClientInitGuard> {
    let guard = config.sentry_dsn.as_deref().map(|dsn| {
        sentry::init((
            dsn,
            sentry::ClientOptions {
                release: sentry::release_name!(),
                ..Default::default()
            },
        ))
    });
    let sentry_layer = guard
        .as_ref()
        .map(|_| sentry::integrations::tracing::layer());

    tracing_subscriber::registry()
        .with(env_filter(config))
        .with(tracing_subscriber::fmt::layer())
        .with(sentry_layer)
        .init();
    guard
}

/// Installs the statsd recorder and registers every metric description.
pub fn init_metrics(config: &MetricsConfig) -> Result<(), MetricsInitError> {
    let recorder = StatsdBuilder::from(config.statsd_host.clone(), config.statsd_port)
        .build(Some(config.prefix.as_str()))?;
    metrics::set_global_recorder(recorder).map_err(|_| MetricsInitError::AlreadyInstalled)?;
    describe_all(all_metric_defs());
    tracing::info!(
        statsd_host = %config.statsd_host,
        statsd_port = config.statsd_port,
        "statsd metrics enabled"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn metric_names_are_unique() {
        let mut seen = HashSet::new();
        for def in all_metric_defs() {
            assert!(seen.insert(def.name), "duplicate metric {}", def.name);
        }
        assert!(seen.contains("api.requests"));
        assert!(seen.contains("stream.events.received"));
        assert_eq!(seen.len(), 15);
    }
}
