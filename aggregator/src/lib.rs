//! Read-side services of the CLA metrics engine and their REST adapter.

pub mod api;
pub mod auth;
pub mod cla_groups;
pub mod composition;
pub mod config;
pub mod documents;
pub mod errors;
pub mod events;
pub mod fanout;
pub mod metrics;
pub mod metrics_defs;
pub mod reconciler;

#[cfg(test)]
mod testutils;

use cla_groups::{ClaGroupService, TemplateCatalog, TemplateService};
use composition::CompanyService;
use config::Config;
use documents::DocumentLinker;
use events::EventsService;
use metrics::MetricsService;
use std::sync::Arc;
use store::Stores;
use upstreams::Upstreams;

pub use api::{ApiError, router, serve};
pub use errors::ServiceError;

/// Every service behind the REST adapter, sharing one set of stores and upstreams.
#[derive(Clone)]
pub struct Services {
    pub metrics: MetricsService,
    pub companies: CompanyService,
    pub cla_groups: ClaGroupService,
    pub events: EventsService,
}

impl Services {
    pub fn new(
        config: &Config,
        stores: &Stores,
        upstreams: &Upstreams,
        templates: Arc<dyn TemplateService>,
    ) -> Self {
        let branch_timeout = config.branch_timeout();
        Services {
            metrics: MetricsService::new(
                stores.counters.clone(),
                stores.dashboard.clone(),
                branch_timeout,
            ),
            companies: CompanyService::new(
                stores,
                upstreams,
                DocumentLinker::new(&config.document_base_url),
                branch_timeout,
            ),
            cla_groups: ClaGroupService::new(
                stores,
                upstreams.projects.clone(),
                templates,
                branch_timeout,
            ),
            events: EventsService::new(
                stores.events.clone(),
                upstreams.projects.clone(),
                branch_timeout,
            ),
        }
    }

    /// Services with the built-in template catalog.
    pub fn from_config(config: &Config, stores: &Stores, upstreams: &Upstreams) -> Self {
        Services::new(config, stores, upstreams, Arc::new(TemplateCatalog::default()))
    }
}
