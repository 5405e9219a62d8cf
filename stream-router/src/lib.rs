//! Routes change-stream records to the handlers registered for their source
//! table and action.

pub mod company_project_count;
pub mod errors;
pub mod event;
pub mod handler;
pub mod metrics_defs;
pub mod router;

#[cfg(test)]
mod testutils;

pub use company_project_count::CompanyProjectCountHandler;
pub use errors::{HandlerError, RouterError};
pub use event::{ChangeEventBatch, ChangeEventRecord, EventAction};
pub use handler::ChangeHandler;
pub use router::{BatchSummary, ChangeEventRouter, Registrations};

use std::sync::Arc;
use store::config::TableNames;
use store::counter_store::CounterStore;

/// The production registration table.
pub fn default_registrations(tables: &TableNames, counters: Arc<CounterStore>) -> Registrations {
    Registrations::new().register(
        tables.signatures.as_str(),
        EventAction::Modify,
        Arc::new(CompanyProjectCountHandler::new(counters)),
    )
}
