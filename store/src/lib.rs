pub mod associations;
pub mod cla_groups;
pub mod companies;
pub mod config;
pub mod counter_store;
pub mod dashboard;
pub mod errors;
pub mod events;
pub mod kv;
pub mod memory;
pub mod metrics_defs;
pub mod page_token;
pub mod signatures;
pub mod types;
pub mod users;

use associations::{KvProjectClaGroupRepository, ProjectClaGroupRepository};
use cla_groups::{ClaGroupRepository, KvClaGroupRepository};
use companies::{CompanyRepository, KvCompanyRepository};
use config::TableNames;
use counter_store::CounterStore;
use dashboard::{DashboardSource, KvDashboardSource};
use events::{EventRepository, KvEventRepository};
use kv::KeyValueStore;
use memory::InMemoryStore;
use signatures::{KvSignatureRepository, SignatureRepository};
use std::sync::Arc;
use users::{KvUserRepository, UserRepository};

/// Creates every table of the stage that does not exist yet.
pub fn create_tables(store: &InMemoryStore, tables: &TableNames) {
    for (name, key_attribute) in tables.key_attributes() {
        store.create_table(name, key_attribute);
    }
}

/// All repositories of one stage, sharing a single key-value store.
#[derive(Clone)]
pub struct Stores {
    pub counters: Arc<CounterStore>,
    pub signatures: Arc<dyn SignatureRepository>,
    pub associations: Arc<dyn ProjectClaGroupRepository>,
    pub cla_groups: Arc<dyn ClaGroupRepository>,
    pub companies: Arc<dyn CompanyRepository>,
    pub users: Arc<dyn UserRepository>,
    pub events: Arc<dyn EventRepository>,
    pub dashboard: Arc<dyn DashboardSource>,
}

impl Stores {
    pub fn new(kv: Arc<dyn KeyValueStore>, tables: &TableNames) -> Self {
        Stores {
            counters: Arc::new(CounterStore::new(kv.clone(), tables.metrics.as_str())),
            signatures: Arc::new(KvSignatureRepository::new(
                kv.clone(),
                tables.signatures.as_str(),
            )),
            associations: Arc::new(KvProjectClaGroupRepository::new(
                kv.clone(),
                tables.projects_cla_groups.as_str(),
            )),
            cla_groups: Arc::new(KvClaGroupRepository::new(
                kv.clone(),
                tables.cla_groups.as_str(),
            )),
            companies: Arc::new(KvCompanyRepository::new(
                kv.clone(),
                tables.companies.as_str(),
            )),
            users: Arc::new(KvUserRepository::new(kv.clone(), tables.users.as_str())),
            events: Arc::new(KvEventRepository::new(kv.clone(), tables.events.as_str())),
            dashboard: Arc::new(KvDashboardSource::new(kv, tables.clone())),
        }
    }

    /// A fresh in-memory store with every table of `tables` created.
    pub fn in_memory(tables: &TableNames, page_size: usize) -> (Arc<InMemoryStore>, Self) {
        let kv = Arc::new(InMemoryStore::new(page_size));
        create_tables(&kv, tables);
        let stores = Stores::new(kv.clone(), tables);
        (kv, stores)
    }
}
