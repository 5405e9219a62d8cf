pub mod admin_service;
pub mod error;
pub mod http;
pub mod metrics_defs;
