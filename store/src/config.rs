use crate::memory::DEFAULT_PAGE_SIZE;
use serde::Deserialize;
use std::path::PathBuf;

#[derive(Clone, Deserialize, Debug, PartialEq)]
pub struct Config {
    /// Seed file for the in-memory store, written back on shutdown.
    pub snapshot_path: Option<PathBuf>,
    #[serde(default = "default_page_size")]
    pub page_size: usize,
    /// Overrides the derived `cla-{stage}-metrics` table.
    pub metrics_table: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            snapshot_path: None,
            page_size: DEFAULT_PAGE_SIZE,
            metrics_table: None,
        }
    }
}

fn default_page_size() -> usize {
    DEFAULT_PAGE_SIZE
}

/// Physical table names for one deployment stage.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TableNames {
    pub metrics: String,
    pub signatures: String,
    pub projects_cla_groups: String,
    pub cla_groups: String,
    pub companies: String,
    pub users: String,
    pub repositories: String,
    pub events: String,
}

impl TableNames {
    pub fn for_stage(stage: &str) -> Self {
        let table = |name: &str| format!("cla-{stage}-{name}");
        TableNames {
            metrics: table("metrics"),
            signatures: table("signatures"),
            projects_cla_groups: table("projects-cla-groups"),
            // CLA groups live in the legacy "projects" table
            cla_groups: table("projects"),
            companies: table("companies"),
            users: table("users"),
            repositories: table("repositories"),
            events: table("events"),
        }
    }

    pub fn with_metrics_table(mut self, metrics_table: Option<&str>) -> Self {
        if let Some(name) = metrics_table {
            self.metrics = name.to_string();
        }
        self
    }

    /// Every table paired with its key attribute.
    pub fn key_attributes(&self) -> [(&str, &'static str); 8] {
        [
            (self.metrics.as_str(), "id"),
            (self.signatures.as_str(), "signature_id"),
            (self.projects_cla_groups.as_str(), "project_sfid"),
            (self.cla_groups.as_str(), "project_id"),
            (self.companies.as_str(), "company_id"),
            (self.users.as_str(), "user_id"),
            (self.repositories.as_str(), "repository_id"),
            (self.events.as_str(), "event_id"),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_names_for_stage() {
        let tables = TableNames::for_stage("dev");
        assert_eq!(tables.signatures, "cla-dev-signatures");
        assert_eq!(tables.cla_groups, "cla-dev-projects");
        assert_eq!(tables.metrics, "cla-dev-metrics");

        let overridden = tables.with_metrics_table(Some("cla-dev-stream-test"));
        assert_eq!(overridden.metrics, "cla-dev-stream-test");
    }

    #[test]
    fn test_config_defaults() {
        let config: Config = serde_yaml::from_str("snapshot_path: /tmp/seed.json").unwrap();
        assert_eq!(config.page_size, DEFAULT_PAGE_SIZE);
        assert_eq!(config.snapshot_path, Some(PathBuf::from("/tmp/seed.json")));
        assert_eq!(config.metrics_table, None);
    }
}
