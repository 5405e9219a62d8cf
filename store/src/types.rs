//! Rows of the metrics table.

use serde::{Deserialize, Serialize};

pub const COMPANY_METRIC_PREFIX: &str = "company#";
pub const PROJECT_METRIC_PREFIX: &str = "project#";
pub const COMPANY_OBJECT_TYPE: &str = "company";
pub const PROJECT_OBJECT_TYPE: &str = "project";
pub const TOTAL_COUNT_ID: &str = "total_count";
pub const CLA_MANAGER_DISTRIBUTION_ID: &str = "cla_manager_distribution";

pub fn company_metric_id(company_id: &str) -> String {
    format!("{COMPANY_METRIC_PREFIX}{company_id}")
}

pub fn project_metric_id(cla_group_id: &str) -> String {
    format!("{PROJECT_METRIC_PREFIX}{cla_group_id}")
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompanyMetric {
    pub id: String,
    pub object_type: String,
    pub company_name: String,
    pub project_count: i64,
    pub corporate_contributors_count: i64,
    pub cla_managers_count: i64,
}

impl CompanyMetric {
    pub fn new(company_id: &str, company_name: &str, project_count: i64) -> Self {
        CompanyMetric {
            id: company_metric_id(company_id),
            object_type: COMPANY_OBJECT_TYPE.to_string(),
            company_name: company_name.to_string(),
            project_count,
            ..Default::default()
        }
    }

    /// The company identifier without the namespacing prefix.
    pub fn company_id(&self) -> &str {
        self.id
            .strip_prefix(COMPANY_METRIC_PREFIX)
            .unwrap_or(&self.id)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectMetric {
    pub id: String,
    pub object_type: String,
    pub external_project_id: String,
    pub cla_managers_count: i64,
    pub companies_count: i64,
    pub corporate_contributors_count: i64,
    pub individual_contributors_count: i64,
    pub repositories_count: i64,
    pub total_contributors_count: i64,
    pub created_at: String,
}

impl ProjectMetric {
    pub fn cla_group_id(&self) -> &str {
        self.id
            .strip_prefix(PROJECT_METRIC_PREFIX)
            .unwrap_or(&self.id)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TotalCountMetrics {
    pub id: String,
    pub cla_managers_count: i64,
    pub contributors_count: i64,
    pub corporate_contributors_count: i64,
    pub individual_contributors_count: i64,
    pub companies_count: i64,
    pub projects_count: i64,
    pub repositories_count: i64,
    pub companies_project_contribution_count: i64,
    pub created_at: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClaManagerDistribution {
    pub id: String,
    pub one_cla_manager: i64,
    pub two_cla_managers: i64,
    pub three_cla_managers: i64,
    pub four_or_more_cla_managers: i64,
    pub created_at: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_company_metric_ids() {
        let metric = CompanyMetric::new("X", "Acme", 1);
        assert_eq!(metric.id, "company#X");
        assert_eq!(metric.company_id(), "X");
        assert_eq!(metric.object_type, "company");
    }

    #[test]
    fn test_decode_tolerates_missing_counts() {
        let metric: CompanyMetric =
            serde_json::from_value(serde_json::json!({"id": "company#Y", "project_count": 4}))
                .unwrap();
        assert_eq!(metric.project_count, 4);
        assert_eq!(metric.cla_managers_count, 0);
        assert_eq!(metric.company_name, "");
    }
}
