//! Read side of the metrics table and the dashboard counts.

use crate::errors::{Result, ServiceError};
use crate::fanout::FanOut;
use crate::metrics_defs::PARTIAL_RESULTS;
use serde::Serialize;
use shared::counter;
use std::sync::Arc;
use std::time::Duration;
use store::counter_store::CounterStore;
use store::dashboard::{DashboardSection, DashboardSource};
use store::types::{ClaManagerDistribution, CompanyMetric, ProjectMetric, TotalCountMetrics};

pub const TOP_COMPANIES: usize = 5;

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct CompanyMetricView {
    pub id: String,
    pub company_name: String,
    pub project_count: i64,
    pub corporate_contributors_count: i64,
    pub cla_managers_count: i64,
}

impl From<&CompanyMetric> for CompanyMetricView {
    fn from(metric: &CompanyMetric) -> Self {
        CompanyMetricView {
            id: metric.company_id().to_string(),
            company_name: metric.company_name.clone(),
            project_count: metric.project_count,
            corporate_contributors_count: metric.corporate_contributors_count,
            cla_managers_count: metric.cla_managers_count,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ProjectMetricView {
    pub id: String,
    pub external_project_id: String,
    pub cla_managers_count: i64,
    pub companies_count: i64,
    pub corporate_contributors_count: i64,
    pub individual_contributors_count: i64,
    pub repositories_count: i64,
    pub total_contributors_count: i64,
    pub created_at: String,
}

impl From<ProjectMetric> for ProjectMetricView {
    fn from(metric: ProjectMetric) -> Self {
        ProjectMetricView {
            id: metric.cla_group_id().to_string(),
            external_project_id: metric.external_project_id,
            cla_managers_count: metric.cla_managers_count,
            companies_count: metric.companies_count,
            corporate_contributors_count: metric.corporate_contributors_count,
            individual_contributors_count: metric.individual_contributors_count,
            repositories_count: metric.repositories_count,
            total_contributors_count: metric.total_contributors_count,
            created_at: metric.created_at,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct TotalCountView {
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

impl From<TotalCountMetrics> for TotalCountView {
    fn from(totals: TotalCountMetrics) -> Self {
        TotalCountView {
            cla_managers_count: totals.cla_managers_count,
            contributors_count: totals.contributors_count,
            corporate_contributors_count: totals.corporate_contributors_count,
            individual_contributors_count: totals.individual_contributors_count,
            companies_count: totals.companies_count,
            projects_count: totals.projects_count,
            repositories_count: totals.repositories_count,
            companies_project_contribution_count: totals.companies_project_contribution_count,
            created_at: totals.created_at,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ClaManagerDistributionView {
    pub one_cla_manager: i64,
    pub two_cla_managers: i64,
    pub three_cla_managers: i64,
    pub four_or_more_cla_managers: i64,
    pub created_at: String,
}

impl From<ClaManagerDistribution> for ClaManagerDistributionView {
    fn from(d: ClaManagerDistribution) -> Self {
        ClaManagerDistributionView {
            one_cla_manager: d.one_cla_manager,
            two_cla_managers: d.two_cla_managers,
            three_cla_managers: d.three_cla_managers,
            four_or_more_cla_managers: d.four_or_more_cla_managers,
            created_at: d.created_at,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct TopCompanies {
    pub top_companies_by_project_count: Vec<CompanyMetricView>,
    pub top_companies_by_corporate_contributors: Vec<CompanyMetricView>,
    pub top_companies_by_cla_managers: Vec<CompanyMetricView>,
    pub average_company_project_count: i64,
    pub average_company_corporate_contributors: i64,
    pub average_company_cla_managers: i64,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct SectionMetrics {
    pub total_count: i64,
}

/// Dashboard counts. A section whose count could not be fetched stays at zero.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct DashboardMetrics {
    pub users: SectionMetrics,
    pub signatures: SectionMetrics,
    pub companies: SectionMetrics,
    pub repositories: SectionMetrics,
    pub projects: SectionMetrics,
}

impl DashboardMetrics {
    fn section_mut(&mut self, section: DashboardSection) -> &mut SectionMetrics {
        match section {
            DashboardSection::Users => &mut self.users,
            DashboardSection::Signatures => &mut self.signatures,
            DashboardSection::Companies => &mut self.companies,
            DashboardSection::Repositories => &mut self.repositories,
            DashboardSection::Projects => &mut self.projects,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
struct Averages {
    projects: i64,
    corporate_contributors: i64,
    cla_managers: i64,
}

/// `numerator / denominator` rounded half away from zero; 0 when there is
/// nothing to divide by.
pub fn average(numerator: i64, denominator: i64) -> i64 {
    if denominator == 0 {
        return 0;
    }
    (numerator as f64 / denominator as f64).round() as i64
}

/// The `n` highest rows by `count`, ties broken by company id ascending.
fn top_by(
    mut rows: Vec<CompanyMetric>,
    count: fn(&CompanyMetric) -> i64,
    n: usize,
) -> Vec<CompanyMetricView> {
    rows.sort_by(|a, b| count(b).cmp(&count(a)).then_with(|| a.id.cmp(&b.id)));
    rows.iter().take(n).map(CompanyMetricView::from).collect()
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
enum TopCompaniesBranch {
    ByProjectCount,
    ByCorporateContributors,
    ByClaManagers,
    Averages,
}

enum BranchOutput {
    Ranking(Vec<CompanyMetricView>),
    Averages(Option<Averages>),
}

#[derive(Clone)]
pub struct MetricsService {
    counters: Arc<CounterStore>,
    dashboard: Arc<dyn DashboardSource>,
    branch_timeout: Duration,
}

impl MetricsService {
    pub fn new(
        counters: Arc<CounterStore>,
        dashboard: Arc<dyn DashboardSource>,
        branch_timeout: Duration,
    ) -> Self {
        MetricsService {
            counters,
            dashboard,
            branch_timeout,
        }
    }

    /// Three rankings of at most five companies each, and the per-company
    /// averages. Averages that cannot be computed are left at zero.
    pub async fn get_top_companies(&self) -> Result<TopCompanies> {
        let rows = self.counters.list_company_metrics().await?;
        let n = TOP_COMPANIES.min(rows.len());

        let mut fanout = FanOut::new("top_companies", self.branch_timeout);
        let rankings: [(TopCompaniesBranch, fn(&CompanyMetric) -> i64); 3] = [
            (TopCompaniesBranch::ByProjectCount, |m| m.project_count),
            (TopCompaniesBranch::ByCorporateContributors, |m| {
                m.corporate_contributors_count
            }),
            (TopCompaniesBranch::ByClaManagers, |m| m.cla_managers_count),
        ];
        for (branch, count) in rankings {
            let rows = rows.clone();
            fanout.spawn(branch, async move {
                BranchOutput::Ranking(top_by(rows, count, n))
            });
        }
        let counters = self.counters.clone();
        fanout.spawn(TopCompaniesBranch::Averages, async move {
            match counters.get_total_count_metrics().await {
                Ok(totals) => BranchOutput::Averages(Some(Averages {
                    projects: average(
                        totals.companies_project_contribution_count,
                        totals.companies_count,
                    ),
                    corporate_contributors: average(
                        totals.corporate_contributors_count,
                        totals.companies_count,
                    ),
                    cla_managers: average(totals.cla_managers_count, totals.companies_count),
                })),
                Err(e) => {
                    tracing::warn!(error = %e, "unable to get total count metrics");
                    BranchOutput::Averages(None)
                }
            }
        });

        let mut results = fanout.join().await;
        let mut ranking = |branch| match results.take(&branch) {
            Some(BranchOutput::Ranking(rows)) => Ok(rows),
            _ => Err(ServiceError::Internal(format!(
                "ranking {branch:?} did not complete"
            ))),
        };
        let top_companies_by_project_count = ranking(TopCompaniesBranch::ByProjectCount)?;
        let top_companies_by_corporate_contributors =
            ranking(TopCompaniesBranch::ByCorporateContributors)?;
        let top_companies_by_cla_managers = ranking(TopCompaniesBranch::ByClaManagers)?;

        let averages = match results.take(&TopCompaniesBranch::Averages) {
            Some(BranchOutput::Averages(Some(averages))) => averages,
            _ => {
                counter!(PARTIAL_RESULTS, "aggregate" => "top_companies").increment(1);
                Averages::default()
            }
        };

        Ok(TopCompanies {
            top_companies_by_project_count,
            top_companies_by_corporate_contributors,
            top_companies_by_cla_managers,
            average_company_project_count: averages.projects,
            average_company_corporate_contributors: averages.corporate_contributors,
            average_company_cla_managers: averages.cla_managers,
        })
    }

    pub async fn get_company_metric(&self, company_id: &str) -> Result<CompanyMetricView> {
        let metric = self.counters.get_company_metric(company_id).await?;
        Ok(CompanyMetricView::from(&metric))
    }

    /// Company metrics by project count, highest first, with `pinned` leading
    /// when it has a row. At most `top_n` entries.
    pub async fn list_company_metrics(
        &self,
        pinned: Option<&str>,
        top_n: usize,
    ) -> Result<Vec<CompanyMetricView>> {
        let rows = self
            .counters
            .scan_all_company_metrics(pinned, top_n)
            .await?;
        Ok(rows.iter().map(CompanyMetricView::from).collect())
    }

    pub async fn get_project_metric(&self, cla_group_id: &str) -> Result<ProjectMetricView> {
        Ok(self.counters.get_project_metric(cla_group_id).await?.into())
    }

    pub async fn get_total_count_metrics(&self) -> Result<TotalCountView> {
        Ok(self.counters.get_total_count_metrics().await?.into())
    }

    pub async fn get_cla_manager_distribution(&self) -> Result<ClaManagerDistributionView> {
        Ok(self.counters.get_cla_manager_distribution().await?.into())
    }

    /// Best effort: a section that fails is logged and left at zero; the call
    /// itself always succeeds.
    pub async fn get_metrics(&self) -> DashboardMetrics {
        let mut fanout = FanOut::new("dashboard", self.branch_timeout);
        for section in DashboardSection::ALL {
            let source = self.dashboard.clone();
            fanout.spawn(section, async move { source.total_count(section).await });
        }

        let results = fanout.join().await;
        let mut out = DashboardMetrics::default();
        let mut omitted = results.failed.len();
        for (section, failure) in &results.failed {
            tracing::warn!(
                section = section.as_str(),
                failure = failure.as_str(),
                "unable to get dashboard section"
            );
        }
        for (section, result) in results.completed {
            match result {
                Ok(total_count) => out.section_mut(section).total_count = total_count,
                Err(e) => {
                    omitted += 1;
                    tracing::warn!(
                        section = section.as_str(),
                        error = %e,
                        "unable to get dashboard section"
                    );
                }
            }
        }
        if omitted > 0 {
            counter!(PARTIAL_RESULTS, "aggregate" => "dashboard").increment(1);
        }
        out
    }
}
