//! CLA-group lifecycle: validation, creation with template attachment,
//! project enrollment, deletion, per-foundation listing and the foundation
//! mapping.

use crate::errors::{Result, ServiceError};
use crate::fanout::FanOut;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use shared::error::Classify;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use store::Stores;
use store::associations::{ProjectClaGroup, ProjectClaGroupRepository};
use store::cla_groups::{ClaGroup, ClaGroupRepository};
use store::counter_store::CounterStore;
use upstreams::{ProjectDetails, ProjectHierarchyLookup};

/// Apache style template, used when the request names none.
pub const DEFAULT_TEMPLATE_ID: &str = "fb4cc144-a76c-4c17-8a52-c648f158fded";

const CLA_GROUP_VERSION: &str = "v2";

const UNDEFINED_FOUNDATION_NAME: &str = "Not Defined";

/// Attaches a document template to a CLA group.
#[async_trait]
pub trait TemplateService: Send + Sync {
    async fn attach_template(&self, cla_group_id: &str, template_id: &str) -> Result<()>;
}

/// Accepts attachments of known template ids. Rendering the documents
/// happens outside this service.
pub struct TemplateCatalog {
    known: HashSet<String>,
}

impl TemplateCatalog {
    pub fn new<I, S>(template_ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        TemplateCatalog {
            known: template_ids.into_iter().map(Into::into).collect(),
        }
    }
}

impl Default for TemplateCatalog {
    fn default() -> Self {
        TemplateCatalog::new([DEFAULT_TEMPLATE_ID])
    }
}

#[async_trait]
impl TemplateService for TemplateCatalog {
    async fn attach_template(&self, cla_group_id: &str, template_id: &str) -> Result<()> {
        if !self.known.contains(template_id) {
            return Err(ServiceError::validation(format!(
                "unknown template_id {template_id}"
            )));
        }
        tracing::info!(%cla_group_id, %template_id, "template attached to cla group");
        Ok(())
    }
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct CreateClaGroupInput {
    pub cla_group_name: String,
    #[serde(default)]
    pub cla_group_description: String,
    pub foundation_sfid: String,
    pub icla_enabled: bool,
    pub ccla_enabled: bool,
    pub ccla_requires_icla: bool,
    #[serde(default)]
    pub project_sfid_list: Vec<String>,
    #[serde(default)]
    pub template_id: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ClaGroupProject {
    pub project_sfid: String,
    pub project_name: String,
    pub repositories_count: i64,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ClaGroupOutput {
    pub cla_group_id: String,
    pub cla_group_name: String,
    pub cla_group_description: String,
    pub foundation_sfid: String,
    pub foundation_name: String,
    pub icla_enabled: bool,
    pub ccla_enabled: bool,
    pub ccla_requires_icla: bool,
    pub project_list: Vec<ClaGroupProject>,
    /// Root repositories plus those of every enrolled project.
    pub repositories_count: i64,
    pub root_project_repositories_count: i64,
    /// Corporate plus individual contributors, from the group's project metric.
    pub total_signatures: i64,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ClaGroupValidation {
    pub valid: bool,
    pub validation_errors: Vec<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ClaGroupProjects {
    pub cla_group_id: String,
    pub project_sfid_list: Vec<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct FoundationMapping {
    pub foundation_sfid: String,
    pub cla_groups: Vec<ClaGroupProjects>,
}

/// Groups association rows per foundation and CLA group, both in first-seen order.
fn to_foundation_mapping(rows: Vec<ProjectClaGroup>) -> Vec<FoundationMapping> {
    let mut mappings: Vec<FoundationMapping> = Vec::new();
    let mut foundation_index: HashMap<String, usize> = HashMap::new();
    let mut group_index: HashMap<String, (usize, usize)> = HashMap::new();

    for row in rows {
        if let Some(&(f, g)) = group_index.get(&row.cla_group_id) {
            mappings[f].cla_groups[g].project_sfid_list.push(row.project_sfid);
            continue;
        }
        let f = *foundation_index
            .entry(row.foundation_sfid.clone())
            .or_insert_with(|| {
                mappings.push(FoundationMapping {
                    foundation_sfid: row.foundation_sfid.clone(),
                    cla_groups: Vec::new(),
                });
                mappings.len() - 1
            });
        let groups = &mut mappings[f].cla_groups;
        group_index.insert(row.cla_group_id.clone(), (f, groups.len()));
        groups.push(ClaGroupProjects {
            cla_group_id: row.cla_group_id,
            project_sfid_list: vec![row.project_sfid],
        });
    }
    mappings
}

#[derive(Clone)]
pub struct ClaGroupService {
    projects: Arc<dyn ProjectHierarchyLookup>,
    associations: Arc<dyn ProjectClaGroupRepository>,
    cla_groups: Arc<dyn ClaGroupRepository>,
    counters: Arc<CounterStore>,
    templates: Arc<dyn TemplateService>,
    branch_timeout: Duration,
}

impl ClaGroupService {
    pub fn new(
        stores: &Stores,
        projects: Arc<dyn ProjectHierarchyLookup>,
        templates: Arc<dyn TemplateService>,
        branch_timeout: Duration,
    ) -> Self {
        ClaGroupService {
            projects,
            associations: stores.associations.clone(),
            cla_groups: stores.cla_groups.clone(),
            counters: stores.counters.clone(),
            templates,
            branch_timeout,
        }
    }

    /// Checks the optional name for uniqueness, reporting every problem found.
    pub async fn validate_cla_group(&self, cla_group_name: Option<&str>) -> ClaGroupValidation {
        let mut validation = ClaGroupValidation {
            valid: true,
            validation_errors: Vec::new(),
        };
        if let Some(name) = cla_group_name {
            match self.cla_groups.get_cla_group_by_name(name).await {
                Ok(Some(_)) => {
                    validation.valid = false;
                    validation
                        .validation_errors
                        .push(format!("CLA Group with name {name} already exist"));
                }
                Ok(None) => {}
                Err(e) => {
                    validation.valid = false;
                    validation
                        .validation_errors
                        .push(format!("unable to query cla groups: {e}"));
                }
            }
        }
        validation
    }

    /// Validates the create input and returns the foundation's hierarchy
    /// entry along with whether it is a standalone project.
    async fn validate_create_input(
        &self,
        input: &CreateClaGroupInput,
    ) -> Result<(ProjectDetails, bool)> {
        if input.foundation_sfid.is_empty() {
            return Err(ServiceError::validation("foundation_sfid cannot be empty"));
        }
        if input.cla_group_name.trim().is_empty() {
            return Err(ServiceError::validation("cla_group_name cannot be empty"));
        }
        if !input.icla_enabled && !input.ccla_enabled {
            return Err(ServiceError::validation(
                "can not create cla group with both icla and ccla disabled",
            ));
        }
        if input.ccla_requires_icla && !(input.icla_enabled && input.ccla_enabled) {
            return Err(ServiceError::validation(
                "ccla_requires_icla can not be enabled if one of icla/ccla is disabled",
            ));
        }
        if self
            .cla_groups
            .get_cla_group_by_name(&input.cla_group_name)
            .await?
            .is_some()
        {
            return Err(ServiceError::validation(format!(
                "cla_group with name {} already exist",
                input.cla_group_name
            )));
        }

        let foundation = match self.projects.get_project(&input.foundation_sfid).await {
            Ok(details) => details,
            Err(e) if e.is_not_found() => {
                return Err(ServiceError::validation("invalid foundation_sfid"));
            }
            Err(e) => return Err(e.into()),
        };

        if foundation.is_standalone() {
            if !input.project_sfid_list.is_empty() {
                return Err(ServiceError::validation(
                    "invalid project_sfid_list. This project does not have subprojects",
                ));
            }
            return Ok((foundation, true));
        }
        self.validate_enroll_input(&foundation, &input.project_sfid_list)
            .await?;
        Ok((foundation, false))
    }

    async fn validate_enroll_input(
        &self,
        foundation: &ProjectDetails,
        project_sfids: &[String],
    ) -> Result<()> {
        if project_sfids.is_empty() {
            return Err(ServiceError::validation(
                "there should be at least one subproject associated",
            ));
        }
        if foundation.parent_id().is_some() {
            return Err(ServiceError::validation(
                "invalid input foundation_sfid. It have parent project",
            ));
        }
        if foundation.projects.is_empty() {
            return Err(ServiceError::validation(
                "invalid input to enroll projects. project does not have subprojects",
            ));
        }

        let children: HashSet<&str> = foundation.projects.iter().map(|p| p.id.as_str()).collect();
        let outside: BTreeSet<&str> = project_sfids
            .iter()
            .map(String::as_str)
            .filter(|id| !children.contains(id))
            .collect();
        if !outside.is_empty() {
            return Err(ServiceError::validation(format!(
                "invalid project_sfid: {outside:?}. These project is not under foundation"
            )));
        }

        let enrolled: HashSet<String> = self
            .associations
            .get_associations_for_foundation(&foundation.id)
            .await?
            .into_iter()
            .map(|row| row.project_sfid)
            .collect();
        let already: BTreeSet<&str> = project_sfids
            .iter()
            .map(String::as_str)
            .filter(|id| enrolled.contains(*id))
            .collect();
        if !already.is_empty() {
            return Err(ServiceError::validation(format!(
                "invalid project_sfid passed : {already:?}. These project is already enrolled in one of the cla_group"
            )));
        }
        Ok(())
    }

    /// Enrolls every project; on the first failure the group's rows for these
    /// projects are removed again.
    async fn enroll_projects(
        &self,
        cla_group_id: &str,
        foundation: &ProjectDetails,
        project_sfids: &[String],
    ) -> Result<()> {
        let hierarchy = {
            let mut names: HashMap<&str, &str> = foundation
                .projects
                .iter()
                .map(|p| (p.id.as_str(), p.name.as_str()))
                .collect();
            names.insert(foundation.id.as_str(), foundation.name.as_str());
            names
        };

        for project_sfid in project_sfids {
            tracing::debug!(%cla_group_id, %project_sfid, "associating cla group with project");
            let row = ProjectClaGroup {
                project_sfid: project_sfid.clone(),
                cla_group_id: cla_group_id.to_string(),
                foundation_sfid: foundation.id.clone(),
                project_name: hierarchy
                    .get(project_sfid.as_str())
                    .copied()
                    .unwrap_or_default()
                    .to_string(),
                foundation_name: foundation.name.clone(),
                repositories_count: 0,
            };
            if let Err(e) = self.associations.associate_project_with_cla_group(&row).await {
                tracing::error!(
                    %cla_group_id,
                    %project_sfid,
                    error = %e,
                    "associating cla group with project failed"
                );
                if let Err(cleanup) = self
                    .associations
                    .remove_associations(cla_group_id, project_sfids, false)
                    .await
                {
                    tracing::error!(
                        %cla_group_id,
                        error = %cleanup,
                        "deleting stale cla group associations failed"
                    );
                }
                return Err(e.into());
            }
        }
        Ok(())
    }

    async fn delete_created_group(&self, cla_group_id: &str) {
        tracing::debug!(%cla_group_id, "deleting created cla group");
        if let Err(e) = self.cla_groups.delete_cla_group(cla_group_id).await {
            tracing::error!(%cla_group_id, error = %e, "deleting created cla group failed");
        }
    }

    pub async fn create_cla_group(
        &self,
        input: CreateClaGroupInput,
        project_manager: &str,
    ) -> Result<ClaGroupOutput> {
        let (foundation, standalone) = self
            .validate_create_input(&input)
            .await
            .inspect_err(|e| {
                tracing::warn!(error = %e, "validation of create cla group input failed")
            })?;

        let cla_group = self
            .cla_groups
            .create_cla_group(ClaGroup {
                cla_group_name: input.cla_group_name.clone(),
                description: input.cla_group_description.clone(),
                foundation_sfid: input.foundation_sfid.clone(),
                external_id: input.foundation_sfid.clone(),
                icla_enabled: input.icla_enabled,
                ccla_enabled: input.ccla_enabled,
                ccla_requires_icla: input.ccla_requires_icla,
                acl: vec![project_manager.to_string()],
                version: CLA_GROUP_VERSION.to_string(),
                ..Default::default()
            })
            .await?;
        let cla_group_id = cla_group.cla_group_id.as_str();
        tracing::debug!(%cla_group_id, "cla group created");

        let template_id = input
            .template_id
            .as_deref()
            .filter(|id| !id.is_empty())
            .unwrap_or(DEFAULT_TEMPLATE_ID);
        if let Err(e) = self.templates.attach_template(cla_group_id, template_id).await {
            tracing::error!(
                %cla_group_id,
                %template_id,
                error = %e,
                "attaching cla group template failed"
            );
            self.delete_created_group(cla_group_id).await;
            return Err(e);
        }

        // A standalone project enrolls itself.
        let mut project_sfids = input.project_sfid_list;
        if standalone {
            project_sfids.push(foundation.id.clone());
        }
        if let Err(e) = self
            .enroll_projects(cla_group_id, &foundation, &project_sfids)
            .await
        {
            self.delete_created_group(cla_group_id).await;
            return Err(e);
        }

        let mut rows = self
            .associations
            .get_associations_for_cla_group(cla_group_id)
            .await?;
        rows.sort_by(|a, b| a.project_sfid.cmp(&b.project_sfid));
        let foundation_name = rows
            .first()
            .map(|row| row.foundation_name.clone())
            .unwrap_or_else(|| foundation.name.clone());
        let project_list = rows
            .into_iter()
            .filter(|row| row.project_sfid != row.foundation_sfid)
            .map(|row| ClaGroupProject {
                project_sfid: row.project_sfid,
                project_name: row.project_name,
                repositories_count: row.repositories_count,
            })
            .collect::<Vec<_>>();
        let repositories_count = project_list.iter().map(|p| p.repositories_count).sum();

        Ok(ClaGroupOutput {
            cla_group_id: cla_group.cla_group_id.clone(),
            cla_group_name: cla_group.cla_group_name,
            cla_group_description: cla_group.description,
            foundation_sfid: cla_group.foundation_sfid,
            foundation_name,
            icla_enabled: cla_group.icla_enabled,
            ccla_enabled: cla_group.ccla_enabled,
            ccla_requires_icla: cla_group.ccla_requires_icla,
            project_list,
            repositories_count,
            ..Default::default()
        })
    }

    pub async fn enroll_projects_in_cla_group(
        &self,
        cla_group_id: &str,
        foundation_sfid: &str,
        project_sfids: &[String],
    ) -> Result<()> {
        self.cla_groups.get_cla_group(cla_group_id).await?;
        let foundation = self.projects.get_project(foundation_sfid).await?;
        self.validate_enroll_input(&foundation, project_sfids)
            .await
            .inspect_err(|e| {
                tracing::warn!(%cla_group_id, error = %e, "validating enroll project input failed")
            })?;
        self.enroll_projects(cla_group_id, &foundation, project_sfids)
            .await?;
        tracing::debug!(%cla_group_id, %foundation_sfid, "projects enrolled in cla group");
        Ok(())
    }

    /// Removes every association of the group, then the group record.
    pub async fn delete_cla_group(&self, cla_group_id: &str) -> Result<()> {
        self.cla_groups.get_cla_group(cla_group_id).await?;
        self.associations
            .remove_associations(cla_group_id, &[], true)
            .await?;
        self.cla_groups.delete_cla_group(cla_group_id).await?;
        tracing::info!(%cla_group_id, "cla group deleted");
        Ok(())
    }

    async fn foundation_name(&self, foundation_sfid: &str) -> String {
        match self.projects.get_project(foundation_sfid).await {
            Ok(details) => details.name,
            Err(e) => {
                tracing::warn!(
                    %foundation_sfid,
                    error = %e,
                    "unable to look up foundation, using the default name"
                );
                UNDEFINED_FOUNDATION_NAME.to_string()
            }
        }
    }

    /// The CLA groups of a foundation with their enrolled projects, repository
    /// counts and signature totals, sorted by foundation name then group name.
    /// A group whose metric cannot be read keeps a zero total.
    pub async fn list_cla_groups_for_foundation(
        &self,
        foundation_sfid: &str,
    ) -> Result<Vec<ClaGroupOutput>> {
        let records = self
            .cla_groups
            .get_cla_groups_by_foundation(foundation_sfid)
            .await?;

        let mut foundation_names: HashMap<String, String> = HashMap::new();
        let mut groups: HashMap<String, ClaGroupOutput> = HashMap::with_capacity(records.len());
        for record in records {
            let foundation_name = match foundation_names.get(&record.foundation_sfid) {
                Some(name) => name.clone(),
                None => {
                    let name = self.foundation_name(&record.foundation_sfid).await;
                    foundation_names.insert(record.foundation_sfid.clone(), name.clone());
                    name
                }
            };
            groups.insert(
                record.cla_group_id.clone(),
                ClaGroupOutput {
                    cla_group_id: record.cla_group_id,
                    cla_group_name: record.cla_group_name,
                    cla_group_description: record.description,
                    foundation_sfid: record.foundation_sfid,
                    foundation_name,
                    icla_enabled: record.icla_enabled,
                    ccla_enabled: record.ccla_enabled,
                    ccla_requires_icla: record.ccla_requires_icla,
                    project_list: Vec::new(),
                    repositories_count: record.root_project_repositories_count,
                    root_project_repositories_count: record.root_project_repositories_count,
                    total_signatures: 0,
                },
            );
        }

        let rows = self
            .associations
            .get_associations_for_foundation(foundation_sfid)
            .await?;
        for row in rows {
            // a standalone project's own row is not a sub-project
            if row.project_sfid == row.foundation_sfid {
                continue;
            }
            let Some(group) = groups.get_mut(&row.cla_group_id) else {
                tracing::warn!(
                    cla_group_id = %row.cla_group_id,
                    project_sfid = %row.project_sfid,
                    "association refers to an unknown cla group"
                );
                continue;
            };
            group.repositories_count += row.repositories_count;
            group.project_list.push(ClaGroupProject {
                project_sfid: row.project_sfid,
                project_name: row.project_name,
                repositories_count: row.repositories_count,
            });
        }

        let mut fanout = FanOut::new("cla_group_metrics", self.branch_timeout);
        for cla_group_id in groups.keys() {
            let counters = self.counters.clone();
            let cla_group_id = cla_group_id.clone();
            fanout.spawn(cla_group_id.clone(), async move {
                counters.get_project_metric(&cla_group_id).await
            });
        }
        let mut metrics = fanout.join().await;

        let mut list: Vec<ClaGroupOutput> = groups
            .into_values()
            .map(|mut group| {
                match metrics.take(&group.cla_group_id) {
                    Some(Ok(metric)) => {
                        group.total_signatures = metric.corporate_contributors_count
                            + metric.individual_contributors_count;
                    }
                    Some(Err(e)) => {
                        tracing::error!(
                            cla_group_id = %group.cla_group_id,
                            error = %e,
                            "unable to get cla group metrics"
                        );
                    }
                    None => {
                        tracing::error!(
                            cla_group_id = %group.cla_group_id,
                            "cla group metrics lookup did not complete"
                        );
                    }
                }
                group
                    .project_list
                    .sort_by(|a, b| a.project_sfid.cmp(&b.project_sfid));
                group
            })
            .collect();
        list.sort_by(|a, b| {
            a.foundation_name
                .cmp(&b.foundation_name)
                .then_with(|| a.cla_group_name.cmp(&b.cla_group_name))
        });
        Ok(list)
    }

    pub async fn list_all_foundation_cla_groups(
        &self,
        foundation_sfid: Option<&str>,
    ) -> Result<Vec<FoundationMapping>> {
        let rows = match foundation_sfid {
            Some(foundation_sfid) => {
                self.associations
                    .get_associations_for_foundation(foundation_sfid)
                    .await?
            }
            None => self.associations.get_all_associations().await?,
        };
        Ok(to_foundation_mapping(rows))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutils::{FakeProjects, FakeTemplates, associate, cla_group, in_memory_stores};
    use shared::error::ErrorKind;
    use store::types::ProjectMetric;
    use upstreams::ProjectType;

    struct Fixture {
        stores: Stores,
        templates: Arc<FakeTemplates>,
        service: ClaGroupService,
    }

    fn fixture(templates: FakeTemplates) -> Fixture {
        let stores = in_memory_stores();
        let projects = FakeProjects::default()
            .with_foundation("F", "Foundation", &[("p1", "One"), ("p2", "Two"), ("p3", "Three")])
            .with_project(ProjectDetails {
                id: "S".into(),
                name: "Solo".into(),
                project_type: ProjectType::Project,
                ..Default::default()
            });
        let templates = Arc::new(templates);
        let service = ClaGroupService::new(
            &stores,
            Arc::new(projects),
            templates.clone(),
            Duration::from_secs(5),
        );
        Fixture {
            stores,
            templates,
            service,
        }
    }

    fn input(name: &str, foundation: &str, projects: &[&str]) -> CreateClaGroupInput {
        CreateClaGroupInput {
            cla_group_name: name.into(),
            foundation_sfid: foundation.into(),
            icla_enabled: true,
            ccla_enabled: true,
            project_sfid_list: projects.iter().map(|p| p.to_string()).collect(),
            ..Default::default()
        }
    }

    async fn validation_message(service: &ClaGroupService, input: CreateClaGroupInput) -> String {
        match service.create_cla_group(input, "pm").await {
            Err(ServiceError::Validation(message)) => message,
            other => panic!("expected a validation error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_create_under_foundation() {
        let f = fixture(FakeTemplates::default());
        let output = f
            .service
            .create_cla_group(input("Group A", "F", &["p2", "p1"]), "pm")
            .await
            .unwrap();

        assert_eq!(output.foundation_name, "Foundation");
        let projects: Vec<_> = output
            .project_list
            .iter()
            .map(|p| (p.project_sfid.as_str(), p.project_name.as_str()))
            .collect();
        assert_eq!(projects, vec![("p1", "One"), ("p2", "Two")]);

        let stored = f.stores.cla_groups.get_cla_group(&output.cla_group_id).await.unwrap();
        assert_eq!(stored.acl, vec!["pm"]);
        assert_eq!(stored.version, "v2");
        assert!(
            f.templates
                .attached
                .lock()
                .unwrap()
                .contains(&(output.cla_group_id.clone(), DEFAULT_TEMPLATE_ID.to_string()))
        );
    }

    #[tokio::test]
    async fn test_standalone_project_enrolls_itself() {
        let f = fixture(FakeTemplates::default());
        let output = f
            .service
            .create_cla_group(input("Solo Group", "S", &[]), "pm")
            .await
            .unwrap();
        assert!(output.project_list.is_empty());

        let row = f.stores.associations.get_association_for_project("S").await.unwrap();
        assert_eq!(row.cla_group_id, output.cla_group_id);
        assert_eq!(row.foundation_sfid, "S");

        let message = validation_message(&f.service, input("Other", "S", &["p1"])).await;
        assert!(message.contains("does not have subprojects"));
    }

    #[tokio::test]
    async fn test_create_validation() {
        let f = fixture(FakeTemplates::default());
        cla_group(&f.stores, "g0", "Taken", "F").await;
        associate(&f.stores, "g0", "F", &["p3"]).await;

        let mut disabled = input("A", "F", &["p1"]);
        disabled.icla_enabled = false;
        disabled.ccla_enabled = false;
        let mut requires = input("A", "F", &["p1"]);
        requires.icla_enabled = false;
        requires.ccla_requires_icla = true;

        let cases = [
            (input("A", "", &["p1"]), "foundation_sfid cannot be empty"),
            (disabled, "both icla and ccla disabled"),
            (requires, "ccla_requires_icla"),
            (input("Taken", "F", &["p1"]), "already exist"),
            (input("A", "nope", &["p1"]), "invalid foundation_sfid"),
            (input("A", "F", &[]), "at least one subproject"),
            (input("A", "F", &["p1", "x9"]), "\"x9\""),
            (input("A", "F", &["p3"]), "already enrolled"),
        ];
        for (case, expected) in cases {
            let message = validation_message(&f.service, case).await;
            assert!(message.contains(expected), "{message} should mention {expected}");
        }
        assert_eq!(f.stores.cla_groups.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_template_failure_deletes_group() {
        let f = fixture(FakeTemplates {
            failing: true,
            ..Default::default()
        });
        let err = f
            .service
            .create_cla_group(input("Group A", "F", &["p1"]), "pm")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Internal);
        assert_eq!(f.stores.cla_groups.count().await.unwrap(), 0);
        assert!(f.stores.associations.get_all_associations().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_enroll_failure_rolls_back() {
        let f = fixture(FakeTemplates::default());
        // the second association of p1 is rejected by the store
        let err = f
            .service
            .create_cla_group(input("Group A", "F", &["p1", "p1"]), "pm")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert_eq!(f.stores.cla_groups.count().await.unwrap(), 0);
        assert!(f.stores.associations.get_all_associations().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_enroll_and_delete() {
        let f = fixture(FakeTemplates::default());
        let output = f
            .service
            .create_cla_group(input("Group A", "F", &["p1"]), "pm")
            .await
            .unwrap();
        f.service
            .enroll_projects_in_cla_group(&output.cla_group_id, "F", &["p2".to_string()])
            .await
            .unwrap();
        let rows = f
            .stores
            .associations
            .get_associations_for_cla_group(&output.cla_group_id)
            .await
            .unwrap();
        assert_eq!(rows.len(), 2);

        let err = f
            .service
            .enroll_projects_in_cla_group(&output.cla_group_id, "F", &["p2".to_string()])
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);

        f.service.delete_cla_group(&output.cla_group_id).await.unwrap();
        assert_eq!(f.stores.cla_groups.count().await.unwrap(), 0);
        assert!(f.stores.associations.get_all_associations().await.unwrap().is_empty());

        let err = f.service.delete_cla_group(&output.cla_group_id).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_validate_cla_group() {
        let f = fixture(FakeTemplates::default());
        cla_group(&f.stores, "g0", "Taken", "F").await;

        assert!(f.service.validate_cla_group(None).await.valid);
        assert!(f.service.validate_cla_group(Some("Free")).await.valid);
        let taken = f.service.validate_cla_group(Some("Taken")).await;
        assert!(!taken.valid);
        assert_eq!(taken.validation_errors, vec!["CLA Group with name Taken already exist"]);
    }

    #[test]
    fn test_foundation_mapping_keeps_first_seen_order() {
        let row = |project: &str, group: &str, foundation: &str| ProjectClaGroup {
            project_sfid: project.into(),
            cla_group_id: group.into(),
            foundation_sfid: foundation.into(),
            ..Default::default()
        };
        let mapping = to_foundation_mapping(vec![
            row("p1", "g1", "F"),
            row("q1", "g9", "G"),
            row("p2", "g2", "F"),
            row("p3", "g1", "F"),
        ]);
        assert_eq!(mapping.len(), 2);
        assert_eq!(mapping[0].foundation_sfid, "F");
        assert_eq!(
            mapping[0].cla_groups,
            vec![
                ClaGroupProjects {
                    cla_group_id: "g1".into(),
                    project_sfid_list: vec!["p1".into(), "p3".into()],
                },
                ClaGroupProjects {
                    cla_group_id: "g2".into(),
                    project_sfid_list: vec!["p2".into()],
                },
            ]
        );
        assert_eq!(mapping[1].cla_groups[0].cla_group_id, "g9");
    }

    #[tokio::test]
    async fn test_template_catalog_rejects_unknown_ids() {
        let catalog = TemplateCatalog::default();
        catalog.attach_template("g1", DEFAULT_TEMPLATE_ID).await.unwrap();
        let err = catalog.attach_template("g1", "nope").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    async fn seed_group(stores: &Stores, id: &str, name: &str, foundation: &str, root_repos: i64) {
        stores
            .cla_groups
            .create_cla_group(ClaGroup {
                cla_group_id: id.into(),
                cla_group_name: name.into(),
                foundation_sfid: foundation.into(),
                root_project_repositories_count: root_repos,
                ..Default::default()
            })
            .await
            .unwrap();
    }

    async fn seed_project(
        stores: &Stores,
        project: &str,
        group: &str,
        foundation: &str,
        repos: i64,
    ) {
        stores
            .associations
            .associate_project_with_cla_group(&ProjectClaGroup {
                project_sfid: project.into(),
                cla_group_id: group.into(),
                foundation_sfid: foundation.into(),
                project_name: project.to_uppercase(),
                repositories_count: repos,
                ..Default::default()
            })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_list_cla_groups_for_foundation() {
        let f = fixture(FakeTemplates::default());
        seed_group(&f.stores, "g1", "Beta", "F", 2).await;
        seed_group(&f.stores, "g2", "Alpha", "F", 0).await;
        seed_group(&f.stores, "g3", "Gamma", "F", 1).await;
        seed_project(&f.stores, "p1", "g1", "F", 3).await;
        seed_project(&f.stores, "p2", "g1", "F", 4).await;
        seed_project(&f.stores, "p3", "g2", "F", 5).await;
        // refers to a group that no longer exists
        seed_project(&f.stores, "p4", "gone", "F", 8).await;
        f.stores
            .counters
            .put_project_metric(&ProjectMetric {
                id: "g1".into(),
                corporate_contributors_count: 7,
                individual_contributors_count: 3,
                ..Default::default()
            })
            .await
            .unwrap();
        f.stores
            .counters
            .put_project_metric(&ProjectMetric {
                id: "g2".into(),
                corporate_contributors_count: 1,
                ..Default::default()
            })
            .await
            .unwrap();

        let list = f.service.list_cla_groups_for_foundation("F").await.unwrap();
        let names: Vec<_> = list.iter().map(|g| g.cla_group_name.as_str()).collect();
        assert_eq!(names, vec!["Alpha", "Beta", "Gamma"]);

        let beta = &list[1];
        assert_eq!(beta.foundation_name, "Foundation");
        assert_eq!(beta.repositories_count, 9);
        assert_eq!(beta.root_project_repositories_count, 2);
        assert_eq!(beta.total_signatures, 10);
        let projects: Vec<_> = beta
            .project_list
            .iter()
            .map(|p| (p.project_sfid.as_str(), p.project_name.as_str()))
            .collect();
        assert_eq!(projects, vec![("p1", "P1"), ("p2", "P2")]);

        assert_eq!(list[0].total_signatures, 1);
        assert_eq!(list[0].repositories_count, 5);

        // no metric row: the group is still listed with a zero total
        let gamma = &list[2];
        assert_eq!(gamma.total_signatures, 0);
        assert_eq!(gamma.repositories_count, 1);
        assert!(gamma.project_list.is_empty());
    }

    #[tokio::test]
    async fn test_list_cla_groups_for_unknown_foundation() {
        let f = fixture(FakeTemplates::default());
        seed_group(&f.stores, "g1", "Standalone", "X", 0).await;
        seed_project(&f.stores, "X", "g1", "X", 6).await;

        let list = f.service.list_cla_groups_for_foundation("X").await.unwrap();
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].foundation_name, "Not Defined");
        assert!(list[0].project_list.is_empty());
        assert_eq!(list[0].repositories_count, 0);

        assert!(f.service.list_cla_groups_for_foundation("Y").await.unwrap().is_empty());
    }
}
