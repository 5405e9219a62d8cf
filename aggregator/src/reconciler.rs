//! Maps a foundation or project id onto the CLA groups enrolled under it,
//! with display fields filled in from the project hierarchy.

use crate::errors::Result;
use crate::fanout::FanOut;
use serde::Serialize;
use shared::error::Classify;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Duration;
use store::associations::{ProjectClaGroup, ProjectClaGroupRepository};
use store::cla_groups::ClaGroupRepository;
use upstreams::{ProjectDetails, ProjectHierarchyLookup, ProjectSummary};

/// One CLA group under the resolved id. Request scoped; never persisted.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ClaGroupModel {
    pub cla_group_id: String,
    pub cla_group_name: String,
    pub foundation_sfid: String,
    /// The sub-project when the group has exactly one, the foundation otherwise.
    pub project_sfid: String,
    pub project_name: String,
    pub project_logo: String,
    pub project_type: String,
    pub sub_project_ids: BTreeSet<String>,
    /// Display names of the sub-projects, filled only for multi-project groups.
    pub sub_projects: Vec<String>,
}

pub type ClaGroupMap = HashMap<String, ClaGroupModel>;

type Hierarchy = HashMap<String, ProjectSummary>;

fn hierarchy_of(details: &ProjectDetails) -> Hierarchy {
    let mut hierarchy: Hierarchy = details
        .projects
        .iter()
        .map(|p| (p.id.clone(), p.clone()))
        .collect();
    hierarchy.insert(details.id.clone(), details.summary());
    hierarchy
}

fn group_associations(rows: Vec<ProjectClaGroup>) -> ClaGroupMap {
    let mut groups = ClaGroupMap::new();
    for row in rows {
        groups
            .entry(row.cla_group_id.clone())
            .or_insert_with(|| ClaGroupModel {
                cla_group_id: row.cla_group_id.clone(),
                foundation_sfid: row.foundation_sfid.clone(),
                ..Default::default()
            })
            .sub_project_ids
            .insert(row.project_sfid);
    }
    groups
}

#[derive(Clone)]
pub struct ProjectHierarchyReconciler {
    projects: Arc<dyn ProjectHierarchyLookup>,
    associations: Arc<dyn ProjectClaGroupRepository>,
    cla_groups: Arc<dyn ClaGroupRepository>,
    branch_timeout: Duration,
}

impl ProjectHierarchyReconciler {
    pub fn new(
        projects: Arc<dyn ProjectHierarchyLookup>,
        associations: Arc<dyn ProjectClaGroupRepository>,
        cla_groups: Arc<dyn ClaGroupRepository>,
        branch_timeout: Duration,
    ) -> Self {
        ProjectHierarchyReconciler {
            projects,
            associations,
            cla_groups,
            branch_timeout,
        }
    }

    /// The CLA groups under `id`, keyed by CLA group id. Empty when nothing
    /// is enrolled under it.
    pub async fn resolve_cla_groups_under(&self, id: &str) -> Result<ClaGroupMap> {
        let mut details = self.projects.get_project(id).await?;

        let rows = if details.is_foundation() {
            self.associations.get_associations_for_foundation(id).await?
        } else {
            let association = match self.associations.get_association_for_project(id).await {
                Ok(association) => association,
                Err(e) if e.is_not_found() => return Ok(ClaGroupMap::new()),
                Err(e) => return Err(e.into()),
            };
            let rows = self
                .associations
                .get_associations_for_cla_group(&association.cla_group_id)
                .await?;
            if rows.len() > 1 {
                let foundation = details
                    .parent_id()
                    .unwrap_or(association.foundation_sfid.as_str())
                    .to_string();
                if !foundation.is_empty() && foundation != details.id {
                    details = self.projects.get_project(&foundation).await?;
                }
            }
            rows
        };

        let groups = group_associations(rows);
        if groups.is_empty() {
            return Ok(groups);
        }

        let hierarchy = Arc::new(hierarchy_of(&details));
        let mut fanout = FanOut::new("resolve_cla_groups", self.branch_timeout);
        for (cla_group_id, group) in &groups {
            let group = group.clone();
            let hierarchy = hierarchy.clone();
            let cla_groups = self.cla_groups.clone();
            fanout.spawn(cla_group_id.clone(), async move {
                fill_cla_group(group, cla_groups.as_ref(), &hierarchy).await
            });
        }
        let mut filled = fanout.join().await;

        // Groups whose fill did not finish are returned as grouped.
        Ok(groups
            .into_iter()
            .map(|(id, group)| {
                let group = filled.take(&id).unwrap_or(group);
                (id, group)
            })
            .collect())
    }
}

async fn fill_cla_group(
    mut group: ClaGroupModel,
    cla_groups: &dyn ClaGroupRepository,
    hierarchy: &Hierarchy,
) -> ClaGroupModel {
    match cla_groups.get_cla_group(&group.cla_group_id).await {
        Ok(record) => group.cla_group_name = record.cla_group_name,
        Err(e) => {
            tracing::warn!(
                cla_group_id = %group.cla_group_id,
                error = %e,
                "unable to get details of cla group"
            );
        }
    }

    let representative = if group.sub_project_ids.len() == 1 {
        group.sub_project_ids.iter().next().cloned().unwrap_or_default()
    } else {
        for sub_project_id in &group.sub_project_ids {
            match hierarchy.get(sub_project_id) {
                Some(sub_project) => group.sub_projects.push(sub_project.name.clone()),
                None => {
                    tracing::warn!(
                        cla_group_id = %group.cla_group_id,
                        project_sfid = %sub_project_id,
                        "unable to fill cla group with project details"
                    );
                    return group;
                }
            }
        }
        group.foundation_sfid.clone()
    };

    match hierarchy.get(&representative) {
        Some(project) => {
            group.project_sfid = representative;
            group.project_name = project.name.clone();
            group.project_logo = project.project_logo.clone();
            group.project_type = project.project_type.to_string();
        }
        None => {
            tracing::warn!(
                cla_group_id = %group.cla_group_id,
                project_sfid = %representative,
                "unable to fill cla group with project details"
            );
        }
    }
    group
}
