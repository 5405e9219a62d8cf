use crate::cla_groups::TemplateService;
use crate::errors::{Result, ServiceError};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use store::Stores;
use store::associations::ProjectClaGroup;
use store::cla_groups::ClaGroup;
use store::config::TableNames;
use upstreams::{
    DirectoryUser, Organization, OrganizationLookup, ProjectDetails, ProjectHierarchyLookup,
    ProjectSummary, ProjectType, UpstreamError, UserDirectoryLookup,
};

pub fn in_memory_stores() -> Stores {
    let (_, stores) = Stores::in_memory(&TableNames::for_stage("test"), 3);
    stores
}

pub fn summary(id: &str, name: &str) -> ProjectSummary {
    ProjectSummary {
        id: id.to_string(),
        name: name.to_string(),
        project_logo: format!("{id}.png"),
        project_type: ProjectType::Project,
    }
}

#[derive(Default)]
pub struct FakeProjects {
    projects: HashMap<String, ProjectDetails>,
    pub calls: AtomicUsize,
}

impl FakeProjects {
    /// A foundation with the given children, each child pointing back at it.
    pub fn with_foundation(mut self, id: &str, name: &str, children: &[(&str, &str)]) -> Self {
        let foundation = ProjectDetails {
            id: id.to_string(),
            name: name.to_string(),
            project_logo: format!("{id}.png"),
            project_type: ProjectType::Foundation,
            parent: String::new(),
            projects: children.iter().map(|(cid, cname)| summary(cid, cname)).collect(),
        };
        for (cid, cname) in children {
            self.projects.insert(
                cid.to_string(),
                ProjectDetails {
                    id: cid.to_string(),
                    name: cname.to_string(),
                    project_logo: format!("{cid}.png"),
                    project_type: ProjectType::Project,
                    parent: id.to_string(),
                    projects: Vec::new(),
                },
            );
        }
        self.projects.insert(id.to_string(), foundation);
        self
    }

    pub fn with_project(mut self, project: ProjectDetails) -> Self {
        self.projects.insert(project.id.clone(), project);
        self
    }
}

#[async_trait]
impl ProjectHierarchyLookup for FakeProjects {
    async fn get_project(&self, project_sfid: &str) -> Result<ProjectDetails, UpstreamError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.projects
            .get(project_sfid)
            .cloned()
            .ok_or_else(|| UpstreamError::not_found("project-service", project_sfid))
    }
}

#[derive(Default)]
pub struct FakeUsers {
    users: HashMap<String, DirectoryUser>,
    pub batch_calls: AtomicUsize,
    pub failing: bool,
}

impl FakeUsers {
    /// A directory whose every lookup fails.
    pub fn failing() -> Self {
        FakeUsers {
            failing: true,
            ..Default::default()
        }
    }

    pub fn with_user(mut self, username: &str, display_name: &str) -> Self {
        self.users.insert(
            username.to_string(),
            DirectoryUser {
                username: username.to_string(),
                display_name: display_name.to_string(),
                primary_email: Some(format!("{username}@example.org")),
                external_id: format!("ext-{username}"),
            },
        );
        self
    }
}

#[async_trait]
impl UserDirectoryLookup for FakeUsers {
    async fn get_users_by_usernames(
        &self,
        usernames: &[String],
    ) -> Result<HashMap<String, DirectoryUser>, UpstreamError> {
        self.batch_calls.fetch_add(1, Ordering::SeqCst);
        if self.failing {
            return Err(UpstreamError::RetriesExceeded {
                service: "user-service",
                attempts: 1,
            });
        }
        Ok(usernames
            .iter()
            .filter_map(|u| self.users.get(u).map(|user| (u.clone(), user.clone())))
            .collect())
    }

    async fn get_user_by_username(&self, username: &str) -> Result<DirectoryUser, UpstreamError> {
        if self.failing {
            return Err(UpstreamError::RetriesExceeded {
                service: "user-service",
                attempts: 1,
            });
        }
        self.users
            .get(username)
            .cloned()
            .ok_or_else(|| UpstreamError::not_found("user-service", username))
    }
}

#[derive(Default)]
pub struct FakeOrganizations {
    pub failing: bool,
}

#[async_trait]
impl OrganizationLookup for FakeOrganizations {
    async fn create_organization(
        &self,
        name: &str,
        _website: &str,
    ) -> Result<Organization, UpstreamError> {
        if self.failing {
            return Err(UpstreamError::RetriesExceeded {
                service: "organization-service",
                attempts: 1,
            });
        }
        Ok(Organization {
            id: format!("org-{}", name.to_lowercase()),
            name: name.to_string(),
            logo_url: format!("https://logos.example/{}.png", name.to_lowercase()),
        })
    }
}

#[derive(Default)]
pub struct FakeTemplates {
    pub failing: bool,
    pub attached: Mutex<HashSet<(String, String)>>,
}

#[async_trait]
impl TemplateService for FakeTemplates {
    async fn attach_template(&self, cla_group_id: &str, template_id: &str) -> Result<()> {
        if self.failing {
            return Err(ServiceError::Internal("template rendering failed".into()));
        }
        self.attached
            .lock()
            .unwrap()
            .insert((cla_group_id.to_string(), template_id.to_string()));
        Ok(())
    }
}

pub async fn associate(
    stores: &Stores,
    cla_group_id: &str,
    foundation_sfid: &str,
    project_sfids: &[&str],
) {
    for project_sfid in project_sfids {
        stores
            .associations
            .associate_project_with_cla_group(&ProjectClaGroup {
                project_sfid: project_sfid.to_string(),
                cla_group_id: cla_group_id.to_string(),
                foundation_sfid: foundation_sfid.to_string(),
                ..Default::default()
            })
            .await
            .unwrap();
    }
}

pub async fn cla_group(stores: &Stores, cla_group_id: &str, name: &str, foundation_sfid: &str) {
    stores
        .cla_groups
        .create_cla_group(ClaGroup {
            cla_group_id: cla_group_id.to_string(),
            cla_group_name: name.to_string(),
            foundation_sfid: foundation_sfid.to_string(),
            ccla_enabled: true,
            ..Default::default()
        })
        .await
        .unwrap();
}
