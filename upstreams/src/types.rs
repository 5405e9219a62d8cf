use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProjectType {
    Foundation,
    #[default]
    Project,
    #[serde(other)]
    Other,
}

impl ProjectType {
    pub const fn as_str(&self) -> &'static str {
        match self {
            ProjectType::Foundation => "Foundation",
            ProjectType::Project => "Project",
            ProjectType::Other => "Other",
        }
    }
}

impl fmt::Display for ProjectType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A child entry of a project hierarchy response.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct ProjectSummary {
    #[serde(rename = "ID")]
    pub id: String,
    pub name: String,
    pub project_logo: String,
    pub project_type: ProjectType,
}

/// One node of the external project hierarchy together with its children.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct ProjectDetails {
    #[serde(rename = "ID")]
    pub id: String,
    pub name: String,
    pub project_logo: String,
    pub project_type: ProjectType,
    /// Empty for top-level projects.
    pub parent: String,
    pub projects: Vec<ProjectSummary>,
}

impl ProjectDetails {
    pub fn is_foundation(&self) -> bool {
        self.project_type == ProjectType::Foundation
    }

    pub fn parent_id(&self) -> Option<&str> {
        Some(self.parent.as_str()).filter(|p| !p.is_empty())
    }

    /// Neither a parent nor children.
    pub fn is_standalone(&self) -> bool {
        self.parent_id().is_none() && self.projects.is_empty()
    }

    pub fn summary(&self) -> ProjectSummary {
        ProjectSummary {
            id: self.id.clone(),
            name: self.name.clone(),
            project_logo: self.project_logo.clone(),
            project_type: self.project_type,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryUser {
    pub username: String,
    pub display_name: String,
    pub primary_email: Option<String>,
    /// The user's id in the external directory.
    pub external_id: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Organization {
    pub id: String,
    pub name: String,
    pub logo_url: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_project_details_wire_format() {
        let details: ProjectDetails = serde_json::from_value(serde_json::json!({
            "ID": "f1",
            "Name": "CNCF",
            "ProjectType": "Foundation",
            "Projects": [
                {
                    "ID": "p1",
                    "Name": "Kubernetes",
                    "ProjectLogo": "k8s.png",
                    "ProjectType": "Project"
                },
                {"ID": "p2", "Name": "Prometheus", "ProjectType": "Something"}
            ]
        }))
        .unwrap();

        assert!(details.is_foundation());
        assert_eq!(details.parent_id(), None);
        assert_eq!(details.projects.len(), 2);
        assert_eq!(details.projects[1].project_type, ProjectType::Other);
        assert!(!details.is_standalone());
    }
}
