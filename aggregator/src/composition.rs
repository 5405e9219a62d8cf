//! Company views over one project or foundation: CLA managers, active and
//! unsigned CLAs, corporate contributors.

use crate::auth::AuthUser;
use crate::documents::DocumentLinker;
use crate::errors::{Result, ServiceError};
use crate::fanout::FanOut;
use crate::reconciler::{ClaGroupMap, ProjectHierarchyReconciler};
use serde::Serialize;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Duration;
use store::Stores;
use store::associations::ProjectClaGroupRepository;
use store::cla_groups::ClaGroupRepository;
use store::companies::CompanyRepository;
use store::signatures::{Signature, SignatureRepository, SignatureType, all_company_signatures};
use store::users::{User, UserRepository};
use upstreams::{DirectoryUser, OrganizationLookup, UserDirectoryLookup, Upstreams};

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct CompanyClaManager {
    pub lf_username: String,
    pub name: String,
    pub email: String,
    pub user_sfid: String,
    pub approved_on: String,
    /// The CLA group the manager's signature belongs to.
    pub project_id: String,
    pub project_sfid: String,
    pub project_name: String,
    pub cla_group_name: String,
    pub organization_name: String,
    pub organization_sfid: String,
}

impl CompanyClaManager {
    fn fill_user(&mut self, user: &DirectoryUser) {
        self.name = user.display_name.clone();
        self.email = user.primary_email.clone().unwrap_or_default();
        self.user_sfid = user.external_id.clone();
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ActiveCla {
    pub signature_id: String,
    pub project_id: String,
    pub cla_group_name: String,
    pub signed_on: String,
    pub project_name: String,
    pub project_sfid: String,
    pub project_type: String,
    pub project_logo: String,
    pub sub_projects: Vec<String>,
    pub signatory_name: String,
    pub ccla_url: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct UnsignedProject {
    pub can_sign: bool,
    pub cla_group_id: String,
    pub cla_group_name: String,
    pub project_name: String,
    pub project_sfid: String,
    pub sub_projects: Vec<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct CompanyProjectClaList {
    pub signed_cla_list: Vec<ActiveCla>,
    pub unsigned_project_list: Vec<UnsignedProject>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct CorporateContributor {
    pub github_id: String,
    pub linux_foundation_id: String,
    pub name: String,
    pub timestamp: String,
    pub signature_version: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct CompanyOutput {
    pub company_id: String,
    pub company_name: String,
    pub company_website: String,
    pub logo_url: String,
}

#[derive(Default)]
struct Enrichment {
    ccla_url: String,
    signatory_name: String,
}

#[derive(Clone)]
pub struct CompanyService {
    reconciler: ProjectHierarchyReconciler,
    signatures: Arc<dyn SignatureRepository>,
    companies: Arc<dyn CompanyRepository>,
    associations: Arc<dyn ProjectClaGroupRepository>,
    cla_groups: Arc<dyn ClaGroupRepository>,
    users: Arc<dyn UserRepository>,
    directory: Arc<dyn UserDirectoryLookup>,
    organizations: Arc<dyn OrganizationLookup>,
    documents: DocumentLinker,
    branch_timeout: Duration,
}

impl CompanyService {
    pub fn new(
        stores: &Stores,
        upstreams: &Upstreams,
        documents: DocumentLinker,
        branch_timeout: Duration,
    ) -> Self {
        CompanyService {
            reconciler: ProjectHierarchyReconciler::new(
                upstreams.projects.clone(),
                stores.associations.clone(),
                stores.cla_groups.clone(),
                branch_timeout,
            ),
            signatures: stores.signatures.clone(),
            companies: stores.companies.clone(),
            associations: stores.associations.clone(),
            cla_groups: stores.cla_groups.clone(),
            users: stores.users.clone(),
            directory: upstreams.users.clone(),
            organizations: upstreams.organizations.clone(),
            documents,
            branch_timeout,
        }
    }

    /// The company's CCLAs that belong to one of `groups`.
    async fn ccla_signatures_in(
        &self,
        company_id: &str,
        groups: &ClaGroupMap,
    ) -> Result<Vec<Signature>> {
        let signatures =
            all_company_signatures(self.signatures.as_ref(), company_id, Some(SignatureType::Ccla))
                .await?;
        Ok(signatures
            .into_iter()
            .filter(|s| groups.contains_key(&s.project_id))
            .collect())
    }

    /// One batched directory lookup for all distinct usernames.
    async fn lookup_users(
        &self,
        usernames: BTreeSet<String>,
    ) -> Result<HashMap<String, DirectoryUser>> {
        if usernames.is_empty() {
            return Ok(HashMap::new());
        }
        let usernames: Vec<String> = usernames.into_iter().collect();
        Ok(self.directory.get_users_by_usernames(&usernames).await?)
    }

    /// One row per ACL entry of the company's CCLAs under the project, sorted by name.
    pub async fn cla_managers(
        &self,
        company_id: &str,
        project_sfid: &str,
    ) -> Result<Vec<CompanyClaManager>> {
        let groups = self.reconciler.resolve_cla_groups_under(project_sfid).await?;
        let signatures = self.ccla_signatures_in(company_id, &groups).await?;

        let mut managers = Vec::new();
        let mut usernames = BTreeSet::new();
        for signature in &signatures {
            for username in &signature.signature_acl {
                usernames.insert(username.clone());
                managers.push(CompanyClaManager {
                    lf_username: username.clone(),
                    approved_on: signature.signature_created.clone(),
                    project_id: signature.project_id.clone(),
                    ..Default::default()
                });
            }
        }

        let users = self.lookup_users(usernames).await?;
        for manager in &mut managers {
            match users.get(&manager.lf_username) {
                Some(user) => manager.fill_user(user),
                None => tracing::warn!(username = %manager.lf_username, "unable to get user"),
            }
            if let Some(group) = groups.get(&manager.project_id) {
                manager.cla_group_name = group.cla_group_name.clone();
                manager.project_sfid = group.project_sfid.clone();
                manager.project_name = group.project_name.clone();
            }
        }

        managers.sort_by(|a, b| {
            a.name
                .cmp(&b.name)
                .then_with(|| a.lf_username.cmp(&b.lf_username))
        });
        Ok(managers)
    }

    /// The company's active CLAs under the project. Rows whose enrichment
    /// fails are kept with the enriched fields empty.
    pub async fn active_clas(
        &self,
        company_id: &str,
        project_sfid: &str,
    ) -> Result<Vec<ActiveCla>> {
        let groups = self.reconciler.resolve_cla_groups_under(project_sfid).await?;
        self.active_clas_in(company_id, &groups).await
    }

    async fn active_clas_in(
        &self,
        company_id: &str,
        groups: &ClaGroupMap,
    ) -> Result<Vec<ActiveCla>> {
        let signatures = self.ccla_signatures_in(company_id, groups).await?;

        let mut fanout = FanOut::new("active_clas", self.branch_timeout);
        for (index, signature) in signatures.iter().enumerate() {
            let documents = self.documents.clone();
            let directory = self.directory.clone();
            let signature = signature.clone();
            fanout.spawn(index, async move {
                let mut enrichment = Enrichment {
                    ccla_url: documents.signed_document_url(&signature),
                    ..Default::default()
                };
                match signature.signature_acl.first() {
                    Some(username) => match directory.get_user_by_username(username).await {
                        Ok(user) => enrichment.signatory_name = user.display_name,
                        Err(e) => tracing::warn!(%username, error = %e, "unable to get signatory"),
                    },
                    None => tracing::warn!(
                        signature_id = %signature.signature_id,
                        "signature has an empty acl"
                    ),
                }
                enrichment
            });
        }
        let mut enriched = fanout.join().await;

        Ok(signatures
            .into_iter()
            .enumerate()
            .filter_map(|(index, signature)| {
                let group = groups.get(&signature.project_id)?;
                let enrichment = enriched.take(&index).unwrap_or_default();
                Some(ActiveCla {
                    signature_id: signature.signature_id,
                    project_id: signature.project_id,
                    cla_group_name: group.cla_group_name.clone(),
                    signed_on: signature.signature_created,
                    project_name: group.project_name.clone(),
                    project_sfid: group.project_sfid.clone(),
                    project_type: group.project_type.clone(),
                    project_logo: group.project_logo.clone(),
                    sub_projects: group.sub_projects.clone(),
                    signatory_name: enrichment.signatory_name,
                    ccla_url: enrichment.ccla_url,
                })
            })
            .collect())
    }

    /// Signed CLAs of the company under the project, and the CLA groups it
    /// has not signed yet.
    pub async fn company_project_cla(
        &self,
        auth_user: &AuthUser,
        company_sfid: &str,
        project_sfid: &str,
    ) -> Result<CompanyProjectClaList> {
        let can_sign = auth_user.can_sign(project_sfid, company_sfid);
        let company = self.companies.get_company_by_external_id(company_sfid).await?;
        let mut groups = self.reconciler.resolve_cla_groups_under(project_sfid).await?;

        let signed_cla_list = self.active_clas_in(&company.company_id, &groups).await?;
        for active in &signed_cla_list {
            groups.remove(&active.project_id);
        }

        let mut unsigned_project_list: Vec<UnsignedProject> = groups
            .into_values()
            .map(|group| UnsignedProject {
                can_sign,
                cla_group_id: group.cla_group_id,
                cla_group_name: group.cla_group_name,
                project_name: group.project_name,
                project_sfid: group.project_sfid,
                sub_projects: group.sub_projects,
            })
            .collect();
        unsigned_project_list.sort_by(|a, b| a.cla_group_id.cmp(&b.cla_group_id));

        Ok(CompanyProjectClaList {
            signed_cla_list,
            unsigned_project_list,
        })
    }

    /// Employees who signed under the company's CCLA for the project's CLA
    /// group, optionally filtered by a case-insensitive username match.
    pub async fn contributors(
        &self,
        project_sfid: &str,
        company_sfid: &str,
        search_term: Option<&str>,
    ) -> Result<Vec<CorporateContributor>> {
        let company = async {
            Ok::<_, ServiceError>(self.companies.get_company_by_external_id(company_sfid).await?)
        };
        let cla_group = async {
            let association = self.associations.get_association_for_project(project_sfid).await?;
            Ok::<_, ServiceError>(self.cla_groups.get_cla_group(&association.cla_group_id).await?)
        };
        let (company, cla_group) = tokio::try_join!(company, cla_group)?;

        let signatures = self
            .signatures
            .get_project_company_employee_signatures(&company.company_id, &cla_group.cla_group_id)
            .await?;

        let mut fanout = FanOut::new("contributors", self.branch_timeout);
        for (index, signature) in signatures.iter().enumerate() {
            let users = self.users.clone();
            let user_id = signature.signature_reference_id.clone();
            fanout.spawn(index, async move {
                match users.get_user(&user_id).await {
                    Ok(user) => Some(user),
                    Err(e) => {
                        tracing::error!(%user_id, error = %e, "unable to get user info");
                        None
                    }
                }
            });
        }
        let mut users = fanout.join().await;

        let search = search_term
            .map(str::to_lowercase)
            .filter(|term| !term.is_empty());
        let matches = |user: &User| match &search {
            Some(term) => {
                user.username.to_lowercase().contains(term.as_str())
                    || user.lf_username.to_lowercase().contains(term.as_str())
            }
            None => true,
        };

        let mut contributors: Vec<CorporateContributor> = signatures
            .iter()
            .enumerate()
            .filter_map(|(index, signature)| {
                let user = users.take(&index).flatten()?;
                matches(&user).then(|| CorporateContributor {
                    github_id: user.user_github_id,
                    linux_foundation_id: user.lf_username,
                    name: user.username,
                    timestamp: signature.signature_created.clone(),
                    signature_version: signature.version(),
                })
            })
            .collect();
        contributors.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(contributors)
    }

    /// Managers of the company's signed and approved CCLA for one CLA group.
    pub async fn cla_group_managers(
        &self,
        company_id: &str,
        cla_group_id: &str,
    ) -> Result<Vec<CompanyClaManager>> {
        let signature = self
            .approved_ccla(company_id, cla_group_id)
            .await?
            .ok_or_else(|| {
                ServiceError::not_found("signature", format!("{company_id}/{cla_group_id}"))
            })?;

        let company = async {
            Ok::<_, ServiceError>(self.companies.get_company(company_id).await?)
        };
        let cla_group = async {
            Ok::<_, ServiceError>(self.cla_groups.get_cla_group(cla_group_id).await?)
        };
        let (company, cla_group) = tokio::try_join!(company, cla_group)?;

        let usernames: BTreeSet<String> = signature.signature_acl.iter().cloned().collect();
        let users = match self.lookup_users(usernames).await {
            Ok(users) => users,
            Err(e) => {
                tracing::warn!(
                    %company_id,
                    %cla_group_id,
                    error = %e,
                    "unable to look up cla managers"
                );
                HashMap::new()
            }
        };

        Ok(signature
            .signature_acl
            .iter()
            .map(|username| {
                let mut manager = CompanyClaManager {
                    lf_username: username.clone(),
                    approved_on: signature.signature_created.clone(),
                    project_id: signature.project_id.clone(),
                    project_name: cla_group.cla_group_name.clone(),
                    cla_group_name: cla_group.cla_group_name.clone(),
                    organization_name: company.company_name.clone(),
                    organization_sfid: company.company_external_id.clone(),
                    ..Default::default()
                };
                if let Some(user) = users.get(username) {
                    manager.fill_user(user);
                }
                manager
            })
            .collect())
    }

    async fn approved_ccla(
        &self,
        company_id: &str,
        cla_group_id: &str,
    ) -> Result<Option<Signature>> {
        let mut page_token = None;
        loop {
            let page = self
                .signatures
                .get_project_company_signatures(
                    company_id,
                    cla_group_id,
                    Some(true),
                    Some(true),
                    page_token,
                )
                .await?;
            if let Some(signature) = page.signatures.into_iter().next() {
                return Ok(Some(signature));
            }
            match page.next_page_token {
                Some(token) => page_token = Some(token),
                None => return Ok(None),
            }
        }
    }

    /// Registers the organization externally, then stores the company under
    /// the new organization id.
    pub async fn create_company(
        &self,
        name: &str,
        website: &str,
        user_id: &str,
    ) -> Result<CompanyOutput> {
        if name.trim().is_empty() {
            return Err(ServiceError::validation("company name is required"));
        }
        tracing::debug!(company_name = name, website, "creating organization");
        let organization = self.organizations.create_organization(name, website).await?;

        let company = self
            .companies
            .create_company(name, &organization.id, user_id)
            .await
            .inspect_err(|e| {
                tracing::warn!(company_name = name, error = %e, "failed to create company")
            })?;

        Ok(CompanyOutput {
            company_id: company.company_id,
            company_name: organization.name,
            company_website: website.to_string(),
            logo_url: organization.logo_url,
        })
    }
}
