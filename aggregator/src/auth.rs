//! The authenticated caller, as forwarded by the gateway in request headers.

use axum::extract::FromRequestParts;
use axum::http::HeaderMap;
use axum::http::request::Parts;
use std::convert::Infallible;

pub const USERNAME_HEADER: &str = "x-username";
pub const EMAIL_HEADER: &str = "x-email";
pub const SCOPES_HEADER: &str = "x-scopes";

pub const CLA_MANAGER_DESIGNEE_ROLE: &str = "cla-manager-designee";
pub const PROJECT_ORGANIZATION_RESOURCE: &str = "project|organization";
const ADMIN_ROLE: &str = "admin";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ScopeGrant {
    pub role: String,
    pub resource_type: String,
    pub resource_id: String,
}

impl ScopeGrant {
    /// Parses `role:resource_type:resource_id`.
    fn parse(raw: &str) -> Option<Self> {
        let mut parts = raw.trim().splitn(3, ':');
        let role = parts.next().filter(|r| !r.is_empty())?;
        let resource_type = parts.next()?;
        let resource_id = parts.next()?;
        Some(ScopeGrant {
            role: role.to_string(),
            resource_type: resource_type.to_string(),
            resource_id: resource_id.to_string(),
        })
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AuthUser {
    pub username: String,
    pub email: String,
    pub admin: bool,
    pub grants: Vec<ScopeGrant>,
}

impl AuthUser {
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let header = |name: &str| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .unwrap_or_default()
                .to_string()
        };
        let grants: Vec<ScopeGrant> = header(SCOPES_HEADER)
            .split(',')
            .filter(|s| !s.trim().is_empty())
            .filter_map(|raw| {
                let grant = ScopeGrant::parse(raw);
                if grant.is_none() {
                    tracing::debug!(scope = raw, "ignoring unparseable scope");
                }
                grant
            })
            .collect();
        let admin = grants.iter().any(|g| g.role == ADMIN_ROLE);

        AuthUser {
            username: header(USERNAME_HEADER),
            email: header(EMAIL_HEADER),
            admin,
            grants,
        }
    }

    pub fn has_grant(&self, role: &str, resource_type: &str, resource_id: &str) -> bool {
        self.grants.iter().any(|g| {
            g.role == role && g.resource_type == resource_type && g.resource_id == resource_id
        })
    }

    /// Whether the caller may sign the corporate CLA of `company_sfid` for `project_sfid`.
    pub fn can_sign(&self, project_sfid: &str, company_sfid: &str) -> bool {
        self.has_grant(
            CLA_MANAGER_DESIGNEE_ROLE,
            PROJECT_ORGANIZATION_RESOURCE,
            &format!("{project_sfid}|{company_sfid}"),
        )
    }
}

impl<S: Send + Sync> FromRequestParts<S> for AuthUser {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(AuthUser::from_headers(&parts.headers))
    }
}
