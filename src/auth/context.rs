use std::sync::Arc;
use uuid::Uuid;

use super::Claims;
use crate::domain::{Organization, Project, WorkPackage};
use crate::error::{ApiError, ApiResult};
use crate::repository::TenderRepository;

/// Authenticated user context extracted from JWT
#[derive(Debug, Clone)]
pub struct AuthContext {
    /// User ID (from JWT sub claim)
    pub user_id: Uuid,

    /// Supabase role, e.g. `authenticated`
    pub role: Option<String>,
}

impl AuthContext {
    pub fn from_claims(claims: &Claims) -> Result<Self, &'static str> {
        let user_id = Uuid::parse_str(&claims.sub).map_err(|_| "Invalid user ID in token")?;

        Ok(Self {
            user_id,
            role: claims.role.clone(),
        })
    }
}

/// Everything an operation needs to know about who is calling and where to
/// read and write: the verified identity, the caller's organization and the
/// repository handle.
#[derive(Clone)]
pub struct RequestContext {
    pub auth: AuthContext,
    pub organization: Organization,
    pub repo: Arc<dyn TenderRepository>,
}

impl RequestContext {
    pub fn new(auth: AuthContext, organization: Organization, repo: Arc<dyn TenderRepository>) -> Self {
        Self {
            auth,
            organization,
            repo,
        }
    }

    pub fn user_id(&self) -> Uuid {
        self.auth.user_id
    }

    pub fn organization_id(&self) -> Uuid {
        self.organization.id
    }

    /// Load a project owned by the caller's organization. Projects of other
    /// organizations are reported as missing.
    pub async fn project(&self, project_id: Uuid) -> ApiResult<Project> {
        self.repo
            .get_project(project_id)
            .await?
            .filter(|p| p.organization_id == self.organization.id)
            .ok_or_else(|| ApiError::not_found("Project not found"))
    }

    /// Load a work package together with its (accessible) project.
    pub async fn work_package(&self, work_package_id: Uuid) -> ApiResult<(WorkPackage, Project)> {
        let wp = self
            .repo
            .get_work_package(work_package_id)
            .await?
            .ok_or_else(|| ApiError::not_found("Work package not found"))?;

        let project = self
            .project(wp.project_id)
            .await
            .map_err(|_| ApiError::not_found("Work package not found"))?;

        Ok((wp, project))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn claims(sub: &str) -> Claims {
        Claims {
            sub: sub.to_string(),
            exp: 0,
            role: Some("authenticated".to_string()),
        }
    }

    #[test]
    fn auth_context_reads_subject_and_role() {
        let user_id = Uuid::new_v4();
        let auth = AuthContext::from_claims(&claims(&user_id.to_string())).unwrap();
        assert_eq!(auth.user_id, user_id);
        assert_eq!(auth.role.as_deref(), Some("authenticated"));
    }

    #[test]
    fn non_uuid_subject_is_rejected() {
        assert!(AuthContext::from_claims(&claims("service-account")).is_err());
    }
}
