//! Persistence seam for the tender workflow.
//!
//! Handlers and the generation pipeline only talk to [`TenderRepository`];
//! [`PgTenderRepository`] is the production implementation.

pub mod postgres;

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::{
    NewDocument, NewProject, NewWorkPackage, Organization, OrganizationDocument,
    OrganizationSettings, Project, ProjectDocument, Strategy, WorkPackage, WorkPackageContent,
    WorkPackageStatus,
};
use crate::error::ApiResult;

pub use postgres::PgTenderRepository;

#[async_trait]
pub trait TenderRepository: Send + Sync {
    // Organizations
    async fn organization_for_user(&self, user_id: Uuid) -> ApiResult<Option<Organization>>;
    async fn update_organization_settings(
        &self,
        organization_id: Uuid,
        settings: &OrganizationSettings,
    ) -> ApiResult<Organization>;
    async fn list_organization_documents(
        &self,
        organization_id: Uuid,
    ) -> ApiResult<Vec<OrganizationDocument>>;
    async fn insert_organization_document(
        &self,
        organization_id: Uuid,
        doc: NewDocument,
    ) -> ApiResult<OrganizationDocument>;

    // Projects
    async fn create_project(&self, project: NewProject) -> ApiResult<Project>;
    async fn list_projects(&self, organization_id: Uuid) -> ApiResult<Vec<Project>>;
    async fn get_project(&self, project_id: Uuid) -> ApiResult<Option<Project>>;
    async fn list_project_documents(&self, project_id: Uuid) -> ApiResult<Vec<ProjectDocument>>;
    /// Inserts a project document; when `is_primary_rft` is set any previous
    /// primary of the project is cleared in the same transaction.
    async fn insert_project_document(
        &self,
        project_id: Uuid,
        doc: NewDocument,
        is_primary_rft: bool,
    ) -> ApiResult<ProjectDocument>;
    /// Atomically makes `document_id` the only primary RFT of the project.
    /// Fails with `NotFound` if the document is not part of the project.
    async fn set_primary_rft(&self, project_id: Uuid, document_id: Uuid) -> ApiResult<()>;

    // Work packages
    /// Inserts with `order` = max existing + 1, or 0 for the first package.
    async fn create_work_package(&self, wp: NewWorkPackage) -> ApiResult<WorkPackage>;
    async fn get_work_package(&self, id: Uuid) -> ApiResult<Option<WorkPackage>>;
    /// Packages of a project. Callers sort by `order` where it matters.
    async fn list_work_packages(&self, project_id: Uuid) -> ApiResult<Vec<WorkPackage>>;
    async fn update_requirements(&self, id: Uuid, requirements: &[String]) -> ApiResult<()>;
    async fn update_work_package_status(&self, id: Uuid, status: WorkPackageStatus) -> ApiResult<()>;

    // Work package content
    async fn get_content(&self, work_package_id: Uuid) -> ApiResult<Option<WorkPackageContent>>;
    /// Writes bid analysis and win themes in one statement so readers never
    /// observe one without the other. No version check: concurrent saves
    /// race and the last write wins.
    async fn save_strategy(&self, work_package_id: Uuid, strategy: &Strategy) -> ApiResult<()>;
    async fn save_win_themes(&self, work_package_id: Uuid, win_themes: &[String]) -> ApiResult<()>;
    async fn save_content(&self, work_package_id: Uuid, content: &str) -> ApiResult<()>;
    async fn save_exported_file(&self, work_package_id: Uuid, path: &str) -> ApiResult<()>;
}
