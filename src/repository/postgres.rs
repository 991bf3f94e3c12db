//! PostgreSQL implementation of [`TenderRepository`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{types::Json, PgPool};
use uuid::Uuid;

use super::TenderRepository;
use crate::domain::{
    NewDocument, NewProject, NewWorkPackage, Organization, OrganizationDocument,
    OrganizationSettings, Project, ProjectDocument, ProjectStatus, Strategy, WorkPackage,
    WorkPackageContent, WorkPackageStatus,
};
use crate::error::{ApiError, ApiResult};

// ============================================================================
// Database Row Types
// ============================================================================

#[derive(Debug, sqlx::FromRow)]
struct OrganizationRow {
    id: Uuid,
    name: String,
    settings: Json<OrganizationSettings>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, sqlx::FromRow)]
struct OrganizationDocumentRow {
    id: Uuid,
    organization_id: Uuid,
    name: String,
    storage_path: String,
    mime_type: String,
    file_size: i64,
    extracted_text: Option<String>,
    content_extracted: bool,
    category: Option<String>,
    tags: Vec<String>,
    created_at: DateTime<Utc>,
}

#[derive(Debug, sqlx::FromRow)]
struct ProjectRow {
    id: Uuid,
    organization_id: Uuid,
    name: String,
    client_name: Option<String>,
    deadline: Option<DateTime<Utc>>,
    instructions: Option<String>,
    status: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, sqlx::FromRow)]
struct ProjectDocumentRow {
    id: Uuid,
    project_id: Uuid,
    name: String,
    storage_path: String,
    mime_type: String,
    file_size: i64,
    extracted_text: Option<String>,
    content_extracted: bool,
    category: Option<String>,
    tags: Vec<String>,
    is_primary_rft: bool,
    created_at: DateTime<Utc>,
}

#[derive(Debug, sqlx::FromRow)]
struct WorkPackageRow {
    id: Uuid,
    project_id: Uuid,
    document_type: String,
    document_description: Option<String>,
    requirements: Vec<String>,
    status: String,
    order: i32,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, sqlx::FromRow)]
struct WorkPackageContentRow {
    work_package_id: Uuid,
    bid_analysis: Option<String>,
    win_themes: Option<Vec<String>>,
    content: Option<String>,
    exported_file_path: Option<String>,
}

// ============================================================================
// Conversion Functions
// ============================================================================

impl From<OrganizationRow> for Organization {
    fn from(r: OrganizationRow) -> Self {
        Self {
            id: r.id,
            name: r.name,
            settings: r.settings.0,
            created_at: r.created_at,
            updated_at: r.updated_at,
        }
    }
}

impl From<OrganizationDocumentRow> for OrganizationDocument {
    fn from(r: OrganizationDocumentRow) -> Self {
        Self {
            id: r.id,
            organization_id: r.organization_id,
            name: r.name,
            storage_path: r.storage_path,
            mime_type: r.mime_type,
            file_size: r.file_size,
            extracted_text: r.extracted_text,
            content_extracted: r.content_extracted,
            category: r.category,
            tags: r.tags,
            created_at: r.created_at,
        }
    }
}

impl From<ProjectDocumentRow> for ProjectDocument {
    fn from(r: ProjectDocumentRow) -> Self {
        Self {
            id: r.id,
            project_id: r.project_id,
            name: r.name,
            storage_path: r.storage_path,
            mime_type: r.mime_type,
            file_size: r.file_size,
            extracted_text: r.extracted_text,
            content_extracted: r.content_extracted,
            category: r.category,
            tags: r.tags,
            is_primary_rft: r.is_primary_rft,
            created_at: r.created_at,
        }
    }
}

impl From<WorkPackageContentRow> for WorkPackageContent {
    fn from(r: WorkPackageContentRow) -> Self {
        Self {
            work_package_id: r.work_package_id,
            bid_analysis: r.bid_analysis,
            win_themes: r.win_themes,
            content: r.content,
            exported_file_path: r.exported_file_path,
        }
    }
}

impl TryFrom<ProjectRow> for Project {
    type Error = ApiError;

    fn try_from(r: ProjectRow) -> Result<Self, Self::Error> {
        let status: ProjectStatus = r
            .status
            .parse()
            .map_err(|e: String| ApiError::Internal(anyhow::anyhow!(e)))?;
        Ok(Self {
            id: r.id,
            organization_id: r.organization_id,
            name: r.name,
            client_name: r.client_name,
            deadline: r.deadline,
            instructions: r.instructions,
            status,
            created_at: r.created_at,
            updated_at: r.updated_at,
        })
    }
}

impl TryFrom<WorkPackageRow> for WorkPackage {
    type Error = ApiError;

    fn try_from(r: WorkPackageRow) -> Result<Self, Self::Error> {
        let status: WorkPackageStatus = r
            .status
            .parse()
            .map_err(|e: String| ApiError::Internal(anyhow::anyhow!(e)))?;
        Ok(Self {
            id: r.id,
            project_id: r.project_id,
            document_type: r.document_type,
            document_description: r.document_description,
            requirements: r.requirements,
            status,
            order: r.order,
            created_at: r.created_at,
            updated_at: r.updated_at,
        })
    }
}

const PROJECT_DOCUMENT_COLUMNS: &str = "id, project_id, name, storage_path, mime_type, file_size, \
     extracted_text, content_extracted, category, tags, is_primary_rft, created_at";

const WORK_PACKAGE_COLUMNS: &str = "id, project_id, document_type, document_description, \
     requirements, status, \"order\", created_at, updated_at";

// ============================================================================
// Repository
// ============================================================================

#[derive(Clone)]
pub struct PgTenderRepository {
    pool: PgPool,
}

impl PgTenderRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TenderRepository for PgTenderRepository {
    async fn organization_for_user(&self, user_id: Uuid) -> ApiResult<Option<Organization>> {
        let row = sqlx::query_as::<_, OrganizationRow>(
            r#"
            SELECT o.id, o.name, o.settings, o.created_at, o.updated_at
            FROM organizations o
            JOIN organization_members m ON m.organization_id = o.id
            WHERE m.user_id = $1
            ORDER BY m.created_at
            LIMIT 1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Organization::from))
    }

    async fn update_organization_settings(
        &self,
        organization_id: Uuid,
        settings: &OrganizationSettings,
    ) -> ApiResult<Organization> {
        let row = sqlx::query_as::<_, OrganizationRow>(
            r#"
            UPDATE organizations SET settings = $2, updated_at = now()
            WHERE id = $1
            RETURNING id, name, settings, created_at, updated_at
            "#,
        )
        .bind(organization_id)
        .bind(Json(settings))
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| ApiError::not_found("Organization not found"))?;

        Ok(row.into())
    }

    async fn list_organization_documents(
        &self,
        organization_id: Uuid,
    ) -> ApiResult<Vec<OrganizationDocument>> {
        let rows = sqlx::query_as::<_, OrganizationDocumentRow>(
            r#"
            SELECT id, organization_id, name, storage_path, mime_type, file_size,
                   extracted_text, content_extracted, category, tags, created_at
            FROM organization_documents
            WHERE organization_id = $1
            ORDER BY created_at
            "#,
        )
        .bind(organization_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn insert_organization_document(
        &self,
        organization_id: Uuid,
        doc: NewDocument,
    ) -> ApiResult<OrganizationDocument> {
        let content_extracted = doc.content_extracted();
        let row = sqlx::query_as::<_, OrganizationDocumentRow>(
            r#"
            INSERT INTO organization_documents
                (organization_id, name, storage_path, mime_type, file_size,
                 extracted_text, content_extracted, category, tags)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING id, organization_id, name, storage_path, mime_type, file_size,
                      extracted_text, content_extracted, category, tags, created_at
            "#,
        )
        .bind(organization_id)
        .bind(doc.name)
        .bind(doc.storage_path)
        .bind(doc.mime_type)
        .bind(doc.file_size)
        .bind(doc.extracted_text)
        .bind(content_extracted)
        .bind(doc.category)
        .bind(doc.tags)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.into())
    }

    async fn create_project(&self, project: NewProject) -> ApiResult<Project> {
        let row = sqlx::query_as::<_, ProjectRow>(
            r#"
            INSERT INTO projects (organization_id, name, client_name, deadline, instructions)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, organization_id, name, client_name, deadline, instructions,
                      status, created_at, updated_at
            "#,
        )
        .bind(project.organization_id)
        .bind(project.name)
        .bind(project.client_name)
        .bind(project.deadline)
        .bind(project.instructions)
        .fetch_one(&self.pool)
        .await?;

        row.try_into()
    }

    async fn list_projects(&self, organization_id: Uuid) -> ApiResult<Vec<Project>> {
        let rows = sqlx::query_as::<_, ProjectRow>(
            r#"
            SELECT id, organization_id, name, client_name, deadline, instructions,
                   status, created_at, updated_at
            FROM projects
            WHERE organization_id = $1
            ORDER BY created_at DESC
            "#,
        )
        .bind(organization_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Project::try_from).collect()
    }

    async fn get_project(&self, project_id: Uuid) -> ApiResult<Option<Project>> {
        let row = sqlx::query_as::<_, ProjectRow>(
            r#"
            SELECT id, organization_id, name, client_name, deadline, instructions,
                   status, created_at, updated_at
            FROM projects
            WHERE id = $1
            "#,
        )
        .bind(project_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Project::try_from).transpose()
    }

    async fn list_project_documents(&self, project_id: Uuid) -> ApiResult<Vec<ProjectDocument>> {
        let rows = sqlx::query_as::<_, ProjectDocumentRow>(&format!(
            "SELECT {PROJECT_DOCUMENT_COLUMNS} FROM project_documents \
             WHERE project_id = $1 ORDER BY is_primary_rft DESC, created_at"
        ))
        .bind(project_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn insert_project_document(
        &self,
        project_id: Uuid,
        doc: NewDocument,
        is_primary_rft: bool,
    ) -> ApiResult<ProjectDocument> {
        let content_extracted = doc.content_extracted();
        let mut tx = self.pool.begin().await?;

        if is_primary_rft {
            sqlx::query(
                "UPDATE project_documents SET is_primary_rft = false \
                 WHERE project_id = $1 AND is_primary_rft",
            )
            .bind(project_id)
            .execute(&mut *tx)
            .await?;
        }

        let row = sqlx::query_as::<_, ProjectDocumentRow>(&format!(
            "INSERT INTO project_documents \
                (project_id, name, storage_path, mime_type, file_size, \
                 extracted_text, content_extracted, category, tags, is_primary_rft) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10) \
             RETURNING {PROJECT_DOCUMENT_COLUMNS}"
        ))
        .bind(project_id)
        .bind(doc.name)
        .bind(doc.storage_path)
        .bind(doc.mime_type)
        .bind(doc.file_size)
        .bind(doc.extracted_text)
        .bind(content_extracted)
        .bind(doc.category)
        .bind(doc.tags)
        .bind(is_primary_rft)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(row.into())
    }

    async fn set_primary_rft(&self, project_id: Uuid, document_id: Uuid) -> ApiResult<()> {
        let mut tx = self.pool.begin().await?;

        // Clear first so the partial unique index never sees two primaries
        sqlx::query(
            "UPDATE project_documents SET is_primary_rft = false \
             WHERE project_id = $1 AND is_primary_rft AND id <> $2",
        )
        .bind(project_id)
        .bind(document_id)
        .execute(&mut *tx)
        .await?;

        let updated = sqlx::query(
            "UPDATE project_documents SET is_primary_rft = true \
             WHERE project_id = $1 AND id = $2",
        )
        .bind(project_id)
        .bind(document_id)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        if updated == 0 {
            tx.rollback().await?;
            return Err(ApiError::not_found("Document not found"));
        }

        tx.commit().await?;
        Ok(())
    }

    async fn create_work_package(&self, wp: NewWorkPackage) -> ApiResult<WorkPackage> {
        let row = sqlx::query_as::<_, WorkPackageRow>(&format!(
            "INSERT INTO work_packages \
                (project_id, document_type, document_description, requirements, \"order\") \
             SELECT $1, $2, $3, $4, COALESCE(MAX(\"order\") + 1, 0) \
             FROM work_packages WHERE project_id = $1 \
             RETURNING {WORK_PACKAGE_COLUMNS}"
        ))
        .bind(wp.project_id)
        .bind(wp.document_type)
        .bind(wp.document_description)
        .bind(wp.requirements)
        .fetch_one(&self.pool)
        .await?;

        row.try_into()
    }

    async fn get_work_package(&self, id: Uuid) -> ApiResult<Option<WorkPackage>> {
        let row = sqlx::query_as::<_, WorkPackageRow>(&format!(
            "SELECT {WORK_PACKAGE_COLUMNS} FROM work_packages WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(WorkPackage::try_from).transpose()
    }

    async fn list_work_packages(&self, project_id: Uuid) -> ApiResult<Vec<WorkPackage>> {
        let rows = sqlx::query_as::<_, WorkPackageRow>(&format!(
            "SELECT {WORK_PACKAGE_COLUMNS} FROM work_packages \
             WHERE project_id = $1 ORDER BY \"order\", created_at"
        ))
        .bind(project_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(WorkPackage::try_from).collect()
    }

    async fn update_requirements(&self, id: Uuid, requirements: &[String]) -> ApiResult<()> {
        sqlx::query(
            "UPDATE work_packages SET requirements = $2, updated_at = now() WHERE id = $1",
        )
        .bind(id)
        .bind(requirements)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn update_work_package_status(
        &self,
        id: Uuid,
        status: WorkPackageStatus,
    ) -> ApiResult<()> {
        sqlx::query("UPDATE work_packages SET status = $2, updated_at = now() WHERE id = $1")
            .bind(id)
            .bind(status.as_str())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn get_content(&self, work_package_id: Uuid) -> ApiResult<Option<WorkPackageContent>> {
        let row = sqlx::query_as::<_, WorkPackageContentRow>(
            r#"
            SELECT work_package_id, bid_analysis, win_themes, content, exported_file_path
            FROM work_package_contents
            WHERE work_package_id = $1
            "#,
        )
        .bind(work_package_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Into::into))
    }

    async fn save_strategy(&self, work_package_id: Uuid, strategy: &Strategy) -> ApiResult<()> {
        sqlx::query(
            r#"
            INSERT INTO work_package_contents (work_package_id, bid_analysis, win_themes)
            VALUES ($1, $2, $3)
            ON CONFLICT (work_package_id) DO UPDATE
            SET bid_analysis = EXCLUDED.bid_analysis,
                win_themes = EXCLUDED.win_themes,
                updated_at = now()
            "#,
        )
        .bind(work_package_id)
        .bind(&strategy.bid_analysis)
        .bind(&strategy.win_themes)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn save_win_themes(&self, work_package_id: Uuid, win_themes: &[String]) -> ApiResult<()> {
        sqlx::query(
            r#"
            INSERT INTO work_package_contents (work_package_id, win_themes)
            VALUES ($1, $2)
            ON CONFLICT (work_package_id) DO UPDATE
            SET win_themes = EXCLUDED.win_themes, updated_at = now()
            "#,
        )
        .bind(work_package_id)
        .bind(win_themes)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn save_content(&self, work_package_id: Uuid, content: &str) -> ApiResult<()> {
        sqlx::query(
            r#"
            INSERT INTO work_package_contents (work_package_id, content)
            VALUES ($1, $2)
            ON CONFLICT (work_package_id) DO UPDATE
            SET content = EXCLUDED.content, updated_at = now()
            "#,
        )
        .bind(work_package_id)
        .bind(content)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn save_exported_file(&self, work_package_id: Uuid, path: &str) -> ApiResult<()> {
        sqlx::query(
            r#"
            INSERT INTO work_package_contents (work_package_id, exported_file_path)
            VALUES ($1, $2)
            ON CONFLICT (work_package_id) DO UPDATE
            SET exported_file_path = EXCLUDED.exported_file_path, updated_at = now()
            "#,
        )
        .bind(work_package_id)
        .bind(path)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
