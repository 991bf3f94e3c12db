//! Workflow operations invoked by the HTTP handlers.
//!
//! Every operation takes the caller's [`RequestContext`]; ownership checks go
//! through it so resources of other organizations read as missing.

use chrono::NaiveDate;
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use super::context::{self, estimate_tokens, fit_to_budget, ContextValidation};
use super::export::{self, ArchiveEntry, DOCX_CONTENT_TYPE};
use super::generator::{ContentGenerator, EditorAction, EditorActionKind, EditorRequest};
use super::workflow::{advance_status, require_draft, require_win_themes, WorkflowView};
use crate::auth::RequestContext;
use crate::config::GenerationSettings;
use crate::domain::{
    CreateWorkPackageRequest, NewDocument, NewWorkPackage, OrganizationDocument, Project,
    ProjectDocument, RegisterDocumentRequest, Strategy, WorkPackage, WorkPackageContent,
    WorkPackageStatus,
};
use crate::error::{ApiError, ApiResult};
use crate::services::extraction::extract_text;
use crate::services::{FileStorage, LanguageModel};

/// Editor action as received on the wire. The action name is validated when
/// it is turned into an [`EditorAction`].
#[derive(Debug, Clone, Deserialize)]
pub struct EditorActionInput {
    pub action: String,
    #[serde(default)]
    pub selected_text: String,
    #[serde(default)]
    pub full_document: String,
    #[serde(default)]
    pub custom_instruction: Option<String>,
}

/// A work package with its content and stage gating.
#[derive(Debug, Clone, Serialize)]
pub struct WorkPackageView {
    pub work_package: WorkPackage,
    pub content: Option<WorkPackageContent>,
    #[serde(flatten)]
    pub workflow: WorkflowView,
}

impl WorkPackageView {
    pub fn new(work_package: WorkPackage, content: Option<WorkPackageContent>) -> Self {
        let workflow = WorkflowView::new(&work_package, content.as_ref());
        Self {
            work_package,
            content,
            workflow,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ExportedDocument {
    pub download_url: String,
    pub filename: String,
}

#[derive(Debug, Clone)]
pub struct ProjectArchive {
    pub filename: String,
    pub bytes: Vec<u8>,
}

/// The tender drafting workflow: context, generation stages and export.
#[derive(Clone)]
pub struct Pipeline {
    llm: Arc<dyn LanguageModel>,
    storage: Arc<dyn FileStorage>,
    settings: GenerationSettings,
}

impl Pipeline {
    pub fn new(
        llm: Arc<dyn LanguageModel>,
        storage: Arc<dyn FileStorage>,
        settings: GenerationSettings,
    ) -> Self {
        Self {
            llm,
            storage,
            settings,
        }
    }

    fn generator(&self) -> ContentGenerator<'_> {
        ContentGenerator::new(self.llm.as_ref(), &self.settings)
    }

    async fn content_of(ctx: &RequestContext, wp: &WorkPackage) -> ApiResult<WorkPackageContent> {
        Ok(ctx
            .repo
            .get_content(wp.id)
            .await?
            .unwrap_or_else(|| WorkPackageContent::empty(wp.id)))
    }

    async fn set_status(
        ctx: &RequestContext,
        wp: &WorkPackage,
        target: WorkPackageStatus,
    ) -> ApiResult<()> {
        let next = advance_status(wp.status, target);
        if next != wp.status {
            ctx.repo.update_work_package_status(wp.id, next).await?;
            info!(work_package_id = %wp.id, from = %wp.status, to = %next, "Work package status advanced");
        }
        Ok(())
    }

    // ---------------------------------------------------------------------
    // Work packages
    // ---------------------------------------------------------------------

    pub async fn create_work_package(
        &self,
        ctx: &RequestContext,
        req: CreateWorkPackageRequest,
    ) -> ApiResult<WorkPackage> {
        ctx.project(req.project_id).await?;
        let new = NewWorkPackage::try_from(req).map_err(ApiError::BadRequest)?;
        let wp = ctx.repo.create_work_package(new).await?;
        info!(work_package_id = %wp.id, project_id = %wp.project_id, order = wp.order, "Work package created");
        Ok(wp)
    }

    pub async fn work_package_view(
        &self,
        ctx: &RequestContext,
        work_package_id: Uuid,
    ) -> ApiResult<WorkPackageView> {
        let (wp, _) = ctx.work_package(work_package_id).await?;
        let content = ctx.repo.get_content(wp.id).await?;
        Ok(WorkPackageView::new(wp, content))
    }

    pub async fn list_work_package_views(
        &self,
        ctx: &RequestContext,
        project_id: Uuid,
    ) -> ApiResult<Vec<WorkPackageView>> {
        let project = ctx.project(project_id).await?;
        let mut wps = ctx.repo.list_work_packages(project.id).await?;
        wps.sort_by_key(|wp| wp.order);
        let contents = join_all(wps.iter().map(|wp| ctx.repo.get_content(wp.id))).await;

        wps.into_iter()
            .zip(contents)
            .map(|(wp, content)| -> ApiResult<WorkPackageView> {
                Ok(WorkPackageView::new(wp, content?))
            })
            .collect()
    }

    /// Manual edit of the draft.
    pub async fn save_content(
        &self,
        ctx: &RequestContext,
        work_package_id: Uuid,
        content: &str,
    ) -> ApiResult<()> {
        if content.trim().is_empty() {
            return Err(ApiError::bad_request("content must not be empty"));
        }
        let (wp, _) = ctx.work_package(work_package_id).await?;
        ctx.repo.save_content(wp.id, content).await
    }

    // ---------------------------------------------------------------------
    // Generation stages
    // ---------------------------------------------------------------------

    #[instrument(skip(self, ctx), fields(stage = "requirements"))]
    pub async fn extract_requirements(
        &self,
        ctx: &RequestContext,
        work_package_id: Uuid,
    ) -> ApiResult<Vec<String>> {
        let (wp, project) = ctx.work_package(work_package_id).await?;
        let bundle = context::assemble(ctx, &project).await?;

        let requirements = self.generator().extract_requirements(&bundle, &wp).await?;
        ctx.repo.update_requirements(wp.id, &requirements).await?;

        info!(work_package_id = %wp.id, count = requirements.len(), "Requirements extracted");
        Ok(requirements)
    }

    #[instrument(skip(self, ctx), fields(stage = "strategy"))]
    pub async fn generate_strategy(
        &self,
        ctx: &RequestContext,
        work_package_id: Uuid,
    ) -> ApiResult<Strategy> {
        let (wp, project) = ctx.work_package(work_package_id).await?;
        let bundle = context::assemble(ctx, &project).await?;

        let strategy = self.generator().generate_strategy(&bundle, &wp).await?;
        ctx.repo.save_strategy(wp.id, &strategy).await?;

        info!(
            work_package_id = %wp.id,
            token_estimate = bundle.token_estimate(),
            win_themes = strategy.win_themes.len(),
            "Strategy generated"
        );
        Ok(strategy)
    }

    #[instrument(skip(self, ctx), fields(stage = "win_themes"))]
    pub async fn generate_win_themes(
        &self,
        ctx: &RequestContext,
        work_package_id: Uuid,
    ) -> ApiResult<Vec<String>> {
        let (wp, project) = ctx.work_package(work_package_id).await?;
        let bundle = context::assemble(ctx, &project).await?;

        let themes = self.generator().generate_win_themes(&bundle, &wp).await?;
        ctx.repo.save_win_themes(wp.id, &themes).await?;

        info!(work_package_id = %wp.id, count = themes.len(), "Win themes generated");
        Ok(themes)
    }

    /// Draft the document. The package moves to in progress once the
    /// preconditions hold, before the model is called.
    #[instrument(skip(self, ctx), fields(stage = "content"))]
    pub async fn generate_content(
        &self,
        ctx: &RequestContext,
        work_package_id: Uuid,
    ) -> ApiResult<String> {
        let (wp, project) = ctx.work_package(work_package_id).await?;
        let content = Self::content_of(ctx, &wp).await?;
        require_win_themes(&content)?;

        let bundle = context::assemble(ctx, &project).await?;
        context::ensure_within_budget(&bundle, self.settings.context_token_budget)?;

        Self::set_status(ctx, &wp, WorkPackageStatus::InProgress).await?;

        let draft = self
            .generator()
            .generate_content(&bundle, &wp, &content)
            .await?;
        ctx.repo.save_content(wp.id, &draft).await?;

        info!(work_package_id = %wp.id, chars = draft.len(), "Content generated");
        Ok(draft)
    }

    #[instrument(skip(self, ctx, input), fields(stage = "editor", action = %input.action))]
    pub async fn editor_action(
        &self,
        ctx: &RequestContext,
        work_package_id: Uuid,
        input: EditorActionInput,
    ) -> ApiResult<String> {
        let kind: EditorActionKind = input.action.parse()?;
        let (wp, project) = ctx.work_package(work_package_id).await?;

        let action = match kind {
            EditorActionKind::Expand | EditorActionKind::AddEvidence => {
                let bundle = context::assemble(ctx, &project).await?;
                // Evidence gets what the document and selection leave of the budget
                let editor_tokens = estimate_tokens(
                    input.full_document.chars().count() + input.selected_text.chars().count(),
                );
                let evidence_budget = self
                    .settings
                    .context_token_budget
                    .saturating_sub(editor_tokens);
                let organization_docs = fit_to_budget(&bundle.organization_docs, evidence_budget);
                if kind == EditorActionKind::Expand {
                    EditorAction::Expand { organization_docs }
                } else {
                    EditorAction::AddEvidence { organization_docs }
                }
            }
            EditorActionKind::Shorten => EditorAction::Shorten,
            EditorActionKind::Rephrase => EditorAction::Rephrase,
            EditorActionKind::CheckCompliance => EditorAction::CheckCompliance {
                requirements: wp.requirements.clone(),
            },
            EditorActionKind::Custom => {
                let instruction = input
                    .custom_instruction
                    .map(|i| i.trim().to_string())
                    .filter(|i| !i.is_empty())
                    .ok_or_else(|| ApiError::bad_request("custom_instruction is required for custom actions"))?;
                EditorAction::Custom { instruction }
            }
        };

        self.generator()
            .apply_editor_action(&EditorRequest {
                action,
                selected_text: input.selected_text,
                full_document: input.full_document,
            })
            .await
    }

    // ---------------------------------------------------------------------
    // Export
    // ---------------------------------------------------------------------

    /// Render, upload, sign and mark completed. Without content, or when upload
    /// or signing fails, the package is left as it was.
    #[instrument(skip(self, ctx), fields(stage = "export"))]
    pub async fn export_work_package(
        &self,
        ctx: &RequestContext,
        work_package_id: Uuid,
    ) -> ApiResult<ExportedDocument> {
        let (wp, project) = ctx.work_package(work_package_id).await?;
        let content = ctx.repo.get_content(wp.id).await?;
        let draft = require_draft(content.as_ref())?;

        let filename = export::docx_filename(&wp.document_type, &project.name);
        let bytes = export::render_docx(&wp.document_type, &project.name, draft)?;
        let path = format!("{}/{}/exports/{}", project.organization_id, project.id, filename);

        self.storage.upload(&path, bytes, DOCX_CONTENT_TYPE).await?;
        let download_url = self
            .storage
            .signed_url(&path, self.settings.download_url_ttl)
            .await?;

        ctx.repo.save_exported_file(wp.id, &path).await?;
        Self::set_status(ctx, &wp, WorkPackageStatus::Completed).await?;

        info!(work_package_id = %wp.id, path = %path, "Work package exported");
        Ok(ExportedDocument {
            download_url,
            filename,
        })
    }

    /// ZIP of every completed package that has content, ascending by order.
    #[instrument(skip(self, ctx), fields(stage = "bulk_export"))]
    pub async fn export_project(
        &self,
        ctx: &RequestContext,
        project_id: Uuid,
        today: NaiveDate,
    ) -> ApiResult<ProjectArchive> {
        let project = ctx.project(project_id).await?;
        let completed: Vec<WorkPackage> = ctx
            .repo
            .list_work_packages(project.id)
            .await?
            .into_iter()
            .filter(|wp| wp.status == WorkPackageStatus::Completed)
            .collect();
        if completed.is_empty() {
            return Err(ApiError::bad_request("No completed work packages to export"));
        }

        let contents = join_all(completed.iter().map(|wp| ctx.repo.get_content(wp.id))).await;

        let mut drafts = Vec::new();
        for (wp, content) in completed.into_iter().zip(contents) {
            match content?.and_then(|c| c.draft().map(str::to_string)) {
                Some(draft) => drafts.push((wp, draft)),
                None => warn!(work_package_id = %wp.id, "Completed work package has no content, skipping"),
            }
        }
        if drafts.is_empty() {
            return Err(ApiError::NoContent(
                "None of the completed work packages has content".into(),
            ));
        }
        drafts.sort_by_key(|(wp, _)| wp.order);

        let entries = drafts
            .iter()
            .map(|(wp, draft)| -> anyhow::Result<ArchiveEntry> {
                Ok(ArchiveEntry {
                    filename: export::docx_filename(&wp.document_type, &project.name),
                    bytes: export::render_docx(&wp.document_type, &project.name, draft)?,
                })
            })
            .collect::<anyhow::Result<Vec<_>>>()?;

        let bytes = export::build_archive(entries)?;
        let filename = export::archive_filename(&project.name, today);

        info!(project_id = %project.id, documents = drafts.len(), bytes = bytes.len(), "Project exported");
        Ok(ProjectArchive { filename, bytes })
    }

    // ---------------------------------------------------------------------
    // Documents and context
    // ---------------------------------------------------------------------

    /// Text of a stored file, or `None` when it cannot be read or parsed.
    async fn extract_stored_text(&self, req: &RegisterDocumentRequest) -> Option<String> {
        let bytes = match self.storage.download(&req.storage_path).await {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(path = %req.storage_path, error = %e, "Could not download document for extraction");
                return None;
            }
        };

        let mime_type = req.mime_type.clone();
        let name = req.name.clone();
        let extracted =
            tokio::task::spawn_blocking(move || extract_text(&bytes, &mime_type, &name)).await;

        match extracted {
            Ok(Ok(text)) => Some(text),
            Ok(Err(e)) => {
                warn!(path = %req.storage_path, error = %e, "Text extraction failed");
                None
            }
            Err(e) => {
                warn!(path = %req.storage_path, error = %e, "Text extraction task failed");
                None
            }
        }
    }

    fn validate_registration(req: &RegisterDocumentRequest) -> ApiResult<()> {
        if req.name.trim().is_empty() {
            return Err(ApiError::bad_request("name is required"));
        }
        if req.storage_path.trim().is_empty() {
            return Err(ApiError::bad_request("storage_path is required"));
        }
        Ok(())
    }

    pub async fn register_organization_document(
        &self,
        ctx: &RequestContext,
        req: RegisterDocumentRequest,
    ) -> ApiResult<OrganizationDocument> {
        Self::validate_registration(&req)?;
        let text = self.extract_stored_text(&req).await;
        let doc = ctx
            .repo
            .insert_organization_document(ctx.organization_id(), NewDocument::from_request(req, text))
            .await?;

        info!(document_id = %doc.id, content_extracted = doc.content_extracted, "Organization document registered");
        Ok(doc)
    }

    pub async fn register_project_document(
        &self,
        ctx: &RequestContext,
        project_id: Uuid,
        req: RegisterDocumentRequest,
    ) -> ApiResult<ProjectDocument> {
        Self::validate_registration(&req)?;
        let project = ctx.project(project_id).await?;
        let is_primary_rft = req.is_primary_rft;
        let text = self.extract_stored_text(&req).await;
        let doc = ctx
            .repo
            .insert_project_document(project.id, NewDocument::from_request(req, text), is_primary_rft)
            .await?;

        info!(
            document_id = %doc.id,
            project_id = %project.id,
            content_extracted = doc.content_extracted,
            is_primary_rft,
            "Project document registered"
        );
        Ok(doc)
    }

    pub async fn set_primary_rft(
        &self,
        ctx: &RequestContext,
        project_id: Uuid,
        document_id: Uuid,
    ) -> ApiResult<()> {
        let project = ctx.project(project_id).await?;
        ctx.repo.set_primary_rft(project.id, document_id).await?;
        info!(project_id = %project.id, document_id = %document_id, "Primary RFT set");
        Ok(())
    }

    pub async fn check_context(
        &self,
        ctx: &RequestContext,
        project: &Project,
    ) -> ApiResult<ContextValidation> {
        let bundle = context::assemble(ctx, project).await?;
        Ok(context::validate(&bundle, self.settings.context_token_budget))
    }
}
