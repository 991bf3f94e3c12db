//! In-memory doubles for the repository, language model and file storage.

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use crate::auth::{AuthContext, RequestContext};
use crate::domain::{
    CompanyProfile, NewDocument, NewProject, NewWorkPackage, Organization,
    OrganizationDocument, OrganizationSettings, Project, ProjectDocument, ProjectStatus,
    Strategy, WorkPackage, WorkPackageContent, WorkPackageStatus,
};
use crate::error::{ApiError, ApiResult};
use crate::pipeline::context::{ContextBundle, SourceDocument};
use crate::repository::TenderRepository;
use crate::services::{FileStorage, LanguageModel, LlmError, Prompt};

#[derive(Default)]
struct State {
    organizations: HashMap<Uuid, Organization>,
    members: HashMap<Uuid, Uuid>,
    org_documents: Vec<OrganizationDocument>,
    projects: Vec<Project>,
    project_documents: Vec<ProjectDocument>,
    work_packages: Vec<WorkPackage>,
    contents: HashMap<Uuid, WorkPackageContent>,
}

#[derive(Default)]
pub struct MemoryRepository {
    state: Mutex<State>,
}

pub fn fixture_project(organization_id: Uuid, name: &str) -> Project {
    let now = Utc::now();
    Project {
        id: Uuid::new_v4(),
        organization_id,
        name: name.to_string(),
        client_name: Some("City Council".to_string()),
        deadline: None,
        instructions: None,
        status: ProjectStatus::Setup,
        created_at: now,
        updated_at: now,
    }
}

pub fn fixture_work_package(project_id: Uuid, order: i32, status: WorkPackageStatus) -> WorkPackage {
    let now = Utc::now();
    WorkPackage {
        id: Uuid::new_v4(),
        project_id,
        document_type: "Method Statement".to_string(),
        document_description: None,
        requirements: Vec::new(),
        status,
        order,
        created_at: now,
        updated_at: now,
    }
}

pub fn fixture_bundle(org_texts: &[&str], rft_texts: &[&str]) -> ContextBundle {
    let doc = |prefix: &str, (i, text): (usize, &&str)| {
        SourceDocument::new(format!("{prefix}-{i}"), Some(text.to_string()))
    };
    ContextBundle {
        project: fixture_project(Uuid::new_v4(), "Harbour Works"),
        company_profile: CompanyProfile::default(),
        organization_docs: org_texts.iter().enumerate().map(|d| doc("org", d)).collect(),
        rft_docs: rft_texts.iter().enumerate().map(|d| doc("rft", d)).collect(),
    }
}

fn new_org_document(organization_id: Uuid, doc: NewDocument) -> OrganizationDocument {
    OrganizationDocument {
        id: Uuid::new_v4(),
        organization_id,
        content_extracted: doc.content_extracted(),
        name: doc.name,
        storage_path: doc.storage_path,
        mime_type: doc.mime_type,
        file_size: doc.file_size,
        extracted_text: doc.extracted_text,
        category: doc.category,
        tags: doc.tags,
        created_at: Utc::now(),
    }
}

fn new_project_document(project_id: Uuid, doc: NewDocument, is_primary_rft: bool) -> ProjectDocument {
    ProjectDocument {
        id: Uuid::new_v4(),
        project_id,
        content_extracted: doc.content_extracted(),
        name: doc.name,
        storage_path: doc.storage_path,
        mime_type: doc.mime_type,
        file_size: doc.file_size,
        extracted_text: doc.extracted_text,
        category: doc.category,
        tags: doc.tags,
        is_primary_rft,
        created_at: Utc::now(),
    }
}

fn text_document(name: &str, text: Option<&str>) -> NewDocument {
    NewDocument {
        name: name.to_string(),
        storage_path: format!("seed/{name}.txt"),
        mime_type: "text/plain".to_string(),
        file_size: text.map_or(0, |t| t.len() as i64),
        extracted_text: text.map(str::to_string),
        category: None,
        tags: Vec::new(),
    }
}

impl MemoryRepository {
    /// A user who belongs to a fresh organization.
    pub fn seed_context(self: &Arc<Self>) -> RequestContext {
        let now = Utc::now();
        let organization = Organization {
            id: Uuid::new_v4(),
            name: "Acme Civil".to_string(),
            settings: OrganizationSettings::default(),
            created_at: now,
            updated_at: now,
        };
        let user_id = Uuid::new_v4();
        {
            let mut state = self.state.lock();
            state.organizations.insert(organization.id, organization.clone());
            state.members.insert(user_id, organization.id);
        }
        let auth = AuthContext {
            user_id,
            role: Some("authenticated".to_string()),
        };
        RequestContext::new(auth, organization, self.clone())
    }

    pub fn seed_project(&self, ctx: &RequestContext, name: &str) -> Project {
        let project = fixture_project(ctx.organization_id(), name);
        self.state.lock().projects.push(project.clone());
        project
    }

    pub fn seed_org_document(
        &self,
        ctx: &RequestContext,
        name: &str,
        text: Option<&str>,
    ) -> OrganizationDocument {
        let doc = new_org_document(ctx.organization_id(), text_document(name, text));
        self.state.lock().org_documents.push(doc.clone());
        doc
    }

    /// Adds an RFT document. Seeding a primary does not clear an existing one.
    pub fn seed_rft(
        &self,
        project_id: Uuid,
        name: &str,
        text: Option<&str>,
        is_primary_rft: bool,
    ) -> ProjectDocument {
        let doc = new_project_document(project_id, text_document(name, text), is_primary_rft);
        self.state.lock().project_documents.push(doc.clone());
        doc
    }

    pub fn seed_work_package(
        &self,
        project_id: Uuid,
        order: i32,
        status: WorkPackageStatus,
    ) -> WorkPackage {
        let wp = fixture_work_package(project_id, order, status);
        self.state.lock().work_packages.push(wp.clone());
        wp
    }

    pub fn seed_typed_work_package(
        &self,
        project_id: Uuid,
        order: i32,
        status: WorkPackageStatus,
        document_type: &str,
    ) -> WorkPackage {
        let mut wp = fixture_work_package(project_id, order, status);
        wp.document_type = document_type.to_string();
        self.state.lock().work_packages.push(wp.clone());
        wp
    }

    pub fn put_content(&self, content: WorkPackageContent) {
        self.state
            .lock()
            .contents
            .insert(content.work_package_id, content);
    }

    pub fn work_package_snapshot(&self, id: Uuid) -> WorkPackage {
        self.state
            .lock()
            .work_packages
            .iter()
            .find(|wp| wp.id == id)
            .cloned()
            .unwrap_or_else(|| panic!("work package {id} not seeded"))
    }

    pub fn content_snapshot(&self, work_package_id: Uuid) -> Option<WorkPackageContent> {
        self.state.lock().contents.get(&work_package_id).cloned()
    }

    pub fn project_documents_snapshot(&self, project_id: Uuid) -> Vec<ProjectDocument> {
        self.state
            .lock()
            .project_documents
            .iter()
            .filter(|d| d.project_id == project_id)
            .cloned()
            .collect()
    }

    fn with_content<F>(&self, work_package_id: Uuid, f: F)
    where
        F: FnOnce(&mut WorkPackageContent),
    {
        let mut state = self.state.lock();
        let content = state
            .contents
            .entry(work_package_id)
            .or_insert_with(|| WorkPackageContent::empty(work_package_id));
        f(content);
    }

    fn with_work_package<F>(&self, id: Uuid, f: F) -> ApiResult<()>
    where
        F: FnOnce(&mut WorkPackage),
    {
        let mut state = self.state.lock();
        let wp = state
            .work_packages
            .iter_mut()
            .find(|wp| wp.id == id)
            .ok_or_else(|| ApiError::not_found("Work package not found"))?;
        f(wp);
        wp.updated_at = Utc::now();
        Ok(())
    }
}

#[async_trait]
impl TenderRepository for MemoryRepository {
    async fn organization_for_user(&self, user_id: Uuid) -> ApiResult<Option<Organization>> {
        let state = self.state.lock();
        Ok(state
            .members
            .get(&user_id)
            .and_then(|org_id| state.organizations.get(org_id))
            .cloned())
    }

    async fn update_organization_settings(
        &self,
        organization_id: Uuid,
        settings: &OrganizationSettings,
    ) -> ApiResult<Organization> {
        let mut state = self.state.lock();
        let org = state
            .organizations
            .get_mut(&organization_id)
            .ok_or_else(|| ApiError::not_found("Organization not found"))?;
        org.settings = settings.clone();
        org.updated_at = Utc::now();
        Ok(org.clone())
    }

    async fn list_organization_documents(
        &self,
        organization_id: Uuid,
    ) -> ApiResult<Vec<OrganizationDocument>> {
        Ok(self
            .state
            .lock()
            .org_documents
            .iter()
            .filter(|d| d.organization_id == organization_id)
            .cloned()
            .collect())
    }

    async fn insert_organization_document(
        &self,
        organization_id: Uuid,
        doc: NewDocument,
    ) -> ApiResult<OrganizationDocument> {
        let doc = new_org_document(organization_id, doc);
        self.state.lock().org_documents.push(doc.clone());
        Ok(doc)
    }

    async fn create_project(&self, project: NewProject) -> ApiResult<Project> {
        let mut created = fixture_project(project.organization_id, &project.name);
        created.client_name = project.client_name;
        created.deadline = project.deadline;
        created.instructions = project.instructions;
        self.state.lock().projects.push(created.clone());
        Ok(created)
    }

    async fn list_projects(&self, organization_id: Uuid) -> ApiResult<Vec<Project>> {
        Ok(self
            .state
            .lock()
            .projects
            .iter()
            .filter(|p| p.organization_id == organization_id)
            .cloned()
            .collect())
    }

    async fn get_project(&self, project_id: Uuid) -> ApiResult<Option<Project>> {
        Ok(self
            .state
            .lock()
            .projects
            .iter()
            .find(|p| p.id == project_id)
            .cloned())
    }

    async fn list_project_documents(&self, project_id: Uuid) -> ApiResult<Vec<ProjectDocument>> {
        Ok(self.project_documents_snapshot(project_id))
    }

    async fn insert_project_document(
        &self,
        project_id: Uuid,
        doc: NewDocument,
        is_primary_rft: bool,
    ) -> ApiResult<ProjectDocument> {
        let doc = new_project_document(project_id, doc, is_primary_rft);
        let mut state = self.state.lock();
        if is_primary_rft {
            for existing in state
                .project_documents
                .iter_mut()
                .filter(|d| d.project_id == project_id)
            {
                existing.is_primary_rft = false;
            }
        }
        state.project_documents.push(doc.clone());
        Ok(doc)
    }

    async fn set_primary_rft(&self, project_id: Uuid, document_id: Uuid) -> ApiResult<()> {
        let mut state = self.state.lock();
        if !state
            .project_documents
            .iter()
            .any(|d| d.project_id == project_id && d.id == document_id)
        {
            return Err(ApiError::not_found("Document not found"));
        }
        for doc in state
            .project_documents
            .iter_mut()
            .filter(|d| d.project_id == project_id)
        {
            doc.is_primary_rft = doc.id == document_id;
        }
        Ok(())
    }

    async fn create_work_package(&self, new: NewWorkPackage) -> ApiResult<WorkPackage> {
        let mut state = self.state.lock();
        // One past the highest, as the INSERT computes it
        let order = state
            .work_packages
            .iter()
            .filter(|wp| wp.project_id == new.project_id)
            .map(|wp| wp.order)
            .max()
            .map_or(0, |max| max + 1);
        let mut wp = fixture_work_package(new.project_id, order, WorkPackageStatus::Pending);
        wp.document_type = new.document_type;
        wp.document_description = new.document_description;
        wp.requirements = new.requirements;
        state.work_packages.push(wp.clone());
        Ok(wp)
    }

    async fn get_work_package(&self, id: Uuid) -> ApiResult<Option<WorkPackage>> {
        Ok(self
            .state
            .lock()
            .work_packages
            .iter()
            .find(|wp| wp.id == id)
            .cloned())
    }

    // Insertion order, so callers that need `order` must sort
    async fn list_work_packages(&self, project_id: Uuid) -> ApiResult<Vec<WorkPackage>> {
        Ok(self
            .state
            .lock()
            .work_packages
            .iter()
            .filter(|wp| wp.project_id == project_id)
            .cloned()
            .collect())
    }

    async fn update_requirements(&self, id: Uuid, requirements: &[String]) -> ApiResult<()> {
        self.with_work_package(id, |wp| wp.requirements = requirements.to_vec())
    }

    async fn update_work_package_status(&self, id: Uuid, status: WorkPackageStatus) -> ApiResult<()> {
        self.with_work_package(id, |wp| wp.status = status)
    }

    async fn get_content(&self, work_package_id: Uuid) -> ApiResult<Option<WorkPackageContent>> {
        Ok(self.content_snapshot(work_package_id))
    }

    async fn save_strategy(&self, work_package_id: Uuid, strategy: &Strategy) -> ApiResult<()> {
        self.with_content(work_package_id, |c| {
            c.bid_analysis = Some(strategy.bid_analysis.clone());
            c.win_themes = Some(strategy.win_themes.clone());
        });
        Ok(())
    }

    async fn save_win_themes(&self, work_package_id: Uuid, win_themes: &[String]) -> ApiResult<()> {
        self.with_content(work_package_id, |c| c.win_themes = Some(win_themes.to_vec()));
        Ok(())
    }

    async fn save_content(&self, work_package_id: Uuid, content: &str) -> ApiResult<()> {
        self.with_content(work_package_id, |c| c.content = Some(content.to_string()));
        Ok(())
    }

    async fn save_exported_file(&self, work_package_id: Uuid, path: &str) -> ApiResult<()> {
        self.with_content(work_package_id, |c| c.exported_file_path = Some(path.to_string()));
        Ok(())
    }
}

/// Language model that replays queued answers and records every prompt.
pub struct ScriptedModel {
    answers: Mutex<VecDeque<Result<String, LlmError>>>,
    prompts: Mutex<Vec<Prompt>>,
}

impl ScriptedModel {
    pub fn new(answers: Vec<Result<String, LlmError>>) -> Self {
        Self {
            answers: Mutex::new(answers.into()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn prompts(&self) -> Vec<Prompt> {
        self.prompts.lock().clone()
    }
}

#[async_trait]
impl LanguageModel for ScriptedModel {
    async fn complete(&self, prompt: &Prompt) -> Result<String, LlmError> {
        self.prompts.lock().push(prompt.clone());
        self.answers
            .lock()
            .pop_front()
            .unwrap_or_else(|| Err(LlmError::Provider("no scripted answer left".into())))
    }
}

/// File storage held in a map. Uploads and signing can be made to fail.
#[derive(Default)]
pub struct MemoryStorage {
    objects: Mutex<HashMap<String, (Vec<u8>, String)>>,
    fail_uploads: Mutex<bool>,
    fail_signing: Mutex<bool>,
}

impl MemoryStorage {
    pub fn put(&self, path: &str, bytes: &[u8], content_type: &str) {
        self.objects
            .lock()
            .insert(path.to_string(), (bytes.to_vec(), content_type.to_string()));
    }

    pub fn get(&self, path: &str) -> Option<(Vec<u8>, String)> {
        self.objects.lock().get(path).cloned()
    }

    pub fn fail_uploads(&self) {
        *self.fail_uploads.lock() = true;
    }

    pub fn fail_signing(&self) {
        *self.fail_signing.lock() = true;
    }
}

#[async_trait]
impl FileStorage for MemoryStorage {
    async fn download(&self, path: &str) -> ApiResult<Vec<u8>> {
        self.get(path)
            .map(|(bytes, _)| bytes)
            .ok_or_else(|| ApiError::storage(anyhow::anyhow!("object {path} not found")))
    }

    async fn upload(&self, path: &str, bytes: Vec<u8>, content_type: &str) -> ApiResult<()> {
        if *self.fail_uploads.lock() {
            return Err(ApiError::storage(anyhow::anyhow!("upload rejected")));
        }
        self.put(path, &bytes, content_type);
        Ok(())
    }

    async fn signed_url(&self, path: &str, expires_in: Duration) -> ApiResult<String> {
        if *self.fail_signing.lock() {
            return Err(ApiError::storage(anyhow::anyhow!("signing rejected")));
        }
        Ok(format!(
            "https://storage.test/{path}?expires_in={}",
            expires_in.as_secs()
        ))
    }
}
