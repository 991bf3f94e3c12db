pub mod documents;
pub mod health;
pub mod organization;
pub mod projects;
pub mod work_packages;

use axum::{
    routing::{get, post, put},
    Router,
};
use std::sync::Arc;

use crate::app::AppState;

/// Build the API router with all routes
pub fn api_router() -> Router<Arc<AppState>> {
    Router::new()
        // Public routes
        .route("/health", get(health::health_check))
        // Organization
        .route("/organization", get(organization::get_organization))
        .route("/organization/settings", put(organization::update_settings))
        .route(
            "/organization/documents",
            get(organization::list_documents).post(organization::register_document),
        )
        // Projects
        .route(
            "/projects",
            get(projects::list_projects).post(projects::create_project),
        )
        .route("/projects/:project_id", get(projects::get_project))
        .route("/projects/:project_id/context", get(projects::check_context))
        .route(
            "/projects/:project_id/work-packages",
            get(projects::list_work_packages),
        )
        .route("/projects/:project_id/export", post(projects::export_project))
        // RFT documents (nested under projects)
        .route(
            "/projects/:project_id/documents",
            get(documents::list_documents).post(documents::register_document),
        )
        .route(
            "/projects/:project_id/documents/:document_id/primary",
            put(documents::set_primary),
        )
        // Work packages
        .route("/work-packages", post(work_packages::create_work_package))
        .route("/work-packages/:id", get(work_packages::get_work_package))
        .route("/work-packages/:id/content", put(work_packages::update_content))
        .route(
            "/work-packages/:id/extract-requirements",
            post(work_packages::extract_requirements),
        )
        .route(
            "/work-packages/:id/generate-strategy",
            post(work_packages::generate_strategy),
        )
        .route(
            "/work-packages/:id/win-themes",
            post(work_packages::generate_win_themes),
        )
        .route(
            "/work-packages/:id/generate-content",
            post(work_packages::generate_content),
        )
        .route(
            "/work-packages/:id/editor-action",
            post(work_packages::editor_action),
        )
        .route("/work-packages/:id/export", post(work_packages::export))
}
