use axum::{
    extract::{Path, State},
    Json,
};
use chrono::Utc;
use std::sync::Arc;
use uuid::Uuid;

use crate::api::{Attachment, Created, DataResponse};
use crate::app::AppState;
use crate::auth::RequestContext;
use crate::domain::{CreateProjectRequest, NewProject, Project};
use crate::error::{ApiError, ApiResult};
use crate::pipeline::context::ContextValidation;
use crate::pipeline::WorkPackageView;

pub async fn create_project(
    ctx: RequestContext,
    Json(req): Json<CreateProjectRequest>,
) -> ApiResult<Created<Project>> {
    let name = req.name.trim();
    if name.is_empty() {
        return Err(ApiError::bad_request("name is required"));
    }

    let project = ctx
        .repo
        .create_project(NewProject {
            organization_id: ctx.organization_id(),
            name: name.to_string(),
            client_name: req.client_name.filter(|c| !c.trim().is_empty()),
            deadline: req.deadline,
            instructions: req.instructions.filter(|i| !i.trim().is_empty()),
        })
        .await?;

    tracing::info!(project_id = %project.id, user_id = %ctx.user_id(), "Project created");
    Ok(Created(project))
}

pub async fn list_projects(ctx: RequestContext) -> ApiResult<DataResponse<Vec<Project>>> {
    let projects = ctx.repo.list_projects(ctx.organization_id()).await?;
    Ok(DataResponse::new(projects))
}

pub async fn get_project(
    ctx: RequestContext,
    Path(project_id): Path<Uuid>,
) -> ApiResult<Json<Project>> {
    Ok(Json(ctx.project(project_id).await?))
}

/// Context size check so the UI can warn before a budget-sensitive stage
pub async fn check_context(
    State(state): State<Arc<AppState>>,
    ctx: RequestContext,
    Path(project_id): Path<Uuid>,
) -> ApiResult<Json<ContextValidation>> {
    let project = ctx.project(project_id).await?;
    let validation = state.pipeline.check_context(&ctx, &project).await?;
    Ok(Json(validation))
}

pub async fn list_work_packages(
    State(state): State<Arc<AppState>>,
    ctx: RequestContext,
    Path(project_id): Path<Uuid>,
) -> ApiResult<DataResponse<Vec<WorkPackageView>>> {
    let views = state
        .pipeline
        .list_work_package_views(&ctx, project_id)
        .await?;
    Ok(DataResponse::new(views))
}

/// ZIP of all completed documents
pub async fn export_project(
    State(state): State<Arc<AppState>>,
    ctx: RequestContext,
    Path(project_id): Path<Uuid>,
) -> ApiResult<Attachment> {
    let archive = state
        .pipeline
        .export_project(&ctx, project_id, Utc::now().date_naive())
        .await?;

    Ok(Attachment {
        filename: archive.filename,
        content_type: "application/zip",
        bytes: archive.bytes,
    })
}
