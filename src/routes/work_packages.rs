use axum::{
    extract::{Path, State},
    Json,
};
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

use crate::api::{Created, NoContent};
use crate::app::AppState;
use crate::auth::RequestContext;
use crate::domain::{CreateWorkPackageRequest, Strategy, UpdateContentRequest, WorkPackage};
use crate::error::ApiResult;
use crate::pipeline::operations::ExportedDocument;
use crate::pipeline::{EditorActionInput, WorkPackageView};

#[derive(Serialize)]
pub struct RequirementsResponse {
    pub requirements: Vec<String>,
}

#[derive(Serialize)]
pub struct WinThemesResponse {
    pub win_themes: Vec<String>,
}

#[derive(Serialize)]
pub struct ContentResponse {
    pub content: String,
}

#[derive(Serialize)]
pub struct EditorActionResponse {
    pub result: String,
}

pub async fn create_work_package(
    State(state): State<Arc<AppState>>,
    ctx: RequestContext,
    Json(req): Json<CreateWorkPackageRequest>,
) -> ApiResult<Created<WorkPackage>> {
    let wp = state.pipeline.create_work_package(&ctx, req).await?;
    Ok(Created(wp))
}

pub async fn get_work_package(
    State(state): State<Arc<AppState>>,
    ctx: RequestContext,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<WorkPackageView>> {
    Ok(Json(state.pipeline.work_package_view(&ctx, id).await?))
}

/// Save a manually edited draft
pub async fn update_content(
    State(state): State<Arc<AppState>>,
    ctx: RequestContext,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateContentRequest>,
) -> ApiResult<NoContent> {
    state.pipeline.save_content(&ctx, id, &req.content).await?;
    Ok(NoContent)
}

pub async fn extract_requirements(
    State(state): State<Arc<AppState>>,
    ctx: RequestContext,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<RequirementsResponse>> {
    let requirements = state.pipeline.extract_requirements(&ctx, id).await?;
    Ok(Json(RequirementsResponse { requirements }))
}

pub async fn generate_strategy(
    State(state): State<Arc<AppState>>,
    ctx: RequestContext,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Strategy>> {
    Ok(Json(state.pipeline.generate_strategy(&ctx, id).await?))
}

pub async fn generate_win_themes(
    State(state): State<Arc<AppState>>,
    ctx: RequestContext,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<WinThemesResponse>> {
    let win_themes = state.pipeline.generate_win_themes(&ctx, id).await?;
    Ok(Json(WinThemesResponse { win_themes }))
}

pub async fn generate_content(
    State(state): State<Arc<AppState>>,
    ctx: RequestContext,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<ContentResponse>> {
    let content = state.pipeline.generate_content(&ctx, id).await?;
    Ok(Json(ContentResponse { content }))
}

pub async fn editor_action(
    State(state): State<Arc<AppState>>,
    ctx: RequestContext,
    Path(id): Path<Uuid>,
    Json(input): Json<EditorActionInput>,
) -> ApiResult<Json<EditorActionResponse>> {
    let result = state.pipeline.editor_action(&ctx, id, input).await?;
    Ok(Json(EditorActionResponse { result }))
}

pub async fn export(
    State(state): State<Arc<AppState>>,
    ctx: RequestContext,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<ExportedDocument>> {
    Ok(Json(state.pipeline.export_work_package(&ctx, id).await?))
}
