use axum::{
    extract::{Path, State},
    Json,
};
use std::sync::Arc;
use uuid::Uuid;

use crate::api::{Created, DataResponse, NoContent};
use crate::app::AppState;
use crate::auth::RequestContext;
use crate::domain::{ProjectDocument, RegisterDocumentRequest};
use crate::error::ApiResult;

/// Register an RFT document for a project
pub async fn register_document(
    State(state): State<Arc<AppState>>,
    ctx: RequestContext,
    Path(project_id): Path<Uuid>,
    Json(req): Json<RegisterDocumentRequest>,
) -> ApiResult<Created<ProjectDocument>> {
    let doc = state
        .pipeline
        .register_project_document(&ctx, project_id, req)
        .await?;
    Ok(Created(doc))
}

pub async fn list_documents(
    ctx: RequestContext,
    Path(project_id): Path<Uuid>,
) -> ApiResult<DataResponse<Vec<ProjectDocument>>> {
    let project = ctx.project(project_id).await?;
    let docs = ctx.repo.list_project_documents(project.id).await?;
    Ok(DataResponse::new(docs))
}

/// Make one document the project's primary RFT
pub async fn set_primary(
    State(state): State<Arc<AppState>>,
    ctx: RequestContext,
    Path((project_id, document_id)): Path<(Uuid, Uuid)>,
) -> ApiResult<NoContent> {
    state
        .pipeline
        .set_primary_rft(&ctx, project_id, document_id)
        .await?;
    Ok(NoContent)
}
