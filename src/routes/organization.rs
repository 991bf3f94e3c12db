use axum::{extract::State, Json};
use std::sync::Arc;

use crate::api::{Created, DataResponse};
use crate::app::AppState;
use crate::auth::RequestContext;
use crate::domain::{
    Organization, OrganizationDocument, OrganizationSettings, RegisterDocumentRequest,
    UpdateOrganizationSettingsRequest,
};
use crate::error::ApiResult;

/// The caller's organization, including its company profile
pub async fn get_organization(ctx: RequestContext) -> Json<Organization> {
    Json(ctx.organization)
}

pub async fn update_settings(
    ctx: RequestContext,
    Json(req): Json<UpdateOrganizationSettingsRequest>,
) -> ApiResult<Json<Organization>> {
    let settings = OrganizationSettings {
        company_profile: req.company_profile,
    };
    let organization = ctx
        .repo
        .update_organization_settings(ctx.organization_id(), &settings)
        .await?;

    tracing::info!(organization_id = %organization.id, user_id = %ctx.user_id(), "Organization settings updated");
    Ok(Json(organization))
}

pub async fn list_documents(
    ctx: RequestContext,
) -> ApiResult<DataResponse<Vec<OrganizationDocument>>> {
    let docs = ctx
        .repo
        .list_organization_documents(ctx.organization_id())
        .await?;
    Ok(DataResponse::new(docs))
}

/// Register a file already uploaded to storage and extract its text
pub async fn register_document(
    State(state): State<Arc<AppState>>,
    ctx: RequestContext,
    Json(req): Json<RegisterDocumentRequest>,
) -> ApiResult<Created<OrganizationDocument>> {
    let doc = state
        .pipeline
        .register_organization_document(&ctx, req)
        .await?;
    Ok(Created(doc))
}
