use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::auth::AuthenticatedUser;
use crate::error::AppResult;
use crate::models::{Invitation, Membership};
use crate::services::invitations::CreatedInvitation;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct CreateInvitationRequest {
    pub email: String,
}

pub async fn list_invitations(
    State(state): State<AppState>,
    Path(workspace_id): Path<Uuid>,
    user: AuthenticatedUser,
) -> AppResult<Json<Vec<Invitation>>> {
    Ok(Json(
        state
            .invitations()
            .list_invitations(&user, workspace_id)
            .await?,
    ))
}

pub async fn create_invitation(
    State(state): State<AppState>,
    Path(workspace_id): Path<Uuid>,
    user: AuthenticatedUser,
    Json(payload): Json<CreateInvitationRequest>,
) -> AppResult<(StatusCode, Json<CreatedInvitation>)> {
    let created = state
        .invitations()
        .create_invitation(&user, workspace_id, &payload.email)
        .await?;
    Ok((StatusCode::CREATED, Json(created)))
}

pub async fn accept_invitation(
    State(state): State<AppState>,
    Path(token): Path<String>,
    user: AuthenticatedUser,
) -> AppResult<Json<Membership>> {
    Ok(Json(
        state.invitations().accept_invitation(&user, &token).await?,
    ))
}

pub async fn reject_invitation(
    State(state): State<AppState>,
    Path(token): Path<String>,
    user: AuthenticatedUser,
) -> AppResult<Json<Invitation>> {
    Ok(Json(
        state.invitations().reject_invitation(&user, &token).await?,
    ))
}
