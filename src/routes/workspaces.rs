use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::auth::AuthenticatedUser;
use crate::error::AppResult;
use crate::models::{AuditLogEntry, Board, BoardImage, Membership, Workspace};
use crate::services::cascade::CascadeReport;
use crate::services::workspaces::WorkspaceSummary;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct CreateWorkspaceRequest {
    pub name: String,
}

#[derive(Deserialize)]
pub struct CreateBoardRequest {
    pub title: String,
    #[serde(default)]
    pub image: Option<BoardImage>,
}

#[derive(Deserialize)]
pub struct AuditQuery {
    pub limit: Option<usize>,
}

/// Lists the caller's workspaces. The personal workspace is created on the
/// first call.
pub async fn list_workspaces(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> AppResult<Json<Vec<WorkspaceSummary>>> {
    let service = state.workspaces();
    service.ensure_personal_workspace(&user).await?;
    Ok(Json(service.list_workspaces(&user).await?))
}

pub async fn create_workspace(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(payload): Json<CreateWorkspaceRequest>,
) -> AppResult<(StatusCode, Json<Workspace>)> {
    let workspace = state
        .workspaces()
        .create_workspace(&user, &payload.name)
        .await?;
    Ok((StatusCode::CREATED, Json(workspace)))
}

pub async fn delete_workspace(
    State(state): State<AppState>,
    Path(workspace_id): Path<Uuid>,
    user: AuthenticatedUser,
) -> AppResult<Json<CascadeReport>> {
    let report = state
        .workspaces()
        .delete_workspace(&user, workspace_id)
        .await?;
    Ok(Json(report))
}

pub async fn list_members(
    State(state): State<AppState>,
    Path(workspace_id): Path<Uuid>,
    user: AuthenticatedUser,
) -> AppResult<Json<Vec<Membership>>> {
    Ok(Json(
        state.workspaces().list_members(&user, workspace_id).await?,
    ))
}

pub async fn remove_member(
    State(state): State<AppState>,
    Path((workspace_id, member_id)): Path<(Uuid, Uuid)>,
    user: AuthenticatedUser,
) -> AppResult<StatusCode> {
    state
        .workspaces()
        .remove_member(&user, workspace_id, member_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn list_boards(
    State(state): State<AppState>,
    Path(workspace_id): Path<Uuid>,
    user: AuthenticatedUser,
) -> AppResult<Json<Vec<Board>>> {
    Ok(Json(state.boards().list_boards(&user, workspace_id).await?))
}

pub async fn create_board(
    State(state): State<AppState>,
    Path(workspace_id): Path<Uuid>,
    user: AuthenticatedUser,
    Json(payload): Json<CreateBoardRequest>,
) -> AppResult<(StatusCode, Json<Board>)> {
    let board = state
        .boards()
        .create_board(&user, workspace_id, &payload.title, payload.image)
        .await?;
    Ok((StatusCode::CREATED, Json(board)))
}

pub async fn delete_board(
    State(state): State<AppState>,
    Path((workspace_id, board_id)): Path<(Uuid, Uuid)>,
    user: AuthenticatedUser,
) -> AppResult<StatusCode> {
    state
        .boards()
        .delete_board(&user, workspace_id, board_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn list_audit(
    State(state): State<AppState>,
    Path(workspace_id): Path<Uuid>,
    Query(query): Query<AuditQuery>,
    user: AuthenticatedUser,
) -> AppResult<Json<Vec<AuditLogEntry>>> {
    let limit = query
        .limit
        .filter(|limit| *limit > 0)
        .unwrap_or(state.config.audit_log_default_limit);
    let entries = state
        .workspaces()
        .list_audit_log(&user, workspace_id, limit)
        .await?;
    Ok(Json(entries))
}
