use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use serde_json::Value;
use uuid::Uuid;

use crate::auth::AuthenticatedUser;
use crate::error::{AppError, AppResult};
use crate::models::{Board, Card, List};
use crate::services::boards::{BoardView, CardChanges, CardMove};
use crate::state::AppState;
use crate::utils::json::classify_nullable;

#[derive(Deserialize)]
pub struct TitleRequest {
    pub title: String,
}

#[derive(Deserialize)]
pub struct OrderRequest {
    pub ordered_ids: Vec<Uuid>,
}

#[derive(Deserialize)]
pub struct CreateCardRequest {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    /// Places the new card right after this one instead of at the end.
    #[serde(default)]
    pub after_card_id: Option<Uuid>,
}

#[derive(Deserialize)]
pub struct MoveCardRequest {
    #[serde(default)]
    pub source_list_id: Option<Uuid>,
    pub destination_list_id: Uuid,
    pub index: i64,
}

pub async fn get_board(
    State(state): State<AppState>,
    Path(board_id): Path<Uuid>,
    user: AuthenticatedUser,
) -> AppResult<Json<BoardView>> {
    Ok(Json(state.boards().board_view(&user, board_id).await?))
}

pub async fn rename_board(
    State(state): State<AppState>,
    Path(board_id): Path<Uuid>,
    user: AuthenticatedUser,
    Json(payload): Json<TitleRequest>,
) -> AppResult<Json<Board>> {
    let board = state
        .boards()
        .rename_board(&user, board_id, &payload.title)
        .await?;
    Ok(Json(board))
}

pub async fn create_list(
    State(state): State<AppState>,
    Path(board_id): Path<Uuid>,
    user: AuthenticatedUser,
    Json(payload): Json<TitleRequest>,
) -> AppResult<(StatusCode, Json<List>)> {
    let list = state
        .boards()
        .create_list(&user, board_id, &payload.title)
        .await?;
    Ok((StatusCode::CREATED, Json(list)))
}

pub async fn reorder_lists(
    State(state): State<AppState>,
    Path(board_id): Path<Uuid>,
    user: AuthenticatedUser,
    Json(payload): Json<OrderRequest>,
) -> AppResult<Json<Vec<List>>> {
    let lists = state
        .boards()
        .reorder_lists(&user, board_id, &payload.ordered_ids)
        .await?;
    Ok(Json(lists))
}

pub async fn rename_list(
    State(state): State<AppState>,
    Path((board_id, list_id)): Path<(Uuid, Uuid)>,
    user: AuthenticatedUser,
    Json(payload): Json<TitleRequest>,
) -> AppResult<Json<List>> {
    let list = state
        .boards()
        .rename_list(&user, board_id, list_id, &payload.title)
        .await?;
    Ok(Json(list))
}

/// Returns the remaining lists with their new positions.
pub async fn delete_list(
    State(state): State<AppState>,
    Path((board_id, list_id)): Path<(Uuid, Uuid)>,
    user: AuthenticatedUser,
) -> AppResult<Json<Vec<List>>> {
    let remaining = state.boards().delete_list(&user, board_id, list_id).await?;
    Ok(Json(remaining))
}

pub async fn create_card(
    State(state): State<AppState>,
    Path((board_id, list_id)): Path<(Uuid, Uuid)>,
    user: AuthenticatedUser,
    Json(payload): Json<CreateCardRequest>,
) -> AppResult<(StatusCode, Json<Card>)> {
    let card = state
        .boards()
        .create_card(
            &user,
            board_id,
            list_id,
            &payload.title,
            payload.description.as_deref(),
            payload.after_card_id,
        )
        .await?;
    Ok((StatusCode::CREATED, Json(card)))
}

pub async fn reorder_cards(
    State(state): State<AppState>,
    Path((board_id, list_id)): Path<(Uuid, Uuid)>,
    user: AuthenticatedUser,
    Json(payload): Json<OrderRequest>,
) -> AppResult<Json<Vec<Card>>> {
    let cards = state
        .boards()
        .reorder_cards(&user, board_id, list_id, &payload.ordered_ids)
        .await?;
    Ok(Json(cards))
}

/// `description: null` clears the description; omitted fields are kept.
pub async fn update_card(
    State(state): State<AppState>,
    Path((board_id, card_id)): Path<(Uuid, Uuid)>,
    user: AuthenticatedUser,
    Json(body): Json<Value>,
) -> AppResult<Json<Card>> {
    let title = classify_nullable(body.get("title")).map_err(AppError::bad_request)?;
    let description = classify_nullable(body.get("description")).map_err(AppError::bad_request)?;
    let changes = CardChanges {
        title: title.into_change(),
        description: description.into_change(),
    };
    let card = state
        .boards()
        .update_card(&user, board_id, card_id, changes)
        .await?;
    Ok(Json(card))
}

pub async fn delete_card(
    State(state): State<AppState>,
    Path((board_id, card_id)): Path<(Uuid, Uuid)>,
    user: AuthenticatedUser,
) -> AppResult<Json<Vec<Card>>> {
    let remaining = state.boards().delete_card(&user, board_id, card_id).await?;
    Ok(Json(remaining))
}

pub async fn move_card(
    State(state): State<AppState>,
    Path((board_id, card_id)): Path<(Uuid, Uuid)>,
    user: AuthenticatedUser,
    Json(payload): Json<MoveCardRequest>,
) -> AppResult<Json<CardMove>> {
    let moved = state
        .boards()
        .move_card(
            &user,
            board_id,
            card_id,
            payload.source_list_id,
            payload.destination_list_id,
            payload.index,
        )
        .await?;
    Ok(Json(moved))
}
