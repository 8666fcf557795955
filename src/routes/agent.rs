use axum::{
    extract::{Path, State},
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::AuthenticatedUser;
use crate::error::AppResult;
use crate::services::agent::{AgentIntent, IntentOutcome};
use crate::services::boards::BoardView;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct AgentRequest {
    pub intents: Vec<AgentIntent>,
}

#[derive(Serialize)]
pub struct AgentResponse {
    pub outcomes: Vec<IntentOutcome>,
    pub board: BoardView,
}

/// Applies planned intents, then returns the resulting board so the planner
/// can continue from fresh state.
pub async fn apply_intents(
    State(state): State<AppState>,
    Path(board_id): Path<Uuid>,
    user: AuthenticatedUser,
    Json(payload): Json<AgentRequest>,
) -> AppResult<Json<AgentResponse>> {
    state.guard().authorize_board(user.user_id, board_id).await?;
    let agent = state.agent();
    let outcomes = agent.apply_intents(&user, board_id, payload.intents).await;
    let board = agent.snapshot(&user, board_id).await?;
    tracing::info!(
        %board_id,
        applied = outcomes
            .iter()
            .filter(|outcome| matches!(outcome, IntentOutcome::Applied { .. }))
            .count(),
        total = outcomes.len(),
        "applied agent intents"
    );
    Ok(Json(AgentResponse { outcomes, board }))
}
