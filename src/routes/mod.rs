use anyhow::Context;
use axum::http::HeaderValue;
use axum::{
    middleware,
    routing::{delete, get, patch, post, put},
    Router,
};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::{auth::AuthenticatedUser, state::AppState};

pub mod agent;
pub mod boards;
pub mod health;
pub mod invitations;
pub mod workspaces;

pub fn create_router(state: AppState) -> anyhow::Result<Router<()>> {
    let cors = if let Some(origins) = state.config.cors_allowed_origin.as_ref() {
        let headers = origins
            .split(',')
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(|value| {
                value
                    .parse::<HeaderValue>()
                    .with_context(|| format!("invalid CORS allowed origin '{value}'"))
            })
            .collect::<anyhow::Result<Vec<_>>>()?;

        CorsLayer::new()
            .allow_origin(AllowOrigin::list(headers))
            .allow_methods(tower_http::cors::AllowMethods::mirror_request())
            .allow_headers(tower_http::cors::AllowHeaders::mirror_request())
            .allow_credentials(true)
    } else {
        CorsLayer::new()
            .allow_origin(AllowOrigin::mirror_request())
            .allow_methods(tower_http::cors::AllowMethods::mirror_request())
            .allow_headers(tower_http::cors::AllowHeaders::mirror_request())
            .allow_credentials(true)
    };

    let workspace_routes = Router::new()
        .route(
            "/",
            get(workspaces::list_workspaces).post(workspaces::create_workspace),
        )
        .route("/:id", delete(workspaces::delete_workspace))
        .route("/:id/members", get(workspaces::list_members))
        .route("/:id/members/:user_id", delete(workspaces::remove_member))
        .route(
            "/:id/boards",
            get(workspaces::list_boards).post(workspaces::create_board),
        )
        .route("/:id/boards/:board_id", delete(workspaces::delete_board))
        .route("/:id/audit", get(workspaces::list_audit))
        .route(
            "/:id/invitations",
            get(invitations::list_invitations).post(invitations::create_invitation),
        );

    let invitation_routes = Router::new()
        .route("/:token/accept", post(invitations::accept_invitation))
        .route("/:token/reject", post(invitations::reject_invitation));

    let board_routes = Router::new()
        .route("/:id", get(boards::get_board).patch(boards::rename_board))
        .route("/:id/lists", post(boards::create_list))
        .route("/:id/lists/order", put(boards::reorder_lists))
        .route(
            "/:id/lists/:list_id",
            patch(boards::rename_list).delete(boards::delete_list),
        )
        .route("/:id/lists/:list_id/cards", post(boards::create_card))
        .route("/:id/lists/:list_id/cards/order", put(boards::reorder_cards))
        .route(
            "/:id/cards/:card_id",
            patch(boards::update_card).delete(boards::delete_card),
        )
        .route("/:id/cards/:card_id/move", post(boards::move_card))
        .route("/:id/agent", post(agent::apply_intents));

    let protected_state = state.clone();
    let protected_routes = Router::new()
        .nest("/api/workspaces", workspace_routes)
        .nest("/api/invitations", invitation_routes)
        .nest("/api/boards", board_routes)
        .layer(middleware::from_extractor_with_state::<AuthenticatedUser, _>(protected_state));

    Ok(Router::new()
        .merge(protected_routes)
        .route("/api/health", get(health::health_check))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors))
}
