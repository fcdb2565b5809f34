//! Axum chess hub.
//!
//! # Routes
//!
//! | Method | Path         | Description                                  |
//! |--------|--------------|----------------------------------------------|
//! | `GET`  | `/ws`        | WebSocket upgrade for game connections       |
//! | `GET`  | `/api/games` | Summaries of live sessions (JSON)            |
//! | `GET`  | anything else| Static browser client from `STATIC_DIR`      |

pub mod config;
pub mod ws_handler;

use axum::extract::State;
use axum::extract::ws::WebSocketUpgrade;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use chess_core::Lobby;
use chess_core::session::SessionSummary;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;

/// Shared application state available to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub lobby: Lobby,
    pub max_message_size: usize,
}

/// Build the application router. Paths that match no route are served from
/// `static_dir`.
pub fn app(state: AppState, static_dir: &str) -> Router {
    Router::new()
        .route("/ws", get(ws_upgrade))
        .route("/api/games", get(games_handler))
        .layer(CorsLayer::permissive())
        .with_state(state)
        .fallback_service(ServeDir::new(static_dir))
}

/// `GET /ws`: upgrade to WebSocket and hand off to [`ws_handler::handle_socket`].
async fn ws_upgrade(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.max_message_size(state.max_message_size)
        .on_upgrade(move |socket| ws_handler::handle_socket(socket, state.lobby))
}

/// `GET /api/games`: return a JSON array of live session summaries.
async fn games_handler(State(state): State<AppState>) -> Json<Vec<SessionSummary>> {
    Json(state.lobby.matchmaker().summaries().await)
}
