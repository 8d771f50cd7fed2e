use axum::{
    Router,
    routing::{get, post},
};

use crate::app_state::AppState;
use crate::handlers::chat;

/// Routes for entering, leaving, speaking, and polling the room.
pub fn create_router_chat() -> Router<AppState> {
    Router::new()
        .route("/enter", post(chat::enter))
        .route("/leave", post(chat::leave))
        .route("/say", post(chat::say))
        .route("/messages", get(chat::get_messages))
}
