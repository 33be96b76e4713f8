use crate::state::AppState;
use axum::middleware;
use axum::{
    routing::{delete, get, patch, post, put},
    Json, Router,
};
use serde_json::json;

pub mod conversations;
use conversations::{
    archive_conversation, block_conversation, create_conversation, get_conversation,
    list_conversations, mark_conversation_read, unblock_conversation,
};
pub mod messages;
use messages::{
    delete_message, get_message_history, mark_message_read, send_message, update_message,
};

use crate::websocket::handlers::ws_handler;

async fn metrics() -> String {
    json!({
        "service": "mentor-messaging",
        "version": env!("CARGO_PKG_VERSION"),
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339(),
    })
    .to_string()
}

pub fn build_router(state: AppState) -> Router {
    // Service introspection endpoints stay public for healthchecks.
    let introspection = Router::new()
        .route("/health", get(|| async { "OK" }))
        .route("/metrics", get(metrics));

    let api_v1 = Router::new()
        .route("/conversations", get(list_conversations))
        .route("/conversations", post(create_conversation))
        .route("/conversations/:id", get(get_conversation))
        .route("/conversations/:id/messages", get(get_message_history))
        .route("/conversations/:id/messages", post(send_message))
        .route("/conversations/:id/read", patch(mark_conversation_read))
        .route("/conversations/:id/archive", put(archive_conversation))
        .route("/conversations/:id/block", put(block_conversation))
        .route("/conversations/:id/unblock", put(unblock_conversation))
        .route("/messages/:id", put(update_message))
        .route("/messages/:id", delete(delete_message))
        .route("/messages/:id/read", patch(mark_message_read));

    let secured_api_v1 = api_v1.layer(middleware::from_fn_with_state(
        state.clone(),
        crate::middleware::auth::auth_middleware,
    ));

    // The realtime endpoint authenticates at handshake time via its token
    // query parameter, so it sits outside the bearer-header middleware.
    let realtime = Router::new().route("/ws", get(ws_handler));

    let router = introspection
        .merge(Router::new().nest("/api/v1", secured_api_v1.merge(realtime)))
        .fallback(|| async {
            (
                axum::http::StatusCode::NOT_FOUND,
                Json(json!({"error": "Not Found", "status": 404})),
            )
        });

    crate::middleware::with_defaults(router).with_state(state)
}
