use axum::{
    routing::{delete, get, post},
    Router,
};

use crate::api::state::AppState;

use super::handlers;

pub fn v1_router() -> Router<AppState> {
    let memories = Router::new()
        .route("/", get(handlers::memories::list_memories))
        .route("/extract", post(handlers::memories::extract_memories))
        .route("/search", post(handlers::memories::search_memories))
        .route("/path", get(handlers::graph::find_path))
        .route("/central", get(handlers::graph::central_memories))
        .route("/clusters", get(handlers::graph::clusters))
        .route("/{memoryId}", get(handlers::memories::get_memory))
        .route("/{memoryId}/related", get(handlers::graph::related_memories));

    let documents = Router::new()
        .route("/", post(handlers::library::create_document))
        .route("/{documentId}", delete(handlers::library::delete_document))
        .route("/{documentId}/graph", get(handlers::graph::document_graph))
        .route(
            "/{documentId}/memories",
            delete(handlers::memories::delete_document_memories),
        );

    let actions = Router::new()
        .route("/translate", post(handlers::actions::translate_action))
        .route("/cache", delete(handlers::actions::clear_action_cache))
        .route("/stats", get(handlers::actions::action_cache_stats));

    let graph = Router::new()
        .route("/search", post(handlers::graph::search_across_graphs))
        .route("/timeline", get(handlers::graph::timeline));

    Router::new()
        .route("/health", get(handlers::health_check))
        .nest("/memories", memories)
        .nest("/documents", documents)
        .nest("/actions", actions)
        .nest("/graph", graph)
        .route("/notes", post(handlers::library::create_note))
        .route(
            "/conversations/{conversationId}/memories",
            delete(handlers::memories::delete_conversation_memories),
        )
        .route("/context", post(handlers::context::build_context))
        .route(
            "/relationships/detect",
            post(handlers::relationships::detect_relationships),
        )
        .route("/interests", get(handlers::interests::get_interests))
        .route("/interests/rebuild", post(handlers::interests::rebuild_interests))
}
