use crate::handlers::{self, AppState};
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;

/// Replicated stores are whole index snapshots; allow large bodies on the
/// receiver route.
const MAX_STORE_BODY: usize = 512 * 1024 * 1024;

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route(
            "/fulltext/_all_indexes_update",
            post(handlers::all_indexes_update),
        )
        .route("/fulltext/_index_update", post(handlers::index_update))
        .route("/fulltext/_reindex", post(handlers::reindex))
        .route("/fulltext/_replicate", post(handlers::replicate))
        .route("/fulltext/_delete_index", post(handlers::delete_index))
        .route(
            "/fulltext/_delete_all_indexes",
            post(handlers::delete_all_indexes),
        )
        .route(
            "/fulltext/_options/:instance",
            get(handlers::get_options).post(handlers::set_options),
        )
        .route(
            "/fulltext/_mapping_version/:instance/:doctype/:lang",
            get(handlers::get_mapping_version),
        )
        .route("/fulltext/_mapping/:doctype", post(handlers::post_mapping))
        .route(
            "/fulltext/_update_index_alias/:instance/:doctype/:lang",
            post(handlers::update_index_alias),
        )
        .route(
            "/fulltext/_delete_index_query/:instance/:doctype/:lang",
            post(handlers::delete_index_query),
        )
        .layer(DefaultBodyLimit::max(MAX_STORE_BODY))
        .with_state(state)
}

pub async fn serve(
    state: Arc<AppState>,
    bind_addr: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    tracing::info!("listening on {}", listener.local_addr()?);
    axum::serve(listener, router(state)).await?;
    Ok(())
}
