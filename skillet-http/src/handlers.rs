//! Request handlers: control endpoints mapping 1:1 onto controller
//! operations, plus the read-side receiver endpoints for replicated stores.

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::Json;
use serde::Deserialize;
use skillet::index::snapshot;
use skillet::{IndexController, OptionsPatch, SkilletError, UpdateNotif};
use std::path::PathBuf;
use std::sync::Arc;

pub struct AppState {
    pub controller: Arc<IndexController>,
    /// Root of the read-side store tree served by the receiver endpoints.
    pub query_root: PathBuf,
}

type HandlerResult = Result<Json<serde_json::Value>, SkilletError>;

#[derive(Deserialize)]
pub struct IndexUpdateBody {
    pub instance: String,
    #[serde(rename = "docType")]
    pub doc_type: String,
}

#[derive(Deserialize)]
pub struct ReindexBody {
    pub instance: String,
    #[serde(rename = "docType")]
    pub doc_type: Option<String>,
}

#[derive(Deserialize)]
pub struct ReplicateBody {
    pub instance: String,
    #[serde(rename = "docType")]
    pub doc_type: Option<String>,
    pub lang: Option<String>,
}

#[derive(Deserialize)]
pub struct DeleteIndexBody {
    pub instance: String,
    #[serde(rename = "docType")]
    pub doc_type: String,
    #[serde(rename = "notifyQuery", default)]
    pub notify_query: bool,
}

#[derive(Deserialize)]
pub struct DeleteAllBody {
    pub instance: String,
    #[serde(rename = "notifyQuery", default)]
    pub notify_query: bool,
}

pub async fn all_indexes_update(State(state): State<Arc<AppState>>) -> HandlerResult {
    state.controller.update_all_indexes()?;
    Ok(Json(serde_json::Value::Null))
}

pub async fn index_update(
    State(state): State<Arc<AppState>>,
    Json(body): Json<IndexUpdateBody>,
) -> HandlerResult {
    state
        .controller
        .add_update_notif(UpdateNotif::new(body.instance, body.doc_type))?;
    Ok(Json(serde_json::Value::Null))
}

pub async fn reindex(
    State(state): State<Arc<AppState>>,
    Json(body): Json<ReindexBody>,
) -> HandlerResult {
    match body.doc_type {
        Some(doc_type) => state.controller.re_index(&body.instance, &doc_type).await?,
        None => state.controller.re_index_all(&body.instance).await?,
    }
    Ok(Json(serde_json::Value::Null))
}

pub async fn replicate(
    State(state): State<Arc<AppState>>,
    Json(body): Json<ReplicateBody>,
) -> HandlerResult {
    match (body.doc_type, body.lang) {
        (Some(doc_type), Some(lang)) => {
            let path = state
                .controller
                .replicate(&body.instance, &doc_type, &lang)
                .await?;
            Ok(Json(serde_json::json!({ "path": path })))
        }
        _ => {
            let paths = state.controller.replicate_all(&body.instance).await?;
            Ok(Json(serde_json::json!({ "paths": paths })))
        }
    }
}

pub async fn delete_index(
    State(state): State<Arc<AppState>>,
    Json(body): Json<DeleteIndexBody>,
) -> HandlerResult {
    state
        .controller
        .delete_index(&body.instance, &body.doc_type, body.notify_query)
        .await?;
    Ok(Json(serde_json::Value::Null))
}

pub async fn delete_all_indexes(
    State(state): State<Arc<AppState>>,
    Json(body): Json<DeleteAllBody>,
) -> HandlerResult {
    state
        .controller
        .delete_all_indexes_instance(&body.instance, body.notify_query)
        .await?;
    Ok(Json(serde_json::Value::Null))
}

pub async fn get_options(
    State(state): State<Arc<AppState>>,
    Path(instance): Path<String>,
) -> HandlerResult {
    let options = state.controller.get_options(&instance)?;
    Ok(Json(serde_json::to_value(options)?))
}

pub async fn set_options(
    State(state): State<Arc<AppState>>,
    Path(instance): Path<String>,
    Json(patch): Json<OptionsPatch>,
) -> HandlerResult {
    let options = state.controller.set_options(&instance, patch).await?;
    Ok(Json(serde_json::to_value(options)?))
}

pub async fn get_mapping_version(
    State(state): State<Arc<AppState>>,
    Path((instance, doc_type, lang)): Path<(String, String, String)>,
) -> HandlerResult {
    let version = state
        .controller
        .get_mapping_version(&instance, &doc_type, &lang)
        .await?;
    Ok(Json(serde_json::json!({ "version": version })))
}

/// Replace a docType's description file (validated, atomic rename).
pub async fn post_mapping(
    State(state): State<Arc<AppState>>,
    Path(doc_type): Path<String>,
    body: Bytes,
) -> HandlerResult {
    state.controller.mappings().install(&doc_type, &body)?;
    Ok(Json(serde_json::Value::Null))
}

/// Receiver: a replicated store body replaces the read-side shard under a
/// temp-unpack-plus-rename.
pub async fn update_index_alias(
    State(state): State<Arc<AppState>>,
    Path((instance, doc_type, lang)): Path<(String, String, String)>,
    body: Bytes,
) -> HandlerResult {
    let dest = state.query_root.join(&instance).join(&lang).join(&doc_type);
    snapshot::restore_snapshot(&body, &dest)?;
    tracing::info!(
        "installed replicated store for {}/{}/{}",
        instance,
        doc_type,
        lang
    );
    Ok(Json(serde_json::Value::Null))
}

/// Receiver: drop the read-side copy of a shard.
pub async fn delete_index_query(
    State(state): State<Arc<AppState>>,
    Path((instance, doc_type, lang)): Path<(String, String, String)>,
) -> HandlerResult {
    let dest = state.query_root.join(&instance).join(&lang).join(&doc_type);
    if dest.exists() {
        std::fs::remove_dir_all(&dest).map_err(SkilletError::from)?;
    }
    Ok(Json(serde_json::Value::Null))
}
