//! Menu entry CRUD endpoints

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use ctxmenu_core::{EntryUpdate, MenuEntry, RegistryError};
use serde::{Deserialize, Serialize};

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// Body of `POST /api/entries`
#[derive(Debug, Deserialize)]
struct AddRequest {
    #[serde(flatten)]
    entry: MenuEntry,
    #[serde(default)]
    dry_run: bool,
}

/// Body of `PUT /api/entries/{key}`
#[derive(Debug, Deserialize)]
struct EditRequest {
    #[serde(flatten)]
    update: EntryUpdate,
    #[serde(default)]
    dry_run: bool,
}

/// `?dry_run=` for body-less mutations
#[derive(Debug, Default, Deserialize)]
struct DryRunQuery {
    #[serde(default)]
    dry_run: bool,
}

/// Entry as written (or as it would be written)
#[derive(Debug, Serialize)]
struct EntryResponse {
    entry: MenuEntry,
    dry_run: bool,
}

#[derive(Debug, Serialize)]
struct RemoveResponse {
    key_name: String,
    removed: usize,
    dry_run: bool,
}

async fn list_entries(State(state): State<AppState>) -> ApiResult<Json<Vec<MenuEntry>>> {
    let entries = state
        .blocking(|manager, _| Ok(manager.list_entries()?))
        .await?;
    Ok(Json(entries))
}

async fn get_entry(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> ApiResult<Json<MenuEntry>> {
    let entry = state
        .blocking(move |manager, _| {
            manager
                .get_entry(&key)?
                .ok_or_else(|| ApiError::from(RegistryError::NotFound(key)))
        })
        .await?;
    Ok(Json(entry))
}

async fn add_entry(
    State(state): State<AppState>,
    Json(req): Json<AddRequest>,
) -> ApiResult<(StatusCode, Json<EntryResponse>)> {
    let dry_run = req.dry_run;
    let entry = state
        .blocking(move |manager, _| Ok(manager.add_entry(&req.entry, dry_run)?))
        .await?;
    let status = if dry_run { StatusCode::OK } else { StatusCode::CREATED };
    Ok((status, Json(EntryResponse { entry, dry_run })))
}

async fn edit_entry(
    State(state): State<AppState>,
    Path(key): Path<String>,
    Json(req): Json<EditRequest>,
) -> ApiResult<Json<EntryResponse>> {
    let dry_run = req.dry_run;
    let entry = state
        .blocking(move |manager, _| Ok(manager.edit_entry(&key, &req.update, dry_run)?))
        .await?;
    Ok(Json(EntryResponse { entry, dry_run }))
}

async fn remove_entry(
    State(state): State<AppState>,
    Path(key): Path<String>,
    Query(query): Query<DryRunQuery>,
) -> ApiResult<Json<RemoveResponse>> {
    let dry_run = query.dry_run;
    let key_name = key.clone();
    let removed = state
        .blocking(move |manager, _| Ok(manager.remove_entry(&key, dry_run)?))
        .await?;
    Ok(Json(RemoveResponse {
        key_name,
        removed,
        dry_run,
    }))
}

/// Create the entry router
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/entries", get(list_entries).post(add_entry))
        .route("/api/entries/{key}", axum::routing::put(edit_entry).delete(remove_entry))
        .route("/api/entry/{key}", get(get_entry))
}
