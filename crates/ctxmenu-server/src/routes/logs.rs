//! Operation log and backup endpoints

use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use ctxmenu_core::{BackupMetadata, LogTail, DEFAULT_TAIL_LINES};
use serde::{Deserialize, Serialize};

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
struct TailQuery {
    #[serde(default = "default_lines")]
    lines: usize,
}

fn default_lines() -> usize {
    DEFAULT_TAIL_LINES
}

#[derive(Debug, Default, Deserialize)]
struct DryRunBody {
    #[serde(default)]
    dry_run: bool,
}

#[derive(Debug, Deserialize)]
struct RestoreRequest {
    filename: String,
    #[serde(default)]
    dry_run: bool,
}

/// Result of a clear; `backup` is absent on a dry run
#[derive(Debug, Serialize)]
struct ClearResponse {
    backup: Option<BackupMetadata>,
    lines: usize,
    dry_run: bool,
}

#[derive(Debug, Serialize)]
struct BackupResponse {
    backup: BackupMetadata,
    dry_run: bool,
}

async fn tail(
    State(state): State<AppState>,
    Query(query): Query<TailQuery>,
) -> ApiResult<Json<LogTail>> {
    let tail = state
        .blocking(move |_, store| Ok(store.tail(query.lines)?))
        .await?;
    Ok(Json(tail))
}

async fn list_backups(State(state): State<AppState>) -> ApiResult<Json<Vec<BackupMetadata>>> {
    let backups = state.blocking(|_, store| Ok(store.list_backups()?)).await?;
    Ok(Json(backups))
}

async fn clear(
    State(state): State<AppState>,
    body: Bytes,
) -> ApiResult<Json<ClearResponse>> {
    let dry_run = if body.is_empty() {
        false
    } else {
        serde_json::from_slice::<DryRunBody>(&body)
            .map_err(|e| ApiError::BadRequest(e.to_string()))?
            .dry_run
    };
    let response = state
        .blocking(move |_, store| {
            if dry_run {
                let lines = store.tail(0)?.total;
                return Ok(ClearResponse {
                    backup: None,
                    lines,
                    dry_run,
                });
            }
            let backup = store.clear_log()?;
            Ok(ClearResponse {
                lines: backup.lines,
                backup: Some(backup),
                dry_run,
            })
        })
        .await?;
    Ok(Json(response))
}

async fn restore(
    State(state): State<AppState>,
    Json(req): Json<RestoreRequest>,
) -> ApiResult<Json<BackupResponse>> {
    let dry_run = req.dry_run;
    let backup = state
        .blocking(move |_, store| {
            let backup = store.backup_info(&req.filename)?;
            if !dry_run {
                store.restore_backup(&req.filename)?;
            }
            Ok(backup)
        })
        .await?;
    Ok(Json(BackupResponse { backup, dry_run }))
}

async fn delete_backup(
    State(state): State<AppState>,
    Path(filename): Path<String>,
    Query(query): Query<DryRunBody>,
) -> ApiResult<Json<BackupResponse>> {
    let dry_run = query.dry_run;
    let backup = state
        .blocking(move |_, store| {
            let backup = store.backup_info(&filename)?;
            if !dry_run {
                store.delete_backup(&filename)?;
            }
            Ok(backup)
        })
        .await?;
    Ok(Json(BackupResponse { backup, dry_run }))
}

/// Create the log router
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/logs", get(tail))
        .route("/api/logs/backups", get(list_backups))
        .route("/api/logs/backups/{filename}", delete(delete_backup))
        .route("/api/logs/clear", post(clear))
        .route("/api/logs/restore", post(restore))
}
