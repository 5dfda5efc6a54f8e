//! Host status and the Windows 11 classic-menu toggle

use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use ctxmenu_core::SystemStatus;
use serde::{Deserialize, Serialize};

use crate::error::ApiResult;
use crate::state::AppState;

/// Requested classic-menu change; toggles when omitted
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
enum MenuAction {
    Enable,
    Disable,
    #[default]
    Toggle,
}

/// Body of `POST /api/win11-menu`
#[derive(Debug, Deserialize)]
struct Win11Request {
    #[serde(default)]
    action: MenuAction,
    #[serde(default)]
    restart_explorer: bool,
    #[serde(default)]
    dry_run: bool,
}

#[derive(Debug, Serialize)]
struct Win11Response {
    classic_menu: bool,
    restart_explorer: bool,
    dry_run: bool,
}

async fn status(State(state): State<AppState>) -> ApiResult<Json<SystemStatus>> {
    let status = state.blocking(|manager, _| Ok(manager.status())).await?;
    Ok(Json(status))
}

async fn win11_menu(
    State(state): State<AppState>,
    Json(req): Json<Win11Request>,
) -> ApiResult<Json<Win11Response>> {
    let Win11Request {
        action,
        restart_explorer,
        dry_run,
    } = req;
    let classic_menu = state
        .blocking(move |manager, _| {
            let enable = match action {
                MenuAction::Enable => true,
                MenuAction::Disable => false,
                MenuAction::Toggle => !manager.get_classic_menu_state(),
            };
            Ok(manager.toggle_win11_classic_menu(enable, restart_explorer, dry_run)?)
        })
        .await?;
    Ok(Json(Win11Response {
        classic_menu,
        restart_explorer,
        dry_run,
    }))
}

/// Create the system router
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/status", get(status))
        .route("/api/win11-menu", post(win11_menu))
}
