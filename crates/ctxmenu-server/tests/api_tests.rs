//! Route tests over an in-memory registry

use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::response::Response;
use axum::Router;
use ctxmenu_core::{Hive, MemoryRegistry, RegistryBackend, RegistryManager, SafetyValidator};
use ctxmenu_server::{router, AppState};
use ctxmenu_test_utils::{temp_log_store, VSCODE_EXE};
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::ServiceExt;

struct TestApp {
    _dir: TempDir,
    registry: Arc<MemoryRegistry>,
    state: AppState,
    router: Router,
}

impl TestApp {
    fn new(elevated: bool) -> Self {
        let (dir, store) = temp_log_store();
        let registry = Arc::new(MemoryRegistry::new());
        let manager = RegistryManager::new(
            registry.clone(),
            SafetyValidator::with_elevation(elevated),
            Arc::new(store.operation_log()),
        );
        let state = AppState::new(manager, store);
        Self {
            _dir: dir,
            registry,
            router: router(state.clone()),
            state,
        }
    }

    async fn request(&self, request: Request<Body>) -> Response {
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to send request")
    }

    async fn get(&self, uri: &str) -> (StatusCode, Value) {
        json_of(self.request(Request::get(uri).body(Body::empty()).unwrap()).await).await
    }

    async fn send(&self, method: &str, uri: &str, body: Value) -> (StatusCode, Value) {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        json_of(self.request(request).await).await
    }

    async fn delete(&self, uri: &str) -> (StatusCode, Value) {
        let request = Request::delete(uri).body(Body::empty()).unwrap();
        json_of(self.request(request).await).await
    }
}

async fn json_of(response: Response) -> (StatusCode, Value) {
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes)
            .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
    };
    (status, value)
}

fn vscode_body(dry_run: bool) -> Value {
    json!({
        "key_name": "OpenVSCode",
        "display_name": "Open with VS Code",
        "command": format!("\"{VSCODE_EXE}\" \"{{target}}\""),
        "scopes": ["all_files", "directory"],
        "dry_run": dry_run,
    })
}

#[tokio::test]
async fn test_entry_lifecycle() {
    let app = TestApp::new(true);

    let (status, body) = app.send("POST", "/api/entries", vscode_body(false)).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["dry_run"], false);
    assert!(app
        .registry
        .key_exists(Hive::ClassesRoot, r"Directory\shell\OpenVSCode\command")
        .unwrap());

    let (status, body) = app.get("/api/entry/OpenVSCode").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["display_name"], "Open with VS Code");
    assert_eq!(body["scopes"], json!(["all_files", "directory"]));

    let (status, body) = app
        .send(
            "PUT",
            "/api/entries/OpenVSCode",
            json!({ "scopes": ["dir_background"] }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["entry"]["scopes"], json!(["dir_background"]));

    let (_, list) = app.get("/api/entries").await;
    assert_eq!(list.as_array().unwrap().len(), 1);

    let (status, body) = app.delete("/api/entries/OpenVSCode").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["removed"], 1);

    let (status, body) = app.get("/api/entry/OpenVSCode").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"].as_str().unwrap().contains("OpenVSCode"));
}

#[tokio::test]
async fn test_dry_run_add_writes_nothing() {
    let app = TestApp::new(false);

    let (status, body) = app.send("POST", "/api/entries", vscode_body(true)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["dry_run"], true);
    assert_eq!(app.registry.key_count(), 0);

    let (_, tail) = app.get("/api/logs?lines=50").await;
    let lines = tail["lines"].as_array().unwrap();
    assert!(!lines.is_empty());
    assert!(lines
        .iter()
        .all(|l| l.as_str().unwrap().contains("[DRY-RUN]")));
}

#[tokio::test]
async fn test_error_status_mapping() {
    let app = TestApp::new(false);

    let (status, body) = app.send("POST", "/api/entries", vscode_body(false)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert!(body["error"].is_string());

    let (status, _) = app
        .send(
            "POST",
            "/api/entries",
            json!({ "key_name": "Bad", "command": "", "scopes": ["all_files"] }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .send("PUT", "/api/entries/Missing", json!({ "display_name": "x" }))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_win11_menu_toggle() {
    let app = TestApp::new(false);

    let (_, status) = app.get("/api/status").await;
    assert_eq!(status["classic_menu"], false);
    assert_eq!(status["elevated"], false);

    let (code, body) = app
        .send("POST", "/api/win11-menu", json!({ "action": "toggle" }))
        .await;
    assert_eq!(code, StatusCode::OK);
    assert_eq!(body["classic_menu"], true);

    let (_, body) = app
        .send(
            "POST",
            "/api/win11-menu",
            json!({ "action": "disable", "dry_run": true }),
        )
        .await;
    assert_eq!(body["classic_menu"], true);
    assert!(app.state.manager().get_classic_menu_state());

    let (code, _) = app
        .send("POST", "/api/win11-menu", json!({ "action": "sideways" }))
        .await;
    assert!(code.is_client_error());
}

#[tokio::test]
async fn test_win11_menu_without_action_toggles() {
    let app = TestApp::new(false);

    let (code, body) = app.send("POST", "/api/win11-menu", json!({})).await;
    assert_eq!(code, StatusCode::OK);
    assert_eq!(body["classic_menu"], true);
    assert!(app.state.manager().get_classic_menu_state());

    let (code, body) = app
        .send("POST", "/api/win11-menu", json!({ "dry_run": true }))
        .await;
    assert_eq!(code, StatusCode::OK);
    assert_eq!(body["dry_run"], true);
    assert_eq!(body["classic_menu"], true);
    assert!(app.state.manager().get_classic_menu_state());
}

#[tokio::test]
async fn test_log_clear_restore_delete() {
    let app = TestApp::new(true);
    app.send("POST", "/api/entries", vscode_body(false)).await;
    let (_, before) = app.get("/api/logs?lines=1000").await;

    let (status, body) = app.send("POST", "/api/logs/clear", json!({ "dry_run": true })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["backup"], Value::Null);
    assert_eq!(body["lines"], before["total"]);

    let (status, body) = app.send("POST", "/api/logs/clear", json!({})).await;
    assert_eq!(status, StatusCode::OK);
    let filename = body["backup"]["filename"].as_str().unwrap().to_string();
    assert_eq!(body["lines"], before["total"]);

    let (_, backups) = app.get("/api/logs/backups").await;
    assert_eq!(backups[0]["filename"], filename.as_str());

    let (status, _) = app
        .send("POST", "/api/logs/restore", json!({ "filename": filename }))
        .await;
    assert_eq!(status, StatusCode::OK);
    let (_, after) = app.get("/api/logs?lines=1000").await;
    assert_eq!(after["lines"], before["lines"]);

    let (status, _) = app
        .send("POST", "/api/logs/restore", json!({ "filename": "../escape.bak" }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app.delete(&format!("/api/logs/backups/{filename}?dry_run=true")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(app.state.store().list_backups().unwrap().len(), 1);

    let (status, _) = app.delete(&format!("/api/logs/backups/{filename}")).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = app.delete(&format!("/api/logs/backups/{filename}")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
