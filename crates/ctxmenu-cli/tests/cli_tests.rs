use ctxmenu_cli::{build_cli, dispatch, exit_code, Context, EXIT_FAILURE, EXIT_PERMISSION};
use ctxmenu_core::registry::RegistryBackend;
use ctxmenu_core::{Hive, MemoryRegistry, RegistryManager, SafetyValidator};
use ctxmenu_test_utils::temp_log_store;
use pretty_assertions::assert_eq;
use std::sync::Arc;
use tempfile::TempDir;

struct Fixture {
    _dir: TempDir,
    registry: Arc<MemoryRegistry>,
    ctx: Context,
}

fn fixture(elevated: bool) -> Fixture {
    let (dir, store) = temp_log_store();
    let registry = Arc::new(MemoryRegistry::new());
    let manager = RegistryManager::new(
        registry.clone(),
        SafetyValidator::with_elevation(elevated),
        Arc::new(store.operation_log()),
    );
    Fixture {
        _dir: dir,
        registry,
        ctx: Context { manager, store },
    }
}

fn run(f: &Fixture, args: &[&str]) -> (anyhow::Result<()>, String) {
    let matches = build_cli()
        .try_get_matches_from(std::iter::once("ctxmenu").chain(args.iter().copied()))
        .unwrap();
    let mut out = Vec::new();
    let result = dispatch(&f.ctx, &matches, &mut out);
    (result, String::from_utf8(out).unwrap())
}

const EXE: &str = r"C:\VSCode\Code.exe";

#[test]
fn test_add_dry_run_writes_nothing() {
    let f = fixture(false);
    let (result, out) = run(
        &f,
        &["add", "OpenVSCode", "--exe", EXE, "--scope", "all_files", "--dry-run"],
    );
    result.unwrap();
    assert!(out.starts_with("[dry-run] added 'OpenVSCode'"));
    assert_eq!(f.registry.key_count(), 0);

    let tail = f.ctx.store.tail(10).unwrap();
    assert!(tail.total > 0);
    assert!(tail.lines.iter().all(|l| l.contains("[DRY-RUN]")));
}

#[test]
fn test_live_add_without_elevation_exits_with_permission_code() {
    let f = fixture(false);
    let (result, _) = run(&f, &["add", "OpenVSCode", "--exe", EXE, "-s", "directory"]);
    assert_eq!(exit_code(&result.unwrap_err()), EXIT_PERMISSION);
}

#[test]
fn test_add_edit_list_remove() {
    let f = fixture(true);
    run(&f, &["add", "OpenVSCode", "--exe", EXE, "--scope", "all_files", "--icon", &format!("{EXE},0")])
        .0
        .unwrap();
    run(&f, &["edit", "OpenVSCode", "--scope", "all_files,directory", "--no-icon"])
        .0
        .unwrap();

    let (result, out) = run(&f, &["list", "--json"]);
    result.unwrap();
    let entries: serde_json::Value = serde_json::from_str(&out).unwrap();
    assert_eq!(entries[0]["key_name"], "OpenVSCode");
    assert_eq!(
        entries[0]["scopes"],
        serde_json::json!(["all_files", "directory"])
    );
    assert_eq!(entries[0]["icon"], serde_json::Value::Null);

    let (result, out) = run(&f, &["remove", "OpenVSCode"]);
    result.unwrap();
    assert!(out.contains("from 2 location(s)"));
    let (_, out) = run(&f, &["remove", "OpenVSCode"]);
    assert!(out.contains("nothing to remove"));
}

#[test]
fn test_edit_ext_adds_extension_scope() {
    let f = fixture(true);
    run(&f, &["add", "Edit", "--exe", EXE, "--scope", "all_files"])
        .0
        .unwrap();
    run(&f, &["edit", "Edit", "--ext", "txt"]).0.unwrap();

    assert!(f
        .registry
        .key_exists(Hive::ClassesRoot, r".txt\shell\Edit\command")
        .unwrap());
    assert!(f
        .registry
        .key_exists(Hive::ClassesRoot, r"*\shell\Edit")
        .unwrap());
}

#[test]
fn test_get_missing_entry_fails() {
    let f = fixture(true);
    let (result, _) = run(&f, &["get", "Missing"]);
    let err = result.unwrap_err();
    assert_eq!(exit_code(&err), EXIT_FAILURE);
    assert!(err.to_string().contains("Missing"));
}

#[test]
fn test_classic_menu_toggle() {
    let f = fixture(false);
    let (_, out) = run(&f, &["classic-menu", "status"]);
    assert_eq!(out, "classic menu: off\n");

    let (result, out) = run(&f, &["classic-menu", "toggle"]);
    result.unwrap();
    assert!(out.starts_with("classic menu: on"));

    let (result, out) = run(&f, &["classic-menu", "disable", "--dry-run"]);
    result.unwrap();
    assert!(out.starts_with("[dry-run] classic menu: off"));
    assert!(f.ctx.manager.get_classic_menu_state());
}

#[test]
fn test_logs_clear_restore_delete() {
    let f = fixture(true);
    run(&f, &["add", "A", "--exe", EXE, "--scope", "directory"])
        .0
        .unwrap();
    let before = f.ctx.store.tail(usize::MAX).unwrap();

    let (result, out) = run(&f, &["logs", "clear"]);
    result.unwrap();
    assert!(out.starts_with(&format!("log cleared; {} line(s)", before.total)));

    let backups = f.ctx.store.list_backups().unwrap();
    assert_eq!(backups.len(), 1);
    let name = backups[0].filename.clone();

    run(&f, &["logs", "restore", &name]).0.unwrap();
    assert_eq!(f.ctx.store.tail(usize::MAX).unwrap().lines, before.lines);

    let (result, _) = run(&f, &["logs", "delete", "../outside.bak"]);
    assert!(result.is_err());
    run(&f, &["logs", "delete", &name]).0.unwrap();
    let (_, out) = run(&f, &["logs", "backups"]);
    assert_eq!(out, "no backups\n");
}

#[test]
fn test_status_json() {
    let f = fixture(true);
    let (result, out) = run(&f, &["status", "--json"]);
    result.unwrap();
    let status: serde_json::Value = serde_json::from_str(&out).unwrap();
    assert_eq!(status["elevated"], true);
    assert_eq!(status["classic_menu"], false);
}
