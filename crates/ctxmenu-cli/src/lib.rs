//! ctxmenu command line front end
//!
//! [`build_cli`] defines the argument surface and [`dispatch`] runs one
//! parsed command against a [`Context`], writing results to `out`. Every
//! registry access goes through the context's `RegistryManager`.

use anyhow::{bail, Result};
use clap::{value_parser, Arg, ArgAction, ArgGroup, ArgMatches, Command};
use ctxmenu_core::{
    AppConfig, CtxMenuError, EntryUpdate, LogStore, MenuEntry, RegistryError, RegistryManager,
    TargetScope,
};
use std::collections::BTreeSet;
use std::io::Write;
use std::path::PathBuf;

/// Exit code for operational failures
pub const EXIT_FAILURE: u8 = 1;

/// Exit code when the process lacks the privileges for a write
pub const EXIT_PERMISSION: u8 = 2;

/// What a command runs against
pub struct Context {
    /// Sole registry gateway
    pub manager: RegistryManager,
    /// Live operation log and backups
    pub store: LogStore,
}

fn parse_scope(raw: &str) -> Result<TargetScope, String> {
    raw.parse::<TargetScope>().map_err(|e| e.to_string())
}

fn key_arg() -> Arg {
    Arg::new("key")
        .required(true)
        .help("Registry key name of the entry")
}

fn dry_run_arg() -> Arg {
    Arg::new("dry-run")
        .long("dry-run")
        .action(ArgAction::SetTrue)
        .help("Log the planned registry operations without writing")
}

fn json_arg() -> Arg {
    Arg::new("json")
        .long("json")
        .action(ArgAction::SetTrue)
        .help("Output as JSON")
}

fn entry_args(cmd: Command) -> Command {
    cmd.arg(
        Arg::new("exe")
            .long("exe")
            .help("Executable; the command becomes \"<exe>\" \"{target}\""),
    )
    .arg(
        Arg::new("command")
            .long("command")
            .help("Full command line; {target} becomes %1 or %V per scope"),
    )
    .arg(
        Arg::new("name")
            .long("name")
            .help("Label shown in Explorer (default: the key name)"),
    )
    .arg(
        Arg::new("icon")
            .long("icon")
            .help("Icon path, optionally with a ,<index> suffix"),
    )
    .arg(
        Arg::new("scope")
            .long("scope")
            .short('s')
            .action(ArgAction::Append)
            .value_delimiter(',')
            .value_parser(parse_scope)
            .help("all_files, directory, dir_background or extension"),
    )
    .arg(
        Arg::new("ext")
            .long("ext")
            .action(ArgAction::Append)
            .value_delimiter(',')
            .help("File extensions; implies the extension scope"),
    )
    .arg(dry_run_arg())
}

/// Argument definitions for `ctxmenu`
#[must_use]
pub fn build_cli() -> Command {
    Command::new("ctxmenu")
        .version(ctxmenu_core::VERSION)
        .about("Manage Windows Explorer context menu entries")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .arg(
            Arg::new("config")
                .long("config")
                .global(true)
                .value_parser(value_parser!(PathBuf))
                .help("Config file (default: ./ctxmenu.toml when present)"),
        )
        .arg(
            Arg::new("log-json")
                .long("log-json")
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Emit diagnostics as JSON"),
        )
        .arg(
            Arg::new("log-dir")
                .long("log-dir")
                .global(true)
                .value_parser(value_parser!(PathBuf))
                .help("Directory for the operation log and its backups"),
        )
        .subcommand(
            entry_args(Command::new("add").about("Register a new entry"))
                .arg(key_arg())
                .group(
                    ArgGroup::new("invocation")
                        .args(["exe", "command"])
                        .required(true),
                ),
        )
        .subcommand(
            entry_args(Command::new("edit").about("Change an existing entry"))
                .arg(key_arg())
                .arg(
                    Arg::new("no-icon")
                        .long("no-icon")
                        .action(ArgAction::SetTrue)
                        .conflicts_with("icon")
                        .help("Remove the icon"),
                )
                .group(ArgGroup::new("invocation").args(["exe", "command"])),
        )
        .subcommand(
            Command::new("remove")
                .about("Remove an entry from every scope")
                .arg(key_arg())
                .arg(dry_run_arg()),
        )
        .subcommand(
            Command::new("list")
                .about("List registered entries")
                .arg(json_arg()),
        )
        .subcommand(
            Command::new("get")
                .about("Show one entry")
                .arg(key_arg())
                .arg(json_arg()),
        )
        .subcommand(
            Command::new("classic-menu")
                .about("Windows 11 classic context menu")
                .arg(
                    Arg::new("action")
                        .required(true)
                        .value_parser(["status", "enable", "disable", "toggle"]),
                )
                .arg(
                    Arg::new("restart-explorer")
                        .long("restart-explorer")
                        .action(ArgAction::SetTrue)
                        .help("Restart explorer.exe so the change shows immediately"),
                )
                .arg(dry_run_arg()),
        )
        .subcommand(
            Command::new("status")
                .about("Show elevation and classic menu state")
                .arg(json_arg()),
        )
        .subcommand(
            Command::new("logs")
                .about("Operation log and backups")
                .subcommand_required(true)
                .subcommand(
                    Command::new("tail")
                        .about("Show the end of the operation log")
                        .arg(
                            Arg::new("lines")
                                .long("lines")
                                .short('n')
                                .default_value("10")
                                .value_parser(value_parser!(usize)),
                        )
                        .arg(json_arg()),
                )
                .subcommand(Command::new("clear").about("Back up the log, then empty it"))
                .subcommand(
                    Command::new("backups")
                        .about("List log backups, newest first")
                        .arg(json_arg()),
                )
                .subcommand(
                    Command::new("restore")
                        .about("Overwrite the log with a backup")
                        .arg(Arg::new("filename").required(true)),
                )
                .subcommand(
                    Command::new("delete")
                        .about("Delete a backup")
                        .arg(Arg::new("filename").required(true)),
                ),
        )
}

/// Config file, then `CTXMENU_LOG_DIR`, then `--log-dir`
///
/// # Errors
/// When an explicit or implicit config file cannot be read or parsed.
pub fn resolve_config(matches: &ArgMatches) -> Result<AppConfig> {
    let explicit = matches.get_one::<PathBuf>("config");
    let mut config = AppConfig::load(explicit.map(PathBuf::as_path))?;
    if let Some(dir) = matches.get_one::<PathBuf>("log-dir") {
        config = config.with_log_dir(dir);
    }
    Ok(config)
}

/// Process exit code for a failed command
#[must_use]
pub fn exit_code(err: &anyhow::Error) -> u8 {
    for cause in err.chain() {
        if let Some(e) = cause.downcast_ref::<RegistryError>() {
            return if e.is_permission() {
                EXIT_PERMISSION
            } else {
                EXIT_FAILURE
            };
        }
        if let Some(e) = cause.downcast_ref::<CtxMenuError>() {
            return if e.is_permission() {
                EXIT_PERMISSION
            } else {
                EXIT_FAILURE
            };
        }
    }
    EXIT_FAILURE
}

/// Run the parsed command
///
/// # Errors
/// Whatever the core operation returned, plus output write failures.
pub fn dispatch(ctx: &Context, matches: &ArgMatches, out: &mut dyn Write) -> Result<()> {
    match matches.subcommand() {
        Some(("add", args)) => cmd_add(ctx, args, out),
        Some(("edit", args)) => cmd_edit(ctx, args, out),
        Some(("remove", args)) => cmd_remove(ctx, args, out),
        Some(("list", args)) => cmd_list(ctx, args, out),
        Some(("get", args)) => cmd_get(ctx, args, out),
        Some(("classic-menu", args)) => cmd_classic_menu(ctx, args, out),
        Some(("status", args)) => cmd_status(ctx, args, out),
        Some(("logs", args)) => cmd_logs(ctx, args, out),
        Some((other, _)) => bail!("unknown command '{other}'"),
        None => bail!("no command given"),
    }
}

fn key(args: &ArgMatches) -> &str {
    args.get_one::<String>("key").map_or("", String::as_str)
}

fn prefix(dry_run: bool) -> &'static str {
    if dry_run {
        "[dry-run] "
    } else {
        ""
    }
}

fn scopes_of(args: &ArgMatches) -> Option<BTreeSet<TargetScope>> {
    args.get_many::<TargetScope>("scope")
        .map(|scopes| scopes.copied().collect())
}

fn exts_of(args: &ArgMatches) -> Option<BTreeSet<String>> {
    args.get_many::<String>("ext")
        .map(|exts| exts.cloned().collect())
}

fn describe_scopes(entry: &MenuEntry) -> String {
    entry
        .scopes
        .iter()
        .map(|scope| match scope {
            TargetScope::Extension => format!(
                "extension({})",
                entry.extensions.iter().cloned().collect::<Vec<_>>().join(",")
            ),
            other => other.as_str().to_string(),
        })
        .collect::<Vec<_>>()
        .join(", ")
}

fn cmd_add(ctx: &Context, args: &ArgMatches, out: &mut dyn Write) -> Result<()> {
    let dry_run = args.get_flag("dry-run");
    let key_name = key(args);
    let mut entry = match (args.get_one::<String>("exe"), args.get_one::<String>("command")) {
        (Some(exe), _) => MenuEntry::for_executable(key_name, exe),
        (None, Some(command)) => MenuEntry::new(key_name, command.as_str()),
        (None, None) => bail!("either --exe or --command is required"),
    };
    if let Some(name) = args.get_one::<String>("name") {
        entry = entry.with_display_name(name.as_str());
    }
    if let Some(icon) = args.get_one::<String>("icon") {
        entry = entry.with_icon(icon.as_str());
    }
    if let Some(scopes) = scopes_of(args) {
        entry = entry.with_scopes(scopes);
    }
    for ext in exts_of(args).unwrap_or_default() {
        entry = entry.with_extension(ext);
    }

    let added = ctx.manager.add_entry(&entry, dry_run)?;
    writeln!(
        out,
        "{}added '{}' to {} location(s): {}",
        prefix(dry_run),
        added.key_name,
        added.resolve_scope_paths().len(),
        describe_scopes(&added)
    )?;
    Ok(())
}

fn cmd_edit(ctx: &Context, args: &ArgMatches, out: &mut dyn Write) -> Result<()> {
    let dry_run = args.get_flag("dry-run");
    let key_name = key(args);

    let mut update = EntryUpdate {
        display_name: args.get_one::<String>("name").cloned(),
        command: args.get_one::<String>("command").cloned(),
        icon: None,
        scopes: scopes_of(args),
        extensions: exts_of(args),
    };
    if let Some(exe) = args.get_one::<String>("exe") {
        update.command = Some(MenuEntry::for_executable(key_name, exe).command);
    }
    if args.get_flag("no-icon") {
        update.icon = Some(None);
    } else if let Some(icon) = args.get_one::<String>("icon") {
        update.icon = Some(Some(icon.clone()));
    }
    if update.extensions.is_some() {
        let scopes = match update.scopes.take() {
            Some(scopes) => Some(scopes),
            None => ctx.manager.get_entry(key_name)?.map(|current| current.scopes),
        };
        update.scopes = scopes.map(|mut scopes| {
            scopes.insert(TargetScope::Extension);
            scopes
        });
    }

    let edited = ctx.manager.edit_entry(key_name, &update, dry_run)?;
    writeln!(
        out,
        "{}updated '{}': {}",
        prefix(dry_run),
        edited.key_name,
        describe_scopes(&edited)
    )?;
    Ok(())
}

fn cmd_remove(ctx: &Context, args: &ArgMatches, out: &mut dyn Write) -> Result<()> {
    let dry_run = args.get_flag("dry-run");
    let removed = ctx.manager.remove_entry(key(args), dry_run)?;
    if removed == 0 {
        writeln!(out, "'{}' is not registered; nothing to remove", key(args))?;
    } else {
        writeln!(
            out,
            "{}removed '{}' from {removed} location(s)",
            prefix(dry_run),
            key(args)
        )?;
    }
    Ok(())
}

fn write_entry(out: &mut dyn Write, entry: &MenuEntry) -> Result<()> {
    writeln!(out, "{}", entry.key_name)?;
    writeln!(out, "  label:   {}", entry.display_label())?;
    writeln!(out, "  command: {}", entry.command)?;
    if let Some(icon) = &entry.icon {
        writeln!(out, "  icon:    {icon}")?;
    }
    writeln!(out, "  scopes:  {}", describe_scopes(entry))?;
    Ok(())
}

fn cmd_list(ctx: &Context, args: &ArgMatches, out: &mut dyn Write) -> Result<()> {
    let entries = ctx.manager.list_entries()?;
    if args.get_flag("json") {
        writeln!(out, "{}", serde_json::to_string_pretty(&entries)?)?;
        return Ok(());
    }
    if entries.is_empty() {
        writeln!(out, "no entries registered")?;
    }
    for entry in &entries {
        write_entry(out, entry)?;
    }
    Ok(())
}

fn cmd_get(ctx: &Context, args: &ArgMatches, out: &mut dyn Write) -> Result<()> {
    let Some(entry) = ctx.manager.get_entry(key(args))? else {
        return Err(RegistryError::NotFound(key(args).to_string()).into());
    };
    if args.get_flag("json") {
        writeln!(out, "{}", serde_json::to_string_pretty(&entry)?)?;
    } else {
        write_entry(out, &entry)?;
    }
    Ok(())
}

fn on_off(state: bool) -> &'static str {
    if state {
        "on"
    } else {
        "off"
    }
}

fn cmd_classic_menu(ctx: &Context, args: &ArgMatches, out: &mut dyn Write) -> Result<()> {
    let action = args.get_one::<String>("action").map_or("status", String::as_str);
    let current = ctx.manager.get_classic_menu_state();
    let enable = match action {
        "status" => {
            writeln!(out, "classic menu: {}", on_off(current))?;
            return Ok(());
        }
        "enable" => true,
        "disable" => false,
        _ => !current,
    };

    let dry_run = args.get_flag("dry-run");
    let restart = args.get_flag("restart-explorer");
    let state = ctx
        .manager
        .toggle_win11_classic_menu(enable, restart, dry_run)?;
    writeln!(
        out,
        "{}classic menu: {}{}",
        prefix(dry_run),
        on_off(if dry_run { enable } else { state }),
        if restart { " (explorer restarted)" } else { "" }
    )?;
    if !restart && !dry_run {
        writeln!(out, "restart Explorer or sign out for the change to show")?;
    }
    Ok(())
}

fn cmd_status(ctx: &Context, args: &ArgMatches, out: &mut dyn Write) -> Result<()> {
    let status = ctx.manager.status();
    if args.get_flag("json") {
        writeln!(out, "{}", serde_json::to_string_pretty(&status)?)?;
    } else {
        writeln!(out, "elevated:     {}", if status.elevated { "yes" } else { "no" })?;
        writeln!(out, "classic menu: {}", on_off(status.classic_menu))?;
        writeln!(out, "log file:     {}", ctx.store.paths().log_file.display())?;
    }
    Ok(())
}

fn cmd_logs(ctx: &Context, args: &ArgMatches, out: &mut dyn Write) -> Result<()> {
    let store = &ctx.store;
    match args.subcommand() {
        Some(("tail", sub)) => {
            let n = sub.get_one::<usize>("lines").copied().unwrap_or(10);
            let tail = store.tail(n)?;
            if sub.get_flag("json") {
                writeln!(out, "{}", serde_json::to_string_pretty(&tail)?)?;
            } else {
                for line in &tail.lines {
                    writeln!(out, "{line}")?;
                }
                writeln!(
                    out,
                    "-- {} of {} line(s), {} backup(s)",
                    tail.lines.len(),
                    tail.total,
                    tail.backup_count
                )?;
            }
        }
        Some(("clear", _)) => {
            let backup = store.clear_log()?;
            writeln!(
                out,
                "log cleared; {} line(s) saved to {}",
                backup.lines, backup.filename
            )?;
        }
        Some(("backups", sub)) => {
            let backups = store.list_backups()?;
            if sub.get_flag("json") {
                writeln!(out, "{}", serde_json::to_string_pretty(&backups)?)?;
            } else if backups.is_empty() {
                writeln!(out, "no backups")?;
            } else {
                for b in &backups {
                    writeln!(
                        out,
                        "{}  {}  {:>8} B  {:>6} line(s)",
                        b.filename,
                        b.created.format("%Y-%m-%d %H:%M:%S"),
                        b.size,
                        b.lines
                    )?;
                }
            }
        }
        Some(("restore", sub)) => {
            let name = sub.get_one::<String>("filename").map_or("", String::as_str);
            store.restore_backup(name)?;
            writeln!(out, "log restored from {name}")?;
        }
        Some(("delete", sub)) => {
            let name = sub.get_one::<String>("filename").map_or("", String::as_str);
            store.delete_backup(name)?;
            writeln!(out, "deleted {name}")?;
        }
        Some((other, _)) => bail!("unknown logs command '{other}'"),
        None => bail!("no logs command given"),
    }
    Ok(())
}
