//! # TaskFlow - personal task manager
//!
//! A terminal task manager with a hierarchical task list, a kanban-style
//! flow board and optional AI-assisted subtask suggestions.
//!
//! ## Key Features
//!
//! - **Four Views**: dashboard, task list, hierarchy tree and flow board in one TUI
//! - **Parent/Child Tasks**: any task can hold subtasks; deleting a task removes its direct subtasks
//! - **Rich Task Metadata**: status, priority, due date and labels
//! - **AI Breakdowns**: ask Gemini to split a task into 3-5 subtasks (needs an API key)
//! - **Local File Storage**: the whole collection lives in one JSON file
//!
//! ## Quick Start
//!
//! ```bash
//! # Launch the TUI
//! tf
//!
//! # Add a task via CLI
//! tf add "Plan vacation" --priority high --label travel --due "next friday"
//!
//! # Break it down with AI
//! GEMINI_API_KEY=... tf suggest "Plan vacation"
//!
//! # Show the tree
//! tf tree
//! ```
//!
//! ## Key Commands
//!
//! - `tf` / `tf ui` - Launch the TUI
//! - `tf add <title>` - Create a new task
//! - `tf list` - List tasks with filters
//! - `tf status <id> <status>` - Move a task on the flow board
//! - `tf board` / `tf tree` / `tf dashboard` - Print the views
//!
//! Data is stored in `<data dir>/taskflow/taskflow_pro_tasks.json` unless `--db`
//! or `[storage] path` says otherwise. Settings are read from
//! `~/.config/taskflow/config.toml`.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::Parser;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;

pub mod ai;
pub mod cli;
pub mod cmd;
pub mod config;
pub mod db;
pub mod error;
pub mod fields;
pub mod format;
pub mod hierarchy;
pub mod stats;
pub mod store;
pub mod task;
pub mod tui {
    pub mod app;
    pub mod colors;
    pub mod enums;
    pub mod input;
    pub mod run;
    pub mod task_form;
    pub mod utils;
}

use ai::Assistant;
use cli::Cli;
use cmd::*;
use config::AppConfig;
use db::FileStorage;
use error::Result;
use store::TaskStore;

fn main() {
    let cli = Cli::parse();
    let _log_guard = init_logging(&cli.log_level, cli.log_file.as_deref());

    if let Err(e) = run(cli) {
        tracing::error!(error = %e, "command failed");
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let command = cli.command.as_ref();
    if let Some(Commands::Completions { shell }) = command {
        cmd_completions(*shell);
        return Ok(());
    }

    let config = AppConfig::load(&cli)?;
    info!(path = %config.storage_path.display(), "opening task store");
    let mut store = TaskStore::open(Box::new(FileStorage::new(&config.storage_path)))?;
    let assistant: Arc<dyn Assistant> = ai::from_config(&config.ai);

    let Some(command) = cli.command else {
        return cmd_ui(store, assistant, config.poll_timeout);
    };

    match command {
        Commands::Ui => cmd_ui(store, assistant, config.poll_timeout),

        Commands::Add { title, desc, status, priority, labels, due, parent } =>
            cmd_add(&mut store, title, desc, status, priority, labels, due, parent).map(|_| ()),

        Commands::List { status, priority, labels, due, sort, limit } =>
            cmd_list(&store, status, priority, labels, due, sort, limit),

        Commands::View { id, children } => cmd_view(&store, id, children),

        Commands::Edit { id, title, desc, status, priority, due, parent, clear_parent,
                         add_labels, rm_labels } =>
            cmd_edit(&mut store, id, title, desc, status, priority, due, parent,
                     clear_parent, add_labels, rm_labels),

        Commands::Status { id, status } => cmd_status(&mut store, id, status),

        Commands::Delete { id } => cmd_delete(&mut store, id),

        Commands::Tree => cmd_tree(&store),

        Commands::Board => cmd_board(&store),

        Commands::Dashboard { summary } => cmd_dashboard(&store, assistant.as_ref(), summary),

        Commands::Suggest { id, dry_run } =>
            cmd_suggest(&mut store, assistant.as_ref(), id, dry_run).map(|_| ()),

        Commands::Summary => cmd_summary(&store, assistant.as_ref()),

        Commands::Labels => cmd_labels(&store),

        Commands::Completions { .. } => unreachable!("completions handled above"),
    }
}

/// File-based logging. The TUI owns the terminal, so nothing goes to stdout.
/// The returned guard flushes buffered entries when dropped.
fn init_logging(level: &str, file_path: Option<&Path>) -> Option<WorkerGuard> {
    let (log_dir, file_name) = log_location(file_path)?;

    let file_appender = tracing_appender::rolling::never(log_dir, file_name);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_writer(non_blocking)
        .with_env_filter(env_filter)
        .with_ansi(false)
        .init();

    Some(guard)
}

/// Directory and file name for the log. The directory is created when
/// missing; if that fails the temp-dir default is used instead.
fn log_location(file_path: Option<&Path>) -> Option<(PathBuf, String)> {
    let default_path = std::env::temp_dir().join("taskflow.log");
    let split = |path: &Path| -> Option<(PathBuf, String)> {
        let dir = match path.parent() {
            Some(d) if !d.as_os_str().is_empty() => d.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let name = path.file_name()?.to_str()?.to_string();
        fs::create_dir_all(&dir).ok()?;
        Some((dir, name))
    };
    file_path
        .and_then(|p| split(p))
        .or_else(|| split(&default_path))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_directory_is_created() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("deeper").join("tf.log");
        let (log_dir, name) = log_location(Some(&path)).unwrap();
        assert_eq!(log_dir, dir.path().join("missing").join("deeper"));
        assert_eq!(name, "tf.log");
        assert!(log_dir.is_dir());
    }

    #[test]
    fn unusable_log_path_falls_back_to_temp_dir() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("file");
        fs::write(&blocker, "x").unwrap();
        let (log_dir, name) = log_location(Some(&blocker.join("tf.log"))).unwrap();
        assert_eq!(log_dir, std::env::temp_dir());
        assert_eq!(name, "taskflow.log");
    }

    #[test]
    fn bare_file_name_logs_to_current_dir() {
        let (log_dir, name) = log_location(Some(Path::new("tf.log"))).unwrap();
        assert_eq!(log_dir, PathBuf::from("."));
        assert_eq!(name, "tf.log");
    }
}
