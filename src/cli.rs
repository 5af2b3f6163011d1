use std::path::PathBuf;

use clap::Parser;

use crate::cmd::Commands;

/// Personal task manager with a terminal UI.
/// Without a subcommand the interactive UI is launched.
#[derive(Parser, Debug, Default)]
#[command(name = "tf", version, about = "Personal task manager with AI-assisted breakdowns")]
pub struct Cli {
    /// Path to the JSON task file (default: <data dir>/taskflow/taskflow_pro_tasks.json).
    #[arg(long, global = true, env = "TASKFLOW_DB")]
    pub db: Option<PathBuf>,

    /// Path to config file (default: `~/.config/taskflow/config.toml`).
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Gemini API key used for subtask suggestions.
    #[arg(long, global = true, env = "GEMINI_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Disable AI suggestions even when a key is configured.
    #[arg(long, global = true)]
    pub no_ai: bool,

    /// Log level filter (trace, debug, info, warn, error).
    #[arg(long, global = true, default_value = "info", env = "TASKFLOW_LOG")]
    pub log_level: String,

    /// Path to log file (default: `$TMPDIR/taskflow.log`).
    #[arg(long, global = true)]
    pub log_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}
