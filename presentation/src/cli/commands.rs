//! CLI command definitions

use clap::{Parser, ValueEnum};
use plenum_domain::{OptionId, SessionId};
use std::path::PathBuf;
use std::str::FromStr;

/// Output format for views and outcome reports
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text
    Text,
    /// JSON output
    Json,
}

/// A `--vote <session>=<option>` argument
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoteArg {
    pub session_id: SessionId,
    pub option_id: OptionId,
}

impl FromStr for VoteArg {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once('=') {
            Some((session, option)) if !session.is_empty() && !option.is_empty() => Ok(Self {
                session_id: session.into(),
                option_id: option.into(),
            }),
            _ => Err(format!("expected <session>=<option>, got '{s}'")),
        }
    }
}

/// CLI arguments for plenum
#[derive(Parser, Debug)]
#[command(name = "plenum")]
#[command(author, version, about = "Live voting sync and outcome resolution for meetings")]
#[command(long_about = r#"
Plenum keeps a live, privacy-respecting view of a meeting's voting sessions
and resolves closed sessions into proposal outcomes.

Actions run in this order: --vote, --close, --resolve. The view is printed
after them, or streamed on every change with --watch.

Configuration files are loaded from (in priority order):
1. PLENUM_* environment variables
2. --config <path>     Explicit config file
3. ./plenum.toml       Project-level config
4. ~/.config/plenum/config.toml   Global config

Example:
  plenum --fixture agm.json --meeting AGM --viewer u-42
  plenum --fixture agm.json --meeting AGM --vote s1=o2
  plenum --fixture agm.json --meeting AGM --close s1 --resolve s1 -o json
"#)]
pub struct Cli {
    /// Meeting code to follow
    #[arg(short, long, value_name = "CODE")]
    pub meeting: Option<String>,

    /// Viewer uid the view is computed for
    #[arg(long, value_name = "UID")]
    pub viewer: Option<String>,

    /// Viewer display name
    #[arg(long, value_name = "NAME")]
    pub name: Option<String>,

    /// JSON fixture seeding the in-memory store
    #[arg(short, long, value_name = "PATH")]
    pub fixture: Option<PathBuf>,

    /// Cast a vote (can be specified multiple times)
    #[arg(long, value_name = "SESSION=OPTION")]
    pub vote: Vec<VoteArg>,

    /// Close a voting session (can be specified multiple times)
    #[arg(long, value_name = "SESSION")]
    pub close: Vec<String>,

    /// Resolve the outcome of a closed session and close its proposals
    #[arg(long, value_name = "SESSION")]
    pub resolve: Vec<String>,

    /// Keep running and print the view on every change
    #[arg(short, long)]
    pub watch: bool,

    /// Output format
    #[arg(short, long, value_enum, default_value = "text")]
    pub output: OutputFormat,

    /// Receipt store file (overrides config)
    #[arg(long, value_name = "PATH")]
    pub receipts: Option<PathBuf>,

    /// Append audit events to this JSONL file (overrides config)
    #[arg(long, value_name = "PATH")]
    pub audit_log: Option<PathBuf>,

    /// Also write diagnostic logs to this file
    #[arg(long, value_name = "PATH")]
    pub log_file: Option<PathBuf>,

    /// Verbosity level (-v = info, -vv = debug, -vvv = trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Path to configuration file
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Disable loading of configuration files
    #[arg(long)]
    pub no_config: bool,

    /// Show configuration file locations and exit
    #[arg(long)]
    pub show_config: bool,
}
