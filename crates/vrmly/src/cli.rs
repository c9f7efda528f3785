//! Clap derive structures for the `vrmly` CLI.
//!
//! Defines the command tree, global flags, and shared types.

use clap::{Args, Parser, Subcommand, ValueEnum};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// vrmly -- poll a Victron VRM installation from the command line
#[derive(Debug, Parser)]
#[command(
    name = "vrmly",
    version,
    about = "Poll Victron VRM solar installations from the command line",
    long_about = "Fetches the latest solar charger readings from the Victron VRM cloud API,\n\
        derives current and power sensors, and prints them once or on a fixed interval.",
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Command,
}

// ── Global Options ───────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Installation profile to use
    #[arg(long, short = 'p', env = "VRMLY_PROFILE", global = true)]
    pub profile: Option<String>,

    /// VRM access token (overrides profile)
    #[arg(long, env = "VRMLY_API_TOKEN", global = true, hide_env = true)]
    pub token: Option<String>,

    /// Installation id, a.k.a. idSite (overrides profile)
    #[arg(long, short = 'i', env = "VRMLY_INSTALLATION", global = true)]
    pub installation: Option<u64>,

    /// Device instance of the solar charger (overrides profile)
    #[arg(long, global = true)]
    pub instance: Option<u32>,

    /// VRM API root (overrides profile)
    #[arg(long, env = "VRMLY_BASE_URL", global = true, hide = true)]
    pub base_url: Option<String>,

    /// Output format
    #[arg(
        long,
        short = 'o',
        env = "VRMLY_OUTPUT",
        default_value = "table",
        global = true
    )]
    pub output: OutputFormat,

    /// When to use color output
    #[arg(long, default_value = "auto", global = true)]
    pub color: ColorMode,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Request timeout in seconds (overrides profile)
    #[arg(long, env = "VRMLY_TIMEOUT", global = true)]
    pub timeout: Option<u64>,
}

// ── Output & Color Enums ─────────────────────────────────────────────

#[derive(Debug, Clone, ValueEnum)]
pub enum OutputFormat {
    /// Pretty table (default, interactive)
    Table,
    /// Pretty-printed JSON
    Json,
    /// Compact single-line JSON
    JsonCompact,
    /// YAML
    Yaml,
    /// Plain text, one value per line (scripting)
    Plain,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum ColorMode {
    /// Auto-detect (color if terminal is interactive)
    Auto,
    /// Always emit color codes
    Always,
    /// Never emit color codes
    Never,
}

// ── Top-Level Command Enum ───────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// List the sensors vrmly can publish
    Sensors,

    /// List installations visible to the access token
    #[command(alias = "sites")]
    Installations,

    /// Poll once and print every enabled sensor
    #[command(alias = "get")]
    Snapshot(SnapshotArgs),

    /// Poll on a fixed interval and print each update
    Watch(WatchArgs),

    /// Manage configuration profiles
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

// ── Polling ──────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct SnapshotArgs {
    /// Sensor keys to include (repeatable; default: profile selection)
    #[arg(long = "sensor", short = 's')]
    pub sensors: Vec<String>,
}

#[derive(Debug, Args)]
pub struct WatchArgs {
    /// Sensor keys to include (repeatable; default: profile selection)
    #[arg(long = "sensor", short = 's')]
    pub sensors: Vec<String>,

    /// Poll interval in seconds (30..=3600; overrides profile)
    #[arg(long)]
    pub interval: Option<u64>,

    /// Consecutive failed polls before values turn unavailable
    #[arg(long)]
    pub failure_threshold: Option<u32>,

    /// Exit after this many published snapshots
    #[arg(long)]
    pub count: Option<u64>,
}

// ── Config ───────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Create a profile with guided setup
    Init,

    /// Display current configuration (tokens redacted)
    Show,

    /// Set a value on the active profile
    Set {
        /// Profile key, e.g. "scan_interval" or "sensors"
        key: String,

        /// Value to set (comma-separated for "sensors")
        value: String,
    },

    /// List configured profiles
    Profiles,

    /// Set the default profile
    Use {
        /// Profile name to set as default
        name: String,
    },

    /// Store an access token in the system keyring
    SetToken {
        /// Profile name
        #[arg(long)]
        profile: Option<String>,
    },

    /// Print the config file path
    Path,
}

// ── Completions ──────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}
