//! Clap derive structures for the `maxxctl` CLI.
//!
//! Kept free of workspace types so `build.rs` can include it for man pages.

use clap::{Args, Parser, Subcommand, ValueEnum};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// maxxctl -- admin console for the maxx LLM proxy
#[derive(Debug, Parser)]
#[command(
    name = "maxxctl",
    version,
    about = "Inspect and administer a maxx LLM proxy from the command line",
    long_about = "Admin console for the maxx LLM proxy.\n\n\
        Lists proxied requests and their upstream attempts, follows live\n\
        traffic over the push stream, and manages provider cooldowns and\n\
        server settings.",
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
    /// Config profile to use
    #[arg(long, short = 'p', env = "MAXX_PROFILE", global = true)]
    pub profile: Option<String>,

    /// Server URL (overrides profile)
    #[arg(long, short = 's', env = "MAXX_SERVER", global = true)]
    pub server: Option<String>,

    /// Admin token (overrides profile and keyring)
    #[arg(long, env = "MAXX_TOKEN", global = true, hide_env_values = true)]
    pub token: Option<String>,

    /// Output format
    #[arg(
        long,
        short = 'o',
        env = "MAXX_OUTPUT",
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

    /// Skip confirmation prompts
    #[arg(long, short = 'y', global = true)]
    pub yes: bool,

    /// Accept self-signed TLS certificates
    #[arg(long, short = 'k', env = "MAXX_INSECURE", global = true)]
    pub insecure: bool,

    /// Request timeout in seconds (overrides profile)
    #[arg(long, env = "MAXX_TIMEOUT", global = true)]
    pub timeout: Option<u64>,
}

// ── Output & Color Enums ─────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
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

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ColorMode {
    /// Auto-detect (color if terminal is interactive)
    Auto,
    /// Always emit color codes
    Always,
    /// Never emit color codes
    Never,
}

/// Request status filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum StatusArg {
    Pending,
    InProgress,
    Completed,
    Failed,
    Cancelled,
}

// ── Top-Level Command Enum ───────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Browse proxied requests
    #[command(alias = "req", alias = "r")]
    Requests(RequestsArgs),

    /// Follow live requests over the push stream
    #[command(alias = "w")]
    Watch(WatchArgs),

    /// Inspect and manage provider cooldowns
    #[command(alias = "cd")]
    Cooldowns(CooldownsArgs),

    /// Read and change server settings
    Settings(SettingsArgs),

    /// Show dashboard aggregates
    Dashboard(DashboardArgs),

    /// Manage CLI configuration and profiles
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

// ── Requests ─────────────────────────────────────────────────────────

/// Provider / status filter shared by request commands.
#[derive(Debug, Clone, Copy, Default, Args)]
pub struct FilterArgs {
    /// Only requests routed to this provider
    #[arg(long)]
    pub provider: Option<u64>,

    /// Only requests with this status
    #[arg(long, value_enum)]
    pub status: Option<StatusArg>,
}

#[derive(Debug, Args)]
pub struct RequestsArgs {
    #[command(subcommand)]
    pub command: RequestsCommand,
}

#[derive(Debug, Subcommand)]
pub enum RequestsCommand {
    /// List requests, newest first
    #[command(alias = "ls")]
    List(RequestListArgs),

    /// Show one request
    Get {
        /// Request ID
        id: u64,
    },

    /// List upstream attempts of a request
    Attempts {
        /// Request ID
        id: u64,
    },

    /// Count requests matching a filter
    Count(FilterArgs),
}

#[derive(Debug, Args)]
pub struct RequestListArgs {
    #[command(flatten)]
    pub filter: FilterArgs,

    /// Page size
    #[arg(long, short = 'l', default_value = "20")]
    pub limit: u32,

    /// Only requests older than this ID (cursor)
    #[arg(long, conflicts_with = "pages")]
    pub before: Option<u64>,

    /// Load this many pages, following the cursor
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
    pub pages: Option<u32>,
}

// ── Watch ────────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct WatchArgs {
    #[command(flatten)]
    pub filter: FilterArgs,

    /// Number of most recent requests shown
    #[arg(long, short = 'l', default_value = "20")]
    pub limit: u32,

    /// Stop after this long (e.g. "30s", "5m"); runs until Ctrl-C otherwise
    #[arg(long = "for", value_name = "DURATION")]
    pub duration: Option<String>,
}

// ── Cooldowns ────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct CooldownsArgs {
    #[command(subcommand)]
    pub command: CooldownsCommand,
}

#[derive(Debug, Subcommand)]
pub enum CooldownsCommand {
    /// List active cooldowns
    #[command(alias = "ls")]
    List {
        /// Only cooldowns that apply to this client type
        #[arg(long)]
        client_type: Option<String>,

        /// Include entries that have already lapsed
        #[arg(long)]
        all: bool,
    },

    /// Show whether a provider is cooling down
    Get {
        /// Provider ID
        provider: u64,

        /// Client type to check (wildcard cooldowns always apply)
        #[arg(long)]
        client_type: Option<String>,
    },

    /// Lift a provider's cooldown
    Clear {
        /// Provider ID
        provider: u64,
    },

    /// Put a provider into cooldown
    Set {
        /// Provider ID
        provider: u64,

        /// Cooldown length (e.g. "90s", "15m", "2h")
        #[arg(long = "for", value_name = "DURATION", required_unless_present = "until")]
        duration: Option<String>,

        /// Absolute end time (RFC 3339)
        #[arg(long, conflicts_with = "duration")]
        until: Option<String>,

        /// Restrict to one client type (default: all)
        #[arg(long)]
        client_type: Option<String>,
    },
}

// ── Settings ─────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct SettingsArgs {
    #[command(subcommand)]
    pub command: SettingsCommand,
}

#[derive(Debug, Subcommand)]
pub enum SettingsCommand {
    /// List all settings
    #[command(alias = "ls")]
    List,

    /// Show one setting
    Get { key: String },

    /// Change a setting
    Set { key: String, value: String },

    /// Delete a setting
    #[command(alias = "rm")]
    Delete { key: String },
}

// ── Dashboard ────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct DashboardArgs {
    /// Show per-provider statistics instead of the overview
    #[arg(long)]
    pub providers: bool,
}

// ── Config ───────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Create initial config file with guided setup
    Init,

    /// Display current configuration
    Show,

    /// Store the admin token for the active profile in the system keyring
    SetToken {
        /// Read the token from this environment variable instead of prompting
        #[arg(long)]
        from_env: Option<String>,
    },
}

// ── Completions ──────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}
