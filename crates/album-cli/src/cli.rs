//! CLI argument parsing using clap derive

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// Album Manager - Rule-driven album synchronization for a photo catalog
#[derive(Parser, Debug)]
#[command(name = "albums")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to the rules file
    #[arg(
        long,
        env = "ALBUMS_CONFIG",
        default_value = "config/rules.yaml",
        global = true
    )]
    pub config: PathBuf,

    /// The command to run
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Synchronize albums from the rules file
    ///
    /// Runs cycles until stopped, sleeping between them; use --once for a
    /// single cycle. Catalog credentials come from IMMICH_BASE_URL and
    /// IMMICH_API_KEY unless passed as flags.
    ///
    /// Examples:
    ///   albums sync --once             # One cycle, exit 1 on rule errors
    ///   albums sync --dry-run --once   # Report changes without applying
    ///   albums sync                    # Loop forever
    Sync {
        /// Compute and report changes without applying them
        #[arg(long)]
        dry_run: bool,

        /// Run a single cycle and exit
        #[arg(long)]
        once: bool,

        #[command(flatten)]
        catalog: CatalogArgs,

        #[command(flatten)]
        store: StoreArgs,

        #[command(flatten)]
        deployment: DeploymentArgs,
    },

    /// Validate the rules file without touching the catalog
    ///
    /// Loads, validates, and expands recurring rules, reporting every
    /// finding at once. Exits non-zero when the file is unusable.
    Validate {
        /// IANA zone for recurring rules that do not name one
        #[arg(long, env = "DEFAULT_TIMEZONE", default_value = "UTC")]
        default_timezone: String,
    },

    /// Show the most recent sync run
    History {
        /// Path to the membership database
        #[arg(long, env = "ALBUMS_DB", default_value = "data/albums.db")]
        db: PathBuf,
    },
}

/// Catalog connection settings
#[derive(Args, Debug)]
pub struct CatalogArgs {
    /// Base URL of the Immich server
    #[arg(long, env = "IMMICH_BASE_URL")]
    pub base_url: String,

    /// API key for the Immich server
    #[arg(long, env = "IMMICH_API_KEY", hide_env_values = true)]
    pub api_key: String,
}

/// Membership database location
#[derive(Args, Debug)]
pub struct StoreArgs {
    /// Path to the membership database
    #[arg(long, env = "ALBUMS_DB", default_value = "data/albums.db")]
    pub db: PathBuf,
}

/// Deployment defaults applied to rules that do not override them
#[derive(Args, Debug)]
pub struct DeploymentArgs {
    /// Share every album with all catalog users unless a rule says otherwise
    #[arg(long, env = "SHARE_WITH_ALL_USERS")]
    pub share_with_all_users: bool,

    /// Comma-separated user emails to share albums with by default
    #[arg(long, env = "SHARE_USER_IDS", value_delimiter = ',')]
    pub share_user_ids: Vec<String>,

    /// Enable fuzzy matching for rules without their own fuzzy_match flag
    #[arg(long, env = "ALLOW_FUZZY_MATCH")]
    pub allow_fuzzy_match: bool,

    /// IANA zone for recurring rules that do not name one
    #[arg(long, env = "DEFAULT_TIMEZONE", default_value = "UTC")]
    pub default_timezone: String,

    /// Seconds to sleep between cycles in loop mode
    #[arg(long, env = "SLEEP_INTERVAL_SECONDS", default_value_t = 300)]
    pub sleep_interval_seconds: u64,
}
