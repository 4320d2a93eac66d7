//! CLI argument definitions

use clap::{Args, Parser, Subcommand};
use crosspost_domain::Platform;
use std::path::PathBuf;
use uuid::Uuid;

/// crosspost: publish one post to Facebook pages and Telegram channels
#[derive(Parser, Debug)]
#[command(name = "crosspost")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Publish a post to one platform
    Publish(PublishArgs),

    /// Manage connected social accounts
    Accounts(AccountsArgs),

    /// Inspect published posts
    Posts(PostsArgs),

    /// Fetch engagement metrics for a published Facebook post
    Analytics(AnalyticsArgs),

    /// Configuration management
    Config(ConfigArgs),

    /// Validate configuration and show status
    Doctor(DoctorArgs),
}

#[derive(Args, Debug)]
pub struct PublishArgs {
    /// Target platform (facebook, telegram)
    #[arg(long)]
    pub platform: Platform,

    /// Post text
    #[arg(long, short, default_value = "")]
    pub message: String,

    /// Media URL; repeat for several items, order is kept
    #[arg(long = "media")]
    pub media: Vec<String>,

    /// User to publish as (defaults to general.user_id)
    #[arg(long)]
    pub user: Option<Uuid>,

    /// Show the call plan without contacting the platform
    #[arg(long)]
    pub dry_run: bool,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct AccountsArgs {
    #[command(subcommand)]
    pub command: AccountsCommands,
}

#[derive(Subcommand, Debug)]
pub enum AccountsCommands {
    /// Connect (or replace) the account for a platform
    Add {
        #[arg(long)]
        platform: Platform,

        /// Page id (Facebook) or chat id / @channel (Telegram)
        #[arg(long)]
        account_id: String,

        /// Environment variable holding the page access token
        #[arg(long)]
        token_env: Option<String>,

        /// Display name to store; looked up with --verify otherwise
        #[arg(long)]
        name: Option<String>,

        #[arg(long)]
        user: Option<Uuid>,

        /// Check the account against the platform before saving
        #[arg(long)]
        verify: bool,
    },

    /// List connected accounts
    List {
        #[arg(long)]
        user: Option<Uuid>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Args, Debug)]
pub struct PostsArgs {
    #[command(subcommand)]
    pub command: PostsCommands,
}

#[derive(Subcommand, Debug)]
pub enum PostsCommands {
    /// List published posts, newest first
    List {
        #[arg(long)]
        platform: Option<Platform>,

        #[arg(long)]
        user: Option<Uuid>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show one post
    Show {
        id: Uuid,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Args, Debug)]
pub struct AnalyticsArgs {
    /// Local post id (see `posts list`)
    pub post_id: Uuid,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommands,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Generate example configuration file
    Init {
        /// Path to write config file
        #[arg(long, default_value = "./config.toml")]
        path: PathBuf,

        /// Overwrite existing file
        #[arg(long)]
        force: bool,
    },
}

#[derive(Args, Debug)]
pub struct DoctorArgs {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}
