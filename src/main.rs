//! matrix-notify - Post a single CI notification to a Matrix room.
//!
//! This is the main entry point of the notifier. It authenticates to a Matrix
//! homeserver with an access token, waits for the room-join notification, posts
//! one markdown notice and exits.
//!
//! # Overview
//!
//! The tool is meant to be called from CI jobs to announce build results in a
//! Matrix room. The bot account has to be a member of the room already, or be
//! invited to it.
//!
//! # Usage
//!
//! ```bash
//! matrix-notify \
//!     --message "Nightly build **passed**" \
//!     --server https://matrix.org \
//!     --user ci-bot \
//!     --token "$MATRIX_TOKEN" \
//!     --room '!xxxx:matrix.org'
//! ```
//!
//! Without `--room`, the notice goes to the first room reported by the sync.
//!
//! # Architecture
//!
//! - [`bot`] - Runs the sync loop and the notifier side by side
//! - [`config`] - Normalized command line configuration
//! - [`matrix`] - Matrix client integration: token session, sync, notice sending
//! - [`notifier`] - Room filtering and one-shot notice delivery
//!
//! # Exit status
//!
//! - `0` - The notice was posted
//! - `1` - Authentication, sync, send failure or timeout
//! - `2` - Invalid command line
//!
//! # Environment Variables
//!
//! - `RUST_LOG` - Controls logging level (default: `info`)

use std::process::ExitCode;

use clap::Parser;
use env_logger::Env;
use log::{error, info};

use crate::{bot::Bot, config::Config};

mod bot;
mod config;
mod matrix;
mod notifier;

/// Command-line arguments of the notifier.
///
/// # Examples
///
/// ```bash
/// matrix-notify -m "Build passed" -s https://matrix.org -u ci-bot -t syt_token -r '!xxxx:matrix.org'
/// ```
#[derive(Parser, Debug)]
#[command(version, about = "Post a message to a Matrix room", long_about = None)]
struct Args {
    /// The message to post, formatted as markdown
    #[arg(short, long)]
    message: String,

    /// URL of the homeserver
    #[arg(short, long)]
    server: String,

    /// Username of the bot
    #[arg(short, long)]
    user: String,

    /// Access token of the bot
    #[arg(short, long)]
    token: String,

    /// ID of the room, like `!xxxx:matrix.org`
    #[arg(short, long)]
    room: Option<String>,

    /// Give up when no notice was posted after this many seconds
    #[arg(long, value_name = "SECONDS")]
    timeout: Option<u64>,
}

/// Main entry point of the notifier.
///
/// 1. **Logging Setup**: `info` level by default, overridden with `RUST_LOG`
/// 2. **Argument Parsing**: missing flags exit with a usage error before any network call
/// 3. **Bot Initialization**: resolves the access token and restores the Matrix session
/// 4. **Bot Execution**: syncs until the notice is posted
#[tokio::main]
async fn main() -> ExitCode {
    // Put logger at info level by default
    let env = Env::default().filter_or("RUST_LOG", "info");
    env_logger::init_from_env(env);

    // Parse command line arguments
    let args = Args::parse();

    info!("starting matrix-notify {}...", env!("CARGO_PKG_VERSION"));

    let bot = match Bot::new(Config::from(args)).await {
        Ok(b) => b,
        Err(e) => {
            error!("failed to initialize matrix client: {:#}", e);
            return ExitCode::FAILURE;
        }
    };

    match bot.run().await {
        Ok(room_id) => {
            info!("notice posted to {}", room_id);
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("failed to post notice: {:#}", e);
            ExitCode::FAILURE
        }
    }
}
