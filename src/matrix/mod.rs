//! Matrix protocol integration for the notifier.
//!
//! This module provides the Matrix side of the tool:
//! - Session resolution from an access token
//! - Startup synchronization reporting joined rooms
//! - Notice sending
//!
//! # Architecture
//!
//! The module is structured around the [`client::MatrixClient`] which coordinates:
//! - **Requester**: token owner lookup on the homeserver via the requester submodule
//! - **Session**: SDK session built from the token via the session submodule
//! - **Sync**: room join reporting and invitation handling via the sync submodule
//!
//! # Examples
//!
//! ```ignore
//! let credentials = Credentials {
//!     homeserver_url: "https://matrix.org".to_string(),
//!     username: "ci-bot".to_string(),
//!     access_token: "syt_token".to_string(),
//! };
//!
//! let client = MatrixClient::new(&credentials).await?;
//! client.send_notice("!room:matrix.org", "Build **passed**").await?;
//! ```

mod client;
mod requester;
mod session;
mod sync;
#[cfg(test)]
pub mod testing;

use std::fmt;

pub use crate::matrix::client::MatrixClient;

/// Credentials of the bot account.
#[derive(Clone)]
pub struct Credentials {
    /// Homeserver url, without trailing slash
    pub homeserver_url: String,
    /// Username or full user id of the bot
    pub username: String,
    /// Access token of the bot
    pub access_token: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("homeserver_url", &self.homeserver_url)
            .field("username", &self.username)
            .field("access_token", &"<redacted>")
            .finish()
    }
}
