//! Runtime configuration of the notifier.
//!
//! Everything comes from the command line; there is no configuration file.
//! [`Config`] holds the arguments once normalized:
//!
//! - the homeserver url loses its trailing slashes
//! - an empty `--room` means no target room
//! - `--timeout` becomes a [`Duration`]

use std::time::Duration;

use crate::{Args, matrix::Credentials};

/// Root configuration of the notifier.
#[derive(Debug, Clone)]
pub struct Config {
    /// Matrix account credentials
    pub matrix: Credentials,
    /// Markdown message to post
    pub message: String,
    /// Room to post to, the first joined room when `None`
    pub room: Option<String>,
    /// Give up when no notice was sent after this long
    pub timeout: Option<Duration>,
}

impl From<Args> for Config {
    fn from(args: Args) -> Self {
        Config {
            matrix: Credentials {
                homeserver_url: args.server.trim_end_matches('/').to_owned(),
                username: args.user,
                access_token: args.token,
            },
            message: args.message,
            room: args.room.filter(|room| !room.is_empty()),
            timeout: args.timeout.map(Duration::from_secs),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(server: &str, room: Option<&str>, timeout: Option<u64>) -> Args {
        Args {
            message: "Build **passed**".to_owned(),
            server: server.to_owned(),
            user: "ci-bot".to_owned(),
            token: "syt_secret".to_owned(),
            room: room.map(str::to_owned),
            timeout,
        }
    }

    #[test]
    fn test_config_from_args() {
        let config = Config::from(args(
            "https://matrix.example.com",
            Some("!ci:example.com"),
            None,
        ));

        assert_eq!(config.matrix.homeserver_url, "https://matrix.example.com");
        assert_eq!(config.matrix.username, "ci-bot");
        assert_eq!(config.matrix.access_token, "syt_secret");
        assert_eq!(config.message, "Build **passed**");
        assert_eq!(config.room, Some("!ci:example.com".to_owned()));
        assert!(config.timeout.is_none());
    }

    #[test]
    fn test_config_trims_trailing_slashes() {
        let config = Config::from(args("https://matrix.example.com//", None, None));
        assert_eq!(config.matrix.homeserver_url, "https://matrix.example.com");
    }

    #[test]
    fn test_config_empty_room_means_no_target() {
        let config = Config::from(args("https://matrix.example.com", Some(""), None));
        assert!(config.room.is_none());
    }

    #[test]
    fn test_config_timeout() {
        let config = Config::from(args("https://matrix.example.com", None, Some(90)));
        assert_eq!(config.timeout, Some(Duration::from_secs(90)));
    }

    #[test]
    fn test_config_keeps_message_verbatim() {
        let mut raw = args("https://matrix.example.com", None, None);
        raw.message = "  line one\nline two  ".to_owned();

        let config = Config::from(raw);
        assert_eq!(config.message, "  line one\nline two  ");
    }
}
