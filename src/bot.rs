//! Notification bot orchestration.
//!
//! The [`Bot`] ties the Matrix client and the [`Notifier`] together: the sync
//! loop reports joined rooms through a channel, the notifier sends the notice
//! to the first qualifying one, and the bot stops the sync loop once done.
//!
//! # Examples
//!
//! ```ignore
//! let bot = Bot::new(config).await?;
//! let room_id = bot.run().await?;
//! println!("notice posted to {room_id}");
//! ```

use std::time::Duration;

use anyhow::{Result, anyhow};
use log::{debug, info};
use tokio::{sync::mpsc::unbounded_channel, time};

use crate::{
    config::Config,
    matrix::MatrixClient,
    notifier::{Notifier, RoomFilter},
};

/// One-shot notification bot.
pub struct Bot {
    /// Matrix client for syncing and sending the notice
    matrix_client: MatrixClient,
    /// Markdown message to post
    message: String,
    /// Filter selecting the room to post to
    filter: RoomFilter,
    /// Give up when no notice was sent after this long
    timeout: Option<Duration>,
}

impl Bot {
    /// Creates a new Bot instance from the configuration.
    ///
    /// This constructor authenticates the Matrix client with the access token.
    ///
    /// # Errors
    ///
    /// Returns an error if the Matrix client cannot be created (token rejected,
    /// homeserver unreachable, invalid homeserver url).
    pub async fn new(config: Config) -> Result<Self> {
        let matrix_client = MatrixClient::new(&config.matrix).await?;

        Ok(Bot {
            matrix_client,
            message: config.message,
            filter: RoomFilter::new(config.room),
            timeout: config.timeout,
        })
    }

    /// Runs the bot until the notice has been sent.
    ///
    /// The sync loop and the notifier run concurrently. As soon as the notifier
    /// is done, the sync loop is dropped, so later join events are never handled.
    ///
    /// # Returns
    ///
    /// The id of the room that received the notice.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The notice could not be sent
    /// - The sync loop failed or ended before the notice was sent
    /// - The timeout elapsed before the notice was sent
    pub async fn run(self) -> Result<String> {
        let (joins_tx, joins_rx) = unbounded_channel();
        let notifier = Notifier::new(
            &self.matrix_client,
            self.message.clone(),
            self.filter.clone(),
        );

        if let Some(target) = self.filter.target() {
            info!("waiting for room {}", target);
        } else {
            info!("waiting for the first joined room");
        }

        let notify = async {
            tokio::select! {
                biased;
                room_id = notifier.run(joins_rx) => room_id,
                sync = self.matrix_client.sync(&self.filter, joins_tx) => match sync {
                    Ok(()) => Err(anyhow!("matrix sync ended before the notice was sent")),
                    Err(e) => Err(e.context("matrix sync failed")),
                },
            }
        };

        let Some(timeout) = self.timeout else {
            return notify.await;
        };

        debug!("giving up after {}s", timeout.as_secs());
        time::timeout(timeout, notify)
            .await
            .map_err(|_| anyhow!("no notice sent after {}s", timeout.as_secs()))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matrix::testing::{credentials, homeserver, joined_rooms_sync};
    use mockito::Matcher;
    use serde_json::json;

    const SEND_PATH: &str = r"^/_matrix/client/(r0|v3)/rooms/.+/send/m\.room\.message/.+";

    fn config(url: &str, room: Option<&str>, timeout: Option<u64>) -> Config {
        Config {
            matrix: credentials(url),
            message: "Build **passed**".to_owned(),
            room: room.map(str::to_owned),
            timeout: timeout.map(Duration::from_secs),
        }
    }

    #[tokio::test]
    async fn test_run_sends_notice_to_joined_room() {
        let mut server = homeserver(200, &joined_rooms_sync(&["!ci:example.com"])).await;
        let send = server
            .mock("PUT", Matcher::Regex(SEND_PATH.to_owned()))
            .match_body(Matcher::PartialJson(json!({
                "msgtype": "m.notice",
                "body": "Build **passed**",
            })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"event_id": "$notice:example.com"}"#)
            .expect(1)
            .create_async()
            .await;

        let bot = Bot::new(config(&server.url(), Some("!ci:example.com"), Some(10)))
            .await
            .unwrap();
        let room_id = bot.run().await.unwrap();

        assert_eq!(room_id, "!ci:example.com");
        send.assert_async().await;
    }

    #[tokio::test]
    async fn test_run_times_out_without_matching_room() {
        let mut server = homeserver(200, &joined_rooms_sync(&["!other:example.com"])).await;
        let send = server
            .mock("PUT", Matcher::Regex(SEND_PATH.to_owned()))
            .expect(0)
            .create_async()
            .await;

        let bot = Bot::new(config(&server.url(), Some("!ci:example.com"), Some(1)))
            .await
            .unwrap();
        let error = bot.run().await.unwrap_err();

        assert!(error.to_string().contains("no notice sent after 1s"));
        send.assert_async().await;
    }

    #[tokio::test]
    async fn test_run_fails_when_sync_fails() {
        let server = homeserver(403, r#"{"errcode": "M_FORBIDDEN", "error": "Forbidden"}"#).await;

        let bot = Bot::new(config(&server.url(), None, Some(10))).await.unwrap();
        let error = bot.run().await.unwrap_err();

        assert!(error.to_string().contains("matrix sync failed"));
    }
}
