//! One-shot notice delivery.
//!
//! The [`Notifier`] consumes "room joined" events coming from the Matrix sync
//! loop, filters them with a [`RoomFilter`] and sends the notification to the
//! first room that qualifies. Once the notice has been sent, [`Notifier::run`]
//! returns and the caller stops the sync loop.
//!
//! # Flow
//!
//! ```text
//! sync handlers ──room id──▶ channel ──▶ Notifier::run ──▶ NoticeSender::send_notice
//!                                             │
//!                                             └── returns after the first send
//! ```

use anyhow::{Result, anyhow};
use log::{debug, info};
use mockall::automock;
use tokio::sync::mpsc::UnboundedReceiver;

/// Sends a notice message to a room.
///
/// This trait abstracts the Matrix client so the notifier can be tested with mocks.
#[automock]
pub trait NoticeSender {
    /// Sends `body` as a markdown notice to the room identified by `room_id`.
    async fn send_notice(&self, room_id: &str, body: &str) -> Result<()>;
}

/// Decides which joined rooms should receive the notification.
///
/// Without a target every room qualifies. With a target, only the room whose
/// id is equal to it does. Room ids are compared as plain strings.
#[derive(Debug, Clone)]
pub struct RoomFilter {
    /// Room id given with `--room`
    target: Option<String>,
}

impl RoomFilter {
    /// Create a new [`RoomFilter`].
    ///
    /// # Arguments
    ///
    /// * `target` - The room id to notify, or `None` to notify the first joined room.
    pub fn new(target: Option<String>) -> Self {
        RoomFilter { target }
    }

    /// Returns `true` if the room identified by `room_id` should be notified.
    ///
    /// # Examples
    ///
    /// ```ignore
    /// let filter = RoomFilter::new(Some("!ci:matrix.org".to_owned()));
    /// assert!(filter.matches("!ci:matrix.org"));
    /// assert!(!filter.matches("!random:matrix.org"));
    /// ```
    pub fn matches(&self, room_id: &str) -> bool {
        self.target
            .as_deref()
            .is_none_or(|target| target == room_id)
    }

    /// Returns the target room id if one was given.
    pub fn target(&self) -> Option<&str> {
        self.target.as_deref()
    }
}

/// Sends a single notice to the first qualifying joined room.
pub struct Notifier<'a, S: NoticeSender> {
    /// Client used to deliver the notice
    sender: &'a S,
    /// Markdown body, sent verbatim
    message: String,
    /// Filter applied to every join event
    filter: RoomFilter,
}

impl<'a, S: NoticeSender> Notifier<'a, S> {
    /// Create a new [`Notifier`].
    ///
    /// # Arguments
    ///
    /// * `sender` - The client delivering the notice.
    /// * `message` - The message body, interpreted as markdown.
    /// * `filter` - The filter deciding which room receives the notice.
    pub fn new(sender: &'a S, message: String, filter: RoomFilter) -> Self {
        Notifier {
            sender,
            message,
            filter,
        }
    }

    /// Handles a single "room joined" event.
    ///
    /// Returns `Ok(true)` when the notice was sent to `room_id`, `Ok(false)` when
    /// the room was skipped by the filter.
    ///
    /// # Errors
    ///
    /// Returns the error of the underlying [`NoticeSender`] if the send fails.
    pub async fn on_room_joined(&self, room_id: &str) -> Result<bool> {
        if !self.filter.matches(room_id) {
            debug!("skipping room {}", room_id);
            return Ok(false);
        }

        info!("sending notice to room {}", room_id);
        self.sender.send_notice(room_id, &self.message).await?;
        info!("notice sent to room {}", room_id);

        Ok(true)
    }

    /// Consumes join events until the notice has been sent.
    ///
    /// Events are handled in the order they were received. The method returns
    /// right after the first successful send, so pending events are never
    /// handled and no second notice can be sent.
    ///
    /// # Returns
    ///
    /// The id of the room that received the notice.
    ///
    /// # Errors
    ///
    /// Returns an error if the send fails, or if every sender of the event
    /// channel is gone before any joined room matched the filter. The Matrix
    /// sync handlers keep a sender for the whole client lifetime, so with a
    /// live client this only ends through a send or the caller giving up.
    pub async fn run(&self, mut joins: UnboundedReceiver<String>) -> Result<String> {
        while let Some(room_id) = joins.recv().await {
            if self.on_room_joined(&room_id).await? {
                return Ok(room_id);
            }
        }

        Err(match self.filter.target() {
            Some(target) => anyhow!("room {} was never joined", target),
            None => anyhow!("no joined room to notify"),
        })
    }
}
