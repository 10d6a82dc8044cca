//! Matrix client wrapper for notice sending and synchronization.
//!
//! This module provides a high-level [`MatrixClient`] interface that wraps the
//! Matrix SDK client and handles session restoration, synchronization and
//! notice sending.

use anyhow::{Result, anyhow};
use log::{debug, info};
use matrix_sdk::{
    Client,
    ruma::{RoomId, events::room::message::RoomMessageEventContent},
};
use tokio::sync::mpsc::UnboundedSender;

use crate::{
    matrix::{
        Credentials, requester::HomeserverRequester, session::resolve_session, sync::MatrixSync,
    },
    notifier::{NoticeSender, RoomFilter},
};

/// High-level Matrix client for the notifier.
///
/// Manages a Matrix SDK client restored from an access token, with
/// synchronization capabilities and notice sending.
pub struct MatrixClient {
    /// Synchronization service reporting joined rooms
    matrix_sync: MatrixSync,
    /// Underlying Matrix SDK client
    client: Client,
}

impl MatrixClient {
    /// Creates a new Matrix client authenticated with an access token.
    ///
    /// This method performs the complete initialization workflow:
    /// 1. Asks the homeserver who owns the access token
    /// 2. Builds the Matrix SDK client with an in-memory store
    /// 3. Restores the session from the token information
    ///
    /// # Arguments
    ///
    /// * `credentials` - Homeserver url, username and access token
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The homeserver is unreachable or rejects the token
    /// - The homeserver url is invalid
    /// - Session restoration fails
    pub async fn new(credentials: &Credentials) -> Result<Self> {
        info!(
            "connecting to {} as {}",
            credentials.homeserver_url, credentials.username
        );

        let requester =
            HomeserverRequester::new(&credentials.homeserver_url, &credentials.access_token);
        let session = resolve_session(credentials, &requester).await?;

        let client = Client::builder()
            .homeserver_url(&credentials.homeserver_url)
            .build()
            .await?;
        debug!("matrix client created");

        client.restore_session(session).await?;
        info!("matrix session restored");

        let matrix_sync = MatrixSync::new(&client);

        Ok(MatrixClient {
            matrix_sync,
            client,
        })
    }

    /// Starts the Matrix synchronization loop.
    ///
    /// Every room joined by the account is reported on `joins`, first the rooms
    /// already joined at startup, then the rooms joined while syncing. See
    /// [`MatrixSync::sync`].
    ///
    /// # Arguments
    ///
    /// * `filter` - Filter deciding which invitations are accepted
    /// * `joins` - Channel receiving the ids of the joined rooms
    ///
    /// # Returns
    ///
    /// Runs until the sync fails or the returned future is dropped.
    pub async fn sync(&self, filter: &RoomFilter, joins: UnboundedSender<String>) -> Result<()> {
        self.matrix_sync.sync(filter, joins).await
    }
}

impl NoticeSender for MatrixClient {
    /// Sends `body` as a markdown notice.
    ///
    /// The room has to be known by the client, i.e. reported by a previous sync.
    async fn send_notice(&self, room_id: &str, body: &str) -> Result<()> {
        let room_id = RoomId::parse(room_id)?;
        let room = self
            .client
            .get_room(&room_id)
            .ok_or_else(|| anyhow!("room {} is unknown to the client", room_id))?;

        debug!("sending notice to {}", room.room_id());
        room.send(build_notice(body)).await?;

        Ok(())
    }
}

/// Builds an `m.notice` message from a markdown body.
///
/// The plain body is kept verbatim, an html body is added when the markdown
/// contains formatting.
pub fn build_notice(body: &str) -> RoomMessageEventContent {
    RoomMessageEventContent::notice_markdown(body)
}
