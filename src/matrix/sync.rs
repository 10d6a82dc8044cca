//! Matrix client synchronization and room join reporting.
//!
//! This module provides the [`MatrixSync`] struct reporting the rooms joined by
//! the account to the notifier.
//!
//! # Overview
//!
//! The [`MatrixSync::sync`] method:
//! 1. Performs an initial sync to learn the rooms the account is in
//! 2. Reports every joined room and accepts the pending invitations that pass the room filter
//! 3. Sets up event handlers for later invitations and joins
//! 4. Enters a continuous sync loop, running until an error occurs or the future is dropped

use anyhow::Result;

use log::{debug, error, info, warn};
use matrix_sdk::{
    Client, Room,
    config::SyncSettings,
    ruma::{
        RoomId, UserId,
        api::client::filter::FilterDefinition,
        events::room::member::{
            MembershipChange, OriginalSyncRoomMemberEvent, StrippedRoomMemberEvent,
        },
    },
};
use tokio::{
    sync::mpsc::UnboundedSender,
    time::{Duration, sleep},
};

use crate::notifier::RoomFilter;

/// Longest delay between two join attempts, in seconds.
const MAX_JOIN_DELAY: u64 = 3600;

/// Reports the rooms joined by the account.
///
/// This struct wraps a Matrix [`Client`] and handles the synchronization
/// lifecycle:
/// - Initial sync reporting the rooms already joined
/// - Invitation acceptance for the rooms passing the [`RoomFilter`]
/// - Continuous sync loop reporting later joins
pub struct MatrixSync {
    /// The matrix client
    client: Client,
}

impl MatrixSync {
    /// Creates a new MatrixSync instance.
    ///
    /// This does not start the synchronization process; call [`MatrixSync::sync`]
    /// to begin syncing.
    pub fn new(client: &Client) -> Self {
        MatrixSync {
            client: client.to_owned(),
        }
    }

    /// Starts the synchronization process and reports joined rooms.
    ///
    /// This method performs the following sequence:
    /// 1. Performs an initial sync with lazy-loaded members
    /// 2. Sends the id of every joined room on `joins`
    /// 3. Accepts pending invitations to rooms matching `filter`
    /// 4. Registers handlers for new invitations and for the account joining rooms
    /// 5. Enters a continuous sync loop
    ///
    /// The loop never ends on its own: the caller stops it by dropping the
    /// returned future once it is done with `joins`.
    ///
    /// # Arguments
    ///
    /// * `filter` - Filter deciding which invitations are accepted
    /// * `joins` - Channel receiving the ids of the joined rooms
    ///
    /// # Errors
    ///
    /// Returns an error if the initial sync or the sync loop fails. `Ok(())` is
    /// only returned if the SDK sync loop ends without error.
    pub async fn sync(&self, filter: &RoomFilter, joins: UnboundedSender<String>) -> Result<()> {
        info!("start syncing");

        // Enable room members lazy-loading
        // See <https://spec.matrix.org/v1.6/client-server-api/#lazy-loading-room-members>.
        let filter_definition = FilterDefinition::with_lazy_loading();
        let sync_settings = SyncSettings::default().filter(filter_definition.into());

        // First sync to get the rooms the account is already in
        let response = self.client.sync_once(sync_settings.clone()).await?;

        let joined_rooms = self.client.joined_rooms();
        info!("account is in {} rooms", joined_rooms.len());
        for room in joined_rooms {
            report_join(&joins, room.room_id());
        }

        for room in self.client.invited_rooms() {
            if filter.matches(room.room_id().as_str()) {
                join_room(room, joins.clone());
            } else {
                debug!("ignoring pending invite to {}", room.room_id());
            }
        }

        // Registered after the first sync, so only new events are handled
        self.client.add_event_handler({
            let filter = filter.clone();
            let joins = joins.clone();
            move |room_member: StrippedRoomMemberEvent, client: Client, room: Room| {
                let filter = filter.clone();
                let joins = joins.clone();
                async move { on_invite(room_member, client, room, &filter, &joins) }
            }
        });

        self.client.add_event_handler({
            let joins = joins.clone();
            move |event: OriginalSyncRoomMemberEvent, client: Client, room: Room| {
                let joins = joins.clone();
                async move { on_member_event(event, client, room, &joins) }
            }
        });

        // Since we called `sync_once` before we entered our sync loop we must pass
        // that sync token to `sync`
        let sync_settings = sync_settings.token(response.next_batch);

        // Only returns on error, the caller stops it by dropping the future
        self.client.sync(sync_settings).await?;

        info!("sync stopped");
        Ok(())
    }
}

/// Sends the id of a joined room to the notifier.
fn report_join(joins: &UnboundedSender<String>, room_id: &RoomId) {
    debug!("joined room {}", room_id);

    if joins.send(room_id.to_string()).is_err() {
        debug!("join of room {} not reported, notifier is done", room_id);
    }
}

/// Joins an invited room in the background and reports it once joined.
///
/// # References
///
/// See <https://github.com/matrix-org/synapse/issues/4345> for the Synapse issue
/// that necessitates the retry logic.
fn join_room(room: Room, joins: UnboundedSender<String>) {
    tokio::spawn(async move {
        info!("joining room {}", room.room_id());
        let mut delay = 2;

        while let Err(err) = room.join().await {
            // retry join due to synapse sending invites, before the
            // invited user can join
            error!(
                "failed to join room {} ({err:?}), retrying in {delay}s",
                room.room_id()
            );

            sleep(Duration::from_secs(delay)).await;
            delay *= 2;

            if delay > MAX_JOIN_DELAY {
                error!("can't join room {} ({err:?})", room.room_id());
                return;
            }
        }

        info!("successfully joined room {}", room.room_id());
        report_join(&joins, room.room_id());
    });
}

/// Accepts invitations for the account to rooms passing the filter.
fn on_invite(
    room_member: StrippedRoomMemberEvent,
    client: Client,
    room: Room,
    filter: &RoomFilter,
    joins: &UnboundedSender<String>,
) {
    let Some(user_id) = client.user_id() else {
        warn!("could not get user id from client");
        return;
    };

    // Ignore if the invite is not for us
    if room_member.state_key != user_id {
        return;
    }

    if !filter.matches(room.room_id().as_str()) {
        debug!("ignoring invite to {}", room.room_id());
        return;
    }

    join_room(room, joins.clone());
}

/// Reports the rooms the account joins while syncing.
fn on_member_event(
    event: OriginalSyncRoomMemberEvent,
    client: Client,
    room: Room,
    joins: &UnboundedSender<String>,
) {
    let Some(user_id) = client.user_id() else {
        return;
    };

    if is_own_join(&event, user_id) {
        report_join(joins, room.room_id());
    }
}

/// Checks whether `event` is `user_id` entering the room.
///
/// Accepting an invitation counts as well as a plain join. An accepted knock
/// only turns into an invitation, the account is not in the room yet.
fn is_own_join(event: &OriginalSyncRoomMemberEvent, user_id: &UserId) -> bool {
    if event.state_key != user_id {
        return false;
    }

    matches!(
        event.membership_change(),
        MembershipChange::Joined | MembershipChange::InvitationAccepted
    )
}
