//! Fake homeserver for the tests.
//!
//! Serves the endpoints used by a token-authenticated client: `whoami`,
//! `versions`, `sync` and the room encryption state (always unencrypted).

use mockito::{Matcher, ServerGuard};
use serde_json::{Map, Value, json};

use crate::matrix::Credentials;

/// Bot account served by [`homeserver`].
pub const USER_ID: &str = "@bot:example.com";

/// Credentials of the bot account on the homeserver at `url`.
pub fn credentials(url: &str) -> Credentials {
    Credentials {
        homeserver_url: url.to_owned(),
        username: "bot".to_owned(),
        access_token: "syt_secret".to_owned(),
    }
}

/// Sync response body in which the account is in `room_ids`.
pub fn joined_rooms_sync(room_ids: &[&str]) -> String {
    let rooms: Map<String, Value> = room_ids
        .iter()
        .map(|room_id| (room_id.to_string(), json!({})))
        .collect();

    json!({ "next_batch": "batch_1", "rooms": { "join": rooms } }).to_string()
}

/// Starts a homeserver answering every sync with `sync_status` and `sync_body`.
pub async fn homeserver(sync_status: usize, sync_body: &str) -> ServerGuard {
    let mut server = mockito::Server::new_async().await;

    server
        .mock("GET", "/_matrix/client/v3/account/whoami")
        .match_header("authorization", "Bearer syt_secret")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(json!({ "user_id": USER_ID, "device_id": "DEVICEID" }).to_string())
        .create_async()
        .await;
    server
        .mock("GET", "/_matrix/client/versions")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"versions": ["v1.1", "v1.2", "v1.3", "v1.4", "v1.5", "v1.6"]}"#)
        .create_async()
        .await;
    server
        .mock("GET", Matcher::Regex(r"^/_matrix/client/(r0|v3)/sync".to_owned()))
        .with_status(sync_status)
        .with_header("content-type", "application/json")
        .with_body(sync_body)
        .create_async()
        .await;
    server
        .mock(
            "GET",
            Matcher::Regex(r"^/_matrix/client/(r0|v3)/rooms/.+/state/m\.room\.encryption".to_owned()),
        )
        .with_status(404)
        .with_header("content-type", "application/json")
        .with_body(r#"{"errcode": "M_NOT_FOUND", "error": "Event not found."}"#)
        .create_async()
        .await;

    server
}
