//! Matrix session resolution from an access token.
//!
//! The bot never logs in: it is given an access token. This module asks the
//! homeserver who owns the token and builds the SDK session from the answer.
//! Nothing is persisted, the session lives as long as the process.

use anyhow::Result;
use log::{debug, warn};
use matrix_sdk::{
    SessionMeta, SessionTokens,
    authentication::matrix::MatrixSession,
    ruma::{DeviceId, OwnedDeviceId, UserId},
};

use crate::matrix::{Credentials, requester::Requester};

/// Builds the Matrix session matching the given access token.
///
/// The user id comes from the homeserver, so a `username` that does not match
/// the token owner is only reported as a warning. Appservice tokens have no
/// device; a random device id is generated for them.
///
/// # Arguments
///
/// * `credentials` - The username and access token given on the command line
/// * `requester` - The requester used to call the `whoami` endpoint
///
/// # Errors
///
/// Returns an error if the `whoami` request fails or returns an invalid user id.
pub async fn resolve_session<R: Requester>(
    credentials: &Credentials,
    requester: &R,
) -> Result<MatrixSession> {
    let whoami = requester.whoami().await?;
    let user_id = UserId::parse(&whoami.user_id)?;
    debug!("access token belongs to {}", user_id);

    if !is_same_user(&credentials.username, &user_id) {
        warn!(
            "access token belongs to {} and not to {}, using {}",
            user_id, credentials.username, user_id
        );
    }

    let device_id: OwnedDeviceId = match whoami.device_id {
        Some(device_id) => device_id.into(),
        None => {
            warn!("no device attached to the access token, generating one");
            DeviceId::new()
        }
    };

    Ok(MatrixSession {
        meta: SessionMeta { user_id, device_id },
        tokens: SessionTokens {
            access_token: credentials.access_token.clone(),
            refresh_token: None,
        },
    })
}

/// Checks whether `username` designates `user_id`.
///
/// A username starting with `@` is compared with the full user id, anything
/// else with its localpart.
fn is_same_user(username: &str, user_id: &UserId) -> bool {
    if username.starts_with('@') {
        username == user_id.as_str()
    } else {
        username == user_id.localpart()
    }
}
