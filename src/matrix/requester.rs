//! HTTP client for the homeserver `whoami` endpoint.
//!
//! An access token alone is not enough to restore a Matrix session: the SDK
//! also needs the user id and device id the token belongs to. This module asks
//! the homeserver for them.

use anyhow::{Result, anyhow};
use log::{debug, info};
use mockall::automock;
use reqwest::Client;
use serde::Deserialize;

/// Answer of `GET /_matrix/client/v3/account/whoami`.
#[derive(Debug, Deserialize)]
pub struct WhoAmIResponse {
    /// Fully qualified user id owning the token
    pub user_id: String,
    /// Device the token was issued for, absent for appservice tokens
    #[serde(default)]
    pub device_id: Option<String>,
}

/// Standard Matrix error body.
#[derive(Debug, Deserialize)]
struct MatrixErrorResponse {
    errcode: String,
    #[serde(default)]
    error: Option<String>,
}

/// Trait for requesting token information from the homeserver.
///
/// This trait abstracts the HTTP operations for easier testing with mocks.
#[automock]
pub trait Requester {
    /// Fetches the owner of the access token.
    async fn whoami(&self) -> Result<WhoAmIResponse>;
}

/// HTTP client for requesting data from a Matrix homeserver.
///
/// # Examples
///
/// ```ignore
/// let requester = HomeserverRequester::new("https://matrix.org", "syt_token");
/// let whoami = requester.whoami().await?;
/// println!("token owner: {}", whoami.user_id);
/// ```
pub struct HomeserverRequester {
    /// Homeserver url, without trailing slash
    url: String,
    /// Access token sent as bearer
    access_token: String,
    /// HTTP client
    client: Client,
}

impl HomeserverRequester {
    /// Create a new [HomeserverRequester].
    ///
    /// # Arguments
    ///
    /// * `url` - The base URL of the homeserver.
    /// * `access_token` - The access token of the bot account.
    pub fn new(url: &str, access_token: &str) -> Self {
        HomeserverRequester {
            url: url.to_string(),
            access_token: access_token.to_string(),
            client: Client::new(),
        }
    }
}

impl Requester for HomeserverRequester {
    /// Request `/_matrix/client/v3/account/whoami`.
    ///
    /// This api call returns a json object:
    /// ```text
    /// { "user_id": "@bot:matrix.org", "device_id": "ABCDEFGH", "is_guest": false }
    /// ```
    /// A rejected token is answered with a Matrix error body such as
    /// `{ "errcode": "M_UNKNOWN_TOKEN", "error": "Invalid access token" }`, whose
    /// content ends up in the returned error.
    async fn whoami(&self) -> Result<WhoAmIResponse> {
        let url = format!("{}/_matrix/client/v3/account/whoami", &self.url);
        info!("request token owner");
        debug!("request {}", &url);

        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.access_token)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(match response.json::<MatrixErrorResponse>().await {
                Ok(body) => anyhow!(
                    "homeserver rejected the access token ({}): {} {}",
                    status,
                    body.errcode,
                    body.error.unwrap_or_default()
                ),
                Err(_) => anyhow!("whoami request failed with status {}", status),
            });
        }

        let whoami: WhoAmIResponse = response.json().await?;
        debug!("response from {} -> {:?}", &url, &whoami);

        Ok(whoami)
    }
}
