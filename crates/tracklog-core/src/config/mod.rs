//! Spotify endpoint and credential configuration.
//!
//! Endpoints are safe to persist in profile files. Credentials are only ever
//! read from the environment and never serialized.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::util::{is_http_url, normalize_text_option};

pub const DEFAULT_API_BASE_URL: &str = "https://api.spotify.com/v1";
pub const DEFAULT_ACCOUNTS_URL: &str = "https://accounts.spotify.com/api/token";

pub const ENV_ACCESS_TOKEN: &str = "SPOTIFY_ACCESS_TOKEN";
pub const ENV_REFRESH_TOKEN: &str = "SPOTIFY_REFRESH_TOKEN";
pub const ENV_CLIENT_ID: &str = "SPOTIFY_CLIENT_ID";
pub const ENV_CLIENT_SECRET: &str = "SPOTIFY_CLIENT_SECRET";

/// Where the Web API and the token endpoint live.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpotifyEndpoints {
    pub api_base_url: String,
    pub accounts_url: String,
}

impl Default for SpotifyEndpoints {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            accounts_url: DEFAULT_ACCOUNTS_URL.to_string(),
        }
    }
}

impl SpotifyEndpoints {
    /// Build endpoints from optional overrides, falling back to the public defaults.
    pub fn resolve(api_base_url: Option<String>, accounts_url: Option<String>) -> Result<Self> {
        let api_base_url = normalize_text_option(api_base_url)
            .map_or_else(|| Ok(DEFAULT_API_BASE_URL.to_string()), normalize_base_url)?;
        let accounts_url = normalize_text_option(accounts_url)
            .map_or_else(|| Ok(DEFAULT_ACCOUNTS_URL.to_string()), normalize_base_url)?;
        Ok(Self {
            api_base_url,
            accounts_url,
        })
    }
}

/// Validate that a URL carries an http(s) scheme and strip trailing slashes.
pub fn normalize_base_url(raw: String) -> Result<String> {
    let url = normalize_text_option(Some(raw))
        .ok_or_else(|| Error::InvalidInput("URL must not be empty".to_string()))?;
    if !is_http_url(&url) {
        return Err(Error::InvalidInput(format!("URL must include http:// or https://: {url}")));
    }
    Ok(url.trim_end_matches('/').to_string())
}

/// How the adapter obtains a bearer token.
#[derive(Clone, PartialEq, Eq)]
pub enum SpotifyCredentials {
    /// A ready-to-use access token.
    AccessToken(String),
    /// Refresh-token grant against the accounts endpoint.
    RefreshToken {
        client_id: String,
        client_secret: String,
        refresh_token: String,
    },
}

impl SpotifyCredentials {
    /// Resolve credentials through a key lookup (normally the process environment).
    ///
    /// A direct access token wins over the refresh-token triple.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let read = |key: &str| normalize_text_option(lookup(key));

        if let Some(token) = read(ENV_ACCESS_TOKEN) {
            return Ok(Self::AccessToken(token));
        }

        match (
            read(ENV_CLIENT_ID),
            read(ENV_CLIENT_SECRET),
            read(ENV_REFRESH_TOKEN),
        ) {
            (Some(client_id), Some(client_secret), Some(refresh_token)) => Ok(Self::RefreshToken {
                client_id,
                client_secret,
                refresh_token,
            }),
            _ => Err(Error::InvalidInput(format!(
                "Spotify credentials missing: set {ENV_ACCESS_TOKEN}, or {ENV_CLIENT_ID}, \
                 {ENV_CLIENT_SECRET} and {ENV_REFRESH_TOKEN}"
            ))),
        }
    }
}

impl fmt::Debug for SpotifyCredentials {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AccessToken(_) => formatter
                .debug_tuple("AccessToken")
                .field(&"[REDACTED]")
                .finish(),
            Self::RefreshToken { client_id, .. } => formatter
                .debug_struct("RefreshToken")
                .field("client_id", client_id)
                .field("client_secret", &"[REDACTED]")
                .field("refresh_token", &"[REDACTED]")
                .finish(),
        }
    }
}
