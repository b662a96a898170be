//! Access-token bootstrap through the Spotify accounts service.

use std::fmt;

use reqwest::Client;
use serde::Deserialize;

use super::parse_api_error;
use crate::config::{normalize_base_url, SpotifyCredentials, SpotifyEndpoints};
use crate::error::{Error, Result};

/// Bearer token for the Web API
#[derive(Clone, PartialEq, Eq)]
pub struct AccessToken(String);

impl AccessToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn secret(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_tuple("AccessToken")
            .field(&"[REDACTED]")
            .finish()
    }
}

/// Refresh-token grant client
#[derive(Clone)]
pub struct SpotifyAuth {
    accounts_url: String,
    client_id: String,
    client_secret: String,
    client: Client,
}

impl SpotifyAuth {
    pub fn new(
        accounts_url: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
    ) -> Result<Self> {
        let client_id = client_id.into().trim().to_string();
        let client_secret = client_secret.into().trim().to_string();
        if client_id.is_empty() || client_secret.is_empty() {
            return Err(Error::InvalidInput(
                "Spotify client id and secret must not be empty".to_string(),
            ));
        }

        Ok(Self {
            accounts_url: normalize_base_url(accounts_url.into())?,
            client_id,
            client_secret,
            client: Client::builder().build()?,
        })
    }

    /// Exchange a refresh token for a fresh access token.
    pub async fn refresh(&self, refresh_token: &str) -> Result<AccessToken> {
        let refresh_token = refresh_token.trim();
        if refresh_token.is_empty() {
            return Err(Error::InvalidInput(
                "Refresh token must not be empty".to_string(),
            ));
        }

        let response = self
            .client
            .post(&self.accounts_url)
            .basic_auth(&self.client_id, Some(&self.client_secret))
            .form(&[
                ("grant_type", "refresh_token"),
                ("refresh_token", refresh_token),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Upstream(parse_api_error(status, &body)));
        }

        let body = response.text().await?;
        let payload = serde_json::from_str::<TokenResponse>(&body)
            .map_err(|error| Error::Upstream(format!("Unexpected token response: {error}")))?;

        if let Some(expires_in) = payload.expires_in {
            tracing::debug!("Refreshed Spotify access token, valid for {}s", expires_in);
        }
        Ok(AccessToken::new(payload.access_token))
    }
}

impl fmt::Debug for SpotifyAuth {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("SpotifyAuth")
            .field("accounts_url", &self.accounts_url)
            .field("client_id", &self.client_id)
            .field("client_secret", &"[REDACTED]")
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<u64>,
}

/// Turn configured credentials into a usable bearer token.
pub async fn resolve_access_token(
    credentials: &SpotifyCredentials,
    endpoints: &SpotifyEndpoints,
) -> Result<AccessToken> {
    match credentials {
        SpotifyCredentials::AccessToken(token) => Ok(AccessToken::new(token.clone())),
        SpotifyCredentials::RefreshToken {
            client_id,
            client_secret,
            refresh_token,
        } => {
            SpotifyAuth::new(&endpoints.accounts_url, client_id, client_secret)?
                .refresh(refresh_token)
                .await
        }
    }
}
