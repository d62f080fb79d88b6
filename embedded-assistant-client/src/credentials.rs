//! OAuth2 credentials for the assistant service.
//!
//! The credential bundle is the JSON file written by `google-oauthlib-tool`:
//! a client id/secret, a long-lived refresh token, and the token endpoint.
//! Access tokens are short-lived, so each exchange refreshes before
//! connecting rather than caching one across calls.

use serde::{Deserialize, Serialize};
use std::path::Path;

/// Error type for loading the credential bundle.
#[derive(Debug, thiserror::Error)]
pub enum CredentialError {
    /// Failed to read the credentials file.
    #[error("failed to read credentials file: {0}")]
    Read(std::io::Error),
    /// The credentials file was not a valid credential bundle.
    #[error("failed to parse credentials file: {0}")]
    Parse(serde_json::Error),
}

/// Error type for refreshing an access token.
#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    /// HTTP request to the token endpoint failed.
    #[error("token request failed: {0}")]
    Request(#[from] reqwest::Error),
    /// The token endpoint refused to issue a token.
    #[error("token endpoint refused refresh: {0}")]
    Denied(Box<str>),
}

/// An OAuth2 credential bundle in the `google-oauthlib-tool` format.
#[derive(Clone, Debug, Deserialize)]
pub struct UserCredentials {
    pub client_id: String,
    pub client_secret: String,
    pub refresh_token: String,
    pub token_uri: String,
    #[serde(default)]
    pub scopes: Vec<String>,
}

/// Exchanges a refresh token for access tokens.
#[derive(Debug)]
pub struct Authenticator {
    credentials: UserCredentials,
    http: reqwest::Client,
}

impl Authenticator {
    /// Load a credential bundle from a JSON file.
    ///
    /// An unreadable or unparsable file is a fatal condition for callers: no
    /// conversation can proceed without a credential, so the error should be
    /// logged and startup aborted.
    pub fn from_file(path: &Path) -> Result<Self, CredentialError> {
        let text = std::fs::read_to_string(path).map_err(CredentialError::Read)?;
        let credentials = serde_json::from_str(&text).map_err(CredentialError::Parse)?;
        Ok(Self::new(credentials))
    }

    pub fn new(credentials: UserCredentials) -> Self {
        Self {
            credentials,
            http: reqwest::Client::new(),
        }
    }

    /// Obtain a fresh access token from the token endpoint.
    ///
    /// This performs one HTTP round trip per call. No retry; failures
    /// propagate to the caller.
    pub async fn refresh(&self) -> Result<String, TokenError> {
        let request_body = RefreshRequest {
            grant_type: "refresh_token",
            client_id: &self.credentials.client_id,
            client_secret: &self.credentials.client_secret,
            refresh_token: &self.credentials.refresh_token,
        };

        let response = self
            .http
            .post(&self.credentials.token_uri)
            .form(&request_body)
            .send()
            .await?;

        if !response.status().is_success() {
            let error: RefreshErrorResponse = response.json().await?;
            let detail = match error.error_description {
                Some(description) => format!("{}: {}", error.error, description).into(),
                None => error.error,
            };
            return Err(TokenError::Denied(detail));
        }

        let token: RefreshResponse = response.json().await?;
        Ok(token.access_token)
    }
}

/// Form body for the refresh-token grant.
#[derive(Serialize)]
struct RefreshRequest<'a> {
    grant_type: &'static str,
    client_id: &'a str,
    client_secret: &'a str,
    refresh_token: &'a str,
}

/// Successful response from the token endpoint.
#[derive(Deserialize)]
struct RefreshResponse {
    access_token: String,
}

/// Error response from the token endpoint.
#[derive(Deserialize)]
struct RefreshErrorResponse {
    error: Box<str>,
    #[serde(default)]
    error_description: Option<Box<str>>,
}
