//! OAuth2 user credential and its on-disk cache.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::Result;
use crate::models::{default_token_uri, ApplicationSecret, TokenResponse};

/// Seconds before the recorded expiry at which a token is already treated as expired.
const EXPIRY_SKEW_SECS: i64 = 60;

/// An authorized-user credential.
///
/// Serialized in the same JSON layout Google's client libraries use for
/// authorized users, so a cache written by one tool can be read by another.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Credential {
    pub token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
    pub client_id: String,
    pub client_secret: String,
    #[serde(default)]
    pub scopes: Vec<String>,
    #[serde(default)]
    pub expiry: Option<DateTime<Utc>>,
}

impl Credential {
    /// Build a credential from a fresh authorization-code exchange.
    pub fn issued(response: TokenResponse, secret: &ApplicationSecret, scopes: &[&str]) -> Self {
        let granted = response
            .scope
            .as_deref()
            .map(split_scopes)
            .unwrap_or_else(|| scopes.iter().map(|s| s.to_string()).collect());

        Self {
            token: response.access_token,
            refresh_token: response.refresh_token,
            token_uri: secret.token_uri.clone(),
            client_id: secret.client_id.clone(),
            client_secret: secret.client_secret.clone(),
            scopes: granted,
            expiry: response.expires_in.map(expiry_from_now),
        }
    }

    /// Apply a refresh response, keeping the old refresh token when none is returned.
    pub fn refreshed(&self, response: TokenResponse) -> Self {
        Self {
            token: response.access_token,
            refresh_token: response.refresh_token.or_else(|| self.refresh_token.clone()),
            scopes: response
                .scope
                .as_deref()
                .map(split_scopes)
                .unwrap_or_else(|| self.scopes.clone()),
            expiry: response.expires_in.map(expiry_from_now),
            ..self.clone()
        }
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        match self.expiry {
            Some(expiry) => now + Duration::seconds(EXPIRY_SKEW_SECS) >= expiry,
            None => false,
        }
    }

    /// A credential is valid when it carries a token that has not expired.
    pub fn is_valid(&self) -> bool {
        !self.token.is_empty() && !self.is_expired()
    }

    pub fn can_refresh(&self) -> bool {
        self.refresh_token.as_deref().is_some_and(|t| !t.is_empty())
    }
}

fn expiry_from_now(expires_in: u64) -> DateTime<Utc> {
    Utc::now() + Duration::seconds(expires_in as i64)
}

fn split_scopes(scope: &str) -> Vec<String> {
    scope.split_whitespace().map(str::to_string).collect()
}

/// JSON file holding the last acquired credential.
#[derive(Debug, Clone)]
pub struct TokenCache {
    path: PathBuf,
}

impl TokenCache {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the cached credential.
    pub fn read(&self) -> Result<Credential> {
        let content = fs::read_to_string(&self.path)?;
        let credential = serde_json::from_str(&content)?;
        Ok(credential)
    }

    /// Write the credential, replacing any previous cache content.
    pub fn store(&self, credential: &Credential) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let content = serde_json::to_string_pretty(credential)?;
        fs::write(&self.path, content)?;
        debug!(path = %self.path.display(), "stored credential");
        Ok(())
    }
}
