//! Credential acquisition: cached token, refresh, then interactive authorization.

use std::path::PathBuf;

use async_trait::async_trait;
use reqwest::Client;
use tracing::{debug, info, warn};

use crate::credential::{Credential, TokenCache};
use crate::error::{DriveError, Result};
use crate::models::{ApplicationSecret, OAuthErrorResponse, TokenResponse};

/// Google Drive API scope.
pub const DRIVE_SCOPE: &str = "https://www.googleapis.com/auth/drive";

/// Interactive step that obtains a brand-new credential from the user.
#[async_trait]
pub trait Authorizer: Send + Sync {
    async fn authorize(&self, secret: &ApplicationSecret, scopes: &[&str]) -> Result<Credential>;
}

/// Outcome of one step of the acquisition chain.
#[derive(Debug)]
pub enum Attempt {
    Acquired(Credential),
    Skipped(String),
}

/// Produces a valid credential using the cache → refresh → interactive chain.
pub struct CredentialManager<A> {
    cache: TokenCache,
    client_secret_path: PathBuf,
    authorizer: A,
    scopes: Vec<&'static str>,
    http: Client,
}

impl<A: Authorizer> CredentialManager<A> {
    pub fn new<P: Into<PathBuf>>(cache: TokenCache, client_secret_path: P, authorizer: A) -> Self {
        Self {
            cache,
            client_secret_path: client_secret_path.into(),
            authorizer,
            scopes: vec![DRIVE_SCOPE],
            http: Client::new(),
        }
    }

    /// Get a valid credential, persisting it unless it came straight from the cache.
    pub async fn acquire(&self) -> Result<Credential> {
        let cached = match self.cache.read() {
            Ok(credential) => Some(credential),
            Err(e) => {
                debug!(path = %self.cache.path().display(), error = %e, "no usable cached credential");
                None
            }
        };

        let refreshed = match cached {
            Some(credential) if credential.is_valid() => {
                info!("using cached credential");
                return Ok(credential);
            }
            Some(credential) => self.attempt_refresh(credential).await,
            None => Attempt::Skipped("no cached credential".to_string()),
        };

        let credential = match refreshed {
            Attempt::Acquired(credential) => credential,
            Attempt::Skipped(reason) => {
                info!(%reason, "falling back to interactive authorization");
                self.authorize_interactively().await?
            }
        };

        self.cache.store(&credential)?;
        Ok(credential)
    }

    async fn attempt_refresh(&self, credential: Credential) -> Attempt {
        debug!(expiry = ?credential.expiry, "cached credential is no longer valid");
        if !credential.is_expired() || !credential.can_refresh() {
            return Attempt::Skipped("cached credential cannot be refreshed".to_string());
        }

        match refresh_credential(&self.http, &credential).await {
            Ok(refreshed) if refreshed.is_valid() => {
                info!("refreshed access token");
                Attempt::Acquired(refreshed)
            }
            Ok(_) => Attempt::Skipped("refresh returned an expired token".to_string()),
            Err(e) => {
                warn!(error = %e, "token refresh failed");
                Attempt::Skipped(e.to_string())
            }
        }
    }

    async fn authorize_interactively(&self) -> Result<Credential> {
        if !self.client_secret_path.exists() {
            return Err(DriveError::MissingClientSecret(self.client_secret_path.clone()));
        }
        let secret = ApplicationSecret::from_file(&self.client_secret_path)?;

        let credential = self.authorizer.authorize(&secret, &self.scopes).await?;
        if !credential.is_valid() {
            return Err(DriveError::AuthorizationError(
                "authorization produced an invalid credential".to_string(),
            ));
        }

        info!("authorization complete");
        Ok(credential)
    }
}

/// Exchange the refresh token for a new access token.
pub async fn refresh_credential(http: &Client, credential: &Credential) -> Result<Credential> {
    let refresh_token = credential
        .refresh_token
        .as_deref()
        .ok_or_else(|| DriveError::TokenRefreshError("no refresh token".to_string()))?;

    let params = [
        ("grant_type", "refresh_token"),
        ("refresh_token", refresh_token),
        ("client_id", credential.client_id.as_str()),
        ("client_secret", credential.client_secret.as_str()),
    ];

    let response = request_token(http, &credential.token_uri, &params)
        .await
        .map_err(|e| DriveError::TokenRefreshError(e.to_string()))?;

    Ok(credential.refreshed(response))
}

/// POST a form to the OAuth2 token endpoint.
pub(crate) async fn request_token(
    http: &Client,
    token_uri: &str,
    params: &[(&str, &str)],
) -> Result<TokenResponse> {
    let response = http.post(token_uri).form(params).send().await?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<OAuthErrorResponse>(&body)
            .map(|e| e.to_string())
            .unwrap_or(body);
        return Err(DriveError::TokenEndpointError {
            status: status.as_u16(),
            message,
        });
    }

    let token_response: TokenResponse = response.json().await?;
    Ok(token_response)
}
