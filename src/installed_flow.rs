//! Installed-application OAuth2 flow with a loopback redirect listener.
//!
//! The user opens the printed authorization URL in a browser, consents, and
//! Google redirects back to `http://127.0.0.1:<port>/` with an authorization
//! code. The code is exchanged for tokens using PKCE.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::extract::Query;
use axum::http::StatusCode;
use axum::routing::get;
use axum::Router;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use rand::distributions::Alphanumeric;
use rand::Rng;
use reqwest::{Client, Url};
use serde::Deserialize;
use sha2::{Digest, Sha256};
use tokio::net::TcpListener;
use tokio::sync::{oneshot, Mutex};
use tracing::{debug, info};

use crate::auth::{request_token, Authorizer};
use crate::credential::Credential;
use crate::error::{DriveError, Result};
use crate::models::ApplicationSecret;

const STATE_LEN: usize = 30;

// RFC 7636 allows 43..=128 characters.
const CODE_VERIFIER_LEN: usize = 64;

const SUCCESS_PAGE: &str =
    "The authentication flow has completed. You may close this window.";

const WAITING_PAGE: &str = "Waiting for the authorization response.";

/// Query parameters Google appends to the redirect URI.
#[derive(Debug, Default, Deserialize)]
pub struct CallbackParams {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
}

/// A prepared authorization request: the URL to visit plus the secrets needed
/// to validate the callback and redeem the code.
#[derive(Debug)]
pub struct AuthorizationRequest {
    pub url: Url,
    pub redirect_uri: String,
    state: String,
    code_verifier: String,
}

impl AuthorizationRequest {
    pub fn new(secret: &ApplicationSecret, scopes: &[&str], redirect_uri: &str) -> Result<Self> {
        let state = random_string(STATE_LEN);
        let code_verifier = random_string(CODE_VERIFIER_LEN);
        let scope = scopes.join(" ");
        let challenge = code_challenge(&code_verifier);

        let url = Url::parse_with_params(
            &secret.auth_uri,
            &[
                ("response_type", "code"),
                ("client_id", secret.client_id.as_str()),
                ("redirect_uri", redirect_uri),
                ("scope", scope.as_str()),
                ("state", state.as_str()),
                ("code_challenge", challenge.as_str()),
                ("code_challenge_method", "S256"),
                ("access_type", "offline"),
            ],
        )
        .map_err(|e| DriveError::InvalidClientSecret(format!("bad auth_uri: {}", e)))?;

        Ok(Self {
            url,
            redirect_uri: redirect_uri.to_string(),
            state,
            code_verifier,
        })
    }

    pub fn state(&self) -> &str {
        &self.state
    }

    /// Check the callback against this request and return the authorization code.
    pub fn verify_callback(&self, params: CallbackParams) -> Result<String> {
        if let Some(error) = params.error {
            return Err(DriveError::AuthorizationError(error));
        }
        if params.state.as_deref() != Some(self.state.as_str()) {
            return Err(DriveError::AuthorizationError(
                "state mismatch in authorization response".to_string(),
            ));
        }
        params
            .code
            .filter(|c| !c.is_empty())
            .ok_or_else(|| {
                DriveError::AuthorizationError("no authorization code in response".to_string())
            })
    }
}

fn random_string(len: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

fn code_challenge(verifier: &str) -> String {
    URL_SAFE_NO_PAD.encode(Sha256::digest(verifier.as_bytes()))
}

/// Local HTTP server that receives the single OAuth redirect.
pub struct CallbackServer {
    port: u16,
    callback_rx: oneshot::Receiver<CallbackParams>,
    shutdown_tx: oneshot::Sender<()>,
}

impl CallbackServer {
    /// Bind an ephemeral loopback port and start serving.
    pub async fn bind() -> Result<Self> {
        let listener = TcpListener::bind(("127.0.0.1", 0)).await?;
        let port = listener.local_addr()?.port();

        let (callback_tx, callback_rx) = oneshot::channel::<CallbackParams>();
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let callback_tx = Arc::new(Mutex::new(Some(callback_tx)));

        let app = Router::new().route(
            "/",
            get(move |Query(params): Query<CallbackParams>| {
                let callback_tx = callback_tx.clone();
                async move {
                    // Stray requests must not consume the one-shot channel.
                    if params.code.is_none() && params.error.is_none() {
                        debug!("ignoring request without an authorization response");
                        return (StatusCode::BAD_REQUEST, WAITING_PAGE);
                    }
                    debug!(has_code = params.code.is_some(), "received authorization redirect");
                    if let Some(tx) = callback_tx.lock().await.take() {
                        let _ = tx.send(params);
                    }
                    (StatusCode::OK, SUCCESS_PAGE)
                }
            }),
        );

        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    let _ = shutdown_rx.await;
                    debug!("redirect listener shutting down");
                })
                .await
                .ok();
        });

        info!(port, "listening for authorization redirect");

        Ok(Self {
            port,
            callback_rx,
            shutdown_tx,
        })
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn redirect_uri(&self) -> String {
        format!("http://127.0.0.1:{}/", self.port)
    }

    /// Wait for the redirect, optionally bounded by `timeout`. The server is
    /// shut down whichever way this returns.
    pub async fn wait(self, timeout: Option<Duration>) -> Result<CallbackParams> {
        let Self {
            callback_rx,
            shutdown_tx,
            ..
        } = self;

        let received = match timeout {
            Some(limit) => tokio::time::timeout(limit, callback_rx)
                .await
                .map_err(|_| DriveError::AuthorizationTimeout(limit))?,
            None => callback_rx.await,
        };

        let _ = shutdown_tx.send(());

        received.map_err(|_| {
            DriveError::AuthorizationError("redirect listener stopped unexpectedly".to_string())
        })
    }
}

/// Runs the browser consent flow against a loopback redirect.
pub struct LoopbackAuthorizer {
    http: Client,
    timeout: Option<Duration>,
}

impl LoopbackAuthorizer {
    pub fn new(timeout: Option<Duration>) -> Self {
        Self {
            http: Client::new(),
            timeout,
        }
    }
}

#[async_trait]
impl Authorizer for LoopbackAuthorizer {
    async fn authorize(&self, secret: &ApplicationSecret, scopes: &[&str]) -> Result<Credential> {
        let server = CallbackServer::bind().await?;
        let request = AuthorizationRequest::new(secret, scopes, &server.redirect_uri())?;

        println!("Please visit this URL to authorize this application:");
        println!("{}", request.url);

        let params = server.wait(self.timeout).await?;
        let code = request.verify_callback(params)?;

        exchange_code(&self.http, secret, &request, &code, scopes).await
    }
}

/// Redeem an authorization code for a credential.
pub async fn exchange_code(
    http: &Client,
    secret: &ApplicationSecret,
    request: &AuthorizationRequest,
    code: &str,
    scopes: &[&str],
) -> Result<Credential> {
    let params = [
        ("grant_type", "authorization_code"),
        ("code", code),
        ("redirect_uri", request.redirect_uri.as_str()),
        ("client_id", secret.client_id.as_str()),
        ("client_secret", secret.client_secret.as_str()),
        ("code_verifier", request.code_verifier.as_str()),
    ];

    let response = request_token(http, &secret.token_uri, &params)
        .await
        .map_err(|e| DriveError::AuthorizationError(e.to_string()))?;

    Ok(Credential::issued(response, secret, scopes))
}
