//! drive_fetch - Download the newest copy of a named file from a Google Drive folder.
//!
//! This library provides:
//! - OAuth2 credential acquisition (token cache, refresh, browser authorization)
//! - Lookup of the most recently created file with a given name in a folder
//! - Ranged, progress-reporting download to a local path
//!
//! # Example
//!
//! ```no_run
//! use std::path::Path;
//!
//! use drive_fetch::{CredentialManager, DriveClient, Fetcher, LoopbackAuthorizer, TokenCache};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let manager = CredentialManager::new(
//!         TokenCache::new("token.json"),
//!         "credentials.json",
//!         LoopbackAuthorizer::new(None),
//!     );
//!     let credential = manager.acquire().await?;
//!
//!     let client = DriveClient::new(&credential);
//!     let outcome = Fetcher::new(&client)
//!         .fetch_latest("folder-id", "nostrcube", Path::new("nostrcube.zip"), |p| {
//!             println!("{}%", p.percent())
//!         })
//!         .await?;
//!     println!("saved {} bytes", outcome.bytes);
//!
//!     Ok(())
//! }
//! ```

pub mod auth;
pub mod client;
pub mod config;
pub mod credential;
pub mod error;
pub mod fetch;
pub mod installed_flow;
pub mod models;
pub mod telemetry;
pub mod url_parser;

// Re-exports for convenience
pub use auth::{Attempt, Authorizer, CredentialManager};
pub use client::{DownloadProgress, DriveClient};
pub use config::Config;
pub use credential::{Credential, TokenCache};
pub use error::{DriveError, Result};
pub use fetch::{FetchOutcome, FetchState, Fetcher};
pub use installed_flow::LoopbackAuthorizer;
pub use models::{ApplicationSecret, FileMetadata};
pub use url_parser::extract_folder_id;
