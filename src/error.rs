//! Error types for the drive_fetch crate.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Errors that can occur while authorizing against or downloading from Google Drive.
#[derive(Error, Debug)]
pub enum DriveError {
    #[error("Client secret file not found: {}", .0.display())]
    MissingClientSecret(PathBuf),

    #[error("Invalid client secret file: {0}")]
    InvalidClientSecret(String),

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("API error ({status}): {message}")]
    ApiError { status: u16, message: String },

    #[error("Token endpoint error ({status}): {message}")]
    TokenEndpointError { status: u16, message: String },

    #[error("Token refresh failed: {0}")]
    TokenRefreshError(String),

    #[error("Authorization failed: {0}")]
    AuthorizationError(String),

    #[error("Timed out after {}s waiting for authorization", .0.as_secs())]
    AuthorizationTimeout(Duration),

    #[error("Invalid URL or ID: {0}")]
    InvalidUrlOrId(String),

    #[error("No file named '{name}' found in folder {folder}")]
    FileNotFound { name: String, folder: String },

    #[error("Unexpected response: {0}")]
    UnexpectedResponse(String),
}

/// Result type alias for DriveError.
pub type Result<T> = std::result::Result<T, DriveError>;
