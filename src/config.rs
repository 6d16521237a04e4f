//! Run configuration, resolved once at startup.

use std::path::PathBuf;
use std::time::Duration;

use crate::client::DEFAULT_CHUNK_SIZE;

/// Folder searched when `GOOGLE_DRIVE_FOLDER_ID` is not set.
pub const DEFAULT_FOLDER_ID: &str = "1PX5ofzSyLY9ZOgOdoQAEeapOfqQy2Dg0";

/// File name searched when `GOOGLE_DRIVE_FILE_NAME` is not set.
pub const DEFAULT_FILE_NAME: &str = "nostrcube";

pub const DEFAULT_CLIENT_SECRET_FILE: &str = "credentials.json";

pub const DEFAULT_TOKEN_CACHE_FILE: &str = "token.json";

pub const DEFAULT_AUTH_TIMEOUT_SECS: u64 = 300;

#[derive(Debug, Clone)]
pub struct Config {
    pub folder_id: String,
    pub file_name: String,
    pub client_secret_path: PathBuf,
    pub token_cache_path: PathBuf,
    pub output_path: PathBuf,
    /// `None` waits for the browser consent indefinitely.
    pub auth_timeout: Option<Duration>,
    pub chunk_size: u64,
}

impl Config {
    /// Defaults for everything except the destination.
    pub fn new<P: Into<PathBuf>>(output_path: P) -> Self {
        Self {
            folder_id: DEFAULT_FOLDER_ID.to_string(),
            file_name: DEFAULT_FILE_NAME.to_string(),
            client_secret_path: PathBuf::from(DEFAULT_CLIENT_SECRET_FILE),
            token_cache_path: PathBuf::from(DEFAULT_TOKEN_CACHE_FILE),
            output_path: output_path.into(),
            auth_timeout: auth_timeout_from_secs(DEFAULT_AUTH_TIMEOUT_SECS),
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }
}

/// `0` means no timeout.
pub fn auth_timeout_from_secs(secs: u64) -> Option<Duration> {
    (secs > 0).then(|| Duration::from_secs(secs))
}
