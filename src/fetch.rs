//! Locate the newest matching file in a folder and download it.

use std::fmt;
use std::path::{Path, PathBuf};

use tracing::{debug, enabled, info, Level};

use crate::client::{DownloadProgress, DriveClient};
use crate::error::{DriveError, Result};
use crate::models::FileMetadata;

/// Where a fetch currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchState {
    Idle,
    Querying,
    Found,
    NotFound,
    Downloading,
    Complete,
    Failed,
}

impl fmt::Display for FetchState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Querying => "querying",
            Self::Found => "found",
            Self::NotFound => "not_found",
            Self::Downloading => "downloading",
            Self::Complete => "complete",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Result of a successful fetch.
#[derive(Debug, Clone)]
pub struct FetchOutcome {
    pub file: FileMetadata,
    pub path: PathBuf,
    pub bytes: u64,
}

/// Single-use driver for one lookup-then-download run.
pub struct Fetcher<'a> {
    client: &'a DriveClient,
    state: FetchState,
}

impl<'a> Fetcher<'a> {
    pub fn new(client: &'a DriveClient) -> Self {
        Self {
            client,
            state: FetchState::Idle,
        }
    }

    pub fn state(&self) -> FetchState {
        self.state
    }

    fn transition(&mut self, next: FetchState) {
        debug!(from = %self.state, to = %next, "fetch state");
        self.state = next;
    }

    /// Find the newest file named `file_name` in `folder_id` and write it to `destination`.
    pub async fn fetch_latest<F>(
        &mut self,
        folder_id: &str,
        file_name: &str,
        destination: &Path,
        on_progress: F,
    ) -> Result<FetchOutcome>
    where
        F: FnMut(DownloadProgress),
    {
        if self.state != FetchState::Idle {
            return Err(DriveError::UnexpectedResponse(format!(
                "fetch already ran (state: {})",
                self.state
            )));
        }

        self.transition(FetchState::Querying);

        if enabled!(Level::DEBUG) {
            self.log_folder_contents(folder_id).await;
        }

        let file = match self.client.find_newest(folder_id, file_name).await {
            Ok(file) => file,
            Err(e @ DriveError::FileNotFound { .. }) => {
                self.transition(FetchState::NotFound);
                return Err(e);
            }
            Err(e) => {
                self.transition(FetchState::Failed);
                return Err(e);
            }
        };
        self.transition(FetchState::Found);
        info!(id = %file.id, name = %file.name, created = ?file.created_time, "selected file");

        self.transition(FetchState::Downloading);
        match self.client.download(&file, destination, on_progress).await {
            Ok(bytes) => {
                self.transition(FetchState::Complete);
                Ok(FetchOutcome {
                    file,
                    path: destination.to_path_buf(),
                    bytes,
                })
            }
            Err(e) => {
                self.transition(FetchState::Failed);
                Err(e)
            }
        }
    }

    // Diagnostic only; a failure here never affects the fetch.
    async fn log_folder_contents(&self, folder_id: &str) {
        match self.client.list_folder(folder_id).await {
            Ok(files) => {
                debug!(folder = folder_id, count = files.len(), "folder contents");
                for file in &files {
                    debug!("  {}", file);
                }
            }
            Err(e) => debug!(folder = folder_id, error = %e, "folder listing failed"),
        }
    }
}
