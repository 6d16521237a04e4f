//! Google Drive API client: folder listing, newest-file lookup and ranged download.

use std::path::Path;

use futures::StreamExt;
use reqwest::header::{HeaderMap, CONTENT_RANGE, RANGE};
use reqwest::{Client, Response, StatusCode};
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tracing::debug;

use crate::credential::Credential;
use crate::error::{DriveError, Result};
use crate::models::{ApiErrorResponse, FileListResponse, FileMetadata};

/// Base URL for Google Drive API v3.
const DRIVE_API_BASE: &str = "https://www.googleapis.com/drive/v3";

/// Bytes requested per ranged download request (100 MiB).
pub const DEFAULT_CHUNK_SIZE: u64 = 100 * 1024 * 1024;

const FILE_FIELDS: &str = "files(id, name, mimeType, createdTime, size)";

/// Transfer progress after a completed chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DownloadProgress {
    pub downloaded: u64,
    pub total: u64,
}

impl DownloadProgress {
    pub fn fraction(&self) -> f64 {
        if self.total == 0 {
            1.0
        } else {
            self.downloaded as f64 / self.total as f64
        }
    }

    /// Whole percent complete, rounded down.
    pub fn percent(&self) -> u8 {
        (self.fraction() * 100.0).clamp(0.0, 100.0) as u8
    }
}

/// Client for the Drive files API, authorized with a single access token.
pub struct DriveClient {
    access_token: String,
    base_url: String,
    chunk_size: u64,
    http: Client,
}

impl DriveClient {
    pub fn new(credential: &Credential) -> Self {
        Self {
            access_token: credential.token.clone(),
            base_url: DRIVE_API_BASE.to_string(),
            chunk_size: DEFAULT_CHUNK_SIZE,
            http: Client::new(),
        }
    }

    /// Point the client at a different API root (used against mock servers).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_chunk_size(mut self, chunk_size: u64) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    /// List every non-trashed entry in a folder, following pagination.
    pub async fn list_folder(&self, folder_id: &str) -> Result<Vec<FileMetadata>> {
        let query = folder_query(folder_id);
        let fields = format!("nextPageToken, {}", FILE_FIELDS);
        let mut all_files = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut request = self
                .http
                .get(format!("{}/files", self.base_url))
                .bearer_auth(&self.access_token)
                .query(&[
                    ("q", query.as_str()),
                    ("fields", fields.as_str()),
                    ("includeItemsFromAllDrives", "true"),
                    ("supportsAllDrives", "true"),
                ]);

            if let Some(ref token) = page_token {
                request = request.query(&[("pageToken", token)]);
            }

            let response = check_status(request.send().await?).await?;
            let list_response: FileListResponse = response.json().await?;
            all_files.extend(list_response.files);

            match list_response.next_page_token {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }

        Ok(all_files)
    }

    /// Find the most recently created, non-trashed file named `name` in a folder.
    pub async fn find_newest(&self, folder_id: &str, name: &str) -> Result<FileMetadata> {
        let query = named_file_query(folder_id, name);
        debug!(%query, "searching for newest file");

        let response = self
            .http
            .get(format!("{}/files", self.base_url))
            .bearer_auth(&self.access_token)
            .query(&[
                ("q", query.as_str()),
                ("orderBy", "createdTime desc"),
                ("pageSize", "1"),
                ("fields", FILE_FIELDS),
                ("includeItemsFromAllDrives", "true"),
                ("supportsAllDrives", "true"),
            ])
            .send()
            .await?;

        let list_response: FileListResponse = check_status(response).await?.json().await?;

        select_newest(list_response.files).ok_or_else(|| DriveError::FileNotFound {
            name: name.to_string(),
            folder: folder_id.to_string(),
        })
    }

    /// Download a file's content to `destination` in ranged chunks.
    ///
    /// The destination is created or truncated first. `on_progress` is called
    /// after each chunk for which the total size is known. Returns the number of
    /// bytes written. A failed transfer leaves whatever was already written.
    pub async fn download<F>(
        &self,
        file: &FileMetadata,
        destination: &Path,
        mut on_progress: F,
    ) -> Result<u64>
    where
        F: FnMut(DownloadProgress),
    {
        let url = format!("{}/files/{}", self.base_url, file.id);
        let mut output = File::create(destination).await?;
        let mut downloaded: u64 = 0;

        loop {
            let range_end = downloaded.saturating_add(self.chunk_size - 1);
            let response = self
                .http
                .get(&url)
                .bearer_auth(&self.access_token)
                .query(&[("alt", "media"), ("supportsAllDrives", "true")])
                .header(RANGE, format!("bytes={}-{}", downloaded, range_end))
                .send()
                .await?;

            // Requesting any range of an empty file is unsatisfiable.
            if response.status() == StatusCode::RANGE_NOT_SATISFIABLE
                && content_range_total(response.headers()) == Some(downloaded)
            {
                on_progress(DownloadProgress {
                    downloaded,
                    total: downloaded,
                });
                break;
            }

            let response = check_status(response).await?;
            let whole_body = response.status() != StatusCode::PARTIAL_CONTENT;
            let total = if whole_body {
                response.content_length()
            } else {
                content_range_total(response.headers())
            };

            let chunk_start = downloaded;
            let mut stream = response.bytes_stream();
            while let Some(chunk) = stream.next().await {
                let chunk = chunk?;
                output.write_all(&chunk).await?;
                downloaded += chunk.len() as u64;
            }
            debug!(chunk_start, downloaded, ?total, "received chunk");

            if let Some(total) = total {
                on_progress(DownloadProgress { downloaded, total });
            }

            let done = whole_body || total.map_or(true, |t| downloaded >= t);
            if done {
                break;
            }
            if downloaded == chunk_start {
                return Err(DriveError::UnexpectedResponse(format!(
                    "empty chunk at offset {} of {}",
                    downloaded,
                    total.unwrap_or_default()
                )));
            }
        }

        output.flush().await?;
        Ok(downloaded)
    }
}

/// Turn a non-success response into an `ApiError`, preferring Google's error body.
async fn check_status(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let error_body = response.text().await.unwrap_or_default();
    if let Ok(api_error) = serde_json::from_str::<ApiErrorResponse>(&error_body) {
        return Err(DriveError::ApiError {
            status: api_error.error.code,
            message: api_error.error.message,
        });
    }
    Err(DriveError::ApiError {
        status: status.as_u16(),
        message: error_body,
    })
}

/// Total length from a `Content-Range: bytes 0-99/1234` (or `bytes */1234`) header.
fn content_range_total(headers: &HeaderMap) -> Option<u64> {
    let value = headers.get(CONTENT_RANGE)?.to_str().ok()?;
    let (_, total) = value.rsplit_once('/')?;
    total.trim().parse().ok()
}

/// Pick the entry with the latest creation time; ties keep the first one.
fn select_newest(files: Vec<FileMetadata>) -> Option<FileMetadata> {
    files.into_iter().reduce(|best, candidate| {
        if candidate.created_time > best.created_time {
            candidate
        } else {
            best
        }
    })
}

/// Escape a literal for use inside a single-quoted Drive query string.
fn escape_query_value(value: &str) -> String {
    value.replace('\\', "\\\\").replace('\'', "\\'")
}

pub fn folder_query(folder_id: &str) -> String {
    format!(
        "'{}' in parents and trashed = false",
        escape_query_value(folder_id)
    )
}

pub fn named_file_query(folder_id: &str, name: &str) -> String {
    format!(
        "'{}' in parents and name = '{}' and trashed = false",
        escape_query_value(folder_id),
        escape_query_value(name)
    )
}
