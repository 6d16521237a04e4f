//! Folder reference parsing: accepts a Drive folder URL or a bare folder ID.

use regex::Regex;
use std::sync::LazyLock;

use crate::error::{DriveError, Result};

/// Folder links as copied from the Drive web UI, with or without `/u/<N>/`,
/// plus the legacy `open?id=` form.
static FOLDER_LINK_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^https?://drive\.google\.com/(?:drive/(?:u/\d+/)?folders/|open\?id=)([a-zA-Z0-9_-]+)",
    )
    .expect("Invalid folder link regex")
});

static ID_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-zA-Z0-9_-]+$").expect("Invalid ID regex"));

/// Resolve a folder URL or raw ID to the folder ID.
///
/// ```
/// use drive_fetch::url_parser::extract_folder_id;
///
/// let id = extract_folder_id("https://drive.google.com/drive/folders/1PX5ofzSy").unwrap();
/// assert_eq!(id, "1PX5ofzSy");
///
/// assert_eq!(extract_folder_id("1PX5ofzSy").unwrap(), "1PX5ofzSy");
/// ```
pub fn extract_folder_id(folder: &str) -> Result<String> {
    let trimmed = folder.trim();

    if let Some(id) = FOLDER_LINK_REGEX
        .captures(trimmed)
        .and_then(|captures| captures.get(1))
    {
        return Ok(id.as_str().to_string());
    }

    if ID_REGEX.is_match(trimmed) {
        return Ok(trimmed.to_string());
    }

    Err(DriveError::InvalidUrlOrId(folder.to_string()))
}
