//! Input resolution: turn a user-supplied path or URL into a [`Document`].
//!
//! Everything stays in memory; rasterisation works from byte slices, so a
//! downloaded upload never touches the disk. The document kind is taken from
//! the first source that answers: explicit override, file extension,
//! `Content-Type` header, then magic bytes.

use crate::document::{Document, DocumentKind};
use crate::error::IngestError;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Check if the input string looks like a URL.
pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// Resolve a local path or HTTP(S) URL to a [`Document`].
///
/// `kind_override` skips inference entirely; `timeout_secs` bounds the
/// whole download.
pub async fn resolve_document(
    input: &str,
    kind_override: Option<DocumentKind>,
    timeout_secs: u64,
) -> Result<Document, IngestError> {
    if is_url(input) {
        download_url(input, kind_override, timeout_secs).await
    } else {
        resolve_local(input, kind_override).await
    }
}

/// Read a local file, mapping I/O failures to input errors.
async fn resolve_local(path_str: &str, kind_override: Option<DocumentKind>) -> Result<Document, IngestError> {
    let path = PathBuf::from(path_str);

    let bytes = match tokio::fs::read(&path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            return Err(IngestError::PermissionDenied { path });
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(IngestError::FileNotFound { path });
        }
        Err(e) => {
            return Err(IngestError::UnsupportedInput {
                input: path_str.to_string(),
                reason: e.to_string(),
            });
        }
    };

    let kind = kind_override
        .or_else(|| extension_kind(&path))
        .or_else(|| DocumentKind::sniff(&bytes))
        .ok_or_else(|| unknown_kind(path_str))?;

    debug!("Resolved local {}: {} ({} bytes)", kind, path.display(), bytes.len());
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path_str.to_string());
    Ok(Document::new(bytes, kind).with_name(name))
}

/// Download a URL into memory.
async fn download_url(
    url: &str,
    kind_override: Option<DocumentKind>,
    timeout_secs: u64,
) -> Result<Document, IngestError> {
    info!("Downloading document from: {}", url);

    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| IngestError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    let map_send_error = |e: reqwest::Error| {
        if e.is_timeout() {
            IngestError::DownloadTimeout {
                url: url.to_string(),
                secs: timeout_secs,
            }
        } else {
            IngestError::DownloadFailed {
                url: url.to_string(),
                reason: e.to_string(),
            }
        }
    };

    let response = client.get(url).send().await.map_err(map_send_error)?;

    if !response.status().is_success() {
        return Err(IngestError::DownloadFailed {
            url: url.to_string(),
            reason: format!("HTTP {}", response.status()),
        });
    }

    let content_type = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    let bytes = response.bytes().await.map_err(map_send_error)?;

    let filename = extract_filename(url);
    let kind = kind_override
        .or_else(|| filename.as_deref().and_then(|f| extension_kind(Path::new(f))))
        .or_else(|| content_type.as_deref().and_then(DocumentKind::from_mime))
        .or_else(|| DocumentKind::sniff(&bytes))
        .ok_or_else(|| unknown_kind(url))?;

    info!("Downloaded {} bytes ({})", bytes.len(), kind);
    Ok(Document::new(bytes.to_vec(), kind).with_name(filename.unwrap_or_else(|| url.to_string())))
}

fn extension_kind(path: &Path) -> Option<DocumentKind> {
    path.extension()
        .and_then(|e| e.to_str())
        .and_then(DocumentKind::from_extension)
}

fn unknown_kind(input: &str) -> IngestError {
    IngestError::UnsupportedInput {
        input: input.to_string(),
        reason: "cannot tell whether this is an image or a PDF; pass --kind".into(),
    }
}

/// Last path segment of a URL, when it looks like a file name.
fn extract_filename(url: &str) -> Option<String> {
    let parsed = reqwest::Url::parse(url).ok()?;
    let last = parsed.path_segments()?.next_back()?;
    (!last.is_empty() && last.contains('.')).then(|| last.to_string())
}
