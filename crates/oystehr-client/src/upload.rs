//! Function archive upload and local file helpers.

use std::path::{Component, Path, PathBuf};
use std::time::Duration;

use oystehr_domain::retry::{retry_with_backoff, RetryConfig, RetryError};
use reqwest::header::CONTENT_TYPE;
use reqwest::StatusCode;
use sha2::{Digest, Sha256};
use tracing::{debug, info, instrument};

use crate::error::{ClientError, ClientResult};

const ARCHIVE_CONTENT_TYPE: &str = "application/zip";

/// Uploads the zip archive at `source` to a pre-signed URL.
///
/// The file is read once. Each attempt `PUT`s the archive and must finish
/// within `attempt_timeout`; a network error, an expired attempt or any
/// status other than 200 is retried under `retry`.
#[instrument(skip_all, fields(source = %source))]
pub async fn upload_archive(
    http: &reqwest::Client,
    signed_url: &str,
    source: &str,
    retry: &RetryConfig,
    attempt_timeout: Duration,
) -> ClientResult<()> {
    let path = clean_path(source)?;
    let archive = read_file(&path).await?;
    let size = archive.len();

    retry_with_backoff(retry, || {
        let request = http
            .put(signed_url)
            .header(CONTENT_TYPE, ARCHIVE_CONTENT_TYPE)
            .body(archive.clone());
        async move {
            let response = match tokio::time::timeout(attempt_timeout, request.send()).await {
                Ok(Ok(response)) => response,
                Ok(Err(e)) => {
                    return Err(RetryError::Transient(ClientError::Upload {
                        message: e.to_string(),
                    }))
                }
                Err(_) => {
                    debug!(
                        timeout_ms = attempt_timeout.as_millis() as u64,
                        "Archive upload timed out"
                    );
                    return Err(RetryError::Transient(ClientError::Upload {
                        message: format!(
                            "timed out after {} ms",
                            attempt_timeout.as_millis()
                        ),
                    }));
                }
            };

            let status = response.status();
            if status != StatusCode::OK {
                debug!(status = status.as_u16(), "Archive upload rejected");
                return Err(RetryError::Transient(ClientError::Upload {
                    message: format!("unexpected status code: {}", status.as_u16()),
                }));
            }
            Ok(())
        }
    })
    .await?;

    info!(path = %path.display(), size, "Uploaded archive");
    Ok(())
}

/// Returns the hex-encoded SHA-256 digest of the file at `path`.
pub async fn sha256_file(path: &str) -> ClientResult<String> {
    let path = clean_path(path)?;
    let data = read_file(&path).await?;
    Ok(format!("{:x}", Sha256::digest(&data)))
}

/// Expands a leading `~` to the home directory and normalises the path
/// lexically (`.` dropped, `..` folded into its parent where possible).
pub fn clean_path(path: &str) -> ClientResult<PathBuf> {
    let expanded = match path.strip_prefix('~') {
        Some(rest) if rest.is_empty() || rest.starts_with('/') => {
            let home = std::env::var_os("HOME").ok_or_else(|| ClientError::Io {
                path: path.to_string(),
                message: "home directory is not set; provide a path without ~".to_string(),
            })?;
            let mut expanded = PathBuf::from(home);
            expanded.push(rest.trim_start_matches('/'));
            expanded
        }
        _ => PathBuf::from(path),
    };

    Ok(normalize(&expanded))
}

fn normalize(path: &Path) -> PathBuf {
    let mut parts: Vec<Component<'_>> = Vec::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match parts.last() {
                Some(Component::Normal(_)) => {
                    parts.pop();
                }
                Some(Component::RootDir) | Some(Component::Prefix(_)) => {}
                _ => parts.push(component),
            },
            other => parts.push(other),
        }
    }

    if parts.is_empty() {
        return PathBuf::from(".");
    }
    parts.iter().collect()
}

async fn read_file(path: &Path) -> ClientResult<Vec<u8>> {
    tokio::fs::read(path).await.map_err(|e| ClientError::Io {
        path: path.display().to_string(),
        message: e.to_string(),
    })
}
