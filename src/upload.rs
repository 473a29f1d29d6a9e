//! Upload validation and streaming to disk.
//!
//! The file name is checked before anything is written, and the payload is
//! copied chunk by chunk so a 50 MB model never sits in memory.

use std::fmt::Display;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use bytes::Bytes;
use futures::{Stream, StreamExt};
use regex::Regex;
use thiserror::Error;
use tokio::io::AsyncWriteExt;

/// Multipart field carrying the model.
pub const MODEL_FIELD: &str = "model";

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("Invalid filename: {0:?}")]
    InvalidFilename(String),

    #[error("Upload exceeds the limit of {limit} bytes")]
    TooLarge { limit: u64 },

    #[error("Upload stream failed: {0}")]
    Stream(String),

    #[error("Failed to write upload to {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

fn filename_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^[A-Za-z0-9_-]+\.[fF][bB][xX]$").expect("filename pattern is a valid regex")
    })
}

/// Accept only bare `<stem>.fbx` names: no directories, no dots in the stem.
/// The stem is ASCII only; just the extension ignores case.
pub fn validate_filename(name: &str) -> Result<(), UploadError> {
    if filename_pattern().is_match(name) {
        Ok(())
    } else {
        Err(UploadError::InvalidFilename(name.to_string()))
    }
}

/// Copy `stream` into a new file at `dest`, returning the number of bytes
/// written. The file is removed again if the stream fails or grows past
/// `limit` bytes.
pub async fn store<S, E>(stream: S, dest: &Path, limit: u64) -> Result<u64, UploadError>
where
    S: Stream<Item = Result<Bytes, E>> + Unpin,
    E: Display,
{
    let result = copy_limited(stream, dest, limit).await;
    if result.is_err() {
        if let Err(e) = tokio::fs::remove_file(dest).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!("Failed to remove partial upload {}: {}", dest.display(), e);
            }
        }
    }
    result
}

async fn copy_limited<S, E>(mut stream: S, dest: &Path, limit: u64) -> Result<u64, UploadError>
where
    S: Stream<Item = Result<Bytes, E>> + Unpin,
    E: Display,
{
    let io_err = |source: std::io::Error| UploadError::Io {
        path: dest.to_path_buf(),
        source,
    };

    let mut file = tokio::fs::File::create(dest).await.map_err(io_err)?;
    let mut written: u64 = 0;

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| UploadError::Stream(e.to_string()))?;
        written += chunk.len() as u64;
        if written > limit {
            return Err(UploadError::TooLarge { limit });
        }
        file.write_all(&chunk).await.map_err(io_err)?;
    }

    file.flush().await.map_err(io_err)?;
    Ok(written)
}
