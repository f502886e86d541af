// ABOUTME: Persistent attachment store that writes uploaded bytes under a content-derived name
// ABOUTME: Issues stable session-independent paths and resolves them back to bytes for serving
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use crate::cache::ContentCache;
use bytes::Bytes;
use relay_core::constants::routes::ATTACHMENTS_PREFIX;
use relay_core::errors::{AppError, AppResult};
use std::collections::HashMap;
use std::fs;
use std::io::{self, ErrorKind};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::runtime::Handle;
use tracing::{debug, error, info};

/// Durable storage for attachment bytes
///
/// `store_bytes` is called from the sanitizer while a frame is being built, so
/// implementations must return without waiting on disk or network I/O.
pub trait AttachmentStore: Send + Sync {
    /// Persist bytes and return the URI serving them
    ///
    /// # Errors
    ///
    /// Returns an error for empty input or when the bytes cannot be persisted
    fn store_bytes(&self, name: &str, media_type: &str, bytes: &[u8]) -> AppResult<String>;
}

/// Attachment store backed by a local directory
///
/// Writes run on the blocking pool. Until a write lands, `load` serves the
/// bytes from the pending set so an issued URI resolves immediately.
#[derive(Debug, Clone)]
pub struct LocalAttachmentStore {
    root: PathBuf,
    url_prefix: String,
    pending: Arc<Mutex<HashMap<String, Bytes>>>,
}

impl LocalAttachmentStore {
    /// Open (and create if needed) a store rooted at `root`
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created
    pub fn new(root: impl Into<PathBuf>) -> AppResult<Self> {
        let root = root.into();
        fs::create_dir_all(&root).map_err(|e| {
            AppError::storage(format!(
                "Failed to create attachment directory {}: {e}",
                root.display()
            ))
        })?;
        info!(dir = %root.display(), "Attachment store ready");
        Ok(Self {
            root,
            url_prefix: ATTACHMENTS_PREFIX.to_owned(),
            pending: Arc::new(Mutex::new(HashMap::new())),
        })
    }

    /// Directory holding stored files
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Read a stored file back with its guessed content type
    ///
    /// # Errors
    ///
    /// Returns an invalid-input error for unsafe file names and a not-found
    /// error when nothing is stored under the name
    pub async fn load(&self, file_name: &str) -> AppResult<(String, Vec<u8>)> {
        if !is_safe_file_name(file_name) {
            return Err(AppError::invalid_input("invalid attachment name")
                .with_resource_id(file_name));
        }
        let path = self.root.join(file_name);
        let content_type = mime_guess::from_path(&path)
            .first_or_octet_stream()
            .essence_str()
            .to_owned();
        let pending = self.lock_pending().get(file_name).cloned();
        if let Some(bytes) = pending {
            return Ok((content_type, bytes.to_vec()));
        }
        let bytes = tokio::fs::read(&path).await.map_err(|e| {
            if e.kind() == ErrorKind::NotFound {
                AppError::not_found("attachment").with_resource_id(file_name)
            } else {
                AppError::from(e)
            }
        })?;
        Ok((content_type, bytes))
    }

    fn lock_pending(&self) -> MutexGuard<'_, HashMap<String, Bytes>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Write `bytes` to disk, off the async workers when a runtime is present
    fn spawn_write(&self, file_name: String, bytes: Bytes) {
        let path = self.root.join(&file_name);
        let pending = Arc::clone(&self.pending);
        let write = move || {
            match write_if_absent(&path, &bytes) {
                Ok(true) => debug!(file = %file_name, size = bytes.len(), "Stored attachment"),
                Ok(false) => debug!(file = %file_name, "Attachment already stored"),
                Err(e) => error!(file = %file_name, error = %e, "Failed to store attachment"),
            }
            pending
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .remove(&file_name);
        };
        match Handle::try_current() {
            Ok(handle) => {
                handle.spawn_blocking(write);
            }
            Err(_) => write(),
        }
    }
}

impl AttachmentStore for LocalAttachmentStore {
    fn store_bytes(&self, name: &str, media_type: &str, bytes: &[u8]) -> AppResult<String> {
        if bytes.is_empty() {
            return Err(AppError::invalid_input("attachment payload is empty"));
        }
        let digest = ContentCache::digest(bytes);
        let file_name = match file_extension(name, media_type) {
            Some(ext) => format!("{digest}.{ext}"),
            None => digest,
        };
        let uri = format!("{}/{file_name}", self.url_prefix);
        let bytes = Bytes::copy_from_slice(bytes);
        {
            let mut pending = self.lock_pending();
            if pending.contains_key(&file_name) {
                return Ok(uri);
            }
            pending.insert(file_name.clone(), bytes.clone());
        }
        self.spawn_write(file_name, bytes);
        Ok(uri)
    }
}

fn write_if_absent(path: &Path, bytes: &[u8]) -> io::Result<bool> {
    if path.exists() {
        return Ok(false);
    }
    fs::write(path, bytes)?;
    Ok(true)
}

fn file_extension(name: &str, media_type: &str) -> Option<String> {
    let from_name = Path::new(name)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase);
    let from_media = || {
        mime_guess::get_mime_extensions_str(media_type.trim())
            .and_then(|exts| exts.first())
            .map(|ext| (*ext).to_owned())
    };
    from_name
        .or_else(from_media)
        .filter(|ext| !ext.is_empty() && ext.len() <= 16)
        .filter(|ext| ext.chars().all(|c| c.is_ascii_alphanumeric()))
}

fn is_safe_file_name(name: &str) -> bool {
    !name.is_empty()
        && !name.starts_with('.')
        && !name.contains("..")
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_'))
}
