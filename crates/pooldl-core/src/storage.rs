//! Save step that writes each download into a directory.
//!
//! Bodies are written to `<name>.<n>.part` and renamed into place, so a file
//! under its final name is always complete. `n` is unique per save, so
//! concurrent saves of one name never share a temporary file; with
//! `overwrite` the last rename wins.

use anyhow::{Context, Result};
use async_trait::async_trait;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};

use crate::connection::Save;
use crate::transport::Downloaded;
use crate::url_model::{derive_filename, unique_name};

/// Temporary file suffix used before atomic rename.
pub const TEMP_SUFFIX: &str = ".part";

/// `<path>.<seq>.part`, next to the final file.
pub fn temp_path(path: &Path, seq: u64) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(format!(".{}{}", seq, TEMP_SUFFIX));
    PathBuf::from(name)
}

#[derive(Debug)]
pub struct DirectorySink {
    dir: PathBuf,
    overwrite: bool,
    /// Names claimed by this sink, so concurrent saves never pick the same file.
    claimed: Mutex<HashSet<String>>,
    /// Numbers temporary files.
    next_temp: AtomicU64,
    saved: Mutex<Vec<PathBuf>>,
}

impl DirectorySink {
    /// Creates `dir` (and parents) if missing.
    pub fn create(dir: impl Into<PathBuf>, overwrite: bool) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("failed to create output directory {}", dir.display()))?;
        Ok(Self {
            dir,
            overwrite,
            claimed: Mutex::new(HashSet::new()),
            next_temp: AtomicU64::new(0),
            saved: Mutex::new(Vec::new()),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Paths written so far, in completion order.
    pub fn saved(&self) -> Vec<PathBuf> {
        self.saved
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Reserves a final path for `name`. Without `overwrite`, existing files
    /// and names claimed earlier in this batch get a ` (n)` suffix.
    fn claim(&self, name: &str) -> PathBuf {
        let mut claimed = self.claimed.lock().unwrap_or_else(PoisonError::into_inner);
        if self.overwrite {
            claimed.insert(name.to_string());
            return self.dir.join(name);
        }
        let candidate = unique_name(name, |n| claimed.contains(n) || self.dir.join(n).exists());
        claimed.insert(candidate.clone());
        self.dir.join(candidate)
    }
}

#[async_trait]
impl Save<Downloaded> for DirectorySink {
    async fn save(&self, content: Downloaded) -> Result<()> {
        let name = derive_filename(&content.url, content.content_disposition.as_deref());
        let path = self.claim(&name);
        let temp = temp_path(&path, self.next_temp.fetch_add(1, Ordering::Relaxed));

        if let Err(err) = tokio::fs::write(&temp, &content.body).await {
            let _ = tokio::fs::remove_file(&temp).await;
            return Err(err).with_context(|| format!("failed to write {}", temp.display()));
        }
        tokio::fs::rename(&temp, &path)
            .await
            .with_context(|| format!("failed to rename {} to {}", temp.display(), path.display()))?;

        tracing::info!(
            url = %content.url,
            path = %path.display(),
            bytes = content.body.len(),
            "saved"
        );
        self.saved
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(path);
        Ok(())
    }
}
