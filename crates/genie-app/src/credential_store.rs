//! Durable storage for the activation credential
//!
//! The credential file holds exactly one JSON record,
//! `{"uuid": "...", "accessToken": "..."}`. Writes are atomic: a sibling temp
//! file is written, synced, and renamed over the target, so a crash leaves
//! either the previous record or the new one, never a torn file.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use fs2::FileExt;
use genie_core::prelude::*;
use genie_core::Credential;

/// Single-slot credential file
#[derive(Debug, Clone)]
pub struct CredentialStore {
    path: PathBuf,
}

impl CredentialStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the stored credential.
    ///
    /// A missing or empty file means "no credential". A file that cannot be
    /// parsed is logged and also treated as absent.
    pub fn load(&self) -> Option<Credential> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No credential file at {:?}", self.path);
                return None;
            }
            Err(e) => {
                warn!("Failed to read credential file {:?}: {}", self.path, e);
                return None;
            }
        };

        if content.trim().is_empty() {
            debug!("Credential file {:?} is empty", self.path);
            return None;
        }

        match serde_json::from_str::<Credential>(&content) {
            Ok(credential) if !credential.device_id.is_empty() => {
                debug!("Loaded credential for {}", credential.device_id);
                Some(credential)
            }
            Ok(_) => {
                warn!(
                    "Credential file {:?} has an empty uuid, ignoring",
                    self.path
                );
                None
            }
            Err(e) => {
                warn!("Failed to parse credential file {:?}: {}", self.path, e);
                None
            }
        }
    }

    /// Replace the stored credential atomically
    pub fn save(&self, credential: &Credential) -> Result<()> {
        let content = serde_json::to_string(credential)?;

        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        std::fs::create_dir_all(&dir)
            .map_err(|e| Error::persistence(format!("Failed to create {:?}: {}", dir, e)))?;

        // Serializes writers across processes sharing the same file
        let lock = self.lock_file(&dir)?;

        let temp_path = self.temp_path(&dir);
        let result = write_synced(&temp_path, content.as_bytes()).and_then(|()| {
            std::fs::rename(&temp_path, &self.path).map_err(|e| {
                Error::persistence(format!("Failed to replace {:?}: {}", self.path, e))
            })
        });

        if result.is_err() {
            let _ = std::fs::remove_file(&temp_path);
        } else {
            sync_dir(&dir);
            info!(
                "Saved credential for {} to {:?}",
                credential.device_id, self.path
            );
        }

        drop(lock);
        result
    }

    fn temp_path(&self, dir: &Path) -> PathBuf {
        let name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "credential".to_string());
        dir.join(format!(".{}.{}.tmp", name, std::process::id()))
    }

    fn lock_file(&self, dir: &Path) -> Result<File> {
        let name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "credential".to_string());
        let lock_path = dir.join(format!(".{}.lock", name));

        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(false)
            .open(&lock_path)
            .map_err(|e| Error::persistence(format!("Failed to open {:?}: {}", lock_path, e)))?;

        // Released when the file is dropped
        file.lock_exclusive()
            .map_err(|e| Error::persistence(format!("Failed to lock {:?}: {}", lock_path, e)))?;

        Ok(file)
    }
}

fn write_synced(path: &Path, bytes: &[u8]) -> Result<()> {
    let mut file = File::create(path)
        .map_err(|e| Error::persistence(format!("Failed to create {:?}: {}", path, e)))?;
    file.write_all(bytes)
        .map_err(|e| Error::persistence(format!("Failed to write {:?}: {}", path, e)))?;
    file.sync_all()
        .map_err(|e| Error::persistence(format!("Failed to sync {:?}: {}", path, e)))?;
    Ok(())
}

#[cfg(unix)]
fn sync_dir(dir: &Path) {
    if let Err(e) = File::open(dir).and_then(|d| d.sync_all()) {
        debug!("Failed to sync directory {:?}: {}", dir, e);
    }
}

#[cfg(not(unix))]
fn sync_dir(_dir: &Path) {}
