use crate::checkpoint::{CheckpointError, CheckpointResult};
use indexmap::IndexMap;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// Durable mapping from item identity to its completed payload
///
/// The store is read once when opened and rewritten wholesale on every
/// flush. A flush writes a temporary file next to the checkpoint and renames
/// it over the old one, so an interrupted flush leaves the previous
/// checkpoint intact.
///
/// The store has a single owner. Workers hand their results back to that
/// owner; they never mutate the store themselves.
#[derive(Debug)]
pub struct CheckpointStore<P> {
    path: PathBuf,
    entries: IndexMap<String, P>,
    flush_interval: usize,
    unflushed: usize,
}

impl<P> CheckpointStore<P>
where
    P: Serialize + DeserializeOwned,
{
    /// Opens the checkpoint at `path`, loading any previous entries
    ///
    /// A missing, unreadable or corrupt file yields an empty store: re-fetching
    /// is preferred over refusing to start.
    ///
    /// # Arguments
    ///
    /// * `path` - Location of the checkpoint JSON file
    /// * `flush_interval` - Number of `put`s after which [`flush_due`](Self::flush_due) reports true
    pub fn open(path: impl Into<PathBuf>, flush_interval: usize) -> Self {
        let path = path.into();
        let entries = match load_entries(&path) {
            Ok(entries) => {
                if !entries.is_empty() {
                    tracing::info!(
                        "Loaded {} checkpoint entries from {}",
                        entries.len(),
                        path.display()
                    );
                }
                entries
            }
            Err(e) => {
                tracing::warn!(
                    "Ignoring unreadable checkpoint {}: {}",
                    path.display(),
                    e
                );
                IndexMap::new()
            }
        };

        Self {
            path,
            entries,
            flush_interval: flush_interval.max(1),
            unflushed: 0,
        }
    }

    /// Opens a store that ignores anything already on disk
    pub fn fresh(path: impl Into<PathBuf>, flush_interval: usize) -> Self {
        Self {
            path: path.into(),
            entries: IndexMap::new(),
            flush_interval: flush_interval.max(1),
            unflushed: 0,
        }
    }

    /// Returns the stored payload for an identity, if it has completed
    pub fn get(&self, identity: &str) -> Option<&P> {
        self.entries.get(identity)
    }

    pub fn contains(&self, identity: &str) -> bool {
        self.entries.contains_key(identity)
    }

    /// Records a completed item, replacing any previous entry for it
    ///
    /// # Returns
    ///
    /// The payload that was replaced, if any
    pub fn put(&mut self, identity: impl Into<String>, payload: P) -> Option<P> {
        self.unflushed += 1;
        self.entries.insert(identity.into(), payload)
    }

    /// Removes an entry so the item is fetched again on the next run
    pub fn clear(&mut self, identity: &str) -> Option<P> {
        let removed = self.entries.shift_remove(identity);
        if removed.is_some() {
            self.unflushed += 1;
        }
        removed
    }

    /// Removes every entry for which `keep` returns false
    ///
    /// # Returns
    ///
    /// The number of entries removed
    pub fn retain(&mut self, mut keep: impl FnMut(&str, &P) -> bool) -> usize {
        let before = self.entries.len();
        self.entries.retain(|k, v| keep(k, v));
        let removed = before - self.entries.len();
        self.unflushed += removed;
        removed
    }

    /// True once `flush_interval` items have been recorded since the last flush
    pub fn flush_due(&self) -> bool {
        self.unflushed >= self.flush_interval
    }

    /// Number of changes not yet written to disk
    pub fn unflushed(&self) -> usize {
        self.unflushed
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Writes every entry to disk, replacing the previous checkpoint
    ///
    /// Safe to call repeatedly; each call produces the same file for the same
    /// entries.
    pub fn flush(&mut self) -> CheckpointResult<()> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        std::fs::create_dir_all(&dir)?;

        let mut tmp = NamedTempFile::new_in(&dir)?;
        {
            let mut writer = BufWriter::new(tmp.as_file_mut());
            serde_json::to_writer_pretty(&mut writer, &self.entries)?;
            writer.flush()?;
        }
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path)
            .map_err(|e| CheckpointError::Persist {
                path: self.path.display().to_string(),
                source: e.error,
            })?;

        tracing::debug!(
            "Checkpoint flushed: {} entries to {}",
            self.entries.len(),
            self.path.display()
        );
        self.unflushed = 0;
        Ok(())
    }
}

/// Reads a checkpoint file into an identity → payload mapping
///
/// A file that does not exist is an empty mapping, not an error.
pub fn load_entries<P: DeserializeOwned>(path: &Path) -> CheckpointResult<IndexMap<String, P>> {
    if !path.exists() {
        return Ok(IndexMap::new());
    }
    let content = std::fs::read_to_string(path)?;
    if content.trim().is_empty() {
        return Ok(IndexMap::new());
    }
    Ok(serde_json::from_str(&content)?)
}
