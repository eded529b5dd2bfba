//! Persistent JSON stores for the metadata cache and the processing history.
//!
//! Both stores are loaded fully when opened and rewritten fully after every mutation,
//! so a crash loses at most the change in flight.
//! Writes go through a temporary file in the same directory that is then renamed over the target.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tempfile::NamedTempFile;

use crate::organizer::metadata::MetadataRecord;

/// A JSON blob on disk, or in memory only when no path is set.
#[derive(Debug, Clone, Default)]
pub struct JsonStore {
    path: Option<PathBuf>,
}

/// Resolved metadata keyed by filename stem.
#[derive(Debug, Default)]
pub struct MetadataCache {
    entries: BTreeMap<String, MetadataRecord>,
    store: JsonStore,
}

/// Absolute source paths that have been transferred successfully.
#[derive(Debug, Default)]
pub struct History {
    paths: BTreeSet<String>,
    store: JsonStore,
}

impl JsonStore {
    /// Store backed by the given file.
    #[must_use]
    pub const fn file(path: PathBuf) -> Self {
        Self { path: Some(path) }
    }

    /// Store that never touches the disk.
    #[must_use]
    pub const fn memory() -> Self {
        Self { path: None }
    }

    /// Load the stored value, or the default if the file does not exist yet.
    ///
    /// # Errors
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load<T: DeserializeOwned + Default>(&self) -> Result<T> {
        let Some(path) = &self.path else {
            return Ok(T::default());
        };
        match fs::read_to_string(path) {
            Ok(content) if content.trim().is_empty() => Ok(T::default()),
            Ok(content) => serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse JSON store: {}", path.display())),
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => Ok(T::default()),
            Err(error) => Err(error).with_context(|| format!("Failed to read JSON store: {}", path.display())),
        }
    }

    /// Rewrite the whole file with the given value.
    ///
    /// # Errors
    /// Returns an error if the file cannot be written.
    pub fn save<T: Serialize>(&self, value: &T) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let parent = path
            .parent()
            .filter(|parent| !parent.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create store directory: {}", parent.display()))?;

        let temp_file = NamedTempFile::new_in(parent)
            .with_context(|| format!("Failed to create temporary file in {}", parent.display()))?;
        {
            let mut writer = BufWriter::new(temp_file.as_file());
            serde_json::to_writer_pretty(&mut writer, value).context("Failed to serialize JSON store")?;
            writer.flush().context("Failed to write JSON store")?;
        }
        temp_file
            .as_file()
            .sync_all()
            .context("Failed to sync JSON store")?;
        temp_file
            .persist(path)
            .with_context(|| format!("Failed to replace JSON store: {}", path.display()))?;
        Ok(())
    }
}

impl MetadataCache {
    /// Load the cache from the given store.
    ///
    /// # Errors
    /// Returns an error if the stored cache cannot be read.
    pub fn open(store: JsonStore) -> Result<Self> {
        let entries = store.load()?;
        Ok(Self { entries, store })
    }

    /// Empty cache that is never written to disk.
    #[must_use]
    pub fn in_memory() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn get(&self, stem: &str) -> Option<&MetadataRecord> {
        self.entries.get(stem)
    }

    #[must_use]
    pub fn contains(&self, stem: &str) -> bool {
        self.entries.contains_key(stem)
    }

    /// Insert a record and flush the whole cache before returning.
    /// The record is only kept if it was written.
    ///
    /// # Errors
    /// Returns an error if the cache cannot be written.
    pub fn insert(&mut self, stem: String, record: MetadataRecord) -> Result<()> {
        let previous = self.entries.insert(stem.clone(), record);
        if let Err(error) = self.store.save(&self.entries) {
            match previous {
                Some(previous) => self.entries.insert(stem, previous),
                None => self.entries.remove(&stem),
            };
            return Err(error);
        }
        Ok(())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Stop writing to disk. Used for preview runs.
    pub fn detach(&mut self) {
        self.store = JsonStore::memory();
    }
}

impl History {
    /// Load the history from the given store.
    ///
    /// # Errors
    /// Returns an error if the stored history cannot be read.
    pub fn open(store: JsonStore) -> Result<Self> {
        let paths = store.load()?;
        Ok(Self { paths, store })
    }

    /// Empty history that is never written to disk.
    #[must_use]
    pub fn in_memory() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn contains(&self, path: &str) -> bool {
        self.paths.contains(path)
    }

    /// Record a processed path and flush the whole history before returning.
    /// Paths already present are not written again.
    ///
    /// # Errors
    /// Returns an error if the history cannot be written.
    pub fn record(&mut self, path: &str) -> Result<()> {
        if self.paths.insert(path.to_string())
            && let Err(error) = self.store.save(&self.paths)
        {
            self.paths.remove(path);
            return Err(error);
        }
        Ok(())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.paths.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }
}
