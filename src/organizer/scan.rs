use std::collections::HashSet;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use walkdir::WalkDir;

use crate::organizer::config::Config;
use crate::organizer::key::title_for_query_and_key;
use crate::organizer::store::History;

/// A file found in the source directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRecord {
    /// File name with extension.
    pub name: String,
    /// Absolute path.
    pub full_path: PathBuf,
    /// File name without the last extension.
    pub stem: String,
    /// Lowercase extension without the leading dot.
    pub extension: String,
    /// Grouping key derived from the stem.
    pub key: String,
}

impl FileRecord {
    /// Create a record for the given path.
    ///
    /// # Errors
    /// Returns an error if the path has no file name.
    pub fn from_path(path: PathBuf) -> Result<Self> {
        let name = crate::get_normalized_file_name(&path)?;
        let (stem, extension) = crate::get_normalized_file_name_and_extension(&path)?;
        let (_, key) = title_for_query_and_key(&stem);
        Ok(Self {
            name,
            full_path: path,
            stem,
            extension: extension.to_lowercase(),
            key,
        })
    }

    /// Full path as a string, as stored in the history.
    #[must_use]
    pub fn path_string(&self) -> String {
        crate::path_to_string(&self.full_path)
    }
}

/// Recursively list all files under `source` in a stable order.
///
/// The destination directory is skipped when it is nested inside the source,
/// so already organized output is never picked up again.
///
/// # Errors
/// Returns an error if the source directory cannot be read.
pub fn scan_directory(source: &Path, destination: &Path) -> Result<Vec<FileRecord>> {
    let excluded = nested_destination(source, destination);

    let mut files = Vec::new();
    let walker = WalkDir::new(source)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| excluded.as_deref().is_none_or(|excluded| !entry.path().starts_with(excluded)));

    for entry in walker {
        let entry = entry.with_context(|| format!("Failed to read directory: {}", source.display()))?;
        if entry.file_type().is_file() {
            files.push(FileRecord::from_path(entry.into_path())?);
        }
    }
    Ok(files)
}

/// Destination directory as seen under `source` when it is nested inside it.
///
/// Both paths are compared with symlinks resolved,
/// so a source reached through a link still matches its output directory.
fn nested_destination(source: &Path, destination: &Path) -> Option<PathBuf> {
    let resolved_source = dunce::canonicalize(source).ok()?;
    let resolved_destination = crate::resolve_output_path(destination);
    let relative = resolved_destination.strip_prefix(&resolved_source).ok()?;
    if relative.as_os_str().is_empty() {
        None
    } else {
        Some(source.join(relative))
    }
}

/// Select the video files from a listing, keeping listing order.
#[must_use]
pub fn video_files<'a>(files: &'a [FileRecord], config: &Config) -> Vec<&'a FileRecord> {
    files
        .iter()
        .filter(|file| config.is_video_extension(&file.extension))
        .collect()
}

/// Find the companion files of a video.
///
/// A file is a companion when its grouping key starts with the video's key.
/// The video itself, files already in history and files claimed earlier in this run are excluded.
#[must_use]
pub fn find_companions<'a>(
    files: &'a [FileRecord],
    video: &FileRecord,
    history: &History,
    claimed: &HashSet<PathBuf>,
) -> Vec<&'a FileRecord> {
    files
        .iter()
        .filter(|file| file.full_path != video.full_path)
        .filter(|file| !claimed.contains(&file.full_path))
        .filter(|file| !history.contains(&file.path_string()))
        .filter(|file| file.key.starts_with(&video.key))
        .collect()
}
