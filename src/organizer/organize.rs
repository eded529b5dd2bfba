use std::collections::HashSet;
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{Context, Result};

use crate::organizer::config::{Config, TransferAction};
use crate::organizer::key::extract_resolution;
use crate::organizer::naming::{build_companion_name, build_video_base, build_video_name, dir_name_for};
use crate::organizer::provider::providers_from_config;
use crate::organizer::report::{Decision, FileKind, Reporter};
use crate::organizer::resolver::Resolver;
use crate::organizer::scan::{FileRecord, find_companions, scan_directory, video_files};
use crate::organizer::store::{History, JsonStore, MetadataCache};

/// Organizes media files into per-title directories.
pub struct Organizer<'a> {
    config: &'a Config,
    resolver: Resolver,
    history: History,
    reporter: Reporter,
}

/// Bookkeeping shared by all videos of one pass.
#[derive(Default)]
struct RunState {
    /// Source paths transferred in this pass.
    claimed: HashSet<PathBuf>,
    /// Destination names written in this pass.
    written: Vec<String>,
}

impl<'a> Organizer<'a> {
    #[must_use]
    pub const fn new(config: &'a Config, resolver: Resolver, history: History, reporter: Reporter) -> Self {
        Self {
            config,
            resolver,
            history,
            reporter,
        }
    }

    /// Create an organizer with the providers and stores given by the config.
    ///
    /// In preview mode the metadata cache is read but never written.
    ///
    /// # Errors
    /// Returns an error if the providers cannot be created or the stores cannot be read.
    pub fn from_config(config: &'a Config, reporter: Reporter) -> Result<Self> {
        let providers = providers_from_config(config)?;
        let cache = MetadataCache::open(JsonStore::file(config.cache_path())).context("Failed to load metadata cache")?;
        let history = History::open(JsonStore::file(config.history_path())).context("Failed to load history")?;

        let mut resolver = Resolver::new(providers, cache, config.year_policy);
        if config.dryrun {
            resolver.detach_cache();
        }
        Ok(Self::new(config, resolver, history, reporter))
    }

    /// Process a directory and write the run start and final statistics to the reporter.
    ///
    /// # Errors
    /// Returns an error if the source directory cannot be scanned.
    pub fn run(&mut self, source: &Path, destination: &Path) -> Result<Vec<String>> {
        let start = Instant::now();
        self.reporter.log_init(self.config, source, destination);
        let written = self.process_directory(source, destination);
        self.reporter.finish(start.elapsed(), self.config.dryrun);
        written
    }

    /// Organize all videos under `source` and their companions into `destination`.
    ///
    /// Returns the destination file names written, or that would be written in preview mode.
    /// Failures of single files are reported and do not stop the run.
    ///
    /// Relative paths are made absolute against the current working directory.
    ///
    /// # Errors
    /// Returns an error if the source directory cannot be scanned.
    pub fn process_directory(&mut self, source: &Path, destination: &Path) -> Result<Vec<String>> {
        // History entries are absolute source paths
        let source = crate::absolute_path(source)?;
        let destination = crate::absolute_path(destination)?;
        let files = scan_directory(&source, &destination)?;
        let mut state = RunState::default();
        for video in video_files(&files, self.config) {
            self.process_video(video, &files, &destination, &mut state);
        }
        Ok(state.written)
    }

    fn process_video(&mut self, video: &FileRecord, files: &[FileRecord], destination: &Path, state: &mut RunState) {
        if state.claimed.contains(&video.full_path) || self.history.contains(&video.path_string()) {
            self.reporter.report(Decision::AlreadyProcessed {
                source: video.full_path.clone(),
            });
            return;
        }

        let resolution = match self.resolver.resolve(&video.stem) {
            Ok(resolution) => resolution,
            Err(error) => {
                self.reporter.report(Decision::CacheFailed {
                    stem: video.stem.clone(),
                    error: format!("{error:#}"),
                });
                return;
            }
        };
        for (provider, error) in resolution.provider_errors {
            self.reporter.report(Decision::LookupFailed {
                stem: video.stem.clone(),
                provider,
                error: format!("{error:#}"),
            });
        }
        let Some(record) = resolution.record else {
            self.reporter.report(Decision::NoMetadata {
                stem: video.stem.clone(),
            });
            return;
        };
        self.reporter.report(Decision::MetadataResolved {
            stem: video.stem.clone(),
            record: record.clone(),
            cached: resolution.cached,
        });

        let dir_name = dir_name_for(&record);
        let target_dir = destination.join(&dir_name);
        let video_base = build_video_base(&dir_name, extract_resolution(&video.name).as_deref());
        let video_name = build_video_name(&video_base, &video.extension);

        if !self.config.dryrun
            && let Err(error) = fs::create_dir_all(&target_dir)
        {
            self.reporter.report(Decision::TransferFailed {
                source: video.full_path.clone(),
                destination: video_name,
                error: format!("Failed to create directory {}: {error}", target_dir.display()),
            });
            return;
        }

        if !self.transfer(FileKind::Video, video, &target_dir, &video_name, state) {
            return;
        }

        let mut destination_group = HashSet::from([video_name]);
        for companion in find_companions(files, video, &self.history, &state.claimed) {
            let companion_name = build_companion_name(&companion.name, &video_base);
            if destination_group.contains(&companion_name) {
                self.reporter.report(Decision::DuplicateIgnored {
                    source: companion.full_path.clone(),
                    destination: companion_name,
                });
                continue;
            }
            if self.transfer(FileKind::Companion, companion, &target_dir, &companion_name, state) {
                destination_group.insert(companion_name);
            }
        }
    }

    /// Transfer one file and record it in history.
    /// Returns true if the file was transferred, or would be in preview mode.
    fn transfer(
        &mut self,
        kind: FileKind,
        file: &FileRecord,
        target_dir: &Path,
        name: &str,
        state: &mut RunState,
    ) -> bool {
        let target = target_dir.join(name);
        if target.exists() && target != file.full_path {
            self.reporter.report(Decision::ExistingReplaced {
                destination: target.clone(),
            });
        }

        if !self.config.dryrun
            && let Err(error) = transfer_file(self.config.action, &file.full_path, &target)
        {
            self.reporter.report(Decision::TransferFailed {
                source: file.full_path.clone(),
                destination: name.to_string(),
                error: format!("{error:#}"),
            });
            return false;
        }

        self.reporter.report(Decision::Transferred {
            kind,
            action: self.config.action,
            source: file.full_path.clone(),
            destination: name.to_string(),
        });

        if !self.config.dryrun
            && let Err(error) = self.history.record(&file.path_string())
        {
            self.reporter.report(Decision::HistoryFailed {
                source: file.full_path.clone(),
                error: format!("{error:#}"),
            });
        }

        state.claimed.insert(file.full_path.clone());
        state.written.push(name.to_string());
        true
    }

    #[must_use]
    pub const fn reporter(&self) -> &Reporter {
        &self.reporter
    }

    #[must_use]
    pub const fn history(&self) -> &History {
        &self.history
    }
}

/// Move or copy a single file to the target path.
fn transfer_file(action: TransferAction, source: &Path, target: &Path) -> Result<()> {
    if source == target {
        return Ok(());
    }
    match action {
        TransferAction::Move => move_file(source, target),
        TransferAction::Copy => copy_file(source, target),
    }
}

/// Rename the file, falling back to copy and delete when the target is on another filesystem.
fn move_file(source: &Path, target: &Path) -> Result<()> {
    match fs::rename(source, target) {
        Ok(()) => Ok(()),
        Err(error) if error.kind() == io::ErrorKind::CrossesDevices => {
            copy_file(source, target)?;
            fs::remove_file(source).with_context(|| format!("Failed to remove {}", source.display()))
        }
        Err(error) => Err(error).with_context(|| format!("Failed to move {}", source.display())),
    }
}

/// Copy the file contents and permissions, then restore the modification time.
fn copy_file(source: &Path, target: &Path) -> Result<()> {
    fs::copy(source, target).with_context(|| format!("Failed to copy {}", source.display()))?;
    let modified = fs::metadata(source)
        .and_then(|metadata| metadata.modified())
        .with_context(|| format!("Failed to read modification time: {}", source.display()))?;
    File::options()
        .write(true)
        .open(target)
        .and_then(|file| file.set_modified(modified))
        .with_context(|| format!("Failed to set modification time: {}", target.display()))
}
