//! Decision reporting for organize runs.
//!
//! Every decision is printed to the console, appended to the run log file
//! and kept in memory so callers can inspect what happened.

use std::fmt;
use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Local;
use colored::Colorize;

use crate::organizer::config::{Config, TransferAction};
use crate::organizer::metadata::{MetadataRecord, MetadataSource};
use crate::{path_to_filename_string, print_error, print_warning};

/// What role a transferred file plays.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    Video,
    Companion,
}

/// Log level of a decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Level {
    Debug,
    Info,
    Warn,
    Error,
}

/// One reported decision of an organize run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// Source path was already transferred in an earlier run or claimed earlier in this one.
    AlreadyProcessed { source: PathBuf },
    /// Metadata was resolved for a filename stem.
    MetadataResolved {
        stem: String,
        record: MetadataRecord,
        cached: bool,
    },
    /// A provider request failed; the next provider is tried.
    LookupFailed {
        stem: String,
        provider: MetadataSource,
        error: String,
    },
    /// No provider knew the title. The video stays eligible for a later run.
    NoMetadata { stem: String },
    /// The metadata cache could not be written.
    CacheFailed { stem: String, error: String },
    /// A file was transferred, or would be in preview mode.
    Transferred {
        kind: FileKind,
        action: TransferAction,
        source: PathBuf,
        destination: String,
    },
    /// A companion would collide with a name already used in the same target directory.
    DuplicateIgnored { source: PathBuf, destination: String },
    /// The destination already exists on disk from an earlier run and will be replaced.
    ExistingReplaced { destination: PathBuf },
    /// A transfer failed. The file stays eligible for a later run.
    TransferFailed {
        source: PathBuf,
        destination: String,
        error: String,
    },
    /// The history ledger could not be written after a successful transfer.
    HistoryFailed { source: PathBuf, error: String },
}

/// Counters for one organize run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RunStats {
    pub(crate) videos_transferred: usize,
    pub(crate) companions_transferred: usize,
    pub(crate) skipped_processed: usize,
    pub(crate) skipped_no_metadata: usize,
    pub(crate) duplicates_ignored: usize,
    pub(crate) failed: usize,
    pub(crate) lookups: usize,
    pub(crate) cache_hits: usize,
}

/// Buffered, timestamped run log.
pub struct RunLog {
    writer: BufWriter<File>,
}

/// Collects decisions and forwards them to the console and the run log.
pub struct Reporter {
    decisions: Vec<Decision>,
    stats: RunStats,
    log: Option<RunLog>,
    console: bool,
    verbose: bool,
}

impl Decision {
    #[must_use]
    pub const fn level(&self) -> Level {
        match self {
            Self::AlreadyProcessed { .. } => Level::Debug,
            Self::MetadataResolved { .. } | Self::Transferred { .. } => Level::Info,
            Self::LookupFailed { .. }
            | Self::NoMetadata { .. }
            | Self::DuplicateIgnored { .. }
            | Self::ExistingReplaced { .. } => Level::Warn,
            Self::CacheFailed { .. } | Self::TransferFailed { .. } | Self::HistoryFailed { .. } => Level::Error,
        }
    }

    /// Print a human-readable line for this decision.
    fn print(&self, verbose: bool) {
        match self {
            Self::AlreadyProcessed { source } => {
                if verbose {
                    println!("{}", format!("Already processed: {}", source.display()).dimmed());
                }
            }
            Self::MetadataResolved { stem, record, cached } => {
                if verbose {
                    let origin = if *cached { "cache" } else { "lookup" };
                    println!("{stem} -> {} ({origin})", record.to_string().cyan());
                }
            }
            Self::LookupFailed { stem, provider, error } => {
                print_warning!("{provider} lookup failed for {stem}: {error}");
            }
            Self::NoMetadata { stem } => print_warning!("No metadata found: {stem}"),
            Self::CacheFailed { stem, error } => print_error!("Failed to cache metadata for {stem}: {error}"),
            Self::Transferred {
                kind,
                action,
                source,
                destination,
            } => {
                let name = path_to_filename_string(source);
                match kind {
                    FileKind::Video => {
                        println!("{} {name} -> {}", format!("{}:", capitalize(*action)).bold(), destination.green());
                    }
                    FileKind::Companion => println!("  Extra: {name} -> {}", destination.green()),
                }
            }
            Self::DuplicateIgnored { source, destination } => {
                print_warning!(
                    "  Ignoring duplicate extra: {} -> {destination}",
                    path_to_filename_string(source)
                );
            }
            Self::ExistingReplaced { destination } => {
                print_warning!("  Replacing existing file: {}", destination.display());
            }
            Self::TransferFailed {
                source,
                destination,
                error,
            } => {
                print_error!("Failed to transfer {} -> {destination}: {error}", source.display());
            }
            Self::HistoryFailed { source, error } => {
                print_error!("Failed to record history for {}: {error}", source.display());
            }
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Debug => write!(f, "DEBUG"),
            Self::Info => write!(f, "INFO "),
            Self::Warn => write!(f, "WARN "),
            Self::Error => write!(f, "ERROR"),
        }
    }
}

impl fmt::Display for FileKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Video => write!(f, "video"),
            Self::Companion => write!(f, "companion"),
        }
    }
}

/// Structured `EVENT key="value"` form used in the run log.
impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AlreadyProcessed { source } => write!(f, "SKIP_PROCESSED source={:?}", source.display().to_string()),
            Self::MetadataResolved { stem, record, cached } => write!(
                f,
                "RESOLVED stem={stem:?} source=\"{}\" id=\"{}\" title={:?} year={:?} cached={cached}",
                record.source,
                record.id,
                record.title,
                record.year.as_deref().unwrap_or_default()
            ),
            Self::LookupFailed { stem, provider, error } => {
                write!(f, "LOOKUP_FAILED stem={stem:?} provider=\"{provider}\" error={error:?}")
            }
            Self::NoMetadata { stem } => write!(f, "SKIP_NO_METADATA stem={stem:?}"),
            Self::CacheFailed { stem, error } => write!(f, "CACHE_FAILED stem={stem:?} error={error:?}"),
            Self::Transferred {
                kind,
                action,
                source,
                destination,
            } => write!(
                f,
                "TRANSFER kind=\"{kind}\" action=\"{action}\" source={:?} destination={destination:?}",
                source.display().to_string()
            ),
            Self::DuplicateIgnored { source, destination } => write!(
                f,
                "IGNORED_DUPLICATE source={:?} destination={destination:?}",
                source.display().to_string()
            ),
            Self::ExistingReplaced { destination } => {
                write!(f, "REPLACE_EXISTING destination={:?}", destination.display().to_string())
            }
            Self::TransferFailed {
                source,
                destination,
                error,
            } => write!(
                f,
                "TRANSFER_FAILED source={:?} destination={destination:?} error={error:?}",
                source.display().to_string()
            ),
            Self::HistoryFailed { source, error } => write!(
                f,
                "HISTORY_FAILED source={:?} error={error:?}",
                source.display().to_string()
            ),
        }
    }
}

impl RunStats {
    fn add(&mut self, decision: &Decision) {
        match decision {
            Decision::AlreadyProcessed { .. } => self.skipped_processed += 1,
            Decision::MetadataResolved { cached, .. } => {
                if *cached {
                    self.cache_hits += 1;
                } else {
                    self.lookups += 1;
                }
            }
            Decision::NoMetadata { .. } => self.skipped_no_metadata += 1,
            Decision::Transferred { kind, .. } => match kind {
                FileKind::Video => self.videos_transferred += 1,
                FileKind::Companion => self.companions_transferred += 1,
            },
            Decision::DuplicateIgnored { .. } => self.duplicates_ignored += 1,
            Decision::TransferFailed { .. } | Decision::CacheFailed { .. } => self.failed += 1,
            Decision::LookupFailed { .. } | Decision::ExistingReplaced { .. } | Decision::HistoryFailed { .. } => {}
        }
    }

    /// Number of files transferred, or that would be in preview mode.
    #[must_use]
    pub const fn processed(&self) -> usize {
        self.videos_transferred + self.companions_transferred
    }

    #[must_use]
    pub const fn failed(&self) -> usize {
        self.failed
    }

    /// Print the terminal summary.
    pub fn print_summary(&self, duration: Duration, dryrun: bool) {
        let processed = format!("{} file(s)", self.processed());
        if dryrun {
            println!("{}", format!("Dry run finished: would process {processed}").bold());
        } else {
            println!("{}", format!("Finished: processed {processed}").bold());
        }
        println!("  Videos:      {}", self.videos_transferred);
        println!("  Extras:      {}", self.companions_transferred);
        if self.skipped_processed > 0 {
            println!("  Already done: {}", self.skipped_processed);
        }
        if self.skipped_no_metadata > 0 {
            println!("  {}", format!("No metadata:  {}", self.skipped_no_metadata).yellow());
        }
        if self.duplicates_ignored > 0 {
            println!("  {}", format!("Duplicates:   {}", self.duplicates_ignored).yellow());
        }
        if self.failed > 0 {
            println!("  {}", format!("Failed:       {}", self.failed).red());
        }
        println!("  Time:        {}", crate::format_duration(duration));
    }
}

impl RunLog {
    /// Open the run log for appending, creating the parent directory if needed.
    ///
    /// # Errors
    /// Returns an error if the log file cannot be opened.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).context("Failed to create log directory")?;
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("Failed to open log file: {}", path.display()))?;

        Ok(Self {
            writer: BufWriter::new(file),
        })
    }

    fn timestamp() -> String {
        Local::now().format("%Y-%m-%d %H:%M:%S").to_string()
    }

    /// Log the start of a run with the effective configuration.
    pub fn log_init(&mut self, config: &Config, source: &Path, destination: &Path) {
        let _ = writeln!(
            self.writer,
            "[{}] INIT  source={:?} destination={:?}",
            Self::timestamp(),
            source.display().to_string(),
            destination.display().to_string()
        );
        let _ = writeln!(self.writer, "  action: {}", config.action);
        let _ = writeln!(self.writer, "  dryrun: {}", config.dryrun);
        let _ = writeln!(self.writer, "  year_policy: {}", config.year_policy);
        let _ = writeln!(self.writer, "  video_extensions: {:?}", config.video_extensions);
        let _ = self.writer.flush();
    }

    /// Log a single decision.
    pub fn log_decision(&mut self, decision: &Decision) {
        let _ = writeln!(self.writer, "[{}] {} {decision}", Self::timestamp(), decision.level());
        let _ = self.writer.flush();
    }

    /// Log final statistics.
    pub fn log_stats(&mut self, stats: &RunStats, duration: Duration) {
        let _ = writeln!(self.writer, "[{}] STATISTICS", Self::timestamp());
        let _ = writeln!(self.writer, "  Files processed:     {}", stats.processed());
        let _ = writeln!(self.writer, "    - Videos:          {}", stats.videos_transferred);
        let _ = writeln!(self.writer, "    - Extras:          {}", stats.companions_transferred);
        let _ = writeln!(self.writer, "  Already processed:   {}", stats.skipped_processed);
        let _ = writeln!(self.writer, "  No metadata:         {}", stats.skipped_no_metadata);
        let _ = writeln!(self.writer, "  Duplicates ignored:  {}", stats.duplicates_ignored);
        let _ = writeln!(self.writer, "  Failed:              {}", stats.failed);
        let _ = writeln!(self.writer, "  Lookups:             {}", stats.lookups);
        let _ = writeln!(self.writer, "  Cache hits:          {}", stats.cache_hits);
        let _ = writeln!(self.writer, "  Total time: {}", crate::format_duration(duration));
        let _ = writeln!(self.writer, "[{}] END", Self::timestamp());
        let _ = self.writer.flush();
    }
}

impl Reporter {
    /// Reporter that prints to the console.
    #[must_use]
    pub fn new(verbose: bool) -> Self {
        Self {
            decisions: Vec::new(),
            stats: RunStats::default(),
            log: None,
            console: true,
            verbose,
        }
    }

    /// Reporter that only collects decisions.
    #[must_use]
    pub fn silent() -> Self {
        Self {
            console: false,
            ..Self::new(false)
        }
    }

    /// Also append decisions to the given run log.
    #[must_use]
    pub fn with_log(mut self, log: RunLog) -> Self {
        self.log = Some(log);
        self
    }

    pub fn report(&mut self, decision: Decision) {
        if self.console {
            decision.print(self.verbose);
        }
        if let Some(log) = self.log.as_mut() {
            log.log_decision(&decision);
        }
        self.stats.add(&decision);
        self.decisions.push(decision);
    }

    pub fn log_init(&mut self, config: &Config, source: &Path, destination: &Path) {
        if let Some(log) = self.log.as_mut() {
            log.log_init(config, source, destination);
        }
    }

    /// Write the final statistics to the run log and, unless silent, the console.
    pub fn finish(&mut self, duration: Duration, dryrun: bool) {
        if self.console {
            self.stats.print_summary(duration, dryrun);
        }
        if let Some(log) = self.log.as_mut() {
            log.log_stats(&self.stats, duration);
        }
    }

    #[must_use]
    pub fn decisions(&self) -> &[Decision] {
        &self.decisions
    }

    #[must_use]
    pub const fn stats(&self) -> &RunStats {
        &self.stats
    }
}

const fn capitalize(action: TransferAction) -> &'static str {
    match action {
        TransferAction::Move => "Move",
        TransferAction::Copy => "Copy",
    }
}

#[cfg(test)]
mod report_tests {
    use super::*;

    use tempfile::tempdir;

    use crate::organizer::metadata::MetadataSource;

    fn transferred(kind: FileKind) -> Decision {
        Decision::Transferred {
            kind,
            action: TransferAction::Move,
            source: PathBuf::from("/media/Movie.2020.mkv"),
            destination: "Movie_[tmdbid-1]_(2020).mkv".to_string(),
        }
    }

    #[test]
    fn stats_count_decisions() {
        let mut reporter = Reporter::silent();
        reporter.report(transferred(FileKind::Video));
        reporter.report(transferred(FileKind::Companion));
        reporter.report(Decision::DuplicateIgnored {
            source: PathBuf::from("/media/Movie.srt"),
            destination: "Movie.srt".to_string(),
        });
        reporter.report(Decision::NoMetadata {
            stem: "Unknown".to_string(),
        });

        let stats = reporter.stats();
        assert_eq!(stats.processed(), 2);
        assert_eq!(stats.duplicates_ignored, 1);
        assert_eq!(stats.skipped_no_metadata, 1);
        assert_eq!(stats.failed(), 0);
        assert_eq!(reporter.decisions().len(), 4);
    }

    #[test]
    fn display_is_structured() {
        let line = transferred(FileKind::Video).to_string();
        assert_eq!(
            line,
            r#"TRANSFER kind="video" action="move" source="/media/Movie.2020.mkv" destination="Movie_[tmdbid-1]_(2020).mkv""#
        );

        let lookup = Decision::LookupFailed {
            stem: "Movie".to_string(),
            provider: MetadataSource::Tmdb,
            error: "timeout".to_string(),
        };
        assert_eq!(lookup.to_string(), r#"LOOKUP_FAILED stem="Movie" provider="tmdb" error="timeout""#);
        assert_eq!(lookup.level(), Level::Warn);
    }

    #[test]
    fn run_log_appends_lines() {
        let dir = tempdir().expect("should create temp dir");
        let path = dir.path().join("logs").join("run.log");
        let mut reporter = Reporter::silent().with_log(RunLog::open(&path).expect("should open log"));
        reporter.report(transferred(FileKind::Video));
        reporter.finish(Duration::from_secs(1), false);

        let content = fs::read_to_string(&path).expect("should read log");
        assert!(content.contains("INFO  TRANSFER kind=\"video\""));
        assert!(content.contains("STATISTICS"));
        assert!(content.contains("Files processed:     1"));
    }
}
