//! Configuration for media organizing runs.
//!
//! The final [`Config`] is built once at startup from the user config file
//! and command line overrides, then passed by reference to the rest of the pipeline.

use std::path::{Path, PathBuf};
use std::time::Duration;
use std::{fmt, fs};

use anyhow::{Context, Result};
use clap::ValueEnum;
use itertools::Itertools;
use serde::Deserialize;

/// Metadata cache filename inside the data directory.
pub const CACHE_FILENAME: &str = "movie_cache.json";

/// Processing history filename inside the data directory.
pub const HISTORY_FILENAME: &str = "processed_history.json";

/// Run log filename inside the data directory.
pub const LOG_FILENAME: &str = "media-sort.log";

const DEFAULT_VIDEO_EXTENSIONS: [&str; 2] = ["mp4", "mkv"];
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 15;
const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 5000;

/// How files are transferred to the output directory.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferAction {
    /// Move files, falling back to copy and delete across filesystems
    #[default]
    Move,
    /// Copy files, keeping the modification time
    Copy,
}

/// Which year ends up in a resolved metadata record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum YearPolicy {
    /// Always use the year from the filename, even when it has none
    #[default]
    Filename,
    /// Use the year from the filename, or the provider year when the filename has none
    ProviderFallback,
}

/// Config from the user config file.
#[derive(Debug, Default, Deserialize)]
pub struct MediaSortConfig {
    #[serde(default)]
    pub tmdb_api_key: Option<String>,
    #[serde(default)]
    pub omdb_api_key: Option<String>,
    #[serde(default)]
    pub media_directory: Option<PathBuf>,
    #[serde(default)]
    pub output_directory: Option<PathBuf>,
    #[serde(default)]
    pub data_dir: Option<PathBuf>,
    #[serde(default)]
    pub action: Option<TransferAction>,
    #[serde(default)]
    pub dryrun: bool,
    #[serde(default)]
    pub video_extensions: Vec<String>,
    #[serde(default)]
    pub request_timeout_secs: Option<u64>,
    #[serde(default)]
    pub year_policy: Option<YearPolicy>,
    #[serde(default)]
    pub allowed_categories: Vec<String>,
    #[serde(default)]
    pub host: Option<String>,
    #[serde(default)]
    pub port: Option<u16>,
    #[serde(default)]
    pub verbose: bool,
}

/// Wrapper needed for parsing the config section.
#[derive(Debug, Default, Deserialize)]
struct UserConfig {
    #[serde(default)]
    mediasort: MediaSortConfig,
}

/// Values given on the command line or through environment variables.
///
/// These take priority over the user config file.
#[derive(Debug, Default)]
pub struct ConfigOverrides {
    pub tmdb_api_key: Option<String>,
    pub omdb_api_key: Option<String>,
    pub media_directory: Option<PathBuf>,
    pub output_directory: Option<PathBuf>,
    pub data_dir: Option<PathBuf>,
    pub action: Option<TransferAction>,
    pub dryrun: bool,
    pub video_extensions: Vec<String>,
    pub request_timeout_secs: Option<u64>,
    pub year_policy: Option<YearPolicy>,
    pub allowed_categories: Vec<String>,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub verbose: bool,
}

/// Final config created from CLI arguments and user config file.
#[derive(Debug, Clone)]
pub struct Config {
    pub tmdb_api_key: Option<String>,
    pub omdb_api_key: Option<String>,
    /// Absolute source directory to organize.
    pub media_directory: PathBuf,
    /// Directory where the per-title directories are created.
    pub output_directory: PathBuf,
    /// Directory for the metadata cache, history and run log.
    pub data_dir: PathBuf,
    pub action: TransferAction,
    /// Preview mode: report decisions without touching the filesystem.
    pub dryrun: bool,
    /// Lowercase video extensions without the leading dot.
    pub video_extensions: Vec<String>,
    pub request_timeout: Duration,
    pub year_policy: YearPolicy,
    /// Trigger categories accepted by the hook server.
    pub allowed_categories: Vec<String>,
    pub host: String,
    pub port: u16,
    pub verbose: bool,
}

impl MediaSortConfig {
    /// Try to read user config from the file if it exists.
    /// Otherwise, fall back to default config.
    ///
    /// # Errors
    /// Returns an error if config file exists but cannot be read or parsed.
    pub fn get_user_config() -> Result<Self> {
        let Some(path) = crate::config::CONFIG_PATH.as_deref() else {
            return Ok(Self::default());
        };

        match fs::read_to_string(path) {
            Ok(content) => Self::from_toml_str(&content)
                .map_err(|e| anyhow::anyhow!("Failed to parse config file {}:\n{e}", path.display())),
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(error) => Err(anyhow::anyhow!(
                "Failed to read config file {}: {error}",
                path.display()
            )),
        }
    }

    /// Parse config from a TOML string.
    ///
    /// # Errors
    /// Returns an error if the TOML string is invalid.
    pub fn from_toml_str(toml_str: &str) -> Result<Self> {
        toml::from_str::<UserConfig>(toml_str)
            .map(|config| config.mediasort)
            .with_context(|| "Failed to parse config TOML")
    }
}

impl Config {
    /// Create config from the user config file and command line overrides.
    ///
    /// # Errors
    /// Returns an error if no metadata provider key is configured
    /// or the media directory does not exist.
    pub fn try_from_parts(user_config: MediaSortConfig, overrides: ConfigOverrides) -> Result<Self> {
        let tmdb_api_key = non_empty(overrides.tmdb_api_key).or_else(|| non_empty(user_config.tmdb_api_key));
        let omdb_api_key = non_empty(overrides.omdb_api_key).or_else(|| non_empty(user_config.omdb_api_key));
        if tmdb_api_key.is_none() && omdb_api_key.is_none() {
            anyhow::bail!("No metadata provider configured: set TMDB_API_KEY and/or OMDB_API_KEY");
        }

        let media_directory = overrides.media_directory.or(user_config.media_directory);
        let media_directory = crate::resolve_input_path(media_directory.as_deref())
            .context("Invalid media directory")?;

        let output_directory = overrides
            .output_directory
            .or(user_config.output_directory)
            .map_or_else(|| media_directory.clone(), |path| absolute_path(&path));

        let data_dir = overrides
            .data_dir
            .or(user_config.data_dir)
            .map_or_else(|| crate::config::DEFAULT_DATA_DIR.clone(), |path| absolute_path(&path));

        // CLI takes priority over the config file for list options
        let video_extensions = if overrides.video_extensions.is_empty() {
            user_config.video_extensions
        } else {
            overrides.video_extensions
        };
        let video_extensions = normalize_extensions(video_extensions);

        let allowed_categories: Vec<String> = user_config
            .allowed_categories
            .into_iter()
            .chain(overrides.allowed_categories)
            .map(|category| category.trim().to_string())
            .filter(|category| !category.is_empty())
            .unique()
            .collect();

        let request_timeout = Duration::from_secs(
            overrides
                .request_timeout_secs
                .or(user_config.request_timeout_secs)
                .unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS),
        );

        Ok(Self {
            tmdb_api_key,
            omdb_api_key,
            media_directory,
            output_directory,
            data_dir,
            action: overrides.action.or(user_config.action).unwrap_or_default(),
            dryrun: overrides.dryrun || user_config.dryrun,
            video_extensions,
            request_timeout,
            year_policy: overrides.year_policy.or(user_config.year_policy).unwrap_or_default(),
            allowed_categories,
            host: overrides
                .host
                .or(user_config.host)
                .unwrap_or_else(|| DEFAULT_HOST.to_string()),
            port: overrides.port.or(user_config.port).unwrap_or(DEFAULT_PORT),
            verbose: overrides.verbose || user_config.verbose,
        })
    }

    /// Path of the metadata cache file.
    #[must_use]
    pub fn cache_path(&self) -> PathBuf {
        self.data_dir.join(CACHE_FILENAME)
    }

    /// Path of the processing history file.
    #[must_use]
    pub fn history_path(&self) -> PathBuf {
        self.data_dir.join(HISTORY_FILENAME)
    }

    /// Path of the run log file.
    #[must_use]
    pub fn log_path(&self) -> PathBuf {
        self.data_dir.join(LOG_FILENAME)
    }

    /// Check if the given lowercase extension is a video extension.
    #[must_use]
    pub fn is_video_extension(&self, extension: &str) -> bool {
        self.video_extensions.iter().any(|ext| ext == extension)
    }

    /// Check if the hook server should process the given category.
    #[must_use]
    pub fn is_allowed_category(&self, category: &str) -> bool {
        self.allowed_categories.iter().any(|allowed| allowed == category)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            tmdb_api_key: None,
            omdb_api_key: None,
            media_directory: PathBuf::from("."),
            output_directory: PathBuf::from("."),
            data_dir: crate::config::DEFAULT_DATA_DIR.clone(),
            action: TransferAction::default(),
            dryrun: false,
            video_extensions: normalize_extensions(Vec::new()),
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            year_policy: YearPolicy::default(),
            allowed_categories: Vec::new(),
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            verbose: false,
        }
    }
}

impl fmt::Display for TransferAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Move => write!(f, "move"),
            Self::Copy => write!(f, "copy"),
        }
    }
}

impl fmt::Display for YearPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Filename => write!(f, "filename"),
            Self::ProviderFallback => write!(f, "provider_fallback"),
        }
    }
}

impl fmt::Display for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Config:")?;
        writeln!(f, "  media:      {}", self.media_directory.display())?;
        writeln!(f, "  output:     {}", self.output_directory.display())?;
        writeln!(f, "  data:       {}", self.data_dir.display())?;
        writeln!(f, "  action:     {}", self.action)?;
        writeln!(f, "  dryrun:     {}", crate::colorize_bool(self.dryrun))?;
        writeln!(f, "  tmdb:       {}", crate::colorize_bool(self.tmdb_api_key.is_some()))?;
        writeln!(f, "  omdb:       {}", crate::colorize_bool(self.omdb_api_key.is_some()))?;
        writeln!(f, "  year:       {}", self.year_policy)?;
        writeln!(f, "  timeout:    {}s", self.request_timeout.as_secs())?;
        writeln!(f, "  extensions: [{}]", self.video_extensions.join(", "))?;
        write!(f, "  verbose:    {}", crate::colorize_bool(self.verbose))
    }
}

/// Lowercase extensions without leading dots, falling back to the default video extensions.
fn normalize_extensions(extensions: Vec<String>) -> Vec<String> {
    let extensions: Vec<String> = extensions
        .into_iter()
        .map(|extension| extension.trim().trim_start_matches('.').to_lowercase())
        .filter(|extension| !extension.is_empty())
        .unique()
        .collect();

    if extensions.is_empty() {
        DEFAULT_VIDEO_EXTENSIONS.iter().map(ToString::to_string).collect()
    } else {
        extensions
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn absolute_path(path: &Path) -> PathBuf {
    crate::absolute_path(path).unwrap_or_else(|_| path.to_path_buf())
}

#[cfg(test)]
mod media_sort_config_tests {
    use super::*;

    use tempfile::tempdir;

    #[test]
    fn from_toml_str_parses_empty_config() {
        let config = MediaSortConfig::from_toml_str("").expect("should parse empty config");
        assert!(config.tmdb_api_key.is_none());
        assert!(config.omdb_api_key.is_none());
        assert!(config.action.is_none());
        assert!(!config.dryrun);
        assert!(!config.verbose);
        assert!(config.video_extensions.is_empty());
        assert!(config.allowed_categories.is_empty());
    }

    #[test]
    fn from_toml_str_parses_mediasort_section() {
        let toml = r#"
[mediasort]
tmdb_api_key = "abc"
omdb_api_key = "def"
action = "copy"
dryrun = true
year_policy = "provider_fallback"
request_timeout_secs = 5
video_extensions = ["mp4", ".AVI"]
allowed_categories = ["movies", "tv"]
port = 8000
"#;
        let config = MediaSortConfig::from_toml_str(toml).expect("should parse config");
        assert_eq!(config.tmdb_api_key.as_deref(), Some("abc"));
        assert_eq!(config.omdb_api_key.as_deref(), Some("def"));
        assert_eq!(config.action, Some(TransferAction::Copy));
        assert!(config.dryrun);
        assert_eq!(config.year_policy, Some(YearPolicy::ProviderFallback));
        assert_eq!(config.request_timeout_secs, Some(5));
        assert_eq!(config.video_extensions, vec!["mp4", ".AVI"]);
        assert_eq!(config.allowed_categories, vec!["movies", "tv"]);
        assert_eq!(config.port, Some(8000));
    }

    #[test]
    fn from_toml_str_invalid_action_returns_error() {
        let toml = r#"
[mediasort]
action = "teleport"
"#;
        assert!(MediaSortConfig::from_toml_str(toml).is_err());
    }

    #[test]
    fn from_toml_str_ignores_other_sections() {
        let toml = r"
[other_section]
some_value = true

[mediasort]
verbose = true
";
        let config = MediaSortConfig::from_toml_str(toml).expect("should parse config");
        assert!(config.verbose);
        assert!(!config.dryrun);
    }

    #[test]
    fn missing_provider_keys_is_an_error() {
        let dir = tempdir().expect("should create temp dir");
        let overrides = ConfigOverrides {
            media_directory: Some(dir.path().to_path_buf()),
            tmdb_api_key: Some("  ".to_string()),
            ..Default::default()
        };
        let result = Config::try_from_parts(MediaSortConfig::default(), overrides);
        assert!(result.is_err());
    }

    #[test]
    fn missing_media_directory_is_an_error() {
        let overrides = ConfigOverrides {
            media_directory: Some(PathBuf::from("/definitely/not/here/media")),
            tmdb_api_key: Some("key".to_string()),
            ..Default::default()
        };
        assert!(Config::try_from_parts(MediaSortConfig::default(), overrides).is_err());
    }

    #[test]
    fn overrides_take_priority_over_user_config() {
        let dir = tempdir().expect("should create temp dir");
        let user_config = MediaSortConfig {
            tmdb_api_key: Some("file-key".to_string()),
            action: Some(TransferAction::Copy),
            video_extensions: vec!["avi".to_string()],
            request_timeout_secs: Some(30),
            ..Default::default()
        };
        let overrides = ConfigOverrides {
            tmdb_api_key: Some("cli-key".to_string()),
            media_directory: Some(dir.path().to_path_buf()),
            action: Some(TransferAction::Move),
            video_extensions: vec![".MKV".to_string()],
            ..Default::default()
        };
        let config = Config::try_from_parts(user_config, overrides).expect("should create config");
        assert_eq!(config.tmdb_api_key.as_deref(), Some("cli-key"));
        assert_eq!(config.action, TransferAction::Move);
        assert_eq!(config.video_extensions, vec!["mkv"]);
        assert_eq!(config.request_timeout, Duration::from_secs(30));
        assert_eq!(config.year_policy, YearPolicy::Filename);
    }

    #[test]
    fn output_directory_defaults_to_media_directory() {
        let dir = tempdir().expect("should create temp dir");
        let overrides = ConfigOverrides {
            omdb_api_key: Some("key".to_string()),
            media_directory: Some(dir.path().to_path_buf()),
            ..Default::default()
        };
        let config = Config::try_from_parts(MediaSortConfig::default(), overrides).expect("should create config");
        assert_eq!(config.output_directory, config.media_directory);
        assert_eq!(config.video_extensions, vec!["mp4", "mkv"]);
        assert!(config.is_video_extension("mkv"));
        assert!(!config.is_video_extension("srt"));
    }

    #[test]
    fn allowed_categories_are_merged_and_deduplicated() {
        let dir = tempdir().expect("should create temp dir");
        let user_config = MediaSortConfig {
            allowed_categories: vec!["movies".to_string(), " tv ".to_string()],
            ..Default::default()
        };
        let overrides = ConfigOverrides {
            tmdb_api_key: Some("key".to_string()),
            media_directory: Some(dir.path().to_path_buf()),
            allowed_categories: vec!["movies".to_string(), String::new()],
            ..Default::default()
        };
        let config = Config::try_from_parts(user_config, overrides).expect("should create config");
        assert_eq!(config.allowed_categories, vec!["movies", "tv"]);
        assert!(config.is_allowed_category("tv"));
        assert!(!config.is_allowed_category("music"));
    }
}
