//! mediasort - Organize video files into per-title directories.
//!
//! Looks up each video on TMDB or OMDb, moves or copies it into
//! `{title}_[{source}id-{id}]_({year})` together with its subtitles and other extras,
//! and records what was done so later runs skip it.

use std::path::PathBuf;

use anyhow::Result;
use clap::{CommandFactory, Parser};
use clap_complete::Shell;

use media_sort::organizer::{
    Config, ConfigOverrides, MediaSortConfig, Organizer, Reporter, RunLog, TransferAction, YearPolicy,
};

#[derive(Parser)]
#[command(
    author,
    version,
    name = env!("CARGO_BIN_NAME"),
    about = "Organize video files and their extras into per-title directories"
)]
pub(crate) struct MediaSortArgs {
    /// Optional input directory with media files
    #[arg(value_hint = clap::ValueHint::DirPath, env = "MEDIA_DIRECTORY")]
    path: Option<PathBuf>,

    /// Output directory. Defaults to the input directory
    #[arg(short, long, name = "OUTPUT", value_hint = clap::ValueHint::DirPath, env = "OUTPUT_DIRECTORY")]
    output: Option<PathBuf>,

    /// Directory for the metadata cache, history and log
    #[arg(short, long, name = "DIR", value_hint = clap::ValueHint::DirPath, env = "DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// TMDB API key
    #[arg(long, name = "TMDB_KEY", env = "TMDB_API_KEY", hide_env_values = true)]
    tmdb_key: Option<String>,

    /// OMDb API key
    #[arg(long, name = "OMDB_KEY", env = "OMDB_API_KEY", hide_env_values = true)]
    omdb_key: Option<String>,

    /// Transfer action
    #[arg(short, long, value_enum)]
    action: Option<TransferAction>,

    /// Only print what would be done without moving or copying files
    #[arg(short, long)]
    print: bool,

    /// Which year to use in directory names
    #[arg(short, long, value_enum)]
    year_policy: Option<YearPolicy>,

    /// Timeout for metadata requests in seconds
    #[arg(short, long, name = "SECONDS")]
    timeout: Option<u64>,

    /// Video file extensions to organize
    #[arg(short, long = "extension", name = "EXT", value_delimiter = ',')]
    extensions: Vec<String>,

    /// Generate shell completion
    #[arg(short = 'l', long, name = "SHELL")]
    completion: Option<Shell>,

    /// Print verbose output
    #[arg(short, long)]
    verbose: bool,
}

impl MediaSortArgs {
    fn into_overrides(self) -> ConfigOverrides {
        ConfigOverrides {
            tmdb_api_key: self.tmdb_key,
            omdb_api_key: self.omdb_key,
            media_directory: self.path,
            output_directory: self.output,
            data_dir: self.data_dir,
            action: self.action,
            dryrun: self.print,
            video_extensions: self.extensions,
            request_timeout_secs: self.timeout,
            year_policy: self.year_policy,
            verbose: self.verbose,
            ..ConfigOverrides::default()
        }
    }
}

fn main() -> Result<()> {
    let args = MediaSortArgs::parse();
    if let Some(ref shell) = args.completion {
        media_sort::generate_shell_completion(*shell, MediaSortArgs::command(), true, env!("CARGO_BIN_NAME"))
    } else {
        run(args)
    }
}

fn run(args: MediaSortArgs) -> Result<()> {
    let user_config = MediaSortConfig::get_user_config()?;
    let config = Config::try_from_parts(user_config, args.into_overrides())?;
    if config.verbose {
        println!("{config}");
    }

    let reporter = Reporter::new(config.verbose).with_log(RunLog::open(&config.log_path())?);
    let mut organizer = Organizer::from_config(&config, reporter)?;
    organizer.run(&config.media_directory, &config.output_directory)?;
    Ok(())
}
