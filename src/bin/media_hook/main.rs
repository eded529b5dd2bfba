//! mediahook - HTTP trigger for organizing finished downloads.
//!
//! Listens for `POST /copy_torrent` requests from a torrent client
//! and organizes the given folder when its category is allowed.

mod server;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser};
use clap_complete::Shell;

use media_sort::organizer::{Config, ConfigOverrides, MediaSortConfig, TransferAction, YearPolicy};
use media_sort::print_warning;

use crate::server::{HookState, create_app};

#[derive(Parser)]
#[command(
    author,
    version,
    name = env!("CARGO_BIN_NAME"),
    about = "HTTP trigger that organizes finished downloads into per-title directories"
)]
pub(crate) struct MediaHookArgs {
    /// Host address to listen on
    #[arg(short = 'H', long, name = "HOST")]
    host: Option<String>,

    /// Port to listen on
    #[arg(short = 'P', long, name = "PORT", env = "SERVER_PORT")]
    port: Option<u16>,

    /// Categories to organize, others are ignored
    #[arg(short, long = "category", name = "CATEGORY", value_delimiter = ',', env = "ALLOWED_CATEGORIES")]
    categories: Vec<String>,

    /// Output directory
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
    #[arg(short, long, value_enum, env = "ACTION")]
    action: Option<TransferAction>,

    /// Only print what would be done without moving or copying files
    #[arg(short, long, env = "DRY_RUN", value_parser = clap::builder::BoolishValueParser::new())]
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

impl MediaHookArgs {
    fn into_overrides(self) -> ConfigOverrides {
        ConfigOverrides {
            tmdb_api_key: self.tmdb_key,
            omdb_api_key: self.omdb_key,
            output_directory: self.output,
            data_dir: self.data_dir,
            action: self.action,
            dryrun: self.print,
            video_extensions: self.extensions,
            request_timeout_secs: self.timeout,
            year_policy: self.year_policy,
            allowed_categories: self.categories,
            host: self.host,
            port: self.port,
            verbose: self.verbose,
            ..ConfigOverrides::default()
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = MediaHookArgs::parse();
    if let Some(ref shell) = args.completion {
        return media_sort::generate_shell_completion(*shell, MediaHookArgs::command(), true, env!("CARGO_BIN_NAME"));
    }

    let user_config = MediaSortConfig::get_user_config()?;
    let config = Config::try_from_parts(user_config, args.into_overrides())?;
    if config.verbose {
        println!("{config}");
    }
    if config.allowed_categories.is_empty() {
        print_warning!("No allowed categories configured, all requests will be ignored");
    }

    let address = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&address)
        .await
        .with_context(|| format!("Failed to bind to {address}"))?;
    println!("Listening on http://{address}");

    let app = create_app(Arc::new(HookState::new(config)));
    axum::serve(listener, app).await.context("Server error")
}
