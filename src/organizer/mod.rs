//! Media organizer.
//!
//! Sorts video files and their companion files (subtitles, artwork, notes)
//! into per-title directories named from external metadata:
//!
//! ```text
//! {output}/{title}_[{source}id-{id}]_({year})/{title}_[{source}id-{id}]_({year})_[{RES}].{ext}
//! ```
//!
//! Metadata lookups are cached per filename stem and transferred source paths are
//! recorded in a history file, so repeated runs never redo finished work.

mod config;
mod key;
mod metadata;
mod naming;
mod organize;
mod provider;
mod report;
mod resolver;
mod scan;
mod store;

pub use config::{
    CACHE_FILENAME, Config, ConfigOverrides, HISTORY_FILENAME, LOG_FILENAME, MediaSortConfig, TransferAction,
    YearPolicy,
};
pub use key::{RESOLUTION_PATTERNS, TitleKey, extract_key, extract_resolution, extract_year, normalize_name};
pub use metadata::{MetadataId, MetadataRecord, MetadataSource};
pub use naming::{build_companion_name, build_dir_name, build_video_base, build_video_name, dir_name_for};
pub use organize::Organizer;
pub use provider::{MetadataProvider, OmdbProvider, TmdbProvider, providers_from_config};
pub use report::{Decision, FileKind, Level, Reporter, RunLog, RunStats};
pub use resolver::{Resolution, Resolver};
pub use scan::{FileRecord, find_companions, scan_directory, video_files};
pub use store::{History, JsonStore, MetadataCache};
