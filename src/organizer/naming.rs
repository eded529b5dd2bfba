//! Destination names for organized files.
//!
//! Pure string functions, no filesystem access.

use std::sync::LazyLock;

use regex::Regex;

use crate::organizer::key::normalize_name;
use crate::organizer::metadata::MetadataRecord;

/// Matches a two-letter language suffix like ".en".
static RE_LANGUAGE_SUFFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\.[a-zA-Z]{2}$").expect("Failed to compile language suffix regex"));

/// Descriptor used for companions without a `-` in their stem.
const DEFAULT_DESCRIPTOR: &str = "extra";

/// Directory name for a title: `{title}_[{source}id-{id}]` with `_({year})` when the year is known.
#[must_use]
pub fn build_dir_name(title: &str, source_tag: &str, year: Option<&str>) -> String {
    year.map_or_else(
        || format!("{title}_{source_tag}"),
        |year| format!("{title}_{source_tag}_({year})"),
    )
}

/// Directory name for a resolved metadata record.
#[must_use]
pub fn dir_name_for(record: &MetadataRecord) -> String {
    build_dir_name(&record.title, &record.source_tag(), record.year.as_deref())
}

/// Base name for the video file: the directory name with `_[{RESOLUTION}]` when known.
#[must_use]
pub fn build_video_base(dir_name: &str, resolution: Option<&str>) -> String {
    resolution.map_or_else(
        || dir_name.to_string(),
        |resolution| format!("{dir_name}_[{}]", resolution.to_uppercase()),
    )
}

/// Video destination filename with the extension lowercased.
#[must_use]
pub fn build_video_name(video_base: &str, extension: &str) -> String {
    if extension.is_empty() {
        video_base.to_string()
    } else {
        format!("{video_base}.{}", extension.to_lowercase())
    }
}

/// Destination filename for a companion of a video.
///
/// Subtitles keep a two-letter language code when present:
/// `Movie.es.srt` becomes `{video_base}.es.srt`, `Movie.srt` becomes `{video_base}.srt`.
/// Other files get the last `-` separated part of their stem as a descriptor:
/// `Movie-poster.jpg` becomes `{video_base}-poster.jpg`.
///
/// ```rust
/// use media_sort::organizer::build_companion_name;
///
/// let base = "Movie_tmdbid-1_(2020)";
/// assert_eq!(build_companion_name("Movie.es.srt", base), "Movie_tmdbid-1_(2020).es.srt");
/// assert_eq!(build_companion_name("Movie.nfo", base), "Movie_tmdbid-1_(2020)-extra.nfo");
/// ```
#[must_use]
pub fn build_companion_name(companion_name: &str, video_base: &str) -> String {
    let suffixes = file_suffixes(companion_name);
    if suffixes.concat().to_lowercase().ends_with(".srt") {
        let language = suffixes
            .len()
            .checked_sub(2)
            .map(|index| suffixes[index])
            .filter(|suffix| RE_LANGUAGE_SUFFIX.is_match(suffix));
        return language.map_or_else(
            || format!("{video_base}.srt"),
            |language| format!("{video_base}{language}.srt"),
        );
    }

    let (stem, extension) = split_extension(companion_name);
    let descriptor = stem.rsplit_once('-').map_or(DEFAULT_DESCRIPTOR, |(_, last)| last);
    format!("{video_base}-{}{extension}", normalize_name(descriptor))
}

/// All dot suffixes of a file name, e.g. `["." , ".en", ".srt"]` style parts including the dot.
///
/// Leading dots of hidden files are not suffixes and a name ending in a dot has none.
fn file_suffixes(name: &str) -> Vec<&str> {
    if name.ends_with('.') {
        return Vec::new();
    }
    let trimmed = name.trim_start_matches('.');
    trimmed
        .match_indices('.')
        .map(|(index, _)| index)
        .chain(std::iter::once(trimmed.len()))
        .collect::<Vec<_>>()
        .windows(2)
        .map(|bounds| &trimmed[bounds[0]..bounds[1]])
        .collect()
}

/// Split a file name into stem and last extension including the dot.
fn split_extension(name: &str) -> (&str, &str) {
    let leading_dots = name.len() - name.trim_start_matches('.').len();
    match name[leading_dots..].rfind('.') {
        Some(index) if leading_dots + index + 1 < name.len() => name.split_at(leading_dots + index),
        _ => (name, ""),
    }
}

#[cfg(test)]
mod naming_tests {
    use super::*;

    use crate::organizer::metadata::MetadataSource;

    #[test]
    fn dir_name_with_and_without_year() {
        assert_eq!(
            build_dir_name("The_Matrix", "[tmdbid-603]", Some("1999")),
            "The_Matrix_[tmdbid-603]_(1999)"
        );
        assert_eq!(build_dir_name("The_Matrix", "[tmdbid-603]", None), "The_Matrix_[tmdbid-603]");
    }

    #[test]
    fn dir_name_for_record() {
        let record = MetadataRecord {
            source: MetadataSource::Omdb,
            id: "tt0133093".into(),
            title: "The_Matrix".to_string(),
            year: Some("1999".to_string()),
        };
        assert_eq!(dir_name_for(&record), "The_Matrix_[omdbid-tt0133093]_(1999)");
    }

    #[test]
    fn video_base_appends_uppercase_resolution() {
        assert_eq!(build_video_base("Movie_[tmdbid-1]", Some("1080p")), "Movie_[tmdbid-1]_[1080P]");
        assert_eq!(build_video_base("Movie_[tmdbid-1]", None), "Movie_[tmdbid-1]");
    }

    #[test]
    fn video_name_lowercases_extension() {
        assert_eq!(build_video_name("Movie_[tmdbid-1]", "MKV"), "Movie_[tmdbid-1].mkv");
        assert_eq!(build_video_name("Movie_[tmdbid-1]", ""), "Movie_[tmdbid-1]");
    }

    #[test]
    fn subtitle_keeps_language_code() {
        let base = "Movie_tmdbid-1_(2020)";
        assert_eq!(build_companion_name("Movie.es.srt", base), "Movie_tmdbid-1_(2020).es.srt");
        assert_eq!(build_companion_name("Movie.srt", base), "Movie_tmdbid-1_(2020).srt");
        assert_eq!(build_companion_name("Movie.2020.EN.SRT", base), "Movie_tmdbid-1_(2020).EN.srt");
    }

    #[test]
    fn subtitle_ignores_non_language_suffix() {
        let base = "Movie_[tmdbid-1]";
        assert_eq!(build_companion_name("Movie.eng.srt", base), "Movie_[tmdbid-1].srt");
        assert_eq!(build_companion_name("Movie.2020.srt", base), "Movie_[tmdbid-1].srt");
        assert_eq!(build_companion_name("Movie.e1.srt", base), "Movie_[tmdbid-1].srt");
    }

    #[test]
    fn other_companions_use_descriptor() {
        let base = "Movie_[tmdbid-1]_(2020)";
        assert_eq!(build_companion_name("Movie-poster.jpg", base), "Movie_[tmdbid-1]_(2020)-poster.jpg");
        assert_eq!(
            build_companion_name("Movie.2020-making of.mkv", base),
            "Movie_[tmdbid-1]_(2020)-making_of.mkv"
        );
        assert_eq!(build_companion_name("Movie.2020.nfo", base), "Movie_[tmdbid-1]_(2020)-extra.nfo");
    }

    #[test]
    fn other_companions_keep_extension_case() {
        let base = "Movie_[tmdbid-1]";
        assert_eq!(build_companion_name("Movie-Fanart.JPG", base), "Movie_[tmdbid-1]-Fanart.JPG");
        assert_eq!(build_companion_name("Movie-notes", base), "Movie_[tmdbid-1]-notes");
    }

    #[test]
    fn suffixes_follow_path_semantics() {
        assert_eq!(file_suffixes("Movie.en.srt"), vec![".en", ".srt"]);
        assert_eq!(file_suffixes(".hidden"), Vec::<&str>::new());
        assert_eq!(file_suffixes(".hidden.srt"), vec![".srt"]);
        assert_eq!(file_suffixes("name."), Vec::<&str>::new());
        assert_eq!(file_suffixes("plain"), Vec::<&str>::new());
    }

    #[test]
    fn split_extension_handles_edge_cases() {
        assert_eq!(split_extension("Movie.en.srt"), ("Movie.en", ".srt"));
        assert_eq!(split_extension(".hidden"), (".hidden", ""));
        assert_eq!(split_extension("plain"), ("plain", ""));
        assert_eq!(split_extension("name."), ("name.", ""));
    }
}
