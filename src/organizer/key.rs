use std::sync::LazyLock;

use regex::Regex;

/// Matches a release year anywhere in a name, e.g. "1999" or "2020".
static RE_YEAR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(19|20)\d{2}").expect("Failed to create regex pattern for release year"));

static RE_NON_WORD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\W").expect("Failed to compile non-word character regex"));

static RE_SPACES_AND_DOTS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[ .]+").expect("Failed to compile space and dot regex"));

static RE_UNDERSCORES: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"_+").expect("Failed to compile underscore regex"));

/// Resolution tags in priority order.
pub const RESOLUTION_PATTERNS: [&str; 4] = ["2160p", "1080p", "720p", "480p"];

/// Title information parsed from a filename stem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TitleKey {
    /// Human-readable query sent to metadata providers.
    pub search_title: String,
    /// Normalized key used for cache lookups and companion matching.
    pub grouping_key: String,
    /// First release year found in the stem.
    pub year: Option<String>,
    /// Uppercased resolution tag, e.g. "1080P".
    pub resolution: Option<String>,
}

/// Normalize a name into an underscore-separated key.
///
/// Runs of spaces and dots become a single underscore,
/// repeated underscores are collapsed and leading or trailing underscores removed.
/// Case is preserved.
///
/// ```rust
/// use media_sort::organizer::normalize_name;
///
/// assert_eq!(normalize_name("The Matrix. Reloaded"), "The_Matrix_Reloaded");
/// assert_eq!(normalize_name("__a__b__"), "a_b");
/// ```
#[must_use]
pub fn normalize_name(name: &str) -> String {
    let name = RE_SPACES_AND_DOTS.replace_all(name, "_");
    let name = RE_UNDERSCORES.replace_all(&name, "_");
    name.trim_matches('_').to_string()
}

/// Find the first release year in the given text.
#[must_use]
pub fn extract_year(text: &str) -> Option<String> {
    RE_YEAR.find(text).map(|m| m.as_str().to_string())
}

/// Find the highest priority resolution tag in the given text.
#[must_use]
pub fn extract_resolution(text: &str) -> Option<String> {
    let lower = text.to_lowercase();
    RESOLUTION_PATTERNS
        .iter()
        .find(|pattern| lower.contains(*pattern))
        .map(|pattern| pattern.to_uppercase())
}

/// Get the provider search title and the grouping key for a filename stem.
///
/// The title is cut at the release year if there is one.
#[must_use]
pub fn title_for_query_and_key(stem: &str) -> (String, String) {
    let cut = RE_YEAR.find(stem).map_or(stem, |m| &stem[..m.start()]);
    let search_title = RE_NON_WORD.replace_all(cut, " ").trim().to_string();
    let grouping_key = normalize_name(&search_title);
    (search_title, grouping_key)
}

/// Parse all title information from a filename stem.
#[must_use]
pub fn extract_key(stem: &str) -> TitleKey {
    let (search_title, grouping_key) = title_for_query_and_key(stem);
    TitleKey {
        search_title,
        grouping_key,
        year: extract_year(stem),
        resolution: extract_resolution(stem),
    }
}
