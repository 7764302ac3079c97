// Folder name parsing: titles, years, and season/episode numbers

use regex::Regex;
use std::sync::LazyLock;

static RE_QUALITY_TAGS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(1080p|720p|4k|2160p|web-dl|webrip|bluray|dvdrip|brrip|x264|x265|h264|h265)\b")
        .unwrap()
});
static RE_BRACKETED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[\[({].*?[\])}]").unwrap());
static RE_YEAR: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\b([0-9]{4})\b").unwrap());
static RE_SEPARATORS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[._-]+").unwrap());
static RE_SPACE_COLLAPSE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());
// A marker must not follow a letter, so "Extras" or "Se7en" never match
static RE_SEASON: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(?:^|[^a-z])s(?:eason)?\s*[-_]?([0-9]+)").unwrap());
static RE_EPISODE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(?:^|[^a-z])e(?:pisode)?\s*[-_]?([0-9]+)").unwrap());

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedTitle {
    pub title: String,
    pub year: Option<i32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EpisodeNumbers {
    pub season: Option<u32>,
    pub episode: Option<u32>,
}

impl EpisodeNumbers {
    /// Both numbers, or None when either marker is missing
    pub fn both(&self) -> Option<(u32, u32)> {
        Some((self.season?, self.episode?))
    }
}

/// Extract a clean title and release year from a folder name
/// e.g., "The.Matrix.1999.1080p.BluRay.x264" -> ("The Matrix", Some(1999))
pub fn extract_title_and_year(folder_name: &str) -> ParsedTitle {
    let name = RE_QUALITY_TAGS.replace_all(folder_name, "");
    let name = RE_BRACKETED.replace_all(&name, "");
    let name = name.trim();

    let (remaining, year) = match RE_YEAR.captures(name) {
        Some(caps) => {
            let token = caps.get(0).map(|m| m.range()).unwrap_or_default();
            let year = caps.get(1).and_then(|m| m.as_str().parse().ok());
            let mut remaining = String::with_capacity(name.len());
            remaining.push_str(&name[..token.start]);
            remaining.push_str(&name[token.end..]);
            (remaining, year)
        }
        None => (name.to_string(), None),
    };

    let title = RE_SEPARATORS.replace_all(remaining.trim(), " ");
    let title = RE_SPACE_COLLAPSE.replace_all(&title, " ");

    ParsedTitle {
        title: capitalize_words(title.trim()),
        year,
    }
}

fn capitalize_words(text: &str) -> String {
    text.split(' ')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Parse season and episode numbers from a relative path
/// e.g., "Breaking Bad/Season 02/Episode 05" -> (Some(2), Some(5))
pub fn parse_episode_path(fragment: &str) -> EpisodeNumbers {
    let number = |re: &Regex| {
        re.captures(fragment)
            .and_then(|caps| caps.get(1))
            .and_then(|m| m.as_str().parse().ok())
    };

    EpisodeNumbers {
        season: number(&RE_SEASON),
        episode: number(&RE_EPISODE),
    }
}
