use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeSet;
use std::fmt;

/// Remote collections the scanner keeps in sync
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Collection {
    Movies,
    Series,
    Episodes,
    Ads,
}

impl Collection {
    /// Collection name in the remote store
    pub fn name(&self) -> &'static str {
        match self {
            Collection::Movies => "movies",
            Collection::Series => "series",
            Collection::Episodes => "episodes",
            Collection::Ads => "ads",
        }
    }

    /// Field used to match disk entries against remote records
    pub fn key_field(&self) -> &'static str {
        match self {
            Collection::Series => "title",
            _ => "folder_name",
        }
    }

    /// Display label used in scan logs
    pub fn label(&self) -> &'static str {
        match self {
            Collection::Movies => "Movie",
            Collection::Series => "Series",
            Collection::Episodes => "Episode",
            Collection::Ads => "Ad",
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Ascending, deduplicated set of vertical resolutions (720, 1080, ...)
pub type Resolutions = BTreeSet<u32>;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MovieEntry {
    pub folder_name: String,
    pub title: String,
    pub year_released: Option<i32>,
    pub resolutions: Resolutions,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeriesEntry {
    pub title: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EpisodeEntry {
    /// Relative "series/season/episode" path
    pub folder_name: String,
    /// Remote id of the parent series record
    pub series: String,
    pub season_number: u32,
    pub episode_number: u32,
    pub resolutions: Resolutions,
    pub title: String,
}

impl EpisodeEntry {
    pub fn default_title(season: u32, episode: u32) -> String {
        format!("Season {} Episode {}", season, episode)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AdEntry {
    pub folder_name: String,
}

/// A record as stored in a remote collection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub id: String,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl Record {
    pub fn get_str(&self, field: &str) -> Option<&str> {
        self.fields.get(field).and_then(Value::as_str)
    }
}

/// Minimal projection of a remote record used for diffing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteRecord {
    pub id: String,
    pub key: String,
}

impl RemoteRecord {
    /// Project a record onto its key field, if it has one
    pub fn from_record(record: Record, key_field: &str) -> Option<Self> {
        let key = record.get_str(key_field)?.to_string();
        Some(Self { id: record.id, key })
    }
}
