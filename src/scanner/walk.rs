// Filesystem walkers - build the on-disk inventory for each media kind
//
// Expected layout:
//   movies_root/<movie folder>/master.m3u8
//   series_root/<series title>/<season folder>/<episode folder>/master.m3u8
//   ads_root/<ad folder>/

use anyhow::{Context, Result};
use std::collections::{BTreeMap, HashMap};
use std::io;
use std::path::{Path, PathBuf};
use tokio::fs;

use super::parse::{extract_title_and_year, parse_episode_path};
use super::resolutions::detect_resolutions;
use crate::models::{AdEntry, Collection, EpisodeEntry, MovieEntry, SeriesEntry};
use crate::store::{MediaStore, StoreError};

/// File written by the packager once a transcode has finished
pub const COMPLETION_MARKER: &str = "master.m3u8";

/// Immediate subdirectories of `path` as (name, full path), sorted by name.
/// Entries whose names are not valid UTF-8 are skipped.
pub async fn list_subdirs(path: &Path) -> io::Result<Vec<(String, PathBuf)>> {
    let mut entries = fs::read_dir(path).await?;
    let mut dirs = Vec::new();

    while let Some(entry) = entries.next_entry().await? {
        let entry_path = entry.path();
        let is_dir = fs::metadata(&entry_path)
            .await
            .map(|m| m.is_dir())
            .unwrap_or(false);
        if !is_dir {
            continue;
        }

        match entry.file_name().into_string() {
            Ok(name) => dirs.push((name, entry_path)),
            Err(name) => tracing::debug!("Skipping non UTF-8 folder name: {:?}", name),
        }
    }

    dirs.sort_by(|a, b| a.0.cmp(&b.0));
    Ok(dirs)
}

async fn has_completion_marker(dir: &Path) -> bool {
    fs::metadata(dir.join(COMPLETION_MARKER))
        .await
        .map(|m| m.is_file())
        .unwrap_or(false)
}

/// Walk the movies root. Folders without a completion marker are still being
/// transcoded and are left out.
pub async fn walk_movies(root: &Path) -> io::Result<BTreeMap<String, MovieEntry>> {
    let mut movies = BTreeMap::new();

    for (folder_name, path) in list_subdirs(root).await? {
        if !has_completion_marker(&path).await {
            tracing::debug!("Skipping incomplete movie folder: {}", folder_name);
            continue;
        }

        let parsed = extract_title_and_year(&folder_name);
        let resolutions = detect_resolutions(&path).await;

        movies.insert(
            folder_name.clone(),
            MovieEntry {
                folder_name,
                title: parsed.title,
                year_released: parsed.year,
                resolutions,
            },
        );
    }

    Ok(movies)
}

/// Walk the ads root. Ads are not packaged like movies, so every folder counts.
pub async fn walk_ads(root: &Path) -> io::Result<BTreeMap<String, AdEntry>> {
    Ok(list_subdirs(root)
        .await?
        .into_iter()
        .map(|(folder_name, _)| (folder_name.clone(), AdEntry { folder_name }))
        .collect())
}

/// Resolves series titles to remote record ids, creating missing series.
/// The cache lives for a single scan pass.
pub struct SeriesResolver<'a> {
    store: &'a dyn MediaStore,
    cache: HashMap<String, String>,
    created: usize,
}

impl<'a> SeriesResolver<'a> {
    pub fn new(store: &'a dyn MediaStore) -> Self {
        Self {
            store,
            cache: HashMap::new(),
            created: 0,
        }
    }

    /// Get or create the series record for `title`, returning its id
    pub async fn resolve(&mut self, title: &str) -> Result<String, StoreError> {
        if let Some(id) = self.cache.get(title) {
            return Ok(id.clone());
        }

        let collection = Collection::Series;
        let id = match self
            .store
            .find_first(collection, collection.key_field(), title)
            .await?
        {
            Some(record) => record.id,
            None => {
                tracing::info!("[Series] CREATING: {}", title);
                let payload = serde_json::to_value(SeriesEntry {
                    title: title.to_string(),
                })?;
                let record = self.store.create(collection, payload).await?;
                self.created += 1;
                record.id
            }
        };

        self.cache.insert(title.to_string(), id.clone());
        Ok(id)
    }

    pub fn series_created(&self) -> usize {
        self.created
    }
}

#[derive(Debug, Default)]
pub struct EpisodeInventory {
    pub episodes: BTreeMap<String, EpisodeEntry>,
    pub series_seen: usize,
    pub series_created: usize,
}

/// Walk the series root, resolving each series record before its episodes.
///
/// Any listing or store failure aborts the walk: a partial episode inventory
/// would make the reconciler delete the episodes it could not see.
pub async fn walk_series(root: &Path, store: &dyn MediaStore) -> Result<EpisodeInventory> {
    let mut inventory = EpisodeInventory::default();
    let mut resolver = SeriesResolver::new(store);

    let series_folders = list_subdirs(root)
        .await
        .with_context(|| format!("Failed to list series root {}", root.display()))?;

    for (series_title, series_path) in series_folders {
        let series_id = resolver
            .resolve(&series_title)
            .await
            .with_context(|| format!("Failed to resolve series '{}'", series_title))?;
        inventory.series_seen += 1;

        let seasons = list_subdirs(&series_path)
            .await
            .with_context(|| format!("Failed to list series folder {}", series_path.display()))?;

        for (season_name, season_path) in seasons {
            let episodes = list_subdirs(&season_path).await.with_context(|| {
                format!("Failed to list season folder {}", season_path.display())
            })?;

            for (episode_name, episode_path) in episodes {
                if !has_completion_marker(&episode_path).await {
                    continue;
                }

                let relative_path = format!("{}/{}/{}", series_title, season_name, episode_name);
                let Some((season, episode)) = parse_episode_path(&relative_path).both() else {
                    tracing::debug!("No season/episode numbers in {}", relative_path);
                    continue;
                };

                let resolutions = detect_resolutions(&episode_path).await;
                inventory.episodes.insert(
                    relative_path.clone(),
                    EpisodeEntry {
                        folder_name: relative_path,
                        series: series_id.clone(),
                        season_number: season,
                        episode_number: episode,
                        resolutions,
                        title: EpisodeEntry::default_title(season, episode),
                    },
                );
            }
        }
    }

    inventory.series_created = resolver.series_created();
    Ok(inventory)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::MemoryStore;
    use serde_json::json;
    use std::fs as stdfs;

    fn media_folder(root: &Path, relative: &str, complete: bool, renditions: &[&str]) {
        let dir = root.join(relative);
        stdfs::create_dir_all(&dir).unwrap();
        if complete {
            stdfs::write(dir.join(COMPLETION_MARKER), "#EXTM3U\n").unwrap();
        }
        for rendition in renditions {
            stdfs::create_dir_all(dir.join(rendition)).unwrap();
        }
    }

    #[tokio::test]
    async fn test_walk_movies_requires_marker() {
        let root = tempfile::tempdir().unwrap();
        media_folder(root.path(), "The.Matrix.1999.1080p.BluRay.x264", true, &["1080p", "720p"]);
        media_folder(root.path(), "Heat.1995", false, &["1080p"]);
        stdfs::write(root.path().join("notes.txt"), "stray file").unwrap();

        let movies = walk_movies(root.path()).await.unwrap();
        assert_eq!(movies.len(), 1);

        let movie = &movies["The.Matrix.1999.1080p.BluRay.x264"];
        assert_eq!(movie.title, "The Matrix");
        assert_eq!(movie.year_released, Some(1999));
        assert_eq!(movie.resolutions.iter().copied().collect::<Vec<_>>(), vec![720, 1080]);
    }

    #[tokio::test]
    async fn test_walk_movies_marker_must_be_a_file() {
        let root = tempfile::tempdir().unwrap();
        media_folder(root.path(), "Odd Movie", false, &[COMPLETION_MARKER]);

        assert!(walk_movies(root.path()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_walk_movies_missing_root_is_error() {
        let root = tempfile::tempdir().unwrap();
        assert!(walk_movies(&root.path().join("missing")).await.is_err());
    }

    #[tokio::test]
    async fn test_walk_ads_takes_every_folder() {
        let root = tempfile::tempdir().unwrap();
        media_folder(root.path(), "summer-promo", false, &[]);
        media_folder(root.path(), "trailer_mix", true, &[]);
        stdfs::write(root.path().join("readme.md"), "").unwrap();

        let ads = walk_ads(root.path()).await.unwrap();
        assert_eq!(
            ads.keys().cloned().collect::<Vec<_>>(),
            vec!["summer-promo".to_string(), "trailer_mix".to_string()]
        );
    }

    #[tokio::test]
    async fn test_walk_series_builds_episode_keys() {
        let root = tempfile::tempdir().unwrap();
        media_folder(root.path(), "Breaking Bad/Season 02/Episode 05", true, &["720p"]);
        media_folder(root.path(), "Breaking Bad/Season 02/Episode 06", false, &[]);
        media_folder(root.path(), "Breaking Bad/Extras/Bonus", true, &[]);
        media_folder(root.path(), "Dark/S01/E01", true, &["4k", "1080p"]);

        let store = MemoryStore::new();
        let inventory = walk_series(root.path(), &store).await.unwrap();

        assert_eq!(inventory.series_seen, 2);
        assert_eq!(inventory.series_created, 2);
        assert_eq!(
            inventory.episodes.keys().cloned().collect::<Vec<_>>(),
            vec![
                "Breaking Bad/Season 02/Episode 05".to_string(),
                "Dark/S01/E01".to_string(),
            ]
        );

        let episode = &inventory.episodes["Breaking Bad/Season 02/Episode 05"];
        assert_eq!(episode.season_number, 2);
        assert_eq!(episode.episode_number, 5);
        assert_eq!(episode.title, "Season 2 Episode 5");
        assert_eq!(episode.resolutions.iter().copied().collect::<Vec<_>>(), vec![720]);

        let series = store.records(Collection::Series);
        let breaking_bad = series
            .iter()
            .find(|r| r.get_str("title") == Some("Breaking Bad"))
            .unwrap();
        assert_eq!(episode.series, breaking_bad.id);

        let dark = &inventory.episodes["Dark/S01/E01"];
        assert_eq!(dark.resolutions.iter().copied().collect::<Vec<_>>(), vec![1080, 2160]);
    }

    #[tokio::test]
    async fn test_walk_series_reuses_existing_series() {
        let root = tempfile::tempdir().unwrap();
        media_folder(root.path(), "Dark/Season 1/Episode 1", true, &[]);

        let store = MemoryStore::new();
        let existing = store.seed(Collection::Series, json!({"title": "Dark"}));

        let inventory = walk_series(root.path(), &store).await.unwrap();
        assert_eq!(inventory.series_created, 0);
        assert_eq!(store.creates(), 0);
        assert_eq!(inventory.episodes["Dark/Season 1/Episode 1"].series, existing);
    }

    #[tokio::test]
    async fn test_series_resolver_caches_per_pass() {
        let store = MemoryStore::new();
        let mut resolver = SeriesResolver::new(&store);

        let first = resolver.resolve("Dark").await.unwrap();
        let reads = store.reads();
        let second = resolver.resolve("Dark").await.unwrap();

        assert_eq!(first, second);
        assert_eq!(store.reads(), reads);
        assert_eq!(store.creates(), 1);
        assert_eq!(resolver.series_created(), 1);
    }
}
