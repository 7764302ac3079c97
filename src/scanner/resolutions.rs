use std::path::Path;
use tokio::fs;

use crate::models::Resolutions;

/// Folder label substrings and the resolution they stand for
const RESOLUTION_LABELS: &[(&str, u32)] = &[
    ("360p", 360),
    ("480p", 480),
    ("720p", 720),
    ("1080p", 1080),
    ("1440p", 1440),
    ("2160p", 2160),
    ("4k", 2160),
];

/// Resolutions encoded in a folder name (case-insensitive substring match)
pub fn resolutions_in_name(name: &str) -> impl Iterator<Item = u32> + '_ {
    let lower = name.to_lowercase();
    RESOLUTION_LABELS
        .iter()
        .filter(move |(label, _)| lower.contains(label))
        .map(|(_, value)| *value)
}

/// Detect which renditions exist by looking at the immediate subfolders of a media folder.
/// An unreadable folder yields an empty set.
pub async fn detect_resolutions(media_path: &Path) -> Resolutions {
    let mut resolutions = Resolutions::new();

    let mut entries = match fs::read_dir(media_path).await {
        Ok(entries) => entries,
        Err(e) => {
            tracing::warn!(
                "Could not read directory for resolution detection: {}: {}",
                media_path.display(),
                e
            );
            return resolutions;
        }
    };

    loop {
        let entry = match entries.next_entry().await {
            Ok(Some(entry)) => entry,
            Ok(None) => break,
            Err(e) => {
                tracing::warn!(
                    "Error listing {} for resolution detection: {}",
                    media_path.display(),
                    e
                );
                break;
            }
        };

        let is_dir = fs::metadata(entry.path())
            .await
            .map(|m| m.is_dir())
            .unwrap_or(false);
        if !is_dir {
            continue;
        }

        if let Some(name) = entry.file_name().to_str() {
            resolutions.extend(resolutions_in_name(name));
        }
    }

    resolutions
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolutions_in_name() {
        assert_eq!(resolutions_in_name("720P_Extended").collect::<Vec<_>>(), vec![720]);
        assert_eq!(resolutions_in_name("4K HDR").collect::<Vec<_>>(), vec![2160]);
        assert_eq!(resolutions_in_name("audio").count(), 0);
    }

    #[tokio::test]
    async fn test_detect_sorted_case_insensitive() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("1080p")).unwrap();
        std::fs::create_dir(dir.path().join("720P_Extended")).unwrap();
        std::fs::create_dir(dir.path().join("subs")).unwrap();
        std::fs::write(dir.path().join("480p.txt"), "not a folder").unwrap();

        let resolutions = detect_resolutions(dir.path()).await;
        assert_eq!(resolutions.into_iter().collect::<Vec<_>>(), vec![720, 1080]);
    }

    #[tokio::test]
    async fn test_detect_collapses_4k_and_2160p() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("4k")).unwrap();
        std::fs::create_dir(dir.path().join("2160p")).unwrap();
        std::fs::create_dir(dir.path().join("360p")).unwrap();

        let resolutions = detect_resolutions(dir.path()).await;
        assert_eq!(resolutions.into_iter().collect::<Vec<_>>(), vec![360, 2160]);
    }

    #[tokio::test]
    async fn test_detect_missing_directory_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let resolutions = detect_resolutions(&dir.path().join("missing")).await;
        assert!(resolutions.is_empty());
    }
}
