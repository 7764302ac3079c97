// Media scanner - mirrors the transcoded media folders on disk into the remote store

use anyhow::{Context, Result};
use futures::FutureExt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use crate::models::Collection;
use crate::store::MediaStore;

pub mod parse;
pub mod reconcile;
pub mod resolutions;
pub mod walk;

pub use reconcile::ReconcileStats;

/// Root folders for each media kind
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaRoots {
    pub movies: PathBuf,
    pub series: PathBuf,
    pub ads: PathBuf,
}

/// Per-kind results of one full scan. `None` means that kind failed and was
/// not reconciled.
#[derive(Debug, Default, Clone)]
pub struct ScanSummary {
    pub movies: Option<ReconcileStats>,
    pub episodes: Option<ReconcileStats>,
    pub ads: Option<ReconcileStats>,
    pub series_created: usize,
}

#[derive(Debug, Clone)]
pub enum ScanOutcome {
    Completed(ScanSummary),
    /// Another scan held the guard; nothing was done
    AlreadyRunning,
}

/// Releases the scanning flag when dropped, including on panic
struct ScanGuard<'a> {
    flag: &'a AtomicBool,
}

impl<'a> ScanGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self { flag })
    }
}

impl Drop for ScanGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

/// Runs full media scans, at most one at a time per instance
pub struct ScanOrchestrator {
    store: Arc<dyn MediaStore>,
    roots: MediaRoots,
    scanning: AtomicBool,
}

impl ScanOrchestrator {
    pub fn new(store: Arc<dyn MediaStore>, roots: MediaRoots) -> Self {
        Self {
            store,
            roots,
            scanning: AtomicBool::new(false),
        }
    }

    pub fn is_scanning(&self) -> bool {
        self.scanning.load(Ordering::Acquire)
    }

    /// Start a full scan in the background and return immediately
    pub fn trigger(self: &Arc<Self>) {
        let scanner = Arc::clone(self);
        tokio::spawn(async move {
            scanner.scan_all_media().await;
        });
    }

    /// Scan movies, then series and episodes, then ads.
    ///
    /// Returns `AlreadyRunning` without touching the filesystem or the store
    /// if another scan holds the guard. Failures inside one media kind are
    /// logged and do not stop the others.
    pub async fn scan_all_media(&self) -> ScanOutcome {
        let Some(_guard) = ScanGuard::acquire(&self.scanning) else {
            tracing::info!("Scan is already in progress. Skipping.");
            return ScanOutcome::AlreadyRunning;
        };

        tracing::info!("--- Starting Full Media Scan ---");
        let started = Instant::now();
        let mut summary = ScanSummary::default();

        summary.movies = run_kind("movies", self.scan_movies()).await;

        if let Some((stats, series_created)) =
            run_kind("series", self.scan_series_and_episodes()).await
        {
            summary.episodes = Some(stats);
            summary.series_created = series_created;
        }

        summary.ads = run_kind("ads", self.scan_ads()).await;

        log_summary(&summary);
        tracing::info!(
            "--- Scan Complete in {:.1}s ---",
            started.elapsed().as_secs_f64()
        );
        ScanOutcome::Completed(summary)
    }

    async fn scan_movies(&self) -> Result<ReconcileStats> {
        let root = &self.roots.movies;
        let movies = walk::walk_movies(root)
            .await
            .with_context(|| format!("Failed to list movies root {}", root.display()))?;
        tracing::info!("Found {} valid movie folders on disk.", movies.len());

        let stats = reconcile::reconcile(self.store.as_ref(), Collection::Movies, &movies).await?;
        Ok(stats)
    }

    async fn scan_series_and_episodes(&self) -> Result<(ReconcileStats, usize)> {
        tracing::info!("--- Scanning SERIES & EPISODES ---");
        let inventory = walk::walk_series(&self.roots.series, self.store.as_ref()).await?;
        tracing::info!(
            "Found {} valid episode folders on disk across {} series.",
            inventory.episodes.len(),
            inventory.series_seen
        );

        let stats = reconcile::reconcile(
            self.store.as_ref(),
            Collection::Episodes,
            &inventory.episodes,
        )
        .await?;
        Ok((stats, inventory.series_created))
    }

    async fn scan_ads(&self) -> Result<ReconcileStats> {
        let root = &self.roots.ads;
        let ads = walk::walk_ads(root)
            .await
            .with_context(|| format!("Failed to list ads root {}", root.display()))?;
        tracing::info!("Found {} ad folders on disk.", ads.len());

        let stats = reconcile::reconcile(self.store.as_ref(), Collection::Ads, &ads).await?;
        Ok(stats)
    }
}

/// Run one media kind, turning errors and panics into a logged `None`
async fn run_kind<T, F>(kind: &str, scan: F) -> Option<T>
where
    F: Future<Output = Result<T>>,
{
    match AssertUnwindSafe(scan).catch_unwind().await {
        Ok(Ok(result)) => Some(result),
        Ok(Err(e)) => {
            tracing::error!("Error scanning {} directory: {:#}", kind, e);
            None
        }
        Err(_) => {
            tracing::error!("An unexpected error occurred while scanning {}", kind);
            None
        }
    }
}

fn log_summary(summary: &ScanSummary) {
    let kinds = [
        ("Movies", &summary.movies),
        ("Episodes", &summary.episodes),
        ("Ads", &summary.ads),
    ];
    for (label, stats) in kinds {
        match stats {
            Some(s) => tracing::info!(
                "{}: {} on disk, {} in store, {} created, {} deleted, {} unchanged, {} failed",
                label,
                s.on_disk,
                s.in_store,
                s.created,
                s.deleted,
                s.unchanged,
                s.failed
            ),
            None => tracing::warn!("{}: not synced this pass", label),
        }
    }
    if summary.series_created > 0 {
        tracing::info!("Series: {} created", summary.series_created);
    }
}
