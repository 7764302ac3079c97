// Configuration module for streamflex-server
// Combines an optional TOML file with environment variable overrides

use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::scanner::MediaRoots;
use crate::store::pocketbase::Credentials;

const APP_NAME: &str = "streamflex-server";
const CONFIG_FILENAME: &str = "config.toml";
const DATABASE_FILENAME: &str = "streamflex.db";

/// TOML configuration file structure
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ConfigFile {
    /// HTTP server configuration
    pub server: ServerConfig,

    /// Media root folders
    pub media: MediaConfig,

    /// Remote store configuration
    pub store: StoreConfig,

    /// Scan scheduling
    pub scanner: ScannerConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Server port (default: 3001)
    pub port: u16,

    /// Bind address (default: 0.0.0.0)
    pub bind_address: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 3001,
            bind_address: "0.0.0.0".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MediaConfig {
    /// Folder holding one subfolder per movie
    pub movies_root: PathBuf,

    /// Folder holding series/season/episode subfolders
    pub series_root: PathBuf,

    /// Folder holding one subfolder per ad
    pub ads_root: PathBuf,
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            movies_root: PathBuf::from("/mnt/media/movies"),
            series_root: PathBuf::from("/mnt/media/series"),
            ads_root: PathBuf::from("/mnt/media/ads"),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    #[default]
    PocketBase,
    Sqlite,
}

impl StoreBackend {
    fn parse(value: &str) -> Option<Self> {
        match value.to_lowercase().as_str() {
            "pocketbase" => Some(Self::PocketBase),
            "sqlite" => Some(Self::Sqlite),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// "pocketbase" (default) or "sqlite"
    pub backend: StoreBackend,

    /// PocketBase base URL, required for the pocketbase backend
    pub pocketbase_url: Option<String>,

    /// Superuser email
    pub admin_email: Option<String>,

    /// Superuser password
    pub admin_password: Option<String>,

    /// SQLite database URL (default: data directory)
    pub database_url: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ScannerConfig {
    /// Run a scan once the server is up (default: false)
    pub scan_on_startup: bool,

    /// Periodic scan interval in minutes (default: 0, disabled)
    pub interval_minutes: u64,
}

/// Application configuration - TOML file with environment overrides
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub port: u16,
    pub bind_address: String,
    pub media: MediaConfig,
    pub store: StoreConfig,
    pub scanner: ScannerConfig,
    /// Directory for the SQLite backend's database
    pub data_dir: PathBuf,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self::from_file(ConfigFile::default())
    }
}

impl AppConfig {
    /// Load configuration from TOML file and environment
    ///
    /// Priority (highest to lowest):
    /// 1. Environment variables
    /// 2. TOML config file
    /// 3. Default values
    pub fn load() -> Self {
        let config_dir = Self::find_config_dir();
        let config_file = Self::load_config_file(&config_dir);
        Self::from_file(config_file).with_env_overrides(|key| std::env::var(key).ok())
    }

    fn from_file(config_file: ConfigFile) -> Self {
        Self {
            port: config_file.server.port,
            bind_address: config_file.server.bind_address,
            media: config_file.media,
            store: config_file.store,
            scanner: config_file.scanner,
            data_dir: Self::default_data_dir(),
        }
    }

    /// Apply overrides from an environment lookup
    fn with_env_overrides<F>(mut self, env: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let flag = |v: String| v.eq_ignore_ascii_case("true") || v == "1";

        if let Some(port) = env("SERVER_PORT").and_then(|p| p.parse().ok()) {
            self.port = port;
        }
        if let Some(addr) = env("SERVER_BIND_ADDRESS") {
            self.bind_address = addr;
        }

        if let Some(path) = env("MOVIES_ROOT") {
            self.media.movies_root = PathBuf::from(path);
        }
        if let Some(path) = env("SERIES_ROOT") {
            self.media.series_root = PathBuf::from(path);
        }
        if let Some(path) = env("ADS_ROOT") {
            self.media.ads_root = PathBuf::from(path);
        }

        if let Some(backend) = env("STORE_BACKEND") {
            match StoreBackend::parse(&backend) {
                Some(backend) => self.store.backend = backend,
                None => tracing::warn!("Ignoring unknown STORE_BACKEND '{}'", backend),
            }
        }
        if let Some(url) = env("POCKETBASE_URL") {
            self.store.pocketbase_url = Some(url);
        }
        if let Some(email) = env("POCKETBASE_ADMIN_EMAIL") {
            self.store.admin_email = Some(email);
        }
        if let Some(password) = env("POCKETBASE_ADMIN_PASSWORD") {
            self.store.admin_password = Some(password);
        }
        if let Some(url) = env("DATABASE_URL") {
            self.store.database_url = Some(url);
        }
        if let Some(dir) = env("STREAMFLEX_DATA_DIR") {
            self.data_dir = PathBuf::from(dir);
        }

        if let Some(value) = env("SCAN_ON_STARTUP") {
            self.scanner.scan_on_startup = flag(value);
        }
        if let Some(minutes) = env("SCAN_INTERVAL_MINUTES").and_then(|m| m.parse().ok()) {
            self.scanner.interval_minutes = minutes;
        }

        self
    }

    /// Find the config directory (for locating config.toml)
    fn find_config_dir() -> PathBuf {
        if let Ok(path) = std::env::var("STREAMFLEX_CONFIG_DIR") {
            return PathBuf::from(path);
        }

        if let Some(dir) = dirs::config_dir() {
            return dir.join(APP_NAME);
        }

        std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."))
    }

    fn default_data_dir() -> PathBuf {
        dirs::data_dir()
            .map(|dir| dir.join(APP_NAME))
            .unwrap_or_else(|| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")))
    }

    /// Load and parse the TOML config file
    fn load_config_file(config_dir: &Path) -> ConfigFile {
        let config_path = config_dir.join(CONFIG_FILENAME);

        if !config_path.exists() {
            tracing::debug!(
                "No config file found at {}, using defaults",
                config_path.display()
            );
            return ConfigFile::default();
        }

        match std::fs::read_to_string(&config_path) {
            Ok(contents) => match toml::from_str(&contents) {
                Ok(config) => {
                    tracing::info!("Loaded configuration from {}", config_path.display());
                    config
                }
                Err(e) => {
                    tracing::warn!(
                        "Failed to parse config file {}: {}. Using defaults.",
                        config_path.display(),
                        e
                    );
                    ConfigFile::default()
                }
            },
            Err(e) => {
                tracing::warn!(
                    "Failed to read config file {}: {}. Using defaults.",
                    config_path.display(),
                    e
                );
                ConfigFile::default()
            }
        }
    }

    pub fn media_roots(&self) -> MediaRoots {
        MediaRoots {
            movies: self.media.movies_root.clone(),
            series: self.media.series_root.clone(),
            ads: self.media.ads_root.clone(),
        }
    }

    /// Superuser credentials, if both parts are configured
    pub fn credentials(&self) -> Option<Credentials> {
        match (&self.store.admin_email, &self.store.admin_password) {
            (Some(email), Some(password)) => Some(Credentials {
                email: email.clone(),
                password: password.clone(),
            }),
            _ => None,
        }
    }

    /// SQLite database URL, defaulting to a file in the data directory
    pub fn database_url(&self) -> String {
        self.store.database_url.clone().unwrap_or_else(|| {
            format!(
                "sqlite:{}?mode=rwc",
                self.data_dir.join(DATABASE_FILENAME).display()
            )
        })
    }

    /// Log configuration status
    pub fn log_config(&self) {
        tracing::info!("Server listening on {}:{}", self.bind_address, self.port);
        tracing::info!("Movies root: {}", self.media.movies_root.display());
        tracing::info!("Series root: {}", self.media.series_root.display());
        tracing::info!("Ads root: {}", self.media.ads_root.display());

        match self.store.backend {
            StoreBackend::PocketBase => tracing::info!(
                "Store: PocketBase at {}",
                self.store.pocketbase_url.as_deref().unwrap_or("<unset>")
            ),
            StoreBackend::Sqlite => tracing::info!("Store: SQLite at {}", self.database_url()),
        }

        if self.scanner.interval_minutes > 0 {
            tracing::info!(
                "Periodic scan: every {} minutes",
                self.scanner.interval_minutes
            );
        } else {
            tracing::debug!("Periodic scan: disabled");
        }
    }
}
