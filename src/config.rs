use anyhow::{Context, Result, anyhow, bail};
use dirs::home_dir;
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
#[cfg(unix)]
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

const APP_DIR: &str = ".trackload";
const CONFIG_FILE: &str = "config.json";
const DEFAULT_ARCHIVE_DIR: &str = "Activities";
const DEFAULT_API_HOST: &str = "127.0.0.1";
pub const DEFAULT_PROGRESS_INTERVAL: u64 = 1_000;

/// How the stored cursor decides which trackpoints are already committed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CursorFilter {
    /// Skip whole archive files whose name timestamp predates the cursor.
    #[default]
    FileName,
    /// Read every file and drop individual points at or before the cursor.
    Point,
}

impl CursorFilter {
    pub fn parse(value: &str) -> Result<Self> {
        match value.trim().to_lowercase().as_str() {
            "file_name" | "file-name" | "file" => Ok(Self::FileName),
            "point" => Ok(Self::Point),
            other => bail!("cursor_filter must be file_name or point, got: {other}"),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::FileName => "file_name",
            Self::Point => "point",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub archive_dir: PathBuf,
    pub db_path: PathBuf,
    pub cursor_filter: CursorFilter,
    pub progress_interval: u64,
    pub api_host: String,
    pub api_port: u16,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            archive_dir: PathBuf::from(DEFAULT_ARCHIVE_DIR),
            db_path: default_root_dir().join("db").join("locations.db"),
            cursor_filter: CursorFilter::default(),
            progress_interval: DEFAULT_PROGRESS_INTERVAL,
            api_host: DEFAULT_API_HOST.to_string(),
            api_port: 3000,
        }
    }
}

impl Config {
    pub fn config_path() -> Result<PathBuf> {
        Ok(default_root_dir().join(CONFIG_FILE))
    }

    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;
        Self::load_from(&config_path)
    }

    pub fn load_from(config_path: &Path) -> Result<Self> {
        let content = fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;

        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", config_path.display()))
    }

    /// Config file when present, defaults otherwise, then `.env` and process
    /// environment overrides.
    pub fn resolve() -> Result<Self> {
        dotenv::dotenv().ok();

        let config_path = Self::config_path()?;
        let mut config = if config_path.exists() {
            Self::load_from(&config_path)?
        } else {
            Self::default()
        };
        config.apply_env_overrides(|key| env::var(key).ok())?;

        Ok(config)
    }

    /// Environment variables:
    /// - `TRACKLOAD_ARCHIVE_DIR`
    /// - `TRACKLOAD_DB_PATH`
    /// - `TRACKLOAD_API_HOST`
    /// - `TRACKLOAD_API_PORT`
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup("TRACKLOAD_ARCHIVE_DIR") {
            self.archive_dir = expand_home(&value);
        }
        if let Some(value) = lookup("TRACKLOAD_DB_PATH") {
            self.db_path = expand_home(&value);
        }
        if let Some(value) = lookup("TRACKLOAD_API_HOST") {
            self.api_host = value.trim().to_string();
        }
        if let Some(value) = lookup("TRACKLOAD_API_PORT") {
            self.api_port = value
                .parse::<u16>()
                .map_err(|_| anyhow!("TRACKLOAD_API_PORT must be a number"))?;
        }

        Ok(())
    }

    pub fn save(&self) -> Result<()> {
        let config_path = Self::config_path()?;
        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let content = serde_json::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(&config_path, content)
            .with_context(|| format!("Failed to write config file: {}", config_path.display()))?;
        set_mode_600(&config_path)?;

        Ok(())
    }

    pub fn set_value(&mut self, key: &str, value: &str) -> Result<()> {
        match normalize_config_key(key) {
            "archive_dir" => {
                self.archive_dir = expand_home(value);
            }
            "db_path" => {
                self.db_path = expand_home(value);
            }
            "cursor_filter" => {
                self.cursor_filter = CursorFilter::parse(value)?;
            }
            "progress_interval" => {
                self.progress_interval = value
                    .parse::<u64>()
                    .map_err(|_| anyhow!("progress_interval must be a number"))?
                    .max(1);
            }
            "api_host" => {
                self.api_host = value.trim().to_string();
            }
            "api_port" => {
                self.api_port = value
                    .parse::<u16>()
                    .map_err(|_| anyhow!("api_port must be a number"))?;
            }
            _ => {
                bail!(
                    "Unsupported config key: {key}. Supported keys: archive_dir|archive.dir, db_path|db.path, cursor_filter|ingest.cursor_filter, progress_interval|ingest.progress_interval, api_host|api.host, api_port|api.port"
                );
            }
        }

        Ok(())
    }

    pub fn get_value(&self, key: &str) -> Option<String> {
        match normalize_config_key(key) {
            "archive_dir" => Some(self.archive_dir.display().to_string()),
            "db_path" => Some(self.db_path.display().to_string()),
            "cursor_filter" => Some(self.cursor_filter.as_str().to_string()),
            "progress_interval" => Some(self.progress_interval.to_string()),
            "api_host" => Some(self.api_host.clone()),
            "api_port" => Some(self.api_port.to_string()),
            _ => None,
        }
    }
}

fn normalize_config_key(key: &str) -> &str {
    match key {
        "archive_dir" | "archive.dir" => "archive_dir",
        "db_path" | "db.path" => "db_path",
        "cursor_filter" | "ingest.cursor_filter" => "cursor_filter",
        "progress_interval" | "ingest.progress_interval" => "progress_interval",
        "api_host" | "api.host" => "api_host",
        "api_port" | "api.port" => "api_port",
        _ => key,
    }
}

pub fn expand_home(raw: &str) -> PathBuf {
    raw.strip_prefix("~/")
        .and_then(|stripped| home_dir().map(|home| home.join(stripped)))
        .unwrap_or_else(|| PathBuf::from(raw))
}

fn default_root_dir() -> PathBuf {
    home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR)
}

fn set_mode_600(path: &Path) -> Result<()> {
    #[cfg(unix)]
    {
        fs::set_permissions(path, fs::Permissions::from_mode(0o600))
            .with_context(|| format!("Failed to set file permissions: {}", path.display()))?;
    }

    Ok(())
}
