//! TOML configuration: account credentials and download behavior.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::Error;

pub const CONFIG_DIR_NAME: &str = "quaver";
pub const CONFIG_FILE_NAME: &str = "config.toml";

pub const DEFAULT_FOLDER_TEMPLATE: &str =
    "{artist} - {album} ({year}) [{bit_depth}B-{sampling_rate}kHz]";
pub const DEFAULT_TRACK_TEMPLATE: &str = "{tracknumber}. {tracktitle}";
/// Fallback templates when a lossy item cannot satisfy lossless placeholders.
pub const MP3_FOLDER_TEMPLATE: &str = "{artist} - {album} [MP3]";
pub const MP3_TRACK_TEMPLATE: &str = "{tracknumber}. {tracktitle}";

fn default_quality() -> u32 {
    6
}

fn default_true() -> bool {
    true
}

fn default_workers() -> usize {
    3
}

fn default_folder_template() -> String {
    DEFAULT_FOLDER_TEMPLATE.to_string()
}

fn default_track_template() -> String {
    DEFAULT_TRACK_TEMPLATE.to_string()
}

fn default_directory() -> PathBuf {
    PathBuf::from("Quaver Downloads")
}

fn default_lucky_kind() -> String {
    "album".to_string()
}

fn default_lucky_limit() -> u32 {
    1
}

#[derive(Debug, Clone, Deserialize)]
pub struct AccountConfig {
    pub email: String,
    pub password: String,
    pub app_id: String,
    /// Candidate app secrets, probed in order at login.
    pub secrets: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DownloadConfig {
    pub directory: PathBuf,
    /// Wire format id: 5, 6, 7 or 27.
    pub quality: u32,
    pub quality_fallback: bool,
    pub embed_cover: bool,
    pub cover_original_quality: bool,
    pub skip_cover_file: bool,
    pub smart_discography: bool,
    pub favor_space_over_quality: bool,
    pub skip_extras: bool,
    pub workers: usize,
    pub database_path: Option<PathBuf>,
    pub folder_template: String,
    pub track_template: String,
    pub lucky_kind: String,
    pub lucky_limit: u32,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        DownloadConfig {
            directory: default_directory(),
            quality: default_quality(),
            quality_fallback: default_true(),
            embed_cover: default_true(),
            cover_original_quality: false,
            skip_cover_file: false,
            smart_discography: false,
            favor_space_over_quality: false,
            skip_extras: false,
            workers: default_workers(),
            database_path: None,
            folder_template: default_folder_template(),
            track_template: default_track_template(),
            lucky_kind: default_lucky_kind(),
            lucky_limit: default_lucky_limit(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub account: AccountConfig,
    #[serde(default)]
    pub download: DownloadConfig,
}

impl Config {
    pub fn load(path: &Path) -> Result<Self, Error> {
        let raw = fs::read_to_string(path).map_err(|source| Error::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&raw).map_err(|source| Error::ConfigParse {
            path: path.to_path_buf(),
            source: Box::new(source),
        })
    }

    /// `$XDG_CONFIG_HOME/quaver/config.toml` (or the platform equivalent).
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|base| base.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
    }

    /// Database location: configured path, or `downloads.db` beside the
    /// download directory.
    pub fn database_path(&self) -> PathBuf {
        self.download
            .database_path
            .clone()
            .unwrap_or_else(|| self.download.directory.join("downloads.db"))
    }
}
