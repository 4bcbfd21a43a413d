//! Configuration types for image-dl

use crate::error::{Error, Result};
use crate::types::Size;
use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, path::Path, path::PathBuf, time::Duration};

/// Main configuration shared by every [`ImageDownloader`](crate::ImageDownloader)
///
/// Read once per `save()` call, so updates through
/// [`DownloaderContext::update_config`](crate::DownloaderContext::update_config)
/// apply to the next run, never to one in flight.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Config {
    /// Saving behaviour (fallback, rotation, naming)
    #[serde(default)]
    pub save: SaveConfig,

    /// Blacklist settings
    #[serde(default)]
    pub blacklist: BlacklistConfig,

    /// Log destinations appended to after each saved output
    #[serde(default)]
    pub log_files: Vec<LogFileConfig>,

    /// Commands run after each saved output
    #[serde(default)]
    pub commands: Vec<CommandConfig>,

    /// HTTP transport settings
    #[serde(default)]
    pub http: HttpConfig,
}

impl Config {
    /// Parse a configuration from a JSON string and validate it
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Config = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a configuration from a JSON file and validate it
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Io(std::io::Error::new(
                e.kind(),
                format!("Failed to read config file '{}': {}", path.display(), e),
            ))
        })?;
        Self::from_json_str(&content)
    }

    /// Check settings that serde cannot express
    pub fn validate(&self) -> Result<()> {
        if self
            .save
            .extension_rotation
            .iter()
            .any(|ext| ext.trim().is_empty() || ext.contains('.') || ext.contains('/'))
        {
            return Err(Error::config(
                "save.extension_rotation",
                "extensions must be non-empty and contain no '.' or '/'",
            ));
        }

        for (size, chain) in &self.save.size_fallbacks {
            if chain.contains(size) {
                return Err(Error::config(
                    "save.size_fallbacks",
                    format!("fallback chain for {size} must not contain {size} itself"),
                ));
            }
        }

        if let Some(log) = self.log_files.iter().find(|l| l.path.trim().is_empty()) {
            return Err(Error::config(
                "log_files",
                format!("log destination with content '{}' has no path", log.content),
            ));
        }

        if self.commands.iter().any(|c| c.program.as_os_str().is_empty()) {
            return Err(Error::config("commands", "command program must not be empty"));
        }

        Ok(())
    }
}

/// Saving behaviour
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SaveConfig {
    /// Try a lower-tier variant when the requested one is not found (default: true)
    #[serde(default = "default_true")]
    pub sample_fallback: bool,

    /// Ordered fallback chain per requested size (default: full -> sample)
    #[serde(default = "default_size_fallbacks")]
    pub size_fallbacks: BTreeMap<Size, Vec<Size>>,

    /// Extensions tried in order when a URL is not found and rotation is enabled
    #[serde(default = "default_extension_rotation")]
    pub extension_rotation: Vec<String>,

    /// What to do when the resolved path already exists (default: overwrite)
    #[serde(default)]
    pub file_collision: FileCollisionAction,

    /// Replace underscores with spaces in tag-derived tokens (default: true)
    #[serde(default = "default_true")]
    pub replace_underscores: bool,

    /// Separator between tags when a token expands to several (default: " ")
    #[serde(default = "default_tag_separator")]
    pub tag_separator: String,

    /// chrono format string for the %date% token (default: "%Y-%m-%d")
    #[serde(default = "default_date_format")]
    pub date_format: String,
}

impl Default for SaveConfig {
    fn default() -> Self {
        Self {
            sample_fallback: true,
            size_fallbacks: default_size_fallbacks(),
            extension_rotation: default_extension_rotation(),
            file_collision: FileCollisionAction::default(),
            replace_underscores: true,
            tag_separator: default_tag_separator(),
            date_format: default_date_format(),
        }
    }
}

impl SaveConfig {
    /// Fallback chain configured for `size` (empty if none)
    pub fn fallback_chain(&self, size: Size) -> &[Size] {
        self.size_fallbacks
            .get(&size)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}

/// File collision handling strategy
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileCollisionAction {
    /// Append (1), (2), etc. to filename
    Rename,
    /// Overwrite existing file (default)
    #[default]
    Overwrite,
    /// Skip the output, keep existing
    Skip,
}

/// Blacklist settings
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct BlacklistConfig {
    /// Rule lines; each line is a set of patterns that must all match
    #[serde(default)]
    pub tags: Vec<String>,

    /// Match tags case-sensitively (default: false)
    #[serde(default)]
    pub case_sensitive: bool,

    /// What to do when a blacklist is attached but the item's tags are unavailable
    #[serde(default)]
    pub missing_tags: MissingTagsPolicy,
}

/// Policy for blacklist evaluation when tags could not be obtained
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingTagsPolicy {
    /// Treat the item as not blacklisted (default)
    #[default]
    Allow,
    /// Treat the item as blacklisted
    Block,
}

/// Where a log destination writes
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogLocation {
    /// A single file shared by every saved item
    #[default]
    UniqueFile,
    /// A file next to each saved image; `path` is a filename template
    NextToImage,
}

/// Log destination
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LogFileConfig {
    /// Location kind
    #[serde(default)]
    pub location: LogLocation,

    /// File path (UniqueFile) or filename template (NextToImage)
    pub path: String,

    /// Content template appended after each save
    pub content: String,
}

/// Command run after each saved output
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CommandConfig {
    /// Program to execute
    pub program: PathBuf,

    /// Arguments; each one is a template resolved against the item
    #[serde(default)]
    pub args: Vec<String>,

    /// Timeout for the command (default: 30 seconds)
    #[serde(default = "default_command_timeout", with = "duration_serde")]
    pub timeout: Duration,
}

/// HTTP transport settings
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct HttpConfig {
    /// Request timeout (default: 30 seconds)
    #[serde(default = "default_http_timeout", with = "duration_serde")]
    pub timeout: Duration,

    /// User-Agent header (default: "image-dl/<version>")
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout: default_http_timeout(),
            user_agent: default_user_agent(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_size_fallbacks() -> BTreeMap<Size, Vec<Size>> {
    BTreeMap::from([(Size::Full, vec![Size::Sample])])
}

fn default_extension_rotation() -> Vec<String> {
    ["jpg", "png", "gif", "jpeg", "webm", "mp4"]
        .into_iter()
        .map(String::from)
        .collect()
}

fn default_tag_separator() -> String {
    " ".to_string()
}

fn default_date_format() -> String {
    "%Y-%m-%d".to_string()
}

fn default_command_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_http_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_user_agent() -> String {
    format!("image-dl/{}", env!("CARGO_PKG_VERSION"))
}

// Duration serialization helper (whole seconds)
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}
