// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Configuration file handling.
//!
//! The configuration is a TOML file with kebab-case keys:
//!
//! ```toml
//! service-account-path = "secrets/service-account.json"
//! thumbnail-size = 200
//! cloud-storage-bucket-for-thumbnails = "podcast-thumbnails"
//! data-dir = "data"
//!
//! [retry]
//! max-attempts = 3
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Feeds ingested by `new` and `rebuild` when the config file lists none
pub const DEFAULT_FEEDS: &[&str] = &[
    "http://feeds.gimletmedia.com/crimetownshow",
    "http://feeds.gimletmedia.com/eltshow",
    "http://feeds.gimletmedia.com/heavyweightpodcast",
    "http://feeds.gimletmedia.com/hearstartup",
    "http://feeds.gimletmedia.com/sciencevs",
    "http://feeds.gimletmedia.com/hearreplyall",
    "http://feeds.gimletmedia.com/mogulshow",
    "http://feeds.gimletmedia.com/homecomingshow",
    "http://feeds.gimletmedia.com/storypirates",
    "http://feeds.gimletmedia.com/thenodshow",
    "http://feeds.gimletmedia.com/thepitchshow",
    "http://podcasts.files.bbci.co.uk/p05n1r2s.rss",
    "http://podcasts.files.bbci.co.uk/p05nrmhm.rss",
    "http://podcasts.files.bbci.co.uk/b006qptc.rss",
    "http://podcasts.files.bbci.co.uk/b00snr0w.rss",
    "http://podcasts.files.bbci.co.uk/b006qnx3.rss",
    "https://www.npr.org/rss/podcast.php?id=510289",
    "https://www.npr.org/rss/podcast.php?id=510308",
    "http://feed.thisamericanlife.org/talpodcast",
    "http://www.espn.com/espnradio/feeds/rss/podcast.xml?id=10672984",
    "http://www.espn.com/espnradio/feeds/rss/podcast.xml?id=2406595",
    "http://www.espn.com/espnradio/feeds/rss/podcast.xml?id=18339885",
    "http://www.espn.com/espnradio/feeds/rss/podcast.xml?id=2839445",
    "http://www.espn.com/espnradio/feeds/rss/podcast.xml?id=14805210",
    "https://thefantasyfootballers.libsyn.com/fantasyfootball",
    "http://feeds.feedburner.com/freakonomicsradio",
    "http://feeds.wnyc.org/radiolab",
    "http://feeds.wnyc.org/wnycheresthething",
    "http://feeds.wnyc.org/newyorkerradiohour",
    "http://feeds.soundcloud.com/users/soundcloud:users:62921190/sounds.rss",
    "https://rss.simplecast.com/podcasts/3408/rss",
    "https://rss.simplecast.com/podcasts/4267/rss",
];

/// Application configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Config {
    /// Credential file for the backing services
    #[serde(default)]
    pub service_account_path: Option<PathBuf>,

    /// Maximum edge length of generated thumbnails in pixels
    #[serde(default = "default_thumbnail_size")]
    pub thumbnail_size: u32,

    /// Bucket receiving the generated thumbnails
    pub cloud_storage_bucket_for_thumbnails: String,

    /// Base URL under which public objects are served
    #[serde(default = "default_public_url_base")]
    pub public_url_base: String,

    /// Root directory of the local document and object stores
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Feeds to ingest on `new` and `rebuild`
    #[serde(default = "default_feeds")]
    pub feeds: Vec<String>,

    /// How many feeds are processed at the same time
    #[serde(default = "default_max_concurrent_feeds")]
    pub max_concurrent_feeds: usize,

    /// Upper bound for fetching, normalizing and storing a single feed
    #[serde(default = "default_feed_timeout_secs")]
    pub feed_timeout_secs: u64,

    /// Documents deleted per batch when erasing a collection
    #[serde(default = "default_erase_page_size")]
    pub erase_page_size: usize,

    #[serde(default)]
    pub retry: RetryConfig,
}

/// Exponential backoff settings for transient failures
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct RetryConfig {
    /// Retries after the first attempt (0 disables retrying)
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_initial_delay", with = "millis_serde", rename = "initial-delay-ms")]
    pub initial_delay: Duration,

    #[serde(default = "default_max_delay", with = "millis_serde", rename = "max-delay-ms")]
    pub max_delay: Duration,

    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,

    /// Spread retries randomly between `delay` and `2 * delay`
    #[serde(default = "default_true")]
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay: default_initial_delay(),
            max_delay: default_max_delay(),
            backoff_multiplier: default_backoff_multiplier(),
            jitter: true,
        }
    }
}

impl RetryConfig {
    /// Configuration that never retries
    pub fn disabled() -> Self {
        Self {
            max_attempts: 0,
            ..Self::default()
        }
    }
}

impl Config {
    /// Build a configuration with defaults for everything but the bucket
    pub fn new(bucket: impl Into<String>) -> Self {
        Self {
            service_account_path: None,
            thumbnail_size: default_thumbnail_size(),
            cloud_storage_bucket_for_thumbnails: bucket.into(),
            public_url_base: default_public_url_base(),
            data_dir: default_data_dir(),
            feeds: default_feeds(),
            max_concurrent_feeds: default_max_concurrent_feeds(),
            feed_timeout_secs: default_feed_timeout_secs(),
            erase_page_size: default_erase_page_size(),
            retry: RetryConfig::default(),
        }
    }

    /// Read, parse and validate a configuration file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFailed {
            path: path.to_path_buf(),
            source: e,
        })?;

        let config = Self::from_toml(&content).map_err(|e| match e {
            ConfigError::ParseFailed { source, .. } => ConfigError::ParseFailed {
                path: path.to_path_buf(),
                source,
            },
            other => other,
        })?;

        if let Some(credentials) = &config.service_account_path
            && !credentials.is_file()
        {
            return Err(ConfigError::Invalid(format!(
                "service-account-path {} does not exist",
                credentials.display()
            )));
        }

        Ok(config)
    }

    /// Parse and validate configuration from a TOML string
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(content).map_err(|e| ConfigError::ParseFailed {
            path: PathBuf::new(),
            source: e,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Check value ranges that serde cannot express
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.thumbnail_size == 0 {
            return Err(ConfigError::Invalid(
                "thumbnail-size must be greater than 0".to_string(),
            ));
        }

        let bucket = &self.cloud_storage_bucket_for_thumbnails;
        if bucket.trim().is_empty() || bucket.contains('/') {
            return Err(ConfigError::Invalid(format!(
                "cloud-storage-bucket-for-thumbnails '{bucket}' is not a valid bucket name"
            )));
        }

        if url::Url::parse(&self.public_url_base).is_err() {
            return Err(ConfigError::Invalid(format!(
                "public-url-base '{}' is not an absolute URL",
                self.public_url_base
            )));
        }

        if self.max_concurrent_feeds == 0 {
            return Err(ConfigError::Invalid(
                "max-concurrent-feeds must be greater than 0".to_string(),
            ));
        }

        if self.erase_page_size == 0 {
            return Err(ConfigError::Invalid(
                "erase-page-size must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    pub fn feed_timeout(&self) -> Duration {
        Duration::from_secs(self.feed_timeout_secs)
    }

    /// Directory of the filesystem document store
    pub fn documents_dir(&self) -> PathBuf {
        self.data_dir.join("documents")
    }

    /// Directory of the filesystem object store
    pub fn objects_dir(&self) -> PathBuf {
        self.data_dir.join("objects")
    }
}

fn default_thumbnail_size() -> u32 {
    200
}

fn default_public_url_base() -> String {
    "https://storage.googleapis.com".to_string()
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("data")
}

fn default_feeds() -> Vec<String> {
    DEFAULT_FEEDS.iter().map(|f| f.to_string()).collect()
}

fn default_max_concurrent_feeds() -> usize {
    4
}

fn default_feed_timeout_secs() -> u64 {
    120
}

fn default_erase_page_size() -> usize {
    500
}

fn default_max_attempts() -> u32 {
    3
}

fn default_initial_delay() -> Duration {
    Duration::from_millis(500)
}

fn default_max_delay() -> Duration {
    Duration::from_secs(10)
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

fn default_true() -> bool {
    true
}

mod millis_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_millis() as u64)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}
