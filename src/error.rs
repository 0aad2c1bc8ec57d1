// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::num::ParseIntError;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Errors that can occur when fetching or parsing RSS/Atom feeds
#[derive(Error, Debug)]
pub enum FeedError {
    #[error("Failed to fetch feed from {url}: {source}")]
    FetchFailed {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Feed is neither RSS ({rss}) nor Atom ({atom})")]
    UnrecognizedFormat {
        rss: rss::Error,
        atom: atom_syndication::Error,
    },

    #[error("Invalid feed URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

/// Feed-level normalization failures. The whole feed is unusable.
#[derive(Error, Debug)]
pub enum NormalizeError {
    #[error("Feed link '{value}' is not an absolute URL: {source}")]
    InvalidLink {
        value: String,
        #[source]
        source: url::ParseError,
    },

    #[error("Feed image URL '{value}' is not an absolute URL: {source}")]
    InvalidImageUrl {
        value: String,
        #[source]
        source: url::ParseError,
    },

    #[error("Feed self link '{value}' is not an absolute URL: {source}")]
    InvalidFeedLink {
        value: String,
        #[source]
        source: url::ParseError,
    },
}

/// Item-level normalization failures. Only the offending item is dropped.
#[derive(Error, Debug)]
pub enum ItemError {
    #[error("Enclosure {url} has an invalid length '{value}': {source}")]
    InvalidEnclosureLength {
        url: String,
        value: String,
        #[source]
        source: ParseIntError,
    },

    #[error("Item image URL '{value}' is malformed: {source}")]
    InvalidImageUrl {
        value: String,
        #[source]
        source: url::ParseError,
    },
}

/// Errors that can occur while producing a podcast thumbnail
#[derive(Error, Debug)]
pub enum ThumbnailError {
    #[error("Failed to fetch image from {url}: {source}")]
    FetchFailed {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Failed to decode image: {0}")]
    DecodeFailed(#[source] image::ImageError),

    #[error("Failed to encode thumbnail as PNG: {0}")]
    EncodeFailed(#[source] image::ImageError),

    #[error("Thumbnail worker failed: {0}")]
    WorkerFailed(#[from] tokio::task::JoinError),
}

/// Errors raised by document and object store backends
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Store I/O failed at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to serialize document: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Failed to parse stored document {path}: {source}")]
    Deserialize {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid store key: {0}")]
    InvalidKey(String),

    #[error("Write batch of {size} operations exceeds the limit of {limit}")]
    BatchTooLarge { size: usize, limit: usize },

    #[error("Store backend error: {message}")]
    Backend { message: String, transient: bool },
}

/// Errors that can occur while upserting a normalized feed
#[derive(Error, Debug)]
pub enum UpsertError {
    #[error("Thumbnail for podcast {podcast_id} failed: {source}")]
    Thumbnail {
        podcast_id: String,
        #[source]
        source: ThumbnailError,
    },

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

/// Per-feed errors of an ingest run
#[derive(Error, Debug)]
pub enum RunError {
    #[error("Feed error: {0}")]
    Feed(#[from] FeedError),

    #[error("Normalize error: {0}")]
    Normalize(#[from] NormalizeError),

    #[error("Upsert error: {0}")]
    Upsert(#[from] UpsertError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Feed {url} timed out after {}s", after.as_secs())]
    Timeout { url: String, after: Duration },
}

/// Errors that can occur when loading the configuration file
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    ReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {source}")]
    ParseFailed {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}
