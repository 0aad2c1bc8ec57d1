// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

pub mod config;
pub mod erase;
pub mod error;
pub mod feed;
pub mod http;
pub mod identity;
pub mod model;
pub mod normalize;
pub mod progress;
pub mod retry;
pub mod run;
pub mod store;
pub mod thumbnail;
pub mod upsert;

// Re-export main types for convenience
pub use config::{Config, DEFAULT_FEEDS, RetryConfig};
pub use erase::{EraseStats, erase_collection};
pub use error::{
    ConfigError, FeedError, ItemError, NormalizeError, RunError, StoreError, ThumbnailError,
    UpsertError,
};
pub use feed::{RawFeed, RawItem, fetch_feed, parse_feed};
pub use http::{HttpClient, ReqwestClient};
pub use identity::content_id;
pub use model::{Author, Enclosure, Episode, Image, ItunesEpisodeExt, Podcast};
pub use normalize::{FeedResult, ItemFailure, normalize};
pub use progress::{
    NoopReporter, ProgressEvent, ProgressReporter, SharedProgressReporter, TracingReporter,
};
pub use run::{FeedOutcome, IngestMode, RunOptions, RunSummary, Runner};
pub use store::{
    DocumentStore, FsDocumentStore, FsObjectStore, MemoryDocumentStore, MemoryObjectStore,
    ObjectStore, SharedDocumentStore, SharedObjectStore,
};
pub use thumbnail::{Thumbnail, generate_thumbnail};
pub use upsert::{UpsertOptions, UpsertOutcome, Upserter};
