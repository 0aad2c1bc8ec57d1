// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::sync::Arc;

/// Events emitted during an ingest run for progress reporting
#[derive(Debug, Clone)]
pub enum ProgressEvent {
    /// Feed is being fetched from URL
    FetchingFeed { url: String },

    /// Feed has been parsed and normalized
    FeedNormalized {
        url: String,
        podcast_title: String,
        episodes: usize,
        /// Items without a playable enclosure
        unplayable: usize,
        /// Items rejected because of malformed data
        failed_items: usize,
    },

    /// The podcast document was looked up
    ExistenceChecked { podcast_id: String, exists: bool },

    /// A feed was not fetched because its podcast is already stored
    SkippingExisting { url: String, podcast_id: String },

    /// A thumbnail was uploaded and made public
    ThumbnailPublished { podcast_id: String, url: String },

    /// Episode documents were committed
    EpisodesWritten {
        podcast_id: String,
        podcast_title: String,
        count: usize,
        batches: usize,
    },

    /// Processing a feed failed; the run continues with the next one
    FeedFailed { url: String, error: String },

    /// A collection was erased
    CollectionErased {
        collection: String,
        documents: usize,
        batches: usize,
    },

    /// Run completed
    RunCompleted {
        ingested: usize,
        skipped: usize,
        failed: usize,
    },
}

/// Trait for reporting progress events during an ingest run.
///
/// Implementations can use this to display progress bars, log messages,
/// or collect statistics.
pub trait ProgressReporter: Send + Sync {
    /// Report a progress event
    fn report(&self, event: ProgressEvent);
}

/// A shared reference to a progress reporter
pub type SharedProgressReporter = Arc<dyn ProgressReporter>;

/// A no-op progress reporter that silently ignores all events.
/// Useful for tests or quiet mode.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopReporter;

impl ProgressReporter for NoopReporter {
    fn report(&self, _event: ProgressEvent) {
        // Intentionally empty
    }
}

impl NoopReporter {
    /// Create a new NoopReporter wrapped in an Arc
    pub fn shared() -> SharedProgressReporter {
        Arc::new(Self)
    }
}

/// Turns every event into a structured `tracing` record
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingReporter;

impl TracingReporter {
    pub fn shared() -> SharedProgressReporter {
        Arc::new(Self)
    }
}

impl ProgressReporter for TracingReporter {
    fn report(&self, event: ProgressEvent) {
        match event {
            ProgressEvent::FetchingFeed { url } => {
                tracing::info!(url, "Fetching feed");
            }
            ProgressEvent::FeedNormalized {
                url,
                podcast_title,
                episodes,
                unplayable,
                failed_items,
            } => {
                tracing::info!(
                    url,
                    podcast_title,
                    episodes,
                    unplayable,
                    failed_items,
                    "Feed normalized"
                );
            }
            ProgressEvent::ExistenceChecked { podcast_id, exists } => {
                tracing::debug!(podcast_id, exists, "Existence checked");
            }
            ProgressEvent::SkippingExisting { url, podcast_id } => {
                tracing::info!(url, podcast_id, "Skipping existing podcast");
            }
            ProgressEvent::ThumbnailPublished { podcast_id, url } => {
                tracing::info!(podcast_id, url, "Thumbnail published");
            }
            ProgressEvent::EpisodesWritten {
                podcast_id,
                podcast_title,
                count,
                batches,
            } => {
                tracing::info!(podcast_id, podcast_title, count, batches, "Episodes written");
            }
            ProgressEvent::FeedFailed { url, error } => {
                tracing::error!(url, error, "Feed failed");
            }
            ProgressEvent::CollectionErased {
                collection,
                documents,
                batches,
            } => {
                tracing::info!(collection, documents, batches, "Collection erased");
            }
            ProgressEvent::RunCompleted {
                ingested,
                skipped,
                failed,
            } => {
                tracing::info!(ingested, skipped, failed, "Run completed");
            }
        }
    }
}
