// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Merging a normalized feed into the stores.
//!
//! A podcast document is only created once: its existence check guards the
//! thumbnail upload and the podcast write. Episodes are written on every run
//! and overwrite themselves since their IDs are derived from their GUIDs.

use url::Url;

use crate::config::{Config, RetryConfig};
use crate::error::UpsertError;
use crate::http::HttpClient;
use crate::model::{Image, Podcast};
use crate::normalize::FeedResult;
use crate::progress::{ProgressEvent, SharedProgressReporter};
use crate::retry::with_retry;
use crate::store::{
    CollectionRef, DocumentRef, SharedDocumentStore, SharedObjectStore, WriteBatch, public_url,
};
use crate::thumbnail::generate_thumbnail;

/// Top-level collection holding one document per podcast
pub const PODCASTS: &str = "podcasts";

/// Sub-collection of a podcast document holding its episodes
pub const EPISODES: &str = "episodes";

const THUMBNAIL_CONTENT_TYPE: &str = "image/png";

/// The `podcasts` collection
pub fn podcasts() -> CollectionRef {
    CollectionRef::root(PODCASTS)
}

/// Settings for [`Upserter`]
#[derive(Debug, Clone)]
pub struct UpsertOptions {
    /// Maximum thumbnail edge in pixels
    pub thumbnail_size: u32,
    /// Bucket receiving thumbnails
    pub bucket: String,
    pub public_url_base: String,
    pub retry: RetryConfig,
}

impl UpsertOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            thumbnail_size: config.thumbnail_size,
            bucket: config.cloud_storage_bucket_for_thumbnails.clone(),
            public_url_base: config.public_url_base.clone(),
            retry: config.retry.clone(),
        }
    }
}

/// What an upsert did
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpsertOutcome {
    pub podcast_id: String,
    /// The podcast document was written by this upsert
    pub created: bool,
    /// Public thumbnail URL, set when the podcast was created
    pub thumbnail_url: Option<Url>,
    pub episodes_written: usize,
    /// Batch commits used for the episodes
    pub batches: usize,
}

/// Writes normalized feeds into the document and object stores
pub struct Upserter<C> {
    client: C,
    documents: SharedDocumentStore,
    objects: SharedObjectStore,
    options: UpsertOptions,
    reporter: SharedProgressReporter,
}

impl<C: HttpClient> Upserter<C> {
    pub fn new(
        client: C,
        documents: SharedDocumentStore,
        objects: SharedObjectStore,
        options: UpsertOptions,
        reporter: SharedProgressReporter,
    ) -> Self {
        Self {
            client,
            documents,
            objects,
            options,
            reporter,
        }
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    pub fn documents(&self) -> &SharedDocumentStore {
        &self.documents
    }

    pub fn options(&self) -> &UpsertOptions {
        &self.options
    }

    /// Create the podcast if it is new, then write all of its episodes
    pub async fn upsert(&self, result: FeedResult) -> Result<UpsertOutcome, UpsertError> {
        let FeedResult {
            mut podcast,
            episodes,
            ..
        } = result;

        let doc = podcasts().doc(podcast.id.clone());
        let exists = self.exists(&doc).await?;

        self.reporter.report(ProgressEvent::ExistenceChecked {
            podcast_id: podcast.id.clone(),
            exists,
        });

        let thumbnail_url = if exists {
            tracing::debug!(podcast_id = %podcast.id, "Podcast exists, keeping stored document");
            None
        } else {
            let url = self.publish_thumbnail(&mut podcast).await?;
            self.commit_one(&doc, &podcast).await?;
            Some(url)
        };

        let episodes_ref = doc.sub_collection(EPISODES);
        let batch_size = self.documents.max_batch_size().max(1);
        let batches = episodes.len().div_ceil(batch_size);

        if batches > 1 {
            tracing::warn!(
                podcast_id = %podcast.id,
                episodes = episodes.len(),
                batches,
                "Episode list exceeds one batch, committing in several"
            );
        }

        for chunk in episodes.chunks(batch_size) {
            let mut batch = WriteBatch::new();
            for episode in chunk {
                batch.set(episodes_ref.doc(episode.id.clone()), episode)?;
            }
            self.commit(&batch).await?;
        }

        self.reporter.report(ProgressEvent::EpisodesWritten {
            podcast_id: podcast.id.clone(),
            podcast_title: podcast.title.clone(),
            count: episodes.len(),
            batches,
        });

        Ok(UpsertOutcome {
            podcast_id: podcast.id,
            created: !exists,
            thumbnail_url,
            episodes_written: episodes.len(),
            batches,
        })
    }

    /// Whether the podcast document for `podcast_id` is stored
    pub async fn podcast_exists(&self, podcast_id: &str) -> Result<bool, UpsertError> {
        self.exists(&podcasts().doc(podcast_id)).await
    }

    /// Generate, upload and expose the thumbnail, then attach it to `podcast`
    async fn publish_thumbnail(&self, podcast: &mut Podcast) -> Result<Url, UpsertError> {
        let thumbnail = generate_thumbnail(
            &self.client,
            &podcast.image_original.url,
            self.options.thumbnail_size,
            &self.options.retry,
        )
        .await
        .map_err(|source| UpsertError::Thumbnail {
            podcast_id: podcast.id.clone(),
            source,
        })?;

        let objects = &self.objects;
        let png = &thumbnail.png;
        let bucket = self.options.bucket.as_str();
        let key = format!("{}.png", podcast.id);
        let key = key.as_str();

        with_retry(&self.options.retry, move || {
            objects.put_object(bucket, key, png.clone(), THUMBNAIL_CONTENT_TYPE)
        })
        .await?;
        with_retry(&self.options.retry, move || objects.grant_public_read(bucket, key)).await?;

        let url = public_url(&self.options.public_url_base, bucket, key)?;

        self.reporter.report(ProgressEvent::ThumbnailPublished {
            podcast_id: podcast.id.clone(),
            url: url.to_string(),
        });

        podcast.image_thumbnail = Image {
            title: podcast.image_original.title.clone(),
            url: url.to_string(),
            data: Some(thumbnail.png.to_vec()),
        };

        Ok(url)
    }

    async fn exists(&self, doc: &DocumentRef) -> Result<bool, UpsertError> {
        let documents = &self.documents;
        Ok(with_retry(&self.options.retry, move || documents.exists(doc)).await?)
    }

    async fn commit_one(&self, doc: &DocumentRef, podcast: &Podcast) -> Result<(), UpsertError> {
        let mut batch = WriteBatch::new();
        batch.set(doc.clone(), podcast)?;
        self.commit(&batch).await
    }

    async fn commit(&self, batch: &WriteBatch) -> Result<(), UpsertError> {
        let documents = &self.documents;
        Ok(with_retry(&self.options.retry, move || documents.commit(batch)).await?)
    }
}
