// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::time::Duration;

use futures::stream::{self, StreamExt};

use crate::config::Config;
use crate::erase::{EraseStats, erase_collection};
use crate::error::RunError;
use crate::feed::fetch_feed;
use crate::http::HttpClient;
use crate::identity::content_id;
use crate::normalize::normalize;
use crate::progress::{ProgressEvent, SharedProgressReporter};
use crate::retry::with_retry;
use crate::store::DocumentStore;
use crate::upsert::{PODCASTS, UpsertOutcome, Upserter, podcasts};

/// Options for an ingest run
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Maximum number of feeds processed at the same time
    pub max_concurrent_feeds: usize,
    /// Upper bound for fetching, normalizing and storing one feed
    pub feed_timeout: Duration,
    /// Documents deleted per batch when erasing
    pub erase_page_size: usize,
}

impl RunOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            max_concurrent_feeds: config.max_concurrent_feeds,
            feed_timeout: config.feed_timeout(),
            erase_page_size: config.erase_page_size,
        }
    }
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            max_concurrent_feeds: 4,
            feed_timeout: Duration::from_secs(120),
            erase_page_size: 500,
        }
    }
}

/// Which feeds of a list get fetched
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestMode {
    /// Fetch and upsert every feed
    All,
    /// Leave out feeds whose podcast document already exists
    SkipExisting,
}

/// Result of processing a single feed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedOutcome {
    Ingested(UpsertOutcome),
    SkippedExisting { podcast_id: String },
}

/// Result of an ingest run over a list of feeds
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    /// Feeds fetched and stored
    pub ingested: usize,
    /// Podcasts created during this run
    pub created: usize,
    /// Feeds left out because their podcast already exists
    pub skipped_existing: usize,
    pub episodes_written: usize,
    /// Details of failed feeds (URL, error message)
    pub failed_feeds: Vec<(String, String)>,
}

impl RunSummary {
    /// Every attempted feed failed
    pub fn all_failed(&self) -> bool {
        self.ingested == 0 && self.skipped_existing == 0 && !self.failed_feeds.is_empty()
    }
}

/// Drives the ingest commands over the stores held by an [`Upserter`]
pub struct Runner<C> {
    upserter: Upserter<C>,
    options: RunOptions,
    reporter: SharedProgressReporter,
}

impl<C: HttpClient> Runner<C> {
    pub fn new(upserter: Upserter<C>, options: RunOptions, reporter: SharedProgressReporter) -> Self {
        Self {
            upserter,
            options,
            reporter,
        }
    }

    /// Erase the `podcasts` collection including all episodes
    pub async fn delete(&self) -> Result<EraseStats, RunError> {
        let documents: &dyn DocumentStore = self.upserter.documents().as_ref();
        let collection = podcasts();
        let collection = &collection;
        let page_size = self.options.erase_page_size;

        let stats = with_retry(&self.upserter.options().retry, move || {
            erase_collection(documents, collection, page_size)
        })
        .await?;

        self.reporter.report(ProgressEvent::CollectionErased {
            collection: PODCASTS.to_string(),
            documents: stats.documents,
            batches: stats.batches,
        });

        Ok(stats)
    }

    /// Erase everything, then ingest every feed
    pub async fn rebuild(&self, feeds: &[String]) -> Result<RunSummary, RunError> {
        self.delete().await?;
        Ok(self.ingest_feeds(feeds, IngestMode::All).await)
    }

    /// Ingest only feeds not stored yet
    pub async fn ingest_new(&self, feeds: &[String]) -> RunSummary {
        self.ingest_feeds(feeds, IngestMode::SkipExisting).await
    }

    /// Ingest a single feed URL
    pub async fn ingest_url(&self, url: &str) -> RunSummary {
        self.ingest_feeds(&[url.to_string()], IngestMode::All).await
    }

    /// Process `feeds` concurrently, continuing past failed feeds
    pub async fn ingest_feeds(&self, feeds: &[String], mode: IngestMode) -> RunSummary {
        let results: Vec<_> = stream::iter(feeds)
            .map(move |url| self.ingest_entry(url, mode))
            .buffer_unordered(self.options.max_concurrent_feeds.max(1))
            .collect()
            .await;

        let mut summary = RunSummary::default();
        for (url, result) in results {
            match result {
                Ok(FeedOutcome::Ingested(outcome)) => {
                    summary.ingested += 1;
                    summary.episodes_written += outcome.episodes_written;
                    if outcome.created {
                        summary.created += 1;
                    }
                }
                Ok(FeedOutcome::SkippedExisting { .. }) => summary.skipped_existing += 1,
                Err(e) => summary.failed_feeds.push((url, e.to_string())),
            }
        }

        self.reporter.report(ProgressEvent::RunCompleted {
            ingested: summary.ingested,
            skipped: summary.skipped_existing,
            failed: summary.failed_feeds.len(),
        });

        summary
    }

    /// Fetch, normalize and upsert one feed within the feed timeout
    pub async fn ingest_feed(&self, url: &str, mode: IngestMode) -> Result<FeedOutcome, RunError> {
        match tokio::time::timeout(self.options.feed_timeout, self.process_feed(url, mode)).await {
            Ok(result) => result,
            Err(_) => Err(RunError::Timeout {
                url: url.to_string(),
                after: self.options.feed_timeout,
            }),
        }
    }

    async fn ingest_entry(
        &self,
        url: &str,
        mode: IngestMode,
    ) -> (String, Result<FeedOutcome, RunError>) {
        let result = self.ingest_feed(url, mode).await;
        if let Err(e) = &result {
            self.reporter.report(ProgressEvent::FeedFailed {
                url: url.to_string(),
                error: e.to_string(),
            });
        }
        (url.to_string(), result)
    }

    async fn process_feed(&self, url: &str, mode: IngestMode) -> Result<FeedOutcome, RunError> {
        let url = url.trim();

        if mode == IngestMode::SkipExisting {
            let podcast_id = content_id(url);
            if self.upserter.podcast_exists(&podcast_id).await? {
                self.reporter.report(ProgressEvent::SkippingExisting {
                    url: url.to_string(),
                    podcast_id: podcast_id.clone(),
                });
                return Ok(FeedOutcome::SkippedExisting { podcast_id });
            }
        }

        self.reporter.report(ProgressEvent::FetchingFeed {
            url: url.to_string(),
        });

        let raw = fetch_feed(self.upserter.client(), url, &self.upserter.options().retry).await?;
        let result = normalize(raw, url)?;

        self.reporter.report(ProgressEvent::FeedNormalized {
            url: url.to_string(),
            podcast_title: result.podcast.title.clone(),
            episodes: result.episodes.len(),
            unplayable: result.unplayable,
            failed_items: result.failures.len(),
        });

        let outcome = self.upserter.upsert(result).await?;
        Ok(FeedOutcome::Ingested(outcome))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RetryConfig;
    use crate::progress::NoopReporter;
    use crate::store::{CollectionRef, MemoryDocumentStore, MemoryObjectStore, WriteBatch};
    use crate::upsert::{EPISODES, UpsertOptions};
    use async_trait::async_trait;
    use bytes::Bytes;
    use image::{DynamicImage, ImageFormat};
    use std::collections::HashMap;
    use std::io::Cursor;
    use std::sync::{Arc, Mutex};

    /// Serves fixed bodies by URL; unknown URLs get an HTML error page
    #[derive(Default)]
    struct FakeWeb {
        pages: HashMap<String, Bytes>,
        slow: Vec<String>,
        hits: Mutex<Vec<String>>,
    }

    impl FakeWeb {
        fn hits_for(&self, url: &str) -> usize {
            self.hits.lock().unwrap().iter().filter(|u| *u == url).count()
        }
    }

    #[async_trait]
    impl HttpClient for Arc<FakeWeb> {
        async fn get_bytes(&self, url: &str) -> Result<Bytes, reqwest::Error> {
            self.hits.lock().unwrap().push(url.to_string());
            if self.slow.iter().any(|u| u == url) {
                tokio::time::sleep(Duration::from_secs(5)).await;
            }
            Ok(self
                .pages
                .get(url)
                .cloned()
                .unwrap_or_else(|| Bytes::from_static(b"<html>404</html>")))
        }
    }

    fn rss(name: &str, episodes: usize) -> Bytes {
        let items: String = (0..episodes)
            .map(|i| {
                format!(
                    r#"<item><title>Ep {i}</title><guid>{name}-{i}</guid>
                    <enclosure url="https://cdn.{name}.test/{i}.mp3" length="100" type="audio/mpeg"/></item>"#
                )
            })
            .collect();

        Bytes::from(format!(
            r#"<?xml version="1.0"?>
<rss version="2.0">
<channel>
<title>Show {name}</title>
<link>https://{name}.test/</link>
<description>About {name}</description>
<image><url>https://{name}.test/art.png</url><title>Show {name}</title><link>https://{name}.test/</link></image>
{items}
</channel>
</rss>"#
        ))
    }

    fn png() -> Bytes {
        let mut out = Vec::new();
        DynamicImage::new_rgb8(300, 300)
            .write_to(&mut Cursor::new(&mut out), ImageFormat::Png)
            .unwrap();
        Bytes::from(out)
    }

    fn web(shows: &[(&str, usize)]) -> FakeWeb {
        let mut pages = HashMap::new();
        for (name, episodes) in shows {
            pages.insert(format!("https://{name}.test/feed"), rss(name, *episodes));
            pages.insert(format!("https://{name}.test/art.png"), png());
        }
        FakeWeb {
            pages,
            ..Default::default()
        }
    }

    struct Harness {
        web: Arc<FakeWeb>,
        documents: Arc<MemoryDocumentStore>,
        runner: Runner<Arc<FakeWeb>>,
    }

    fn harness(web: FakeWeb, feed_timeout: Duration) -> Harness {
        let web = Arc::new(web);
        let documents = Arc::new(MemoryDocumentStore::new());
        let upserter = Upserter::new(
            web.clone(),
            documents.clone(),
            Arc::new(MemoryObjectStore::new()),
            UpsertOptions {
                thumbnail_size: 100,
                bucket: "thumbs".to_string(),
                public_url_base: "https://storage.googleapis.com".to_string(),
                retry: RetryConfig::disabled(),
            },
            NoopReporter::shared(),
        );
        let options = RunOptions {
            max_concurrent_feeds: 2,
            feed_timeout,
            erase_page_size: 500,
        };

        Harness {
            web,
            documents,
            runner: Runner::new(upserter, options, NoopReporter::shared()),
        }
    }

    fn urls(names: &[&str]) -> Vec<String> {
        names.iter().map(|n| format!("https://{n}.test/feed")).collect()
    }

    fn episodes_of(url: &str) -> CollectionRef {
        podcasts().doc(content_id(url)).sub_collection(EPISODES)
    }

    #[tokio::test]
    async fn ingests_a_single_url() {
        let h = harness(web(&[("a", 3)]), Duration::from_secs(10));

        let summary = h.runner.ingest_url("https://a.test/feed").await;

        assert_eq!(summary.ingested, 1);
        assert_eq!(summary.created, 1);
        assert_eq!(summary.episodes_written, 3);
        assert!(summary.failed_feeds.is_empty());
        assert_eq!(h.documents.count(&podcasts()), 1);
        assert_eq!(h.documents.count(&episodes_of("https://a.test/feed")), 3);
    }

    #[tokio::test]
    async fn new_mode_skips_stored_podcasts_without_fetching() {
        let h = harness(web(&[("a", 1), ("b", 2)]), Duration::from_secs(10));
        h.runner.ingest_url("https://a.test/feed").await;

        let summary = h.runner.ingest_new(&urls(&["a", "b"])).await;

        assert_eq!(summary.skipped_existing, 1);
        assert_eq!(summary.ingested, 1);
        assert_eq!(h.web.hits_for("https://a.test/feed"), 1);
        assert_eq!(h.web.hits_for("https://b.test/feed"), 1);
        assert_eq!(h.documents.count(&podcasts()), 2);
    }

    #[tokio::test]
    async fn failed_feed_does_not_stop_the_run() {
        let h = harness(web(&[("a", 1)]), Duration::from_secs(10));

        let summary = h
            .runner
            .ingest_feeds(&urls(&["a", "missing"]), IngestMode::All)
            .await;

        assert_eq!(summary.ingested, 1);
        assert_eq!(summary.failed_feeds.len(), 1);
        assert_eq!(summary.failed_feeds[0].0, "https://missing.test/feed");
        assert!(!summary.all_failed());
    }

    #[tokio::test]
    async fn all_failed_when_nothing_succeeds() {
        let h = harness(FakeWeb::default(), Duration::from_secs(10));

        let summary = h
            .runner
            .ingest_feeds(&urls(&["x", "y"]), IngestMode::All)
            .await;

        assert_eq!(summary.failed_feeds.len(), 2);
        assert!(summary.all_failed());
    }

    #[tokio::test]
    async fn slow_feed_times_out() {
        let mut fake = web(&[("a", 1)]);
        fake.slow.push("https://slow.test/feed".to_string());
        let h = harness(fake, Duration::from_millis(50));

        let result = h
            .runner
            .ingest_feed("https://slow.test/feed", IngestMode::All)
            .await;

        assert!(matches!(result, Err(RunError::Timeout { .. })));
    }

    #[tokio::test]
    async fn rebuild_erases_before_ingesting() {
        let h = harness(web(&[("a", 2)]), Duration::from_secs(10));
        let mut batch = WriteBatch::new();
        batch
            .set(podcasts().doc("stale"), &serde_json::json!({ "Title": "Old" }))
            .unwrap();
        h.documents.commit(&batch).await.unwrap();

        let summary = h.runner.rebuild(&urls(&["a"])).await.unwrap();

        assert_eq!(summary.ingested, 1);
        assert_eq!(h.documents.count(&podcasts()), 1);
        assert!(
            !h.documents
                .exists(&podcasts().doc("stale"))
                .await
                .unwrap()
        );
    }

    #[tokio::test]
    async fn delete_removes_podcasts_and_episodes() {
        let h = harness(web(&[("a", 2), ("b", 1)]), Duration::from_secs(10));
        h.runner.ingest_feeds(&urls(&["a", "b"]), IngestMode::All).await;

        let stats = h.runner.delete().await.unwrap();

        assert_eq!(stats.documents, 2);
        assert_eq!(h.documents.count(&podcasts()), 0);
        assert_eq!(h.documents.count(&episodes_of("https://a.test/feed")), 0);
    }
}
