// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use bytes::Bytes;
use url::Url;

use crate::config::RetryConfig;
use crate::error::FeedError;
use crate::http::HttpClient;
use crate::retry::with_retry;

use super::parse::parse_feed;
use super::raw::RawFeed;

/// Fetch raw feed bytes from a URL (without parsing)
pub async fn fetch_feed_bytes<C: HttpClient>(client: &C, url: &str) -> Result<Bytes, FeedError> {
    let bytes = client
        .get_bytes(url)
        .await
        .map_err(|e| FeedError::FetchFailed {
            url: url.to_string(),
            source: e,
        })?;
    Ok(bytes)
}

/// Fetch and parse a feed, retrying transient fetch failures
pub async fn fetch_feed<C: HttpClient>(
    client: &C,
    url: &str,
    retry: &RetryConfig,
) -> Result<RawFeed, FeedError> {
    Url::parse(url)?;
    let bytes = with_retry(retry, || fetch_feed_bytes(client, url)).await?;
    parse_feed(&bytes)
}
