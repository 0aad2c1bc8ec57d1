// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::io::Cursor;

use bytes::Bytes;
use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView, ImageFormat};

use crate::config::RetryConfig;
use crate::error::ThumbnailError;
use crate::http::HttpClient;
use crate::retry::with_retry;

/// A PNG-encoded thumbnail
#[derive(Debug, Clone)]
pub struct Thumbnail {
    pub png: Bytes,
    pub width: u32,
    pub height: u32,
    /// Format the source image was decoded from
    pub source_format: ImageFormat,
}

/// Fetch an image and shrink it so neither edge exceeds `max_edge`
pub async fn generate_thumbnail<C: HttpClient>(
    client: &C,
    source_url: &str,
    max_edge: u32,
    retry: &RetryConfig,
) -> Result<Thumbnail, ThumbnailError> {
    let bytes = with_retry(retry, || async move {
        client
            .get_bytes(source_url)
            .await
            .map_err(|e| ThumbnailError::FetchFailed {
                url: source_url.to_string(),
                source: e,
            })
    })
    .await?;

    tracing::debug!(url = source_url, bytes = bytes.len(), "Fetched source image");

    tokio::task::spawn_blocking(move || thumbnail_from_bytes(&bytes, max_edge)).await?
}

/// Decode, resize and re-encode an image held in memory
pub fn thumbnail_from_bytes(bytes: &[u8], max_edge: u32) -> Result<Thumbnail, ThumbnailError> {
    let source_format = image::guess_format(bytes).map_err(ThumbnailError::DecodeFailed)?;
    let source = image::load_from_memory_with_format(bytes, source_format)
        .map_err(ThumbnailError::DecodeFailed)?;

    let thumb = resize_to_fit(source, max_edge);
    let (width, height) = thumb.dimensions();

    let mut png = Vec::new();
    thumb
        .write_to(&mut Cursor::new(&mut png), ImageFormat::Png)
        .map_err(ThumbnailError::EncodeFailed)?;

    Ok(Thumbnail {
        png: Bytes::from(png),
        width,
        height,
        source_format,
    })
}

/// Scale down preserving aspect ratio with nearest-neighbour sampling.
///
/// Images already within bounds are returned untouched.
pub fn resize_to_fit(image: DynamicImage, max_edge: u32) -> DynamicImage {
    let (width, height) = image.dimensions();
    if width <= max_edge && height <= max_edge {
        return image;
    }
    image.resize(max_edge, max_edge, FilterType::Nearest)
}
