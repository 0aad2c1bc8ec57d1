// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use serde::{Deserialize, Serialize};

/// A podcast document as stored in the `podcasts` collection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Podcast {
    pub title: String,
    pub author: Author,
    pub description: String,
    /// Validated as an absolute URL, stored as the feed declared it
    pub link: String,
    pub feed_link: String,
    /// Content hash of `feed_link`, byte for byte
    #[serde(rename = "ID")]
    pub id: String,
    pub image_original: Image,
    /// Filled in by the upserter before the document is first written
    pub image_thumbnail: Image,
    pub language: String,
    pub explicit: String,
    pub categories: Vec<String>,
    pub copyright: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Author {
    pub name: String,
    pub email: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Image {
    pub title: String,
    #[serde(rename = "URL")]
    pub url: String,
    /// Encoded image bytes, only kept for thumbnails
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Vec<u8>>,
}

impl Image {
    pub fn new(title: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            url: url.into(),
            data: None,
        }
    }
}
