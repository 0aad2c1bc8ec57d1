// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::podcast::{Author, Image};

/// An episode document, stored under `podcasts/{podcast_id}/episodes`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Episode {
    #[serde(rename = "PodcastID")]
    pub podcast_id: String,
    /// Content hash of `guid`
    #[serde(rename = "ID")]
    pub id: String,
    pub title: String,
    pub published: Option<DateTime<Utc>>,
    pub author: Author,
    pub description: String,
    pub image: Image,
    /// Never empty; the first entry is the playable audio file
    pub enclosures: Vec<Enclosure>,
    #[serde(rename = "GUID")]
    pub guid: String,
    #[serde(rename = "ITunesEpisodeExt")]
    pub itunes: ItunesEpisodeExt,
}

/// A media file attached to an episode
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Enclosure {
    #[serde(rename = "URL")]
    pub url: String,
    #[serde(rename = "Type")]
    pub mime_type: String,
    /// Size in bytes, 0 when the feed does not say
    #[serde(rename = "Length")]
    pub length: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ItunesEpisodeExt {
    pub summary: String,
    pub explicit: String,
    pub duration: String,
    pub keywords: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    #[test]
    fn serializes_with_document_field_names() {
        let episode = Episode {
            podcast_id: "p1".to_string(),
            id: "e1".to_string(),
            title: "Episode".to_string(),
            published: Some(Utc.with_ymd_and_hms(2024, 1, 15, 12, 0, 0).unwrap()),
            author: Author::default(),
            description: String::new(),
            image: Image::new("Art", "https://example.com/art.png"),
            enclosures: vec![Enclosure {
                url: "https://cdn.test/ep1.mp3".to_string(),
                mime_type: "audio/mpeg".to_string(),
                length: 1234000,
            }],
            guid: "guid-1".to_string(),
            itunes: ItunesEpisodeExt {
                duration: "30:00".to_string(),
                ..Default::default()
            },
        };

        let value = serde_json::to_value(&episode).unwrap();

        assert_eq!(value["PodcastID"], json!("p1"));
        assert_eq!(value["GUID"], json!("guid-1"));
        assert_eq!(value["Published"], json!("2024-01-15T12:00:00Z"));
        assert_eq!(value["Enclosures"][0]["Type"], json!("audio/mpeg"));
        assert_eq!(value["Enclosures"][0]["Length"], json!(1234000));
        assert_eq!(value["ITunesEpisodeExt"]["Duration"], json!("30:00"));
    }

    #[test]
    fn missing_publish_date_serializes_as_null() {
        let episode = Episode {
            podcast_id: "p1".to_string(),
            id: "e1".to_string(),
            title: String::new(),
            published: None,
            author: Author::default(),
            description: String::new(),
            image: Image::default(),
            enclosures: vec![],
            guid: String::new(),
            itunes: ItunesEpisodeExt::default(),
        };

        let value = serde_json::to_value(&episode).unwrap();
        assert!(value["Published"].is_null());
    }
}
