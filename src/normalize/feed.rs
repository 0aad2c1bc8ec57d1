// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use url::{ParseError, Url};

use crate::error::{ItemError, NormalizeError};
use crate::feed::{RawFeed, RawImage, RawItem, RawPerson};
use crate::identity::content_id;
use crate::model::{Author, Episode, Image, ItunesEpisodeExt, Podcast};

use super::enclosure::{Screening, screen_enclosures};

/// One podcast and the episodes that survived normalization
#[derive(Debug)]
pub struct FeedResult {
    pub podcast: Podcast,
    pub episodes: Vec<Episode>,
    /// Items dropped because of malformed data
    pub failures: Vec<ItemFailure>,
    /// Items dropped because they carry no playable audio
    pub unplayable: usize,
}

/// An item that could not be turned into an episode
#[derive(Debug)]
pub struct ItemFailure {
    pub title: String,
    pub guid: Option<String>,
    pub error: ItemError,
}

/// Convert a parsed feed into the podcast/episode model.
///
/// `source_url` is the URL the feed was fetched from; it stands in for the
/// feed's self link when the document does not declare one.
pub fn normalize(raw: RawFeed, source_url: &str) -> Result<FeedResult, NormalizeError> {
    let feed_link = raw
        .feed_link
        .as_deref()
        .map(str::trim)
        .filter(|link| !link.is_empty())
        .unwrap_or(source_url.trim())
        .to_string();

    let author = resolve_author(raw.author.clone(), raw.owner.as_ref());
    let podcast = build_podcast(&raw, &feed_link, author.clone())?;
    // Validated by build_podcast
    let base = Url::parse(&podcast.link).map_err(|e| NormalizeError::InvalidLink {
        value: podcast.link.clone(),
        source: e,
    })?;

    let fallback_image = RawImage {
        title: podcast.image_original.title.clone(),
        url: podcast.image_original.url.clone(),
    };

    let mut result = FeedResult {
        podcast,
        episodes: Vec::new(),
        failures: Vec::new(),
        unplayable: 0,
    };

    for item in raw.items {
        let title = item.title.clone();
        let guid = item.guid.clone();

        match build_episode(item, &result.podcast.id, &base, &author, &fallback_image) {
            Ok(Some(episode)) => result.episodes.push(episode),
            Ok(None) => result.unplayable += 1,
            Err(error) => {
                tracing::warn!(
                    podcast = %result.podcast.title,
                    item = %title,
                    guid = ?guid,
                    %error,
                    "Skipping malformed item"
                );
                result.failures.push(ItemFailure { title, guid, error });
            }
        }
    }

    tracing::debug!(
        podcast = %result.podcast.title,
        podcast_id = %result.podcast.id,
        episodes = result.episodes.len(),
        unplayable = result.unplayable,
        failed = result.failures.len(),
        "Normalized feed"
    );

    Ok(result)
}

/// Feed author, completed from the iTunes owner where the feed is vague
fn resolve_author(author: Option<RawPerson>, owner: Option<&RawPerson>) -> RawPerson {
    match author {
        Some(mut author) => {
            if author.email.trim().is_empty()
                && let Some(owner) = owner
            {
                author.email = owner.email.clone();
            }
            author
        }
        None => owner.cloned().unwrap_or_default(),
    }
}

fn build_podcast(
    raw: &RawFeed,
    feed_link: &str,
    author: RawPerson,
) -> Result<Podcast, NormalizeError> {
    let link = raw.link.trim();
    Url::parse(link).map_err(|e| NormalizeError::InvalidLink {
        value: raw.link.clone(),
        source: e,
    })?;

    let image = raw.image.clone().unwrap_or_default();
    Url::parse(&image.url).map_err(|e| NormalizeError::InvalidImageUrl {
        value: image.url.clone(),
        source: e,
    })?;

    Url::parse(feed_link).map_err(|e| NormalizeError::InvalidFeedLink {
        value: feed_link.to_string(),
        source: e,
    })?;

    let mut categories: Vec<String> = Vec::with_capacity(raw.categories.len());
    for category in &raw.categories {
        let category = category.trim();
        if !category.is_empty() && !categories.iter().any(|c| c == category) {
            categories.push(category.to_string());
        }
    }

    Ok(Podcast {
        title: raw.title.clone(),
        author: Author {
            name: author.name,
            email: author.email,
        },
        description: raw.description.clone(),
        link: link.to_string(),
        feed_link: feed_link.to_string(),
        id: content_id(feed_link),
        image_original: Image::new(image.title, image.url),
        image_thumbnail: Image::default(),
        language: raw.language.clone(),
        explicit: raw.explicit.clone(),
        categories,
        copyright: raw.copyright.clone(),
    })
}

/// Build an episode, or `None` when the item has nothing playable
fn build_episode(
    item: RawItem,
    podcast_id: &str,
    base: &Url,
    podcast_author: &RawPerson,
    podcast_image: &RawImage,
) -> Result<Option<Episode>, ItemError> {
    let author = match item.author {
        Some(author) if !author.email.trim().is_empty() => author,
        _ => podcast_author.clone(),
    };

    let image = item
        .image
        .filter(|image| !image.url.trim().is_empty())
        .unwrap_or_else(|| podcast_image.clone());
    // Relative item artwork resolves against the podcast's site
    let raw_url = image.url.trim();
    let image_url = match Url::parse(raw_url) {
        Ok(_) => raw_url.to_string(),
        Err(ParseError::RelativeUrlWithoutBase) => base
            .join(raw_url)
            .map_err(|e| ItemError::InvalidImageUrl {
                value: image.url.clone(),
                source: e,
            })?
            .to_string(),
        Err(e) => {
            return Err(ItemError::InvalidImageUrl {
                value: image.url.clone(),
                source: e,
            });
        }
    };

    let enclosures = match screen_enclosures(&item.enclosures)? {
        Screening::Playable(enclosures) => enclosures,
        Screening::Unplayable(reason) => {
            tracing::trace!(item = %item.title, ?reason, "Dropping unplayable item");
            return Ok(None);
        }
    };

    // Playable items always have a primary enclosure URL to fall back on
    let guid = item
        .guid
        .or_else(|| enclosures.first().map(|enc| enc.url.clone()))
        .or(item.link)
        .unwrap_or_default();

    Ok(Some(Episode {
        podcast_id: podcast_id.to_string(),
        id: content_id(&guid),
        title: item.title,
        published: item.published,
        author: Author {
            name: author.name,
            email: author.email,
        },
        description: item.description,
        image: Image::new(image.title, image_url),
        enclosures,
        guid,
        itunes: ItunesEpisodeExt {
            summary: item.itunes.summary,
            explicit: item.itunes.explicit,
            duration: item.itunes.duration,
            keywords: item.itunes.keywords,
        },
    }))
}
