// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use chrono::{DateTime, FixedOffset, Utc};

use crate::error::FeedError;

use super::raw::{RawEnclosure, RawFeed, RawImage, RawItem, RawItunesItem, RawPerson};

/// Parse feed bytes as RSS 2.0, falling back to Atom 1.0
pub fn parse_feed(xml_bytes: &[u8]) -> Result<RawFeed, FeedError> {
    let rss_err = match rss::Channel::read_from(xml_bytes) {
        Ok(channel) => return Ok(from_rss(&channel)),
        Err(e) => e,
    };

    tracing::debug!(error = %rss_err, "Not an RSS document, trying Atom");

    match atom_syndication::Feed::read_from(xml_bytes) {
        Ok(feed) => Ok(from_atom(&feed)),
        Err(atom_err) => Err(FeedError::UnrecognizedFormat {
            rss: rss_err,
            atom: atom_err,
        }),
    }
}

fn from_rss(channel: &rss::Channel) -> RawFeed {
    let itunes = channel.itunes_ext();
    let dublin_core = channel.dublin_core_ext();

    let author = channel
        .managing_editor()
        .or_else(|| channel.webmaster())
        .or_else(|| dublin_core.and_then(|dc| dc.creators().first().map(String::as_str)))
        .or_else(|| itunes.and_then(|ext| ext.author()))
        .filter(|s| !s.trim().is_empty())
        .map(RawPerson::parse);

    let image = channel
        .image()
        .filter(|img| !img.url().trim().is_empty())
        .map(|img| RawImage {
            title: img.title().to_string(),
            url: img.url().trim().to_string(),
        })
        .or_else(|| {
            itunes.and_then(|ext| ext.image()).map(|url| RawImage {
                title: channel.title().to_string(),
                url: url.trim().to_string(),
            })
        });

    let feed_link = channel.atom_ext().and_then(|atom| {
        atom.links()
            .iter()
            .find(|link| link.rel() == "self")
            .map(|link| link.href().to_string())
    });

    let mut categories: Vec<String> = channel
        .categories()
        .iter()
        .map(|c| c.name().to_string())
        .collect();
    if let Some(ext) = itunes {
        categories.extend(ext.categories().iter().map(|c| c.text().to_string()));
    }

    let copyright = channel
        .copyright()
        .or_else(|| dublin_core.and_then(|dc| dc.rights().first().map(String::as_str)))
        .unwrap_or_default();

    RawFeed {
        title: channel.title().to_string(),
        description: channel.description().to_string(),
        link: channel.link().trim().to_string(),
        feed_link,
        author,
        image,
        language: channel.language().unwrap_or_default().to_string(),
        copyright: copyright.to_string(),
        categories,
        explicit: itunes
            .and_then(|ext| ext.explicit())
            .unwrap_or_default()
            .to_string(),
        owner: itunes.and_then(|ext| ext.owner()).map(|owner| RawPerson {
            name: owner.name().unwrap_or_default().to_string(),
            email: owner.email().unwrap_or_default().to_string(),
        }),
        items: channel.items().iter().map(rss_item).collect(),
    }
}

fn rss_item(item: &rss::Item) -> RawItem {
    let itunes = item.itunes_ext();

    let author = item
        .author()
        .or_else(|| {
            item.dublin_core_ext()
                .and_then(|dc| dc.creators().first().map(String::as_str))
        })
        .or_else(|| itunes.and_then(|ext| ext.author()))
        .filter(|s| !s.trim().is_empty())
        .map(RawPerson::parse);

    let image = itunes.and_then(|ext| ext.image()).map(|url| RawImage {
        title: item.title().unwrap_or_default().to_string(),
        url: url.trim().to_string(),
    });

    let enclosures = item
        .enclosure()
        .map(|enc| RawEnclosure {
            url: enc.url().trim().to_string(),
            mime_type: enc.mime_type().to_string(),
            length: enc.length().to_string(),
        })
        .into_iter()
        .collect();

    let published = item.pub_date().and_then(parse_date);

    RawItem {
        title: item.title().unwrap_or_default().to_string(),
        description: item.description().unwrap_or_default().to_string(),
        link: item.link().map(String::from),
        guid: item
            .guid()
            .map(|g| g.value().trim().to_string())
            .filter(|g| !g.is_empty()),
        published,
        author,
        image,
        enclosures,
        itunes: RawItunesItem {
            summary: itunes
                .and_then(|ext| ext.summary())
                .unwrap_or_default()
                .to_string(),
            explicit: itunes
                .and_then(|ext| ext.explicit())
                .unwrap_or_default()
                .to_string(),
            duration: itunes
                .and_then(|ext| ext.duration())
                .unwrap_or_default()
                .to_string(),
            keywords: itunes
                .and_then(|ext| ext.keywords())
                .unwrap_or_default()
                .to_string(),
        },
    }
}

fn from_atom(feed: &atom_syndication::Feed) -> RawFeed {
    let link_with_rel = |rel: &str| {
        feed.links()
            .iter()
            .find(|link| link.rel() == rel)
            .map(|link| link.href().to_string())
    };

    let image = feed
        .logo()
        .or_else(|| feed.icon())
        .map(|url| RawImage {
            title: feed.title().as_str().to_string(),
            url: url.trim().to_string(),
        });

    RawFeed {
        title: feed.title().as_str().to_string(),
        description: feed
            .subtitle()
            .map(|s| s.as_str().to_string())
            .unwrap_or_default(),
        link: link_with_rel("alternate").unwrap_or_default(),
        feed_link: link_with_rel("self"),
        author: feed.authors().first().map(atom_person),
        image,
        language: feed.lang().unwrap_or_default().to_string(),
        copyright: feed
            .rights()
            .map(|r| r.as_str().to_string())
            .unwrap_or_default(),
        categories: feed
            .categories()
            .iter()
            .map(|c| c.label().unwrap_or(c.term()).to_string())
            .collect(),
        explicit: String::new(),
        owner: None,
        items: feed.entries().iter().map(atom_entry).collect(),
    }
}

fn atom_entry(entry: &atom_syndication::Entry) -> RawItem {
    let enclosures = entry
        .links()
        .iter()
        .filter(|link| link.rel() == "enclosure")
        .map(|link| RawEnclosure {
            url: link.href().trim().to_string(),
            mime_type: link.mime_type().unwrap_or_default().to_string(),
            length: link.length().unwrap_or_default().to_string(),
        })
        .collect();

    let link = entry
        .links()
        .iter()
        .find(|link| link.rel() == "alternate")
        .map(|link| link.href().to_string());

    let description = entry
        .summary()
        .map(|s| s.as_str().to_string())
        .or_else(|| entry.content().and_then(|c| c.value().map(String::from)))
        .unwrap_or_default();

    RawItem {
        title: entry.title().as_str().to_string(),
        description,
        link,
        guid: Some(entry.id().trim().to_string()).filter(|id| !id.is_empty()),
        published: Some(
            entry
                .published()
                .unwrap_or_else(|| entry.updated())
                .with_timezone(&Utc),
        ),
        author: entry.authors().first().map(atom_person),
        image: None,
        enclosures,
        itunes: RawItunesItem::default(),
    }
}

fn atom_person(person: &atom_syndication::Person) -> RawPerson {
    RawPerson {
        name: person.name().to_string(),
        email: person.email().unwrap_or_default().to_string(),
    }
}

/// Parse an RSS date, tolerating the common deviations from RFC 2822
fn parse_date(date_str: &str) -> Option<DateTime<Utc>> {
    let date_str = date_str.trim();

    if let Ok(dt) = DateTime::parse_from_rfc2822(date_str) {
        return Some(dt.with_timezone(&Utc));
    }

    let formats = [
        "%a, %d %b %Y %H:%M:%S %z",
        "%a, %d %b %Y %H:%M %z",
        "%d %b %Y %H:%M:%S %z",
        "%Y-%m-%dT%H:%M:%S%:z",
        "%Y-%m-%d %H:%M:%S %z",
    ];

    formats
        .iter()
        .find_map(|format| DateTime::<FixedOffset>::parse_from_str(date_str, format).ok())
        .or_else(|| DateTime::parse_from_rfc3339(date_str).ok())
        .map(|dt| dt.with_timezone(&Utc))
}
