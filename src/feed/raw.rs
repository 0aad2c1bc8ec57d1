// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use chrono::{DateTime, Utc};

/// A feed as delivered by the parser, before any validation.
///
/// RSS and Atom documents are both mapped into this shape. Strings that the
/// source leaves out are empty rather than `None` unless the absence itself
/// drives a fallback (author, image, self link, GUID).
#[derive(Debug, Clone, Default)]
pub struct RawFeed {
    pub title: String,
    pub description: String,
    pub link: String,
    /// Self link of the document (`atom:link rel="self"`)
    pub feed_link: Option<String>,
    pub author: Option<RawPerson>,
    pub image: Option<RawImage>,
    pub language: String,
    pub copyright: String,
    pub categories: Vec<String>,
    /// `itunes:explicit`
    pub explicit: String,
    /// `itunes:owner`
    pub owner: Option<RawPerson>,
    pub items: Vec<RawItem>,
}

#[derive(Debug, Clone, Default)]
pub struct RawItem {
    pub title: String,
    pub description: String,
    pub link: Option<String>,
    pub guid: Option<String>,
    pub published: Option<DateTime<Utc>>,
    pub author: Option<RawPerson>,
    pub image: Option<RawImage>,
    pub enclosures: Vec<RawEnclosure>,
    pub itunes: RawItunesItem,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawPerson {
    pub name: String,
    pub email: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawImage {
    pub title: String,
    pub url: String,
}

/// Media attachment exactly as written in the feed
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawEnclosure {
    pub url: String,
    pub mime_type: String,
    /// Byte length, possibly empty or garbage
    pub length: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawItunesItem {
    pub summary: String,
    pub explicit: String,
    pub duration: String,
    pub keywords: String,
}

impl RawPerson {
    /// Parse the free-form contact strings found in feeds.
    ///
    /// Understands `email (Name)`, `Name <email>`, a bare email and a bare
    /// name.
    pub fn parse(value: &str) -> Self {
        let value = value.trim();

        if let Some((email, rest)) = value.split_once('(')
            && let Some(name) = rest.strip_suffix(')')
        {
            return Self {
                name: name.trim().to_string(),
                email: email.trim().to_string(),
            };
        }

        if let Some((name, rest)) = value.split_once('<')
            && let Some(email) = rest.strip_suffix('>')
        {
            return Self {
                name: name.trim().trim_matches('"').to_string(),
                email: email.trim().to_string(),
            };
        }

        if value.contains('@') && !value.contains(' ') {
            return Self {
                name: String::new(),
                email: value.to_string(),
            };
        }

        Self {
            name: value.to_string(),
            email: String::new(),
        }
    }
}
