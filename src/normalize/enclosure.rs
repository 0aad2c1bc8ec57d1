// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use url::Url;

use crate::error::ItemError;
use crate::feed::RawEnclosure;
use crate::model::Enclosure;

/// Path suffixes of the primary enclosure that make an episode playable
const PLAYABLE_SUFFIXES: &[&str] = &[".mp3", ".m4a"];

/// Outcome of checking an item's enclosures
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Screening {
    /// The item becomes an episode carrying all of these enclosures
    Playable(Vec<Enclosure>),
    /// The item is dropped without being treated as a failure
    Unplayable(Unplayable),
}

/// Why the primary enclosure was not accepted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Unplayable {
    NoEnclosure,
    NotHttp,
    InvalidUrl,
    UnsupportedFormat,
}

/// Validate every enclosure's length, then classify the item by its first
/// enclosure.
///
/// An unparseable length anywhere in the list fails the item even when the
/// first enclosure would make it unplayable anyway.
pub fn screen_enclosures(raw: &[RawEnclosure]) -> Result<Screening, ItemError> {
    let enclosures = raw
        .iter()
        .map(|enc| {
            Ok(Enclosure {
                url: enc.url.clone(),
                mime_type: enc.mime_type.clone(),
                length: parse_length(enc)?,
            })
        })
        .collect::<Result<Vec<_>, ItemError>>()?;

    let Some(primary) = enclosures.first() else {
        return Ok(Screening::Unplayable(Unplayable::NoEnclosure));
    };

    if !primary.url.starts_with("http") {
        return Ok(Screening::Unplayable(Unplayable::NotHttp));
    }

    let url = match Url::parse(&primary.url) {
        Ok(url) if matches!(url.scheme(), "http" | "https") => url,
        _ => return Ok(Screening::Unplayable(Unplayable::InvalidUrl)),
    };

    // Case-sensitive
    if !PLAYABLE_SUFFIXES.iter().any(|suffix| url.path().ends_with(suffix)) {
        return Ok(Screening::Unplayable(Unplayable::UnsupportedFormat));
    }

    Ok(Screening::Playable(enclosures))
}

fn parse_length(enc: &RawEnclosure) -> Result<u64, ItemError> {
    let value = enc.length.trim();
    if value.is_empty() {
        return Ok(0);
    }

    value
        .parse::<u64>()
        .map_err(|e| ItemError::InvalidEnclosureLength {
            url: enc.url.clone(),
            value: enc.length.clone(),
            source: e,
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(url: &str, length: &str) -> RawEnclosure {
        RawEnclosure {
            url: url.to_string(),
            mime_type: "audio/mpeg".to_string(),
            length: length.to_string(),
        }
    }

    fn playable(screening: Screening) -> Vec<Enclosure> {
        match screening {
            Screening::Playable(enclosures) => enclosures,
            Screening::Unplayable(reason) => panic!("expected playable, got {reason:?}"),
        }
    }

    #[test]
    fn mp3_and_m4a_are_playable() {
        let mp3 = screen_enclosures(&[raw("https://cdn.test/ep1.mp3", "1234000")]).unwrap();
        let m4a = screen_enclosures(&[raw("http://cdn.test/ep1.m4a", "1")]).unwrap();

        assert_eq!(playable(mp3)[0].length, 1234000);
        assert_eq!(playable(m4a).len(), 1);
    }

    #[test]
    fn query_strings_do_not_hide_the_extension() {
        let screening =
            screen_enclosures(&[raw("https://cdn.test/ep1.mp3?token=abc", "")]).unwrap();
        assert!(matches!(screening, Screening::Playable(_)));
    }

    #[test]
    fn mp4_is_unplayable() {
        let screening = screen_enclosures(&[raw("https://cdn.test/ep1.mp4", "10")]).unwrap();
        assert_eq!(
            screening,
            Screening::Unplayable(Unplayable::UnsupportedFormat)
        );
    }

    #[test]
    fn extension_match_is_case_sensitive() {
        let screening = screen_enclosures(&[raw("https://cdn.test/ep1.MP3", "10")]).unwrap();
        assert_eq!(
            screening,
            Screening::Unplayable(Unplayable::UnsupportedFormat)
        );
    }

    #[test]
    fn non_http_primary_is_unplayable() {
        let screening = screen_enclosures(&[raw("ftp://cdn.test/ep1.mp3", "10")]).unwrap();
        assert_eq!(screening, Screening::Unplayable(Unplayable::NotHttp));

        let screening = screen_enclosures(&[raw("/relative/ep1.mp3", "10")]).unwrap();
        assert_eq!(screening, Screening::Unplayable(Unplayable::NotHttp));
    }

    #[test]
    fn http_prefix_without_valid_url_is_unplayable() {
        let screening = screen_enclosures(&[raw("httpfoo://cdn.test/ep1.mp3", "10")]).unwrap();
        assert_eq!(screening, Screening::Unplayable(Unplayable::InvalidUrl));
    }

    #[test]
    fn empty_list_is_unplayable() {
        let screening = screen_enclosures(&[]).unwrap();
        assert_eq!(screening, Screening::Unplayable(Unplayable::NoEnclosure));
    }

    #[test]
    fn empty_length_means_zero() {
        let enclosures = playable(screen_enclosures(&[raw("https://cdn.test/a.mp3", "")]).unwrap());
        assert_eq!(enclosures[0].length, 0);
    }

    #[test]
    fn only_the_first_enclosure_decides() {
        let enclosures = playable(
            screen_enclosures(&[
                raw("https://cdn.test/a.mp3", "1"),
                raw("https://cdn.test/a.mp4", "2"),
                raw("chapters.json", ""),
            ])
            .unwrap(),
        );
        assert_eq!(enclosures.len(), 3);
        assert_eq!(enclosures[2].url, "chapters.json");

        let screening = screen_enclosures(&[
            raw("https://cdn.test/a.mp4", "1"),
            raw("https://cdn.test/a.mp3", "2"),
        ])
        .unwrap();
        assert!(matches!(screening, Screening::Unplayable(_)));
    }

    #[test]
    fn bad_length_anywhere_fails_the_item() {
        let result = screen_enclosures(&[
            raw("https://cdn.test/a.mp3", "1"),
            raw("https://cdn.test/b.mp3", "12 MB"),
        ]);
        assert!(matches!(
            result,
            Err(ItemError::InvalidEnclosureLength { .. })
        ));

        let result = screen_enclosures(&[raw("https://cdn.test/a.mp3", "-5")]);
        assert!(result.is_err());
    }
}
