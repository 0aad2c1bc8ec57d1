// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use sha2::{Digest, Sha256};

/// Derive a stable document ID from arbitrary input.
///
/// Returns the lowercase hex SHA-256 digest (64 characters). Used for
/// `Podcast.id` (from the feed link) and `Episode.id` (from the GUID).
pub fn content_id(input: &str) -> String {
    format!("{:x}", Sha256::digest(input.as_bytes()))
}
