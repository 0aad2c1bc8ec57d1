// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use crate::error::StoreError;
use crate::store::{CollectionRef, DocumentStore, WriteBatch};

/// Counts of an [`erase_collection`] call
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EraseStats {
    pub documents: usize,
    pub batches: usize,
}

/// Delete every document of `collection`, one page per batch commit.
///
/// Stops once a listing comes back empty. Pages already committed stay
/// deleted when a later page fails, so calling this again resumes the work.
pub async fn erase_collection(
    store: &dyn DocumentStore,
    collection: &CollectionRef,
    page_size: usize,
) -> Result<EraseStats, StoreError> {
    let page_size = page_size.min(store.max_batch_size()).max(1);
    let mut stats = EraseStats::default();

    loop {
        let page = store.list(collection, page_size).await?;
        if page.is_empty() {
            break;
        }

        let mut batch = WriteBatch::new();
        for doc in page {
            batch.delete(doc);
        }
        store.commit(&batch).await?;

        stats.documents += batch.len();
        stats.batches += 1;
        tracing::debug!(
            collection = %collection,
            deleted = batch.len(),
            total = stats.documents,
            "Erased page"
        );
    }

    Ok(stats)
}
