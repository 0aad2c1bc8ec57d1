// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Document and object storage.
//!
//! Documents live in named collections and are addressed by ID. A document
//! can own nested sub-collections (`podcasts/{id}/episodes/{episode_id}`).
//! Writes go through [`WriteBatch`]es that are applied as one commit and are
//! limited to [`MAX_BATCH_WRITES`] operations.

mod fs;
mod memory;

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use serde::Serialize;
use url::Url;

use crate::error::StoreError;

pub use fs::{FsDocumentStore, FsObjectStore};
pub use memory::{MemoryDocumentStore, MemoryObjectStore, StoredObject};

/// Most operations a single batch commit may carry
pub const MAX_BATCH_WRITES: usize = 500;

/// A (possibly nested) collection of documents
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CollectionRef {
    path: String,
}

/// A single document inside a collection
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DocumentRef {
    collection: CollectionRef,
    id: String,
}

impl CollectionRef {
    /// A top-level collection
    pub fn root(name: &str) -> Self {
        Self {
            path: name.to_string(),
        }
    }

    pub fn doc(&self, id: impl Into<String>) -> DocumentRef {
        DocumentRef {
            collection: self.clone(),
            id: id.into(),
        }
    }

    /// Slash separated path, e.g. `podcasts/abc/episodes`
    pub fn path(&self) -> &str {
        &self.path
    }
}

impl DocumentRef {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn collection(&self) -> &CollectionRef {
        &self.collection
    }

    /// A collection nested under this document
    pub fn sub_collection(&self, name: &str) -> CollectionRef {
        CollectionRef {
            path: format!("{}/{}/{}", self.collection.path, self.id, name),
        }
    }

    pub fn path(&self) -> String {
        format!("{}/{}", self.collection.path, self.id)
    }
}

impl fmt::Display for CollectionRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path)
    }
}

impl fmt::Display for DocumentRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.collection.path, self.id)
    }
}

/// A single operation inside a [`WriteBatch`]
#[derive(Debug, Clone, PartialEq)]
pub enum WriteOp {
    /// Create or fully overwrite a document
    Set {
        doc: DocumentRef,
        data: serde_json::Value,
    },
    /// Remove a document together with its sub-collections
    Delete { doc: DocumentRef },
}

/// Operations committed together
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WriteBatch {
    ops: Vec<WriteOp>,
}

impl WriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set<T: Serialize>(&mut self, doc: DocumentRef, value: &T) -> Result<(), StoreError> {
        let data = serde_json::to_value(value)?;
        self.ops.push(WriteOp::Set { doc, data });
        Ok(())
    }

    pub fn delete(&mut self, doc: DocumentRef) {
        self.ops.push(WriteOp::Delete { doc });
    }

    pub fn ops(&self) -> &[WriteOp] {
        &self.ops
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Fail with [`StoreError::BatchTooLarge`] when over `limit`
    pub fn check_limit(&self, limit: usize) -> Result<(), StoreError> {
        if self.ops.len() > limit {
            return Err(StoreError::BatchTooLarge {
                size: self.ops.len(),
                limit,
            });
        }
        Ok(())
    }
}

/// A document database with batched writes
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Whether the document exists. A missing document is `Ok(false)`.
    async fn exists(&self, doc: &DocumentRef) -> Result<bool, StoreError>;

    /// Read a document, `None` when it does not exist
    async fn get(&self, doc: &DocumentRef) -> Result<Option<serde_json::Value>, StoreError>;

    /// Up to `limit` documents of a collection, in a stable order
    async fn list(
        &self,
        collection: &CollectionRef,
        limit: usize,
    ) -> Result<Vec<DocumentRef>, StoreError>;

    /// Apply every operation of `batch`
    async fn commit(&self, batch: &WriteBatch) -> Result<(), StoreError>;

    /// Most operations accepted by a single commit
    fn max_batch_size(&self) -> usize {
        MAX_BATCH_WRITES
    }
}

/// A blob store serving objects from buckets
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        data: Bytes,
        content_type: &str,
    ) -> Result<(), StoreError>;

    /// Make an object readable by anyone
    async fn grant_public_read(&self, bucket: &str, key: &str) -> Result<(), StoreError>;
}

/// A shared reference to a document store
pub type SharedDocumentStore = Arc<dyn DocumentStore>;

/// A shared reference to an object store
pub type SharedObjectStore = Arc<dyn ObjectStore>;

/// URL under which a public object is served, `{base}/{bucket}/{key}`
pub fn public_url(base: &str, bucket: &str, key: &str) -> Result<Url, StoreError> {
    let url = format!("{}/{}/{}", base.trim_end_matches('/'), bucket, key);
    Url::parse(&url).map_err(|e| StoreError::InvalidKey(format!("{url}: {e}")))
}

/// Reject names that could escape their parent when used as a path segment
pub(crate) fn check_segment(segment: &str) -> Result<(), StoreError> {
    if segment.is_empty()
        || segment == "."
        || segment == ".."
        || segment.contains(['/', '\\', '\0'])
    {
        return Err(StoreError::InvalidKey(segment.to_string()));
    }
    Ok(())
}
