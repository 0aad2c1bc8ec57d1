// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! In-memory stores used for dry runs and tests.

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use bytes::Bytes;

use super::{
    CollectionRef, DocumentRef, DocumentStore, MAX_BATCH_WRITES, ObjectStore, WriteBatch, WriteOp,
};
use crate::error::StoreError;

/// Documents keyed by collection path, then by document ID
#[derive(Debug, Default)]
struct Documents {
    collections: BTreeMap<String, BTreeMap<String, serde_json::Value>>,
    commit_sizes: Vec<usize>,
    list_sizes: Vec<usize>,
    failing_commits: usize,
}

/// A [`DocumentStore`] holding everything in process memory
#[derive(Debug)]
pub struct MemoryDocumentStore {
    inner: Mutex<Documents>,
    max_batch_size: usize,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::with_max_batch_size(MAX_BATCH_WRITES)
    }

    pub fn with_max_batch_size(max_batch_size: usize) -> Self {
        Self {
            inner: Mutex::new(Documents::default()),
            max_batch_size,
        }
    }

    /// Make the next `count` commits fail with a transient backend error
    pub fn fail_next_commits(&self, count: usize) {
        self.lock().failing_commits = count;
    }

    /// Number of operations in every successful commit so far
    pub fn commit_sizes(&self) -> Vec<usize> {
        self.lock().commit_sizes.clone()
    }

    /// Number of documents returned by every `list` call so far
    pub fn list_sizes(&self) -> Vec<usize> {
        self.lock().list_sizes.clone()
    }

    /// Number of documents directly inside `collection`
    pub fn count(&self, collection: &CollectionRef) -> usize {
        self.lock()
            .collections
            .get(collection.path())
            .map_or(0, BTreeMap::len)
    }

    fn lock(&self) -> MutexGuard<'_, Documents> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for MemoryDocumentStore {
    fn default() -> Self {
        Self::new()
    }
}

impl Documents {
    fn delete(&mut self, doc: &DocumentRef) {
        if let Some(collection) = self.collections.get_mut(doc.collection().path()) {
            collection.remove(doc.id());
        }

        let nested = format!("{}/", doc.path());
        self.collections.retain(|path, _| !path.starts_with(&nested));
    }
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn exists(&self, doc: &DocumentRef) -> Result<bool, StoreError> {
        Ok(self
            .lock()
            .collections
            .get(doc.collection().path())
            .is_some_and(|c| c.contains_key(doc.id())))
    }

    async fn get(&self, doc: &DocumentRef) -> Result<Option<serde_json::Value>, StoreError> {
        Ok(self
            .lock()
            .collections
            .get(doc.collection().path())
            .and_then(|c| c.get(doc.id()))
            .cloned())
    }

    async fn list(
        &self,
        collection: &CollectionRef,
        limit: usize,
    ) -> Result<Vec<DocumentRef>, StoreError> {
        let mut inner = self.lock();
        let docs: Vec<DocumentRef> = inner
            .collections
            .get(collection.path())
            .map(|c| c.keys().take(limit).map(|id| collection.doc(id.clone())).collect())
            .unwrap_or_default();
        inner.list_sizes.push(docs.len());

        Ok(docs)
    }

    async fn commit(&self, batch: &WriteBatch) -> Result<(), StoreError> {
        batch.check_limit(self.max_batch_size)?;

        let mut inner = self.lock();
        if inner.failing_commits > 0 {
            inner.failing_commits -= 1;
            return Err(StoreError::Backend {
                message: "injected commit failure".to_string(),
                transient: true,
            });
        }

        for op in batch.ops() {
            match op {
                WriteOp::Set { doc, data } => {
                    inner
                        .collections
                        .entry(doc.collection().path().to_string())
                        .or_default()
                        .insert(doc.id().to_string(), data.clone());
                }
                WriteOp::Delete { doc } => inner.delete(doc),
            }
        }
        inner.commit_sizes.push(batch.len());

        Ok(())
    }

    fn max_batch_size(&self) -> usize {
        self.max_batch_size
    }
}

/// An object held by [`MemoryObjectStore`]
#[derive(Debug, Clone, PartialEq)]
pub struct StoredObject {
    pub data: Bytes,
    pub content_type: String,
    pub public: bool,
}

/// An [`ObjectStore`] holding everything in process memory
#[derive(Debug, Default)]
pub struct MemoryObjectStore {
    objects: Mutex<BTreeMap<(String, String), StoredObject>>,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, bucket: &str, key: &str) -> Option<StoredObject> {
        self.lock()
            .get(&(bucket.to_string(), key.to_string()))
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<(String, String), StoredObject>> {
        self.objects.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        data: Bytes,
        content_type: &str,
    ) -> Result<(), StoreError> {
        self.lock().insert(
            (bucket.to_string(), key.to_string()),
            StoredObject {
                data,
                content_type: content_type.to_string(),
                public: false,
            },
        );
        Ok(())
    }

    async fn grant_public_read(&self, bucket: &str, key: &str) -> Result<(), StoreError> {
        match self.lock().get_mut(&(bucket.to_string(), key.to_string())) {
            Some(object) => {
                object.public = true;
                Ok(())
            }
            None => Err(StoreError::InvalidKey(format!("{bucket}/{key} does not exist"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn set_then_exists_and_get() {
        let store = MemoryDocumentStore::new();
        let doc = CollectionRef::root("podcasts").doc("abc");

        assert!(!store.exists(&doc).await.unwrap());

        let mut batch = WriteBatch::new();
        batch.set(doc.clone(), &json!({ "Title": "Show" })).unwrap();
        store.commit(&batch).await.unwrap();

        assert!(store.exists(&doc).await.unwrap());
        assert_eq!(store.get(&doc).await.unwrap(), Some(json!({ "Title": "Show" })));
        assert_eq!(store.commit_sizes(), vec![1]);
    }

    #[tokio::test]
    async fn delete_removes_sub_collections() {
        let store = MemoryDocumentStore::new();
        let podcasts = CollectionRef::root("podcasts");
        let podcast = podcasts.doc("abc");
        let episodes = podcast.sub_collection("episodes");

        let mut batch = WriteBatch::new();
        batch.set(podcast.clone(), &json!({})).unwrap();
        batch.set(episodes.doc("e1"), &json!({})).unwrap();
        batch.set(podcasts.doc("abcd"), &json!({})).unwrap();
        store.commit(&batch).await.unwrap();

        let mut batch = WriteBatch::new();
        batch.delete(podcast.clone());
        store.commit(&batch).await.unwrap();

        assert!(!store.exists(&podcast).await.unwrap());
        assert_eq!(store.count(&episodes), 0);
        assert!(store.exists(&podcasts.doc("abcd")).await.unwrap());
    }

    #[tokio::test]
    async fn oversized_batches_are_rejected() {
        let store = MemoryDocumentStore::with_max_batch_size(2);
        let collection = CollectionRef::root("c");

        let mut batch = WriteBatch::new();
        for id in ["a", "b", "c"] {
            batch.set(collection.doc(id), &json!({})).unwrap();
        }

        let result = store.commit(&batch).await;
        assert!(matches!(result, Err(StoreError::BatchTooLarge { size: 3, limit: 2 })));
        assert_eq!(store.count(&collection), 0);
    }

    #[tokio::test]
    async fn list_is_ordered_and_limited() {
        let store = MemoryDocumentStore::new();
        let collection = CollectionRef::root("c");

        let mut batch = WriteBatch::new();
        for id in ["c", "a", "b"] {
            batch.set(collection.doc(id), &json!({})).unwrap();
        }
        store.commit(&batch).await.unwrap();

        let listed = store.list(&collection, 2).await.unwrap();
        let ids: Vec<_> = listed.iter().map(DocumentRef::id).collect();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn injected_failures_are_transient() {
        let store = MemoryDocumentStore::new();
        store.fail_next_commits(1);

        let mut batch = WriteBatch::new();
        batch.set(CollectionRef::root("c").doc("a"), &json!({})).unwrap();

        assert!(matches!(
            store.commit(&batch).await,
            Err(StoreError::Backend { transient: true, .. })
        ));
        assert!(store.commit(&batch).await.is_ok());
    }

    #[tokio::test]
    async fn objects_become_public_on_grant() {
        let store = MemoryObjectStore::new();
        store
            .put_object("thumbs", "abc.png", Bytes::from_static(b"png"), "image/png")
            .await
            .unwrap();

        assert!(!store.get("thumbs", "abc.png").unwrap().public);
        store.grant_public_read("thumbs", "abc.png").await.unwrap();

        let object = store.get("thumbs", "abc.png").unwrap();
        assert!(object.public);
        assert_eq!(object.content_type, "image/png");
    }

    #[tokio::test]
    async fn granting_missing_object_fails() {
        let store = MemoryObjectStore::new();
        assert!(store.grant_public_read("thumbs", "nope.png").await.is_err());
    }
}
