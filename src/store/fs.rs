// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Stores backed by a local directory tree.
//!
//! Documents are JSON files at `{root}/{collection path}/{id}.json`; the
//! sub-collections of a document live in the directory `{root}/{collection
//! path}/{id}/`. Objects are files at `{root}/{bucket}/{key}`, and a public
//! object has an empty `{key}.public` marker next to it.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;

use super::{
    CollectionRef, DocumentRef, DocumentStore, MAX_BATCH_WRITES, ObjectStore, WriteBatch, WriteOp,
    check_segment,
};
use crate::error::StoreError;

const DOCUMENT_EXTENSION: &str = "json";
const PUBLIC_MARKER: &str = ".public";

/// A [`DocumentStore`] writing one JSON file per document
#[derive(Debug, Clone)]
pub struct FsDocumentStore {
    root: PathBuf,
}

impl FsDocumentStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn collection_dir(&self, collection: &CollectionRef) -> Result<PathBuf, StoreError> {
        let mut dir = self.root.clone();
        for segment in collection.path().split('/') {
            check_segment(segment)?;
            dir.push(segment);
        }
        Ok(dir)
    }

    fn document_path(&self, doc: &DocumentRef) -> Result<PathBuf, StoreError> {
        check_segment(doc.id())?;
        let dir = self.collection_dir(doc.collection())?;
        Ok(dir.join(format!("{}.{DOCUMENT_EXTENSION}", doc.id())))
    }

    /// Directory holding the sub-collections of `doc`
    fn document_dir(&self, doc: &DocumentRef) -> Result<PathBuf, StoreError> {
        check_segment(doc.id())?;
        Ok(self.collection_dir(doc.collection())?.join(doc.id()))
    }

    async fn delete(&self, doc: &DocumentRef) -> Result<(), StoreError> {
        let path = self.document_path(doc)?;
        remove_if_present(tokio::fs::remove_file(&path).await, &path)?;

        let dir = self.document_dir(doc)?;
        remove_if_present(tokio::fs::remove_dir_all(&dir).await, &dir)
    }
}

#[async_trait]
impl DocumentStore for FsDocumentStore {
    async fn exists(&self, doc: &DocumentRef) -> Result<bool, StoreError> {
        let path = self.document_path(doc)?;
        tokio::fs::try_exists(&path).await.map_err(io_error(&path))
    }

    async fn get(&self, doc: &DocumentRef) -> Result<Option<serde_json::Value>, StoreError> {
        let path = self.document_path(doc)?;
        let content = match tokio::fs::read(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(io_error(&path)(e)),
        };

        serde_json::from_slice(&content)
            .map(Some)
            .map_err(|source| StoreError::Deserialize { path, source })
    }

    async fn list(
        &self,
        collection: &CollectionRef,
        limit: usize,
    ) -> Result<Vec<DocumentRef>, StoreError> {
        let dir = self.collection_dir(collection)?;
        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(io_error(&dir)(e)),
        };

        let mut ids = Vec::new();
        while let Some(entry) = entries.next_entry().await.map_err(io_error(&dir))? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(DOCUMENT_EXTENSION) {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                ids.push(stem.to_string());
            }
        }

        // read_dir order is unspecified
        ids.sort();
        Ok(ids
            .into_iter()
            .take(limit)
            .map(|id| collection.doc(id))
            .collect())
    }

    /// Stage every set as a `.partial` file, then move the whole batch into place.
    ///
    /// Nothing visible changes when a key is invalid, a document fails to
    /// serialize, or a staging write fails.
    async fn commit(&self, batch: &WriteBatch) -> Result<(), StoreError> {
        batch.check_limit(MAX_BATCH_WRITES)?;

        let mut planned = Vec::with_capacity(batch.len());
        for op in batch.ops() {
            planned.push(match op {
                WriteOp::Set { doc, data } => {
                    let path = self.document_path(doc)?;
                    let content = serde_json::to_vec_pretty(data)?;
                    Planned::Set { path, content }
                }
                WriteOp::Delete { doc } => {
                    self.document_path(doc)?;
                    Planned::Delete(doc)
                }
            });
        }

        let mut staged: Vec<(PathBuf, PathBuf)> = Vec::new();
        for plan in &planned {
            if let Planned::Set { path, content } = plan {
                match write_partial(path, content).await {
                    Ok(partial) => staged.push((partial, path.clone())),
                    Err(e) => {
                        discard_partials(&staged).await;
                        return Err(e);
                    }
                }
            }
        }

        let mut staged = staged.into_iter();
        for plan in &planned {
            match plan {
                Planned::Set { .. } => {
                    if let Some((partial, path)) = staged.next() {
                        tokio::fs::rename(&partial, &path)
                            .await
                            .map_err(io_error(&path))?;
                    }
                }
                Planned::Delete(doc) => self.delete(doc).await?,
            }
        }

        tracing::debug!(operations = batch.len(), root = %self.root.display(), "Committed batch");
        Ok(())
    }
}

/// A batch operation with its path resolved and its content serialized
enum Planned<'a> {
    Set { path: PathBuf, content: Vec<u8> },
    Delete(&'a DocumentRef),
}

/// An [`ObjectStore`] writing one file per object
#[derive(Debug, Clone)]
pub struct FsObjectStore {
    root: PathBuf,
}

impl FsObjectStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn object_path(&self, bucket: &str, key: &str) -> Result<PathBuf, StoreError> {
        check_segment(bucket)?;
        check_segment(key)?;
        Ok(self.root.join(bucket).join(key))
    }

    pub async fn is_public(&self, bucket: &str, key: &str) -> Result<bool, StoreError> {
        let marker = marker_path(&self.object_path(bucket, key)?);
        tokio::fs::try_exists(&marker).await.map_err(io_error(&marker))
    }
}

#[async_trait]
impl ObjectStore for FsObjectStore {
    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        data: Bytes,
        content_type: &str,
    ) -> Result<(), StoreError> {
        let path = self.object_path(bucket, key)?;
        write_atomically(&path, &data).await?;

        tracing::debug!(path = %path.display(), content_type, bytes = data.len(), "Stored object");
        Ok(())
    }

    async fn grant_public_read(&self, bucket: &str, key: &str) -> Result<(), StoreError> {
        let path = self.object_path(bucket, key)?;
        if !tokio::fs::try_exists(&path).await.map_err(io_error(&path))? {
            return Err(StoreError::InvalidKey(format!("{bucket}/{key} does not exist")));
        }

        let marker = marker_path(&path);
        tokio::fs::write(&marker, b"").await.map_err(io_error(&marker))
    }
}

fn marker_path(object: &Path) -> PathBuf {
    let mut marker = object.as_os_str().to_owned();
    marker.push(PUBLIC_MARKER);
    PathBuf::from(marker)
}

/// Write to a `.partial` sibling first and rename it into place
async fn write_atomically(path: &Path, content: &[u8]) -> Result<(), StoreError> {
    let partial = write_partial(path, content).await?;
    tokio::fs::rename(&partial, path)
        .await
        .map_err(io_error(path))
}

/// Write `content` next to `path` and return the `.partial` file's path
async fn write_partial(path: &Path, content: &[u8]) -> Result<PathBuf, StoreError> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(io_error(parent))?;
    }

    let mut partial = path.as_os_str().to_owned();
    partial.push(".partial");
    let partial = PathBuf::from(partial);

    tokio::fs::write(&partial, content)
        .await
        .map_err(io_error(&partial))?;
    Ok(partial)
}

async fn discard_partials(staged: &[(PathBuf, PathBuf)]) {
    for (partial, _) in staged {
        if let Err(error) = tokio::fs::remove_file(partial).await {
            tracing::warn!(path = %partial.display(), %error, "Failed to remove staged write");
        }
    }
}

fn remove_if_present(result: std::io::Result<()>, path: &Path) -> Result<(), StoreError> {
    match result {
        Err(e) if e.kind() != ErrorKind::NotFound => Err(io_error(path)(e)),
        _ => Ok(()),
    }
}

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> StoreError + '_ {
    move |source| StoreError::Io {
        path: path.to_path_buf(),
        source,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;

    #[tokio::test]
    async fn documents_are_written_as_json_files() {
        let dir = tempdir().unwrap();
        let store = FsDocumentStore::new(dir.path());
        let doc = CollectionRef::root("podcasts").doc("abc");

        let mut batch = WriteBatch::new();
        batch.set(doc.clone(), &json!({ "Title": "Show" })).unwrap();
        store.commit(&batch).await.unwrap();

        let path = dir.path().join("podcasts").join("abc.json");
        assert!(path.is_file());
        assert!(store.exists(&doc).await.unwrap());
        assert_eq!(store.get(&doc).await.unwrap(), Some(json!({ "Title": "Show" })));

        // No leftovers from the atomic write
        assert!(!dir.path().join("podcasts").join("abc.json.partial").exists());
    }

    #[tokio::test]
    async fn missing_documents_and_collections() {
        let dir = tempdir().unwrap();
        let store = FsDocumentStore::new(dir.path());
        let podcasts = CollectionRef::root("podcasts");

        assert!(!store.exists(&podcasts.doc("nope")).await.unwrap());
        assert_eq!(store.get(&podcasts.doc("nope")).await.unwrap(), None);
        assert!(store.list(&podcasts, 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn list_skips_sub_collection_directories() {
        let dir = tempdir().unwrap();
        let store = FsDocumentStore::new(dir.path());
        let podcasts = CollectionRef::root("podcasts");
        let podcast = podcasts.doc("b");

        let mut batch = WriteBatch::new();
        batch.set(podcast.clone(), &json!({})).unwrap();
        batch.set(podcasts.doc("a"), &json!({})).unwrap();
        batch
            .set(podcast.sub_collection("episodes").doc("e1"), &json!({}))
            .unwrap();
        store.commit(&batch).await.unwrap();

        let ids: Vec<_> = store
            .list(&podcasts, 10)
            .await
            .unwrap()
            .into_iter()
            .map(|d| d.id().to_string())
            .collect();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn delete_removes_document_and_sub_collections() {
        let dir = tempdir().unwrap();
        let store = FsDocumentStore::new(dir.path());
        let podcast = CollectionRef::root("podcasts").doc("abc");
        let episode = podcast.sub_collection("episodes").doc("e1");

        let mut batch = WriteBatch::new();
        batch.set(podcast.clone(), &json!({})).unwrap();
        batch.set(episode.clone(), &json!({})).unwrap();
        store.commit(&batch).await.unwrap();

        let mut batch = WriteBatch::new();
        batch.delete(podcast.clone());
        store.commit(&batch).await.unwrap();

        assert!(!store.exists(&podcast).await.unwrap());
        assert!(!store.exists(&episode).await.unwrap());
        assert!(!dir.path().join("podcasts").join("abc").exists());
    }

    #[tokio::test]
    async fn traversal_ids_are_rejected() {
        let dir = tempdir().unwrap();
        let store = FsDocumentStore::new(dir.path());

        let mut batch = WriteBatch::new();
        batch
            .set(CollectionRef::root("podcasts").doc(".."), &json!({}))
            .unwrap();

        assert!(matches!(
            store.commit(&batch).await,
            Err(StoreError::InvalidKey(_))
        ));
    }

    #[tokio::test]
    async fn invalid_key_late_in_batch_writes_nothing() {
        let dir = tempdir().unwrap();
        let store = FsDocumentStore::new(dir.path());
        let podcasts = CollectionRef::root("podcasts");

        let mut batch = WriteBatch::new();
        batch.set(podcasts.doc("a"), &json!({})).unwrap();
        batch.set(podcasts.doc(".."), &json!({})).unwrap();

        assert!(matches!(
            store.commit(&batch).await,
            Err(StoreError::InvalidKey(_))
        ));
        assert!(!store.exists(&podcasts.doc("a")).await.unwrap());
        assert!(!dir.path().join("podcasts").exists());
    }

    #[tokio::test]
    async fn failed_staging_discards_earlier_writes() {
        let dir = tempdir().unwrap();
        let store = FsDocumentStore::new(dir.path());
        let podcasts = CollectionRef::root("podcasts");
        // A file where the collection directory should go
        std::fs::write(dir.path().join("blocked"), b"").unwrap();

        let mut batch = WriteBatch::new();
        batch.set(podcasts.doc("a"), &json!({})).unwrap();
        batch
            .set(CollectionRef::root("blocked").doc("b"), &json!({}))
            .unwrap();

        assert!(matches!(
            store.commit(&batch).await,
            Err(StoreError::Io { .. })
        ));
        assert!(!store.exists(&podcasts.doc("a")).await.unwrap());
        assert!(!dir.path().join("podcasts").join("a.json.partial").exists());
    }

    #[tokio::test]
    async fn objects_and_public_markers() {
        let dir = tempdir().unwrap();
        let store = FsObjectStore::new(dir.path());

        store
            .put_object("thumbs", "abc.png", Bytes::from_static(b"png"), "image/png")
            .await
            .unwrap();
        assert_eq!(
            std::fs::read(dir.path().join("thumbs").join("abc.png")).unwrap(),
            b"png"
        );
        assert!(!store.is_public("thumbs", "abc.png").await.unwrap());

        store.grant_public_read("thumbs", "abc.png").await.unwrap();
        assert!(store.is_public("thumbs", "abc.png").await.unwrap());
        assert!(dir.path().join("thumbs").join("abc.png.public").is_file());
    }

    #[tokio::test]
    async fn granting_missing_object_fails() {
        let dir = tempdir().unwrap();
        let store = FsObjectStore::new(dir.path());

        assert!(store.grant_public_read("thumbs", "nope.png").await.is_err());
    }
}
