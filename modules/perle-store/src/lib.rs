//! Flat-file store of perle and their publish status.
//!
//! The whole collection lives in one JSON document, `{ "items": [...] }`,
//! read and rewritten wholesale. Writes go to a sibling temp file that is
//! fsynced and renamed over the target, so a crash leaves either the old
//! or the new document on disk.

pub mod error;

pub use error::{Result, StoreError};

use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use perle_common::{ContentItem, ItemId, Publication};

#[derive(Serialize)]
struct StoreDocument<'a> {
    items: &'a [ContentItem],
}

/// Items are parsed one by one so a single malformed record does not take
/// the rest of the store down with it.
#[derive(Deserialize)]
struct RawStoreDocument {
    items: Vec<serde_json::Value>,
}

/// Counts for status output and cycle logging.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct StoreStats {
    pub total: usize,
    pub published: usize,
    pub unpublished: usize,
}

impl fmt::Display for StoreStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "total={} published={} unpublished={}",
            self.total, self.published, self.unpublished
        )
    }
}

pub struct ContentStore {
    path: PathBuf,
    /// Serializes read-modify-write sequences.
    write_lock: Mutex<()>,
}

impl ContentStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the persisted collection. Missing or unreadable storage yields an
    /// empty collection and a freshly written empty store; this never fails.
    pub async fn load(&self) -> Vec<ContentItem> {
        let _guard = self.write_lock.lock().await;
        self.load_unlocked().await
    }

    /// Add every candidate whose id is not yet stored, unpublished and stamped
    /// with the current time. Returns how many were added. The store is
    /// written once at the end, and not at all when nothing was added.
    pub async fn merge(&self, candidates: Vec<ContentItem>) -> Result<usize> {
        let _guard = self.write_lock.lock().await;
        let mut items = self.load_unlocked().await;

        let mut known: HashSet<ItemId> = items.iter().map(|i| i.id.clone()).collect();
        let now = Utc::now();
        let mut added = 0usize;

        for candidate in candidates {
            if known.contains(&candidate.id) {
                continue;
            }
            known.insert(candidate.id.clone());
            items.push(candidate.into_ingested(now));
            added += 1;
        }

        if added > 0 {
            self.persist(&items).await?;
        }
        debug!(added, total = items.len(), "Merged candidates into store");
        Ok(added)
    }

    /// Unpublished items in store order.
    pub async fn unpublished_items(&self) -> Vec<ContentItem> {
        self.load()
            .await
            .into_iter()
            .filter(|i| !i.is_published())
            .collect()
    }

    pub async fn get(&self, id: &ItemId) -> Option<ContentItem> {
        self.load().await.into_iter().find(|i| &i.id == id)
    }

    /// Record a confirmed delivery.
    ///
    /// Unknown ids return [`StoreError::NotFound`]. Publishing an item that is
    /// already published changes nothing and returns its original publication.
    pub async fn mark_published(&self, id: &ItemId, reference: &str) -> Result<Publication> {
        let _guard = self.write_lock.lock().await;
        let mut items = self.load_unlocked().await;

        let item = items
            .iter_mut()
            .find(|i| &i.id == id)
            .ok_or_else(|| StoreError::NotFound(id.clone()))?;

        if !item.publish(reference, Utc::now()) {
            info!(item_id = %id, "Item already published, keeping first publication");
            return item
                .publication()
                .cloned()
                .ok_or_else(|| StoreError::NotFound(id.clone()));
        }

        let publication = item
            .publication()
            .cloned()
            .ok_or_else(|| StoreError::NotFound(id.clone()))?;
        self.persist(&items).await?;
        info!(item_id = %id, reference, "Item marked published");
        Ok(publication)
    }

    pub async fn stats(&self) -> StoreStats {
        let items = self.load().await;
        let published = items.iter().filter(|i| i.is_published()).count();
        StoreStats {
            total: items.len(),
            published,
            unpublished: items.len() - published,
        }
    }

    async fn load_unlocked(&self) -> Vec<ContentItem> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(b) => b,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!(path = %self.path.display(), "Store file missing, creating empty store");
                self.reinitialize().await;
                return Vec::new();
            }
            Err(e) => {
                error!(path = %self.path.display(), error = %e, "Store file unreadable, moving aside and starting empty");
                self.quarantine().await;
                self.reinitialize().await;
                return Vec::new();
            }
        };

        let raw: RawStoreDocument = match serde_json::from_slice(&bytes) {
            Ok(doc) => doc,
            Err(e) => {
                error!(path = %self.path.display(), error = %e, "Store file corrupt, reinitializing");
                self.quarantine().await;
                self.reinitialize().await;
                return Vec::new();
            }
        };

        let mut seen = HashSet::new();
        let mut items = Vec::with_capacity(raw.items.len());
        let mut rejected = 0usize;

        for value in raw.items {
            match serde_json::from_value::<ContentItem>(value) {
                Ok(item) if seen.insert(item.id.clone()) => items.push(item),
                Ok(item) => {
                    warn!(item_id = %item.id, "Duplicate id in store file, keeping first");
                    rejected += 1;
                }
                Err(e) => {
                    warn!(error = %e, "Dropping malformed store record");
                    rejected += 1;
                }
            }
        }

        if rejected > 0 {
            // One backup, then rewrite without the rejected records so later
            // reads find a clean file.
            self.quarantine_copy().await;
            match self.persist(&items).await {
                Ok(()) => info!(rejected, kept = items.len(), "Store rewritten without rejected records"),
                Err(e) => error!(error = %e, "Failed to rewrite cleaned store"),
            }
        }

        items
    }

    async fn reinitialize(&self) {
        if let Err(e) = self.persist(&[]).await {
            error!(path = %self.path.display(), error = %e, "Failed to write empty store");
        }
    }

    fn quarantine_path(&self) -> PathBuf {
        let stamp = Utc::now().format("%Y%m%dT%H%M%S");
        let name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "store.json".to_string());
        self.path.with_file_name(format!("{name}.corrupt-{stamp}"))
    }

    async fn quarantine(&self) {
        let target = self.quarantine_path();
        match tokio::fs::rename(&self.path, &target).await {
            Ok(()) => warn!(moved_to = %target.display(), "Corrupt store moved aside"),
            Err(e) => warn!(error = %e, "Failed to move corrupt store aside"),
        }
    }

    async fn quarantine_copy(&self) {
        let target = self.quarantine_path();
        if let Err(e) = tokio::fs::copy(&self.path, &target).await {
            warn!(error = %e, "Failed to back up store with rejected records");
        }
    }

    async fn persist(&self, items: &[ContentItem]) -> Result<()> {
        let parent = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        tokio::fs::create_dir_all(&parent)
            .await
            .map_err(|e| StoreError::io(&parent, e))?;

        let bytes = serde_json::to_vec_pretty(&StoreDocument { items })
            .map_err(|e| StoreError::Serialize(e.to_string()))?;

        let tmp = parent.join(format!(
            ".{}.tmp-{}",
            self.path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
            uuid::Uuid::new_v4().simple()
        ));

        let write = async {
            let mut file = tokio::fs::File::create(&tmp).await?;
            file.write_all(&bytes).await?;
            file.sync_all().await?;
            drop(file);
            tokio::fs::rename(&tmp, &self.path).await
        };

        if let Err(e) = write.await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(StoreError::io(&self.path, e));
        }

        // Best effort: make the rename itself durable.
        if let Ok(dir) = tokio::fs::File::open(&parent).await {
            let _ = dir.sync_all().await;
        }
        Ok(())
    }
}
