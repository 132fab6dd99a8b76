//! # Entry Store
//!
//! Holds the current identity's entries, newest first, exactly as the last
//! successful remote query returned them. The cache is only ever replaced
//! wholesale:
//!
//! - an identity change clears it and re-fetches for the new owner;
//! - `create`, `update` and `delete` perform the remote mutation and then
//!   re-fetch the whole list;
//! - a failed call leaves the last fetched list in place.
//!
//! Mutations are scoped by entry id *and* owner id, so an id belonging to another
//! account matches nothing and reports [`DiaryError::NotFound`].
//!
//! [`filter_by_category`](EntryStore::filter_by_category) and
//! [`search`](EntryStore::search) are pure reads over the cache.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use chrono::Utc;

use crate::backend::{file_extension, image_content_type, Filter, Order, StorageApi, TableApi};
use crate::config::DiaryConfig;
use crate::error::{DiaryError, Result};
use crate::models::{
    from_row, to_row, Category, DiaryEntry, EntryDraft, EntryPatch, EntryRow, Identity,
    NewEntryRow,
};

#[derive(Debug, Default)]
struct EntryState {
    owner: Option<Identity>,
    entries: Vec<DiaryEntry>,
    loading: bool,
    /// Bumped on every owner change; a fetch started under an older generation
    /// is discarded.
    generation: u64,
}

/// Cached entry list plus the entry operations.
#[derive(Clone)]
pub struct EntryStore<B: TableApi + StorageApi> {
    backend: B,
    table: String,
    image_bucket: String,
    state: Arc<RwLock<EntryState>>,
    in_flight: Arc<Mutex<HashSet<String>>>,
}

impl<B: TableApi + StorageApi> EntryStore<B> {
    pub fn new(backend: B, config: &DiaryConfig) -> Self {
        Self {
            backend,
            table: config.tables.entries.clone(),
            image_bucket: config.storage.entry_images.clone(),
            state: Arc::new(RwLock::new(EntryState::default())),
            in_flight: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    fn read<T>(&self, f: impl FnOnce(&EntryState) -> T) -> T {
        f(&self.state.read().unwrap_or_else(PoisonError::into_inner))
    }

    fn write<T>(&self, f: impl FnOnce(&mut EntryState) -> T) -> T {
        f(&mut self.state.write().unwrap_or_else(PoisonError::into_inner))
    }

    /// Cached entries, newest first.
    pub fn list(&self) -> Vec<DiaryEntry> {
        self.read(|s| s.entries.clone())
    }

    pub fn get(&self, id: &str) -> Option<DiaryEntry> {
        self.read(|s| s.entries.iter().find(|e| e.id == id).cloned())
    }

    /// Identity the cache belongs to.
    pub fn owner(&self) -> Option<Identity> {
        self.read(|s| s.owner.clone())
    }

    pub fn is_loading(&self) -> bool {
        self.read(|s| s.loading)
    }

    /// Follow an identity change.
    ///
    /// A different owner (or none) clears the cache and re-fetches. The same
    /// owner is a no-op, so token refreshes do not cause a round trip.
    pub async fn set_identity(&self, identity: Option<Identity>) -> Result<()> {
        let changed = self.write(|s| {
            let same = s.owner.as_ref().map(|o| &o.id) == identity.as_ref().map(|i| &i.id);
            if same {
                s.owner = identity.clone();
                return false;
            }
            s.owner = identity.clone();
            s.entries.clear();
            s.generation += 1;
            true
        });
        if !changed {
            return Ok(());
        }
        tracing::debug!(owner = ?identity.as_ref().map(|i| &i.id), "entry owner changed");
        self.refresh().await
    }

    /// Drop the cache and forget the owner.
    pub fn clear(&self) {
        self.write(|s| {
            s.owner = None;
            s.entries.clear();
            s.loading = false;
            s.generation += 1;
        });
    }

    /// Re-fetch the full list for the current owner.
    pub async fn refresh(&self) -> Result<()> {
        let (owner, generation) = self.write(|s| {
            if s.owner.is_some() {
                s.loading = true;
            }
            (s.owner.clone(), s.generation)
        });
        let Some(owner) = owner else {
            return Ok(());
        };

        let fetched = self.fetch(&owner).await;
        self.write(|s| {
            if s.generation != generation {
                tracing::debug!("discarding entry fetch for previous owner");
                return Ok(());
            }
            s.loading = false;
            s.entries = fetched?;
            Ok(())
        })
    }

    async fn fetch(&self, owner: &Identity) -> Result<Vec<DiaryEntry>> {
        let rows = self
            .backend
            .query(
                &self.table,
                &Filter::new().eq("user_id", owner.id.as_str()),
                Some(&Order::desc("created_at")),
            )
            .await?;
        let entries = rows
            .into_iter()
            .map(|row| from_row::<EntryRow>(row).map(EntryRow::into_entry))
            .collect::<Result<Vec<_>>>()?;
        tracing::debug!(count = entries.len(), "fetched entries");
        Ok(entries)
    }

    fn require_owner(&self) -> Result<Identity> {
        self.owner()
            .ok_or_else(|| DiaryError::auth("You must be signed in"))
    }

    /// Mark `id` busy until the returned guard drops.
    pub(crate) fn claim(&self, id: &str) -> Result<InFlight> {
        let mut busy = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
        if !busy.insert(id.to_string()) {
            return Err(DiaryError::InProgress(format!(
                "Another change to entry {id} is still running"
            )));
        }
        Ok(InFlight {
            id: id.to_string(),
            in_flight: self.in_flight.clone(),
        })
    }

    pub async fn create(&self, draft: EntryDraft) -> Result<DiaryEntry> {
        draft.validate()?;
        let owner = self.require_owner()?;
        let now = Utc::now();
        let row = to_row(&NewEntryRow {
            user_id: &owner.id,
            title: draft.title.trim(),
            content: &draft.content,
            category: draft.category,
            image_url: draft.image_url.as_deref(),
            created_at: now,
            updated_at: now,
        })?;

        let stored = self.backend.insert(&self.table, row).await?;
        let entry = from_row::<EntryRow>(stored)?.into_entry();
        tracing::info!(id = %entry.id, "entry created");
        self.refresh().await?;
        Ok(entry)
    }

    pub async fn update(&self, id: &str, patch: EntryPatch) -> Result<()> {
        patch.validate()?;
        let owner = self.require_owner()?;
        let _busy = self.claim(id)?;

        let affected = self
            .backend
            .update(&self.table, &scoped(id, &owner), patch.to_changes(Utc::now()))
            .await?;
        if affected.is_empty() {
            return Err(DiaryError::not_found("Entry not found"));
        }
        tracing::info!(id, "entry updated");
        self.refresh().await
    }

    pub async fn delete(&self, id: &str) -> Result<()> {
        let owner = self.require_owner()?;
        let _busy = self.claim(id)?;

        let removed = self.backend.delete(&self.table, &scoped(id, &owner)).await?;
        if removed.is_empty() {
            return Err(DiaryError::not_found("Entry not found"));
        }
        tracing::info!(id, "entry deleted");
        self.refresh().await
    }

    /// Entries of one category, in list order.
    pub fn filter_by_category(&self, category: Category) -> Vec<DiaryEntry> {
        self.read(|s| {
            s.entries
                .iter()
                .filter(|e| e.category == category)
                .cloned()
                .collect()
        })
    }

    /// Case-insensitive substring search over title and content.
    ///
    /// A blank query returns every entry.
    pub fn search(&self, query: &str) -> Vec<DiaryEntry> {
        let needle = query.trim().to_lowercase();
        self.read(|s| {
            s.entries
                .iter()
                .filter(|e| needle.is_empty() || e.matches(&needle))
                .cloned()
                .collect()
        })
    }

    /// Store an image for an entry and return its public URL.
    pub async fn upload_image(&self, file_name: &str, bytes: Vec<u8>) -> Result<String> {
        let owner = self.require_owner()?;
        if bytes.is_empty() {
            return Err(DiaryError::validation("Image is empty"));
        }
        let ext = file_extension(file_name);
        let path = format!(
            "{}/{}-{}",
            owner.id,
            Utc::now().timestamp_millis(),
            sanitize_file_name(file_name)
        );
        let url = self
            .backend
            .upload_object(&self.image_bucket, &path, bytes, image_content_type(&ext))
            .await?;
        tracing::info!(%path, "entry image uploaded");
        Ok(url)
    }
}

fn scoped(id: &str, owner: &Identity) -> Filter {
    Filter::new().eq("id", id).eq("user_id", owner.id.as_str())
}

fn sanitize_file_name(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    if cleaned.trim_matches('.').is_empty() {
        "image.png".to_string()
    } else {
        cleaned
    }
}

/// Single-in-flight claim on one entry id.
pub(crate) struct InFlight {
    id: String,
    in_flight: Arc<Mutex<HashSet<String>>>,
}

impl Drop for InFlight {
    fn drop(&mut self) {
        self.in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::Row;
    use crate::memory::{row, timestamp, MemoryBackend, Operation};
    use chrono::{Duration, TimeZone};
    use serde_json::json;

    const TABLE: &str = "diary_entries";

    fn store(backend: &MemoryBackend) -> EntryStore<MemoryBackend> {
        EntryStore::new(backend.clone(), &DiaryConfig::default())
    }

    fn ana() -> Identity {
        Identity::new("u-ana", "ana@example.com")
    }

    fn bo() -> Identity {
        Identity::new("u-bo", "bo@example.com")
    }

    fn seed(backend: &MemoryBackend, id: &str, owner: &str, title: &str, days_ago: i64) {
        let at = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap() - Duration::days(days_ago);
        backend.seed_row(
            TABLE,
            row(&[
                ("id", json!(id)),
                ("user_id", json!(owner)),
                ("title", json!(title)),
                ("content", json!(format!("about {title}"))),
                ("category", json!("Personal")),
                ("image_url", json!(null)),
                ("created_at", timestamp(at)),
                ("updated_at", timestamp(at)),
            ]),
        );
    }

    /// Remote rows for `owner`, newest first.
    async fn remote_ids(backend: &MemoryBackend, owner: &Identity) -> Vec<String> {
        backend
            .query(
                TABLE,
                &Filter::new().eq("user_id", owner.id.as_str()),
                Some(&Order::desc("created_at")),
            )
            .await
            .unwrap()
            .iter()
            .map(|r| r["id"].as_str().unwrap().to_string())
            .collect()
    }

    fn ids(entries: &[DiaryEntry]) -> Vec<String> {
        entries.iter().map(|e| e.id.clone()).collect()
    }

    #[tokio::test]
    async fn test_identity_change_loads_only_owner_entries_newest_first() {
        let backend = MemoryBackend::new();
        seed(&backend, "a1", "u-ana", "Old", 3);
        seed(&backend, "a2", "u-ana", "New", 1);
        seed(&backend, "b1", "u-bo", "Bo's", 2);
        let entries = store(&backend);

        entries.set_identity(Some(ana())).await.unwrap();
        assert_eq!(ids(&entries.list()), vec!["a2", "a1"]);
        assert!(!entries.is_loading());

        entries.set_identity(Some(bo())).await.unwrap();
        assert_eq!(ids(&entries.list()), vec!["b1"]);

        entries.set_identity(None).await.unwrap();
        assert!(entries.list().is_empty());
    }

    #[tokio::test]
    async fn test_same_identity_does_not_refetch() {
        let backend = MemoryBackend::new();
        let entries = store(&backend);
        entries.set_identity(Some(ana())).await.unwrap();
        backend.clear_calls();

        entries.set_identity(Some(ana())).await.unwrap();
        assert!(backend.calls().is_empty());
    }

    #[tokio::test]
    async fn test_mutations_keep_cache_equal_to_remote() {
        let backend = MemoryBackend::new();
        seed(&backend, "b1", "u-bo", "Bo's", 2);
        let entries = store(&backend);
        entries.set_identity(Some(ana())).await.unwrap();

        let first = entries
            .create(EntryDraft::new("Paris", "trip", Category::Travel))
            .await
            .unwrap();
        assert_eq!(ids(&entries.list()), remote_ids(&backend, &ana()).await);

        let second = entries
            .create(EntryDraft::new("Garden", "roses", Category::Home))
            .await
            .unwrap();
        assert_eq!(ids(&entries.list()), remote_ids(&backend, &ana()).await);

        entries
            .update(
                &first.id,
                EntryPatch {
                    title: Some("Paris again".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(entries.get(&first.id).unwrap().title, "Paris again");
        assert_eq!(ids(&entries.list()), remote_ids(&backend, &ana()).await);

        entries.delete(&second.id).await.unwrap();
        assert_eq!(ids(&entries.list()), vec![first.id.clone()]);
        assert_eq!(ids(&entries.list()), remote_ids(&backend, &ana()).await);
    }

    #[tokio::test]
    async fn test_cross_account_mutation_is_not_found() {
        let backend = MemoryBackend::new();
        seed(&backend, "b1", "u-bo", "Bo's", 2);
        let entries = store(&backend);
        entries.set_identity(Some(ana())).await.unwrap();

        let err = entries.delete("b1").await.unwrap_err();
        assert!(matches!(err, DiaryError::NotFound(_)));
        let err = entries
            .update(
                "b1",
                EntryPatch {
                    content: Some("mine now".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, DiaryError::NotFound(_)));
        assert_eq!(backend.rows(TABLE)[0]["content"], json!("about Bo's"));
    }

    #[tokio::test]
    async fn test_remote_failure_keeps_last_fetched_list() {
        let backend = MemoryBackend::new();
        seed(&backend, "a1", "u-ana", "Kept", 1);
        let entries = store(&backend);
        entries.set_identity(Some(ana())).await.unwrap();

        backend.fail(Operation::Insert(TABLE.into()), "insert failed");
        let err = entries
            .create(EntryDraft::new("Lost", "never stored", Category::Work))
            .await
            .unwrap_err();
        assert_eq!(err, DiaryError::remote("insert failed"));
        assert_eq!(ids(&entries.list()), vec!["a1"]);

        backend.fail(Operation::Query(TABLE.into()), "query failed");
        assert!(entries.refresh().await.is_err());
        assert_eq!(ids(&entries.list()), vec!["a1"]);
        assert!(!entries.is_loading());
    }

    #[tokio::test]
    async fn test_invalid_draft_never_reaches_backend() {
        let backend = MemoryBackend::new();
        let entries = store(&backend);
        entries.set_identity(Some(ana())).await.unwrap();
        backend.clear_calls();

        let err = entries
            .create(EntryDraft::new("", "content", Category::Dream))
            .await
            .unwrap_err();
        assert!(matches!(err, DiaryError::Validation(_)));
        assert!(entries.update("a1", EntryPatch::default()).await.is_err());
        assert!(backend.calls().is_empty());
    }

    #[tokio::test]
    async fn test_concurrent_change_to_same_entry_is_rejected() {
        let backend = MemoryBackend::new();
        seed(&backend, "a1", "u-ana", "Busy", 1);
        let entries = store(&backend);
        entries.set_identity(Some(ana())).await.unwrap();
        backend.clear_calls();

        let busy = entries.claim("a1").unwrap();
        let err = entries.delete("a1").await.unwrap_err();
        assert!(matches!(err, DiaryError::InProgress(_)));
        assert!(backend.calls().is_empty());

        drop(busy);
        entries.delete("a1").await.unwrap();
        assert!(entries.list().is_empty());
    }

    #[tokio::test]
    async fn test_filter_and_search_are_pure() {
        let backend = MemoryBackend::new();
        let entries = store(&backend);
        entries.set_identity(Some(ana())).await.unwrap();
        entries
            .create(EntryDraft::new("Paris", "trip", Category::Travel))
            .await
            .unwrap();
        entries
            .create(EntryDraft::new("Office", "Quarterly review", Category::Work))
            .await
            .unwrap();
        let before = entries.list();

        let first = entries.search("QUARTER");
        assert_eq!(first, entries.search("QUARTER"));
        assert_eq!(first.len(), 1);
        assert_eq!(entries.filter_by_category(Category::Travel).len(), 1);
        assert!(entries.filter_by_category(Category::Dream).is_empty());
        assert_eq!(entries.search("  ").len(), 2);
        assert_eq!(entries.list(), before);
    }

    #[tokio::test]
    async fn test_upload_image_stores_under_owner_folder() {
        let backend = MemoryBackend::new();
        let entries = store(&backend);
        assert!(matches!(
            entries.upload_image("x.png", vec![1]).await,
            Err(DiaryError::Auth(_))
        ));

        entries.set_identity(Some(ana())).await.unwrap();
        let url = entries.upload_image("my photo.JPG", vec![1, 2, 3]).await.unwrap();
        assert!(url.starts_with("memory://storage/entry-images/u-ana/"));
        assert!(url.ends_with("-my_photo.JPG"));
    }

    #[test]
    fn test_sanitize_file_name() {
        assert_eq!(sanitize_file_name("a b/c.png"), "a_b_c.png");
        assert_eq!(sanitize_file_name(".."), "image.png");
    }

    /// Holds back queries for one owner until released.
    #[derive(Clone)]
    struct Stalled {
        inner: MemoryBackend,
        owner: &'static str,
        release: Arc<tokio::sync::Notify>,
    }

    impl TableApi for Stalled {
        async fn query(
            &self,
            table: &str,
            filter: &Filter,
            order: Option<&Order>,
        ) -> Result<Vec<Row>> {
            let rows = self.inner.query(table, filter, order).await;
            let held = filter
                .conditions()
                .iter()
                .any(|(_, v)| v.as_str() == Some(self.owner));
            if held {
                self.release.notified().await;
            }
            rows
        }

        async fn insert(&self, table: &str, row: Row) -> Result<Row> {
            self.inner.insert(table, row).await
        }

        async fn upsert(&self, table: &str, row: Row) -> Result<Row> {
            self.inner.upsert(table, row).await
        }

        async fn update(&self, table: &str, filter: &Filter, changes: Row) -> Result<Vec<Row>> {
            self.inner.update(table, filter, changes).await
        }

        async fn delete(&self, table: &str, filter: &Filter) -> Result<Vec<Row>> {
            self.inner.delete(table, filter).await
        }
    }

    impl StorageApi for Stalled {
        async fn upload_object(
            &self,
            bucket: &str,
            path: &str,
            bytes: Vec<u8>,
            content_type: &str,
        ) -> Result<String> {
            self.inner.upload_object(bucket, path, bytes, content_type).await
        }

        async fn delete_object(&self, bucket: &str, path: &str) -> Result<()> {
            self.inner.delete_object(bucket, path).await
        }
    }

    #[tokio::test]
    async fn test_late_fetch_for_previous_owner_is_discarded() {
        let backend = MemoryBackend::new();
        seed(&backend, "a1", "u-ana", "Ana's", 1);
        seed(&backend, "b1", "u-bo", "Bo's", 2);
        let release = Arc::new(tokio::sync::Notify::new());
        let entries = EntryStore::new(
            Stalled {
                inner: backend.clone(),
                owner: "u-ana",
                release: release.clone(),
            },
            &DiaryConfig::default(),
        );

        let switch = async {
            entries.set_identity(Some(bo())).await.unwrap();
            release.notify_one();
        };
        let (stale, ()) = tokio::join!(entries.set_identity(Some(ana())), switch);

        stale.unwrap();
        assert_eq!(entries.owner().map(|o| o.id), Some("u-bo".to_string()));
        assert_eq!(ids(&entries.list()), vec!["b1"]);
        assert!(!entries.is_loading());
    }
}
