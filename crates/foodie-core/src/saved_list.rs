// The user's saved restaurants, split into favorites and pending
use std::sync::Arc;

use foodie_store::KvStore;
use tokio::sync::Mutex;
use tracing::{debug, error, info};

use crate::{
    models::{ListKind, SavedRestaurant},
    Result,
};

/// What a `save` call actually did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveOutcome {
    Saved,
    /// The id was already on that list; nothing was written
    AlreadySaved,
}

/// What a `remove` call actually did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoveOutcome {
    Removed,
    NotFound,
}

/// Durable favorites/pending lists on top of a key-value store
///
/// Each list is one JSON array under its own key. Read-modify-write on a
/// list runs under that list's lock, so concurrent saves never drop each
/// other's entries. The two lists never read each other: the same id may
/// sit on both.
pub struct SavedListStore {
    store: Arc<dyn KvStore>,
    favorites_lock: Mutex<()>,
    pending_lock: Mutex<()>,
}

impl SavedListStore {
    pub fn new(store: Arc<dyn KvStore>) -> Self {
        Self {
            store,
            favorites_lock: Mutex::new(()),
            pending_lock: Mutex::new(()),
        }
    }

    fn lock_for(&self, list: ListKind) -> &Mutex<()> {
        match list {
            ListKind::Favorites => &self.favorites_lock,
            ListKind::Pending => &self.pending_lock,
        }
    }

    /// Add a restaurant to the list named by `restaurant.list`
    ///
    /// Saving an id that is already on that list is a quiet no-op.
    pub async fn save(&self, restaurant: SavedRestaurant) -> Result<SaveOutcome> {
        let list = restaurant.list;
        let _guard = self.lock_for(list).lock().await;

        let mut entries = self.read(list)?;
        if entries.iter().any(|r| r.id == restaurant.id) {
            return Ok(SaveOutcome::AlreadySaved);
        }

        info!("Saving {} ({}) to {}", restaurant.name, restaurant.id, list);
        entries.push(restaurant);
        self.write(list, &entries)?;
        Ok(SaveOutcome::Saved)
    }

    /// Everything on a list, oldest save first
    pub async fn list(&self, list: ListKind) -> Result<Vec<SavedRestaurant>> {
        self.read(list)
    }

    /// Take an id off a list; removing something that isn't there is fine
    pub async fn remove(&self, id: &str, list: ListKind) -> Result<RemoveOutcome> {
        let _guard = self.lock_for(list).lock().await;

        let mut entries = self.read(list)?;
        let before = entries.len();
        entries.retain(|r| r.id != id);

        if entries.len() == before {
            debug!("{} not on {}, nothing to remove", id, list);
            return Ok(RemoveOutcome::NotFound);
        }

        info!("Removing {} from {}", id, list);
        self.write(list, &entries)?;
        Ok(RemoveOutcome::Removed)
    }

    /// Saved on either list. This is what the "saved" toggle shows.
    pub async fn is_saved(&self, id: &str) -> Result<bool> {
        Ok(!self.memberships(id).await?.is_empty())
    }

    /// The lists this id is on
    pub async fn memberships(&self, id: &str) -> Result<Vec<ListKind>> {
        let mut found = Vec::new();
        for list in ListKind::all() {
            if self.read(list)?.iter().any(|r| r.id == id) {
                found.push(list);
            }
        }
        Ok(found)
    }

    /// Forget both lists
    pub async fn clear(&self) -> Result<()> {
        let _favorites = self.favorites_lock.lock().await;
        let _pending = self.pending_lock.lock().await;

        for list in ListKind::all() {
            self.store.remove(list.storage_key()).map_err(|e| {
                error!(error = %e, "Failed to clear {}", list);
                e
            })?;
        }
        info!("Cleared all saved lists");
        Ok(())
    }

    fn read(&self, list: ListKind) -> Result<Vec<SavedRestaurant>> {
        let key = list.storage_key();
        let raw = self.store.get(key).map_err(|e| {
            error!(error = %e, "Failed to read {}", key);
            e
        })?;

        let Some(raw) = raw else {
            return Ok(Vec::new());
        };

        let mut entries: Vec<SavedRestaurant> = serde_json::from_str(&raw).map_err(|e| {
            error!(error = %e, "Corrupt saved list under {}", key);
            e
        })?;

        // The slot decides which list a record is on
        for entry in &mut entries {
            entry.list = list;
        }

        Ok(entries)
    }

    fn write(&self, list: ListKind, entries: &[SavedRestaurant]) -> Result<()> {
        let key = list.storage_key();
        let json = serde_json::to_string(entries)?;
        self.store.set(key, &json).map_err(|e| {
            error!(error = %e, "Failed to write {}", key);
            e
        })?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;
    use foodie_store::{MemoryKvStore, StoreError};

    fn store() -> SavedListStore {
        SavedListStore::new(Arc::new(MemoryKvStore::new()))
    }

    fn casa_pepe(list: ListKind) -> SavedRestaurant {
        SavedRestaurant {
            address: "Calle Mayor 1".into(),
            rating: Some(4.4),
            ..SavedRestaurant::new("p1", "Casa Pepe", list)
        }
    }

    /// Every call fails, like a full disk
    struct BrokenStore;

    impl KvStore for BrokenStore {
        fn get(&self, _key: &str) -> foodie_store::Result<Option<String>> {
            Err(StoreError::Unavailable("disk full".into()))
        }
        fn set(&self, _key: &str, _value: &str) -> foodie_store::Result<()> {
            Err(StoreError::Unavailable("disk full".into()))
        }
        fn remove(&self, _key: &str) -> foodie_store::Result<()> {
            Err(StoreError::Unavailable("disk full".into()))
        }
    }

    #[tokio::test]
    async fn test_save_twice_keeps_one() {
        let lists = store();

        assert_eq!(
            lists.save(casa_pepe(ListKind::Favorites)).await.unwrap(),
            SaveOutcome::Saved
        );
        assert_eq!(
            lists.save(casa_pepe(ListKind::Favorites)).await.unwrap(),
            SaveOutcome::AlreadySaved
        );

        assert_eq!(lists.list(ListKind::Favorites).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_list_returns_what_was_saved() {
        let lists = store();
        let saved = casa_pepe(ListKind::Pending);
        lists.save(saved.clone()).await.unwrap();

        assert_eq!(lists.list(ListKind::Pending).await.unwrap(), vec![saved]);
        assert!(lists.list(ListKind::Favorites).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_insertion_order_preserved() {
        let lists = store();
        for id in ["c", "a", "b"] {
            lists
                .save(SavedRestaurant::new(id, id, ListKind::Favorites))
                .await
                .unwrap();
        }

        let order: Vec<String> = lists
            .list(ListKind::Favorites)
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.id)
            .collect();
        assert_eq!(order, vec!["c", "a", "b"]);
    }

    #[tokio::test]
    async fn test_remove_then_remove_again() {
        let lists = store();
        lists
            .save(SavedRestaurant::new("x", "X", ListKind::Favorites))
            .await
            .unwrap();

        assert_eq!(
            lists.remove("x", ListKind::Favorites).await.unwrap(),
            RemoveOutcome::Removed
        );
        assert!(lists.list(ListKind::Favorites).await.unwrap().is_empty());
        assert_eq!(
            lists.remove("x", ListKind::Favorites).await.unwrap(),
            RemoveOutcome::NotFound
        );
    }

    #[tokio::test]
    async fn test_remove_on_never_written_list() {
        let lists = store();
        assert_eq!(
            lists.remove("x", ListKind::Pending).await.unwrap(),
            RemoveOutcome::NotFound
        );
    }

    #[tokio::test]
    async fn test_same_id_on_both_lists() {
        let lists = store();
        lists.save(casa_pepe(ListKind::Favorites)).await.unwrap();
        lists.save(casa_pepe(ListKind::Pending)).await.unwrap();

        assert_eq!(
            lists.memberships("p1").await.unwrap(),
            vec![ListKind::Favorites, ListKind::Pending]
        );

        lists.remove("p1", ListKind::Favorites).await.unwrap();
        assert!(lists.is_saved("p1").await.unwrap());
        assert_eq!(lists.list(ListKind::Pending).await.unwrap().len(), 1);

        lists.remove("p1", ListKind::Pending).await.unwrap();
        assert!(!lists.is_saved("p1").await.unwrap());
    }

    #[tokio::test]
    async fn test_slot_decides_list_field() {
        let kv = Arc::new(MemoryKvStore::new());
        kv.set(
            ListKind::Pending.storage_key(),
            r#"[{"id":"q","name":"Q","address":"","list":"favoritos"}]"#,
        )
        .unwrap();

        let lists = SavedListStore::new(kv);
        let pending = lists.list(ListKind::Pending).await.unwrap();
        assert_eq!(pending[0].list, ListKind::Pending);
    }

    #[tokio::test]
    async fn test_clear_empties_both_lists() {
        let lists = store();
        lists.save(casa_pepe(ListKind::Favorites)).await.unwrap();
        lists.save(casa_pepe(ListKind::Pending)).await.unwrap();

        lists.clear().await.unwrap();
        for list in ListKind::all() {
            assert!(lists.list(list).await.unwrap().is_empty());
        }
    }

    #[tokio::test]
    async fn test_storage_failure_is_reported() {
        let lists = SavedListStore::new(Arc::new(BrokenStore));

        assert!(matches!(
            lists.save(casa_pepe(ListKind::Favorites)).await,
            Err(Error::Storage(_))
        ));
        assert!(matches!(
            lists.list(ListKind::Favorites).await,
            Err(Error::Storage(_))
        ));
        assert!(matches!(
            lists.remove("p1", ListKind::Favorites).await,
            Err(Error::Storage(_))
        ));
    }

    #[tokio::test]
    async fn test_corrupt_list_is_reported() {
        let kv = Arc::new(MemoryKvStore::new());
        kv.set(ListKind::Favorites.storage_key(), "{not json").unwrap();

        let lists = SavedListStore::new(kv);
        assert!(matches!(
            lists.list(ListKind::Favorites).await,
            Err(Error::Serialization(_))
        ));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_saves_all_land() {
        let lists = Arc::new(store());

        let handles: Vec<_> = (0..32)
            .map(|i| {
                let lists = Arc::clone(&lists);
                tokio::spawn(async move {
                    lists
                        .save(SavedRestaurant::new(
                            format!("id-{}", i),
                            format!("Place {}", i),
                            ListKind::Favorites,
                        ))
                        .await
                })
            })
            .collect();

        for handle in handles {
            assert_eq!(handle.await.unwrap().unwrap(), SaveOutcome::Saved);
        }

        assert_eq!(lists.list(ListKind::Favorites).await.unwrap().len(), 32);
    }
}
