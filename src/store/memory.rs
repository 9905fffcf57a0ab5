//! In-memory [`FolderStore`] used by the test suite and useful for embedding
//! without a database.

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::folder::{Folder, FolderCache, FolderRule};
use crate::store::{FolderStore, StoreError};

#[derive(Default)]
pub struct MemoryFolderStore {
    folders: RwLock<HashMap<Uuid, Folder>>,
    // -1 = healthy; n >= 0 = fail every operation after n more succeed.
    fail_after: AtomicI64,
}

impl MemoryFolderStore {
    pub fn new() -> Self {
        Self {
            folders: RwLock::new(HashMap::new()),
            fail_after: AtomicI64::new(-1),
        }
    }

    /// Make every operation fail with [`StoreError::Unavailable`] after
    /// `ops` more operations succeed. `fail_after(0)` fails immediately.
    pub fn fail_after(&self, ops: i64) {
        self.fail_after.store(ops, Ordering::SeqCst);
    }

    /// Clear any injected failure.
    pub fn heal(&self) {
        self.fail_after.store(-1, Ordering::SeqCst);
    }

    fn check_available(&self) -> Result<(), StoreError> {
        let remaining = self.fail_after.load(Ordering::SeqCst);
        if remaining < 0 {
            return Ok(());
        }
        if remaining == 0 {
            return Err(StoreError::Unavailable("injected failure".into()));
        }
        self.fail_after.fetch_sub(1, Ordering::SeqCst);
        Ok(())
    }
}

#[async_trait]
impl FolderStore for MemoryFolderStore {
    async fn get(&self, id: Uuid) -> Result<Option<Folder>, StoreError> {
        self.check_available()?;
        Ok(self.folders.read().await.get(&id).cloned())
    }

    async fn get_by_short_id(&self, short_id: &str) -> Result<Option<Folder>, StoreError> {
        self.check_available()?;
        Ok(self
            .folders
            .read()
            .await
            .values()
            .find(|f| f.short_id == short_id)
            .cloned())
    }

    async fn children_of(&self, parent_id: Uuid) -> Result<Vec<Folder>, StoreError> {
        self.check_available()?;
        Ok(self
            .folders
            .read()
            .await
            .values()
            .filter(|f| f.parent_id() == Some(parent_id))
            .cloned()
            .collect())
    }

    async fn roots(&self) -> Result<Vec<Folder>, StoreError> {
        self.check_available()?;
        Ok(self
            .folders
            .read()
            .await
            .values()
            .filter(|f| f.is_root())
            .cloned()
            .collect())
    }

    async fn roots_owned_by(&self, user_id: Uuid) -> Result<Vec<Folder>, StoreError> {
        self.check_available()?;
        Ok(self
            .folders
            .read()
            .await
            .values()
            .filter(|f| matches!(f.parent, crate::folder::FolderParent::Root { owner_id } if owner_id == user_id))
            .cloned()
            .collect())
    }

    async fn share_roots_for(&self, user_id: Uuid) -> Result<Vec<Folder>, StoreError> {
        self.check_available()?;
        Ok(self
            .folders
            .read()
            .await
            .values()
            .filter(|f| f.cache.share_root_for.contains(&user_id))
            .cloned()
            .collect())
    }

    async fn insert(&self, folder: &Folder) -> Result<(), StoreError> {
        self.check_available()?;
        self.folders.write().await.insert(folder.id, folder.clone());
        Ok(())
    }

    async fn replace_cache(&self, id: Uuid, cache: &FolderCache) -> Result<(), StoreError> {
        self.check_available()?;
        let mut folders = self.folders.write().await;
        let folder = folders.get_mut(&id).ok_or(StoreError::NotFound(id))?;
        folder.cache = cache.clone();
        Ok(())
    }

    async fn replace_rules(&self, id: Uuid, rules: &[FolderRule]) -> Result<(), StoreError> {
        self.check_available()?;
        let mut folders = self.folders.write().await;
        let folder = folders.get_mut(&id).ok_or(StoreError::NotFound(id))?;
        folder.rules = rules.to_vec();
        Ok(())
    }

    async fn replace_rules_and_cache(
        &self,
        id: Uuid,
        rules: &[FolderRule],
        cache: &FolderCache,
    ) -> Result<(), StoreError> {
        self.check_available()?;
        let mut folders = self.folders.write().await;
        let folder = folders.get_mut(&id).ok_or(StoreError::NotFound(id))?;
        folder.rules = rules.to_vec();
        folder.cache = cache.clone();
        Ok(())
    }

    async fn rename(&self, id: Uuid, name: &str) -> Result<(), StoreError> {
        self.check_available()?;
        let mut folders = self.folders.write().await;
        let folder = folders.get_mut(&id).ok_or(StoreError::NotFound(id))?;
        folder.name = name.to_string();
        Ok(())
    }
}
