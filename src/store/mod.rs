//! Persistence-facing contract for folder records.
//!
//! A dumb accessor over whatever document store hosts the folders: it
//! implements no invariant and derives nothing. Rules and cache are fields
//! of the same record, so `replace_rules_and_cache` is a single-document
//! atomic replace, the transactional unit rule edits rely on.

use async_trait::async_trait;
use uuid::Uuid;

use crate::folder::{Folder, FolderCache, FolderRule};

pub mod memory;

pub use memory::MemoryFolderStore;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Transient backend failure; the caller retries or aborts the enclosing
    /// operation.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// A field write addressed a record that does not exist. When the id was
    /// just read from another record this is a consistency fault.
    #[error("folder {0} not found")]
    NotFound(Uuid),
}

#[async_trait]
pub trait FolderStore: Send + Sync {
    async fn get(&self, id: Uuid) -> Result<Option<Folder>, StoreError>;

    async fn get_by_short_id(&self, short_id: &str) -> Result<Option<Folder>, StoreError>;

    /// Direct children of `parent_id`, unordered.
    async fn children_of(&self, parent_id: Uuid) -> Result<Vec<Folder>, StoreError>;

    /// All root folders.
    async fn roots(&self) -> Result<Vec<Folder>, StoreError>;

    /// Root folders owned by `user_id` ("owned by me" listing).
    async fn roots_owned_by(&self, user_id: Uuid) -> Result<Vec<Folder>, StoreError>;

    /// Folders whose cache marks `user_id` as a share root ("shared with me"
    /// listing).
    async fn share_roots_for(&self, user_id: Uuid) -> Result<Vec<Folder>, StoreError>;

    /// Insert a new record; the id is generated by the caller.
    async fn insert(&self, folder: &Folder) -> Result<(), StoreError>;

    async fn replace_cache(&self, id: Uuid, cache: &FolderCache) -> Result<(), StoreError>;

    async fn replace_rules(&self, id: Uuid, rules: &[FolderRule]) -> Result<(), StoreError>;

    /// Replace rules and cache in one atomic step. Both live on the same
    /// record, so a single-document replace is sufficient.
    async fn replace_rules_and_cache(
        &self,
        id: Uuid,
        rules: &[FolderRule],
        cache: &FolderCache,
    ) -> Result<(), StoreError>;

    async fn rename(&self, id: Uuid, name: &str) -> Result<(), StoreError>;
}
