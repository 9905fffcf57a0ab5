//! Mutation entry points: folder creation, rule edits, renames, and the
//! listing/ancestor reads built on the cached summaries. Every mutation that
//! can change effective access triggers cache propagation before reporting
//! success.

use std::collections::BTreeMap;
use std::sync::Arc;

use rand::Rng;
use tracing::error;
use uuid::Uuid;

use crate::error::Error;
use crate::folder::{Folder, FolderCache, FolderParent, FolderRule};
use crate::propagate::{derive_cache, CachePropagator};
use crate::roles::Role;
use crate::store::{FolderStore, StoreError};

const SHORT_ID_LEN: usize = 10;
const SHORT_ID_ALPHABET: &[u8] =
    b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789_-";

fn short_id_candidate() -> String {
    let mut rng = rand::thread_rng();
    (0..SHORT_ID_LEN)
        .map(|_| SHORT_ID_ALPHABET[rng.gen_range(0..SHORT_ID_ALPHABET.len())] as char)
        .collect()
}

/// Orchestrates folder mutations so that the rule lists and the derived
/// caches can never permanently diverge. Does no authorization itself: the
/// caller is expected to have checked [`Folder::has_at_least`] already.
pub struct FolderManager {
    store: Arc<dyn FolderStore>,
    propagator: CachePropagator,
}

impl FolderManager {
    pub fn new(store: Arc<dyn FolderStore>) -> Self {
        let propagator = CachePropagator::new(Arc::clone(&store));
        Self { store, propagator }
    }

    pub fn with_propagator(store: Arc<dyn FolderStore>, propagator: CachePropagator) -> Self {
        Self { store, propagator }
    }

    pub fn propagator(&self) -> &CachePropagator {
        &self.propagator
    }

    /// Rebuild every cache from the rule lists. Run once at process start
    /// before answering authorization checks.
    pub async fn rebuild_all(&self) -> Result<(), Error> {
        self.propagator.rebuild_all().await
    }

    /// Create a new root folder owned by `owner_id`. The owner's `Owner`
    /// role exists in the cache before the folder is handed back.
    pub async fn create_root(&self, owner_id: Uuid, name: &str) -> Result<Folder, Error> {
        self.create(FolderParent::Root { owner_id }, None, name).await
    }

    /// Create a folder under `parent_id`, inheriting the parent's cache.
    pub async fn create_child(&self, parent_id: Uuid, name: &str) -> Result<Folder, Error> {
        let parent = self
            .store
            .get(parent_id)
            .await?
            .ok_or(Error::FolderNotFound(parent_id))?;
        self.create(
            FolderParent::Child { parent_folder_id: parent_id },
            Some(parent.cache),
            name,
        )
        .await
    }

    /// The cache is derived before the insert, so the record is never
    /// visible without it. A new folder has no children, making the single
    /// atomic insert the whole propagation.
    async fn create(
        &self,
        parent: FolderParent,
        parent_cache: Option<FolderCache>,
        name: &str,
    ) -> Result<Folder, Error> {
        let short_id = self.unique_short_id().await?;
        let mut folder = Folder {
            id: Uuid::new_v4(),
            short_id,
            name: name.trim().to_string(),
            parent,
            rules: Vec::new(),
            cache: FolderCache::default(),
        };
        folder.cache = derive_cache(&folder, parent_cache.as_ref());
        self.store.insert(&folder).await?;
        Ok(folder)
    }

    /// Apply a batch of rule changes to one folder: `Some(role)` grants or
    /// overwrites, `None` revokes. The new rule list and the cache it implies
    /// are written atomically; the subtree below is then re-derived.
    ///
    /// Granting a role at or below a user's inherited role is accepted and
    /// persisted even though it changes no effective access.
    pub async fn modify_rules(
        &self,
        folder_id: Uuid,
        changes: &BTreeMap<Uuid, Option<Role>>,
    ) -> Result<Folder, Error> {
        let folder = self
            .store
            .get(folder_id)
            .await?
            .ok_or(Error::FolderNotFound(folder_id))?;
        let mut rules = folder.rules.clone();
        for (&user_id, change) in changes {
            match change {
                None => rules.retain(|rule| rule.user_id != user_id),
                Some(role) => match rules.iter_mut().find(|rule| rule.user_id == user_id) {
                    Some(rule) => rule.role = *role,
                    None => rules.push(FolderRule { user_id, role: *role }),
                },
            }
        }
        self.propagator.apply_rules(&folder, rules).await?;
        self.reload(folder_id).await
    }

    /// Rename a folder. Names carry no access semantics, so no propagation.
    pub async fn rename(&self, folder_id: Uuid, name: &str) -> Result<(), Error> {
        match self.store.rename(folder_id, name.trim()).await {
            Err(StoreError::NotFound(id)) => Err(Error::FolderNotFound(id)),
            other => Ok(other?),
        }
    }

    /// Folders for a user's landing page: roots they own, and folders that
    /// are the topmost point of something shared with them.
    pub async fn list_user_folders(
        &self,
        user_id: Uuid,
    ) -> Result<(Vec<Folder>, Vec<Folder>), Error> {
        let owned = self.store.roots_owned_by(user_id).await?;
        let shared = self.store.share_roots_for(user_id).await?;
        Ok((owned, shared))
    }

    /// Ancestors of `folder` the user may see, nearest first, stopping at
    /// the first ancestor they cannot view.
    pub async fn visible_ancestors(
        &self,
        folder: &Folder,
        user_id: Uuid,
    ) -> Result<Vec<Folder>, Error> {
        let mut ancestors = Vec::new();
        let mut current_id = folder.id;
        let mut next = folder.parent_id();
        while let Some(parent_id) = next {
            let parent = self.store.get(parent_id).await?.ok_or_else(|| {
                error!(
                    folder = %current_id,
                    parent = %parent_id,
                    "parent reference does not resolve; tree invariant broken"
                );
                Error::OrphanedFolder { folder: current_id, parent: parent_id }
            })?;
            if !parent.has_at_least(user_id, Role::Viewer) {
                break;
            }
            current_id = parent.id;
            next = parent.parent_id();
            ancestors.push(parent);
        }
        Ok(ancestors)
    }

    /// Draw fresh short-id candidates until one is unused. Collisions are
    /// expected to be vanishingly rare; the loop retries rather than fails.
    async fn unique_short_id(&self) -> Result<String, Error> {
        loop {
            let candidate = short_id_candidate();
            if self.store.get_by_short_id(&candidate).await?.is_none() {
                return Ok(candidate);
            }
        }
    }

    async fn reload(&self, folder_id: Uuid) -> Result<Folder, Error> {
        self.store
            .get(folder_id)
            .await?
            .ok_or(Error::FolderNotFound(folder_id))
    }
}
