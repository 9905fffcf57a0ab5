//! Recomputation of the per-folder role cache.
//!
//! A folder's cache is derived from exactly two inputs: its own rule list and
//! its parent's already-resolved cache (a synthetic `{owner: Owner}` entry for
//! roots). Propagation re-derives a folder and then every descendant, walking
//! the subtree with an explicit worklist drained by a bounded pool of
//! concurrent tasks. Sibling subtrees carry no ordering relation, so they are
//! processed fully in parallel.

use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::sync::Arc;

use futures::stream::{FuturesUnordered, StreamExt};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::error::Error;
use crate::folder::{Folder, FolderCache, FolderParent, FolderRule};
use crate::roles::RecursiveRole;
use crate::store::FolderStore;

/// Default bound on concurrently processed folders during a subtree walk.
pub const DEFAULT_FAN_OUT: usize = 16;

/// One pending recomputation: a folder and the cache it inherits. `None`
/// means the folder is a root and inherits nothing.
type WorkItem = (Folder, Option<Arc<FolderCache>>);

/// Derive a folder's cache from its rules and its parent's resolved cache.
///
/// The base is rebuilt from the parent cache on every call (never
/// read-modify-written against the folder's own stale cache), which is what
/// makes propagation idempotent. For a root folder `parent_cache` is ignored
/// and the base is the synthetic owner entry; for a child it must be the
/// parent's cache.
pub fn derive_cache(folder: &Folder, parent_cache: Option<&FolderCache>) -> FolderCache {
    let mut user_roles: BTreeMap<Uuid, RecursiveRole> = match folder.parent {
        FolderParent::Root { owner_id } => BTreeMap::from([(owner_id, RecursiveRole::Owner)]),
        FolderParent::Child { .. } => parent_cache
            .map(|cache| cache.user_roles.clone())
            .unwrap_or_default(),
    };
    let mut share_root_for = BTreeSet::new();
    for rule in &folder.rules {
        let granted = RecursiveRole::from(rule.role);
        match user_roles.entry(rule.user_id) {
            Entry::Vacant(entry) => {
                // No inherited access: this folder becomes the user's share root.
                share_root_for.insert(rule.user_id);
                entry.insert(granted);
            }
            Entry::Occupied(mut entry) => {
                // Grants never downgrade an inherited role.
                if granted > *entry.get() {
                    entry.insert(granted);
                }
            }
        }
    }
    FolderCache { user_roles, share_root_for }
}

/// The only writer of folder caches.
pub struct CachePropagator {
    store: Arc<dyn FolderStore>,
    fan_out: usize,
}

impl CachePropagator {
    pub fn new(store: Arc<dyn FolderStore>) -> Self {
        Self { store, fan_out: DEFAULT_FAN_OUT }
    }

    /// Bound the number of folders recomputed concurrently.
    pub fn with_fan_out(mut self, fan_out: usize) -> Self {
        self.fan_out = fan_out.max(1);
        self
    }

    /// Recompute `folder`'s cache from `parent_cache` and re-derive every
    /// descendant. For a root folder pass `None`; for a child, the parent's
    /// resolved cache.
    pub async fn propagate(
        &self,
        folder: &Folder,
        parent_cache: Option<&FolderCache>,
    ) -> Result<(), Error> {
        let inherited = parent_cache.map(|cache| Arc::new(cache.clone()));
        self.run_worklist(vec![(folder.clone(), inherited)]).await
    }

    /// Convenience entry point for root folders.
    pub async fn propagate_from_root(&self, folder: &Folder) -> Result<(), Error> {
        self.propagate(folder, None).await
    }

    /// Entry point for any folder: resolves the parent's cache through the
    /// store first. A parent reference that does not resolve is a broken
    /// tree invariant and fails loudly.
    pub async fn propagate_from_folder(&self, folder: &Folder) -> Result<(), Error> {
        let parent_cache = self.parent_cache_of(folder).await?;
        self.propagate(folder, parent_cache.as_ref()).await
    }

    /// Atomically persist a new rule list together with the cache it implies
    /// for `folder`, then re-derive the subtree below it. The paired write is
    /// the one atomic unit of a rule edit; the subtree walk happens outside
    /// it and is healed by [`CachePropagator::rebuild_all`] if interrupted.
    ///
    /// Returns the folder's new cache.
    pub async fn apply_rules(
        &self,
        folder: &Folder,
        new_rules: Vec<FolderRule>,
    ) -> Result<FolderCache, Error> {
        let parent_cache = self.parent_cache_of(folder).await?;
        let staged = Folder { rules: new_rules.clone(), ..folder.clone() };
        let cache = derive_cache(&staged, parent_cache.as_ref());
        self.store
            .replace_rules_and_cache(folder.id, &new_rules, &cache)
            .await?;
        let children = self.store.children_of(folder.id).await?;
        let inherited = Arc::new(cache.clone());
        let seed = children
            .into_iter()
            .map(|child| (child, Some(Arc::clone(&inherited))))
            .collect();
        self.run_worklist(seed).await?;
        Ok(cache)
    }

    /// Recompute every cache in every tree, roots fanned out concurrently.
    /// Run once at process start, before serving authorization checks, to
    /// heal any drift left by an interrupted propagation.
    pub async fn rebuild_all(&self) -> Result<(), Error> {
        let roots = self.store.roots().await?;
        info!(roots = roots.len(), "rebuilding all folder caches");
        let seed = roots.into_iter().map(|root| (root, None)).collect();
        self.run_worklist(seed).await
    }

    async fn parent_cache_of(&self, folder: &Folder) -> Result<Option<FolderCache>, Error> {
        let Some(parent_id) = folder.parent_id() else {
            return Ok(None);
        };
        match self.store.get(parent_id).await? {
            Some(parent) => Ok(Some(parent.cache)),
            None => {
                error!(
                    folder = %folder.id,
                    parent = %parent_id,
                    "parent reference does not resolve; tree invariant broken"
                );
                Err(Error::OrphanedFolder { folder: folder.id, parent: parent_id })
            }
        }
    }

    /// Drain a worklist of pending recomputations with at most `fan_out`
    /// folders in flight. A failed item stops its own lineage (its children
    /// are never enqueued) while everything already dispatched drains to
    /// completion; the first error is returned to the caller.
    async fn run_worklist(&self, seed: Vec<WorkItem>) -> Result<(), Error> {
        let mut pending: VecDeque<WorkItem> = seed.into();
        let mut in_flight = FuturesUnordered::new();
        let mut first_error: Option<Error> = None;
        loop {
            while in_flight.len() < self.fan_out {
                match pending.pop_front() {
                    Some((folder, inherited)) => in_flight.push(self.step(folder, inherited)),
                    None => break,
                }
            }
            match in_flight.next().await {
                Some(Ok(children)) => pending.extend(children),
                Some(Err(err)) => {
                    warn!(error = %err, "propagation aborted for one lineage");
                    first_error.get_or_insert(err);
                }
                None => break,
            }
        }
        match first_error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// Process one folder: persist its derived cache, then hand its children
    /// back to the worklist. The cache write completes before children are
    /// loaded, and children receive the new cache as a value rather than
    /// re-reading the parent, so a racing update of the parent cannot leak
    /// into this walk.
    async fn step(
        &self,
        folder: Folder,
        inherited: Option<Arc<FolderCache>>,
    ) -> Result<Vec<WorkItem>, Error> {
        let cache = derive_cache(&folder, inherited.as_deref());
        self.store.replace_cache(folder.id, &cache).await?;
        debug!(folder = %folder.id, users = cache.user_roles.len(), "cache recomputed");
        let children = self.store.children_of(folder.id).await?;
        let inherited = Arc::new(cache);
        Ok(children
            .into_iter()
            .map(|child| (child, Some(Arc::clone(&inherited))))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::roles::Role;

    fn rule(user_id: Uuid, role: Role) -> FolderRule {
        FolderRule { user_id, role }
    }

    fn root(owner_id: Uuid, rules: Vec<FolderRule>) -> Folder {
        Folder {
            id: Uuid::new_v4(),
            short_id: "rootrootro".into(),
            name: "root".into(),
            parent: FolderParent::Root { owner_id },
            rules,
            cache: FolderCache::default(),
        }
    }

    fn child_of(parent: &Folder, rules: Vec<FolderRule>) -> Folder {
        Folder {
            id: Uuid::new_v4(),
            short_id: "childchild".into(),
            name: "child".into(),
            parent: FolderParent::Child { parent_folder_id: parent.id },
            rules,
            cache: FolderCache::default(),
        }
    }

    #[test]
    fn root_cache_is_synthetic_owner_entry() {
        let owner = Uuid::new_v4();
        let cache = derive_cache(&root(owner, Vec::new()), None);
        assert_eq!(cache.user_roles, BTreeMap::from([(owner, RecursiveRole::Owner)]));
        assert!(cache.share_root_for.is_empty());
    }

    #[test]
    fn rules_extend_inherited_roles_and_mark_share_roots() {
        let owner = Uuid::new_v4();
        let guest = Uuid::new_v4();
        let parent = root(owner, Vec::new());
        let parent_cache = derive_cache(&parent, None);
        let child = child_of(&parent, vec![rule(guest, Role::Editor)]);
        let cache = derive_cache(&child, Some(&parent_cache));
        assert_eq!(cache.user_roles[&owner], RecursiveRole::Owner);
        assert_eq!(cache.user_roles[&guest], RecursiveRole::Editor);
        assert_eq!(cache.share_root_for, BTreeSet::from([guest]));
    }

    #[test]
    fn grants_never_downgrade_inherited_roles() {
        let owner = Uuid::new_v4();
        let guest = Uuid::new_v4();
        let parent = root(owner, vec![rule(guest, Role::Admin)]);
        let parent_cache = derive_cache(&parent, None);
        let child = child_of(&parent, vec![rule(guest, Role::Viewer)]);
        let cache = derive_cache(&child, Some(&parent_cache));
        assert_eq!(cache.user_roles[&guest], RecursiveRole::Admin);
        // Inherited access means this folder is not the user's share root.
        assert!(cache.share_root_for.is_empty());
    }

    #[test]
    fn rule_for_owner_cannot_change_owner_role() {
        let owner = Uuid::new_v4();
        let folder = root(owner, vec![rule(owner, Role::Viewer)]);
        let cache = derive_cache(&folder, None);
        assert_eq!(cache.user_roles[&owner], RecursiveRole::Owner);
        assert!(cache.share_root_for.is_empty());
    }

    #[test]
    fn derivation_ignores_stale_own_cache() {
        let owner = Uuid::new_v4();
        let stale_user = Uuid::new_v4();
        let mut folder = root(owner, Vec::new());
        folder.cache.user_roles.insert(stale_user, RecursiveRole::Admin);
        let cache = derive_cache(&folder, None);
        assert!(!cache.user_roles.contains_key(&stale_user));
    }
}
