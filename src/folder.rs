//! Folder records: the source-of-truth rule list and the derived role cache
//! live side by side on one record, so a single read answers both "who may do
//! what here" and "why".

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::roles::{RecursiveRole, Role};

/// A direct grant of a role to one user on one folder. At most one rule per
/// user exists on a folder; granting again overwrites it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FolderRule {
    pub user_id: Uuid,
    pub role: Role,
}

/// The derived, persisted summary of effective access to a folder.
///
/// `user_roles` is the closure: for every user with any access to this
/// folder, the strongest role they hold here. `share_root_for` holds exactly
/// the users whose access starts at this folder (no inherited role from the
/// parent) and backs "shared with me" listings.
///
/// Ordered maps keep the serialized form deterministic, so recomputing an
/// unchanged folder persists byte-identical bytes.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FolderCache {
    pub user_roles: BTreeMap<Uuid, RecursiveRole>,
    pub share_root_for: BTreeSet<Uuid>,
}

/// Position of a folder in the tree. Exactly root folders carry an owner;
/// every other folder references an existing parent.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FolderParent {
    #[serde(rename_all = "camelCase")]
    Root { owner_id: Uuid },
    #[serde(rename_all = "camelCase")]
    Child { parent_folder_id: Uuid },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Folder {
    pub id: Uuid,
    pub short_id: String,
    pub name: String,
    #[serde(flatten)]
    pub parent: FolderParent,
    pub rules: Vec<FolderRule>,
    pub cache: FolderCache,
}

impl Folder {
    pub fn is_root(&self) -> bool {
        matches!(self.parent, FolderParent::Root { .. })
    }

    /// Parent folder id, `None` for roots.
    pub fn parent_id(&self) -> Option<Uuid> {
        match self.parent {
            FolderParent::Root { .. } => None,
            FolderParent::Child { parent_folder_id } => Some(parent_folder_id),
        }
    }

    /// The strongest role `user_id` effectively holds on this folder, read
    /// off the persisted cache. `None` means no access.
    pub fn effective_role(&self, user_id: Uuid) -> Option<RecursiveRole> {
        self.cache.user_roles.get(&user_id).copied()
    }

    /// Does `user_id` hold at least `required` on this folder?
    ///
    /// O(1) over the loaded record, no I/O. Every protected operation in the
    /// surrounding application must pass this check before acting on a
    /// folder; a `false` answer is not an error of this crate.
    pub fn has_at_least(&self, user_id: Uuid, required: impl Into<RecursiveRole>) -> bool {
        self.effective_role(user_id) >= Some(required.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn folder_with_cache(user_roles: BTreeMap<Uuid, RecursiveRole>) -> Folder {
        Folder {
            id: Uuid::new_v4(),
            short_id: "abcdefghij".into(),
            name: "test".into(),
            parent: FolderParent::Root { owner_id: Uuid::new_v4() },
            rules: Vec::new(),
            cache: FolderCache { user_roles, share_root_for: BTreeSet::new() },
        }
    }

    #[test]
    fn has_at_least_treats_missing_user_as_no_access() {
        let folder = folder_with_cache(BTreeMap::new());
        assert!(!folder.has_at_least(Uuid::new_v4(), Role::Viewer));
    }

    #[test]
    fn has_at_least_compares_against_cached_role() {
        let user = Uuid::new_v4();
        let folder =
            folder_with_cache(BTreeMap::from([(user, RecursiveRole::Contributor)]));
        assert!(folder.has_at_least(user, Role::Viewer));
        assert!(folder.has_at_least(user, Role::Contributor));
        assert!(!folder.has_at_least(user, Role::Editor));
        assert!(!folder.has_at_least(user, RecursiveRole::Owner));
    }

    #[test]
    fn parent_serializes_to_document_shape() {
        let owner = Uuid::new_v4();
        let folder = folder_with_cache(BTreeMap::new());
        let json = serde_json::to_value(&Folder {
            parent: FolderParent::Root { owner_id: owner },
            ..folder
        })
        .unwrap();
        assert_eq!(json["ownerId"], serde_json::to_value(owner).unwrap());
        assert!(json.get("parentFolderId").is_none());

        let parent_id = Uuid::new_v4();
        let child = Folder {
            parent: FolderParent::Child { parent_folder_id: parent_id },
            ..folder_with_cache(BTreeMap::new())
        };
        let json = serde_json::to_value(&child).unwrap();
        assert_eq!(json["parentFolderId"], serde_json::to_value(parent_id).unwrap());
        let back: Folder = serde_json::from_value(json).unwrap();
        assert_eq!(back.parent_id(), Some(parent_id));
    }
}
