//! The role lattice: a closed, totally ordered set of permission levels.
//!
//! "No access" is `Option::<RecursiveRole>::None`; the derived `Option`
//! ordering places it below every role, so comparison is `Ord::cmp` and
//! "best role wins" merging is `Ord::max`.

use serde::{Deserialize, Serialize};

/// A role that can be granted through a rule on a folder.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Viewer,
    Contributor,
    Editor,
    Admin,
}

/// A role a user can effectively hold on a folder. `Owner` belongs only to
/// the creator of a root folder and is never assignable via a rule.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecursiveRole {
    Viewer,
    Contributor,
    Editor,
    Admin,
    Owner,
}

impl From<Role> for RecursiveRole {
    fn from(role: Role) -> Self {
        match role {
            Role::Viewer => RecursiveRole::Viewer,
            Role::Contributor => RecursiveRole::Contributor,
            Role::Editor => RecursiveRole::Editor,
            Role::Admin => RecursiveRole::Admin,
        }
    }
}

/// Numeric rank of an effective role, with `None` (no access) at 0.
pub fn rank(role: Option<RecursiveRole>) -> u8 {
    match role {
        None => 0,
        Some(RecursiveRole::Viewer) => 1,
        Some(RecursiveRole::Contributor) => 2,
        Some(RecursiveRole::Editor) => 3,
        Some(RecursiveRole::Admin) => 4,
        Some(RecursiveRole::Owner) => 5,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rank_matches_ordering() {
        let all = [
            None,
            Some(RecursiveRole::Viewer),
            Some(RecursiveRole::Contributor),
            Some(RecursiveRole::Editor),
            Some(RecursiveRole::Admin),
            Some(RecursiveRole::Owner),
        ];
        for (i, role) in all.iter().enumerate() {
            assert_eq!(rank(*role), i as u8);
        }
        for window in all.windows(2) {
            assert!(window[0] < window[1]);
        }
    }

    #[test]
    fn best_role_wins_via_max() {
        assert_eq!(
            Some(RecursiveRole::Editor).max(Some(RecursiveRole::Viewer)),
            Some(RecursiveRole::Editor)
        );
        assert_eq!(None.max(Some(RecursiveRole::Viewer)), Some(RecursiveRole::Viewer));
        assert_eq!(
            Some(RecursiveRole::Owner).max(Some(RecursiveRole::Admin)),
            Some(RecursiveRole::Owner)
        );
    }

    #[test]
    fn role_upgrades_preserve_ordering() {
        assert!(RecursiveRole::from(Role::Admin) < RecursiveRole::Owner);
        assert_eq!(RecursiveRole::from(Role::Viewer), RecursiveRole::Viewer);
    }

    #[test]
    fn roles_serialize_lowercase() {
        assert_eq!(serde_json::to_string(&Role::Contributor).unwrap(), "\"contributor\"");
        assert_eq!(serde_json::to_string(&RecursiveRole::Owner).unwrap(), "\"owner\"");
    }
}
