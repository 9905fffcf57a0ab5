use uuid::Uuid;

use crate::store::StoreError;

/// Errors surfaced by propagation and mutation entry points.
///
/// Authorization denials are never errors here: `Folder::has_at_least`
/// answers with a boolean and the caller decides what to do with it.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A non-root folder's parent reference does not resolve. The tree
    /// invariant itself is broken; this is fatal to the triggering operation
    /// and never silently skipped.
    #[error("folder {folder} references missing parent {parent}")]
    OrphanedFolder { folder: Uuid, parent: Uuid },

    /// The caller addressed a folder that does not exist.
    #[error("folder {0} not found")]
    FolderNotFound(Uuid),

    /// Transient persistence failure; the enclosing operation aborts and
    /// reports failure rather than partial success.
    #[error(transparent)]
    Store(#[from] StoreError),
}
