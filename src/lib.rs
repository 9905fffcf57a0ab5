pub mod error;
pub mod folder;
pub mod manager;
pub mod propagate;
pub mod roles;
pub mod store;

pub use error::Error;
pub use folder::{Folder, FolderCache, FolderParent, FolderRule};
pub use manager::FolderManager;
pub use propagate::CachePropagator;
pub use roles::{RecursiveRole, Role};
pub use store::{FolderStore, MemoryFolderStore, StoreError};
