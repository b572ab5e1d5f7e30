//! Store abstraction: the mode-gated folder/message cache engine.
//!
//! `store` holds the per-account `Store`; `folder` holds the folder
//! repository and the per-folder open-state handle; `message_repo` adds
//! message-repository operations onto that handle; `search` is the typed
//! search-criteria language; `synchronizer` and `cache_manager` are the
//! maintenance surfaces; `registry` is the `Runtime` that replaces a
//! process-wide store-registry singleton; `imap_client` and `credential`
//! are the external interfaces a concrete backend implements.

pub mod cache_manager;
pub mod credential;
pub mod folder;
pub mod imap_client;
mod message;
mod message_repo;
pub mod registry;
pub mod search;
pub mod store;
pub mod synchronizer;

pub use folder::{exists, list, FolderInfo, OpenState};
pub use folder::{create, delete as delete_folder, rename};
pub use folder::FolderHandle;
pub use message::{Address, Attachment, DateTime, Envelope, Flag, Message};
pub use search::SearchCriteria;
pub use store::{Store, SyncStatus};
