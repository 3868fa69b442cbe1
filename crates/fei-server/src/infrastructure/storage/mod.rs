//! Storage infrastructure: configuration file and share persistence.
//!
//! - **`config`** – reads and writes the TOML configuration file from the
//!   platform-appropriate directory, with defaults on first run.
//! - **`share_store`** – the share log and the local files directory.
//! - **`content`** – resolves locators to display names, metadata and byte
//!   streams for the listing and the download route.

pub mod config;
pub mod content;
pub mod share_store;

pub use content::{ContentMeta, ContentReader, ContentResolver, FsContentResolver, StorageError};
pub use share_store::ShareStore;
