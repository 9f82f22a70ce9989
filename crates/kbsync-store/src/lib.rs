//! # kbsync-store
//!
//! Infrastructure layer for kbsync - local persistence for the offline mode.
//!
//! The offline repository in `kbsync-client` serves knowledge-base membership
//! from this store so the whole explorer can run without a backend.
//!
//! ## Architecture
//!
//! ```text
//! kbsync-cli → kbsync-client → kbsync-core (ResourceRepository)
//!                   ↓
//!              kbsync-store (persisted membership list)
//! ```
//!
//! ## Usage
//!
//! ```ignore
//! use kbsync_store::MembershipStore;
//!
//! let store = MembershipStore::open("/home/me/.kbsync/kb_resources.json");
//! store.add(&resource)?;
//! let indexed = store.load()?;
//! store.remove(&resource.path)?;
//! ```

pub mod error;
pub mod kv;
pub mod membership;

pub use error::{StoreError, StoreResult};
pub use kv::KeyValueFile;
pub use membership::{MembershipStore, KB_RESOURCES_KEY};
