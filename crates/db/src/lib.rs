//! List Store and its snapshot persistence.
//!
//! The store owns every channel's shopping list and every guild's channel
//! setting. Each mutation rewrites the whole snapshot; a failed write is
//! logged and the in-memory state stays authoritative.

pub mod fixtures;
pub mod snapshot;
pub mod store;

pub use fixtures::{seed_demo_list, DemoSeedResult};
pub use snapshot::{
    InMemorySnapshotStore, JsonFileSnapshotStore, PersistenceError, SnapshotStore, StoreSnapshot,
};
pub use store::{ListStore, StoreStats};
