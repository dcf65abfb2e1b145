//! Optimistic synchronization of threaded message trees.
//!
//! Local writes are applied to [`LocalView`] first and confirmed or rolled
//! back once the [`ThreadStore`] answers. Streamed generations are merged
//! into their target message fragment by fragment.

pub mod clipboard;
pub mod engine;
pub mod error;
pub mod events;
pub mod generation;
pub mod optimistic;
pub mod store;
pub mod view;

pub use clipboard::{Clipboard, ClipboardKind, ClipboardPayload};
pub use engine::{ReplyOutcome, SyncEngine};
pub use error::{Result, StoreError, StoreResult, SyncError};
pub use events::SyncEvent;
pub use generation::{GenerationHandle, GenerationOutcome, GenerationRegistry, StartOutcome};
pub use optimistic::{execute, OptimisticMutation};
pub use store::{JsonFileStore, MemoryStore, StoreEvent, ThreadStore};
pub use view::{LocalView, Snapshot, SnapshotScope, ViewState};
