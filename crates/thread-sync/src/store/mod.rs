//! Persistent store interface and the two bundled adapters.

mod event;
mod json;
mod memory;

pub use event::StoreEvent;
pub use json::JsonFileStore;
pub use memory::MemoryStore;

use async_trait::async_trait;
use thread_core::{DeletePolicy, Message, MessageContent, Thread, ThreadPatch};
use uuid::Uuid;

use crate::error::StoreResult;

/// The authoritative CRUD surface the sync layer writes through.
#[async_trait]
pub trait ThreadStore: Send + Sync {
    /// Persist a single message; the returned copy carries server fields.
    async fn create_message(
        &self,
        thread_id: Uuid,
        parent_id: Option<Uuid>,
        message: &Message,
    ) -> StoreResult<Message>;

    /// Persist a whole tree in one call (paste, duplicate, move).
    async fn create_subtree(
        &self,
        thread_id: Uuid,
        parent_id: Option<Uuid>,
        root: &Message,
    ) -> StoreResult<Message>;

    async fn update_message(
        &self,
        thread_id: Uuid,
        message_id: Uuid,
        content: &MessageContent,
    ) -> StoreResult<()>;

    async fn delete_message(
        &self,
        thread_id: Uuid,
        message_id: Uuid,
        policy: DeletePolicy,
    ) -> StoreResult<()>;

    async fn fetch_thread(&self, thread_id: Uuid) -> StoreResult<Thread>;

    async fn list_threads(&self) -> StoreResult<Vec<Thread>>;

    /// `client_id` is the id the caller already shows locally; stores keep it
    /// when they can.
    async fn create_thread(&self, title: &str, client_id: Option<Uuid>) -> StoreResult<Thread>;

    async fn update_thread(&self, thread_id: Uuid, patch: &ThreadPatch) -> StoreResult<()>;

    async fn delete_thread(&self, thread_id: Uuid) -> StoreResult<()>;
}

/// Pinned threads first, then most recently updated.
pub fn sort_threads(threads: &mut [Thread]) {
    threads.sort_by(|a, b| {
        b.pinned
            .cmp(&a.pinned)
            .then_with(|| b.updated_at.cmp(&a.updated_at))
    });
}

/// Fill in `author` on every node of the tree that has none.
pub(crate) fn stamp_author(message: &mut Message, author: &str) {
    if message.author.is_none() {
        message.author = Some(author.to_string());
    }
    for reply in &mut message.replies {
        stamp_author(reply, author);
    }
}

/// A new thread as the store would create it.
pub(crate) fn new_thread(title: &str, client_id: Option<Uuid>) -> Thread {
    let thread = Thread::new(title);
    match client_id {
        Some(id) => thread.with_id(id),
        None => thread,
    }
}
