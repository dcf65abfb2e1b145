use std::collections::HashMap;

use async_trait::async_trait;
use thread_core::{DeletePolicy, Message, MessageContent, Thread, ThreadPatch};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{new_thread, sort_threads, stamp_author, StoreEvent, ThreadStore};
use crate::error::{StoreError, StoreResult};

/// In-process authoritative store.
///
/// Writes go through the same tree rewrites the local view uses, so a
/// successful optimistic mutation leaves both sides deep-equal.
pub struct MemoryStore {
    threads: RwLock<HashMap<Uuid, Thread>>,
    author: String,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::with_author("local")
    }

    /// Name stamped on every message this store creates
    pub fn with_author(author: impl Into<String>) -> Self {
        Self {
            threads: RwLock::new(HashMap::new()),
            author: author.into(),
        }
    }

    /// Seed the store with an existing thread.
    pub async fn insert_thread(&self, thread: Thread) {
        self.threads.write().await.insert(thread.id, thread);
    }

    async fn apply(&self, thread_id: Uuid, event: StoreEvent) -> StoreResult<()> {
        let mut threads = self.threads.write().await;
        let thread = threads
            .get_mut(&thread_id)
            .ok_or_else(|| StoreError::NotFound(format!("thread {thread_id}")))?;
        event.apply(thread)
    }

    async fn create(
        &self,
        thread_id: Uuid,
        parent_id: Option<Uuid>,
        message: &Message,
    ) -> StoreResult<Message> {
        let mut created = message.clone();
        stamp_author(&mut created, &self.author);
        self.apply(
            thread_id,
            StoreEvent::MessageCreated {
                parent_id,
                message: created.clone(),
            },
        )
        .await?;
        Ok(created)
    }
}

#[async_trait]
impl ThreadStore for MemoryStore {
    async fn create_message(
        &self,
        thread_id: Uuid,
        parent_id: Option<Uuid>,
        message: &Message,
    ) -> StoreResult<Message> {
        self.create(thread_id, parent_id, message).await
    }

    async fn create_subtree(
        &self,
        thread_id: Uuid,
        parent_id: Option<Uuid>,
        root: &Message,
    ) -> StoreResult<Message> {
        self.create(thread_id, parent_id, root).await
    }

    async fn update_message(
        &self,
        thread_id: Uuid,
        message_id: Uuid,
        content: &MessageContent,
    ) -> StoreResult<()> {
        self.apply(
            thread_id,
            StoreEvent::MessageUpdated {
                message_id,
                content: content.clone(),
            },
        )
        .await
    }

    async fn delete_message(
        &self,
        thread_id: Uuid,
        message_id: Uuid,
        policy: DeletePolicy,
    ) -> StoreResult<()> {
        self.apply(thread_id, StoreEvent::MessageDeleted { message_id, policy })
            .await
    }

    async fn fetch_thread(&self, thread_id: Uuid) -> StoreResult<Thread> {
        self.threads
            .read()
            .await
            .get(&thread_id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("thread {thread_id}")))
    }

    async fn list_threads(&self) -> StoreResult<Vec<Thread>> {
        let mut threads: Vec<Thread> = self.threads.read().await.values().cloned().collect();
        sort_threads(&mut threads);
        Ok(threads)
    }

    async fn create_thread(&self, title: &str, client_id: Option<Uuid>) -> StoreResult<Thread> {
        let mut threads = self.threads.write().await;
        let client_id = client_id.filter(|id| !threads.contains_key(id));
        let thread = new_thread(title, client_id);
        threads.insert(thread.id, thread.clone());
        Ok(thread)
    }

    async fn update_thread(&self, thread_id: Uuid, patch: &ThreadPatch) -> StoreResult<()> {
        self.apply(
            thread_id,
            StoreEvent::ThreadUpdated {
                patch: patch.clone(),
            },
        )
        .await
    }

    async fn delete_thread(&self, thread_id: Uuid) -> StoreResult<()> {
        self.threads
            .write()
            .await
            .remove(&thread_id)
            .map(|_| ())
            .ok_or_else(|| StoreError::NotFound(format!("thread {thread_id}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn create_stamps_author_and_keeps_client_id() {
        let store = MemoryStore::with_author("ada");
        let client_id = Uuid::new_v4();
        let thread = store.create_thread("notes", Some(client_id)).await.unwrap();
        assert_eq!(thread.id, client_id);

        let root = Message::human("q").with_replies(vec![Message::human("a")]);
        let created = store.create_subtree(thread.id, None, &root).await.unwrap();
        assert_eq!(created.author.as_deref(), Some("ada"));
        assert_eq!(created.replies[0].author.as_deref(), Some("ada"));

        let fetched = store.fetch_thread(thread.id).await.unwrap();
        assert_eq!(fetched.messages, vec![created]);
    }

    #[tokio::test]
    async fn taken_client_id_gets_a_fresh_one() {
        let store = MemoryStore::new();
        let first = store.create_thread("a", None).await.unwrap();
        let second = store.create_thread("b", Some(first.id)).await.unwrap();
        assert_ne!(first.id, second.id);
    }

    #[tokio::test]
    async fn writes_to_missing_thread_fail() {
        let store = MemoryStore::new();
        let err = store
            .create_message(Uuid::new_v4(), None, &Message::human("x"))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
        assert!(store.delete_thread(Uuid::new_v4()).await.is_err());
    }

    #[tokio::test]
    async fn delete_and_patch_apply() {
        let store = MemoryStore::new();
        let thread = store.create_thread("t", None).await.unwrap();
        let parent = Message::human("p").with_replies(vec![Message::human("c")]);
        store.create_subtree(thread.id, None, &parent).await.unwrap();

        store
            .delete_message(thread.id, parent.id, DeletePolicy::PromoteChildren)
            .await
            .unwrap();
        store
            .update_thread(thread.id, &ThreadPatch::pinned(true))
            .await
            .unwrap();

        let fetched = store.fetch_thread(thread.id).await.unwrap();
        assert_eq!(fetched.messages.len(), 1);
        assert_eq!(fetched.messages[0].id, parent.replies[0].id);
        assert!(fetched.pinned);
    }
}
