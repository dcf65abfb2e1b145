#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use thread_core::{DeletePolicy, Message, MessageContent, Thread, ThreadPatch};
use thread_llm::{
    GenerationChunk, GenerationProvider, GenerationRequest, GenerationStream,
};
use thread_sync::{MemoryStore, StoreError, StoreResult, SyncEngine, ThreadStore};
use uuid::Uuid;

/// Memory store whose writes can be made to fail, recording every write.
#[derive(Default)]
pub struct FlakyStore {
    pub inner: MemoryStore,
    fail: AtomicBool,
    calls: Mutex<Vec<&'static str>>,
    slow_failure: Mutex<Option<(&'static str, Uuid)>>,
}

impl FlakyStore {
    pub fn fail_writes(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub fn calls(&self) -> Vec<&'static str> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, name: &str) -> usize {
        self.calls().iter().filter(|call| **call == name).count()
    }

    /// Make the next `name` write keyed on `key` wait a moment and then fail.
    ///
    /// `create_message` is keyed on its parent id, `delete_message` on the
    /// target id.
    pub fn fail_slowly(&self, name: &'static str, key: Uuid) {
        *self.slow_failure.lock().unwrap() = Some((name, key));
    }

    async fn targeted(&self, name: &'static str, key: Option<Uuid>) -> StoreResult<()> {
        let hit = {
            let mut slot = self.slow_failure.lock().unwrap();
            match *slot {
                Some((target, k)) if target == name && Some(k) == key => slot.take().is_some(),
                _ => false,
            }
        };
        if hit {
            tokio::time::sleep(Duration::from_millis(100)).await;
            return Err(StoreError::Rejected("injected slow failure".to_string()));
        }
        Ok(())
    }

    fn write(&self, name: &'static str) -> StoreResult<()> {
        self.calls.lock().unwrap().push(name);
        if self.fail.load(Ordering::SeqCst) {
            Err(StoreError::Rejected("injected failure".to_string()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl ThreadStore for FlakyStore {
    async fn create_message(
        &self,
        thread_id: Uuid,
        parent_id: Option<Uuid>,
        message: &Message,
    ) -> StoreResult<Message> {
        self.write("create_message")?;
        self.targeted("create_message", parent_id).await?;
        self.inner.create_message(thread_id, parent_id, message).await
    }

    async fn create_subtree(
        &self,
        thread_id: Uuid,
        parent_id: Option<Uuid>,
        root: &Message,
    ) -> StoreResult<Message> {
        self.write("create_subtree")?;
        self.inner.create_subtree(thread_id, parent_id, root).await
    }

    async fn update_message(
        &self,
        thread_id: Uuid,
        message_id: Uuid,
        content: &MessageContent,
    ) -> StoreResult<()> {
        self.write("update_message")?;
        self.inner.update_message(thread_id, message_id, content).await
    }

    async fn delete_message(
        &self,
        thread_id: Uuid,
        message_id: Uuid,
        policy: DeletePolicy,
    ) -> StoreResult<()> {
        self.write("delete_message")?;
        self.targeted("delete_message", Some(message_id)).await?;
        self.inner.delete_message(thread_id, message_id, policy).await
    }

    async fn fetch_thread(&self, thread_id: Uuid) -> StoreResult<Thread> {
        self.inner.fetch_thread(thread_id).await
    }

    async fn list_threads(&self) -> StoreResult<Vec<Thread>> {
        self.inner.list_threads().await
    }

    async fn create_thread(&self, title: &str, client_id: Option<Uuid>) -> StoreResult<Thread> {
        self.write("create_thread")?;
        self.inner.create_thread(title, client_id).await
    }

    async fn update_thread(&self, thread_id: Uuid, patch: &ThreadPatch) -> StoreResult<()> {
        self.write("update_thread")?;
        self.inner.update_thread(thread_id, patch).await
    }

    async fn delete_thread(&self, thread_id: Uuid) -> StoreResult<()> {
        self.write("delete_thread")?;
        self.inner.delete_thread(thread_id).await
    }
}

pub struct Fixture {
    pub store: Arc<FlakyStore>,
    pub engine: SyncEngine,
    pub thread_id: Uuid,
}

/// Engine over a healthy store holding one empty thread.
pub async fn fixture() -> Fixture {
    let store = Arc::new(FlakyStore::default());
    let engine = SyncEngine::new(store.clone());
    let thread = engine.create_thread("test").await.unwrap();
    Fixture {
        store,
        engine,
        thread_id: thread.id,
    }
}

/// The thread's local forest and selection.
pub async fn local_tree(engine: &SyncEngine, thread_id: Uuid) -> (Vec<Message>, Option<Uuid>) {
    let thread = engine.thread(thread_id).await.unwrap();
    (thread.messages, engine.selection(thread_id).await)
}

/// Provider that replays fixed fragments and records the prompts it saw.
#[derive(Default)]
pub struct ScriptedProvider {
    pub fragments: Vec<&'static str>,
    pub requests: Mutex<Vec<GenerationRequest>>,
}

impl ScriptedProvider {
    pub fn new(fragments: Vec<&'static str>) -> Self {
        Self {
            fragments,
            requests: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl GenerationProvider for ScriptedProvider {
    async fn generate_stream(
        &self,
        request: &GenerationRequest,
    ) -> thread_llm::Result<GenerationStream> {
        self.requests.lock().unwrap().push(request.clone());
        let mut chunks: Vec<thread_llm::Result<GenerationChunk>> = self
            .fragments
            .iter()
            .map(|fragment| Ok(GenerationChunk::Token(fragment.to_string())))
            .collect();
        chunks.push(Ok(GenerationChunk::Done));
        Ok(Box::pin(futures::stream::iter(chunks)))
    }

    fn default_model(&self) -> &str {
        "scripted"
    }
}

pub fn token(text: &str) -> thread_llm::Result<GenerationChunk> {
    Ok(GenerationChunk::Token(text.to_string()))
}
