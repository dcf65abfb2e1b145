//! File-backed store: `<thread>.json` snapshot plus `<thread>.jsonl` journal.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use thread_core::{DeletePolicy, Message, MessageContent, Thread, ThreadPatch};
use tokio::fs;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::Mutex;
use uuid::Uuid;

use super::{new_thread, sort_threads, stamp_author, StoreEvent, ThreadStore};
use crate::error::{StoreError, StoreResult};

#[derive(Debug)]
pub struct JsonFileStore {
    base_path: PathBuf,
    author: String,
    // serializes read-modify-write cycles on the thread files
    write_lock: Mutex<()>,
}

impl JsonFileStore {
    pub fn new(base_path: impl AsRef<Path>) -> Self {
        Self {
            base_path: base_path.as_ref().to_path_buf(),
            author: "local".to_string(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn with_author(mut self, author: impl Into<String>) -> Self {
        self.author = author.into();
        self
    }

    pub async fn init(&self) -> StoreResult<()> {
        fs::create_dir_all(&self.base_path).await?;
        Ok(())
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// Every event accepted for `thread_id`, oldest first.
    pub async fn load_events(&self, thread_id: Uuid) -> StoreResult<Vec<StoreEvent>> {
        let path = self.events_path(thread_id);
        if !path.exists() {
            return Ok(Vec::new());
        }

        let file = fs::File::open(path).await?;
        let mut lines = BufReader::new(file).lines();
        let mut events = Vec::new();
        while let Some(line) = lines.next_line().await? {
            match serde_json::from_str(&line) {
                Ok(event) => events.push(event),
                Err(e) => log::warn!("[{}] Skipping unreadable journal line: {}", thread_id, e),
            }
        }
        Ok(events)
    }

    async fn load_thread(&self, thread_id: Uuid) -> StoreResult<Thread> {
        let path = self.thread_path(thread_id);
        if !path.exists() {
            return Err(StoreError::NotFound(format!("thread {thread_id}")));
        }
        let content = fs::read_to_string(path).await?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Write the snapshot beside the live file, then rename it over.
    async fn save_thread(&self, thread: &Thread) -> StoreResult<()> {
        let json = serde_json::to_string_pretty(thread)?;
        let path = self.thread_path(thread.id);
        let tmp = path.with_extension("json.tmp");
        if let Err(e) = fs::write(&tmp, json).await {
            let _ = fs::remove_file(&tmp).await;
            return Err(e.into());
        }
        fs::rename(&tmp, &path).await?;
        Ok(())
    }

    /// Append one journal line and return the journal length before it.
    async fn append_event(&self, thread_id: Uuid, event: &StoreEvent) -> StoreResult<u64> {
        let mut line = serde_json::to_string(event)?;
        line.push('\n');
        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.events_path(thread_id))
            .await?;
        let before = file.metadata().await?.len();
        if let Err(e) = file.write_all(line.as_bytes()).await {
            let _ = file.set_len(before).await;
            return Err(e.into());
        }
        file.flush().await?;
        Ok(before)
    }

    async fn truncate_journal(&self, thread_id: Uuid, len: u64) {
        let truncated = async {
            let file = fs::OpenOptions::new()
                .write(true)
                .open(self.events_path(thread_id))
                .await?;
            file.set_len(len).await
        };
        if let Err(e) = truncated.await {
            log::error!("[{}] Could not drop unsaved journal entry: {}", thread_id, e);
        }
    }

    /// Journal first, snapshot second. A write either lands in both files or
    /// in neither.
    async fn apply(&self, thread_id: Uuid, event: StoreEvent) -> StoreResult<()> {
        let _guard = self.write_lock.lock().await;
        let mut thread = self.load_thread(thread_id).await?;
        event.apply(&mut thread)?;
        let journal_len = self.append_event(thread_id, &event).await?;
        if let Err(e) = self.save_thread(&thread).await {
            log::warn!("[{}] Snapshot write failed, dropping journal entry: {}", thread_id, e);
            self.truncate_journal(thread_id, journal_len).await;
            return Err(e);
        }
        log::debug!("[{}] Stored {}", thread_id, event_name(&event));
        Ok(())
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

    fn thread_path(&self, thread_id: Uuid) -> PathBuf {
        self.base_path.join(format!("{}.json", thread_id))
    }

    fn events_path(&self, thread_id: Uuid) -> PathBuf {
        self.base_path.join(format!("{}.jsonl", thread_id))
    }
}

fn event_name(event: &StoreEvent) -> &'static str {
    match event {
        StoreEvent::MessageCreated { .. } => "message_created",
        StoreEvent::MessageUpdated { .. } => "message_updated",
        StoreEvent::MessageDeleted { .. } => "message_deleted",
        StoreEvent::ThreadUpdated { .. } => "thread_updated",
    }
}

#[async_trait]
impl ThreadStore for JsonFileStore {
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
        self.load_thread(thread_id).await
    }

    async fn list_threads(&self) -> StoreResult<Vec<Thread>> {
        if !self.base_path.exists() {
            return Ok(Vec::new());
        }

        let mut threads = Vec::new();
        let mut entries = fs::read_dir(&self.base_path).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some("json") {
                continue;
            }
            let content = fs::read_to_string(&path).await?;
            match serde_json::from_str::<Thread>(&content) {
                Ok(thread) => threads.push(thread),
                Err(e) => log::warn!("Skipping unreadable thread file {}: {}", path.display(), e),
            }
        }

        sort_threads(&mut threads);
        Ok(threads)
    }

    async fn create_thread(&self, title: &str, client_id: Option<Uuid>) -> StoreResult<Thread> {
        let _guard = self.write_lock.lock().await;
        let client_id = client_id.filter(|id| !self.thread_path(*id).exists());
        let thread = new_thread(title, client_id);
        self.save_thread(&thread).await?;
        log::info!("[{}] Created thread '{}'", thread.id, thread.title);
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
        let _guard = self.write_lock.lock().await;
        let mut deleted_any = false;
        for path in [self.thread_path(thread_id), self.events_path(thread_id)] {
            match fs::remove_file(&path).await {
                Ok(()) => deleted_any = true,
                Err(error) if error.kind() == std::io::ErrorKind::NotFound => {}
                Err(error) => return Err(error.into()),
            }
        }

        if deleted_any {
            log::info!("[{}] Deleted thread", thread_id);
            Ok(())
        } else {
            Err(StoreError::NotFound(format!("thread {thread_id}")))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use thread_core::tree;

    async fn temp_store() -> (JsonFileStore, tempfile::TempDir) {
        let dir = tempfile::tempdir().expect("temp dir");
        let store = JsonFileStore::new(dir.path().join("threads")).with_author("tester");
        store.init().await.expect("init");
        (store, dir)
    }

    #[tokio::test]
    async fn writes_survive_a_reopen() {
        let (store, dir) = temp_store().await;
        let thread = store.create_thread("persisted", None).await.unwrap();
        let root = Message::human("hello");
        store.create_message(thread.id, None, &root).await.unwrap();
        store
            .update_message(thread.id, root.id, &MessageContent::text("hello again"))
            .await
            .unwrap();

        let reopened = JsonFileStore::new(dir.path().join("threads"));
        let fetched = reopened.fetch_thread(thread.id).await.unwrap();
        assert_eq!(fetched.title, "persisted");
        let stored = tree::find(&fetched.messages, root.id).unwrap();
        assert_eq!(stored.content.as_text(), "hello again");
        assert_eq!(stored.author.as_deref(), Some("tester"));
    }

    #[tokio::test]
    async fn journal_records_accepted_writes_only() {
        let (store, _dir) = temp_store().await;
        let thread = store.create_thread("journal", None).await.unwrap();
        let root = Message::human("root");
        store.create_message(thread.id, None, &root).await.unwrap();
        assert!(store
            .update_message(thread.id, Uuid::new_v4(), &"nope".into())
            .await
            .is_err());
        store
            .delete_message(thread.id, root.id, DeletePolicy::Cascade)
            .await
            .unwrap();

        let events = store.load_events(thread.id).await.unwrap();
        assert_eq!(events.len(), 2);
        assert!(matches!(events[0], StoreEvent::MessageCreated { .. }));
        assert!(matches!(
            events[1],
            StoreEvent::MessageDeleted {
                policy: DeletePolicy::Cascade,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn failed_snapshot_write_leaves_both_files_untouched() {
        let (store, _dir) = temp_store().await;
        let thread = store.create_thread("atomic", None).await.unwrap();
        let root = Message::human("kept");
        store.create_message(thread.id, None, &root).await.unwrap();

        // a directory squatting on the temp path makes the snapshot write fail
        let tmp = store.thread_path(thread.id).with_extension("json.tmp");
        fs::create_dir(&tmp).await.unwrap();
        assert!(store
            .update_message(thread.id, root.id, &"lost".into())
            .await
            .is_err());

        let fetched = store.fetch_thread(thread.id).await.unwrap();
        assert_eq!(fetched.messages[0].content.as_text(), "kept");
        assert_eq!(store.load_events(thread.id).await.unwrap().len(), 1);

        fs::remove_dir(&tmp).await.unwrap();
        store
            .update_message(thread.id, root.id, &"saved".into())
            .await
            .unwrap();
        let fetched = store.fetch_thread(thread.id).await.unwrap();
        assert_eq!(fetched.messages[0].content.as_text(), "saved");
        assert_eq!(store.load_events(thread.id).await.unwrap().len(), 2);
        assert!(!tmp.exists());
    }

    #[tokio::test]
    async fn list_and_delete_threads() {
        let (store, _dir) = temp_store().await;
        let a = store.create_thread("a", None).await.unwrap();
        let b = store.create_thread("b", None).await.unwrap();
        store
            .update_thread(a.id, &ThreadPatch::pinned(true))
            .await
            .unwrap();

        let listed = store.list_threads().await.unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].id, a.id);

        store.delete_thread(b.id).await.unwrap();
        assert_eq!(store.list_threads().await.unwrap().len(), 1);
        assert!(matches!(
            store.delete_thread(b.id).await,
            Err(StoreError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn missing_directory_lists_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().join("absent"));
        assert!(store.list_threads().await.unwrap().is_empty());
    }
}
