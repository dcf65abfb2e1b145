//! Entry points for the presentation layer.

use std::sync::Arc;

use thread_core::tree::{self, CollapseThresholds, DeletePolicy};
use thread_core::{
    Config, GenerationConfig, Message, MessageContent, Thread, ThreadPatch, TreeError,
};
use thread_llm::{build_prompt_context, GenerationProvider, GenerationStream};
use tokio::sync::{mpsc, Mutex};
use uuid::Uuid;

use crate::clipboard::{check_target, Clipboard, ClipboardKind, ClipboardPayload};
use crate::error::{Result, SyncError};
use crate::events::{EventSink, SyncEvent};
use crate::generation::{
    GenerationHandle, GenerationOutcome, GenerationRegistry, StartOutcome, StreamMerge,
};
use crate::optimistic::{
    execute, AddMessage, CreateThread, DeleteMessage, DeleteThread, EditMessage, PasteSubtree,
    UpdateThread,
};
use crate::store::ThreadStore;
use crate::view::{LocalView, ViewState};

const DEFAULT_THREAD_TITLE: &str = "New thread";

/// Result of [`SyncEngine::generate_reply`]
#[derive(Debug, Clone, PartialEq)]
pub enum ReplyOutcome {
    Finished {
        message_id: Uuid,
        outcome: GenerationOutcome,
    },
    /// The reply to this parent was already streaming and has been stopped
    Stopped { message_id: Uuid },
}

pub struct SyncEngine {
    view: LocalView,
    store: Arc<dyn ThreadStore>,
    provider: Option<Arc<dyn GenerationProvider>>,
    clipboard: Mutex<Clipboard>,
    generations: GenerationRegistry,
    thresholds: CollapseThresholds,
    checkpoint_every: Option<usize>,
    events: EventSink,
}

impl SyncEngine {
    pub fn new(store: Arc<dyn ThreadStore>) -> Self {
        Self {
            view: LocalView::new(),
            store,
            provider: None,
            clipboard: Mutex::new(Clipboard::new()),
            generations: GenerationRegistry::new(),
            thresholds: CollapseThresholds::default(),
            checkpoint_every: None,
            events: EventSink::default(),
        }
    }

    pub fn from_config(config: &Config, store: Arc<dyn ThreadStore>) -> Self {
        Self::new(store)
            .with_thresholds(config.collapse)
            .with_checkpoint_every(config.checkpoint_every)
    }

    pub fn with_provider(mut self, provider: Arc<dyn GenerationProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    pub fn with_thresholds(mut self, thresholds: CollapseThresholds) -> Self {
        self.thresholds = thresholds;
        self
    }

    pub fn with_checkpoint_every(mut self, every: Option<usize>) -> Self {
        self.checkpoint_every = every.filter(|n| *n > 0);
        self
    }

    pub fn with_events(mut self, tx: mpsc::Sender<SyncEvent>) -> Self {
        self.events = EventSink::new(tx);
        self
    }

    // ---- loading ----

    /// Replace the local thread list with the store's.
    pub async fn load_threads(&self) -> Result<usize> {
        let threads = self.store.list_threads().await?;
        let count = threads.len();
        self.view
            .write(|state| {
                state.threads = threads;
                let ViewState { threads, selection } = state;
                selection.retain(|thread_id, _| threads.iter().any(|t| t.id == *thread_id));
            })
            .await;
        log::debug!("Loaded {} thread(s)", count);
        Ok(count)
    }

    /// Re-fetch one thread and swap it into the view.
    pub async fn refresh_thread(&self, thread_id: Uuid) -> Result<Thread> {
        let thread = self.store.fetch_thread(thread_id).await?;
        self.view
            .write(|state| state.upsert_thread(thread.clone()))
            .await;
        Ok(thread)
    }

    // ---- reads ----

    pub fn view(&self) -> &LocalView {
        &self.view
    }

    pub async fn threads(&self) -> Vec<Thread> {
        self.view.read(|state| state.threads.clone()).await
    }

    pub async fn thread(&self, thread_id: Uuid) -> Option<Thread> {
        self.view.read(|state| state.thread(thread_id).cloned()).await
    }

    pub async fn selection(&self, thread_id: Uuid) -> Option<Uuid> {
        self.view.read(|state| state.selection(thread_id)).await
    }

    /// The thread's forest with auto-collapse applied around the selection.
    pub async fn visible_messages(&self, thread_id: Uuid) -> Result<Vec<Message>> {
        let thresholds = self.thresholds;
        self.view
            .read(|state| {
                let thread = state.require_thread(thread_id)?;
                Ok(tree::auto_collapse(
                    &thread.messages,
                    state.selection(thread_id),
                    thresholds,
                ))
            })
            .await
    }

    pub async fn clipboard(&self) -> Option<ClipboardPayload> {
        self.clipboard.lock().await.pending().cloned()
    }

    /// `(thread id, message id)` of every streaming generation
    pub fn active_generations(&self) -> Vec<(Uuid, Uuid)> {
        self.generations.active()
    }

    pub fn is_generating(&self, message_id: Uuid) -> bool {
        self.generations.is_active(message_id)
    }

    // ---- selection and collapse (local only) ----

    /// Select a message (or clear the selection) and rerun auto-collapse.
    pub async fn select_message(
        &self,
        thread_id: Uuid,
        message_id: Option<Uuid>,
    ) -> Result<Vec<Message>> {
        let thresholds = self.thresholds;
        self.view
            .write(|state| {
                let thread = state.require_thread(thread_id)?;
                if let Some(id) = message_id {
                    if !tree::contains(&thread.messages, id) {
                        return Err(TreeError::NotFound(id).into());
                    }
                }
                let visible = tree::auto_collapse(&thread.messages, message_id, thresholds);
                state.set_selection(thread_id, message_id);
                Ok(visible)
            })
            .await
    }

    /// Flip a message's collapsed state; returns the new state.
    pub async fn toggle_collapse(&self, thread_id: Uuid, message_id: Uuid) -> Result<bool> {
        self.view
            .write(|state| {
                let thread = state.require_thread_mut(thread_id)?;
                let next = tree::toggle_collapse(&thread.messages, message_id)?;
                let collapsed = tree::find(&next, message_id).is_some_and(|m| m.user_collapsed);
                thread.messages = next;
                Ok(collapsed)
            })
            .await
    }

    // ---- messages ----

    /// Add a human message under `parent_id` (or as a new root) and select it.
    pub async fn add_message(
        &self,
        thread_id: Uuid,
        parent_id: Option<Uuid>,
        content: MessageContent,
    ) -> Result<Message> {
        let mutation = AddMessage {
            thread_id,
            parent_id,
            message: Message::human(content),
        };
        execute(&self.view, self.store.as_ref(), &self.events, &mutation).await
    }

    pub async fn edit_message(
        &self,
        thread_id: Uuid,
        message_id: Uuid,
        content: MessageContent,
    ) -> Result<()> {
        let mutation = EditMessage {
            thread_id,
            message_id,
            content,
        };
        execute(&self.view, self.store.as_ref(), &self.events, &mutation).await
    }

    /// Discarding the edit of a still-empty message removes it, keeping any
    /// replies. Returns whether the message was removed.
    pub async fn cancel_empty_edit(&self, thread_id: Uuid, message_id: Uuid) -> Result<bool> {
        let empty = self
            .view
            .read(|state| {
                let thread = state.require_thread(thread_id)?;
                tree::find(&thread.messages, message_id)
                    .map(|message| message.content.is_empty())
                    .ok_or(SyncError::from(TreeError::NotFound(message_id)))
            })
            .await?;
        if !empty {
            return Ok(false);
        }

        self.delete_message(thread_id, message_id, DeletePolicy::PromoteChildren)
            .await?;
        Ok(true)
    }

    pub async fn delete_message(
        &self,
        thread_id: Uuid,
        message_id: Uuid,
        policy: DeletePolicy,
    ) -> Result<()> {
        let mutation = DeleteMessage {
            thread_id,
            message_id,
            policy,
        };
        execute(&self.view, self.store.as_ref(), &self.events, &mutation).await
    }

    /// Insert a fresh clone of a message's subtree next to it.
    pub async fn duplicate_message(&self, thread_id: Uuid, message_id: Uuid) -> Result<Message> {
        let (parent_id, root) = self
            .view
            .read(|state| {
                let thread = state.require_thread(thread_id)?;
                let located = tree::locate(&thread.messages, message_id)
                    .ok_or(TreeError::NotFound(message_id))?;
                Ok::<_, SyncError>((
                    located.parent().map(|parent| parent.id),
                    tree::clone_subtree(located.message),
                ))
            })
            .await?;

        let mutation = PasteSubtree {
            thread_id,
            parent_id,
            root,
        };
        execute(&self.view, self.store.as_ref(), &self.events, &mutation).await
    }

    /// Relocate a subtree, possibly into another thread.
    ///
    /// The destination receives a fresh clone; the original is then removed
    /// with its replies. If that removal fails the clone stays and
    /// [`SyncError::OriginalKept`] names it.
    pub async fn move_message(
        &self,
        thread_id: Uuid,
        message_id: Uuid,
        target_thread_id: Uuid,
        target_parent_id: Option<Uuid>,
    ) -> Result<Message> {
        let root = self
            .view
            .read(|state| {
                let thread = state.require_thread(thread_id)?;
                let source = tree::find(&thread.messages, message_id)
                    .ok_or(TreeError::NotFound(message_id))?;
                let target = state.require_thread(target_thread_id)?;
                check_target(
                    &target.messages,
                    target_thread_id,
                    target_parent_id,
                    ClipboardKind::Cut,
                    thread_id,
                    message_id,
                )?;
                Ok::<_, SyncError>(tree::clone_subtree(source))
            })
            .await?;

        let mutation = PasteSubtree {
            thread_id: target_thread_id,
            parent_id: target_parent_id,
            root,
        };
        let created = execute(&self.view, self.store.as_ref(), &self.events, &mutation).await?;
        self.remove_original(thread_id, message_id, created.id).await?;
        Ok(created)
    }

    // ---- clipboard ----

    pub async fn copy(&self, thread_id: Uuid, message_id: Uuid) -> Result<ClipboardPayload> {
        self.copy_or_cut(thread_id, message_id, ClipboardKind::Copy)
            .await
    }

    pub async fn cut(&self, thread_id: Uuid, message_id: Uuid) -> Result<ClipboardPayload> {
        self.copy_or_cut(thread_id, message_id, ClipboardKind::Cut)
            .await
    }

    pub async fn copy_or_cut(
        &self,
        thread_id: Uuid,
        message_id: Uuid,
        kind: ClipboardKind,
    ) -> Result<ClipboardPayload> {
        let forest = self.forest(thread_id).await?;
        let mut clipboard = self.clipboard.lock().await;
        Ok(clipboard
            .copy_or_cut(&forest, thread_id, message_id, kind)?
            .clone())
    }

    pub async fn clear_clipboard(&self) {
        self.clipboard.lock().await.clear();
    }

    /// Paste the pending payload under `parent_id` (or as a new root).
    ///
    /// A cut payload is dropped as soon as its copy is stored.
    pub async fn paste(&self, thread_id: Uuid, parent_id: Option<Uuid>) -> Result<Message> {
        let forest = self.forest(thread_id).await?;
        let plan = self
            .clipboard
            .lock()
            .await
            .prepare_paste(&forest, thread_id, parent_id)?;

        let mutation = PasteSubtree {
            thread_id,
            parent_id,
            root: plan.root,
        };
        let created = execute(&self.view, self.store.as_ref(), &self.events, &mutation).await?;

        if let Some((source_thread_id, original_id)) = plan.cut_source {
            // the copy is stored, so the payload must not paste a second time
            self.clipboard.lock().await.finish_cut(original_id);
            self.remove_original(source_thread_id, original_id, created.id)
                .await?;
        }
        Ok(created)
    }

    /// Delete a cut or moved original once its copy is stored.
    async fn remove_original(&self, thread_id: Uuid, message_id: Uuid, created: Uuid) -> Result<()> {
        match self
            .delete_message(thread_id, message_id, DeletePolicy::Cascade)
            .await
        {
            Ok(()) => Ok(()),
            Err(SyncError::NotFound(what)) => {
                log::debug!("[{}] Original already gone ({})", message_id, what);
                Ok(())
            }
            Err(error) => {
                log::warn!(
                    "[{}] Copy {} stored but original kept: {}",
                    message_id,
                    created,
                    error
                );
                Err(SyncError::OriginalKept {
                    created,
                    reason: error.to_string(),
                })
            }
        }
    }

    async fn forest(&self, thread_id: Uuid) -> Result<Vec<Message>> {
        self.view
            .read(|state| {
                state
                    .require_thread(thread_id)
                    .map(|thread| thread.messages.clone())
            })
            .await
    }

    // ---- threads ----

    pub async fn create_thread(&self, title: &str) -> Result<Thread> {
        let title = match title.trim() {
            "" => DEFAULT_THREAD_TITLE,
            trimmed => trimmed,
        };
        let mutation = CreateThread {
            thread: Thread::new(title),
        };
        execute(&self.view, self.store.as_ref(), &self.events, &mutation).await
    }

    pub async fn rename_thread(&self, thread_id: Uuid, title: &str) -> Result<()> {
        let title = title.trim();
        if title.is_empty() {
            return Err(SyncError::InvalidOperation(
                "thread title cannot be empty".to_string(),
            ));
        }
        self.update_thread(thread_id, ThreadPatch::title(title))
            .await
    }

    pub async fn set_pinned(&self, thread_id: Uuid, pinned: bool) -> Result<()> {
        self.update_thread(thread_id, ThreadPatch::pinned(pinned))
            .await
    }

    /// Flip the pin state; returns the new state.
    pub async fn toggle_pin(&self, thread_id: Uuid) -> Result<bool> {
        let pinned = self
            .view
            .read(|state| state.require_thread(thread_id).map(|thread| !thread.pinned))
            .await?;
        self.set_pinned(thread_id, pinned).await?;
        Ok(pinned)
    }

    async fn update_thread(&self, thread_id: Uuid, patch: ThreadPatch) -> Result<()> {
        let mutation = UpdateThread { thread_id, patch };
        execute(&self.view, self.store.as_ref(), &self.events, &mutation).await
    }

    /// Delete a thread; generations streaming into it are stopped.
    pub async fn delete_thread(&self, thread_id: Uuid) -> Result<()> {
        let mutation = DeleteThread { thread_id };
        execute(&self.view, self.store.as_ref(), &self.events, &mutation).await?;
        for (owner, message_id) in self.generations.active() {
            if owner == thread_id {
                self.generations.stop(message_id);
            }
        }
        Ok(())
    }

    // ---- generation ----

    /// Register a generation targeting `message_id`, or stop the running one.
    pub async fn start_generation(&self, thread_id: Uuid, message_id: Uuid) -> Result<StartOutcome> {
        self.start_with_source(thread_id, message_id, None).await
    }

    async fn start_with_source(
        &self,
        thread_id: Uuid,
        message_id: Uuid,
        source: Option<Uuid>,
    ) -> Result<StartOutcome> {
        let original = self
            .view
            .read(|state| {
                let thread = state.require_thread(thread_id)?;
                tree::find(&thread.messages, message_id)
                    .map(|message| message.content.clone())
                    .ok_or(SyncError::from(TreeError::NotFound(message_id)))
            })
            .await?;
        Ok(self
            .generations
            .start(thread_id, message_id, source, original))
    }

    pub fn stop_generation(&self, message_id: Uuid) -> bool {
        self.generations.stop(message_id)
    }

    /// Fold `stream` into the handle's message until it ends or is stopped.
    pub async fn run_generation(
        &self,
        handle: GenerationHandle,
        stream: GenerationStream,
    ) -> Result<GenerationOutcome> {
        let merge = StreamMerge {
            view: &self.view,
            store: self.store.as_ref(),
            events: &self.events,
            checkpoint_every: self.checkpoint_every,
        };
        merge.run(handle, stream).await
    }

    /// Create a generated reply to `parent_id` and stream into it.
    ///
    /// Calling this again for the same parent while its reply is streaming
    /// stops that reply instead.
    pub async fn generate_reply(
        &self,
        thread_id: Uuid,
        parent_id: Uuid,
        config: GenerationConfig,
    ) -> Result<ReplyOutcome> {
        if let Some(message_id) = self.generations.stop_by_source(parent_id) {
            return Ok(ReplyOutcome::Stopped { message_id });
        }

        let provider = self.provider.clone().ok_or_else(|| {
            SyncError::InvalidOperation("no generation provider configured".to_string())
        })?;

        let request = self
            .view
            .read(|state| {
                let thread = state.require_thread(thread_id)?;
                Ok::<_, SyncError>(build_prompt_context(&thread.messages, parent_id, &config)?)
            })
            .await?;

        let reply = Message::generated(config);
        let reply_id = reply.id;
        let mutation = AddMessage {
            thread_id,
            parent_id: Some(parent_id),
            message: reply,
        };
        execute(&self.view, self.store.as_ref(), &self.events, &mutation).await?;

        let handle = match self
            .start_with_source(thread_id, reply_id, Some(parent_id))
            .await?
        {
            StartOutcome::Started(handle) => handle,
            StartOutcome::Stopped => return Ok(ReplyOutcome::Stopped { message_id: reply_id }),
        };

        log::info!(
            "[{}] Generating reply {} with {} prompt message(s)",
            thread_id,
            reply_id,
            request.messages.len()
        );
        let stream = provider
            .generate_stream(&request)
            .await
            .map_err(|error| SyncError::RemoteFailure(error.to_string()))?;

        let outcome = self.run_generation(handle, stream).await?;
        Ok(ReplyOutcome::Finished {
            message_id: reply_id,
            outcome,
        })
    }
}
