//! Snapshot, apply locally, call the store, then reconcile or roll back.

use async_trait::async_trait;
use thread_core::tree::{self, DeletePolicy};
use thread_core::{Message, MessageContent, Thread, ThreadPatch};
use uuid::Uuid;

use crate::error::{Result, StoreResult, SyncError};
use crate::events::{EventSink, SyncEvent};
use crate::store::ThreadStore;
use crate::view::{LocalView, Snapshot, SnapshotScope, ViewState};

/// A write that is shown locally before the store confirms it.
#[async_trait]
pub trait OptimisticMutation: Send + Sync {
    type Output: Send;

    /// Short name used in logs and events
    fn name(&self) -> &'static str;

    fn scope(&self) -> SnapshotScope;

    /// State to restore if the store call fails.
    fn capture(&self, state: &ViewState) -> Result<Snapshot> {
        state.capture(self.scope())
    }

    /// Compute the rewrite and install it. Must leave `state` untouched when
    /// it returns an error.
    fn apply(&self, state: &mut ViewState) -> Result<()>;

    async fn remote(&self, store: &dyn ThreadStore) -> StoreResult<Self::Output>;

    /// Merge server-assigned fields from a successful store call.
    fn reconcile(&self, _state: &mut ViewState, _output: &Self::Output) {}
}

/// Run `mutation` through the optimistic protocol.
///
/// `NotFound` / `InvalidOperation` come back before the view changes. A store
/// failure undoes only this mutation's own effect and returns `RemoteFailure`;
/// writes that landed in the meantime stay.
pub async fn execute<M: OptimisticMutation>(
    view: &LocalView,
    store: &dyn ThreadStore,
    events: &EventSink,
    mutation: &M,
) -> Result<M::Output> {
    let snapshot = view
        .write(|state| {
            let snapshot = mutation.capture(state)?;
            mutation.apply(state)?;
            Ok::<_, SyncError>(snapshot)
        })
        .await?;

    match mutation.remote(store).await {
        Ok(output) => {
            view.write(|state| mutation.reconcile(state, &output)).await;
            log::debug!("{} committed", mutation.name());
            events
                .send(SyncEvent::Committed {
                    operation: mutation.name().to_string(),
                })
                .await;
            Ok(output)
        }
        Err(error) => {
            view.write(|state| state.restore(snapshot)).await;
            log::warn!("{} rolled back: {}", mutation.name(), error);
            events
                .send(SyncEvent::RolledBack {
                    operation: mutation.name().to_string(),
                    error: error.to_string(),
                })
                .await;
            Err(SyncError::RemoteFailure(error.to_string()))
        }
    }
}

/// Copy server-assigned authors onto the local copies of `created`'s nodes.
fn merge_authors(state: &mut ViewState, thread_id: Uuid, created: &Message) {
    let Some(thread) = state.thread_mut(thread_id) else {
        return;
    };
    let mut messages = thread.messages.clone();
    for (id, author) in authors(created) {
        if let Ok(next) = tree::update_message(&messages, id, |message| message.author = Some(author)) {
            messages = next;
        }
    }
    thread.messages = messages;
}

fn authors(message: &Message) -> Vec<(Uuid, String)> {
    let mut out = Vec::new();
    if let Some(author) = &message.author {
        out.push((message.id, author.clone()));
    }
    out.extend(message.replies.iter().flat_map(authors));
    out
}

pub struct AddMessage {
    pub thread_id: Uuid,
    pub parent_id: Option<Uuid>,
    pub message: Message,
}

#[async_trait]
impl OptimisticMutation for AddMessage {
    type Output = Message;

    fn name(&self) -> &'static str {
        "add_message"
    }

    fn scope(&self) -> SnapshotScope {
        SnapshotScope::Inserted {
            thread_id: self.thread_id,
            message_id: self.message.id,
        }
    }

    fn apply(&self, state: &mut ViewState) -> Result<()> {
        let thread = state.require_thread_mut(self.thread_id)?;
        let next = tree::insert(&thread.messages, self.parent_id, self.message.clone())?;
        thread.set_messages(next);
        state.set_selection(self.thread_id, Some(self.message.id));
        Ok(())
    }

    async fn remote(&self, store: &dyn ThreadStore) -> StoreResult<Message> {
        store
            .create_message(self.thread_id, self.parent_id, &self.message)
            .await
    }

    fn reconcile(&self, state: &mut ViewState, created: &Message) {
        merge_authors(state, self.thread_id, created);
    }
}

pub struct EditMessage {
    pub thread_id: Uuid,
    pub message_id: Uuid,
    pub content: MessageContent,
}

#[async_trait]
impl OptimisticMutation for EditMessage {
    type Output = ();

    fn name(&self) -> &'static str {
        "edit_message"
    }

    fn scope(&self) -> SnapshotScope {
        SnapshotScope::Content {
            thread_id: self.thread_id,
            message_id: self.message_id,
        }
    }

    fn apply(&self, state: &mut ViewState) -> Result<()> {
        state.set_content(self.thread_id, self.message_id, self.content.clone())
    }

    async fn remote(&self, store: &dyn ThreadStore) -> StoreResult<()> {
        store
            .update_message(self.thread_id, self.message_id, &self.content)
            .await
    }
}

/// Final write of streamed content. Rolls back to the content the message
/// had before the generation started, not to the partial stream.
pub struct CommitGeneration {
    pub thread_id: Uuid,
    pub message_id: Uuid,
    pub content: MessageContent,
    pub original: MessageContent,
}

#[async_trait]
impl OptimisticMutation for CommitGeneration {
    type Output = ();

    fn name(&self) -> &'static str {
        "commit_generation"
    }

    fn scope(&self) -> SnapshotScope {
        SnapshotScope::Content {
            thread_id: self.thread_id,
            message_id: self.message_id,
        }
    }

    fn capture(&self, state: &ViewState) -> Result<Snapshot> {
        state.capture(self.scope())?;
        Ok(Snapshot::Content {
            thread_id: self.thread_id,
            message_id: self.message_id,
            content: self.original.clone(),
        })
    }

    fn apply(&self, state: &mut ViewState) -> Result<()> {
        state.set_content(self.thread_id, self.message_id, self.content.clone())
    }

    async fn remote(&self, store: &dyn ThreadStore) -> StoreResult<()> {
        store
            .update_message(self.thread_id, self.message_id, &self.content)
            .await
    }
}

pub struct DeleteMessage {
    pub thread_id: Uuid,
    pub message_id: Uuid,
    pub policy: DeletePolicy,
}

#[async_trait]
impl OptimisticMutation for DeleteMessage {
    type Output = ();

    fn name(&self) -> &'static str {
        "delete_message"
    }

    fn scope(&self) -> SnapshotScope {
        SnapshotScope::Removed {
            thread_id: self.thread_id,
            message_id: self.message_id,
            policy: self.policy,
        }
    }

    fn apply(&self, state: &mut ViewState) -> Result<()> {
        let selected = state.selection(self.thread_id);
        let thread = state.require_thread_mut(self.thread_id)?;
        let outcome = tree::delete(&thread.messages, self.message_id, self.policy)?;
        let next_selection = outcome.next_selection(selected);
        thread.set_messages(outcome.messages);
        state.set_selection(self.thread_id, next_selection);
        Ok(())
    }

    async fn remote(&self, store: &dyn ThreadStore) -> StoreResult<()> {
        store
            .delete_message(self.thread_id, self.message_id, self.policy)
            .await
    }
}

/// Insert a whole tree with fresh ids (paste, duplicate, move).
pub struct PasteSubtree {
    pub thread_id: Uuid,
    pub parent_id: Option<Uuid>,
    pub root: Message,
}

#[async_trait]
impl OptimisticMutation for PasteSubtree {
    type Output = Message;

    fn name(&self) -> &'static str {
        "paste_subtree"
    }

    fn scope(&self) -> SnapshotScope {
        SnapshotScope::Inserted {
            thread_id: self.thread_id,
            message_id: self.root.id,
        }
    }

    fn apply(&self, state: &mut ViewState) -> Result<()> {
        let thread = state.require_thread_mut(self.thread_id)?;
        if let Some(parent_id) = self.parent_id {
            if !tree::contains(&thread.messages, parent_id) {
                return Err(SyncError::InvalidOperation(format!(
                    "paste target {parent_id} is not in thread {}",
                    self.thread_id
                )));
            }
        }
        let next = tree::insert(&thread.messages, self.parent_id, self.root.clone())?;
        thread.set_messages(next);
        Ok(())
    }

    async fn remote(&self, store: &dyn ThreadStore) -> StoreResult<Message> {
        store
            .create_subtree(self.thread_id, self.parent_id, &self.root)
            .await
    }

    fn reconcile(&self, state: &mut ViewState, created: &Message) {
        merge_authors(state, self.thread_id, created);
    }
}

/// New thread shown under its client id until the store answers.
pub struct CreateThread {
    pub thread: Thread,
}

#[async_trait]
impl OptimisticMutation for CreateThread {
    type Output = Thread;

    fn name(&self) -> &'static str {
        "create_thread"
    }

    fn scope(&self) -> SnapshotScope {
        SnapshotScope::ThreadEntry(self.thread.id)
    }

    fn apply(&self, state: &mut ViewState) -> Result<()> {
        if state.thread(self.thread.id).is_some() {
            return Err(SyncError::InvalidOperation(format!(
                "thread {} already exists",
                self.thread.id
            )));
        }
        state.threads.insert(0, self.thread.clone());
        Ok(())
    }

    async fn remote(&self, store: &dyn ThreadStore) -> StoreResult<Thread> {
        store
            .create_thread(&self.thread.title, Some(self.thread.id))
            .await
    }

    fn reconcile(&self, state: &mut ViewState, created: &Thread) {
        let selection = state.selection(self.thread.id);
        let Some(local) = state.thread_mut(self.thread.id) else {
            return;
        };
        local.id = created.id;
        local.title = created.title.clone();
        local.pinned = created.pinned;
        local.role = created.role;
        local.updated_at = created.updated_at;
        if created.id != self.thread.id {
            log::debug!("[{}] Server assigned id {}", self.thread.id, created.id);
            state.set_selection(self.thread.id, None);
            state.set_selection(created.id, selection);
        }
    }
}

pub struct UpdateThread {
    pub thread_id: Uuid,
    pub patch: ThreadPatch,
}

#[async_trait]
impl OptimisticMutation for UpdateThread {
    type Output = ();

    fn name(&self) -> &'static str {
        "update_thread"
    }

    fn scope(&self) -> SnapshotScope {
        SnapshotScope::ThreadMeta(self.thread_id)
    }

    fn apply(&self, state: &mut ViewState) -> Result<()> {
        if self.patch.is_empty() {
            return Err(SyncError::InvalidOperation("empty thread update".to_string()));
        }
        let thread = state.require_thread_mut(self.thread_id)?;
        self.patch.apply(thread);
        Ok(())
    }

    async fn remote(&self, store: &dyn ThreadStore) -> StoreResult<()> {
        store.update_thread(self.thread_id, &self.patch).await
    }
}

pub struct DeleteThread {
    pub thread_id: Uuid,
}

#[async_trait]
impl OptimisticMutation for DeleteThread {
    type Output = ();

    fn name(&self) -> &'static str {
        "delete_thread"
    }

    fn scope(&self) -> SnapshotScope {
        SnapshotScope::ThreadEntry(self.thread_id)
    }

    fn apply(&self, state: &mut ViewState) -> Result<()> {
        state.require_thread(self.thread_id)?;
        state.threads.retain(|thread| thread.id != self.thread_id);
        state.set_selection(self.thread_id, None);
        Ok(())
    }

    async fn remote(&self, store: &dyn ThreadStore) -> StoreResult<()> {
        store.delete_thread(self.thread_id).await
    }
}
