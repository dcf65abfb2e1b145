//! The local view and the snapshots optimistic writes roll back to.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use thread_core::tree::{self, DeletePolicy, Removal};
use thread_core::{MessageContent, Thread};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::{Result, SyncError};

/// Everything the presentation layer reads.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ViewState {
    pub threads: Vec<Thread>,
    /// Selected message per thread
    pub selection: HashMap<Uuid, Uuid>,
}

/// The slice of state a single write may roll back.
///
/// Message-level scopes describe only the nodes the write touches, so a
/// rollback never undoes other writes to the same thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotScope {
    /// A subtree about to be inserted
    Inserted { thread_id: Uuid, message_id: Uuid },
    /// A message about to be deleted under `policy`
    Removed {
        thread_id: Uuid,
        message_id: Uuid,
        policy: DeletePolicy,
    },
    /// One message's content
    Content { thread_id: Uuid, message_id: Uuid },
    /// Title and pin state of one thread
    ThreadMeta(Uuid),
    /// Presence and position of one thread in the list
    ThreadEntry(Uuid),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Snapshot {
    /// Undone by removing the subtree rooted at `message_id`
    Inserted {
        thread_id: Uuid,
        message_id: Uuid,
        selection: Option<Uuid>,
    },
    /// Undone by putting the removed nodes back where they were
    Removed {
        thread_id: Uuid,
        removal: Removal,
        selection: Option<Uuid>,
    },
    Content {
        thread_id: Uuid,
        message_id: Uuid,
        content: MessageContent,
    },
    ThreadMeta {
        thread_id: Uuid,
        title: String,
        pinned: bool,
        updated_at: DateTime<Utc>,
    },
    ThreadEntry {
        thread_id: Uuid,
        /// `None` when the thread did not exist yet
        entry: Option<(usize, Thread)>,
        selection: Option<Uuid>,
    },
}

impl ViewState {
    pub fn thread(&self, thread_id: Uuid) -> Option<&Thread> {
        self.threads.iter().find(|thread| thread.id == thread_id)
    }

    pub fn thread_mut(&mut self, thread_id: Uuid) -> Option<&mut Thread> {
        self.threads.iter_mut().find(|thread| thread.id == thread_id)
    }

    pub fn require_thread(&self, thread_id: Uuid) -> Result<&Thread> {
        self.thread(thread_id)
            .ok_or_else(|| SyncError::thread_not_found(thread_id))
    }

    pub fn require_thread_mut(&mut self, thread_id: Uuid) -> Result<&mut Thread> {
        self.thread_mut(thread_id)
            .ok_or_else(|| SyncError::thread_not_found(thread_id))
    }

    pub fn selection(&self, thread_id: Uuid) -> Option<Uuid> {
        self.selection.get(&thread_id).copied()
    }

    pub fn set_selection(&mut self, thread_id: Uuid, selected: Option<Uuid>) {
        match selected {
            Some(id) => self.selection.insert(thread_id, id),
            None => self.selection.remove(&thread_id),
        };
    }

    /// Swap in new content for one message without touching anything else.
    pub fn set_content(
        &mut self,
        thread_id: Uuid,
        message_id: Uuid,
        content: MessageContent,
    ) -> Result<()> {
        let thread = self.require_thread_mut(thread_id)?;
        let next = tree::edit_content(&thread.messages, message_id, content)?;
        thread.set_messages(next);
        Ok(())
    }

    /// Replace or append a thread fetched from the store.
    pub fn upsert_thread(&mut self, thread: Thread) {
        match self.thread_mut(thread.id) {
            Some(existing) => *existing = thread,
            None => self.threads.push(thread),
        }
    }

    pub fn capture(&self, scope: SnapshotScope) -> Result<Snapshot> {
        match scope {
            SnapshotScope::Inserted {
                thread_id,
                message_id,
            } => {
                self.require_thread(thread_id)?;
                Ok(Snapshot::Inserted {
                    thread_id,
                    message_id,
                    selection: self.selection(thread_id),
                })
            }
            SnapshotScope::Removed {
                thread_id,
                message_id,
                policy,
            } => {
                let thread = self.require_thread(thread_id)?;
                Ok(Snapshot::Removed {
                    thread_id,
                    removal: tree::capture_removal(&thread.messages, message_id, policy)?,
                    selection: self.selection(thread_id),
                })
            }
            SnapshotScope::Content {
                thread_id,
                message_id,
            } => {
                let thread = self.require_thread(thread_id)?;
                let message = tree::find(&thread.messages, message_id)
                    .ok_or(thread_core::TreeError::NotFound(message_id))?;
                Ok(Snapshot::Content {
                    thread_id,
                    message_id,
                    content: message.content.clone(),
                })
            }
            SnapshotScope::ThreadMeta(thread_id) => {
                let thread = self.require_thread(thread_id)?;
                Ok(Snapshot::ThreadMeta {
                    thread_id,
                    title: thread.title.clone(),
                    pinned: thread.pinned,
                    updated_at: thread.updated_at,
                })
            }
            SnapshotScope::ThreadEntry(thread_id) => Ok(Snapshot::ThreadEntry {
                thread_id,
                entry: self
                    .threads
                    .iter()
                    .position(|thread| thread.id == thread_id)
                    .map(|index| (index, self.threads[index].clone())),
                selection: self.selection(thread_id),
            }),
        }
    }

    /// Put the captured slice back. Restoring twice is the same as once.
    pub fn restore(&mut self, snapshot: Snapshot) {
        match snapshot {
            Snapshot::Inserted {
                thread_id,
                message_id,
                selection,
            } => {
                let current = self.selection(thread_id);
                let Some(thread) = self.thread_mut(thread_id) else {
                    return;
                };
                let Ok(outcome) = tree::delete(&thread.messages, message_id, DeletePolicy::Cascade)
                else {
                    return;
                };
                thread.set_messages(outcome.messages);
                let fallback = selection.filter(|id| tree::contains(&thread.messages, *id));
                if current.is_some_and(|id| outcome.removed_ids.contains(&id)) {
                    self.set_selection(thread_id, fallback);
                }
            }
            Snapshot::Removed {
                thread_id,
                removal,
                selection,
            } => {
                let Some(thread) = self.thread_mut(thread_id) else {
                    return;
                };
                match tree::restore_removal(&thread.messages, &removal) {
                    Ok(messages) => thread.set_messages(messages),
                    Err(error) => {
                        log::debug!(
                            "[{}] Delete rollback skipped: {}",
                            removal.message.id,
                            error
                        );
                        return;
                    }
                }
                if let Some(selected) = selection {
                    if removal.restored_ids().contains(&selected) {
                        self.set_selection(thread_id, Some(selected));
                    }
                }
            }
            Snapshot::Content {
                thread_id,
                message_id,
                content,
            } => {
                if let Err(error) = self.set_content(thread_id, message_id, content) {
                    log::debug!("[{}] Content rollback skipped: {}", message_id, error);
                }
            }
            Snapshot::ThreadMeta {
                thread_id,
                title,
                pinned,
                updated_at,
            } => {
                if let Some(thread) = self.thread_mut(thread_id) {
                    thread.title = title;
                    thread.pinned = pinned;
                    thread.updated_at = updated_at;
                }
            }
            Snapshot::ThreadEntry {
                thread_id,
                entry,
                selection,
            } => {
                self.threads.retain(|thread| thread.id != thread_id);
                match entry {
                    Some((index, thread)) => {
                        let index = index.min(self.threads.len());
                        self.threads.insert(index, thread);
                        self.set_selection(thread_id, selection);
                    }
                    None => self.set_selection(thread_id, None),
                }
            }
        }
    }
}

/// The single shared mutable resource: one owned [`ViewState`] behind a lock.
///
/// Writers hold the lock only for a pure rewrite and the swap, never across
/// a store call or a stream poll.
#[derive(Debug, Default)]
pub struct LocalView {
    state: RwLock<ViewState>,
}

impl LocalView {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn read<R>(&self, f: impl FnOnce(&ViewState) -> R) -> R {
        let state = self.state.read().await;
        f(&state)
    }

    pub async fn write<R>(&self, f: impl FnOnce(&mut ViewState) -> R) -> R {
        let mut state = self.state.write().await;
        f(&mut state)
    }

    pub async fn snapshot(&self) -> ViewState {
        self.state.read().await.clone()
    }
}
