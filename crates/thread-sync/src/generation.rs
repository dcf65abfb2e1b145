//! Streaming merge: fold generated fragments into one message.
//!
//! Every fragment rewrites the target's content locally with the full
//! accumulated text and any tool calls assembled so far. The store sees optional checkpoints and one final
//! optimistic commit. A stopped stream keeps what it has; a failed stream
//! puts the pre-generation content back.

use std::sync::Arc;

use dashmap::DashMap;
use futures::StreamExt;
use thread_core::MessageContent;
use thread_llm::{GenerationChunk, GenerationStream, ToolCallAccumulator};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::error::{Result, SyncError};
use crate::events::{EventSink, SyncEvent};
use crate::optimistic::{execute, CommitGeneration};
use crate::store::ThreadStore;
use crate::view::{LocalView, Snapshot};

#[derive(Debug, Clone, PartialEq)]
pub enum GenerationOutcome {
    Completed {
        content: MessageContent,
    },
    /// Stopped before the stream ended. `committed` is false when the target
    /// message disappeared mid-stream and nothing was written.
    Aborted {
        content: MessageContent,
        committed: bool,
    },
}

impl GenerationOutcome {
    pub fn content(&self) -> &MessageContent {
        match self {
            Self::Completed { content } | Self::Aborted { content, .. } => content,
        }
    }

    pub fn is_aborted(&self) -> bool {
        matches!(self, Self::Aborted { .. })
    }
}

pub enum StartOutcome {
    Started(GenerationHandle),
    /// A generation was already running for the message and got stopped
    Stopped,
}

struct InFlight {
    run_id: Uuid,
    thread_id: Uuid,
    source: Option<Uuid>,
    token: CancellationToken,
}

/// Generations currently streaming, keyed by target message.
#[derive(Default, Clone)]
pub struct GenerationRegistry {
    in_flight: Arc<DashMap<Uuid, InFlight>>,
}

impl GenerationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a generation for `message_id`, or stop the one already
    /// running there.
    pub fn start(
        &self,
        thread_id: Uuid,
        message_id: Uuid,
        source: Option<Uuid>,
        original: MessageContent,
    ) -> StartOutcome {
        use dashmap::mapref::entry::Entry;

        match self.in_flight.entry(message_id) {
            Entry::Occupied(entry) => {
                log::info!("[{}] Generation already running, stopping it", message_id);
                entry.get().token.cancel();
                StartOutcome::Stopped
            }
            Entry::Vacant(entry) => {
                let run_id = Uuid::new_v4();
                let token = CancellationToken::new();
                entry.insert(InFlight {
                    run_id,
                    thread_id,
                    source,
                    token: token.clone(),
                });
                StartOutcome::Started(GenerationHandle {
                    run_id,
                    thread_id,
                    message_id,
                    token,
                    original,
                    registry: self.clone(),
                })
            }
        }
    }

    /// Cancel the generation targeting `message_id`.
    pub fn stop(&self, message_id: Uuid) -> bool {
        match self.in_flight.get(&message_id) {
            Some(entry) => {
                entry.token.cancel();
                true
            }
            None => false,
        }
    }

    /// Cancel the generation replying to `source`; returns its target.
    pub fn stop_by_source(&self, source: Uuid) -> Option<Uuid> {
        let target = self
            .in_flight
            .iter()
            .find(|entry| entry.source == Some(source))
            .map(|entry| *entry.key())?;
        self.stop(target);
        Some(target)
    }

    pub fn is_active(&self, message_id: Uuid) -> bool {
        self.in_flight.contains_key(&message_id)
    }

    /// `(thread id, message id)` of every running generation
    pub fn active(&self) -> Vec<(Uuid, Uuid)> {
        self.in_flight
            .iter()
            .map(|entry| (entry.thread_id, *entry.key()))
            .collect()
    }

    fn release(&self, message_id: Uuid, run_id: Uuid) {
        self.in_flight
            .remove_if(&message_id, |_, entry| entry.run_id == run_id);
    }
}

/// Ownership of one running generation; dropping it deregisters the run.
pub struct GenerationHandle {
    run_id: Uuid,
    thread_id: Uuid,
    message_id: Uuid,
    token: CancellationToken,
    original: MessageContent,
    registry: GenerationRegistry,
}

impl GenerationHandle {
    pub fn thread_id(&self) -> Uuid {
        self.thread_id
    }

    pub fn message_id(&self) -> Uuid {
        self.message_id
    }

    pub fn cancel_token(&self) -> CancellationToken {
        self.token.clone()
    }

    pub fn stop(&self) {
        self.token.cancel();
    }
}

impl Drop for GenerationHandle {
    fn drop(&mut self) {
        self.registry.release(self.message_id, self.run_id);
    }
}

/// Consumer half of a generation.
pub struct StreamMerge<'a> {
    pub view: &'a LocalView,
    pub store: &'a dyn ThreadStore,
    pub events: &'a EventSink,
    /// Push accumulated content to the store every N fragments
    pub checkpoint_every: Option<usize>,
}

impl StreamMerge<'_> {
    pub async fn run(
        &self,
        handle: GenerationHandle,
        mut stream: GenerationStream,
    ) -> Result<GenerationOutcome> {
        let thread_id = handle.thread_id;
        let message_id = handle.message_id;
        let mut text = String::new();
        let mut tool_calls = ToolCallAccumulator::new();
        let mut fragments = 0usize;
        let mut checkpointed = false;

        let aborted = loop {
            let next = tokio::select! {
                biased;
                _ = handle.token.cancelled() => break true,
                next = stream.next() => next,
            };

            let token = match next {
                None | Some(Ok(GenerationChunk::Done)) => break false,
                Some(Ok(GenerationChunk::Token(token))) => {
                    if token.is_empty() {
                        continue;
                    }
                    text.push_str(&token);
                    Some(token)
                }
                Some(Ok(GenerationChunk::ToolCalls(deltas))) => {
                    if deltas.is_empty() {
                        continue;
                    }
                    tool_calls.push(&deltas);
                    None
                }
                Some(Err(error)) => {
                    log::error!("[{}] Generation stream failed: {}", message_id, error);
                    self.view
                        .write(|state| {
                            state.restore(Snapshot::Content {
                                thread_id,
                                message_id,
                                content: handle.original.clone(),
                            })
                        })
                        .await;
                    if checkpointed {
                        if let Err(e) = self
                            .store
                            .update_message(thread_id, message_id, &handle.original)
                            .await
                        {
                            log::warn!("[{}] Could not revert checkpoint: {}", message_id, e);
                        }
                    }
                    self.events
                        .send(SyncEvent::RolledBack {
                            operation: "generation".to_string(),
                            error: error.to_string(),
                        })
                        .await;
                    return Err(SyncError::RemoteFailure(error.to_string()));
                }
            };
            fragments += 1;

            let merged = self
                .view
                .write(|state| state.set_content(thread_id, message_id, tool_calls.content(&text)))
                .await;
            if merged.is_err() {
                log::info!("[{}] Generation target removed, dropping stream", message_id);
                self.finished(thread_id, message_id, true).await;
                return Ok(GenerationOutcome::Aborted {
                    content: tool_calls.content(&text),
                    committed: false,
                });
            }

            if let Some(token) = token {
                self.events
                    .send(SyncEvent::Token {
                        thread_id,
                        message_id,
                        content: token,
                    })
                    .await;
            }

            if self.checkpoint_every.is_some_and(|n| n > 0 && fragments % n == 0) {
                let partial = tool_calls.content(&text);
                match self.store.update_message(thread_id, message_id, &partial).await {
                    Ok(()) => checkpointed = true,
                    Err(e) => log::warn!("[{}] Checkpoint failed: {}", message_id, e),
                }
            }
        };

        if aborted {
            log::info!("[{}] Generation stopped after {} fragment(s)", message_id, fragments);
        } else {
            log::debug!("[{}] Generation completed ({} fragments)", message_id, fragments);
        }

        if fragments == 0 {
            self.finished(thread_id, message_id, aborted).await;
            let content = handle.original.clone();
            return Ok(if aborted {
                GenerationOutcome::Aborted {
                    content,
                    committed: false,
                }
            } else {
                GenerationOutcome::Completed { content }
            });
        }

        let content = tool_calls.content(&text);
        let commit = CommitGeneration {
            thread_id,
            message_id,
            content: content.clone(),
            original: handle.original.clone(),
        };
        let committed = execute(self.view, self.store, self.events, &commit).await;
        self.finished(thread_id, message_id, aborted).await;

        match committed {
            Ok(()) if aborted => Ok(GenerationOutcome::Aborted {
                content,
                committed: true,
            }),
            Ok(()) => Ok(GenerationOutcome::Completed { content }),
            Err(SyncError::NotFound(_)) => Ok(GenerationOutcome::Aborted {
                content,
                committed: false,
            }),
            Err(error) => Err(error),
        }
    }

    async fn finished(&self, thread_id: Uuid, message_id: Uuid, aborted: bool) {
        self.events
            .send(SyncEvent::GenerationFinished {
                thread_id,
                message_id,
                aborted,
            })
            .await;
    }
}
