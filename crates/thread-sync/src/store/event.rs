use serde::{Deserialize, Serialize};
use thread_core::tree::{self, DeletePolicy};
use thread_core::{Message, MessageContent, Thread, ThreadPatch};
use uuid::Uuid;

use crate::error::{StoreError, StoreResult};

/// One accepted write against a thread, as kept in the store journal.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StoreEvent {
    MessageCreated {
        parent_id: Option<Uuid>,
        message: Message,
    },
    MessageUpdated {
        message_id: Uuid,
        content: MessageContent,
    },
    MessageDeleted {
        message_id: Uuid,
        policy: DeletePolicy,
    },
    ThreadUpdated {
        patch: ThreadPatch,
    },
}

impl StoreEvent {
    /// Apply the event to `thread`, leaving it untouched on error.
    pub fn apply(&self, thread: &mut Thread) -> StoreResult<()> {
        match self {
            Self::MessageCreated { parent_id, message } => {
                if let Some(clash) = message
                    .subtree_ids()
                    .into_iter()
                    .find(|id| tree::contains(&thread.messages, *id))
                {
                    return Err(StoreError::Rejected(format!(
                        "message id {clash} already exists"
                    )));
                }
                let next = tree::insert(&thread.messages, *parent_id, message.clone())?;
                thread.set_messages(next);
            }
            Self::MessageUpdated {
                message_id,
                content,
            } => {
                let next = tree::edit_content(&thread.messages, *message_id, content.clone())?;
                thread.set_messages(next);
            }
            Self::MessageDeleted { message_id, policy } => {
                let outcome = tree::delete(&thread.messages, *message_id, *policy)?;
                thread.set_messages(outcome.messages);
            }
            Self::ThreadUpdated { patch } => {
                patch.apply(thread);
            }
        }
        Ok(())
    }
}
