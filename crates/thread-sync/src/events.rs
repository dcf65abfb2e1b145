use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use uuid::Uuid;

/// Progress notifications for the presentation layer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SyncEvent {
    /// A streamed fragment was merged into a message
    Token {
        thread_id: Uuid,
        message_id: Uuid,
        content: String,
    },

    /// The store accepted an optimistic write
    Committed { operation: String },

    /// The store rejected an optimistic write and local state was restored
    RolledBack { operation: String, error: String },

    GenerationFinished {
        thread_id: Uuid,
        message_id: Uuid,
        aborted: bool,
    },
}

/// Optional event sender; sending never fails the operation.
#[derive(Debug, Clone, Default)]
pub struct EventSink {
    tx: Option<mpsc::Sender<SyncEvent>>,
}

impl EventSink {
    pub fn new(tx: mpsc::Sender<SyncEvent>) -> Self {
        Self { tx: Some(tx) }
    }

    pub async fn send(&self, event: SyncEvent) {
        if let Some(tx) = &self.tx {
            let _ = tx.send(event).await;
        }
    }
}
