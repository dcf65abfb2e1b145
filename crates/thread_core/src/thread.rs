//! Thread - a titled forest of messages

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::message::Message;

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Thread {
    pub id: Uuid,

    pub title: String,

    #[serde(default, alias = "isPinned")]
    pub pinned: bool,

    /// Root-level messages
    #[serde(default)]
    pub messages: Vec<Message>,

    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,

    #[serde(default)]
    pub role: ThreadRole,
}

impl Thread {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            title: title.into(),
            pinned: false,
            messages: Vec::new(),
            updated_at: Utc::now(),
            role: ThreadRole::Owner,
        }
    }

    pub fn with_id(mut self, id: Uuid) -> Self {
        self.id = id;
        self
    }

    /// Replace the root list and bump the modification time
    pub fn set_messages(&mut self, messages: Vec<Message>) {
        self.messages = messages;
        self.touch();
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    /// Total number of messages in the thread
    pub fn message_count(&self) -> usize {
        crate::tree::count(&self.messages)
    }
}

/// Caller's membership role; only gates the external share feature.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ThreadRole {
    #[default]
    #[serde(alias = "OWNER")]
    Owner,
    #[serde(alias = "EDITOR")]
    Editor,
    #[serde(alias = "VIEWER")]
    Viewer,
}

impl ThreadRole {
    pub fn can_share(self) -> bool {
        matches!(self, Self::Owner)
    }
}

/// Partial thread update; `None` fields are left alone.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct ThreadPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pinned: Option<bool>,
}

impl ThreadPatch {
    pub fn title(title: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            pinned: None,
        }
    }

    pub fn pinned(pinned: bool) -> Self {
        Self {
            title: None,
            pinned: Some(pinned),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.pinned.is_none()
    }

    pub fn apply(&self, thread: &mut Thread) {
        if let Some(title) = &self.title {
            thread.title = title.clone();
        }
        if let Some(pinned) = self.pinned {
            thread.pinned = pinned;
        }
        thread.touch();
    }
}
