//! Message - a node of the reply tree

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::content::MessageContent;
use super::generation::{GenerationConfig, Origin};

/// A message and all of its nested replies.
///
/// Replies are owned by their parent; a message never appears twice in a
/// forest.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: Uuid,

    #[serde(default)]
    pub content: MessageContent,

    #[serde(alias = "publisher")]
    pub origin: Origin,

    /// Model snapshot captured when a generated message was created
    #[serde(default, alias = "modelConfig", skip_serializing_if = "Option::is_none")]
    pub generation: Option<GenerationConfig>,

    #[serde(default)]
    pub replies: Vec<Message>,

    /// Effective collapsed flag, recomputed by the auto-collapse pass
    #[serde(default, alias = "isCollapsed")]
    pub collapsed: bool,

    /// Collapsed flag set by explicit user action
    #[serde(default)]
    pub user_collapsed: bool,

    /// Display name assigned by the store
    #[serde(default, alias = "userName", skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
}

impl Message {
    /// Create an empty-reply message with a fresh id.
    pub fn new(
        content: impl Into<MessageContent>,
        origin: Origin,
        generation: Option<GenerationConfig>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            content: content.into(),
            origin,
            generation,
            replies: Vec::new(),
            collapsed: false,
            user_collapsed: false,
            author: None,
        }
    }

    /// A human-authored message
    pub fn human(content: impl Into<MessageContent>) -> Self {
        Self::new(content, Origin::Human, None)
    }

    /// An empty generated message that will receive streamed content
    pub fn generated(generation: GenerationConfig) -> Self {
        Self::new(MessageContent::new(), Origin::Generated, Some(generation))
    }

    pub fn with_id(mut self, id: Uuid) -> Self {
        self.id = id;
        self
    }

    pub fn with_replies(mut self, replies: Vec<Message>) -> Self {
        self.replies = replies;
        self
    }

    /// Number of nodes below this one
    pub fn descendant_count(&self) -> usize {
        self.replies
            .iter()
            .map(|reply| 1 + reply.descendant_count())
            .sum()
    }

    /// Whether `id` names a node strictly below this one
    pub fn has_descendant(&self, id: Uuid) -> bool {
        self.replies
            .iter()
            .any(|reply| reply.id == id || reply.has_descendant(id))
    }

    /// Ids of this node and every descendant, depth-first
    pub fn subtree_ids(&self) -> Vec<Uuid> {
        let mut ids = Vec::with_capacity(1 + self.descendant_count());
        self.push_ids(&mut ids);
        ids
    }

    fn push_ids(&self, ids: &mut Vec<Uuid>) {
        ids.push(self.id);
        for reply in &self.replies {
            reply.push_ids(ids);
        }
    }
}
