//! Subtree cloning with a fresh identity space.

use uuid::Uuid;

use crate::message::Message;

/// Deep copy of `message` where every node gets a new id.
///
/// Content, origin, model snapshot, collapse flags and reply order are kept.
/// The store-assigned author is dropped; the store assigns a new one when the
/// clone is persisted.
pub fn clone_subtree(message: &Message) -> Message {
    Message {
        id: Uuid::new_v4(),
        content: message.content.clone(),
        origin: message.origin,
        generation: message.generation.clone(),
        replies: message.replies.iter().map(clone_subtree).collect(),
        collapsed: message.collapsed,
        user_collapsed: message.user_collapsed,
        author: None,
    }
}
