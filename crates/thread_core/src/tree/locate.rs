//! Read-only traversal of a message forest.
//!
//! Search order is the stored reply order, depth first. Ids are unique
//! across the forest, so the first match is the only match.

use uuid::Uuid;

use crate::message::Message;

/// A located message together with its ancestor chain (root first).
#[derive(Debug, Clone)]
pub struct Located<'a> {
    pub message: &'a Message,
    pub ancestors: Vec<&'a Message>,
}

impl<'a> Located<'a> {
    /// Immediate parent, `None` for a root message
    pub fn parent(&self) -> Option<&'a Message> {
        self.ancestors.last().copied()
    }

    pub fn depth(&self) -> usize {
        self.ancestors.len()
    }

    /// Ids from the root down to and including the located message
    pub fn path_ids(&self) -> Vec<Uuid> {
        self.ancestors
            .iter()
            .map(|ancestor| ancestor.id)
            .chain(std::iter::once(self.message.id))
            .collect()
    }
}

pub fn locate(forest: &[Message], id: Uuid) -> Option<Located<'_>> {
    let mut ancestors = Vec::new();
    locate_in(forest, id, &mut ancestors).map(|message| Located { message, ancestors })
}

fn locate_in<'a>(
    forest: &'a [Message],
    id: Uuid,
    ancestors: &mut Vec<&'a Message>,
) -> Option<&'a Message> {
    for message in forest {
        if message.id == id {
            return Some(message);
        }
        ancestors.push(message);
        if let Some(found) = locate_in(&message.replies, id, ancestors) {
            return Some(found);
        }
        ancestors.pop();
    }
    None
}

pub fn find(forest: &[Message], id: Uuid) -> Option<&Message> {
    forest.iter().find_map(|message| {
        if message.id == id {
            Some(message)
        } else {
            find(&message.replies, id)
        }
    })
}

pub fn contains(forest: &[Message], id: Uuid) -> bool {
    find(forest, id).is_some()
}

/// The reply list holding `id`; the root list itself for a root message.
pub fn siblings(forest: &[Message], id: Uuid) -> Option<&[Message]> {
    if forest.iter().any(|message| message.id == id) {
        return Some(forest);
    }
    forest
        .iter()
        .find_map(|message| siblings(&message.replies, id))
}

/// Whether `candidate` sits strictly below `ancestor` in the forest
pub fn is_descendant(forest: &[Message], ancestor: Uuid, candidate: Uuid) -> bool {
    find(forest, ancestor).is_some_and(|message| message.has_descendant(candidate))
}

/// Total number of messages in the forest
pub fn count(forest: &[Message]) -> usize {
    forest
        .iter()
        .map(|message| 1 + message.descendant_count())
        .sum()
}

pub fn collect_ids(forest: &[Message]) -> Vec<Uuid> {
    forest.iter().flat_map(Message::subtree_ids).collect()
}

/// Messages in display order with their depth (roots at 0). Replies of a
/// collapsed message are skipped.
pub fn visible_rows(forest: &[Message]) -> Vec<(usize, &Message)> {
    let mut rows = Vec::new();
    let mut pending: Vec<(usize, &Message)> = forest.iter().rev().map(|m| (0, m)).collect();
    while let Some((depth, message)) = pending.pop() {
        rows.push((depth, message));
        if !message.collapsed {
            pending.extend(message.replies.iter().rev().map(|reply| (depth + 1, reply)));
        }
    }
    rows
}
