//! Pure rewrites of a message forest.
//!
//! Every function borrows the input forest and returns a new one; the input
//! is never modified, which is what lets callers keep it as a rollback
//! snapshot.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::locate;
use crate::error::{Result, TreeError};
use crate::message::{Message, MessageContent};

/// What happens to a deleted message's replies.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case", try_from = "DeletePolicyWire")]
pub enum DeletePolicy {
    /// Remove the message and its whole subtree
    Cascade,
    /// Remove the message, splice its replies into its former slot
    PromoteChildren,
    /// Keep the message, drop all of its replies
    ClearChildren,
}

impl DeletePolicy {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Cascade => "cascade",
            Self::PromoteChildren => "promote_children",
            Self::ClearChildren => "clear_children",
        }
    }
}

impl fmt::Display for DeletePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DeletePolicy {
    type Err = TreeError;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "cascade" | "true" => Ok(Self::Cascade),
            "promote_children" | "promote" | "keep_replies" | "false" => {
                Ok(Self::PromoteChildren)
            }
            "clear_children" | "clear" => Ok(Self::ClearChildren),
            other => Err(TreeError::InvalidOperation(format!(
                "unsupported delete policy: {other}"
            ))),
        }
    }
}

/// Accepts the legacy `true` / `false` / `"clear"` delete options too.
#[derive(Deserialize)]
#[serde(untagged)]
enum DeletePolicyWire {
    Flag(bool),
    Name(String),
}

impl TryFrom<DeletePolicyWire> for DeletePolicy {
    type Error = TreeError;

    fn try_from(wire: DeletePolicyWire) -> Result<Self> {
        match wire {
            DeletePolicyWire::Flag(true) => Ok(Self::Cascade),
            DeletePolicyWire::Flag(false) => Ok(Self::PromoteChildren),
            DeletePolicyWire::Name(name) => name.parse(),
        }
    }
}

/// Result of [`delete`].
#[derive(Debug, Clone)]
pub struct DeleteOutcome {
    pub messages: Vec<Message>,
    pub target: Uuid,
    pub policy: DeletePolicy,
    /// Parent of the target before the delete; `None` for a root message
    pub parent_id: Option<Uuid>,
    /// Ids that are no longer present in `messages`
    pub removed_ids: Vec<Uuid>,
}

impl DeleteOutcome {
    /// Where the caller's selection should go after this delete.
    ///
    /// A selection that left the tree moves to the former parent (or clears
    /// at root level). Under `ClearChildren` the target survives, so a
    /// selection inside the cleared replies lands on the target itself.
    pub fn next_selection(&self, current: Option<Uuid>) -> Option<Uuid> {
        match current {
            Some(selected) if self.removed_ids.contains(&selected) => match self.policy {
                DeletePolicy::ClearChildren => Some(self.target),
                DeletePolicy::Cascade | DeletePolicy::PromoteChildren => self.parent_id,
            },
            other => other,
        }
    }
}

/// Append `message` to the roots, or to the replies of `parent_id`.
pub fn insert(forest: &[Message], parent_id: Option<Uuid>, message: Message) -> Result<Vec<Message>> {
    let mut next = forest.to_vec();
    match parent_id {
        None => next.push(message),
        Some(parent_id) => find_mut(&mut next, parent_id)
            .ok_or(TreeError::NotFound(parent_id))?
            .replies
            .push(message),
    }
    Ok(next)
}

/// Replace a message's content; replies are untouched.
pub fn edit_content(forest: &[Message], id: Uuid, content: MessageContent) -> Result<Vec<Message>> {
    update_message(forest, id, |message| message.content = content)
}

/// Flip the collapsed state on explicit user action; both flags follow.
pub fn toggle_collapse(forest: &[Message], id: Uuid) -> Result<Vec<Message>> {
    update_message(forest, id, |message| {
        let collapsed = !message.collapsed;
        message.collapsed = collapsed;
        message.user_collapsed = collapsed;
    })
}

/// Apply `f` to exactly one message.
pub fn update_message<F>(forest: &[Message], id: Uuid, f: F) -> Result<Vec<Message>>
where
    F: FnOnce(&mut Message),
{
    let mut next = forest.to_vec();
    let target = find_mut(&mut next, id).ok_or(TreeError::NotFound(id))?;
    f(target);
    Ok(next)
}

pub fn delete(forest: &[Message], id: Uuid, policy: DeletePolicy) -> Result<DeleteOutcome> {
    let located = locate::locate(forest, id).ok_or(TreeError::NotFound(id))?;
    let parent_id = located.parent().map(|parent| parent.id);
    let removed_ids = match policy {
        DeletePolicy::Cascade => located.message.subtree_ids(),
        DeletePolicy::PromoteChildren => vec![id],
        DeletePolicy::ClearChildren => located
            .message
            .replies
            .iter()
            .flat_map(Message::subtree_ids)
            .collect(),
    };

    let mut next = forest.to_vec();
    match policy {
        DeletePolicy::Cascade | DeletePolicy::PromoteChildren => {
            let list = list_containing_mut(&mut next, id).ok_or(TreeError::NotFound(id))?;
            let index = list
                .iter()
                .position(|message| message.id == id)
                .ok_or(TreeError::NotFound(id))?;
            let removed = list.remove(index);
            if policy == DeletePolicy::PromoteChildren {
                list.splice(index..index, removed.replies);
            }
        }
        DeletePolicy::ClearChildren => {
            find_mut(&mut next, id)
                .ok_or(TreeError::NotFound(id))?
                .replies
                .clear();
        }
    }

    log::debug!(
        "[{}] delete ({}) removed {} message(s)",
        id,
        policy,
        removed_ids.len()
    );

    Ok(DeleteOutcome {
        messages: next,
        target: id,
        policy,
        parent_id,
        removed_ids,
    })
}

/// What a [`delete`] takes out of the forest, recorded so it can be put back.
#[derive(Debug, Clone, PartialEq)]
pub struct Removal {
    pub policy: DeletePolicy,
    pub parent_id: Option<Uuid>,
    /// Position of the target among its siblings
    pub index: usize,
    /// The target as it was, replies included
    pub message: Message,
}

impl Removal {
    /// Ids that [`restore_removal`] brings back
    pub fn restored_ids(&self) -> Vec<Uuid> {
        match self.policy {
            DeletePolicy::Cascade => self.message.subtree_ids(),
            DeletePolicy::PromoteChildren => vec![self.message.id],
            DeletePolicy::ClearChildren => self
                .message
                .replies
                .iter()
                .flat_map(Message::subtree_ids)
                .collect(),
        }
    }
}

/// Record what deleting `id` under `policy` would remove.
pub fn capture_removal(forest: &[Message], id: Uuid, policy: DeletePolicy) -> Result<Removal> {
    let located = locate::locate(forest, id).ok_or(TreeError::NotFound(id))?;
    let parent_id = located.parent().map(|parent| parent.id);
    let index = locate::siblings(forest, id)
        .and_then(|list| list.iter().position(|message| message.id == id))
        .ok_or(TreeError::NotFound(id))?;
    Ok(Removal {
        policy,
        parent_id,
        index,
        message: located.message.clone(),
    })
}

/// Undo a delete described by `removal` on the current forest.
///
/// Only the removed nodes come back; everything written since the delete,
/// including edits to promoted children, is kept. Nodes that are already
/// present are not duplicated, so restoring twice is the same as once.
pub fn restore_removal(forest: &[Message], removal: &Removal) -> Result<Vec<Message>> {
    let target = removal.message.id;
    let mut next = forest.to_vec();

    match removal.policy {
        DeletePolicy::Cascade => {
            if locate::contains(forest, target) {
                return Ok(next);
            }
            let list = sibling_list_mut(&mut next, removal.parent_id)?;
            let index = removal.index.min(list.len());
            list.insert(index, removal.message.clone());
        }
        DeletePolicy::PromoteChildren => {
            if locate::contains(forest, target) {
                return Ok(next);
            }
            let list = sibling_list_mut(&mut next, removal.parent_id)?;
            let mut replies = Vec::with_capacity(removal.message.replies.len());
            for child in &removal.message.replies {
                if let Some(position) = list.iter().position(|message| message.id == child.id) {
                    replies.push(list.remove(position));
                }
            }
            let index = removal.index.min(list.len());
            list.insert(
                index,
                Message {
                    replies,
                    ..removal.message.clone()
                },
            );
        }
        DeletePolicy::ClearChildren => {
            let cleared: Vec<Message> = removal
                .message
                .replies
                .iter()
                .filter(|reply| !locate::contains(forest, reply.id))
                .cloned()
                .collect();
            let message = find_mut(&mut next, target).ok_or(TreeError::NotFound(target))?;
            message.replies.splice(0..0, cleared);
        }
    }

    Ok(next)
}

fn sibling_list_mut(forest: &mut Vec<Message>, parent_id: Option<Uuid>) -> Result<&mut Vec<Message>> {
    match parent_id {
        None => Ok(forest),
        Some(parent_id) => Ok(&mut find_mut(forest, parent_id)
            .ok_or(TreeError::NotFound(parent_id))?
            .replies),
    }
}

fn find_mut(forest: &mut [Message], id: Uuid) -> Option<&mut Message> {
    forest.iter_mut().find_map(|message| {
        if message.id == id {
            Some(message)
        } else {
            find_mut(&mut message.replies, id)
        }
    })
}

fn list_containing_mut(forest: &mut Vec<Message>, id: Uuid) -> Option<&mut Vec<Message>> {
    if forest.iter().any(|message| message.id == id) {
        return Some(forest);
    }
    forest
        .iter_mut()
        .find_map(|message| list_containing_mut(&mut message.replies, id))
}
