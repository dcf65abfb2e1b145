//! Depth-based auto-collapse.
//!
//! Nodes on the path to the selected message always stay open. Every other
//! node measures its distance from the nearest ancestor on that path (or
//! from the root level when its tree holds no selection) and is collapsed
//! once the distance exceeds the budget: `selected_branch` below the
//! selected message, `other_branches` everywhere else.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::locate::locate;
use crate::message::Message;

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub struct CollapseThresholds {
    /// Depth budget below the selected message
    pub selected_branch: usize,
    /// Depth budget for every other branch
    pub other_branches: usize,
}

impl Default for CollapseThresholds {
    fn default() -> Self {
        Self {
            selected_branch: 7,
            other_branches: 4,
        }
    }
}

#[derive(Clone, Copy)]
struct Anchor {
    depth: usize,
    budget: usize,
}

/// Recompute every effective collapsed flag; user-set flags are kept.
pub fn auto_collapse(
    forest: &[Message],
    selected: Option<Uuid>,
    thresholds: CollapseThresholds,
) -> Vec<Message> {
    let path = selected
        .and_then(|id| locate(forest, id))
        .map(|located| located.path_ids())
        .unwrap_or_default();
    let root_anchor = Anchor {
        depth: 0,
        budget: thresholds.other_branches,
    };

    forest
        .iter()
        .map(|message| collapse_node(message, 0, root_anchor, &path, thresholds))
        .collect()
}

fn collapse_node(
    message: &Message,
    depth: usize,
    anchor: Anchor,
    path: &[Uuid],
    thresholds: CollapseThresholds,
) -> Message {
    let on_path = path.contains(&message.id);
    let (auto, child_anchor) = if on_path {
        let budget = if path.last() == Some(&message.id) {
            thresholds.selected_branch
        } else {
            thresholds.other_branches
        };
        (false, Anchor { depth, budget })
    } else {
        (depth - anchor.depth > anchor.budget, anchor)
    };

    Message {
        collapsed: message.user_collapsed || auto,
        replies: message
            .replies
            .iter()
            .map(|reply| collapse_node(reply, depth + 1, child_anchor, path, thresholds))
            .collect(),
        ..message.clone_shallow()
    }
}

impl Message {
    /// Copy of the node without its replies
    fn clone_shallow(&self) -> Message {
        Message {
            id: self.id,
            content: self.content.clone(),
            origin: self.origin,
            generation: self.generation.clone(),
            replies: Vec::new(),
            collapsed: self.collapsed,
            user_collapsed: self.user_collapsed,
            author: self.author.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// A single chain of `len` messages; returns the root and all ids top-down.
    fn chain(len: usize) -> (Message, Vec<Uuid>) {
        let mut nodes: Vec<Message> = (0..len).map(|i| Message::human(format!("{i}"))).collect();
        let ids = nodes.iter().map(|m| m.id).collect();
        let mut current = nodes.pop().expect("non-empty chain");
        while let Some(mut parent) = nodes.pop() {
            parent.replies.push(current);
            current = parent;
        }
        (current, ids)
    }

    fn flags(forest: &[Message]) -> Vec<bool> {
        let mut out = Vec::new();
        fn walk(list: &[Message], out: &mut Vec<bool>) {
            for m in list {
                out.push(m.collapsed);
                walk(&m.replies, out);
            }
        }
        walk(forest, &mut out);
        out
    }

    const SMALL: CollapseThresholds = CollapseThresholds {
        selected_branch: 3,
        other_branches: 1,
    };

    #[test]
    fn unselected_tree_uses_other_budget() {
        let (root, _) = chain(4);
        let result = auto_collapse(&[root], None, SMALL);
        assert_eq!(flags(&result), vec![false, false, true, true]);
    }

    #[test]
    fn selected_branch_gets_larger_budget() {
        let (root, ids) = chain(7);
        let result = auto_collapse(&[root], Some(ids[1]), SMALL);
        // path: 0,1 open; below selection distances 1,2,3 open, 4,5 collapsed
        assert_eq!(
            flags(&result),
            vec![false, false, false, false, false, true, true]
        );
    }

    #[test]
    fn deep_selection_keeps_its_path_open() {
        let (root, ids) = chain(6);
        let result = auto_collapse(&[root], Some(ids[5]), SMALL);
        assert!(flags(&result).iter().all(|collapsed| !collapsed));
    }

    #[test]
    fn user_collapsed_always_wins() {
        let (mut root, _) = chain(2);
        root.user_collapsed = true;
        let result = auto_collapse(&[root], None, SMALL);
        assert_eq!(flags(&result), vec![true, false]);
        assert!(result[0].user_collapsed);
    }

    #[test]
    fn pass_is_idempotent() {
        let (root, ids) = chain(8);
        let once = auto_collapse(&[root], Some(ids[2]), SMALL);
        let twice = auto_collapse(&once, Some(ids[2]), SMALL);
        assert_eq!(once, twice);
    }
}
