//! Single pending copy/cut payload.

use serde::{Deserialize, Serialize};
use thread_core::tree;
use thread_core::Message;
use uuid::Uuid;

use crate::error::{Result, SyncError};

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ClipboardKind {
    Copy,
    Cut,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClipboardPayload {
    /// Deep clone of the source subtree taken at copy time
    pub subtree: Message,
    pub kind: ClipboardKind,
    pub source_thread_id: Uuid,
    pub original_id: Uuid,
}

/// A validated paste: the tree to insert and, for a cut, what to remove.
#[derive(Debug, Clone)]
pub struct PastePlan {
    pub root: Message,
    pub cut_source: Option<(Uuid, Uuid)>,
}

#[derive(Debug, Default)]
pub struct Clipboard {
    pending: Option<ClipboardPayload>,
}

impl Clipboard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pending(&self) -> Option<&ClipboardPayload> {
        self.pending.as_ref()
    }

    pub fn clear(&mut self) {
        self.pending = None;
    }

    /// Replace the pending payload with a clone of `node_id`'s subtree.
    pub fn copy_or_cut(
        &mut self,
        forest: &[Message],
        thread_id: Uuid,
        node_id: Uuid,
        kind: ClipboardKind,
    ) -> Result<&ClipboardPayload> {
        let source = tree::find(forest, node_id).ok_or(thread_core::TreeError::NotFound(node_id))?;
        let payload = self.pending.insert(ClipboardPayload {
            subtree: tree::clone_subtree(source),
            kind,
            source_thread_id: thread_id,
            original_id: node_id,
        });
        Ok(payload)
    }

    /// Validate a paste into `target_forest` and mint a fresh clone for it.
    ///
    /// A cut may not land on the original message or anywhere below it.
    pub fn prepare_paste(
        &self,
        target_forest: &[Message],
        target_thread_id: Uuid,
        target_parent_id: Option<Uuid>,
    ) -> Result<PastePlan> {
        let payload = self
            .pending
            .as_ref()
            .ok_or_else(|| SyncError::InvalidOperation("clipboard is empty".to_string()))?;
        check_target(
            target_forest,
            target_thread_id,
            target_parent_id,
            payload.kind,
            payload.source_thread_id,
            payload.original_id,
        )?;

        Ok(PastePlan {
            root: tree::clone_subtree(&payload.subtree),
            cut_source: (payload.kind == ClipboardKind::Cut)
                .then_some((payload.source_thread_id, payload.original_id)),
        })
    }

    /// Drop a cut payload once its original is gone.
    pub fn finish_cut(&mut self, original_id: Uuid) {
        if self
            .pending
            .as_ref()
            .is_some_and(|payload| payload.kind == ClipboardKind::Cut && payload.original_id == original_id)
        {
            self.pending = None;
        }
    }
}

/// Shared by paste and move: the target parent must exist, and a cut/move
/// must not reparent a message under itself.
pub fn check_target(
    target_forest: &[Message],
    target_thread_id: Uuid,
    target_parent_id: Option<Uuid>,
    kind: ClipboardKind,
    source_thread_id: Uuid,
    original_id: Uuid,
) -> Result<()> {
    let Some(parent_id) = target_parent_id else {
        return Ok(());
    };
    if !tree::contains(target_forest, parent_id) {
        return Err(SyncError::InvalidOperation(format!(
            "paste target {parent_id} is not in thread {target_thread_id}"
        )));
    }
    if kind == ClipboardKind::Cut
        && target_thread_id == source_thread_id
        && (parent_id == original_id || tree::is_descendant(target_forest, original_id, parent_id))
    {
        return Err(SyncError::InvalidOperation(
            "cannot paste a cut message into itself or its replies".to_string(),
        ));
    }
    Ok(())
}
