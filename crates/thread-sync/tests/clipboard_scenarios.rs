mod common;

use std::collections::HashSet;

use common::{fixture, local_tree};
use thread_core::tree::{self, DeletePolicy};
use thread_sync::{ClipboardKind, SyncError, ThreadStore};
use uuid::Uuid;

#[tokio::test]
async fn promoting_a_root_lifts_its_child() {
    let f = fixture().await;
    let a = f
        .engine
        .add_message(f.thread_id, None, "A".into())
        .await
        .unwrap();
    let b = f
        .engine
        .add_message(f.thread_id, Some(a.id), "B".into())
        .await
        .unwrap();

    f.engine
        .delete_message(f.thread_id, a.id, DeletePolicy::PromoteChildren)
        .await
        .unwrap();

    let roots: Vec<Uuid> = f
        .engine
        .thread(f.thread_id)
        .await
        .unwrap()
        .messages
        .iter()
        .map(|m| m.id)
        .collect();
    assert_eq!(roots, vec![b.id]);
    let remote = f.store.inner.fetch_thread(f.thread_id).await.unwrap();
    assert_eq!(remote.messages[0].id, b.id);
}

#[tokio::test]
async fn copy_pastes_twice_as_independent_nodes() {
    let f = fixture().await;
    let x = f
        .engine
        .add_message(f.thread_id, None, "hello".into())
        .await
        .unwrap();
    let p1 = f
        .engine
        .add_message(f.thread_id, None, "p1".into())
        .await
        .unwrap();
    let p2 = f
        .engine
        .add_message(f.thread_id, None, "p2".into())
        .await
        .unwrap();

    f.engine.copy(f.thread_id, x.id).await.unwrap();
    let first = f.engine.paste(f.thread_id, Some(p1.id)).await.unwrap();
    let second = f.engine.paste(f.thread_id, Some(p2.id)).await.unwrap();

    assert_eq!(first.content.as_text(), "hello");
    assert_eq!(second.content.as_text(), "hello");
    let ids: HashSet<Uuid> = [x.id, first.id, second.id].into_iter().collect();
    assert_eq!(ids.len(), 3);
    assert!(f.engine.clipboard().await.is_some(), "copy payload stays");

    let thread = f.engine.thread(f.thread_id).await.unwrap();
    let all = tree::collect_ids(&thread.messages);
    assert_eq!(all.iter().collect::<HashSet<_>>().len(), all.len());
    assert_eq!(tree::count(&thread.messages), 5);
}

#[tokio::test]
async fn cut_cannot_paste_into_own_reply() {
    let f = fixture().await;
    let y = f
        .engine
        .add_message(f.thread_id, None, "Y".into())
        .await
        .unwrap();
    let z = f
        .engine
        .add_message(f.thread_id, Some(y.id), "Z".into())
        .await
        .unwrap();
    let before = f.engine.thread(f.thread_id).await.unwrap().messages;

    f.engine.cut(f.thread_id, y.id).await.unwrap();
    let result = f.engine.paste(f.thread_id, Some(z.id)).await;

    assert!(matches!(result, Err(SyncError::InvalidOperation(_))));
    let after = f.engine.thread(f.thread_id).await.unwrap().messages;
    assert_eq!(after, before);
    assert_eq!(after[0].id, y.id);
    assert_eq!(after[0].replies[0].id, z.id);
    assert_eq!(
        f.engine.clipboard().await.map(|payload| payload.kind),
        Some(ClipboardKind::Cut)
    );
}

#[tokio::test]
async fn cut_paste_across_threads_moves_and_clears() {
    let f = fixture().await;
    let y = f
        .engine
        .add_message(f.thread_id, None, "Y".into())
        .await
        .unwrap();
    f.engine
        .add_message(f.thread_id, Some(y.id), "Z".into())
        .await
        .unwrap();
    let target = f.engine.create_thread("target").await.unwrap();

    f.engine.cut(f.thread_id, y.id).await.unwrap();
    let pasted = f.engine.paste(target.id, None).await.unwrap();

    assert_ne!(pasted.id, y.id);
    assert_eq!(pasted.replies.len(), 1);
    assert!(f.engine.clipboard().await.is_none());
    assert!(f
        .engine
        .thread(f.thread_id)
        .await
        .unwrap()
        .messages
        .is_empty());
    let remote_target = f.store.inner.fetch_thread(target.id).await.unwrap();
    assert_eq!(tree::count(&remote_target.messages), 2);
}

#[tokio::test]
async fn failed_paste_keeps_original_and_payload() {
    let f = fixture().await;
    let y = f
        .engine
        .add_message(f.thread_id, None, "Y".into())
        .await
        .unwrap();
    let other = f
        .engine
        .add_message(f.thread_id, None, "other".into())
        .await
        .unwrap();
    f.engine.cut(f.thread_id, y.id).await.unwrap();
    let before = local_tree(&f.engine, f.thread_id).await;

    f.store.fail_writes(true);
    let result = f.engine.paste(f.thread_id, Some(other.id)).await;

    assert!(matches!(result, Err(SyncError::RemoteFailure(_))));
    assert_eq!(local_tree(&f.engine, f.thread_id).await, before);
    assert!(f.engine.clipboard().await.is_some());
}

#[tokio::test]
async fn cut_is_spent_once_the_copy_is_stored() {
    let f = fixture().await;
    let y = f
        .engine
        .add_message(f.thread_id, None, "Y".into())
        .await
        .unwrap();
    let other = f
        .engine
        .add_message(f.thread_id, None, "other".into())
        .await
        .unwrap();
    f.engine.cut(f.thread_id, y.id).await.unwrap();
    f.store.fail_slowly("delete_message", y.id);

    let created = match f.engine.paste(f.thread_id, Some(other.id)).await {
        Err(SyncError::OriginalKept { created, .. }) => created,
        other => panic!("expected the original to be kept, got {other:?}"),
    };

    assert!(f.engine.clipboard().await.is_none());
    assert!(matches!(
        f.engine.paste(f.thread_id, None).await,
        Err(SyncError::InvalidOperation(_))
    ));

    let (messages, _) = local_tree(&f.engine, f.thread_id).await;
    assert!(tree::contains(&messages, y.id));
    assert_eq!(tree::find(&messages, other.id).unwrap().replies[0].id, created);
    assert_eq!(tree::count(&messages), 3);
    let remote = f.store.inner.fetch_thread(f.thread_id).await.unwrap();
    assert_eq!(tree::count(&remote.messages), 3);
}

#[tokio::test]
async fn paste_with_empty_clipboard_is_invalid() {
    let f = fixture().await;
    assert!(matches!(
        f.engine.paste(f.thread_id, None).await,
        Err(SyncError::InvalidOperation(_))
    ));
}

#[tokio::test]
async fn duplicate_lands_next_to_the_source() {
    let f = fixture().await;
    let root = f
        .engine
        .add_message(f.thread_id, None, "root".into())
        .await
        .unwrap();
    let child = f
        .engine
        .add_message(f.thread_id, Some(root.id), "child".into())
        .await
        .unwrap();

    let copy = f.engine.duplicate_message(f.thread_id, child.id).await.unwrap();

    let thread = f.engine.thread(f.thread_id).await.unwrap();
    let replies: Vec<Uuid> = thread.messages[0].replies.iter().map(|m| m.id).collect();
    assert_eq!(replies, vec![child.id, copy.id]);
    assert_eq!(copy.content.as_text(), "child");
}

#[tokio::test]
async fn move_relocates_between_threads() {
    let f = fixture().await;
    let root = f
        .engine
        .add_message(f.thread_id, None, "root".into())
        .await
        .unwrap();
    let target = f.engine.create_thread("target").await.unwrap();
    let anchor = f
        .engine
        .add_message(target.id, None, "anchor".into())
        .await
        .unwrap();

    let moved = f
        .engine
        .move_message(f.thread_id, root.id, target.id, Some(anchor.id))
        .await
        .unwrap();

    assert!(f.engine.thread(f.thread_id).await.unwrap().messages.is_empty());
    let target_thread = f.engine.thread(target.id).await.unwrap();
    assert_eq!(target_thread.messages[0].replies[0].id, moved.id);
    assert!(f.engine.clipboard().await.is_none());

    // a message cannot move below itself
    let inner = f
        .engine
        .add_message(target.id, Some(moved.id), "inner".into())
        .await
        .unwrap();
    assert!(matches!(
        f.engine
            .move_message(target.id, moved.id, target.id, Some(inner.id))
            .await,
        Err(SyncError::InvalidOperation(_))
    ));
}
