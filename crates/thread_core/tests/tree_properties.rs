use std::collections::HashSet;

use thread_core::tree::{self, DeletePolicy};
use thread_core::{Message, MessageContent, Thread};
use uuid::Uuid;

/// Three roots; the middle one carries a two-level subtree.
fn forest() -> Vec<Message> {
    let deep = Message::human("deep").with_replies(vec![Message::human("leaf")]);
    let middle = Message::human("middle").with_replies(vec![
        deep,
        Message::human("sibling"),
        Message::human("last"),
    ]);
    vec![Message::human("first"), middle, Message::human("third")]
}

fn all_unique(forest: &[Message]) -> bool {
    let ids = tree::collect_ids(forest);
    ids.iter().collect::<HashSet<_>>().len() == ids.len()
}

#[test]
fn promote_on_root_lifts_only_child() {
    let b = Message::human("B");
    let a = Message::human("A").with_replies(vec![b.clone()]);
    let mut thread = Thread::new("T");
    thread.set_messages(vec![a.clone()]);

    let outcome = tree::delete(&thread.messages, a.id, DeletePolicy::PromoteChildren).unwrap();
    thread.set_messages(outcome.messages);

    assert_eq!(thread.messages.len(), 1);
    assert_eq!(thread.messages[0].id, b.id);
    assert_eq!(thread.message_count(), 1);
}

#[test]
fn delete_counts_match_policy() {
    let forest = forest();
    let target = &forest[1];
    let before = tree::count(&forest);
    let descendants = target.descendant_count();

    let cascade = tree::delete(&forest, target.id, DeletePolicy::Cascade).unwrap();
    assert_eq!(before - tree::count(&cascade.messages), 1 + descendants);

    let promote = tree::delete(&forest, target.id, DeletePolicy::PromoteChildren).unwrap();
    assert_eq!(before - tree::count(&promote.messages), 1);
    let promoted: Vec<Uuid> = promote.messages[1..4].iter().map(|m| m.id).collect();
    let original: Vec<Uuid> = target.replies.iter().map(|m| m.id).collect();
    assert_eq!(promoted, original);

    let clear = tree::delete(&forest, target.id, DeletePolicy::ClearChildren).unwrap();
    assert_eq!(before - tree::count(&clear.messages), descendants);
}

#[test]
fn ids_stay_unique_across_inserts_and_clones() {
    let mut forest = forest();
    let source = forest[1].clone();
    for parent in [None, Some(forest[0].id), Some(forest[2].id)] {
        forest = tree::insert(&forest, parent, tree::clone_subtree(&source)).unwrap();
        assert!(all_unique(&forest));
    }
    forest = tree::insert(&forest, None, Message::human("fresh")).unwrap();
    assert!(all_unique(&forest));
    assert_eq!(tree::count(&forest), 7 + 3 * 5 + 1);
}

#[test]
fn rewrites_leave_input_untouched() {
    let forest = forest();
    let snapshot = forest.clone();
    let target = forest[1].replies[0].id;

    let _ = tree::edit_content(&forest, target, MessageContent::text("changed")).unwrap();
    let _ = tree::toggle_collapse(&forest, target).unwrap();
    let _ = tree::delete(&forest, target, DeletePolicy::Cascade).unwrap();

    assert_eq!(forest, snapshot);
}
