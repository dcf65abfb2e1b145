//! Tree module - locate, clone and rewrite message forests
//!
//! Callers never recurse over replies themselves; every traversal or
//! rewrite of a forest goes through this module.

mod collapse;
mod factory;
pub mod locate;
mod mutate;

pub use collapse::{auto_collapse, CollapseThresholds};
pub use factory::clone_subtree;
pub use locate::{
    collect_ids, contains, count, find, is_descendant, locate, siblings, visible_rows, Located,
};
pub use mutate::{
    capture_removal, delete, edit_content, insert, restore_removal, toggle_collapse, update_message,
    DeleteOutcome, DeletePolicy, Removal,
};
