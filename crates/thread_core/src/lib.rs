//! thread_core - Message tree types and pure tree rewrites
//!
//! - `message` - Message node, content parts, origin and model snapshot
//! - `thread` - Thread metadata and partial updates
//! - `tree` - locate, clone, insert/edit/delete/collapse rewrites, auto-collapse
//! - `config` / `paths` - file and environment configuration

pub mod config;
pub mod error;
pub mod message;
pub mod paths;
pub mod thread;
pub mod tree;

pub use config::{Config, ConfigError, GenerationSettings};
pub use error::{Result, TreeError};
pub use message::{ContentPart, GenerationConfig, Message, MessageContent, Origin};
pub use thread::{Thread, ThreadPatch, ThreadRole};
pub use tree::{CollapseThresholds, DeleteOutcome, DeletePolicy};
