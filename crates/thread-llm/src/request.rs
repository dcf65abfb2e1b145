//! Prompt context for a reply.
//!
//! A reply to message P sees the system prompt, every ancestor of P and P
//! itself, in root-to-leaf order. Sibling branches are never included.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use thread_core::tree::locate;
use thread_core::{GenerationConfig, Message, TreeError};

/// A role/content pair as sent to a chat-completion endpoint
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct PromptMessage {
    pub role: String,
    pub content: String,
}

impl PromptMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn from_message(message: &Message) -> Self {
        Self {
            role: message.origin.prompt_role().to_string(),
            content: message.content.as_text(),
        }
    }
}

#[derive(Clone, Debug)]
pub struct GenerationRequest {
    pub messages: Vec<PromptMessage>,
    pub config: GenerationConfig,
}

impl GenerationRequest {
    pub fn new(messages: Vec<PromptMessage>, config: GenerationConfig) -> Self {
        Self { messages, config }
    }

    /// Tools offered to the model; empty unless a tool choice is active
    pub fn tools(&self) -> &[Value] {
        self.config.enabled_tools()
    }
}

/// Build the request for a reply to `parent_id`.
pub fn build_prompt_context(
    forest: &[Message],
    parent_id: Uuid,
    config: &GenerationConfig,
) -> thread_core::Result<GenerationRequest> {
    let located = locate(forest, parent_id).ok_or(TreeError::NotFound(parent_id))?;

    let mut messages = Vec::with_capacity(located.depth() + 2);
    if !config.system_prompt.trim().is_empty() {
        messages.push(PromptMessage::system(config.system_prompt.clone()));
    }
    messages.extend(
        located
            .ancestors
            .iter()
            .copied()
            .chain(std::iter::once(located.message))
            .map(PromptMessage::from_message),
    );

    Ok(GenerationRequest::new(messages, config.clone()))
}
