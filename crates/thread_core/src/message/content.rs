//! ContentPart - Message content types
//!
//! A message body is either a plain string or an ordered list of typed parts.

use serde::{Deserialize, Serialize};

/// A part of message content (text, image, tool call)
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    /// Text content
    Text { text: String },

    /// Image referenced by URL (or data URL)
    ImageUrl { image_url: ImageUrl },

    /// A tool invocation emitted by a generated message
    ToolCall {
        id: String,
        name: String,
        /// Raw JSON arguments as produced by the model
        arguments: String,
    },
}

impl ContentPart {
    /// Create a text content part
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    /// Create an image content part
    pub fn image_url(url: impl Into<String>) -> Self {
        Self::ImageUrl {
            image_url: ImageUrl {
                url: url.into(),
                detail: None,
            },
        }
    }

    /// Get text content if this is a text part
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text { text } => Some(text),
            _ => None,
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ImageUrl {
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

/// Message body: plain text or typed parts
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

impl Default for MessageContent {
    fn default() -> Self {
        Self::Text(String::new())
    }
}

impl MessageContent {
    /// Create empty content
    pub fn new() -> Self {
        Self::default()
    }

    /// Create content with a single text part
    pub fn text(text: impl Into<String>) -> Self {
        Self::Parts(vec![ContentPart::text(text)])
    }

    /// Text parts joined with `separator`; non-text parts are skipped.
    pub fn joined_text(&self, separator: &str) -> String {
        match self {
            Self::Text(text) => text.clone(),
            Self::Parts(parts) => parts
                .iter()
                .filter_map(ContentPart::as_text)
                .collect::<Vec<_>>()
                .join(separator),
        }
    }

    /// Get all text content joined by newlines
    pub fn as_text(&self) -> String {
        self.joined_text("\n")
    }

    /// Always the part-list form; plain text becomes a single text part.
    pub fn into_parts(self) -> Vec<ContentPart> {
        match self {
            Self::Text(text) => vec![ContentPart::text(text)],
            Self::Parts(parts) => parts,
        }
    }

    /// Check if content carries nothing worth keeping
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Text(text) => text.trim().is_empty(),
            Self::Parts(parts) => parts
                .iter()
                .all(|part| part.as_text().is_some_and(|text| text.trim().is_empty())),
        }
    }
}

impl From<String> for MessageContent {
    fn from(text: String) -> Self {
        Self::text(text)
    }
}

impl From<&str> for MessageContent {
    fn from(text: &str) -> Self {
        Self::text(text)
    }
}

impl From<Vec<ContentPart>> for MessageContent {
    fn from(parts: Vec<ContentPart>) -> Self {
        Self::Parts(parts)
    }
}
