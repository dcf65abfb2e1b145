//! Message module - Message tree node and content types

mod content;
mod generation;
mod node;

pub use content::{ContentPart, ImageUrl, MessageContent};
pub use generation::{
    FunctionName, GenerationConfig, Origin, SamplingParameters, ToolChoice, ToolChoiceMode,
};
pub use node::Message;
