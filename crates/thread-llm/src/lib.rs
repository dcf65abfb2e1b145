pub mod provider;
pub mod provider_factory;
pub mod providers;
pub mod request;
pub mod tool_calls;
pub mod types;

pub use provider::{GenerationError, GenerationProvider, GenerationStream, Result};
pub use provider_factory::create_provider;
pub use providers::OpenAICompatProvider;
pub use request::{build_prompt_context, GenerationRequest, PromptMessage};
pub use tool_calls::ToolCallAccumulator;
pub use types::{GenerationChunk, ToolCallDelta};
