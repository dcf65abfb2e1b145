/// One item of a generation stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GenerationChunk {
    /// Text fragment to append to the reply
    Token(String),
    /// Fragments of one or more tool calls, merged by index
    ToolCalls(Vec<ToolCallDelta>),
    Done,
}

/// Partial tool call as streamed by chat-completion endpoints.
///
/// The first fragment of a call usually carries `id` and `name`; later
/// fragments only extend `arguments`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolCallDelta {
    pub index: u32,
    pub id: Option<String>,
    pub name: Option<String>,
    pub arguments: Option<String>,
}
