//! Reassembly of tool calls streamed in fragments.

use std::collections::BTreeMap;

use thread_core::{ContentPart, MessageContent};

use crate::types::ToolCallDelta;

#[derive(Debug, Clone, Default)]
struct PendingCall {
    id: Option<String>,
    name: Option<String>,
    arguments: String,
}

/// Collects [`ToolCallDelta`]s by index; ids and names are kept from the
/// first fragment that carries them, argument text is concatenated.
#[derive(Debug, Clone, Default)]
pub struct ToolCallAccumulator {
    calls: BTreeMap<u32, PendingCall>,
}

impl ToolCallAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, deltas: &[ToolCallDelta]) {
        for delta in deltas {
            let call = self.calls.entry(delta.index).or_default();
            if call.id.is_none() {
                call.id = delta.id.clone();
            }
            if call.name.is_none() {
                call.name = delta.name.clone();
            }
            if let Some(arguments) = &delta.arguments {
                call.arguments.push_str(arguments);
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.calls.is_empty()
    }

    /// Calls that have both an id and a name, in index order.
    pub fn parts(&self) -> Vec<ContentPart> {
        self.calls
            .values()
            .filter_map(|call| {
                Some(ContentPart::ToolCall {
                    id: call.id.clone()?,
                    name: call.name.clone()?,
                    arguments: call.arguments.clone(),
                })
            })
            .collect()
    }

    /// Message body for `text` streamed so far plus the collected calls.
    ///
    /// Stays plain text until a complete tool call shows up.
    pub fn content(&self, text: &str) -> MessageContent {
        let calls = self.parts();
        if calls.is_empty() {
            return MessageContent::Text(text.to_string());
        }
        let mut parts = Vec::with_capacity(calls.len() + 1);
        if !text.is_empty() {
            parts.push(ContentPart::text(text));
        }
        parts.extend(calls);
        MessageContent::Parts(parts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn delta(index: u32, id: Option<&str>, name: Option<&str>, args: &str) -> ToolCallDelta {
        ToolCallDelta {
            index,
            id: id.map(str::to_string),
            name: name.map(str::to_string),
            arguments: Some(args.to_string()),
        }
    }

    #[test]
    fn arguments_are_joined_across_fragments() {
        let mut acc = ToolCallAccumulator::new();
        acc.push(&[delta(0, Some("call_1"), Some("search"), "{\"q\":")]);
        acc.push(&[delta(0, None, None, "\"rust\"}")]);

        assert_eq!(
            acc.parts(),
            vec![ContentPart::ToolCall {
                id: "call_1".to_string(),
                name: "search".to_string(),
                arguments: r#"{"q":"rust"}"#.to_string(),
            }]
        );
    }

    #[test]
    fn calls_come_out_in_index_order() {
        let mut acc = ToolCallAccumulator::new();
        acc.push(&[
            delta(1, Some("b"), Some("second"), "{}"),
            delta(0, Some("a"), Some("first"), "{}"),
        ]);
        let names: Vec<String> = acc
            .parts()
            .into_iter()
            .filter_map(|part| match part {
                ContentPart::ToolCall { name, .. } => Some(name),
                _ => None,
            })
            .collect();
        assert_eq!(names, vec!["first", "second"]);
    }

    #[test]
    fn incomplete_calls_are_left_out() {
        let mut acc = ToolCallAccumulator::new();
        acc.push(&[delta(0, None, None, "{\"partial\"")]);
        assert!(!acc.is_empty());
        assert!(acc.parts().is_empty());
        assert_eq!(acc.content("text"), MessageContent::Text("text".to_string()));
    }

    #[test]
    fn content_keeps_text_before_calls() {
        let mut acc = ToolCallAccumulator::new();
        acc.push(&[delta(0, Some("call_1"), Some("lookup"), "{}")]);

        let MessageContent::Parts(parts) = acc.content("Let me check.") else {
            panic!("expected parts");
        };
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[0].as_text(), Some("Let me check."));

        let MessageContent::Parts(only_call) = acc.content("") else {
            panic!("expected parts");
        };
        assert_eq!(only_call.len(), 1);
    }
}
