//! OpenAI-compatible chat-completion bodies and stream chunks.

use serde::Deserialize;
use serde_json::{json, Map, Value};

use crate::provider::Result;
use crate::request::GenerationRequest;
use crate::types::{GenerationChunk, ToolCallDelta};

/// Build a streaming chat-completion body for `request`.
///
/// Sampling parameters are copied only when set; tools and `tool_choice` are
/// sent only while the model snapshot enables them.
pub fn build_openai_compat_body(model: &str, request: &GenerationRequest) -> Value {
    let mut body = json!({
        "model": model,
        "messages": request.messages,
        "stream": true,
    });

    let params = &request.config.parameters;
    let optional = [
        ("temperature", params.temperature.map(|v| json!(v))),
        ("top_p", params.top_p.map(|v| json!(v))),
        ("top_k", params.top_k.map(|v| json!(v))),
        ("frequency_penalty", params.frequency_penalty.map(|v| json!(v))),
        ("presence_penalty", params.presence_penalty.map(|v| json!(v))),
        ("repetition_penalty", params.repetition_penalty.map(|v| json!(v))),
        ("seed", params.seed.map(|v| json!(v))),
        ("max_tokens", params.max_tokens.map(|v| json!(v))),
    ];
    if let Some(object) = body.as_object_mut() {
        insert_present(object, optional);

        if !params.stop.is_empty() {
            object.insert("stop".to_string(), json!(params.stop));
        }

        let tools = request.tools();
        if !tools.is_empty() {
            object.insert("tools".to_string(), json!(tools));
            if let Some(choice) = &params.tool_choice {
                object.insert("tool_choice".to_string(), json!(choice));
            }
        }
    }

    body
}

fn insert_present<const N: usize>(object: &mut Map<String, Value>, fields: [(&str, Option<Value>); N]) {
    for (key, value) in fields {
        if let Some(value) = value {
            object.insert(key.to_string(), value);
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct OpenAICompatStreamChunk {
    #[serde(default)]
    choices: Vec<OpenAICompatChoice>,
}

#[derive(Debug, Deserialize)]
struct OpenAICompatChoice {
    #[serde(default)]
    delta: OpenAICompatDelta,
}

#[derive(Debug, Deserialize, Default)]
struct OpenAICompatDelta {
    content: Option<String>,
    #[serde(default)]
    tool_calls: Vec<OpenAICompatToolCallDelta>,
}

#[derive(Debug, Deserialize)]
struct OpenAICompatToolCallDelta {
    #[serde(default)]
    index: u32,
    id: Option<String>,
    function: Option<OpenAICompatFunctionDelta>,
}

#[derive(Debug, Deserialize)]
struct OpenAICompatFunctionDelta {
    name: Option<String>,
    arguments: Option<String>,
}

/// First choice of a chunk: tool-call fragments when present, otherwise the
/// text delta (empty when the chunk carries none).
pub fn parse_openai_compat_chunk(chunk: OpenAICompatStreamChunk) -> GenerationChunk {
    let Some(choice) = chunk.choices.into_iter().next() else {
        return GenerationChunk::Token(String::new());
    };

    if !choice.delta.tool_calls.is_empty() {
        let deltas = choice
            .delta
            .tool_calls
            .into_iter()
            .map(|call| {
                let (name, arguments) = call
                    .function
                    .map(|function| (function.name, function.arguments))
                    .unwrap_or_default();
                ToolCallDelta {
                    index: call.index,
                    id: call.id,
                    name,
                    arguments,
                }
            })
            .collect();
        return GenerationChunk::ToolCalls(deltas);
    }

    GenerationChunk::Token(choice.delta.content.unwrap_or_default())
}

/// Parse an SSE `data:` payload.
///
/// - `"[DONE]"` -> `GenerationChunk::Done`
/// - Invalid JSON -> error
pub fn parse_openai_compat_sse_data(data: &str) -> Result<GenerationChunk> {
    if data.trim() == "[DONE]" {
        return Ok(GenerationChunk::Done);
    }

    let chunk: OpenAICompatStreamChunk = serde_json::from_str(data)?;
    Ok(parse_openai_compat_chunk(chunk))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::PromptMessage;
    use thread_core::message::{FunctionName, ToolChoice, ToolChoiceMode};
    use thread_core::GenerationConfig;

    fn request(config: GenerationConfig) -> GenerationRequest {
        GenerationRequest::new(vec![PromptMessage::system("sys")], config)
    }

    #[test]
    fn body_has_only_set_parameters() {
        let mut config = GenerationConfig::new("m");
        config.parameters.temperature = Some(0.5);
        config.parameters.max_tokens = Some(256);

        let body = build_openai_compat_body("m", &request(config));

        assert_eq!(body["model"], "m");
        assert_eq!(body["stream"], true);
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["temperature"], 0.5);
        assert_eq!(body["max_tokens"], 256);
        assert!(body.get("top_p").is_none());
        assert!(body.get("stop").is_none());
        assert!(body.get("tools").is_none());
    }

    #[test]
    fn tools_require_active_tool_choice() {
        let mut config = GenerationConfig::new("m");
        config.parameters.tools = vec![json!({"type": "function", "function": {"name": "search"}})];

        let body = build_openai_compat_body("m", &request(config.clone()));
        assert!(body.get("tools").is_none());

        config.parameters.tool_choice = Some(ToolChoice::Mode(ToolChoiceMode::None));
        let body = build_openai_compat_body("m", &request(config.clone()));
        assert!(body.get("tools").is_none());

        config.parameters.tool_choice = Some(ToolChoice::Function {
            kind: "function".to_string(),
            function: FunctionName {
                name: "search".to_string(),
            },
        });
        let body = build_openai_compat_body("m", &request(config));
        assert_eq!(body["tools"].as_array().map(Vec::len), Some(1));
        assert_eq!(body["tool_choice"]["function"]["name"], "search");
    }

    #[test]
    fn parses_token_and_done() {
        let data = r#"{"id":"c1","choices":[{"delta":{"content":"Hel"},"finish_reason":null}]}"#;
        assert_eq!(
            parse_openai_compat_sse_data(data).unwrap(),
            GenerationChunk::Token("Hel".to_string())
        );
        assert_eq!(
            parse_openai_compat_sse_data("  [DONE]  ").unwrap(),
            GenerationChunk::Done
        );
    }

    #[test]
    fn empty_delta_and_no_choices_yield_empty_token() {
        for data in [
            r#"{"choices":[{"delta":{}}]}"#,
            r#"{"choices":[]}"#,
        ] {
            assert_eq!(
                parse_openai_compat_sse_data(data).unwrap(),
                GenerationChunk::Token(String::new())
            );
        }
    }

    #[test]
    fn tool_call_fragments_are_parsed() {
        let first = r#"{"choices":[{"delta":{"tool_calls":[{"index":0,"id":"call_1","type":"function","function":{"name":"search","arguments":"{\"q\":"}}]}}]}"#;
        let next = r#"{"choices":[{"delta":{"tool_calls":[{"index":0,"function":{"arguments":"\"x\"}"}}]}}]}"#;

        assert_eq!(
            parse_openai_compat_sse_data(first).unwrap(),
            GenerationChunk::ToolCalls(vec![ToolCallDelta {
                index: 0,
                id: Some("call_1".to_string()),
                name: Some("search".to_string()),
                arguments: Some("{\"q\":".to_string()),
            }])
        );
        assert_eq!(
            parse_openai_compat_sse_data(next).unwrap(),
            GenerationChunk::ToolCalls(vec![ToolCallDelta {
                index: 0,
                id: None,
                name: None,
                arguments: Some("\"x\"}".to_string()),
            }])
        );
    }

    #[test]
    fn invalid_json_errors() {
        assert!(parse_openai_compat_sse_data("{not json}").is_err());
    }
}
