//! Chat-completion event streams.

use eventsource_stream::Eventsource;
use futures_util::{future, StreamExt};
use reqwest::Response;

use crate::provider::{GenerationError, GenerationStream, Result};
use crate::types::GenerationChunk;

use super::openai_compat::parse_openai_compat_sse_data;

/// Decode one server-sent event into a chunk.
///
/// Keep-alive frames with no data yield `None`. An `error` event carries
/// the endpoint's message.
fn decode_event(event: &str, data: &str) -> Option<Result<GenerationChunk>> {
    if event == "error" {
        return Some(Err(GenerationError::Api(data.to_string())));
    }
    if data.trim().is_empty() {
        return None;
    }
    Some(parse_openai_compat_sse_data(data).map_err(|e| match e {
        GenerationError::Json(json) => GenerationError::Stream(format!("bad chunk: {json}")),
        other => other,
    }))
}

/// Turn a chat-completion response body into a [`GenerationStream`].
///
/// The stream ends right after `[DONE]`, even if the endpoint keeps the
/// connection open or sends trailing frames.
pub fn completion_stream(response: Response) -> GenerationStream {
    let chunks = response
        .bytes_stream()
        .eventsource()
        .filter_map(|event| {
            future::ready(match event {
                Ok(event) => decode_event(&event.event, &event.data),
                Err(e) => Some(Err(GenerationError::Stream(e.to_string()))),
            })
        })
        .scan(false, |done, chunk| {
            if *done {
                return future::ready(None);
            }
            *done = matches!(chunk, Ok(GenerationChunk::Done));
            future::ready(Some(chunk))
        });

    Box::pin(chunks)
}
