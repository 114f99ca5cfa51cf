//! Server-sent-event decoding shared by the streaming adapters.
//!
//! Transport framing (line splitting, `data: ` prefixes, events split across
//! network reads) is handled by `eventsource-stream`; this module turns each
//! event payload into text fragments with a vendor-specific decoder.

use std::collections::VecDeque;
use std::fmt::Display;
use std::pin::Pin;

use eventsource_stream::{EventStream, Eventsource};
use futures_util::{Stream, StreamExt, stream};
use serde::Deserialize;

use crate::dispatch::TextStream;
use crate::error::CodesmithError;

/// What one SSE data line means to the consumer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// A text fragment to emit.
    Text(String),
    /// End-of-stream marker; nothing after it is read.
    Done,
    /// Nothing to emit (non-text event, empty delta, or undecodable payload).
    Skip,
    /// Vendor-reported error; ends the stream after it is surfaced.
    Error(String),
}

/// Decoder for one `data:` payload.
pub type FrameDecoder = fn(&str) -> Frame;

#[derive(Deserialize)]
struct ChatChunk {
    #[serde(default)]
    choices: Vec<ChunkChoice>,
    error: Option<StreamError>,
}

#[derive(Deserialize)]
struct ChunkChoice {
    delta: Option<ChunkDelta>,
}

#[derive(Deserialize)]
struct ChunkDelta {
    content: Option<String>,
}

#[derive(Deserialize)]
struct StreamError {
    message: Option<String>,
}

/// Decode a chat-completions stream line (OpenAI, OpenRouter).
///
/// `[DONE]` ends the stream. Payloads that are not valid JSON are skipped:
/// keep-alives and torn frames are normal on these transports.
pub fn parse_chat_delta(data: &str) -> Frame {
    let data = data.trim();
    if data.is_empty() {
        return Frame::Skip;
    }
    if data == "[DONE]" {
        return Frame::Done;
    }

    let Ok(chunk) = serde_json::from_str::<ChatChunk>(data) else {
        tracing::trace!("skipping undecodable stream frame");
        return Frame::Skip;
    };

    if let Some(error) = chunk.error {
        return Frame::Error(
            error
                .message
                .unwrap_or_else(|| "stream reported an error".to_string()),
        );
    }

    chunk
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.delta)
        .and_then(|d| d.content)
        .filter(|t| !t.is_empty())
        .map(Frame::Text)
        .unwrap_or(Frame::Skip)
}

#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum AnthropicEvent {
    ContentBlockDelta { delta: AnthropicDelta },
    MessageStop,
    Error { error: StreamError },
    #[serde(other)]
    Other,
}

#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum AnthropicDelta {
    TextDelta { text: String },
    #[serde(other)]
    Other,
}

/// Decode an Anthropic Messages stream event.
///
/// Only `content_block_delta` events carrying a `text_delta` produce text;
/// message/content-block start and stop events, pings and non-text deltas
/// are ignored. `message_stop` ends the stream.
pub fn parse_anthropic_event(data: &str) -> Frame {
    match serde_json::from_str::<AnthropicEvent>(data.trim()) {
        Ok(AnthropicEvent::ContentBlockDelta {
            delta: AnthropicDelta::TextDelta { text },
        }) if !text.is_empty() => Frame::Text(text),
        Ok(AnthropicEvent::MessageStop) => Frame::Done,
        Ok(AnthropicEvent::Error { error }) => Frame::Error(
            error
                .message
                .unwrap_or_else(|| "stream reported an error".to_string()),
        ),
        Ok(_) => Frame::Skip,
        Err(_) => {
            tracing::trace!("skipping undecodable anthropic event");
            Frame::Skip
        }
    }
}

struct DecodeState<S> {
    events: Pin<Box<EventStream<S>>>,
    decode: FrameDecoder,
    provider: String,
    label: &'static str,
    pending: VecDeque<String>,
    error: Option<CodesmithError>,
    finished: bool,
    fragments: usize,
}

/// Turn a raw SSE byte stream into a [`TextStream`].
///
/// Fragments come out in transport order. The stream ends on the decoder's
/// end marker, at end of body, or right after yielding one error. The body
/// is dropped as soon as the stream ends or the consumer drops it, which
/// releases the connection.
pub fn decode_text_stream<S, B, E>(
    body: S,
    provider: &str,
    label: &'static str,
    decode: FrameDecoder,
) -> TextStream
where
    S: Stream<Item = Result<B, E>> + Send + 'static,
    B: AsRef<[u8]>,
    E: Display + Send + 'static,
{
    let state = DecodeState {
        events: Box::pin(body.eventsource()),
        decode,
        provider: provider.to_string(),
        label,
        pending: VecDeque::new(),
        error: None,
        finished: false,
        fragments: 0,
    };

    Box::pin(stream::unfold(state, |mut st| async move {
        loop {
            if let Some(text) = st.pending.pop_front() {
                st.fragments += 1;
                return Some((Ok(text), st));
            }
            if let Some(err) = st.error.take() {
                st.finished = true;
                return Some((Err(err), st));
            }
            if st.finished {
                tracing::debug!(
                    "{} stream finished after {} fragments",
                    st.provider,
                    st.fragments
                );
                return None;
            }

            match st.events.next().await {
                None => st.finished = true,
                Some(Err(e)) => {
                    st.finished = true;
                    st.error = Some(CodesmithError::Upstream {
                        provider: st.provider.clone(),
                        message: format!("{} stream read failed: {e}", st.label),
                        status: None,
                    });
                }
                Some(Ok(event)) => {
                    // Tolerate several `data:` lines folded into one event.
                    for line in event.data.lines() {
                        match (st.decode)(line) {
                            Frame::Text(text) => st.pending.push_back(text),
                            Frame::Skip => {}
                            Frame::Done => {
                                st.finished = true;
                                break;
                            }
                            Frame::Error(message) => {
                                st.finished = true;
                                st.error = Some(CodesmithError::Upstream {
                                    provider: st.provider.clone(),
                                    message: format!("{} API error: {message}", st.label),
                                    status: None,
                                });
                                break;
                            }
                        }
                    }
                }
            }
        }
    }))
}
