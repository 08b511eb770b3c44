//! Server-sent-events plumbing for streamed completions.
//!
//! The upstream body arrives in arbitrary byte chunks. [`drain_data_lines`]
//! pulls complete `data:` payloads out of a growing buffer and
//! [`sse_response_stream`] turns a response plus a payload parser into a
//! [`BoxStream`] of [`StreamEvent`]s.

use crate::util::from_reqwest;
use lt_domain::error::Result;
use lt_domain::stream::{BoxStream, StreamEvent};

/// Extract complete `data:` payloads from an SSE buffer.
///
/// Events are separated by a blank line (`\n\n` or `\r\n\r\n`). Only
/// `data:` lines are kept; `event:`, `id:`, `retry:` and comments are
/// skipped. Consumed bytes are removed and a trailing partial event stays
/// in the buffer for the next call.
pub(crate) fn drain_data_lines(buffer: &mut String) -> Vec<String> {
    if buffer.contains('\r') {
        *buffer = buffer.replace("\r\n", "\n");
    }

    let mut data_lines = Vec::new();
    while let Some(pos) = buffer.find("\n\n") {
        let block: String = buffer.drain(..pos + 2).collect();
        for line in block.lines() {
            if let Some(data) = line.trim().strip_prefix("data:") {
                let data = data.trim();
                if !data.is_empty() {
                    data_lines.push(data.to_owned());
                }
            }
        }
    }
    data_lines
}

/// Build a [`BoxStream`] from an SSE response and a payload parser.
///
/// The parser maps one `data:` payload to zero or more events. When the
/// body closes, any unterminated event is flushed, and a `Done` is
/// synthesised if the parser never produced one. A transport error ends
/// the stream after yielding it.
pub(crate) fn sse_response_stream<F>(
    response: reqwest::Response,
    mut parse_data: F,
) -> BoxStream<'static, Result<StreamEvent>>
where
    F: FnMut(&str) -> Vec<Result<StreamEvent>> + Send + 'static,
{
    let stream = async_stream::stream! {
        let mut response = response;
        let mut buffer = String::new();
        let mut done_emitted = false;
        let mut finished = false;

        while !finished {
            let payloads = match response.chunk().await {
                Ok(Some(bytes)) => {
                    buffer.push_str(&String::from_utf8_lossy(&bytes));
                    drain_data_lines(&mut buffer)
                }
                Ok(None) => {
                    finished = true;
                    if buffer.trim().is_empty() {
                        Vec::new()
                    } else {
                        buffer.push_str("\n\n");
                        drain_data_lines(&mut buffer)
                    }
                }
                Err(e) => {
                    yield Err(from_reqwest(e));
                    return;
                }
            };

            for data in payloads {
                for event in parse_data(&data) {
                    if matches!(&event, Ok(StreamEvent::Done { .. })) {
                        done_emitted = true;
                    }
                    yield event;
                }
            }
        }

        if !done_emitted {
            yield Ok(StreamEvent::Done {
                usage: None,
                finish_reason: Some("stop".into()),
            });
        }
    };

    Box::pin(stream)
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
