use serde::Deserialize;
use tracing::debug;
use tracing::warn;

/// Literal prefix of a data line in the wire framing.
const DATA_PREFIX: &str = "data: ";

/// Literal payload that terminates a stream. This is the sole authoritative
/// end-of-answer signal; the advisory `isComplete` flag never is.
const DONE_SENTINEL: &str = "[DONE]";

/// One parsed wire event.
#[derive(Debug, PartialEq)]
pub(crate) enum SseEvent {
    /// The termination sentinel. Nothing after it may mutate session state.
    Done,
    /// A well-formed answer payload.
    Chunk(AnswerChunk),
}

/// JSON payload carried by a data line. The `text` of the first text part is
/// the cumulative answer so far, not a delta.
#[derive(Debug, Deserialize, PartialEq)]
pub(crate) struct AnswerChunk {
    #[serde(default)]
    pub parts: Vec<AnswerPart>,
    /// Advisory only; logged and otherwise ignored.
    #[serde(rename = "isComplete", default)]
    pub is_complete: Option<bool>,
}

/// One part of an answer payload. Only text parts matter here; the `type`
/// discriminator and any other part kinds are ignored.
#[derive(Debug, Deserialize, PartialEq)]
pub(crate) struct AnswerPart {
    #[serde(default)]
    pub text: Option<String>,
}

impl AnswerChunk {
    /// Cumulative answer text, if this chunk carries one.
    pub(crate) fn text(&self) -> Option<&str> {
        self.parts.iter().find_map(|part| part.text.as_deref())
    }
}

/// Interpret one complete line of the response body.
///
/// Lines without the data prefix are inter-event noise and are skipped.
/// Malformed JSON is non-fatal: the line is logged and dropped so a later
/// well-formed line can still update state.
pub(crate) fn parse_sse_line(line: &str) -> Option<SseEvent> {
    let payload = line.strip_prefix(DATA_PREFIX)?;
    if payload.trim() == DONE_SENTINEL {
        return Some(SseEvent::Done);
    }

    match serde_json::from_str::<AnswerChunk>(payload) {
        Ok(chunk) => {
            if chunk.is_complete == Some(true) {
                debug!("payload carried advisory isComplete flag");
            }
            Some(SseEvent::Chunk(chunk))
        }
        Err(err) => {
            warn!(%err, "skipping malformed SSE payload");
            None
        }
    }
}
