use std::time::Duration;

use futures::StreamExt;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::client::ChatClient;
use crate::coalesce::Coalescer;
use crate::conversation::ConversationState;
use crate::conversation::QueryStatus;
use crate::conversation::Variant;
use crate::decode::LineDecoder;
use crate::error::DuetErr;
use crate::sanitize::sanitize_markdown;
use crate::sse::SseEvent;
use crate::sse::parse_sse_line;

/// Terminal result of one stream session, reported to the coordinator so it
/// can derive the query's combined status.
#[derive(Debug)]
pub(crate) enum SessionOutcome {
    Completed,
    Cancelled,
    Failed(DuetErr),
}

/// Everything one session needs to drive one variant of one query.
pub(crate) struct SessionContext {
    pub client: ChatClient,
    pub state: ConversationState,
    pub prompt: String,
    pub index: usize,
    pub variant: Variant,
    pub debounce_window: Duration,
    pub idle_timeout: Duration,
    pub token: CancellationToken,
}

/// Drive one network stream from request to terminal state.
///
/// State machine: pending until the response headers arrive, then streaming
/// while payloads flow, ending in exactly one of completed, error or
/// cancelled. After a terminal state is reached no further writes happen;
/// cancellation in particular drops any pending coalesced publish but never
/// rolls back text that already went out.
pub(crate) async fn run_session(ctx: SessionContext) -> SessionOutcome {
    let SessionContext {
        client,
        state,
        prompt,
        index,
        variant,
        debounce_window,
        idle_timeout,
        token,
    } = ctx;

    // Cancellation can land while the request is still in flight.
    let mut stream = tokio::select! {
        _ = token.cancelled() => return SessionOutcome::Cancelled,
        resp = client.stream_answer(&prompt, variant.tone()) => match resp {
            Ok(stream) => stream,
            Err(err) => return SessionOutcome::Failed(err),
        },
    };

    // Successful headers: this variant is live.
    state.update(index, |query| {
        if query.status == QueryStatus::Pending {
            query.advance_status(QueryStatus::Streaming);
        }
    });

    let mut decoder = LineDecoder::new();
    let mut coalescer: Coalescer<String> = Coalescer::new(debounce_window);

    loop {
        tokio::select! {
            _ = token.cancelled() => {
                coalescer.discard();
                debug!(index, ?variant, "session cancelled");
                return SessionOutcome::Cancelled;
            }
            _ = coalescer.ready() => {
                if let Some(text) = coalescer.flush() {
                    publish_text(&state, index, variant, text);
                }
            }
            next = timeout(idle_timeout, stream.next()) => match next {
                Ok(Some(Ok(bytes))) => {
                    for line in decoder.feed(&bytes) {
                        match parse_sse_line(&line) {
                            Some(SseEvent::Done) => {
                                // Authoritative termination: stop before
                                // looking at anything that may follow.
                                finish_publish(&state, index, variant, &mut coalescer);
                                debug!(index, ?variant, "sentinel received");
                                return SessionOutcome::Completed;
                            }
                            Some(SseEvent::Chunk(chunk)) => {
                                if let Some(text) = chunk.text() {
                                    // Cumulative contract: the payload text
                                    // replaces, never appends.
                                    coalescer.submit(sanitize_markdown(text));
                                }
                            }
                            None => {}
                        }
                    }
                }
                Ok(Some(Err(err))) => {
                    finish_publish(&state, index, variant, &mut coalescer);
                    return SessionOutcome::Failed(DuetErr::Stream(err.to_string()));
                }
                Ok(None) => {
                    // Transport closed without a sentinel; a well-formed
                    // trailing line still counts.
                    if let Some(line) = decoder.finish() {
                        match parse_sse_line(&line) {
                            Some(SseEvent::Done) | None => {}
                            Some(SseEvent::Chunk(chunk)) => {
                                if let Some(text) = chunk.text() {
                                    coalescer.submit(sanitize_markdown(text));
                                }
                            }
                        }
                    }
                    finish_publish(&state, index, variant, &mut coalescer);
                    return SessionOutcome::Completed;
                }
                Err(_) => {
                    finish_publish(&state, index, variant, &mut coalescer);
                    return SessionOutcome::Failed(DuetErr::Stream(
                        "idle timeout waiting for next chunk".to_string(),
                    ));
                }
            }
        }
    }
}

/// Flush the coalescer before any terminal status is derived, so the final
/// displayed text is the true final value and never a stale debounced one.
fn finish_publish(
    state: &ConversationState,
    index: usize,
    variant: Variant,
    coalescer: &mut Coalescer<String>,
) {
    if let Some(text) = coalescer.flush() {
        publish_text(state, index, variant, text);
    }
}

/// Each session writes only its own variant's slot; the sibling's field is
/// never touched.
fn publish_text(state: &ConversationState, index: usize, variant: Variant, text: String) {
    state.update(index, move |query| match variant {
        Variant::A => query.response = Some(text),
        Variant::B => query.response_b = Some(text),
    });
}
