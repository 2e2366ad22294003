use std::sync::Arc;

use serde::Serialize;
use tokio::sync::watch;
use tracing::warn;

/// The two candidate voices an answer can be generated in. The value is
/// forwarded verbatim in the request body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Tone {
    Professional,
    Casual,
}

/// Which of the two answer slots a stream (or a selection) addresses.
/// `A` is the professional voice and writes `response`; `B` is the casual
/// voice and writes `response_b`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Variant {
    A,
    B,
}

impl Variant {
    pub fn tone(self) -> Tone {
        match self {
            Variant::A => Tone::Professional,
            Variant::B => Tone::Casual,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryStatus {
    Pending,
    Streaming,
    Completed,
    Error,
    Cancelled,
}

impl QueryStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            QueryStatus::Completed | QueryStatus::Error | QueryStatus::Cancelled
        )
    }
}

/// One user turn as observed by the rendering collaborator.
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    pub prompt: String,
    /// Variant A text (the sole text in single mode).
    pub response: Option<String>,
    /// Variant B text, populated only in dual mode.
    pub response_b: Option<String>,
    pub status: QueryStatus,
    pub is_dual: bool,
    /// Set once the user picks a variant; freezes the query.
    pub selected_response: Option<String>,
    pub selected_tone: Option<Tone>,
    /// `Error: <message>` display text. Kept separate from the answer slots
    /// so partial texts stay inspectable after a failure.
    pub error: Option<String>,
}

impl Query {
    fn new(prompt: String, is_dual: bool) -> Self {
        Self {
            prompt,
            response: None,
            response_b: None,
            status: QueryStatus::Pending,
            is_dual,
            selected_response: None,
            selected_tone: None,
            error: None,
        }
    }

    /// Text slot for a variant, as published so far.
    pub fn variant_text(&self, variant: Variant) -> Option<&str> {
        match variant {
            Variant::A => self.response.as_deref(),
            Variant::B => self.response_b.as_deref(),
        }
    }

    /// Status transitions are monotonic: once terminal, a query never moves
    /// again.
    pub(crate) fn advance_status(&mut self, next: QueryStatus) {
        if self.status.is_terminal() {
            warn!(from = ?self.status, to = ?next, "ignoring status transition out of terminal state");
            return;
        }
        self.status = next;
    }
}

/// The one shared resource of the engine: an ordered, observable collection
/// of queries. All mutation happens through index-keyed closures applied
/// under the watch channel's lock, so two sessions updating disjoint fields
/// of the same query can never clobber each other, and every change is
/// broadcast to subscribers as a fresh snapshot.
#[derive(Clone)]
pub(crate) struct ConversationState {
    tx: Arc<watch::Sender<Vec<Query>>>,
}

impl ConversationState {
    pub(crate) fn new() -> Self {
        let (tx, _rx) = watch::channel(Vec::new());
        Self { tx: Arc::new(tx) }
    }

    /// Append a new pending query and return its stable index.
    pub(crate) fn push_query(&self, prompt: String, is_dual: bool) -> usize {
        let mut index = 0;
        self.tx.send_modify(|queries| {
            index = queries.len();
            queries.push(Query::new(prompt, is_dual));
        });
        index
    }

    /// Apply `f` to the query at `index`. An out-of-range index is a silent
    /// no-op and observers are not woken.
    pub(crate) fn update(&self, index: usize, f: impl FnOnce(&mut Query)) {
        self.tx.send_if_modified(|queries| match queries.get_mut(index) {
            Some(query) => {
                f(query);
                true
            }
            None => false,
        });
    }

    /// Record the user's choice between the two variants. Out-of-range
    /// indices and missing variant texts are designed no-ops; repeating the
    /// selection with the other variant overwrites the first choice.
    pub(crate) fn select(&self, index: usize, variant: Variant) {
        self.update(index, |query| {
            let Some(text) = query.variant_text(variant).map(str::to_string) else {
                warn!(index, ?variant, "selection ignored: variant has no text");
                return;
            };
            query.selected_response = Some(text);
            query.selected_tone = Some(variant.tone());
            query.is_dual = false;
        });
    }

    pub(crate) fn queries(&self) -> Vec<Query> {
        self.tx.borrow().clone()
    }

    pub(crate) fn subscribe(&self) -> watch::Receiver<Vec<Query>> {
        self.tx.subscribe()
    }
}
