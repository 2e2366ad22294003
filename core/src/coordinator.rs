use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::MutexGuard;
use std::sync::PoisonError;

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use tracing::warn;

use crate::client::ChatClient;
use crate::config::CoreConfig;
use crate::conversation::ConversationState;
use crate::conversation::Query;
use crate::conversation::QueryStatus;
use crate::conversation::Variant;
use crate::error::DuetErr;
use crate::session::SessionContext;
use crate::session::SessionOutcome;
use crate::session::run_session;

/// How a submitted prompt is answered: one professional-tone stream, or two
/// independent tone streams raced side by side. One code path serves both;
/// the mode only decides how many sessions get spawned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitMode {
    Single,
    Dual,
}

/// Owns the query collection and every live stream session. Explicitly
/// constructed with its own client; nothing here is process-global.
pub struct Coordinator {
    client: ChatClient,
    config: CoreConfig,
    state: ConversationState,
    /// Cancellation handles for the live sessions of each query, removed
    /// once the query reaches a terminal state.
    sessions: Arc<Mutex<HashMap<usize, Vec<CancellationToken>>>>,
}

impl Coordinator {
    pub fn new(client: ChatClient, config: CoreConfig) -> Self {
        Self {
            client,
            config,
            state: ConversationState::new(),
            sessions: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Append a new query and start streaming its answer(s). Returns the
    /// query's stable index, or `None` for a blank prompt (no query is
    /// created). Must be called from within a tokio runtime.
    pub fn submit(&self, prompt: &str, mode: SubmitMode) -> Option<usize> {
        let prompt = prompt.trim();
        if prompt.is_empty() {
            return None;
        }

        let is_dual = mode == SubmitMode::Dual;
        let index = self.state.push_query(prompt.to_string(), is_dual);
        debug!(index, ?mode, "query submitted");

        let variants: &[Variant] = match mode {
            SubmitMode::Single => &[Variant::A],
            SubmitMode::Dual => &[Variant::A, Variant::B],
        };

        let mut handles = Vec::with_capacity(variants.len());
        let mut tokens = Vec::with_capacity(variants.len());
        for &variant in variants {
            let token = CancellationToken::new();
            tokens.push(token.clone());
            handles.push(tokio::spawn(run_session(SessionContext {
                client: self.client.clone(),
                state: self.state.clone(),
                prompt: prompt.to_string(),
                index,
                variant,
                debounce_window: self.config.debounce_window,
                idle_timeout: self.config.idle_timeout,
                token,
            })));
        }
        self.lock_sessions().insert(index, tokens);

        // Supervisor: waits for every variant and derives the one combined
        // terminal transition for the query.
        let state = self.state.clone();
        let sessions = Arc::clone(&self.sessions);
        tokio::spawn(async move {
            let mut outcomes = Vec::with_capacity(handles.len());
            for handle in handles {
                outcomes.push(handle.await.unwrap_or_else(|err| {
                    SessionOutcome::Failed(DuetErr::Stream(err.to_string()))
                }));
            }
            let (status, error) = combined_status(&outcomes);
            state.update(index, |query| {
                query.advance_status(status);
                query.error = error;
            });
            sessions
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .remove(&index);
        });

        Some(index)
    }

    /// Record the user's choice between the two variants of a dual answer.
    /// An unknown index is a designed no-op.
    pub fn select(&self, index: usize, variant: Variant) {
        self.state.select(index, variant);
    }

    /// Cancel every live session of one query. Other queries are untouched,
    /// and text already published for this one stays on screen.
    pub fn cancel(&self, index: usize) {
        if let Some(tokens) = self.lock_sessions().get(&index) {
            debug!(index, sessions = tokens.len(), "cancelling query");
            for token in tokens {
                token.cancel();
            }
        }
    }

    /// Snapshot of the conversation for the rendering collaborator.
    pub fn queries(&self) -> Vec<Query> {
        self.state.queries()
    }

    /// Change notifications carrying fresh snapshots.
    pub fn subscribe(&self) -> watch::Receiver<Vec<Query>> {
        self.state.subscribe()
    }

    fn lock_sessions(&self) -> MutexGuard<'_, HashMap<usize, Vec<CancellationToken>>> {
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Derive the query's terminal status from its sessions' outcomes.
///
/// A user stop wins over everything and is not a failure. Otherwise any
/// failed variant fails the query (its message becomes the displayed
/// `Error:` text, partial answers stay inspectable), and the query completes
/// only when every variant completed.
fn combined_status(outcomes: &[SessionOutcome]) -> (QueryStatus, Option<String>) {
    if outcomes
        .iter()
        .any(|o| matches!(o, SessionOutcome::Cancelled))
    {
        return (QueryStatus::Cancelled, None);
    }
    for outcome in outcomes {
        if let SessionOutcome::Failed(err) = outcome {
            warn!(%err, "variant stream failed");
            return (QueryStatus::Error, Some(format!("Error: {err}")));
        }
    }
    (QueryStatus::Completed, None)
}
