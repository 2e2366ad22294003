use std::time::Duration;

/// Knobs for the streaming core. Everything has a sensible default; the
/// embedding application overrides what it needs and hands the config to
/// [`crate::Coordinator`].
#[derive(Debug, Clone)]
pub struct CoreConfig {
    /// Root of the answer service, e.g. `http://localhost:3000`.
    pub base_url: String,

    /// How long a computed text sits in the coalescer before it is
    /// published to observers. Every newer value restarts the window.
    pub debounce_window: Duration,

    /// Maximum silence tolerated between two chunks of one stream before
    /// the session fails the same way a transport error would.
    pub idle_timeout: Duration,

    /// Result-count hint forwarded verbatim in the request body.
    pub num_results: u32,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:3000".to_string(),
            debounce_window: Duration::from_millis(100),
            idle_timeout: Duration::from_secs(30),
            num_results: 5,
        }
    }
}

impl CoreConfig {
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_debounce_window(mut self, window: Duration) -> Self {
        self.debounce_window = window;
        self
    }

    pub fn with_idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = timeout;
        self
    }
}
