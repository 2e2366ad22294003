use reqwest::StatusCode;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, DuetErr>;

/// Transport-class failures. These are the only errors that cross the
/// session boundary; everything else (a malformed SSE line, a sanitizer
/// anomaly) is absorbed locally with a diagnostic log.
#[derive(Error, Debug)]
pub enum DuetErr {
    /// The answer endpoint replied with a non-success status. The body is
    /// retained for the displayed error message.
    #[error("unexpected status {0}: {1}")]
    UnexpectedStatus(StatusCode, String),

    /// The stream was interrupted mid-answer, including the per-session
    /// idle timeout firing.
    #[error("stream disconnected before completion: {0}")]
    Stream(String),

    #[error(transparent)]
    Reqwest(#[from] reqwest::Error),
}
