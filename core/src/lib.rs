//! Root of the `duet-core` library.
//!
//! This crate is the streaming heart of the chat client: it turns an
//! arbitrarily-fragmented SSE byte stream into a sequence of safely
//! renderable answer states, throttles how often those states are
//! published, and coordinates the two concurrent answer streams that back
//! dual-tone mode.

// Prevent accidental direct writes to stdout/stderr in library code. All
// user-visible output must go through the rendering collaborator or the
// tracing stack.
#![deny(clippy::print_stdout, clippy::print_stderr)]

mod client;
mod coalesce;
pub mod config;
mod conversation;
mod coordinator;
mod decode;
pub mod error;
mod sanitize;
mod session;
mod sse;

pub use client::ChatClient;
pub use config::CoreConfig;
pub use conversation::Query;
pub use conversation::QueryStatus;
pub use conversation::Tone;
pub use conversation::Variant;
pub use coordinator::Coordinator;
pub use coordinator::SubmitMode;
pub use error::DuetErr;
pub use error::Result;
pub use sanitize::sanitize_markdown;
