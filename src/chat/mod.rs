//! Streaming chat controller.
//!
//! Orchestrates cancellable streaming invocations against the sidecar and
//! turns response bytes into conversation-store mutations, keyed by the
//! session that originated each invocation.

mod controller;
mod decode;

pub use controller::{ChatController, ChatEvent, StreamPhase};
pub use decode::Utf8StreamDecoder;
