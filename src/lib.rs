//! Multi-session streaming chat core for a sidecar-backed desktop AI client.
//!
//! The pieces, leaf to root:
//! - [`session`]: registry of chat sessions (tabs) and the active one
//! - [`conversation`]: per-session ordered message logs
//! - [`backend`]: HTTP client for the local sidecar chat API
//! - [`chat`]: the streaming controller, with cancellable invocations bound
//!   to their originating session
//! - [`view`]: derived snapshot of whichever session is visible
//! - [`app`]: composition root and REPL driver

pub mod app;
pub mod backend;
pub mod chat;
pub mod config;
pub mod conversation;
pub mod error;
pub mod session;
pub mod view;

pub use error::{Result, ShellError};
