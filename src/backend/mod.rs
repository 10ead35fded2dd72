//! HTTP client for the sidecar chat backend.
//!
//! The sidecar is an opaque local HTTP collaborator: it owns model access,
//! server-side conversation memory, and web search. This module only speaks
//! its wire protocol.

mod client;

pub use client::{ByteStream, SidecarClient};

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Backend-specific errors
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("backend returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("backend unhealthy: {0}")]
    Unhealthy(String),
}

/// Web-search behavior requested per message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchMode {
    #[default]
    Off,
    On,
    /// Let the backend decide per query
    Auto,
}

impl fmt::Display for SearchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SearchMode::Off => "off",
            SearchMode::On => "on",
            SearchMode::Auto => "auto",
        };
        f.write_str(s)
    }
}

impl FromStr for SearchMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "off" => Ok(SearchMode::Off),
            "on" => Ok(SearchMode::On),
            "auto" => Ok(SearchMode::Auto),
            other => Err(format!("unknown search mode '{other}' (off|on|auto)")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn search_mode_round_trips_through_str() {
        for mode in [SearchMode::Off, SearchMode::On, SearchMode::Auto] {
            assert_eq!(mode.to_string().parse::<SearchMode>(), Ok(mode));
        }
        assert!("sometimes".parse::<SearchMode>().is_err());
    }

    #[test]
    fn search_mode_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&SearchMode::Auto).unwrap(),
            "\"auto\""
        );
    }
}
