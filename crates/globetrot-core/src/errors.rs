//! Hub error taxonomy.

use thiserror::Error;

/// Errors surfaced by the registry, router and session handler.
#[derive(Debug, Error)]
pub enum HubError {
    /// No participant is registered under the given name.
    #[error("participant not found: {0}")]
    NotFound(String),

    /// The display name is already registered.
    #[error("display name already registered: {0}")]
    DuplicateName(String),

    /// A client frame could not be parsed.
    #[error("malformed payload: {0}")]
    MalformedPayload(String),

    /// A session operation was attempted in the wrong lifecycle state.
    #[error("invalid session state: expected {expected}, was {actual}")]
    InvalidState {
        /// State the operation requires.
        expected: &'static str,
        /// State the session was in.
        actual: &'static str,
    },

    /// Every display name in the pool is taken.
    #[error("no display names available")]
    NamesExhausted,

    /// An outbound event could not be serialized.
    #[error("serialization failed: {0}")]
    Serialization(String),
}

impl HubError {
    /// Short stable label, used as a metric label and log field.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "not_found",
            Self::DuplicateName(_) => "duplicate_name",
            Self::MalformedPayload(_) => "malformed_payload",
            Self::InvalidState { .. } => "invalid_state",
            Self::NamesExhausted => "names_exhausted",
            Self::Serialization(_) => "serialization",
        }
    }
}

/// Convenience result alias.
pub type Result<T> = std::result::Result<T, HubError>;
