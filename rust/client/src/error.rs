//! Errors raised by gymnasium environments and the http client.

use std::fmt;

pub type GymResult<T> = Result<T, GymError>;

#[derive(Debug)]
pub enum GymError {
    /// Transport failure talking to the gymnasium server.
    Http(reqwest::Error),
    /// The server (or an environment) answered with something we cannot interpret.
    Protocol(String),
    /// Action is not a member of the action space.
    InvalidAction(String),
    /// `step` was called before the first `reset`.
    NotReset,
    /// A wrapper failed to compute the substituted reward.
    Reward(String),
}

impl fmt::Display for GymError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Http(e) => write!(f, "gymnasium server request failed: {e}"),
            Self::Protocol(msg) => write!(f, "unexpected gymnasium response: {msg}"),
            Self::InvalidAction(msg) => write!(f, "invalid action: {msg}"),
            Self::NotReset => write!(f, "environment stepped before reset"),
            Self::Reward(msg) => write!(f, "reward substitution failed: {msg}"),
        }
    }
}

impl std::error::Error for GymError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Http(e) => Some(e),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for GymError {
    fn from(e: reqwest::Error) -> Self {
        GymError::Http(e)
    }
}
