//! Error types for AIRL training.

use gymnasium::GymError;
use std::fmt;
use std::io;

/// Result type for AIRL operations.
pub type AirlResult<T> = std::result::Result<T, AirlError>;

#[derive(Debug)]
pub enum AirlError {
    /// Inconsistent settings: reward mode vs. trajectory actions, bad discount, unsupported spaces.
    Config { param: String, message: String },
    /// A log-space quantity could not be evaluated to a finite value.
    Numerical(String),
    /// Empty batches or transitions that do not match the transition schema.
    Data(String),
    /// The unshaped reward was requested before any discriminator fit.
    NotFitted,
    Env(GymError),
    Io(io::Error),
    Serde(serde_json::Error),
}

impl AirlError {
    pub fn config(param: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Config {
            param: param.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for AirlError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config { param, message } => {
                write!(f, "Invalid configuration for '{}': {}", param, message)
            }
            Self::Numerical(msg) => write!(f, "Numerical error: {}", msg),
            Self::Data(msg) => write!(f, "Data error: {}", msg),
            Self::NotFitted => write!(f, "Reward network has not been fitted yet"),
            Self::Env(e) => write!(f, "Environment error: {}", e),
            Self::Io(e) => write!(f, "IO error: {}", e),
            Self::Serde(e) => write!(f, "Serialization error: {}", e),
        }
    }
}

impl std::error::Error for AirlError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Env(e) => Some(e),
            Self::Io(e) => Some(e),
            Self::Serde(e) => Some(e),
            _ => None,
        }
    }
}

impl From<GymError> for AirlError {
    fn from(e: GymError) -> Self {
        AirlError::Env(e)
    }
}

impl From<io::Error> for AirlError {
    fn from(e: io::Error) -> Self {
        AirlError::Io(e)
    }
}

impl From<serde_json::Error> for AirlError {
    fn from(e: serde_json::Error) -> Self {
        AirlError::Serde(e)
    }
}
