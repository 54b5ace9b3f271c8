//! Error types for the liebe client.
//!
//! Each error variant carries a stable error code (SCREAMING_SNAKE_CASE)
//! that is included in the Display output and accessible via [`LiebeError::code()`].

/// Stable error codes for programmatic error handling.
pub mod error_codes {
    /// A stream frame could not be decoded.
    pub const DECODE_FAILED: &str = "DECODE_FAILED";

    /// The underlying network read or request failed.
    pub const TRANSPORT_FAILED: &str = "TRANSPORT_FAILED";

    /// A directive tag was malformed or referenced an invalid value.
    pub const DIRECTIVE_INVALID: &str = "DIRECTIVE_INVALID";

    /// A call to the persistence backend failed.
    pub const PERSISTENCE_FAILED: &str = "PERSISTENCE_FAILED";

    /// Invalid or missing configuration.
    pub const CONFIG_INVALID: &str = "CONFIG_INVALID";

    /// Local filesystem I/O failed.
    pub const IO_ERROR: &str = "IO_ERROR";
}

/// Errors produced by the liebe client.
///
/// The Display impl formats as `[CODE] message`.
#[derive(Debug, thiserror::Error)]
pub enum LiebeError {
    /// Malformed or unrecognized stream frame.
    #[error("[{}] {}", error_codes::DECODE_FAILED, .0)]
    Decode(String),

    /// Network request or stream read failed.
    #[error("[{}] {}", error_codes::TRANSPORT_FAILED, .0)]
    Transport(String),

    /// Malformed directive content (bad time, unparseable date token).
    #[error("[{}] {}", error_codes::DIRECTIVE_INVALID, .0)]
    Directive(String),

    /// Persistence collaborator call failed.
    #[error("[{}] {}", error_codes::PERSISTENCE_FAILED, .0)]
    Persistence(String),

    /// Configuration error.
    #[error("[{}] {}", error_codes::CONFIG_INVALID, .0)]
    Config(String),

    /// I/O error.
    #[error("[{}] {}", error_codes::IO_ERROR, .0)]
    Io(#[from] std::io::Error),
}

impl LiebeError {
    /// Returns the stable error code for this error.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Decode(_) => error_codes::DECODE_FAILED,
            Self::Transport(_) => error_codes::TRANSPORT_FAILED,
            Self::Directive(_) => error_codes::DIRECTIVE_INVALID,
            Self::Persistence(_) => error_codes::PERSISTENCE_FAILED,
            Self::Config(_) => error_codes::CONFIG_INVALID,
            Self::Io(_) => error_codes::IO_ERROR,
        }
    }

    /// Returns the inner message without the code prefix.
    pub fn message(&self) -> String {
        match self {
            Self::Decode(m)
            | Self::Transport(m)
            | Self::Directive(m)
            | Self::Persistence(m)
            | Self::Config(m) => m.clone(),
            Self::Io(e) => e.to_string(),
        }
    }

    /// Whether the end user should see this error.
    ///
    /// Only transport failures surface inline; decode and directive errors
    /// are best-effort and persistence errors stay silent until the next
    /// resynchronisation.
    pub fn is_user_visible(&self) -> bool {
        matches!(self, Self::Transport(_))
    }
}

impl From<reqwest::Error> for LiebeError {
    fn from(e: reqwest::Error) -> Self {
        Self::Transport(e.to_string())
    }
}

/// Convenience result type.
pub type Result<T> = std::result::Result<T, LiebeError>;
