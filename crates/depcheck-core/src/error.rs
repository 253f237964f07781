//! Error types for depcheck operations.
//!
//! Each error has:
//! - A unique error code (e.g., E0101) for easy reference and searching
//! - A clear error message explaining what went wrong
//! - Suggestions for how to fix the issue
//!
//! The hard core only ever raises a typed error for one thing: a caller
//! naming an architecture, source, or package that the catalogue doesn't
//! know about. Everything else that can go wrong (allocator exhaustion,
//! malformed input) is either unreachable by construction or out of this
//! crate's scope and is handled by panicking rather than by a `Result`.

use std::fmt;
use thiserror::Error;

/// Error codes for depcheck errors.
///
/// These codes make it easy to search for solutions and reference specific
/// errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    /// Unknown architecture name
    E0101,
    /// Unknown source package name
    E0102,
    /// Unknown binary package name
    E0103,
}

impl ErrorCode {
    /// Get the string representation of the error code.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::E0101 => "E0101",
            Self::E0102 => "E0102",
            Self::E0103 => "E0103",
        }
    }

    /// Get a brief title for this error code.
    #[must_use]
    pub const fn title(&self) -> &'static str {
        match self {
            Self::E0101 => "Unknown architecture",
            Self::E0102 => "Unknown source",
            Self::E0103 => "Unknown package",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Main error type for depcheck.
#[derive(Error, Debug)]
pub enum Error {
    /// An architecture name that isn't one of the catalogue's known
    /// architectures was passed to an API expecting one.
    #[error("[{code}] unknown architecture '{name}'")]
    UnknownArchitecture {
        /// Error code.
        #[source]
        code: ErrorCodeSource,
        /// Architecture name.
        name: String,
        /// Suggestions for fixing.
        suggestions: Vec<String>,
    },

    /// A source package name that the catalogue has never seen was passed
    /// to an API expecting a known source.
    #[error("[{code}] unknown source '{name}'")]
    UnknownSource {
        /// Error code.
        #[source]
        code: ErrorCodeSource,
        /// Source package name.
        name: String,
        /// Suggestions for fixing.
        suggestions: Vec<String>,
    },

    /// A binary package name that the catalogue has never seen was passed
    /// to an API expecting a known package.
    #[error("[{code}] unknown package '{name}'")]
    UnknownPackage {
        /// Error code.
        #[source]
        code: ErrorCodeSource,
        /// Package name.
        name: String,
        /// Suggestions for fixing.
        suggestions: Vec<String>,
    },
}

/// Wrapper to make `ErrorCode` usable as a source.
#[derive(Debug)]
pub struct ErrorCodeSource(pub ErrorCode);

impl fmt::Display for ErrorCodeSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.as_str())
    }
}

impl std::error::Error for ErrorCodeSource {}

impl Error {
    /// Get the error code for this error.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::UnknownArchitecture { code, .. }
            | Self::UnknownSource { code, .. }
            | Self::UnknownPackage { code, .. } => code.0,
        }
    }

    /// Get suggestions for fixing this error.
    #[must_use]
    pub fn suggestions(&self) -> &[String] {
        match self {
            Self::UnknownArchitecture { suggestions, .. }
            | Self::UnknownSource { suggestions, .. }
            | Self::UnknownPackage { suggestions, .. } => suggestions,
        }
    }

    /// Create an unknown-architecture error with suggestions.
    #[must_use]
    pub fn unknown_architecture(name: impl Into<String>) -> Self {
        let name = name.into();
        Self::UnknownArchitecture {
            code: ErrorCodeSource(ErrorCode::E0101),
            suggestions: vec![
                format!("'{name}' was never registered with the suite's architecture list"),
                "Check the architecture name for typos".to_string(),
            ],
            name,
        }
    }

    /// Create an unknown-source error with suggestions.
    #[must_use]
    pub fn unknown_source(name: impl Into<String>) -> Self {
        let name = name.into();
        Self::UnknownSource {
            code: ErrorCodeSource(ErrorCode::E0102),
            suggestions: vec![
                format!("'{name}' has no entry in the source catalogue"),
                "Check the source package name for typos".to_string(),
            ],
            name,
        }
    }

    /// Create an unknown-package error with suggestions.
    #[must_use]
    pub fn unknown_package(name: impl Into<String>) -> Self {
        let name = name.into();
        Self::UnknownPackage {
            code: ErrorCodeSource(ErrorCode::E0103),
            suggestions: vec![
                format!("'{name}' is not present in the universe for this architecture"),
                "Check the binary package name for typos".to_string(),
            ],
            name,
        }
    }

    /// Format the error with suggestions for display.
    #[must_use]
    pub fn display_with_suggestions(&self) -> String {
        let mut output = format!("{self}");
        let suggestions = self.suggestions();
        if !suggestions.is_empty() {
            output.push_str("\n\nSuggestions:");
            for suggestion in suggestions {
                output.push_str(&format!("\n  - {suggestion}"));
            }
        }
        output
    }
}

/// Result type for depcheck operations.
pub type Result<T> = std::result::Result<T, Error>;
