//! Error types for page range parsing.

use thiserror::Error;

/// Errors that can occur while parsing a page selection specification.
///
/// All variants are detected before any network I/O takes place.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RangeSpecError {
    /// Token is neither `N` nor `N-M` (e.g. `1-2-3`, empty token).
    #[error("invalid range format: '{token}'\n  Suggestion: use page numbers like 3 or ranges like 0-4")]
    InvalidToken {
        /// The offending comma-separated token.
        token: String,
    },

    /// A numeric part could not be parsed as a non-negative integer.
    #[error("invalid number: '{value}' in '{token}'")]
    InvalidNumber {
        /// The part that failed to parse.
        value: String,
        /// The token it belongs to.
        token: String,
    },

    /// Range start is greater than its end.
    #[error("start of range is greater than end: '{token}'")]
    StartAfterEnd {
        /// The offending token.
        token: String,
    },
}

impl RangeSpecError {
    /// Creates an `InvalidToken` error.
    #[must_use]
    pub fn invalid_token(token: &str) -> Self {
        Self::InvalidToken {
            token: token.to_string(),
        }
    }

    /// Creates an `InvalidNumber` error.
    #[must_use]
    pub fn invalid_number(value: &str, token: &str) -> Self {
        Self::InvalidNumber {
            value: value.to_string(),
            token: token.to_string(),
        }
    }

    /// Creates a `StartAfterEnd` error.
    #[must_use]
    pub fn start_after_end(token: &str) -> Self {
        Self::StartAfterEnd {
            token: token.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_number_message_names_value_and_token() {
        let msg = RangeSpecError::invalid_number("x", "x-3").to_string();
        assert!(msg.contains("'x'"), "should contain value: {msg}");
        assert!(msg.contains("x-3"), "should contain token: {msg}");
    }

    #[test]
    fn test_start_after_end_message() {
        let msg = RangeSpecError::start_after_end("2-1").to_string();
        assert!(msg.contains("greater than end"));
        assert!(msg.contains("2-1"));
    }

    #[test]
    fn test_invalid_token_has_suggestion() {
        let msg = RangeSpecError::invalid_token("1-2-3").to_string();
        assert!(msg.contains("1-2-3"));
        assert!(msg.contains("Suggestion"));
    }
}
