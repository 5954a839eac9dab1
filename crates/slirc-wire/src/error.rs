//! Error types for the wire codec.

use thiserror::Error;

/// Errors produced when decoding an IRC line.
///
/// Decode failures are never fatal to a connection; the caller is
/// expected to log and skip the offending line.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum ParseError {
    /// The input was empty, or nothing but line terminators.
    #[error("empty message")]
    Empty,

    /// No command token could be extracted from the line.
    #[error("no command at byte {position}")]
    MissingCommand {
        /// Byte offset where the command was expected.
        position: usize,
    },

    /// The line was structurally malformed.
    #[error("malformed message at byte {position}")]
    Malformed {
        /// Byte offset where parsing failed.
        position: usize,
    },

    /// A known command was missing required parameters.
    #[error("{command} needs {expected} parameters, got {got}")]
    NotEnoughArguments {
        /// The command name.
        command: &'static str,
        /// Parameters the command requires.
        expected: usize,
        /// Parameters that were present.
        got: usize,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_formats() {
        assert_eq!(ParseError::Empty.to_string(), "empty message");
        assert_eq!(
            ParseError::NotEnoughArguments {
                command: "PRIVMSG",
                expected: 2,
                got: 1,
            }
            .to_string(),
            "PRIVMSG needs 2 parameters, got 1"
        );
        assert_eq!(
            ParseError::MissingCommand { position: 5 }.to_string(),
            "no command at byte 5"
        );
    }
}
