//! Compact input frames sent by client devices.
//!
//! A frame is `command[:value...]` where every value is an integer:
//! `p:120:340` (position), `color:200` (hue), `flash`.

use thiserror::Error;

/// Separator between frame tokens.
pub const SEPARATOR: char = ':';

/// A structurally valid client frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputFrame {
    /// First token of the frame.
    pub command: String,
    /// Remaining tokens, in order.
    pub values: Vec<i64>,
}

impl InputFrame {
    /// Parses a raw frame.
    ///
    /// Surrounding whitespace is ignored. Only structure is checked; the
    /// meaning of each command is left to the screens.
    ///
    /// # Errors
    ///
    /// Returns a `FrameError` for an empty frame, an empty token, or a value
    /// token that is not an integer.
    pub fn parse(raw: &str) -> Result<Self, FrameError> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(FrameError::Empty);
        }

        let mut tokens = raw.split(SEPARATOR);

        let command = match tokens.next() {
            Some(c) if !c.is_empty() => c.to_string(),
            _ => return Err(FrameError::EmptyToken { position: 0 }),
        };

        let values = tokens
            .enumerate()
            .map(|(i, token)| {
                let position = i + 1;
                if token.is_empty() {
                    return Err(FrameError::EmptyToken { position });
                }
                token.parse::<i64>().map_err(|_| FrameError::InvalidValue {
                    position,
                    token: token.to_string(),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { command, values })
    }
}

/// A frame that failed structural parsing.
///
/// Malformed frames are dropped by the receiver; the connection stays open.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FrameError {
    #[error("malformed frame: empty")]
    Empty,

    #[error("malformed frame: empty token at position {position}")]
    EmptyToken { position: usize },

    #[error("malformed frame: value {token:?} at position {position} is not an integer")]
    InvalidValue { position: usize, token: String },

    #[error("malformed frame: {0}")]
    Json(String),
}

impl FrameError {
    /// Creates a JSON decoding error from any error type.
    pub fn json<E: std::fmt::Display>(err: E) -> Self {
        Self::Json(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_position() {
        let frame = InputFrame::parse("p:120:340").unwrap();
        assert_eq!(frame.command, "p");
        assert_eq!(frame.values, vec![120, 340]);
    }

    #[test]
    fn test_parse_bare_command() {
        let frame = InputFrame::parse("flash").unwrap();
        assert_eq!(frame.command, "flash");
        assert!(frame.values.is_empty());
    }

    #[test]
    fn test_parse_color_and_negative_values() {
        assert_eq!(
            InputFrame::parse("color:359").unwrap(),
            InputFrame {
                command: "color".to_string(),
                values: vec![359],
            }
        );
        assert_eq!(
            InputFrame::parse("p:-8:214\n").unwrap(),
            InputFrame {
                command: "p".to_string(),
                values: vec![-8, 214],
            }
        );
    }

    #[test]
    fn test_empty_frame_is_malformed() {
        assert_eq!(InputFrame::parse(""), Err(FrameError::Empty));
        assert_eq!(InputFrame::parse("  "), Err(FrameError::Empty));
    }

    #[test]
    fn test_empty_tokens_are_malformed() {
        assert_eq!(
            InputFrame::parse(":1:2"),
            Err(FrameError::EmptyToken { position: 0 })
        );
        assert_eq!(
            InputFrame::parse("p::2"),
            Err(FrameError::EmptyToken { position: 1 })
        );
        assert_eq!(
            InputFrame::parse("flash:"),
            Err(FrameError::EmptyToken { position: 1 })
        );
    }

    #[test]
    fn test_non_integer_value_is_malformed() {
        let err = InputFrame::parse("p:12.5:3").unwrap_err();
        assert_eq!(
            err,
            FrameError::InvalidValue {
                position: 1,
                token: "12.5".to_string()
            }
        );
        assert!(err.to_string().contains("\"12.5\""));
    }
}
