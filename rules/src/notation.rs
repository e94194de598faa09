//! Parsing algebraic move text (`"e2e4"`, `"a7a8q"`) into the engine's
//! typed representation. Only the squares and the raw promotion letter
//! are this module's concern; what a caller does with an unrecognized
//! promotion letter is a policy decision that belongs above this layer.

use crate::square::Square;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum NotationError {
    #[error("move text must be 4 or 5 characters long")]
    WrongLength,
    #[error("not a valid square: {0}")]
    BadSquare(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedUciMove {
    pub from: Square,
    pub to: Square,
    pub promotion: Option<char>,
}

/// Parses `from`+`to`, plus an optional trailing promotion letter, out of
/// a 4- or 5-character move string.
pub fn parse_uci_move(text: &str) -> Result<ParsedUciMove, NotationError> {
    let len = text.chars().count();
    if len != 4 && len != 5 {
        return Err(NotationError::WrongLength);
    }
    let from_text: String = text.chars().take(2).collect();
    let to_text: String = text.chars().skip(2).take(2).collect();
    let from = Square::from_algebraic(&from_text).ok_or(NotationError::BadSquare(from_text))?;
    let to = Square::from_algebraic(&to_text).ok_or(NotationError::BadSquare(to_text))?;
    let promotion = text.chars().nth(4);
    Ok(ParsedUciMove { from, to, promotion })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_move() {
        let parsed = parse_uci_move("e2e4").unwrap();
        assert_eq!(parsed.from, Square::new(6, 4));
        assert_eq!(parsed.to, Square::new(4, 4));
        assert_eq!(parsed.promotion, None);
    }

    #[test]
    fn parses_promotion_letter() {
        let parsed = parse_uci_move("a7a8q").unwrap();
        assert_eq!(parsed.promotion, Some('q'));
    }

    #[test]
    fn rejects_wrong_length() {
        assert_eq!(parse_uci_move("e2e"), Err(NotationError::WrongLength));
        assert_eq!(parse_uci_move("e2e4qq"), Err(NotationError::WrongLength));
    }

    #[test]
    fn rejects_bad_square() {
        assert_eq!(
            parse_uci_move("z9e4"),
            Err(NotationError::BadSquare("z9".to_string()))
        );
    }
}
