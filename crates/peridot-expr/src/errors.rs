//! Error types shared by the lexing, tree-building and normalising stages.

use std::fmt;
use thiserror::Error;

use crate::lexer::Token;

/// The input contained a character that starts no token.
///
/// # Examples
/// ```
/// use peridot_expr::LexError;
/// let err = LexError { offset: 4, found: '/' };
/// assert_eq!(err.to_string(), "unrecognised character '/' at byte 4 (zero-based)");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unrecognised character {found:?} at byte {offset} (zero-based)")]
pub struct LexError {
    /// Byte offset of the offending character.
    pub offset: usize,
    /// The offending character.
    pub found: char,
}

/// Grammar rule violated while building the expression tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParseErrorKind {
    /// An identifier appeared where no operand slot was open.
    UnexpectedIdentifier,
    /// `AND`, `OR` or `)` followed an incomplete expression.
    DanglingOperator,
    /// `WITH` did not follow a license identifier.
    MisplacedWith,
    /// `+` did not follow an unmarked license identifier.
    MisplacedPlus,
    /// `+` was separated from its identifier by whitespace or comments.
    DetachedPlus,
    /// `(` appeared where no operand slot accepts a group.
    MisplacedOpenParen,
    /// `)` had no matching `(`.
    UnmatchedCloseParen,
    /// `()` enclosed nothing.
    EmptyGroup,
    /// The input held no tokens.
    EmptyExpression,
    /// Input ended inside an open `(`.
    UnclosedParen,
    /// Input ended with an operator still missing an operand.
    MissingOperand,
    /// The finished tree is deeper than [`MAX_DEPTH`](crate::MAX_DEPTH).
    TooDeep,
}

impl ParseErrorKind {
    /// Human-readable description of the violated rule.
    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::UnexpectedIdentifier => "identifier is not allowed in this position",
            Self::DanglingOperator => "operator must follow a complete expression",
            Self::MisplacedWith => "WITH must follow a license identifier",
            Self::MisplacedPlus => "`+` must follow a license identifier",
            Self::DetachedPlus => "`+` must directly follow its identifier",
            Self::MisplacedOpenParen => "`(` is not allowed in this position",
            Self::UnmatchedCloseParen => "`)` has no matching `(`",
            Self::EmptyGroup => "empty parentheses",
            Self::EmptyExpression => "empty license expression",
            Self::UnclosedParen => "unclosed `(`",
            Self::MissingOperand => "operator is missing an operand",
            Self::TooDeep => "expression nests more than 256 levels deep",
        }
    }
}

impl fmt::Display for ParseErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

/// A token arrived in a state that violates the expression grammar, or the
/// input ended with an incomplete tree.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind} {}; parsed so far: {partial}", position(.token, .index))]
pub struct ParseError {
    /// Which rule was violated.
    pub kind: ParseErrorKind,
    /// The offending token, or `None` when the input ended early.
    pub token: Option<Token>,
    /// Zero-based index of the offending token in the token stream; the
    /// token count when the input ended early.
    pub index: usize,
    /// Sketch of the tree built before the failure, `?` marking gaps.
    pub partial: String,
}

fn position<'a>(token: impl Into<Option<&'a Token>>, index: impl fmt::Display) -> String {
    match token.into() {
        Some(token) => format!("at {token} (token {index}, byte {})", token.offset),
        None => "at end of input".to_owned(),
    }
}

/// The tree handed to the normaliser breaks a builder invariant.
///
/// This signals a defect in the tree builder rather than bad input.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StructuralInconsistency {
    /// A parenthesis group survived tree building.
    #[error("parenthesis group left in finished tree at node {node}")]
    ResidualGroup {
        /// Arena index of the group.
        node: usize,
    },
    /// A node was never filled.
    #[error("unfilled node in finished tree at node {node}")]
    EmptyNode {
        /// Arena index of the node.
        node: usize,
    },
    /// An operator lacks one of its operands.
    #[error("operator at node {node} has no {side} operand")]
    MissingChild {
        /// Arena index of the operator.
        node: usize,
        /// `"left"` or `"right"`.
        side: &'static str,
    },
}

/// Any failure while turning text into an expression tree.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExpressionError {
    /// Tokenising failed.
    #[error("error lexing expression: {0}")]
    Lex(#[from] LexError),
    /// Tree building failed.
    #[error("error parsing expression: {0}")]
    Parse(#[from] ParseError),
    /// The parsed tree could not be normalised.
    #[error("error converting to node format: {0}")]
    Structure(#[from] StructuralInconsistency),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::TokenKind;

    #[test]
    fn formats_error_with_token() {
        let err = ParseError {
            kind: ParseErrorKind::DanglingOperator,
            token: Some(Token::new(TokenKind::And, "AND", 0)),
            index: 0,
            partial: "?".into(),
        };
        assert_eq!(
            err.to_string(),
            "operator must follow a complete expression at AND `AND` (token 0, byte 0); \
             parsed so far: ?"
        );
    }

    #[test]
    fn formats_error_at_end_of_input() {
        let err = ParseError {
            kind: ParseErrorKind::MissingOperand,
            token: None,
            index: 2,
            partial: "(MIT OR ?)".into(),
        };
        assert_eq!(
            err.to_string(),
            "operator is missing an operand at end of input; parsed so far: (MIT OR ?)"
        );
    }

    #[test]
    fn depth_message_names_the_limit() {
        let message = ParseErrorKind::TooDeep.message();
        assert!(message.contains(&crate::MAX_DEPTH.to_string()), "{message}");
    }

    #[test]
    fn wraps_stage_errors_with_context() {
        let err = ExpressionError::from(LexError {
            offset: 1,
            found: '!',
        });
        assert_eq!(
            err.to_string(),
            "error lexing expression: unrecognised character '!' at byte 1 (zero-based)"
        );
    }
}
