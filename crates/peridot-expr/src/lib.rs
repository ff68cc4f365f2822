//! SPDX license-expression parsing for peridot.
//!
//! Text flows through three pure stages: [`tokenize`] splits it into typed
//! tokens, [`parse`] builds an arena tree honouring `WITH` > `AND` > `OR`
//! precedence, and [`normalize`] turns that tree into immutable [`ExprNode`]s
//! carrying canonical expression text. [`parse_expression`] runs all three.
//!
//! ```
//! use peridot_expr::{parse_expression, NodeType};
//!
//! let node = parse_expression("MIT OR Apache-2.0 AND Zlib").unwrap_or_else(|e| panic!("{e}"));
//! assert_eq!(node.node_type(), NodeType::Or);
//! assert_eq!(node.expression(), "MIT OR (Apache-2.0 AND Zlib)");
//! ```

mod errors;
mod lexer;
mod node;
mod normalize;
mod tree;

pub use errors::{
    ExpressionError, LexError, ParseError, ParseErrorKind, StructuralInconsistency,
};
pub use lexer::{Token, TokenKind, Tokenizer, tokenize};
pub use node::{ExprNode, NodeType, Operator};
pub use normalize::normalize;
pub use tree::{MAX_DEPTH, Tree, parse};

/// Tokenise, parse and normalise `expression` in one step.
///
/// # Errors
/// Returns [`ExpressionError`] naming the stage that failed.
pub fn parse_expression(expression: &str) -> Result<ExprNode, ExpressionError> {
    let tokens = tokenize(expression)?;
    let tree = parse(&tokens)?;
    Ok(normalize(&tree)?)
}
