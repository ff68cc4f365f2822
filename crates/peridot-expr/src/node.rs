//! Immutable, externally visible expression nodes.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use crate::errors::ExpressionError;

/// Binary operators of the SPDX expression grammar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum Operator {
    /// Both operands apply.
    And,
    /// Either operand applies.
    Or,
    /// A license (left) with an exception (right).
    With,
}

impl Operator {
    /// The keyword spelling of the operator.
    #[must_use]
    pub const fn keyword(self) -> &'static str {
        match self {
            Self::And => "AND",
            Self::Or => "OR",
            Self::With => "WITH",
        }
    }
}

/// Type of an [`ExprNode`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum NodeType {
    /// A single license or exception identifier.
    Identifier,
    /// Conjunction of two subexpressions.
    And,
    /// Disjunction of two subexpressions.
    Or,
    /// A license with an exception.
    With,
    /// "This version or later" of the identifier in the left child.
    Plus,
}

impl NodeType {
    /// Whether nodes of this type combine two subexpressions.
    #[must_use]
    pub const fn is_compound(self) -> bool {
        matches!(self, Self::And | Self::Or | Self::With)
    }
}

impl From<Operator> for NodeType {
    fn from(op: Operator) -> Self {
        match op {
            Operator::And => Self::And,
            Operator::Or => Self::Or,
            Operator::With => Self::With,
        }
    }
}

/// A node of a normalised license expression tree.
///
/// The constructors uphold the shape of each type: identifiers have no
/// children, `Plus` has a single identifier on the left, and compound nodes
/// have both children. `expression` holds the canonical text of the subtree.
///
/// # Examples
///
/// ```
/// use peridot_expr::{ExprNode, NodeType, Operator};
///
/// let node = ExprNode::binary(
///     Operator::Or,
///     ExprNode::identifier("MIT"),
///     ExprNode::binary(
///         Operator::And,
///         ExprNode::plus("MPL-2.0"),
///         ExprNode::identifier("Zlib"),
///     ),
/// );
/// assert_eq!(node.node_type(), NodeType::Or);
/// assert_eq!(node.expression(), "MIT OR (MPL-2.0+ AND Zlib)");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct ExprNode {
    node_type: NodeType,
    expression: String,
    #[cfg_attr(feature = "serde", serde(skip_serializing_if = "Option::is_none"))]
    left: Option<Box<ExprNode>>,
    #[cfg_attr(feature = "serde", serde(skip_serializing_if = "Option::is_none"))]
    right: Option<Box<ExprNode>>,
}

impl ExprNode {
    /// A bare identifier.
    #[must_use]
    pub fn identifier(name: impl Into<String>) -> Self {
        Self {
            node_type: NodeType::Identifier,
            expression: name.into(),
            left: None,
            right: None,
        }
    }

    /// An identifier with the `+` suffix.
    #[must_use]
    pub fn plus(name: impl Into<String>) -> Self {
        let base = Self::identifier(name);
        Self {
            node_type: NodeType::Plus,
            expression: format!("{}+", base.expression),
            left: Some(Box::new(base)),
            right: None,
        }
    }

    /// Combine two subexpressions, parenthesising compound operands.
    #[must_use]
    pub fn binary(op: Operator, left: Self, right: Self) -> Self {
        let expression = format!(
            "{} {} {}",
            left.operand_text(),
            op.keyword(),
            right.operand_text()
        );
        Self {
            node_type: op.into(),
            expression,
            left: Some(Box::new(left)),
            right: Some(Box::new(right)),
        }
    }

    /// The node type.
    #[must_use]
    pub fn node_type(&self) -> NodeType {
        self.node_type
    }

    /// Canonical text of this subtree.
    #[must_use]
    pub fn expression(&self) -> &str {
        &self.expression
    }

    /// Left child, present for `Plus` and compound nodes.
    #[must_use]
    pub fn left(&self) -> Option<&Self> {
        self.left.as_deref()
    }

    /// Right child, present for compound nodes.
    #[must_use]
    pub fn right(&self) -> Option<&Self> {
        self.right.as_deref()
    }

    /// Every distinct identifier referenced by the tree, sorted.
    ///
    /// `Plus` nodes contribute their base identifier.
    #[must_use]
    pub fn identifiers(&self) -> BTreeSet<&str> {
        let mut found = BTreeSet::new();
        let mut pending = vec![self];
        while let Some(node) = pending.pop() {
            if node.node_type == NodeType::Identifier {
                found.insert(node.expression.as_str());
            }
            pending.extend(node.left());
            pending.extend(node.right());
        }
        found
    }

    fn operand_text(&self) -> String {
        if self.node_type.is_compound() {
            format!("({})", self.expression)
        } else {
            self.expression.clone()
        }
    }
}

impl fmt::Display for ExprNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.expression)
    }
}

impl FromStr for ExprNode {
    type Err = ExpressionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        crate::parse_expression(s)
    }
}
