//! Conversion of builder trees into immutable, canonical expression nodes.

use crate::errors::StructuralInconsistency;
use crate::node::ExprNode;
use crate::tree::{NodeIdx, Shape, Tree};

/// Convert a parsed tree into an [`ExprNode`] tree with canonical text.
///
/// # Errors
/// Returns [`StructuralInconsistency`] when the tree still holds a
/// parenthesis group, an unfilled node or an operator missing an operand.
/// Trees produced by [`parse`](crate::parse) never do.
pub fn normalize(tree: &Tree) -> Result<ExprNode, StructuralInconsistency> {
    convert(tree, tree.root())
}

fn convert(tree: &Tree, idx: NodeIdx) -> Result<ExprNode, StructuralInconsistency> {
    let slot = tree.slot(idx);
    match &slot.shape {
        Shape::Identifier { name, plus: false } => Ok(ExprNode::identifier(name.as_str())),
        Shape::Identifier { name, plus: true } => Ok(ExprNode::plus(name.as_str())),
        Shape::Operator(op) => {
            let left = operand(tree, idx, slot.left, "left")?;
            let right = operand(tree, idx, slot.right, "right")?;
            Ok(ExprNode::binary(*op, left, right))
        }
        Shape::Group => Err(StructuralInconsistency::ResidualGroup { node: idx.index() }),
        Shape::Empty => Err(StructuralInconsistency::EmptyNode { node: idx.index() }),
    }
}

fn operand(
    tree: &Tree,
    parent: NodeIdx,
    child: Option<NodeIdx>,
    side: &'static str,
) -> Result<ExprNode, StructuralInconsistency> {
    let child = child.ok_or(StructuralInconsistency::MissingChild {
        node: parent.index(),
        side,
    })?;
    convert(tree, child)
}

#[cfg(test)]
#[expect(clippy::unwrap_used, reason = "tests exercise normalisation fallibility")]
mod tests {
    use super::*;
    use crate::lexer::tokenize;
    use crate::node::{NodeType, Operator};
    use crate::tree::parse;

    fn normalized(expression: &str) -> ExprNode {
        normalize(&parse(&tokenize(expression).unwrap()).unwrap()).unwrap()
    }

    #[test]
    fn plus_becomes_its_own_node() {
        let node = normalized("MPL-2.0+");
        assert_eq!(node.node_type(), NodeType::Plus);
        assert_eq!(node.expression(), "MPL-2.0+");
        let base = node.left().unwrap();
        assert_eq!(base.node_type(), NodeType::Identifier);
        assert_eq!(base.expression(), "MPL-2.0");
    }

    #[test]
    fn parenthesises_compound_children_only() {
        let node = normalized("MPL-2.0+ AND (BSD-2-Clause OR GPL-2.0-or-later)");
        assert_eq!(
            node.expression(),
            "MPL-2.0+ AND (BSD-2-Clause OR GPL-2.0-or-later)"
        );
    }

    #[test]
    fn with_subtrees_keep_their_grouping() {
        let node = normalized("GPL-2.0-or-later WITH Bison-exception-2.2 OR MIT");
        assert_eq!(
            node.expression(),
            "(GPL-2.0-or-later WITH Bison-exception-2.2) OR MIT"
        );
        assert_eq!(node.left().unwrap().node_type(), NodeType::With);
    }

    #[test]
    fn rejects_residual_group() {
        let tree = Tree::from_root(Shape::Group);
        assert_eq!(
            normalize(&tree),
            Err(StructuralInconsistency::ResidualGroup { node: 0 })
        );
    }

    #[test]
    fn rejects_empty_tree() {
        let tree = Tree::from_root(Shape::Empty);
        assert_eq!(
            normalize(&tree),
            Err(StructuralInconsistency::EmptyNode { node: 0 })
        );
    }

    #[test]
    fn rejects_operator_without_operands() {
        let tree = Tree::from_root(Shape::Operator(Operator::And));
        assert_eq!(
            normalize(&tree),
            Err(StructuralInconsistency::MissingChild {
                node: 0,
                side: "left"
            })
        );
    }
}
