//! Helpers for rendering command output.

use std::io::Write;

use eyre::{Context, Result};
use peridot_expr::{ExprNode, NodeType, Token};
use peridot_licenses::NodeRecord;

pub(crate) fn write_line(writer: &mut dyn Write, line: &str) -> Result<()> {
    writeln!(writer, "{line}").wrap_err_with(|| format!("failed to write output line '{line}'"))
}

pub(crate) fn write_tokens(writer: &mut dyn Write, tokens: &[Token]) -> Result<()> {
    for token in tokens {
        writeln!(writer, "{} {} @{}", token.kind, token.text, token.offset)
            .wrap_err_with(|| format!("failed to write token at byte {}", token.offset))?;
    }
    Ok(())
}

const fn type_label(node_type: NodeType) -> &'static str {
    match node_type {
        NodeType::Identifier => "IDENTIFIER",
        NodeType::And => "AND",
        NodeType::Or => "OR",
        NodeType::With => "WITH",
        NodeType::Plus => "PLUS",
    }
}

/// Write one line per node, children indented below their parent.
pub(crate) fn write_tree(writer: &mut dyn Write, root: &ExprNode) -> Result<()> {
    let mut pending = vec![(root, 0_usize)];
    while let Some((node, depth)) = pending.pop() {
        writeln!(
            writer,
            "{:indent$}{} {}",
            "",
            type_label(node.node_type()),
            node.expression(),
            indent = depth * 2
        )
        .wrap_err_with(|| format!("failed to write tree node {}", node.expression()))?;
        pending.extend(node.right().map(|child| (child, depth + 1)));
        pending.extend(node.left().map(|child| (child, depth + 1)));
    }
    Ok(())
}

pub(crate) fn write_json(writer: &mut dyn Write, node: &ExprNode) -> Result<()> {
    serde_json::to_writer_pretty(&mut *writer, node)
        .wrap_err("failed to serialize expression tree to JSON")?;
    writeln!(writer).wrap_err("failed to terminate JSON output with newline")
}

pub(crate) fn write_nodes(writer: &mut dyn Write, nodes: &[NodeRecord]) -> Result<()> {
    for node in nodes {
        writeln!(
            writer,
            "{} {} left={} right={} leaf={}",
            node.id, node.kind, node.left, node.right, node.leaf
        )
        .wrap_err_with(|| format!("failed to write node {}", node.id))?;
    }
    Ok(())
}
