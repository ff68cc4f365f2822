//! End-to-end tests for parsing license expressions into canonical trees.
#![expect(clippy::expect_used, reason = "tests assert parse outcomes")]

use peridot_expr::{
    ExprNode, ExpressionError, MAX_DEPTH, NodeType, ParseErrorKind, TokenKind, parse_expression,
    tokenize,
};
use rstest::rstest;

fn parsed(expression: &str) -> ExprNode {
    parse_expression(expression).expect("expression should parse")
}

fn parse_failure(expression: &str) -> ParseErrorKind {
    match parse_expression(expression) {
        Err(ExpressionError::Parse(err)) => err.kind,
        other => panic!("expected parse error for {expression:?}, got {other:?}"),
    }
}

#[rstest]
#[case("MIT")]
#[case("MPL-2.0+")]
#[case("MIT AND (Zlib OR X11) AND Apache-2.0")]
#[case("MPL-2.0+ AND (BSD-2-Clause OR GPL-2.0-or-later)")]
#[case("(GPL-2.0-only WITH Classpath-exception-2.0) OR MIT")]
#[case("LicenseRef-scancode-public-domain AND MIT")]
fn canonical_text_reparses_to_equal_tree(#[case] expression: &str) {
    let node = parsed(expression);
    assert_eq!(node.expression(), expression);
    assert_eq!(parsed(node.expression()), node);
}

#[test]
fn canonicalises_redundant_and_missing_parentheses() {
    let node = parsed("((MIT) AND   Zlib) OR GPL-2.0-only WITH Classpath-exception-2.0");
    assert_eq!(
        node.to_string(),
        "(MIT AND Zlib) OR (GPL-2.0-only WITH Classpath-exception-2.0)"
    );
}

#[test]
fn chained_conjunction_keeps_group_on_the_left() {
    let node = parsed("MIT AND (Zlib OR X11) AND Apache-2.0");
    assert_eq!(node.node_type(), NodeType::And);
    let left = node.left().expect("left operand");
    let right = node.right().expect("right operand");
    assert_eq!(left.expression(), "MIT AND (Zlib OR X11)");
    assert_eq!(right.expression(), "Apache-2.0");
    assert_eq!(
        left.right().map(ExprNode::node_type),
        Some(NodeType::Or)
    );
}

#[test]
fn same_operator_chains_associate_left() {
    let node = parsed("A AND B AND C");
    let left = node.left().expect("left operand");
    assert_eq!(left.node_type(), NodeType::And);
    assert_eq!(left.expression(), "A AND B");
    assert_eq!(node.right().map(ExprNode::expression), Some("C"));
}

#[test]
fn conjunction_binds_tighter_than_disjunction() {
    let node = parsed("MIT OR Apache-2.0 AND Zlib");
    assert_eq!(node.node_type(), NodeType::Or);
    assert_eq!(
        node.right().map(ExprNode::node_type),
        Some(NodeType::And)
    );
}

#[test]
fn exception_binds_tightest() {
    let node = parsed("GPL-2.0-or-later WITH Bison-exception-2.2 AND MIT");
    assert_eq!(node.node_type(), NodeType::And);
    let with = node.left().expect("left operand");
    assert_eq!(with.node_type(), NodeType::With);
    assert_eq!(with.right().map(ExprNode::expression), Some("Bison-exception-2.2"));
}

#[test]
fn redundant_group_yields_bare_identifier() {
    let node = parsed("(BSD-2-Clause)");
    assert_eq!(node, ExprNode::identifier("BSD-2-Clause"));
    assert_eq!(node.left(), None);
    assert_eq!(node.right(), None);
}

#[test]
fn plus_suffix_wraps_identifier() {
    let node = parsed("MPL-2.0+");
    assert_eq!(node.node_type(), NodeType::Plus);
    assert_eq!(node.expression(), "MPL-2.0+");
    assert_eq!(node.left(), Some(&ExprNode::identifier("MPL-2.0")));
}

#[test]
fn tokenises_mixed_expression() {
    let tokens = tokenize("MPL-2.0+ AND (BSD-2-Clause OR GPL-2.0-or-later)")
        .expect("expression should tokenise");
    let kinds: Vec<_> = tokens.iter().map(|token| token.kind).collect();
    assert_eq!(
        kinds,
        vec![
            TokenKind::Identifier,
            TokenKind::Plus,
            TokenKind::And,
            TokenKind::LParen,
            TokenKind::Identifier,
            TokenKind::Or,
            TokenKind::Identifier,
            TokenKind::RParen,
        ]
    );
}

#[rstest]
#[case("AND MIT", ParseErrorKind::DanglingOperator)]
#[case("MIT OR", ParseErrorKind::MissingOperand)]
#[case("(MIT", ParseErrorKind::UnclosedParen)]
#[case("MIT + ", ParseErrorKind::DetachedPlus)]
#[case("MIT OR ()", ParseErrorKind::EmptyGroup)]
#[case("   ", ParseErrorKind::EmptyExpression)]
fn malformed_expressions_fail_with_kind(#[case] expression: &str, #[case] kind: ParseErrorKind) {
    assert_eq!(parse_failure(expression), kind);
}

#[test]
fn lexing_failures_name_the_stage() {
    let err = parse_expression("MIT & Zlib").expect_err("ampersand is not a token");
    assert!(matches!(err, ExpressionError::Lex(_)));
    assert_eq!(
        err.to_string(),
        "error lexing expression: unrecognised character '&' at byte 4 (zero-based)"
    );
}

#[test]
fn parse_failures_report_position_and_partial_tree() {
    let err = parse_expression("MIT OR OR Zlib").expect_err("doubled operator");
    assert_eq!(
        err.to_string(),
        "error parsing expression: operator must follow a complete expression at OR `OR` \
         (token 2, byte 7); parsed so far: (MIT OR ?)"
    );
}

#[test]
fn from_str_matches_parse_expression() {
    let node: ExprNode = "Apache-2.0 OR MIT".parse().expect("expression should parse");
    assert_eq!(node, parsed("Apache-2.0 OR MIT"));
}

fn nested_right(levels: usize) -> String {
    format!(
        "{}MIT AND Zlib{}",
        "MIT AND (".repeat(levels),
        ")".repeat(levels)
    )
}

#[test]
fn nesting_up_to_the_depth_limit_parses() {
    let expression = nested_right(MAX_DEPTH - 2);
    let node = parsed(&expression);
    assert_eq!(node.expression(), expression);
}

#[rstest]
#[case(MAX_DEPTH - 1)]
#[case(20_000)]
fn nesting_past_the_depth_limit_is_a_parse_error(#[case] levels: usize) {
    assert_eq!(parse_failure(&nested_right(levels)), ParseErrorKind::TooDeep);
}
