//! Arena-backed expression tree and the token-driven builder that fills it.
//!
//! The builder consumes one token per step. Operators are inserted above the
//! node under the cursor, so repeated operators form left-leaning chains, and
//! parenthesis groups are spliced out once closed. Parent links are arena
//! indices, which keeps every restructuring step a matter of rewriting a few
//! `Option<NodeIdx>` fields.

use crate::errors::{ParseError, ParseErrorKind};
use crate::lexer::{Token, TokenKind};
use crate::node::Operator;

/// Deepest tree [`parse`] accepts, counting the root as level one.
///
/// A `+` suffix does not add a level; parentheses only count while open.
/// Every later stage walks the tree recursively, so the limit bounds their
/// stack use.
pub const MAX_DEPTH: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct NodeIdx(usize);

impl NodeIdx {
    pub(crate) fn index(self) -> usize {
        self.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Shape {
    Empty,
    Identifier { name: String, plus: bool },
    Operator(Operator),
    /// An open `(` awaiting its matching `)`.
    Group,
}

#[derive(Debug, Clone)]
pub(crate) struct Slot {
    pub(crate) shape: Shape,
    pub(crate) parent: Option<NodeIdx>,
    pub(crate) left: Option<NodeIdx>,
    pub(crate) right: Option<NodeIdx>,
}

impl Slot {
    fn new(shape: Shape, parent: Option<NodeIdx>) -> Self {
        Self {
            shape,
            parent,
            left: None,
            right: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Side {
    Left,
    Right,
}

/// A parsed, not yet normalised, license expression tree.
///
/// Produced by [`parse`] and consumed by [`normalize`](crate::normalize).
#[derive(Debug, Clone)]
pub struct Tree {
    slots: Vec<Slot>,
    root: NodeIdx,
}

impl Tree {
    pub(crate) fn new() -> Self {
        Self {
            slots: vec![Slot::new(Shape::Empty, None)],
            root: NodeIdx(0),
        }
    }

    #[cfg(test)]
    pub(crate) fn from_root(shape: Shape) -> Self {
        Self {
            slots: vec![Slot::new(shape, None)],
            root: NodeIdx(0),
        }
    }

    pub(crate) fn root(&self) -> NodeIdx {
        self.root
    }

    pub(crate) fn slot(&self, idx: NodeIdx) -> &Slot {
        self.slots
            .get(idx.0)
            .unwrap_or_else(|| unreachable!("node index {} outside arena", idx.0))
    }

    fn slot_mut(&mut self, idx: NodeIdx) -> &mut Slot {
        self.slots
            .get_mut(idx.0)
            .unwrap_or_else(|| unreachable!("node index {} outside arena", idx.0))
    }

    fn alloc(&mut self, shape: Shape, parent: Option<NodeIdx>) -> NodeIdx {
        self.slots.push(Slot::new(shape, parent));
        NodeIdx(self.slots.len() - 1)
    }

    fn attach(&mut self, parent: NodeIdx, side: Side, shape: Shape) -> NodeIdx {
        let child = self.alloc(shape, Some(parent));
        let slot = self.slot_mut(parent);
        match side {
            Side::Left => slot.left = Some(child),
            Side::Right => slot.right = Some(child),
        }
        child
    }

    /// Put `new` where `old` hangs below `parent`, or at the root.
    fn relink(&mut self, parent: Option<NodeIdx>, old: NodeIdx, new: NodeIdx) {
        match parent {
            Some(p) => {
                let slot = self.slot_mut(p);
                if slot.left == Some(old) {
                    slot.left = Some(new);
                } else if slot.right == Some(old) {
                    slot.right = Some(new);
                }
            }
            None => self.root = new,
        }
        self.slot_mut(new).parent = parent;
    }

    fn insert_above(&mut self, target: NodeIdx, shape: Shape) -> NodeIdx {
        let parent = self.slot(target).parent;
        let node = self.alloc(shape, parent);
        self.relink(parent, target, node);
        self.slot_mut(node).left = Some(target);
        self.slot_mut(target).parent = Some(node);
        node
    }

    fn enclosing_group(&self, from: NodeIdx) -> Option<NodeIdx> {
        let mut current = Some(from);
        while let Some(idx) = current {
            let slot = self.slot(idx);
            if slot.shape == Shape::Group {
                return Some(idx);
            }
            current = slot.parent;
        }
        None
    }

    fn retire(&mut self, idx: NodeIdx) {
        *self.slot_mut(idx) = Slot::new(Shape::Empty, None);
    }

    fn first_defect(&self) -> Option<ParseErrorKind> {
        let mut pending = vec![(self.root, 1_usize)];
        while let Some((idx, depth)) = pending.pop() {
            if depth > MAX_DEPTH {
                return Some(ParseErrorKind::TooDeep);
            }
            let slot = self.slot(idx);
            match &slot.shape {
                Shape::Empty => return Some(ParseErrorKind::EmptyExpression),
                Shape::Group => return Some(ParseErrorKind::UnclosedParen),
                Shape::Operator(_) => match (slot.left, slot.right) {
                    (Some(left), Some(right)) => {
                        pending.extend([(right, depth + 1), (left, depth + 1)]);
                    }
                    _ => return Some(ParseErrorKind::MissingOperand),
                },
                Shape::Identifier { .. } => {}
            }
        }
        None
    }

    /// Render the tree with explicit grouping, `?` marking unfilled operands
    /// and a bare `(` marking a group that is still open.
    #[must_use]
    pub fn sketch(&self) -> String {
        let mut out = String::new();
        let mut pending = vec![Piece::Node(Some(self.root))];
        while let Some(piece) = pending.pop() {
            let idx = match piece {
                Piece::Text(text) => {
                    out.push_str(text);
                    continue;
                }
                Piece::Node(None) => {
                    out.push('?');
                    continue;
                }
                Piece::Node(Some(idx)) => idx,
            };
            let slot = self.slot(idx);
            match &slot.shape {
                Shape::Empty => out.push('?'),
                Shape::Identifier { name, plus } => {
                    out.push_str(name);
                    if *plus {
                        out.push('+');
                    }
                }
                Shape::Operator(op) => {
                    out.push('(');
                    pending.extend([
                        Piece::Text(")"),
                        Piece::Node(slot.right),
                        Piece::Text(" "),
                        Piece::Text(op.keyword()),
                        Piece::Text(" "),
                        Piece::Node(slot.left),
                    ]);
                }
                Shape::Group => {
                    out.push('(');
                    if let Some(left) = slot.left {
                        pending.push(Piece::Node(Some(left)));
                    }
                }
            }
        }
        out
    }
}

/// Pending output of [`Tree::sketch`], popped last-in first-out.
enum Piece {
    Node(Option<NodeIdx>),
    Text(&'static str),
}

/// What the next identifier may fill.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Expect {
    None,
    Left,
    Right,
}

/// Where a new operand lands relative to the cursor.
enum Placement {
    Cursor,
    Child(Side),
}

struct Builder<'t> {
    tree: Tree,
    cursor: NodeIdx,
    expect: Expect,
    previous: Option<&'t Token>,
}

impl<'t> Builder<'t> {
    fn new() -> Self {
        let tree = Tree::new();
        let cursor = tree.root();
        Self {
            tree,
            cursor,
            expect: Expect::None,
            previous: None,
        }
    }

    fn step(&mut self, token: &'t Token) -> Result<(), ParseErrorKind> {
        match token.kind {
            TokenKind::Identifier => self.identifier(&token.text),
            TokenKind::And => self.conjunction(Operator::And),
            TokenKind::Or => self.conjunction(Operator::Or),
            TokenKind::With => self.with(),
            TokenKind::Plus => self.plus(token),
            TokenKind::LParen => self.open_group(),
            TokenKind::RParen => self.close_group(),
        }
    }

    fn place(&mut self, placement: Placement, shape: Shape) {
        match placement {
            Placement::Cursor => self.tree.slot_mut(self.cursor).shape = shape,
            Placement::Child(side) => self.cursor = self.tree.attach(self.cursor, side, shape),
        }
    }

    fn identifier(&mut self, name: &str) -> Result<(), ParseErrorKind> {
        let slot = self.tree.slot(self.cursor);
        let placement = match (self.expect, &slot.shape) {
            (_, Shape::Empty) => Placement::Cursor,
            (Expect::Left, Shape::Group) if slot.left.is_none() => Placement::Child(Side::Left),
            (Expect::Right, Shape::Operator(_)) if slot.right.is_none() => {
                Placement::Child(Side::Right)
            }
            _ => return Err(ParseErrorKind::UnexpectedIdentifier),
        };
        self.place(
            placement,
            Shape::Identifier {
                name: name.to_owned(),
                plus: false,
            },
        );
        self.expect = Expect::None;
        Ok(())
    }

    fn cursor_is_complete(&self) -> bool {
        self.expect == Expect::None
            && matches!(
                self.tree.slot(self.cursor).shape,
                Shape::Identifier { .. } | Shape::Operator(_)
            )
    }

    fn is_exception(&self, idx: NodeIdx) -> bool {
        self.tree.slot(idx).parent.is_some_and(|parent| {
            let slot = self.tree.slot(parent);
            slot.shape == Shape::Operator(Operator::With) && slot.right == Some(idx)
        })
    }

    fn conjunction(&mut self, op: Operator) -> Result<(), ParseErrorKind> {
        if !self.cursor_is_complete() {
            return Err(ParseErrorKind::DanglingOperator);
        }
        // WITH binds tighter than AND, which binds tighter than OR; equal
        // precedence climbs too, giving left associativity.
        let mut target = self.cursor;
        while let Some(parent) = self.tree.slot(target).parent {
            let climb = match self.tree.slot(parent).shape {
                Shape::Operator(Operator::And | Operator::With) => true,
                Shape::Operator(Operator::Or) => op == Operator::Or,
                _ => false,
            };
            if !climb {
                break;
            }
            target = parent;
        }
        self.cursor = self.tree.insert_above(target, Shape::Operator(op));
        self.expect = Expect::Right;
        Ok(())
    }

    fn with(&mut self) -> Result<(), ParseErrorKind> {
        let is_license = self.expect == Expect::None
            && matches!(self.tree.slot(self.cursor).shape, Shape::Identifier { .. })
            && !self.is_exception(self.cursor);
        if !is_license {
            return Err(ParseErrorKind::MisplacedWith);
        }
        self.cursor = self
            .tree
            .insert_above(self.cursor, Shape::Operator(Operator::With));
        self.expect = Expect::Right;
        Ok(())
    }

    fn plus(&mut self, token: &Token) -> Result<(), ParseErrorKind> {
        let attached = self
            .previous
            .is_some_and(|prev| prev.kind == TokenKind::Identifier && prev.end() == token.offset);
        if !attached {
            return Err(ParseErrorKind::DetachedPlus);
        }
        if self.expect != Expect::None || self.is_exception(self.cursor) {
            return Err(ParseErrorKind::MisplacedPlus);
        }
        match &mut self.tree.slot_mut(self.cursor).shape {
            Shape::Identifier { plus, .. } if !*plus => {
                *plus = true;
                Ok(())
            }
            _ => Err(ParseErrorKind::MisplacedPlus),
        }
    }

    fn open_group(&mut self) -> Result<(), ParseErrorKind> {
        let slot = self.tree.slot(self.cursor);
        let placement = match (self.expect, &slot.shape) {
            (_, Shape::Empty) => Placement::Cursor,
            (Expect::Left, Shape::Group) if slot.left.is_none() => Placement::Child(Side::Left),
            (Expect::Right, Shape::Operator(Operator::And | Operator::Or))
                if slot.right.is_none() =>
            {
                Placement::Child(Side::Right)
            }
            _ => return Err(ParseErrorKind::MisplacedOpenParen),
        };
        self.place(placement, Shape::Group);
        self.expect = Expect::Left;
        Ok(())
    }

    fn close_group(&mut self) -> Result<(), ParseErrorKind> {
        if self.tree.slot(self.cursor).shape == Shape::Group {
            return Err(ParseErrorKind::EmptyGroup);
        }
        if !self.cursor_is_complete() {
            return Err(ParseErrorKind::DanglingOperator);
        }
        let group = self
            .tree
            .enclosing_group(self.cursor)
            .ok_or(ParseErrorKind::UnmatchedCloseParen)?;
        let slot = self.tree.slot(group);
        let (parent, inner) = (slot.parent, slot.left.ok_or(ParseErrorKind::EmptyGroup)?);
        self.tree.relink(parent, group, inner);
        self.tree.retire(group);
        self.cursor = inner;
        self.expect = Expect::None;
        Ok(())
    }

    fn error(&self, kind: ParseErrorKind, token: Option<&Token>, index: usize) -> ParseError {
        ParseError {
            kind,
            token: token.cloned(),
            index,
            partial: self.tree.sketch(),
        }
    }

    fn finish(self, token_count: usize) -> Result<Tree, ParseError> {
        match self.tree.first_defect() {
            Some(kind) => Err(self.error(kind, None, token_count)),
            None => Ok(self.tree),
        }
    }
}

/// Build an expression tree from a token stream.
///
/// # Errors
/// Returns [`ParseError`] at the first token that violates the grammar, or
/// when the input ends with an empty or incomplete tree.
///
/// # Examples
/// ```
/// use peridot_expr::{parse, tokenize};
///
/// let tokens = tokenize("A AND B AND C").unwrap_or_default();
/// let tree = parse(&tokens).map(|t| t.sketch()).unwrap_or_default();
/// assert_eq!(tree, "((A AND B) AND C)");
/// ```
pub fn parse(tokens: &[Token]) -> Result<Tree, ParseError> {
    let mut builder = Builder::new();
    for (index, token) in tokens.iter().enumerate() {
        if let Err(kind) = builder.step(token) {
            return Err(builder.error(kind, Some(token), index));
        }
        builder.previous = Some(token);
    }
    builder.finish(tokens.len())
}

#[cfg(test)]
#[expect(clippy::unwrap_used, reason = "tests exercise parsing fallibility")]
mod tests {
    use rstest::rstest;

    use super::*;
    use crate::lexer::tokenize;

    fn sketch(expression: &str) -> String {
        parse(&tokenize(expression).unwrap()).unwrap().sketch()
    }

    fn failure(expression: &str) -> ParseError {
        parse(&tokenize(expression).unwrap()).unwrap_err()
    }

    #[rstest]
    #[case("MIT", "MIT")]
    #[case("MIT+", "MIT+")]
    #[case("A AND B AND C", "((A AND B) AND C)")]
    #[case("A OR B OR C", "((A OR B) OR C)")]
    #[case("A OR B AND C", "(A OR (B AND C))")]
    #[case("A AND B OR C", "((A AND B) OR C)")]
    #[case("A OR B AND C OR D", "((A OR (B AND C)) OR D)")]
    #[case("A AND (B OR C)", "(A AND (B OR C))")]
    #[case("(A OR B) AND C", "((A OR B) AND C)")]
    #[case("((MIT))", "MIT")]
    #[case("A WITH E AND B", "((A WITH E) AND B)")]
    #[case("A OR B+ WITH E", "(A OR (B+ WITH E))")]
    #[case("A AND B WITH E OR C", "((A AND (B WITH E)) OR C)")]
    #[case("A OR (B) AND C", "(A OR (B AND C))")]
    fn builds_expected_shape(#[case] expression: &str, #[case] expected: &str) {
        assert_eq!(sketch(expression), expected);
    }

    #[rstest]
    #[case("AND MIT", ParseErrorKind::DanglingOperator, Some(0))]
    #[case("MIT OR", ParseErrorKind::MissingOperand, None)]
    #[case("(MIT", ParseErrorKind::UnclosedParen, None)]
    #[case("MIT + ", ParseErrorKind::DetachedPlus, Some(1))]
    #[case("MIT++", ParseErrorKind::DetachedPlus, Some(2))]
    #[case("", ParseErrorKind::EmptyExpression, None)]
    #[case("()", ParseErrorKind::EmptyGroup, Some(1))]
    #[case("MIT)", ParseErrorKind::UnmatchedCloseParen, Some(1))]
    #[case("MIT Zlib", ParseErrorKind::UnexpectedIdentifier, Some(1))]
    #[case("MIT (Zlib)", ParseErrorKind::MisplacedOpenParen, Some(1))]
    #[case("(MIT AND) OR X11", ParseErrorKind::DanglingOperator, Some(3))]
    #[case("(MIT OR X11) WITH E", ParseErrorKind::MisplacedWith, Some(5))]
    #[case("A WITH B WITH C", ParseErrorKind::MisplacedWith, Some(3))]
    #[case("A WITH (B)", ParseErrorKind::MisplacedOpenParen, Some(2))]
    #[case("A WITH B+", ParseErrorKind::MisplacedPlus, Some(3))]
    #[case("(A)+", ParseErrorKind::DetachedPlus, Some(3))]
    #[case("+", ParseErrorKind::DetachedPlus, Some(0))]
    fn rejects_malformed_input(
        #[case] expression: &str,
        #[case] kind: ParseErrorKind,
        #[case] index: Option<usize>,
    ) {
        let err = failure(expression);
        assert_eq!(err.kind, kind);
        match index {
            Some(index) => {
                assert_eq!(err.index, index);
                assert!(err.token.is_some());
            }
            None => assert!(err.token.is_none()),
        }
    }

    fn and_chain(operators: usize) -> String {
        let mut expression = String::from("MIT");
        for _ in 0..operators {
            expression.push_str(" AND MIT");
        }
        expression
    }

    #[test]
    fn accepts_trees_at_the_depth_limit() {
        let tree = parse(&tokenize(&and_chain(MAX_DEPTH - 1)).unwrap()).unwrap();
        assert!(tree.sketch().starts_with(&"(".repeat(MAX_DEPTH - 1)));
    }

    #[test]
    fn rejects_trees_past_the_depth_limit() {
        let err = failure(&and_chain(MAX_DEPTH));
        assert_eq!(err.kind, ParseErrorKind::TooDeep);
        assert!(err.token.is_none());
        assert!(err.partial.ends_with("AND MIT)"));
    }

    #[test]
    fn closed_parentheses_do_not_count_towards_depth() {
        let depth = MAX_DEPTH * 4;
        let expression = format!("{}MIT{}", "(".repeat(depth), ")".repeat(depth));
        assert_eq!(sketch(&expression), "MIT");
    }

    #[test]
    fn error_carries_partial_tree() {
        let err = failure("MIT AND (Zlib OR");
        assert_eq!(err.kind, ParseErrorKind::UnclosedParen);
        assert_eq!(err.partial, "(MIT AND ((Zlib OR ?))");
    }

    #[test]
    fn splices_group_out_of_arena_links() {
        let tree = parse(&tokenize("(MIT)").unwrap()).unwrap();
        let root = tree.slot(tree.root());
        assert_eq!(root.parent, None);
        assert_eq!(
            root.shape,
            Shape::Identifier {
                name: "MIT".into(),
                plus: false
            }
        );
    }
}
