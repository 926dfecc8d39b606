use crate::cst::{Element, Field, Node, NodeKind, TextRange, Token};

/// What the parser recognized. Several productions share a node kind in the
/// finished tree; the grammar keeps them apart only while parsing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Production {
    Node(NodeKind),
    CommandCall,
    CommandArgumentList,
    CommandBinary,
    CommandAssignment,
    CommandOperatorAssignment,
    ReturnCommand,
    YieldCommand,
    BreakCommand,
    NextCommand,
    ParenthesizedUnary,
    IdentifierHashKey,
    KeywordParameterName,
}

pub const ALIASES: &[(Production, NodeKind)] = &[
    (Production::CommandCall, NodeKind::MethodCall),
    (Production::CommandArgumentList, NodeKind::ArgumentList),
    (Production::CommandBinary, NodeKind::Binary),
    (Production::CommandAssignment, NodeKind::Assignment),
    (
        Production::CommandOperatorAssignment,
        NodeKind::OperatorAssignment,
    ),
    (Production::ReturnCommand, NodeKind::Return),
    (Production::YieldCommand, NodeKind::Yield),
    (Production::BreakCommand, NodeKind::Break),
    (Production::NextCommand, NodeKind::Next),
    (Production::ParenthesizedUnary, NodeKind::Unary),
    (Production::IdentifierHashKey, NodeKind::Symbol),
    (Production::KeywordParameterName, NodeKind::Identifier),
];

impl Production {
    pub fn canonical_kind(self) -> NodeKind {
        if let Production::Node(kind) = self {
            return kind;
        }
        ALIASES
            .iter()
            .find(|(production, _)| *production == self)
            .map(|(_, kind)| *kind)
            .unwrap_or(NodeKind::Error)
    }
}

/// Accumulates the children of one node. Leading trivia of a pushed child is
/// lifted into this builder so that it sits between siblings.
#[derive(Debug)]
pub struct NodeBuilder {
    production: Production,
    offset: usize,
    children: Vec<Element>,
    fields: Vec<(Field, usize)>,
}

impl NodeBuilder {
    pub fn new(production: Production, offset: usize) -> Self {
        Self {
            production,
            offset,
            children: Vec::new(),
            fields: Vec::new(),
        }
    }

    pub fn node(kind: NodeKind, offset: usize) -> Self {
        Self::new(Production::Node(kind), offset)
    }

    /// Continues a finished node, e.g. to attach a block to a call.
    pub fn reopen(node: Node) -> Self {
        Self {
            production: Production::Node(node.kind),
            offset: node.range.start,
            children: node.children,
            fields: node.fields,
        }
    }

    /// Starts a node whose first child is an already parsed operand.
    pub fn wrapping(production: Production, field: Option<Field>, first: Node) -> Self {
        let mut builder = Self::new(production, first.range.start);
        builder.push_node(field, first);
        builder
    }

    pub fn set_production(&mut self, production: Production) {
        self.production = production;
    }

    pub fn is_empty(&self) -> bool {
        self.children.iter().all(Element::is_extra)
    }

    pub fn push_extra(&mut self, element: Element) {
        self.children.push(element);
    }

    pub fn push_token(&mut self, field: Option<Field>, token: Token) {
        if let Some(field) = field {
            self.fields.push((field, self.children.len()));
        }
        self.children.push(Element::Token(token));
    }

    pub fn push_node(&mut self, field: Option<Field>, mut node: Node) {
        let leading = node
            .children
            .iter()
            .take_while(|child| child.is_extra())
            .count();
        if leading > 0 && leading < node.children.len() {
            let rest = node.children.split_off(leading);
            self.children.append(&mut node.children);
            node.children = rest;
            for (_, index) in &mut node.fields {
                *index -= leading;
            }
        }
        if let Some(field) = field {
            self.fields.push((field, self.children.len()));
        }
        self.children.push(Element::Node(node));
    }

    pub fn finish(self) -> Node {
        let range = self
            .children
            .iter()
            .filter(|child| !child.is_extra())
            .map(Element::range)
            .reduce(TextRange::cover)
            .unwrap_or_else(|| TextRange::empty(self.offset));
        Node {
            kind: self.production.canonical_kind(),
            range,
            children: self.children,
            fields: self.fields,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cst::TokenKind;

    fn token(kind: TokenKind, text: &str, start: usize) -> Token {
        Token {
            kind,
            text: text.to_string(),
            range: TextRange::new(start, start + text.len()),
        }
    }

    #[test]
    fn aliased_productions_finish_as_their_canonical_kind() {
        assert_eq!(
            Production::CommandCall.canonical_kind(),
            NodeKind::MethodCall
        );
        assert_eq!(
            Production::IdentifierHashKey.canonical_kind(),
            NodeKind::Symbol
        );
        assert_eq!(
            Production::Node(NodeKind::Hash).canonical_kind(),
            NodeKind::Hash
        );
        for (production, _) in ALIASES {
            assert_ne!(production.canonical_kind(), NodeKind::Error);
        }
    }

    #[test]
    fn leading_trivia_moves_to_the_parent() {
        let mut leaf = NodeBuilder::node(NodeKind::Identifier, 0);
        leaf.push_extra(Element::Token(token(TokenKind::Whitespace, "  ", 0)));
        leaf.push_token(None, token(TokenKind::Identifier, "a", 2));
        let leaf = leaf.finish();
        assert_eq!(leaf.range, TextRange::new(2, 3));

        let mut parent = NodeBuilder::node(NodeKind::Program, 0);
        parent.push_node(None, leaf);
        let program = parent.finish();
        assert_eq!(program.children.len(), 2);
        assert!(program.children[0].is_extra());
        assert_eq!(program.range, TextRange::new(2, 3));
        assert_eq!(program.text(), "  a");
    }

    #[test]
    fn field_indices_follow_hoisting() {
        let mut binary = NodeBuilder::node(NodeKind::Binary, 0);
        binary.push_extra(Element::Token(token(TokenKind::Whitespace, " ", 0)));
        binary.push_token(Some(Field::Operator), token(TokenKind::Punct, "+", 1));
        let mut parent = NodeBuilder::node(NodeKind::Program, 0);
        parent.push_node(None, binary.finish());
        let program = parent.finish();
        let node = program.children[1].as_node().expect("binary node");
        assert_eq!(node.fields, vec![(Field::Operator, 0)]);
        assert_eq!(
            node.field(Field::Operator)
                .and_then(Element::as_token)
                .map(|token| token.text.as_str()),
            Some("+")
        );
    }

    #[test]
    fn empty_builders_are_zero_width_at_their_offset() {
        let node = NodeBuilder::node(NodeKind::Error, 7).finish();
        assert_eq!(node.range, TextRange::new(7, 7));
        assert!(node.children.is_empty());
    }
}
