use crate::builder::NodeBuilder;
use crate::cst::{Field, Node, NodeKind, TextRange, TokenKind};

use super::primary::{starts_argument_item, starts_expression};
use super::statements::BODY_STOPS;
use super::Parser;

const IF_STOPS: &[&str] = &["end", "elsif", "else"];
const WHEN_STOPS: &[&str] = &["end", "when", "else"];
const ELSE_STOPS: &[&str] = &["end", "ensure"];
const END_STOPS: &[&str] = &["end"];

impl Parser<'_> {
    /// `if` and `unless`; `elsif` chains hang off `alternative`.
    pub(super) fn parse_if(&mut self, kind: NodeKind) -> Node {
        let mut node = NodeBuilder::node(kind, self.last_end);
        let opener = self.bump(&mut node, None);
        let keyword = if kind == NodeKind::If { "if" } else { "unless" };
        let condition = self.parse_expression();
        node.push_node(Some(Field::Condition), condition);
        self.parse_then(&mut node, Field::Consequence, IF_STOPS);
        if let Some(alternative) = self.parse_alternative() {
            node.push_node(Some(Field::Alternative), alternative);
        }
        self.expect_end(&mut node, opener, keyword);
        node.finish()
    }

    fn parse_alternative(&mut self) -> Option<Node> {
        if self.peek_keyword("elsif") {
            return Some(self.nested(Self::parse_elsif));
        }
        if self.peek_keyword("else") {
            return Some(self.parse_else(END_STOPS));
        }
        None
    }

    fn parse_elsif(&mut self) -> Node {
        let mut elsif = NodeBuilder::node(NodeKind::Elsif, self.last_end);
        self.bump(&mut elsif, None);
        let condition = self.parse_expression();
        elsif.push_node(Some(Field::Condition), condition);
        self.parse_then(&mut elsif, Field::Consequence, IF_STOPS);
        if let Some(alternative) = self.parse_alternative() {
            elsif.push_node(Some(Field::Alternative), alternative);
        }
        elsif.finish()
    }

    /// Terminators after a condition stay in the parent; the `then` node starts
    /// at the `then` keyword or the first statement and is omitted when empty.
    fn parse_then(&mut self, builder: &mut NodeBuilder, field: Field, stops: &[&str]) {
        while self.at_terminator() {
            self.bump(builder, None);
        }
        let mut then = NodeBuilder::node(NodeKind::Then, self.last_end);
        if self.peek_keyword("then") {
            self.bump(&mut then, None);
        }
        self.parse_statements(&mut then, stops);
        if !then.is_empty() {
            builder.push_node(Some(field), then.finish());
        }
    }

    fn parse_else(&mut self, stops: &[&str]) -> Node {
        let mut node = NodeBuilder::node(NodeKind::Else, self.last_end);
        self.bump(&mut node, None);
        self.parse_statements(&mut node, stops);
        node.finish()
    }

    pub(super) fn expect_end(&mut self, builder: &mut NodeBuilder, opener: TextRange, keyword: &str) {
        if self.peek_keyword("end") {
            self.bump(builder, None);
            return;
        }
        let found = self.describe_next();
        let range = self.peek_range();
        self.emit_diag(
            "E1500",
            format!("expected `end` to close `{keyword}`, found {found}"),
            range,
            Some(("opened here", opener)),
        );
        builder.push_node(None, self.error_node());
    }

    /// Swallows the `;` that may close a definition or loop header.
    pub(super) fn parse_header_end(&mut self, builder: &mut NodeBuilder) {
        if self.peek_symbol(";") {
            self.bump(builder, None);
        }
    }

    pub(super) fn parse_loop(&mut self, kind: NodeKind) -> Node {
        let mut node = NodeBuilder::node(kind, self.last_end);
        let opener = self.bump(&mut node, None);
        let keyword = if kind == NodeKind::While { "while" } else { "until" };
        let condition = self.with_no_do(true, Self::parse_expression);
        node.push_node(Some(Field::Condition), condition);
        self.parse_loop_body(&mut node, opener, keyword);
        node.finish()
    }

    fn parse_loop_body(&mut self, builder: &mut NodeBuilder, opener: TextRange, keyword: &str) {
        if self.peek_keyword("do") {
            self.bump(builder, None);
        } else {
            self.parse_header_end(builder);
        }
        self.with_no_do(false, |parser| parser.parse_statements(builder, END_STOPS));
        self.expect_end(builder, opener, keyword);
    }

    pub(super) fn parse_for(&mut self) -> Node {
        let mut node = NodeBuilder::node(NodeKind::For, self.last_end);
        let opener = self.bump(&mut node, None);
        let pattern = self.parse_mlhs(None, false);
        node.push_node(Some(Field::Pattern), pattern);
        let mut source = NodeBuilder::node(NodeKind::In, self.last_end);
        if self.expect_keyword(&mut source, "in", Some(("loop starts here", opener))) {
            let value = self.with_no_do(true, Self::parse_expression);
            source.push_node(None, value);
        }
        node.push_node(Some(Field::Value), source.finish());
        self.parse_loop_body(&mut node, opener, "for");
        node.finish()
    }

    pub(super) fn parse_case(&mut self) -> Node {
        let mut node = NodeBuilder::node(NodeKind::Case, self.last_end);
        let opener = self.bump(&mut node, None);
        if !self.at_terminator() && !self.peek_keyword("when") {
            let value = self.parse_expression();
            node.push_node(Some(Field::Value), value);
        }
        while self.at_terminator() {
            self.bump(&mut node, None);
        }
        if !self.peek_keyword("when") {
            let found = self.describe_next();
            let range = self.peek_range();
            self.emit_diag(
                "E1500",
                format!("expected `when`, found {found}"),
                range,
                Some(("case starts here", opener)),
            );
        }
        while self.peek_keyword("when") {
            let clause = self.nested(Self::parse_when);
            node.push_node(None, clause);
        }
        if self.peek_keyword("else") {
            let alternative = self.parse_else(END_STOPS);
            node.push_node(None, alternative);
        }
        self.expect_end(&mut node, opener, "case");
        node.finish()
    }

    fn parse_when(&mut self) -> Node {
        let mut clause = NodeBuilder::node(NodeKind::When, self.last_end);
        self.bump(&mut clause, None);
        loop {
            let mut pattern = NodeBuilder::node(NodeKind::Pattern, self.last_end);
            let value = if self.peek_kind() == TokenKind::SplatStar {
                self.parse_splat_argument()
            } else if starts_expression(self.peek()) {
                self.parse_binary(0, false)
            } else {
                let found = self.describe_next();
                self.missing("E1502", format!("expected a `when` pattern, found {found}"))
            };
            pattern.push_node(None, value);
            clause.push_node(Some(Field::Pattern), pattern.finish());
            if !self.peek_symbol(",") {
                break;
            }
            self.bump(&mut clause, None);
        }
        self.parse_then(&mut clause, Field::Body, WHEN_STOPS);
        clause.finish()
    }

    pub(super) fn parse_begin(&mut self) -> Node {
        let mut node = NodeBuilder::node(NodeKind::Begin, self.last_end);
        let opener = self.bump(&mut node, None);
        self.parse_header_end(&mut node);
        self.with_no_do(false, |parser| parser.parse_body_statement(&mut node, opener, "begin"));
        node.finish()
    }

    /// Statements, then `rescue` clauses, `else` and `ensure`, then `end`.
    pub(super) fn parse_body_statement(
        &mut self,
        builder: &mut NodeBuilder,
        opener: TextRange,
        keyword: &str,
    ) {
        self.parse_statements(builder, BODY_STOPS);
        while self.peek_keyword("rescue") {
            let clause = self.nested(Self::parse_rescue);
            builder.push_node(None, clause);
        }
        if self.peek_keyword("else") {
            let alternative = self.parse_else(ELSE_STOPS);
            builder.push_node(None, alternative);
        }
        if self.peek_keyword("ensure") {
            let mut ensure = NodeBuilder::node(NodeKind::Ensure, self.last_end);
            self.bump(&mut ensure, None);
            self.parse_statements(&mut ensure, END_STOPS);
            builder.push_node(None, ensure.finish());
        }
        self.expect_end(builder, opener, keyword);
    }

    fn parse_rescue(&mut self) -> Node {
        let mut clause = NodeBuilder::node(NodeKind::Rescue, self.last_end);
        self.bump(&mut clause, None);
        if starts_argument_item(self.peek()) && !self.peek_keyword("then") {
            let mut exceptions = NodeBuilder::node(NodeKind::Exceptions, self.last_end);
            loop {
                let exception = if self.peek_kind() == TokenKind::SplatStar {
                    self.parse_splat_argument()
                } else {
                    self.parse_binary(0, false)
                };
                exceptions.push_node(None, exception);
                if !self.peek_symbol(",") {
                    break;
                }
                self.bump(&mut exceptions, None);
            }
            clause.push_node(Some(Field::Exceptions), exceptions.finish());
        }
        if self.peek_symbol("=>") {
            let mut variable = NodeBuilder::node(NodeKind::ExceptionVariable, self.last_end);
            self.bump(&mut variable, None);
            let target = if starts_expression(self.peek()) {
                self.parse_primary_postfix(false)
            } else {
                let found = self.describe_next();
                self.missing("E1502", format!("expected a variable after `=>`, found {found}"))
            };
            variable.push_node(None, target);
            clause.push_node(Some(Field::Variable), variable.finish());
        }
        self.parse_then(&mut clause, Field::Body, BODY_STOPS);
        clause.finish()
    }
}
