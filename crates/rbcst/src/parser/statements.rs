use crate::builder::{NodeBuilder, Production};
use crate::cst::{Field, Node, NodeKind, TextRange, Token, TokenKind};

use super::primary::starts_expression;
use super::Parser;

/// Keywords that end the statement list of a body statement.
pub(super) const BODY_STOPS: &[&str] = &["end", "rescue", "else", "ensure"];

impl Parser<'_> {
    pub(super) fn parse_program(&mut self) -> Node {
        let mut program = NodeBuilder::node(NodeKind::Program, 0);
        loop {
            self.parse_statements(&mut program, &[]);
            if !self.peek_keyword("__END__") {
                break;
            }
            self.bump(&mut program, None);
            if self.peek_kind() == TokenKind::LineBreak {
                self.bump(&mut program, None);
            }
            if self.peek_kind() == TokenKind::Uninterpreted {
                let data = self.leaf(NodeKind::Uninterpreted);
                program.push_node(None, data);
            }
        }
        self.fill();
        self.flush_pending(&mut program);
        let mut root = program.finish();
        root.range = TextRange::new(0, self.source.len());
        root
    }

    /// Statements separated by line breaks or `;`, up to one of `stops` or end of input.
    pub(super) fn parse_statements(&mut self, builder: &mut NodeBuilder, stops: &[&str]) {
        let mut after_statement = false;
        loop {
            let token = self.peek().clone();
            if token.kind == TokenKind::Eof
                || token.is_keyword("__END__")
                || is_stop(&token, stops)
            {
                break;
            }
            if token.kind == TokenKind::LineBreak {
                self.bump(builder, None);
                after_statement = false;
                continue;
            }
            if token.is_punct(";") {
                if after_statement {
                    self.bump(builder, None);
                } else {
                    let empty = self.leaf(NodeKind::EmptyStatement);
                    builder.push_node(None, empty);
                }
                after_statement = false;
                continue;
            }
            if after_statement {
                let found = self.describe_next();
                self.recover_statement(builder, stops, format!("unexpected {found} after statement"));
                continue;
            }
            if !starts_statement(&token) {
                let found = self.describe_next();
                self.recover_statement(builder, stops, format!("unexpected {found}"));
                continue;
            }
            let mark = self.consumed;
            let statement = self.parse_statement();
            builder.push_node(None, statement);
            if self.consumed == mark {
                let found = self.describe_next();
                self.recover_statement(builder, stops, format!("unexpected {found}"));
            }
            after_statement = true;
        }
    }

    /// Skips to the next terminator, stop keyword or unbalanced closer.
    fn recover_statement(&mut self, builder: &mut NodeBuilder, stops: &[&str], message: String) {
        let first = self.peek_range();
        let mut error = NodeBuilder::node(NodeKind::Error, self.last_end);
        let mut depth = 0usize;
        loop {
            let token = self.peek().clone();
            if token.kind == TokenKind::Eof {
                break;
            }
            let started = !error.is_empty();
            if depth == 0
                && started
                && (token.kind == TokenKind::LineBreak
                    || token.is_punct(";")
                    || is_stop(&token, stops))
            {
                break;
            }
            if opens_group(&token) {
                depth += 1;
            } else if closes_group(&token) {
                if depth == 0 && started {
                    break;
                }
                depth = depth.saturating_sub(1);
            }
            self.bump(&mut error, None);
        }
        let error = error.finish();
        self.trace(|| {
            format!(
                "recovered statement at {}..{}: {message}",
                error.range.start, error.range.end
            )
        });
        self.emit_diag("E1503", message, first, None);
        builder.push_node(None, error);
    }

    pub(super) fn parse_statement(&mut self) -> Node {
        self.nested(|parser| {
            let token = parser.peek().clone();
            let mut statement = if token.is_keyword("undef") {
                parser.parse_undef()
            } else if token.is_keyword("alias") {
                parser.parse_alias()
            } else if token.is_keyword("BEGIN") {
                parser.parse_boundary_block(NodeKind::BeginBlock)
            } else if token.is_keyword("END") {
                parser.parse_boundary_block(NodeKind::EndBlock)
            } else {
                parser.parse_expression_statement()
            };
            parser.chain(|parser| {
                while let Some((kind, field)) = modifier(parser.peek()) {
                    if !parser.deepen() {
                        break;
                    }
                    let mut wrapper =
                        NodeBuilder::wrapping(Production::Node(kind), Some(Field::Body), statement);
                    let keyword = parser.peek().text.clone();
                    parser.bump(&mut wrapper, None);
                    let operand = if starts_expression(parser.peek()) {
                        parser.parse_expression()
                    } else {
                        let found = parser.describe_next();
                        parser.missing("E1502", format!("expected an expression after `{keyword}`, found {found}"))
                    };
                    wrapper.push_node(Some(field), operand);
                    statement = wrapper.finish();
                }
                statement
            })
        })
    }

    fn parse_undef(&mut self) -> Node {
        let mut undef = NodeBuilder::node(NodeKind::Undef, self.last_end);
        self.bump(&mut undef, None);
        loop {
            let name = self.parse_method_name();
            undef.push_node(None, name);
            if !self.peek_symbol(",") {
                break;
            }
            self.bump(&mut undef, None);
        }
        undef.finish()
    }

    fn parse_alias(&mut self) -> Node {
        let mut alias = NodeBuilder::node(NodeKind::Alias, self.last_end);
        self.bump(&mut alias, None);
        let name = self.parse_method_name();
        alias.push_node(Some(Field::Name), name);
        let original = self.parse_method_name();
        alias.push_node(Some(Field::Alias), original);
        alias.finish()
    }

    /// `BEGIN { ... }` and `END { ... }`.
    fn parse_boundary_block(&mut self, kind: NodeKind) -> Node {
        let mut block = NodeBuilder::node(kind, self.last_end);
        let opener = self.bump(&mut block, None);
        if self.expect_symbol(&mut block, "{", Some(("block keyword here", opener))) {
            self.parse_statements(&mut block, &["}"]);
            self.expect_symbol(&mut block, "}", Some(("block opened here", opener)));
        }
        block.finish()
    }
}

fn modifier(token: &Token) -> Option<(NodeKind, Field)> {
    if token.kind != TokenKind::Keyword {
        return None;
    }
    match token.text.as_str() {
        "if" => Some((NodeKind::IfModifier, Field::Condition)),
        "unless" => Some((NodeKind::UnlessModifier, Field::Condition)),
        "while" => Some((NodeKind::WhileModifier, Field::Condition)),
        "until" => Some((NodeKind::UntilModifier, Field::Condition)),
        "rescue" => Some((NodeKind::RescueModifier, Field::Handler)),
        _ => None,
    }
}

pub(super) fn is_stop(token: &Token, stops: &[&str]) -> bool {
    matches!(
        token.kind,
        TokenKind::Keyword | TokenKind::Punct | TokenKind::InterpolationEnd
    ) && stops.contains(&token.text.as_str())
}

fn starts_statement(token: &Token) -> bool {
    starts_expression(token)
        || token.kind == TokenKind::SplatStar
        || ["undef", "alias", "BEGIN", "END"]
            .iter()
            .any(|keyword| token.is_keyword(keyword))
}

pub(super) fn opens_group(token: &Token) -> bool {
    token.kind == TokenKind::InterpolationStart
        || (token.kind == TokenKind::Punct && matches!(token.text.as_str(), "(" | "[" | "{"))
}

pub(super) fn closes_group(token: &Token) -> bool {
    token.kind == TokenKind::InterpolationEnd
        || (token.kind == TokenKind::Punct && matches!(token.text.as_str(), ")" | "]" | "}"))
}

#[cfg(test)]
mod tests {
    use crate::cst::NodeKind;
    use crate::parse;

    #[test]
    fn leading_semicolons_are_empty_statements() {
        let tree = parse(";;foo").expect("parse");
        assert_eq!(tree.root.find_all(NodeKind::EmptyStatement).len(), 2);
        assert!(!tree.has_errors());
    }

    #[test]
    fn unterminated_block_comment_marks_the_tree() {
        let source = "foo\n=begin\nabc\n";
        let tree = parse(source).expect("parse");
        assert_eq!(tree.text(), source);
        assert!(tree.has_errors());
        assert!(tree.root.find_first(NodeKind::Error).is_some());
        assert_eq!(tree.diagnostics.len(), 1);
        assert_eq!(tree.diagnostics[0].code, "E1004");
    }

    #[test]
    fn modifiers_wrap_left_to_right() {
        let tree = parse("foo if bar rescue baz").expect("parse");
        assert_eq!(
            tree.to_sexp(),
            "(program (rescue_modifier body: (if_modifier body: (identifier) condition: (identifier)) handler: (identifier)))"
        );
    }

    #[test]
    fn stray_closer_is_skipped_as_one_error() {
        let tree = parse("foo\nend\nbar").expect("parse");
        assert_eq!(tree.errors().len(), 1);
        assert_eq!(tree.root.find_all(NodeKind::Identifier).len(), 2);
        assert_eq!(tree.diagnostics[0].code, "E1503");
    }

    #[test]
    fn data_section_is_uninterpreted() {
        let source = "puts 1\n__END__\nnot ruby (\n";
        let tree = parse(source).expect("parse");
        assert_eq!(tree.text(), source);
        let data = tree.root.find_first(NodeKind::Uninterpreted).expect("data");
        assert_eq!(data.text(), "not ruby (\n");
        assert!(!tree.has_errors());
    }

    #[test]
    fn alias_and_undef() {
        let tree = parse("alias new_name old_name\nundef a, :b").expect("parse");
        assert_eq!(
            tree.to_sexp(),
            "(program (alias name: (identifier) alias: (identifier)) (undef (identifier) (symbol)))"
        );
    }

    #[test]
    fn begin_and_end_blocks() {
        let tree = parse("BEGIN { setup }\nEND { teardown }").expect("parse");
        assert_eq!(
            tree.to_sexp(),
            "(program (begin_block (identifier)) (end_block (identifier)))"
        );
    }
}
