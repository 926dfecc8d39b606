use crate::builder::{NodeBuilder, Production};
use crate::cst::{Element, Node, NodeKind, TextRange, Token, TokenKind};

use super::{token_node, Parser};

impl Parser<'_> {
    /// A string literal, or several adjacent ones as a `chained_string`.
    pub(super) fn parse_string(&mut self) -> Node {
        let first = self.parse_literal(NodeKind::String);
        if self.peek_kind() != TokenKind::StringStart {
            return first;
        }
        let mut chain =
            NodeBuilder::wrapping(Production::Node(NodeKind::ChainedString), None, first);
        while self.peek_kind() == TokenKind::StringStart {
            let next = self.parse_literal(NodeKind::String);
            chain.push_node(None, next);
        }
        chain.finish()
    }

    /// Opener, content pieces and closer of one delimited literal.
    pub(super) fn parse_literal(&mut self, kind: NodeKind) -> Node {
        let mut literal = NodeBuilder::node(kind, self.last_end);
        self.bump(&mut literal, None);
        loop {
            match self.peek_kind() {
                TokenKind::StringContent => {
                    self.bump(&mut literal, None);
                }
                TokenKind::EscapeSequence => {
                    let escape = self.leaf(NodeKind::EscapeSequence);
                    literal.push_node(None, escape);
                }
                TokenKind::Error => {
                    let error = self.leaf(NodeKind::Error);
                    literal.push_node(None, error);
                }
                TokenKind::InterpolationStart => {
                    let interpolation = self.parse_interpolation();
                    literal.push_node(None, interpolation);
                }
                TokenKind::StringEnd => {
                    self.bump(&mut literal, None);
                    break;
                }
                _ => {
                    // Unterminated; the lexer has reported it.
                    literal.push_node(None, self.error_node());
                    break;
                }
            }
        }
        literal.finish()
    }

    /// `%w[...]` and `%i[...]`: whitespace-separated runs become one element each.
    pub(super) fn parse_word_array(&mut self, kind: NodeKind, element_kind: NodeKind) -> Node {
        let mut array = NodeBuilder::node(kind, self.last_end);
        self.bump(&mut array, None);
        let mut element: Option<NodeBuilder> = None;
        loop {
            let piece = matches!(
                self.peek_kind(),
                TokenKind::StringContent
                    | TokenKind::EscapeSequence
                    | TokenKind::Error
                    | TokenKind::InterpolationStart
            );
            if !piece || !self.adjacent() {
                if let Some(done) = element.take() {
                    array.push_node(None, done.finish());
                }
            }
            if !piece {
                break;
            }
            let current =
                element.get_or_insert_with(|| NodeBuilder::node(element_kind, self.last_end));
            match self.peek_kind() {
                TokenKind::StringContent => {
                    self.bump(current, None);
                }
                TokenKind::EscapeSequence => {
                    let escape = self.leaf(NodeKind::EscapeSequence);
                    current.push_node(None, escape);
                }
                TokenKind::Error => {
                    let error = self.leaf(NodeKind::Error);
                    current.push_node(None, error);
                }
                _ => {
                    let interpolation = self.parse_interpolation();
                    current.push_node(None, interpolation);
                }
            }
        }
        if self.peek_kind() == TokenKind::StringEnd {
            self.bump(&mut array, None);
        } else {
            array.push_node(None, self.error_node());
        }
        array.finish()
    }

    fn parse_interpolation(&mut self) -> Node {
        let mut interpolation = NodeBuilder::node(NodeKind::Interpolation, self.last_end);
        self.bump(&mut interpolation, None);
        self.finish_interpolation(&mut interpolation);
        interpolation.finish()
    }

    /// Statements of `#{...}` after the opener, then the closing brace.
    fn finish_interpolation(&mut self, interpolation: &mut NodeBuilder) {
        let open = self.last_end.saturating_sub(2);
        self.with_no_do(false, |parser| parser.parse_statements(interpolation, &["}"]));
        if self.peek_kind() == TokenKind::InterpolationEnd {
            self.bump(interpolation, None);
            return;
        }
        let found = self.describe_next();
        let range = self.peek_range();
        self.emit_diag(
            "E1501",
            format!("expected `}}` to close interpolation, found {found}"),
            range,
            Some((
                "interpolation starts here",
                TextRange::new(open, open + 2),
            )),
        );
        interpolation.push_node(None, self.error_node());
    }

    /// Body of one heredoc, read straight from the lexer. Called while filling
    /// the lookahead, so the surrounding trivia and position are put back after.
    pub(super) fn parse_heredoc_body(&mut self, start: Token) -> Node {
        let saved_pending = std::mem::take(&mut self.pending);
        let saved_end = self.last_end;
        let mut body = NodeBuilder::node(NodeKind::HeredocBody, start.range.start);
        self.last_end = start.range.end;
        body.push_token(None, start);
        loop {
            let token = match self.lookahead.take().or_else(|| self.pushback.take()) {
                Some(token) => token,
                None => self.lexer.next_token(),
            };
            self.flush_pending(&mut body);
            match token.kind {
                TokenKind::HeredocContent => {
                    self.last_end = token.range.end;
                    body.push_token(None, token);
                }
                TokenKind::EscapeSequence | TokenKind::Error => {
                    self.last_end = token.range.end;
                    let kind = if token.kind == TokenKind::Error {
                        NodeKind::Error
                    } else {
                        NodeKind::EscapeSequence
                    };
                    body.push_node(None, token_node(kind, token));
                }
                TokenKind::InterpolationStart => {
                    let mut interpolation =
                        NodeBuilder::node(NodeKind::Interpolation, token.range.start);
                    self.last_end = token.range.end;
                    interpolation.push_token(None, token);
                    self.finish_interpolation(&mut interpolation);
                    body.push_node(None, interpolation.finish());
                }
                TokenKind::HeredocEnd => {
                    self.last_end = token.range.end;
                    body.push_node(None, token_node(NodeKind::HeredocEnd, token));
                    break;
                }
                // A body opened inside one of this body's interpolations.
                TokenKind::HeredocBodyStart => {
                    let nested = self.nested(|parser| parser.parse_heredoc_body(token));
                    body.push_node(None, nested);
                }
                kind if kind.is_trivia() => self.pending.push(Element::Token(token)),
                _ => {
                    self.pushback = Some(token);
                    body.push_node(None, self.error_node());
                    break;
                }
            }
        }
        self.flush_pending(&mut body);
        self.pending = saved_pending;
        self.last_end = saved_end;
        self.trace(|| "heredoc body parsed".to_string());
        body.finish()
    }
}

#[cfg(test)]
mod tests {
    use crate::cst::{Element, Field, NodeKind, TokenKind};
    use crate::parse;

    fn sexp(source: &str) -> String {
        parse(source).expect("parse").to_sexp()
    }

    #[test]
    fn interpolation_holds_statements() {
        assert_eq!(
            sexp("\"a#{b + 1}c\\n\""),
            "(program (string (interpolation (binary left: (identifier) right: (integer))) (escape_sequence)))"
        );
    }

    #[test]
    fn adjacent_strings_chain() {
        assert_eq!(
            sexp("x = \"a\" 'b'"),
            "(program (assignment left: (identifier) right: (chained_string (string) (string))))"
        );
    }

    #[test]
    fn word_arrays_split_on_whitespace() {
        let tree = parse("%w[one two\\ three]").expect("parse");
        let array = tree.root.find_first(NodeKind::StringArray).expect("array");
        let words: Vec<String> = array.named_children().map(|word| word.text()).collect();
        assert_eq!(words, vec!["one", "two\\ three"]);
    }

    #[test]
    fn symbol_forms() {
        assert_eq!(
            sexp(":plain; :\"dyn#{x}\"; :<=>; %i[a b]"),
            "(program (symbol) (symbol (interpolation (identifier))) (symbol) (symbol_array (bare_symbol) (bare_symbol)))"
        );
    }

    #[test]
    fn regex_after_command_name() {
        let tree = parse("split /,\\s*/").expect("parse");
        assert!(!tree.has_errors());
        let call = tree.root.find_first(NodeKind::MethodCall).expect("command");
        assert!(call.find_first(NodeKind::Regex).is_some());
    }

    #[test]
    fn squiggly_heredoc_with_interpolation() {
        let source = "text = <<~EOS\n  sum #{1+1}\nEOS\nputs text\n";
        let tree = parse(source).expect("parse");
        assert_eq!(tree.text(), source);
        assert!(!tree.has_errors(), "{:?}", tree.diagnostics);
        let body = tree.root.find_first(NodeKind::HeredocBody).expect("body");
        let interpolation = body.find_first(NodeKind::Interpolation).expect("interpolation");
        let statement = interpolation.named_children().next().expect("statement");
        assert_eq!(statement.kind, NodeKind::Binary);
        assert_eq!(
            body.find_first(NodeKind::HeredocEnd).map(|end| end.text()),
            Some("EOS".to_string())
        );
        let assignment = tree.root.find_first(NodeKind::Assignment).expect("assignment");
        assert_eq!(
            assignment.child_by_field(Field::Right).map(|node| node.kind),
            Some(NodeKind::HeredocBeginning)
        );
        assert_eq!(tree.root.find_all(NodeKind::MethodCall).len(), 1);
    }

    #[test]
    fn two_heredocs_on_one_line() {
        let source = "call(<<A, <<B)\nfirst\nA\nsecond\nB\ndone\n";
        let tree = parse(source).expect("parse");
        assert_eq!(tree.text(), source);
        assert!(!tree.has_errors(), "{:?}", tree.diagnostics);
        assert_eq!(tree.root.find_all(NodeKind::HeredocBody).len(), 2);
    }

    #[test]
    fn heredoc_opened_inside_a_heredoc_interpolation() {
        let source = "x = <<~A\n  #{<<~B}\n  inner\n  B\n  outer\nA\nputs x\n";
        let tree = parse(source).expect("parse");
        assert_eq!(tree.text(), source);
        assert!(!tree.has_errors(), "{:?}", tree.diagnostics);
        let ends: Vec<String> = tree
            .root
            .find_all(NodeKind::HeredocEnd)
            .into_iter()
            .map(|end| end.text())
            .collect();
        assert_eq!(ends, vec!["  B".to_string(), "A".to_string()]);
        assert_eq!(tree.root.find_all(NodeKind::HeredocBody).len(), 2);
        assert_eq!(tree.root.find_all(NodeKind::MethodCall).len(), 1);
    }

    #[test]
    fn unterminated_string_keeps_its_text() {
        let source = "x = \"open";
        let tree = parse(source).expect("parse");
        assert_eq!(tree.text(), source);
        assert!(tree.has_errors());
        assert!(tree.diagnostics.iter().any(|diag| diag.code == "E1001"));
        let string = tree.root.find_first(NodeKind::String).expect("string");
        let content: Vec<&str> = string
            .children
            .iter()
            .filter_map(Element::as_token)
            .filter(|token| token.kind == TokenKind::StringContent)
            .map(|token| token.text.as_str())
            .collect();
        assert_eq!(content, vec!["open"]);
    }
}
