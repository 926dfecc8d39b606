//! Recursive-descent parser over the on-demand lexer.
//!
//! Every token the lexer produces ends up in the tree: trivia and heredoc
//! bodies are buffered in `pending` and flushed into whichever node consumes
//! the next significant token. Syntax errors never abort the parse; they become
//! `error` nodes plus a diagnostic. Only exceeding the nesting limit is fatal.

mod calls;
mod control;
mod definitions;
mod expressions;
mod literals;
mod primary;
mod statements;

use crate::builder::NodeBuilder;
use crate::cst::{Element, Field, Node, NodeKind, SyntaxTree, TextRange, Token, TokenKind};
use crate::diagnostics::{Diagnostic, DiagnosticLabel, DiagnosticSeverity, LineIndex};
use crate::lexer::Lexer;
use crate::options::ParseOptions;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("nesting depth exceeds the limit of {max_depth}")]
    NestingTooDeep { max_depth: usize },
}

pub fn parse_source(source: &str, options: &ParseOptions) -> Result<SyntaxTree, ParseError> {
    let mut parser = Parser::new(source, options.clone());
    let root = parser.parse_program();
    if parser.fatal {
        if parser.options.trace {
            eprintln!(
                "[RBCST_TRACE_PARSE] aborted: nesting deeper than {}",
                parser.options.max_depth
            );
        }
        return Err(ParseError::NestingTooDeep {
            max_depth: parser.options.max_depth,
        });
    }
    let mut diagnostics = parser.lexer.take_diagnostics();
    diagnostics.append(&mut parser.diagnostics);
    diagnostics.sort_by_key(|diag| (diag.span.start.line, diag.span.start.column));
    Ok(SyntaxTree {
        source: source.to_string(),
        root,
        diagnostics,
    })
}

pub(crate) struct Parser<'src> {
    source: &'src str,
    lexer: Lexer<'src>,
    lookahead: Option<Token>,
    pushback: Option<Token>,
    pending: Vec<Element>,
    last_end: usize,
    consumed: usize,
    diagnostics: Vec<Diagnostic>,
    line_index: LineIndex,
    depth: usize,
    options: ParseOptions,
    fatal: bool,
    /// Set while parsing a loop condition or command arguments: `do` belongs to the outer construct.
    no_do: bool,
    /// Whether the next operand starts a statement, where `a = 1, 2` is allowed.
    rhs_list_allowed: bool,
    last_command: Option<TextRange>,
}

impl<'src> Parser<'src> {
    fn new(source: &'src str, options: ParseOptions) -> Self {
        Self {
            source,
            lexer: Lexer::new(source),
            lookahead: None,
            pushback: None,
            pending: Vec::new(),
            last_end: 0,
            consumed: 0,
            diagnostics: Vec::new(),
            line_index: LineIndex::new(source),
            depth: 0,
            options,
            fatal: false,
            no_do: false,
            rhs_list_allowed: false,
            last_command: None,
        }
    }

    fn fill(&mut self) {
        while self.lookahead.is_none() {
            if self.fatal {
                self.lookahead = Some(eof_token(self.last_end));
                return;
            }
            let token = match self.pushback.take() {
                Some(token) => token,
                None => self.lexer.next_token(),
            };
            match token.kind {
                kind if kind.is_trivia() => self.pending.push(Element::Token(token)),
                TokenKind::HeredocBodyStart => {
                    let body = self.parse_heredoc_body(token);
                    self.pending.push(Element::Node(body));
                }
                _ => self.lookahead = Some(token),
            }
        }
    }

    fn peek(&mut self) -> &Token {
        self.fill();
        let end = self.last_end;
        self.lookahead.get_or_insert_with(|| eof_token(end))
    }

    fn peek_kind(&mut self) -> TokenKind {
        self.peek().kind
    }

    fn peek_range(&mut self) -> TextRange {
        self.peek().range
    }

    fn peek_keyword(&mut self, keyword: &str) -> bool {
        self.peek().is_keyword(keyword)
    }

    fn peek_symbol(&mut self, symbol: &str) -> bool {
        self.peek().is_punct(symbol)
    }

    fn at_eof(&mut self) -> bool {
        self.peek_kind() == TokenKind::Eof
    }

    /// Line break or `;`.
    fn at_terminator(&mut self) -> bool {
        let token = self.peek();
        token.kind == TokenKind::LineBreak || token.is_punct(";")
    }

    /// No whitespace between the previous token and the next one.
    fn adjacent(&mut self) -> bool {
        let end = self.last_end;
        self.peek().range.start == end
    }

    fn take_token(&mut self) -> Token {
        self.fill();
        let end = self.last_end;
        self.lookahead.take().unwrap_or_else(|| eof_token(end))
    }

    fn flush_pending(&mut self, builder: &mut NodeBuilder) {
        for element in self.pending.drain(..) {
            builder.push_extra(element);
        }
    }

    /// Moves the next token, with any trivia before it, into `builder`.
    fn bump(&mut self, builder: &mut NodeBuilder, field: Option<Field>) -> TextRange {
        let token = self.take_token();
        self.flush_pending(builder);
        let range = token.range;
        if token.kind != TokenKind::Eof {
            self.last_end = range.end;
            self.consumed += 1;
            builder.push_token(field, token);
        }
        range
    }

    /// A node wrapping exactly the next token.
    fn leaf(&mut self, kind: NodeKind) -> Node {
        let mut builder = NodeBuilder::node(kind, self.last_end);
        self.bump(&mut builder, None);
        builder.finish()
    }

    fn error_node(&self) -> Node {
        NodeBuilder::node(NodeKind::Error, self.last_end).finish()
    }

    /// Zero-width error standing in for something that should be here.
    fn missing(&mut self, code: &str, message: String) -> Node {
        let range = self.peek_range();
        self.emit_diag(code, message, range, None);
        self.error_node()
    }

    fn describe_next(&mut self) -> String {
        let token = self.peek();
        match token.kind {
            TokenKind::Eof => "end of input".to_string(),
            TokenKind::LineBreak => "line break".to_string(),
            _ => format!("`{}`", token.text),
        }
    }

    fn expect_keyword(
        &mut self,
        builder: &mut NodeBuilder,
        keyword: &str,
        opener: Option<(&str, TextRange)>,
    ) -> bool {
        if self.peek_keyword(keyword) {
            self.bump(builder, None);
            return true;
        }
        let found = self.describe_next();
        let range = self.peek_range();
        self.emit_diag(
            "E1500",
            format!("expected `{keyword}`, found {found}"),
            range,
            opener,
        );
        builder.push_node(None, self.error_node());
        false
    }

    fn expect_symbol(
        &mut self,
        builder: &mut NodeBuilder,
        symbol: &str,
        opener: Option<(&str, TextRange)>,
    ) -> bool {
        if self.peek_symbol(symbol) {
            self.bump(builder, None);
            return true;
        }
        let found = self.describe_next();
        let range = self.peek_range();
        self.emit_diag(
            "E1501",
            format!("expected `{symbol}`, found {found}"),
            range,
            opener,
        );
        builder.push_node(None, self.error_node());
        false
    }

    fn emit_diag(
        &mut self,
        code: &str,
        message: String,
        range: TextRange,
        label: Option<(&str, TextRange)>,
    ) {
        let labels = label
            .map(|(message, range)| DiagnosticLabel {
                message: message.to_string(),
                span: self.line_index.span(self.source, range),
            })
            .into_iter()
            .collect();
        self.diagnostics.push(Diagnostic {
            code: code.to_string(),
            severity: DiagnosticSeverity::Error,
            message,
            span: self.line_index.span(self.source, range),
            labels,
        });
    }

    /// Runs `parse` one level deeper; past the limit the whole parse is abandoned.
    fn nested(&mut self, parse: impl FnOnce(&mut Self) -> Node) -> Node {
        if self.fatal {
            return self.error_node();
        }
        self.depth += 1;
        let node = if self.depth > self.options.max_depth {
            self.fatal = true;
            self.error_node()
        } else {
            parse(self)
        };
        self.depth -= 1;
        node
    }

    /// Runs a loop that wraps its result in a new node on every turn. Each
    /// [`Parser::deepen`] inside it holds one level until `build` returns.
    fn chain(&mut self, build: impl FnOnce(&mut Self) -> Node) -> Node {
        let depth = self.depth;
        let node = build(self);
        self.depth = depth;
        node
    }

    /// Claims one more level of left nesting; false once the limit is crossed.
    fn deepen(&mut self) -> bool {
        if self.fatal {
            return false;
        }
        self.depth += 1;
        if self.depth > self.options.max_depth {
            self.fatal = true;
        }
        !self.fatal
    }

    /// Runs `parse` with `do` blocks either claimable or reserved for an outer construct.
    fn with_no_do<T>(&mut self, no_do: bool, parse: impl FnOnce(&mut Self) -> T) -> T {
        let saved = std::mem::replace(&mut self.no_do, no_do);
        let result = parse(self);
        self.no_do = saved;
        result
    }

    fn trace(&self, message: impl FnOnce() -> String) {
        if self.options.trace {
            eprintln!("[RBCST_TRACE_PARSE] {}", message());
        }
    }
}

fn eof_token(offset: usize) -> Token {
    Token {
        kind: TokenKind::Eof,
        text: String::new(),
        range: TextRange::empty(offset),
    }
}

/// Node around an already taken token.
fn token_node(kind: NodeKind, token: Token) -> Node {
    let mut builder = NodeBuilder::node(kind, token.range.start);
    builder.push_token(None, token);
    builder.finish()
}
