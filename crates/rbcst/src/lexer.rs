mod context;
mod heredoc;
mod literal;

use std::collections::VecDeque;

use crate::cst::{TextRange, Token, TokenKind};
use crate::diagnostics::{Diagnostic, DiagnosticLabel, DiagnosticSeverity, LineIndex};
use crate::options::{trace_enabled, TRACE_LEX_VAR};
use crate::syntax;

use context::{ClosedGroup, Context, ContextStack, HeredocSpec, LexState, LiteralKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DataSection {
    None,
    Marker,
    Body,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DefName {
    None,
    Expecting,
    Named,
}

#[derive(Debug, Clone, Copy)]
enum Mode {
    Code,
    Literal,
    Heredoc,
}

/// Lexer state that a heredoc body must not disturb.
#[derive(Debug, Clone, Copy)]
struct Snapshot {
    state: LexState,
    can_end_statement: bool,
    last_end: usize,
    prev: Option<(TokenKind, TextRange)>,
}

/// On-demand tokenizer. The parser pulls one token at a time so it can open and
/// close ternary scopes between tokens.
pub struct Lexer<'src> {
    source: &'src str,
    pos: usize,
    contexts: ContextStack,
    state: LexState,
    can_end_statement: bool,
    last_end: usize,
    prev: Option<(TokenKind, TextRange)>,
    def_name: DefName,
    fname_extra: u8,
    heredocs: VecDeque<HeredocSpec>,
    saved: Option<Snapshot>,
    data_section: DataSection,
    line_index: LineIndex,
    diagnostics: Vec<Diagnostic>,
    trace: bool,
}

impl<'src> Lexer<'src> {
    pub fn new(source: &'src str) -> Self {
        Self {
            source,
            pos: 0,
            contexts: ContextStack::new(),
            state: LexState::Beg,
            can_end_statement: false,
            last_end: 0,
            prev: None,
            def_name: DefName::None,
            fname_extra: 0,
            heredocs: VecDeque::new(),
            saved: None,
            data_section: DataSection::None,
            line_index: LineIndex::new(source),
            diagnostics: Vec::new(),
            trace: trace_enabled(TRACE_LEX_VAR),
        }
    }

    pub fn next_token(&mut self) -> Token {
        let token = self.scan();
        self.observe(&token);
        token
    }

    /// Opens a ternary scope: `name:` is no longer a label and `:` closes the branch.
    pub fn push_ternary(&mut self) {
        self.contexts.push(Context::Ternary);
    }

    pub fn pop_ternary(&mut self) {
        self.contexts.remove_ternary();
    }

    pub fn take_diagnostics(&mut self) -> Vec<Diagnostic> {
        std::mem::take(&mut self.diagnostics)
    }

    fn scan(&mut self) -> Token {
        let mode = match self.contexts.top() {
            Context::Literal(_) => Mode::Literal,
            Context::Heredoc(_) => Mode::Heredoc,
            _ => Mode::Code,
        };
        match mode {
            Mode::Literal => self.scan_literal(),
            Mode::Heredoc => self.scan_heredoc_body(),
            Mode::Code if self.data_section != DataSection::None => self.scan_data_section(),
            Mode::Code => self.scan_normal(),
        }
    }

    fn observe(&mut self, token: &Token) {
        if token.is_trivia() {
            return;
        }
        if matches!(
            token.kind,
            TokenKind::HeredocBodyStart
                | TokenKind::HeredocContent
                | TokenKind::HeredocEnd
                | TokenKind::Eof
        ) {
            return;
        }
        let text = token.text.as_str();
        let lexed_in = self.state;
        let mut state = next_state(token.kind, text);

        let def_name = std::mem::replace(&mut self.def_name, DefName::None);
        if token.is_keyword("def") {
            self.def_name = DefName::Expecting;
        } else if def_name == DefName::Expecting {
            self.def_name = DefName::Named;
        } else if def_name == DefName::Named && token.is_punct(".") {
            state = LexState::Fname;
        }

        if token.is_keyword("alias") {
            self.fname_extra = 1;
        } else if lexed_in == LexState::Fname && self.fname_extra > 0 {
            self.fname_extra -= 1;
            state = LexState::Fname;
        }

        self.state = state;
        self.can_end_statement = ends_statement(token.kind, text);
        self.last_end = token.range.end;
        self.prev = Some((token.kind, token.range));
    }

    fn scan_normal(&mut self) -> Token {
        let start = self.pos;
        let Some(ch) = self.char_at(start) else {
            return self.scan_eof();
        };
        let space_before = start != self.last_end;

        if matches!(self.state, LexState::Fname | LexState::Dot) {
            if let Some(op) = self.operator_method_at(start) {
                return self.emit(TokenKind::Operator, start, start + op.len());
            }
        }

        match ch {
            '\n' | ' ' | '\t' | '\r' | '\u{b}' | '\u{c}' => self.scan_space(start),
            '\\' if self.starts_with_at(start + 1, "\n") => {
                self.emit(TokenKind::LineContinuation, start, start + 2)
            }
            '\\' if self.starts_with_at(start + 1, "\r\n") => {
                self.emit(TokenKind::LineContinuation, start, start + 3)
            }
            '#' => self.scan_comment(start),
            '=' if self.at_line_start(start) && self.block_comment_opens(start) => {
                self.scan_block_comment(start)
            }
            '_' if self.at_line_start(start) && self.data_marker_at(start) => {
                self.data_section = DataSection::Marker;
                self.emit(TokenKind::Keyword, start, start + "__END__".len())
            }
            '0'..='9' => {
                let (end, kind) = self.number_end(start);
                self.emit(kind, start, end)
            }
            '@' => self.scan_instance_variable(start),
            '$' => self.scan_global_variable(start),
            '"' => self.open_literal(start, start + 1, LiteralKind::String, None, '"', true),
            '\'' => self.open_literal(start, start + 1, LiteralKind::String, None, '\'', false),
            '`' => self.open_literal(start, start + 1, LiteralKind::Subshell, None, '`', true),
            ':' => self.scan_colon(start),
            '?' => self.scan_question(start, space_before),
            '%' => self.scan_percent(start, space_before),
            '/' => self.scan_slash(start, space_before),
            '<' => self.scan_less_than(start, space_before),
            '-' => self.scan_minus(start, space_before),
            '+' => self.scan_plus(start, space_before),
            '*' => self.scan_star(start, space_before),
            '&' => self.scan_ampersand(start, space_before),
            '(' => self.open_paren(start, space_before),
            '[' => {
                self.contexts.push(Context::Bracket);
                self.emit(TokenKind::Punct, start, start + 1)
            }
            '{' => self.open_brace(start),
            ')' | ']' => {
                self.contexts.close_group(ch);
                self.emit(TokenKind::Punct, start, start + 1)
            }
            '}' => match self.contexts.close_group('}') {
                Some(ClosedGroup::Interpolation) => {
                    self.emit(TokenKind::InterpolationEnd, start, start + 1)
                }
                _ => self.emit(TokenKind::Punct, start, start + 1),
            },
            c if syntax::is_identifier_start(c) => self.scan_identifier(start),
            _ => self.scan_punct(start),
        }
    }

    fn scan_space(&mut self, start: usize) -> Token {
        let mut pos = start;
        while let Some(ch) = self.char_at(pos) {
            match ch {
                '\n' => {
                    let breaks = self.newline_significant(pos);
                    if breaks || !self.heredocs.is_empty() {
                        if pos > start {
                            break;
                        }
                        let kind = if breaks {
                            TokenKind::LineBreak
                        } else {
                            TokenKind::Whitespace
                        };
                        let token = self.emit(kind, pos, pos + 1);
                        self.begin_heredoc_bodies();
                        return token;
                    }
                    pos += 1;
                }
                ' ' | '\t' | '\r' | '\u{b}' | '\u{c}' => pos += 1,
                _ => break,
            }
        }
        self.emit(TokenKind::Whitespace, start, pos)
    }

    fn newline_significant(&self, pos: usize) -> bool {
        if !self.can_end_statement || !self.contexts.newlines_significant() {
            return false;
        }
        !self.continues_with_leading_dot(pos + 1)
    }

    /// `foo\n  .bar` continues the previous line, comment lines in between allowed.
    fn continues_with_leading_dot(&self, mut pos: usize) -> bool {
        loop {
            match self.char_at(pos) {
                Some(' ' | '\t' | '\r' | '\n') => pos += 1,
                Some('#') => {
                    while let Some(ch) = self.char_at(pos) {
                        if ch == '\n' {
                            break;
                        }
                        pos += ch.len_utf8();
                    }
                }
                Some('.') => return !self.starts_with_at(pos, ".."),
                Some('&') => return self.starts_with_at(pos, "&."),
                _ => return false,
            }
        }
    }

    fn scan_comment(&mut self, start: usize) -> Token {
        let end = self.line_end(start);
        self.emit(TokenKind::Comment, start, end)
    }

    fn block_comment_opens(&self, start: usize) -> bool {
        self.starts_with_at(start, "=begin") && self.word_boundary(start + "=begin".len())
    }

    fn scan_block_comment(&mut self, start: usize) -> Token {
        let mut pos = start;
        loop {
            let line_end = self.line_end(pos);
            if line_end >= self.source.len() {
                self.emit_diag(
                    "E1004",
                    "unterminated `=begin` comment".to_string(),
                    TextRange::new(start, start + "=begin".len()),
                    None,
                );
                return self.emit(TokenKind::Error, start, self.source.len());
            }
            pos = line_end + 1;
            if self.starts_with_at(pos, "=end") && self.word_boundary(pos + "=end".len()) {
                let end = self.line_end(pos);
                return self.emit(TokenKind::Comment, start, end);
            }
        }
    }

    fn data_marker_at(&self, start: usize) -> bool {
        let after = start + "__END__".len();
        self.starts_with_at(start, "__END__")
            && (after == self.source.len()
                || self.starts_with_at(after, "\n")
                || self.starts_with_at(after, "\r\n"))
    }

    fn scan_data_section(&mut self) -> Token {
        let start = self.pos;
        match self.data_section {
            DataSection::Marker => {
                self.data_section = DataSection::Body;
                if self.starts_with_at(start, "\r\n") {
                    return self.emit(TokenKind::LineBreak, start, start + 2);
                }
                if self.starts_with_at(start, "\n") {
                    return self.emit(TokenKind::LineBreak, start, start + 1);
                }
                self.scan_data_section()
            }
            _ if start < self.source.len() => {
                self.emit(TokenKind::Uninterpreted, start, self.source.len())
            }
            _ => self.emit(TokenKind::Eof, start, start),
        }
    }

    fn scan_eof(&mut self) -> Token {
        if !self.heredocs.is_empty() {
            self.begin_heredoc_bodies();
            return self.scan();
        }
        let end = self.source.len();
        self.emit(TokenKind::Eof, end, end)
    }

    pub(crate) fn number_end(&self, start: usize) -> (usize, TokenKind) {
        let mut kind = TokenKind::Integer;
        let radix: Option<fn(char) -> bool> = if self.char_at(start) == Some('0') {
            match self.char_at(start + 1) {
                Some('x' | 'X') => Some(is_hex_digit),
                Some('b' | 'B') => Some(is_binary_digit),
                Some('o' | 'O') => Some(is_octal_digit),
                Some('d' | 'D') => Some(is_decimal_digit),
                _ => None,
            }
        } else {
            None
        };

        let mut pos = match radix {
            Some(is_digit) if self.char_at(start + 2).is_some_and(is_digit) => {
                self.digits_end(start + 2, is_digit)
            }
            _ => {
                let mut pos = self.digits_end(start, is_decimal_digit);
                if self.char_at(pos) == Some('.')
                    && self.char_at(pos + 1).is_some_and(is_decimal_digit)
                {
                    pos = self.digits_end(pos + 1, is_decimal_digit);
                    kind = TokenKind::Float;
                }
                if let Some('e' | 'E') = self.char_at(pos) {
                    let mut digits = pos + 1;
                    if let Some('+' | '-') = self.char_at(digits) {
                        digits += 1;
                    }
                    if self.char_at(digits).is_some_and(is_decimal_digit) {
                        pos = self.digits_end(digits, is_decimal_digit);
                        kind = TokenKind::Float;
                    }
                }
                pos
            }
        };

        let suffix_ends = |lexer: &Self, at: usize| {
            !lexer
                .char_at(at)
                .is_some_and(syntax::is_identifier_char)
        };
        if self.char_at(pos) == Some('r')
            && (suffix_ends(self, pos + 1)
                || (self.char_at(pos + 1) == Some('i') && suffix_ends(self, pos + 2)))
        {
            pos += 1;
            kind = TokenKind::Rational;
        }
        if self.char_at(pos) == Some('i') && suffix_ends(self, pos + 1) {
            pos += 1;
            kind = TokenKind::Complex;
        }
        (pos, kind)
    }

    fn digits_end(&self, mut pos: usize, is_digit: fn(char) -> bool) -> usize {
        while let Some(ch) = self.char_at(pos) {
            if is_digit(ch) {
                pos += 1;
            } else if ch == '_' && self.char_at(pos + 1).is_some_and(is_digit) {
                pos += 2;
            } else {
                break;
            }
        }
        pos
    }

    fn identifier_end(&self, mut pos: usize) -> usize {
        while let Some(ch) = self.char_at(pos) {
            if !syntax::is_identifier_char(ch) {
                break;
            }
            pos += ch.len_utf8();
        }
        pos
    }

    /// Takes a trailing `?` or `!` unless it starts `!=`/`?=`-style operators.
    fn method_suffix_end(&self, pos: usize) -> usize {
        match self.char_at(pos) {
            Some('?' | '!') => {
                let after = pos + 1;
                let takes = self.char_at(after) != Some('=')
                    || self.starts_with_at(after, "==")
                    || self.starts_with_at(after, "=~")
                    || self.starts_with_at(after, "=>");
                if takes {
                    after
                } else {
                    pos
                }
            }
            _ => pos,
        }
    }

    fn scan_identifier(&mut self, start: usize) -> Token {
        let name_end = self.identifier_end(start);
        let end = self.method_suffix_end(name_end);
        let text = self.slice(start, end);
        let constant = text.starts_with(|c: char| c.is_ascii_uppercase());
        let word_kind = if constant {
            TokenKind::Constant
        } else {
            TokenKind::Identifier
        };

        if self.char_at(end) == Some(':')
            && !self.starts_with_at(end, "::")
            && self.contexts.labels_allowed()
            && !matches!(self.state, LexState::Dot | LexState::Fname)
        {
            return self.emit(TokenKind::IdentifierHashKey, start, end);
        }

        match self.state {
            LexState::Dot => return self.emit(word_kind, start, end),
            LexState::Fname => {
                let receiver = matches!(text, "self" | "nil" | "true" | "false")
                    && self.char_at(end) == Some('.');
                let kind = if receiver {
                    TokenKind::Keyword
                } else {
                    word_kind
                };
                return self.emit(kind, start, end);
            }
            _ => {}
        }

        if syntax::is_keyword(text) {
            return self.emit(TokenKind::Keyword, start, end);
        }
        if matches!(text, "BEGIN" | "END") && self.brace_follows(end) {
            return self.emit(TokenKind::Keyword, start, end);
        }
        self.emit(word_kind, start, end)
    }

    fn brace_follows(&self, mut pos: usize) -> bool {
        while let Some(' ' | '\t') = self.char_at(pos) {
            pos += 1;
        }
        self.char_at(pos) == Some('{')
    }

    fn scan_instance_variable(&mut self, start: usize) -> Token {
        let (kind, name) = if self.starts_with_at(start, "@@") {
            (TokenKind::ClassVariable, start + 2)
        } else {
            (TokenKind::InstanceVariable, start + 1)
        };
        if self.char_at(name).is_some_and(syntax::is_identifier_start) {
            let end = self.identifier_end(name);
            return self.emit(kind, start, end);
        }
        self.unexpected(start, name)
    }

    fn global_variable_end(&self, start: usize) -> Option<usize> {
        let name = start + 1;
        match self.char_at(name)? {
            '-' => {
                let ch = self.char_at(name + 1)?;
                syntax::is_identifier_char(ch).then_some(name + 1 + ch.len_utf8())
            }
            c if "!@&`'+~=/\\,;.<>*$?:\"".contains(c) => Some(name + 1),
            c if c.is_ascii_digit() => Some(self.digits_end(name, is_decimal_digit)),
            c if syntax::is_identifier_start(c) => Some(self.identifier_end(name)),
            _ => None,
        }
    }

    fn scan_global_variable(&mut self, start: usize) -> Token {
        match self.global_variable_end(start) {
            Some(end) => self.emit(TokenKind::GlobalVariable, start, end),
            None => self.unexpected(start, start + 1),
        }
    }

    fn scan_colon(&mut self, start: usize) -> Token {
        if self.starts_with_at(start, "::") {
            return self.emit(TokenKind::Punct, start, start + 2);
        }
        let ternary_branch =
            self.contexts.in_ternary() && matches!(self.state, LexState::End | LexState::Arg);
        let label_colon = matches!(
            self.prev,
            Some((TokenKind::IdentifierHashKey, range)) if range.end == start
        );
        if self.state == LexState::End || ternary_branch || label_colon {
            return self.emit(TokenKind::Punct, start, start + 1);
        }
        let name = start + 1;
        match self.char_at(name) {
            Some('"') => {
                self.open_literal(start, name + 1, LiteralKind::Symbol, None, '"', true)
            }
            Some('\'') => {
                self.open_literal(start, name + 1, LiteralKind::Symbol, None, '\'', false)
            }
            Some(c) if syntax::is_identifier_start(c) => {
                let mut end = self.method_suffix_end(self.identifier_end(name));
                if end == self.identifier_end(name)
                    && self.char_at(end) == Some('=')
                    && !matches!(self.char_at(end + 1), Some('=' | '~' | '>'))
                {
                    end += 1;
                }
                self.emit(TokenKind::SimpleSymbol, start, end)
            }
            Some('@') => {
                let sigil = if self.starts_with_at(name, "@@") { 2 } else { 1 };
                if self
                    .char_at(name + sigil)
                    .is_some_and(syntax::is_identifier_start)
                {
                    let end = self.identifier_end(name + sigil);
                    self.emit(TokenKind::SimpleSymbol, start, end)
                } else {
                    self.emit(TokenKind::Punct, start, start + 1)
                }
            }
            Some('$') => match self.global_variable_end(name) {
                Some(end) => self.emit(TokenKind::SimpleSymbol, start, end),
                None => self.emit(TokenKind::Punct, start, start + 1),
            },
            _ => match self.operator_method_at(name) {
                Some(op) => self.emit(TokenKind::SimpleSymbol, start, name + op.len()),
                None => self.emit(TokenKind::Punct, start, start + 1),
            },
        }
    }

    fn scan_question(&mut self, start: usize, space_before: bool) -> Token {
        let next = self.char_at(start + 1);
        let prefix = match self.state {
            LexState::Beg | LexState::Class => true,
            LexState::Arg => space_before,
            _ => false,
        };
        if let Some(ch) = next.filter(|c| prefix && !c.is_whitespace()) {
            if ch == '\\' {
                let (end, valid) = self.escape_end(start + 1);
                if !valid {
                    self.invalid_escape(start + 1, end);
                }
                return self.emit(TokenKind::Character, start, end);
            }
            let end = start + 1 + ch.len_utf8();
            let word_continues = syntax::is_identifier_char(ch)
                && self.char_at(end).is_some_and(syntax::is_identifier_char);
            if !word_continues {
                return self.emit(TokenKind::Character, start, end);
            }
        }
        self.emit(TokenKind::Punct, start, start + 1)
    }

    /// Where a prefix operator (unary, splat, regex start, heredoc) is allowed.
    fn prefix_position(&self, space_before: bool, after_operator: usize) -> bool {
        match self.state {
            LexState::Beg | LexState::Class => true,
            LexState::Arg => {
                space_before
                    && !self
                        .char_at(after_operator)
                        .map_or(true, char::is_whitespace)
            }
            LexState::End | LexState::Dot | LexState::Fname => false,
        }
    }

    /// `/=` and `%=` collide with literal openers; they assign after a value.
    fn assignment_allowed(&self, after: usize, space_before: bool) -> bool {
        match self.state {
            LexState::End => true,
            LexState::Arg => {
                !space_before || self.char_at(after).map_or(true, char::is_whitespace)
            }
            _ => false,
        }
    }

    fn after_value(&self) -> bool {
        !matches!(self.state, LexState::Beg | LexState::Class)
    }

    fn scan_percent(&mut self, start: usize, space_before: bool) -> Token {
        if self.starts_with_at(start, "%=") && self.assignment_allowed(start + 2, space_before) {
            return self.emit(TokenKind::Punct, start, start + 2);
        }
        if self.prefix_position(space_before, start + 1) {
            if let Some(token) = self.try_percent_literal(start) {
                return token;
            }
        }
        self.emit(TokenKind::Punct, start, start + 1)
    }

    fn scan_slash(&mut self, start: usize, space_before: bool) -> Token {
        if self.starts_with_at(start, "/=") && self.assignment_allowed(start + 2, space_before) {
            return self.emit(TokenKind::Punct, start, start + 2);
        }
        if self.prefix_position(space_before, start + 1) {
            return self.open_literal(start, start + 1, LiteralKind::Regex, None, '/', true);
        }
        self.emit(TokenKind::Punct, start, start + 1)
    }

    fn scan_less_than(&mut self, start: usize, space_before: bool) -> Token {
        if self.starts_with_at(start, "<<") {
            if self.state == LexState::Class {
                return self.emit(TokenKind::SingletonClassLeftShift, start, start + 2);
            }
            if self.prefix_position(space_before, start + 2) {
                if let Some(token) = self.try_heredoc(start) {
                    return token;
                }
            }
        }
        self.scan_punct(start)
    }

    fn scan_minus(&mut self, start: usize, space_before: bool) -> Token {
        if self.starts_with_at(start, "->") {
            return self.emit(TokenKind::Punct, start, start + 2);
        }
        if self.starts_with_at(start, "-=") && self.after_value() {
            return self.emit(TokenKind::Punct, start, start + 2);
        }
        if self.prefix_position(space_before, start + 1) {
            if self.char_at(start + 1).is_some_and(is_decimal_digit) {
                let (end, kind) = self.number_end(start + 1);
                if !self.exponent_follows(end) {
                    return self.emit(kind, start, end);
                }
            }
            return self.emit(TokenKind::UnaryMinus, start, start + 1);
        }
        self.emit(TokenKind::BinaryMinus, start, start + 1)
    }

    fn exponent_follows(&self, mut pos: usize) -> bool {
        while let Some(' ' | '\t') = self.char_at(pos) {
            pos += 1;
        }
        self.starts_with_at(pos, "**")
    }

    fn scan_plus(&mut self, start: usize, space_before: bool) -> Token {
        if self.starts_with_at(start, "+=") && self.after_value() {
            return self.emit(TokenKind::Punct, start, start + 2);
        }
        if self.prefix_position(space_before, start + 1) {
            return self.emit(TokenKind::UnaryPlus, start, start + 1);
        }
        self.emit(TokenKind::Punct, start, start + 1)
    }

    fn scan_star(&mut self, start: usize, space_before: bool) -> Token {
        if self.after_value() {
            if self.starts_with_at(start, "**=") {
                return self.emit(TokenKind::Punct, start, start + 3);
            }
            if self.starts_with_at(start, "*=") {
                return self.emit(TokenKind::Punct, start, start + 2);
            }
        }
        if self.starts_with_at(start, "**") {
            if self.prefix_position(space_before, start + 2) {
                return self.emit(TokenKind::DoubleSplat, start, start + 2);
            }
            return self.emit(TokenKind::Punct, start, start + 2);
        }
        if self.prefix_position(space_before, start + 1) {
            return self.emit(TokenKind::SplatStar, start, start + 1);
        }
        self.emit(TokenKind::BinaryStar, start, start + 1)
    }

    fn scan_ampersand(&mut self, start: usize, space_before: bool) -> Token {
        if self.after_value() {
            if self.starts_with_at(start, "&&=") {
                return self.emit(TokenKind::Punct, start, start + 3);
            }
            if self.starts_with_at(start, "&=") {
                return self.emit(TokenKind::Punct, start, start + 2);
            }
        }
        if self.starts_with_at(start, "&&") || self.starts_with_at(start, "&.") {
            return self.emit(TokenKind::Punct, start, start + 2);
        }
        if self.prefix_position(space_before, start + 1) {
            return self.emit(TokenKind::BlockAmpersand, start, start + 1);
        }
        self.emit(TokenKind::Punct, start, start + 1)
    }

    fn open_paren(&mut self, start: usize, space_before: bool) -> Token {
        let context = if self.prev_is_punct("->") {
            Context::LambdaParams
        } else {
            let arguments = !space_before
                && match self.prev {
                    Some((TokenKind::Identifier | TokenKind::Constant | TokenKind::Operator, _)) => {
                        true
                    }
                    Some((TokenKind::Keyword, range)) => matches!(
                        self.slice(range.start, range.end),
                        "super" | "yield" | "return" | "break" | "next"
                    ),
                    Some((TokenKind::Punct, range)) => {
                        matches!(self.slice(range.start, range.end), "." | "&.")
                    }
                    _ => false,
                };
            Context::Paren { arguments }
        };
        self.contexts.push(context);
        self.emit(TokenKind::Punct, start, start + 1)
    }

    fn open_brace(&mut self, start: usize) -> Token {
        let hash = matches!(self.state, LexState::Beg | LexState::Class) && !self.prev_is_punct("->");
        self.contexts.push(Context::Brace { hash });
        self.emit(TokenKind::Punct, start, start + 1)
    }

    fn scan_punct(&mut self, start: usize) -> Token {
        let chars: Vec<char> = self.rest_at(start).chars().take(3).collect();
        for (pattern, text) in syntax::SYMBOLS_3 {
            if chars.len() == 3 && chars[..] == pattern[..] {
                return self.emit(TokenKind::Punct, start, start + text.len());
            }
        }
        for (pattern, text) in syntax::SYMBOLS_2 {
            if chars.len() >= 2 && chars[..2] == pattern[..] {
                return self.emit(TokenKind::Punct, start, start + text.len());
            }
        }
        match chars.first() {
            Some(ch) if syntax::SYMBOLS_1.contains(ch) => {
                self.emit(TokenKind::Punct, start, start + ch.len_utf8())
            }
            Some(ch) => {
                let end = start + ch.len_utf8();
                self.unexpected(start, end)
            }
            None => self.scan_eof(),
        }
    }

    fn operator_method_at(&self, pos: usize) -> Option<&'static str> {
        syntax::OPERATOR_METHODS
            .iter()
            .copied()
            .find(|op| self.starts_with_at(pos, op))
    }

    fn unexpected(&mut self, start: usize, end: usize) -> Token {
        let text = self.slice(start, end).to_string();
        self.emit_diag(
            "E1000",
            format!("unexpected character `{text}`"),
            TextRange::new(start, end),
            None,
        );
        self.emit(TokenKind::Error, start, end)
    }

    fn emit(&mut self, kind: TokenKind, start: usize, end: usize) -> Token {
        self.pos = end;
        Token {
            kind,
            text: self.slice(start, end).to_string(),
            range: TextRange::new(start, end),
        }
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

    fn prev_is_punct(&self, punct: &str) -> bool {
        matches!(self.prev, Some((TokenKind::Punct, range)) if self.slice(range.start, range.end) == punct)
    }

    fn slice(&self, start: usize, end: usize) -> &'src str {
        self.source.get(start..end).unwrap_or("")
    }

    fn rest_at(&self, pos: usize) -> &'src str {
        self.source.get(pos..).unwrap_or("")
    }

    fn char_at(&self, pos: usize) -> Option<char> {
        self.rest_at(pos).chars().next()
    }

    fn starts_with_at(&self, pos: usize, pattern: &str) -> bool {
        self.rest_at(pos).starts_with(pattern)
    }

    fn at_line_start(&self, pos: usize) -> bool {
        pos == 0 || self.source.as_bytes().get(pos - 1) == Some(&b'\n')
    }

    fn word_boundary(&self, pos: usize) -> bool {
        self.char_at(pos).map_or(true, char::is_whitespace)
    }

    fn line_end(&self, pos: usize) -> usize {
        self.rest_at(pos)
            .find('\n')
            .map_or(self.source.len(), |offset| pos + offset)
    }
}

fn is_decimal_digit(ch: char) -> bool {
    ch.is_ascii_digit()
}

fn is_hex_digit(ch: char) -> bool {
    ch.is_ascii_hexdigit()
}

fn is_binary_digit(ch: char) -> bool {
    matches!(ch, '0' | '1')
}

pub(crate) fn is_octal_digit(ch: char) -> bool {
    matches!(ch, '0'..='7')
}

fn next_state(kind: TokenKind, text: &str) -> LexState {
    match kind {
        TokenKind::Identifier | TokenKind::Constant | TokenKind::Operator => LexState::Arg,
        TokenKind::Keyword => match text {
            "end" | "self" | "nil" | "true" | "false" | "redo" | "retry" | "__END__" | "BEGIN"
            | "END" => LexState::End,
            kw if syntax::KEYWORDS_CALL_LIKE.contains(&kw) => LexState::Arg,
            "class" => LexState::Class,
            "def" | "alias" | "undef" => LexState::Fname,
            _ => LexState::Beg,
        },
        TokenKind::Punct => match text {
            ")" | "]" | "}" => LexState::End,
            "." | "&." | "::" => LexState::Dot,
            _ => LexState::Beg,
        },
        TokenKind::InstanceVariable
        | TokenKind::ClassVariable
        | TokenKind::GlobalVariable
        | TokenKind::Integer
        | TokenKind::Float
        | TokenKind::Rational
        | TokenKind::Complex
        | TokenKind::Character
        | TokenKind::SimpleSymbol
        | TokenKind::StringEnd
        | TokenKind::HeredocBeginning
        | TokenKind::InterpolationEnd
        | TokenKind::Uninterpreted
        | TokenKind::Error => LexState::End,
        _ => LexState::Beg,
    }
}

/// Whether a line break right after this token terminates the statement.
fn ends_statement(kind: TokenKind, text: &str) -> bool {
    match kind {
        TokenKind::Identifier
        | TokenKind::Constant
        | TokenKind::Operator
        | TokenKind::InstanceVariable
        | TokenKind::ClassVariable
        | TokenKind::GlobalVariable
        | TokenKind::Integer
        | TokenKind::Float
        | TokenKind::Rational
        | TokenKind::Complex
        | TokenKind::Character
        | TokenKind::SimpleSymbol
        | TokenKind::StringEnd
        | TokenKind::HeredocBeginning
        | TokenKind::Uninterpreted => true,
        TokenKind::Keyword => syntax::KEYWORDS_VALUE.contains(&text),
        TokenKind::Punct => matches!(text, ")" | "]" | "}"),
        _ => false,
    }
}

/// Lexes `source` without a parser attached. Ternary scopes are never opened,
/// so `a ?b :c` style input may classify differently than in a full parse.
pub fn tokenize(source: &str) -> (Vec<Token>, Vec<Diagnostic>) {
    let mut lexer = Lexer::new(source);
    let mut tokens = Vec::new();
    loop {
        let token = lexer.next_token();
        if token.kind == TokenKind::Eof {
            break;
        }
        tokens.push(token);
    }
    (tokens, lexer.take_diagnostics())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn significant(source: &str) -> Vec<(TokenKind, String)> {
        let (tokens, _) = tokenize(source);
        tokens
            .into_iter()
            .filter(|token| !token.is_trivia())
            .map(|token| (token.kind, token.text))
            .collect()
    }

    fn kinds(source: &str) -> Vec<TokenKind> {
        significant(source).into_iter().map(|(kind, _)| kind).collect()
    }

    fn assert_lossless(source: &str) {
        let (tokens, _) = tokenize(source);
        let text: String = tokens.iter().map(|token| token.text.as_str()).collect();
        assert_eq!(text, source);
    }

    #[test]
    fn minus_depends_on_spacing_and_position() {
        assert_eq!(
            kinds("a - b"),
            vec![TokenKind::Identifier, TokenKind::BinaryMinus, TokenKind::Identifier]
        );
        assert_eq!(
            kinds("a -b"),
            vec![TokenKind::Identifier, TokenKind::UnaryMinus, TokenKind::Identifier]
        );
        assert_eq!(
            kinds("a-b"),
            vec![TokenKind::Identifier, TokenKind::BinaryMinus, TokenKind::Identifier]
        );
        assert_eq!(significant("-1"), vec![(TokenKind::Integer, "-1".to_string())]);
        assert_eq!(
            kinds("-2 ** 2"),
            vec![
                TokenKind::UnaryMinus,
                TokenKind::Integer,
                TokenKind::Punct,
                TokenKind::Integer
            ]
        );
    }

    #[test]
    fn star_and_ampersand_prefixes() {
        assert_eq!(
            kinds("a * b"),
            vec![TokenKind::Identifier, TokenKind::BinaryStar, TokenKind::Identifier]
        );
        assert_eq!(
            kinds("foo *args, **opts, &blk"),
            vec![
                TokenKind::Identifier,
                TokenKind::SplatStar,
                TokenKind::Identifier,
                TokenKind::Punct,
                TokenKind::DoubleSplat,
                TokenKind::Identifier,
                TokenKind::Punct,
                TokenKind::BlockAmpersand,
                TokenKind::Identifier,
            ]
        );
        assert_eq!(
            kinds("x & y"),
            vec![TokenKind::Identifier, TokenKind::Punct, TokenKind::Identifier]
        );
    }

    #[test]
    fn slash_is_division_after_values_and_regex_elsewhere() {
        assert_eq!(
            kinds("a / b"),
            vec![TokenKind::Identifier, TokenKind::Punct, TokenKind::Identifier]
        );
        assert_eq!(
            kinds("x = /ab+/i"),
            vec![
                TokenKind::Identifier,
                TokenKind::Punct,
                TokenKind::RegexStart,
                TokenKind::StringContent,
                TokenKind::StringEnd,
            ]
        );
        let tokens = significant("foo /re/");
        assert_eq!(tokens[1].0, TokenKind::RegexStart);
        let tokens = significant("x /= 2");
        assert_eq!(tokens[1], (TokenKind::Punct, "/=".to_string()));
    }

    #[test]
    fn heredoc_body_follows_the_opening_line() {
        let source = "x = <<~EOS\n  hi #{1}\nEOS\n";
        assert_eq!(
            kinds(source),
            vec![
                TokenKind::Identifier,
                TokenKind::Punct,
                TokenKind::HeredocBeginning,
                TokenKind::LineBreak,
                TokenKind::HeredocBodyStart,
                TokenKind::HeredocContent,
                TokenKind::InterpolationStart,
                TokenKind::Integer,
                TokenKind::InterpolationEnd,
                TokenKind::HeredocContent,
                TokenKind::HeredocEnd,
            ]
        );
        assert_lossless(source);
    }

    #[test]
    fn heredocs_on_one_line_complete_in_order() {
        let source = "foo(<<A, <<-'B')\na body\nA\nb #{raw}\n  B\nbar\n";
        let tokens = significant(source);
        let ends: Vec<&str> = tokens
            .iter()
            .filter(|(kind, _)| *kind == TokenKind::HeredocEnd)
            .map(|(_, text)| text.as_str())
            .collect();
        assert_eq!(ends, vec!["A", "  B"]);
        assert!(
            !tokens.iter().any(|(kind, _)| *kind == TokenKind::InterpolationStart),
            "single-quoted heredoc must not interpolate: {tokens:?}"
        );
        assert_eq!(
            tokens.last(),
            Some(&(TokenKind::LineBreak, "\n".to_string()))
        );
        assert_lossless(source);
    }

    #[test]
    fn unterminated_heredoc_reports_e1002() {
        let (_, diags) = tokenize("x = <<EOS\nbody\n");
        assert!(diags.iter().any(|diag| diag.code == "E1002"), "{diags:?}");
    }

    #[test]
    fn labels_and_symbols() {
        assert_eq!(
            kinds("{a: 1, :b => 2}"),
            vec![
                TokenKind::Punct,
                TokenKind::IdentifierHashKey,
                TokenKind::Punct,
                TokenKind::Integer,
                TokenKind::Punct,
                TokenKind::SimpleSymbol,
                TokenKind::Punct,
                TokenKind::Integer,
                TokenKind::Punct,
            ]
        );
        assert_eq!(
            significant(":foo= :[]= :<=>")
                .into_iter()
                .map(|(_, text)| text)
                .collect::<Vec<_>>(),
            vec![":foo=", ":[]=", ":<=>"]
        );
    }

    #[test]
    fn word_arrays_split_on_whitespace() {
        let (tokens, _) = tokenize("%w(a b)");
        let kinds: Vec<TokenKind> = tokens.iter().map(|token| token.kind).collect();
        assert_eq!(
            kinds,
            vec![
                TokenKind::StringArrayStart,
                TokenKind::StringContent,
                TokenKind::Whitespace,
                TokenKind::StringContent,
                TokenKind::StringEnd,
            ]
        );
    }

    #[test]
    fn bracketed_percent_literals_nest() {
        let tokens = significant("%q(a (b) c)");
        assert_eq!(tokens[1], (TokenKind::StringContent, "a (b) c".to_string()));
        assert_eq!(tokens[2], (TokenKind::StringEnd, ")".to_string()));
    }

    #[test]
    fn escapes_are_validated() {
        let (tokens, diags) = tokenize(r#""\x41\u{1F600}\n""#);
        assert!(diags.is_empty(), "{diags:?}");
        assert_eq!(
            tokens
                .iter()
                .filter(|token| token.kind == TokenKind::EscapeSequence)
                .count(),
            3
        );
        let (tokens, diags) = tokenize(r#""\xZZ""#);
        assert!(diags.iter().any(|diag| diag.code == "E1003"), "{diags:?}");
        assert!(tokens.iter().any(|token| token.kind == TokenKind::Error));
    }

    #[test]
    fn single_quotes_only_escape_backslash_and_quote() {
        let (tokens, _) = tokenize(r"'a\n\'\\'");
        let escapes: Vec<&str> = tokens
            .iter()
            .filter(|token| token.kind == TokenKind::EscapeSequence)
            .map(|token| token.text.as_str())
            .collect();
        assert_eq!(escapes, vec![r"\'", r"\\"]);
    }

    #[test]
    fn unterminated_string_reports_e1001() {
        let (_, diags) = tokenize("x = \"abc");
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].code, "E1001");
    }

    #[test]
    fn label_colon_never_starts_a_symbol() {
        assert_eq!(
            kinds("{a:b}"),
            vec![
                TokenKind::Punct,
                TokenKind::IdentifierHashKey,
                TokenKind::Punct,
                TokenKind::Identifier,
                TokenKind::Punct,
            ]
        );
    }

    #[test]
    fn singleton_class_shift() {
        assert_eq!(
            kinds("class << self"),
            vec![
                TokenKind::Keyword,
                TokenKind::SingletonClassLeftShift,
                TokenKind::Keyword
            ]
        );
    }

    #[test]
    fn newline_significance() {
        assert_eq!(
            kinds("foo\n  .bar"),
            vec![TokenKind::Identifier, TokenKind::Punct, TokenKind::Identifier]
        );
        assert_eq!(
            kinds("foo(\n1,\n2\n)"),
            vec![
                TokenKind::Identifier,
                TokenKind::Punct,
                TokenKind::Integer,
                TokenKind::Punct,
                TokenKind::Integer,
                TokenKind::Punct,
            ]
        );
        assert_eq!(
            kinds("a +\nb\n\n\nc"),
            vec![
                TokenKind::Identifier,
                TokenKind::Punct,
                TokenKind::Identifier,
                TokenKind::LineBreak,
                TokenKind::Identifier,
            ]
        );
    }

    #[test]
    fn keywords_after_dot_are_method_names() {
        assert_eq!(
            kinds("foo.class.end"),
            vec![
                TokenKind::Identifier,
                TokenKind::Punct,
                TokenKind::Identifier,
                TokenKind::Punct,
                TokenKind::Identifier,
            ]
        );
    }

    #[test]
    fn operator_method_names_after_def() {
        let tokens = significant("def <=>(other)");
        assert_eq!(tokens[1], (TokenKind::Operator, "<=>".to_string()));
        let tokens = significant("def self.[]=(k, v)");
        assert_eq!(tokens[1], (TokenKind::Keyword, "self".to_string()));
        assert_eq!(tokens[3], (TokenKind::Operator, "[]=".to_string()));
    }

    #[test]
    fn numeric_family() {
        let texts = significant("0x1F 1_000 3.14 1e-3 3r 2i 1.5ri ?a");
        let kinds: Vec<TokenKind> = texts.iter().map(|(kind, _)| *kind).collect();
        assert_eq!(
            kinds,
            vec![
                TokenKind::Integer,
                TokenKind::Integer,
                TokenKind::Float,
                TokenKind::Float,
                TokenKind::Rational,
                TokenKind::Complex,
                TokenKind::Complex,
                TokenKind::Character,
            ]
        );
    }

    #[test]
    fn data_section_and_block_comments() {
        let source = "=begin\nnotes\n=end\nfoo\n__END__\nraw data\n";
        let (tokens, diags) = tokenize(source);
        assert!(diags.is_empty(), "{diags:?}");
        assert_eq!(tokens[0].kind, TokenKind::Comment);
        assert_eq!(
            tokens.last().map(|token| (token.kind, token.text.as_str())),
            Some((TokenKind::Uninterpreted, "raw data\n"))
        );
        assert_lossless(source);
    }

    #[test]
    fn unterminated_block_comment_is_an_error_token() {
        let source = "=begin\nabc\n";
        let (tokens, diags) = tokenize(source);
        assert_eq!(tokens.len(), 1);
        assert_eq!(tokens[0].kind, TokenKind::Error);
        assert_eq!(diags[0].code, "E1004");
        assert_lossless(source);
    }

    #[test]
    fn unexpected_characters_become_error_tokens() {
        let (tokens, diags) = tokenize("a \\ b");
        assert!(tokens.iter().any(|token| token.kind == TokenKind::Error));
        assert_eq!(diags[0].code, "E1000");
    }

    #[test]
    fn lossless_on_mixed_input() {
        assert_lossless(
            "class Foo < Bar\n  def x=(v) = @x = v # set\n  %i[a b].map { |s| :\"#{s}\" }\nend\r\n",
        );
    }
}
