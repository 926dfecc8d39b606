use crate::cst::{TextRange, Token, TokenKind};
use crate::syntax;

use super::context::{Context, LiteralKind, LiteralScan};
use super::{is_octal_digit, Lexer};

impl<'src> Lexer<'src> {
    pub(super) fn open_literal(
        &mut self,
        start: usize,
        end: usize,
        kind: LiteralKind,
        open: Option<char>,
        close: char,
        interpolates: bool,
    ) -> Token {
        let token_kind = match kind {
            LiteralKind::String => TokenKind::StringStart,
            LiteralKind::Symbol => TokenKind::SymbolStart,
            LiteralKind::Subshell => TokenKind::SubshellStart,
            LiteralKind::Regex => TokenKind::RegexStart,
            LiteralKind::StringArray => TokenKind::StringArrayStart,
            LiteralKind::SymbolArray => TokenKind::SymbolArrayStart,
        };
        self.contexts.push(Context::Literal(LiteralScan {
            kind,
            open,
            close,
            depth: 0,
            interpolates,
            start,
        }));
        self.emit(token_kind, start, end)
    }

    /// `%q(..)`, `%w[..]`, `%r{..}`, bare `%(..)` and the rest of the percent family.
    pub(super) fn try_percent_literal(&mut self, start: usize) -> Option<Token> {
        let selector = start + 1;
        let (kind, interpolates, delimiter) = match self.char_at(selector)? {
            'q' => (LiteralKind::String, false, selector + 1),
            'Q' => (LiteralKind::String, true, selector + 1),
            'w' => (LiteralKind::StringArray, false, selector + 1),
            'W' => (LiteralKind::StringArray, true, selector + 1),
            'i' => (LiteralKind::SymbolArray, false, selector + 1),
            'I' => (LiteralKind::SymbolArray, true, selector + 1),
            'r' => (LiteralKind::Regex, true, selector + 1),
            's' => (LiteralKind::Symbol, false, selector + 1),
            'x' => (LiteralKind::Subshell, true, selector + 1),
            c if c.is_ascii_punctuation() => (LiteralKind::String, true, selector),
            _ => return None,
        };
        let open = self
            .char_at(delimiter)
            .filter(|c| c.is_ascii_punctuation())?;
        let close = syntax::closing_delimiter(open);
        let nesting = (close != open).then_some(open);
        Some(self.open_literal(start, delimiter + 1, kind, nesting, close, interpolates))
    }

    pub(super) fn scan_literal(&mut self) -> Token {
        let start = self.pos;
        let Some(scan) = self.contexts.literal_mut().map(|scan| scan.clone()) else {
            return self.scan_normal();
        };
        let words = scan.words();

        if words {
            let mut end = start;
            while let Some(ch) = self.char_at(end).filter(|c| c.is_whitespace()) {
                end += ch.len_utf8();
            }
            if end > start {
                return self.emit(TokenKind::Whitespace, start, end);
            }
        }

        let mut pos = start;
        let mut depth = scan.depth;
        loop {
            let Some(ch) = self.char_at(pos) else {
                if pos > start {
                    return self.literal_content(start, pos, depth);
                }
                let what = match scan.kind {
                    LiteralKind::String => "string literal",
                    LiteralKind::Symbol => "symbol literal",
                    LiteralKind::Subshell => "subshell literal",
                    LiteralKind::Regex => "regex literal",
                    LiteralKind::StringArray | LiteralKind::SymbolArray => "word array",
                };
                self.emit_diag(
                    "E1001",
                    format!("unterminated {what}"),
                    TextRange::empty(pos),
                    Some(("literal starts here", TextRange::new(scan.start, scan.start + 1))),
                );
                self.contexts.pop();
                return self.scan();
            };

            if ch == scan.close && depth == 0 {
                if pos > start {
                    return self.literal_content(start, pos, depth);
                }
                let mut end = pos + ch.len_utf8();
                if scan.kind == LiteralKind::Regex {
                    while self.char_at(end).is_some_and(|c| c.is_ascii_lowercase()) {
                        end += 1;
                    }
                }
                self.contexts.pop();
                return self.emit(TokenKind::StringEnd, pos, end);
            }
            if Some(ch) == scan.open {
                depth += 1;
                pos += ch.len_utf8();
                continue;
            }
            if ch == scan.close {
                depth -= 1;
                pos += ch.len_utf8();
                continue;
            }

            match ch {
                '\\' => {
                    let next = self.char_at(pos + 1);
                    let escape = if scan.kind == LiteralKind::Regex {
                        false
                    } else if scan.interpolates {
                        true
                    } else {
                        next == Some('\\')
                            || next == Some(scan.close)
                            || (next.is_some() && next == scan.open)
                            || (words && next.is_some_and(char::is_whitespace))
                    };
                    if escape {
                        if pos > start {
                            return self.literal_content(start, pos, depth);
                        }
                        return self.scan_escape(pos);
                    }
                    pos += 1 + next.map_or(0, char::len_utf8);
                }
                '#' if scan.interpolates && self.starts_with_at(pos + 1, "{") => {
                    if pos > start {
                        return self.literal_content(start, pos, depth);
                    }
                    self.contexts.push(Context::Interpolation);
                    return self.emit(TokenKind::InterpolationStart, pos, pos + 2);
                }
                c if words && c.is_whitespace() => {
                    return self.literal_content(start, pos, depth);
                }
                _ => pos += ch.len_utf8(),
            }
        }
    }

    fn literal_content(&mut self, start: usize, end: usize, depth: usize) -> Token {
        if let Some(scan) = self.contexts.literal_mut() {
            scan.depth = depth;
        }
        self.emit(TokenKind::StringContent, start, end)
    }

    pub(super) fn scan_escape(&mut self, pos: usize) -> Token {
        let (end, valid) = self.escape_end(pos);
        if valid {
            return self.emit(TokenKind::EscapeSequence, pos, end);
        }
        self.invalid_escape(pos, end);
        self.emit(TokenKind::Error, pos, end)
    }

    pub(super) fn invalid_escape(&mut self, start: usize, end: usize) {
        let text = self.slice(start, end).to_string();
        self.emit_diag(
            "E1003",
            format!("invalid escape sequence `{text}`"),
            TextRange::new(start, end),
            None,
        );
    }

    /// End of the escape starting at the backslash at `pos`, and whether it is well formed.
    pub(super) fn escape_end(&self, pos: usize) -> (usize, bool) {
        let body = pos + 1;
        let Some(ch) = self.char_at(body) else {
            return (body, false);
        };
        match ch {
            'x' => {
                let digits = self.count_while(body + 1, 2, |c| c.is_ascii_hexdigit());
                (body + 1 + digits, digits > 0)
            }
            'u' if self.char_at(body + 1) == Some('{') => {
                let mut end = body + 2;
                let mut digits = 0;
                while let Some(c) = self.char_at(end) {
                    if c.is_ascii_hexdigit() {
                        digits += 1;
                    } else if c != ' ' && c != '\t' {
                        break;
                    }
                    end += 1;
                }
                if digits > 0 && self.char_at(end) == Some('}') {
                    (end + 1, true)
                } else {
                    (end, false)
                }
            }
            'u' => {
                let digits = self.count_while(body + 1, 4, |c| c.is_ascii_hexdigit());
                (body + 1 + digits, digits == 4)
            }
            '0'..='7' => (body + self.count_while(body, 3, is_octal_digit), true),
            'c' => self.control_escape_end(body + 1),
            'C' | 'M' if self.char_at(body + 1) == Some('-') => self.control_escape_end(body + 2),
            _ => (body + ch.len_utf8(), true),
        }
    }

    fn control_escape_end(&self, pos: usize) -> (usize, bool) {
        match self.char_at(pos) {
            Some('\\') => self.escape_end(pos),
            Some(ch) => (pos + ch.len_utf8(), true),
            None => (pos, false),
        }
    }

    fn count_while(&self, pos: usize, max: usize, accept: fn(char) -> bool) -> usize {
        self.rest_at(pos)
            .chars()
            .take(max)
            .take_while(|c| accept(*c))
            .count()
    }
}

#[cfg(test)]
mod tests {
    use crate::cst::TokenKind;
    use crate::lexer::tokenize;

    fn texts(source: &str, kind: TokenKind) -> Vec<String> {
        tokenize(source)
            .0
            .into_iter()
            .filter(|token| token.kind == kind)
            .map(|token| token.text)
            .collect()
    }

    #[test]
    fn percent_literal_starts_include_the_delimiter() {
        assert_eq!(texts("x = %w[a b]", TokenKind::StringArrayStart), vec!["%w["]);
        assert_eq!(texts("x = %i<a b>", TokenKind::SymbolArrayStart), vec!["%i<"]);
        assert_eq!(texts("x = %(a)", TokenKind::StringStart), vec!["%("]);
        assert_eq!(texts("x = %r{a}i", TokenKind::StringEnd), vec!["}i"]);
    }

    #[test]
    fn modulo_is_not_a_literal() {
        assert!(texts("a % b", TokenKind::StringStart).is_empty());
        assert_eq!(texts("a %= 2", TokenKind::Punct), vec!["%="]);
    }

    #[test]
    fn regex_keeps_escaped_delimiters_as_content() {
        let (tokens, diags) = tokenize(r"x = /a\/b/");
        assert!(diags.is_empty(), "{diags:?}");
        let content: Vec<&str> = tokens
            .iter()
            .filter(|token| token.kind == TokenKind::StringContent)
            .map(|token| token.text.as_str())
            .collect();
        assert_eq!(content, vec![r"a\/b"]);
    }

    #[test]
    fn interpolation_nests_inside_strings() {
        let source = r#""a#{"b#{c}"}d""#;
        let starts = texts(source, TokenKind::InterpolationStart);
        let ends = texts(source, TokenKind::InterpolationEnd);
        assert_eq!(starts.len(), 2);
        assert_eq!(ends.len(), 2);
        assert_eq!(texts(source, TokenKind::StringEnd).len(), 2);
    }

    #[test]
    fn quoted_symbols_open_symbol_literals() {
        assert_eq!(texts(r#"x = :"a b""#, TokenKind::SymbolStart), vec![":\""]);
        assert_eq!(texts("x = %s(a)", TokenKind::SymbolStart), vec!["%s("]);
    }

    #[test]
    fn control_and_meta_escapes() {
        let (_, diags) = tokenize(r#""\C-a\M-\C-b\c?\0\177""#);
        assert!(diags.is_empty(), "{diags:?}");
        let (_, diags) = tokenize(r#""\u12""#);
        assert_eq!(diags.len(), 1);
    }
}
