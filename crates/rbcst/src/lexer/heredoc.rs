use crate::cst::{TextRange, Token, TokenKind};
use crate::syntax;

use super::context::{Context, HeredocScan, HeredocSpec};
use super::{Lexer, Snapshot};

impl<'src> Lexer<'src> {
    /// Reads a `<<ID`, `<<-ID`, `<<~ID` or quoted-identifier opener and queues its body.
    pub(super) fn try_heredoc(&mut self, start: usize) -> Option<Token> {
        let mut pos = start + 2;
        let mut indented = false;
        if let Some('-' | '~') = self.char_at(pos) {
            indented = true;
            pos += 1;
        }
        let (id, interpolates, end) = match self.char_at(pos)? {
            quote @ ('"' | '\'' | '`') => {
                let id_start = pos + 1;
                let mut close = id_start;
                loop {
                    match self.char_at(close)? {
                        '\n' => return None,
                        c if c == quote => break,
                        c => close += c.len_utf8(),
                    }
                }
                if close == id_start {
                    return None;
                }
                (self.slice(id_start, close), quote != '\'', close + 1)
            }
            c if syntax::is_identifier_start(c) => {
                let end = self.identifier_end(pos);
                (self.slice(pos, end), true, end)
            }
            _ => return None,
        };
        if self.trace {
            eprintln!("[RBCST_TRACE_LEX] heredoc <<{id} queued at byte {start}");
        }
        self.heredocs.push_back(HeredocSpec {
            id: id.to_string(),
            indented,
            interpolates,
            start,
        });
        Some(self.emit(TokenKind::HeredocBeginning, start, end))
    }

    pub(super) fn begin_heredoc_bodies(&mut self) {
        let Some(spec) = self.heredocs.pop_front() else {
            return;
        };
        let queued = self.heredocs.len();
        self.contexts.push(Context::Heredoc(HeredocScan::new(spec, queued)));
    }

    /// Starts the first body opened inside the enclosing body, which sits at `index` in the queue.
    fn begin_nested_heredoc(&mut self, index: usize) {
        let Some(spec) = self.heredocs.remove(index) else {
            return;
        };
        if self.trace {
            eprintln!("[RBCST_TRACE_LEX] nested heredoc <<{} begins at byte {}", spec.id, self.pos);
        }
        let queued = self.heredocs.len();
        self.contexts.push(Context::Heredoc(HeredocScan::new(spec, queued)));
    }

    fn finish_heredoc_bodies(&mut self) {
        // Inside an outer body: run its remaining nested bodies, then resume it.
        if let Some(queued) = self.contexts.heredoc_mut().map(|outer| outer.queued) {
            if self.heredocs.len() > queued {
                self.begin_nested_heredoc(queued);
            }
            return;
        }
        if !self.heredocs.is_empty() {
            self.begin_heredoc_bodies();
            return;
        }
        if let Some(saved) = self.saved.take() {
            self.state = saved.state;
            self.can_end_statement = saved.can_end_statement;
            self.last_end = saved.last_end;
            self.prev = saved.prev;
        }
    }

    pub(super) fn scan_heredoc_body(&mut self) -> Token {
        let start = self.pos;
        let Some((started, ended, at_line_start, queued, spec)) = self.contexts.heredoc_mut().map(|scan| {
            let snapshot = (
                scan.started,
                scan.ended,
                scan.at_line_start,
                scan.queued,
                scan.spec.clone(),
            );
            scan.started = true;
            snapshot
        }) else {
            return self.scan_normal();
        };

        if !started {
            // The first body of a line saves the state the code after the bodies resumes from.
            if self.saved.is_none() {
                self.saved = Some(Snapshot {
                    state: self.state,
                    can_end_statement: self.can_end_statement,
                    last_end: self.last_end,
                    prev: self.prev,
                });
            }
            return self.emit(TokenKind::HeredocBodyStart, start, start);
        }
        if ended {
            self.contexts.pop();
            let more = !self.heredocs.is_empty() || self.contexts.heredoc_mut().is_some();
            self.finish_heredoc_bodies();
            if more {
                let end = if self.starts_with_at(start, "\r\n") {
                    start + 2
                } else if self.starts_with_at(start, "\n") {
                    start + 1
                } else {
                    start
                };
                if end > start {
                    return self.emit(TokenKind::Whitespace, start, end);
                }
            }
            return self.scan();
        }

        let mut pos = start;
        let mut line_start = at_line_start;
        loop {
            if line_start {
                if self.heredocs.len() > queued {
                    if pos > start {
                        return self.heredoc_content(start, pos, true);
                    }
                    self.begin_nested_heredoc(queued);
                    return self.scan();
                }
                if let Some(end) = self.heredoc_terminator(pos, &spec) {
                    if pos > start {
                        return self.heredoc_content(start, pos, true);
                    }
                    if let Some(scan) = self.contexts.heredoc_mut() {
                        scan.ended = true;
                    }
                    return self.emit(TokenKind::HeredocEnd, pos, end);
                }
                line_start = false;
            }
            let Some(ch) = self.char_at(pos) else {
                if pos > start {
                    return self.heredoc_content(start, pos, false);
                }
                self.emit_diag(
                    "E1002",
                    format!("unterminated heredoc, expected `{}`", spec.id),
                    TextRange::empty(pos),
                    Some((
                        "heredoc opened here",
                        TextRange::new(spec.start, spec.start + 2),
                    )),
                );
                self.contexts.pop();
                self.finish_heredoc_bodies();
                return self.scan();
            };
            match ch {
                '\\' if spec.interpolates => {
                    if pos > start {
                        return self.heredoc_content(start, pos, false);
                    }
                    self.leave_line_start();
                    return self.scan_escape(pos);
                }
                '#' if spec.interpolates && self.starts_with_at(pos + 1, "{") => {
                    if pos > start {
                        return self.heredoc_content(start, pos, false);
                    }
                    self.leave_line_start();
                    self.contexts.push(Context::Interpolation);
                    return self.emit(TokenKind::InterpolationStart, pos, pos + 2);
                }
                '\n' => {
                    pos += 1;
                    line_start = true;
                }
                _ => pos += ch.len_utf8(),
            }
        }
    }

    fn leave_line_start(&mut self) {
        if let Some(scan) = self.contexts.heredoc_mut() {
            scan.at_line_start = false;
        }
    }

    fn heredoc_content(&mut self, start: usize, end: usize, at_line_start: bool) -> Token {
        if let Some(scan) = self.contexts.heredoc_mut() {
            scan.at_line_start = at_line_start;
        }
        self.emit(TokenKind::HeredocContent, start, end)
    }

    /// End of the terminator line's identifier when the line at `pos` closes the body.
    fn heredoc_terminator(&self, pos: usize, spec: &HeredocSpec) -> Option<usize> {
        let mut id_start = pos;
        if spec.indented {
            while let Some(' ' | '\t') = self.char_at(id_start) {
                id_start += 1;
            }
        }
        if !self.starts_with_at(id_start, &spec.id) {
            return None;
        }
        let end = id_start + spec.id.len();
        let closes = end == self.source.len()
            || self.starts_with_at(end, "\n")
            || self.starts_with_at(end, "\r\n");
        closes.then_some(end)
    }
}
