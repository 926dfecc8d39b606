use serde::Serialize;

use crate::cst::TextRange;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Position {
    pub line: usize,
    pub column: usize,
}

/// Line/column span; `end` points at the last character (inclusive), and equals
/// `start` for zero-width spans.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Span {
    pub start: Position,
    pub end: Position,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DiagnosticSeverity {
    Error,
}

#[derive(Debug, Clone, Serialize)]
pub struct DiagnosticLabel {
    pub message: String,
    pub span: Span,
}

#[derive(Debug, Clone, Serialize)]
pub struct Diagnostic {
    pub code: String,
    pub severity: DiagnosticSeverity,
    pub message: String,
    pub span: Span,
    pub labels: Vec<DiagnosticLabel>,
}

/// Byte offset → line/column lookup over one source text.
#[derive(Debug, Clone)]
pub struct LineIndex {
    line_starts: Vec<usize>,
}

impl LineIndex {
    pub fn new(source: &str) -> Self {
        let mut line_starts = vec![0];
        for (offset, byte) in source.bytes().enumerate() {
            if byte == b'\n' {
                line_starts.push(offset + 1);
            }
        }
        Self { line_starts }
    }

    pub fn position(&self, source: &str, offset: usize) -> Position {
        let offset = offset.min(source.len());
        let line = match self.line_starts.binary_search(&offset) {
            Ok(line) => line,
            Err(next) => next - 1,
        };
        let line_start = self.line_starts[line];
        let column = source
            .get(line_start..offset)
            .map(|prefix| prefix.chars().count())
            .unwrap_or(offset - line_start);
        Position {
            line: line + 1,
            column: column + 1,
        }
    }

    pub fn span(&self, source: &str, range: TextRange) -> Span {
        let start = self.position(source, range.start);
        if range.is_empty() {
            return Span { start, end: start };
        }
        let last = source
            .get(..range.end)
            .and_then(|prefix| prefix.char_indices().next_back())
            .map(|(offset, _)| offset)
            .unwrap_or(range.start)
            .max(range.start);
        Span {
            start,
            end: self.position(source, last),
        }
    }
}

pub fn render_diagnostics(path: &str, diagnostics: &[Diagnostic]) -> String {
    let mut output = String::new();
    for (index, diagnostic) in diagnostics.iter().enumerate() {
        if index > 0 {
            output.push('\n');
        }
        output.push_str(&render_diagnostic(path, diagnostic));
    }
    output
}

pub fn render_diagnostic(path: &str, diagnostic: &Diagnostic) -> String {
    let mut output = String::new();
    let start = &diagnostic.span.start;
    let severity = match diagnostic.severity {
        DiagnosticSeverity::Error => "error",
    };
    output.push_str(&format!(
        "{severity}[{}] {}:{}:{} {}\n",
        diagnostic.code, path, start.line, start.column, diagnostic.message
    ));
    for label in &diagnostic.labels {
        let pos = &label.span.start;
        output.push_str(&format!(
            "  note: {} at {}:{}:{}\n",
            label.message, path, pos.line, pos.column
        ));
    }
    output.trim_end().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn line_index_maps_offsets_to_one_based_positions() {
        let src = "ab\ncd\n";
        let index = LineIndex::new(src);
        assert_eq!(index.position(src, 0), Position { line: 1, column: 1 });
        assert_eq!(index.position(src, 3), Position { line: 2, column: 1 });
        assert_eq!(index.position(src, 4), Position { line: 2, column: 2 });
        assert_eq!(index.position(src, 6), Position { line: 3, column: 1 });
    }

    #[test]
    fn span_end_is_inclusive_and_zero_width_spans_collapse() {
        let src = "foo bar";
        let index = LineIndex::new(src);
        let span = index.span(src, TextRange::new(4, 7));
        assert_eq!(span.start, Position { line: 1, column: 5 });
        assert_eq!(span.end, Position { line: 1, column: 7 });
        let empty = index.span(src, TextRange::new(3, 3));
        assert_eq!(empty.start, empty.end);
    }

    #[test]
    fn render_includes_code_location_and_labels() {
        let span = Span {
            start: Position { line: 2, column: 3 },
            end: Position { line: 2, column: 3 },
        };
        let diagnostic = Diagnostic {
            code: "E1500".to_string(),
            severity: DiagnosticSeverity::Error,
            message: "expected `end`".to_string(),
            span,
            labels: vec![DiagnosticLabel {
                message: "`def` opened here".to_string(),
                span,
            }],
        };
        let rendered = render_diagnostics("a.rb", &[diagnostic]);
        assert_eq!(
            rendered,
            "error[E1500] a.rb:2:3 expected `end`\n  note: `def` opened here at a.rb:2:3"
        );
    }
}
