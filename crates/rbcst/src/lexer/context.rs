/// Coarse position of the cursor in expression grammar, derived from the
/// previous significant token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum LexState {
    /// Start of an expression: operators read as prefixes.
    Beg,
    /// After something that may be a command head (identifier, constant).
    Arg,
    /// After a finished value.
    End,
    /// After `.`, `&.` or `::`: a method name follows.
    Dot,
    /// After `def`, `alias` or `undef`: a method name follows.
    Fname,
    /// After `class`.
    Class,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum LiteralKind {
    String,
    Symbol,
    Subshell,
    Regex,
    StringArray,
    SymbolArray,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct LiteralScan {
    pub kind: LiteralKind,
    /// Opening delimiter for bracketed forms, which nest.
    pub open: Option<char>,
    pub close: char,
    pub depth: usize,
    pub interpolates: bool,
    pub start: usize,
}

impl LiteralScan {
    pub fn words(&self) -> bool {
        matches!(self.kind, LiteralKind::StringArray | LiteralKind::SymbolArray)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct HeredocSpec {
    pub id: String,
    /// `<<-` and `<<~`: the terminator may be indented.
    pub indented: bool,
    pub interpolates: bool,
    pub start: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct HeredocScan {
    pub spec: HeredocSpec,
    pub started: bool,
    pub at_line_start: bool,
    pub ended: bool,
    /// Queue length when the body began. Anything queued past it was opened
    /// inside this body and starts at its next line.
    pub queued: usize,
}

impl HeredocScan {
    pub fn new(spec: HeredocSpec, queued: usize) -> Self {
        Self {
            spec,
            started: false,
            at_line_start: true,
            ended: false,
            queued,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Context {
    TopLevel,
    Paren { arguments: bool },
    Bracket,
    Brace { hash: bool },
    LambdaParams,
    Interpolation,
    Ternary,
    Literal(LiteralScan),
    Heredoc(HeredocScan),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ClosedGroup {
    Paren,
    Bracket,
    Brace,
    Interpolation,
}

static TOP_LEVEL: Context = Context::TopLevel;

/// Stack of lexical contexts. The bottom `TopLevel` frame is never popped.
#[derive(Debug, Clone)]
pub(crate) struct ContextStack {
    frames: Vec<Context>,
}

impl ContextStack {
    pub fn new() -> Self {
        Self {
            frames: vec![Context::TopLevel],
        }
    }

    pub fn top(&self) -> &Context {
        self.frames.last().unwrap_or(&TOP_LEVEL)
    }

    pub fn top_mut(&mut self) -> Option<&mut Context> {
        if self.frames.len() > 1 {
            self.frames.last_mut()
        } else {
            None
        }
    }

    pub fn push(&mut self, context: Context) {
        self.frames.push(context);
    }

    pub fn pop(&mut self) {
        if self.frames.len() > 1 {
            self.frames.pop();
        }
    }

    pub fn literal_mut(&mut self) -> Option<&mut LiteralScan> {
        match self.top_mut() {
            Some(Context::Literal(scan)) => Some(scan),
            _ => None,
        }
    }

    pub fn heredoc_mut(&mut self) -> Option<&mut HeredocScan> {
        match self.top_mut() {
            Some(Context::Heredoc(scan)) => Some(scan),
            _ => None,
        }
    }

    /// Whether a line break here can terminate a statement.
    pub fn newlines_significant(&self) -> bool {
        for frame in self.frames.iter().rev() {
            match frame {
                Context::Ternary => continue,
                Context::Paren { arguments: true }
                | Context::Bracket
                | Context::Brace { hash: true }
                | Context::LambdaParams => return false,
                _ => return true,
            }
        }
        true
    }

    /// `name:` is a label everywhere except directly inside a ternary.
    pub fn labels_allowed(&self) -> bool {
        !matches!(self.top(), Context::Ternary)
    }

    pub fn in_ternary(&self) -> bool {
        matches!(self.top(), Context::Ternary)
    }

    /// Removes the innermost ternary scope, wherever it sits.
    pub fn remove_ternary(&mut self) {
        if let Some(index) = self
            .frames
            .iter()
            .rposition(|frame| matches!(frame, Context::Ternary))
        {
            self.frames.remove(index);
        }
    }

    /// Pops the group closed by `closer`. Unmatched closers leave the stack alone.
    pub fn close_group(&mut self, closer: char) -> Option<ClosedGroup> {
        for index in (1..self.frames.len()).rev() {
            let found = match (&self.frames[index], closer) {
                (Context::Ternary, _) => continue,
                (Context::Paren { .. } | Context::LambdaParams, ')') => ClosedGroup::Paren,
                (Context::Bracket, ']') => ClosedGroup::Bracket,
                (Context::Brace { .. }, '}') => ClosedGroup::Brace,
                (Context::Interpolation, '}') => ClosedGroup::Interpolation,
                (Context::Paren { .. } | Context::LambdaParams | Context::Bracket, '}') => {
                    continue
                }
                _ => return None,
            };
            self.frames.truncate(index);
            return Some(found);
        }
        None
    }
}
