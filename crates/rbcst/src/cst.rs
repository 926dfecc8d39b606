use serde::Serialize;

use crate::diagnostics::Diagnostic;

/// Half-open byte range into the parsed source.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
pub struct TextRange {
    pub start: usize,
    pub end: usize,
}

impl TextRange {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    pub fn empty(offset: usize) -> Self {
        Self::new(offset, offset)
    }

    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    pub fn cover(self, other: TextRange) -> TextRange {
        TextRange::new(self.start.min(other.start), self.end.max(other.end))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenKind {
    Whitespace,
    Comment,
    LineContinuation,
    LineBreak,
    Keyword,
    Punct,
    Identifier,
    Constant,
    InstanceVariable,
    ClassVariable,
    GlobalVariable,
    Integer,
    Float,
    Rational,
    Complex,
    Character,
    Operator,
    SimpleSymbol,
    IdentifierHashKey,
    UnaryMinus,
    BinaryMinus,
    UnaryPlus,
    SplatStar,
    BinaryStar,
    DoubleSplat,
    BlockAmpersand,
    SingletonClassLeftShift,
    StringStart,
    SymbolStart,
    SubshellStart,
    RegexStart,
    StringArrayStart,
    SymbolArrayStart,
    StringContent,
    EscapeSequence,
    InterpolationStart,
    InterpolationEnd,
    StringEnd,
    HeredocBeginning,
    HeredocBodyStart,
    HeredocContent,
    HeredocEnd,
    Uninterpreted,
    Error,
    Eof,
}

impl TokenKind {
    pub fn is_trivia(self) -> bool {
        matches!(
            self,
            TokenKind::Whitespace | TokenKind::Comment | TokenKind::LineContinuation
        )
    }

    /// Tokens that open a delimited literal scanned by the literal sub-lexer.
    pub fn is_literal_start(self) -> bool {
        matches!(
            self,
            TokenKind::StringStart
                | TokenKind::SymbolStart
                | TokenKind::SubshellStart
                | TokenKind::RegexStart
                | TokenKind::StringArrayStart
                | TokenKind::SymbolArrayStart
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Token {
    pub kind: TokenKind,
    pub text: String,
    pub range: TextRange,
}

impl Token {
    pub fn is_trivia(&self) -> bool {
        self.kind.is_trivia()
    }

    pub fn is_keyword(&self, keyword: &str) -> bool {
        self.kind == TokenKind::Keyword && self.text == keyword
    }

    pub fn is_punct(&self, punct: &str) -> bool {
        self.kind == TokenKind::Punct && self.text == punct
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    Program,
    Uninterpreted,
    EmptyStatement,
    BeginBlock,
    EndBlock,
    Undef,
    Alias,
    IfModifier,
    UnlessModifier,
    WhileModifier,
    UntilModifier,
    RescueModifier,
    Method,
    SingletonMethod,
    MethodParameters,
    LambdaParameters,
    BlockParameters,
    DestructuredParameter,
    SplatParameter,
    HashSplatParameter,
    BlockParameter,
    KeywordParameter,
    OptionalParameter,
    Class,
    Superclass,
    SingletonClass,
    Module,
    Return,
    Yield,
    Break,
    Next,
    Redo,
    Retry,
    While,
    Until,
    For,
    In,
    Case,
    When,
    Pattern,
    If,
    Unless,
    Elsif,
    Else,
    Then,
    Begin,
    Ensure,
    Rescue,
    Exceptions,
    ExceptionVariable,
    ParenthesizedStatements,
    ElementReference,
    ScopeResolution,
    Call,
    MethodCall,
    ArgumentList,
    SplatArgument,
    HashSplatArgument,
    BlockArgument,
    DoBlock,
    Block,
    Assignment,
    OperatorAssignment,
    Conditional,
    Range,
    Binary,
    Unary,
    RightAssignmentList,
    LeftAssignmentList,
    DestructuredLeftAssignment,
    RestAssignment,
    Identifier,
    Constant,
    InstanceVariable,
    ClassVariable,
    GlobalVariable,
    Operator,
    Setter,
    Integer,
    Float,
    Complex,
    Rational,
    Character,
    Super,
    True,
    False,
    #[serde(rename = "self")]
    SelfKeyword,
    Nil,
    String,
    ChainedString,
    Subshell,
    StringArray,
    SymbolArray,
    BareString,
    BareSymbol,
    Symbol,
    Regex,
    Interpolation,
    EscapeSequence,
    HeredocBeginning,
    HeredocBody,
    HeredocEnd,
    Array,
    Hash,
    Pair,
    Lambda,
    Error,
}

impl NodeKind {
    pub fn as_str(self) -> &'static str {
        match self {
            NodeKind::Program => "program",
            NodeKind::Uninterpreted => "uninterpreted",
            NodeKind::EmptyStatement => "empty_statement",
            NodeKind::BeginBlock => "begin_block",
            NodeKind::EndBlock => "end_block",
            NodeKind::Undef => "undef",
            NodeKind::Alias => "alias",
            NodeKind::IfModifier => "if_modifier",
            NodeKind::UnlessModifier => "unless_modifier",
            NodeKind::WhileModifier => "while_modifier",
            NodeKind::UntilModifier => "until_modifier",
            NodeKind::RescueModifier => "rescue_modifier",
            NodeKind::Method => "method",
            NodeKind::SingletonMethod => "singleton_method",
            NodeKind::MethodParameters => "method_parameters",
            NodeKind::LambdaParameters => "lambda_parameters",
            NodeKind::BlockParameters => "block_parameters",
            NodeKind::DestructuredParameter => "destructured_parameter",
            NodeKind::SplatParameter => "splat_parameter",
            NodeKind::HashSplatParameter => "hash_splat_parameter",
            NodeKind::BlockParameter => "block_parameter",
            NodeKind::KeywordParameter => "keyword_parameter",
            NodeKind::OptionalParameter => "optional_parameter",
            NodeKind::Class => "class",
            NodeKind::Superclass => "superclass",
            NodeKind::SingletonClass => "singleton_class",
            NodeKind::Module => "module",
            NodeKind::Return => "return",
            NodeKind::Yield => "yield",
            NodeKind::Break => "break",
            NodeKind::Next => "next",
            NodeKind::Redo => "redo",
            NodeKind::Retry => "retry",
            NodeKind::While => "while",
            NodeKind::Until => "until",
            NodeKind::For => "for",
            NodeKind::In => "in",
            NodeKind::Case => "case",
            NodeKind::When => "when",
            NodeKind::Pattern => "pattern",
            NodeKind::If => "if",
            NodeKind::Unless => "unless",
            NodeKind::Elsif => "elsif",
            NodeKind::Else => "else",
            NodeKind::Then => "then",
            NodeKind::Begin => "begin",
            NodeKind::Ensure => "ensure",
            NodeKind::Rescue => "rescue",
            NodeKind::Exceptions => "exceptions",
            NodeKind::ExceptionVariable => "exception_variable",
            NodeKind::ParenthesizedStatements => "parenthesized_statements",
            NodeKind::ElementReference => "element_reference",
            NodeKind::ScopeResolution => "scope_resolution",
            NodeKind::Call => "call",
            NodeKind::MethodCall => "method_call",
            NodeKind::ArgumentList => "argument_list",
            NodeKind::SplatArgument => "splat_argument",
            NodeKind::HashSplatArgument => "hash_splat_argument",
            NodeKind::BlockArgument => "block_argument",
            NodeKind::DoBlock => "do_block",
            NodeKind::Block => "block",
            NodeKind::Assignment => "assignment",
            NodeKind::OperatorAssignment => "operator_assignment",
            NodeKind::Conditional => "conditional",
            NodeKind::Range => "range",
            NodeKind::Binary => "binary",
            NodeKind::Unary => "unary",
            NodeKind::RightAssignmentList => "right_assignment_list",
            NodeKind::LeftAssignmentList => "left_assignment_list",
            NodeKind::DestructuredLeftAssignment => "destructured_left_assignment",
            NodeKind::RestAssignment => "rest_assignment",
            NodeKind::Identifier => "identifier",
            NodeKind::Constant => "constant",
            NodeKind::InstanceVariable => "instance_variable",
            NodeKind::ClassVariable => "class_variable",
            NodeKind::GlobalVariable => "global_variable",
            NodeKind::Operator => "operator",
            NodeKind::Setter => "setter",
            NodeKind::Integer => "integer",
            NodeKind::Float => "float",
            NodeKind::Complex => "complex",
            NodeKind::Rational => "rational",
            NodeKind::Character => "character",
            NodeKind::Super => "super",
            NodeKind::True => "true",
            NodeKind::False => "false",
            NodeKind::SelfKeyword => "self",
            NodeKind::Nil => "nil",
            NodeKind::String => "string",
            NodeKind::ChainedString => "chained_string",
            NodeKind::Subshell => "subshell",
            NodeKind::StringArray => "string_array",
            NodeKind::SymbolArray => "symbol_array",
            NodeKind::BareString => "bare_string",
            NodeKind::BareSymbol => "bare_symbol",
            NodeKind::Symbol => "symbol",
            NodeKind::Regex => "regex",
            NodeKind::Interpolation => "interpolation",
            NodeKind::EscapeSequence => "escape_sequence",
            NodeKind::HeredocBeginning => "heredoc_beginning",
            NodeKind::HeredocBody => "heredoc_body",
            NodeKind::HeredocEnd => "heredoc_end",
            NodeKind::Array => "array",
            NodeKind::Hash => "hash",
            NodeKind::Pair => "pair",
            NodeKind::Lambda => "lambda",
            NodeKind::Error => "error",
        }
    }

    /// Nodes that sit between siblings like trivia instead of belonging to one.
    pub fn is_extra(self) -> bool {
        self == NodeKind::HeredocBody
    }
}

impl std::fmt::Display for NodeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    Receiver,
    Method,
    Arguments,
    Block,
    Object,
    Scope,
    Name,
    Condition,
    Consequence,
    Alternative,
    Body,
    Handler,
    Parameters,
    Superclass,
    Value,
    Left,
    Operator,
    Right,
    Operand,
    Begin,
    End,
    Key,
    Pattern,
    Exceptions,
    Variable,
    Alias,
}

impl Field {
    pub fn as_str(self) -> &'static str {
        match self {
            Field::Receiver => "receiver",
            Field::Method => "method",
            Field::Arguments => "arguments",
            Field::Block => "block",
            Field::Object => "object",
            Field::Scope => "scope",
            Field::Name => "name",
            Field::Condition => "condition",
            Field::Consequence => "consequence",
            Field::Alternative => "alternative",
            Field::Body => "body",
            Field::Handler => "handler",
            Field::Parameters => "parameters",
            Field::Superclass => "superclass",
            Field::Value => "value",
            Field::Left => "left",
            Field::Operator => "operator",
            Field::Right => "right",
            Field::Operand => "operand",
            Field::Begin => "begin",
            Field::End => "end",
            Field::Key => "key",
            Field::Pattern => "pattern",
            Field::Exceptions => "exceptions",
            Field::Variable => "variable",
            Field::Alias => "alias",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Element {
    Node(Node),
    Token(Token),
}

impl Element {
    pub fn range(&self) -> TextRange {
        match self {
            Element::Node(node) => node.range,
            Element::Token(token) => token.range,
        }
    }

    /// Trivia tokens and extra nodes: they never contribute to a node's range.
    pub fn is_extra(&self) -> bool {
        match self {
            Element::Node(node) => node.kind.is_extra(),
            Element::Token(token) => token.is_trivia(),
        }
    }

    pub fn as_node(&self) -> Option<&Node> {
        match self {
            Element::Node(node) => Some(node),
            Element::Token(_) => None,
        }
    }

    pub fn as_token(&self) -> Option<&Token> {
        match self {
            Element::Token(token) => Some(token),
            Element::Node(_) => None,
        }
    }

    fn write_text(&self, out: &mut String) {
        match self {
            Element::Node(node) => node.write_text(out),
            Element::Token(token) => out.push_str(&token.text),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Node {
    pub kind: NodeKind,
    pub range: TextRange,
    pub children: Vec<Element>,
    /// Role name → index into `children`; a role may appear more than once.
    pub fields: Vec<(Field, usize)>,
}

impl Node {
    pub fn field_at(&self, index: usize) -> Option<Field> {
        self.fields
            .iter()
            .find(|(_, child)| *child == index)
            .map(|(field, _)| *field)
    }

    pub fn field(&self, field: Field) -> Option<&Element> {
        self.fields
            .iter()
            .find(|(name, _)| *name == field)
            .and_then(|(_, index)| self.children.get(*index))
    }

    pub fn child_by_field(&self, field: Field) -> Option<&Node> {
        self.children_by_field(field).next()
    }

    pub fn children_by_field(&self, field: Field) -> impl Iterator<Item = &Node> + '_ {
        self.fields
            .iter()
            .filter(move |(name, _)| *name == field)
            .filter_map(|(_, index)| self.children.get(*index))
            .filter_map(Element::as_node)
    }

    pub fn child_nodes(&self) -> impl Iterator<Item = &Node> + '_ {
        self.children.iter().filter_map(Element::as_node)
    }

    /// Child nodes, without extras such as heredoc bodies.
    pub fn named_children(&self) -> impl Iterator<Item = &Node> + '_ {
        self.child_nodes().filter(|node| !node.kind.is_extra())
    }

    pub fn is_error(&self) -> bool {
        self.kind == NodeKind::Error
    }

    pub fn has_errors(&self) -> bool {
        self.is_error() || self.child_nodes().any(Node::has_errors)
    }

    pub fn text(&self) -> String {
        let mut out = String::with_capacity(self.range.len());
        self.write_text(&mut out);
        out
    }

    fn write_text(&self, out: &mut String) {
        for child in &self.children {
            child.write_text(out);
        }
    }

    /// Pre-order walk over this node and every descendant node.
    pub fn walk<'a>(&'a self, visit: &mut impl FnMut(&'a Node)) {
        visit(self);
        for child in self.child_nodes() {
            child.walk(visit);
        }
    }

    pub fn find_all(&self, kind: NodeKind) -> Vec<&Node> {
        let mut found = Vec::new();
        self.walk(&mut |node| {
            if node.kind == kind {
                found.push(node);
            }
        });
        found
    }

    pub fn find_first(&self, kind: NodeKind) -> Option<&Node> {
        self.find_all(kind).into_iter().next()
    }

    pub fn tokens(&self) -> Vec<&Token> {
        let mut tokens = Vec::new();
        self.collect_tokens(&mut tokens);
        tokens
    }

    fn collect_tokens<'a>(&'a self, out: &mut Vec<&'a Token>) {
        for child in &self.children {
            match child {
                Element::Node(node) => node.collect_tokens(out),
                Element::Token(token) => out.push(token),
            }
        }
    }

    pub fn to_sexp(&self) -> String {
        let mut out = String::new();
        self.write_sexp(&mut out);
        out
    }

    fn write_sexp(&self, out: &mut String) {
        out.push('(');
        out.push_str(self.kind.as_str());
        for (index, child) in self.children.iter().enumerate() {
            match child {
                Element::Node(node) => {
                    out.push(' ');
                    if let Some(field) = self.field_at(index) {
                        out.push_str(field.as_str());
                        out.push_str(": ");
                    }
                    node.write_sexp(out);
                }
                Element::Token(token) if token.kind == TokenKind::Comment => {
                    out.push_str(" (comment)");
                }
                Element::Token(_) => {}
            }
        }
        out.push(')');
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SyntaxTree {
    pub source: String,
    pub root: Node,
    pub diagnostics: Vec<Diagnostic>,
}

impl SyntaxTree {
    /// Concatenated leaf text; always equal to `source`.
    pub fn text(&self) -> String {
        self.root.text()
    }

    pub fn has_errors(&self) -> bool {
        self.root.has_errors()
    }

    pub fn errors(&self) -> Vec<&Node> {
        self.root.find_all(NodeKind::Error)
    }

    pub fn to_sexp(&self) -> String {
        self.root.to_sexp()
    }
}

#[derive(Debug, Serialize)]
pub struct CstFile {
    pub path: String,
    pub byte_count: usize,
    pub line_count: usize,
    pub has_errors: bool,
    pub root: Node,
    pub diagnostics: Vec<Diagnostic>,
}

impl CstFile {
    pub fn from_tree(path: String, tree: SyntaxTree) -> Self {
        let has_errors = tree.has_errors();
        Self {
            path,
            byte_count: tree.source.len(),
            line_count: tree.source.lines().count(),
            has_errors,
            root: tree.root,
            diagnostics: tree.diagnostics,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CstBundle {
    pub files: Vec<CstFile>,
}
