use crate::builder::{NodeBuilder, Production};
use crate::cst::{Field, Node, NodeKind, Token, TokenKind};

use super::Parser;

const EXPRESSION_KEYWORDS: &[&str] = &[
    "nil", "true", "false", "self", "super", "defined?", "not", "if", "unless", "while", "until",
    "for", "case", "begin", "def", "class", "module", "return", "yield", "break", "next", "redo",
    "retry",
];

/// Keywords that may open the first argument of a command without parentheses.
const COMMAND_ARGUMENT_KEYWORDS: &[&str] = &[
    "nil", "true", "false", "self", "super", "defined?", "case", "begin", "def", "yield",
];

pub(super) fn starts_expression(token: &Token) -> bool {
    match token.kind {
        TokenKind::Identifier
        | TokenKind::Constant
        | TokenKind::InstanceVariable
        | TokenKind::ClassVariable
        | TokenKind::GlobalVariable
        | TokenKind::Integer
        | TokenKind::Float
        | TokenKind::Rational
        | TokenKind::Complex
        | TokenKind::Character
        | TokenKind::SimpleSymbol
        | TokenKind::HeredocBeginning
        | TokenKind::UnaryMinus
        | TokenKind::UnaryPlus
        | TokenKind::Error => true,
        kind if kind.is_literal_start() => true,
        TokenKind::Keyword => EXPRESSION_KEYWORDS.contains(&token.text.as_str()),
        TokenKind::Punct => matches!(
            token.text.as_str(),
            "(" | "[" | "{" | "->" | "::" | "!" | "~" | ".." | "..."
        ),
        _ => false,
    }
}

/// Like [`starts_expression`], minus the keywords that would read as modifiers.
pub(super) fn starts_argument(token: &Token) -> bool {
    let modifier = token.kind == TokenKind::Keyword
        && matches!(token.text.as_str(), "if" | "unless" | "while" | "until");
    !modifier && starts_expression(token)
}

pub(super) fn starts_argument_item(token: &Token) -> bool {
    matches!(
        token.kind,
        TokenKind::SplatStar
            | TokenKind::DoubleSplat
            | TokenKind::BlockAmpersand
            | TokenKind::IdentifierHashKey
    ) || starts_expression(token)
}

/// Whether `token` opens the arguments of a parenthesis-free command.
/// `adjacent` means no whitespace separates it from the command name.
pub(super) fn starts_command_argument(token: &Token, adjacent: bool) -> bool {
    match token.kind {
        TokenKind::SplatStar
        | TokenKind::DoubleSplat
        | TokenKind::BlockAmpersand
        | TokenKind::IdentifierHashKey
        | TokenKind::UnaryMinus
        | TokenKind::UnaryPlus => true,
        TokenKind::Punct => match token.text.as_str() {
            "(" | "[" | "::" => !adjacent,
            "->" | "!" | "~" => true,
            _ => false,
        },
        TokenKind::Keyword => COMMAND_ARGUMENT_KEYWORDS.contains(&token.text.as_str()),
        _ => starts_expression(token),
    }
}

pub(super) fn is_command_head(node: &Node) -> bool {
    matches!(
        node.kind,
        NodeKind::Identifier
            | NodeKind::Constant
            | NodeKind::Call
            | NodeKind::ScopeResolution
            | NodeKind::Super
    )
}

impl Parser<'_> {
    pub(super) fn parse_primary(&mut self, command: bool) -> Node {
        self.nested(|parser| {
            let token = parser.peek().clone();
            match token.kind {
                TokenKind::Identifier => {
                    let head = parser.leaf(NodeKind::Identifier);
                    parser.parse_call_rest(head, command)
                }
                TokenKind::Constant => {
                    let head = parser.leaf(NodeKind::Constant);
                    parser.parse_call_rest(head, command)
                }
                TokenKind::InstanceVariable => parser.leaf(NodeKind::InstanceVariable),
                TokenKind::ClassVariable => parser.leaf(NodeKind::ClassVariable),
                TokenKind::GlobalVariable => parser.leaf(NodeKind::GlobalVariable),
                TokenKind::Integer => parser.leaf(NodeKind::Integer),
                TokenKind::Float => parser.leaf(NodeKind::Float),
                TokenKind::Rational => parser.leaf(NodeKind::Rational),
                TokenKind::Complex => parser.leaf(NodeKind::Complex),
                TokenKind::Character => parser.leaf(NodeKind::Character),
                TokenKind::SimpleSymbol => parser.leaf(NodeKind::Symbol),
                TokenKind::HeredocBeginning => parser.leaf(NodeKind::HeredocBeginning),
                TokenKind::StringStart => parser.parse_string(),
                TokenKind::SymbolStart => parser.parse_literal(NodeKind::Symbol),
                TokenKind::SubshellStart => parser.parse_literal(NodeKind::Subshell),
                TokenKind::RegexStart => parser.parse_literal(NodeKind::Regex),
                TokenKind::StringArrayStart => {
                    parser.parse_word_array(NodeKind::StringArray, NodeKind::BareString)
                }
                TokenKind::SymbolArrayStart => {
                    parser.parse_word_array(NodeKind::SymbolArray, NodeKind::BareSymbol)
                }
                TokenKind::Error => parser.leaf(NodeKind::Error),
                TokenKind::Keyword => parser.parse_keyword_primary(&token, command),
                TokenKind::Punct => match token.text.as_str() {
                    "(" => parser.parse_parenthesized_statements(),
                    "[" => parser.parse_array(),
                    "{" => parser.parse_hash(),
                    "->" => parser.parse_lambda(),
                    "::" => parser.parse_scope_resolution(None, command),
                    _ => parser.missing_expression(),
                },
                _ => parser.missing_expression(),
            }
        })
    }

    fn parse_keyword_primary(&mut self, token: &Token, command: bool) -> Node {
        match token.text.as_str() {
            "nil" => self.leaf(NodeKind::Nil),
            "true" => self.leaf(NodeKind::True),
            "false" => self.leaf(NodeKind::False),
            "self" => self.leaf(NodeKind::SelfKeyword),
            "super" => {
                let head = self.leaf(NodeKind::Super);
                self.parse_call_rest(head, command)
            }
            "if" => self.parse_if(NodeKind::If),
            "unless" => self.parse_if(NodeKind::Unless),
            "while" => self.parse_loop(NodeKind::While),
            "until" => self.parse_loop(NodeKind::Until),
            "for" => self.parse_for(),
            "case" => self.parse_case(),
            "begin" => self.parse_begin(),
            "def" => self.parse_method(),
            "class" => self.parse_class(),
            "module" => self.parse_module(),
            "return" => self.parse_jump(NodeKind::Return, Production::ReturnCommand),
            "yield" => self.parse_jump(NodeKind::Yield, Production::YieldCommand),
            "break" => self.parse_jump(NodeKind::Break, Production::BreakCommand),
            "next" => self.parse_jump(NodeKind::Next, Production::NextCommand),
            "redo" => self.leaf(NodeKind::Redo),
            "retry" => self.leaf(NodeKind::Retry),
            _ => self.missing_expression(),
        }
    }

    fn missing_expression(&mut self) -> Node {
        let found = self.describe_next();
        self.missing("E1502", format!("expected an expression, found {found}"))
    }

    /// `( stmts )`, also used for `defined?(x)` and `not(x)`.
    pub(super) fn parse_parenthesized_statements(&mut self) -> Node {
        let mut group = NodeBuilder::node(NodeKind::ParenthesizedStatements, self.last_end);
        let open = self.bump(&mut group, None);
        self.with_no_do(false, |parser| parser.parse_statements(&mut group, &[")"]));
        self.expect_symbol(&mut group, ")", Some(("opened here", open)));
        group.finish()
    }

    fn parse_array(&mut self) -> Node {
        let mut array = NodeBuilder::node(NodeKind::Array, self.last_end);
        let open = self.bump(&mut array, None);
        self.parse_delimited(&mut array, "]", open, |parser| parser.parse_argument(false));
        array.finish()
    }

    fn parse_hash(&mut self) -> Node {
        let mut hash = NodeBuilder::node(NodeKind::Hash, self.last_end);
        let open = self.bump(&mut hash, None);
        self.parse_delimited(&mut hash, "}", open, Self::parse_hash_item);
        hash.finish()
    }

    fn parse_hash_item(&mut self) -> Node {
        let item = self.parse_argument(false);
        if matches!(item.kind, NodeKind::Pair | NodeKind::HashSplatArgument | NodeKind::Error) {
            return item;
        }
        let range = item.range;
        self.emit_diag(
            "E1503",
            "expected a `key => value` pair".to_string(),
            range,
            None,
        );
        let mut error = NodeBuilder::node(NodeKind::Error, range.start);
        error.push_node(None, item);
        error.finish()
    }

    fn parse_lambda(&mut self) -> Node {
        let mut lambda = NodeBuilder::node(NodeKind::Lambda, self.last_end);
        let arrow = self.bump(&mut lambda, None);
        if self.peek_symbol("(") {
            let parameters = self.parse_parenthesized_parameters(NodeKind::LambdaParameters);
            lambda.push_node(Some(Field::Parameters), parameters);
        } else if matches!(
            self.peek_kind(),
            TokenKind::Identifier
                | TokenKind::IdentifierHashKey
                | TokenKind::SplatStar
                | TokenKind::DoubleSplat
                | TokenKind::BlockAmpersand
        ) {
            let parameters = self.parse_bare_parameters(NodeKind::LambdaParameters);
            lambda.push_node(Some(Field::Parameters), parameters);
        }
        let body = if self.peek_symbol("{") {
            self.parse_brace_block()
        } else if self.peek_keyword("do") {
            self.with_no_do(false, Self::parse_do_block)
        } else {
            let found = self.describe_next();
            let at = self.peek_range();
            self.emit_diag(
                "E1501",
                format!("expected a lambda body, found {found}"),
                at,
                Some(("lambda starts here", arrow)),
            );
            self.error_node()
        };
        lambda.push_node(Some(Field::Body), body);
        lambda.finish()
    }

    /// `return`, `yield`, `break` and `next`, with optional arguments.
    fn parse_jump(&mut self, kind: NodeKind, command: Production) -> Node {
        let mut jump = NodeBuilder::node(kind, self.last_end);
        self.bump(&mut jump, None);
        if self.peek_symbol("(") && self.adjacent() {
            let arguments = self.parse_argument_list();
            jump.push_node(None, arguments);
            return jump.finish();
        }
        let adjacent = self.adjacent();
        let token = self.peek().clone();
        let hash_argument = kind != NodeKind::Yield && token.is_punct("{");
        if !hash_argument && !starts_command_argument(&token, adjacent) {
            return jump.finish();
        }
        jump.set_production(command);
        let arguments = self.parse_command_arguments();
        jump.push_node(None, arguments);
        let node = jump.finish();
        self.last_command = Some(node.range);
        node
    }
}

#[cfg(test)]
mod tests {
    use crate::cst::{Field, NodeKind};
    use crate::parse;

    fn sexp(source: &str) -> String {
        parse(source).expect("parse").to_sexp()
    }

    #[test]
    fn keyword_literals() {
        assert_eq!(
            sexp("nil; true; false; self"),
            "(program (nil) (true) (false) (self))"
        );
    }

    #[test]
    fn hash_with_labels_and_rockets() {
        assert_eq!(
            sexp("{a: 1, \"b\" => 2, **rest}"),
            "(program (hash (pair key: (symbol) value: (integer)) (pair key: (string) value: (integer)) (hash_splat_argument (identifier))))"
        );
    }

    #[test]
    fn hash_entry_without_a_key_is_an_error() {
        let tree = parse("{1}").expect("parse");
        assert!(tree.has_errors());
        assert!(tree.diagnostics.iter().any(|diag| diag.code == "E1503"));
    }

    #[test]
    fn arrays_allow_line_breaks_and_trailing_commas() {
        assert_eq!(
            sexp("[\n  1,\n  *rest,\n]"),
            "(program (array (integer) (splat_argument (identifier))))"
        );
    }

    #[test]
    fn lambda_with_parameters_and_brace_body() {
        assert_eq!(
            sexp("->(x, y = 1) { x + y }"),
            "(program (lambda parameters: (lambda_parameters (identifier) (optional_parameter name: (identifier) value: (integer))) body: (block (binary left: (identifier) right: (identifier)))))"
        );
    }

    #[test]
    fn return_with_and_without_values() {
        let tree = parse("return\nreturn 1, 2\nyield(3)").expect("parse");
        assert!(!tree.has_errors());
        let returns = tree.root.find_all(NodeKind::Return);
        assert_eq!(returns.len(), 2);
        assert_eq!(returns[0].named_children().count(), 0);
        let arguments = returns[1].named_children().next().expect("arguments");
        assert_eq!(arguments.kind, NodeKind::ArgumentList);
        assert_eq!(arguments.named_children().count(), 2);
        assert!(tree.root.find_first(NodeKind::Yield).is_some());
    }

    #[test]
    fn jump_arguments_let_do_reach_the_command() {
        for source in ["return foo bar do end", "next foo bar do |x| x end", "break foo a do end"] {
            let tree = parse(source).expect("parse");
            assert!(!tree.has_errors(), "{source}: {:?}", tree.diagnostics);
            assert_eq!(tree.text(), source);
            let owner = tree
                .root
                .find_all(NodeKind::MethodCall)
                .into_iter()
                .find(|call| call.child_by_field(Field::Block).is_some())
                .expect("block owner");
            assert_eq!(owner.child_by_field(Field::Method).map(|node| node.text()), Some("foo".to_string()));
            assert_eq!(owner.child_by_field(Field::Block).map(|node| node.kind), Some(NodeKind::DoBlock));
        }
    }

    #[test]
    fn jump_with_a_bare_call_and_do_block() {
        let tree = parse("return foo do end").expect("parse");
        assert!(!tree.has_errors(), "{:?}", tree.diagnostics);
        let jump = tree.root.find_first(NodeKind::Return).expect("return");
        assert!(jump.find_first(NodeKind::DoBlock).is_some());
    }

    #[test]
    fn parenthesized_statements_hold_several_statements() {
        assert_eq!(
            sexp("(a; b)"),
            "(program (parenthesized_statements (identifier) (identifier)))"
        );
    }
}
