use crate::builder::{NodeBuilder, Production};
use crate::cst::{Field, Node, NodeKind, TokenKind};

use super::primary::starts_expression;
use super::Parser;

impl Parser<'_> {
    /// One formal parameter of a method, block or lambda. Default values
    /// are parsed at `default_level` so block parameters stop at `|`.
    pub(super) fn parse_parameter(&mut self, default_level: u8) -> Node {
        let token = self.peek().clone();
        match token.kind {
            TokenKind::Identifier => {
                let name = self.leaf(NodeKind::Identifier);
                if !self.peek_symbol("=") {
                    return name;
                }
                let mut optional = NodeBuilder::wrapping(
                    Production::Node(NodeKind::OptionalParameter),
                    Some(Field::Name),
                    name,
                );
                self.bump(&mut optional, None);
                let value = if starts_expression(self.peek()) {
                    self.parse_binary(default_level, false)
                } else {
                    let found = self.describe_next();
                    self.missing("E1502", format!("expected a default value, found {found}"))
                };
                optional.push_node(Some(Field::Value), value);
                optional.finish()
            }
            TokenKind::IdentifierHashKey => {
                let mut keyword = NodeBuilder::node(NodeKind::KeywordParameter, self.last_end);
                let mut name = NodeBuilder::new(Production::KeywordParameterName, self.last_end);
                self.bump(&mut name, None);
                keyword.push_node(Some(Field::Name), name.finish());
                self.bump(&mut keyword, None);
                if starts_expression(self.peek()) {
                    let value = self.parse_binary(default_level, false);
                    keyword.push_node(Some(Field::Value), value);
                }
                keyword.finish()
            }
            TokenKind::SplatStar => self.parse_prefixed_parameter(NodeKind::SplatParameter),
            TokenKind::DoubleSplat => self.parse_prefixed_parameter(NodeKind::HashSplatParameter),
            TokenKind::BlockAmpersand => self.parse_prefixed_parameter(NodeKind::BlockParameter),
            TokenKind::Punct if token.text == "(" => {
                let mut destructured =
                    NodeBuilder::node(NodeKind::DestructuredParameter, self.last_end);
                let open = self.bump(&mut destructured, None);
                self.parse_delimited(&mut destructured, ")", open, |parser| {
                    parser.parse_parameter(0)
                });
                destructured.finish()
            }
            _ => {
                let found = self.describe_next();
                self.missing("E1502", format!("expected a parameter, found {found}"))
            }
        }
    }

    fn parse_prefixed_parameter(&mut self, kind: NodeKind) -> Node {
        let mut parameter = NodeBuilder::node(kind, self.last_end);
        self.bump(&mut parameter, None);
        if self.peek_kind() == TokenKind::Identifier {
            let name = self.leaf(NodeKind::Identifier);
            parameter.push_node(Some(Field::Name), name);
        }
        parameter.finish()
    }

    pub(super) fn parse_parenthesized_parameters(&mut self, kind: NodeKind) -> Node {
        let mut parameters = NodeBuilder::node(kind, self.last_end);
        let open = self.bump(&mut parameters, None);
        self.parse_delimited(&mut parameters, ")", open, |parser| parser.parse_parameter(0));
        parameters.finish()
    }

    /// Parameters written without parentheses, e.g. `def each item, &block`.
    pub(super) fn parse_bare_parameters(&mut self, kind: NodeKind) -> Node {
        let mut parameters = NodeBuilder::node(kind, self.last_end);
        loop {
            let parameter = self.parse_parameter(0);
            parameters.push_node(None, parameter);
            if !self.peek_symbol(",") {
                break;
            }
            self.bump(&mut parameters, None);
        }
        parameters.finish()
    }

    pub(super) fn parse_method(&mut self) -> Node {
        let mut method = NodeBuilder::node(NodeKind::Method, self.last_end);
        let opener = self.bump(&mut method, None);

        let first = if self.peek_symbol("(") {
            self.parse_parenthesized_statements()
        } else {
            self.parse_def_name()
        };
        let singleton = (self.peek_symbol(".") || self.peek_symbol("::")) && self.adjacent();
        if singleton {
            method.set_production(Production::Node(NodeKind::SingletonMethod));
            method.push_node(Some(Field::Object), first);
            self.bump(&mut method, None);
            let name = self.parse_def_name();
            method.push_node(Some(Field::Name), name);
        } else {
            method.push_node(Some(Field::Name), first);
        }

        if self.peek_symbol("(") {
            let parameters = self.parse_parenthesized_parameters(NodeKind::MethodParameters);
            method.push_node(Some(Field::Parameters), parameters);
        } else if matches!(
            self.peek_kind(),
            TokenKind::Identifier
                | TokenKind::IdentifierHashKey
                | TokenKind::SplatStar
                | TokenKind::DoubleSplat
                | TokenKind::BlockAmpersand
        ) {
            let parameters = self.parse_bare_parameters(NodeKind::MethodParameters);
            method.push_node(Some(Field::Parameters), parameters);
        }

        if self.peek_symbol("=") {
            self.bump(&mut method, None);
            let body = if starts_expression(self.peek()) {
                self.parse_binary(0, true)
            } else {
                let found = self.describe_next();
                self.missing("E1502", format!("expected a method body after `=`, found {found}"))
            };
            method.push_node(Some(Field::Body), body);
            return method.finish();
        }

        self.parse_header_end(&mut method);
        self.parse_body_statement(&mut method, opener, "def");
        method.finish()
    }

    /// Name after `def` or after the `.` of a singleton definition.
    fn parse_def_name(&mut self) -> Node {
        let token = self.peek().clone();
        match token.kind {
            TokenKind::Identifier | TokenKind::Constant => {
                let kind = if token.kind == TokenKind::Identifier {
                    NodeKind::Identifier
                } else {
                    NodeKind::Constant
                };
                let name = self.leaf(kind);
                if !(self.peek_symbol("=") && self.adjacent()) {
                    return name;
                }
                let mut setter =
                    NodeBuilder::wrapping(Production::Node(NodeKind::Setter), None, name);
                self.bump(&mut setter, None);
                setter.finish()
            }
            TokenKind::Operator => self.leaf(NodeKind::Operator),
            TokenKind::Keyword => match token.text.as_str() {
                "self" => self.leaf(NodeKind::SelfKeyword),
                "nil" => self.leaf(NodeKind::Nil),
                "true" => self.leaf(NodeKind::True),
                "false" => self.leaf(NodeKind::False),
                _ => self.leaf(NodeKind::Identifier),
            },
            TokenKind::InstanceVariable => self.leaf(NodeKind::InstanceVariable),
            TokenKind::ClassVariable => self.leaf(NodeKind::ClassVariable),
            TokenKind::GlobalVariable => self.leaf(NodeKind::GlobalVariable),
            _ => {
                let found = self.describe_next();
                self.missing("E1502", format!("expected a method name, found {found}"))
            }
        }
    }

    pub(super) fn parse_class(&mut self) -> Node {
        let mut class = NodeBuilder::node(NodeKind::Class, self.last_end);
        let opener = self.bump(&mut class, None);
        if self.peek_kind() == TokenKind::SingletonClassLeftShift {
            class.set_production(Production::Node(NodeKind::SingletonClass));
            self.bump(&mut class, None);
            let value = self.parse_expression();
            class.push_node(Some(Field::Value), value);
        } else {
            let name = self.parse_definition_name("class");
            class.push_node(Some(Field::Name), name);
            if self.peek_symbol("<") {
                let mut superclass = NodeBuilder::node(NodeKind::Superclass, self.last_end);
                self.bump(&mut superclass, None);
                let value = self.parse_expression();
                superclass.push_node(None, value);
                class.push_node(Some(Field::Superclass), superclass.finish());
            }
        }
        self.parse_header_end(&mut class);
        self.parse_body_statement(&mut class, opener, "class");
        class.finish()
    }

    pub(super) fn parse_module(&mut self) -> Node {
        let mut module = NodeBuilder::node(NodeKind::Module, self.last_end);
        let opener = self.bump(&mut module, None);
        let name = self.parse_definition_name("module");
        module.push_node(Some(Field::Name), name);
        self.parse_header_end(&mut module);
        self.parse_body_statement(&mut module, opener, "module");
        module.finish()
    }

    /// `Name`, `Outer::Name` or `::Name` after `class`/`module`.
    fn parse_definition_name(&mut self, keyword: &str) -> Node {
        let mut name = if self.peek_symbol("::") {
            let mut top = NodeBuilder::node(NodeKind::ScopeResolution, self.last_end);
            self.bump(&mut top, None);
            let constant = self.parse_constant_segment(keyword);
            top.push_node(Some(Field::Name), constant);
            top.finish()
        } else {
            self.parse_constant_segment(keyword)
        };
        while self.peek_symbol("::") && self.adjacent() {
            let mut scoped = NodeBuilder::wrapping(
                Production::Node(NodeKind::ScopeResolution),
                Some(Field::Scope),
                name,
            );
            self.bump(&mut scoped, None);
            let constant = self.parse_constant_segment(keyword);
            scoped.push_node(Some(Field::Name), constant);
            name = scoped.finish();
        }
        name
    }

    fn parse_constant_segment(&mut self, keyword: &str) -> Node {
        if self.peek_kind() == TokenKind::Constant {
            return self.leaf(NodeKind::Constant);
        }
        let found = self.describe_next();
        self.missing("E1502", format!("expected a {keyword} name, found {found}"))
    }

    /// Operand of `alias` and `undef`.
    pub(super) fn parse_method_name(&mut self) -> Node {
        let token = self.peek().clone();
        match token.kind {
            TokenKind::Identifier | TokenKind::Keyword => self.leaf(NodeKind::Identifier),
            TokenKind::Constant => self.leaf(NodeKind::Constant),
            TokenKind::Operator => self.leaf(NodeKind::Operator),
            TokenKind::InstanceVariable => self.leaf(NodeKind::InstanceVariable),
            TokenKind::ClassVariable => self.leaf(NodeKind::ClassVariable),
            TokenKind::GlobalVariable => self.leaf(NodeKind::GlobalVariable),
            TokenKind::SimpleSymbol => self.leaf(NodeKind::Symbol),
            TokenKind::SymbolStart => self.parse_literal(NodeKind::Symbol),
            _ => {
                let found = self.describe_next();
                self.missing("E1502", format!("expected a method name, found {found}"))
            }
        }
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
    fn method_with_every_parameter_form() {
        assert_eq!(
            sexp("def run(a, b = 1, *rest, c:, d: 2, **opts, &blk)\nend"),
            "(program (method name: (identifier) parameters: (method_parameters (identifier) (optional_parameter name: (identifier) value: (integer)) (splat_parameter name: (identifier)) (keyword_parameter name: (identifier)) (keyword_parameter name: (identifier) value: (integer)) (hash_splat_parameter name: (identifier)) (block_parameter name: (identifier)))))"
        );
    }

    #[test]
    fn singleton_method_on_self() {
        assert_eq!(
            sexp("def self.build; end"),
            "(program (singleton_method object: (self) name: (identifier)))"
        );
    }

    #[test]
    fn setter_and_operator_names() {
        let tree = parse("def value=(v)\nend\ndef <=>(other)\nend\ndef -@\nend").expect("parse");
        assert!(!tree.has_errors(), "{}", tree.to_sexp());
        let names: Vec<NodeKind> = tree
            .root
            .find_all(NodeKind::Method)
            .iter()
            .filter_map(|method| method.child_by_field(Field::Name))
            .map(|name| name.kind)
            .collect();
        assert_eq!(
            names,
            vec![NodeKind::Setter, NodeKind::Operator, NodeKind::Operator]
        );
    }

    #[test]
    fn bare_parameters() {
        assert_eq!(
            sexp("def each item, &block\nend"),
            "(program (method name: (identifier) parameters: (method_parameters (identifier) (block_parameter name: (identifier)))))"
        );
    }

    #[test]
    fn endless_method() {
        assert_eq!(
            sexp("def double(x) = x * 2"),
            "(program (method name: (identifier) parameters: (method_parameters (identifier)) body: (binary left: (identifier) right: (integer))))"
        );
    }

    #[test]
    fn class_with_scoped_name_and_superclass() {
        assert_eq!(
            sexp("class Outer::Inner < Base\n  def go; end\nend"),
            "(program (class name: (scope_resolution scope: (constant) name: (constant)) superclass: (superclass (constant)) (method name: (identifier))))"
        );
    }

    #[test]
    fn singleton_class_and_module() {
        assert_eq!(
            sexp("module Tools\n  class << self\n    attr_reader :x\n  end\nend"),
            "(program (module name: (constant) (singleton_class value: (self) (method_call method: (identifier) arguments: (argument_list (symbol))))))"
        );
    }

    #[test]
    fn missing_end_points_at_the_opener() {
        let tree = parse("class Foo\n  def bar\n  end\n").expect("parse");
        let diag = tree
            .diagnostics
            .iter()
            .find(|diag| diag.code == "E1500")
            .expect("missing end");
        assert!(diag.message.contains("`class`"));
        assert_eq!(diag.labels[0].span.start.line, 1);
    }
}
