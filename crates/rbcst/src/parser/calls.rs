use crate::builder::{NodeBuilder, Production};
use crate::cst::{Field, Node, NodeKind, TextRange, TokenKind};
use crate::policy::PREC_BITWISE_OR;

use super::primary::{is_command_head, starts_argument_item, starts_command_argument, starts_expression};
use super::statements::{closes_group, opens_group};
use super::Parser;

impl Parser<'_> {
    pub(super) fn parse_primary_postfix(&mut self, command: bool) -> Node {
        let node = self.parse_primary(command);
        self.parse_postfix(node, command)
    }

    /// `.name`, `&.name`, `::Name` and `[index]` chains.
    pub(super) fn parse_postfix(&mut self, node: Node, command: bool) -> Node {
        self.chain(|parser| {
            let mut node = node;
            loop {
                if parser.last_command == Some(node.range) || parser.fatal {
                    return node;
                }
                let adjacent = parser.adjacent();
                let token = parser.peek().clone();
                let spaced_head = !adjacent && command && is_command_head(&node);
                let call = token.is_punct(".") || token.is_punct("&.");
                let scope = token.is_punct("::") && !spaced_head;
                let index = token.is_punct("[") && !spaced_head;
                if !(call || scope || index) || !parser.deepen() {
                    return node;
                }
                node = if call {
                    parser.parse_call(node, command)
                } else if scope {
                    parser.parse_scope_resolution(Some(node), command)
                } else {
                    parser.parse_element_reference(node)
                };
            }
        })
    }

    fn parse_call(&mut self, receiver: Node, command: bool) -> Node {
        let mut call =
            NodeBuilder::wrapping(Production::Node(NodeKind::Call), Some(Field::Receiver), receiver);
        self.bump(&mut call, None);
        let token = self.peek().clone();
        match token.kind {
            TokenKind::Identifier => {
                let method = self.leaf(NodeKind::Identifier);
                call.push_node(Some(Field::Method), method);
            }
            TokenKind::Constant => {
                let method = self.leaf(NodeKind::Constant);
                call.push_node(Some(Field::Method), method);
            }
            TokenKind::Operator => {
                let method = self.leaf(NodeKind::Operator);
                call.push_node(Some(Field::Method), method);
            }
            // `proc.()` calls `call` implicitly.
            TokenKind::Punct if token.text == "(" => {
                let arguments = self.parse_argument_list();
                call.push_node(Some(Field::Method), arguments);
                let node = call.finish();
                return self.parse_block_attachment(node);
            }
            _ => {
                let found = self.describe_next();
                let missing = self.missing("E1502", format!("expected a method name, found {found}"));
                call.push_node(Some(Field::Method), missing);
                return call.finish();
            }
        }
        let node = call.finish();
        self.parse_call_rest(node, command)
    }

    /// `Scope::Name` or, without a scope, `::Name`.
    pub(super) fn parse_scope_resolution(&mut self, scope: Option<Node>, command: bool) -> Node {
        let mut resolution = match scope {
            Some(scope) => NodeBuilder::wrapping(
                Production::Node(NodeKind::ScopeResolution),
                Some(Field::Scope),
                scope,
            ),
            None => NodeBuilder::node(NodeKind::ScopeResolution, self.last_end),
        };
        self.bump(&mut resolution, None);
        let name = match self.peek_kind() {
            TokenKind::Constant => self.leaf(NodeKind::Constant),
            TokenKind::Identifier => self.leaf(NodeKind::Identifier),
            _ => {
                let found = self.describe_next();
                self.missing("E1502", format!("expected a name after `::`, found {found}"))
            }
        };
        resolution.push_node(Some(Field::Name), name);
        let node = resolution.finish();
        self.parse_call_rest(node, command)
    }

    fn parse_element_reference(&mut self, object: Node) -> Node {
        let mut reference = NodeBuilder::wrapping(
            Production::Node(NodeKind::ElementReference),
            Some(Field::Object),
            object,
        );
        let open = self.bump(&mut reference, None);
        self.parse_delimited(&mut reference, "]", open, |parser| parser.parse_argument(false));
        let node = reference.finish();
        self.parse_block_attachment(node)
    }

    /// What may follow a method name: parenthesized arguments, command
    /// arguments or a block.
    pub(super) fn parse_call_rest(&mut self, head: Node, command: bool) -> Node {
        if self.fatal {
            return head;
        }
        let adjacent = self.adjacent();
        if adjacent && self.peek_symbol("(") {
            let mut call = NodeBuilder::wrapping(
                Production::Node(NodeKind::MethodCall),
                Some(Field::Method),
                head,
            );
            let arguments = self.parse_argument_list();
            call.push_node(Some(Field::Arguments), arguments);
            let node = call.finish();
            return self.parse_block_attachment(node);
        }
        if command && is_command_head(&head) && starts_command_argument(self.peek(), adjacent) {
            return self.parse_command(head);
        }
        self.parse_block_attachment(head)
    }

    fn parse_command(&mut self, head: Node) -> Node {
        let mut call = NodeBuilder::wrapping(Production::CommandCall, Some(Field::Method), head);
        let arguments = self.with_no_do(true, Self::parse_command_arguments);
        call.push_node(Some(Field::Arguments), arguments);
        if !self.no_do && self.peek_keyword("do") {
            let block = self.parse_do_block();
            call.push_node(Some(Field::Block), block);
        }
        let node = call.finish();
        self.last_command = Some(node.range);
        self.trace(|| format!("command call at {}..{}", node.range.start, node.range.end));
        node
    }

    pub(super) fn parse_command_arguments(&mut self) -> Node {
        let mut list = NodeBuilder::new(Production::CommandArgumentList, self.last_end);
        loop {
            let argument = self.parse_argument(true);
            list.push_node(None, argument);
            if !self.peek_symbol(",") {
                break;
            }
            self.bump(&mut list, None);
            while self.peek_kind() == TokenKind::LineBreak {
                self.bump(&mut list, None);
            }
            if !starts_argument_item(self.peek()) {
                let found = self.describe_next();
                let missing = self.missing("E1502", format!("expected an argument after `,`, found {found}"));
                list.push_node(None, missing);
                break;
            }
        }
        list.finish()
    }

    /// One call argument, array element or hash entry.
    pub(super) fn parse_argument(&mut self, command: bool) -> Node {
        match self.peek_kind() {
            TokenKind::SplatStar => return self.parse_splat_argument(),
            TokenKind::DoubleSplat => {
                return self.parse_prefixed_argument(NodeKind::HashSplatArgument)
            }
            TokenKind::BlockAmpersand => {
                return self.parse_prefixed_argument(NodeKind::BlockArgument)
            }
            TokenKind::IdentifierHashKey => return self.parse_label_pair(),
            _ => {}
        }
        if !starts_expression(self.peek()) {
            let found = self.describe_next();
            return self.missing("E1502", format!("expected an argument, found {found}"));
        }
        let value = self.parse_binary(0, command);
        self.parse_pair_rest(value)
    }

    pub(super) fn parse_splat_argument(&mut self) -> Node {
        self.parse_prefixed_argument(NodeKind::SplatArgument)
    }

    /// `*x`, `**x` and `&x`; the operand is optional for anonymous forwarding.
    fn parse_prefixed_argument(&mut self, kind: NodeKind) -> Node {
        let mut argument = NodeBuilder::node(kind, self.last_end);
        self.bump(&mut argument, None);
        if starts_expression(self.peek()) {
            let value = self.parse_binary(0, false);
            argument.push_node(None, value);
        }
        argument.finish()
    }

    fn parse_label_pair(&mut self) -> Node {
        let mut pair = NodeBuilder::node(NodeKind::Pair, self.last_end);
        let mut key = NodeBuilder::new(Production::IdentifierHashKey, self.last_end);
        self.bump(&mut key, None);
        pair.push_node(Some(Field::Key), key.finish());
        self.bump(&mut pair, None);
        while self.peek_kind() == TokenKind::LineBreak {
            self.bump(&mut pair, None);
        }
        if starts_argument_item(self.peek()) && self.peek_kind() != TokenKind::IdentifierHashKey {
            let value = self.parse_binary(0, false);
            pair.push_node(Some(Field::Value), value);
        }
        pair.finish()
    }

    /// `key => value`, or `"key": value` after a string.
    fn parse_pair_rest(&mut self, key: Node) -> Node {
        let string_label = key.kind == NodeKind::String && self.adjacent() && self.peek_symbol(":");
        if !self.peek_symbol("=>") && !string_label {
            return key;
        }
        let mut pair = NodeBuilder::wrapping(Production::Node(NodeKind::Pair), Some(Field::Key), key);
        let arrow = self.bump(&mut pair, None);
        while self.peek_kind() == TokenKind::LineBreak {
            self.bump(&mut pair, None);
        }
        let value = if starts_expression(self.peek()) {
            self.parse_binary(0, false)
        } else {
            let found = self.describe_next();
            let at = self.peek_range();
            self.emit_diag(
                "E1502",
                format!("expected a value for this key, found {found}"),
                at,
                Some(("key ends here", arrow)),
            );
            self.error_node()
        };
        pair.push_node(Some(Field::Value), value);
        pair.finish()
    }

    /// `( args )` directly after a method name.
    pub(super) fn parse_argument_list(&mut self) -> Node {
        let mut list = NodeBuilder::node(NodeKind::ArgumentList, self.last_end);
        let open = self.bump(&mut list, None);
        self.parse_delimited(&mut list, ")", open, |parser| parser.parse_argument(false));
        list.finish()
    }

    /// Comma separated items up to `closer`, trailing comma and line breaks allowed.
    pub(super) fn parse_delimited(
        &mut self,
        builder: &mut NodeBuilder,
        closer: &str,
        open: TextRange,
        mut item: impl FnMut(&mut Self) -> Node,
    ) {
        self.with_no_do(false, |parser| loop {
            while parser.peek_kind() == TokenKind::LineBreak {
                parser.bump(builder, None);
            }
            if parser.peek_symbol(closer) || parser.at_eof() || parser.fatal {
                break;
            }
            let mark = parser.consumed;
            let diagnostics = parser.diagnostics.len();
            let node = item(parser);
            if parser.consumed == mark {
                parser.diagnostics.truncate(diagnostics);
                parser.recover_in_list(builder, closer);
            } else {
                builder.push_node(None, node);
            }
            while parser.peek_kind() == TokenKind::LineBreak {
                parser.bump(builder, None);
            }
            if parser.peek_symbol(",") {
                parser.bump(builder, None);
                continue;
            }
            if !parser.peek_symbol(closer) && !parser.at_eof() {
                parser.recover_in_list(builder, closer);
                if parser.peek_symbol(",") {
                    parser.bump(builder, None);
                    continue;
                }
            }
            break;
        });
        self.expect_symbol(builder, closer, Some(("opened here", open)));
    }

    /// Skips tokens up to the next `,` or `closer` at the current nesting level.
    fn recover_in_list(&mut self, builder: &mut NodeBuilder, closer: &str) {
        let first = self.peek_range();
        let found = self.describe_next();
        let mut error = NodeBuilder::node(NodeKind::Error, self.last_end);
        let mut depth = 0usize;
        loop {
            let token = self.peek().clone();
            if token.kind == TokenKind::Eof {
                break;
            }
            let started = !error.is_empty();
            if depth == 0 && (token.is_punct(closer) || token.is_punct(",")) {
                break;
            }
            if opens_group(&token) {
                depth += 1;
            } else if closes_group(&token) || token.is_keyword("end") {
                if depth == 0 && started {
                    break;
                }
                depth = depth.saturating_sub(1);
            }
            self.bump(&mut error, None);
        }
        let error = error.finish();
        self.trace(|| format!("skipped {found} in list up to {}", error.range.end));
        self.emit_diag("E1503", format!("unexpected {found} in list"), first, None);
        builder.push_node(None, error);
    }

    /// Attaches a `{ }` or `do end` block to a call-like node.
    pub(super) fn parse_block_attachment(&mut self, node: Node) -> Node {
        let brace = self.peek_symbol("{");
        let do_block = !self.no_do && self.peek_keyword("do");
        if !brace && !do_block {
            return node;
        }
        if !matches!(
            node.kind,
            NodeKind::Identifier
                | NodeKind::Constant
                | NodeKind::Call
                | NodeKind::ScopeResolution
                | NodeKind::Super
                | NodeKind::MethodCall
                | NodeKind::ElementReference
        ) || node.child_by_field(Field::Block).is_some()
        {
            return node;
        }
        let mut call = if node.kind == NodeKind::MethodCall {
            NodeBuilder::reopen(node)
        } else {
            NodeBuilder::wrapping(Production::Node(NodeKind::MethodCall), Some(Field::Method), node)
        };
        let block = if brace {
            self.parse_brace_block()
        } else {
            self.parse_do_block()
        };
        call.push_node(Some(Field::Block), block);
        call.finish()
    }

    pub(super) fn parse_brace_block(&mut self) -> Node {
        let mut block = NodeBuilder::node(NodeKind::Block, self.last_end);
        let open = self.bump(&mut block, None);
        if self.peek_symbol("|") || self.peek_symbol("||") {
            let parameters = self.parse_block_parameters();
            block.push_node(Some(Field::Parameters), parameters);
        }
        self.with_no_do(false, |parser| parser.parse_statements(&mut block, &["}"]));
        self.expect_symbol(&mut block, "}", Some(("block opened here", open)));
        block.finish()
    }

    pub(super) fn parse_do_block(&mut self) -> Node {
        let mut block = NodeBuilder::node(NodeKind::DoBlock, self.last_end);
        let opener = self.bump(&mut block, None);
        if self.peek_symbol("|") || self.peek_symbol("||") {
            let parameters = self.parse_block_parameters();
            block.push_node(Some(Field::Parameters), parameters);
        }
        self.with_no_do(false, |parser| parser.parse_body_statement(&mut block, opener, "do"));
        block.finish()
    }

    fn parse_block_parameters(&mut self) -> Node {
        let mut parameters = NodeBuilder::node(NodeKind::BlockParameters, self.last_end);
        let open = self.bump(&mut parameters, None);
        if self.source.get(open.start..open.end) == Some("||") {
            return parameters.finish();
        }
        while !self.peek_symbol("|") && !self.peek_symbol(";") && !self.at_eof() {
            let mark = self.consumed;
            let parameter = self.parse_parameter(PREC_BITWISE_OR + 1);
            parameters.push_node(None, parameter);
            if self.consumed == mark || !self.peek_symbol(",") {
                break;
            }
            self.bump(&mut parameters, None);
        }
        if self.peek_symbol(";") {
            self.bump(&mut parameters, None);
            while self.peek_kind() == TokenKind::Identifier {
                let local = self.leaf(NodeKind::Identifier);
                parameters.push_node(None, local);
                if !self.peek_symbol(",") {
                    break;
                }
                self.bump(&mut parameters, None);
            }
        }
        self.expect_symbol(&mut parameters, "|", Some(("parameters start here", open)));
        parameters.finish()
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
    fn command_call_without_parentheses() {
        assert_eq!(
            sexp("puts a, b"),
            "(program (method_call method: (identifier) arguments: (argument_list (identifier) (identifier))))"
        );
    }

    #[test]
    fn method_chain_with_arguments() {
        assert_eq!(
            sexp("a.b(1).c"),
            "(program (call receiver: (method_call method: (call receiver: (identifier) method: (identifier)) arguments: (argument_list (integer))) method: (identifier)))"
        );
    }

    #[test]
    fn nested_command_owns_the_rest_of_the_line() {
        assert_eq!(
            sexp("foo bar baz"),
            "(program (method_call method: (identifier) arguments: (argument_list (method_call method: (identifier) arguments: (argument_list (identifier))))))"
        );
    }

    #[test]
    fn do_block_binds_to_the_outer_command() {
        let tree = parse("foo bar do |x| x end").expect("parse");
        assert!(!tree.has_errors());
        let call = tree.root.child_nodes().next().expect("call");
        assert_eq!(call.kind, NodeKind::MethodCall);
        assert_eq!(call.child_by_field(Field::Method).map(|node| node.text()), Some("foo".to_string()));
        let block = call.child_by_field(Field::Block).expect("block");
        assert_eq!(block.kind, NodeKind::DoBlock);
        assert!(block.child_by_field(Field::Parameters).is_some());
    }

    #[test]
    fn brace_block_binds_to_the_nearest_call() {
        let tree = parse("foo bar { 1 }").expect("parse");
        let outer = tree.root.child_nodes().next().expect("call");
        let arguments = outer.child_by_field(Field::Arguments).expect("arguments");
        let inner = arguments.named_children().next().expect("inner call");
        assert_eq!(inner.kind, NodeKind::MethodCall);
        assert!(inner.child_by_field(Field::Block).is_some());
    }

    #[test]
    fn scope_resolution_and_element_reference() {
        assert_eq!(
            sexp("Foo::Bar[1]"),
            "(program (element_reference object: (scope_resolution scope: (constant) name: (constant)) (integer)))"
        );
        assert_eq!(
            sexp("::Top"),
            "(program (scope_resolution name: (constant)))"
        );
    }

    #[test]
    fn safe_navigation_and_operator_methods() {
        assert_eq!(
            sexp("a&.b\nx.+(1)"),
            "(program (call receiver: (identifier) method: (identifier)) (method_call method: (call receiver: (identifier) method: (operator)) arguments: (argument_list (integer))))"
        );
    }

    #[test]
    fn keyword_arguments_and_block_pass() {
        assert_eq!(
            sexp("run(1, key: 2, &blk)"),
            "(program (method_call method: (identifier) arguments: (argument_list (integer) (pair key: (symbol) value: (integer)) (block_argument (identifier)))))"
        );
    }

    #[test]
    fn block_parameters_with_defaults_and_locals() {
        assert_eq!(
            sexp("each { |a, (b, c), *d; e| }"),
            "(program (method_call method: (identifier) block: (block parameters: (block_parameters (identifier) (destructured_parameter (identifier) (identifier)) (splat_parameter name: (identifier)) (identifier)))))"
        );
    }

    #[test]
    fn leading_dot_continues_the_chain() {
        assert_eq!(
            sexp("items\n  .map(&:to_s)\n  .join"),
            "(program (call receiver: (method_call method: (call receiver: (identifier) method: (identifier)) arguments: (argument_list (block_argument (symbol)))) method: (identifier)))"
        );
    }

    #[test]
    fn unclosed_argument_list_reports_the_opener() {
        let tree = parse("foo(1, 2").expect("parse");
        let diag = tree
            .diagnostics
            .iter()
            .find(|diag| diag.code == "E1501")
            .expect("missing paren");
        assert_eq!(diag.labels[0].message, "opened here");
    }
}
