use crate::builder::{NodeBuilder, Production};
use crate::cst::{Field, Node, NodeKind, TokenKind};
use crate::policy::{
    infix_for_token, is_assignment_operator, prefix_operand_level, Assoc, InfixKind,
    InfixOperator, PREC_CONDITIONAL, PREC_RANGE,
};

use super::primary::{starts_argument, starts_expression};
use super::Parser;

impl Parser<'_> {
    /// A full statement expression: may be a multiple assignment.
    pub(super) fn parse_expression_statement(&mut self) -> Node {
        self.parse_and_or(true)
    }

    /// `and`/`or` chains over `not`, commands and assignments.
    pub(super) fn parse_expression(&mut self) -> Node {
        if !starts_expression(self.peek()) {
            let found = self.describe_next();
            return self.missing("E1502", format!("expected an expression, found {found}"));
        }
        self.parse_and_or(false)
    }

    fn parse_and_or(&mut self, statement: bool) -> Node {
        self.chain(|parser| {
            let mut left = parser.parse_not(statement);
            while (parser.peek_keyword("and") || parser.peek_keyword("or")) && parser.deepen() {
                let keyword = parser.peek().text.clone();
                let mut binary =
                    NodeBuilder::wrapping(Production::CommandBinary, Some(Field::Left), left);
                parser.bump(&mut binary, Some(Field::Operator));
                let right = if starts_expression(parser.peek()) {
                    parser.parse_not(false)
                } else {
                    let found = parser.describe_next();
                    parser.missing(
                        "E1502",
                        format!("expected an expression after `{keyword}`, found {found}"),
                    )
                };
                binary.push_node(Some(Field::Right), right);
                left = binary.finish();
            }
            left
        })
    }

    fn parse_not(&mut self, statement: bool) -> Node {
        if !self.peek_keyword("not") {
            return self.parse_statement_operand(statement);
        }
        self.nested(|parser| {
            let mut unary = NodeBuilder::node(NodeKind::Unary, parser.last_end);
            parser.bump(&mut unary, Some(Field::Operator));
            if parser.peek_symbol("(") && parser.adjacent() {
                unary.set_production(Production::ParenthesizedUnary);
                let operand = parser.parse_parenthesized_statements();
                unary.push_node(Some(Field::Operand), operand);
                return unary.finish();
            }
            let operand = if starts_expression(parser.peek()) {
                parser.parse_not(false)
            } else {
                let found = parser.describe_next();
                parser.missing("E1502", format!("expected an operand after `not`, found {found}"))
            };
            unary.push_node(Some(Field::Operand), operand);
            unary.finish()
        })
    }

    fn parse_statement_operand(&mut self, statement: bool) -> Node {
        if statement && self.peek_kind() == TokenKind::SplatStar {
            return self.parse_multiple_assignment(None);
        }
        self.rhs_list_allowed = statement;
        let node = self.parse_binary(0, true);
        self.rhs_list_allowed = false;
        if statement && self.peek_symbol(",") && is_assignable(&node) {
            return self.parse_multiple_assignment(Some(node));
        }
        node
    }

    fn parse_multiple_assignment(&mut self, first: Option<Node>) -> Node {
        let targets = self.parse_mlhs(first, true);
        let mut assignment = NodeBuilder::wrapping(
            Production::Node(NodeKind::Assignment),
            Some(Field::Left),
            targets,
        );
        if !self.peek_symbol("=") {
            let found = self.describe_next();
            let range = self.peek_range();
            self.emit_diag(
                "E1501",
                format!("expected `=` after assignment targets, found {found}"),
                range,
                None,
            );
            assignment.set_production(Production::Node(NodeKind::Error));
            return assignment.finish();
        }
        self.bump(&mut assignment, None);
        let (value, command) = self.parse_assignment_value(true, true);
        if command {
            assignment.set_production(Production::CommandAssignment);
        }
        assignment.push_node(Some(Field::Right), value);
        assignment.finish()
    }

    /// Targets of a multiple assignment or a `for` loop. Without `force_list`
    /// a single target is returned as is.
    pub(super) fn parse_mlhs(&mut self, first: Option<Node>, force_list: bool) -> Node {
        let first = match first {
            Some(node) => node,
            None => self.parse_mlhs_item(),
        };
        if !force_list && !self.peek_symbol(",") {
            return first;
        }
        let mut list = NodeBuilder::wrapping(
            Production::Node(NodeKind::LeftAssignmentList),
            None,
            first,
        );
        while self.peek_symbol(",") {
            self.bump(&mut list, None);
            let token = self.peek().clone();
            let starts_item = token.kind == TokenKind::SplatStar
                || token.is_punct("(")
                || starts_expression(&token);
            if !starts_item {
                break;
            }
            let item = self.parse_mlhs_item();
            list.push_node(None, item);
        }
        list.finish()
    }

    fn parse_mlhs_item(&mut self) -> Node {
        let token = self.peek().clone();
        if token.kind == TokenKind::SplatStar {
            let mut rest = NodeBuilder::node(NodeKind::RestAssignment, self.last_end);
            self.bump(&mut rest, None);
            if starts_argument(self.peek()) {
                let target = self.parse_primary_postfix(false);
                rest.push_node(None, target);
            }
            return rest.finish();
        }
        if token.is_punct("(") {
            let mut group = NodeBuilder::node(NodeKind::DestructuredLeftAssignment, self.last_end);
            let open = self.bump(&mut group, None);
            self.parse_delimited(&mut group, ")", open, Self::parse_mlhs_item);
            return group.finish();
        }
        if starts_expression(&token) {
            return self.parse_primary_postfix(false);
        }
        let found = self.describe_next();
        self.missing("E1502", format!("expected an assignment target, found {found}"))
    }

    /// Right-hand side of `=` or `op=`, and whether it is a command call.
    fn parse_assignment_value(&mut self, command: bool, list: bool) -> (Node, bool) {
        if list && self.peek_kind() == TokenKind::SplatStar {
            let splat = self.parse_splat_argument();
            if self.peek_symbol(",") {
                return (self.parse_right_assignment_list(splat), false);
            }
            return (splat, false);
        }
        if !starts_expression(self.peek()) {
            let found = self.describe_next();
            let missing = self.missing("E1502", format!("expected a value to assign, found {found}"));
            return (missing, false);
        }
        let value = self.parse_binary(0, command);
        let is_command = self.last_command == Some(value.range);
        if list && self.peek_symbol(",") {
            return (self.parse_right_assignment_list(value), false);
        }
        if !self.peek_keyword("rescue") {
            return (value, is_command);
        }
        let mut rescue = NodeBuilder::wrapping(
            Production::Node(NodeKind::RescueModifier),
            Some(Field::Body),
            value,
        );
        self.bump(&mut rescue, None);
        let handler = if starts_expression(self.peek()) {
            self.parse_binary(0, true)
        } else {
            let found = self.describe_next();
            self.missing("E1502", format!("expected an expression after `rescue`, found {found}"))
        };
        rescue.push_node(Some(Field::Handler), handler);
        (rescue.finish(), false)
    }

    fn parse_right_assignment_list(&mut self, first: Node) -> Node {
        let mut list = NodeBuilder::wrapping(
            Production::Node(NodeKind::RightAssignmentList),
            None,
            first,
        );
        while self.peek_symbol(",") {
            self.bump(&mut list, None);
            let item = if self.peek_kind() == TokenKind::SplatStar {
                self.parse_splat_argument()
            } else if starts_expression(self.peek()) {
                self.parse_binary(0, false)
            } else {
                let found = self.describe_next();
                let missing = self.missing("E1502", format!("expected a value after `,`, found {found}"));
                list.push_node(None, missing);
                break;
            };
            list.push_node(None, item);
        }
        list.finish()
    }

    /// Precedence climbing over operators at or above `min_level`.
    pub(super) fn parse_binary(&mut self, min_level: u8, command: bool) -> Node {
        self.chain(|parser| {
            let mut left = parser.parse_operand(command);
            let mut previous: Option<InfixOperator> = None;
            loop {
                if parser.last_command == Some(left.range) {
                    break;
                }
                let Some(operator) = infix_for_token(parser.peek()) else {
                    break;
                };
                if operator.level < min_level || !parser.deepen() {
                    break;
                }
                let chained = operator.assoc == Assoc::None
                    && previous.is_some_and(|prev| prev.level == operator.level);
                left = match operator.kind {
                    InfixKind::Conditional => parser.parse_conditional(left),
                    InfixKind::Range => parser.parse_range(left, chained),
                    InfixKind::Binary => parser.parse_binary_rest(left, operator, chained),
                };
                previous = Some(operator);
            }
            left
        })
    }

    fn parse_binary_rest(&mut self, left: Node, operator: InfixOperator, chained: bool) -> Node {
        let text = self.peek().text.clone();
        let mut binary =
            NodeBuilder::wrapping(Production::Node(NodeKind::Binary), Some(Field::Left), left);
        let operator_range = self.bump(&mut binary, Some(Field::Operator));
        if chained {
            self.emit_diag(
                "E1505",
                format!("`{text}` is non-associative and cannot be chained"),
                operator_range,
                None,
            );
            binary.set_production(Production::Node(NodeKind::Error));
        }
        if !starts_expression(self.peek()) {
            let found = self.describe_next();
            let range = self.peek_range();
            self.emit_diag(
                "E1502",
                format!("expected an operand after `{text}`, found {found}"),
                range,
                Some(("operator here", operator_range)),
            );
            binary.set_production(Production::Node(NodeKind::Error));
            return binary.finish();
        }
        let right = self.parse_binary(operator.right_level(), false);
        binary.push_node(Some(Field::Right), right);
        binary.finish()
    }

    fn parse_conditional(&mut self, condition: Node) -> Node {
        let mut conditional = NodeBuilder::wrapping(
            Production::Node(NodeKind::Conditional),
            Some(Field::Condition),
            condition,
        );
        let question = self.bump(&mut conditional, None);
        self.lexer.push_ternary();
        let consequence = if starts_expression(self.peek()) {
            self.parse_binary(0, false)
        } else {
            let found = self.describe_next();
            self.missing("E1502", format!("expected an expression after `?`, found {found}"))
        };
        conditional.push_node(Some(Field::Consequence), consequence);
        let colon = self.peek_symbol(":");
        self.lexer.pop_ternary();
        if colon {
            self.bump(&mut conditional, None);
        } else {
            self.expect_symbol(&mut conditional, ":", Some(("conditional starts here", question)));
        }
        let alternative = if starts_expression(self.peek()) {
            self.parse_binary(PREC_CONDITIONAL, false)
        } else {
            let found = self.describe_next();
            self.missing("E1502", format!("expected an expression after `:`, found {found}"))
        };
        conditional.push_node(Some(Field::Alternative), alternative);
        conditional.finish()
    }

    fn parse_range(&mut self, begin: Node, chained: bool) -> Node {
        let text = self.peek().text.clone();
        let mut range =
            NodeBuilder::wrapping(Production::Node(NodeKind::Range), Some(Field::Begin), begin);
        let operator_range = self.bump(&mut range, Some(Field::Operator));
        if chained {
            self.emit_diag(
                "E1505",
                format!("`{text}` is non-associative and cannot be chained"),
                operator_range,
                None,
            );
            range.set_production(Production::Node(NodeKind::Error));
        }
        if starts_argument(self.peek()) {
            let end = self.parse_binary(PREC_RANGE + 1, false);
            range.push_node(Some(Field::End), end);
        }
        range.finish()
    }

    fn parse_beginless_range(&mut self) -> Node {
        let mut range = NodeBuilder::node(NodeKind::Range, self.last_end);
        let operator_range = self.bump(&mut range, Some(Field::Operator));
        if starts_argument(self.peek()) {
            let end = self.parse_binary(PREC_RANGE + 1, false);
            range.push_node(Some(Field::End), end);
        } else {
            let found = self.describe_next();
            let at = self.peek_range();
            self.emit_diag(
                "E1502",
                format!("expected the end of a beginless range, found {found}"),
                at,
                Some(("range operator here", operator_range)),
            );
            range.set_production(Production::Node(NodeKind::Error));
        }
        range.finish()
    }

    /// Prefix operators, a primary with its postfix chain, and assignment.
    pub(super) fn parse_operand(&mut self, command: bool) -> Node {
        let rhs_list = std::mem::take(&mut self.rhs_list_allowed);
        self.nested(|parser| {
            let token = parser.peek().clone();
            if token.is_punct("..") || token.is_punct("...") {
                return parser.parse_beginless_range();
            }
            if let Some(level) = prefix_operand_level(&token) {
                return parser.parse_unary(level);
            }
            let node = parser.parse_primary_postfix(command);
            let assigns = parser.peek_symbol("=") || is_assignment_operator(parser.peek());
            if assigns && is_assignable(&node) {
                return parser.parse_assignment(node, command, rhs_list);
            }
            node
        })
    }

    fn parse_unary(&mut self, level: u8) -> Node {
        let token = self.peek().clone();
        let mut unary = NodeBuilder::node(NodeKind::Unary, self.last_end);
        let operator_range = self.bump(&mut unary, Some(Field::Operator));
        let keyword = token.kind == TokenKind::Keyword;
        if keyword && self.peek_symbol("(") && self.adjacent() {
            unary.set_production(Production::ParenthesizedUnary);
            let operand = self.parse_parenthesized_statements();
            unary.push_node(Some(Field::Operand), operand);
            let node = unary.finish();
            return self.parse_postfix(node, false);
        }
        if !starts_expression(self.peek()) {
            let found = self.describe_next();
            let at = self.peek_range();
            self.emit_diag(
                "E1502",
                format!("expected an operand after `{}`, found {found}", token.text),
                at,
                Some(("operator here", operator_range)),
            );
            unary.set_production(Production::Node(NodeKind::Error));
            return unary.finish();
        }
        let command = keyword || token.is_punct("!");
        let operand = self.parse_binary(level, command);
        unary.push_node(Some(Field::Operand), operand);
        unary.finish()
    }

    fn parse_assignment(&mut self, target: Node, command: bool, list: bool) -> Node {
        let compound = !self.peek_symbol("=");
        let kind = if compound {
            NodeKind::OperatorAssignment
        } else {
            NodeKind::Assignment
        };
        let mut assignment =
            NodeBuilder::wrapping(Production::Node(kind), Some(Field::Left), target);
        self.bump(&mut assignment, compound.then_some(Field::Operator));
        let (value, is_command) = self.parse_assignment_value(command, list && !compound);
        if is_command {
            assignment.set_production(if compound {
                Production::CommandOperatorAssignment
            } else {
                Production::CommandAssignment
            });
        }
        assignment.push_node(Some(Field::Right), value);
        assignment.finish()
    }
}

pub(super) fn is_assignable(node: &Node) -> bool {
    matches!(
        node.kind,
        NodeKind::Identifier
            | NodeKind::Constant
            | NodeKind::InstanceVariable
            | NodeKind::ClassVariable
            | NodeKind::GlobalVariable
            | NodeKind::ScopeResolution
            | NodeKind::ElementReference
            | NodeKind::Call
    )
}
