//! Operator precedence and associativity.
//!
//! Levels are spaced so the binding order is readable at a glance; only their
//! relative order matters.

use crate::cst::{Token, TokenKind};

pub const PREC_AND_OR: u8 = 1;
pub const PREC_NOT: u8 = 5;
pub const PREC_DEFINED: u8 = 10;
pub const PREC_ASSIGN: u8 = 15;
pub const PREC_RESCUE: u8 = 16;
pub const PREC_CONDITIONAL: u8 = 20;
pub const PREC_RANGE: u8 = 25;
pub const PREC_BOOLEAN_OR: u8 = 30;
pub const PREC_BOOLEAN_AND: u8 = 35;
pub const PREC_RELATIONAL: u8 = 40;
pub const PREC_COMPARISON: u8 = 45;
pub const PREC_BITWISE_OR: u8 = 50;
pub const PREC_BITWISE_AND: u8 = 55;
pub const PREC_SHIFT: u8 = 60;
pub const PREC_ADDITIVE: u8 = 65;
pub const PREC_MULTIPLICATIVE: u8 = 70;
pub const PREC_UNARY_MINUS: u8 = 75;
pub const PREC_EXPONENTIAL: u8 = 80;
pub const PREC_COMPLEMENT: u8 = 85;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Assoc {
    Left,
    Right,
    /// `a == b == c` and `a..b..c` are rejected.
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InfixKind {
    Binary,
    Range,
    Conditional,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InfixOperator {
    pub level: u8,
    pub assoc: Assoc,
    pub kind: InfixKind,
}

impl InfixOperator {
    /// Minimum level accepted for the right operand.
    pub fn right_level(self) -> u8 {
        match self.assoc {
            Assoc::Right => self.level,
            Assoc::Left | Assoc::None => self.level + 1,
        }
    }
}

const fn infix(level: u8, assoc: Assoc, kind: InfixKind) -> InfixOperator {
    InfixOperator { level, assoc, kind }
}

pub const INFIX_TABLE: &[(&str, InfixOperator)] = &[
    ("?", infix(PREC_CONDITIONAL, Assoc::Right, InfixKind::Conditional)),
    ("..", infix(PREC_RANGE, Assoc::None, InfixKind::Range)),
    ("...", infix(PREC_RANGE, Assoc::None, InfixKind::Range)),
    ("||", infix(PREC_BOOLEAN_OR, Assoc::Left, InfixKind::Binary)),
    ("&&", infix(PREC_BOOLEAN_AND, Assoc::Left, InfixKind::Binary)),
    ("==", infix(PREC_RELATIONAL, Assoc::None, InfixKind::Binary)),
    ("!=", infix(PREC_RELATIONAL, Assoc::None, InfixKind::Binary)),
    ("===", infix(PREC_RELATIONAL, Assoc::None, InfixKind::Binary)),
    ("<=>", infix(PREC_RELATIONAL, Assoc::None, InfixKind::Binary)),
    ("=~", infix(PREC_RELATIONAL, Assoc::None, InfixKind::Binary)),
    ("!~", infix(PREC_RELATIONAL, Assoc::None, InfixKind::Binary)),
    ("<", infix(PREC_COMPARISON, Assoc::Left, InfixKind::Binary)),
    ("<=", infix(PREC_COMPARISON, Assoc::Left, InfixKind::Binary)),
    (">", infix(PREC_COMPARISON, Assoc::Left, InfixKind::Binary)),
    (">=", infix(PREC_COMPARISON, Assoc::Left, InfixKind::Binary)),
    ("|", infix(PREC_BITWISE_OR, Assoc::Left, InfixKind::Binary)),
    ("^", infix(PREC_BITWISE_OR, Assoc::Left, InfixKind::Binary)),
    ("&", infix(PREC_BITWISE_AND, Assoc::Left, InfixKind::Binary)),
    ("<<", infix(PREC_SHIFT, Assoc::Left, InfixKind::Binary)),
    (">>", infix(PREC_SHIFT, Assoc::Left, InfixKind::Binary)),
    ("+", infix(PREC_ADDITIVE, Assoc::Left, InfixKind::Binary)),
    ("-", infix(PREC_ADDITIVE, Assoc::Left, InfixKind::Binary)),
    ("*", infix(PREC_MULTIPLICATIVE, Assoc::Left, InfixKind::Binary)),
    ("/", infix(PREC_MULTIPLICATIVE, Assoc::Left, InfixKind::Binary)),
    ("%", infix(PREC_MULTIPLICATIVE, Assoc::Left, InfixKind::Binary)),
    ("**", infix(PREC_EXPONENTIAL, Assoc::Right, InfixKind::Binary)),
];

pub fn infix_operator(text: &str) -> Option<InfixOperator> {
    INFIX_TABLE
        .iter()
        .find(|(op, _)| *op == text)
        .map(|(_, operator)| *operator)
}

/// Infix reading of a token. Binary minus and star have their own token kinds
/// so the lexer's prefix decision survives into the parser.
pub fn infix_for_token(token: &Token) -> Option<InfixOperator> {
    match token.kind {
        TokenKind::BinaryMinus => infix_operator("-"),
        TokenKind::BinaryStar => infix_operator("*"),
        TokenKind::Punct => infix_operator(&token.text),
        _ => None,
    }
}

/// Level of the operand that follows a prefix operator.
pub fn prefix_operand_level(token: &Token) -> Option<u8> {
    match token.kind {
        TokenKind::UnaryMinus | TokenKind::UnaryPlus => Some(PREC_UNARY_MINUS),
        TokenKind::Punct if matches!(token.text.as_str(), "!" | "~") => Some(PREC_COMPLEMENT),
        TokenKind::Keyword if token.text == "defined?" => Some(PREC_DEFINED + 1),
        TokenKind::Keyword if token.text == "not" => Some(PREC_NOT),
        _ => None,
    }
}

pub fn is_assignment_operator(token: &Token) -> bool {
    token.kind == TokenKind::Punct && crate::syntax::ASSIGNMENT_OPERATORS.contains(&token.text.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cst::TextRange;

    fn punct(text: &str) -> Token {
        Token {
            kind: TokenKind::Punct,
            text: text.to_string(),
            range: TextRange::new(0, text.len()),
        }
    }

    #[test]
    fn multiplicative_binds_tighter_than_additive() {
        let mul = infix_operator("*").expect("*");
        let add = infix_operator("+").expect("+");
        assert!(mul.level > add.level);
    }

    #[test]
    fn comparison_binds_tighter_than_equality() {
        let lt = infix_operator("<").expect("<");
        let eq = infix_operator("==").expect("==");
        assert!(lt.level > eq.level);
        assert_eq!(eq.assoc, Assoc::None);
    }

    #[test]
    fn exponent_is_right_associative_and_above_unary_minus() {
        let pow = infix_operator("**").expect("**");
        assert_eq!(pow.right_level(), pow.level);
        assert!(pow.level > PREC_UNARY_MINUS);
    }

    #[test]
    fn lexer_split_operators_map_back() {
        let minus = Token {
            kind: TokenKind::BinaryMinus,
            text: "-".to_string(),
            range: TextRange::new(0, 1),
        };
        assert_eq!(infix_for_token(&minus), infix_operator("-"));
        assert!(is_assignment_operator(&punct("||=")));
        assert!(!is_assignment_operator(&punct("==")));
        assert_eq!(prefix_operand_level(&punct("!")), Some(PREC_COMPLEMENT));
    }
}
