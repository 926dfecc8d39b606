pub const KEYWORDS_ALL: &[&str] = &[
    "alias",
    "and",
    "begin",
    "break",
    "case",
    "class",
    "def",
    "defined?",
    "do",
    "else",
    "elsif",
    "end",
    "ensure",
    "false",
    "for",
    "if",
    "in",
    "module",
    "next",
    "nil",
    "not",
    "or",
    "redo",
    "rescue",
    "retry",
    "return",
    "self",
    "super",
    "then",
    "true",
    "undef",
    "unless",
    "until",
    "when",
    "while",
    "yield",
];

/// Keywords that finish a value, so a following line break ends the statement.
pub const KEYWORDS_VALUE: &[&str] = &[
    "end", "self", "nil", "true", "false", "redo", "retry", "return", "break", "next", "yield",
    "super", "rescue",
];

/// Keywords after which `-`, `*`, `/`, `<<` and friends are read as prefixes
/// only when written like a command argument.
pub const KEYWORDS_CALL_LIKE: &[&str] = &["super", "yield", "defined?"];

pub const ASSIGNMENT_OPERATORS: &[&str] = &[
    "+=", "-=", "*=", "**=", "/=", "||=", "|=", "&&=", "&=", "%=", ">>=", "<<=", "^=",
];

pub const SYMBOLS_3: &[([char; 3], &str)] = &[
    (['*', '*', '='], "**="),
    (['|', '|', '='], "||="),
    (['&', '&', '='], "&&="),
    (['<', '<', '='], "<<="),
    (['>', '>', '='], ">>="),
    (['<', '=', '>'], "<=>"),
    (['=', '=', '='], "==="),
    (['.', '.', '.'], "..."),
];

pub const SYMBOLS_2: &[([char; 2], &str)] = &[
    (['=', '>'], "=>"),
    (['-', '>'], "->"),
    (['=', '='], "=="),
    (['!', '='], "!="),
    (['=', '~'], "=~"),
    (['!', '~'], "!~"),
    (['<', '='], "<="),
    (['>', '='], ">="),
    (['&', '&'], "&&"),
    (['|', '|'], "||"),
    (['&', '.'], "&."),
    ([':', ':'], "::"),
    (['<', '<'], "<<"),
    (['>', '>'], ">>"),
    (['*', '*'], "**"),
    (['.', '.'], ".."),
    (['+', '='], "+="),
    (['-', '='], "-="),
    (['*', '='], "*="),
    (['/', '='], "/="),
    (['%', '='], "%="),
    (['|', '='], "|="),
    (['&', '='], "&="),
    (['^', '='], "^="),
];

pub const SYMBOLS_1: &[char] = &[
    '{', '}', '(', ')', '[', ']', ',', '.', ':', ';', '=', '+', '-', '*', '/', '|', '&', '!',
    '<', '>', '?', '%', '~', '^',
];

/// Operator method names, longest first, accepted after `def`, `.` and `:`.
pub const OPERATOR_METHODS: &[&str] = &[
    "[]=", "===", "<=>", "[]", "==", "=~", "!=", "!~", "**", "<<", ">>", "<=", ">=", "+@", "-@",
    "..", "+", "-", "*", "/", "%", "<", ">", "!", "~", "^", "&", "|", "`",
];

pub fn is_keyword(text: &str) -> bool {
    KEYWORDS_ALL.contains(&text)
}

pub fn is_identifier_start(ch: char) -> bool {
    ch == '_' || ch.is_ascii_alphabetic() || !ch.is_ascii()
}

pub fn is_identifier_char(ch: char) -> bool {
    ch == '_' || ch.is_ascii_alphanumeric() || !ch.is_ascii()
}

pub fn closing_delimiter(open: char) -> char {
    match open {
        '(' => ')',
        '[' => ']',
        '{' => '}',
        '<' => '>',
        other => other,
    }
}
