/// Check if a character can start an identifier (letter, underscore or dollar)
pub const fn is_identifier_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_' || c == '$'
}

/// Check if a character can continue an identifier
pub const fn is_identifier_continue(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '$'
}

/// Check if a byte is a word character in the `\w` sense (ASCII only)
pub(crate) const fn is_word_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}

/// Check if `name` is a valid compile-time variable name: `_[0-9A-Z][_0-9A-Z]*`
#[must_use]
pub fn is_variable_name(name: &str) -> bool {
    let bytes = name.as_bytes();
    bytes.len() >= 2
        && bytes[0] == b'_'
        && (bytes[1].is_ascii_digit() || bytes[1].is_ascii_uppercase())
        && bytes[2..]
            .iter()
            .all(|b| *b == b'_' || b.is_ascii_digit() || b.is_ascii_uppercase())
}

/// Length of the variable name at the start of `text`, if there is one
pub(crate) fn variable_name_len(text: &str) -> Option<usize> {
    let bytes = text.as_bytes();
    if bytes.len() < 2
        || bytes[0] != b'_'
        || !(bytes[1].is_ascii_digit() || bytes[1].is_ascii_uppercase())
    {
        return None;
    }
    let rest = bytes[2..]
        .iter()
        .take_while(|b| **b == b'_' || b.is_ascii_digit() || b.is_ascii_uppercase())
        .count();
    Some(2 + rest)
}

#[derive(Clone, Debug, PartialEq)]
pub(crate) enum ExprToken {
    Number(f64),
    Str(String),
    Identifier(String),
    LParen,
    RParen,
    LBracket,
    RBracket,
    LBrace,
    RBrace,
    Comma,
    Colon,
    Question,
    Dot,
    Not,
    Plus,
    Minus,
    Multiply,
    Divide,
    Modulo,
    Equal,
    NotEqual,
    StrictEqual,
    StrictNotEqual,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
    And,
    Or,
    Nullish,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn variable_names() {
        assert!(is_variable_name("_DEBUG"));
        assert!(is_variable_name("_1"));
        assert!(is_variable_name("_A_B_2"));
        assert!(!is_variable_name("_"));
        assert!(!is_variable_name("__X"));
        assert!(!is_variable_name("_debug"));
        assert!(!is_variable_name("DEBUG"));
        assert!(!is_variable_name("_Xy"));
    }

    #[test]
    fn variable_prefix_length() {
        assert_eq!(variable_name_len("_FOO.bar"), Some(4));
        assert_eq!(variable_name_len("_FOOx"), Some(4));
        assert_eq!(variable_name_len("_x"), None);
    }
}
