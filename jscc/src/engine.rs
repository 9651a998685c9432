use crate::context::Environment;
use crate::error::EvalError;
use crate::token::{ExprToken, is_identifier_continue, is_identifier_start, is_variable_name};
use crate::value::{Value, format_number, parse_hex};

/// Capability used by the directive engine to evaluate expressions
///
/// Implementations only read the environment; `#set` and `#unset` are the
/// sole writers.
pub trait Evaluator: Send + Sync {
    /// Evaluate `expression` against `env`
    ///
    /// # Errors
    /// Returns `EvalError` if the expression is malformed or fails at runtime.
    fn evaluate(&self, expression: &str, env: &Environment) -> Result<Value, EvalError>;
}

#[derive(Clone, Copy, Debug, PartialEq)]
enum UnaryOp {
    Not,
    Negate,
    Plus,
    TypeOf,
}

#[derive(Clone, Copy, Debug, PartialEq)]
enum BinaryOp {
    Add,
    Subtract,
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
}

#[derive(Clone, Copy, Debug, PartialEq)]
enum LogicalOp {
    And,
    Or,
    Nullish,
}

/// Parsed expression tree
#[derive(Clone, Debug, PartialEq)]
enum Expr {
    Literal(Value),
    Variable(String),
    Global(String),
    Array(Vec<Expr>),
    Object(Vec<(String, Expr)>),
    Member(Box<Expr>, Box<Expr>),
    Unary(UnaryOp, Box<Expr>),
    Binary(BinaryOp, Box<Expr>, Box<Expr>),
    Logical(LogicalOp, Box<Expr>, Box<Expr>),
    Conditional(Box<Expr>, Box<Expr>, Box<Expr>),
}

/// Built-in interpreter for a JavaScript-like expression subset
///
/// Supports literals (numbers, strings, arrays, objects, `true`, `false`,
/// `null`, `undefined`, `NaN`, `Infinity`), the unary operators `!`, `-`,
/// `+` and `typeof`, arithmetic, comparisons, `&&`, `||`, `??`, the
/// conditional operator and member access. Function calls are rejected.
#[derive(Clone, Copy, Debug, Default)]
pub struct ExpressionEngine;

impl Evaluator for ExpressionEngine {
    fn evaluate(&self, expression: &str, env: &Environment) -> Result<Value, EvalError> {
        let expr = Self::parse(expression)?;
        Self::eval(&expr, env)
    }
}

impl ExpressionEngine {
    /// Tokenize expression string into expression tokens
    pub(crate) fn tokenize_expression(expr: &str) -> Result<Vec<ExprToken>, EvalError> {
        let mut tokens = Vec::new();
        let chars: Vec<char> = expr.chars().collect();
        let mut i = 0;

        while i < chars.len() {
            let ch = chars[i];
            let next = chars.get(i + 1).copied();
            match ch {
                c if c.is_whitespace() => i += 1,
                '0'..='9' => {
                    let (value, len) = Self::read_number(&chars[i..])?;
                    tokens.push(ExprToken::Number(value));
                    i += len;
                }
                '.' if next.is_some_and(|c| c.is_ascii_digit()) => {
                    let (value, len) = Self::read_number(&chars[i..])?;
                    tokens.push(ExprToken::Number(value));
                    i += len;
                }
                '\'' | '"' => {
                    let (value, len) = Self::read_string(&chars[i..])?;
                    tokens.push(ExprToken::Str(value));
                    i += len;
                }
                c if is_identifier_start(c) => {
                    let len = chars[i..]
                        .iter()
                        .take_while(|c| is_identifier_continue(**c))
                        .count();
                    tokens.push(ExprToken::Identifier(chars[i..i + len].iter().collect()));
                    i += len;
                }
                '(' => {
                    tokens.push(ExprToken::LParen);
                    i += 1;
                }
                ')' => {
                    tokens.push(ExprToken::RParen);
                    i += 1;
                }
                '[' => {
                    tokens.push(ExprToken::LBracket);
                    i += 1;
                }
                ']' => {
                    tokens.push(ExprToken::RBracket);
                    i += 1;
                }
                '{' => {
                    tokens.push(ExprToken::LBrace);
                    i += 1;
                }
                '}' => {
                    tokens.push(ExprToken::RBrace);
                    i += 1;
                }
                ',' => {
                    tokens.push(ExprToken::Comma);
                    i += 1;
                }
                ':' => {
                    tokens.push(ExprToken::Colon);
                    i += 1;
                }
                '.' => {
                    tokens.push(ExprToken::Dot);
                    i += 1;
                }
                '?' if next == Some('?') => {
                    tokens.push(ExprToken::Nullish);
                    i += 2;
                }
                '?' => {
                    tokens.push(ExprToken::Question);
                    i += 1;
                }
                '!' | '=' => {
                    let strict = next == Some('=') && chars.get(i + 2) == Some(&'=');
                    match (ch, next == Some('='), strict) {
                        ('!', true, true) => {
                            tokens.push(ExprToken::StrictNotEqual);
                            i += 3;
                        }
                        ('!', true, false) => {
                            tokens.push(ExprToken::NotEqual);
                            i += 2;
                        }
                        ('!', false, _) => {
                            tokens.push(ExprToken::Not);
                            i += 1;
                        }
                        (_, true, true) => {
                            tokens.push(ExprToken::StrictEqual);
                            i += 3;
                        }
                        (_, true, false) => {
                            tokens.push(ExprToken::Equal);
                            i += 2;
                        }
                        _ => {
                            return Err(EvalError::Unsupported("assignment".to_string()));
                        }
                    }
                }
                '<' | '>' => {
                    let with_eq = next == Some('=');
                    tokens.push(match (ch, with_eq) {
                        ('<', true) => ExprToken::LessEqual,
                        ('<', false) => ExprToken::Less,
                        (_, true) => ExprToken::GreaterEqual,
                        _ => ExprToken::Greater,
                    });
                    i += if with_eq { 2 } else { 1 };
                }
                '&' | '|' => {
                    if next != Some(ch) {
                        return Err(EvalError::Unsupported(format!("bitwise operator {ch}")));
                    }
                    tokens.push(if ch == '&' {
                        ExprToken::And
                    } else {
                        ExprToken::Or
                    });
                    i += 2;
                }
                '+' => {
                    tokens.push(ExprToken::Plus);
                    i += 1;
                }
                '-' => {
                    tokens.push(ExprToken::Minus);
                    i += 1;
                }
                '*' => {
                    tokens.push(ExprToken::Multiply);
                    i += 1;
                }
                '/' => {
                    tokens.push(ExprToken::Divide);
                    i += 1;
                }
                '%' => {
                    tokens.push(ExprToken::Modulo);
                    i += 1;
                }
                _ => {
                    return Err(EvalError::Syntax(format!("invalid character: {ch}")));
                }
            }
        }

        Ok(tokens)
    }

    fn read_number(chars: &[char]) -> Result<(f64, usize), EvalError> {
        if chars.len() > 1 && chars[0] == '0' && matches!(chars[1], 'x' | 'X') {
            let digits: String = chars[2..]
                .iter()
                .take_while(|c| c.is_ascii_hexdigit())
                .collect();
            return parse_hex(&digits)
                .map(|v| (v, digits.len() + 2))
                .ok_or_else(|| EvalError::Syntax(format!("invalid number: 0x{digits}")));
        }

        let mut len = chars.iter().take_while(|c| c.is_ascii_digit()).count();
        if chars.get(len) == Some(&'.') {
            len += 1;
            len += chars[len..].iter().take_while(|c| c.is_ascii_digit()).count();
        }
        if matches!(chars.get(len), Some('e' | 'E')) {
            let mut exp = len + 1;
            if matches!(chars.get(exp), Some('+' | '-')) {
                exp += 1;
            }
            let digits = chars[exp.min(chars.len())..]
                .iter()
                .take_while(|c| c.is_ascii_digit())
                .count();
            if digits > 0 {
                len = exp + digits;
            }
        }
        if chars.get(len).is_some_and(|c| is_identifier_start(*c)) {
            return Err(EvalError::Syntax(
                "identifier starts immediately after numeric literal".to_string(),
            ));
        }
        let text: String = chars[..len].iter().collect();
        text.parse::<f64>()
            .map(|v| (v, len))
            .map_err(|_| EvalError::Syntax(format!("invalid number: {text}")))
    }

    fn read_string(chars: &[char]) -> Result<(String, usize), EvalError> {
        let quote = chars[0];
        let mut out = String::new();
        let mut i = 1;
        while i < chars.len() {
            match chars[i] {
                c if c == quote => return Ok((out, i + 1)),
                '\\' => {
                    let Some(&esc) = chars.get(i + 1) else {
                        break;
                    };
                    i += 2;
                    match esc {
                        'n' => out.push('\n'),
                        't' => out.push('\t'),
                        'r' => out.push('\r'),
                        'b' => out.push('\u{8}'),
                        'f' => out.push('\u{c}'),
                        'v' => out.push('\u{b}'),
                        '0' => out.push('\0'),
                        '\n' => {}
                        'x' | 'u' => {
                            let width = if esc == 'x' { 2 } else { 4 };
                            let hex: String = chars[i.min(chars.len())..]
                                .iter()
                                .take(width)
                                .collect();
                            let code = u32::from_str_radix(&hex, 16)
                                .ok()
                                .filter(|_| hex.len() == width)
                                .and_then(char::from_u32)
                                .ok_or_else(|| {
                                    EvalError::Syntax(format!("invalid escape: \\{esc}{hex}"))
                                })?;
                            out.push(code);
                            i += width;
                        }
                        other => out.push(other),
                    }
                }
                '\n' => break,
                c => {
                    out.push(c);
                    i += 1;
                }
            }
        }
        Err(EvalError::Syntax("unterminated string literal".to_string()))
    }

    /// Parse an expression into its tree
    ///
    /// # Errors
    /// Returns `EvalError::Syntax` for malformed input.
    fn parse(expr: &str) -> Result<Expr, EvalError> {
        let tokens = Self::tokenize_expression(expr)?;
        let mut pos = 0;
        let result = Self::parse_conditional(&tokens, &mut pos)?;
        if pos != tokens.len() {
            return Err(EvalError::Syntax(
                "unexpected tokens at end of expression".to_string(),
            ));
        }
        Ok(result)
    }

    fn expect(tokens: &[ExprToken], pos: &mut usize, token: &ExprToken) -> Result<(), EvalError> {
        if tokens.get(*pos) == Some(token) {
            *pos += 1;
            Ok(())
        } else {
            Err(EvalError::Syntax(format!("expected {token:?}")))
        }
    }

    fn parse_conditional(tokens: &[ExprToken], pos: &mut usize) -> Result<Expr, EvalError> {
        let test = Self::parse_nullish(tokens, pos)?;
        if tokens.get(*pos) != Some(&ExprToken::Question) {
            return Ok(test);
        }
        *pos += 1;
        let consequent = Self::parse_conditional(tokens, pos)?;
        Self::expect(tokens, pos, &ExprToken::Colon)?;
        let alternate = Self::parse_conditional(tokens, pos)?;
        Ok(Expr::Conditional(
            Box::new(test),
            Box::new(consequent),
            Box::new(alternate),
        ))
    }

    fn parse_nullish(tokens: &[ExprToken], pos: &mut usize) -> Result<Expr, EvalError> {
        let mut left = Self::parse_or(tokens, pos)?;
        while tokens.get(*pos) == Some(&ExprToken::Nullish) {
            *pos += 1;
            let right = Self::parse_or(tokens, pos)?;
            left = Expr::Logical(LogicalOp::Nullish, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_or(tokens: &[ExprToken], pos: &mut usize) -> Result<Expr, EvalError> {
        let mut left = Self::parse_and(tokens, pos)?;
        while tokens.get(*pos) == Some(&ExprToken::Or) {
            *pos += 1;
            let right = Self::parse_and(tokens, pos)?;
            left = Expr::Logical(LogicalOp::Or, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_and(tokens: &[ExprToken], pos: &mut usize) -> Result<Expr, EvalError> {
        let mut left = Self::parse_equality(tokens, pos)?;
        while tokens.get(*pos) == Some(&ExprToken::And) {
            *pos += 1;
            let right = Self::parse_equality(tokens, pos)?;
            left = Expr::Logical(LogicalOp::And, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_equality(tokens: &[ExprToken], pos: &mut usize) -> Result<Expr, EvalError> {
        let mut left = Self::parse_relational(tokens, pos)?;
        loop {
            let op = match tokens.get(*pos) {
                Some(ExprToken::Equal) => BinaryOp::Equal,
                Some(ExprToken::NotEqual) => BinaryOp::NotEqual,
                Some(ExprToken::StrictEqual) => BinaryOp::StrictEqual,
                Some(ExprToken::StrictNotEqual) => BinaryOp::StrictNotEqual,
                _ => break,
            };
            *pos += 1;
            let right = Self::parse_relational(tokens, pos)?;
            left = Expr::Binary(op, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_relational(tokens: &[ExprToken], pos: &mut usize) -> Result<Expr, EvalError> {
        let mut left = Self::parse_additive(tokens, pos)?;
        loop {
            let op = match tokens.get(*pos) {
                Some(ExprToken::Less) => BinaryOp::Less,
                Some(ExprToken::LessEqual) => BinaryOp::LessEqual,
                Some(ExprToken::Greater) => BinaryOp::Greater,
                Some(ExprToken::GreaterEqual) => BinaryOp::GreaterEqual,
                _ => break,
            };
            *pos += 1;
            let right = Self::parse_additive(tokens, pos)?;
            left = Expr::Binary(op, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_additive(tokens: &[ExprToken], pos: &mut usize) -> Result<Expr, EvalError> {
        let mut left = Self::parse_multiplicative(tokens, pos)?;
        loop {
            let op = match tokens.get(*pos) {
                Some(ExprToken::Plus) => BinaryOp::Add,
                Some(ExprToken::Minus) => BinaryOp::Subtract,
                _ => break,
            };
            *pos += 1;
            let right = Self::parse_multiplicative(tokens, pos)?;
            left = Expr::Binary(op, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_multiplicative(tokens: &[ExprToken], pos: &mut usize) -> Result<Expr, EvalError> {
        let mut left = Self::parse_unary(tokens, pos)?;
        loop {
            let op = match tokens.get(*pos) {
                Some(ExprToken::Multiply) => BinaryOp::Multiply,
                Some(ExprToken::Divide) => BinaryOp::Divide,
                Some(ExprToken::Modulo) => BinaryOp::Modulo,
                _ => break,
            };
            *pos += 1;
            let right = Self::parse_unary(tokens, pos)?;
            left = Expr::Binary(op, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_unary(tokens: &[ExprToken], pos: &mut usize) -> Result<Expr, EvalError> {
        let op = match tokens.get(*pos) {
            Some(ExprToken::Not) => UnaryOp::Not,
            Some(ExprToken::Minus) => UnaryOp::Negate,
            Some(ExprToken::Plus) => UnaryOp::Plus,
            Some(ExprToken::Identifier(id)) if id == "typeof" => UnaryOp::TypeOf,
            _ => return Self::parse_postfix(tokens, pos),
        };
        *pos += 1;
        let operand = Self::parse_unary(tokens, pos)?;
        Ok(Expr::Unary(op, Box::new(operand)))
    }

    fn parse_postfix(tokens: &[ExprToken], pos: &mut usize) -> Result<Expr, EvalError> {
        let mut expr = Self::parse_primary(tokens, pos)?;
        loop {
            match tokens.get(*pos) {
                Some(ExprToken::Dot) => {
                    *pos += 1;
                    let Some(ExprToken::Identifier(name)) = tokens.get(*pos) else {
                        return Err(EvalError::Syntax("expected property name".to_string()));
                    };
                    *pos += 1;
                    expr = Expr::Member(
                        Box::new(expr),
                        Box::new(Expr::Literal(Value::String(name.clone()))),
                    );
                }
                Some(ExprToken::LBracket) => {
                    *pos += 1;
                    let key = Self::parse_conditional(tokens, pos)?;
                    Self::expect(tokens, pos, &ExprToken::RBracket)?;
                    expr = Expr::Member(Box::new(expr), Box::new(key));
                }
                Some(ExprToken::LParen) => {
                    return Err(EvalError::Unsupported("function calls".to_string()));
                }
                _ => return Ok(expr),
            }
        }
    }

    fn parse_primary(tokens: &[ExprToken], pos: &mut usize) -> Result<Expr, EvalError> {
        let Some(token) = tokens.get(*pos) else {
            return Err(EvalError::Syntax("unexpected end of expression".to_string()));
        };
        *pos += 1;

        match token {
            ExprToken::Number(n) => Ok(Expr::Literal(Value::Number(*n))),
            ExprToken::Str(s) => Ok(Expr::Literal(Value::String(s.clone()))),
            ExprToken::Identifier(ident) => Ok(match ident.as_str() {
                "true" => Expr::Literal(Value::Bool(true)),
                "false" => Expr::Literal(Value::Bool(false)),
                "null" => Expr::Literal(Value::Null),
                "undefined" => Expr::Literal(Value::Undefined),
                "NaN" => Expr::Literal(Value::Number(f64::NAN)),
                "Infinity" => Expr::Literal(Value::Number(f64::INFINITY)),
                name if is_variable_name(name) => Expr::Variable(name.to_string()),
                name => Expr::Global(name.to_string()),
            }),
            ExprToken::LParen => {
                let inner = Self::parse_conditional(tokens, pos)?;
                Self::expect(tokens, pos, &ExprToken::RParen)?;
                Ok(inner)
            }
            ExprToken::LBracket => {
                let mut items = Vec::new();
                while tokens.get(*pos) != Some(&ExprToken::RBracket) {
                    items.push(Self::parse_conditional(tokens, pos)?);
                    if tokens.get(*pos) == Some(&ExprToken::Comma) {
                        *pos += 1;
                    } else {
                        break;
                    }
                }
                Self::expect(tokens, pos, &ExprToken::RBracket)?;
                Ok(Expr::Array(items))
            }
            ExprToken::LBrace => {
                let mut members = Vec::new();
                while tokens.get(*pos) != Some(&ExprToken::RBrace) {
                    let key = match tokens.get(*pos) {
                        Some(ExprToken::Identifier(k) | ExprToken::Str(k)) => k.clone(),
                        Some(ExprToken::Number(n)) => format_number(*n),
                        _ => return Err(EvalError::Syntax("expected property key".to_string())),
                    };
                    *pos += 1;
                    Self::expect(tokens, pos, &ExprToken::Colon)?;
                    members.push((key, Self::parse_conditional(tokens, pos)?));
                    if tokens.get(*pos) == Some(&ExprToken::Comma) {
                        *pos += 1;
                    } else {
                        break;
                    }
                }
                Self::expect(tokens, pos, &ExprToken::RBrace)?;
                Ok(Expr::Object(members))
            }
            other => Err(EvalError::Syntax(format!("unexpected token {other:?}"))),
        }
    }

    /// Evaluate a parsed tree
    fn eval(expr: &Expr, env: &Environment) -> Result<Value, EvalError> {
        match expr {
            Expr::Literal(v) => Ok(v.clone()),
            Expr::Variable(name) => Ok(env.get(name).cloned().unwrap_or_default()),
            Expr::Global(name) => Err(EvalError::NotDefined(name.clone())),
            Expr::Array(items) => items
                .iter()
                .map(|item| Self::eval(item, env))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::Array),
            Expr::Object(members) => members
                .iter()
                .map(|(k, v)| Self::eval(v, env).map(|v| (k.clone(), v)))
                .collect::<Result<_, _>>()
                .map(Value::Object),
            Expr::Member(object, key) => {
                let object = Self::eval(object, env)?;
                let key = Self::eval(key, env)?.to_js_string();
                match object {
                    Value::Undefined | Value::Null => Err(EvalError::PropertyOfNothing {
                        target: if object == Value::Null { "null" } else { "undefined" },
                        property: key,
                    }),
                    other => Ok(other.property(&key).unwrap_or_default()),
                }
            }
            Expr::Unary(UnaryOp::TypeOf, operand) => match operand.as_ref() {
                Expr::Global(_) => Ok(Value::String("undefined".to_string())),
                other => Ok(Value::String(Self::eval(other, env)?.type_of().to_string())),
            },
            Expr::Unary(op, operand) => {
                let v = Self::eval(operand, env)?;
                Ok(match op {
                    UnaryOp::Not => Value::Bool(!v.is_truthy()),
                    UnaryOp::Negate => Value::Number(-v.to_number()),
                    UnaryOp::Plus | UnaryOp::TypeOf => Value::Number(v.to_number()),
                })
            }
            Expr::Logical(op, left, right) => {
                let l = Self::eval(left, env)?;
                let short_circuit = match op {
                    LogicalOp::And => !l.is_truthy(),
                    LogicalOp::Or => l.is_truthy(),
                    LogicalOp::Nullish => !matches!(l, Value::Undefined | Value::Null),
                };
                if short_circuit {
                    Ok(l)
                } else {
                    Self::eval(right, env)
                }
            }
            Expr::Conditional(test, consequent, alternate) => {
                if Self::eval(test, env)?.is_truthy() {
                    Self::eval(consequent, env)
                } else {
                    Self::eval(alternate, env)
                }
            }
            Expr::Binary(op, left, right) => {
                let l = Self::eval(left, env)?;
                let r = Self::eval(right, env)?;
                Ok(Self::apply_binary(*op, &l, &r))
            }
        }
    }

    fn apply_binary(op: BinaryOp, l: &Value, r: &Value) -> Value {
        match op {
            BinaryOp::Add => {
                let concat = |v: &Value| matches!(v, Value::String(_)) || v.is_structured();
                if concat(l) || concat(r) {
                    Value::String(format!("{}{}", l.to_js_string(), r.to_js_string()))
                } else {
                    Value::Number(l.to_number() + r.to_number())
                }
            }
            BinaryOp::Subtract => Value::Number(l.to_number() - r.to_number()),
            BinaryOp::Multiply => Value::Number(l.to_number() * r.to_number()),
            BinaryOp::Divide => Value::Number(l.to_number() / r.to_number()),
            BinaryOp::Modulo => Value::Number(l.to_number() % r.to_number()),
            BinaryOp::Equal => Value::Bool(l.loose_equals(r)),
            BinaryOp::NotEqual => Value::Bool(!l.loose_equals(r)),
            BinaryOp::StrictEqual => Value::Bool(l.strict_equals(r)),
            BinaryOp::StrictNotEqual => Value::Bool(!l.strict_equals(r)),
            BinaryOp::Less
            | BinaryOp::LessEqual
            | BinaryOp::Greater
            | BinaryOp::GreaterEqual => {
                let ordering = match (l, r) {
                    (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
                    _ => l.to_number().partial_cmp(&r.to_number()),
                };
                Value::Bool(ordering.is_some_and(|o| match op {
                    BinaryOp::Less => o.is_lt(),
                    BinaryOp::LessEqual => o.is_le(),
                    BinaryOp::Greater => o.is_gt(),
                    _ => o.is_ge(),
                }))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn eval(expr: &str) -> Result<Value, EvalError> {
        let mut env = Environment::new();
        env.insert("_ONE", Value::Number(1.0));
        env.insert("_STR", Value::String("foo".into()));
        env.insert("_UNDEF", Value::Undefined);
        env.insert(
            "_OBJ",
            Value::parse_literal(r#"{"name": "app", "list": [10, 20], "nested": {"on": true}}"#),
        );
        ExpressionEngine.evaluate(expr, &env)
    }

    #[test]
    fn arithmetic_precedence() {
        assert_eq!(eval("1 + 2 * 3"), Ok(Value::Number(7.0)));
        assert_eq!(eval("(1 + 2) * 3"), Ok(Value::Number(9.0)));
        assert_eq!(eval("7 % 4 - -1"), Ok(Value::Number(4.0)));
        assert_eq!(eval("0x10 + .5"), Ok(Value::Number(16.5)));
    }

    #[test]
    fn wide_hex_and_exponent_literals() {
        assert_eq!(
            eval("0xFFFFFFFFFFFFFFFFF"),
            Ok(Value::Number(295_147_905_179_352_825_855.0))
        );
        assert!(matches!(eval("0x"), Err(EvalError::Syntax(_))));
        assert_eq!(eval("1e21 + ''"), Ok(Value::from("1e+21")));
        assert_eq!(eval("'' + 1e-7"), Ok(Value::from("1e-7")));
    }

    #[test]
    fn division_by_zero_is_infinite() {
        assert_eq!(eval("1 / 0"), Ok(Value::Number(f64::INFINITY)));
    }

    #[test]
    fn string_concatenation() {
        assert_eq!(eval("_STR + 1"), Ok(Value::String("foo1".into())));
        assert_eq!(eval("'a' + \"b\""), Ok(Value::String("ab".into())));
        assert_eq!(eval("'\\u0041\\x42\\n'"), Ok(Value::String("AB\n".into())));
    }

    #[test]
    fn variables_resolve_against_environment() {
        assert_eq!(eval("_ONE == 1"), Ok(Value::Bool(true)));
        assert_eq!(eval("_MISSING"), Ok(Value::Undefined));
        assert_eq!(eval("typeof _MISSING"), Ok(Value::String("undefined".into())));
        assert_eq!(eval("_UNDEF === undefined"), Ok(Value::Bool(true)));
    }

    #[test]
    fn logical_operators_return_operands() {
        assert_eq!(eval("_STR || 'x'"), Ok(Value::String("foo".into())));
        assert_eq!(eval("0 || 'x'"), Ok(Value::String("x".into())));
        assert_eq!(eval("_ONE && _STR"), Ok(Value::String("foo".into())));
        assert_eq!(eval("_UNDEF ?? 5"), Ok(Value::Number(5.0)));
        assert_eq!(eval("!_ONE"), Ok(Value::Bool(false)));
    }

    #[test]
    fn short_circuit_skips_failing_operand() {
        assert_eq!(eval("_MISSING && _MISSING.x"), Ok(Value::Undefined));
        assert_eq!(eval("_ONE || undefinedThing"), Ok(Value::Number(1.0)));
    }

    #[test]
    fn comparisons() {
        assert_eq!(eval("'abc' < 'abd'"), Ok(Value::Bool(true)));
        assert_eq!(eval("2 >= 2 && 3 > 2 && 1 <= 1"), Ok(Value::Bool(true)));
        assert_eq!(eval("'1' === 1"), Ok(Value::Bool(false)));
        assert_eq!(eval("'1' == 1"), Ok(Value::Bool(true)));
        assert_eq!(eval("NaN < 1"), Ok(Value::Bool(false)));
    }

    #[test]
    fn member_access() {
        assert_eq!(eval("_OBJ.name"), Ok(Value::String("app".into())));
        assert_eq!(eval("_OBJ.list[1]"), Ok(Value::Number(20.0)));
        assert_eq!(eval("_OBJ['nested'].on"), Ok(Value::Bool(true)));
        assert_eq!(eval("_OBJ.list.length"), Ok(Value::Number(2.0)));
        assert_eq!(eval("_STR.length"), Ok(Value::Number(3.0)));
        assert_eq!(eval("_OBJ.nope"), Ok(Value::Undefined));
    }

    #[test]
    fn property_of_undefined_fails() {
        let err = eval("_MISSING.prop");
        assert!(matches!(err, Err(EvalError::PropertyOfNothing { .. })));
        assert!(err.unwrap_err().to_string().contains("undefined"));
    }

    #[test]
    fn literals() {
        assert_eq!(eval("[1, 'a']"), Ok(Value::parse_literal(r#"[1, "a"]"#)));
        assert_eq!(eval("{a: 1, 'b': [true]}"), Ok(Value::parse_literal(r#"{"a": 1, "b": [true]}"#)));
        assert_eq!(eval("_ONE ? 'yes' : 'no'"), Ok(Value::String("yes".into())));
    }

    #[test]
    fn unknown_identifier_is_not_defined() {
        assert_eq!(eval("foo"), Err(EvalError::NotDefined("foo".into())));
    }

    #[test]
    fn rejected_constructs() {
        assert!(matches!(eval("_STR.toUpperCase()"), Err(EvalError::Unsupported(_))));
        assert!(matches!(eval("_A = 1"), Err(EvalError::Unsupported(_))));
        assert!(matches!(eval("1 +"), Err(EvalError::Syntax(_))));
        assert!(matches!(eval("'open"), Err(EvalError::Syntax(_))));
        assert!(matches!(eval("1 2"), Err(EvalError::Syntax(_))));
    }
}
