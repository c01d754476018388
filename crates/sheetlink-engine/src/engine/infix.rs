//! Translation of spreadsheet infix into a Rhai expression.
//!
//! - numbers become float literals (`1` -> `1.0`) so `/` never truncates
//! - `^` -> `**`, `=` -> `==`, `<>` -> `!=`
//! - `a & b` -> `a concat_text b`, a custom operator binding tighter than
//!   comparisons and looser than `+`
//! - postfix `%` divides the operand before it by 100
//! - `TRUE` / `FALSE` -> `true` / `false`
//! - `NAME(a, b)` -> `NAME([a, b])`, names uppercased; every built-in takes one array
//! - `"a""b"` -> `"a\"b"`

use super::EvalError;

/// Rhai custom operator standing in for `&`. Registered by the built-ins.
pub(crate) const CONCAT_OPERATOR: &str = "concat_text";

#[derive(Clone, Copy, PartialEq, Eq)]
enum Paren {
    Group,
    Call,
}

pub fn to_rhai(infix: &str) -> Result<String, EvalError> {
    let chars: Vec<char> = infix.chars().collect();
    let mut out = String::with_capacity(infix.len() + 16);
    // Each open paren remembers where its operand starts in `out`.
    let mut parens: Vec<(Paren, usize)> = Vec::new();
    // Start of the operand just written, the target of a postfix `%`.
    let mut operand: Option<usize> = None;
    let mut i = 0usize;

    while i < chars.len() {
        let c = chars[i];
        let start = out.len();
        match c {
            c if c.is_whitespace() => {
                i += 1;
                continue;
            }
            '"' => {
                let (literal, next) = read_string(&chars, i)?;
                out.push_str(&literal);
                i = next;
                operand = Some(start);
                continue;
            }
            c if c.is_ascii_digit() || (c == '.' && chars.get(i + 1).is_some_and(|d| d.is_ascii_digit())) => {
                let (literal, next) = read_number(&chars, i)?;
                out.push_str(&literal);
                i = next;
                operand = Some(start);
                continue;
            }
            c if c.is_ascii_alphabetic() || c == '_' => {
                let name_start = i;
                while i < chars.len() && (chars[i].is_ascii_alphanumeric() || matches!(chars[i], '_' | '.')) {
                    i += 1;
                }
                let name: String = chars[name_start..i].iter().collect::<String>().to_ascii_uppercase();
                if chars.get(i) == Some(&'(') {
                    out.push_str(&name.replace('.', "_"));
                    out.push_str("([");
                    parens.push((Paren::Call, start));
                    i += 1;
                    operand = None;
                } else {
                    match name.as_str() {
                        "TRUE" => out.push_str("true"),
                        "FALSE" => out.push_str("false"),
                        _ => return Err(EvalError::Name(name)),
                    }
                    operand = Some(start);
                }
                continue;
            }
            '(' => {
                out.push('(');
                parens.push((Paren::Group, start));
                i += 1;
                operand = None;
                continue;
            }
            ')' => {
                let opened_at = match parens.pop() {
                    Some((Paren::Call, at)) => {
                        out.push_str("])");
                        at
                    }
                    Some((Paren::Group, at)) => {
                        out.push(')');
                        at
                    }
                    None => return Err(EvalError::Syntax("unbalanced ')'".into())),
                };
                i += 1;
                operand = Some(opened_at);
                continue;
            }
            '%' => {
                let Some(at) = operand else {
                    return Err(EvalError::Syntax("'%' must follow a value".into()));
                };
                out.insert(at, '(');
                out.push_str("/100.0)");
                i += 1;
                continue;
            }
            '&' => {
                out.push(' ');
                out.push_str(CONCAT_OPERATOR);
                out.push(' ');
                i += 1;
            }
            '^' => {
                out.push_str("**");
                i += 1;
            }
            '<' if chars.get(i + 1) == Some(&'>') => {
                out.push_str("!=");
                i += 2;
            }
            '<' | '>' if chars.get(i + 1) == Some(&'=') => {
                out.push(c);
                out.push('=');
                i += 2;
            }
            '=' => {
                out.push_str("==");
                i += if chars.get(i + 1) == Some(&'=') { 2 } else { 1 };
            }
            '+' | '-' | '*' | '/' | '<' | '>' | ',' => {
                out.push(c);
                i += 1;
            }
            other => {
                return Err(EvalError::Syntax(format!("unexpected character '{}'", other)));
            }
        }
        // Only operators reach this point.
        operand = None;
    }

    if !parens.is_empty() {
        return Err(EvalError::Syntax("unbalanced '('".into()));
    }
    Ok(out)
}

fn read_string(chars: &[char], start: usize) -> Result<(String, usize), EvalError> {
    let mut out = String::from("\"");
    let mut i = start + 1;
    while i < chars.len() {
        match chars[i] {
            '"' if chars.get(i + 1) == Some(&'"') => {
                out.push_str("\\\"");
                i += 2;
            }
            '"' => {
                out.push('"');
                return Ok((out, i + 1));
            }
            '\\' => {
                out.push_str("\\\\");
                i += 1;
            }
            '\n' => {
                out.push_str("\\n");
                i += 1;
            }
            c => {
                out.push(c);
                i += 1;
            }
        }
    }
    Err(EvalError::Syntax("unterminated string literal".into()))
}

fn read_number(chars: &[char], start: usize) -> Result<(String, usize), EvalError> {
    let mut i = start;
    while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
        i += 1;
    }
    if i < chars.len() && matches!(chars[i], 'e' | 'E') {
        let mut j = i + 1;
        if j < chars.len() && matches!(chars[j], '+' | '-') {
            j += 1;
        }
        if j < chars.len() && chars[j].is_ascii_digit() {
            while j < chars.len() && chars[j].is_ascii_digit() {
                j += 1;
            }
            i = j;
        }
    }
    let text: String = chars[start..i].iter().collect();
    let n: f64 = text
        .parse()
        .map_err(|_| EvalError::Syntax(format!("invalid number '{}'", text)))?;
    Ok((float_literal(n), i))
}

/// Rhai float literal without exponent notation.
fn float_literal(n: f64) -> String {
    let text = n.to_string();
    if text.contains('.') {
        text
    } else {
        format!("{}.0", text)
    }
}
