use std::fmt;

/// A resolved cell value.
#[derive(Clone, Debug, PartialEq)]
pub enum CellValue {
    Number(f64),
    Text(String),
    Bool(bool),
}

impl CellValue {
    /// Render this value as a literal for a resolved infix string.
    pub fn to_literal(&self) -> String {
        match self {
            CellValue::Number(n) => number_literal(*n),
            CellValue::Text(s) => quote_string(s),
            CellValue::Bool(b) => if *b { "TRUE" } else { "FALSE" }.to_string(),
        }
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Number(n) => f.write_str(&format_number(*n)),
            CellValue::Text(s) => f.write_str(s),
            CellValue::Bool(b) => f.write_str(if *b { "TRUE" } else { "FALSE" }),
        }
    }
}

/// Format a number for display.
pub fn format_number(n: f64) -> String {
    if n.is_nan() {
        "#NUM!".to_string()
    } else if n.is_infinite() {
        "#DIV/0!".to_string()
    } else if n == 0.0 {
        "0".to_string()
    } else if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{:.0}", n)
    } else {
        n.to_string()
    }
}

/// Numeric literal; negatives are parenthesised so `2-A1` stays `2-(-5)`.
pub(crate) fn number_literal(n: f64) -> String {
    if n == 0.0 {
        return "0".to_string();
    }
    let text = if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{:.0}", n)
    } else {
        n.to_string()
    };
    if n.is_sign_negative() {
        format!("({})", text)
    } else {
        text
    }
}

/// Double-quoted string literal with embedded quotes doubled.
pub(crate) fn quote_string(s: &str) -> String {
    format!("\"{}\"", s.replace('"', "\"\""))
}

/// Parse stored cell text as a number (trimmed, finite only).
pub(crate) fn parse_number(text: &str) -> Option<f64> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }
    match trimmed.parse::<f64>() {
        Ok(n) if n.is_finite() => Some(n),
        _ => None,
    }
}

/// Literal for plain (non-formula) stored text.
pub(crate) fn text_literal(text: &str) -> String {
    if text.trim().is_empty() {
        return "0".to_string();
    }
    match parse_number(text) {
        Some(n) => number_literal(n),
        None => quote_string(text),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_number_integers_have_no_fraction() {
        assert_eq!(format_number(3.0), "3");
        assert_eq!(format_number(-12.0), "-12");
        assert_eq!(format_number(2.5), "2.5");
        assert_eq!(format_number(f64::NAN), "#NUM!");
    }

    #[test]
    fn test_literals() {
        assert_eq!(text_literal(""), "0");
        assert_eq!(text_literal(" 42 "), "42");
        assert_eq!(text_literal("-5"), "(-5)");
        assert_eq!(text_literal("1e3"), "1000");
        assert_eq!(text_literal("inf"), "\"inf\"");
        assert_eq!(text_literal("say \"hi\""), "\"say \"\"hi\"\"\"");
        assert_eq!(CellValue::Bool(true).to_literal(), "TRUE");
        assert_eq!(CellValue::Number(0.25).to_literal(), "0.25");
    }
}
