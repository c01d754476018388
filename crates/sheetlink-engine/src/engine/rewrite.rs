//! Reference rewriting: turns a formula body into a literal infix string.
//!
//! The passes run in a fixed order, each one feeding the next:
//!
//! 1. dynamic variable tokens (`#customer`) are replaced by their text, as is,
//!    so a value such as `B2*2` goes through the passes below
//! 2. whitespace is removed outside quoted sheet names and string literals
//! 3. sheet-qualified references (`'My Sheet'!A1`, `Data!A1:A3`) become literals
//! 4. ranges (`A1:B2`) expand to `A1,A2,B1,B2` (columns outer, rows inner)
//! 5. bare references (`A1`) become literals from the current sheet
//!
//! Passes 3-5 never touch text inside double-quoted string literals, so a
//! referenced cell's text value like `"B2"` is not mistaken for a reference.

use regex::{Captures, Regex};
use std::sync::OnceLock;

use super::cycle::CallStack;
use super::error::ERROR_LITERALS;
use super::format::text_literal;
use super::resolve::FormulaResolver;
use super::{CellRange, CellRef, ErrorKind, VariableState};

fn sheet_ref_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?:'(?<quoted>[^']*)'|(?<plain>[A-Za-z0-9_]+))!(?<start>\$?[A-Za-z]+\$?[1-9][0-9]*)(?::(?<end>\$?[A-Za-z]+\$?[1-9][0-9]*))?",
        )
        .expect("sheet reference regex must compile")
    })
}

fn range_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\$?[A-Za-z]+\$?[1-9][0-9]*:\$?[A-Za-z]+\$?[1-9][0-9]*")
            .expect("range regex must compile")
    })
}

fn cell_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\$?[A-Za-z]+\$?[1-9][0-9]*").expect("cell reference regex must compile")
    })
}

/// Characters that end a dynamic variable token besides whitespace.
const TOKEN_STOP: &str = r#"+\-*/^&=<>(),;:'"%"#;

fn variable_re(trigger: char) -> Result<Regex, ErrorKind> {
    let pattern = format!(
        "{}[^\\s{}]+",
        regex::escape(&trigger.to_string()),
        TOKEN_STOP
    );
    Regex::new(&pattern).map_err(|err| {
        tracing::warn!(%trigger, error = %err, "invalid variable trigger");
        ErrorKind::General
    })
}

/// Highest-precedence error seen while a pass keeps scanning.
#[derive(Debug, Default)]
pub(crate) struct Deferred(Option<ErrorKind>);

impl Deferred {
    pub(crate) fn record(&mut self, kind: ErrorKind) {
        match self.0 {
            Some(current) if current.precedence() <= kind.precedence() => {}
            _ => self.0 = Some(kind),
        }
    }

    fn finish(self, text: String) -> Result<String, ErrorKind> {
        match self.0 {
            Some(kind) => Err(kind),
            None => Ok(text),
        }
    }
}

impl FormulaResolver<'_> {
    /// Rewrite a formula body (without `=`) into a literal infix string.
    pub(crate) fn rewrite(
        &self,
        body: &str,
        sheet: &str,
        stack: &mut CallStack,
    ) -> Result<String, ErrorKind> {
        let text = self.substitute_variables(body)?;
        reject_ref_literals(&text)?;
        let text = strip_whitespace(&text);

        let mut deferred = Deferred::default();
        let text = self.substitute_sheet_refs(&text, stack, &mut deferred)?;
        let text = self.expand_ranges(&text, &mut deferred)?;
        let text = self.substitute_cell_refs(&text, sheet, stack, &mut deferred)?;
        deferred.finish(text)
    }

    /// Pass 1. A pending token stops everything; an unresolved one fails after
    /// the remaining tokens have been checked for pending values.
    fn substitute_variables(&self, text: &str) -> Result<String, ErrorKind> {
        let Some(trigger) = self.options().trigger else {
            return Ok(text.to_string());
        };
        let re = variable_re(trigger)?;
        let mut unresolved = false;
        let out = try_replace_all(&re, text, |caps| {
            let Some(m) = caps.get(0) else {
                return Ok(None);
            };
            if is_error_literal(&text[m.start()..]) {
                return Ok(None);
            }
            match self.variables().variable(m.as_str()) {
                VariableState::Resolved(value) => Ok(Some(value)),
                VariableState::Pending => {
                    tracing::debug!(token = m.as_str(), "variable pending");
                    Err(ErrorKind::DynamicVariableResolving)
                }
                VariableState::Unresolved => {
                    tracing::debug!(token = m.as_str(), "variable unresolved");
                    unresolved = true;
                    Ok(None)
                }
            }
        })?;
        if unresolved {
            return Err(ErrorKind::DynamicVariable);
        }
        Ok(out)
    }

    /// Pass 3.
    fn substitute_sheet_refs(
        &self,
        text: &str,
        stack: &mut CallStack,
        deferred: &mut Deferred,
    ) -> Result<String, ErrorKind> {
        map_outside_strings(text, |seg| {
            try_replace_all(sheet_ref_re(), seg, |caps| {
                let sheet = caps
                    .name("quoted")
                    .or_else(|| caps.name("plain"))
                    .map_or("", |m| m.as_str());
                if !self.cells().has_sheet(sheet) {
                    tracing::debug!(sheet, "reference to unknown sheet");
                    deferred.record(ErrorKind::Ref);
                    return Ok(Some("0".to_string()));
                }
                let Some(start) = CellRef::from_str(&caps["start"]) else {
                    deferred.record(ErrorKind::Ref);
                    return Ok(Some("0".to_string()));
                };
                let cells: Vec<CellRef> = match caps.name("end") {
                    None => vec![start],
                    Some(end) => {
                        let Some(end) = CellRef::from_str(end.as_str()) else {
                            deferred.record(ErrorKind::Ref);
                            return Ok(Some("0".to_string()));
                        };
                        match self.range_cells(CellRange::new(start, end)) {
                            Some(cells) => cells,
                            None => {
                                deferred.record(ErrorKind::General);
                                return Ok(Some("0".to_string()));
                            }
                        }
                    }
                };
                let literals: Vec<String> = cells
                    .into_iter()
                    .map(|cell| self.literal_or_deferred(sheet, cell, stack, deferred))
                    .collect();
                Ok(Some(literals.join(",")))
            })
        })
    }

    /// Pass 4.
    fn expand_ranges(&self, text: &str, deferred: &mut Deferred) -> Result<String, ErrorKind> {
        map_outside_strings(text, |seg| {
            try_replace_all(range_re(), seg, |caps| {
                let Some(m) = caps.get(0) else {
                    return Ok(None);
                };
                if !is_standalone(seg, m.start(), m.end()) {
                    return Ok(None);
                }
                let Some(range) = super::parse_range(m.as_str()) else {
                    return Ok(None);
                };
                match self.range_cells(range) {
                    Some(cells) => Ok(Some(
                        cells
                            .iter()
                            .map(CellRef::to_string)
                            .collect::<Vec<_>>()
                            .join(","),
                    )),
                    None => {
                        deferred.record(ErrorKind::General);
                        Ok(Some("0".to_string()))
                    }
                }
            })
        })
    }

    /// Pass 5.
    fn substitute_cell_refs(
        &self,
        text: &str,
        sheet: &str,
        stack: &mut CallStack,
        deferred: &mut Deferred,
    ) -> Result<String, ErrorKind> {
        map_outside_strings(text, |seg| {
            try_replace_all(cell_re(), seg, |caps| {
                let Some(m) = caps.get(0) else {
                    return Ok(None);
                };
                if !is_standalone(seg, m.start(), m.end()) {
                    return Ok(None);
                }
                let Some(cell) = CellRef::from_str(m.as_str()) else {
                    return Ok(None);
                };
                Ok(Some(self.literal_or_deferred(sheet, cell, stack, deferred)))
            })
        })
    }

    fn range_cells(&self, range: CellRange) -> Option<Vec<CellRef>> {
        let limit = self.options().max_range_cells;
        match range.cell_count() {
            Some(count) if count <= limit => Some(range.cells().collect()),
            _ => {
                tracing::warn!(range = %range, limit, "range too large to expand");
                None
            }
        }
    }

    fn literal_or_deferred(
        &self,
        sheet: &str,
        cell: CellRef,
        stack: &mut CallStack,
        deferred: &mut Deferred,
    ) -> String {
        match self.reference_literal(sheet, cell, stack) {
            Ok(literal) => literal,
            Err(kind) => {
                deferred.record(kind);
                "0".to_string()
            }
        }
    }

    /// Literal for the value of `cell` on `sheet`, recursing into formulas.
    fn reference_literal(
        &self,
        sheet: &str,
        cell: CellRef,
        stack: &mut CallStack,
    ) -> Result<String, ErrorKind> {
        let text = self.cells().cell_text(cell.col, cell.row, Some(sheet));
        if let Some(body) = text.strip_prefix(super::FORMULA_SIGIL) {
            stack.enter(sheet, cell)?;
            let value = self.resolve_formula(body, sheet, stack);
            stack.leave(sheet, &cell);
            return value.map(|v| v.to_literal());
        }
        if text.trim() == ErrorKind::Ref.sentinel() {
            return Err(ErrorKind::Ref);
        }
        if self.is_variable_text(&text) {
            let value = self.resolve_variable_text(&text)?;
            return Ok(text_literal(&value.to_string()));
        }
        Ok(text_literal(&text))
    }
}

/// Distinct dynamic variable tokens in `text`, in order of first use. Error
/// literals such as `#REF!` are not tokens.
pub fn variable_tokens(text: &str, trigger: char) -> Vec<String> {
    let Ok(re) = variable_re(trigger) else {
        return Vec::new();
    };
    let mut tokens: Vec<String> = Vec::new();
    for m in re.find_iter(text) {
        if is_error_literal(&text[m.start()..]) {
            continue;
        }
        if !tokens.iter().any(|t| t == m.as_str()) {
            tokens.push(m.as_str().to_string());
        }
    }
    tokens
}

fn is_error_literal(text: &str) -> bool {
    ERROR_LITERALS.iter().any(|lit| text.starts_with(lit))
}

/// A `#REF!` left in formula text by a structural delete.
fn reject_ref_literals(text: &str) -> Result<(), ErrorKind> {
    map_outside_strings(text, |seg| {
        if seg.contains(ErrorKind::Ref.sentinel()) {
            Err(ErrorKind::Ref)
        } else {
            Ok(seg.to_string())
        }
    })
    .map(|_| ())
}

/// True when the match is not glued to a surrounding identifier, number,
/// sheet qualifier or function call.
pub(crate) fn is_standalone(text: &str, start: usize, end: usize) -> bool {
    let before = text[..start].chars().next_back();
    let after = text[end..].chars().next();
    let glued_before = before.is_some_and(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '!' | '$'));
    let glued_after = after.is_some_and(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '(' | '!'));
    !glued_before && !glued_after
}

/// Like `Regex::replace_all`, but the replacer can fail or keep a match.
pub(crate) fn try_replace_all<F>(re: &Regex, text: &str, mut replace: F) -> Result<String, ErrorKind>
where
    F: FnMut(&Captures<'_>) -> Result<Option<String>, ErrorKind>,
{
    let mut out = String::with_capacity(text.len());
    let mut last = 0;
    for caps in re.captures_iter(text) {
        let Some(m) = caps.get(0) else {
            continue;
        };
        out.push_str(&text[last..m.start()]);
        match replace(&caps)? {
            Some(replacement) => out.push_str(&replacement),
            None => out.push_str(m.as_str()),
        }
        last = m.end();
    }
    out.push_str(&text[last..]);
    Ok(out)
}

/// Apply `f` to every segment outside double-quoted string literals. A doubled
/// quote inside a literal is an escaped quote.
pub(crate) fn map_outside_strings<F>(text: &str, mut f: F) -> Result<String, ErrorKind>
where
    F: FnMut(&str) -> Result<String, ErrorKind>,
{
    let bytes = text.as_bytes();
    let mut out = String::with_capacity(text.len());
    let mut seg_start = 0;
    let mut in_string = false;
    let mut i = 0usize;

    while i < bytes.len() {
        let b = bytes[i];
        if in_string {
            if b == b'"' {
                if bytes.get(i + 1) == Some(&b'"') {
                    i += 2;
                    continue;
                }
                out.push_str(&text[seg_start..=i]);
                in_string = false;
                seg_start = i + 1;
            }
            i += 1;
            continue;
        }

        if b == b'"' {
            out.push_str(&f(&text[seg_start..i])?);
            in_string = true;
            seg_start = i;
        }
        i += 1;
    }

    if seg_start < text.len() {
        if in_string {
            out.push_str(&text[seg_start..]);
        } else {
            out.push_str(&f(&text[seg_start..])?);
        }
    }

    Ok(out)
}

/// Remove whitespace except inside single-quoted sheet names and
/// double-quoted string literals.
pub(crate) fn strip_whitespace(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_single = false;
    let mut in_double = false;
    for c in text.chars() {
        match c {
            '\'' if !in_double => in_single = !in_single,
            '"' if !in_single => in_double = !in_double,
            c if c.is_whitespace() && !in_single && !in_double => continue,
            _ => {}
        }
        out.push(c);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_strip_whitespace_keeps_quoted_names() {
        assert_eq!(
            strip_whitespace(" 'My Sheet'!A1 + B 2 "),
            "'My Sheet'!A1+B2"
        );
        assert_eq!(strip_whitespace(r#"CONCAT("a b", 1)"#), r#"CONCAT("a b",1)"#);
    }

    #[test]
    fn test_map_outside_strings_skips_literals() {
        let out = map_outside_strings(r#"A1&"A1 ""x"""&A1"#, |seg| Ok(seg.replace("A1", "1")))
            .unwrap();
        assert_eq!(out, r#"1&"A1 ""x"""&1"#);
    }

    #[test]
    fn test_standalone_boundaries() {
        assert!(is_standalone("A1+B2", 0, 2));
        assert!(!is_standalone("LOG10(5)", 0, 5));
        assert!(!is_standalone("x_A1", 2, 4));
        assert!(!is_standalone("Data!A1", 5, 7));
    }

    #[test]
    fn test_reject_ref_literals_ignores_strings() {
        assert_eq!(reject_ref_literals("#REF!+1"), Err(ErrorKind::Ref));
        assert_eq!(reject_ref_literals(r##"LEN("#REF!")"##), Ok(()));
    }

    #[test]
    fn test_variable_tokens() {
        assert_eq!(
            variable_tokens("=#price*#qty+#price-#REF!", '#'),
            vec!["#price".to_string(), "#qty".to_string()]
        );
        assert_eq!(variable_tokens("=@total/2", '@'), vec!["@total".to_string()]);
        assert!(variable_tokens("=A1+1", '#').is_empty());
    }

    #[test]
    fn test_deferred_keeps_highest_precedence() {
        let mut deferred = Deferred::default();
        deferred.record(ErrorKind::Value);
        deferred.record(ErrorKind::CircularDependency);
        deferred.record(ErrorKind::DivZero);
        assert_eq!(deferred.finish(String::new()), Err(ErrorKind::CircularDependency));

        let mut deferred = Deferred::default();
        deferred.record(ErrorKind::CircularDependency);
        deferred.record(ErrorKind::Ref);
        assert_eq!(deferred.finish(String::new()), Err(ErrorKind::Ref));
    }
}
