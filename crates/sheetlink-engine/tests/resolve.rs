//! End-to-end resolution against an in-memory workbook.

use std::collections::HashMap;

use sheetlink_engine::engine::{
    CallStack, CellRef, CellSource, CellValue, ErrorKind, FormulaResolver, NoVariables,
    ResolveOptions, RhaiEvaluator, VariableState, resolve,
};

#[derive(Default)]
struct Book {
    sheets: HashMap<String, HashMap<CellRef, String>>,
}

impl Book {
    fn new(cells: &[(&str, &str, &str)]) -> Book {
        let mut book = Book::default();
        book.sheets.entry("Sheet1".to_string()).or_default();
        for (sheet, a1, text) in cells {
            let cell = CellRef::from_str(a1).unwrap();
            book.sheets
                .entry(sheet.to_string())
                .or_default()
                .insert(cell, text.to_string());
        }
        book
    }
}

impl CellSource for Book {
    fn cell_text(&self, col: usize, row: usize, sheet: Option<&str>) -> String {
        self.sheets
            .get(sheet.unwrap_or("Sheet1"))
            .and_then(|cells| cells.get(&CellRef::new(col, row)))
            .cloned()
            .unwrap_or_default()
    }

    fn has_sheet(&self, sheet: &str) -> bool {
        self.sheets.contains_key(sheet)
    }
}

fn eval(book: &Book, text: &str) -> Result<CellValue, ErrorKind> {
    let evaluator = RhaiEvaluator::new();
    resolve(text, book, &NoVariables, &evaluator, &ResolveOptions::default(), "Sheet1")
}

fn num(n: f64) -> Result<CellValue, ErrorKind> {
    Ok(CellValue::Number(n))
}

#[test]
fn test_plain_text_is_returned_unchanged() {
    let book = Book::new(&[]);
    assert_eq!(eval(&book, "hello"), Ok(CellValue::Text("hello".into())));
    assert_eq!(eval(&book, "42"), Ok(CellValue::Text("42".into())));
    assert_eq!(eval(&book, "#REF!"), Ok(CellValue::Text("#REF!".into())));
}

#[test]
fn test_cell_arithmetic() {
    let book = Book::new(&[("Sheet1", "A1", "1"), ("Sheet1", "A2", "2")]);
    assert_eq!(eval(&book, "=A1+A2"), num(3.0));
    assert_eq!(eval(&book, "= A1 * 10 - $A$2"), num(8.0));
}

#[test]
fn test_range_sum() {
    let book = Book::new(&[
        ("Sheet1", "A1", "1"),
        ("Sheet1", "A2", "2"),
        ("Sheet1", "A3", "3"),
    ]);
    assert_eq!(eval(&book, "=SUM(A1:A3)"), num(6.0));
    assert_eq!(eval(&book, "=SUM(A3:A1)"), num(6.0));
}

#[test]
fn test_range_expands_columns_outer_rows_inner() {
    let book = Book::new(&[
        ("Sheet1", "A1", "a"),
        ("Sheet1", "A2", "b"),
        ("Sheet1", "B1", "c"),
        ("Sheet1", "B2", "d"),
    ]);
    assert_eq!(eval(&book, "=CONCAT(A1:B2)"), Ok(CellValue::Text("abcd".into())));
}

#[test]
fn test_two_cell_cycle_is_reported_every_time() {
    let book = Book::new(&[("Sheet1", "A1", "=B1"), ("Sheet1", "B1", "=A1")]);
    let evaluator = RhaiEvaluator::new();
    let resolver = FormulaResolver::new(&book, &NoVariables, &evaluator);
    let mut stack = CallStack::default();

    for _ in 0..2 {
        assert_eq!(
            resolver.resolve_with_stack("=B1", "Sheet1", &mut stack),
            Err(ErrorKind::CircularDependency)
        );
        assert!(stack.is_empty());
        assert_eq!(stack.depth(), 0);
    }
}

#[test]
fn test_self_reference_is_circular() {
    let book = Book::new(&[("Sheet1", "A1", "=A1+1")]);
    let evaluator = RhaiEvaluator::new();
    let resolver = FormulaResolver::new(&book, &NoVariables, &evaluator);
    assert_eq!(resolver.resolve_cell(0, 0, "Sheet1"), Err(ErrorKind::CircularDependency));
}

#[test]
fn test_cross_sheet_reference() {
    let book = Book::new(&[("Sheet2", "A1", "5")]);
    assert_eq!(eval(&book, "=Sheet2!A1*2"), num(10.0));
}

#[test]
fn test_quoted_sheet_name_with_spaces() {
    let book = Book::new(&[
        ("My Sheet", "B2", "4"),
        ("My Sheet", "B3", "6"),
    ]);
    assert_eq!(eval(&book, "='My Sheet'!B2 + 1"), num(5.0));
    assert_eq!(eval(&book, "=SUM('My Sheet'!B2:B3)"), num(10.0));
}

#[test]
fn test_cross_sheet_formula_resolves_on_its_own_sheet() {
    // Data!A1 refers to A2 on Data, not on Sheet1.
    let book = Book::new(&[
        ("Data", "A1", "=A2*3"),
        ("Data", "A2", "2"),
        ("Sheet1", "A2", "100"),
    ]);
    assert_eq!(eval(&book, "=Data!A1+1"), num(7.0));
}

#[test]
fn test_unknown_sheet_is_ref() {
    let book = Book::new(&[]);
    assert_eq!(eval(&book, "=Missing!A1+1"), Err(ErrorKind::Ref));
}

#[test]
fn test_dynamic_variables() {
    let book = Book::new(&[("Sheet1", "A1", "#name"), ("Sheet1", "B1", "5")]);
    let evaluator = RhaiEvaluator::new();
    let options = ResolveOptions {
        trigger: Some('#'),
        ..ResolveOptions::default()
    };
    let variables = |token: &str| match token {
        "#x" => VariableState::Resolved("42".to_string()),
        "#name" => VariableState::Resolved("Ada".to_string()),
        "#quoted" => VariableState::Resolved("\"Ada\"".to_string()),
        "#expr" => VariableState::Resolved("2*3".to_string()),
        "#cell" => VariableState::Resolved("B1".to_string()),
        "#span" => VariableState::Resolved("B1:B2".to_string()),
        "#later" => VariableState::Pending,
        _ => VariableState::Unresolved,
    };

    let run = |text: &str| resolve(text, &book, &variables, &evaluator, &options, "Sheet1");
    assert_eq!(run("=#x+1"), num(43.0));
    assert_eq!(run("=LEN(#quoted)"), num(3.0));
    // Values are spliced in as text and then resolved like the rest of the formula.
    assert_eq!(run("=#expr+1"), num(7.0));
    assert_eq!(run("=#cell*2"), num(10.0));
    assert_eq!(run("=SUM(#span)"), num(5.0));
    assert_eq!(run("=A1"), Ok(CellValue::Text("Ada".into())));
    assert_eq!(run("#x"), Ok(CellValue::Text("42".into())));
    assert_eq!(run("=#later+1"), Err(ErrorKind::DynamicVariableResolving));
    assert_eq!(run("=#nope+1"), Err(ErrorKind::DynamicVariable));
    // A pending token wins over an unresolved one.
    assert_eq!(run("=#nope+#later"), Err(ErrorKind::DynamicVariableResolving));
    assert!(run("=#later").unwrap_err().is_pending());
}

/// Counts every cell read made through it.
struct CountingBook {
    book: Book,
    reads: std::cell::Cell<usize>,
}

impl CellSource for CountingBook {
    fn cell_text(&self, col: usize, row: usize, sheet: Option<&str>) -> String {
        self.reads.set(self.reads.get() + 1);
        self.book.cell_text(col, row, sheet)
    }

    fn has_sheet(&self, sheet: &str) -> bool {
        self.book.has_sheet(sheet)
    }
}

#[test]
fn test_pending_variable_reads_no_cells() {
    let cells = CountingBook {
        book: Book::new(&[("Sheet1", "A1", "1"), ("Sheet2", "B1", "2")]),
        reads: std::cell::Cell::new(0),
    };
    let evaluator = RhaiEvaluator::new();
    let options = ResolveOptions {
        trigger: Some('#'),
        ..ResolveOptions::default()
    };
    let variables = |token: &str| match token {
        "#later" => VariableState::Pending,
        _ => VariableState::Resolved("1".to_string()),
    };

    let result = resolve("=#later+A1+Sheet2!B1", &cells, &variables, &evaluator, &options, "Sheet1");
    assert_eq!(result, Err(ErrorKind::DynamicVariableResolving));
    assert_eq!(cells.reads.get(), 0);

    let result = resolve("=#now+A1+Sheet2!B1", &cells, &variables, &evaluator, &options, "Sheet1");
    assert_eq!(result, num(4.0));
    assert_eq!(cells.reads.get(), 2);
}

#[test]
fn test_error_literal_is_not_a_variable() {
    let book = Book::new(&[]);
    let evaluator = RhaiEvaluator::new();
    let options = ResolveOptions {
        trigger: Some('#'),
        ..ResolveOptions::default()
    };
    assert_eq!(
        resolve("=#REF!+1", &book, &NoVariables, &evaluator, &options, "Sheet1"),
        Err(ErrorKind::Ref)
    );
}

#[test]
fn test_ref_propagates_through_chain() {
    let book = Book::new(&[
        ("Sheet1", "A1", "#REF!"),
        ("Sheet1", "A2", "=A1+1"),
        ("Sheet1", "A3", "=A2*2"),
    ]);
    assert_eq!(eval(&book, "=A3"), Err(ErrorKind::Ref));
}

#[test]
fn test_ref_beats_circular() {
    let book = Book::new(&[("Sheet1", "A1", "#REF!"), ("Sheet1", "B1", "=B1")]);
    assert_eq!(eval(&book, "=A1+B1"), Err(ErrorKind::Ref));
}

#[test]
fn test_nested_evaluator_errors_propagate() {
    let book = Book::new(&[("Sheet1", "A1", "=1/0")]);
    assert_eq!(eval(&book, "=A1+1"), Err(ErrorKind::DivZero));
}

#[test]
fn test_resolution_is_idempotent() {
    let book = Book::new(&[
        ("Sheet1", "A1", "=B1*2"),
        ("Sheet1", "B1", "=C1+1"),
        ("Sheet1", "C1", "4"),
    ]);
    let first = eval(&book, "=A1");
    assert_eq!(first, num(10.0));
    assert_eq!(eval(&book, "=A1"), first);
}

#[test]
fn test_depth_limit_is_general_error() {
    let cells: Vec<(String, String)> = (1..=20)
        .map(|n| (format!("A{}", n), format!("=A{}+1", n + 1)))
        .collect();
    let refs: Vec<(&str, &str, &str)> = cells
        .iter()
        .map(|(a1, text)| ("Sheet1", a1.as_str(), text.as_str()))
        .collect();
    let book = Book::new(&refs);
    let evaluator = RhaiEvaluator::new();
    let options = ResolveOptions {
        max_depth: 5,
        ..ResolveOptions::default()
    };
    assert_eq!(
        resolve("=A1", &book, &NoVariables, &evaluator, &options, "Sheet1"),
        Err(ErrorKind::General)
    );
    // The same chain resolves with the default bound: A21 is empty (0).
    assert_eq!(eval(&book, "=A1"), num(20.0));
}

#[test]
fn test_oversized_range_is_general_error() {
    let book = Book::new(&[]);
    let evaluator = RhaiEvaluator::new();
    let options = ResolveOptions {
        max_range_cells: 10,
        ..ResolveOptions::default()
    };
    assert_eq!(
        resolve("=SUM(A1:A11)", &book, &NoVariables, &evaluator, &options, "Sheet1"),
        Err(ErrorKind::General)
    );
}

#[test]
fn test_text_values_are_not_reresolved() {
    let book = Book::new(&[("Sheet1", "A1", "B2"), ("Sheet1", "B2", "99")]);
    assert_eq!(eval(&book, r#"=CONCAT(A1, "!")"#), Ok(CellValue::Text("B2!".into())));
}

#[test]
fn test_negative_and_empty_references() {
    let book = Book::new(&[("Sheet1", "A1", "-5")]);
    assert_eq!(eval(&book, "=2-A1"), num(7.0));
    assert_eq!(eval(&book, "=Z99+1"), num(1.0));
}

#[test]
fn test_empty_formula_is_empty_text() {
    let book = Book::new(&[]);
    assert_eq!(eval(&book, "="), Ok(CellValue::Text(String::new())));
}

#[test]
fn test_formula_values_keep_their_type() {
    let book = Book::new(&[("Sheet1", "A1", "=1<2"), ("Sheet1", "A2", r#"="x""#)]);
    assert_eq!(eval(&book, "=IF(A1, A2, \"y\")"), Ok(CellValue::Text("x".into())));
}

#[test]
fn test_concatenation_and_percent() {
    let book = Book::new(&[("Sheet1", "A1", "a"), ("Sheet1", "A2", "=20%")]);
    assert_eq!(eval(&book, "=A1&\"b\""), Ok(CellValue::Text("ab".into())));
    assert_eq!(eval(&book, "=A1&1+2"), Ok(CellValue::Text("a3".into())));
    assert_eq!(eval(&book, "=50%"), num(0.5));
    assert_eq!(eval(&book, "=A2*10"), num(2.0));
    assert_eq!(eval(&book, "=A1&\"b\"=\"ab\""), Ok(CellValue::Bool(true)));
}
