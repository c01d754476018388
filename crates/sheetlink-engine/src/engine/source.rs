//! Collaborators the resolver reads from: stored cell text and dynamic variables.

/// Read access to stored (unresolved) cell text.
pub trait CellSource {
    /// Raw text at (col, row) on `sheet`, or on the source's default sheet when
    /// `sheet` is None. Empty cells return `""`.
    fn cell_text(&self, col: usize, row: usize, sheet: Option<&str>) -> String;

    /// Whether a sheet with this name exists. References to missing sheets are
    /// `#REF!`.
    fn has_sheet(&self, _sheet: &str) -> bool {
        true
    }
}

impl<F> CellSource for F
where
    F: Fn(usize, usize, Option<&str>) -> String,
{
    fn cell_text(&self, col: usize, row: usize, sheet: Option<&str>) -> String {
        self(col, row, sheet)
    }
}

/// Lookup state of a dynamic variable token.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum VariableState {
    /// The token's value, substituted as text.
    Resolved(String),
    /// The host is still fetching the value.
    Pending,
    /// No value exists for the token.
    Unresolved,
}

/// Values injected by the host application for trigger-prefixed tokens.
pub trait VariableResolver {
    fn variable(&self, token: &str) -> VariableState;
}

impl<F> VariableResolver for F
where
    F: Fn(&str) -> VariableState,
{
    fn variable(&self, token: &str) -> VariableState {
        self(token)
    }
}

/// A resolver with no variables at all.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoVariables;

impl VariableResolver for NoVariables {
    fn variable(&self, _token: &str) -> VariableState {
        VariableState::Unresolved
    }
}
