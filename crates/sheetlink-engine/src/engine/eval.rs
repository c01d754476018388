//! Rhai engine creation and formula evaluation.
//!
//! The resolver hands over literal infix (`SUM(1,2)*"x"`); it is translated
//! by `infix.rs` and run on a Rhai engine with the spreadsheet built-ins
//! registered. Rhai errors are folded back into [`EvalError`].

use rhai::{Dynamic, Engine, EvalAltResult};

use super::infix::to_rhai;
use super::{CellValue, ErrorKind, EvalError};

/// Something that can evaluate literal infix to a single value.
pub trait Evaluator {
    fn evaluate(&self, infix: &str) -> Result<CellValue, EvalError>;
}

impl<F> Evaluator for F
where
    F: Fn(&str) -> Result<CellValue, EvalError>,
{
    fn evaluate(&self, infix: &str) -> Result<CellValue, EvalError> {
        self(infix)
    }
}

/// Create a Rhai engine with built-ins registered and resource limits set.
pub fn create_engine() -> Engine {
    let mut engine = Engine::new();
    engine.set_fast_operators(false);
    engine.set_max_expr_depths(128, 32);
    engine.set_max_operations(1_000_000);
    engine.set_max_string_size(1 << 20);
    engine.set_max_array_size(1 << 20);
    crate::builtins::register_builtins(&mut engine);
    engine
}

/// The default evaluator.
pub struct RhaiEvaluator {
    engine: Engine,
}

impl RhaiEvaluator {
    pub fn new() -> Self {
        RhaiEvaluator {
            engine: create_engine(),
        }
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }
}

impl Default for RhaiEvaluator {
    fn default() -> Self {
        Self::new()
    }
}

impl Evaluator for RhaiEvaluator {
    fn evaluate(&self, infix: &str) -> Result<CellValue, EvalError> {
        let script = to_rhai(infix)?;
        let value = self
            .engine
            .eval::<Dynamic>(&script)
            .map_err(|err| eval_error(*err))?;
        to_cell_value(value)
    }
}

fn to_cell_value(value: Dynamic) -> Result<CellValue, EvalError> {
    if value.is_unit() {
        return Ok(CellValue::Text(String::new()));
    }
    if let Ok(n) = value.as_float() {
        if n.is_nan() {
            return Err(EvalError::Num);
        }
        if n.is_infinite() {
            return Err(EvalError::DivZero);
        }
        return Ok(CellValue::Number(n));
    }
    if let Ok(n) = value.as_int() {
        return Ok(CellValue::Number(n as f64));
    }
    if let Ok(b) = value.as_bool() {
        return Ok(CellValue::Bool(b));
    }
    let type_name = value.type_name();
    match value.into_string() {
        Ok(s) => Ok(CellValue::Text(s)),
        Err(_) => Err(EvalError::Value(format!("formula produced {}", type_name))),
    }
}

fn eval_error(err: EvalAltResult) -> EvalError {
    let message = err.to_string();
    match err {
        EvalAltResult::ErrorRuntime(value, _) => {
            let code = value.into_string().unwrap_or_default();
            match ErrorKind::from_sentinel(&code) {
                Some(ErrorKind::Value) => EvalError::Value(code),
                Some(ErrorKind::DivZero) => EvalError::DivZero,
                Some(ErrorKind::Num) => EvalError::Num,
                Some(ErrorKind::Name) => EvalError::Name(code),
                Some(ErrorKind::NotAvailable) => EvalError::NotAvailable,
                _ => EvalError::Other(message),
            }
        }
        EvalAltResult::ErrorInFunctionCall(_, _, inner, _) => eval_error(*inner),
        EvalAltResult::ErrorFunctionNotFound(signature, _) => {
            let name: String = signature
                .chars()
                .take_while(|c| c.is_ascii_alphanumeric() || *c == '_')
                .collect();
            if name.starts_with(|c: char| c.is_ascii_alphabetic())
                && !crate::builtins::is_builtin(&name)
            {
                EvalError::Name(name)
            } else {
                // Known function or operator applied to the wrong types.
                EvalError::Value(signature)
            }
        }
        EvalAltResult::ErrorVariableNotFound(name, _) => EvalError::Name(name),
        EvalAltResult::ErrorArithmetic(text, _) => {
            if text.to_ascii_lowercase().contains("zero") {
                EvalError::DivZero
            } else {
                EvalError::Num
            }
        }
        EvalAltResult::ErrorMismatchDataType(..) | EvalAltResult::ErrorMismatchOutputType(..) => {
            EvalError::Value(message)
        }
        EvalAltResult::ErrorParsing(..) => EvalError::Syntax(message),
        _ => EvalError::Other(message),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn eval(infix: &str) -> Result<CellValue, EvalError> {
        RhaiEvaluator::new().evaluate(infix)
    }

    #[test]
    fn test_arithmetic_is_floating_point() {
        assert_eq!(eval("7/2"), Ok(CellValue::Number(3.5)));
        assert_eq!(eval("2^10"), Ok(CellValue::Number(1024.0)));
        assert_eq!(eval("(-3)*2"), Ok(CellValue::Number(-6.0)));
    }

    #[test]
    fn test_value_kinds() {
        assert_eq!(eval("1<2"), Ok(CellValue::Bool(true)));
        assert_eq!(eval(r#""ab""#), Ok(CellValue::Text("ab".into())));
        assert_eq!(eval("SUM(1,2,3)"), Ok(CellValue::Number(6.0)));
    }

    #[test]
    fn test_errors_map_to_spreadsheet_codes() {
        assert_eq!(eval("1/0"), Err(EvalError::DivZero));
        assert_eq!(eval("SQRT(-1)"), Err(EvalError::Num));
        assert!(matches!(eval("NOPE(1)"), Err(EvalError::Name(_))));
        assert!(matches!(eval(r#"1+"a"*2"#), Err(EvalError::Value(_))));
        assert!(matches!(eval(r#"1+"a""#), Err(EvalError::Value(_))));
        assert!(matches!(eval("ABS(\"x\")"), Err(EvalError::Value(_))));
        assert!(matches!(eval("1+"), Err(EvalError::Syntax(_))));
    }

    #[test]
    fn test_closures_are_evaluators() {
        let fixed = |_: &str| -> Result<CellValue, EvalError> { Ok(CellValue::Number(1.0)) };
        assert_eq!(fixed.evaluate("anything"), Ok(CellValue::Number(1.0)));
    }
}
