//! Built-in spreadsheet functions (Rust) and their metadata.
//!
//! Conventions:
//! - Spreadsheet-facing names are ALL CAPS (e.g. `SUM`, `AVERAGE`).
//! - The infix translator turns every call into `NAME([args...])`, so each
//!   built-in takes a single `Array`.
//! - Errors are raised as runtime errors carrying the spreadsheet code
//!   (`#VALUE!`, `#DIV/0!`, `#NUM!`) and mapped back by the evaluator.
//! - If you add a built-in, list it in `BUILTINS` and register it in
//!   `register_builtins`.

use rand::Rng;
use rhai::{Array, Dynamic, Engine, EvalAltResult, ImmutableString, Position};

use crate::engine::{CONCAT_OPERATOR, ErrorKind, format_number};

pub struct Builtin {
    pub name: &'static str,
    #[allow(dead_code)]
    pub description: &'static str,
}

pub const BUILTINS: &[Builtin] = &[
    Builtin { name: "SUM", description: "Sum of numeric arguments" },
    Builtin { name: "AVERAGE", description: "Mean of numeric arguments" },
    Builtin { name: "AVG", description: "Alias of AVERAGE" },
    Builtin { name: "MIN", description: "Smallest numeric argument (0 if none)" },
    Builtin { name: "MAX", description: "Largest numeric argument (0 if none)" },
    Builtin { name: "COUNT", description: "Number of numeric arguments" },
    Builtin { name: "COUNTA", description: "Number of non-empty arguments" },
    Builtin { name: "PRODUCT", description: "Product of numeric arguments" },
    Builtin { name: "ABS", description: "Absolute value" },
    Builtin { name: "ROUND", description: "Round half away from zero to n digits" },
    Builtin { name: "INT", description: "Round down to an integer" },
    Builtin { name: "MOD", description: "Remainder with the sign of the divisor" },
    Builtin { name: "POWER", description: "Exponentiation" },
    Builtin { name: "SQRT", description: "Square root" },
    Builtin { name: "IF", description: "IF(condition, then[, else])" },
    Builtin { name: "AND", description: "True when every argument is true" },
    Builtin { name: "OR", description: "True when any argument is true" },
    Builtin { name: "NOT", description: "Logical negation" },
    Builtin { name: "CONCATENATE", description: "Join arguments as text" },
    Builtin { name: "CONCAT", description: "Alias of CONCATENATE" },
    Builtin { name: "LEN", description: "Number of characters" },
    Builtin { name: "UPPER", description: "Uppercase text" },
    Builtin { name: "LOWER", description: "Lowercase text" },
    Builtin { name: "TRIM", description: "Trim and collapse inner spaces" },
    Builtin { name: "RAND", description: "Random float in [0, 1)" },
    Builtin { name: "RANDBETWEEN", description: "Random integer in [low, high]" },
    Builtin { name: "TODAY", description: "Current local date as YYYY-MM-DD" },
    Builtin { name: "NOW", description: "Current local date and time" },
];

pub fn is_builtin(name: &str) -> bool {
    BUILTINS.iter().any(|b| b.name == name)
}

type FnResult<T> = Result<T, Box<EvalAltResult>>;

fn formula_error(kind: ErrorKind) -> Box<EvalAltResult> {
    EvalAltResult::ErrorRuntime(kind.sentinel().into(), Position::NONE).into()
}

fn arity(args: &Array, min: usize, max: usize) -> FnResult<()> {
    if args.len() < min || args.len() > max {
        return Err(formula_error(ErrorKind::Value));
    }
    Ok(())
}

/// Strict numeric coercion for scalar arguments.
fn number_arg(value: &Dynamic) -> FnResult<f64> {
    if let Ok(n) = value.as_float() {
        return Ok(n);
    }
    if let Ok(n) = value.as_int() {
        return Ok(n as f64);
    }
    if let Ok(b) = value.as_bool() {
        return Ok(if b { 1.0 } else { 0.0 });
    }
    if let Ok(s) = value.clone().into_string() {
        if s.trim().is_empty() {
            return Ok(0.0);
        }
        if let Ok(n) = s.trim().parse::<f64>() {
            return Ok(n);
        }
    }
    Err(formula_error(ErrorKind::Value))
}

/// Lenient coercion for aggregates: text is skipped.
fn numbers(args: &Array) -> Vec<f64> {
    args.iter()
        .filter_map(|value| {
            if let Ok(n) = value.as_float() {
                Some(n)
            } else if let Ok(n) = value.as_int() {
                Some(n as f64)
            } else if let Ok(b) = value.as_bool() {
                Some(if b { 1.0 } else { 0.0 })
            } else {
                None
            }
        })
        .collect()
}

fn truthy(value: &Dynamic) -> FnResult<bool> {
    if let Ok(b) = value.as_bool() {
        return Ok(b);
    }
    if let Ok(s) = value.clone().into_string() {
        return match s.to_ascii_uppercase().as_str() {
            "TRUE" => Ok(true),
            "FALSE" => Ok(false),
            _ => Err(formula_error(ErrorKind::Value)),
        };
    }
    Ok(number_arg(value)? != 0.0)
}

fn text_arg(value: &Dynamic) -> String {
    if let Ok(n) = value.as_float() {
        format_number(n)
    } else if let Ok(n) = value.as_int() {
        n.to_string()
    } else if let Ok(b) = value.as_bool() {
        if b { "TRUE" } else { "FALSE" }.to_string()
    } else if let Ok(s) = value.clone().into_string() {
        s
    } else {
        String::new()
    }
}

fn sum(args: Array) -> f64 {
    numbers(&args).iter().sum()
}

fn average(args: Array) -> FnResult<f64> {
    let values = numbers(&args);
    if values.is_empty() {
        return Err(formula_error(ErrorKind::DivZero));
    }
    Ok(values.iter().sum::<f64>() / values.len() as f64)
}

fn min(args: Array) -> f64 {
    numbers(&args).into_iter().reduce(f64::min).unwrap_or(0.0)
}

fn max(args: Array) -> f64 {
    numbers(&args).into_iter().reduce(f64::max).unwrap_or(0.0)
}

fn count(args: Array) -> f64 {
    args.iter()
        .filter(|value| value.as_float().is_ok() || value.as_int().is_ok())
        .count() as f64
}

fn counta(args: Array) -> f64 {
    args.into_iter()
        .filter(|value| {
            if value.is_string() {
                value.clone().into_string().is_ok_and(|s| !s.is_empty())
            } else {
                !value.is_unit()
            }
        })
        .count() as f64
}

fn product(args: Array) -> f64 {
    let values = numbers(&args);
    if values.is_empty() {
        return 0.0;
    }
    values.iter().product()
}

fn abs(args: Array) -> FnResult<f64> {
    arity(&args, 1, 1)?;
    Ok(number_arg(&args[0])?.abs())
}

fn round(args: Array) -> FnResult<f64> {
    arity(&args, 1, 2)?;
    let n = number_arg(&args[0])?;
    let digits = match args.get(1) {
        Some(d) => number_arg(d)?.trunc() as i32,
        None => 0,
    };
    let factor = 10f64.powi(digits);
    Ok((n * factor).round() / factor)
}

fn int(args: Array) -> FnResult<f64> {
    arity(&args, 1, 1)?;
    Ok(number_arg(&args[0])?.floor())
}

fn modulo(args: Array) -> FnResult<f64> {
    arity(&args, 2, 2)?;
    let n = number_arg(&args[0])?;
    let d = number_arg(&args[1])?;
    if d == 0.0 {
        return Err(formula_error(ErrorKind::DivZero));
    }
    Ok(n - d * (n / d).floor())
}

fn power(args: Array) -> FnResult<f64> {
    arity(&args, 2, 2)?;
    let result = number_arg(&args[0])?.powf(number_arg(&args[1])?);
    if result.is_nan() {
        return Err(formula_error(ErrorKind::Num));
    }
    Ok(result)
}

fn sqrt(args: Array) -> FnResult<f64> {
    arity(&args, 1, 1)?;
    let n = number_arg(&args[0])?;
    if n < 0.0 {
        return Err(formula_error(ErrorKind::Num));
    }
    Ok(n.sqrt())
}

fn if_fn(args: Array) -> FnResult<Dynamic> {
    arity(&args, 2, 3)?;
    if truthy(&args[0])? {
        Ok(args[1].clone())
    } else {
        Ok(args.get(2).cloned().unwrap_or(Dynamic::FALSE))
    }
}

fn and(args: Array) -> FnResult<bool> {
    arity(&args, 1, usize::MAX)?;
    let mut result = true;
    for value in &args {
        result &= truthy(value)?;
    }
    Ok(result)
}

fn or(args: Array) -> FnResult<bool> {
    arity(&args, 1, usize::MAX)?;
    let mut result = false;
    for value in &args {
        result |= truthy(value)?;
    }
    Ok(result)
}

fn not(args: Array) -> FnResult<bool> {
    arity(&args, 1, 1)?;
    Ok(!truthy(&args[0])?)
}

fn concatenate(args: Array) -> String {
    args.iter().map(text_arg).collect()
}

fn len(args: Array) -> FnResult<f64> {
    arity(&args, 1, 1)?;
    Ok(text_arg(&args[0]).chars().count() as f64)
}

fn upper(args: Array) -> FnResult<String> {
    arity(&args, 1, 1)?;
    Ok(text_arg(&args[0]).to_uppercase())
}

fn lower(args: Array) -> FnResult<String> {
    arity(&args, 1, 1)?;
    Ok(text_arg(&args[0]).to_lowercase())
}

fn trim(args: Array) -> FnResult<String> {
    arity(&args, 1, 1)?;
    Ok(text_arg(&args[0])
        .split(' ')
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" "))
}

fn rand_fn(args: Array) -> FnResult<f64> {
    arity(&args, 0, 0)?;
    Ok(rand::thread_rng().r#gen())
}

fn randbetween(args: Array) -> FnResult<f64> {
    arity(&args, 2, 2)?;
    let low = number_arg(&args[0])?.ceil() as i64;
    let high = number_arg(&args[1])?.floor() as i64;
    if low > high {
        return Err(formula_error(ErrorKind::Num));
    }
    Ok(rand::thread_rng().gen_range(low..=high) as f64)
}

fn today(args: Array) -> FnResult<String> {
    arity(&args, 0, 0)?;
    Ok(chrono::Local::now().format("%Y-%m-%d").to_string())
}

fn now(args: Array) -> FnResult<String> {
    arity(&args, 0, 0)?;
    Ok(chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string())
}

/// `a & b`: both sides as display text.
fn concat_text(left: Dynamic, right: Dynamic) -> String {
    let mut out = text_arg(&left);
    out.push_str(&text_arg(&right));
    out
}

fn text_arithmetic<A, B>(_: A, _: B) -> FnResult<Dynamic> {
    Err(formula_error(ErrorKind::Value))
}

/// Register all built-in functions into the Rhai engine.
///
/// Also shadows Rhai's string concatenation through `+`: adding text is a
/// `#VALUE!` error in a formula. Requires fast operators to be disabled.
pub fn register_builtins(engine: &mut Engine) {
    // Binds looser than `+`/`-` (150) and tighter than comparisons (<= 130).
    if let Err(err) = engine.register_custom_operator(CONCAT_OPERATOR, 145) {
        tracing::warn!(error = %err, "could not register the concatenation operator");
    }
    engine.register_fn(CONCAT_OPERATOR, concat_text);
    engine.register_fn("+", text_arithmetic::<ImmutableString, ImmutableString>);
    engine.register_fn("+", text_arithmetic::<ImmutableString, f64>);
    engine.register_fn("+", text_arithmetic::<f64, ImmutableString>);
    engine.register_fn("+", text_arithmetic::<ImmutableString, bool>);
    engine.register_fn("+", text_arithmetic::<bool, ImmutableString>);

    engine.register_fn("SUM", sum);
    engine.register_fn("AVERAGE", average);
    engine.register_fn("AVG", average);
    engine.register_fn("MIN", min);
    engine.register_fn("MAX", max);
    engine.register_fn("COUNT", count);
    engine.register_fn("COUNTA", counta);
    engine.register_fn("PRODUCT", product);
    engine.register_fn("ABS", abs);
    engine.register_fn("ROUND", round);
    engine.register_fn("INT", int);
    engine.register_fn("MOD", modulo);
    engine.register_fn("POWER", power);
    engine.register_fn("SQRT", sqrt);
    engine.register_fn("IF", if_fn);
    engine.register_fn("AND", and);
    engine.register_fn("OR", or);
    engine.register_fn("NOT", not);
    engine.register_fn("CONCATENATE", concatenate);
    engine.register_fn("CONCAT", concatenate);
    engine.register_fn("LEN", len);
    engine.register_fn("UPPER", upper);
    engine.register_fn("LOWER", lower);
    engine.register_fn("TRIM", trim);
    engine.register_fn("RAND", rand_fn);
    engine.register_fn("RANDBETWEEN", randbetween);
    engine.register_fn("TODAY", today);
    engine.register_fn("NOW", now);
}
