//! Built-in spreadsheet functions.
//!
//! Aggregates (`SUM`, `MULT`, `AVG`, `MAX`, `MIN`, `COUNT`) flatten their
//! arguments and operate on the numeric leaves, skipping text and empty
//! entries. `ROWS`/`COLS` read the shape of an expanded range literal.

use super::eval::{scalar_number, EvalResult, Value};

/// Names the evaluator recognizes as function calls.
pub fn is_builtin(name: &str) -> bool {
    matches!(
        name,
        "COUNT"
            | "SUM"
            | "MULT"
            | "AVG"
            | "MAX"
            | "MIN"
            | "ROWS"
            | "COLS"
            | "IF"
            | "NULLIF"
            | "IFNULLORZERO"
    )
}

pub fn call(name: &str, args: &[EvalResult]) -> Result<EvalResult, String> {
    match name {
        "COUNT" => Ok(scalar(Value::Number(flatten(args).len() as f64))),
        "SUM" => Ok(scalar(Value::Number(flatten(args).iter().sum()))),
        "MULT" => Ok(scalar(Value::Number(flatten(args).iter().product()))),
        "AVG" => {
            let nums = flatten(args);
            if nums.is_empty() {
                return Err("AVG of an empty range".to_string());
            }
            Ok(scalar(Value::Number(
                nums.iter().sum::<f64>() / nums.len() as f64,
            )))
        }
        "MAX" => {
            let nums = flatten(args);
            nums.into_iter()
                .reduce(f64::max)
                .map(|n| scalar(Value::Number(n)))
                .ok_or_else(|| "MAX of an empty range".to_string())
        }
        "MIN" => {
            let nums = flatten(args);
            nums.into_iter()
                .reduce(f64::min)
                .map(|n| scalar(Value::Number(n)))
                .ok_or_else(|| "MIN of an empty range".to_string())
        }
        "ROWS" => {
            let (rows, _) = shape(args)?;
            Ok(scalar(Value::Number(rows as f64)))
        }
        "COLS" => {
            let (_, cols) = shape(args)?;
            Ok(scalar(Value::Number(cols as f64)))
        }
        "IF" => {
            if args.len() != 2 && args.len() != 3 {
                return Err("IF takes 2 or 3 arguments".to_string());
            }
            let cond = scalar_number(&args[0])?;
            if cond != 0.0 {
                Ok(args[1].clone())
            } else if args.len() == 3 {
                Ok(args[2].clone())
            } else {
                Ok(scalar(Value::Empty))
            }
        }
        "NULLIF" => {
            if args.len() != 2 {
                return Err("NULLIF takes 2 arguments".to_string());
            }
            match (&args[0], &args[1]) {
                (EvalResult::Scalar(a), EvalResult::Scalar(b)) if a == b => {
                    Ok(scalar(Value::Empty))
                }
                _ => Ok(args[0].clone()),
            }
        }
        "IFNULLORZERO" => {
            if args.len() != 2 {
                return Err("IFNULLORZERO takes 2 arguments".to_string());
            }
            match &args[0] {
                EvalResult::Scalar(Value::Empty) => Ok(args[1].clone()),
                EvalResult::Scalar(Value::Number(n)) if *n == 0.0 => Ok(args[1].clone()),
                _ => Ok(args[0].clone()),
            }
        }
        _ => Err(format!("Unknown function: {}", name)),
    }
}

fn scalar(v: Value) -> EvalResult {
    EvalResult::Scalar(v)
}

fn flatten(args: &[EvalResult]) -> Vec<f64> {
    let mut out = Vec::new();
    for arg in args {
        out.extend(arg.numbers());
    }
    out
}

/// Shape of a range argument: a nested list is rows of columns, a flat
/// list is a single row, a scalar is 1x1.
fn shape(args: &[EvalResult]) -> Result<(usize, usize), String> {
    if args.len() != 1 {
        return Err("ROWS/COLS take exactly one range".to_string());
    }
    match &args[0] {
        EvalResult::List(rows) => {
            let cols = rows
                .iter()
                .map(|row| match row {
                    EvalResult::List(cells) => cells.len(),
                    EvalResult::Scalar(_) => 1,
                })
                .max()
                .unwrap_or(0);
            if rows.iter().all(|row| matches!(row, EvalResult::Scalar(_))) {
                Ok((1, rows.len()))
            } else {
                Ok((rows.len(), cols))
            }
        }
        EvalResult::Scalar(_) => Ok((1, 1)),
    }
}
