//! Sandboxed expression evaluation.
//!
//! Input to [`evaluate_expression`] is a fully-substituted expression string:
//! every cell reference has already been replaced by that cell's value
//! literal, and every range by a nested list literal. Evaluation therefore
//! never consults the grid.

use serde::{Deserialize, Serialize};

use super::functions;
use super::parser::{self, Expr, Op};

/// A cell's computed value.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub enum Value {
    #[default]
    Empty,
    Number(f64),
    Text(String),
    /// Evaluation error sentinel (cycle marker, etc).
    Error(String),
}

impl Value {
    /// How this value renders in a cell.
    pub fn display(&self) -> String {
        match self {
            Value::Empty => String::new(),
            Value::Number(n) => format_number(*n),
            Value::Text(s) => s.clone(),
            Value::Error(e) => e.clone(),
        }
    }

    /// The literal this value contributes when substituted into a dependent
    /// formula. Numbers are parenthesized so negative values survive
    /// adjacent operators; text and errors become quoted string literals.
    pub fn substitution_text(&self) -> String {
        match self {
            Value::Empty => "0".to_string(),
            Value::Number(n) => format!("({})", format_number(*n)),
            Value::Text(s) | Value::Error(s) => {
                format!("\"{}\"", s.replace('\\', "\\\\").replace('"', "\\\""))
            }
        }
    }

    /// Interpret raw cell input as a value. Blank input is empty, numeric
    /// input is a number, anything else is text.
    pub fn from_input(raw: &str) -> Value {
        if raw.is_empty() {
            return Value::Empty;
        }
        match raw.parse::<f64>() {
            Ok(n) if n.is_finite() => Value::Number(n),
            _ => Value::Text(raw.to_string()),
        }
    }
}

/// Render a number without a trailing `.0` for integral values.
pub fn format_number(n: f64) -> String {
    if n == n.trunc() && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}

/// Intermediate evaluation result. Lists only appear as function arguments;
/// a list escaping to the top level is flattened to its display form.
#[derive(Debug, Clone, PartialEq)]
pub enum EvalResult {
    Scalar(Value),
    List(Vec<EvalResult>),
}

impl EvalResult {
    /// Collect every numeric leaf, depth first. Non-numeric leaves are
    /// skipped, matching how the aggregate functions treat mixed input.
    pub fn numbers(&self) -> Vec<f64> {
        let mut out = Vec::new();
        self.collect_numbers(&mut out);
        out
    }

    fn collect_numbers(&self, out: &mut Vec<f64>) {
        match self {
            EvalResult::Scalar(Value::Number(n)) => out.push(*n),
            EvalResult::Scalar(_) => {}
            EvalResult::List(items) => {
                for item in items {
                    item.collect_numbers(out);
                }
            }
        }
    }

    fn into_value(self) -> Value {
        match self {
            EvalResult::Scalar(v) => v,
            EvalResult::List(items) => {
                let parts: Vec<String> = items
                    .into_iter()
                    .map(|item| item.into_value().display())
                    .collect();
                Value::Text(parts.join(","))
            }
        }
    }
}

/// Evaluate a fully-substituted expression. `Err` carries a short message;
/// the caller decides how a failed formula surfaces in the cell.
pub fn evaluate_expression(text: &str) -> Result<Value, String> {
    let expr = parser::parse(text)?;
    let result = eval(&expr)?;
    Ok(result.into_value())
}

fn eval(expr: &Expr) -> Result<EvalResult, String> {
    match expr {
        Expr::Number(n) => Ok(EvalResult::Scalar(Value::Number(*n))),
        Expr::Text(s) => Ok(EvalResult::Scalar(Value::Text(s.clone()))),
        Expr::List(items) => {
            let mut out = Vec::with_capacity(items.len());
            for item in items {
                out.push(eval(item)?);
            }
            Ok(EvalResult::List(out))
        }
        Expr::Function { name, args } => {
            let mut evaluated = Vec::with_capacity(args.len());
            for arg in args {
                evaluated.push(eval(arg)?);
            }
            functions::call(name, &evaluated)
        }
        Expr::BinaryOp { op, left, right } => {
            let l = eval(left)?;
            let r = eval(right)?;
            apply_binary(*op, &l, &r)
        }
        Expr::Negate(inner) => {
            let v = eval(inner)?;
            let n = scalar_number(&v)?;
            Ok(EvalResult::Scalar(Value::Number(-n)))
        }
    }
}

fn apply_binary(op: Op, left: &EvalResult, right: &EvalResult) -> Result<EvalResult, String> {
    // Equality comparisons work on any scalars; everything else is numeric.
    match op {
        Op::Eq | Op::NotEq => {
            if let (EvalResult::Scalar(l), EvalResult::Scalar(r)) = (left, right) {
                if !matches!(l, Value::Number(_)) || !matches!(r, Value::Number(_)) {
                    let equal = scalar_eq(l, r);
                    let result = if op == Op::Eq { equal } else { !equal };
                    return Ok(EvalResult::Scalar(bool_value(result)));
                }
            }
        }
        _ => {}
    }

    let l = scalar_number(left)?;
    let r = scalar_number(right)?;
    let value = match op {
        Op::Add => Value::Number(checked(l + r)?),
        Op::Sub => Value::Number(checked(l - r)?),
        Op::Mul => Value::Number(checked(l * r)?),
        Op::Div => {
            if r == 0.0 {
                return Err("Division by zero".to_string());
            }
            Value::Number(checked(l / r)?)
        }
        Op::Lt => bool_value(l < r),
        Op::Gt => bool_value(l > r),
        Op::Eq => bool_value(l == r),
        Op::LtEq => bool_value(l <= r),
        Op::GtEq => bool_value(l >= r),
        Op::NotEq => bool_value(l != r),
    };
    Ok(EvalResult::Scalar(value))
}

fn scalar_eq(l: &Value, r: &Value) -> bool {
    match (l, r) {
        (Value::Text(a), Value::Text(b)) => a == b,
        (Value::Empty, Value::Empty) => true,
        _ => l == r,
    }
}

/// Comparisons yield 1 or 0 rather than a distinct boolean type, so their
/// results feed straight back into arithmetic.
fn bool_value(b: bool) -> Value {
    Value::Number(if b { 1.0 } else { 0.0 })
}

fn checked(n: f64) -> Result<f64, String> {
    if n.is_finite() {
        Ok(n)
    } else {
        Err("Numeric overflow".to_string())
    }
}

pub(crate) fn scalar_number(result: &EvalResult) -> Result<f64, String> {
    match result {
        EvalResult::Scalar(Value::Number(n)) => Ok(*n),
        EvalResult::Scalar(Value::Empty) => Ok(0.0),
        EvalResult::Scalar(other) => Err(format!(
            "Expected a number, got '{}'",
            other.display()
        )),
        EvalResult::List(_) => Err("Expected a number, got a range".to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_arithmetic() {
        assert_eq!(evaluate_expression("1+2*3").unwrap(), Value::Number(7.0));
        assert_eq!(evaluate_expression("(1)+(2)").unwrap(), Value::Number(3.0));
        assert_eq!(evaluate_expression("10/4").unwrap(), Value::Number(2.5));
        assert_eq!(evaluate_expression("-(3)+1").unwrap(), Value::Number(-2.0));
    }

    #[test]
    fn test_division_by_zero() {
        assert!(evaluate_expression("1/0").is_err());
        assert!(evaluate_expression("1/(2-2)").is_err());
    }

    #[test]
    fn test_comparisons_yield_numbers() {
        assert_eq!(evaluate_expression("2>1").unwrap(), Value::Number(1.0));
        assert_eq!(evaluate_expression("2<1").unwrap(), Value::Number(0.0));
        assert_eq!(evaluate_expression("(2>1)+(3>1)").unwrap(), Value::Number(2.0));
        assert_eq!(evaluate_expression("1<>2").unwrap(), Value::Number(1.0));
    }

    #[test]
    fn test_text_equality() {
        assert_eq!(
            evaluate_expression("\"abc\"=\"abc\"").unwrap(),
            Value::Number(1.0)
        );
        assert_eq!(
            evaluate_expression("\"abc\"<>\"abd\"").unwrap(),
            Value::Number(1.0)
        );
    }

    #[test]
    fn test_text_arithmetic_fails() {
        assert!(evaluate_expression("\"abc\"+1").is_err());
    }

    #[test]
    fn test_top_level_list_joins() {
        assert_eq!(
            evaluate_expression("[[1,3],[2,4]]").unwrap(),
            Value::Text("1,3,2,4".to_string())
        );
    }

    #[test]
    fn test_substitution_text() {
        assert_eq!(Value::Number(-3.0).substitution_text(), "(-3)");
        assert_eq!(Value::Empty.substitution_text(), "0");
        assert_eq!(Value::Text("hi".into()).substitution_text(), "\"hi\"");
        assert_eq!(
            Value::Text("say \"hi\"".into()).substitution_text(),
            "\"say \\\"hi\\\"\""
        );
    }

    #[test]
    fn test_from_input() {
        assert_eq!(Value::from_input(""), Value::Empty);
        assert_eq!(Value::from_input("4"), Value::Number(4.0));
        assert_eq!(Value::from_input("-2.5"), Value::Number(-2.5));
        assert_eq!(Value::from_input("hello"), Value::Text("hello".into()));
        assert_eq!(Value::from_input("NaN"), Value::Text("NaN".into()));
    }

    #[test]
    fn test_format_number() {
        assert_eq!(format_number(3.0), "3");
        assert_eq!(format_number(2.5), "2.5");
        assert_eq!(format_number(-7.0), "-7");
    }

    #[test]
    fn test_display() {
        assert_eq!(Value::Empty.display(), "");
        assert_eq!(Value::Number(12.0).display(), "12");
        assert_eq!(Value::Error("#CYCLE!".into()).display(), "#CYCLE!");
    }
}
