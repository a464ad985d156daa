use super::ast::{CompareOp, Expr};
use crate::dataset::cell_to_string;
use serde_json::Value;
use std::cmp::Ordering;
use std::collections::HashMap;

/// Evaluates an expression row by row against resolved column positions.
///
/// Logic is three-valued: comparisons involving `null` yield `null`, and a
/// row is selected only when the whole condition is `true`.
pub struct Evaluator<'a> {
    columns: HashMap<&'a str, usize>,
}

impl<'a> Evaluator<'a> {
    pub fn new(columns: HashMap<&'a str, usize>) -> Self {
        Self { columns }
    }

    pub fn matches(&self, expr: &Expr, row: &[Value]) -> Result<bool, String> {
        match self.eval(expr, row)? {
            Value::Bool(b) => Ok(b),
            Value::Null => Ok(false),
            other => Err(format!(
                "condition must evaluate to a boolean, found {} ({})",
                type_name(&other),
                other
            )),
        }
    }

    fn eval(&self, expr: &Expr, row: &[Value]) -> Result<Value, String> {
        match expr {
            Expr::Column(name) => {
                let idx = self
                    .columns
                    .get(name.as_str())
                    .ok_or_else(|| format!("unknown column '{}'", name))?;
                Ok(row.get(*idx).cloned().unwrap_or(Value::Null))
            }
            Expr::Literal(value) => Ok(value.clone()),
            Expr::Not(inner) => match as_logic(self.eval(inner, row)?, "not")? {
                Some(b) => Ok(Value::Bool(!b)),
                None => Ok(Value::Null),
            },
            Expr::And(l, r) => {
                let left = as_logic(self.eval(l, row)?, "and")?;
                if left == Some(false) {
                    return Ok(Value::Bool(false));
                }
                let right = as_logic(self.eval(r, row)?, "and")?;
                Ok(match (left, right) {
                    (_, Some(false)) => Value::Bool(false),
                    (Some(true), Some(true)) => Value::Bool(true),
                    _ => Value::Null,
                })
            }
            Expr::Or(l, r) => {
                let left = as_logic(self.eval(l, row)?, "or")?;
                if left == Some(true) {
                    return Ok(Value::Bool(true));
                }
                let right = as_logic(self.eval(r, row)?, "or")?;
                Ok(match (left, right) {
                    (_, Some(true)) => Value::Bool(true),
                    (Some(false), Some(false)) => Value::Bool(false),
                    _ => Value::Null,
                })
            }
            Expr::IsNull { expr, negated } => {
                let is_null = self.eval(expr, row)?.is_null();
                Ok(Value::Bool(is_null != *negated))
            }
            Expr::Compare(op, l, r) => {
                let left = self.eval(l, row)?;
                let right = self.eval(r, row)?;
                if left.is_null() || right.is_null() {
                    return Ok(Value::Null);
                }
                compare(*op, &left, &right).map(Value::Bool)
            }
        }
    }
}

fn as_logic(value: Value, op: &str) -> Result<Option<bool>, String> {
    match value {
        Value::Bool(b) => Ok(Some(b)),
        Value::Null => Ok(None),
        other => Err(format!(
            "'{}' expects boolean operands, found {} ({})",
            op,
            type_name(&other),
            other
        )),
    }
}

fn compare(op: CompareOp, left: &Value, right: &Value) -> Result<bool, String> {
    if op.is_text() {
        let haystack = match left {
            Value::String(s) => s.as_str(),
            other => {
                return Err(format!(
                    "'{}' expects a text value on the left, found {}",
                    op,
                    type_name(other)
                ))
            }
        };
        let needle = cell_to_string(right);
        return Ok(match op {
            CompareOp::Contains => haystack.contains(&needle),
            CompareOp::StartsWith => haystack.starts_with(&needle),
            _ => haystack.ends_with(&needle),
        });
    }

    let ordering = order(left, right);
    match op {
        CompareOp::Eq => Ok(ordering == Some(Ordering::Equal)),
        CompareOp::NotEq => Ok(ordering != Some(Ordering::Equal)),
        _ => {
            let ordering = ordering.ok_or_else(|| {
                format!(
                    "'{}' not supported between {} and {}",
                    op,
                    type_name(left),
                    type_name(right)
                )
            })?;
            Ok(match op {
                CompareOp::Gt => ordering == Ordering::Greater,
                CompareOp::Ge => ordering != Ordering::Less,
                CompareOp::Lt => ordering == Ordering::Less,
                _ => ordering != Ordering::Greater,
            })
        }
    }
}

/// Ordering between two non-null values, or None when they are incomparable.
/// Numeric text is compared as a number against numbers.
fn order(left: &Value, right: &Value) -> Option<Ordering> {
    match (left, right) {
        (Value::Number(_), Value::Number(_)) => numeric_order(left, right),
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
        (Value::Number(n), Value::String(s)) => {
            let parsed = s.trim().parse::<f64>().ok()?;
            n.as_f64()?.partial_cmp(&parsed)
        }
        (Value::String(s), Value::Number(n)) => {
            let parsed = s.trim().parse::<f64>().ok()?;
            parsed.partial_cmp(&n.as_f64()?)
        }
        _ => None,
    }
}

fn numeric_order(left: &Value, right: &Value) -> Option<Ordering> {
    if let (Some(a), Some(b)) = (left.as_i64(), right.as_i64()) {
        return Some(a.cmp(&b));
    }
    left.as_f64()?.partial_cmp(&right.as_f64()?)
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "text",
        Value::Array(_) => "list",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_numeric_order_mixes_ints_and_floats() {
        assert_eq!(order(&json!(3), &json!(2.5)), Some(Ordering::Greater));
        assert_eq!(order(&json!("42"), &json!(42)), Some(Ordering::Equal));
        assert_eq!(order(&json!("abc"), &json!(1)), None);
    }

    #[test]
    fn test_ordering_between_incomparable_values_fails() {
        assert!(compare(CompareOp::Gt, &json!("abc"), &json!(1)).is_err());
        assert_eq!(compare(CompareOp::Eq, &json!("abc"), &json!(1)), Ok(false));
        assert_eq!(compare(CompareOp::NotEq, &json!(true), &json!(1)), Ok(true));
    }

    #[test]
    fn test_text_operators() {
        assert_eq!(
            compare(CompareOp::Contains, &json!("Acme Corp"), &json!("Corp")),
            Ok(true)
        );
        assert_eq!(
            compare(CompareOp::StartsWith, &json!("Acme Corp"), &json!("Corp")),
            Ok(false)
        );
        assert!(compare(CompareOp::EndsWith, &json!(12), &json!("2")).is_err());
    }
}
