use serde_json::Value;
use std::collections::BTreeSet;
use std::fmt;

/// Comparison operators of the filter language
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    NotEq,
    Gt,
    Ge,
    Lt,
    Le,
    Contains,
    StartsWith,
    EndsWith,
}

impl CompareOp {
    pub fn is_text(&self) -> bool {
        matches!(
            self,
            CompareOp::Contains | CompareOp::StartsWith | CompareOp::EndsWith
        )
    }
}

impl fmt::Display for CompareOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let symbol = match self {
            CompareOp::Eq => "==",
            CompareOp::NotEq => "!=",
            CompareOp::Gt => ">",
            CompareOp::Ge => ">=",
            CompareOp::Lt => "<",
            CompareOp::Le => "<=",
            CompareOp::Contains => "contains",
            CompareOp::StartsWith => "startswith",
            CompareOp::EndsWith => "endswith",
        };
        f.write_str(symbol)
    }
}

/// Parsed filter condition
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    // Leaves
    Column(String),
    Literal(Value),

    // Logic
    Not(Box<Expr>),
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),

    // Predicates
    Compare(CompareOp, Box<Expr>, Box<Expr>),
    IsNull { expr: Box<Expr>, negated: bool },
}

impl Expr {
    /// Column names referenced anywhere in the expression
    pub fn columns(&self) -> BTreeSet<&str> {
        let mut out = BTreeSet::new();
        self.collect_columns(&mut out);
        out
    }

    fn collect_columns<'a>(&'a self, out: &mut BTreeSet<&'a str>) {
        match self {
            Expr::Column(name) => {
                out.insert(name.as_str());
            }
            Expr::Literal(_) => {}
            Expr::Not(inner) => inner.collect_columns(out),
            Expr::And(l, r) | Expr::Or(l, r) | Expr::Compare(_, l, r) => {
                l.collect_columns(out);
                r.collect_columns(out);
            }
            Expr::IsNull { expr, .. } => expr.collect_columns(out),
        }
    }

    /// False for literals that can never act as a condition, like `5` or `'x'`
    pub fn is_boolean_shaped(&self) -> bool {
        match self {
            Expr::Literal(value) => value.is_boolean() || value.is_null(),
            _ => true,
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Column(name) => write!(f, "`{}`", name),
            Expr::Literal(Value::String(s)) => write!(f, "{:?}", s),
            Expr::Literal(value) => write!(f, "{}", value),
            Expr::Not(inner) => write!(f, "not ({})", inner),
            Expr::And(l, r) => write!(f, "({} and {})", l, r),
            Expr::Or(l, r) => write!(f, "({} or {})", l, r),
            Expr::Compare(op, l, r) => write!(f, "{} {} {}", l, op, r),
            Expr::IsNull { expr, negated } => {
                if *negated {
                    write!(f, "{} is not null", expr)
                } else {
                    write!(f, "{} is null", expr)
                }
            }
        }
    }
}
