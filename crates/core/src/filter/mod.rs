//! Closed predicate language for the Filter block.
//!
//! Conditions combine column comparisons with `and`, `or` and `not` (also
//! spelled `&`, `|` and `~` as in dataframe masks). Columns are written as
//! bare identifiers, backtick-quoted names or `df['name']`, and text tests as
//! `df['name'].str.contains('x')`. Nothing outside this grammar is ever
//! evaluated.

pub mod ast;
pub mod eval;
pub mod lexer;
pub mod parser;

use crate::dataset::Dataset;
use crate::error::{EngineError, EngineResult};
use ast::Expr;
use eval::Evaluator;
use std::collections::HashMap;

/// A parsed, reusable filter condition
#[derive(Debug, Clone, PartialEq)]
pub struct Predicate {
    source: String,
    expr: Expr,
}

impl Predicate {
    pub fn parse(source: &str) -> EngineResult<Self> {
        let tokens = lexer::tokenize(source).map_err(EngineError::InvalidFilter)?;
        let expr = parser::Parser::new(&tokens, source.len())
            .parse()
            .map_err(EngineError::InvalidFilter)?;

        if !expr.is_boolean_shaped() {
            return Err(EngineError::InvalidFilter(format!(
                "'{}' does not produce a boolean per row",
                source.trim()
            )));
        }

        Ok(Self {
            source: source.to_string(),
            expr,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// One boolean per row of `dataset`
    pub fn evaluate(&self, dataset: &Dataset) -> EngineResult<Vec<bool>> {
        let mut positions = HashMap::new();
        for column in self.expr.columns() {
            let idx = dataset.column_index(column).ok_or_else(|| {
                EngineError::InvalidFilter(format!(
                    "unknown column '{}' (available: {})",
                    column,
                    dataset.columns().join(", ")
                ))
            })?;
            positions.insert(column, idx);
        }

        let evaluator = Evaluator::new(positions);
        dataset
            .rows()
            .iter()
            .enumerate()
            .map(|(i, row)| {
                evaluator
                    .matches(&self.expr, row)
                    .map_err(|e| EngineError::InvalidFilter(format!("row {}: {}", i, e)))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    fn people() -> Dataset {
        Dataset::new(
            vec!["name".into(), "age".into(), "company".into()],
            vec![
                vec![json!("Ada"), json!(36), json!("Acme Corp")],
                vec![json!("Lin"), json!(29), json!("Initech")],
                vec![json!("Sam"), Value::Null, json!("Acme Labs")],
                vec![json!("Kim"), json!(41), Value::Null],
            ],
        )
    }

    fn mask(condition: &str) -> Vec<bool> {
        Predicate::parse(condition).unwrap().evaluate(&people()).unwrap()
    }

    #[test]
    fn test_numeric_comparison_skips_nulls() {
        assert_eq!(mask("age > 30"), vec![true, false, false, true]);
        assert_eq!(mask("not age > 30"), vec![false, true, false, false]);
    }

    #[test]
    fn test_combined_conditions() {
        assert_eq!(
            mask("company startswith 'Acme' and (age >= 30 or age is null)"),
            vec![true, false, true, false]
        );
        assert_eq!(mask("df['name'] == \"Lin\" || company contains 'Labs'"), vec![false, true, true, false]);
    }

    #[test]
    fn test_dataframe_style_masks() {
        assert_eq!(mask("df['company'].str.contains('Acme')"), vec![true, false, true, false]);
        assert_eq!(
            mask("(df['age'] > 30) & ~(df['name'] == 'Kim')"),
            vec![true, false, false, false]
        );
        assert_eq!(
            mask("df['name'].str.startswith('S') | df['name'].str.endswith('n')"),
            vec![false, true, true, false]
        );
    }

    #[test]
    fn test_out_of_range_literal_is_invalid_filter() {
        assert!(matches!(
            Predicate::parse("age > 1e999"),
            Err(EngineError::InvalidFilter(msg)) if msg.contains("out of range")
        ));
    }

    #[test]
    fn test_is_null_checks() {
        assert_eq!(mask("company is null"), vec![false, false, false, true]);
        assert_eq!(mask("`company` is not null"), vec![true, true, true, false]);
    }

    #[test]
    fn test_unknown_column_is_invalid_filter() {
        let err = Predicate::parse("salary > 10")
            .unwrap()
            .evaluate(&people())
            .unwrap_err();
        assert!(matches!(err, EngineError::InvalidFilter(msg) if msg.contains("salary")));
    }

    #[test]
    fn test_non_boolean_condition_is_rejected() {
        assert!(matches!(
            Predicate::parse("42"),
            Err(EngineError::InvalidFilter(_))
        ));
        let err = Predicate::parse("age").unwrap().evaluate(&people()).unwrap_err();
        assert!(matches!(err, EngineError::InvalidFilter(_)));
    }

    #[test]
    fn test_empty_dataset_yields_empty_mask() {
        let dataset = Dataset::empty(vec!["age".into()]);
        let mask = Predicate::parse("age > 1").unwrap().evaluate(&dataset).unwrap();
        assert!(mask.is_empty());
    }
}
