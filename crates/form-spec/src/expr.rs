use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::path::FieldPath;
use crate::values;

/// Lightweight condition AST used for `disabled_if` and declarative checks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Expr {
    LiteralBool { value: bool },
    Empty { path: FieldPath },
    Eq { path: FieldPath, value: Value },
    And { expressions: Vec<Expr> },
    Or { expressions: Vec<Expr> },
    Not { expression: Box<Expr> },
    Var { path: FieldPath },
}

impl Expr {
    pub fn empty(path: FieldPath) -> Self {
        Expr::Empty { path }
    }

    pub fn not(expression: Expr) -> Self {
        Expr::Not {
            expression: Box::new(expression),
        }
    }

    /// Evaluates the expression against the form values. Missing paths read as
    /// `null`, so evaluation always yields a boolean.
    pub fn evaluate(&self, values: &Value) -> bool {
        match self {
            Expr::LiteralBool { value } => *value,
            Expr::Empty { path } => values::is_empty(values::get_or_null(values, path)),
            Expr::Eq { path, value } => values::get_or_null(values, path) == value,
            Expr::And { expressions } => expressions.iter().all(|expr| expr.evaluate(values)),
            Expr::Or { expressions } => expressions.iter().any(|expr| expr.evaluate(values)),
            Expr::Not { expression } => !expression.evaluate(values),
            Expr::Var { path } => !values::is_empty(values::get_or_null(values, path)),
        }
    }

    /// Every field path the expression reads.
    pub fn dependencies(&self) -> Vec<FieldPath> {
        let mut out = Vec::new();
        self.collect_dependencies(&mut out);
        out.sort();
        out.dedup();
        out
    }

    fn collect_dependencies(&self, out: &mut Vec<FieldPath>) {
        match self {
            Expr::LiteralBool { .. } => {}
            Expr::Empty { path } | Expr::Eq { path, .. } | Expr::Var { path } => {
                out.push(path.clone())
            }
            Expr::And { expressions } | Expr::Or { expressions } => {
                for expr in expressions {
                    expr.collect_dependencies(out);
                }
            }
            Expr::Not { expression } => expression.collect_dependencies(out),
        }
    }
}
