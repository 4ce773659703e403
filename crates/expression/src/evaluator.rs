//! Wires the parser and evaluator up as an
//! [`icecore_executors::ExpressionEvaluator`] — the port `ConditionExecutor`
//! and [`icecore_scheduler`](../icecore_scheduler)'s `when`-guard and
//! `recursive` convergence handling all consume. Grounded on
//! `Evaluator`'s `regex_cache: Mutex<HashMap<String, Regex>>` — here the
//! cache holds parsed ASTs instead of compiled patterns, since a blueprint's
//! `when`/`convergence_expression` strings are static but get evaluated once
//! per node dispatch or per loop iteration.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use icecore_executors::{ExecutorError, ExpressionEvaluator};
use parking_lot::Mutex;

use crate::ast::Expr;
use crate::{eval, parser};

/// Maximum number of distinct expression strings cached per evaluator
/// instance. A blueprint only ever contributes a handful of `when` and
/// `convergence_expression` strings, so this bound exists purely as a
/// guard against an unbounded cache under pathological input.
const MAX_CACHE_ENTRIES: usize = 4096;

/// The restricted mini-language's [`ExpressionEvaluator`] implementation.
pub struct MiniLanguageEvaluator {
    cache: Mutex<HashMap<String, Arc<Expr>>>,
}

impl Default for MiniLanguageEvaluator {
    fn default() -> Self {
        Self::new()
    }
}

impl MiniLanguageEvaluator {
    /// Build an evaluator with an empty parse cache.
    #[must_use]
    pub fn new() -> Self {
        Self {
            cache: Mutex::new(HashMap::new()),
        }
    }

    fn parsed(&self, expression: &str) -> Result<Arc<Expr>, ExecutorError> {
        if let Some(cached) = self.cache.lock().get(expression) {
            return Ok(Arc::clone(cached));
        }

        let expr = Arc::new(parser::parse(expression).map_err(|err| {
            ExecutorError::fatal(format!("failed to parse expression `{expression}`: {err}"))
        })?);

        let mut cache = self.cache.lock();
        if cache.len() >= MAX_CACHE_ENTRIES {
            tracing::warn!("expression AST cache hit its {MAX_CACHE_ENTRIES}-entry bound, clearing");
            cache.clear();
        }
        cache.insert(expression.to_string(), Arc::clone(&expr));
        Ok(expr)
    }
}

#[async_trait]
impl ExpressionEvaluator for MiniLanguageEvaluator {
    async fn evaluate(
        &self,
        expression: &str,
        variables: &serde_json::Value,
    ) -> Result<serde_json::Value, ExecutorError> {
        let expr = self.parsed(expression)?;
        eval::eval(&expr, variables)
            .map_err(|err| ExecutorError::fatal(format!("failed to evaluate `{expression}`: {err}")))
    }
}
