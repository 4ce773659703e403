//! Check 6 of §4.3: a pre-flight budget estimate, always computable (it
//! never fails compilation — an unknown model rate falls back to a
//! conservative default rather than blocking the build).

use std::collections::HashMap;

use icecore_core::NodeId;
use icecore_workflow::{Blueprint, NodeKind};

/// Resolves a per-token rate for an `llm` node's `(provider, model)` pair.
/// Concrete LLM provider pricing tables are out of scope here; this is the
/// seam a runtime wires a real rate table through.
pub trait ModelRateTable: Send + Sync {
    /// USD cost per token for the given provider/model, or `None` if unknown.
    fn rate_per_token(&self, provider: &str, model: &str) -> Option<f64>;
}

/// Falls back to a single flat rate for any `(provider, model)` it doesn't
/// recognize, so a budget estimate is always computable per §4.3 check 6.
pub struct FallbackRateTable {
    pub known: HashMap<(String, String), f64>,
    pub default_rate_per_token: f64,
}

impl Default for FallbackRateTable {
    fn default() -> Self {
        Self {
            known: HashMap::new(),
            default_rate_per_token: 0.00001,
        }
    }
}

impl ModelRateTable for FallbackRateTable {
    fn rate_per_token(&self, provider: &str, model: &str) -> Option<f64> {
        Some(
            self.known
                .get(&(provider.to_owned(), model.to_owned()))
                .copied()
                .unwrap_or(self.default_rate_per_token),
        )
    }
}

/// Sum of every node's declared cost contribution. Only `llm` nodes
/// currently contribute (`max_tokens * rate`, defaulting `max_tokens` to
/// zero when unset); the other eight kinds have no declared cost hint in the
/// blueprint data model, so they contribute nothing.
#[derive(Debug, Clone, PartialEq)]
pub struct BudgetEstimate {
    pub total_usd: f64,
    pub per_node_usd: HashMap<NodeId, f64>,
}

#[must_use]
pub fn estimate(blueprint: &Blueprint, rates: &dyn ModelRateTable) -> BudgetEstimate {
    let mut per_node_usd = HashMap::new();
    let mut total_usd = 0.0;
    for node in &blueprint.nodes {
        if let NodeKind::Llm {
            provider,
            model,
            max_tokens,
            ..
        } = &node.kind
        {
            let rate = rates.rate_per_token(provider, model).unwrap_or(0.0);
            let cost = f64::from(max_tokens.unwrap_or(0)) * rate;
            per_node_usd.insert(node.id, cost);
            total_usd += cost;
        }
    }
    BudgetEstimate { total_usd, per_node_usd }
}
