//! `icecore validate` — runs every §4.3 check and the budget estimate
//! against a blueprint without executing it.

use std::path::Path;

use anyhow::{Context, Result};
use icecore_runtime::executors::Drivers;
use icecore_runtime::RuntimeConfig;
use icecore_workflow::Blueprint;

pub async fn run(blueprint_path: &Path) -> Result<()> {
    let contents = std::fs::read_to_string(blueprint_path)
        .with_context(|| format!("reading blueprint file {}", blueprint_path.display()))?;
    let blueprint: Blueprint = serde_json::from_str(&contents)
        .with_context(|| format!("parsing blueprint file {}", blueprint_path.display()))?;

    let config = RuntimeConfig::load().context("loading runtime configuration")?;
    let controller = icecore_runtime::build(config, Drivers::default());

    match controller.validate(&blueprint) {
        Ok(budget) => {
            println!(
                "{}",
                serde_json::json!({
                    "valid": true,
                    "estimated_cost_usd": budget.total_usd,
                    "node_count": blueprint.nodes.len(),
                })
            );
            Ok(())
        }
        Err(err) => {
            println!(
                "{}",
                serde_json::json!({
                    "valid": false,
                    "error": err.to_wire(),
                })
            );
            anyhow::bail!("blueprint {} failed validation", blueprint_path.display());
        }
    }
}
