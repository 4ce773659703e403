//! `icecore run` — submits a blueprint to a freshly-built `RunController`,
//! prints each event as a JSON line as it arrives, then the terminal run
//! record.

use std::path::Path;

use anyhow::{Context, Result};
use icecore_runtime::executors::Drivers;
use icecore_runtime::{
    BlueprintSource, RunController, RunHandle, RunOptions, RunRequest, RuntimeConfig,
};
use icecore_workflow::Blueprint;

pub async fn run(
    blueprint_path: &Path,
    inputs_path: Option<&Path>,
    max_parallel: Option<usize>,
) -> Result<()> {
    let blueprint = read_blueprint(blueprint_path)?;
    let inputs = match inputs_path {
        Some(path) => read_inputs(path)?,
        None => serde_json::Map::new(),
    };

    let config = RuntimeConfig::load().context("loading runtime configuration")?;
    let controller = icecore_runtime::build(config, Drivers::default());

    let request = RunRequest {
        source: BlueprintSource::Inline(blueprint),
        inputs,
        options: RunOptions { max_parallel },
    };

    let mut handle = controller.submit(request).await.context("submitting run")?;
    println!("run_id: {}", handle.run_id);

    let record = drive_to_terminal(&controller, &mut handle).await;
    println!("{}", serde_json::to_string_pretty(&record)?);

    if !record.status.is_success() {
        anyhow::bail!("run {} finished as {:?}", handle.run_id, record.status);
    }
    Ok(())
}

async fn drive_to_terminal(
    controller: &RunController,
    handle: &mut RunHandle,
) -> icecore_runtime::RunRecord {
    loop {
        if let Some(record) = controller.status(handle.run_id) {
            if record.status.is_terminal() {
                return record;
            }
        }
        match handle.events.live.recv().await {
            Some(event) => {
                if let Ok(line) = serde_json::to_string(&event) {
                    println!("{line}");
                }
            }
            None => {
                // Bus dropped mid-run; fall back to polling status once more.
                if let Some(record) = controller.status(handle.run_id) {
                    return record;
                }
            }
        }
    }
}

fn read_blueprint(path: &Path) -> Result<Blueprint> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("reading blueprint file {}", path.display()))?;
    serde_json::from_str(&contents)
        .with_context(|| format!("parsing blueprint file {}", path.display()))
}

fn read_inputs(path: &Path) -> Result<serde_json::Map<String, serde_json::Value>> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("reading inputs file {}", path.display()))?;
    let value: serde_json::Value = serde_json::from_str(&contents)
        .with_context(|| format!("parsing inputs file {}", path.display()))?;
    match value {
        serde_json::Value::Object(map) => Ok(map),
        _ => anyhow::bail!("inputs file {} must contain a JSON object", path.display()),
    }
}
