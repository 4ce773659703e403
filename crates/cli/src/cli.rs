//! Argument parsing. A thin `clap` front end over `icecore-runtime` — three
//! subcommands, no TUI, no file-watching (§10.5 drops the
//! `ratatui`/`crossterm`/`notify` feature set as out of scope for a
//! one-shot command line tool).

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

#[derive(Debug, Parser)]
#[command(name = "icecore", version, about = "Blueprint-driven workflow orchestration")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Compile and execute a blueprint to completion, streaming its events
    /// to stdout and printing the terminal run record.
    Run {
        /// Path to a finalized Blueprint JSON file.
        blueprint: PathBuf,
        /// Path to a JSON object of run inputs; defaults to `{}` when omitted.
        #[arg(long)]
        inputs: Option<PathBuf>,
        /// Overrides `MAX_PARALLEL_DEFAULT` for this run only.
        #[arg(long)]
        max_parallel: Option<usize>,
    },
    /// Run every §4.3 check and the budget estimate against a blueprint
    /// without executing it.
    Validate {
        /// Path to a Blueprint JSON file.
        blueprint: PathBuf,
    },
    /// Append one binding to a startup manifest file, creating it if absent.
    /// The manifest is picked up by `run`/`validate` via
    /// `COMPONENT_MANIFEST_PATHS`, not by the invoking process itself — a
    /// one-shot CLI command has no live `Registry` for this to mutate.
    Register {
        /// Path to the manifest JSON file to append to.
        manifest: PathBuf,
        /// The binding's kind.
        #[arg(value_enum)]
        kind: RegistryKindArg,
        /// Name this binding will be looked up by.
        name: String,
        /// Path to a JSON file holding the binding's opaque definition.
        definition: PathBuf,
    },
}

/// Mirrors [`icecore_registry::RegistryKind`] — `clap::ValueEnum` can't be
/// derived on a type from another crate, so this is the CLI-local stand-in,
/// converted with `From` right after parsing.
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum RegistryKindArg {
    Tool,
    Agent,
    Workflow,
    Code,
}

impl From<RegistryKindArg> for icecore_registry::RegistryKind {
    fn from(kind: RegistryKindArg) -> Self {
        match kind {
            RegistryKindArg::Tool => Self::Tool,
            RegistryKindArg::Agent => Self::Agent,
            RegistryKindArg::Workflow => Self::Workflow,
            RegistryKindArg::Code => Self::Code,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn run_subcommand_parses_required_blueprint_path() {
        let cli = Cli::parse_from(["icecore", "run", "blueprint.json"]);
        match cli.command {
            Command::Run { blueprint, inputs, max_parallel } => {
                assert_eq!(blueprint, PathBuf::from("blueprint.json"));
                assert!(inputs.is_none());
                assert!(max_parallel.is_none());
            }
            _ => panic!("expected Run"),
        }
    }

    #[test]
    fn run_subcommand_parses_optional_flags() {
        let cli = Cli::parse_from([
            "icecore",
            "run",
            "blueprint.json",
            "--inputs",
            "inputs.json",
            "--max-parallel",
            "4",
        ]);
        match cli.command {
            Command::Run { inputs, max_parallel, .. } => {
                assert_eq!(inputs, Some(PathBuf::from("inputs.json")));
                assert_eq!(max_parallel, Some(4));
            }
            _ => panic!("expected Run"),
        }
    }

    #[test]
    fn register_subcommand_parses_all_positionals() {
        let cli = Cli::parse_from([
            "icecore",
            "register",
            "manifest.json",
            "tool",
            "http.request",
            "def.json",
        ]);
        match cli.command {
            Command::Register { manifest, name, definition, .. } => {
                assert_eq!(manifest, PathBuf::from("manifest.json"));
                assert_eq!(name, "http.request");
                assert_eq!(definition, PathBuf::from("def.json"));
            }
            _ => panic!("expected Register"),
        }
    }

    #[test]
    fn validate_subcommand_requires_blueprint_path() {
        let result = Cli::try_parse_from(["icecore", "validate"]);
        assert!(result.is_err());
    }
}
