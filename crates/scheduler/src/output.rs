//! Interprets an executor's [`ActionResult`] into what the Scheduler does
//! next. Carried over near-verbatim in spirit from an upstream
//! `extract_primary_output` (`engine.rs`), generalized to every flow-control
//! variant `ActionResult` defines rather than only `Success`/`Failure`.

use chrono::{DateTime, Utc};
use icecore_executors::{ActionResult, WaitCondition};
use icecore_workflow::NodeState;
use std::time::Duration;

/// What a node's executor invocation resolved to.
pub enum StepOutcome {
    /// The node reached a terminal state for this run.
    Done {
        state: NodeState,
        value: serde_json::Value,
        note: Option<String>,
    },
    /// Re-invoke the same executor for another iteration (`loop`, `recursive`).
    Continue {
        value: serde_json::Value,
        delay: Option<Duration>,
    },
    /// Sleep until `resume_at`, then re-invoke with the same input.
    Wait {
        value: Option<serde_json::Value>,
        resume_at: DateTime<Utc>,
    },
}

/// Byte length of a value's JSON-serialized form, used for `output_bytes`
/// bookkeeping on both the event log and `RunState.total_output_bytes`.
#[must_use]
pub fn byte_len(value: &serde_json::Value) -> u64 {
    serde_json::to_vec(value).map_or(0, |bytes| bytes.len() as u64)
}

/// Maps an [`ActionResult`] to the scheduler's next step.
pub fn interpret(result: ActionResult<serde_json::Value>) -> StepOutcome {
    match result {
        ActionResult::Success { output } => StepOutcome::Done {
            state: NodeState::Completed,
            value: output,
            note: None,
        },
        // `NodeState::Skipped` is reserved for nodes that never ran at all
        // (blocked dependency or a false `when` guard); a node whose executor
        // ran and chose to no-op still completed, so it lands here instead.
        ActionResult::Skip { reason, output } => StepOutcome::Done {
            state: NodeState::Completed,
            value: output.unwrap_or(serde_json::Value::Null),
            note: Some(reason),
        },
        ActionResult::Continue {
            output,
            delay,
            progress: _,
        } => StepOutcome::Continue {
            value: output,
            delay,
        },
        ActionResult::Break { output, reason } => StepOutcome::Done {
            state: NodeState::Completed,
            value: output,
            note: Some(format!("{reason:?}")),
        },
        ActionResult::Branch {
            selected,
            output: _,
            alternatives: _,
        } => StepOutcome::Done {
            state: NodeState::Completed,
            value: serde_json::json!({ "branch": selected }),
            note: None,
        },
        ActionResult::Route { port, data } => StepOutcome::Done {
            state: NodeState::Completed,
            value: serde_json::json!({ "port": port, "data": data }),
            note: None,
        },
        ActionResult::MultiOutput {
            outputs,
            main_output,
        } => StepOutcome::Done {
            state: NodeState::Completed,
            value: serde_json::json!({ "outputs": outputs, "main_output": main_output }),
            note: None,
        },
        ActionResult::Wait {
            condition,
            timeout: _,
            partial_output,
        } => {
            let resume_at = match condition {
                WaitCondition::Until { datetime } => datetime,
                WaitCondition::Duration { duration } => {
                    Utc::now() + chrono::Duration::from_std(duration).unwrap_or_default()
                }
            };
            StepOutcome::Wait {
                value: partial_output,
                resume_at,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_is_done_completed() {
        match interpret(ActionResult::success(serde_json::json!(1))) {
            StepOutcome::Done { state, value, note } => {
                assert_eq!(state, NodeState::Completed);
                assert_eq!(value, serde_json::json!(1));
                assert!(note.is_none());
            }
            _ => panic!("expected Done"),
        }
    }

    #[test]
    fn skip_is_done_completed_with_reason() {
        match interpret(ActionResult::skip("no items")) {
            StepOutcome::Done { state, note, .. } => {
                assert_eq!(state, NodeState::Completed);
                assert_eq!(note.as_deref(), Some("no items"));
            }
            _ => panic!("expected Done"),
        }
    }

    #[test]
    fn continue_carries_output_forward() {
        match interpret(ActionResult::Continue {
            output: serde_json::json!("partial"),
            progress: Some(0.3),
            delay: None,
        }) {
            StepOutcome::Continue { value, .. } => assert_eq!(value, serde_json::json!("partial")),
            _ => panic!("expected Continue"),
        }
    }

    #[test]
    fn branch_is_done_completed_with_bare_branch_field() {
        match interpret(ActionResult::Branch {
            selected: "true".into(),
            output: serde_json::json!({"ignored": true}),
            alternatives: vec!["false".into()],
        }) {
            StepOutcome::Done { state, value, .. } => {
                assert_eq!(state, NodeState::Completed);
                assert_eq!(value, serde_json::json!({"branch": "true"}));
            }
            _ => panic!("expected Done"),
        }
    }

    #[test]
    fn break_is_done_completed() {
        match interpret(ActionResult::Break {
            output: serde_json::json!(42),
            reason: icecore_executors::BreakReason::MaxIterations,
        }) {
            StepOutcome::Done { state, value, .. } => {
                assert_eq!(state, NodeState::Completed);
                assert_eq!(value, serde_json::json!(42));
            }
            _ => panic!("expected Done"),
        }
    }

    #[test]
    fn wait_duration_resolves_to_a_future_timestamp() {
        let before = Utc::now();
        match interpret(ActionResult::Wait {
            condition: WaitCondition::Duration {
                duration: Duration::from_secs(5),
            },
            timeout: None,
            partial_output: None,
        }) {
            StepOutcome::Wait { resume_at, .. } => assert!(resume_at > before),
            _ => panic!("expected Wait"),
        }
    }

    #[test]
    fn byte_len_counts_serialized_bytes() {
        assert_eq!(byte_len(&serde_json::json!(null)), 4);
    }
}
