//! Checks 3–5 of §4.3: per-kind required fields, input binding validity, and
//! Registry binding resolution. Check 1 (id uniqueness / dangling
//! dependencies) is already enforced by `Blueprint::new`'s constructor, and
//! check 2 (acyclicity) is run separately in `compiler.rs` since it also
//! drives layering — everything here assumes a structurally valid blueprint
//! and only adds offenses, never panics on a malformed one.

use icecore_registry::{Registry, RegistryKind};
use icecore_workflow::{Blueprint, InputBinding, NodeKind, NodeSpec};

use crate::error::{OffenseCode, ValidationOffense};

/// Runs checks 3–5 against every node, returning every offense found (never
/// short-circuits on the first one).
pub fn run(blueprint: &Blueprint, registry: &Registry) -> Vec<ValidationOffense> {
    let mut offenses = Vec::new();
    for node in &blueprint.nodes {
        required_fields(node, &mut offenses);
        input_bindings(blueprint, node, &mut offenses);
        registry_binding(node, registry, &mut offenses);
    }
    offenses
}

fn missing(node: &NodeSpec, field: &str, offenses: &mut Vec<ValidationOffense>) {
    offenses.push(ValidationOffense::on_node(
        node.id,
        OffenseCode::MissingRequiredField,
        format!("{} node is missing required field `{field}`", node.kind.label()),
    ));
}

/// Check 3: per-kind required fields present and internally consistent.
fn required_fields(node: &NodeSpec, offenses: &mut Vec<ValidationOffense>) {
    match &node.kind {
        NodeKind::Tool { tool_name, .. } => {
            if tool_name.trim().is_empty() {
                missing(node, "tool_name", offenses);
            }
        }
        NodeKind::Llm {
            provider,
            model,
            temperature,
            max_tokens,
            ..
        } => {
            if provider.trim().is_empty() {
                missing(node, "provider", offenses);
            }
            if model.trim().is_empty() {
                missing(node, "model", offenses);
            }
            if let Some(t) = temperature {
                if !(0.0..=2.0).contains(t) {
                    offenses.push(ValidationOffense::on_node(
                        node.id,
                        OffenseCode::MissingRequiredField,
                        format!("llm node temperature {t} is outside the valid 0.0..=2.0 range"),
                    ));
                }
            }
            if max_tokens == &Some(0) {
                offenses.push(ValidationOffense::on_node(
                    node.id,
                    OffenseCode::MissingRequiredField,
                    "llm node max_tokens must be greater than zero when set",
                ));
            }
        }
        NodeKind::Agent {
            system_prompt,
            tools,
            ..
        } => {
            if system_prompt.trim().is_empty() {
                missing(node, "system_prompt", offenses);
            }
            if tools.is_empty() {
                missing(node, "tools", offenses);
            }
        }
        NodeKind::Condition { expression } => {
            if expression.trim().is_empty() {
                missing(node, "expression", offenses);
            }
        }
        NodeKind::Loop {
            loop_variable,
            body,
            ..
        } => {
            if loop_variable.trim().is_empty() {
                missing(node, "loop_variable", offenses);
            }
            if body.is_empty() {
                missing(node, "body", offenses);
            }
        }
        NodeKind::Parallel {
            branches,
            ..
        } => {
            if branches.is_empty() || branches.iter().any(Vec::is_empty) {
                offenses.push(ValidationOffense::on_node(
                    node.id,
                    OffenseCode::MissingRequiredField,
                    "parallel node must declare at least one non-empty branch",
                ));
            }
        }
        NodeKind::Recursive {
            convergence_expression,
            max_iterations,
            ..
        } => {
            if convergence_expression.trim().is_empty() {
                missing(node, "convergence_expression", offenses);
            }
            if *max_iterations == 0 {
                offenses.push(ValidationOffense::on_node(
                    node.id,
                    OffenseCode::MissingRequiredField,
                    "recursive node max_iterations must be greater than zero",
                ));
            }
        }
        NodeKind::Workflow { workflow_ref, .. } => {
            if workflow_ref.trim().is_empty() {
                missing(node, "workflow_ref", offenses);
            }
        }
        NodeKind::Code { language, source, .. } => {
            if language.trim().is_empty() {
                missing(node, "language", offenses);
            }
            if source.trim().is_empty() {
                missing(node, "source", offenses);
            }
        }
    }
}

/// Check 4: every `Reference` binding names a declared dependency, and (when
/// the upstream node declares an `output_schema`) a field actually present
/// in that schema's top-level `properties`. An upstream with no declared
/// schema can't be checked at the field level, so any `field_path` passes.
fn input_bindings(blueprint: &Blueprint, node: &NodeSpec, offenses: &mut Vec<ValidationOffense>) {
    for (field, binding) in &node.input_bindings {
        match binding {
            InputBinding::Literal { .. } => {}
            InputBinding::Variable { field_path } => {
                if field_path.trim().is_empty() {
                    offenses.push(ValidationOffense::on_node(
                        node.id,
                        OffenseCode::InvalidInputBinding,
                        format!("input `{field}` has an empty variable field_path"),
                    ));
                }
            }
            InputBinding::Reference {
                upstream_id,
                field_path,
            } => {
                if !node.dependencies.contains(upstream_id) {
                    offenses.push(ValidationOffense::on_node(
                        node.id,
                        OffenseCode::InvalidInputBinding,
                        format!(
                            "input `{field}` references upstream {upstream_id} which is not a declared dependency"
                        ),
                    ));
                    continue;
                }
                let Some(upstream) = blueprint.node(*upstream_id) else {
                    offenses.push(ValidationOffense::on_node(
                        node.id,
                        OffenseCode::InvalidInputBinding,
                        format!("input `{field}` references unknown upstream node {upstream_id}"),
                    ));
                    continue;
                };
                if let Some(schema) = &upstream.output_schema {
                    if !schema_declares_field(schema, field_path) {
                        offenses.push(ValidationOffense::on_node(
                            node.id,
                            OffenseCode::InvalidInputBinding,
                            format!(
                                "input `{field}` references field_path `{field_path}` not declared in upstream {upstream_id}'s output_schema"
                            ),
                        ));
                    }
                }
            }
        }
    }
}

/// `field_path` is a dotted path; only its first segment needs to appear in
/// the schema's top-level `properties` object for the reference to be
/// considered declared — nested schema shape isn't modeled here.
fn schema_declares_field(schema: &serde_json::Value, field_path: &str) -> bool {
    let Some(top) = field_path.split('.').next() else {
        return false;
    };
    schema
        .get("properties")
        .and_then(|p| p.as_object())
        .is_some_and(|props| props.contains_key(top))
}

/// Check 5: every `tool`, `agent`, `workflow`, `code` reference resolves in
/// the Registry. An `Agent` node has no binding of its own — it names the
/// tools its loop may call, each of which resolves as a `RegistryKind::Tool`
/// entry (see DESIGN.md).
fn registry_binding(node: &NodeSpec, registry: &Registry, offenses: &mut Vec<ValidationOffense>) {
    let mut resolve = |kind: RegistryKind, name: &str| {
        if registry.get(kind, name).is_err() {
            offenses.push(ValidationOffense::on_node(
                node.id,
                OffenseCode::UnresolvedRegistryBinding,
                format!("no {kind:?} registered under the name `{name}`"),
            ));
        }
    };

    match &node.kind {
        NodeKind::Tool { tool_name, .. } => resolve(RegistryKind::Tool, tool_name),
        NodeKind::Agent { tools, .. } => {
            for tool in tools {
                resolve(RegistryKind::Tool, tool);
            }
        }
        NodeKind::Workflow { workflow_ref, .. } => resolve(RegistryKind::Workflow, workflow_ref),
        NodeKind::Code { language, .. } => resolve(RegistryKind::Code, language),
        NodeKind::Llm { .. }
        | NodeKind::Condition { .. }
        | NodeKind::Loop { .. }
        | NodeKind::Parallel { .. }
        | NodeKind::Recursive { .. } => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use icecore_core::{BlueprintId, NodeId};
    use icecore_workflow::BlueprintMetadata;
    use pretty_assertions::assert_eq;

    fn meta() -> BlueprintMetadata {
        BlueprintMetadata {
            name: "t".into(),
            owner: None,
            created_at: Utc::now(),
            description: None,
        }
    }

    fn bp(nodes: Vec<NodeSpec>) -> Blueprint {
        Blueprint::new(BlueprintId::v4(), 1, 0, meta(), nodes).unwrap()
    }

    #[test]
    fn empty_tool_name_is_missing_field() {
        let node = NodeSpec::new(
            NodeId::v4(),
            NodeKind::Tool {
                tool_name: String::new(),
                tool_args: serde_json::json!({}),
            },
        );
        let blueprint = bp(vec![node]);
        let registry = Registry::new();
        let offenses = run(&blueprint, &registry);
        assert_eq!(offenses.len(), 2); // missing field + unresolved binding
        assert!(offenses.iter().any(|o| o.code == OffenseCode::MissingRequiredField));
    }

    #[test]
    fn unresolved_tool_reports_registry_offense() {
        let node = NodeSpec::new(
            NodeId::v4(),
            NodeKind::Tool {
                tool_name: "http.get".into(),
                tool_args: serde_json::json!({}),
            },
        );
        let blueprint = bp(vec![node]);
        let registry = Registry::new();
        let offenses = run(&blueprint, &registry);
        assert_eq!(offenses.len(), 1);
        assert_eq!(offenses[0].code, OffenseCode::UnresolvedRegistryBinding);
    }

    #[test]
    fn resolved_tool_is_clean() {
        let node = NodeSpec::new(
            NodeId::v4(),
            NodeKind::Tool {
                tool_name: "http.get".into(),
                tool_args: serde_json::json!({}),
            },
        );
        let blueprint = bp(vec![node]);
        let registry = Registry::new();
        registry
            .register(RegistryKind::Tool, "http.get", serde_json::json!({}), None)
            .unwrap();
        assert!(run(&blueprint, &registry).is_empty());
    }

    #[test]
    fn reference_to_undeclared_dependency_is_invalid_binding() {
        let upstream = NodeId::v4();
        let downstream_id = NodeId::v4();
        let mut downstream = NodeSpec::new(
            downstream_id,
            NodeKind::Tool {
                tool_name: "noop".into(),
                tool_args: serde_json::json!({}),
            },
        );
        downstream.input_bindings.insert(
            "x".into(),
            InputBinding::Reference {
                upstream_id: upstream,
                field_path: "y".into(),
            },
        );
        let upstream_node = NodeSpec::new(
            upstream,
            NodeKind::Tool {
                tool_name: "noop".into(),
                tool_args: serde_json::json!({}),
            },
        );
        let blueprint = bp(vec![upstream_node, downstream]);
        let registry = Registry::new();
        registry.register(RegistryKind::Tool, "noop", serde_json::json!({}), None).unwrap();
        let offenses = run(&blueprint, &registry);
        assert_eq!(offenses.len(), 1);
        assert_eq!(offenses[0].code, OffenseCode::InvalidInputBinding);
    }

    #[test]
    fn reference_to_undeclared_schema_field_is_invalid_binding() {
        let upstream = NodeId::v4();
        let downstream_id = NodeId::v4();
        let mut downstream = NodeSpec::new(
            downstream_id,
            NodeKind::Tool {
                tool_name: "noop".into(),
                tool_args: serde_json::json!({}),
            },
        )
        .with_dependencies([upstream]);
        downstream.input_bindings.insert(
            "x".into(),
            InputBinding::Reference {
                upstream_id: upstream,
                field_path: "missing".into(),
            },
        );
        let mut upstream_node = NodeSpec::new(
            upstream,
            NodeKind::Tool {
                tool_name: "noop".into(),
                tool_args: serde_json::json!({}),
            },
        );
        upstream_node.output_schema = Some(serde_json::json!({"properties": {"present": {}}}));
        let blueprint = bp(vec![upstream_node, downstream]);
        let registry = Registry::new();
        registry.register(RegistryKind::Tool, "noop", serde_json::json!({}), None).unwrap();
        let offenses = run(&blueprint, &registry);
        assert_eq!(offenses.len(), 1);
        assert_eq!(offenses[0].code, OffenseCode::InvalidInputBinding);
    }

    #[test]
    fn unschema_checked_upstream_passes() {
        let upstream = NodeId::v4();
        let downstream_id = NodeId::v4();
        let mut downstream = NodeSpec::new(
            downstream_id,
            NodeKind::Tool {
                tool_name: "noop".into(),
                tool_args: serde_json::json!({}),
            },
        )
        .with_dependencies([upstream]);
        downstream.input_bindings.insert(
            "x".into(),
            InputBinding::Reference {
                upstream_id: upstream,
                field_path: "anything".into(),
            },
        );
        let upstream_node = NodeSpec::new(
            upstream,
            NodeKind::Tool {
                tool_name: "noop".into(),
                tool_args: serde_json::json!({}),
            },
        );
        let blueprint = bp(vec![upstream_node, downstream]);
        let registry = Registry::new();
        registry.register(RegistryKind::Tool, "noop", serde_json::json!({}), None).unwrap();
        assert!(run(&blueprint, &registry).is_empty());
    }

    #[test]
    fn agent_tools_each_resolve_independently() {
        let node = NodeSpec::new(
            NodeId::v4(),
            NodeKind::Agent {
                system_prompt: "be helpful".into(),
                tools: vec!["search".into(), "calculator".into()],
                max_iterations: None,
            },
        );
        let blueprint = bp(vec![node]);
        let registry = Registry::new();
        registry.register(RegistryKind::Tool, "search", serde_json::json!({}), None).unwrap();
        let offenses = run(&blueprint, &registry);
        assert_eq!(offenses.len(), 1);
        assert!(offenses[0].message.contains("calculator"));
    }
}
