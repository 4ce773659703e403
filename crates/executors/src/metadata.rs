use icecore_core::InterfaceVersion;

use crate::capability::{Capability, IsolationLevel};

/// Static metadata describing a registered node executor.
///
/// The Registry component (`icecore-registry`) stores one `ExecutorMetadata`
/// per `RegistryEntry`; the scheduler uses it for capability checks and
/// interface-version compatibility before dispatching a node.
#[derive(Debug, Clone)]
pub struct ExecutorMetadata {
    /// Unique key identifying this executor (e.g. `"http.request"`, `"tool"`).
    pub key: String,
    /// Human-readable display name.
    pub name: String,
    /// Short description of what this executor does.
    pub description: String,
    /// Category for grouping (e.g. `"network"`, `"transform"`).
    pub category: String,
    /// Interface version — changes only when input/output schema changes.
    pub version: InterfaceVersion,
    /// Capabilities this executor requires from the runtime.
    pub capabilities: Vec<Capability>,
    /// Required isolation level.
    pub isolation_level: IsolationLevel,
    /// JSON Schema for input validation (optional).
    pub input_schema: Option<serde_json::Value>,
    /// JSON Schema for output validation (optional).
    pub output_schema: Option<serde_json::Value>,
}

impl ExecutorMetadata {
    /// Create metadata with the minimum required fields.
    #[must_use]
    pub fn new(
        key: impl Into<String>,
        name: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            key: key.into(),
            name: name.into(),
            description: description.into(),
            category: String::new(),
            version: InterfaceVersion::default(),
            capabilities: Vec::new(),
            isolation_level: IsolationLevel::default(),
            input_schema: None,
            output_schema: None,
        }
    }

    /// Set the category for this executor.
    #[must_use]
    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = category.into();
        self
    }

    /// Set the interface version (major, minor).
    #[must_use]
    pub fn with_version(mut self, major: u32, minor: u32) -> Self {
        self.version = InterfaceVersion::new(major, minor);
        self
    }

    /// Add a required capability.
    #[must_use]
    pub fn with_capability(mut self, cap: Capability) -> Self {
        self.capabilities.push(cap);
        self
    }

    /// Set the required isolation level.
    #[must_use]
    pub fn with_isolation(mut self, level: IsolationLevel) -> Self {
        self.isolation_level = level;
        self
    }

    /// Set the JSON Schema for input validation.
    #[must_use]
    pub fn with_input_schema(mut self, schema: serde_json::Value) -> Self {
        self.input_schema = Some(schema);
        self
    }

    /// Set the JSON Schema for output validation.
    #[must_use]
    pub fn with_output_schema(mut self, schema: serde_json::Value) -> Self {
        self.output_schema = Some(schema);
        self
    }
}
