use serde::{Deserialize, Serialize};

// ============================================================================
// Context Records
// ============================================================================

/// One named target environment a backend operates against, as reported by
/// a context-listing command.
///
/// At most one context among those a listing observes is flagged current.
/// The `raw` field carries the backend-specific JSON verbatim for callers
/// that need fields this model does not lift out.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContextRecord {
    pub name: String,
    #[serde(default)]
    pub current: bool,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub raw: serde_json::Value,
}

/// Detailed context information from an inspect-by-name command.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContextInspection {
    pub name: String,
    #[serde(default)]
    pub metadata: serde_json::Value,
    #[serde(default)]
    pub endpoints: serde_json::Value,
}
