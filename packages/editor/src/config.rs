use crate::errors::{EditorError, EditorResult};
use serde::{Deserialize, Serialize};
use verso_model::Schema;
use verso_reconciler::Theme;

/// Lower bound of the transform pass limit
pub const MIN_TRANSFORM_PASSES: usize = 100;

/// Editor configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EditorConfig {
    /// Seeds node keys so editors never share keys
    pub namespace: String,

    pub editable: bool,

    /// Class names per theme slot
    pub theme: Theme,

    /// Fixed limit on transform passes per commit. Derived from the
    /// document size when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transform_cap: Option<usize>,

    /// Decorator types accepted when parsing serialized states
    pub decorators: Vec<String>,

    pub history: HistoryConfig,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            namespace: "verso".to_string(),
            editable: true,
            theme: Theme::new(),
            transform_cap: None,
            decorators: Vec::new(),
            history: HistoryConfig::default(),
        }
    }
}

impl EditorConfig {
    pub fn from_json(json: &str) -> EditorResult<Self> {
        serde_json::from_str(json).map_err(|e| EditorError::Config(e.to_string()))
    }

    pub fn schema(&self) -> Schema {
        self.decorators
            .iter()
            .fold(Schema::default(), |schema, ty| schema.with_decorator(ty.clone()))
    }

    /// Transform passes allowed for a document of `node_count` nodes
    pub fn transform_cap(&self, node_count: usize) -> usize {
        self.transform_cap
            .unwrap_or_else(|| MIN_TRANSFORM_PASSES.max(node_count.saturating_mul(10)))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HistoryConfig {
    /// Undo entries kept before the oldest is dropped
    pub max_levels: usize,

    /// Consecutive typing within this window lands in one undo entry
    pub merge_delay_ms: u64,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            max_levels: 100,
            merge_delay_ms: 1000,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_config() {
        let json = r#"{
            "namespace": "docs",
            "editable": false,
            "theme": { "paragraph": "p-class" },
            "transformCap": 5,
            "decorators": ["video"],
            "history": { "maxLevels": 10 }
        }"#;
        let config = EditorConfig::from_json(json).unwrap();
        assert_eq!(config.namespace, "docs");
        assert!(!config.editable);
        assert_eq!(config.theme.class_for("paragraph"), Some("p-class"));
        assert_eq!(config.transform_cap(1_000), 5);
        assert_eq!(config.history.max_levels, 10);
        assert_eq!(config.history.merge_delay_ms, 1000);
        assert!(config.schema().decorator_types.contains("video"));
        assert!(config.schema().decorator_types.contains("image"));
    }

    #[test]
    fn test_default_transform_cap_scales_with_size() {
        let config = EditorConfig::default();
        assert_eq!(config.transform_cap(3), 100);
        assert_eq!(config.transform_cap(50), 500);
    }

    #[test]
    fn test_invalid_config() {
        assert!(matches!(EditorConfig::from_json("{\"editable\": 3}"), Err(EditorError::Config(_))));
    }
}
