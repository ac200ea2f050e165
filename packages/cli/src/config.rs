use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use verso_editor::EditorConfig;

pub const DEFAULT_CONFIG_NAME: &str = "verso.config.json";

/// Verso configuration file format
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Directory holding serialized documents
    #[serde(default = "default_docs_dir")]
    pub docs_dir: String,

    /// Options for every editor the CLI creates
    #[serde(default)]
    pub editor: EditorConfig,
}

fn default_docs_dir() -> String {
    "docs".to_string()
}

impl Config {
    /// Load config from a directory
    pub fn load(cwd: &str) -> anyhow::Result<Self> {
        let config_path = PathBuf::from(cwd).join(DEFAULT_CONFIG_NAME);

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            let config: Config = serde_json::from_str(&content)?;
            Ok(config)
        } else {
            Ok(Config::default())
        }
    }

    /// Absolute path to the documents directory
    pub fn get_docs_dir(&self, cwd: &str) -> PathBuf {
        PathBuf::from(cwd).join(&self.docs_dir)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            docs_dir: default_docs_dir(),
            editor: EditorConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_config() {
        let json = r#"{
            "docsDir": "notes",
            "editor": {
                "namespace": "cli",
                "editable": false,
                "decorators": ["youtube"],
                "history": { "maxLevels": 10 }
            }
        }"#;

        let config: Config = serde_json::from_str(json).unwrap();
        assert_eq!(config.docs_dir, "notes");
        assert_eq!(config.editor.namespace, "cli");
        assert!(!config.editor.editable);
        assert_eq!(config.editor.decorators, vec!["youtube"]);
        assert_eq!(config.editor.history.max_levels, 10);
        assert_eq!(config.editor.history.merge_delay_ms, 1000);
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.docs_dir, "docs");
        assert!(config.editor.editable);
    }

    #[test]
    fn test_load_missing_config_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load(&dir.path().display().to_string()).unwrap();
        assert_eq!(config.docs_dir, "docs");
    }
}
