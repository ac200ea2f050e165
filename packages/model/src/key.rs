use crc32fast::Hasher;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable identity of a node within one editor instance.
///
/// Keys are plain identifiers: parent links and selection points refer to
/// nodes by key and resolve them through a [`crate::NodeStore`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeKey(String);

impl NodeKey {
    /// Key reserved for the root node of every document.
    pub const ROOT: &'static str = "root";

    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn root() -> Self {
        Self(Self::ROOT.to_string())
    }

    pub fn is_root(&self) -> bool {
        self.0 == Self::ROOT
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for NodeKey {
    fn from(raw: &str) -> Self {
        Self(raw.to_string())
    }
}

impl From<String> for NodeKey {
    fn from(raw: String) -> Self {
        Self(raw)
    }
}

/// Derive a key seed from an editor namespace using CRC32
pub fn namespace_seed(namespace: &str) -> String {
    let mut hasher = Hasher::new();
    hasher.update(namespace.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Sequential key generator for nodes within an editor instance
///
/// Two editors with different namespaces never produce the same key, which
/// keeps keys unique when nodes travel between editors (clipboard, history
/// restored from another instance).
#[derive(Debug, Clone)]
pub struct KeyGenerator {
    seed: String,
    count: u64,
}

impl KeyGenerator {
    pub fn new(namespace: &str) -> Self {
        Self {
            seed: namespace_seed(namespace),
            count: 0,
        }
    }

    pub fn from_seed(seed: impl Into<String>) -> Self {
        Self {
            seed: seed.into(),
            count: 0,
        }
    }

    /// Generate next sequential key
    pub fn next_key(&mut self) -> NodeKey {
        self.count += 1;
        NodeKey(format!("{}-{}", self.seed, self.count))
    }

    /// Number of keys handed out so far
    pub fn issued(&self) -> u64 {
        self.count
    }

    pub fn seed(&self) -> &str {
        &self.seed
    }
}

impl Default for KeyGenerator {
    fn default() -> Self {
        Self::new("verso")
    }
}
