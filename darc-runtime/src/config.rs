use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default cap on the number of instructions in one program
pub const DEFAULT_MAX_OPERATIONS: usize = 256;

/// Which authorization policy the entrance applies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicyKind {
    /// Accept every submitter
    AllowAll,
    /// The submitter must be the program operator and every instruction operator
    SubmitterIsOperator,
}

impl Default for PolicyKind {
    fn default() -> Self {
        PolicyKind::SubmitterIsOperator
    }
}

/// Settings for an `Entrance` and the executor behind it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EntranceConfig {
    /// Programs with more instructions than this are rejected before execution
    pub max_operations: usize,

    /// Authorization policy to install
    pub policy: PolicyKind,

    /// Append committed programs to this journal file, replaying it on startup
    pub journal_path: Option<PathBuf>,
}

impl Default for EntranceConfig {
    fn default() -> Self {
        Self {
            max_operations: DEFAULT_MAX_OPERATIONS,
            policy: PolicyKind::default(),
            journal_path: None,
        }
    }
}

impl EntranceConfig {
    /// Parse a configuration from JSON text; missing keys take their defaults
    pub fn from_json_str(text: &str) -> anyhow::Result<Self> {
        serde_json::from_str(text).context("Failed to parse entrance configuration")
    }

    /// Load a configuration from a JSON file
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read configuration file {}", path.display()))?;
        Self::from_json_str(&text)
    }
}
