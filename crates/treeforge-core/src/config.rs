//! Editor configuration
//!
//! [`EditorConfig`] is plain serde data. Hosts usually build it with the
//! `with_*` methods or read it from TOML:
//!
//! ```toml
//! history_limit = 50
//! default_tree_name = "Main"
//! mode = "editor"
//!
//! [layout]
//! orientation = "horizontal"
//! sibling_spacing = 60.0
//! level_spacing = 120.0
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// File could not be read
    #[error("cannot read {}: {source}", path.display())]
    Io {
        /// File that was read
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Malformed TOML
    #[error("invalid TOML: {0}")]
    Parse(#[from] toml::de::Error),

    /// Value out of range
    #[error("invalid value for {field}: {reason}")]
    Invalid {
        /// Offending key
        field: &'static str,
        /// What is wrong with it
        reason: &'static str,
    },
}

/// What the user may do with the open documents
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EditorMode {
    /// Full editing with undo/redo
    #[default]
    Editor,
    /// Documents mirror a running tree
    Monitor,
    /// Documents mirror a recorded log
    Replay,
}

impl EditorMode {
    /// Whether user edits and undo/redo are accepted
    #[inline]
    #[must_use]
    pub fn allows_editing(self) -> bool {
        self == EditorMode::Editor
    }
}

/// Direction in which a tree grows on the canvas
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Orientation {
    /// Root at the top, children below
    #[default]
    Vertical,
    /// Root on the left, children to the right
    Horizontal,
}

/// Layout parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutConfig {
    /// Direction the tree grows in
    pub orientation: Orientation,
    /// Distance between neighbouring leaves
    pub sibling_spacing: f64,
    /// Distance between tree levels
    pub level_spacing: f64,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            orientation: Orientation::Vertical,
            sibling_spacing: 40.0,
            level_spacing: 100.0,
        }
    }
}

impl LayoutConfig {
    /// Set the growth direction
    #[must_use]
    pub fn with_orientation(mut self, orientation: Orientation) -> Self {
        self.orientation = orientation;
        self
    }

    /// Set leaf and level distances
    #[must_use]
    pub fn with_spacing(mut self, sibling: f64, level: f64) -> Self {
        self.sibling_spacing = sibling;
        self.level_spacing = level;
        self
    }
}

/// Editor configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorConfig {
    /// Maximum number of undo entries kept
    pub history_limit: usize,
    /// Name of the document created on reset
    pub default_tree_name: String,
    /// Initial mode
    pub mode: EditorMode,
    /// Automatic layout parameters
    pub layout: LayoutConfig,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            history_limit: 100,
            default_tree_name: "BehaviorTree".to_string(),
            mode: EditorMode::Editor,
            layout: LayoutConfig::default(),
        }
    }
}

impl EditorConfig {
    /// Create default configuration
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the undo depth
    #[must_use]
    pub fn with_history_limit(mut self, limit: usize) -> Self {
        self.history_limit = limit;
        self
    }

    /// Set the name of the document created on reset
    #[must_use]
    pub fn with_default_tree_name(mut self, name: impl Into<String>) -> Self {
        self.default_tree_name = name.into();
        self
    }

    /// Set the initial mode
    #[must_use]
    pub fn with_mode(mut self, mode: EditorMode) -> Self {
        self.mode = mode;
        self
    }

    /// Set the layout parameters
    #[must_use]
    pub fn with_layout(mut self, layout: LayoutConfig) -> Self {
        self.layout = layout;
        self
    }

    /// Parse and validate TOML
    ///
    /// # Errors
    /// Returns error on malformed TOML or out-of-range values
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML file
    ///
    /// # Errors
    /// Returns error if the file cannot be read or is invalid
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// Check value ranges
    ///
    /// # Errors
    /// Returns the first offending field
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.history_limit == 0 {
            return Err(ConfigError::Invalid {
                field: "history_limit",
                reason: "must be at least 1",
            });
        }
        let name = self.default_tree_name.as_str();
        if name.is_empty() || name.trim() != name {
            return Err(ConfigError::Invalid {
                field: "default_tree_name",
                reason: "must be non-empty without surrounding whitespace",
            });
        }
        if !is_positive(self.layout.sibling_spacing) {
            return Err(ConfigError::Invalid {
                field: "layout.sibling_spacing",
                reason: "must be positive",
            });
        }
        if !is_positive(self.layout.level_spacing) {
            return Err(ConfigError::Invalid {
                field: "layout.level_spacing",
                reason: "must be positive",
            });
        }
        Ok(())
    }
}

fn is_positive(value: f64) -> bool {
    value.is_finite() && value > 0.0
}
