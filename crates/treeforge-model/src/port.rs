//! Port models

use serde::{Deserialize, Serialize};

/// Data direction of a declared port
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum PortDirection {
    /// Read by the node
    #[default]
    Input,
    /// Written by the node
    Output,
    /// Read and written
    InOut,
}

/// Declared port of a node type
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PortModel {
    /// Data flow direction of the port
    pub direction: PortDirection,
    /// A required port must be mapped to a non-empty value before saving
    #[serde(default)]
    pub required: bool,
    /// Value used when the port is left unmapped
    #[serde(default)]
    pub default_value: Option<String>,
    /// Free-form help text
    #[serde(default)]
    pub description: String,
}

impl PortModel {
    /// Input port
    #[inline]
    #[must_use]
    pub fn input() -> Self {
        Self::with_direction(PortDirection::Input)
    }

    /// Output port
    #[inline]
    #[must_use]
    pub fn output() -> Self {
        Self::with_direction(PortDirection::Output)
    }

    /// Bidirectional port
    #[inline]
    #[must_use]
    pub fn inout() -> Self {
        Self::with_direction(PortDirection::InOut)
    }

    /// Port with the given direction and no default
    #[inline]
    #[must_use]
    pub fn with_direction(direction: PortDirection) -> Self {
        Self {
            direction,
            ..Self::default()
        }
    }

    /// Mark as required
    #[inline]
    #[must_use]
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// With default value
    #[inline]
    #[must_use]
    pub fn with_default(mut self, value: impl Into<String>) -> Self {
        self.default_value = Some(value.into());
        self
    }

    /// With description
    #[inline]
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
}
