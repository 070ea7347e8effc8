//! Node type descriptions

use crate::kind::NodeKind;
use crate::port::PortModel;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// A node type
///
/// # Invariants
/// - `registration_id` is unique within a [`crate::NodeModelSet`]
/// - Ports keep their declaration order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeModel {
    /// Category of the node
    pub kind: NodeKind,
    /// Unique id; subtree models use the referenced document's name
    pub registration_id: String,
    /// Declared ports, in declaration order
    #[serde(default)]
    pub ports: IndexMap<String, PortModel>,
}

impl NodeModel {
    /// Create a model without ports
    #[must_use]
    pub fn new(kind: NodeKind, registration_id: impl Into<String>) -> Self {
        Self {
            kind,
            registration_id: registration_id.into(),
            ports: IndexMap::new(),
        }
    }

    /// Subtree reference model for the document called `name`
    #[inline]
    #[must_use]
    pub fn subtree(name: impl Into<String>) -> Self {
        Self::new(NodeKind::Subtree, name)
    }

    /// Add a port
    #[must_use]
    pub fn with_port(mut self, name: impl Into<String>, port: PortModel) -> Self {
        self.ports.insert(name.into(), port);
        self
    }

    /// Check whether this is a subtree reference model
    #[inline]
    #[must_use]
    pub fn is_subtree(&self) -> bool {
        self.kind == NodeKind::Subtree
    }

    /// Same id, kind and port names (port details may differ)
    #[must_use]
    pub fn same_port_names(&self, other: &NodeModel) -> bool {
        self.ports.len() == other.ports.len()
            && self.ports.keys().all(|name| other.ports.contains_key(name))
    }

    /// Initial port mapping for a new instance: every port mapped to its
    /// default value, or to the empty string
    #[must_use]
    pub fn initial_mapping(&self) -> IndexMap<String, String> {
        self.ports
            .iter()
            .map(|(name, port)| (name.clone(), port.default_value.clone().unwrap_or_default()))
            .collect()
    }

    /// Copy of this model under another id
    #[must_use]
    pub fn renamed(&self, registration_id: impl Into<String>) -> Self {
        Self {
            kind: self.kind,
            registration_id: registration_id.into(),
            ports: self.ports.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn initial_mapping_uses_defaults() {
        let model = NodeModel::new(NodeKind::Action, "Say")
            .with_port("message", PortModel::input().with_default("hello"))
            .with_port("volume", PortModel::input());

        let mapping = model.initial_mapping();
        assert_eq!(mapping["message"], "hello");
        assert_eq!(mapping["volume"], "");
        assert_eq!(mapping.keys().collect::<Vec<_>>(), vec!["message", "volume"]);
    }

    #[test]
    fn port_name_comparison_ignores_details() {
        let a = NodeModel::new(NodeKind::Action, "A").with_port("x", PortModel::input());
        let b = NodeModel::new(NodeKind::Action, "A").with_port("x", PortModel::output().required());
        let c = NodeModel::new(NodeKind::Action, "A").with_port("y", PortModel::input());
        assert!(a.same_port_names(&b));
        assert!(!a.same_port_names(&c));
    }

    #[test]
    fn serde_uses_subtree_spelling() {
        let json = serde_json::to_string(&NodeModel::subtree("Door")).unwrap();
        assert!(json.contains("\"SubTree\""));
        let back: NodeModel = serde_json::from_str(&json).unwrap();
        assert!(back.is_subtree());
    }
}
