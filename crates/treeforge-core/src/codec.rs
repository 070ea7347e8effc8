//! Document set descriptions and their text encodings
//!
//! A [`TreeSetDescription`] is what gets saved: the main tree name, one
//! root-less tree per document and the custom node models. How it is turned
//! into text is up to a [`TreeCodec`]; [`JsonTreeCodec`] is the one shipped.

use crate::tree::AbsBehaviorTree;
use serde::{Deserialize, Serialize};
use treeforge_model::NodeModel;

/// Codec failure
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// Malformed or mismatching JSON
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// One document of a set
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreeDescription {
    /// Document name
    pub id: String,
    /// `None` for a document holding only its `Root`
    #[serde(default)]
    pub tree: Option<AbsBehaviorTree>,
}

impl TreeDescription {
    /// Description of one document
    #[must_use]
    pub fn new(id: impl Into<String>, tree: Option<AbsBehaviorTree>) -> Self {
        Self {
            id: id.into(),
            tree,
        }
    }
}

/// Saved form of the whole document set
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TreeSetDescription {
    /// Document designated as main
    #[serde(default)]
    pub main_tree: Option<String>,
    /// One entry per document, in tab order
    #[serde(default)]
    pub trees: Vec<TreeDescription>,
    /// Custom models, built-ins excluded
    #[serde(default)]
    pub models: Vec<NodeModel>,
}

impl TreeSetDescription {
    /// Tree stored for `id`
    #[must_use]
    pub fn tree(&self, id: &str) -> Option<&TreeDescription> {
        self.trees.iter().find(|t| t.id == id)
    }
}

/// Text encoding of [`TreeSetDescription`]s
pub trait TreeCodec {
    /// Render a description
    ///
    /// # Errors
    /// Returns error if the description cannot be represented
    fn encode(&self, description: &TreeSetDescription) -> Result<String, CodecError>;

    /// Parse a description
    ///
    /// # Errors
    /// Returns error for malformed text or trees that are not valid
    fn decode(&self, text: &str) -> Result<TreeSetDescription, CodecError>;
}

/// JSON encoding
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonTreeCodec {
    pretty: bool,
}

impl JsonTreeCodec {
    /// Compact output
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Indented output
    #[must_use]
    pub fn with_pretty(mut self, pretty: bool) -> Self {
        self.pretty = pretty;
        self
    }
}

impl TreeCodec for JsonTreeCodec {
    fn encode(&self, description: &TreeSetDescription) -> Result<String, CodecError> {
        let text = if self.pretty {
            serde_json::to_string_pretty(description)?
        } else {
            serde_json::to_string(description)?
        };
        Ok(text)
    }

    fn decode(&self, text: &str) -> Result<TreeSetDescription, CodecError> {
        Ok(serde_json::from_str(text)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::AbstractTreeNode;
    use treeforge_model::NodeKind;

    #[test]
    fn decode_rejects_invalid_trees() {
        let codec = JsonTreeCodec::new();
        let text = r#"{
            "trees": [{
                "id": "Main",
                "tree": {
                    "nodes": [{
                        "model": {"kind": "Control", "registration_id": "Sequence"},
                        "instance_name": "Sequence",
                        "children_index": [0]
                    }],
                    "root_index": 0
                }
            }]
        }"#;
        assert!(codec.decode(text).is_err());
    }

    #[test]
    fn missing_sections_default() {
        let set = JsonTreeCodec::new().decode(r#"{"trees": [{"id": "Main"}]}"#).unwrap();
        assert_eq!(set.main_tree, None);
        assert!(set.models.is_empty());
        assert_eq!(set.tree("Main").unwrap().tree, None);
    }

    #[test]
    fn pretty_output_is_indented() {
        let mut set = TreeSetDescription::default();
        let leaf = AbstractTreeNode::new(NodeModel::new(NodeKind::Action, "Open"), "Open");
        set.trees.push(TreeDescription::new(
            "Main",
            Some(AbsBehaviorTree::from_nodes(vec![leaf], 0).unwrap()),
        ));
        let text = JsonTreeCodec::new().with_pretty(true).encode(&set).unwrap();
        assert!(text.contains("\n  "));
        assert_eq!(JsonTreeCodec::new().decode(&text).unwrap(), set);
    }
}
