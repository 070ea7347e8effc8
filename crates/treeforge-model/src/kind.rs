//! Node kinds
//!
//! The closed set of categories a behavior-tree node belongs to.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Category of a node type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum NodeKind {
    /// Leaf that performs work
    Action,
    /// Leaf that checks a predicate
    Condition,
    /// Composite with an ordered list of children
    Control,
    /// Wraps exactly one child
    Decorator,
    /// Reference to another tree document
    #[serde(rename = "SubTree")]
    Subtree,
    /// Entry point of a document
    Root,
}

/// How many children a node may have
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChildCapacity {
    /// Leaf
    None,
    /// Exactly zero or one child
    One,
    /// Any number of ordered children
    Unbounded,
}

impl ChildCapacity {
    /// Check whether `count` children fit
    #[inline]
    #[must_use]
    pub fn admits(self, count: usize) -> bool {
        match self {
            ChildCapacity::None => count == 0,
            ChildCapacity::One => count <= 1,
            ChildCapacity::Unbounded => true,
        }
    }

    /// Upper bound, `None` when unbounded
    #[inline]
    #[must_use]
    pub fn limit(self) -> Option<usize> {
        match self {
            ChildCapacity::None => Some(0),
            ChildCapacity::One => Some(1),
            ChildCapacity::Unbounded => None,
        }
    }
}

impl NodeKind {
    /// All kinds, in declaration order
    pub const ALL: [NodeKind; 6] = [
        NodeKind::Action,
        NodeKind::Condition,
        NodeKind::Control,
        NodeKind::Decorator,
        NodeKind::Subtree,
        NodeKind::Root,
    ];

    /// Child capacity of the kind.
    ///
    /// A subtree reference only gets an output port while expanded; the
    /// scene's port count decides in that case, so this reports `One`.
    #[must_use]
    pub fn child_capacity(self) -> ChildCapacity {
        match self {
            NodeKind::Action | NodeKind::Condition => ChildCapacity::None,
            NodeKind::Decorator | NodeKind::Root | NodeKind::Subtree => ChildCapacity::One,
            NodeKind::Control => ChildCapacity::Unbounded,
        }
    }

    /// Number of input ports a freshly created node of this kind gets
    #[inline]
    #[must_use]
    pub fn default_input_ports(self) -> usize {
        usize::from(self != NodeKind::Root)
    }

    /// Number of output ports a freshly created node of this kind gets
    #[inline]
    #[must_use]
    pub fn default_output_ports(self) -> usize {
        match self {
            NodeKind::Action | NodeKind::Condition | NodeKind::Subtree => 0,
            NodeKind::Control | NodeKind::Decorator | NodeKind::Root => 1,
        }
    }

    /// Canonical name used in serialized documents
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            NodeKind::Action => "Action",
            NodeKind::Condition => "Condition",
            NodeKind::Control => "Control",
            NodeKind::Decorator => "Decorator",
            NodeKind::Subtree => "SubTree",
            NodeKind::Root => "Root",
        }
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NodeKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Action" => Ok(NodeKind::Action),
            "Condition" => Ok(NodeKind::Condition),
            "Control" => Ok(NodeKind::Control),
            "Decorator" => Ok(NodeKind::Decorator),
            "SubTree" | "Subtree" => Ok(NodeKind::Subtree),
            "Root" => Ok(NodeKind::Root),
            other => Err(format!("unknown node kind: {other}")),
        }
    }
}
