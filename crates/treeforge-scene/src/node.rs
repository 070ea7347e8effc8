//! Scene node data

use crate::handle::PortSide;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use treeforge_model::{NodeKind, NodeModel};

/// Canvas position
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    /// Horizontal coordinate
    pub x: f64,
    /// Vertical coordinate
    pub y: f64,
}

impl Point {
    /// Point at `(x, y)`
    #[inline]
    #[must_use]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Representation of a subtree-reference node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ExpansionState {
    /// Single opaque node, no output port
    Collapsed,
    /// One output port leading into an inlined, locked copy of the referenced tree
    Expanded,
}

/// Editor data attached to one node of a scene
///
/// Only nodes whose model kind is [`NodeKind::Subtree`] carry an
/// [`ExpansionState`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneNode {
    /// Model instantiated by this node
    pub model: NodeModel,
    /// Name shown for the node
    pub instance_name: String,
    /// Port name to value
    pub ports_mapping: IndexMap<String, String>,
    /// Position in scene coordinates
    pub position: Point,
    /// Locked nodes belong to an inlined subtree body
    pub locked: bool,
    expansion: Option<ExpansionState>,
    input_ports: usize,
    output_ports: usize,
}

impl SceneNode {
    /// Fresh node for `model`, with default ports and mapping
    #[must_use]
    pub fn new(model: NodeModel, position: Point) -> Self {
        let kind = model.kind;
        Self {
            instance_name: model.registration_id.clone(),
            ports_mapping: model.initial_mapping(),
            expansion: (kind == NodeKind::Subtree).then_some(ExpansionState::Collapsed),
            input_ports: kind.default_input_ports(),
            output_ports: kind.default_output_ports(),
            model,
            position,
            locked: false,
        }
    }

    /// Kind of the node's model
    #[inline]
    #[must_use]
    pub fn kind(&self) -> NodeKind {
        self.model.kind
    }

    /// Registration id of the node's model
    #[inline]
    #[must_use]
    pub fn registration_id(&self) -> &str {
        &self.model.registration_id
    }

    /// Check whether this node references another document
    #[inline]
    #[must_use]
    pub fn is_subtree(&self) -> bool {
        self.model.kind == NodeKind::Subtree
    }

    /// Expansion state, `None` for nodes that are not subtree references
    #[inline]
    #[must_use]
    pub fn expansion(&self) -> Option<ExpansionState> {
        self.expansion
    }

    /// Check whether this subtree reference is expanded
    #[inline]
    #[must_use]
    pub fn is_expanded(&self) -> bool {
        self.expansion == Some(ExpansionState::Expanded)
    }

    /// Set the expansion state of a subtree reference
    ///
    /// Returns `false` (and changes nothing) for other kinds.
    pub fn set_expansion(&mut self, state: ExpansionState) -> bool {
        if !self.is_subtree() {
            return false;
        }
        self.expansion = Some(state);
        true
    }

    /// Number of ports on one side
    #[inline]
    #[must_use]
    pub fn port_count(&self, side: PortSide) -> usize {
        match side {
            PortSide::In => self.input_ports,
            PortSide::Out => self.output_ports,
        }
    }

    /// Raw port count update; adapters prune connections on shrink
    pub fn set_port_count(&mut self, side: PortSide, count: usize) {
        match side {
            PortSide::In => self.input_ports = count,
            PortSide::Out => self.output_ports = count,
        }
    }

    /// Swap the model, keeping instance data where it still applies.
    ///
    /// Mappings for ports the new model also declares are kept; new ports get
    /// their defaults. An instance name equal to the old id follows the rename.
    pub fn substitute_model(&mut self, model: NodeModel) {
        if self.instance_name == self.model.registration_id {
            self.instance_name.clone_from(&model.registration_id);
        }
        let mut mapping = model.initial_mapping();
        for (port, value) in &mut mapping {
            if let Some(previous) = self.ports_mapping.get(port) {
                value.clone_from(previous);
            }
        }
        self.ports_mapping = mapping;

        if model.kind != self.model.kind {
            self.expansion = (model.kind == NodeKind::Subtree).then_some(ExpansionState::Collapsed);
            self.input_ports = model.kind.default_input_ports();
            self.output_ports = model.kind.default_output_ports();
        }
        self.model = model;
    }
}
