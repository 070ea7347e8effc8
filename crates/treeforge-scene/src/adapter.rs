//! Scene adapter trait
//!
//! The only surface through which the document model reads and mutates a
//! document's graph. Implementations own their nodes in an arena and hand out
//! [`NodeHandle`]s; rendering and persistence formats are their own business.

use crate::handle::{Connection, ConnectionHandle, NodeHandle, PortSide};
use crate::node::{Point, SceneNode};
use treeforge_model::NodeModel;

/// Errors raised by scene operations
#[derive(Debug, thiserror::Error)]
pub enum SceneError {
    /// Handle does not name a live node
    #[error("node not found: {0}")]
    NodeNotFound(NodeHandle),

    /// Handle does not name a live connection
    #[error("connection not found: {0}")]
    ConnectionNotFound(ConnectionHandle),

    /// A node cannot be its own child
    #[error("cannot connect {0} to itself")]
    SelfLoop(NodeHandle),

    /// The node has no port on that side
    #[error("{node} has no {side:?} port")]
    MissingPort {
        /// Node lacking the port
        node: NodeHandle,
        /// Side that was asked for
        side: PortSide,
    },

    /// The two nodes are already connected
    #[error("{parent} is already connected to {child}")]
    DuplicateConnection {
        /// Upper end
        parent: NodeHandle,
        /// Lower end
        child: NodeHandle,
    },

    /// Blob could not be encoded or decoded
    #[error("scene blob encoding failed: {0}")]
    Blob(#[from] serde_json::Error),

    /// Blob decoded but describes an impossible scene
    #[error("corrupt scene blob: {0}")]
    CorruptBlob(String),
}

/// Structural interface over one document's graph
///
/// # Contract
/// - `nodes` enumerates live nodes in a deterministic order
/// - `connections` returns a side's connections in authoring order
/// - `save_to_memory` is canonical: two scenes with the same nodes (in the same
///   order) and the same connections (in the same order) produce equal blobs,
///   and `load_from_memory(save_to_memory())` reproduces an equal blob
pub trait SceneAdapter: Clone + Default + std::fmt::Debug {
    /// Live nodes
    fn nodes(&self) -> Vec<NodeHandle>;

    /// Node data
    fn node(&self, node: NodeHandle) -> Option<&SceneNode>;

    /// Mutable node data
    fn node_mut(&mut self, node: NodeHandle) -> Option<&mut SceneNode>;

    /// Connections attached to `port` on `side` of `node`, in authoring order
    fn connections(&self, node: NodeHandle, side: PortSide, port: usize) -> Vec<Connection>;

    /// Look up a connection by handle
    fn connection(&self, connection: ConnectionHandle) -> Option<Connection>;

    /// Create a node with the model's default ports and port mapping
    fn create_node(&mut self, model: NodeModel, position: Point) -> NodeHandle;

    /// Delete a node and every connection attached to it
    ///
    /// # Errors
    /// Returns error if the node does not exist
    fn delete_node(&mut self, node: NodeHandle) -> Result<(), SceneError>;

    /// Connect `parent`'s output port to `child`'s input port
    ///
    /// # Errors
    /// Returns error for missing nodes or ports, self loops and duplicates
    fn connect(&mut self, parent: NodeHandle, child: NodeHandle)
        -> Result<ConnectionHandle, SceneError>;

    /// Remove a connection
    ///
    /// # Errors
    /// Returns error if the connection does not exist
    fn disconnect(&mut self, connection: ConnectionHandle) -> Result<(), SceneError>;

    /// Resize the ports on one side; connections on removed ports are dropped
    ///
    /// # Errors
    /// Returns error if the node does not exist
    fn set_port_count(
        &mut self,
        node: NodeHandle,
        side: PortSide,
        count: usize,
    ) -> Result<(), SceneError>;

    /// Remove every node
    fn clear(&mut self);

    /// Opaque, canonical encoding of the full scene state
    ///
    /// # Errors
    /// Returns error if encoding fails
    fn save_to_memory(&self) -> Result<Vec<u8>, SceneError>;

    /// Replace the scene state with a blob from [`SceneAdapter::save_to_memory`]
    ///
    /// On error the scene is left untouched.
    ///
    /// # Errors
    /// Returns error if the blob is malformed
    fn load_from_memory(&mut self, blob: &[u8]) -> Result<(), SceneError>;

    /// Number of live nodes
    fn node_count(&self) -> usize {
        self.nodes().len()
    }

    /// Check whether `node` is live
    fn contains(&self, node: NodeHandle) -> bool {
        self.node(node).is_some()
    }

    /// Direct children in authoring order
    fn children(&self, node: NodeHandle) -> Vec<NodeHandle> {
        self.connections(node, PortSide::Out, 0)
            .into_iter()
            .map(|c| c.child)
            .collect()
    }

    /// First parent, if any
    fn parent(&self, node: NodeHandle) -> Option<NodeHandle> {
        self.connections(node, PortSide::In, 0)
            .first()
            .map(|c| c.parent)
    }

    /// Connection between two nodes, if any
    fn find_connection(&self, parent: NodeHandle, child: NodeHandle) -> Option<Connection> {
        self.connections(parent, PortSide::Out, 0)
            .into_iter()
            .find(|c| c.child == child)
    }
}
