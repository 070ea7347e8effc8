//! Error types for the document model
//!
//! Provides error handling for:
//! - Structural validity of a document's graph
//! - Subtree references whose target cannot be materialized
//! - Caller bugs in the expansion state machine
//! - Document, model and mode preconditions of editor operations

use crate::config::{ConfigError, EditorMode};
use crate::persistence::MissingPort;
use treeforge_model::ModelError;
use treeforge_scene::{NodeHandle, SceneError};

/// Why a graph is not a well-formed tree
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StructuralError {
    /// No node without a parent
    #[error("no root node")]
    NoRoot,

    /// More than one node without a parent
    #[error("multiple root nodes: {}", .0.join(", "))]
    MultipleRoots(Vec<String>),

    /// A node is its own ancestor
    #[error("cycle through {node}")]
    Cycle {
        /// First node seen twice on the current path
        node: String,
    },

    /// A node is reached from two parents
    #[error("{node} has more than one parent")]
    SharedChild {
        /// The child with several parents
        node: String,
    },

    /// Nodes not reachable from the root
    #[error("{count} node(s) not reachable from the root")]
    Unreachable {
        /// Number of unreached nodes
        count: usize,
    },

    /// More children than the node's kind admits
    #[error("{node} has {found} children, at most {limit} allowed")]
    TooManyChildren {
        /// Instance name of the overfull node
        node: String,
        /// Children its kind admits
        limit: usize,
        /// Children it has
        found: usize,
    },

    /// A child index does not name a node of the tree
    #[error("child index {index} out of range")]
    DanglingIndex {
        /// The out-of-range index
        index: usize,
    },
}

/// Why a subtree reference cannot be expanded or refreshed
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SubtreeFault {
    /// No document with the referenced name
    #[error("document does not exist")]
    MissingDocument,

    /// The referenced document is not a valid tree
    #[error("{0}")]
    Structural(StructuralError),

    /// The referenced document has nothing under its root
    #[error("document is empty")]
    EmptyBody,

    /// The referenced document leads back to the owning document
    #[error("document references itself")]
    Recursive,
}

/// A document or subtree failed the validity gate
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidityError {
    /// The graph is not a single rooted, acyclic, ordered tree
    #[error("invalid tree: {0}")]
    Structural(#[from] StructuralError),

    /// The referenced subtree cannot be materialized
    #[error("subtree {subtree} is invalid: {reason}")]
    SubtreeInvalid {
        /// Referenced document name
        subtree: String,
        /// Why it cannot be inlined
        reason: SubtreeFault,
    },
}

/// Expansion state machine misuse
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InvariantViolation {
    /// Expand on a node that is already expanded
    #[error("{0} is already expanded")]
    AlreadyExpanded(NodeHandle),

    /// Collapse or refresh on a collapsed node
    #[error("{0} is not expanded")]
    NotExpanded(NodeHandle),

    /// Subtree operation on a node of another kind
    #[error("{0} is not a subtree reference")]
    NotSubtree(NodeHandle),

    /// User connection out of a subtree reference; only expansion wires it
    #[error("{0} is a subtree reference and takes no user children")]
    ReferenceOutput(NodeHandle),
}

/// Main error type of editor operations
#[derive(Debug, thiserror::Error)]
pub enum EditorError {
    /// A document failed the validity gate
    #[error("document {document}: {source}")]
    Validity {
        /// Document the check ran on
        document: String,
        /// The failure
        #[source]
        source: ValidityError,
    },

    /// Expansion state machine misuse
    #[error("invariant violation: {0}")]
    Invariant(#[from] InvariantViolation),

    /// Document name already taken
    #[error("document name already in use: {0}")]
    NameConflict(String),

    /// Document names must be non-empty and free of surrounding whitespace
    #[error("invalid document name: {0:?}")]
    InvalidName(String),

    /// No document with this name
    #[error("document not found: {0}")]
    DocumentNotFound(String),

    /// Handle does not name a node of the document
    #[error("{node} not found in document {document}")]
    NodeNotFound {
        /// Document searched
        document: String,
        /// The stale handle
        node: NodeHandle,
    },

    /// Node belongs to an inlined subtree body
    #[error("{node} in document {document} is locked")]
    Locked {
        /// Document holding the node
        document: String,
        /// The locked node
        node: NodeHandle,
    },

    /// Edits are only accepted in editor mode
    #[error("document set is read-only in {0:?} mode")]
    ReadOnlyMode(EditorMode),

    /// The model is still instantiated
    #[error("model {model} is used in document {document}")]
    ModelInUse {
        /// Registration id of the model
        model: String,
        /// First document instantiating it
        document: String,
    },

    /// No model with this id is registered
    #[error("unknown model: {0}")]
    UnknownModel(String),

    /// The node's model declares no such port
    #[error("model {model} has no port {port}")]
    UnknownPort {
        /// Registration id of the node's model
        model: String,
        /// The requested port
        port: String,
    },

    /// Required ports without a mapping block encoding
    #[error("{} required port(s) are not set", .0.len())]
    RequiredPortsUnset(Vec<MissingPort>),

    /// Registry operation failed
    #[error("model registry error: {0}")]
    Model(#[from] ModelError),

    /// Scene adapter or blob failure
    #[error("scene error: {0}")]
    Scene(#[from] SceneError),

    /// Invalid configuration
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl EditorError {
    /// Check whether the caller can correct the input and retry
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        !matches!(
            self,
            EditorError::Invariant(_) | EditorError::Scene(_) | EditorError::Config(_)
        )
    }

    /// Check whether this is a validity failure (structural or subtree)
    #[must_use]
    pub fn is_validity(&self) -> bool {
        matches!(self, EditorError::Validity { .. })
    }

    pub(crate) fn validity(document: impl Into<String>, source: impl Into<ValidityError>) -> Self {
        EditorError::Validity {
            document: document.into(),
            source: source.into(),
        }
    }
}

/// Result alias for editor operations
pub type Result<T, E = EditorError> = std::result::Result<T, E>;
