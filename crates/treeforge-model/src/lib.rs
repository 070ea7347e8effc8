//! treeforge node models
//!
//! Static descriptions of the node types a behavior-tree document can contain.
//!
//! # Core Concepts
//!
//! - [`NodeKind`]: Closed set of node categories (action, condition, control, ...)
//! - [`PortModel`]: Declared port of a node type
//! - [`NodeModel`]: A node type, identified by its registration id
//! - [`NodeModelSet`]: Registered and workspace model collections
//!
//! # Example
//!
//! ```rust,ignore
//! use treeforge_model::{NodeKind, NodeModel, NodeModelSet, PortModel};
//!
//! let mut models = NodeModelSet::with_builtins();
//! models.register(
//!     NodeModel::new(NodeKind::Action, "OpenDoor")
//!         .with_port("door_id", PortModel::input().required()),
//! )?;
//! assert!(models.contains("OpenDoor"));
//! ```

#![warn(unreachable_pub)]

mod builtin;
mod kind;
mod model;
mod port;
mod registry;

pub use builtin::{builtin_models, is_builtin, ROOT_MODEL_ID};
pub use kind::{ChildCapacity, NodeKind};
pub use model::NodeModel;
pub use port::{PortDirection, PortModel};
pub use registry::{ModelError, NodeModelSet, WorkspaceConflict, WorkspaceMergeReport};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
