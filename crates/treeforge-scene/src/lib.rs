//! treeforge scene
//!
//! The graph side of a behavior-tree document: nodes placed on a canvas and
//! the parent → child connections between them.
//!
//! # Core Concepts
//!
//! - [`SceneAdapter`]: Narrow structural interface the document model uses
//! - [`FlowScene`]: In-memory arena implementation backed by petgraph
//! - [`NodeHandle`]: Stable arena index of a node (never an owning reference)
//! - [`SceneNode`]: Per-node editor data (model, instance name, ports, lock)
//!
//! Connections always run from a parent's output port to a child's input
//! port. The order in which a parent's connections were authored is preserved
//! and defines the execution order of its children.

#![warn(unreachable_pub)]

mod adapter;
mod flow;
mod handle;
mod node;

pub use adapter::{SceneAdapter, SceneError};
pub use flow::FlowScene;
pub use handle::{Connection, ConnectionHandle, NodeHandle, PortSide};
pub use node::{ExpansionState, Point, SceneNode};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
