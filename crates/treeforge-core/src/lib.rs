//! treeforge core
//!
//! Document model of a behavior-tree editor: deriving logical trees from
//! node graphs, inlining subtree documents into each other, and snapshot
//! based undo/redo over the whole document set.
//!
//! # Core Concepts
//!
//! - [`AbsBehaviorTree`]: Ordered, acyclic tree derived from a document graph
//! - [`build_tree`]: The validity gate between a graph and a tree
//! - [`SubtreeRef`]: Node proven to reference another document; expanded
//!   references carry a locked, inlined copy of that document's tree
//! - [`DocumentRegistry`]: Open documents in tab order, one of them main
//! - [`History`]: Undo and redo stacks of whole-set [`Snapshot`]s
//! - [`EditorContext`]: The one owner of all of the above, with atomic
//!   mutation scopes and observer notifications
//!
//! # Example
//!
//! ```rust,ignore
//! use treeforge_core::{EditorConfig, EditorContext, JsonTreeCodec, TreeCodec};
//! use treeforge_scene::Point;
//!
//! let mut ctx = EditorContext::new(EditorConfig::default())?;
//! ctx.create_document("OpenDoor")?;
//! let main_root = ctx.document("BehaviorTree")?.scene().nodes()[0];
//! let door = ctx.add_node("BehaviorTree", "OpenDoor", Point::default())?;
//! ctx.connect("BehaviorTree", main_root, door)?;
//!
//! let text = JsonTreeCodec::new().encode(&ctx.encode_document_set()?)?;
//! ```

#![warn(unreachable_pub)]

mod builder;
mod codec;
mod config;
mod context;
mod documents;
mod edit;
mod error;
mod history;
mod layout;
mod materialize;
mod notify;
mod persistence;
mod registry;
pub mod subtree;
mod tree;

pub use builder::{build_tree, contains_valid_tree};
pub use codec::{CodecError, JsonTreeCodec, TreeCodec, TreeDescription, TreeSetDescription};
pub use config::{ConfigError, EditorConfig, EditorMode, LayoutConfig, Orientation};
pub use context::EditorContext;
pub use error::{
    EditorError, InvariantViolation, Result, StructuralError, SubtreeFault, ValidityError,
};
pub use history::{History, Snapshot, ViewArea, ViewState, ViewTransform};
pub use layout::arrange;
pub use notify::{DocumentChange, Notification, NotificationHub, Observer};
pub use persistence::MissingPort;
pub use registry::{Document, DocumentRegistry};
pub use subtree::SubtreeRef;
pub use tree::{AbsBehaviorTree, AbstractTreeNode};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
