//! Model registry
//!
//! Provides [`NodeModelSet`]: the *registered* models usable by open documents
//! and the *workspace* models persisted for reuse across projects.

use crate::builtin::{builtin_models, is_builtin};
use crate::model::NodeModel;
use indexmap::IndexMap;

/// Errors raised by registry operations
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ModelError {
    /// No model with this id is registered
    #[error("unknown model: {0}")]
    Unknown(String),

    /// A model with this id already exists
    #[error("model already registered: {0}")]
    Duplicate(String),

    /// Built-in models cannot be removed, renamed or redefined
    #[error("built-in model cannot be modified: {0}")]
    Builtin(String),

    /// Registration ids must be non-empty and free of surrounding whitespace
    #[error("invalid registration id: {0:?}")]
    InvalidId(String),
}

/// How to resolve a workspace model whose ports differ from the registered one
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WorkspaceConflict {
    /// Keep the registered model
    #[default]
    KeepLocal,
    /// Replace the registered model with the workspace one
    UseWorkspace,
}

/// Outcome of [`NodeModelSet::merge_workspace`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkspaceMergeReport {
    /// Ids registered because they were unknown
    pub added: Vec<String>,
    /// Ids whose ports disagreed with the registered model
    pub conflicts: Vec<String>,
    /// Conflicting ids that now use the workspace definition
    pub replaced: Vec<String>,
}

/// Registered and workspace node models
///
/// # Invariants
/// - Built-in models are always registered
/// - Registration ids are unique within each partition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeModelSet {
    registered: IndexMap<String, NodeModel>,
    workspace: IndexMap<String, NodeModel>,
}

impl Default for NodeModelSet {
    fn default() -> Self {
        Self::with_builtins()
    }
}

impl NodeModelSet {
    /// Registry holding only the built-in models
    #[must_use]
    pub fn with_builtins() -> Self {
        Self {
            registered: builtin_models()
                .into_iter()
                .map(|m| (m.registration_id.clone(), m))
                .collect(),
            workspace: IndexMap::new(),
        }
    }

    /// Drop every custom and workspace model
    pub fn reset(&mut self) {
        *self = Self::with_builtins();
    }

    /// Register a model, replacing any custom model with the same id
    ///
    /// Returns the replaced model.
    ///
    /// # Errors
    /// - [`ModelError::InvalidId`] for empty ids
    /// - [`ModelError::Builtin`] when redefining a built-in with a different definition
    pub fn register(&mut self, model: NodeModel) -> Result<Option<NodeModel>, ModelError> {
        validate_id(&model.registration_id)?;
        if is_builtin(&model.registration_id) {
            return match self.registered.get(&model.registration_id) {
                Some(existing) if *existing == model => Ok(None),
                _ => Err(ModelError::Builtin(model.registration_id)),
            };
        }
        Ok(self.registered.insert(model.registration_id.clone(), model))
    }

    /// Remove a custom model
    ///
    /// # Errors
    /// Returns error if the id is built-in or unknown
    pub fn unregister(&mut self, id: &str) -> Result<NodeModel, ModelError> {
        if is_builtin(id) {
            return Err(ModelError::Builtin(id.to_string()));
        }
        self.registered
            .shift_remove(id)
            .ok_or_else(|| ModelError::Unknown(id.to_string()))
    }

    /// Rename a registered custom model, carrying workspace membership over
    ///
    /// # Errors
    /// Returns error if `prev` is unknown or built-in, or `new` is taken
    pub fn rename(&mut self, prev: &str, new: &str) -> Result<NodeModel, ModelError> {
        validate_id(new)?;
        if is_builtin(prev) {
            return Err(ModelError::Builtin(prev.to_string()));
        }
        if self.registered.contains_key(new) {
            return Err(ModelError::Duplicate(new.to_string()));
        }
        let index = self
            .registered
            .get_index_of(prev)
            .ok_or_else(|| ModelError::Unknown(prev.to_string()))?;

        let renamed = self.registered[index].renamed(new);
        self.registered.insert(new.to_string(), renamed.clone());
        let last = self.registered.len() - 1;
        self.registered.move_index(last, index);
        self.registered.shift_remove(prev);

        let in_workspace = self.workspace.shift_remove(prev).is_some();
        if in_workspace || self.workspace.contains_key(new) {
            self.workspace.insert(new.to_string(), renamed.clone());
        }
        Ok(renamed)
    }

    /// Registered model by id
    #[inline]
    #[must_use]
    pub fn get(&self, id: &str) -> Option<&NodeModel> {
        self.registered.get(id)
    }

    /// Check whether an id is registered
    #[inline]
    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.registered.contains_key(id)
    }

    /// Iterate over registered models in registration order
    pub fn iter(&self) -> impl Iterator<Item = &NodeModel> {
        self.registered.values()
    }

    /// Registered models that are not built-in
    pub fn custom_models(&self) -> impl Iterator<Item = &NodeModel> {
        self.registered
            .values()
            .filter(|m| !is_builtin(&m.registration_id))
    }

    /// Number of registered models, built-ins included
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.registered.len()
    }

    /// Always false: built-ins are registered from the start
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.registered.is_empty()
    }

    /// Add a model to the workspace partition (does not register it)
    pub fn add_to_workspace(&mut self, model: NodeModel) {
        self.workspace.insert(model.registration_id.clone(), model);
    }

    /// Remove a model from the workspace partition
    pub fn remove_from_workspace(&mut self, id: &str) -> Option<NodeModel> {
        self.workspace.shift_remove(id)
    }

    /// Workspace models in insertion order
    pub fn workspace(&self) -> impl Iterator<Item = &NodeModel> {
        self.workspace.values()
    }

    /// Check whether an id is part of the workspace
    #[inline]
    #[must_use]
    pub fn in_workspace(&self, id: &str) -> bool {
        self.workspace.contains_key(id)
    }

    /// Replace the workspace with `models` and register what is missing
    ///
    /// Models already registered with a different port set are reported as
    /// conflicts and resolved according to `policy`. Built-in ids are skipped.
    pub fn merge_workspace(
        &mut self,
        models: impl IntoIterator<Item = NodeModel>,
        policy: WorkspaceConflict,
    ) -> WorkspaceMergeReport {
        let mut report = WorkspaceMergeReport::default();
        self.workspace.clear();

        for model in models {
            let id = model.registration_id.clone();
            if is_builtin(&id) || validate_id(&id).is_err() {
                continue;
            }
            self.workspace.insert(id.clone(), model.clone());

            match self.registered.get(&id) {
                None => {
                    self.registered.insert(id.clone(), model);
                    report.added.push(id);
                }
                Some(local) if !local.same_port_names(&model) => {
                    report.conflicts.push(id.clone());
                    if policy == WorkspaceConflict::UseWorkspace {
                        self.registered.insert(id.clone(), model);
                        report.replaced.push(id);
                    }
                }
                Some(_) => {}
            }
        }
        report
    }
}

fn validate_id(id: &str) -> Result<(), ModelError> {
    if id.is_empty() || id.trim() != id {
        return Err(ModelError::InvalidId(id.to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kind::NodeKind;
    use crate::port::PortModel;

    fn action(id: &str) -> NodeModel {
        NodeModel::new(NodeKind::Action, id)
    }

    #[test]
    fn builtins_are_protected() {
        let mut set = NodeModelSet::with_builtins();
        assert!(set.contains("Sequence"));
        assert_eq!(set.unregister("Sequence"), Err(ModelError::Builtin("Sequence".into())));
        assert!(matches!(set.register(action("Sequence")), Err(ModelError::Builtin(_))));
        // identical re-registration is a no-op
        let root = set.get("Root").cloned().unwrap();
        assert_eq!(set.register(root), Ok(None));
    }

    #[test]
    fn register_replaces_and_returns_previous() {
        let mut set = NodeModelSet::with_builtins();
        assert_eq!(set.register(action("Open")), Ok(None));
        let updated = action("Open").with_port("door", PortModel::input());
        let prev = set.register(updated.clone()).unwrap();
        assert_eq!(prev, Some(action("Open")));
        assert_eq!(set.get("Open"), Some(&updated));
    }

    #[test]
    fn rejects_blank_ids() {
        let mut set = NodeModelSet::with_builtins();
        assert!(matches!(set.register(action("")), Err(ModelError::InvalidId(_))));
        assert!(matches!(set.register(action(" Open")), Err(ModelError::InvalidId(_))));
    }

    #[test]
    fn rename_keeps_position_and_workspace() {
        let mut set = NodeModelSet::with_builtins();
        set.register(action("A")).unwrap();
        set.register(action("B")).unwrap();
        set.add_to_workspace(action("A"));

        set.rename("A", "Z").unwrap();

        let custom: Vec<_> = set.custom_models().map(|m| m.registration_id.clone()).collect();
        assert_eq!(custom, vec!["Z", "B"]);
        assert!(set.in_workspace("Z"));
        assert!(!set.in_workspace("A"));
        assert_eq!(set.rename("Z", "B"), Err(ModelError::Duplicate("B".into())));
        assert_eq!(set.rename("Q", "R"), Err(ModelError::Unknown("Q".into())));
    }

    #[test]
    fn merge_workspace_reports_conflicts() {
        let mut set = NodeModelSet::with_builtins();
        set.register(action("Open").with_port("door", PortModel::input())).unwrap();

        let incoming = vec![
            action("Open").with_port("gate", PortModel::input()),
            action("Close"),
            action("Sequence"),
        ];
        let report = set.merge_workspace(incoming.clone(), WorkspaceConflict::KeepLocal);
        assert_eq!(report.added, vec!["Close".to_string()]);
        assert_eq!(report.conflicts, vec!["Open".to_string()]);
        assert!(report.replaced.is_empty());
        assert!(set.get("Open").unwrap().ports.contains_key("door"));
        assert_eq!(set.workspace().count(), 2);

        let report = set.merge_workspace(incoming, WorkspaceConflict::UseWorkspace);
        assert_eq!(report.replaced, vec!["Open".to_string()]);
        assert!(set.get("Open").unwrap().ports.contains_key("gate"));
    }

    #[test]
    fn reset_drops_custom_models() {
        let mut set = NodeModelSet::with_builtins();
        let builtin_count = set.len();
        set.register(action("Open")).unwrap();
        set.add_to_workspace(action("Open"));
        set.reset();
        assert_eq!(set.len(), builtin_count);
        assert_eq!(set.workspace().count(), 0);
    }
}
