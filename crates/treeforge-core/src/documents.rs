//! Document and model lifecycle
//!
//! Creating, renaming and deleting documents keeps the model registry in
//! step: every document except the main one is referenceable through a
//! subtree model of the same name. Renames and deletions propagate to the
//! references in every other document, and clear the undo history.

use crate::context::EditorContext;
use crate::error::{EditorError, Result};
use crate::history::ViewState;
use crate::notify::DocumentChange;
use crate::subtree::{dissolve_references, refresh_dependents, retarget_references};
use treeforge_model::{is_builtin, ModelError, NodeModel};
use treeforge_scene::SceneAdapter;

impl<S: SceneAdapter> EditorContext<S> {
    /// Drop every document and custom model and start over with one empty
    /// main document
    ///
    /// Allowed in every mode. The history is reset and the set counts as
    /// saved.
    ///
    /// # Errors
    /// Returns error if the configured default name is not a valid
    /// document name
    pub fn reset(&mut self) -> Result<()> {
        self.transaction(|ctx| {
            let previous = ctx.registry.names();
            ctx.registry.clear();
            ctx.models.reset();
            ctx.registry.create(&ctx.config.default_tree_name)?;
            ctx.view = ViewState::default();

            for name in previous {
                ctx.emit_document(&name, DocumentChange::Removed);
            }
            let name = ctx.config.default_tree_name.clone();
            ctx.emit_document(&name, DocumentChange::Created);
            ctx.reset_history()?;
            ctx.saved = true;
            tracing::info!(document = %name, "document set reset");
            Ok(())
        })
    }

    /// Open a new document holding a single `Root` node
    ///
    /// Every document after the first gets a subtree model of the same name.
    ///
    /// # Errors
    /// - [`EditorError::NameConflict`] if a document or a non-subtree model
    ///   already uses the name
    /// - [`EditorError::InvalidName`] for blank names
    pub fn create_document(&mut self, name: &str) -> Result<()> {
        self.ensure_editable()?;
        self.transaction(|ctx| {
            if ctx.models.get(name).is_some_and(|m| !m.is_subtree()) {
                return Err(EditorError::NameConflict(name.to_string()));
            }
            let first = ctx.registry.is_empty();
            ctx.registry.create(name)?;
            if !first && !ctx.models.contains(name) {
                ctx.models.register(NodeModel::subtree(name))?;
                ctx.emit_model(name);
            }
            ctx.emit_document(name, DocumentChange::Created);
            tracing::info!(document = name, "document created");
            ctx.push_undo()
        })
    }

    /// Rename a document together with its subtree model and every
    /// reference to it
    ///
    /// # Errors
    /// - [`EditorError::DocumentNotFound`] if `old` does not exist
    /// - [`EditorError::NameConflict`] if `new` is taken by a document or a
    ///   non-subtree model
    pub fn rename_document(&mut self, old: &str, new: &str) -> Result<()> {
        self.ensure_editable()?;
        if old == new {
            return self.registry.get(old).map(|_| ());
        }
        self.transaction(|ctx| {
            ctx.registry.rename(old, new)?;

            let had_model = ctx.models.get(old).is_some_and(NodeModel::is_subtree);
            match ctx.models.get(new).map(NodeModel::is_subtree) {
                Some(false) => return Err(EditorError::NameConflict(new.to_string())),
                // dangling references to `new` now resolve
                Some(true) => {
                    if had_model {
                        ctx.models.unregister(old)?;
                    }
                }
                None => {
                    if had_model {
                        ctx.models.rename(old, new)?;
                    }
                }
            }

            let model = ctx
                .models
                .get(new)
                .cloned()
                .unwrap_or_else(|| NodeModel::subtree(new));
            let changed = retarget_references(&mut ctx.registry, old, &model);

            ctx.emit_document(
                new,
                DocumentChange::Renamed {
                    from: old.to_string(),
                },
            );
            if had_model {
                ctx.emit_model(old);
                ctx.emit_model(new);
            }
            for document in &changed {
                ctx.emit_document(document, DocumentChange::Edited);
            }
            tracing::info!(from = old, to = new, retargeted = changed.len(), "document renamed");
            ctx.reset_history()
        })
    }

    /// Close a document
    ///
    /// References to it elsewhere are replaced by the tree they stand for,
    /// and its subtree model is unregistered. Deleting the last document
    /// leaves a fresh empty one behind.
    ///
    /// # Errors
    /// Returns error if the document does not exist
    pub fn delete_document(&mut self, name: &str) -> Result<()> {
        self.ensure_editable()?;
        self.registry.get(name)?;
        self.transaction(|ctx| {
            let layout = ctx.config.layout.clone();
            let changed = dissolve_references(&mut ctx.registry, name, &layout)?;
            ctx.registry.remove(name)?;
            ctx.propagate(&changed)?;

            if ctx.models.get(name).is_some_and(NodeModel::is_subtree) {
                ctx.models.unregister(name)?;
                ctx.emit_model(name);
            }
            ctx.emit_document(name, DocumentChange::Removed);

            if ctx.registry.is_empty() {
                let fallback = ctx.config.default_tree_name.clone();
                ctx.registry.create(&fallback)?;
                ctx.emit_document(&fallback, DocumentChange::Created);
            }
            tracing::info!(document = name, dissolved_in = changed.len(), "document deleted");
            ctx.reset_history()
        })
    }

    /// Designate the main document
    ///
    /// The previous main document becomes referenceable.
    ///
    /// # Errors
    /// Returns error if the document does not exist
    pub fn set_main_document(&mut self, name: &str) -> Result<()> {
        self.ensure_editable()?;
        self.transaction(|ctx| {
            let previous = ctx.registry.main_name().map(str::to_string);
            ctx.registry.set_main(name)?;
            if let Some(previous) = previous.filter(|p| p != name) {
                if !ctx.models.contains(&previous) {
                    ctx.models.register(NodeModel::subtree(previous.as_str()))?;
                    ctx.emit_model(&previous);
                }
                ctx.emit_document(&previous, DocumentChange::Edited);
            }
            ctx.emit_document(name, DocumentChange::Edited);
            ctx.push_undo()
        })
    }

    /// Register a model, or redefine a custom one
    ///
    /// Instances of a redefined model are updated in every document; their
    /// mappings survive for ports the new definition keeps.
    ///
    /// # Errors
    /// - [`EditorError::Model`] for invalid ids and built-in redefinitions
    /// - [`EditorError::ModelInUse`] when changing the kind of a model that
    ///   has instances
    pub fn register_model(&mut self, model: NodeModel) -> Result<()> {
        self.ensure_editable()?;
        if let Some(existing) = self.models.get(&model.registration_id) {
            if existing.kind != model.kind {
                if let Some(document) = self.model_user(&model.registration_id) {
                    return Err(EditorError::ModelInUse {
                        model: model.registration_id.clone(),
                        document,
                    });
                }
            }
        }
        self.transaction(|ctx| {
            let id = model.registration_id.clone();
            let replaced = ctx.models.register(model.clone())?;
            if replaced.is_some_and(|previous| previous != model) {
                let changed = ctx.substitute(&id, &model);
                ctx.propagate(&changed)?;
            }
            ctx.emit_model(&id);
            tracing::debug!(model = %id, "model registered");
            ctx.push_undo()
        })
    }

    /// Unregister a custom model
    ///
    /// Removing the subtree model of an open document deletes that
    /// document.
    ///
    /// # Errors
    /// - [`EditorError::Model`] for built-in models
    /// - [`EditorError::UnknownModel`] for unregistered ids
    /// - [`EditorError::ModelInUse`] while instances remain
    pub fn remove_model(&mut self, id: &str) -> Result<()> {
        self.ensure_editable()?;
        if is_builtin(id) {
            return Err(ModelError::Builtin(id.to_string()).into());
        }
        let model = self
            .models
            .get(id)
            .ok_or_else(|| EditorError::UnknownModel(id.to_string()))?;
        if model.is_subtree() && self.registry.contains(id) {
            return self.delete_document(id);
        }
        if let Some(document) = self.model_user(id) {
            return Err(EditorError::ModelInUse {
                model: id.to_string(),
                document,
            });
        }
        self.transaction(|ctx| {
            ctx.models.unregister(id)?;
            ctx.models.remove_from_workspace(id);
            ctx.emit_model(id);
            tracing::debug!(model = id, "model removed");
            ctx.reset_history()
        })
    }

    /// Rename a custom model and all of its instances
    ///
    /// Renaming the subtree model of an open document renames the document.
    ///
    /// # Errors
    /// - [`EditorError::Model`] for built-in, unknown or taken ids
    /// - [`EditorError::NameConflict`] when a document already uses `new`
    pub fn rename_model(&mut self, prev: &str, new: &str) -> Result<()> {
        self.ensure_editable()?;
        let is_document = self
            .models
            .get(prev)
            .is_some_and(|m| m.is_subtree() && self.registry.contains(prev));
        if is_document {
            return self.rename_document(prev, new);
        }
        if self.registry.contains(new) {
            return Err(EditorError::NameConflict(new.to_string()));
        }
        self.transaction(|ctx| {
            let renamed = ctx.models.rename(prev, new)?;
            let changed = if renamed.is_subtree() {
                retarget_references(&mut ctx.registry, prev, &renamed)
            } else {
                ctx.substitute(prev, &renamed)
            };
            ctx.propagate(&changed)?;
            ctx.emit_model(prev);
            ctx.emit_model(new);
            tracing::info!(from = prev, to = new, "model renamed");
            ctx.reset_history()
        })
    }

    /// First document with an instance of `id`
    fn model_user(&self, id: &str) -> Option<String> {
        self.registry
            .iter()
            .find(|document| {
                let scene = document.scene();
                scene
                    .nodes()
                    .into_iter()
                    .any(|h| scene.node(h).is_some_and(|n| n.registration_id() == id))
            })
            .map(|document| document.name().to_string())
    }

    /// Swap the model of every instance of `id`, locked ones included;
    /// returns the documents that changed
    pub(crate) fn substitute(&mut self, id: &str, model: &NodeModel) -> Vec<String> {
        let mut changed = Vec::new();
        for document in self.registry.iter_mut() {
            let scene = document.scene_mut();
            let mut touched = false;
            for handle in scene.nodes() {
                if let Some(node) = scene.node_mut(handle) {
                    if node.registration_id() == id {
                        node.substitute_model(model.clone());
                        touched = true;
                    }
                }
            }
            if touched {
                changed.push(document.name().to_string());
            }
        }
        changed
    }

    /// Refresh the inlined copies of each changed document and report it
    pub(crate) fn propagate(&mut self, changed: &[String]) -> Result<()> {
        let layout = self.config.layout.clone();
        for document in changed {
            for change in refresh_dependents(&mut self.registry, document, &layout)? {
                self.emit(change);
            }
            self.emit_document(document, DocumentChange::Edited);
        }
        Ok(())
    }
}
