//! Editor context
//!
//! [`EditorContext`] is the one explicit owner of the editor state: document
//! registry, model registry, undo history, observers and configuration.
//! Every operation that changes documents runs inside
//! [`EditorContext::transaction`], so it either commits completely (pushing
//! an undo snapshot and delivering its notifications once) or leaves no
//! trace at all.
//!
//! # Example
//!
//! ```rust,ignore
//! use treeforge_core::{EditorConfig, EditorContext};
//! use treeforge_scene::Point;
//!
//! let mut ctx = EditorContext::new(EditorConfig::default())?;
//! let root = ctx.document("BehaviorTree")?.scene().nodes()[0];
//! let seq = ctx.add_node("BehaviorTree", "Sequence", Point::default())?;
//! ctx.connect("BehaviorTree", root, seq)?;
//! ctx.undo()?;
//! ```

use crate::config::{EditorConfig, EditorMode};
use crate::error::{EditorError, Result};
use crate::history::{History, Snapshot, ViewState};
use crate::notify::{DocumentChange, Notification, NotificationHub, Observer};
use crate::registry::{Document, DocumentRegistry};
use crate::subtree::refresh_dependents;
use treeforge_model::NodeModelSet;
use treeforge_scene::{FlowScene, SceneAdapter};

/// Owner of the whole editor state
#[derive(Debug)]
pub struct EditorContext<S: SceneAdapter = FlowScene> {
    pub(crate) config: EditorConfig,
    pub(crate) registry: DocumentRegistry<S>,
    pub(crate) models: NodeModelSet,
    pub(crate) history: History,
    pub(crate) hub: NotificationHub,
    pub(crate) view: ViewState,
    pub(crate) saved: bool,
}

/// State restored when a transaction fails
struct Checkpoint<S> {
    registry: DocumentRegistry<S>,
    models: NodeModelSet,
    history: History,
    view: ViewState,
    saved: bool,
}

/// An open mutation scope; dropping it without [`Scope::commit`], on an
/// error return or while unwinding, rolls back and aborts the scope
struct Scope<'a, S: SceneAdapter> {
    ctx: &'a mut EditorContext<S>,
    checkpoint: Option<Checkpoint<S>>,
}

impl<'a, S: SceneAdapter> Scope<'a, S> {
    fn open(ctx: &'a mut EditorContext<S>) -> Self {
        let checkpoint = Checkpoint {
            registry: ctx.registry.clone(),
            models: ctx.models.clone(),
            history: ctx.history.clone(),
            view: ctx.view,
            saved: ctx.saved,
        };
        ctx.hub.begin();
        Self {
            ctx,
            checkpoint: Some(checkpoint),
        }
    }

    fn commit(mut self) {
        self.checkpoint = None;
        self.ctx.hub.commit();
    }
}

impl<S: SceneAdapter> Drop for Scope<'_, S> {
    fn drop(&mut self) {
        let Some(checkpoint) = self.checkpoint.take() else {
            return;
        };
        self.ctx.registry = checkpoint.registry;
        self.ctx.models = checkpoint.models;
        self.ctx.history = checkpoint.history;
        self.ctx.view = checkpoint.view;
        self.ctx.saved = checkpoint.saved;
        self.ctx.hub.abort();
    }
}

impl<S: SceneAdapter> EditorContext<S> {
    /// Context with one empty main document named after
    /// `config.default_tree_name`
    ///
    /// # Errors
    /// Returns error if the configuration is invalid
    pub fn new(config: EditorConfig) -> Result<Self> {
        config.validate()?;
        let mut ctx = Self {
            history: History::new(config.history_limit),
            config,
            registry: DocumentRegistry::new(),
            models: NodeModelSet::with_builtins(),
            hub: NotificationHub::new(),
            view: ViewState::default(),
            saved: true,
        };
        ctx.reset()?;
        Ok(ctx)
    }

    /// Active configuration
    #[inline]
    #[must_use]
    pub fn config(&self) -> &EditorConfig {
        &self.config
    }

    /// Current mode
    #[inline]
    #[must_use]
    pub fn mode(&self) -> EditorMode {
        self.config.mode
    }

    /// Switch between editing and read-only modes
    pub fn set_mode(&mut self, mode: EditorMode) {
        if self.config.mode != mode {
            tracing::info!(from = ?self.config.mode, to = ?mode, "editor mode changed");
            self.config.mode = mode;
        }
    }

    /// Open documents
    #[inline]
    #[must_use]
    pub fn registry(&self) -> &DocumentRegistry<S> {
        &self.registry
    }

    /// Look up an open document
    ///
    /// # Errors
    /// Returns error if the document does not exist
    pub fn document(&self, name: &str) -> Result<&Document<S>> {
        self.registry.get(name)
    }

    /// Registered and workspace models
    #[inline]
    #[must_use]
    pub fn models(&self) -> &NodeModelSet {
        &self.models
    }

    /// Undo/redo stacks
    #[inline]
    #[must_use]
    pub fn history(&self) -> &History {
        &self.history
    }

    /// Current view transform and area
    #[inline]
    #[must_use]
    pub fn view(&self) -> ViewState {
        self.view
    }

    /// Record the current canvas view; it is captured by the next snapshot
    pub fn set_view(&mut self, view: ViewState) {
        self.view = view;
    }

    /// Register an observer
    pub fn subscribe(&mut self, observer: impl Observer + 'static) {
        self.hub.subscribe(observer);
    }

    /// False after any committed change not yet saved
    #[inline]
    #[must_use]
    pub fn is_saved(&self) -> bool {
        self.saved
    }

    /// Called by the host after writing the document set
    pub fn mark_saved(&mut self) {
        self.saved = true;
    }

    /// Whether undo would do anything
    #[must_use]
    pub fn can_undo(&self) -> bool {
        self.config.mode.allows_editing() && self.history.can_undo()
    }

    /// Whether redo would do anything
    #[must_use]
    pub fn can_redo(&self) -> bool {
        self.config.mode.allows_editing() && self.history.can_redo()
    }

    /// Run `operation` as one mutation scope
    ///
    /// Notifications queued inside are delivered once when the outermost
    /// scope commits. On error, or when `operation` panics, the document
    /// set, model registry, history and view are rolled back to their state
    /// at scope entry and the scope's notifications are dropped. Scopes nest.
    ///
    /// # Errors
    /// Returns the error of `operation`
    pub fn transaction<T>(&mut self, operation: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        let mut scope = Scope::open(self);
        match operation(&mut *scope.ctx) {
            Ok(value) => {
                scope.commit();
                Ok(value)
            }
            Err(err) => {
                tracing::debug!(error = %err, depth = scope.ctx.hub.depth(), "rolling back mutation scope");
                drop(scope);
                Err(err)
            }
        }
    }

    /// Restore the previous snapshot
    ///
    /// Returns `false` when there is nothing to undo or the mode is not
    /// [`EditorMode::Editor`].
    ///
    /// # Errors
    /// Returns error if a snapshot blob cannot be decoded; nothing changes
    pub fn undo(&mut self) -> Result<bool> {
        if !self.config.mode.allows_editing() {
            return Ok(false);
        }
        let Some(target) = self.history.undo_target().cloned() else {
            return Ok(false);
        };
        self.transaction(|ctx| ctx.restore(&target))?;
        self.history.undo();
        self.saved = false;
        tracing::info!(remaining = self.history.undo_len(), "undo");
        Ok(true)
    }

    /// Re-apply the snapshot undone last
    ///
    /// # Errors
    /// Returns error if a snapshot blob cannot be decoded; nothing changes
    pub fn redo(&mut self) -> Result<bool> {
        if !self.config.mode.allows_editing() {
            return Ok(false);
        }
        let Some(target) = self.history.redo_target().cloned() else {
            return Ok(false);
        };
        self.transaction(|ctx| ctx.restore(&target))?;
        self.history.redo();
        self.saved = false;
        tracing::info!(remaining = self.history.redo_len(), "redo");
        Ok(true)
    }

    /// Capture every document's scene
    ///
    /// # Errors
    /// Returns error if a scene cannot be encoded
    pub fn snapshot(&self) -> Result<Snapshot> {
        let mut tabs = indexmap::IndexMap::with_capacity(self.registry.len());
        for document in self.registry.iter() {
            tabs.insert(document.name().to_string(), document.scene().save_to_memory()?);
        }
        Ok(Snapshot {
            main_tree_name: self.registry.main_name().map(str::to_string),
            active_tab_name: self.registry.active_name().map(str::to_string),
            view: self.view,
            tabs,
        })
    }

    /// Replace the document set with `snapshot`
    ///
    /// Every blob is decoded before anything is replaced.
    fn restore(&mut self, snapshot: &Snapshot) -> Result<()> {
        let mut scenes = Vec::with_capacity(snapshot.tabs.len());
        for (name, blob) in &snapshot.tabs {
            let mut scene = S::default();
            scene.load_from_memory(blob)?;
            scenes.push((name.as_str(), scene));
        }

        let mut registry = DocumentRegistry::new();
        for (name, scene) in scenes {
            registry.insert(name, scene)?;
        }
        if let Some(main) = snapshot.main_tree_name.as_deref().filter(|m| registry.contains(m)) {
            registry.set_main(main)?;
        }
        if let Some(active) = snapshot.active_tab_name.as_deref().filter(|a| registry.contains(a)) {
            registry.set_active(active)?;
        }

        let previous = std::mem::replace(&mut self.registry, registry);
        self.view = snapshot.view;

        for name in previous.names() {
            if !self.registry.contains(&name) {
                self.emit_document(&name, DocumentChange::Removed);
            }
        }
        for name in self.registry.names() {
            self.emit_document(&name, DocumentChange::Restored);
        }
        Ok(())
    }

    pub(crate) fn ensure_editable(&self) -> Result<()> {
        if self.config.mode.allows_editing() {
            Ok(())
        } else {
            Err(EditorError::ReadOnlyMode(self.config.mode))
        }
    }

    pub(crate) fn emit(&mut self, notification: Notification) {
        self.hub.emit(notification);
    }

    pub(crate) fn emit_document(&mut self, document: &str, change: DocumentChange) {
        self.hub.emit(Notification::DocumentChanged {
            document: document.to_string(),
            change,
        });
    }

    pub(crate) fn emit_model(&mut self, id: &str) {
        self.hub.emit(Notification::ModelRegistryChanged { id: id.to_string() });
    }

    /// Capture and push; marks the set unsaved when the state changed
    pub(crate) fn push_undo(&mut self) -> Result<()> {
        let snapshot = self.snapshot()?;
        if self.history.push(snapshot) {
            self.saved = false;
            tracing::trace!(depth = self.history.undo_len(), "pushed undo snapshot");
        }
        Ok(())
    }

    /// Drop both stacks and seed them with the current state
    pub(crate) fn reset_history(&mut self) -> Result<()> {
        let snapshot = self.snapshot()?;
        self.history.reset_to(snapshot);
        tracing::debug!("history cleared");
        Ok(())
    }

    /// Finish an edit of `document`: refresh every inlined copy of it, notify
    /// and push a snapshot
    pub(crate) fn commit_edit(&mut self, document: &str) -> Result<()> {
        let changes = refresh_dependents(&mut self.registry, document, &self.config.layout)?;
        for change in changes {
            self.emit(change);
        }
        self.emit_document(document, DocumentChange::Edited);
        self.push_undo()
    }
}
