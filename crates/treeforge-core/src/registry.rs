//! Document registry
//!
//! Owns the open documents (tabs) in tab order, the main-tree designation and
//! the active tab.
//!
//! # Invariants
//! - Document names are unique
//! - Exactly one document is main while any exist

use crate::error::{EditorError, Result};
use indexmap::IndexMap;
use treeforge_model::{NodeKind, NodeModel, ROOT_MODEL_ID};
use treeforge_scene::{Point, SceneAdapter};

/// One open document
#[derive(Debug, Clone)]
pub struct Document<S> {
    name: String,
    scene: S,
    is_main: bool,
}

impl<S: SceneAdapter> Document<S> {
    /// Unique tab name
    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Scene holding the document's graph
    #[inline]
    #[must_use]
    pub fn scene(&self) -> &S {
        &self.scene
    }

    /// Mutable scene access
    #[inline]
    pub fn scene_mut(&mut self) -> &mut S {
        &mut self.scene
    }

    /// Whether this is the main document
    #[inline]
    #[must_use]
    pub fn is_main(&self) -> bool {
        self.is_main
    }
}

/// Open documents in tab order
#[derive(Debug, Clone)]
pub struct DocumentRegistry<S> {
    documents: IndexMap<String, Document<S>>,
    active: Option<String>,
}

impl<S> Default for DocumentRegistry<S> {
    fn default() -> Self {
        Self {
            documents: IndexMap::new(),
            active: None,
        }
    }
}

impl<S: SceneAdapter> DocumentRegistry<S> {
    /// Empty registry
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a document holding a single `Root` node
    ///
    /// The first document becomes main and active.
    ///
    /// # Errors
    /// - [`EditorError::InvalidName`] for blank names
    /// - [`EditorError::NameConflict`] when the name is taken
    pub fn create(&mut self, name: &str) -> Result<&mut Document<S>> {
        let mut scene = S::default();
        scene.create_node(NodeModel::new(NodeKind::Root, ROOT_MODEL_ID), Point::default());
        self.insert(name, scene)
    }

    /// Add a document with an existing scene
    ///
    /// # Errors
    /// Same as [`Self::create`]
    pub fn insert(&mut self, name: &str, scene: S) -> Result<&mut Document<S>> {
        validate_name(name)?;
        if self.documents.contains_key(name) {
            return Err(EditorError::NameConflict(name.to_string()));
        }

        let first = self.documents.is_empty();
        if first {
            self.active = Some(name.to_string());
        }
        let entry = self.documents.entry(name.to_string());
        Ok(entry.or_insert(Document {
            name: name.to_string(),
            scene,
            is_main: first,
        }))
    }

    /// Rename a document in place, keeping its tab position
    ///
    /// # Errors
    /// Returns error if `old` is unknown or `new` is blank or taken
    pub fn rename(&mut self, old: &str, new: &str) -> Result<()> {
        validate_name(new)?;
        if old == new {
            return self.get(old).map(|_| ());
        }
        if self.documents.contains_key(new) {
            return Err(EditorError::NameConflict(new.to_string()));
        }
        let (index, _, mut document) = self
            .documents
            .shift_remove_full(old)
            .ok_or_else(|| EditorError::DocumentNotFound(old.to_string()))?;

        document.name = new.to_string();
        self.documents.shift_insert(index, new.to_string(), document);
        if self.active.as_deref() == Some(old) {
            self.active = Some(new.to_string());
        }
        Ok(())
    }

    /// Remove a document
    ///
    /// A lone survivor becomes main; when the main document goes, the first
    /// remaining one takes over.
    ///
    /// # Errors
    /// Returns error if the document does not exist
    pub fn remove(&mut self, name: &str) -> Result<Document<S>> {
        let removed = self
            .documents
            .shift_remove(name)
            .ok_or_else(|| EditorError::DocumentNotFound(name.to_string()))?;

        if removed.is_main || self.documents.len() == 1 {
            if let Some((first, _)) = self.documents.first() {
                let first = first.clone();
                self.set_main(&first)?;
            }
        }
        if self.active.as_deref() == Some(name) {
            self.active = self.main_name().map(str::to_string);
        }
        Ok(removed)
    }

    /// Designate the main document, clearing the flag elsewhere
    ///
    /// # Errors
    /// Returns error if the document does not exist
    pub fn set_main(&mut self, name: &str) -> Result<()> {
        if !self.documents.contains_key(name) {
            return Err(EditorError::DocumentNotFound(name.to_string()));
        }
        for (key, document) in &mut self.documents {
            document.is_main = key == name;
        }
        Ok(())
    }

    /// Select the active tab
    ///
    /// # Errors
    /// Returns error if the document does not exist
    pub fn set_active(&mut self, name: &str) -> Result<()> {
        if !self.documents.contains_key(name) {
            return Err(EditorError::DocumentNotFound(name.to_string()));
        }
        self.active = Some(name.to_string());
        Ok(())
    }

    /// Remove every document
    pub fn clear(&mut self) {
        self.documents.clear();
        self.active = None;
    }

    /// Look up a document
    ///
    /// # Errors
    /// Returns error if the document does not exist
    pub fn get(&self, name: &str) -> Result<&Document<S>> {
        self.documents
            .get(name)
            .ok_or_else(|| EditorError::DocumentNotFound(name.to_string()))
    }

    /// Look up a document for mutation
    ///
    /// # Errors
    /// Returns error if the document does not exist
    pub fn get_mut(&mut self, name: &str) -> Result<&mut Document<S>> {
        self.documents
            .get_mut(name)
            .ok_or_else(|| EditorError::DocumentNotFound(name.to_string()))
    }

    /// Check whether a document with this name is open
    #[inline]
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.documents.contains_key(name)
    }

    /// Name of the main document
    #[must_use]
    pub fn main_name(&self) -> Option<&str> {
        self.documents
            .values()
            .find(|d| d.is_main)
            .map(|d| d.name.as_str())
    }

    /// Name of the active tab
    #[inline]
    #[must_use]
    pub fn active_name(&self) -> Option<&str> {
        self.active.as_deref()
    }

    /// Document names in tab order
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        self.documents.keys().cloned().collect()
    }

    /// Documents in tab order
    pub fn iter(&self) -> impl Iterator<Item = &Document<S>> {
        self.documents.values()
    }

    /// Documents in tab order, mutably
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Document<S>> {
        self.documents.values_mut()
    }

    /// Number of open documents
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.documents.len()
    }

    /// Whether no documents are open
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}

pub(crate) fn validate_name(name: &str) -> Result<()> {
    if name.is_empty() || name.trim() != name {
        return Err(EditorError::InvalidName(name.to_string()));
    }
    Ok(())
}
