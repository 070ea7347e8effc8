//! Observer notifications
//!
//! Outside a mutation scope notifications are delivered immediately. Inside
//! one they are buffered, then delivered once when the outermost scope
//! commits, or dropped when the scope that queued them aborts.

use std::fmt;
use treeforge_scene::{ExpansionState, NodeHandle};

/// What happened to a document
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocumentChange {
    /// New tab
    Created,
    /// Nodes or connections changed
    Edited,
    /// Renamed; the document is reported under its new name
    Renamed {
        /// Previous name
        from: String,
    },
    /// Tab closed
    Removed,
    /// Replaced by undo, redo or load
    Restored,
}

/// Change notification
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    /// A document was created, edited, renamed, removed or restored
    DocumentChanged {
        /// Document name after the change
        document: String,
        /// What happened
        change: DocumentChange,
    },
    /// A model was registered, replaced, renamed or removed
    ModelRegistryChanged {
        /// Registration id
        id: String,
    },
    /// A subtree reference switched state
    SubtreeExpansionChanged {
        /// Document holding the reference
        document: String,
        /// The reference node
        node: NodeHandle,
        /// State after the change
        state: ExpansionState,
    },
}

/// Receiver of [`Notification`]s
pub trait Observer {
    /// Called once per delivered notification
    fn notify(&mut self, notification: &Notification);
}

impl<F: FnMut(&Notification)> Observer for F {
    fn notify(&mut self, notification: &Notification) {
        self(notification);
    }
}

/// Observer list with scoped buffering
#[derive(Default)]
pub struct NotificationHub {
    observers: Vec<Box<dyn Observer>>,
    buffer: Vec<Notification>,
    marks: Vec<usize>,
}

impl fmt::Debug for NotificationHub {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NotificationHub")
            .field("observers", &self.observers.len())
            .field("buffered", &self.buffer.len())
            .field("depth", &self.marks.len())
            .finish()
    }
}

impl NotificationHub {
    /// Hub without observers
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an observer for every later notification
    pub fn subscribe(&mut self, observer: impl Observer + 'static) {
        self.observers.push(Box::new(observer));
    }

    /// Deliver now, or queue when inside a scope
    pub fn emit(&mut self, notification: Notification) {
        if self.marks.is_empty() {
            self.deliver(&notification);
        } else {
            self.buffer.push(notification);
        }
    }

    /// Open a scope
    pub fn begin(&mut self) {
        self.marks.push(self.buffer.len());
    }

    /// Close the innermost scope, keeping its notifications; the outermost
    /// commit delivers everything queued
    pub fn commit(&mut self) {
        self.marks.pop();
        if self.marks.is_empty() {
            let pending = std::mem::take(&mut self.buffer);
            for notification in &pending {
                self.deliver(notification);
            }
        }
    }

    /// Close the innermost scope, dropping what it queued
    pub fn abort(&mut self) {
        if let Some(mark) = self.marks.pop() {
            self.buffer.truncate(mark);
        }
    }

    /// Number of open scopes
    #[inline]
    #[must_use]
    pub fn depth(&self) -> usize {
        self.marks.len()
    }

    fn deliver(&mut self, notification: &Notification) {
        for observer in &mut self.observers {
            observer.notify(notification);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn recording_hub() -> (NotificationHub, Rc<RefCell<Vec<Notification>>>) {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        let mut hub = NotificationHub::new();
        hub.subscribe(move |n: &Notification| sink.borrow_mut().push(n.clone()));
        (hub, seen)
    }

    fn model_changed(id: &str) -> Notification {
        Notification::ModelRegistryChanged { id: id.into() }
    }

    #[test]
    fn delivers_immediately_outside_scopes() {
        let (mut hub, seen) = recording_hub();
        hub.emit(model_changed("A"));
        assert_eq!(seen.borrow().len(), 1);
    }

    #[test]
    fn outermost_commit_flushes_once() {
        let (mut hub, seen) = recording_hub();
        hub.begin();
        hub.emit(model_changed("A"));
        hub.begin();
        hub.emit(model_changed("B"));
        hub.commit();
        assert!(seen.borrow().is_empty());
        hub.commit();
        assert_eq!(*seen.borrow(), vec![model_changed("A"), model_changed("B")]);
        assert_eq!(hub.depth(), 0);
    }

    #[test]
    fn inner_abort_drops_only_inner_notices() {
        let (mut hub, seen) = recording_hub();
        hub.begin();
        hub.emit(model_changed("A"));
        hub.begin();
        hub.emit(model_changed("B"));
        hub.abort();
        hub.commit();
        assert_eq!(*seen.borrow(), vec![model_changed("A")]);
    }
}
