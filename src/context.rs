//! Resolution context and the deferred work list.
//!
//! A [`Context`] is the ambient state threaded through one `process` call
//! tree: the path accumulated while descending into object keys and array
//! indices, plus (only under a [`ConfigLoader`](crate::ConfigLoader)) a
//! handle to the value sources and the shared [`DeferredWorkList`].

use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::Value;

use crate::host::Host;
use crate::structure::Structure;

/// Ambient state for a single validation call tree.
///
/// Contexts are append-only: descending into a child creates a new
/// context with one more path segment, leaving the parent untouched.
/// A fresh context is created per top-level `process` call and discarded
/// when it completes.
#[derive(Clone, Default)]
pub struct Context {
    path: Vec<String>,
    host: Option<Arc<dyn Host>>,
    deferred: Option<DeferredWorkList>,
}

impl Context {
    /// Creates an immediate-mode context: no value sources, no deferred
    /// work list. `external` structures fail under this context.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates the root context for a loader-driven resolution.
    pub(crate) fn for_load(host: Arc<dyn Host>, deferred: DeferredWorkList) -> Self {
        Self {
            path: Vec::new(),
            host: Some(host),
            deferred: Some(deferred),
        }
    }

    /// Recreates a loader context at a recorded path, used when a
    /// deferred task resumes validation of an external sub-tree.
    pub(crate) fn resume(
        host: Arc<dyn Host>,
        deferred: DeferredWorkList,
        path: Vec<String>,
    ) -> Self {
        Self {
            path,
            host: Some(host),
            deferred: Some(deferred),
        }
    }

    /// Returns a child context with `segment` appended to the path.
    #[must_use]
    pub fn child(&self, segment: impl Into<String>) -> Self {
        let mut path = self.path.clone();
        path.push(segment.into());
        Self {
            path,
            host: self.host.clone(),
            deferred: self.deferred.clone(),
        }
    }

    /// Returns the accumulated path segments.
    #[must_use]
    pub fn path(&self) -> &[String] {
        &self.path
    }

    /// Returns the path with `segment` appended, without descending.
    pub(crate) fn path_to(&self, segment: &str) -> Vec<String> {
        let mut path = self.path.clone();
        path.push(segment.to_string());
        path
    }

    /// Returns the dot-joined path, or `"."` at the root.
    #[must_use]
    pub fn dotted_path(&self) -> String {
        if self.path.is_empty() {
            ".".to_string()
        } else {
            self.path.join(".")
        }
    }

    pub(crate) fn host(&self) -> Option<&Arc<dyn Host>> {
        self.host.as_ref()
    }

    pub(crate) fn deferred(&self) -> Option<&DeferredWorkList> {
        self.deferred.as_ref()
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("path", &self.path)
            .field("has_host", &self.host.is_some())
            .field("deferred", &self.deferred.is_some())
            .finish()
    }
}

/// One pending piece of deferred work: an `external` sub-tree waiting to
/// be read, validated at its recorded path, and merged into the result.
pub(crate) struct DeferredTask {
    /// Where in the result tree the resolved value belongs.
    pub path: Vec<String>,
    /// The source name to read.
    pub source: String,
    /// The structure the external document must satisfy.
    pub structure: Arc<Structure>,
    /// The inline value found at this position in the main document,
    /// used when the external source does not exist.
    pub inline: Option<Value>,
}

/// A shared worklist of pending deferred tasks.
///
/// Owned by a single `load` call. Tasks are taken exactly once, and the
/// drain loop in the loader re-checks until the list is truly empty, so a
/// task that enqueues further work (a nested `external`) is never missed.
#[derive(Clone, Default)]
pub struct DeferredWorkList {
    tasks: Arc<Mutex<VecDeque<DeferredTask>>>,
}

impl DeferredWorkList {
    /// Creates an empty worklist.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push(&self, task: DeferredTask) {
        self.tasks.lock().push_back(task);
    }

    pub(crate) fn pop(&self) -> Option<DeferredTask> {
        self.tasks.lock().pop_front()
    }

    /// Returns the number of pending tasks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tasks.lock().len()
    }

    /// Returns whether no tasks are pending.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tasks.lock().is_empty()
    }
}

impl fmt::Debug for DeferredWorkList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeferredWorkList")
            .field("pending", &self.len())
            .finish()
    }
}
