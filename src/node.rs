//! Handle to one node of the preference tree.

use crate::error::{Error, Result};
use crate::sync::Shared;
use crate::tree::{Leaf, NodeId, ROOT};
use std::sync::Arc;

/// A node in the preference tree: string keys plus named child nodes.
///
/// Handles are cheap to clone and compare equal when they point at the same
/// node of the same store. Every mutation writes the whole document to disk
/// unless the store was built with [`FlushPolicy::Manual`](crate::FlushPolicy).
///
/// ```rust,no_run
/// use json_prefs::PrefStore;
///
/// let store = PrefStore::open("settings.json").unwrap();
/// let window = store.root().child("window").unwrap();
/// window.put("width", "800").unwrap();
/// assert_eq!(window.get_or("width", "640").unwrap(), "800");
/// ```
#[derive(Clone)]
pub struct Node {
    shared: Arc<Shared>,
    id: NodeId,
    // Kept on the handle: the arena slot may belong to another node once
    // this one is removed.
    path: Arc<str>,
    parent: Option<Arc<Node>>,
}

impl Node {
    pub(crate) fn root(shared: Arc<Shared>) -> Self {
        Self {
            shared,
            id: ROOT,
            path: Arc::from("/"),
            parent: None,
        }
    }

    fn child_at(&self, id: NodeId, path: String) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
            id,
            path: Arc::from(path),
            parent: Some(Arc::new(self.clone())),
        }
    }

    /// Errors about this node carry the handle's own path.
    fn own(&self, err: Error) -> Error {
        match err {
            Error::NodeRemoved { .. } => Error::NodeRemoved {
                path: self.path.to_string(),
            },
            other => other,
        }
    }

    // ---- identity ----

    /// Name of this node among its siblings; empty for the root.
    #[must_use]
    pub fn name(&self) -> String {
        match self.path.rsplit_once('/') {
            Some((_, name)) => name.to_string(),
            None => String::new(),
        }
    }

    /// `/` for the root, `/window/editor` below it.
    #[must_use]
    pub fn absolute_path(&self) -> String {
        self.path.to_string()
    }

    /// The owning node, `None` for the root.
    #[must_use]
    pub fn parent(&self) -> Option<Node> {
        self.parent.as_deref().cloned()
    }

    /// `true` for the root node.
    #[must_use]
    pub fn is_root(&self) -> bool {
        self.id == ROOT
    }

    /// `true` once this node or an ancestor was removed.
    #[must_use]
    pub fn is_removed(&self) -> bool {
        self.shared.tree.read().is_removed(self.id)
    }

    // ---- reads ----

    /// The string stored under `key`, or `None` if absent or list-valued.
    pub fn get(&self, key: &str) -> Result<Option<String>> {
        match self.shared.tree.read().get(self.id, key).map_err(|e| self.own(e))? {
            Some(Leaf::Text(value)) => Ok(Some(value)),
            _ => Ok(None),
        }
    }

    /// The string stored under `key`, or `default`.
    pub fn get_or(&self, key: &str, default: &str) -> Result<String> {
        Ok(self.get(key)?.unwrap_or_else(|| default.to_string()))
    }

    /// The list stored under `key`. Missing or non-list keys give an empty
    /// list.
    pub fn get_list(&self, key: &str) -> Result<Vec<String>> {
        match self.shared.tree.read().get(self.id, key).map_err(|e| self.own(e))? {
            Some(Leaf::List(values)) => Ok(values),
            _ => Ok(Vec::new()),
        }
    }

    /// `key` parsed as a boolean (`true`/`false`, any case), or `default`.
    pub fn get_bool(&self, key: &str, default: bool) -> Result<bool> {
        Ok(match self.get(key)? {
            Some(v) if v.eq_ignore_ascii_case("true") => true,
            Some(v) if v.eq_ignore_ascii_case("false") => false,
            _ => default,
        })
    }

    /// `key` parsed as an integer, or `default` if absent or unparsable.
    pub fn get_i64(&self, key: &str, default: i64) -> Result<i64> {
        Ok(self
            .get(key)?
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(default))
    }

    /// `key` parsed as a float, or `default` if absent or unparsable.
    pub fn get_f64(&self, key: &str, default: f64) -> Result<f64> {
        Ok(self
            .get(key)?
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(default))
    }

    /// Names of all leaf keys on this node, lists included.
    pub fn keys(&self) -> Result<Vec<String>> {
        self.shared.tree.read().keys(self.id).map_err(|e| self.own(e))
    }

    /// Names of all child nodes.
    pub fn child_names(&self) -> Result<Vec<String>> {
        self.shared.tree.read().child_names(self.id).map_err(|e| self.own(e))
    }

    /// `true` if a child called `name` currently exists. Does not create it.
    pub fn node_exists(&self, name: &str) -> Result<bool> {
        Ok(self.shared.tree.read().find_child(self.id, name).map_err(|e| self.own(e))?.is_some())
    }

    // ---- writes ----

    /// Store `value` under `key`.
    ///
    /// Fails with [`Error::Conflict`] when `key` is the name of a child node;
    /// the child is left untouched.
    pub fn put(&self, key: &str, value: impl Into<String>) -> Result<()> {
        self.store_leaf(key, Leaf::Text(value.into()))
    }

    /// Store an ordered list of strings under `key`.
    pub fn put_list<I, S>(&self, key: &str, values: I) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let values = values.into_iter().map(Into::into).collect();
        self.store_leaf(key, Leaf::List(values))
    }

    /// Store a boolean as `"true"` / `"false"`.
    pub fn put_bool(&self, key: &str, value: bool) -> Result<()> {
        self.put(key, value.to_string())
    }

    /// Store an integer as its decimal text.
    pub fn put_i64(&self, key: &str, value: i64) -> Result<()> {
        self.put(key, value.to_string())
    }

    /// Store a float as its shortest round-tripping text.
    pub fn put_f64(&self, key: &str, value: f64) -> Result<()> {
        self.put(key, value.to_string())
    }

    fn store_leaf(&self, key: &str, leaf: Leaf) -> Result<()> {
        self.shared.tree.write().put(self.id, key, leaf).map_err(|e| self.own(e))?;
        self.shared.after_mutation()
    }

    /// Delete `key`. Missing keys are fine; the document is flushed either way.
    pub fn remove(&self, key: &str) -> Result<()> {
        self.shared.tree.write().remove_key(self.id, key).map_err(|e| self.own(e))?;
        self.shared.after_mutation()
    }

    /// Delete every leaf key on this node. Children are kept.
    pub fn clear(&self) -> Result<()> {
        self.shared.tree.write().clear_keys(self.id).map_err(|e| self.own(e))?;
        self.shared.after_mutation()
    }

    // ---- children ----

    /// The child called `name`, created (empty) on first access.
    ///
    /// A new child is linked into the document right away, so it shows up on
    /// the next flush even before any key is written to it. Repeated calls
    /// return the same node.
    pub fn child(&self, name: &str) -> Result<Node> {
        let mut tree = self.shared.tree.write();
        let id = tree.child(self.id, name).map_err(|e| self.own(e))?;
        Ok(self.child_at(id, tree.path(id)))
    }

    /// Walk a `/`-separated path, creating nodes along the way. A leading `/`
    /// starts from the root.
    pub fn node(&self, path: &str) -> Result<Node> {
        let (mut cur, rest) = match path.strip_prefix('/') {
            Some(rest) => (Self::root(Arc::clone(&self.shared)), rest),
            None => (self.clone(), path),
        };
        if rest.is_empty() {
            return Ok(cur);
        }
        for segment in rest.split('/') {
            cur = cur.child(segment)?;
        }
        Ok(cur)
    }

    /// Detach this node from its parent and mark it and everything below it
    /// removed, then flush.
    ///
    /// Calling it again is a no-op. The root can't be removed.
    pub fn remove_node(&self) -> Result<()> {
        let detached = self.shared.tree.write().remove_node(self.id)?;
        if detached {
            self.shared.after_mutation()?;
        }
        Ok(())
    }

    // ---- persistence ----

    /// Write the whole document to disk, whichever node it is called on.
    pub fn flush(&self) -> Result<()> {
        if self.is_removed() {
            return Err(Error::NodeRemoved {
                path: self.path.to_string(),
            });
        }
        self.shared.flush()
    }

    /// Pull on-disk state into memory.
    ///
    /// On the root this re-reads the file (no-op if it doesn't exist). On any
    /// other node it re-resolves the node under its parent, re-creating it as
    /// an empty placeholder if an earlier root sync dropped it. Removed nodes
    /// are ignored.
    pub fn sync(&self) -> Result<()> {
        self.shared.sync(self.id).map_err(|e| self.own(e))
    }
}

impl PartialEq for Node {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.shared, &other.shared) && self.id == other.id
    }
}

impl Eq for Node {}

impl std::fmt::Debug for Node {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Node")
            .field("path", &self.absolute_path())
            .field("file", &self.shared.path())
            .finish()
    }
}
