//! In-memory document: an arena of node records.
//!
//! Parent links are plain indices into the arena, so a child never keeps its
//! parent alive and walking upward is just a loop. Slots of removed nodes are
//! reused; every id carries the generation of its slot, so a stale handle
//! fails with `NodeRemoved` instead of aliasing whatever took the slot.

use crate::error::{Error, Result};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Slot in the arena plus the generation it was handed out with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct NodeId {
    slot: usize,
    generation: u32,
}

/// The root always lives in slot 0 and is never freed.
pub(crate) const ROOT: NodeId = NodeId {
    slot: 0,
    generation: 0,
};

/// A leaf value stored under a key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Leaf {
    Text(String),
    List(Vec<String>),
}

impl Leaf {
    fn from_json(value: &Value) -> Option<Leaf> {
        match value {
            Value::Null | Value::Object(_) => None,
            Value::String(s) => Some(Leaf::Text(s.clone())),
            Value::Array(items) => Some(Leaf::List(
                items
                    .iter()
                    .filter(|v| !v.is_null())
                    .map(|v| match v {
                        Value::String(s) => s.clone(),
                        other => other.to_string(),
                    })
                    .collect(),
            )),
            other => Some(Leaf::Text(other.to_string())),
        }
    }

    fn to_json(&self) -> Value {
        match self {
            Leaf::Text(s) => Value::String(s.clone()),
            Leaf::List(items) => Value::Array(items.iter().cloned().map(Value::String).collect()),
        }
    }
}

#[derive(Debug, Default)]
struct Record {
    name: String,
    parent: Option<NodeId>,
    generation: u32,
    entries: BTreeMap<String, Leaf>,
    children: BTreeMap<String, NodeId>,
    // Children dropped by a sync because the file no longer has them. Their
    // handles stay live and get re-linked on the next write or lookup.
    detached: BTreeMap<String, NodeId>,
    removed: bool,
}

/// The whole preference tree, root included.
#[derive(Debug)]
pub(crate) struct Tree {
    records: Vec<Record>,
    free: Vec<usize>,
}

impl Tree {
    pub(crate) fn new() -> Self {
        Self {
            records: vec![Record::default()],
            free: Vec::new(),
        }
    }

    /// Build a tree from a parsed document.
    pub(crate) fn from_document(doc: &Map<String, Value>) -> Self {
        let mut tree = Self::new();
        tree.reconcile(ROOT, doc);
        tree
    }

    fn rec(&self, id: NodeId) -> &Record {
        &self.records[id.slot]
    }

    fn rec_mut(&mut self, id: NodeId) -> &mut Record {
        &mut self.records[id.slot]
    }

    /// `true` when `id` still names the record in its slot.
    fn is_current(&self, id: NodeId) -> bool {
        self.rec(id).generation == id.generation
    }

    fn alloc(&mut self, name: &str, parent: NodeId) -> NodeId {
        let (slot, generation) = match self.free.pop() {
            Some(slot) => (slot, self.records[slot].generation.wrapping_add(1)),
            None => {
                self.records.push(Record::default());
                (self.records.len() - 1, 0)
            }
        };
        self.records[slot] = Record {
            name: name.to_string(),
            parent: Some(parent),
            generation,
            ..Record::default()
        };
        NodeId { slot, generation }
    }

    // ---- navigation ----

    pub(crate) fn is_removed(&self, id: NodeId) -> bool {
        !self.is_current(id) || self.rec(id).removed
    }

    /// `/` for the root, `/a/b` below it.
    pub(crate) fn path(&self, id: NodeId) -> String {
        let mut segments = Vec::new();
        let mut cur = id;
        while let Some(parent) = self.rec(cur).parent {
            segments.push(self.rec(cur).name.as_str());
            cur = parent;
        }
        if segments.is_empty() {
            return "/".to_string();
        }
        segments.reverse();
        format!("/{}", segments.join("/"))
    }

    fn check_live(&self, id: NodeId) -> Result<()> {
        if !self.is_current(id) {
            // The slot went to another node; only the handle knows the path.
            return Err(Error::NodeRemoved {
                path: String::new(),
            });
        }
        if self.rec(id).removed {
            return Err(Error::NodeRemoved {
                path: self.path(id),
            });
        }
        Ok(())
    }

    fn is_attached(&self, id: NodeId) -> bool {
        match self.rec(id).parent {
            None => true,
            Some(p) => self.rec(p).children.get(&self.rec(id).name) == Some(&id),
        }
    }

    /// Put a detached node (and any detached ancestors) back under its parent
    /// as an empty placeholder.
    ///
    /// Fails without touching the tree if a leaf now holds the name of the node
    /// or of one of its detached ancestors; the error names that clash.
    fn relink(&mut self, id: NodeId) -> Result<()> {
        let mut chain = Vec::new();
        let mut cur = id;
        while !self.is_attached(cur) {
            let Some(parent) = self.rec(cur).parent else {
                break;
            };
            let name = &self.rec(cur).name;
            if self.rec(parent).entries.contains_key(name) {
                return Err(Error::Conflict {
                    key: self.path(cur),
                });
            }
            chain.push(cur);
            cur = parent;
        }
        for node in chain.into_iter().rev() {
            let Some(parent) = self.rec(node).parent else {
                continue;
            };
            let name = self.rec(node).name.clone();
            let parent_rec = self.rec_mut(parent);
            parent_rec.detached.remove(&name);
            parent_rec.children.insert(name, node);
        }
        Ok(())
    }

    // ---- leaf keys ----

    pub(crate) fn get(&self, id: NodeId, key: &str) -> Result<Option<Leaf>> {
        self.check_live(id)?;
        Ok(self.rec(id).entries.get(key).cloned())
    }

    /// Store a leaf. Fails if `key` names a child node.
    pub(crate) fn put(&mut self, id: NodeId, key: &str, leaf: Leaf) -> Result<()> {
        self.check_live(id)?;
        if self.rec(id).children.contains_key(key) {
            return Err(Error::Conflict {
                key: key.to_string(),
            });
        }
        self.relink(id)?;
        self.rec_mut(id).entries.insert(key.to_string(), leaf);
        Ok(())
    }

    pub(crate) fn remove_key(&mut self, id: NodeId, key: &str) -> Result<bool> {
        self.check_live(id)?;
        self.relink(id)?;
        Ok(self.rec_mut(id).entries.remove(key).is_some())
    }

    pub(crate) fn clear_keys(&mut self, id: NodeId) -> Result<()> {
        self.check_live(id)?;
        self.relink(id)?;
        self.rec_mut(id).entries.clear();
        Ok(())
    }

    pub(crate) fn keys(&self, id: NodeId) -> Result<Vec<String>> {
        self.check_live(id)?;
        Ok(self.rec(id).entries.keys().cloned().collect())
    }

    // ---- child nodes ----

    pub(crate) fn child_names(&self, id: NodeId) -> Result<Vec<String>> {
        self.check_live(id)?;
        Ok(self.rec(id).children.keys().cloned().collect())
    }

    pub(crate) fn find_child(&self, id: NodeId, name: &str) -> Result<Option<NodeId>> {
        self.check_live(id)?;
        Ok(self.rec(id).children.get(name).copied())
    }

    /// Return the child called `name`, creating and linking it if needed.
    pub(crate) fn child(&mut self, id: NodeId, name: &str) -> Result<NodeId> {
        validate_name(name)?;
        self.check_live(id)?;
        if let Some(&existing) = self.rec(id).children.get(name) {
            return Ok(existing);
        }
        if self.rec(id).entries.contains_key(name) {
            return Err(Error::Conflict {
                key: name.to_string(),
            });
        }
        self.relink(id)?;
        let child = match self.rec_mut(id).detached.remove(name) {
            Some(detached) => detached,
            None => self.alloc(name, id),
        };
        self.rec_mut(id).children.insert(name.to_string(), child);
        Ok(child)
    }

    /// Detach `id` from its parent, mark its subtree removed and hand the
    /// slots back for reuse.
    ///
    /// Returns `false` if it was already removed.
    pub(crate) fn remove_node(&mut self, id: NodeId) -> Result<bool> {
        if id == ROOT {
            return Err(Error::RootRemoval);
        }
        if self.is_removed(id) {
            return Ok(false);
        }
        let Some(parent) = self.rec(id).parent else {
            return Err(Error::RootRemoval);
        };
        let name = self.rec(id).name.clone();
        let parent_rec = self.rec_mut(parent);
        if parent_rec.children.get(&name) == Some(&id) {
            parent_rec.children.remove(&name);
        }
        if parent_rec.detached.get(&name) == Some(&id) {
            parent_rec.detached.remove(&name);
        }
        self.mark_removed(id);
        Ok(true)
    }

    fn mark_removed(&mut self, id: NodeId) {
        let rec = self.rec_mut(id);
        rec.removed = true;
        rec.entries.clear();
        let below: Vec<NodeId> = std::mem::take(&mut rec.children)
            .into_values()
            .chain(std::mem::take(&mut rec.detached).into_values())
            .collect();
        self.free.push(id.slot);
        for child in below {
            self.mark_removed(child);
        }
    }

    /// Number of slots in the arena, free ones included.
    #[cfg(test)]
    fn capacity(&self) -> usize {
        self.records.len()
    }

    // ---- document conversion ----

    /// Serialize the whole tree, starting at the root.
    pub(crate) fn to_document(&self) -> Value {
        Value::Object(self.object_at(ROOT))
    }

    fn object_at(&self, id: NodeId) -> Map<String, Value> {
        let rec = self.rec(id);
        let mut obj = Map::new();
        for (key, leaf) in &rec.entries {
            obj.insert(key.clone(), leaf.to_json());
        }
        for (name, &child) in &rec.children {
            obj.insert(name.clone(), Value::Object(self.object_at(child)));
        }
        obj
    }

    /// Re-point a non-root node at its place in the parent, re-linking it as
    /// an empty placeholder when a sync dropped it. No-op for removed nodes.
    pub(crate) fn rebind(&mut self, id: NodeId) -> Result<()> {
        if self.is_removed(id) {
            return Ok(());
        }
        self.relink(id)
    }

    /// Replace the root's content with `doc`, keeping existing records (and
    /// therefore live handles) wherever a node of the same name survives.
    pub(crate) fn reload(&mut self, doc: &Map<String, Value>) {
        self.reconcile(ROOT, doc);
    }

    fn reconcile(&mut self, id: NodeId, obj: &Map<String, Value>) {
        let mut old_children = std::mem::take(&mut self.rec_mut(id).children);
        let mut entries = BTreeMap::new();
        let mut children = BTreeMap::new();

        for (name, value) in obj {
            match value {
                Value::Object(sub) => {
                    let reused = match old_children.remove(name) {
                        Some(existing) => Some(existing),
                        None => self.rec_mut(id).detached.remove(name),
                    };
                    let child = match reused {
                        Some(existing) => existing,
                        None => self.alloc(name, id),
                    };
                    self.reconcile(child, sub);
                    children.insert(name.clone(), child);
                }
                other => {
                    if let Some(leaf) = Leaf::from_json(other) {
                        entries.insert(name.clone(), leaf);
                    }
                }
            }
        }

        for (name, gone) in old_children {
            self.reconcile(gone, &Map::new());
            self.rec_mut(id).detached.insert(name, gone);
        }

        let rec = self.rec_mut(id);
        rec.entries = entries;
        rec.children = children;
    }
}

/// Node names are non-empty and cannot contain `/`.
fn validate_name(name: &str) -> Result<()> {
    if name.is_empty() || name.contains('/') {
        return Err(Error::InvalidName(name.to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("not an object"),
        }
    }

    #[test]
    fn child_is_created_once() {
        let mut tree = Tree::new();
        let a = tree.child(ROOT, "a").unwrap();
        assert_eq!(tree.child(ROOT, "a").unwrap(), a);
        assert_eq!(tree.child_names(ROOT).unwrap(), vec!["a".to_string()]);
        assert_eq!(tree.path(a), "/a");
    }

    #[test]
    fn empty_child_shows_up_in_document() {
        let mut tree = Tree::new();
        tree.child(ROOT, "window").unwrap();
        assert_eq!(tree.to_document(), json!({ "window": {} }));
    }

    #[test]
    fn leaf_and_child_names_are_exclusive() {
        let mut tree = Tree::new();
        tree.child(ROOT, "a").unwrap();
        let err = tree.put(ROOT, "a", Leaf::Text("x".into())).unwrap_err();
        assert_eq!(err, Error::Conflict { key: "a".into() });

        tree.put(ROOT, "b", Leaf::Text("x".into())).unwrap();
        assert!(matches!(tree.child(ROOT, "b"), Err(Error::Conflict { .. })));
    }

    #[test]
    fn removal_marks_whole_subtree() {
        let mut tree = Tree::new();
        let a = tree.child(ROOT, "a").unwrap();
        let b = tree.child(a, "b").unwrap();
        assert!(tree.remove_node(a).unwrap());
        assert!(!tree.remove_node(a).unwrap());
        assert!(tree.is_removed(b));
        assert!(matches!(tree.keys(b), Err(Error::NodeRemoved { .. })));
        assert_eq!(tree.to_document(), json!({}));

        let fresh = tree.child(ROOT, "a").unwrap();
        assert_ne!(fresh, a);
    }

    #[test]
    fn root_cannot_be_removed() {
        let mut tree = Tree::new();
        assert_eq!(tree.remove_node(ROOT), Err(Error::RootRemoval));
    }

    #[test]
    fn invalid_names_are_rejected() {
        let mut tree = Tree::new();
        assert!(matches!(tree.child(ROOT, ""), Err(Error::InvalidName(_))));
        assert!(matches!(tree.child(ROOT, "a/b"), Err(Error::InvalidName(_))));
    }

    #[test]
    fn document_scalars_become_text() {
        let tree = Tree::from_document(&doc(json!({
            "s": "v",
            "n": 12,
            "b": true,
            "nothing": null,
            "list": ["a", 1, null],
        })));
        assert_eq!(tree.get(ROOT, "s").unwrap(), Some(Leaf::Text("v".into())));
        assert_eq!(tree.get(ROOT, "n").unwrap(), Some(Leaf::Text("12".into())));
        assert_eq!(tree.get(ROOT, "b").unwrap(), Some(Leaf::Text("true".into())));
        assert_eq!(tree.get(ROOT, "nothing").unwrap(), None);
        assert_eq!(
            tree.get(ROOT, "list").unwrap(),
            Some(Leaf::List(vec!["a".into(), "1".into()]))
        );
    }

    #[test]
    fn reload_keeps_surviving_records() {
        let mut tree = Tree::new();
        let window = tree.child(ROOT, "window").unwrap();
        tree.put(window, "width", Leaf::Text("640".into())).unwrap();

        tree.reload(&doc(json!({ "window": { "width": "800" }, "theme": "dark" })));
        assert_eq!(tree.child(ROOT, "window").unwrap(), window);
        assert_eq!(
            tree.get(window, "width").unwrap(),
            Some(Leaf::Text("800".into()))
        );
        assert_eq!(tree.keys(ROOT).unwrap(), vec!["theme".to_string()]);
    }

    #[test]
    fn reload_detaches_missing_children_until_touched() {
        let mut tree = Tree::new();
        let editor = tree.child(ROOT, "editor").unwrap();
        tree.put(editor, "font", Leaf::Text("mono".into())).unwrap();

        tree.reload(&doc(json!({})));
        assert!(tree.child_names(ROOT).unwrap().is_empty());
        assert_eq!(tree.get(editor, "font").unwrap(), None);
        assert_eq!(tree.to_document(), json!({}));

        tree.put(editor, "size", Leaf::Text("12".into())).unwrap();
        assert_eq!(tree.to_document(), json!({ "editor": { "size": "12" } }));
        assert_eq!(tree.child(ROOT, "editor").unwrap(), editor);
    }

    #[test]
    fn rebind_relinks_placeholder() {
        let mut tree = Tree::new();
        let a = tree.child(ROOT, "a").unwrap();
        tree.reload(&Map::new());
        tree.rebind(a).unwrap();
        assert_eq!(tree.to_document(), json!({ "a": {} }));
    }

    #[test]
    fn removed_slots_are_reused() {
        let mut tree = Tree::new();
        let first = tree.child(ROOT, "tmp").unwrap();
        tree.child(first, "inner").unwrap();
        tree.remove_node(first).unwrap();
        let size = tree.capacity();

        for _ in 0..100 {
            let node = tree.child(ROOT, "tmp").unwrap();
            tree.child(node, "inner").unwrap();
            tree.remove_node(node).unwrap();
        }
        assert_eq!(tree.capacity(), size);

        // the old id now shares a slot with a newer node but stays dead
        let current = tree.child(ROOT, "tmp").unwrap();
        assert!(tree.is_removed(first));
        assert!(matches!(tree.keys(first), Err(Error::NodeRemoved { .. })));
        assert!(!tree.remove_node(first).unwrap());
        assert!(!tree.is_removed(current));
    }

    #[test]
    fn relink_onto_leaf_fails_without_changes() {
        let mut tree = Tree::new();
        let editor = tree.child(ROOT, "editor").unwrap();
        tree.reload(&doc(json!({ "editor": "plain" })));

        let err = tree
            .put(editor, "size", Leaf::Text("12".into()))
            .unwrap_err();
        assert_eq!(
            err,
            Error::Conflict {
                key: "/editor".into()
            }
        );
        assert_eq!(tree.to_document(), json!({ "editor": "plain" }));
        assert!(tree.child_names(ROOT).unwrap().is_empty());
        assert_eq!(tree.get(editor, "size").unwrap(), None);
    }
}
