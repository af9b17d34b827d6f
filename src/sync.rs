//! Keeps the in-memory tree and the backing file consistent.
//!
//! Lock order is always file lock, then tree lock. A flush holds the file lock
//! across both the snapshot and the write, so whichever flush finishes last
//! carries every mutation made before it started.

use crate::config::{CorruptFilePolicy, Options};
use crate::error::{Error, Result};
use crate::persist::{atomic_write, file_lock, move_aside, read_document};
use crate::serializer::{JsonSerializer, Serializer};
use crate::tree::{NodeId, Tree, ROOT};
use parking_lot::{Mutex, RwLock};
use serde_json::Map;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, error, warn};

/// State shared by a store and every node handle it gives out.
pub(crate) struct Shared {
    pub(crate) path: PathBuf,
    pub(crate) options: Options,
    pub(crate) tree: RwLock<Tree>,
    serializer: JsonSerializer,
    lock: Arc<Mutex<()>>,
}

impl Shared {
    /// Load the backing file into a fresh tree.
    ///
    /// Never fails: an unreadable or malformed file is logged and treated as
    /// empty, according to `options.on_corrupt`.
    pub(crate) fn load(path: PathBuf, options: Options) -> Self {
        let serializer = if options.pretty {
            JsonSerializer::pretty()
        } else {
            JsonSerializer::new()
        };
        let lock = file_lock(&path);

        let tree = {
            let _guard = lock.lock();
            match read_document(&path, &serializer) {
                Ok(Some(doc)) => Tree::from_document(&doc),
                Ok(None) => {
                    debug!(path = %path.display(), "no preferences file yet, starting empty");
                    Tree::new()
                }
                Err(e) => {
                    recover(&path, &e, options.on_corrupt);
                    Tree::new()
                }
            }
        };

        Self {
            path,
            options,
            tree: RwLock::new(tree),
            serializer,
            lock,
        }
    }

    pub(crate) fn path(&self) -> &Path {
        &self.path
    }

    /// Serialize the entire tree from the root and overwrite the file.
    pub(crate) fn flush(&self) -> Result<()> {
        let _guard = self.lock.lock();
        let doc = self.tree.read().to_document();
        let written = self
            .serializer
            .serialize(&doc)
            .and_then(|bytes| atomic_write(&self.path, &bytes));
        if let Err(e) = &written {
            error!(path = %self.path.display(), error = %e, "failed to flush preferences");
        }
        written
    }

    /// Flush if the policy says mutations go straight to disk.
    pub(crate) fn after_mutation(&self) -> Result<()> {
        if self.options.policy.flushes_on_write() {
            self.flush()
        } else {
            Ok(())
        }
    }

    /// Pull on-disk state into the tree.
    ///
    /// A missing file makes this a no-op for every node. Otherwise the root
    /// re-reads the file and any other node only re-resolves its place under
    /// its parent. Removed nodes are left alone.
    pub(crate) fn sync(&self, id: NodeId) -> Result<()> {
        if !self.path.exists() {
            return Ok(());
        }
        if id != ROOT {
            return self.tree.write().rebind(id);
        }
        let _guard = self.lock.lock();
        let doc: Map<_, _> = match read_document(&self.path, &self.serializer)? {
            Some(doc) => doc,
            None => return Ok(()),
        };
        self.tree.write().reload(&doc);
        debug!(path = %self.path.display(), "preferences reloaded from disk");
        Ok(())
    }
}

fn recover(path: &Path, err: &Error, policy: CorruptFilePolicy) {
    match (policy, err) {
        (CorruptFilePolicy::Backup, Error::Deserialize(_)) => match move_aside(path) {
            Ok(backup) => warn!(
                path = %path.display(),
                backup = %backup.display(),
                error = %err,
                "malformed preferences file moved aside, starting empty"
            ),
            Err(e) => warn!(
                path = %path.display(),
                error = %e,
                "malformed preferences file could not be moved aside, starting empty"
            ),
        },
        _ => warn!(
            path = %path.display(),
            error = %err,
            "invalid preferences file, starting empty"
        ),
    }
}

impl std::fmt::Debug for Shared {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Shared")
            .field("path", &self.path)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}
