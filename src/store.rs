//! Store type, builder, and the lazily-initialised factory.

use crate::config::{backing_file_path, ensure_parent_dir, CorruptFilePolicy, Options};
use crate::error::{Error, Result};
use crate::flush::FlushPolicy;
use crate::node::Node;
use crate::sync::Shared;
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};
use tracing::debug;

/// A preference tree backed by one JSON file.
///
/// Cloning is cheap and every clone shares the same tree, so hand clones to
/// whoever needs preferences instead of opening the file twice. Use
/// [`open`](Self::open) for the defaults or [`builder`](Self::builder) for
/// flush policy, pretty-printing and corrupt-file handling.
#[derive(Clone)]
pub struct PrefStore {
    shared: Arc<Shared>,
}

impl PrefStore {
    /// Open (or start) a store at `path` with immediate flush and pretty JSON.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::builder(path).build()
    }

    /// Start configuring a new store. Call [`.build()`](PrefStoreBuilder::build)
    /// when ready.
    pub fn builder(path: impl AsRef<Path>) -> PrefStoreBuilder {
        PrefStoreBuilder::new(path)
    }

    /// The root node. Always the same node for this store.
    #[must_use]
    pub fn root(&self) -> Node {
        Node::root(Arc::clone(&self.shared))
    }

    /// Path to the backing JSON file.
    #[must_use]
    pub fn path(&self) -> &Path {
        self.shared.path()
    }

    /// Flush policy this store was built with.
    #[must_use]
    pub fn policy(&self) -> FlushPolicy {
        self.shared.options.policy
    }

    /// Write the whole tree to disk.
    pub fn flush(&self) -> Result<()> {
        self.shared.flush()
    }

    /// Re-read the backing file into the tree. Same as `root().sync()`.
    pub fn sync(&self) -> Result<()> {
        self.root().sync()
    }
}

impl std::fmt::Debug for PrefStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrefStore")
            .field("path", &self.shared.path)
            .field("policy", &self.shared.options.policy)
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

/// Configures and opens a [`PrefStore`].
///
/// ```rust,no_run
/// use json_prefs::{FlushPolicy, PrefStore};
///
/// let store = PrefStore::builder("settings.json")
///     .pretty(false)
///     .policy(FlushPolicy::Manual)
///     .build()
///     .unwrap();
/// ```
pub struct PrefStoreBuilder {
    path: PathBuf,
    options: Options,
}

impl PrefStoreBuilder {
    fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            options: Options::default(),
        }
    }

    /// Set the flush policy (default: [`FlushPolicy::Immediate`]).
    pub fn policy(mut self, policy: FlushPolicy) -> Self {
        self.options.policy = policy;
        self
    }

    /// Write indented JSON (default) or compact JSON.
    pub fn pretty(mut self, yes: bool) -> Self {
        self.options.pretty = yes;
        self
    }

    /// Choose what happens to a malformed file (default:
    /// [`CorruptFilePolicy::Discard`]).
    pub fn on_corrupt(mut self, policy: CorruptFilePolicy) -> Self {
        self.options.on_corrupt = policy;
        self
    }

    /// Load the file (or start empty) and return the store.
    ///
    /// Only a path with no file name is rejected; unreadable or malformed
    /// files are recovered from and logged.
    pub fn build(self) -> Result<PrefStore> {
        if self.path.file_name().is_none() {
            return Err(Error::Config(format!(
                "preferences path {} has no file name",
                self.path.display()
            )));
        }
        let shared = Shared::load(self.path, self.options);
        Ok(PrefStore {
            shared: Arc::new(shared),
        })
    }
}

impl std::fmt::Debug for PrefStoreBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrefStoreBuilder")
            .field("path", &self.path)
            .field("policy", &self.options.policy)
            .field("pretty", &self.options.pretty)
            .field("on_corrupt", &self.options.on_corrupt)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Factory
// ---------------------------------------------------------------------------

enum Location {
    AppDir(String),
    File(PathBuf),
}

/// Hands out one shared root node, building the store on first use.
///
/// Create one factory at startup and pass it (or the store it returns) to
/// whoever needs preferences. Concurrent first callers see exactly one
/// construction.
///
/// ```rust,no_run
/// use json_prefs::StoreFactory;
///
/// let prefs = StoreFactory::new(".jcode");
/// let editor = prefs.root_node().unwrap().child("editor").unwrap();
/// editor.put("openTabs", "").unwrap();
/// ```
pub struct StoreFactory {
    location: Location,
    options: Options,
    path: OnceLock<PathBuf>,
    store: Mutex<Option<PrefStore>>,
}

impl StoreFactory {
    /// Store preferences in `<home>/<app_dir>/settings.json`.
    pub fn new(app_dir: impl Into<String>) -> Self {
        Self::with_location(Location::AppDir(app_dir.into()))
    }

    /// Store preferences in an explicit file.
    pub fn with_path(path: impl AsRef<Path>) -> Self {
        Self::with_location(Location::File(path.as_ref().to_path_buf()))
    }

    fn with_location(location: Location) -> Self {
        Self {
            location,
            options: Options::default(),
            path: OnceLock::new(),
            store: Mutex::new(None),
        }
    }

    /// Flush policy for the store this factory builds.
    pub fn policy(mut self, policy: FlushPolicy) -> Self {
        self.options.policy = policy;
        self
    }

    /// Indented or compact JSON for the store this factory builds.
    pub fn pretty(mut self, yes: bool) -> Self {
        self.options.pretty = yes;
        self
    }

    /// Corrupt-file handling for the store this factory builds.
    pub fn on_corrupt(mut self, policy: CorruptFilePolicy) -> Self {
        self.options.on_corrupt = policy;
        self
    }

    /// Where the backing file lives. Resolved once; the parent directory is
    /// created on the way if missing.
    pub fn backing_file_path(&self) -> &Path {
        self.path.get_or_init(|| match &self.location {
            Location::AppDir(app_dir) => backing_file_path(app_dir),
            Location::File(path) => {
                ensure_parent_dir(path);
                path.clone()
            }
        })
    }

    /// The store, built on the first call.
    pub fn store(&self) -> Result<PrefStore> {
        let mut slot = self.store.lock();
        if let Some(store) = slot.as_ref() {
            return Ok(store.clone());
        }
        debug!("instantiating root preferences");
        let store = PrefStoreBuilder {
            path: self.backing_file_path().to_path_buf(),
            options: self.options,
        }
        .build()?;
        *slot = Some(store.clone());
        Ok(store)
    }

    /// The shared root node, building the store on the first call.
    pub fn root_node(&self) -> Result<Node> {
        Ok(self.store()?.root())
    }
}

impl std::fmt::Debug for StoreFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreFactory")
            .field("path", &self.path.get())
            .field("initialised", &self.store.lock().is_some())
            .finish_non_exhaustive()
    }
}
