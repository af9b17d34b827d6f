//! Store options and backing-file location.

use crate::flush::FlushPolicy;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// File name of the backing document inside the application directory.
pub const SETTINGS_FILE: &str = "settings.json";

/// What to do when the backing file exists but can't be parsed on open.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CorruptFilePolicy {
    /// Log a warning and start from an empty document. The next flush
    /// overwrites the bad file.
    #[default]
    Discard,
    /// Rename the file to `<name>.corrupt` first, then start empty.
    Backup,
}

/// Knobs shared by [`PrefStoreBuilder`](crate::PrefStoreBuilder) and
/// [`StoreFactory`](crate::StoreFactory).
#[derive(Debug, Clone, Copy)]
pub(crate) struct Options {
    pub(crate) pretty: bool,
    pub(crate) policy: FlushPolicy,
    pub(crate) on_corrupt: CorruptFilePolicy,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            pretty: true,
            policy: FlushPolicy::Immediate,
            on_corrupt: CorruptFilePolicy::Discard,
        }
    }
}

/// `<home>/<app_dir>/settings.json`, creating the directory if needed.
///
/// Falls back to the current directory when no home directory is known.
/// Failing to create the directory is logged, not returned: reads still work
/// against an empty document and the error surfaces on the first flush.
pub fn backing_file_path(app_dir: &str) -> PathBuf {
    let base = match dirs::home_dir() {
        Some(home) => home,
        None => {
            warn!("no home directory found, keeping preferences in the working directory");
            PathBuf::from(".")
        }
    };
    let path = base.join(app_dir).join(SETTINGS_FILE);
    ensure_parent_dir(&path);
    debug!(path = %path.display(), "preferences file resolved");
    path
}

/// Create the parent directory of `path`. Silent apart from a log line.
pub fn ensure_parent_dir(path: &Path) {
    let Some(dir) = path.parent() else {
        return;
    };
    if dir.as_os_str().is_empty() || dir.exists() {
        return;
    }
    if let Err(e) = std::fs::create_dir_all(dir) {
        warn!(dir = %dir.display(), error = %e, "could not create preferences directory");
    }
}
