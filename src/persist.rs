//! Disk I/O helpers: per-file locks, load, and atomic write.
//!
//! The rename-over approach is close to atomic on most platforms. On NTFS
//! (Windows) it's reliable; on FAT32 or network shares there are no hard
//! guarantees.
//!
//! Locks are process-local. Two processes writing the same file will still
//! clobber each other; the last complete write wins.

use crate::error::{Error, Result};
use crate::serializer::Serializer;
use parking_lot::Mutex;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};

static FILE_LOCKS: OnceLock<Mutex<HashMap<PathBuf, Arc<Mutex<()>>>>> = OnceLock::new();

/// The mutex guarding every read and write of `path` in this process.
///
/// Stores opened on the same file share one lock, so their flushes and
/// syncs never interleave.
pub fn file_lock(path: &Path) -> Arc<Mutex<()>> {
    let key = lock_key(path);
    let locks = FILE_LOCKS.get_or_init(|| Mutex::new(HashMap::new()));
    Arc::clone(locks.lock().entry(key).or_default())
}

fn lock_key(path: &Path) -> PathBuf {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        match std::env::current_dir() {
            Ok(cwd) => cwd.join(path),
            Err(_) => path.to_path_buf(),
        }
    };
    // Canonicalize the deepest directory that exists and keep the rest as
    // given, so the key doesn't change once missing directories get created.
    let (mut existing, name) = match (absolute.parent(), absolute.file_name()) {
        (Some(dir), Some(name)) => (dir.to_path_buf(), name.to_os_string()),
        _ => return absolute,
    };
    let mut missing = vec![name];
    loop {
        if let Ok(found) = existing.canonicalize() {
            return missing.iter().rev().fold(found, |acc, part| acc.join(part));
        }
        let up = match (existing.parent(), existing.file_name()) {
            (Some(up), Some(part)) => {
                missing.push(part.to_os_string());
                up.to_path_buf()
            }
            _ => return absolute,
        };
        existing = up;
    }
}

/// Reads and parses the file at `path`. Returns `None` if the file is
/// missing, and an empty document if it is empty.
///
/// Callers must hold the file's lock.
pub fn read_document<S>(path: &Path, serializer: &S) -> Result<Option<Map<String, Value>>>
where
    S: Serializer,
{
    let bytes = match std::fs::read(path) {
        Ok(b) => b,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(Error::Io(e.to_string())),
    };
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(Some(Map::new()));
    }
    serializer.deserialize(&bytes).map(Some)
}

/// Write `bytes` to `<path>.tmp` and then rename over `path`. This avoids
/// leaving a half-written file if the process crashes mid-write.
pub fn atomic_write(path: &Path, bytes: &[u8]) -> Result<()> {
    let tmp = sibling_with_suffix(path, "tmp");
    std::fs::write(&tmp, bytes).map_err(|e| Error::Io(e.to_string()))?;
    if let Err(e) = std::fs::rename(&tmp, path) {
        let _ = std::fs::remove_file(&tmp);
        return Err(Error::Io(e.to_string()));
    }
    Ok(())
}

/// Rename a malformed file to `<path>.corrupt`, replacing an older backup.
pub fn move_aside(path: &Path) -> Result<PathBuf> {
    let backup = sibling_with_suffix(path, "corrupt");
    std::fs::rename(path, &backup)?;
    Ok(backup)
}

fn sibling_with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("json");
    path.with_extension(format!("{ext}.{suffix}"))
}
