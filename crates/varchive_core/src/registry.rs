//! Process-wide registry of archive paths owned by a live session.
//!
//! Enforces the one-live-session-per-archive invariant within a process.
//! All reads and writes go through the module functions and are atomic
//! with respect to each other.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

static OPENED: Mutex<Option<HashSet<PathBuf>>> = Mutex::new(None);

fn with_set<T>(f: impl FnOnce(&mut HashSet<PathBuf>) -> T) -> T {
    let mut guard = OPENED.lock().expect("session registry poisoned");
    f(guard.get_or_insert_with(HashSet::new))
}

/// Registers an archive path. Returns `false` if it was already owned.
pub fn register(path: &Path) -> bool {
    with_set(|set| set.insert(path.to_path_buf()))
}

/// Removes an archive path from the registry.
pub fn deregister(path: &Path) {
    with_set(|set| {
        set.remove(path);
    })
}

/// Returns `true` if a live session owns the given archive path.
pub fn contains(path: &Path) -> bool {
    with_set(|set| set.contains(path))
}

/// Empties the registry.
///
/// Escape hatch only: sessions that were dropped without `close()` leave
/// their paths registered, and this clears them. Prefer closing sessions.
pub fn clear() {
    with_set(|set| set.clear());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_is_exclusive() {
        let path = Path::new("/registry-test/exclusive.vfile");

        assert!(register(path));
        assert!(contains(path));
        assert!(!register(path));

        deregister(path);
        assert!(!contains(path));
        assert!(register(path));
        deregister(path);
    }

    #[test]
    fn deregister_unknown_path_is_a_noop() {
        deregister(Path::new("/registry-test/never-registered.vfile"));
    }
}
