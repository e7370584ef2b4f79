//! Workspace allocation: the sandbox base, path mirroring, and
//! collision-free per-archive sandbox directories.
//!
//! All working areas live under a process-wide *sandbox base* that is
//! configured at most once via [`set_tmp_folder`] and defaults to the
//! operating-system temp directory. The base holds numbered generations
//! of sandboxes; on every initialisation the generations are rotated so
//! that crash leftovers survive for a few runs before being reclaimed.
//!
//! The `.lock` file under the base root carries an advisory OS-level file
//! lock held until process exit. It coordinates cooperating varchive
//! processes only; it does not protect against arbitrary other writers.

use crate::error::{Result, VarchiveError};
use crate::info::FORMAT_VERSION;
use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, OnceLock};
use std::time::Duration;
use tracing::{debug, warn};

/// Suffix of per-archive sandbox directory names.
pub const SANDBOX_SUFFIX: &str = ".vtmp";

/// Directory created under the configured location.
const BASE_DIR_NAME: &str = ".varchive";

/// Maximum number of retained sandbox generations.
const MAX_GENERATIONS: u32 = 5;

/// Advisory lock acquisition attempts.
const LOCK_RETRIES: u32 = 10;

/// Delay between lock acquisition attempts.
const LOCK_RETRY_DELAY: Duration = Duration::from_millis(300);

static GLOBAL: OnceLock<SandboxBase> = OnceLock::new();
static INIT_GUARD: Mutex<()> = Mutex::new(());

/// Configures the process-wide sandbox base. May be called at most once,
/// before any session is created or opened.
///
/// # Errors
///
/// Returns `TmpAlreadyInitialized` on a second call (or after the base
/// was already initialised lazily) and `LockHeld` if another process
/// holds the base lock.
pub fn set_tmp_folder(location: impl AsRef<Path>) -> Result<()> {
    let _guard = INIT_GUARD.lock().expect("sandbox base init poisoned");

    if let Some(base) = GLOBAL.get() {
        return Err(VarchiveError::TmpAlreadyInitialized(base.root.clone()));
    }

    let base = SandboxBase::init(location.as_ref())?;
    let _ = GLOBAL.set(base);
    Ok(())
}

/// Returns the process-wide sandbox base, initialising it at the
/// OS temp directory if [`set_tmp_folder`] was never called.
pub fn sandbox_base() -> Result<&'static SandboxBase> {
    if let Some(base) = GLOBAL.get() {
        return Ok(base);
    }

    let _guard = INIT_GUARD.lock().expect("sandbox base init poisoned");

    if GLOBAL.get().is_none() {
        let base = SandboxBase::init(&std::env::temp_dir())?;
        let _ = GLOBAL.set(base);
    }

    Ok(GLOBAL.get().expect("sandbox base initialised above"))
}

/// The root under which all per-archive sandboxes are created.
pub struct SandboxBase {
    /// `<location>/.varchive/<format version>`.
    root: PathBuf,
    /// The active generation, `<root>/tmp/0`.
    current: PathBuf,
    /// Open handle to `<root>/.lock`; holding it keeps the advisory lock.
    /// Released when the base is dropped, i.e. at process exit for the
    /// global base.
    _lock: File,
}

impl SandboxBase {
    /// Initialises a sandbox base at the given location: creates the
    /// directory tree, acquires the advisory lock, and rotates the
    /// numbered generations.
    pub fn init(location: &Path) -> Result<Self> {
        let root = location.join(BASE_DIR_NAME).join(FORMAT_VERSION);
        fs::create_dir_all(&root)?;

        let lock = Self::acquire_lock(&root)?;

        let tmp_base = root.join("tmp");
        fs::create_dir_all(&tmp_base)?;
        Self::rotate_generations(&tmp_base)?;

        let current = tmp_base.join("0");

        debug!(root = %root.display(), "sandbox base initialised");

        Ok(Self {
            root,
            current,
            _lock: lock,
        })
    }

    /// Returns the base root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Returns the active sandbox generation directory.
    pub fn current_generation(&self) -> &Path {
        &self.current
    }

    /// Mirrors an absolute path into the active generation.
    ///
    /// On POSIX the leading `/` is stripped; on Windows a drive prefix
    /// `C:\` becomes `Drive_C\`.
    pub fn mirror(&self, absolute: &Path) -> PathBuf {
        self.current.join(local_path(absolute))
    }

    /// Computes the sandbox directory for an archive: the archive's
    /// parent mirrored into the active generation, an optional prefix
    /// segment, then `<basename>.vtmp<k>` for the smallest `k` not yet
    /// taken. The directory is not created.
    pub fn sandbox_for(&self, archive: &Path, prefix: Option<&str>) -> PathBuf {
        let parent = archive.parent().unwrap_or_else(|| Path::new("."));
        let mut dir = self.mirror(parent);

        if let Some(prefix) = prefix {
            dir = dir.join(prefix);
        }

        let name = format!(
            "{}{}",
            archive
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
            SANDBOX_SUFFIX
        );

        let mut k = 0usize;
        loop {
            let candidate = dir.join(format!("{}{}", name, k));
            if !candidate.exists() {
                debug!(sandbox = %candidate.display(), "allocated sandbox path");
                return candidate;
            }
            k += 1;
        }
    }

    /// Creates `.lock` under the base root and acquires the advisory
    /// lock, retrying with a fixed delay before giving up.
    fn acquire_lock(root: &Path) -> Result<File> {
        let lock_path = root.join(".lock");
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&lock_path)?;

        for attempt in 0..LOCK_RETRIES {
            match file.try_lock_exclusive() {
                Ok(()) => return Ok(file),
                Err(_) => {
                    warn!(
                        attempt = attempt + 1,
                        path = %lock_path.display(),
                        "sandbox base locked, retrying"
                    );
                    std::thread::sleep(LOCK_RETRY_DELAY);
                }
            }
        }

        Err(VarchiveError::LockHeld(lock_path))
    }

    /// Shallow rotation of numbered generations: delete entries whose
    /// names are not pure decimals or fall outside the retention range,
    /// drop the oldest retained generation (it would overflow the limit
    /// after the shift), shift `k -> k+1`, then create a fresh `0`.
    ///
    /// After any number of rotations at most [`MAX_GENERATIONS`]
    /// generation directories exist, `0` being the active one.
    fn rotate_generations(tmp_base: &Path) -> Result<()> {
        for entry in fs::read_dir(tmp_base)? {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().into_owned();

            let keep = name
                .parse::<u32>()
                .map(|n| n < MAX_GENERATIONS)
                .unwrap_or(false);

            if !keep {
                remove_dir_best_effort(&entry.path());
            }
        }

        remove_dir_best_effort(&tmp_base.join((MAX_GENERATIONS - 1).to_string()));

        for k in (0..MAX_GENERATIONS - 1).rev() {
            let from = tmp_base.join(k.to_string());
            if from.exists() {
                let to = tmp_base.join((k + 1).to_string());
                if let Err(e) = fs::rename(&from, &to) {
                    warn!(from = %from.display(), error = %e, "generation shift failed");
                }
            }
        }

        fs::create_dir_all(tmp_base.join("0"))?;
        Ok(())
    }
}

/// Converts an absolute path into a relative one suitable for mirroring.
#[cfg(not(windows))]
fn local_path(absolute: &Path) -> PathBuf {
    absolute
        .strip_prefix("/")
        .map(Path::to_path_buf)
        .unwrap_or_else(|_| absolute.to_path_buf())
}

/// On Windows, rewrite the drive prefix: `C:\x` becomes `Drive_C\x`.
#[cfg(windows)]
fn local_path(absolute: &Path) -> PathBuf {
    use std::path::{Component, Prefix};

    let mut components = absolute.components();

    let drive = match components.next() {
        Some(Component::Prefix(prefix)) => match prefix.kind() {
            Prefix::Disk(letter) | Prefix::VerbatimDisk(letter) => {
                Some((letter as char).to_ascii_uppercase())
            }
            _ => None,
        },
        _ => None,
    };

    let rest: PathBuf = components
        .filter(|c| !matches!(c, Component::RootDir))
        .collect();

    match drive {
        Some(letter) => PathBuf::from(format!("Drive_{}", letter)).join(rest),
        None => rest,
    }
}

/// Removes a directory tree, deferring to the platform where in-process
/// deletion can fail on mandatory file locks.
///
/// On POSIX an in-process recursive delete suffices. On Windows a failed
/// delete is handed to a detached shell so the tree disappears once the
/// locks are dropped.
pub fn remove_dir_best_effort(path: &Path) {
    if !path.exists() {
        return;
    }

    match fs::remove_dir_all(path) {
        Ok(()) => {}
        Err(e) => {
            warn!(path = %path.display(), error = %e, "directory removal failed");

            #[cfg(windows)]
            {
                let _ = std::process::Command::new("cmd")
                    .args(["/C", "rmdir", "/S", "/Q"])
                    .arg(path)
                    .spawn();
            }
        }
    }
}
