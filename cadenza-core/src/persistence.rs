//! Project persistence and the snapshot guard.
//!
//! The primary file is JSON. Writes go through a named temp file in the
//! target directory followed by a rename, so a crash mid-write never leaves
//! a truncated project behind. Crash backups and periodic autosaves are
//! siblings of the primary file with `-backup` / `-autosave` stem suffixes.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, TryLockError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{bounded, tick, Sender};
use thiserror::Error;

use cadenza_types::Project;

#[derive(Debug, Error)]
pub enum PersistError {
    #[error("project has no file path")]
    NoPath,
    #[error("called off the owner thread")]
    WrongThread,
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Write `project` to `path` atomically. Does not touch the project's
/// runtime path/saved fields — the manager owns those.
pub fn save_project(path: &Path, project: &Project) -> Result<(), PersistError> {
    let dir = path.parent().filter(|p| !p.as_os_str().is_empty());
    let mut tmp = match dir {
        Some(dir) => tempfile::NamedTempFile::new_in(dir)?,
        None => tempfile::NamedTempFile::new_in(".")?,
    };
    serde_json::to_writer_pretty(&mut tmp, project)?;
    tmp.flush()?;
    tmp.persist(path).map_err(|e| PersistError::Io(e.error))?;
    Ok(())
}

/// Load a project, stamping its runtime path and saved flag.
pub fn load_project(path: &Path) -> Result<Project, PersistError> {
    let contents = std::fs::read_to_string(path)?;
    let mut project: Project = serde_json::from_str(&contents)?;
    project.file_path = Some(path.to_path_buf());
    project.saved = true;
    Ok(project)
}

/// `<stem>-backup.<ext>`, sibling of the primary file.
pub fn backup_path(primary: &Path) -> PathBuf {
    derived_path(primary, "backup")
}

/// `<stem>-autosave.<ext>`, sibling of the primary file.
pub fn autosave_path(primary: &Path) -> PathBuf {
    derived_path(primary, "autosave")
}

fn derived_path(primary: &Path, suffix: &str) -> PathBuf {
    let stem = primary
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let name = match primary.extension() {
        Some(ext) => format!("{stem}-{suffix}.{}", ext.to_string_lossy()),
        None => format!("{stem}-{suffix}"),
    };
    primary.with_file_name(name)
}

/// Lock the shared document, recovering from poisoning. A command that
/// panicked mid-apply poisons the mutex; the data is still the best state
/// available and later operations must not wedge on it.
pub(crate) fn lock_document(document: &Mutex<Project>) -> MutexGuard<'_, Project> {
    document.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// One best-effort crash snapshot. Called from the panic hook: every failure
/// is swallowed into the log, nothing may propagate from here. The document
/// lock is only tried, never waited on — the panicking thread may still
/// hold it, and blocking inside the hook would hang the crash forever.
pub(crate) fn crash_save(document: &Mutex<Project>) {
    let snapshot = match document.try_lock() {
        Ok(doc) => doc.clone(),
        Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner().clone(),
        Err(TryLockError::WouldBlock) => {
            log::error!(target: "persistence", "document lock held at crash time; skipping backup");
            return;
        }
    };
    let Some(primary) = snapshot.file_path.clone() else {
        return;
    };
    let backup = backup_path(&primary);
    log::info!(target: "persistence", "saving backup {}", backup.display());
    match save_project(&backup, &snapshot) {
        Ok(()) => log::info!(target: "persistence", "saved backup {}", backup.display()),
        Err(e) => log::error!(target: "persistence", "save backup failed: {e}"),
    }
}

/// Install a process-wide panic hook that writes one crash backup before
/// deferring to the previous hook. The hook itself is wrapped in
/// `catch_unwind` — a failing backup must never turn a panic into an abort.
pub fn install_crash_guard(document: Arc<Mutex<Project>>) {
    let previous = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        let _ = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            crash_save(&document);
        }));
        previous(info);
    }));
}

/// Signal sent to the host loop when guard work is due. The timer never
/// touches the manager directly — autosave runs on the owner thread, only
/// the tick crosses threads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardSignal {
    Autosave,
}

/// Periodic trigger for the autosave path. Owns a ticker thread; dropping
/// the timer stops it.
pub struct AutosaveTimer {
    stop_tx: Sender<()>,
    handle: Option<JoinHandle<()>>,
}

impl AutosaveTimer {
    pub fn start(interval: Duration, signal_tx: Sender<GuardSignal>) -> Self {
        let (stop_tx, stop_rx) = bounded::<()>(0);
        let handle = thread::spawn(move || {
            let ticker = tick(interval);
            loop {
                crossbeam_channel::select! {
                    recv(ticker) -> _ => {
                        if signal_tx.send(GuardSignal::Autosave).is_err() {
                            break;
                        }
                    }
                    recv(stop_rx) -> _ => break,
                }
            }
        });
        Self {
            stop_tx,
            handle: Some(handle),
        }
    }
}

impl Drop for AutosaveTimer {
    fn drop(&mut self) {
        let _ = self.stop_tx.send(());
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cadenza_types::Track;

    #[test]
    fn derived_paths_keep_extension_and_directory() {
        let primary = Path::new("/music/songs/aria.czp");
        assert_eq!(
            backup_path(primary),
            Path::new("/music/songs/aria-backup.czp")
        );
        assert_eq!(
            autosave_path(primary),
            Path::new("/music/songs/aria-autosave.czp")
        );
    }

    #[test]
    fn derived_path_without_extension() {
        let primary = Path::new("/music/aria");
        assert_eq!(backup_path(primary), Path::new("/music/aria-backup"));
    }

    #[test]
    fn save_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("song.czp");

        let mut project = Project::new();
        project.name = "Aria".to_string();
        project.bpm = 96.0;
        project.tracks.push(Track::new("Lead"));

        save_project(&path, &project).unwrap();
        let loaded = load_project(&path).unwrap();
        assert_eq!(loaded.name, "Aria");
        assert_eq!(loaded.bpm, 96.0);
        assert_eq!(loaded.tracks.len(), 1);
        assert_eq!(loaded.file_path.as_deref(), Some(path.as_path()));
        assert!(loaded.saved);
    }

    #[test]
    fn atomic_save_leaves_no_temp_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("song.czp");
        save_project(&path, &Project::new()).unwrap();

        let entries: Vec<_> = std::fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(entries.len(), 1);
    }

    #[test]
    fn crash_save_recovers_poisoned_lock() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("song.czp");

        let mut project = Project::new();
        project.file_path = Some(path.clone());
        let document = Arc::new(Mutex::new(project));

        // Poison the mutex the way a panicking `apply` would.
        let poisoner = Arc::clone(&document);
        let prev = std::panic::take_hook();
        std::panic::set_hook(Box::new(|_| {}));
        let _ = std::panic::catch_unwind(move || {
            let _guard = poisoner.lock().unwrap();
            panic!("apply blew up");
        });
        std::panic::set_hook(prev);
        assert!(document.is_poisoned());

        crash_save(&document);
        assert!(backup_path(&path).exists());
    }

    #[test]
    fn crash_save_skips_while_document_lock_is_held() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("song.czp");

        let mut project = Project::new();
        project.file_path = Some(path.clone());
        let document = Mutex::new(project);

        // The panicking thread may still hold the lock when the hook runs;
        // the backup is skipped rather than waited for.
        let _guard = document.lock().unwrap();
        crash_save(&document);
        assert!(!backup_path(&path).exists());
    }

    #[test]
    fn crash_save_without_path_is_silent() {
        let document = Mutex::new(Project::new());
        crash_save(&document); // must not panic or write anywhere
    }

    #[test]
    fn autosave_timer_ticks_and_stops() {
        let (tx, rx) = crossbeam_channel::unbounded();
        let timer = AutosaveTimer::start(Duration::from_millis(10), tx);
        let signal = rx.recv_timeout(Duration::from_secs(2)).unwrap();
        assert_eq!(signal, GuardSignal::Autosave);
        drop(timer); // joins the ticker thread
    }
}
