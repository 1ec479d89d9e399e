//! Filesystem discovery of phonemizer extension modules.
//!
//! Registration-based loading: a module is a dynamic library exporting
//! [`PLUGIN_ENTRY_SYMBOL`], a plain function returning its descriptors.
//! Every per-module step — validation, loading, calling the entry point —
//! is isolated so one broken module never aborts the scan, and a total scan
//! failure still yields the built-in catalog.

use std::env::consts::{DLL_EXTENSION, DLL_PREFIX, DLL_SUFFIX};
use std::fs;
use std::io::Read;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::time::Instant;

use libloading::Library;

use crate::phonemizer::{builtin_descriptors, PhonemizerCatalog, PhonemizerDescriptor};

/// Symbol every extension module must export.
pub const PLUGIN_ENTRY_SYMBOL: &[u8] = b"cadenza_phonemizer_entry";

/// Signature of the entry point: no host state crosses the boundary, the
/// module just hands back its descriptors.
pub type PluginEntry = unsafe fn() -> Vec<PhonemizerDescriptor>;

/// File name of the optional built-in module shipped next to the executable.
fn builtin_module_name() -> String {
    format!("{DLL_PREFIX}cadenza_builtin{DLL_SUFFIX}")
}

/// Default external plugin directory.
pub fn default_plugin_dir() -> PathBuf {
    match dirs::data_dir() {
        Some(dir) => dir.join("cadenza").join("plugins"),
        None => PathBuf::from("plugins"),
    }
}

/// Scan for extension modules and build the capability catalog.
///
/// The candidate list is deterministic: the built-in module path first, then
/// a sorted recursive walk of `plugin_dir`. Compiled-in descriptors are
/// always included. Never fails — a total scan failure is logged and the
/// built-in-only catalog is returned.
pub fn scan(plugin_dir: &Path) -> PhonemizerCatalog {
    let started = Instant::now();
    let mut descriptors = builtin_descriptors();

    let candidates = match collect_candidates(plugin_dir) {
        Ok(candidates) => candidates,
        Err(e) => {
            log::error!(target: "plugins", "plugin scan failed: {e}");
            return PhonemizerCatalog::new(descriptors);
        }
    };

    for candidate in candidates {
        if !is_loadable_module(&candidate) {
            log::info!(target: "plugins", "skipping {}", candidate.display());
            continue;
        }
        match load_module(&candidate) {
            Ok(mut loaded) => {
                log::info!(
                    target: "plugins",
                    "loaded {} ({} phonemizers)",
                    candidate.display(),
                    loaded.len()
                );
                descriptors.append(&mut loaded);
            }
            Err(e) => {
                log::warn!(target: "plugins", "failed to load {}: {e}", candidate.display());
            }
        }
    }

    log::info!(target: "plugins", "plugin scan finished in {:?}", started.elapsed());
    PhonemizerCatalog::new(descriptors)
}

/// Build the deterministic candidate list: built-in module path (when it
/// exists next to the executable), then every dynamic library under
/// `plugin_dir`, recursively, in sorted order.
fn collect_candidates(plugin_dir: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut files = Vec::new();

    if let Ok(exe) = std::env::current_exe() {
        if let Some(exe_dir) = exe.parent() {
            let builtin = exe_dir.join(builtin_module_name());
            if builtin.is_file() {
                files.push(builtin);
            }
        }
    }

    fs::create_dir_all(plugin_dir)?;

    // An old copy of the built-in module inside the plugin directory would
    // shadow the shipped one; remove it before scanning.
    let stale_builtin = plugin_dir.join(builtin_module_name());
    if stale_builtin.is_file() {
        if let Err(e) = fs::remove_file(&stale_builtin) {
            log::warn!(target: "plugins", "could not remove stale {}: {e}", stale_builtin.display());
        }
    }

    let mut external = Vec::new();
    walk_modules(plugin_dir, &mut external)?;
    external.sort();
    files.extend(external);
    Ok(files)
}

fn walk_modules(dir: &Path, out: &mut Vec<PathBuf>) -> std::io::Result<()> {
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if path.is_dir() {
            walk_modules(&path, out)?;
        } else if path.extension().map(|ext| ext == DLL_EXTENSION).unwrap_or(false) {
            out.push(path);
        }
    }
    Ok(())
}

/// Cheap pre-load validation: right extension and a known dynamic-library
/// magic header. Malformed files are skipped without ever being mapped.
fn is_loadable_module(path: &Path) -> bool {
    if !path.extension().map(|ext| ext == DLL_EXTENSION).unwrap_or(false) {
        return false;
    }
    let mut magic = [0u8; 4];
    let Ok(mut file) = fs::File::open(path) else {
        return false;
    };
    if file.read_exact(&mut magic).is_err() {
        return false;
    }
    matches!(
        magic,
        [0x7f, b'E', b'L', b'F']                 // ELF
            | [0xfe, 0xed, 0xfa, _]              // Mach-O big-endian
            | [_, 0xfa, 0xed, 0xfe]              // Mach-O little-endian
            | [0xca, 0xfe, 0xba, 0xbe]           // Mach-O universal
            | [b'M', b'Z', _, _]                 // PE
    )
}

/// Load one module and call its entry point. The whole operation runs inside
/// `catch_unwind`; a module that panics during registration is skipped.
fn load_module(path: &Path) -> Result<Vec<PhonemizerDescriptor>, String> {
    let result = catch_unwind(AssertUnwindSafe(|| -> Result<_, String> {
        let library = unsafe { Library::new(path) }.map_err(|e| e.to_string())?;
        let entry = unsafe { library.get::<PluginEntry>(PLUGIN_ENTRY_SYMBOL) }
            .map_err(|e| format!("no {}: {e}", String::from_utf8_lossy(PLUGIN_ENTRY_SYMBOL)))?;
        let descriptors = unsafe { entry() };
        // Descriptors hold function pointers into the module; keep it
        // resident for the rest of the process.
        std::mem::forget(library);
        Ok(descriptors)
    }));
    match result {
        Ok(inner) => inner,
        Err(_) => Err("module panicked during registration".to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn corrupted_module_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let bogus = dir.path().join(format!("bogus.{DLL_EXTENSION}"));
        fs::File::create(&bogus)
            .unwrap()
            .write_all(b"this is not a library")
            .unwrap();

        let catalog = scan(dir.path());
        let tags: Vec<&str> = catalog.descriptors().iter().map(|d| d.tag.as_str()).collect();
        assert_eq!(tags, vec!["DEFAULT"]);
    }

    #[test]
    fn magic_check_rejects_garbage_and_accepts_elf_header() {
        let dir = tempfile::tempdir().unwrap();

        let garbage = dir.path().join(format!("garbage.{DLL_EXTENSION}"));
        fs::File::create(&garbage).unwrap().write_all(b"oops").unwrap();
        assert!(!is_loadable_module(&garbage));

        let elfish = dir.path().join(format!("elfish.{DLL_EXTENSION}"));
        fs::File::create(&elfish)
            .unwrap()
            .write_all(&[0x7f, b'E', b'L', b'F', 0, 0])
            .unwrap();
        assert!(is_loadable_module(&elfish));

        let wrong_ext = dir.path().join("elfish.txt");
        fs::File::create(&wrong_ext)
            .unwrap()
            .write_all(&[0x7f, b'E', b'L', b'F'])
            .unwrap();
        assert!(!is_loadable_module(&wrong_ext));
    }

    #[test]
    fn candidate_list_is_sorted_recursively() {
        let dir = tempfile::tempdir().unwrap();
        let sub = dir.path().join("nested");
        fs::create_dir_all(&sub).unwrap();

        for name in ["zz", "aa"] {
            let path = dir.path().join(format!("{name}.{DLL_EXTENSION}"));
            fs::File::create(path).unwrap();
        }
        let nested = sub.join(format!("mm.{DLL_EXTENSION}"));
        fs::File::create(&nested).unwrap();

        let candidates = collect_candidates(dir.path()).unwrap();
        let mut sorted = candidates.clone();
        sorted.sort();
        assert_eq!(candidates, sorted);
        assert!(candidates.iter().any(|p| p == &nested));
    }

    #[test]
    fn unusable_plugin_dir_yields_builtin_catalog() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("not-a-dir");
        fs::File::create(&file).unwrap();

        // Plugin dir path sits below a regular file; create_dir_all fails.
        let catalog = scan(&file.join("plugins"));
        assert_eq!(catalog.descriptors().len(), 1);
        assert!(catalog.contains("DEFAULT"));
    }

    #[test]
    fn stale_builtin_copy_is_removed() {
        let dir = tempfile::tempdir().unwrap();
        let stale = dir.path().join(builtin_module_name());
        fs::File::create(&stale).unwrap();

        let _ = scan(dir.path());
        assert!(!stale.exists());
    }
}
