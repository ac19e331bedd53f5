//! Loading a hook library into the current process
//!
//! Loading is what triggers the hook: the platform loader runs the library's
//! attach entry point before `Library::new` returns. On Windows a failed
//! attach makes the load itself fail.

use force_flush_hook::{HookOutcome, OutcomeKind, LAST_OUTCOME_SYMBOL};
use libloading::{Library, Symbol};
use serde::Serialize;
use std::path::{Path, PathBuf};

/// Base name of the hook library, without platform prefix or suffix
pub const HOOK_LIBRARY_NAME: &str = "force_flush_hook";

#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("Hook library not found: {0:?}")]
    NotFound(PathBuf),

    #[error("Loader rejected {path:?}: {source}")]
    Rejected {
        path: PathBuf,
        #[source]
        source: libloading::Error,
    },

    #[error("Cannot locate the running executable: {0}")]
    NoExecutable(#[from] std::io::Error),
}

/// A hook library mapped into this process
///
/// Dropping it unloads the library, which runs its detach entry point.
pub struct LoadedHook {
    library: Library,
}

impl LoadedHook {
    /// Outcome code recorded by the library's entry points
    ///
    /// `None` if the library does not export the outcome symbol.
    pub fn last_outcome(&self) -> Option<i32> {
        unsafe {
            let symbol: Symbol<unsafe extern "C" fn() -> i32> =
                self.library.get(LAST_OUTCOME_SYMBOL).ok()?;
            Some(symbol())
        }
    }
}

/// Platform file name of the hook library next to the running executable
pub fn default_library_path() -> Result<PathBuf, LoadError> {
    let exe = std::env::current_exe()?;
    let dir = exe.parent().map(Path::to_path_buf).unwrap_or_default();
    Ok(dir.join(libloading::library_filename(HOOK_LIBRARY_NAME)))
}

/// Load a hook library, running its attach entry point
pub fn load_hook(path: &Path) -> Result<LoadedHook, LoadError> {
    if !path.exists() {
        return Err(LoadError::NotFound(path.to_path_buf()));
    }

    log::debug!("Loading hook library: {:?}", path);
    let library = unsafe { Library::new(path) }.map_err(|source| LoadError::Rejected {
        path: path.to_path_buf(),
        source,
    })?;

    Ok(LoadedHook { library })
}

/// Result of loading a hook library once
#[derive(Debug, Clone, Serialize)]
pub struct ProbeReport {
    pub library: PathBuf,
    pub loaded: bool,
    pub outcome_code: Option<i32>,
    /// Outcome kind decoded from the code; `None` if unknown or not run
    pub kind: Option<OutcomeKind>,
    pub outcome: Option<String>,
    pub error: Option<String>,
}

impl ProbeReport {
    fn from_load(path: &Path, result: Result<LoadedHook, LoadError>) -> Self {
        match result {
            Ok(hook) => Self::loaded(path, hook.last_outcome()),
            Err(e) => Self {
                library: path.to_path_buf(),
                loaded: false,
                outcome_code: None,
                kind: None,
                outcome: None,
                error: Some(e.to_string()),
            },
        }
    }

    /// Report for an accepted library that recorded `code`, if it exports one
    fn loaded(path: &Path, code: Option<i32>) -> Self {
        Self {
            library: path.to_path_buf(),
            loaded: true,
            outcome_code: code,
            kind: code.and_then(OutcomeKind::from_code),
            outcome: code.map(|c| HookOutcome::describe_code(c).to_string()),
            error: None,
        }
    }

    /// Plain-text rendering for the terminal
    pub fn render(&self) -> String {
        let mut out = format!("Library: {}\n", self.library.display());
        if self.loaded {
            out.push_str("Loader:  accepted\n");
        } else {
            out.push_str("Loader:  rejected\n");
        }
        match (&self.outcome, self.outcome_code) {
            (Some(outcome), Some(code)) => {
                out.push_str(&format!("Outcome: {} (code {})\n", outcome, code))
            }
            _ => out.push_str("Outcome: unavailable\n"),
        }
        if let Some(error) = &self.error {
            out.push_str(&format!("Error:   {}\n", error));
        }
        out
    }
}

/// Load a hook library and report what happened
///
/// The outcome is read before the handle drops, so the detach entry point
/// that runs on unload does not overwrite it.
pub fn probe(path: &Path) -> ProbeReport {
    let report = ProbeReport::from_load(path, load_hook(path));
    log::info!(
        "Probe of {:?}: loaded={} outcome={:?}",
        path,
        report.loaded,
        report.outcome_code
    );
    report
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_library() {
        let path = Path::new("definitely/not/here/libforce_flush_hook.so");
        match load_hook(path) {
            Err(LoadError::NotFound(p)) => assert_eq!(p, path),
            Err(e) => panic!("unexpected error: {}", e),
            Ok(_) => panic!("missing library loaded"),
        }

        let report = probe(path);
        assert!(!report.loaded);
        assert!(report.render().contains("Loader:  rejected"));
        assert!(report.error.unwrap().contains("not found"));
    }

    #[test]
    fn test_default_library_path_uses_platform_name() {
        let path = default_library_path().unwrap();
        let name = path.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.contains(HOOK_LIBRARY_NAME));
    }

    #[test]
    fn test_report_rendering() {
        let report = ProbeReport {
            library: PathBuf::from("hook.dll"),
            loaded: true,
            outcome_code: Some(0),
            kind: OutcomeKind::from_code(0),
            outcome: Some(HookOutcome::describe_code(0).to_string()),
            error: None,
        };
        let text = report.render();
        assert!(text.contains("Loader:  accepted"));
        assert!(text.contains("Outcome: loaded (stdout flushed) (code 0)"));

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["loaded"], true);
        assert_eq!(json["outcome_code"], 0);
        assert_eq!(json["kind"], "loaded");
    }

    #[test]
    fn test_report_from_recorded_codes() {
        let hook_loaded = |code: i32| ProbeReport::loaded(Path::new("hook.so"), Some(code));

        let declined = hook_loaded(2);
        assert_eq!(declined.kind, Some(OutcomeKind::Declined));
        assert!(!declined.kind.unwrap().is_success());

        let not_run = hook_loaded(HookOutcome::NOT_RUN);
        assert_eq!(not_run.kind, None);
        assert!(not_run.render().contains("Outcome: hook not run (code -1)"));

        // A library without the outcome export still loads
        let foreign = ProbeReport::loaded(Path::new("other.so"), None);
        assert!(foreign.loaded);
        assert_eq!(foreign.kind, None);
    }
}
