//! Buffered-output demonstration
//!
//! A child process writes a line through C stdio. With stdout on a pipe the
//! runtime buffers it fully, and the child then exits with `_exit`, which skips
//! the stdio flush. Without the hook the line is lost; with the hook loaded
//! after the write, the attach flush pushes it into the pipe first.

use crate::loader::load_hook;
use anyhow::{Context, Result};
use force_flush_hook::CrtStdout;
use std::ffi::CString;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::Duration;

/// Name of the hidden subcommand the child runs
pub const CHATTER_COMMAND: &str = "chatter";

/// What one child run delivered to the pipe
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DemoRun {
    pub with_hook: bool,
    pub captured: String,
    pub exit_code: Option<i32>,
}

impl DemoRun {
    pub fn delivered(&self, message: &str) -> bool {
        self.captured.contains(message)
    }

    /// A child that crashed or exited non-zero proves nothing about buffering
    pub fn check_exit(&self) -> Result<()> {
        match self.exit_code {
            Some(0) => Ok(()),
            Some(code) => {
                anyhow::bail!("Demo child ({}) exited with status {}", self.label(), code)
            }
            None => anyhow::bail!("Demo child ({}) was terminated by a signal", self.label()),
        }
    }

    fn label(&self) -> &'static str {
        if self.with_hook {
            "with hook"
        } else {
            "without hook"
        }
    }
}

#[derive(Debug, Clone)]
pub struct DemoReport {
    pub message: String,
    pub without_hook: DemoRun,
    pub with_hook: DemoRun,
}

impl DemoReport {
    /// The hook made the difference: lost without it, delivered with it
    pub fn hook_flushed(&self) -> bool {
        !self.without_hook.delivered(&self.message) && self.with_hook.delivered(&self.message)
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        for run in [&self.without_hook, &self.with_hook] {
            let title = if run.with_hook {
                "WITH HOOK LOADED"
            } else {
                "WITHOUT HOOK"
            };
            out.push_str(&format!("======== {} ========\n", title));
            if run.captured.is_empty() {
                out.push_str("stdout: <nothing reached the pipe>\n");
            } else {
                out.push_str(&format!("stdout: {}\n", run.captured.trim_end()));
            }
            match run.exit_code {
                Some(code) => out.push_str(&format!("exit:   {}\n", code)),
                None => out.push_str("exit:   terminated by signal\n"),
            }
        }
        if self.hook_flushed() {
            out.push_str("\nResult: the hook flushed output that would otherwise be lost\n");
        } else {
            out.push_str("\nResult: no difference observed\n");
        }
        out
    }
}

/// Run the child once without and once with the hook library
pub fn run_demo(library: &Path, message: &str, hold_ms: u64) -> Result<DemoReport> {
    let exe = std::env::current_exe().context("Failed to locate the running executable")?;

    log::info!("Running demo child without the hook");
    let without_hook = run_child(&exe, None, message, hold_ms)?;
    without_hook.check_exit()?;

    log::info!("Running demo child with hook {:?}", library);
    let with_hook = run_child(&exe, Some(library), message, hold_ms)?;
    with_hook.check_exit()?;

    Ok(DemoReport {
        message: message.to_string(),
        without_hook,
        with_hook,
    })
}

fn run_child(exe: &Path, library: Option<&Path>, message: &str, hold_ms: u64) -> Result<DemoRun> {
    let mut command = Command::new(exe);
    command
        .arg("--quiet")
        .arg(CHATTER_COMMAND)
        .arg("--message")
        .arg(message)
        .arg("--hold-ms")
        .arg(hold_ms.to_string())
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::inherit());
    if let Some(library) = library {
        command.arg("--library").arg(library);
    }

    let output = command
        .output()
        .with_context(|| format!("Failed to run demo child {:?}", exe))?;
    log::debug!("Demo child exited with {:?}", output.status);

    Ok(DemoRun {
        with_hook: library.is_some(),
        captured: String::from_utf8_lossy(&output.stdout).into_owned(),
        exit_code: output.status.code(),
    })
}

/// Child side: buffer a line, optionally load the hook, then exit unflushed
pub fn run_chatter(message: &str, library: Option<PathBuf>, hold_ms: u64) -> Result<()> {
    let line = CString::new(format!("{}\n", message)).context("Message contains a NUL byte")?;
    let stream = CrtStdout::stream();
    if stream.is_null() {
        anyhow::bail!("C runtime stdout is not addressable on this platform");
    }

    unsafe {
        libc::fputs(line.as_ptr(), stream);
    }

    // Held until _exit; dropping it would run the detach entry point
    let _hook = match library {
        Some(path) => match load_hook(&path) {
            Ok(hook) => Some(hook),
            Err(e) => {
                log::warn!("{}", e);
                None
            }
        },
        None => None,
    };

    std::thread::sleep(Duration::from_millis(hold_ms));

    unsafe { libc::_exit(0) }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(with_hook: bool, captured: &str) -> DemoRun {
        DemoRun {
            with_hook,
            captured: captured.to_string(),
            exit_code: Some(0),
        }
    }

    #[test]
    fn test_failed_child_is_an_error() {
        let mut crashed = run(true, "");
        crashed.exit_code = None;
        let err = crashed.check_exit().unwrap_err();
        assert_eq!(err.to_string(), "Demo child (with hook) was terminated by a signal");

        let mut failed = run(false, "");
        failed.exit_code = Some(3);
        assert!(failed.check_exit().unwrap_err().to_string().contains("exited with status 3"));

        assert!(run(false, "").check_exit().is_ok());
    }

    #[test]
    fn test_hook_flushed() {
        let report = DemoReport {
            message: "hello".to_string(),
            without_hook: run(false, ""),
            with_hook: run(true, "hello\n"),
        };
        assert!(report.hook_flushed());

        let text = report.render();
        assert!(text.contains("stdout: <nothing reached the pipe>"));
        assert!(text.contains("stdout: hello"));
        assert!(text.contains("exit:   0"));
        assert!(text.contains("the hook flushed output"));
    }

    #[test]
    fn test_no_difference() {
        // A line-buffered or unbuffered stdout delivers either way
        let report = DemoReport {
            message: "hello".to_string(),
            without_hook: run(false, "hello\n"),
            with_hook: run(true, "hello\n"),
        };
        assert!(!report.hook_flushed());
        assert!(report.render().contains("no difference observed"));
    }
}
