//! Core types for the load hook
//!
//! The host loader hands the hook a raw reason code and expects a boolean back.
//! These types give both sides a name so the decision logic can be tested
//! without a loader.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle event reported by the host loader
///
/// Raw values follow the Windows loader's `DLL_*` constants; the ELF and
/// Mach-O entry points synthesize the process-level ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LoadReason {
    /// The library is being unmapped from the process
    ProcessDetach,
    /// The library was just mapped into the process
    ProcessAttach,
    /// A new thread started in the process
    ThreadAttach,
    /// A thread is exiting cleanly
    ThreadDetach,
    /// A code this crate does not know about
    Unknown(u32),
}

impl LoadReason {
    /// The four reasons every loader protocol defines
    pub const ALL: [LoadReason; 4] = [
        LoadReason::ProcessAttach,
        LoadReason::ProcessDetach,
        LoadReason::ThreadAttach,
        LoadReason::ThreadDetach,
    ];

    /// Convert a raw loader reason code
    pub fn from_raw(code: u32) -> Self {
        match code {
            0 => LoadReason::ProcessDetach,
            1 => LoadReason::ProcessAttach,
            2 => LoadReason::ThreadAttach,
            3 => LoadReason::ThreadDetach,
            other => LoadReason::Unknown(other),
        }
    }

    /// Raw loader reason code
    pub fn as_raw(&self) -> u32 {
        match self {
            LoadReason::ProcessDetach => 0,
            LoadReason::ProcessAttach => 1,
            LoadReason::ThreadAttach => 2,
            LoadReason::ThreadDetach => 3,
            LoadReason::Unknown(code) => *code,
        }
    }

    /// True only for the event that triggers a flush
    pub fn is_process_attach(&self) -> bool {
        matches!(self, LoadReason::ProcessAttach)
    }

    /// Attach or detach of the whole library, as opposed to a single thread
    pub fn is_process_level(&self) -> bool {
        matches!(self, LoadReason::ProcessAttach | LoadReason::ProcessDetach)
    }
}

impl fmt::Display for LoadReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoadReason::ProcessDetach => write!(f, "process-detach"),
            LoadReason::ProcessAttach => write!(f, "process-attach"),
            LoadReason::ThreadAttach => write!(f, "thread-attach"),
            LoadReason::ThreadDetach => write!(f, "thread-detach"),
            LoadReason::Unknown(code) => write!(f, "unknown({})", code),
        }
    }
}

/// What the hook decided for one lifecycle event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "kebab-case")]
pub enum HookOutcome {
    /// Process attach, stdout flushed
    Loaded,
    /// Process attach, the flush primitive returned a non-zero status
    FlushFailed { status: i32 },
    /// Non-attach event reported as failure
    Declined { reason: LoadReason },
    /// Non-attach event reported as success
    Ignored { reason: LoadReason },
}

impl HookOutcome {
    /// Code reported before the hook has run
    pub const NOT_RUN: i32 = -1;

    /// The boolean the loader sees
    pub fn is_success(&self) -> bool {
        self.kind().is_success()
    }

    pub fn kind(&self) -> OutcomeKind {
        match self {
            HookOutcome::Loaded => OutcomeKind::Loaded,
            HookOutcome::FlushFailed { .. } => OutcomeKind::FlushFailed,
            HookOutcome::Declined { .. } => OutcomeKind::Declined,
            HookOutcome::Ignored { .. } => OutcomeKind::Ignored,
        }
    }

    /// Small integer form, stable across the C ABI
    ///
    /// Only the outcome kind survives; the flush status and reason are dropped.
    pub fn code(&self) -> i32 {
        self.kind().code()
    }

    /// Human-readable name of an outcome code
    pub fn describe_code(code: i32) -> &'static str {
        match OutcomeKind::from_code(code) {
            Some(kind) => kind.describe(),
            None if code == Self::NOT_RUN => "hook not run",
            None => "unrecognized outcome",
        }
    }
}

/// Outcome without its payload, as recovered from an outcome code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OutcomeKind {
    Loaded,
    FlushFailed,
    Declined,
    Ignored,
}

impl OutcomeKind {
    /// Inverse of [`OutcomeKind::code`]; `None` for [`HookOutcome::NOT_RUN`]
    /// and unrecognized values
    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            0 => Some(OutcomeKind::Loaded),
            1 => Some(OutcomeKind::FlushFailed),
            2 => Some(OutcomeKind::Declined),
            3 => Some(OutcomeKind::Ignored),
            _ => None,
        }
    }

    pub fn code(&self) -> i32 {
        match self {
            OutcomeKind::Loaded => 0,
            OutcomeKind::FlushFailed => 1,
            OutcomeKind::Declined => 2,
            OutcomeKind::Ignored => 3,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, OutcomeKind::Loaded | OutcomeKind::Ignored)
    }

    pub fn describe(&self) -> &'static str {
        match self {
            OutcomeKind::Loaded => "loaded (stdout flushed)",
            OutcomeKind::FlushFailed => "flush failed",
            OutcomeKind::Declined => "declined (non-attach event)",
            OutcomeKind::Ignored => "ignored (non-attach event)",
        }
    }
}

impl fmt::Display for HookOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HookOutcome::Loaded => write!(f, "loaded"),
            HookOutcome::FlushFailed { status } => write!(f, "flush failed (status {})", status),
            HookOutcome::Declined { reason } => write!(f, "declined {}", reason),
            HookOutcome::Ignored { reason } => write!(f, "ignored {}", reason),
        }
    }
}

/// Errors surfaced by the library API
#[derive(Debug, thiserror::Error)]
pub enum HookError {
    #[error("Unknown detach policy: {0}")]
    UnknownPolicy(String),
}
