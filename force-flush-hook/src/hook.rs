//! The load hook decision
//!
//! Process attach flushes stdout and succeeds exactly when the flush does.
//! Every other event leaves the stream alone and reports whatever the
//! configured [`DetachPolicy`] says.

use crate::config::{DetachPolicy, HookConfig};
use crate::flush::StreamFlusher;
use crate::types::{HookOutcome, LoadReason};

/// Decide the outcome of one lifecycle event
pub fn on_load<F: StreamFlusher + ?Sized>(
    reason: LoadReason,
    flusher: &mut F,
    config: &HookConfig,
) -> HookOutcome {
    if reason.is_process_attach() {
        return match flusher.flush() {
            0 => HookOutcome::Loaded,
            status => HookOutcome::FlushFailed { status },
        };
    }

    match config.detach_policy {
        DetachPolicy::Reject => HookOutcome::Declined { reason },
        DetachPolicy::Accept => HookOutcome::Ignored { reason },
    }
}

/// A flusher paired with its configuration
///
/// Remembers the most recent outcome so callers can inspect it after the
/// loader has moved on.
#[derive(Debug)]
pub struct LoadHook<F> {
    flusher: F,
    config: HookConfig,
    last: Option<HookOutcome>,
}

impl<F: StreamFlusher> LoadHook<F> {
    pub fn new(flusher: F, config: HookConfig) -> Self {
        Self {
            flusher,
            config,
            last: None,
        }
    }

    /// Handle one lifecycle event
    pub fn notify(&mut self, reason: LoadReason) -> HookOutcome {
        let outcome = on_load(reason, &mut self.flusher, &self.config);
        log::trace!("{} -> {}", reason, outcome);
        self.last = Some(outcome);
        outcome
    }

    /// Outcome of the most recent event, if any
    pub fn last_outcome(&self) -> Option<HookOutcome> {
        self.last
    }

    pub fn config(&self) -> &HookConfig {
        &self.config
    }

    pub fn flusher(&self) -> &F {
        &self.flusher
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Flusher that returns a fixed status and counts calls
    struct Scripted {
        status: i32,
        calls: usize,
    }

    impl StreamFlusher for Scripted {
        fn flush(&mut self) -> i32 {
            self.calls += 1;
            self.status
        }
    }

    fn scripted(status: i32) -> Scripted {
        Scripted { status, calls: 0 }
    }

    #[test]
    fn test_attach_follows_flush() {
        let config = HookConfig::new();

        let mut ok = scripted(0);
        assert_eq!(on_load(LoadReason::ProcessAttach, &mut ok, &config), HookOutcome::Loaded);
        assert_eq!(ok.calls, 1);

        let mut failing = scripted(-1);
        let outcome = on_load(LoadReason::ProcessAttach, &mut failing, &config);
        assert_eq!(outcome, HookOutcome::FlushFailed { status: -1 });
        assert!(!outcome.is_success());
    }

    #[test]
    fn test_non_attach_never_flushes() {
        for policy in [DetachPolicy::Reject, DetachPolicy::Accept] {
            let config = HookConfig::new().with_detach_policy(policy);
            let mut flusher = scripted(0);

            for reason in [
                LoadReason::ProcessDetach,
                LoadReason::ThreadAttach,
                LoadReason::ThreadDetach,
                LoadReason::Unknown(42),
            ] {
                let outcome = on_load(reason, &mut flusher, &config);
                assert_eq!(outcome.is_success(), policy == DetachPolicy::Accept);
            }
            assert_eq!(flusher.calls, 0);
        }
    }

    #[test]
    fn test_load_hook_remembers_last() {
        let mut hook = LoadHook::new(scripted(0), HookConfig::new());
        assert_eq!(hook.last_outcome(), None);

        hook.notify(LoadReason::ProcessAttach);
        assert_eq!(hook.last_outcome(), Some(HookOutcome::Loaded));

        hook.notify(LoadReason::ProcessDetach);
        assert_eq!(
            hook.last_outcome(),
            Some(HookOutcome::Declined { reason: LoadReason::ProcessDetach })
        );
        assert_eq!(hook.flusher().calls, 1);
    }
}
