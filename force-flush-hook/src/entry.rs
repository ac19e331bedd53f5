//! Load-time entry points
//!
//! Windows calls `DllMain` for every lifecycle event and honors its return
//! value on process attach. ELF and Mach-O loaders run constructor tables
//! instead and cannot fail a load, so there the outcome is only recorded.
//!
//! Nothing in this module logs or allocates: it runs under the loader lock.

use crate::config::HookConfig;
use crate::flush::CrtStdout;
use crate::hook::on_load;
use crate::types::{HookOutcome, LoadReason};
use std::sync::atomic::{AtomicI32, Ordering};

static LAST_OUTCOME: AtomicI32 = AtomicI32::new(HookOutcome::NOT_RUN);

/// Run the hook with the compiled configuration
///
/// Only process attach and detach are recorded, so a thread event never
/// replaces the attach outcome.
pub fn dispatch(reason: LoadReason) -> HookOutcome {
    let outcome = on_load(reason, &mut CrtStdout, &HookConfig::compiled());
    if reason.is_process_level() {
        LAST_OUTCOME.store(outcome.code(), Ordering::SeqCst);
    }
    outcome
}

/// Outcome code of the most recent entry point call in this image
///
/// Returns [`HookOutcome::NOT_RUN`] if no entry point has fired yet.
#[no_mangle]
pub extern "C" fn force_flush_last_outcome() -> i32 {
    LAST_OUTCOME.load(Ordering::SeqCst)
}

#[cfg(windows)]
mod windows {
    use super::dispatch;
    use crate::types::LoadReason;
    use std::ffi::c_void;
    use windows_sys::Win32::Foundation::{BOOL, FALSE, HINSTANCE, TRUE};

    #[no_mangle]
    #[allow(non_snake_case)]
    pub extern "system" fn DllMain(
        _module: HINSTANCE,
        reason: u32,
        _reserved: *mut c_void,
    ) -> BOOL {
        if dispatch(LoadReason::from_raw(reason)).is_success() {
            TRUE
        } else {
            FALSE
        }
    }
}

#[cfg(any(target_os = "linux", target_os = "android", target_os = "freebsd"))]
mod elf {
    use super::dispatch;
    use crate::types::LoadReason;

    extern "C" fn attach() {
        dispatch(LoadReason::ProcessAttach);
    }

    extern "C" fn detach() {
        dispatch(LoadReason::ProcessDetach);
    }

    #[used]
    #[link_section = ".init_array"]
    static ATTACH: extern "C" fn() = attach;

    #[used]
    #[link_section = ".fini_array"]
    static DETACH: extern "C" fn() = detach;
}

#[cfg(any(target_os = "macos", target_os = "ios"))]
mod mach_o {
    use super::dispatch;
    use crate::types::LoadReason;

    extern "C" fn attach() {
        dispatch(LoadReason::ProcessAttach);
    }

    #[used]
    #[link_section = "__DATA,__mod_init_func"]
    static ATTACH: extern "C" fn() = attach;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dispatch_records_process_events_only() {
        let before = force_flush_last_outcome();

        dispatch(LoadReason::ThreadAttach);
        dispatch(LoadReason::ThreadDetach);
        assert_eq!(force_flush_last_outcome(), before);

        let outcome = dispatch(LoadReason::ProcessDetach);
        assert_eq!(force_flush_last_outcome(), outcome.code());

        #[cfg(not(feature = "conventional-detach"))]
        assert_eq!(outcome, HookOutcome::Declined { reason: LoadReason::ProcessDetach });
    }
}
