//! Flushing the C runtime's standard output
//!
//! The buffer that matters belongs to the host's C runtime, not to Rust's
//! `std::io::Stdout`, so the flush goes through `fflush` on the runtime's own
//! `stdout` stream.

/// Something that can flush a stream and report a C-style status
///
/// `0` means success, anything else (usually `EOF`) means failure.
pub trait StreamFlusher {
    fn flush(&mut self) -> i32;
}

/// The C runtime's `stdout` stream
#[derive(Debug, Clone, Copy, Default)]
pub struct CrtStdout;

impl CrtStdout {
    /// Raw `FILE*` for the runtime's stdout
    ///
    /// Null on targets where the stream cannot be named; `fflush(NULL)` then
    /// flushes every output stream instead.
    pub fn stream() -> *mut libc::FILE {
        unsafe { crt::stdout_stream() }
    }
}

impl StreamFlusher for CrtStdout {
    fn flush(&mut self) -> i32 {
        unsafe { libc::fflush(Self::stream()) }
    }
}

#[cfg(any(target_os = "linux", target_os = "android"))]
mod crt {
    #[allow(non_upper_case_globals)]
    extern "C" {
        static mut stdout: *mut libc::FILE;
    }

    pub unsafe fn stdout_stream() -> *mut libc::FILE {
        stdout
    }
}

#[cfg(any(
    target_os = "macos",
    target_os = "ios",
    target_os = "freebsd",
    target_os = "netbsd",
    target_os = "openbsd",
    target_os = "dragonfly"
))]
mod crt {
    #[allow(non_upper_case_globals)]
    extern "C" {
        static mut __stdoutp: *mut libc::FILE;
    }

    pub unsafe fn stdout_stream() -> *mut libc::FILE {
        __stdoutp
    }
}

#[cfg(all(windows, target_env = "msvc"))]
mod crt {
    use std::os::raw::c_uint;

    extern "C" {
        // UCRT: index 0 is stdin, 1 stdout, 2 stderr
        fn __acrt_iob_func(index: c_uint) -> *mut libc::FILE;
    }

    pub unsafe fn stdout_stream() -> *mut libc::FILE {
        __acrt_iob_func(1)
    }
}

#[cfg(not(any(
    target_os = "linux",
    target_os = "android",
    target_os = "macos",
    target_os = "ios",
    target_os = "freebsd",
    target_os = "netbsd",
    target_os = "openbsd",
    target_os = "dragonfly",
    all(windows, target_env = "msvc")
)))]
mod crt {
    pub unsafe fn stdout_stream() -> *mut libc::FILE {
        std::ptr::null_mut()
    }
}
