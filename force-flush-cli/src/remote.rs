//! Flushing the stdout of another, already running process
//!
//! Windows only. The hook library's path is written into the target process
//! and a thread is started there at `LoadLibraryW`. The target's loader then
//! runs the hook's `DllMain`, so the flush happens on the target's own C
//! runtime. The thread's exit code is the module handle `LoadLibraryW`
//! returned, zero when the hook refused the load.

use anyhow::Result;
use serde::Serialize;
use std::path::{Path, PathBuf};

/// Result of loading the hook into another process
#[derive(Debug, Clone, Serialize)]
#[cfg_attr(not(windows), allow(dead_code))]
pub struct RemoteReport {
    pub pid: u32,
    pub library: PathBuf,
    /// The remote load succeeded, so the attach flush succeeded
    pub flushed: bool,
}

impl RemoteReport {
    pub fn render(&self) -> String {
        let verdict = if self.flushed {
            "accepted (stdout flushed)"
        } else {
            "rejected (flush failed or library refused)"
        };
        format!(
            "Process: {}\nLibrary: {}\nRemote load: {}\n",
            self.pid,
            self.library.display(),
            verdict
        )
    }
}

/// Load the hook library into process `pid`, running its attach flush there
///
/// `timeout_ms` bounds the wait for the remote load; `None` waits forever.
#[cfg(windows)]
pub fn flush_process(pid: u32, library: &Path, timeout_ms: Option<u64>) -> Result<RemoteReport> {
    use anyhow::Context;

    // The target resolves the path against its own working directory
    let library = std::path::absolute(library)
        .with_context(|| format!("Failed to resolve hook library path {:?}", library))?;
    verify_hook_library(&library)?;

    log::info!("Loading {:?} into process {}", library, pid);
    let flushed = windows::load_into(pid, &library, timeout_ms)?;

    Ok(RemoteReport {
        pid,
        library,
        flushed,
    })
}

#[cfg(not(windows))]
pub fn flush_process(pid: u32, library: &Path, _timeout_ms: Option<u64>) -> Result<RemoteReport> {
    anyhow::bail!(
        "Flushing another process (pid {}) is only supported on Windows; \
         load {:?} from inside the target process instead",
        pid,
        library
    )
}

/// Refuse to start a remote thread for anything but a force-flush hook
#[cfg(windows)]
fn verify_hook_library(library: &Path) -> Result<()> {
    let hook = crate::loader::load_hook(library)?;
    if hook.last_outcome().is_none() {
        anyhow::bail!("{:?} is not a force-flush hook library", library);
    }
    Ok(())
}

#[cfg(windows)]
mod windows {
    use anyhow::{anyhow, Result};
    use std::ffi::{c_void, OsStr};
    use std::os::windows::ffi::OsStrExt;
    use std::path::Path;
    use std::{io, mem, ptr};
    use windows_sys::Win32::Foundation::{
        CloseHandle, ERROR_NOT_ALL_ASSIGNED, FALSE, HANDLE, LUID, WAIT_OBJECT_0,
    };
    use windows_sys::Win32::Security::{
        AdjustTokenPrivileges, LookupPrivilegeValueW, LUID_AND_ATTRIBUTES, SE_PRIVILEGE_ENABLED,
        TOKEN_ADJUST_PRIVILEGES, TOKEN_PRIVILEGES, TOKEN_QUERY,
    };
    use windows_sys::Win32::System::Diagnostics::Debug::WriteProcessMemory;
    use windows_sys::Win32::System::LibraryLoader::{GetModuleHandleW, GetProcAddress};
    use windows_sys::Win32::System::Memory::{
        VirtualAllocEx, VirtualFreeEx, MEM_COMMIT, MEM_RELEASE, MEM_RESERVE, PAGE_READWRITE,
    };
    use windows_sys::Win32::System::Threading::{
        CreateRemoteThread, GetCurrentProcess, GetExitCodeThread, OpenProcess, OpenProcessToken,
        WaitForSingleObject, INFINITE, PROCESS_CREATE_THREAD, PROCESS_QUERY_INFORMATION,
        PROCESS_VM_OPERATION, PROCESS_VM_READ, PROCESS_VM_WRITE,
    };

    type ThreadStart = unsafe extern "system" fn(*mut c_void) -> u32;

    fn wide(s: &OsStr) -> Vec<u16> {
        s.encode_wide().chain(Some(0)).collect()
    }

    fn last_error(call: &str) -> anyhow::Error {
        anyhow!("{} failed: {}", call, io::Error::last_os_error())
    }

    /// Closes the handle on drop
    struct OwnedHandle(HANDLE);

    impl Drop for OwnedHandle {
        fn drop(&mut self) {
            if !self.0.is_null() {
                unsafe { CloseHandle(self.0) };
            }
        }
    }

    /// SeDebugPrivilege enabled on this process's token, restored on drop
    struct DebugPrivilege {
        token: OwnedHandle,
        previous: TOKEN_PRIVILEGES,
    }

    impl DebugPrivilege {
        fn enable() -> Result<Self> {
            let mut token: HANDLE = ptr::null_mut();
            let opened = unsafe {
                OpenProcessToken(
                    GetCurrentProcess(),
                    TOKEN_ADJUST_PRIVILEGES | TOKEN_QUERY,
                    &mut token,
                )
            };
            if opened == 0 {
                return Err(last_error("OpenProcessToken"));
            }
            let token = OwnedHandle(token);

            let name = wide(OsStr::new("SeDebugPrivilege"));
            let mut luid: LUID = unsafe { mem::zeroed() };
            if unsafe { LookupPrivilegeValueW(ptr::null(), name.as_ptr(), &mut luid) } == 0 {
                return Err(last_error("LookupPrivilegeValueW"));
            }

            let requested = TOKEN_PRIVILEGES {
                PrivilegeCount: 1,
                Privileges: [LUID_AND_ATTRIBUTES {
                    Luid: luid,
                    Attributes: SE_PRIVILEGE_ENABLED,
                }],
            };
            let mut previous: TOKEN_PRIVILEGES = unsafe { mem::zeroed() };
            let mut previous_len = 0u32;
            let adjusted = unsafe {
                AdjustTokenPrivileges(
                    token.0,
                    FALSE,
                    &requested,
                    mem::size_of::<TOKEN_PRIVILEGES>() as u32,
                    &mut previous,
                    &mut previous_len,
                )
            };
            if adjusted == 0 {
                return Err(last_error("AdjustTokenPrivileges"));
            }

            // Succeeds without assigning when the account does not hold it
            if io::Error::last_os_error().raw_os_error() == Some(ERROR_NOT_ALL_ASSIGNED as i32) {
                log::warn!(
                    "SeDebugPrivilege is not held; only processes of this user can be opened"
                );
            }

            Ok(Self { token, previous })
        }
    }

    impl Drop for DebugPrivilege {
        fn drop(&mut self) {
            unsafe {
                AdjustTokenPrivileges(
                    self.token.0,
                    FALSE,
                    &self.previous,
                    0,
                    ptr::null_mut(),
                    ptr::null_mut(),
                );
            }
            log::debug!("Token privileges restored");
        }
    }

    /// Memory committed in the target process, released on drop
    struct RemoteBuffer {
        process: HANDLE,
        address: *mut c_void,
    }

    impl Drop for RemoteBuffer {
        fn drop(&mut self) {
            unsafe { VirtualFreeEx(self.process, self.address, 0, MEM_RELEASE) };
        }
    }

    /// Address of `LoadLibraryW`; kernel32 maps at the same base in every
    /// process of the session, so it is valid in the target too
    fn load_library_address() -> Result<ThreadStart> {
        let kernel32 = wide(OsStr::new("kernel32.dll"));
        let module = unsafe { GetModuleHandleW(kernel32.as_ptr()) };
        if module.is_null() {
            return Err(last_error("GetModuleHandleW(kernel32.dll)"));
        }

        let proc = unsafe { GetProcAddress(module, b"LoadLibraryW\0".as_ptr()) }
            .ok_or_else(|| last_error("GetProcAddress(LoadLibraryW)"))?;
        Ok(unsafe { mem::transmute::<unsafe extern "system" fn() -> isize, ThreadStart>(proc) })
    }

    /// Returns whether the remote `LoadLibraryW` produced a module
    pub fn load_into(pid: u32, library: &Path, timeout_ms: Option<u64>) -> Result<bool> {
        let _privilege = DebugPrivilege::enable()?;

        let access = PROCESS_CREATE_THREAD
            | PROCESS_QUERY_INFORMATION
            | PROCESS_VM_OPERATION
            | PROCESS_VM_READ
            | PROCESS_VM_WRITE;
        let process = unsafe { OpenProcess(access, FALSE, pid) };
        if process.is_null() {
            return Err(last_error(&format!("OpenProcess({})", pid)));
        }
        let process = OwnedHandle(process);

        let path = wide(library.as_os_str());
        let size = path.len() * mem::size_of::<u16>();
        let address = unsafe {
            VirtualAllocEx(
                process.0,
                ptr::null(),
                size,
                MEM_COMMIT | MEM_RESERVE,
                PAGE_READWRITE,
            )
        };
        if address.is_null() {
            return Err(last_error("VirtualAllocEx"));
        }
        let buffer = RemoteBuffer {
            process: process.0,
            address,
        };

        let mut written = 0usize;
        let wrote = unsafe {
            WriteProcessMemory(
                process.0,
                address,
                path.as_ptr() as *const c_void,
                size,
                &mut written,
            )
        };
        if wrote == 0 || written != size {
            return Err(last_error("WriteProcessMemory"));
        }

        let start = load_library_address()?;
        let thread = unsafe {
            CreateRemoteThread(
                process.0,
                ptr::null(),
                0,
                Some(start),
                address,
                0,
                ptr::null_mut(),
            )
        };
        if thread.is_null() {
            return Err(last_error("CreateRemoteThread"));
        }
        let thread = OwnedHandle(thread);
        log::debug!("Remote thread started in process {}", pid);

        let wait_ms = match timeout_ms {
            Some(ms) => ms.min(u64::from(INFINITE - 1)) as u32,
            None => INFINITE,
        };
        if unsafe { WaitForSingleObject(thread.0, wait_ms) } != WAIT_OBJECT_0 {
            // The remote thread may still be reading the path
            mem::forget(buffer);
            anyhow::bail!("Remote load in process {} did not finish in time", pid);
        }

        let mut exit_code = 0u32;
        if unsafe { GetExitCodeThread(thread.0, &mut exit_code) } == 0 {
            return Err(last_error("GetExitCodeThread"));
        }
        // Only the low 32 bits of the module handle survive as the exit code
        Ok(exit_code != 0)
    }
}
