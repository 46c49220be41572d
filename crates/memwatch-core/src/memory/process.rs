//! Live emulator process access.

use std::cell::Cell;

use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::memory::MemoryStream;

/// A running process found by executable name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessInfo {
    pub pid: u32,
    pub name: String,
}

/// Open handle to a process with read/write access to its memory.
pub struct ProcessHandle {
    pub pid: u32,
    #[cfg(target_os = "windows")]
    handle: windows::Win32::Foundation::HANDLE,
    #[cfg(target_os = "linux")]
    mem: std::fs::File,
}

impl ProcessHandle {
    /// Find a process by executable name and open it.
    pub fn find_and_open(name: &str) -> Result<Self> {
        let info = find_process(name)?;
        info!("Found {} (pid {})", info.name, info.pid);
        Self::open(info.pid)
    }
}

/// Suspend every thread in order. If one fails, the threads already
/// suspended are resumed before the error is returned.
#[cfg_attr(not(target_os = "windows"), allow(dead_code))]
fn suspend_all<T: Copy + std::fmt::Debug>(
    threads: &[T],
    mut suspend: impl FnMut(T) -> Result<()>,
    mut resume: impl FnMut(T) -> Result<()>,
) -> Result<()> {
    for (index, &thread) in threads.iter().enumerate() {
        if let Err(e) = suspend(thread) {
            for &done in threads[..index].iter().rev() {
                if let Err(undo) = resume(done) {
                    debug!("Failed to resume thread {:?} after aborted suspend: {}", done, undo);
                }
            }
            return Err(e);
        }
    }
    Ok(())
}

/// Resume every thread, reporting the first failure once all were tried.
#[cfg_attr(not(target_os = "windows"), allow(dead_code))]
fn resume_all<T: Copy>(threads: &[T], mut resume: impl FnMut(T) -> Result<()>) -> Result<()> {
    let mut first_error = None;
    for &thread in threads {
        if let Err(e) = resume(thread) {
            first_error.get_or_insert(e);
        }
    }
    first_error.map_or(Ok(()), Err)
}

#[cfg(target_os = "windows")]
mod platform {
    use super::*;
    use std::ffi::c_void;
    use windows::Win32::Foundation::{CloseHandle, HANDLE};
    use windows::Win32::System::Diagnostics::Debug::{ReadProcessMemory, WriteProcessMemory};
    use windows::Win32::System::Diagnostics::ToolHelp::{
        CreateToolhelp32Snapshot, PROCESSENTRY32W, Process32FirstW, Process32NextW,
        TH32CS_SNAPPROCESS, TH32CS_SNAPTHREAD, THREADENTRY32, Thread32First, Thread32Next,
    };
    use windows::Win32::System::Threading::{
        OpenProcess, OpenThread, PROCESS_QUERY_INFORMATION, PROCESS_VM_OPERATION,
        PROCESS_VM_READ, PROCESS_VM_WRITE, ResumeThread, SuspendThread, THREAD_SUSPEND_RESUME,
    };

    pub fn find_process(name: &str) -> Result<ProcessInfo> {
        // SAFETY: snapshot handle is closed before returning; the entry struct
        // is initialized with its size as the API requires.
        unsafe {
            let snapshot = CreateToolhelp32Snapshot(TH32CS_SNAPPROCESS, 0)
                .map_err(|e| Error::ProcessNotFound(e.to_string()))?;

            let mut entry = PROCESSENTRY32W {
                dwSize: std::mem::size_of::<PROCESSENTRY32W>() as u32,
                ..Default::default()
            };

            let mut found = None;
            if Process32FirstW(snapshot, &mut entry).is_ok() {
                loop {
                    let len = entry
                        .szExeFile
                        .iter()
                        .position(|&c| c == 0)
                        .unwrap_or(entry.szExeFile.len());
                    let exe = String::from_utf16_lossy(&entry.szExeFile[..len]);
                    if exe.eq_ignore_ascii_case(name) {
                        found = Some(ProcessInfo {
                            pid: entry.th32ProcessID,
                            name: exe,
                        });
                        break;
                    }
                    if Process32NextW(snapshot, &mut entry).is_err() {
                        break;
                    }
                }
            }

            let _ = CloseHandle(snapshot);
            found.ok_or_else(|| Error::ProcessNotFound(name.to_string()))
        }
    }

    fn thread_ids(pid: u32) -> Result<Vec<u32>> {
        // SAFETY: same snapshot discipline as `find_process`.
        unsafe {
            let snapshot = CreateToolhelp32Snapshot(TH32CS_SNAPTHREAD, 0)
                .map_err(|e| Error::SuspendFailed(e.to_string()))?;

            let mut entry = THREADENTRY32 {
                dwSize: std::mem::size_of::<THREADENTRY32>() as u32,
                ..Default::default()
            };

            let mut ids = Vec::new();
            if Thread32First(snapshot, &mut entry).is_ok() {
                loop {
                    if entry.th32OwnerProcessID == pid {
                        ids.push(entry.th32ThreadID);
                    }
                    if Thread32Next(snapshot, &mut entry).is_err() {
                        break;
                    }
                }
            }

            let _ = CloseHandle(snapshot);
            Ok(ids)
        }
    }

    fn thread_action(tid: u32, action: unsafe fn(HANDLE) -> u32) -> Result<()> {
        // SAFETY: the thread handle is only used for the action and closed.
        unsafe {
            let thread = OpenThread(THREAD_SUSPEND_RESUME, false, tid)
                .map_err(|e| Error::SuspendFailed(format!("thread {}: {}", tid, e)))?;
            let previous = action(thread);
            let _ = CloseHandle(thread);
            if previous == u32::MAX {
                return Err(Error::SuspendFailed(format!("thread {}", tid)));
            }
        }
        Ok(())
    }

    unsafe fn suspend(thread: HANDLE) -> u32 {
        unsafe { SuspendThread(thread) }
    }

    unsafe fn resume(thread: HANDLE) -> u32 {
        unsafe { ResumeThread(thread) }
    }

    impl ProcessHandle {
        pub fn open(pid: u32) -> Result<Self> {
            // SAFETY: OpenProcess has no preconditions; the handle is closed on drop.
            let handle = unsafe {
                OpenProcess(
                    PROCESS_VM_READ
                        | PROCESS_VM_WRITE
                        | PROCESS_VM_OPERATION
                        | PROCESS_QUERY_INFORMATION,
                    false,
                    pid,
                )
            }
            .map_err(|e| Error::ProcessOpenFailed(format!("pid {}: {}", pid, e)))?;

            Ok(Self { pid, handle })
        }

        pub fn read_bytes(&self, address: u64, len: usize) -> Result<Vec<u8>> {
            let mut buffer = vec![0u8; len];
            let mut read = 0usize;
            // SAFETY: buffer is valid for `len` bytes.
            unsafe {
                ReadProcessMemory(
                    self.handle,
                    address as *const c_void,
                    buffer.as_mut_ptr() as *mut c_void,
                    len,
                    Some(&mut read),
                )
            }
            .map_err(|e| Error::read_failed(address, e.to_string()))?;

            if read != len {
                return Err(Error::read_failed(
                    address,
                    format!("short read ({} of {} bytes)", read, len),
                ));
            }
            Ok(buffer)
        }

        pub fn write_bytes(&self, address: u64, bytes: &[u8]) -> Result<()> {
            let mut written = 0usize;
            // SAFETY: bytes is valid for its length.
            unsafe {
                WriteProcessMemory(
                    self.handle,
                    address as *const c_void,
                    bytes.as_ptr() as *const c_void,
                    bytes.len(),
                    Some(&mut written),
                )
            }
            .map_err(|e| Error::write_failed(address, e.to_string()))?;

            if written != bytes.len() {
                return Err(Error::write_failed(
                    address,
                    format!("short write ({} of {} bytes)", written, bytes.len()),
                ));
            }
            Ok(())
        }

        pub fn suspend_threads(&self) -> Result<()> {
            let threads = thread_ids(self.pid)?;
            suspend_all(
                &threads,
                |tid| thread_action(tid, suspend),
                |tid| thread_action(tid, resume),
            )
        }

        pub fn resume_threads(&self) -> Result<()> {
            resume_all(&thread_ids(self.pid)?, |tid| thread_action(tid, resume))
        }
    }

    impl Drop for ProcessHandle {
        fn drop(&mut self) {
            // SAFETY: handle was returned by OpenProcess and is closed once.
            let _ = unsafe { CloseHandle(self.handle) };
        }
    }
}

#[cfg(target_os = "linux")]
mod platform {
    use super::*;
    use std::fs;
    use std::os::unix::fs::FileExt;

    pub fn find_process(name: &str) -> Result<ProcessInfo> {
        for entry in fs::read_dir("/proc")?.flatten() {
            let Some(pid) = entry
                .file_name()
                .to_str()
                .and_then(|s| s.parse::<u32>().ok())
            else {
                continue;
            };

            let Ok(comm) = fs::read_to_string(entry.path().join("comm")) else {
                continue;
            };
            let comm = comm.trim();
            if comm.eq_ignore_ascii_case(name) {
                return Ok(ProcessInfo {
                    pid,
                    name: comm.to_string(),
                });
            }
        }
        Err(Error::ProcessNotFound(name.to_string()))
    }

    impl ProcessHandle {
        pub fn open(pid: u32) -> Result<Self> {
            let mem = fs::OpenOptions::new()
                .read(true)
                .write(true)
                .open(format!("/proc/{}/mem", pid))
                .map_err(|e| Error::ProcessOpenFailed(format!("pid {}: {}", pid, e)))?;
            Ok(Self { pid, mem })
        }

        pub fn read_bytes(&self, address: u64, len: usize) -> Result<Vec<u8>> {
            let mut buffer = vec![0u8; len];
            self.mem
                .read_exact_at(&mut buffer, address)
                .map_err(|e| Error::read_failed(address, e.to_string()))?;
            Ok(buffer)
        }

        pub fn write_bytes(&self, address: u64, bytes: &[u8]) -> Result<()> {
            self.mem
                .write_all_at(bytes, address)
                .map_err(|e| Error::write_failed(address, e.to_string()))
        }

        // The emulator keeps running; a batch is only a logical boundary here.
        pub fn suspend_threads(&self) -> Result<()> {
            Ok(())
        }

        pub fn resume_threads(&self) -> Result<()> {
            Ok(())
        }
    }
}

#[cfg(not(any(target_os = "windows", target_os = "linux")))]
mod platform {
    use super::*;

    pub fn find_process(name: &str) -> Result<ProcessInfo> {
        Err(Error::ProcessNotFound(name.to_string()))
    }

    impl ProcessHandle {
        pub fn open(pid: u32) -> Result<Self> {
            Err(Error::ProcessOpenFailed(format!(
                "pid {}: unsupported platform",
                pid
            )))
        }

        pub fn read_bytes(&self, address: u64, _len: usize) -> Result<Vec<u8>> {
            Err(Error::read_failed(address, "unsupported platform"))
        }

        pub fn write_bytes(&self, address: u64, _bytes: &[u8]) -> Result<()> {
            Err(Error::write_failed(address, "unsupported platform"))
        }

        pub fn suspend_threads(&self) -> Result<()> {
            Ok(())
        }

        pub fn resume_threads(&self) -> Result<()> {
            Ok(())
        }
    }
}

pub use platform::find_process;

/// [`MemoryStream`] over a live emulator process.
pub struct ProcessStream {
    process: ProcessHandle,
    ram_start: u64,
    suspended: Cell<bool>,
}

impl ProcessStream {
    /// `ram_start` is the process address where emulated RAM begins.
    pub fn new(process: ProcessHandle, ram_start: u64) -> Self {
        Self {
            process,
            ram_start,
            suspended: Cell::new(false),
        }
    }

    pub fn pid(&self) -> u32 {
        self.process.pid
    }
}

impl MemoryStream for ProcessStream {
    fn read_process(&self, address: u64, len: usize) -> Result<Vec<u8>> {
        self.process.read_bytes(address, len)
    }

    fn write_process(&self, address: u64, bytes: &[u8]) -> Result<()> {
        self.process.write_bytes(address, bytes)
    }

    fn process_memory_offset(&self) -> u64 {
        self.ram_start
    }

    fn is_suspended(&self) -> bool {
        self.suspended.get()
    }

    fn suspend(&self) -> Result<()> {
        self.process.suspend_threads()?;
        self.suspended.set(true);
        debug!("Suspended pid {}", self.process.pid);
        Ok(())
    }

    fn resume(&self) -> Result<()> {
        let result = self.process.resume_threads();
        self.suspended.set(false);
        result?;
        debug!("Resumed pid {}", self.process.pid);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    #[test]
    fn test_failed_suspend_resumes_already_suspended_threads() {
        let log = RefCell::new(Vec::new());
        let result = suspend_all(
            &[1u32, 2, 3],
            |tid| {
                if tid == 2 {
                    return Err(Error::SuspendFailed(format!("thread {}", tid)));
                }
                log.borrow_mut().push(("suspend", tid));
                Ok(())
            },
            |tid| {
                log.borrow_mut().push(("resume", tid));
                Ok(())
            },
        );

        assert!(matches!(result, Err(Error::SuspendFailed(_))));
        assert_eq!(*log.borrow(), vec![("suspend", 1), ("resume", 1)]);
    }

    #[test]
    fn test_suspend_all_success() {
        let mut suspended = Vec::new();
        suspend_all(
            &[7u32, 8],
            |tid| {
                suspended.push(tid);
                Ok(())
            },
            |_| Ok(()),
        )
        .unwrap();
        assert_eq!(suspended, vec![7, 8]);
    }

    #[test]
    fn test_resume_tries_every_thread() {
        let mut resumed = Vec::new();
        let result = resume_all(&[1u32, 2, 3], |tid| {
            resumed.push(tid);
            if tid == 1 {
                Err(Error::SuspendFailed(format!("thread {}", tid)))
            } else {
                Ok(())
            }
        });

        assert!(matches!(result, Err(Error::SuspendFailed(msg)) if msg == "thread 1"));
        assert_eq!(resumed, vec![1, 2, 3]);
    }
}
