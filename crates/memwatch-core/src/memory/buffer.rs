//! In-memory [`MemoryStream`] backed by a RAM image.
//!
//! Used for offline inspection of RAM dumps and as the stream in tests. The
//! buffer starts at `process_offset`, so absolute and RAM addressing can both
//! be exercised against it.

use std::cell::{Cell, RefCell};
use std::fs;
use std::path::Path;

use tracing::debug;

use crate::error::{Error, Result};
use crate::memory::MemoryStream;

pub struct BufferStream {
    data: RefCell<Vec<u8>>,
    process_offset: u64,
    suspended: Cell<bool>,
    suspend_calls: Cell<usize>,
    resume_calls: Cell<usize>,
    writes_fail: Cell<bool>,
}

impl BufferStream {
    /// Zero-filled RAM image of `size` bytes.
    pub fn new(size: usize) -> Self {
        Self::from_bytes(vec![0; size])
    }

    pub fn from_bytes(data: Vec<u8>) -> Self {
        Self {
            data: RefCell::new(data),
            process_offset: 0,
            suspended: Cell::new(false),
            suspend_calls: Cell::new(0),
            resume_calls: Cell::new(0),
            writes_fail: Cell::new(false),
        }
    }

    /// Load a raw RAM dump as written by the emulator.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let data = fs::read(&path)?;
        debug!(
            "Loaded RAM image {} ({} bytes)",
            path.as_ref().display(),
            data.len()
        );
        Ok(Self::from_bytes(data))
    }

    pub fn with_process_offset(mut self, offset: u64) -> Self {
        self.process_offset = offset;
        self
    }

    /// Make every subsequent write fail, as if the process had gone away.
    pub fn set_writes_fail(&self, fail: bool) {
        self.writes_fail.set(fail);
    }

    pub fn len(&self) -> usize {
        self.data.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.borrow().is_empty()
    }

    pub fn suspend_calls(&self) -> usize {
        self.suspend_calls.get()
    }

    pub fn resume_calls(&self) -> usize {
        self.resume_calls.get()
    }

    /// Copy of the whole image.
    pub fn snapshot(&self) -> Vec<u8> {
        self.data.borrow().clone()
    }

    fn range(&self, address: u64, len: usize) -> Option<std::ops::Range<usize>> {
        let start = usize::try_from(address.checked_sub(self.process_offset)?).ok()?;
        let end = start.checked_add(len)?;
        (end <= self.len()).then_some(start..end)
    }
}

impl MemoryStream for BufferStream {
    fn read_process(&self, address: u64, len: usize) -> Result<Vec<u8>> {
        let range = self
            .range(address, len)
            .ok_or_else(|| Error::read_failed(address, "outside of RAM image"))?;
        Ok(self.data.borrow()[range].to_vec())
    }

    fn write_process(&self, address: u64, bytes: &[u8]) -> Result<()> {
        if self.writes_fail.get() {
            return Err(Error::write_failed(address, "writes disabled"));
        }
        let range = self
            .range(address, bytes.len())
            .ok_or_else(|| Error::write_failed(address, "outside of RAM image"))?;
        self.data.borrow_mut()[range].copy_from_slice(bytes);
        Ok(())
    }

    fn process_memory_offset(&self) -> u64 {
        self.process_offset
    }

    fn is_suspended(&self) -> bool {
        self.suspended.get()
    }

    fn suspend(&self) -> Result<()> {
        self.suspend_calls.set(self.suspend_calls.get() + 1);
        self.suspended.set(true);
        Ok(())
    }

    fn resume(&self) -> Result<()> {
        self.resume_calls.set(self.resume_calls.get() + 1);
        self.suspended.set(false);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_read_write_within_bounds() {
        let stream = BufferStream::new(8).with_process_offset(0x100);
        stream.write_process(0x104, &[1, 2, 3, 4]).unwrap();
        assert_eq!(stream.read_process(0x104, 4).unwrap(), vec![1, 2, 3, 4]);
        assert_eq!(stream.snapshot(), vec![0, 0, 0, 0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_out_of_bounds_access_fails() {
        let stream = BufferStream::new(8).with_process_offset(0x100);
        assert!(stream.read_process(0xFF, 1).is_err());
        assert!(stream.read_process(0x106, 4).is_err());
        assert!(stream.write_process(0x108, &[0]).is_err());
    }

    #[test]
    fn test_write_failure_injection() {
        let stream = BufferStream::new(8);
        stream.set_writes_fail(true);
        assert!(stream.write_process(0, &[1]).is_err());
        stream.set_writes_fail(false);
        assert!(stream.write_process(0, &[1]).is_ok());
    }

    #[test]
    fn test_suspend_resume_counters() {
        let stream = BufferStream::new(4);
        stream.suspend().unwrap();
        assert!(stream.is_suspended());
        stream.resume().unwrap();
        assert!(!stream.is_suspended());
        assert_eq!(stream.suspend_calls(), 1);
        assert_eq!(stream.resume_calls(), 1);
    }

    #[test]
    fn test_load_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(&[0xDE, 0xAD, 0xBE, 0xEF]).unwrap();

        let stream = BufferStream::load(file.path()).unwrap();
        assert_eq!(stream.len(), 4);
        assert_eq!(stream.read_process(0, 2).unwrap(), vec![0xDE, 0xAD]);
    }
}
