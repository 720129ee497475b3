//! One numbered store file.

use std::io;
use std::sync::atomic::{AtomicU32, Ordering};

use crate::vfs::VfsFile;

/// An open store file: append/read/sync/truncate plus an outstanding-read
/// counter so cache eviction never closes a file out from under a read in
/// flight. The counter is raised and lowered by the store's read lease,
/// under the file cache lock.
pub(crate) struct StoreFile {
    index: u16,
    file: Box<dyn VfsFile>,
    reads: AtomicU32,
}

impl StoreFile {
    pub fn new(index: u16, file: Box<dyn VfsFile>) -> Self {
        Self {
            index,
            file,
            reads: AtomicU32::new(0),
        }
    }

    pub fn index(&self) -> u16 {
        self.index
    }

    pub fn begin_read(&self) {
        self.reads.fetch_add(1, Ordering::SeqCst);
    }

    pub fn end_read(&self) {
        self.reads.fetch_sub(1, Ordering::SeqCst);
    }

    pub fn outstanding_reads(&self) -> u32 {
        self.reads.load(Ordering::SeqCst)
    }

    pub fn read_at(&self, pos: u32, buf: &mut [u8]) -> io::Result<()> {
        self.file.read_at(pos as u64, buf)
    }

    pub fn append(&self, data: &[u8]) -> io::Result<()> {
        self.file.write(data)
    }

    pub fn truncate(&self, len: u64) -> io::Result<()> {
        self.file.truncate(len)
    }

    pub fn sync(&self) -> io::Result<()> {
        self.file.sync()
    }

    pub fn len(&self) -> io::Result<u64> {
        self.file.len()
    }
}
