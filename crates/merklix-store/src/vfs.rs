//! Filesystem port consumed by the store.
//!
//! The store never touches `std::fs` directly; it goes through [`Vfs`] so
//! that crash and recovery behaviour can be exercised against the
//! in-memory implementation in [`crate::memory`]. [`DiskFs`] is the
//! production implementation over `std::fs`.

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::os::unix::fs::{DirBuilderExt, FileExt};
use std::path::{Path, PathBuf};

/// Subset of `lstat` the store needs.
#[derive(Clone, Copy, Debug)]
pub struct FileStat {
    pub is_file: bool,
    pub size: u64,
}

/// How a file is opened.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OpenMode {
    /// Read-only; the file must exist.
    Read,
    /// Read plus append; created if absent.
    ReadAppend,
    /// Read plus write; used by recovery to truncate a torn tail.
    ReadWrite,
}

/// Filesystem operations the store requires.
///
/// Errors are `std::io::Error` and propagate verbatim; "directory not
/// empty" on [`Vfs::rmdir`] is distinguished through
/// `io::ErrorKind::DirectoryNotEmpty`.
pub trait Vfs: Send + Sync {
    /// Create a directory and all missing parents with the given mode.
    fn mkdirp(&self, path: &Path, mode: u32) -> io::Result<()>;

    /// List entry names in a directory.
    fn readdir(&self, path: &Path) -> io::Result<Vec<String>>;

    /// Stat an entry without following symlinks.
    fn lstat(&self, path: &Path) -> io::Result<FileStat>;

    /// Rename an entry (files and directories).
    fn rename(&self, from: &Path, to: &Path) -> io::Result<()>;

    /// Remove a file.
    fn unlink(&self, path: &Path) -> io::Result<()>;

    /// Remove an empty directory.
    fn rmdir(&self, path: &Path) -> io::Result<()>;

    /// Open a file. Closing happens on drop.
    fn open(&self, path: &Path, mode: OpenMode) -> io::Result<Box<dyn VfsFile>>;
}

/// One open file.
///
/// Reads are positional and do not disturb the append cursor; writes
/// always append. The handle is closed when dropped.
impl std::fmt::Debug for dyn VfsFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("dyn VfsFile")
    }
}

pub trait VfsFile: Send + Sync {
    /// Read exactly `buf.len()` bytes starting at `offset`.
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> io::Result<()>;

    /// Append bytes at the end of the file.
    fn write(&self, data: &[u8]) -> io::Result<()>;

    /// Truncate the file to `len` bytes.
    fn truncate(&self, len: u64) -> io::Result<()>;

    /// Flush file contents to stable storage.
    fn sync(&self) -> io::Result<()>;

    /// Current file size in bytes.
    fn len(&self) -> io::Result<u64>;
}

/// Production filesystem over `std::fs`.
#[derive(Clone, Copy, Debug, Default)]
pub struct DiskFs;

impl Vfs for DiskFs {
    fn mkdirp(&self, path: &Path, mode: u32) -> io::Result<()> {
        fs::DirBuilder::new().recursive(true).mode(mode).create(path)
    }

    fn readdir(&self, path: &Path) -> io::Result<Vec<String>> {
        let mut names = Vec::new();
        for entry in fs::read_dir(path)? {
            let entry = entry?;
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
        Ok(names)
    }

    fn lstat(&self, path: &Path) -> io::Result<FileStat> {
        let meta = fs::symlink_metadata(path)?;
        Ok(FileStat {
            is_file: meta.is_file(),
            size: meta.len(),
        })
    }

    fn rename(&self, from: &Path, to: &Path) -> io::Result<()> {
        fs::rename(from, to)
    }

    fn unlink(&self, path: &Path) -> io::Result<()> {
        fs::remove_file(path)
    }

    fn rmdir(&self, path: &Path) -> io::Result<()> {
        fs::remove_dir(path)
    }

    fn open(&self, path: &Path, mode: OpenMode) -> io::Result<Box<dyn VfsFile>> {
        let file = match mode {
            OpenMode::Read => OpenOptions::new().read(true).open(path)?,
            OpenMode::ReadAppend => OpenOptions::new()
                .read(true)
                .append(true)
                .create(true)
                .open(path)?,
            OpenMode::ReadWrite => OpenOptions::new().read(true).write(true).open(path)?,
        };
        Ok(Box::new(DiskFile {
            file,
            path: path.to_path_buf(),
        }))
    }
}

struct DiskFile {
    file: fs::File,
    path: PathBuf,
}

impl VfsFile for DiskFile {
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> io::Result<()> {
        self.file.read_exact_at(buf, offset)
    }

    fn write(&self, data: &[u8]) -> io::Result<()> {
        // File opened with append; (&File) implements Write.
        (&self.file).write_all(data)
    }

    fn truncate(&self, len: u64) -> io::Result<()> {
        self.file.set_len(len)
    }

    fn sync(&self) -> io::Result<()> {
        self.file.sync_all()
    }

    fn len(&self) -> io::Result<u64> {
        Ok(self.file.metadata()?.len())
    }
}

impl std::fmt::Debug for DiskFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiskFile").field("path", &self.path).finish()
    }
}
