//! In-memory filesystem implementing the [`Vfs`] port.
//!
//! Intended for tests and embedding: crash scenarios are simulated by
//! reopening a store over the same `MemFs` after truncating or corrupting
//! a file through the port.

use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use crate::vfs::{FileStat, OpenMode, Vfs, VfsFile};

type FileData = Arc<RwLock<Vec<u8>>>;

#[derive(Default)]
struct MemState {
    dirs: Vec<PathBuf>,
    files: HashMap<PathBuf, FileData>,
}

/// In-memory, `HashMap`-based filesystem.
///
/// All file contents are shared behind `RwLock`s, so handles opened before
/// a rename or unlink keep working on the old data, mirroring POSIX.
#[derive(Default)]
pub struct MemFs {
    state: RwLock<MemState>,
}

impl MemFs {
    /// Create a new empty in-memory filesystem.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of files currently present.
    pub fn file_count(&self) -> usize {
        self.state.read().expect("lock poisoned").files.len()
    }

    fn not_found() -> io::Error {
        io::Error::new(io::ErrorKind::NotFound, "no such file or directory")
    }
}

impl Vfs for MemFs {
    fn mkdirp(&self, path: &Path, _mode: u32) -> io::Result<()> {
        let mut state = self.state.write().expect("lock poisoned");
        let mut cur = PathBuf::new();
        for part in path.components() {
            cur.push(part);
            if !state.dirs.contains(&cur) {
                state.dirs.push(cur.clone());
            }
        }
        Ok(())
    }

    fn readdir(&self, path: &Path) -> io::Result<Vec<String>> {
        let state = self.state.read().expect("lock poisoned");
        if !state.dirs.iter().any(|d| d == path) {
            return Err(Self::not_found());
        }
        let mut names: Vec<String> = state
            .files
            .keys()
            .chain(state.dirs.iter())
            .filter(|p| p.parent() == Some(path))
            .filter_map(|p| p.file_name())
            .map(|n| n.to_string_lossy().into_owned())
            .collect();
        names.sort();
        names.dedup();
        Ok(names)
    }

    fn lstat(&self, path: &Path) -> io::Result<FileStat> {
        let state = self.state.read().expect("lock poisoned");
        if let Some(data) = state.files.get(path) {
            let size = data.read().expect("lock poisoned").len() as u64;
            return Ok(FileStat {
                is_file: true,
                size,
            });
        }
        if state.dirs.iter().any(|d| d == path) {
            return Ok(FileStat {
                is_file: false,
                size: 0,
            });
        }
        Err(Self::not_found())
    }

    fn rename(&self, from: &Path, to: &Path) -> io::Result<()> {
        let mut state = self.state.write().expect("lock poisoned");
        if let Some(data) = state.files.remove(from) {
            state.files.insert(to.to_path_buf(), data);
            return Ok(());
        }
        let dir_pos = state.dirs.iter().position(|d| d == from);
        match dir_pos {
            Some(pos) => {
                state.dirs[pos] = to.to_path_buf();
                // Move every entry under the renamed directory.
                let moved: Vec<(PathBuf, FileData)> = state
                    .files
                    .iter()
                    .filter(|(p, _)| p.starts_with(from))
                    .map(|(p, d)| (p.clone(), Arc::clone(d)))
                    .collect();
                for (old, data) in moved {
                    let rel = old.strip_prefix(from).expect("checked prefix").to_path_buf();
                    state.files.remove(&old);
                    state.files.insert(to.join(rel), data);
                }
                for dir in state.dirs.iter_mut() {
                    if dir.starts_with(from) && dir != to {
                        let rel = dir.strip_prefix(from).expect("checked prefix").to_path_buf();
                        *dir = to.join(rel);
                    }
                }
                Ok(())
            }
            None => Err(Self::not_found()),
        }
    }

    fn unlink(&self, path: &Path) -> io::Result<()> {
        let mut state = self.state.write().expect("lock poisoned");
        state.files.remove(path).map(|_| ()).ok_or_else(Self::not_found)
    }

    fn rmdir(&self, path: &Path) -> io::Result<()> {
        let mut state = self.state.write().expect("lock poisoned");
        let pos = state
            .dirs
            .iter()
            .position(|d| d == path)
            .ok_or_else(Self::not_found)?;
        let occupied = state.files.keys().any(|p| p.starts_with(path))
            || state.dirs.iter().any(|d| d != path && d.starts_with(path));
        if occupied {
            return Err(io::Error::new(
                io::ErrorKind::DirectoryNotEmpty,
                "directory not empty",
            ));
        }
        state.dirs.remove(pos);
        Ok(())
    }

    fn open(&self, path: &Path, mode: OpenMode) -> io::Result<Box<dyn VfsFile>> {
        let mut state = self.state.write().expect("lock poisoned");
        let data = match state.files.get(path) {
            Some(data) => Arc::clone(data),
            None if mode == OpenMode::ReadAppend => {
                let data: FileData = Arc::new(RwLock::new(Vec::new()));
                state.files.insert(path.to_path_buf(), Arc::clone(&data));
                data
            }
            None => return Err(Self::not_found()),
        };
        Ok(Box::new(MemFile { data }))
    }
}

struct MemFile {
    data: FileData,
}

impl VfsFile for MemFile {
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> io::Result<()> {
        let data = self.data.read().expect("lock poisoned");
        let start = offset as usize;
        let end = start + buf.len();
        if end > data.len() {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "read past end of file",
            ));
        }
        buf.copy_from_slice(&data[start..end]);
        Ok(())
    }

    fn write(&self, bytes: &[u8]) -> io::Result<()> {
        self.data
            .write()
            .expect("lock poisoned")
            .extend_from_slice(bytes);
        Ok(())
    }

    fn truncate(&self, len: u64) -> io::Result<()> {
        let mut data = self.data.write().expect("lock poisoned");
        if (len as usize) < data.len() {
            data.truncate(len as usize);
        }
        Ok(())
    }

    fn sync(&self) -> io::Result<()> {
        Ok(())
    }

    fn len(&self) -> io::Result<u64> {
        Ok(self.data.read().expect("lock poisoned").len() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mkdirp_creates_parents() {
        let fs = MemFs::new();
        fs.mkdirp(Path::new("/a/b/c"), 0o750).unwrap();
        assert!(!fs.lstat(Path::new("/a/b")).unwrap().is_file);
        assert!(!fs.lstat(Path::new("/a/b/c")).unwrap().is_file);
    }

    #[test]
    fn append_and_read() {
        let fs = MemFs::new();
        fs.mkdirp(Path::new("/db"), 0o750).unwrap();
        let file = fs
            .open(Path::new("/db/0000000001"), OpenMode::ReadAppend)
            .unwrap();
        file.write(b"abcdef").unwrap();
        let mut buf = [0u8; 3];
        file.read_at(2, &mut buf).unwrap();
        assert_eq!(&buf, b"cde");
    }

    #[test]
    fn read_past_end_errors() {
        let fs = MemFs::new();
        fs.mkdirp(Path::new("/db"), 0o750).unwrap();
        let file = fs.open(Path::new("/db/f"), OpenMode::ReadAppend).unwrap();
        file.write(b"ab").unwrap();
        let mut buf = [0u8; 3];
        let err = file.read_at(0, &mut buf).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    }

    #[test]
    fn truncate_discards_tail() {
        let fs = MemFs::new();
        fs.mkdirp(Path::new("/db"), 0o750).unwrap();
        let file = fs.open(Path::new("/db/f"), OpenMode::ReadAppend).unwrap();
        file.write(b"abcdef").unwrap();
        file.truncate(2).unwrap();
        assert_eq!(file.len().unwrap(), 2);
        // Growing via truncate is a no-op.
        file.truncate(100).unwrap();
        assert_eq!(file.len().unwrap(), 2);
    }

    #[test]
    fn readdir_lists_files_and_dirs() {
        let fs = MemFs::new();
        fs.mkdirp(Path::new("/db/sub"), 0o750).unwrap();
        fs.open(Path::new("/db/0000000001"), OpenMode::ReadAppend)
            .unwrap();
        let names = fs.readdir(Path::new("/db")).unwrap();
        assert_eq!(names, vec!["0000000001".to_string(), "sub".to_string()]);
    }

    #[test]
    fn rmdir_distinguishes_not_empty() {
        let fs = MemFs::new();
        fs.mkdirp(Path::new("/db"), 0o750).unwrap();
        fs.open(Path::new("/db/f"), OpenMode::ReadAppend).unwrap();
        let err = fs.rmdir(Path::new("/db")).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::DirectoryNotEmpty);
        fs.unlink(Path::new("/db/f")).unwrap();
        fs.rmdir(Path::new("/db")).unwrap();
        assert!(fs.lstat(Path::new("/db")).is_err());
    }

    #[test]
    fn rename_moves_directory_contents() {
        let fs = MemFs::new();
        fs.mkdirp(Path::new("/db"), 0o750).unwrap();
        let f = fs.open(Path::new("/db/f"), OpenMode::ReadAppend).unwrap();
        f.write(b"x").unwrap();
        fs.rename(Path::new("/db"), Path::new("/gone")).unwrap();
        assert!(fs.lstat(Path::new("/db")).is_err());
        assert_eq!(fs.lstat(Path::new("/gone/f")).unwrap().size, 1);
    }
}
