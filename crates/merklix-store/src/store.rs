//! Directory of numbered append-only files holding nodes, values, and
//! meta records.
//!
//! A store is a prefix directory containing files named `0000000001`,
//! `0000000002`, … . Files are append-only: individual files are never
//! rewritten, only truncated during recovery or removed by
//! [`Store::destroy`]. All bytes of one commit batch pass through the
//! write buffer and land in file order, with the meta record last, so a
//! crash leaves at worst a torn tail that the next open truncates away.

use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, warn};

use merklix_types::{Digest, Hasher, DIGEST_SIZE};

use crate::buffer::{WriteBuffer, MAX_FILE_SIZE};
use crate::error::{StoreError, StoreResult};
use crate::file::StoreFile;
use crate::meta::{MetaRecord, META_MAGIC, META_SIZE};
use crate::pointer::NodePointer;
use crate::record::{InternalRecord, INTERNAL_SIZE};
use crate::vfs::{OpenMode, Vfs};

/// Highest usable file index; 0 is reserved.
pub const MAX_FILES: u16 = 0xffff;

/// Bound on concurrently open file handles.
pub const MAX_OPEN_FILES: usize = 32;

const DIR_MODE: u32 = 0o750;
const FILE_NAME_LEN: usize = 10;

/// Slab for the backwards recovery scan: the largest multiple of
/// [`META_SIZE`] not exceeding 1 MiB.
const SLAB_SIZE: u64 = ((1 << 20) / META_SIZE as u64) * META_SIZE as u64;

/// Store configuration.
#[derive(Clone, Debug)]
pub struct StoreOptions {
    /// Directory holding the numbered files.
    pub prefix: PathBuf,
    /// When `true` the store writes meta records at commit, recovers from
    /// them at open, and can look up historical roots. When `false` the
    /// caller is responsible for remembering roots and the store only
    /// appends nodes.
    pub standalone: bool,
    /// Seed for the eviction RNG; `None` seeds from entropy. Fixing the
    /// seed makes cache behaviour reproducible.
    pub eviction_seed: Option<u64>,
}

impl StoreOptions {
    pub fn new(prefix: impl Into<PathBuf>) -> Self {
        Self {
            prefix: prefix.into(),
            standalone: true,
            eviction_seed: None,
        }
    }
}

struct FileCache {
    open: HashMap<u16, Arc<StoreFile>>,
    /// Append target. Never evicted.
    current: u16,
}

struct RootState {
    /// Location and content of the newest valid meta record.
    last_meta: Option<(u16, u32, MetaRecord)>,
    /// Pointer to the current committed root; `None` is the NIL root.
    root: Option<NodePointer>,
    /// Committed root digest -> pointer, populated on commit and while
    /// walking the meta chain.
    cache: HashMap<Digest, NodePointer>,
}

/// Keeps a file's outstanding-read counter raised while a read is in
/// flight, so eviction (which requires zero outstanding reads, checked
/// under the cache lock) cannot close the handle underneath it.
struct ReadLease {
    file: Arc<StoreFile>,
}

impl ReadLease {
    /// Must be created while the file cache lock is held.
    fn new(file: Arc<StoreFile>) -> Self {
        file.begin_read();
        Self { file }
    }
}

impl Drop for ReadLease {
    fn drop(&mut self) {
        self.file.end_read();
    }
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store").finish_non_exhaustive()
    }
}

/// The append-only flat-file store.
pub struct Store {
    vfs: Arc<dyn Vfs>,
    hasher: Arc<dyn Hasher>,
    prefix: PathBuf,
    standalone: bool,
    files: Mutex<FileCache>,
    open_locks: Mutex<HashMap<u16, Arc<Mutex<()>>>>,
    buffer: Mutex<WriteBuffer>,
    roots: Mutex<RootState>,
    rng: Mutex<StdRng>,
}

impl Store {
    /// Open (or create) the store under `options.prefix`.
    ///
    /// Scans the prefix for store files, rejects gaps in the index
    /// sequence, and in standalone mode runs the recovery scan to locate
    /// the newest valid meta record, truncating any torn commit tail.
    pub fn open(
        vfs: Arc<dyn Vfs>,
        hasher: Arc<dyn Hasher>,
        options: StoreOptions,
    ) -> StoreResult<Self> {
        vfs.mkdirp(&options.prefix, DIR_MODE)?;
        let files = scan_files(vfs.as_ref(), &options.prefix)?;

        let (last_meta, current, current_size) = if options.standalone {
            recover(vfs.as_ref(), hasher.as_ref(), &options.prefix, &files)?
        } else {
            match files.last() {
                Some(&(index, size)) => (None, index, size),
                None => (None, 1, 0),
            }
        };

        if current_size > MAX_FILE_SIZE as u64 {
            return Err(StoreError::corrupt(format!(
                "store file {current} larger than the file size cap"
            )));
        }

        let path = store_file_path(&options.prefix, current);
        let file = vfs.open(&path, OpenMode::ReadAppend)?;
        let mut open = HashMap::new();
        open.insert(current, Arc::new(StoreFile::new(current, file)));

        let rng = match options.eviction_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        let store = Self {
            vfs,
            hasher,
            prefix: options.prefix,
            standalone: options.standalone,
            files: Mutex::new(FileCache {
                open,
                current,
            }),
            open_locks: Mutex::new(HashMap::new()),
            buffer: Mutex::new(WriteBuffer::new(current, current_size as u32)),
            roots: Mutex::new(RootState {
                last_meta,
                root: None,
                cache: HashMap::new(),
            }),
            rng: Mutex::new(rng),
        };
        store.resolve_state_root()?;
        Ok(store)
    }

    /// Whether this store maintains meta records.
    pub fn is_standalone(&self) -> bool {
        self.standalone
    }

    /// The store's prefix directory.
    pub fn prefix(&self) -> &Path {
        &self.prefix
    }

    /// Pointer to the current committed root; `None` is NIL.
    pub fn current_root(&self) -> Option<NodePointer> {
        self.roots.lock().expect("lock poisoned").root
    }

    /// Read `len` bytes at `(index, pos)`.
    pub fn read(&self, index: u16, pos: u32, len: usize) -> StoreResult<Vec<u8>> {
        if index == 0 {
            return Err(StoreError::corrupt("file index 0 is reserved"));
        }
        let lease = self.file_for_read(index)?;
        let mut buf = vec![0u8; len];
        lease.file.read_at(pos, &mut buf)?;
        Ok(buf)
    }

    /// Append bytes to the commit batch, returning the `(index, offset)`
    /// they will occupy once the batch is flushed.
    pub fn write(&self, bytes: &[u8]) -> StoreResult<(u16, u32)> {
        self.buffer.lock().expect("lock poisoned").write(bytes)
    }

    /// Flush the batch: pad and append the meta record (standalone),
    /// write every chunk to its file, and fsync each file touched. On
    /// success the given root becomes the current committed root.
    pub fn commit(&self, root: Option<NodePointer>) -> StoreResult<()> {
        let (chunks, new_meta) = {
            let mut buffer = self.buffer.lock().expect("lock poisoned");
            let mut new_meta = None;
            if self.standalone {
                buffer.pad_for_record(META_SIZE as u32)?;
                let (prev_index, prev_pos) = {
                    let roots = self.roots.lock().expect("lock poisoned");
                    roots
                        .last_meta
                        .map(|(index, pos, _)| (index, pos))
                        .unwrap_or((0, 0))
                };
                let record = MetaRecord {
                    prev_index,
                    prev_pos,
                    root_index: root.map(|r| r.index).unwrap_or(0),
                    root_pos: root.map(|r| r.pos).unwrap_or(0),
                    root_leaf: root.map(|r| r.leaf).unwrap_or(false),
                };
                let (meta_index, meta_pos) = buffer.position();
                buffer.write(&record.encode(self.hasher.as_ref())?)?;
                new_meta = Some((meta_index, meta_pos, record));
            }
            (buffer.flush(), new_meta)
        };

        let mut touched: Vec<Arc<StoreFile>> = Vec::new();
        for chunk in &chunks {
            let file = self.append_target(chunk.index)?;
            file.append(&chunk.data)?;
            if !touched.iter().any(|f| f.index() == chunk.index) {
                touched.push(file);
            }
        }
        for file in &touched {
            file.sync()?;
        }
        debug!(
            chunks = chunks.len(),
            files = touched.len(),
            standalone = self.standalone,
            "commit batch flushed"
        );

        let mut roots = self.roots.lock().expect("lock poisoned");
        if let Some(meta) = new_meta {
            roots.last_meta = Some(meta);
        }
        roots.root = root;
        if let Some(ptr) = root {
            roots.cache.insert(ptr.digest, ptr);
        }
        Ok(())
    }

    /// Resolve a root hash to a node pointer.
    ///
    /// `Digest::ZERO` (and the current root's own digest) resolve to the
    /// current state. Anything else consults the root cache and then
    /// walks the meta chain backwards, caching every root passed on the
    /// way. `Ok(None)` is the NIL root.
    pub fn get_root(&self, digest: &Digest) -> StoreResult<Option<NodePointer>> {
        let mut roots = self.roots.lock().expect("lock poisoned");
        if digest.is_zero() {
            return Ok(roots.root);
        }
        if let Some(root) = roots.root {
            if root.digest == *digest {
                return Ok(Some(root));
            }
        }
        if let Some(ptr) = roots.cache.get(digest) {
            return Ok(Some(*ptr));
        }
        if !self.standalone {
            return Err(StoreError::State(
                "historical root lookup requires standalone mode",
            ));
        }

        let mut cursor = match roots.last_meta {
            Some((_, _, record)) => record.prev(),
            None => None,
        };
        while let Some((meta_index, meta_pos)) = cursor {
            let record = self.read_meta(meta_index, meta_pos)?;
            if let Some((root_index, root_pos, root_leaf)) = record.root() {
                let root_digest = self.read_digest(root_index, root_pos, root_leaf)?;
                let ptr = NodePointer {
                    digest: root_digest,
                    index: root_index,
                    pos: root_pos,
                    leaf: root_leaf,
                };
                roots.cache.insert(root_digest, ptr);
                if root_digest == *digest {
                    return Ok(Some(ptr));
                }
            }
            cursor = record.prev();
        }
        Err(StoreError::MissingNode { root: *digest })
    }

    /// Sync the append target and close the store. Buffered bytes that
    /// were never committed are discarded.
    pub fn close(self) -> StoreResult<()> {
        {
            let buffer = self.buffer.lock().expect("lock poisoned");
            if !buffer.is_empty() {
                warn!(
                    bytes = buffer.written(),
                    "closing store with uncommitted buffered bytes"
                );
            }
        }
        let cache = self.files.lock().expect("lock poisoned");
        if let Some(current) = cache.open.get(&cache.current) {
            current.sync()?;
        }
        Ok(())
    }

    /// Remove a closed store: unlink every store file and remove the
    /// prefix directory. If foreign entries keep the directory occupied,
    /// rename the prefix to a random sibling instead (best effort).
    pub fn destroy(vfs: &dyn Vfs, prefix: &Path) -> StoreResult<()> {
        let names = vfs.readdir(prefix)?;
        for name in &names {
            if parse_file_name(name).is_some() {
                vfs.unlink(&prefix.join(name))?;
            }
        }
        match vfs.rmdir(prefix) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::DirectoryNotEmpty => {
                let base = prefix
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_else(|| "store".to_string());
                let tag: u32 = rand::thread_rng().gen();
                let target = prefix.with_file_name(format!("{base}.{tag:08x}"));
                warn!(?prefix, ?target, "prefix not empty; renaming aside");
                vfs.rename(prefix, &target)?;
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    #[cfg(test)]
    pub(crate) fn open_file_count(&self) -> usize {
        self.files.lock().expect("lock poisoned").open.len()
    }

    fn resolve_state_root(&self) -> StoreResult<()> {
        let meta_root = {
            let roots = self.roots.lock().expect("lock poisoned");
            roots.last_meta.and_then(|(_, _, record)| record.root())
        };
        if let Some((index, pos, leaf)) = meta_root {
            let digest = self.read_digest(index, pos, leaf)?;
            let ptr = NodePointer {
                digest,
                index,
                pos,
                leaf,
            };
            let mut roots = self.roots.lock().expect("lock poisoned");
            roots.root = Some(ptr);
            roots.cache.insert(digest, ptr);
        }
        Ok(())
    }

    fn read_meta(&self, index: u16, pos: u32) -> StoreResult<MetaRecord> {
        let data = self.read(index, pos, META_SIZE)?;
        MetaRecord::decode(self.hasher.as_ref(), &data).ok_or_else(|| {
            StoreError::corrupt(format!("invalid meta record at {index}:{pos}"))
        })
    }

    /// Digest of the node record at `(index, pos)`: a leaf record leads
    /// with its own digest; an internal record's digest is recomputed
    /// from its children's digests.
    fn read_digest(&self, index: u16, pos: u32, leaf: bool) -> StoreResult<Digest> {
        if leaf {
            let data = self.read(index, pos, DIGEST_SIZE)?;
            return Digest::from_slice(&data)
                .map_err(|_| StoreError::corrupt(format!("short node record at {index}:{pos}")));
        }
        let data = self.read(index, pos, INTERNAL_SIZE)?;
        let record = InternalRecord::decode(&data)?;
        Ok(record.digest(self.hasher.as_ref()))
    }

    fn file_for_read(&self, index: u16) -> StoreResult<ReadLease> {
        {
            let cache = self.files.lock().expect("lock poisoned");
            if let Some(file) = cache.open.get(&index) {
                return Ok(ReadLease::new(file.clone()));
            }
        }

        // Keyed lock so two concurrent opens of the same index stay
        // idempotent without serialising opens of different indices.
        let key = {
            let mut locks = self.open_locks.lock().expect("lock poisoned");
            locks.entry(index).or_default().clone()
        };
        let _serial = key.lock().expect("lock poisoned");

        {
            let cache = self.files.lock().expect("lock poisoned");
            if let Some(file) = cache.open.get(&index) {
                return Ok(ReadLease::new(file.clone()));
            }
        }

        self.evict_if_full();

        let path = store_file_path(&self.prefix, index);
        let file = self.vfs.open(&path, OpenMode::Read).map_err(|e| {
            if e.kind() == io::ErrorKind::NotFound {
                StoreError::MissingFile(index)
            } else {
                StoreError::Io(e)
            }
        })?;
        let file = Arc::new(StoreFile::new(index, file));

        let mut cache = self.files.lock().expect("lock poisoned");
        let lease = ReadLease::new(file.clone());
        cache.open.insert(index, file);
        Ok(lease)
    }

    /// Select a victim uniformly at random among open files that are not
    /// the append target and have no outstanding reads, and close it. If
    /// every file is busy the cache temporarily exceeds its bound.
    fn evict_if_full(&self) {
        let mut cache = self.files.lock().expect("lock poisoned");
        if cache.open.len() < MAX_OPEN_FILES {
            return;
        }
        let current = cache.current;
        let candidates: Vec<Arc<StoreFile>> = cache
            .open
            .values()
            .filter(|f| f.index() != current && f.outstanding_reads() == 0)
            .cloned()
            .collect();
        if candidates.is_empty() {
            warn!(
                open = cache.open.len(),
                "open-file cache over budget with no evictable file"
            );
            return;
        }
        let pick = self
            .rng
            .lock()
            .expect("lock poisoned")
            .gen_range(0..candidates.len());
        let victim = &candidates[pick];
        cache.open.remove(&victim.index());
        debug!(index = victim.index(), "evicted store file");
        // Dropping the last Arc closes the handle; zero outstanding reads
        // under the cache lock means no read holds another reference.
    }

    /// File that chunk `index` appends to, rolling the current file
    /// forward (sync, close, create next) as needed.
    fn append_target(&self, index: u16) -> StoreResult<Arc<StoreFile>> {
        let mut cache = self.files.lock().expect("lock poisoned");
        if index < cache.current {
            return Err(StoreError::corrupt("append chunk behind current file"));
        }
        while cache.current < index {
            if let Some(current) = cache.open.get(&cache.current) {
                current.sync()?;
            }
            let current_index = cache.current;
            cache.open.remove(&current_index);
            let next = cache
                .current
                .checked_add(1)
                .filter(|&n| n <= MAX_FILES)
                .ok_or(StoreError::TooManyFiles)?;
            let path = store_file_path(&self.prefix, next);
            let file = self.vfs.open(&path, OpenMode::ReadAppend)?;
            cache.open.insert(next, Arc::new(StoreFile::new(next, file)));
            cache.current = next;
            debug!(index = next, "rolled to new store file");
        }
        cache
            .open
            .get(&index)
            .cloned()
            .ok_or(StoreError::MissingFile(index))
    }
}

/// Canonical file name for a store file index.
fn file_name(index: u16) -> String {
    format!("{index:010}")
}

fn store_file_path(prefix: &Path, index: u16) -> PathBuf {
    prefix.join(file_name(index))
}

/// Parse a canonical store file name; `None` for anything else (foreign
/// files, index 0, out-of-range indices, non-canonical spellings).
fn parse_file_name(name: &str) -> Option<u16> {
    if name.len() != FILE_NAME_LEN || !name.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let value: u64 = name.parse().ok()?;
    if value == 0 || value > MAX_FILES as u64 {
        return None;
    }
    Some(value as u16)
}

/// Scan the prefix for store files, sorted by index, rejecting gaps.
fn scan_files(vfs: &dyn Vfs, prefix: &Path) -> StoreResult<Vec<(u16, u64)>> {
    let mut files = Vec::new();
    for name in vfs.readdir(prefix)? {
        let Some(index) = parse_file_name(&name) else {
            continue;
        };
        let stat = vfs.lstat(&prefix.join(&name))?;
        if !stat.is_file {
            continue;
        }
        files.push((index, stat.size));
    }
    files.sort_by_key(|&(index, _)| index);
    for pair in files.windows(2) {
        if pair[1].0 != pair[0].0 + 1 {
            return Err(StoreError::corrupt(format!(
                "gap in store files between {} and {}",
                pair[0].0, pair[1].0
            )));
        }
    }
    Ok(files)
}

/// Locate the newest valid meta record, truncating the torn tail after
/// it. Files without any meta record are unlinked. Returns the state
/// `(last_meta, current index, current size)`; an empty store is
/// `(None, 1, 0)`.
fn recover(
    vfs: &dyn Vfs,
    hasher: &dyn Hasher,
    prefix: &Path,
    files: &[(u16, u64)],
) -> StoreResult<(Option<(u16, u32, MetaRecord)>, u16, u64)> {
    let magic = META_MAGIC.to_le_bytes();
    for &(index, size) in files.iter().rev() {
        let path = store_file_path(prefix, index);
        let file = vfs.open(&path, OpenMode::ReadWrite)?;

        let mut slab_end = (size / META_SIZE as u64) * META_SIZE as u64;
        while slab_end >= META_SIZE as u64 {
            let slab_start = slab_end.saturating_sub(SLAB_SIZE);
            let mut slab = vec![0u8; (slab_end - slab_start) as usize];
            file.read_at(slab_start, &mut slab)?;

            let mut off = slab.len();
            while off >= META_SIZE {
                off -= META_SIZE;
                let candidate = &slab[off..off + META_SIZE];
                if candidate[0..4] != magic {
                    continue;
                }
                let Some(record) = MetaRecord::decode(hasher, candidate) else {
                    continue;
                };
                let pos = slab_start + off as u64;
                let end = pos + META_SIZE as u64;
                if end < size {
                    file.truncate(end)?;
                    file.sync()?;
                    warn!(index, pos, dropped = size - end, "truncated torn commit tail");
                }
                return Ok((Some((index, pos as u32, record)), index, end));
            }
            slab_end = slab_start;
        }

        drop(file);
        warn!(index, "no meta record found; unlinking file");
        vfs.unlink(&path)?;
    }
    Ok((None, 1, 0))
}
