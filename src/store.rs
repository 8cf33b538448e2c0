//! # Record store - id-addressed variable-length chunks
//!
//! A [`RecordStore`] keeps variable-length byte chunks addressed by integer
//! id, backed by a memory-mapped heap file. It owns allocation, in-place
//! growth detection, relocation, deletion, and defragmentation.
//!
//! ## Design
//!
//! - The heap is append-only: a chunk that outgrows its slot is rewritten
//!   at the heap end and its old bytes are abandoned. Space is reclaimed
//!   only by an explicit [`defragment`] pass into a fresh store.
//! - Chunk lengths are never stored per chunk. A circular doubly-linked
//!   list over live ids, ordered by physical position, makes each chunk's
//!   extent `offs[next] - offs[id]`; the sentinel entry 0 doubles as the
//!   list root and the current heap end.
//! - Each chunk starts with a [`VecHeader`](crate::header::VecHeader), so
//!   the exact logical payload length survives 8-byte alignment padding.
//!
//! ## Persistence
//!
//! One directory per store: `store.heap` (chunk bytes), `store.offs`
//! (offset table), `store.prev`/`store.next` (link tables, written by
//! writable stores), `store.meta` (plain-text format version and row/col
//! hints). Table files carry a crc32 footer verified at open. A format
//! version mismatch is fatal at open; there is no migration path.
//!
//! Persistence is best-effort and fail-fast, not transactional: tables and
//! metadata are written on flush/close, and a crash mid-put is recovered
//! by rerunning the job, not by repair.
//!
//! ## Thread Safety
//!
//! A `RecordStore` is **not** safe for concurrent use through one handle;
//! reads may remap the shared window. The toolkit parallelizes at a
//! coarser grain (see [`pool`](crate::pool)): one writer handle per store,
//! workers on disjoint shards.

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::config::{Mode, Options};
use crate::error::{Error, Result};
use crate::header::{
    align8, decode_entries, encode_entries, Ownership, SparseEntry, VecHeader, ENTRY_SIZE,
    HEADER_SIZE,
};
use crate::window::MemoryWindow;

/// Format version written to and checked against `store.meta`.
pub const FORMAT_VERSION: u32 = 1;

/// Offset of the first chunk in the heap. Bytes below it stay zero.
const MIN_OFFS: u64 = 8;

const HEAP_FILE: &str = "store.heap";
const OFFS_FILE: &str = "store.offs";
const PREV_FILE: &str = "store.prev";
const NEXT_FILE: &str = "store.next";
const META_FILE: &str = "store.meta";

/// An id-addressed store of variable-length chunks.
///
/// # Example
///
/// ```rust
/// use sparsedb::RecordStore;
///
/// # fn main() -> Result<(), sparsedb::Error> {
/// let mut store = RecordStore::in_memory();
/// store.put(1, b"ATCG")?;
/// assert_eq!(store.get(1)?.unwrap(), b"ATCG"[..]);
/// store.delete(1)?;
/// assert_eq!(store.get(1)?, None);
/// # Ok(())
/// # }
/// ```
pub struct RecordStore {
    backend: Backend,
    mode: Mode,
    rows: u32,
    cols: u32,
}

enum Backend {
    Disk(DiskStore),
    Memory(MemStore),
}

struct DiskStore {
    path: PathBuf,
    window: MemoryWindow,
    /// `offs[id]` = heap offset of chunk `id`, 0 if absent.
    /// `offs[0]` = current heap end.
    offs: Vec<u64>,
    links: Option<Links>,
}

/// Circular doubly-linked list over live ids in physical heap order,
/// rooted at the sentinel entry 0.
struct Links {
    prev: Vec<u32>,
    next: Vec<u32>,
}

struct MemStore {
    /// `chunks[id]` = encoded header + payload. Entry 0 is reserved.
    chunks: Vec<Option<Vec<u8>>>,
}

impl RecordStore {
    /// Opens a persisted store at `path` with default options.
    pub fn open<P: AsRef<Path>>(path: P, mode: Mode) -> Result<Self> {
        Self::open_with(path, mode, Options::default())
    }

    /// Opens a persisted store at `path`.
    ///
    /// Writable modes create the directory and backing files as needed.
    /// A format version mismatch in the metadata file is fatal here.
    pub fn open_with<P: AsRef<Path>>(path: P, mode: Mode, options: Options) -> Result<Self> {
        options.validate()?;
        let path = path.as_ref().to_path_buf();
        if mode.writable() {
            fs::create_dir_all(&path)?;
        }

        let meta_path = path.join(META_FILE);
        let (version, rows, cols) = if mode != Mode::Create && meta_path.exists() {
            read_meta(&meta_path)?
        } else {
            (FORMAT_VERSION, 0, 0)
        };
        if version != FORMAT_VERSION {
            return Err(Error::VersionMismatch { found: version, expected: FORMAT_VERSION });
        }

        let window = MemoryWindow::open(path.join(HEAP_FILE), mode, options.map_size)?;

        let offs_path = path.join(OFFS_FILE);
        let mut offs = match mode {
            Mode::Create => Vec::new(),
            Mode::Update if !offs_path.exists() => Vec::new(),
            _ => tables::read_u64(&offs_path)?,
        };

        let prev_path = path.join(PREV_FILE);
        let next_path = path.join(NEXT_FILE);
        let links = if mode.writable() {
            if mode == Mode::Create || !next_path.exists() {
                if offs.len() > 1 {
                    return Err(Error::corruption(format!(
                        "store '{}' has chunks but no link tables",
                        path.display()
                    )));
                }
                Some(Links { prev: vec![0], next: vec![0] })
            } else {
                Some(Links {
                    prev: tables::read_u32(&prev_path)?,
                    next: tables::read_u32(&next_path)?,
                })
            }
        } else if prev_path.exists() && next_path.exists() {
            Some(Links { prev: tables::read_u32(&prev_path)?, next: tables::read_u32(&next_path)? })
        } else {
            None
        };

        if offs.is_empty() {
            offs.push(MIN_OFFS);
        }
        if offs[0] < MIN_OFFS {
            return Err(Error::corruption(format!(
                "store '{}' has heap end {} below minimum offset",
                path.display(),
                offs[0]
            )));
        }
        if let Some(l) = &links {
            if l.prev.len() != offs.len() || l.next.len() != offs.len() {
                return Err(Error::corruption(format!(
                    "store '{}' has link tables out of step with the offset table",
                    path.display()
                )));
            }
        }

        let fresh = mode.writable() && (mode == Mode::Create || !offs_path.exists());
        let mut store = Self {
            backend: Backend::Disk(DiskStore { path, window, offs, links }),
            mode,
            rows,
            cols,
        };
        if fresh {
            // materialize the table and metadata files right away
            store.flush()?;
        }
        Ok(store)
    }

    /// Creates a store that lives entirely in memory.
    ///
    /// In-memory stores hold each chunk in its own allocation; there is no
    /// shared heap, so no linked list and no relocation bookkeeping.
    pub fn in_memory() -> Self {
        Self {
            backend: Backend::Memory(MemStore { chunks: vec![None] }),
            mode: Mode::Update,
            rows: 0,
            cols: 0,
        }
    }

    /// Returns true if a persisted store exists at `path`.
    pub fn exists<P: AsRef<Path>>(path: P) -> bool {
        path.as_ref().join(HEAP_FILE).exists()
    }

    /// Deletes the persisted store at `path`, if any.
    pub fn destroy<P: AsRef<Path>>(path: P) -> Result<()> {
        let path = path.as_ref();
        if path.exists() {
            fs::remove_dir_all(path)?;
        }
        Ok(())
    }

    /// Last modification time of the persisted store at `path`.
    pub fn modified<P: AsRef<Path>>(path: P) -> Result<SystemTime> {
        Ok(fs::metadata(path.as_ref().join(HEAP_FILE))?.modified()?)
    }

    /// Returns the chunk stored under `id`, or `None` if absent.
    ///
    /// Absent means: `id` is zero, beyond the offset table, or unallocated.
    /// May remap the shared window, hence `&mut self`.
    pub fn get(&mut self, id: u32) -> Result<Option<Bytes>> {
        Ok(self.get_raw(id)?.map(|(_, payload)| payload))
    }

    /// Returns a copy of the chunk under `id` without touching the shared
    /// window mapping.
    ///
    /// Safe to call while other readers hold views into the window; the
    /// bytes are fetched with a positional read instead of a remap.
    pub fn read(&self, id: u32) -> Result<Option<Bytes>> {
        let d = match &self.backend {
            Backend::Memory(m) => return Ok(m.decode(id)?.map(|(_, p)| p)),
            Backend::Disk(d) => d,
        };
        if !d.contains(id) {
            return Ok(None);
        }
        let off = d.offs[id as usize];
        let span = d.span(id)?;
        let buf = d.window.positional_read(off, span as usize)?;
        let hdr = VecHeader::decode(&buf)?;
        let end = HEADER_SIZE + hdr.payload_len();
        if end as u64 > span {
            return Err(Error::corruption(format!("chunk {} overruns its extent", id)));
        }
        Ok(Some(Bytes::from(buf).slice(HEADER_SIZE..end)))
    }

    /// Borrows the chunk under `id` straight from the window, without
    /// copying.
    ///
    /// The view is invalidated by the next operation that can remap or
    /// relocate, which the borrow checker enforces.
    pub fn view(&mut self, id: u32) -> Result<Option<&[u8]>> {
        match &mut self.backend {
            Backend::Memory(m) => match m.chunk(id) {
                None => Ok(None),
                Some(buf) => {
                    let hdr = VecHeader::decode(buf)?;
                    Ok(Some(&buf[HEADER_SIZE..HEADER_SIZE + hdr.payload_len()]))
                }
            },
            Backend::Disk(d) => {
                if !d.contains(id) {
                    return Ok(None);
                }
                let off = d.offs[id as usize];
                let span = d.span(id)?;
                d.window.ensure(off + span)?;
                let data = d.window.slice(off, span as usize)?;
                let hdr = VecHeader::decode(data)?;
                let end = HEADER_SIZE + hdr.payload_len();
                if end as u64 > span {
                    return Err(Error::corruption(format!("chunk {} overruns its extent", id)));
                }
                Ok(Some(&data[HEADER_SIZE..end]))
            }
        }
    }

    /// Stores `bytes` as the chunk for `id`.
    ///
    /// An empty `bytes` is equivalent to [`delete`](Self::delete). If the
    /// chunk already exists and the new size still fits before its physical
    /// successor it is overwritten in place; otherwise it is relocated to
    /// the heap end and the old bytes are abandoned until defragmentation.
    pub fn put(&mut self, id: u32, bytes: &[u8]) -> Result<()> {
        if bytes.is_empty() {
            return self.delete(id);
        }
        self.put_raw(id, VecHeader::bytes(bytes.len()), bytes)
    }

    /// Stores a sparse (index, weight) row as the chunk for `id`.
    ///
    /// Refreshes the store's row/column hints from `id` and the last
    /// entry's index.
    pub fn put_entries(&mut self, id: u32, entries: &[SparseEntry]) -> Result<()> {
        if entries.is_empty() {
            return self.delete(id);
        }
        let mut buf = Vec::with_capacity(entries.len() * ENTRY_SIZE);
        encode_entries(entries, &mut buf);
        self.put_raw(id, VecHeader::entries(entries.len()), &buf)
    }

    /// Returns the sparse row stored under `id`, or `None` if absent.
    pub fn get_entries(&mut self, id: u32) -> Result<Option<Vec<SparseEntry>>> {
        match self.get_raw(id)? {
            None => Ok(None),
            Some((hdr, payload)) => {
                if hdr.elem_size != ENTRY_SIZE as u32 {
                    return Err(Error::invalid_argument(format!(
                        "chunk {} holds elements of size {}, not sparse entries",
                        id, hdr.elem_size
                    )));
                }
                Ok(Some(decode_entries(&payload)?))
            }
        }
    }

    /// Removes the chunk for `id`.
    ///
    /// The id is unlinked and its offset zeroed; the heap bytes are *not*
    /// reclaimed. Deleting an absent or never-used id is a no-op.
    pub fn delete(&mut self, id: u32) -> Result<()> {
        if !self.mode.writable() {
            return Err(Error::invalid_state("cannot delete from a read-only store"));
        }
        match &mut self.backend {
            Backend::Memory(m) => {
                if id > 0 && (id as usize) < m.chunks.len() {
                    m.chunks[id as usize] = None;
                }
            }
            Backend::Disk(d) => {
                if d.contains(id) {
                    d.unlink(id);
                }
            }
        }
        Ok(())
    }

    /// Returns true if `id` currently holds a chunk.
    pub fn contains(&self, id: u32) -> bool {
        match &self.backend {
            Backend::Memory(m) => m.chunk(id).is_some(),
            Backend::Disk(d) => d.contains(id),
        }
    }

    /// Physical extent of the chunk under `id` in bytes (header plus
    /// payload plus alignment padding), or `None` if absent.
    pub fn chunk_size(&self, id: u32) -> Option<u64> {
        match &self.backend {
            Backend::Memory(m) => m.chunk(id).map(|b| b.len() as u64),
            Backend::Disk(d) => {
                if d.contains(id) {
                    d.span(id).ok()
                } else {
                    None
                }
            }
        }
    }

    /// The largest id the offset table covers. Ids above it are absent.
    pub fn max_id(&self) -> u32 {
        match &self.backend {
            Backend::Memory(m) => (m.chunks.len() - 1) as u32,
            Backend::Disk(d) => (d.offs.len() - 1) as u32,
        }
    }

    /// Number of live chunks.
    pub fn len(&self) -> usize {
        self.ids().len()
    }

    /// Returns true if the store holds no live chunks.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Live ids in physical storage order (insertion order at the heap
    /// tail), or in id order for stores without link tables.
    pub fn ids(&self) -> Vec<u32> {
        match &self.backend {
            Backend::Memory(m) => (1..m.chunks.len() as u32).filter(|&id| m.chunk(id).is_some()).collect(),
            Backend::Disk(d) => match &d.links {
                Some(links) => {
                    let mut out = Vec::new();
                    let mut id = links.next[0];
                    while id != 0 && out.len() < d.offs.len() {
                        out.push(id);
                        id = links.next[id as usize];
                    }
                    out
                }
                None => (1..d.offs.len() as u32).filter(|&id| d.contains(id)).collect(),
            },
        }
    }

    /// Current heap end: the number of heap bytes in use, including
    /// abandoned space.
    pub fn heap_len(&self) -> u64 {
        match &self.backend {
            Backend::Memory(m) => m.chunks.iter().flatten().map(|b| b.len() as u64).sum(),
            Backend::Disk(d) => d.offs[0],
        }
    }

    /// Row-count hint: the largest id ever stored.
    pub fn rows(&self) -> u32 {
        self.rows
    }

    /// Column-count hint: the largest index seen in a sparse-entry chunk.
    pub fn cols(&self) -> u32 {
        self.cols
    }

    /// Deletes every live chunk. The heap is not compacted.
    pub fn clear(&mut self) -> Result<()> {
        for id in self.ids() {
            self.delete(id)?;
        }
        Ok(())
    }

    /// Copies every live chunk into a fresh in-memory store.
    pub fn to_memory(&mut self) -> Result<RecordStore> {
        let mut mem = RecordStore::in_memory();
        for id in 1..=self.max_id() {
            if let Some((hdr, payload)) = self.get_raw(id)? {
                mem.put_raw(id, hdr, &payload)?;
            }
        }
        mem.rows = self.rows;
        mem.cols = self.cols;
        Ok(mem)
    }

    /// Writes the offset/link tables and metadata, and flushes the heap.
    pub fn flush(&mut self) -> Result<()> {
        if !self.mode.writable() {
            return Ok(());
        }
        let (rows, cols) = (self.rows, self.cols);
        if let Backend::Disk(d) = &mut self.backend {
            tables::write_u64(&d.path.join(OFFS_FILE), &d.offs)?;
            if let Some(links) = &d.links {
                tables::write_u32(&d.path.join(PREV_FILE), &links.prev)?;
                tables::write_u32(&d.path.join(NEXT_FILE), &links.next)?;
            }
            write_meta(&d.path.join(META_FILE), FORMAT_VERSION, rows, cols)?;
            d.window.flush()?;
        }
        Ok(())
    }

    /// Flushes and closes the store.
    pub fn close(mut self) -> Result<()> {
        self.flush()
    }

    fn get_raw(&mut self, id: u32) -> Result<Option<(VecHeader, Bytes)>> {
        let d = match &mut self.backend {
            Backend::Memory(m) => return m.decode(id),
            Backend::Disk(d) => d,
        };
        if !d.contains(id) {
            return Ok(None);
        }
        let off = d.offs[id as usize];
        let span = d.span(id)?;
        if (span as usize) < HEADER_SIZE {
            return Err(Error::corruption(format!("chunk {} shorter than its header", id)));
        }
        d.window.ensure(off + span)?;
        let data = d.window.slice(off, span as usize)?;
        let hdr = VecHeader::decode(data)?;
        let end = HEADER_SIZE + hdr.payload_len();
        if end as u64 > span {
            return Err(Error::corruption(format!("chunk {} overruns its extent", id)));
        }
        Ok(Some((hdr, Bytes::copy_from_slice(&data[HEADER_SIZE..end]))))
    }

    fn put_raw(&mut self, id: u32, hdr: VecHeader, payload: &[u8]) -> Result<()> {
        if id == 0 {
            return Err(Error::invalid_argument("id 0 is reserved"));
        }
        if !self.mode.writable() {
            return Err(Error::invalid_state("cannot put into a read-only store"));
        }
        debug_assert_eq!(hdr.payload_len(), payload.len());

        match &mut self.backend {
            Backend::Memory(m) => {
                if id as usize >= m.chunks.len() {
                    m.chunks.resize(id as usize + 1, None);
                }
                let mut buf = Vec::with_capacity(HEADER_SIZE + payload.len());
                hdr.encode(&mut buf);
                buf.extend_from_slice(payload);
                m.chunks[id as usize] = Some(buf);
            }
            Backend::Disk(d) => {
                let size = (HEADER_SIZE + payload.len()) as u64;

                if id as usize >= d.offs.len() {
                    let new_len = id as usize + 1;
                    d.offs.resize(new_len, 0);
                    if let Some(links) = &mut d.links {
                        links.prev.resize(new_len, 0);
                        links.next.resize(new_len, 0);
                    }
                }
                let links = d
                    .links
                    .as_mut()
                    .ok_or_else(|| Error::invalid_state("store has no link tables"))?;

                let succ = links.next[id as usize];
                let cur = d.offs[id as usize];
                let stop = d.offs[succ as usize];
                if !(cur != 0 && cur + size <= stop) {
                    // does not fit in its current slot: unlink the old chunk
                    // (if any) and allocate at the heap tail
                    if cur != 0 {
                        let n = links.next[id as usize];
                        let p = links.prev[id as usize];
                        links.next[p as usize] = n;
                        links.prev[n as usize] = p;
                        links.prev[id as usize] = 0;
                        links.next[id as usize] = 0;
                    }
                    let tail = links.prev[0]; // tail <------> root
                    links.next[id as usize] = 0; //      id -> root
                    links.prev[0] = id; //               id <- root
                    links.prev[id as usize] = tail; // tail <- id
                    links.next[tail as usize] = id; // tail -> id
                    d.offs[id as usize] = d.offs[0];
                    d.offs[0] += align8(size);
                    d.window.grow(d.offs[0])?;
                }

                let off = d.offs[id as usize];
                d.window.ensure(off + size)?;
                let dst = d.window.slice_mut(off, size as usize)?;
                let mut head = &mut dst[..HEADER_SIZE];
                hdr.encode(&mut head);
                dst[HEADER_SIZE..].copy_from_slice(payload);
            }
        }

        // opportunistic dimension hints
        if id > self.rows {
            self.rows = id;
        }
        if hdr.elem_size == ENTRY_SIZE as u32 && hdr.count > 0 {
            let tail = &payload[payload.len() - ENTRY_SIZE..];
            let last_index = (&tail[..4]).get_u32_le();
            if last_index > self.cols {
                self.cols = last_index;
            }
        }
        Ok(())
    }
}

impl Drop for RecordStore {
    fn drop(&mut self) {
        // Best effort flush on drop
        if self.mode.writable() {
            let _ = self.flush();
        }
    }
}

impl std::fmt::Debug for RecordStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordStore")
            .field("mode", &self.mode)
            .field("max_id", &self.max_id())
            .field("rows", &self.rows)
            .field("cols", &self.cols)
            .finish()
    }
}

impl DiskStore {
    fn contains(&self, id: u32) -> bool {
        id != 0 && (id as usize) < self.offs.len() && self.offs[id as usize] != 0
    }

    /// Id of the chunk physically following `id`, the sentinel 0 if `id`
    /// is last, or the wrapped next id for stores without link tables.
    fn succ(&self, id: u32) -> u32 {
        match &self.links {
            Some(links) => links.next[id as usize],
            None => (id + 1) % self.offs.len() as u32,
        }
    }

    /// Physical extent of chunk `id`, implied by storage adjacency.
    fn span(&self, id: u32) -> Result<u64> {
        let stop = self.offs[self.succ(id) as usize];
        stop.checked_sub(self.offs[id as usize]).ok_or_else(|| {
            Error::corruption(format!("chunk {} has a successor at a lower offset", id))
        })
    }

    fn unlink(&mut self, id: u32) {
        if let Some(links) = &mut self.links {
            self.offs[id as usize] = 0;
            let n = links.next[id as usize]; // prev <-> id <-> next
            let p = links.prev[id as usize];
            links.next[p as usize] = n; //      prev --------> next
            links.prev[n as usize] = p; //      prev <-------- next
            links.prev[id as usize] = 0;
            links.next[id as usize] = 0;
        }
    }
}

impl MemStore {
    fn chunk(&self, id: u32) -> Option<&Vec<u8>> {
        if id == 0 {
            return None;
        }
        self.chunks.get(id as usize).and_then(|c| c.as_ref())
    }

    fn decode(&self, id: u32) -> Result<Option<(VecHeader, Bytes)>> {
        match self.chunk(id) {
            None => Ok(None),
            Some(buf) => {
                let hdr = VecHeader::decode(buf)?;
                let end = HEADER_SIZE + hdr.payload_len();
                Ok(Some((hdr, Bytes::copy_from_slice(&buf[HEADER_SIZE..end]))))
            }
        }
    }
}

/// Copies every live chunk of the store at `src` into a fresh store at
/// `dst`, in id order.
///
/// Because the target starts empty, this compacts storage to exactly the
/// live-byte footprint. Row/column hints carry over.
pub fn defragment<P: AsRef<Path>, Q: AsRef<Path>>(src: P, dst: Q) -> Result<()> {
    let mut src_store = RecordStore::open(src.as_ref(), Mode::Read)?;
    let mut dst_store = RecordStore::open(dst.as_ref(), Mode::Create)?;
    let mut live = 0usize;
    for id in 1..=src_store.max_id() {
        if let Some((hdr, payload)) = src_store.get_raw(id)? {
            dst_store.put_raw(id, hdr, &payload)?;
            live += 1;
        }
    }
    dst_store.rows = src_store.rows;
    dst_store.cols = src_store.cols;
    log::info!(
        "defragmented '{}' -> '{}': {} live chunks, {} -> {} heap bytes",
        src.as_ref().display(),
        dst.as_ref().display(),
        live,
        src_store.heap_len(),
        dst_store.heap_len()
    );
    dst_store.close()
}

fn read_meta(path: &Path) -> Result<(u32, u32, u32)> {
    let text = fs::read_to_string(path)?;
    let mut version = FORMAT_VERSION;
    let mut rows = 0;
    let mut cols = 0;
    for line in text.lines() {
        if let Some(v) = line.strip_prefix("vers:") {
            version = v.trim().parse().unwrap_or(version);
        } else if let Some(v) = line.strip_prefix("rows:") {
            rows = v.trim().parse().unwrap_or(rows);
        } else if let Some(v) = line.strip_prefix("cols:") {
            cols = v.trim().parse().unwrap_or(cols);
        }
    }
    Ok((version, rows, cols))
}

fn write_meta(path: &Path, version: u32, rows: u32, cols: u32) -> Result<()> {
    let mut file = File::create(path)?;
    write!(file, "vers: {}\nrows: {}\ncols: {}\n", version, rows, cols)?;
    Ok(())
}

/// Fixed-width table files: a vector header, the little-endian elements,
/// and a crc32 footer over the element bytes.
pub(crate) mod tables {
    use super::*;

    pub fn write_u64(path: &Path, vals: &[u64]) -> Result<()> {
        let mut payload = BytesMut::with_capacity(vals.len() * 8);
        for v in vals {
            payload.put_u64_le(*v);
        }
        write_table(path, vals.len(), 8, &payload)
    }

    pub fn write_u32(path: &Path, vals: &[u32]) -> Result<()> {
        let mut payload = BytesMut::with_capacity(vals.len() * 4);
        for v in vals {
            payload.put_u32_le(*v);
        }
        write_table(path, vals.len(), 4, &payload)
    }

    pub fn read_u64(path: &Path) -> Result<Vec<u64>> {
        let mut payload = read_table(path, 8)?;
        let mut out = Vec::with_capacity(payload.len() / 8);
        while payload.has_remaining() {
            out.push(payload.get_u64_le());
        }
        Ok(out)
    }

    pub fn read_u32(path: &Path) -> Result<Vec<u32>> {
        let mut payload = read_table(path, 4)?;
        let mut out = Vec::with_capacity(payload.len() / 4);
        while payload.has_remaining() {
            out.push(payload.get_u32_le());
        }
        Ok(out)
    }

    fn write_table(path: &Path, count: usize, elem_size: u32, payload: &[u8]) -> Result<()> {
        let hdr = VecHeader {
            count: count as u32,
            capacity: count as u32,
            elem_size,
            tag: Ownership::HeapOwned,
        };
        let mut buf = BytesMut::with_capacity(HEADER_SIZE + payload.len() + 4);
        hdr.encode(&mut buf);
        buf.extend_from_slice(payload);
        buf.put_u32_le(crc32fast::hash(payload));
        fs::write(path, &buf)?;
        Ok(())
    }

    fn read_table(path: &Path, elem_size: u32) -> Result<Bytes> {
        let data = Bytes::from(fs::read(path)?);
        let hdr = VecHeader::decode(&data)?;
        if hdr.elem_size != elem_size {
            return Err(Error::corruption(format!(
                "table file '{}' has element size {}, expected {}",
                path.display(),
                hdr.elem_size,
                elem_size
            )));
        }
        let payload_len = hdr.payload_len();
        if data.len() < HEADER_SIZE + payload_len + 4 {
            return Err(Error::corruption(format!("table file '{}' is truncated", path.display())));
        }
        let payload = data.slice(HEADER_SIZE..HEADER_SIZE + payload_len);
        let stored_crc =
            (&data[HEADER_SIZE + payload_len..HEADER_SIZE + payload_len + 4]).get_u32_le();
        let actual_crc = crc32fast::hash(&payload);
        if stored_crc != actual_crc {
            return Err(Error::ChecksumMismatch { expected: stored_crc, actual: actual_crc });
        }
        Ok(payload)
    }
}
