//! Growable memory window over a backing file.
//!
//! A [`MemoryWindow`] maps a file into memory, transparently extends the
//! file and remaps when an access falls outside the current mapping, and
//! offers a positional-read fallback that bypasses the shared mapping.
//!
//! ## Remapping strategy
//!
//! When an access misses the current mapping, the window unmaps and remaps
//! the **entire current file length**. This trades mapping locality for
//! simplicity: remaps are assumed rare relative to accesses, and mapping
//! from offset zero means a byte offset in the file is always a direct
//! index into the mapping. A sliding-window mapping would scale to files
//! larger than address space, but nothing in the toolkit needs that yet.
//!
//! ## Safety
//!
//! A remap invalidates every slice previously handed out. Rather than
//! tracking readers at runtime, the window requires `&mut self` for any
//! operation that can remap, so the borrow checker statically rules out a
//! live view surviving a remap. Callers that cannot tolerate a remap under
//! a shared handle use [`MemoryWindow::positional_read`], which copies via
//! `pread` and never touches the mapping.

use std::fs::{File, OpenOptions};
use std::os::unix::fs::FileExt;
use std::path::{Path, PathBuf};

use memmap2::{Mmap, MmapMut, MmapOptions};

use crate::config::Mode;
use crate::error::{Error, Result};

enum Mapping {
    Ro(Mmap),
    Rw(MmapMut),
}

impl Mapping {
    fn as_slice(&self) -> &[u8] {
        match self {
            Mapping::Ro(m) => m,
            Mapping::Rw(m) => m,
        }
    }
}

/// A memory mapping of a growable backing file.
pub struct MemoryWindow {
    path: PathBuf,
    file: File,
    mode: Mode,
    map: Option<Mapping>,
    mapped_len: u64,
    file_len: u64,
    remaps: u64,
}

impl MemoryWindow {
    /// Opens `path` and maps it.
    ///
    /// Writable modes create the file if needed and pre-truncate new (or
    /// short) files to `map_size` bytes, leaving a sparse hole past the
    /// written region. Read-only windows map exactly the current file
    /// length and never grow.
    pub fn open<P: AsRef<Path>>(path: P, mode: Mode, map_size: u64) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = match mode {
            Mode::Read => OpenOptions::new().read(true).open(&path)?,
            Mode::Update => OpenOptions::new().read(true).write(true).create(true).open(&path)?,
            Mode::Create => OpenOptions::new()
                .read(true)
                .write(true)
                .create(true)
                .truncate(true)
                .open(&path)?,
        };

        let mut file_len = file.metadata()?.len();
        if mode.writable() && file_len < map_size {
            file.set_len(map_size)?;
            file_len = map_size;
        }

        let map = Self::map_file(&file, file_len, mode)?;
        Ok(Self { path, file, mode, map, mapped_len: file_len, file_len, remaps: 0 })
    }

    fn map_file(file: &File, len: u64, mode: Mode) -> Result<Option<Mapping>> {
        if len == 0 {
            return Ok(None);
        }
        // SAFETY: mapping a file is unsafe because another process could
        // truncate or rewrite it underneath us. Store directories are owned
        // by a single writer by contract, the mapping's lifetime is tied to
        // the window, and every access is bounds-checked against mapped_len.
        let mapping = unsafe {
            if mode.writable() {
                Mapping::Rw(MmapOptions::new().len(len as usize).map_mut(file)?)
            } else {
                Mapping::Ro(MmapOptions::new().len(len as usize).map(file)?)
            }
        };
        Ok(Some(mapping))
    }

    /// Makes sure the mapping covers `[0, end)`.
    ///
    /// On a miss the whole current file length is remapped; any previously
    /// returned slice is invalidated, which is why this takes `&mut self`.
    pub fn ensure(&mut self, end: u64) -> Result<()> {
        if end <= self.mapped_len {
            return Ok(());
        }
        if end > self.file_len {
            return Err(Error::invalid_argument(format!(
                "range end {} beyond file length {} of '{}'",
                end,
                self.file_len,
                self.path.display()
            )));
        }
        self.map = None; // unmap before remapping the full file
        self.map = Self::map_file(&self.file, self.file_len, self.mode)?;
        self.mapped_len = self.file_len;
        self.remaps += 1;
        log::debug!("remapped '{}' to {} bytes", self.path.display(), self.mapped_len);
        Ok(())
    }

    /// Extends the backing file so it is at least `min_len` bytes long.
    ///
    /// The file grows to the next power of two >= `min_len`. The mapping
    /// is not refreshed here; the next [`ensure`](Self::ensure) that needs
    /// the new region remaps lazily.
    pub fn grow(&mut self, min_len: u64) -> Result<()> {
        if self.file_len >= min_len {
            return Ok(());
        }
        if !self.mode.writable() {
            return Err(Error::invalid_state("cannot grow a read-only window"));
        }
        let new_len = min_len.next_power_of_two();
        self.file.set_len(new_len)?;
        log::debug!("extended '{}' from {} to {} bytes", self.path.display(), self.file_len, new_len);
        self.file_len = new_len;
        Ok(())
    }

    /// Borrows `len` bytes of the mapping starting at `offset`.
    ///
    /// The range must already be covered; call [`ensure`](Self::ensure)
    /// first.
    pub fn slice(&self, offset: u64, len: usize) -> Result<&[u8]> {
        self.check_range(offset, len)?;
        let map = self.map.as_ref().ok_or_else(|| Error::invalid_state("window is not mapped"))?;
        let start = offset as usize;
        Ok(&map.as_slice()[start..start + len])
    }

    /// Mutably borrows `len` bytes of the mapping starting at `offset`.
    pub fn slice_mut(&mut self, offset: u64, len: usize) -> Result<&mut [u8]> {
        self.check_range(offset, len)?;
        match self.map.as_mut() {
            Some(Mapping::Rw(m)) => {
                let start = offset as usize;
                Ok(&mut m[start..start + len])
            }
            Some(Mapping::Ro(_)) => Err(Error::invalid_state("window is read-only")),
            None => Err(Error::invalid_state("window is not mapped")),
        }
    }

    fn check_range(&self, offset: u64, len: usize) -> Result<()> {
        let end = offset + len as u64;
        if end > self.mapped_len {
            return Err(Error::invalid_argument(format!(
                "range [{}, {}) outside mapped window of {} bytes",
                offset, end, self.mapped_len
            )));
        }
        Ok(())
    }

    /// Reads `len` bytes at `offset` into a fresh buffer without touching
    /// the shared mapping.
    ///
    /// Used when a caller cannot tolerate a window remap happening
    /// concurrently with other readers. Ranges inside the current mapping
    /// are copied from it; ranges past it fall back to `pread`.
    pub fn positional_read(&self, offset: u64, len: usize) -> Result<Vec<u8>> {
        if offset + len as u64 > self.file_len {
            return Err(Error::invalid_argument(format!(
                "range [{}, {}) beyond file length {}",
                offset,
                offset + len as u64,
                self.file_len
            )));
        }
        let mut buf = vec![0u8; len];
        if offset + len as u64 <= self.mapped_len {
            if let Some(map) = self.map.as_ref() {
                let start = offset as usize;
                buf.copy_from_slice(&map.as_slice()[start..start + len]);
                return Ok(buf);
            }
        }
        self.file.read_exact_at(&mut buf, offset)?;
        Ok(buf)
    }

    /// Flushes the mapping to disk.
    pub fn flush(&self) -> Result<()> {
        if let Some(Mapping::Rw(m)) = self.map.as_ref() {
            m.flush()?;
        }
        Ok(())
    }

    /// Logical length of the backing file.
    pub fn file_len(&self) -> u64 {
        self.file_len
    }

    /// Length of the current mapping.
    pub fn mapped_len(&self) -> u64 {
        self.mapped_len
    }

    /// Number of remaps performed since open (or the last reset).
    pub fn remaps(&self) -> u64 {
        self.remaps
    }

    /// Resets the remap counter.
    pub fn reset_remaps(&mut self) {
        self.remaps = 0;
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl std::fmt::Debug for MemoryWindow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryWindow")
            .field("path", &self.path)
            .field("mode", &self.mode)
            .field("mapped_len", &self.mapped_len)
            .field("file_len", &self.file_len)
            .field("remaps", &self.remaps)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_create_pretruncates() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("heap");

        let win = MemoryWindow::open(&path, Mode::Create, 1 << 16).unwrap();
        assert_eq!(win.file_len(), 1 << 16);
        assert_eq!(win.mapped_len(), 1 << 16);
        assert_eq!(std::fs::metadata(&path).unwrap().len(), 1 << 16);
    }

    #[test]
    fn test_write_read_roundtrip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("heap");

        let mut win = MemoryWindow::open(&path, Mode::Create, 4096).unwrap();
        win.slice_mut(8, 4).unwrap().copy_from_slice(b"ping");
        win.flush().unwrap();

        assert_eq!(win.slice(8, 4).unwrap(), b"ping");

        let ro = MemoryWindow::open(&path, Mode::Read, 4096).unwrap();
        assert_eq!(ro.slice(8, 4).unwrap(), b"ping");
    }

    #[test]
    fn test_grow_and_ensure() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("heap");

        let mut win = MemoryWindow::open(&path, Mode::Create, 4096).unwrap();
        assert_eq!(win.remaps(), 0);

        win.grow(10_000).unwrap();
        assert_eq!(win.file_len(), 16384); // next power of two
        assert_eq!(win.mapped_len(), 4096); // mapping refreshed lazily

        win.ensure(10_000).unwrap();
        assert_eq!(win.mapped_len(), 16384);
        assert_eq!(win.remaps(), 1);

        win.slice_mut(9_000, 4).unwrap().copy_from_slice(b"pong");
        assert_eq!(win.slice(9_000, 4).unwrap(), b"pong");
    }

    #[test]
    fn test_ensure_past_file_end_fails() {
        let dir = tempdir().unwrap();
        let mut win = MemoryWindow::open(dir.path().join("heap"), Mode::Create, 4096).unwrap();
        assert!(win.ensure(8192).is_err());
    }

    #[test]
    fn test_positional_read() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("heap");

        let mut win = MemoryWindow::open(&path, Mode::Create, 4096).unwrap();
        win.slice_mut(100, 5).unwrap().copy_from_slice(b"hello");
        win.flush().unwrap();

        // inside the mapping
        assert_eq!(win.positional_read(100, 5).unwrap(), b"hello");

        // past the mapping but inside the file
        win.grow(8192).unwrap();
        assert_eq!(win.positional_read(5000, 3).unwrap(), vec![0, 0, 0]);

        // past the file
        assert!(win.positional_read(8192, 1).is_err());
    }

    #[test]
    fn test_read_missing_file_fails() {
        let dir = tempdir().unwrap();
        assert!(MemoryWindow::open(dir.path().join("absent"), Mode::Read, 4096).is_err());
    }

    #[test]
    fn test_read_only_rejects_writes() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("heap");
        MemoryWindow::open(&path, Mode::Create, 4096).unwrap();

        let mut ro = MemoryWindow::open(&path, Mode::Read, 4096).unwrap();
        assert!(ro.slice_mut(0, 4).is_err());
        assert!(ro.grow(8192).is_err());
    }
}
