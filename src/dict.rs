//! # Dictionary - string keys to sequential ids
//!
//! A [`Dictionary`] interns strings: the first insert of a key assigns the
//! next sequential id (starting at 1), and every later insert or lookup of
//! the same key returns that id unchanged. Key bytes are persisted in a
//! private [`RecordStore`](crate::RecordStore); lookup goes through an
//! open-addressing slot table keyed by a fast 32-bit mixing hash.
//!
//! ## Design
//!
//! - `code[id]` caches the hash of id's key, so probing only compares key
//!   bytes after a hash match.
//! - `slots` is a power-of-two open-addressing table holding ids (0 =
//!   empty), probed linearly with wraparound.
//! - Occupancy is kept below 30% of the slot table; exceeding it triggers
//!   a rehash into a table of twice the size. Ids are stable for the
//!   lifetime of a key; only slot placement changes on rehash.
//!
//! The key count is derived from the key store, so the dictionary persists
//! as the key store's directory plus two table files (`dict.code`,
//! `dict.slot`).

use std::path::{Path, PathBuf};

use crate::config::{Mode, Options};
use crate::error::{Error, Result};
use crate::store::tables;
use crate::store::RecordStore;

const CODE_FILE: &str = "dict.code";
const SLOT_FILE: &str = "dict.slot";

/// A string-to-sequential-id index backed by a private record store.
///
/// # Example
///
/// ```rust
/// use sparsedb::Dictionary;
///
/// # fn main() -> Result<(), sparsedb::Error> {
/// let mut dict = Dictionary::in_memory();
/// assert_eq!(dict.insert("amino")?, Some(1));
/// assert_eq!(dict.insert("amino")?, Some(1));
/// assert_eq!(dict.lookup("unknown")?, None);
/// assert_eq!(dict.key_of(1)?.as_deref(), Some("amino"));
/// # Ok(())
/// # }
/// ```
pub struct Dictionary {
    keys: RecordStore,
    /// `code[id]` = cached hash of id's key. Entry 0 is unused.
    code: Vec<u32>,
    /// Open-addressing table: id or 0 for empty. Length is a power of two.
    slots: Vec<u32>,
    path: Option<PathBuf>,
    mode: Mode,
}

impl Dictionary {
    /// Opens a persisted dictionary at `path` with default options.
    pub fn open<P: AsRef<Path>>(path: P, mode: Mode) -> Result<Self> {
        Self::open_with(path, mode, Options::default())
    }

    /// Opens a persisted dictionary at `path`.
    pub fn open_with<P: AsRef<Path>>(path: P, mode: Mode, options: Options) -> Result<Self> {
        options.validate()?;
        let path = path.as_ref().to_path_buf();
        let keys = RecordStore::open_with(&path, mode, options.clone())?;

        let code_path = path.join(CODE_FILE);
        let slot_path = path.join(SLOT_FILE);
        let (code, slots) = if mode != Mode::Create && slot_path.exists() {
            (tables::read_u32(&code_path)?, tables::read_u32(&slot_path)?)
        } else {
            (Vec::new(), Vec::new())
        };

        let mut dict = Self {
            keys,
            code,
            slots,
            path: Some(path.clone()),
            mode,
        };
        if dict.code.is_empty() {
            dict.code = vec![0];
        }
        if dict.slots.is_empty() {
            dict.slots = vec![0; options.min_slots];
        }
        if !dict.slots.len().is_power_of_two() {
            return Err(Error::corruption(format!(
                "dictionary '{}' has a slot table of non-power-of-two size {}",
                path.display(),
                dict.slots.len()
            )));
        }
        if dict.code.len() <= dict.keys.max_id() as usize && dict.keys.max_id() > 0 {
            return Err(Error::corruption(format!(
                "dictionary '{}' has a hash-code table out of step with its keys",
                path.display()
            )));
        }
        Ok(dict)
    }

    /// Creates a dictionary that lives entirely in memory.
    pub fn in_memory() -> Self {
        Self::in_memory_with(Options::default())
    }

    /// Creates an in-memory dictionary with the given options.
    ///
    /// The slot table starts at `min_slots` rounded up to a power of two.
    pub fn in_memory_with(options: Options) -> Self {
        Self {
            keys: RecordStore::in_memory(),
            code: vec![0],
            slots: vec![0; options.min_slots.next_power_of_two()],
            path: None,
            mode: Mode::Update,
        }
    }

    /// Returns true if a persisted dictionary exists at `path`.
    pub fn exists<P: AsRef<Path>>(path: P) -> bool {
        RecordStore::exists(path.as_ref()) && path.as_ref().join(SLOT_FILE).exists()
    }

    /// Deletes the persisted dictionary at `path`, if any.
    pub fn destroy<P: AsRef<Path>>(path: P) -> Result<()> {
        RecordStore::destroy(path)
    }

    /// Number of keys in the dictionary.
    ///
    /// Derived from the key store; no separate counter is persisted.
    pub fn len(&self) -> usize {
        self.keys.max_id() as usize
    }

    /// Returns true if the dictionary holds no keys.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Looks up `key`, returning its id or `None` if unknown.
    ///
    /// An empty key is a documented no-op returning `None`.
    pub fn lookup(&mut self, key: &str) -> Result<Option<u32>> {
        if key.is_empty() {
            return Ok(None);
        }
        let code = hash32(key.as_bytes());
        let slot = self.probe(key, code)?;
        Ok(nonzero(self.slots[slot]))
    }

    /// Returns true if `key` is in the dictionary.
    pub fn contains(&mut self, key: &str) -> Result<bool> {
        Ok(self.lookup(key)?.is_some())
    }

    /// Looks up `key`, inserting it if absent.
    ///
    /// Idempotent: inserting the same key twice returns the same id both
    /// times. On a miss in a read-only dictionary, returns `None` instead
    /// of inserting.
    pub fn insert(&mut self, key: &str) -> Result<Option<u32>> {
        if key.is_empty() {
            return Ok(None);
        }
        let code = hash32(key.as_bytes());
        let slot = self.probe(key, code)?;
        if self.slots[slot] != 0 || !self.mode.writable() {
            return Ok(nonzero(self.slots[slot]));
        }

        let id = self.keys.max_id() + 1;
        self.keys.put(id, key.as_bytes())?;
        if self.code.len() <= id as usize {
            self.code.resize(id as usize + 1, 0);
        }
        self.code[id as usize] = code;
        self.slots[slot] = id;

        // keep occupancy below 30% of the slot table
        if 10 * id as usize > 3 * self.slots.len() {
            self.rehash()?;
        }
        Ok(Some(id))
    }

    /// Returns the key stored under `id`, or `None` if out of range.
    pub fn key_of(&mut self, id: u32) -> Result<Option<String>> {
        match self.keys.get(id)? {
            None => Ok(None),
            Some(bytes) => String::from_utf8(bytes.to_vec())
                .map(Some)
                .map_err(|_| Error::corruption(format!("key {} is not valid UTF-8", id))),
        }
    }

    /// All keys in id order (id `i` is at position `i - 1`).
    pub fn keys(&mut self) -> Result<Vec<String>> {
        let n = self.keys.max_id();
        let mut out = Vec::with_capacity(n as usize);
        for id in 1..=n {
            match self.key_of(id)? {
                Some(key) => out.push(key),
                None => {
                    return Err(Error::corruption(format!("dictionary is missing key {}", id)))
                }
            }
        }
        Ok(out)
    }

    /// Copies the dictionary into a fresh in-memory one.
    pub fn to_memory(&mut self) -> Result<Dictionary> {
        Ok(Dictionary {
            keys: self.keys.to_memory()?,
            code: self.code.clone(),
            slots: self.slots.clone(),
            path: None,
            mode: Mode::Update,
        })
    }

    /// Writes the code and slot tables and flushes the key store.
    pub fn flush(&mut self) -> Result<()> {
        if !self.mode.writable() {
            return Ok(());
        }
        if let Some(path) = &self.path {
            tables::write_u32(&path.join(CODE_FILE), &self.code)?;
            tables::write_u32(&path.join(SLOT_FILE), &self.slots)?;
        }
        self.keys.flush()
    }

    /// Flushes and closes the dictionary.
    pub fn close(mut self) -> Result<()> {
        self.flush()
    }

    /// Finds the slot index for `key`: either the slot holding its id, or
    /// the first empty slot along its probe sequence.
    fn probe(&mut self, key: &str, code: u32) -> Result<usize> {
        let mask = self.slots.len() - 1;
        let mut slot = code as usize & mask;
        loop {
            let id = self.slots[slot];
            if id == 0 {
                return Ok(slot);
            }
            if self.code[id as usize] == code {
                if let Some(stored) = self.keys.get(id)? {
                    if stored.as_ref() == key.as_bytes() {
                        return Ok(slot);
                    }
                } else {
                    return Err(Error::corruption(format!(
                        "slot table points at missing key {}",
                        id
                    )));
                }
            }
            slot = (slot + 1) & mask; // linear probing
        }
    }

    /// Grows the slot table to the next power of two >= twice the current
    /// size and re-places every id. Ids never change; only slots do.
    fn rehash(&mut self) -> Result<()> {
        let new_len = (2 * self.slots.len()).next_power_of_two();
        log::debug!("rehashing dictionary to {} slots", new_len);
        self.slots = vec![0; new_len];
        let mask = new_len - 1;
        for id in 1..=self.keys.max_id() {
            let mut slot = self.code[id as usize] as usize & mask;
            while self.slots[slot] != 0 {
                slot = (slot + 1) & mask;
            }
            self.slots[slot] = id;
        }
        Ok(())
    }
}

impl Drop for Dictionary {
    fn drop(&mut self) {
        // Best effort flush on drop
        if self.mode.writable() {
            let _ = self.flush();
        }
    }
}

impl std::fmt::Debug for Dictionary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dictionary")
            .field("len", &self.len())
            .field("slots", &self.slots.len())
            .field("mode", &self.mode)
            .finish()
    }
}

fn nonzero(id: u32) -> Option<u32> {
    if id == 0 {
        None
    } else {
        Some(id)
    }
}

/// Fast 32-bit mixing hash over `key`.
///
/// A murmur3-style multiply-rotate mix: fast, well distributed, and not
/// remotely cryptographic. The constants are fixed so hashes persisted in
/// the code table stay valid across platforms.
pub fn hash32(key: &[u8]) -> u32 {
    const M1: u32 = 0x0acf_fe3d;
    const M2: u32 = 0x0e4e_f5f3;
    const M3: u32 = 0xa729_a897;

    fn mix(h: u32, mut k: u32) -> u32 {
        k = k.wrapping_mul(M1);
        k = k.rotate_left(11);
        k = k.wrapping_mul(M2);
        h.wrapping_mul(3) ^ k
    }

    let mut h = key.len() as u32;
    let mut words = key.chunks_exact(4);
    for word in &mut words {
        h = mix(h, u32::from_le_bytes(word.try_into().unwrap()));
    }
    let tail = words.remainder();
    if !tail.is_empty() {
        let mut k = 0u32;
        for (i, &b) in tail.iter().enumerate() {
            k ^= (b as u32) << (8 * i);
        }
        h = mix(h, k);
    }
    h ^= h >> 18;
    h = h.wrapping_mul(M3);
    h ^ (h >> 18)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn small_opts() -> Options {
        Options::new().map_size(1 << 16).min_slots(64)
    }

    #[test]
    fn test_insert_and_lookup() {
        let mut dict = Dictionary::in_memory();

        assert_eq!(dict.insert("amino").unwrap(), Some(1));
        assert_eq!(dict.insert("acid").unwrap(), Some(2));
        assert_eq!(dict.insert("amino").unwrap(), Some(1)); // idempotent
        assert_eq!(dict.len(), 2);

        assert_eq!(dict.lookup("amino").unwrap(), Some(1));
        assert_eq!(dict.lookup("acid").unwrap(), Some(2));
        assert_eq!(dict.lookup("unknown").unwrap(), None);
        assert_eq!(dict.key_of(1).unwrap().as_deref(), Some("amino"));
        assert_eq!(dict.key_of(2).unwrap().as_deref(), Some("acid"));
        assert_eq!(dict.key_of(3).unwrap(), None);
    }

    #[test]
    fn test_empty_key_is_noop() {
        let mut dict = Dictionary::in_memory();
        assert_eq!(dict.lookup("").unwrap(), None);
        assert_eq!(dict.insert("").unwrap(), None);
        assert_eq!(dict.len(), 0);
    }

    #[test]
    fn test_rehash_keeps_ids_stable() {
        let mut dict = Dictionary::in_memory_with(small_opts());

        // 64 slots rehash above 19 keys; push well past several doublings
        let n = 500u32;
        let mut assigned = Vec::new();
        for i in 0..n {
            let key = format!("term-{}", i);
            let id = dict.insert(&key).unwrap().unwrap();
            assert_eq!(dict.lookup(&key).unwrap(), Some(id)); // right after insert
            assigned.push(id);
        }
        assert!(dict.slots.len() > 64);

        for i in 0..n {
            let key = format!("term-{}", i);
            assert_eq!(dict.lookup(&key).unwrap(), Some(assigned[i as usize]));
        }
        assert_eq!(dict.len(), n as usize);
    }

    #[test]
    fn test_occupancy_stays_below_30_percent() {
        let mut dict = Dictionary::in_memory_with(small_opts());
        for i in 0..1000u32 {
            dict.insert(&format!("k{}", i)).unwrap();
        }
        assert!(10 * dict.len() <= 3 * dict.slots.len());
    }

    #[test]
    fn test_keys_in_id_order() {
        let mut dict = Dictionary::in_memory();
        dict.insert("alpha").unwrap();
        dict.insert("beta").unwrap();
        dict.insert("gamma").unwrap();
        assert_eq!(dict.keys().unwrap(), vec!["alpha", "beta", "gamma"]);
    }

    #[test]
    fn test_persistence_across_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("d");

        {
            let mut dict = Dictionary::open_with(&path, Mode::Create, small_opts()).unwrap();
            for i in 0..100u32 {
                dict.insert(&format!("word-{}", i)).unwrap();
            }
            dict.close().unwrap();
        }

        let mut dict = Dictionary::open_with(&path, Mode::Update, small_opts()).unwrap();
        assert_eq!(dict.len(), 100);
        assert_eq!(dict.lookup("word-42").unwrap(), Some(43));
        assert_eq!(dict.key_of(1).unwrap().as_deref(), Some("word-0"));

        // inserts continue the sequence
        assert_eq!(dict.insert("word-new").unwrap(), Some(101));
    }

    #[test]
    fn test_read_only_miss_does_not_insert() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("d");
        {
            let mut dict = Dictionary::open_with(&path, Mode::Create, small_opts()).unwrap();
            dict.insert("present").unwrap();
            dict.close().unwrap();
        }

        let mut dict = Dictionary::open_with(&path, Mode::Read, small_opts()).unwrap();
        assert_eq!(dict.insert("present").unwrap(), Some(1));
        assert_eq!(dict.insert("absent").unwrap(), None);
        assert_eq!(dict.len(), 1);
    }

    #[test]
    fn test_to_memory_copy() {
        let mut dict = Dictionary::in_memory();
        dict.insert("one").unwrap();
        dict.insert("two").unwrap();

        let mut copy = dict.to_memory().unwrap();
        assert_eq!(copy.lookup("two").unwrap(), Some(2));

        copy.insert("three").unwrap();
        assert_eq!(dict.len(), 2); // the original is unaffected
    }

    #[test]
    fn test_hash32_is_stable() {
        // persisted code tables rely on the hash never changing
        assert_eq!(hash32(b"amino"), hash32(b"amino"));
        assert_ne!(hash32(b"amino"), hash32(b"acid"));
        assert_ne!(hash32(b""), hash32(b"\0"));

        let h = hash32(b"reference");
        for _ in 0..3 {
            assert_eq!(hash32(b"reference"), h);
        }
    }

    #[test]
    fn test_exists_and_destroy() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("d");
        assert!(!Dictionary::exists(&path));

        Dictionary::open_with(&path, Mode::Create, small_opts()).unwrap().close().unwrap();
        assert!(Dictionary::exists(&path));

        Dictionary::destroy(&path).unwrap();
        assert!(!Dictionary::exists(&path));
    }
}
