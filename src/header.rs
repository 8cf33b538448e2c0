//! Vector header protocol.
//!
//! Every growable payload, whether a chunk in a
//! [`RecordStore`](crate::RecordStore) or a bookkeeping table on disk, is
//! prefixed by a small fixed header describing its logical length,
//! capacity, element size, and an ownership tag. The header is 16 bytes and payloads are written at 8-byte-aligned
//! offsets, so elements of any primitive size stay naturally aligned.
//!
//! ## Ownership
//!
//! The ownership tag distinguishes payloads the caller owns outright,
//! payloads borrowed from a memory window, and payloads whose lifetime is
//! tied to a store round-trip. In memory this distinction maps onto Rust
//! directly: owned payloads are `Vec<u8>`/`Bytes`, mapped views are `&[u8]`
//! slices whose lifetime is tied to a borrow of the window (so the compiler
//! rejects use-after-remap), and store-owned payloads only exist inside a
//! chunk. The tag is still encoded on disk so the persisted format records
//! which kind of payload a chunk held.
//!
//! Growth semantics (append checks `count < capacity`, doubling on
//! overflow) are provided in memory by `Vec` itself; the header is the wire
//! form of the same protocol.

use bytes::{Buf, BufMut};

use crate::error::{Error, Result};

/// Size of the encoded vector header, in bytes.
pub const HEADER_SIZE: usize = 16;

/// Size of an encoded sparse entry, in bytes.
pub const ENTRY_SIZE: usize = 8;

/// Rounds `x` up to the next multiple of 8.
pub fn align8(x: u64) -> u64 {
    (x + 7) & !7
}

/// Who owns a payload, and therefore who may free or outlive it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum Ownership {
    /// The payload lives on the heap and the holder must free it.
    HeapOwned = 0,

    /// The payload is borrowed from a memory window. It must not be freed
    /// and must not outlive a remap of that window.
    MappedView = 1,

    /// The payload lives inside a record-store chunk.
    StoreOwned = 2,
}

impl Ownership {
    fn from_u32(value: u32) -> Option<Self> {
        match value {
            0 => Some(Ownership::HeapOwned),
            1 => Some(Ownership::MappedView),
            2 => Some(Ownership::StoreOwned),
            _ => None,
        }
    }
}

/// The fixed header preceding every growable payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VecHeader {
    /// Number of elements currently in the payload.
    pub count: u32,

    /// Number of elements the payload has room for.
    pub capacity: u32,

    /// Size of one element, in bytes.
    pub elem_size: u32,

    /// Who owns the payload.
    pub tag: Ownership,
}

impl VecHeader {
    /// Header for a raw byte payload of `len` bytes stored in a chunk.
    pub fn bytes(len: usize) -> Self {
        Self {
            count: len as u32,
            capacity: len as u32,
            elem_size: 1,
            tag: Ownership::StoreOwned,
        }
    }

    /// Header for a payload of `n` sparse entries stored in a chunk.
    pub fn entries(n: usize) -> Self {
        Self {
            count: n as u32,
            capacity: n as u32,
            elem_size: ENTRY_SIZE as u32,
            tag: Ownership::StoreOwned,
        }
    }

    /// Length of the payload described by this header, in bytes.
    pub fn payload_len(&self) -> usize {
        self.count as usize * self.elem_size as usize
    }

    /// Bytes the header plus payload occupy on disk, 8-byte aligned.
    pub fn stored_len(&self) -> u64 {
        align8(HEADER_SIZE as u64 + self.payload_len() as u64)
    }

    /// Encodes the header into a buffer.
    pub fn encode(&self, buf: &mut impl BufMut) {
        buf.put_u32_le(self.count);
        buf.put_u32_le(self.capacity);
        buf.put_u32_le(self.elem_size);
        buf.put_u32_le(self.tag as u32);
    }

    /// Decodes a header from the front of `data`.
    pub fn decode(data: &[u8]) -> Result<Self> {
        if data.len() < HEADER_SIZE {
            return Err(Error::corruption("truncated vector header"));
        }
        let mut buf = data;
        let count = buf.get_u32_le();
        let capacity = buf.get_u32_le();
        let elem_size = buf.get_u32_le();
        let tag = buf.get_u32_le();
        let tag = Ownership::from_u32(tag)
            .ok_or_else(|| Error::corruption(format!("invalid ownership tag {}", tag)))?;
        if capacity < count {
            return Err(Error::corruption("vector header capacity below count"));
        }
        Ok(Self { count, capacity, elem_size, tag })
    }
}

/// One element of a sparse (index, weight) vector.
///
/// Sparse rows are what the surrounding toolkit stores: a document's term
/// weights, one row of a similarity matrix. Entries are expected in
/// increasing index order; the store derives its column hint from the last
/// entry of a row.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SparseEntry {
    /// Column index (1-based, like all ids in the toolkit).
    pub index: u32,

    /// Weight at that index.
    pub weight: f32,
}

impl SparseEntry {
    /// Creates a new entry.
    pub fn new(index: u32, weight: f32) -> Self {
        Self { index, weight }
    }
}

/// Encodes sparse entries into a byte payload.
pub fn encode_entries(entries: &[SparseEntry], buf: &mut impl BufMut) {
    for e in entries {
        buf.put_u32_le(e.index);
        buf.put_f32_le(e.weight);
    }
}

/// Decodes a byte payload into sparse entries.
pub fn decode_entries(data: &[u8]) -> Result<Vec<SparseEntry>> {
    if data.len() % ENTRY_SIZE != 0 {
        return Err(Error::corruption("sparse payload length not a multiple of entry size"));
    }
    let mut buf = data;
    let mut out = Vec::with_capacity(data.len() / ENTRY_SIZE);
    while buf.has_remaining() {
        let index = buf.get_u32_le();
        let weight = buf.get_f32_le();
        out.push(SparseEntry { index, weight });
    }
    Ok(out)
}
