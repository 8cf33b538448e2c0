//! Configuration options for SparseDb stores.

/// Access mode for a store, dictionary, or memory window.
///
/// Exactly one writable handle per store is assumed at any time. Readers may
/// open a `Read` handle concurrently with a writer, with no freshness
/// guarantee beyond what the OS page cache provides.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Open an existing store for reading. Fails if the store is absent.
    Read,

    /// Open for reading and writing, creating the store if absent.
    /// Existing contents are kept.
    Update,

    /// Create a fresh store, discarding any existing contents.
    Create,
}

impl Mode {
    /// Returns true if this mode permits mutation.
    pub fn writable(self) -> bool {
        !matches!(self, Mode::Read)
    }
}

/// Configuration options for opening a store or dictionary.
#[derive(Debug, Clone)]
pub struct Options {
    /// Initial size of the memory window for newly created heap files
    /// (in bytes). New writable files are pre-truncated to this size; the
    /// excess is a sparse hole until written.
    /// Default: 1GB
    pub map_size: u64,

    /// Minimum slot-table size for dictionaries. Must be a power of two.
    /// Default: 1024
    pub min_slots: usize,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            map_size: 1 << 30, // 1GB
            min_slots: 1024,
        }
    }
}

impl Options {
    /// Creates a new Options with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the initial memory window size for new files.
    pub fn map_size(mut self, size: u64) -> Self {
        self.map_size = size;
        self
    }

    /// Sets the minimum dictionary slot-table size.
    pub fn min_slots(mut self, slots: usize) -> Self {
        self.min_slots = slots;
        self
    }

    /// Validates the options and returns an error if any are invalid.
    pub fn validate(&self) -> crate::Result<()> {
        if self.map_size == 0 {
            return Err(crate::Error::invalid_argument("map_size must be > 0"));
        }
        if self.min_slots < 2 || !self.min_slots.is_power_of_two() {
            return Err(crate::Error::invalid_argument(
                "min_slots must be a power of two >= 2",
            ));
        }
        Ok(())
    }
}
