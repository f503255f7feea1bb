//! Memory banks: configuration, identity, and block-granular operations

use log::{debug, trace};
use serde::{Deserialize, Serialize};

use crate::{
    error::{MemBankError, Result},
    table::AllocationTable,
};

/// Identifier of one managed memory bank
///
/// The set of banks is closed and fixed at configuration time. The three
/// variants mirror the usual embedded split: a fast internal region, a
/// tightly-coupled core-local region, and an external/expansion region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BankId {
    /// Fast internal memory
    Internal,
    /// Tightly-coupled, core-local memory
    CoreCoupled,
    /// External/expansion memory
    External,
}

impl BankId {
    /// All configured banks, in index order
    pub const ALL: [BankId; 3] = [BankId::Internal, BankId::CoreCoupled, BankId::External];

    /// Number of configured banks
    pub const COUNT: usize = Self::ALL.len();

    /// Index of this bank within the registry
    pub fn index(self) -> usize {
        self as usize
    }
}

impl TryFrom<usize> for BankId {
    type Error = MemBankError;

    fn try_from(index: usize) -> Result<Self> {
        Self::ALL
            .get(index)
            .copied()
            .ok_or(MemBankError::InvalidBank { index })
    }
}

/// Configuration for one memory bank
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BankConfig {
    /// Total size of the bank's backing buffer in bytes
    pub capacity: usize,
    /// Size of one allocation block in bytes
    pub block_size: usize,
}

impl BankConfig {
    /// Create a bank configuration
    pub fn new(capacity: usize, block_size: usize) -> Self {
        Self {
            capacity,
            block_size,
        }
    }

    /// Default geometry for a bank: 32-byte blocks; 180 KiB internal,
    /// 60 KiB core-coupled, 768 KiB external
    pub fn default_for(bank: BankId) -> Self {
        use crate::config::*;
        let capacity = match bank {
            BankId::Internal => DEFAULT_INTERNAL_CAPACITY,
            BankId::CoreCoupled => DEFAULT_CORE_COUPLED_CAPACITY,
            BankId::External => DEFAULT_EXTERNAL_CAPACITY,
        };
        Self::new(capacity, DEFAULT_BLOCK_SIZE)
    }

    /// Validate the geometry: nonzero block size dividing a nonzero
    /// capacity, with a block count that fits the table's counter width
    pub fn validate(&self) -> Result<()> {
        if self.block_size == 0 {
            return Err(MemBankError::invalid_argument(
                "block_size",
                "Block size must be greater than 0",
            ));
        }
        if self.capacity == 0 || self.capacity % self.block_size != 0 {
            return Err(MemBankError::invalid_argument(
                "capacity",
                "Capacity must be a nonzero multiple of the block size",
            ));
        }
        if self.capacity / self.block_size > u16::MAX as usize {
            return Err(MemBankError::invalid_argument(
                "capacity",
                "Block count exceeds the allocation table's counter range",
            ));
        }
        Ok(())
    }

    /// Number of blocks this configuration yields
    pub fn block_count(&self) -> usize {
        self.capacity / self.block_size
    }
}

/// One independently managed memory bank
///
/// A bank exclusively owns its backing buffer and allocation table for its
/// entire lifetime; banks never share storage. A bank starts uninitialized
/// and becomes ready once [`initialize`](Self::initialize) runs; there is
/// no teardown transition.
#[derive(Debug)]
pub struct Bank {
    id: BankId,
    backing: Box<[u8]>,
    table: AllocationTable,
    block_size: usize,
    ready: bool,
}

impl Bank {
    /// Create a bank from a validated configuration
    ///
    /// The bank is not ready until [`initialize`](Self::initialize) is
    /// called.
    pub fn new(id: BankId, config: BankConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            id,
            backing: vec![0u8; config.capacity].into_boxed_slice(),
            table: AllocationTable::new(config.block_count()),
            block_size: config.block_size,
            ready: false,
        })
    }

    /// Bank identifier
    pub fn id(&self) -> BankId {
        self.id
    }

    /// Total capacity in bytes
    pub fn capacity(&self) -> usize {
        self.backing.len()
    }

    /// Block size in bytes
    pub fn block_size(&self) -> usize {
        self.block_size
    }

    /// Total number of blocks
    pub fn block_count(&self) -> usize {
        self.table.len()
    }

    /// Whether the bank has been initialized
    pub fn is_ready(&self) -> bool {
        self.ready
    }

    /// Initialize the bank: zero the allocation table and the backing
    /// buffer, then mark the bank ready.
    ///
    /// Idempotent, and destructive when repeated: re-initializing discards
    /// every outstanding allocation in the bank without warning. Callers
    /// must not re-initialize while allocations from this bank are live.
    pub fn initialize(&mut self) {
        self.table.clear();
        self.backing.fill(0);
        self.ready = true;
        debug!(
            "bank {:?} initialized: {} blocks of {} bytes",
            self.id,
            self.block_count(),
            self.block_size
        );
    }

    /// Allocate `size` bytes, returning the byte offset of the granted run.
    ///
    /// The request is rounded up to whole blocks and placed by a
    /// last-fit-from-top scan: the run granted is the one nearest the
    /// high-address end of the bank. Fails with `OutOfMemory` if no
    /// sufficient run exists; a failed call has no side effects.
    pub fn allocate(&mut self, size: usize) -> Result<usize> {
        if !self.ready {
            return Err(MemBankError::not_ready(self.id));
        }
        if size == 0 {
            return Err(MemBankError::invalid_argument(
                "size",
                "Size must be greater than 0",
            ));
        }
        let blocks = size.div_ceil(self.block_size);
        let start = self
            .table
            .find_free_run(blocks)
            .ok_or_else(|| MemBankError::out_of_memory(self.id, blocks))?;
        self.table.mark_run(start, blocks);
        let offset = start * self.block_size;
        trace!(
            "bank {:?}: allocated {} blocks at offset {:#x}",
            self.id,
            blocks,
            offset
        );
        Ok(offset)
    }

    /// Free the allocation starting at byte offset `offset`.
    ///
    /// `offset` must be exactly the value returned by a previous
    /// [`allocate`](Self::allocate) on this bank, not yet freed. An interior
    /// offset, a stale offset, or an offset from another bank reads whatever
    /// counter sits at that table index and clears that range - silent
    /// bookkeeping corruption, not a detected error. The clearing itself is
    /// bounded by the table, so misuse never reaches outside this bank.
    pub fn free(&mut self, offset: usize) -> Result<()> {
        if !self.ready {
            return Err(MemBankError::not_ready(self.id));
        }
        if offset >= self.capacity() {
            return Err(MemBankError::invalid_argument(
                "offset",
                "Offset is outside the bank's address range",
            ));
        }
        let index = offset / self.block_size;
        let blocks = self.table.clear_run(index);
        trace!(
            "bank {:?}: freed {} blocks at offset {:#x}",
            self.id,
            blocks,
            offset
        );
        Ok(())
    }

    /// Utilization in permille (0..=1000)
    ///
    /// Returns 0 for a bank that has not been initialized; a query, not a
    /// fallible operation.
    pub fn used_permille(&self) -> u16 {
        if !self.ready || self.table.is_empty() {
            return 0;
        }
        (self.table.used_blocks() * 1000 / self.table.len()) as u16
    }

    /// Count of blocks currently allocated
    pub fn used_blocks(&self) -> usize {
        self.table.used_blocks()
    }

    /// Run length in bytes of the allocation starting at `offset`, 0 if the
    /// block at `offset` is free
    pub(crate) fn run_bytes_at(&self, offset: usize) -> usize {
        self.table.run_length_at(offset / self.block_size) * self.block_size
    }

    /// Immutable view of the bank's backing storage
    pub(crate) fn backing(&self) -> &[u8] {
        &self.backing
    }

    /// Mutable view of the bank's backing storage
    pub(crate) fn backing_mut(&mut self) -> &mut [u8] {
        &mut self.backing
    }

    /// Copy `len` bytes between two offsets within the backing buffer
    pub(crate) fn copy_within(&mut self, src: usize, dest: usize, len: usize) {
        self.backing.copy_within(src..src + len, dest);
    }
}
