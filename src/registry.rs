//! Bank registry: fixed set of banks, offset-level dispatch, and the
//! pointer-level allocation facade

use std::{ptr::NonNull, sync::Mutex};

use log::debug;

use crate::{
    bank::{Bank, BankConfig, BankId},
    error::Result,
};

/// Point-in-time usage snapshot for one bank
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BankStats {
    /// Bank identifier
    pub bank: BankId,
    /// Total capacity in bytes
    pub capacity: usize,
    /// Block size in bytes
    pub block_size: usize,
    /// Total number of blocks
    pub block_count: usize,
    /// Blocks currently allocated
    pub used_blocks: usize,
    /// Utilization in permille (0..=1000)
    pub used_permille: u16,
}

/// Registry of all configured memory banks
///
/// Owns one [`Bank`] per [`BankId`], each behind its own mutex: operations
/// on different banks never contend, while concurrent callers against the
/// same bank serialize on that bank's critical section (the table's
/// scan-then-mark sequence must not interleave). Whoever assembles the
/// system owns the registry and passes it, or a handle to it, explicitly -
/// there is no process-wide instance.
///
/// The registry exposes two levels of API. The offset level
/// ([`allocate`](Self::allocate), [`free`](Self::free)) speaks byte offsets
/// within a bank and reports failures as [`MemBankError`](crate::MemBankError).
/// The pointer level ([`alloc`](Self::alloc), [`release`](Self::release),
/// [`reallocate`](Self::reallocate)) translates offsets to addresses inside
/// the bank's backing buffer at the boundary and signals failure with
/// `None`, matching a malloc-style contract.
#[derive(Debug)]
pub struct BankRegistry {
    banks: [Mutex<Bank>; BankId::COUNT],
}

impl BankRegistry {
    /// Create a registry from one configuration per bank, in
    /// [`BankId::ALL`] order
    ///
    /// Fails if any configuration has invalid geometry. Banks start
    /// uninitialized.
    pub fn new(configs: [BankConfig; BankId::COUNT]) -> Result<Self> {
        let [internal, core_coupled, external] = configs;
        Ok(Self {
            banks: [
                Mutex::new(Bank::new(BankId::Internal, internal)?),
                Mutex::new(Bank::new(BankId::CoreCoupled, core_coupled)?),
                Mutex::new(Bank::new(BankId::External, external)?),
            ],
        })
    }

    fn bank(&self, bank: BankId) -> &Mutex<Bank> {
        &self.banks[bank.index()]
    }

    /// Initialize a bank: zero its table and backing buffer and mark it
    /// ready.
    ///
    /// Idempotent; re-initializing discards all outstanding allocations
    /// from the bank. Must not be called while allocations from the bank
    /// are still in use.
    pub fn initialize(&self, bank: BankId) -> Result<()> {
        self.bank(bank).lock().unwrap().initialize();
        Ok(())
    }

    /// Initialize every configured bank
    pub fn initialize_all(&self) -> Result<()> {
        for bank in BankId::ALL {
            self.initialize(bank)?;
        }
        Ok(())
    }

    /// Allocate `size` bytes from a bank, returning the byte offset of the
    /// granted block run (see [`Bank::allocate`])
    pub fn allocate(&self, bank: BankId, size: usize) -> Result<usize> {
        self.bank(bank).lock().unwrap().allocate(size)
    }

    /// Free the allocation starting at `offset` in a bank (see
    /// [`Bank::free`] for the trust contract)
    pub fn free(&self, bank: BankId, offset: usize) -> Result<()> {
        self.bank(bank).lock().unwrap().free(offset)
    }

    /// Utilization of a bank in permille (0..=1000); 0 for a bank that is
    /// not ready
    pub fn used_permille(&self, bank: BankId) -> u16 {
        self.bank(bank).lock().unwrap().used_permille()
    }

    /// Usage snapshot for a bank
    pub fn bank_stats(&self, bank: BankId) -> BankStats {
        let guard = self.bank(bank).lock().unwrap();
        BankStats {
            bank,
            capacity: guard.capacity(),
            block_size: guard.block_size(),
            block_count: guard.block_count(),
            used_blocks: guard.used_blocks(),
            used_permille: guard.used_permille(),
        }
    }

    /// Allocate `size` bytes from a bank, returning a pointer into the
    /// bank's backing buffer, or `None` on any failure.
    ///
    /// The pointer stays valid until the allocation is released or the bank
    /// is re-initialized. Reads and writes through it are `unsafe` and must
    /// stay within the granted run.
    pub fn alloc(&self, bank: BankId, size: usize) -> Option<NonNull<u8>> {
        let mut guard = self.bank(bank).lock().unwrap();
        let offset = match guard.allocate(size) {
            Ok(offset) => offset,
            Err(err) => {
                debug!("bank {bank:?}: alloc({size}) failed: {err}");
                return None;
            }
        };
        // Offset is block-aligned and within the backing buffer.
        NonNull::new(unsafe { guard.backing_mut().as_mut_ptr().add(offset) })
    }

    /// Release a pointer previously returned by [`alloc`](Self::alloc) or
    /// [`reallocate`](Self::reallocate).
    ///
    /// A `None` pointer or a pointer outside the bank's backing range is
    /// ignored. Like [`Bank::free`], the pointer is trusted to be the start
    /// of a live allocation from this bank; anything else silently corrupts
    /// the bank's bookkeeping.
    pub fn release(&self, bank: BankId, ptr: Option<NonNull<u8>>) {
        let Some(ptr) = ptr else { return };
        let mut guard = self.bank(bank).lock().unwrap();
        let Some(offset) = offset_in_bank(&guard, ptr) else {
            debug!("bank {bank:?}: release of foreign pointer ignored");
            return;
        };
        let _ = guard.free(offset);
    }

    /// Resize an allocation, malloc-style.
    ///
    /// A `None` pointer behaves as [`alloc`](Self::alloc); `new_size == 0`
    /// behaves as [`release`](Self::release) and returns `None`. Otherwise
    /// a fresh run of `new_size` bytes is allocated, the old content is
    /// copied (at most the old run's length, so a shrinking reallocation
    /// never reads past the original allocation), and the old run is freed.
    /// No in-place growth is attempted. If the fresh allocation fails, the
    /// old allocation is left intact and `None` is returned.
    pub fn reallocate(
        &self,
        bank: BankId,
        ptr: Option<NonNull<u8>>,
        new_size: usize,
    ) -> Option<NonNull<u8>> {
        let Some(ptr) = ptr else {
            return self.alloc(bank, new_size);
        };
        if new_size == 0 {
            self.release(bank, Some(ptr));
            return None;
        }
        let mut guard = self.bank(bank).lock().unwrap();
        let old_offset = offset_in_bank(&guard, ptr)?;
        let old_bytes = guard.run_bytes_at(old_offset);
        let new_offset = match guard.allocate(new_size) {
            Ok(offset) => offset,
            Err(err) => {
                debug!("bank {bank:?}: reallocate({new_size}) failed: {err}");
                return None;
            }
        };
        guard.copy_within(old_offset, new_offset, old_bytes.min(new_size));
        let _ = guard.free(old_offset);
        NonNull::new(unsafe { guard.backing_mut().as_mut_ptr().add(new_offset) })
    }
}

impl Default for BankRegistry {
    /// Registry with the default three-bank geometry (see
    /// [`BankConfig::default_for`])
    fn default() -> Self {
        Self::new([
            BankConfig::default_for(BankId::Internal),
            BankConfig::default_for(BankId::CoreCoupled),
            BankConfig::default_for(BankId::External),
        ])
        .expect("default bank geometry is valid")
    }
}

/// Translate a pointer into its byte offset within the bank's backing
/// buffer, or `None` if the pointer does not point into it
fn offset_in_bank(bank: &Bank, ptr: NonNull<u8>) -> Option<usize> {
    let base = bank.backing().as_ptr() as usize;
    let addr = ptr.as_ptr() as usize;
    if addr < base || addr >= base + bank.capacity() {
        return None;
    }
    Some(addr - base)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_registry() -> BankRegistry {
        // Small uniform geometry: every bank 1024 bytes in 32-byte blocks.
        let registry = BankRegistry::new([BankConfig::new(1024, 32); BankId::COUNT]).unwrap();
        registry.initialize_all().unwrap();
        registry
    }

    #[test]
    fn test_default_registry_geometry() {
        let registry = BankRegistry::default();
        let stats = registry.bank_stats(BankId::External);
        assert_eq!(stats.capacity, 768 * 1024);
        assert_eq!(stats.block_size, 32);
        assert_eq!(stats.block_count, 24576);
    }

    #[test]
    fn test_initialize_all_banks_idle() {
        let registry = test_registry();
        for bank in BankId::ALL {
            assert_eq!(registry.used_permille(bank), 0);
        }
    }

    #[test]
    fn test_alloc_release_round_trip() {
        let registry = test_registry();
        let before = registry.used_permille(BankId::Internal);
        let ptr = registry.alloc(BankId::Internal, 100);
        assert!(ptr.is_some());
        assert!(registry.used_permille(BankId::Internal) > before);
        registry.release(BankId::Internal, ptr);
        assert_eq!(registry.used_permille(BankId::Internal), before);
    }

    #[test]
    fn test_alloc_offset_matches_top_down_placement() {
        let registry = test_registry();
        let offset = registry.allocate(BankId::Internal, 100).unwrap();
        assert_eq!(offset, 896);
        registry.free(BankId::Internal, offset).unwrap();
        // Deterministic and unaffected by history.
        assert_eq!(registry.allocate(BankId::Internal, 32).unwrap(), 992);
    }

    #[test]
    fn test_alloc_from_uninitialized_bank_is_none() {
        let registry = BankRegistry::new([BankConfig::new(1024, 32); BankId::COUNT]).unwrap();
        assert!(registry.alloc(BankId::Internal, 64).is_none());
        assert_eq!(registry.used_permille(BankId::Internal), 0);
    }

    #[test]
    fn test_release_tolerates_null_and_foreign_pointers() {
        let registry = test_registry();
        registry.release(BankId::Internal, None);

        // A pointer that belongs to another bank's backing must be ignored.
        let foreign = registry.alloc(BankId::External, 64);
        registry.release(BankId::Internal, foreign);
        assert!(registry.used_permille(BankId::External) > 0);
        registry.release(BankId::External, foreign);
        assert_eq!(registry.used_permille(BankId::External), 0);
    }

    #[test]
    fn test_bank_isolation() {
        let registry = test_registry();
        let ptr = registry.alloc(BankId::Internal, 256);
        assert_eq!(registry.used_permille(BankId::CoreCoupled), 0);
        assert_eq!(registry.used_permille(BankId::External), 0);
        registry.release(BankId::Internal, ptr);
        for bank in BankId::ALL {
            assert_eq!(registry.used_permille(bank), 0);
        }
    }

    #[test]
    fn test_reallocate_null_behaves_as_alloc() {
        let registry = test_registry();
        let ptr = registry.reallocate(BankId::Internal, None, 64);
        assert!(ptr.is_some());
        registry.release(BankId::Internal, ptr);
    }

    #[test]
    fn test_reallocate_zero_size_behaves_as_release() {
        let registry = test_registry();
        let ptr = registry.alloc(BankId::Internal, 64);
        assert!(registry.reallocate(BankId::Internal, ptr, 0).is_none());
        assert_eq!(registry.used_permille(BankId::Internal), 0);
    }

    #[test]
    fn test_reallocate_growth_preserves_prefix() {
        let registry = test_registry();
        let ptr = registry.alloc(BankId::Internal, 10).unwrap();
        let payload: [u8; 10] = *b"0123456789";
        unsafe {
            std::ptr::copy_nonoverlapping(payload.as_ptr(), ptr.as_ptr(), payload.len());
        }
        let grown = registry
            .reallocate(BankId::Internal, Some(ptr), 50)
            .unwrap();
        let mut readback = [0u8; 10];
        unsafe {
            std::ptr::copy_nonoverlapping(grown.as_ptr(), readback.as_mut_ptr(), readback.len());
        }
        assert_eq!(readback, payload);
        registry.release(BankId::Internal, Some(grown));
        assert_eq!(registry.used_permille(BankId::Internal), 0);
    }

    #[test]
    fn test_reallocate_shrink_copies_only_old_run() {
        let registry = test_registry();
        let ptr = registry.alloc(BankId::Internal, 32).unwrap();
        unsafe {
            ptr.as_ptr().write_bytes(0xAB, 32);
        }
        let shrunk = registry.reallocate(BankId::Internal, Some(ptr), 8).unwrap();
        let mut readback = [0u8; 8];
        unsafe {
            std::ptr::copy_nonoverlapping(shrunk.as_ptr(), readback.as_mut_ptr(), readback.len());
        }
        assert_eq!(readback, [0xAB; 8]);
        registry.release(BankId::Internal, Some(shrunk));
    }

    #[test]
    fn test_reallocate_failure_keeps_old_allocation() {
        let registry = test_registry();
        let ptr = registry.alloc(BankId::Internal, 512).unwrap();
        let used = registry.used_permille(BankId::Internal);
        // Growing to more than the bank can hold alongside the old run.
        assert!(registry
            .reallocate(BankId::Internal, Some(ptr), 1024)
            .is_none());
        assert_eq!(registry.used_permille(BankId::Internal), used);
        registry.release(BankId::Internal, Some(ptr));
        assert_eq!(registry.used_permille(BankId::Internal), 0);
    }

    #[test]
    fn test_exhaustion_boundary_through_facade() {
        let registry = test_registry();
        let ptr = registry.alloc(BankId::CoreCoupled, 1024);
        assert!(ptr.is_some());
        assert_eq!(registry.used_permille(BankId::CoreCoupled), 1000);
        assert!(registry.alloc(BankId::CoreCoupled, 1).is_none());
        registry.release(BankId::CoreCoupled, ptr);
        assert_eq!(registry.used_permille(BankId::CoreCoupled), 0);
    }

    #[test]
    fn test_bank_stats_snapshot() {
        let registry = test_registry();
        let ptr = registry.alloc(BankId::Internal, 100);
        let stats = registry.bank_stats(BankId::Internal);
        assert_eq!(stats.bank, BankId::Internal);
        assert_eq!(stats.block_count, 32);
        assert_eq!(stats.used_blocks, 4);
        assert_eq!(stats.used_permille, 4 * 1000 / 32);
        registry.release(BankId::Internal, ptr);
    }

    #[test]
    fn test_registry_is_shareable_across_threads() {
        use std::sync::Arc;

        let registry = Arc::new(test_registry());
        let mut handles = Vec::new();
        for bank in BankId::ALL {
            let registry = Arc::clone(&registry);
            handles.push(std::thread::spawn(move || {
                for _ in 0..100 {
                    let offset = registry.allocate(bank, 64).unwrap();
                    registry.free(bank, offset).unwrap();
                }
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }
        for bank in BankId::ALL {
            assert_eq!(registry.used_permille(bank), 0);
        }
    }
}
