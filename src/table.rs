//! Run-length allocation table - the per-bank free/used bookkeeping structure

/// Per-bank allocation table: one `u16` counter per block, index 0 at the
/// lowest address.
///
/// An entry of `0` means the block is free. A nonzero entry `n` at index `i`
/// means a single allocation occupies blocks `[i, i+n-1]`, and the same
/// value `n` is stored at every one of those indices. Storing the run length
/// redundantly lets [`clear_run`](Self::clear_run) recover the full extent
/// of an allocation from its starting index alone.
///
/// The table length is fixed at construction and never changes.
#[derive(Debug)]
pub struct AllocationTable {
    entries: Box<[u16]>,
}

impl AllocationTable {
    /// Create a table for `block_count` blocks, all free
    pub fn new(block_count: usize) -> Self {
        Self {
            entries: vec![0u16; block_count].into_boxed_slice(),
        }
    }

    /// Number of blocks tracked by this table
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True if the table tracks no blocks
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Mark every block free
    pub fn clear(&mut self) {
        self.entries.fill(0);
    }

    /// Find a run of `n` consecutive free blocks, scanning from the highest
    /// index down to 0.
    ///
    /// Returns the start index of the first sufficient run encountered,
    /// which is the run nearest the high-address end of the region
    /// (last-fit-from-top). Low indices are left undisturbed for long-lived
    /// early allocations. Returns `None` if no such run exists; the table
    /// is never modified by the search.
    pub fn find_free_run(&self, n: usize) -> Option<usize> {
        if n == 0 || n > self.entries.len() {
            return None;
        }
        let mut consecutive = 0usize;
        for index in (0..self.entries.len()).rev() {
            if self.entries[index] == 0 {
                consecutive += 1;
            } else {
                consecutive = 0;
            }
            if consecutive == n {
                return Some(index);
            }
        }
        None
    }

    /// Mark the run `[start, start+n-1]` as one allocation of `n` blocks.
    ///
    /// The caller must have obtained `start` from
    /// [`find_free_run`](Self::find_free_run) with the same `n`.
    pub fn mark_run(&mut self, start: usize, n: usize) {
        debug_assert!(start + n <= self.entries.len());
        debug_assert!(n <= u16::MAX as usize);
        for entry in &mut self.entries[start..start + n] {
            *entry = n as u16;
        }
    }

    /// Clear the run starting at `start`, returning its length in blocks.
    ///
    /// Reads the run length from the entry at `start` and zeroes that many
    /// entries. Trusts `start` to be the first block of a live allocation:
    /// an interior index, an already-freed index, or an index marked by a
    /// foreign table clears whatever range the stale counter describes,
    /// silently corrupting the bookkeeping. The range is clamped to the
    /// table length, so a corrupt counter cannot reach outside the table.
    pub fn clear_run(&mut self, start: usize) -> usize {
        let n = self.entries[start] as usize;
        let end = start.saturating_add(n).min(self.entries.len());
        self.entries[start..end].fill(0);
        n
    }

    /// Run length recorded at `index`, 0 if the block is free
    pub fn run_length_at(&self, index: usize) -> usize {
        self.entries[index] as usize
    }

    /// Count of blocks currently part of any allocation
    pub fn used_blocks(&self) -> usize {
        self.entries.iter().filter(|&&entry| entry != 0).count()
    }
}
