//! # membank - Multi-Bank Fixed-Block Memory Allocator
//!
//! membank partitions a small fixed set of independent memory regions
//! ("banks") into equal-size blocks and services variable-size allocation
//! requests by granting runs of contiguous blocks. Free/used state lives in
//! a per-bank run-length allocation table; placement follows a
//! last-fit-from-top scan that keeps low addresses free for long-lived
//! early allocations.
//!
//! ## Features
//!
//! - **Independent banks**: each bank exclusively owns its backing buffer
//!   and table; banks never interfere with each other
//! - **Bounded, deterministic operations**: every call is a synchronous
//!   scan over at most `block_count` table entries, no blocking or sleeping
//! - **Two API levels**: an offset-based core reporting typed errors, and
//!   a malloc-style pointer facade returning `Option<NonNull<u8>>`
//! - **No hidden state**: the [`BankRegistry`] is an explicit value owned
//!   by whoever assembles the system
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────┐
//! │                 BankRegistry                    │
//! │  alloc / release / reallocate   (pointer level) │
//! │  initialize / allocate / free   (offset level)  │
//! ├────────────────┬────────────────┬───────────────┤
//! │ Bank::Internal │ Bank::CoreCoup.│ Bank::External│
//! │  backing buf   │  backing buf   │  backing buf  │
//! │  alloc table   │  alloc table   │  alloc table  │
//! └────────────────┴────────────────┴───────────────┘
//! ```
//!
//! ## Example
//!
//! ```
//! use membank::{BankId, BankRegistry};
//!
//! let registry = BankRegistry::default();
//! registry.initialize(BankId::Internal)?;
//!
//! let offset = registry.allocate(BankId::Internal, 100)?;
//! assert!(registry.used_permille(BankId::Internal) > 0);
//! registry.free(BankId::Internal, offset)?;
//! # Ok::<(), membank::MemBankError>(())
//! ```

pub mod bank;
pub mod error;
pub mod registry;
pub mod table;

// Main API re-exports
pub use bank::{Bank, BankConfig, BankId};
pub use error::{MemBankError, Result};
pub use registry::{BankRegistry, BankStats};
pub use table::AllocationTable;

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default configuration constants for the three-bank geometry
pub mod config {
    /// Default allocation block size in bytes
    pub const DEFAULT_BLOCK_SIZE: usize = 32;

    /// Default capacity of the internal bank (180 KiB)
    pub const DEFAULT_INTERNAL_CAPACITY: usize = 180 * 1024;

    /// Default capacity of the core-coupled bank (60 KiB)
    pub const DEFAULT_CORE_COUPLED_CAPACITY: usize = 60 * 1024;

    /// Default capacity of the external bank (768 KiB)
    pub const DEFAULT_EXTERNAL_CAPACITY: usize = 768 * 1024;
}
