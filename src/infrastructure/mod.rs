//! Adapters: store implementations and the simulated settlement network.

pub mod in_memory;
#[cfg(feature = "storage-rocksdb")]
pub mod rocksdb;
pub mod simulated_ledger;
