//! Adapters behind the ports: in-memory and RocksDB stores, clocks and the
//! simulated payment processor.

pub mod clock;
pub mod in_memory;
pub mod processor;
#[cfg(feature = "storage-rocksdb")]
pub mod rocksdb;
