//! Adapters behind the domain ports, plus the local keypair wallet.

pub mod in_memory;
pub mod keypair_wallet;
pub mod notify;
#[cfg(feature = "storage-rocksdb")]
pub mod rocksdb;
