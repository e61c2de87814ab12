//! Network access.

pub mod rpc;
