//! Payment requests that external wallets can scan or open.

pub mod qr;
pub mod request;
