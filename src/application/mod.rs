//! Orchestration of pact creation, checkout and confirmation.
//!
//! [`registry::PactRegistry`] owns all persisted state. The checkout path is
//! [`builder`] -> [`signer`] -> [`tracker`], composed by [`checkout`].

pub mod builder;
pub mod checkout;
pub mod registry;
pub mod signer;
pub mod tracker;
