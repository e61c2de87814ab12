//! Domain model: pacts, participants, amounts, keys and the ports the
//! application layer talks to.

pub mod amount;
pub mod keys;
pub mod pact;
pub mod ports;
pub mod reference;
