//! Cross-crate integration tests for the assembled relay.

pub mod e2e_choreography;
pub mod lifecycle;
pub mod transport_contract;
