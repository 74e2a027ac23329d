//! # Agent Relay Test Suite
//!
//! Unified cross-crate tests. Per-module unit tests live with their crates;
//! everything here exercises the assembled relay.
//!
//! ## Structure
//!
//! ```text
//! tests/src/
//! └── integration/
//!     ├── transport_contract.rs  # Wire-level guarantees of the event bus
//!     ├── e2e_choreography.rs    # Full event flows across the manager
//!     └── lifecycle.rs           # Startup, registry lifecycle, shutdown
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! # All tests
//! cargo test -p relay-tests
//!
//! # By category
//! cargo test -p relay-tests integration::e2e_choreography::
//! cargo test -p relay-tests integration::lifecycle::
//! ```

#![allow(unused_imports)]
#![allow(dead_code)]

pub mod integration;
