//! Shared helpers for unit tests: funded ledgers, cheaply mined blocks and
//! loopback nodes.

pub mod test_utils;

pub use test_utils::*;
