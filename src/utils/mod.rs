//! Utility functions and helpers
//!
//! Hashing, timestamps and the canonical JSON form used for block hashing.

pub mod crypto;
pub mod serialization;

pub use crypto::{current_timestamp, sha256_digest, sha256_hex};

pub use serialization::canonical_json;
