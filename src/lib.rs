//! # Courier Chain - a small proof-of-work ledger over TCP
//!
//! Each process runs one node: an in-memory chain plus a mempool, a miner
//! that can be cancelled, and a peer-to-peer layer that gossips
//! transactions and blocks as length-prefixed JSON envelopes.
//!
//! ## Layout
//! - `core/`: transactions, blocks, the ledger and proof-of-work mining
//! - `storage/`: the mempool and the operator event log (memory only)
//! - `network/`: wire protocol, peer registry, the node and its dispatcher
//! - `config/`: settings from defaults, TOML, environment and flags
//! - `utils/`: hashing, timestamps and canonical JSON
//! - `cli/`: the binary's command line and console commands
//!
//! ## Where to start
//! 1. `network/node.rs` for the operations a node exposes
//! 2. `network/server.rs` for how envelopes are dispatched
//! 3. `core/blockchain.rs` for admission and chain replacement
//! 4. `core/block.rs` for the canonical hash

pub mod cli;
pub mod config;
pub mod core;
pub mod error;
pub mod network;
pub mod storage;
pub mod utils;

#[cfg(test)]
pub mod testnet;

pub use cli::{Command, ConsoleCommand, Opt};
pub use config::Config;
pub use core::{Block, Blockchain, Miner, MiningOutcome, ProofOfWork, Transaction};
pub use error::{BlockchainError, Result};
pub use network::{Envelope, Message, MessageType, Node, PeerSet};
pub use storage::{EventLog, MemoryPool};
pub use utils::{canonical_json, current_timestamp, sha256_digest, sha256_hex};
