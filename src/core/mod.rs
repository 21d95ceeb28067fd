//! Core ledger functionality
//!
//! Transactions, blocks, the ledger (chain + mempool) and the
//! proof-of-work miner.

pub mod block;
pub mod blockchain;
pub mod monetary;
pub mod proof_of_work;
pub mod transaction;

pub use block::Block;
pub use blockchain::Blockchain;
pub use monetary::{
    is_minting_origin, COINBASE_ORIGIN, DEFAULT_DIFFICULTY, GENESIS_ORIGIN, MINING_REWARD,
};
pub use proof_of_work::{interrupt, Miner, MiningOutcome, ProofOfWork, DEFAULT_PROGRESS_INTERVAL};
pub use transaction::Transaction;
