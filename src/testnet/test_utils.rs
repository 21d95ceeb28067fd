//! Test utilities for ledger and node testing

use crate::config::Config;
use crate::core::{Block, Blockchain, MiningOutcome, ProofOfWork, Transaction};
use crate::network::Node;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// Seal a block with `transactions` on top of the ledger's tip at the
/// ledger's own difficulty
pub fn seal_next_block(ledger: &Blockchain, transactions: Vec<Transaction>) -> Block {
    let candidate = Block::assemble(
        ledger.len() as u64,
        ledger.get_tip().get_hash(),
        transactions,
        0,
        None,
    )
    .unwrap();
    let pow = ProofOfWork::new_proof_of_work(candidate, ledger.get_difficulty()).unwrap();
    match pow.run(&AtomicBool::new(false), 0, None).unwrap() {
        MiningOutcome::Mined(block) => block,
        MiningOutcome::Cancelled => unreachable!("cancel flag is never set"),
    }
}

/// Genesis plus one confirmed block crediting `address` with `amount`
pub fn funded_ledger(address: &str, amount: f64, difficulty: &str) -> Blockchain {
    let mut ledger = Blockchain::new(difficulty);
    let grant = Transaction::new("genesis", address, amount).unwrap();
    let block = seal_next_block(&ledger, vec![grant]);
    assert!(ledger.admit_block(block));
    ledger
}

/// Genesis plus `blocks` blocks, each holding a single coinbase to "miner"
pub fn build_chain(blocks: usize, difficulty: &str) -> Blockchain {
    let mut ledger = Blockchain::new(difficulty);
    for _ in 0..blocks {
        let coinbase = Transaction::new_coinbase_tx("miner", 50.0, 1.0).unwrap();
        let block = seal_next_block(&ledger, vec![coinbase]);
        assert!(ledger.admit_block(block));
    }
    ledger
}

/// Loopback configuration on an ephemeral port with trivial difficulty
pub fn test_config(bootstrap_peers: Vec<String>) -> Config {
    Config {
        listen_addr: "127.0.0.1:0".to_string(),
        bootstrap_peers,
        difficulty: "0".to_string(),
        connect_timeout_ms: 1_000,
        read_timeout_ms: 1_000,
        ..Config::default()
    }
}

pub fn start_test_node(bootstrap_peers: Vec<String>) -> Arc<Node> {
    Node::start(test_config(bootstrap_peers)).unwrap()
}

/// Poll `condition` until it holds or `timeout` passes
pub fn wait_until<F: Fn() -> bool>(timeout: Duration, condition: F) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(20));
    }
    condition()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_funded_ledger() {
        let ledger = funded_ledger("alice", 50.0, "0");
        assert_eq!(ledger.len(), 2);
        assert_eq!(ledger.balance_of("alice"), 50.0);
    }

    #[test]
    fn test_build_chain_is_valid() {
        let ledger = build_chain(3, "0");
        assert_eq!(ledger.len(), 4);
        assert!(ledger.validate_full_chain(ledger.get_blocks()));
    }

    #[test]
    fn test_wait_until() {
        assert!(wait_until(Duration::from_millis(50), || true));
        assert!(!wait_until(Duration::from_millis(50), || false));
    }
}
