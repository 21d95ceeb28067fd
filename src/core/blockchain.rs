// The ledger: the chain of sealed blocks plus the pool of admitted-but-unconfirmed
// transactions. Everything here is single-threaded; the node wraps one instance in
// its ledger lock and every read-modify-write goes through that lock.

use crate::core::monetary::DEFAULT_DIFFICULTY;
use crate::core::{Block, ProofOfWork, Transaction};
use crate::storage::MemoryPool;
use log::{debug, info};
use std::collections::{HashMap, HashSet};

#[derive(Debug, Clone)]
pub struct Blockchain {
    chain: Vec<Block>,
    mempool: MemoryPool,
    difficulty: String,
}

impl Default for Blockchain {
    fn default() -> Self {
        Self::new(DEFAULT_DIFFICULTY)
    }
}

impl Blockchain {
    /// A ledger holding only the genesis block
    pub fn new(difficulty: &str) -> Blockchain {
        Blockchain {
            chain: vec![Block::genesis()],
            mempool: MemoryPool::new(),
            difficulty: difficulty.to_string(),
        }
    }

    pub fn get_difficulty(&self) -> &str {
        self.difficulty.as_str()
    }

    pub fn get_tip(&self) -> &Block {
        // chain always starts with genesis
        &self.chain[self.chain.len() - 1]
    }

    pub fn get_tip_hash(&self) -> String {
        self.get_tip().get_hash().to_string()
    }

    /// Number of blocks, genesis included
    pub fn len(&self) -> usize {
        self.chain.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chain.is_empty()
    }

    pub fn get_blocks(&self) -> &[Block] {
        self.chain.as_slice()
    }

    pub fn get_mempool(&self) -> &MemoryPool {
        &self.mempool
    }

    pub fn pending_transactions(&self) -> Vec<Transaction> {
        self.mempool.get_all()
    }

    /// Credits minus debits over the confirmed chain, minus what the address
    /// has already committed in the mempool.
    pub fn balance_of(&self, address: &str) -> f64 {
        let mut balance = 0.0;
        for block in &self.chain {
            for tx in block.get_transactions() {
                if tx.get_destination() == address {
                    balance += tx.get_amount();
                }
                if tx.get_origin() == address {
                    balance -= tx.get_amount();
                }
            }
        }
        balance - self.mempool.pending_debits(address)
    }

    /// Whether the id is pending or already confirmed in any block
    pub fn contains_transaction(&self, txid: &str) -> bool {
        self.mempool.contains(txid)
            || self
                .chain
                .iter()
                .any(|block| block.get_transactions().iter().any(|tx| tx.get_id() == txid))
    }

    /// Admit a transaction into the mempool.
    ///
    /// Rejected (false) when its id is already known, when it is malformed, or
    /// when the origin cannot cover it. Minting origins and `trusted` callers
    /// skip the balance check.
    pub fn admit_transaction(&mut self, tx: Transaction, trusted: bool) -> bool {
        if let Err(e) = tx.validate() {
            debug!("Rejected transaction {}: {e}", tx.get_id());
            return false;
        }
        if self.contains_transaction(tx.get_id()) {
            debug!("Rejected transaction {}: duplicate id", tx.get_id());
            return false;
        }
        if !trusted && !tx.is_minting() {
            let available = self.balance_of(tx.get_origin());
            if available < tx.get_amount() {
                debug!(
                    "Rejected transaction {}: {} has {available}, needs {}",
                    tx.get_id(),
                    tx.get_origin(),
                    tx.get_amount()
                );
                return false;
            }
        }

        self.mempool.add(tx)
    }

    /// Whether `block` extends the current tip.
    ///
    /// Strictly append-only: the index must be the next height and the block
    /// must link to the current tip, meet the difficulty and hash correctly.
    /// Its transactions must not repeat a confirmed id and must not spend
    /// more than their origins hold.
    pub fn validate_block(&self, block: &Block) -> bool {
        if block.get_index() != self.chain.len() as u64 {
            debug!(
                "Block {} rejected: index {} but chain length is {}",
                block.get_hash(),
                block.get_index(),
                self.chain.len()
            );
            return false;
        }
        if block.get_previous_hash() != self.get_tip().get_hash() {
            debug!("Block {} rejected: does not link to tip", block.get_hash());
            return false;
        }
        if !Self::block_is_sealed(block, &self.difficulty) {
            return false;
        }
        match LedgerReplay::of(&self.chain).apply(block) {
            Ok(()) => true,
            Err(reason) => {
                debug!("Block {} rejected: {reason}", block.get_hash());
                false
            }
        }
    }

    /// Validate and append; confirmed ids leave the mempool.
    /// On rejection neither chain nor mempool changes.
    pub fn admit_block(&mut self, block: Block) -> bool {
        if !self.validate_block(&block) {
            return false;
        }

        let removed = self.mempool.remove_confirmed(block.get_transactions());
        info!(
            "Appended block #{} {} ({} transactions, {removed} confirmed from mempool)",
            block.get_index(),
            block.get_hash(),
            block.get_transactions().len()
        );
        self.chain.push(block);

        // a foreign block may have spent what pending transactions rely on
        let dropped = self.readmit_pending();
        if dropped > 0 {
            info!("Dropped {dropped} pending transactions no longer covered");
        }
        true
    }

    /// Check a whole chain received from a peer: it must start with our
    /// genesis and every later block must link, hash and meet the difficulty.
    pub fn validate_full_chain(&self, candidate: &[Block]) -> bool {
        let Some(first) = candidate.first() else {
            return false;
        };

        let genesis = Block::genesis();
        if first.get_hash() != genesis.get_hash() || !first.has_valid_hash() {
            debug!("Candidate chain rejected: genesis mismatch");
            return false;
        }

        let mut replay = LedgerReplay::default();
        for (position, pair) in candidate.windows(2).enumerate() {
            let (previous, current) = (&pair[0], &pair[1]);
            if current.get_index() != (position + 1) as u64 {
                debug!("Candidate chain rejected: bad index at {}", position + 1);
                return false;
            }
            if current.get_previous_hash() != previous.get_hash() {
                debug!("Candidate chain rejected: broken link at {}", position + 1);
                return false;
            }
            if !Self::block_is_sealed(current, &self.difficulty) {
                debug!("Candidate chain rejected: bad seal at {}", position + 1);
                return false;
            }
            if let Err(reason) = replay.apply(current) {
                debug!("Candidate chain rejected at {}: {reason}", position + 1);
                return false;
            }
        }
        true
    }

    /// Adopt `candidate` when it is strictly longer than the local chain and
    /// fully valid. Pending transactions that the new chain confirms are
    /// dropped; the rest are re-admitted against the new balances.
    pub fn replace_chain(&mut self, candidate: Vec<Block>) -> bool {
        if candidate.len() <= self.chain.len() {
            debug!(
                "Kept local chain: candidate length {} <= {}",
                candidate.len(),
                self.chain.len()
            );
            return false;
        }
        if !self.validate_full_chain(&candidate) {
            return false;
        }

        let previous_len = self.chain.len();
        self.chain = candidate;

        let pending_count = self.mempool.len();
        let dropped = self.readmit_pending();
        info!(
            "Replaced chain: {previous_len} -> {} blocks, kept {} of {pending_count} pending transactions",
            self.chain.len(),
            pending_count - dropped
        );
        true
    }

    /// Re-offer every pending transaction in admission order against the
    /// current chain; returns how many no longer qualify
    fn readmit_pending(&mut self) -> usize {
        let pending = self.mempool.take_all();
        let pending_count = pending.len();
        let kept = pending
            .into_iter()
            .filter(|tx| self.admit_transaction(tx.clone(), false))
            .count();
        pending_count - kept
    }

    fn block_is_sealed(block: &Block, difficulty: &str) -> bool {
        if !ProofOfWork::validate(block, difficulty) {
            debug!("Block {} rejected: bad proof-of-work or stale hash", block.get_hash());
            return false;
        }
        if let Some(bad) = block.get_transactions().iter().find(|tx| tx.validate().is_err()) {
            debug!(
                "Block {} rejected: malformed transaction {}",
                block.get_hash(),
                bad.get_id()
            );
            return false;
        }
        true
    }
}

/// Confirmed ids and balances accumulated block by block
#[derive(Default)]
struct LedgerReplay {
    seen: HashSet<String>,
    balances: HashMap<String, f64>,
}

impl LedgerReplay {
    /// State after `blocks`, which are already part of a valid chain
    fn of(blocks: &[Block]) -> LedgerReplay {
        let mut replay = LedgerReplay::default();
        for block in blocks {
            for tx in block.get_transactions() {
                replay.seen.insert(tx.get_id().to_string());
                replay.transfer(tx);
            }
        }
        replay
    }

    /// Apply `block` in transaction order. Fails on an id seen before,
    /// in earlier blocks or earlier in the same block, and on a
    /// non-minting origin spending more than it holds at that point.
    fn apply(&mut self, block: &Block) -> Result<(), String> {
        for tx in block.get_transactions() {
            if !self.seen.insert(tx.get_id().to_string()) {
                return Err(format!("transaction {} is already confirmed", tx.get_id()));
            }
            if !tx.is_minting() {
                let available = self.balances.get(tx.get_origin()).copied().unwrap_or(0.0);
                if available < tx.get_amount() {
                    return Err(format!(
                        "transaction {} overspends: {} has {available}, needs {}",
                        tx.get_id(),
                        tx.get_origin(),
                        tx.get_amount()
                    ));
                }
            }
            self.transfer(tx);
        }
        Ok(())
    }

    fn transfer(&mut self, tx: &Transaction) {
        *self.balances.entry(tx.get_origin().to_string()).or_insert(0.0) -= tx.get_amount();
        *self
            .balances
            .entry(tx.get_destination().to_string())
            .or_insert(0.0) += tx.get_amount();
    }
}
