use crate::core::block::HashPreimage;
use crate::core::{Block, Blockchain, Transaction};
use crate::error::{BlockchainError, Result};
use log::{debug, info};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

/// Nonces tried between two progress reports
pub const DEFAULT_PROGRESS_INTERVAL: u64 = 10_000;

/// Result of a nonce search
#[derive(Debug, Clone, PartialEq)]
pub enum MiningOutcome {
    Mined(Block),
    Cancelled,
}

/// Brute-force nonce search over a single candidate block
pub struct ProofOfWork {
    block: Block,
    preimage: HashPreimage,
    difficulty: String,
}

impl ProofOfWork {
    pub fn new_proof_of_work(block: Block, difficulty: &str) -> Result<ProofOfWork> {
        let preimage = block.preimage()?;
        Ok(ProofOfWork {
            block,
            preimage,
            difficulty: difficulty.to_string(),
        })
    }

    /// Stored hash meets the difficulty and recomputes from the contents
    pub fn validate(block: &Block, difficulty: &str) -> bool {
        block.satisfies_difficulty(difficulty) && block.has_valid_hash()
    }

    /// Try nonces from the candidate's current nonce upwards until the hash
    /// meets the difficulty or `cancel` is observed.
    pub fn run(
        self,
        cancel: &AtomicBool,
        progress_interval: u64,
        on_progress: Option<&dyn Fn(u64)>,
    ) -> Result<MiningOutcome> {
        let ProofOfWork {
            mut block,
            preimage,
            difficulty,
        } = self;
        let mut nonce = block.get_nonce();
        let mut attempts: u64 = 0;

        loop {
            if cancel.load(Ordering::SeqCst) {
                info!(
                    "Mining of block #{} cancelled after {attempts} attempts",
                    block.get_index()
                );
                return Ok(MiningOutcome::Cancelled);
            }

            let hash = preimage.digest(nonce);
            if hash.starts_with(difficulty.as_str()) {
                block.seal(nonce, hash);
                debug!("Nonce {nonce} found after {attempts} attempts");
                return Ok(MiningOutcome::Mined(block));
            }

            attempts += 1;
            if progress_interval > 0 && attempts % progress_interval == 0 {
                if let Some(report) = on_progress {
                    report(nonce);
                }
            }

            nonce = nonce.checked_add(1).ok_or_else(|| {
                BlockchainError::Mining("Nonce space exhausted".to_string())
            })?;
        }
    }
}

/// Builds candidate blocks from the ledger and searches for a valid nonce
#[derive(Debug, Clone)]
pub struct Miner {
    reward_address: String,
    reward: f64,
    difficulty: String,
    progress_interval: u64,
}

impl Miner {
    pub fn new(reward_address: &str, reward: f64, difficulty: &str) -> Miner {
        Miner {
            reward_address: reward_address.to_string(),
            reward,
            difficulty: difficulty.to_string(),
            progress_interval: DEFAULT_PROGRESS_INTERVAL,
        }
    }

    pub fn with_progress_interval(mut self, progress_interval: u64) -> Miner {
        self.progress_interval = progress_interval;
        self
    }

    /// Mine one block on top of the ledger's current tip.
    ///
    /// The ledger lock is held only while the mempool and tip are copied; the
    /// search itself runs unlocked. A block admitted meanwhile makes the
    /// result stale, which `Blockchain::admit_block` then rejects.
    pub fn mine(
        &self,
        ledger: &Mutex<Blockchain>,
        cancel: &AtomicBool,
        on_progress: Option<&dyn Fn(u64)>,
    ) -> Result<MiningOutcome> {
        let (index, previous_hash, pending) = {
            let ledger = ledger
                .lock()
                .map_err(|e| BlockchainError::Mining(format!("Failed to acquire ledger lock: {e}")))?;
            let tip = ledger.get_tip();
            (ledger.len() as u64, tip.get_hash().to_string(), ledger.pending_transactions())
        };

        let candidate = self.candidate_block(index, &previous_hash, pending)?;
        info!(
            "Mining block #{index} with {} transactions (difficulty: {:?})",
            candidate.get_transactions().len(),
            self.difficulty
        );

        let pow = ProofOfWork::new_proof_of_work(candidate, &self.difficulty)?;
        let outcome = pow.run(cancel, self.progress_interval, on_progress)?;
        if let MiningOutcome::Mined(block) = &outcome {
            info!(
                "Mined block #{}: {} (nonce {})",
                block.get_index(),
                block.get_hash(),
                block.get_nonce()
            );
        }
        Ok(outcome)
    }

    /// Coinbase first, then the pending transactions in admission order
    fn candidate_block(
        &self,
        index: u64,
        previous_hash: &str,
        pending: Vec<Transaction>,
    ) -> Result<Block> {
        let timestamp = crate::utils::current_timestamp()?;
        let coinbase = Transaction::new_coinbase_tx(&self.reward_address, self.reward, timestamp)?;

        let mut transactions = Vec::with_capacity(pending.len() + 1);
        transactions.push(coinbase);
        transactions.extend(pending);

        Block::assemble(index, previous_hash, transactions, 0, Some(timestamp))
    }

    pub fn get_difficulty(&self) -> &str {
        self.difficulty.as_str()
    }
}

/// Ask a running search to stop at its next nonce
pub fn interrupt(cancel: &AtomicBool) {
    cancel.store(true, Ordering::SeqCst);
}
