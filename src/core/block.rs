use crate::core::monetary::{GENESIS_PREVIOUS_HASH, GENESIS_TIMESTAMP};
use crate::core::Transaction;
use crate::error::{BlockchainError, Result};
use crate::utils::{canonical_json, current_timestamp, sha256_hex};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

static GENESIS_BLOCK: Lazy<Block> = Lazy::new(|| {
    Block::assemble(0, GENESIS_PREVIOUS_HASH, Vec::new(), 0, Some(GENESIS_TIMESTAMP))
        .expect("Genesis block hashing should never fail")
});

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
    index: u64,
    previous_hash: String,
    transactions: Vec<Transaction>,
    nonce: u64,
    timestamp: f64,
    hash: String,
}

/// Everything hashed except `index` and `nonce`, which `HashPreimage` splices in
#[derive(Serialize)]
struct HashedBody<'a> {
    previous_hash: &'a str,
    timestamp: f64,
    transactions: &'a [Transaction],
}

/// Canonical serialization of a block with the nonce left open.
///
/// Keys are sorted, so the canonical form is
/// `{"index":I,"nonce":N,"previous_hash":..,"timestamp":..,"transactions":[..]}`.
/// The part after the nonce is serialized once and reused for every attempt.
pub(crate) struct HashPreimage {
    head: String,
    tail: String,
}

impl HashPreimage {
    pub(crate) fn new(
        index: u64,
        previous_hash: &str,
        transactions: &[Transaction],
        timestamp: f64,
    ) -> Result<HashPreimage> {
        let body = canonical_json(&HashedBody {
            previous_hash,
            timestamp,
            transactions,
        })?;
        // body is a JSON object; drop its opening brace and continue it after the nonce
        let rest = body.strip_prefix('{').ok_or_else(|| {
            BlockchainError::InvalidBlock("Canonical body is not a JSON object".to_string())
        })?;

        Ok(HashPreimage {
            head: format!("{{\"index\":{index},\"nonce\":"),
            tail: format!(",{rest}"),
        })
    }

    pub(crate) fn digest(&self, nonce: u64) -> String {
        let data = format!("{}{}{}", self.head, nonce, self.tail);
        sha256_hex(data.as_bytes())
    }
}

impl Block {
    /// Build a block and seal it with the hash of its current contents.
    /// Uses the current time when `timestamp` is not supplied.
    pub fn assemble(
        index: u64,
        previous_hash: &str,
        transactions: Vec<Transaction>,
        nonce: u64,
        timestamp: Option<f64>,
    ) -> Result<Block> {
        let timestamp = match timestamp {
            Some(ts) => ts,
            None => current_timestamp()?,
        };

        let mut block = Block {
            index,
            previous_hash: previous_hash.to_string(),
            transactions,
            nonce,
            timestamp,
            hash: String::new(),
        };
        block.hash = block.calculate_hash()?;
        Ok(block)
    }

    /// The fixed block every chain starts with
    pub fn genesis() -> Block {
        GENESIS_BLOCK.clone()
    }

    /// Digest over every field except `hash`
    pub fn calculate_hash(&self) -> Result<String> {
        let preimage = self.preimage()?;
        Ok(preimage.digest(self.nonce))
    }

    pub(crate) fn preimage(&self) -> Result<HashPreimage> {
        HashPreimage::new(
            self.index,
            &self.previous_hash,
            &self.transactions,
            self.timestamp,
        )
    }

    /// Whether the stored hash still matches the contents
    pub fn has_valid_hash(&self) -> bool {
        matches!(self.calculate_hash(), Ok(hash) if hash == self.hash)
    }

    /// Proof-of-work predicate: the stored hash begins with `prefix`
    pub fn satisfies_difficulty(&self, prefix: &str) -> bool {
        self.hash.starts_with(prefix)
    }

    pub(crate) fn seal(&mut self, nonce: u64, hash: String) {
        self.nonce = nonce;
        self.hash = hash;
    }

    pub fn get_index(&self) -> u64 {
        self.index
    }

    pub fn get_previous_hash(&self) -> &str {
        self.previous_hash.as_str()
    }

    pub fn get_transactions(&self) -> &[Transaction] {
        self.transactions.as_slice()
    }

    pub fn get_nonce(&self) -> u64 {
        self.nonce
    }

    pub fn get_timestamp(&self) -> f64 {
        self.timestamp
    }

    pub fn get_hash(&self) -> &str {
        self.hash.as_str()
    }

    #[cfg(test)]
    pub(crate) fn transactions_mut(&mut self) -> &mut Vec<Transaction> {
        &mut self.transactions
    }
}
