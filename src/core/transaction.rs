// A transaction is an immutable transfer record: who pays, who receives, how much.
// Balances are derived by scanning the chain, so there are no inputs/outputs here,
// only the two endpoints and the amount.

use crate::core::monetary::{is_minting_origin, COINBASE_ORIGIN};
use crate::error::{BlockchainError, Result};
use crate::utils::current_timestamp;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    id: String,
    origin: String,
    destination: String,
    amount: f64,
    timestamp: f64,
}

impl Transaction {
    /// Create a validated transfer. A fresh id and the current time are used
    /// when `id` or `timestamp` is not supplied.
    pub fn create(
        origin: &str,
        destination: &str,
        amount: f64,
        id: Option<String>,
        timestamp: Option<f64>,
    ) -> Result<Transaction> {
        let timestamp = match timestamp {
            Some(ts) => ts,
            None => current_timestamp()?,
        };

        let transaction = Transaction {
            id: id.unwrap_or_else(|| Uuid::new_v4().to_string()),
            origin: origin.to_string(),
            destination: destination.to_string(),
            amount,
            timestamp,
        };
        transaction.validate()?;
        Ok(transaction)
    }

    /// Shorthand for a transfer with generated id and timestamp
    pub fn new(origin: &str, destination: &str, amount: f64) -> Result<Transaction> {
        Self::create(origin, destination, amount, None, None)
    }

    /// The miner's reward, stamped with the candidate block's timestamp
    pub fn new_coinbase_tx(to: &str, reward: f64, timestamp: f64) -> Result<Transaction> {
        Self::create(COINBASE_ORIGIN, to, reward, None, Some(timestamp))
    }

    /// Structural checks shared by local creation and network ingress
    pub fn validate(&self) -> Result<()> {
        if self.id.is_empty() {
            return Err(BlockchainError::InvalidTransaction(
                "Transaction id must not be empty".to_string(),
            ));
        }
        if !self.amount.is_finite() || self.amount <= 0.0 {
            return Err(BlockchainError::InvalidTransaction(format!(
                "Transaction amount must be positive, got {}",
                self.amount
            )));
        }
        if self.origin.is_empty() || self.destination.is_empty() {
            return Err(BlockchainError::InvalidTransaction(
                "Origin and destination are required".to_string(),
            ));
        }
        Ok(())
    }

    /// Identity comparison; content is never compared
    pub fn same(&self, other: &Transaction) -> bool {
        self.id == other.id
    }

    pub fn is_minting(&self) -> bool {
        is_minting_origin(&self.origin)
    }

    pub fn is_coinbase(&self) -> bool {
        self.origin == COINBASE_ORIGIN
    }

    pub fn get_id(&self) -> &str {
        self.id.as_str()
    }

    pub fn get_origin(&self) -> &str {
        self.origin.as_str()
    }

    pub fn get_destination(&self) -> &str {
        self.destination.as_str()
    }

    pub fn get_amount(&self) -> f64 {
        self.amount
    }

    pub fn get_timestamp(&self) -> f64 {
        self.timestamp
    }

    #[cfg(test)]
    pub(crate) fn set_amount_unchecked(&mut self, amount: f64) {
        self.amount = amount;
    }
}

impl PartialEq for Transaction {
    fn eq(&self, other: &Self) -> bool {
        self.same(other)
    }
}

impl Eq for Transaction {}
