/// Monetary and consensus constants
///
/// Amounts are plain coin values (`f64`); there is no smallest-unit
/// subdivision and no fee market.
///
/// ## Minting
/// - **Coinbase**: the miner's reward transaction, prepended to every mined block
/// - **Genesis**: reserved origin for pre-allocated funds
///
/// Both origins skip the balance check when a transaction is admitted.
///
/// Reward paid to the miner of each block
pub const MINING_REWARD: f64 = 50.0;

/// Origin used by the miner's reward transaction
pub const COINBASE_ORIGIN: &str = "coinbase";

/// Origin used for funds that exist from the start of the network
pub const GENESIS_ORIGIN: &str = "genesis";

/// Required run of leading zero characters in a block hash
pub const DEFAULT_DIFFICULTY: &str = "000";

/// Fixed genesis timestamp, so every node derives the same genesis hash
pub const GENESIS_TIMESTAMP: f64 = 1_234_567_890.0;

/// Previous-hash placeholder carried by the genesis block
pub const GENESIS_PREVIOUS_HASH: &str =
    "0000000000000000000000000000000000000000000000000000000000000000";

/// Whether transactions from this origin are minted rather than spent
pub fn is_minting_origin(origin: &str) -> bool {
    origin == COINBASE_ORIGIN || origin == GENESIS_ORIGIN
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minting_origins() {
        assert!(is_minting_origin("coinbase"));
        assert!(is_minting_origin("genesis"));
        assert!(!is_minting_origin("127.0.0.1:5000"));
        assert!(!is_minting_origin(""));
    }

    #[test]
    fn test_genesis_previous_hash_is_64_zeros() {
        assert_eq!(GENESIS_PREVIOUS_HASH.len(), 64);
        assert!(GENESIS_PREVIOUS_HASH.chars().all(|c| c == '0'));
    }
}
