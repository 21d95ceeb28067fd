use crate::core::Transaction;
use std::collections::HashSet;

/// Pending transactions in admission order, keyed by id.
///
/// Not synchronized on its own: it lives inside the ledger and is only touched
/// while the node's ledger lock is held.
#[derive(Debug, Clone, Default)]
pub struct MemoryPool {
    transactions: Vec<Transaction>,
    ids: HashSet<String>,
}

impl MemoryPool {
    pub fn new() -> MemoryPool {
        MemoryPool::default()
    }

    /// Returns false when a transaction with the same id is already pending
    pub fn add(&mut self, tx: Transaction) -> bool {
        if !self.ids.insert(tx.get_id().to_string()) {
            return false;
        }
        self.transactions.push(tx);
        true
    }

    pub fn contains(&self, txid: &str) -> bool {
        self.ids.contains(txid)
    }

    /// Drop every pending transaction whose id appears in `confirmed`
    pub fn remove_confirmed<'a, I>(&mut self, confirmed: I) -> usize
    where
        I: IntoIterator<Item = &'a Transaction>,
    {
        let confirmed: HashSet<&str> = confirmed.into_iter().map(|tx| tx.get_id()).collect();
        let before = self.transactions.len();
        self.transactions
            .retain(|tx| !confirmed.contains(tx.get_id()));
        self.ids.retain(|id| !confirmed.contains(id.as_str()));
        before - self.transactions.len()
    }

    /// Total amount the address has committed as origin
    pub fn pending_debits(&self, address: &str) -> f64 {
        self.transactions
            .iter()
            .filter(|tx| tx.get_origin() == address)
            .map(|tx| tx.get_amount())
            .sum()
    }

    pub fn len(&self) -> usize {
        self.transactions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transactions.is_empty()
    }

    pub fn get_all(&self) -> Vec<Transaction> {
        self.transactions.clone()
    }

    /// Empty the pool, handing back its contents in admission order
    pub fn take_all(&mut self) -> Vec<Transaction> {
        self.ids.clear();
        std::mem::take(&mut self.transactions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tx(id: &str, origin: &str, amount: f64) -> Transaction {
        Transaction::create(origin, "bob", amount, Some(id.to_string()), Some(1.0)).unwrap()
    }

    #[test]
    fn test_add_rejects_duplicate_ids() {
        let mut pool = MemoryPool::new();
        assert!(pool.add(tx("a", "alice", 1.0)));
        assert!(!pool.add(tx("a", "carol", 2.0)));
        assert_eq!(pool.len(), 1);
        assert_eq!(pool.get_all()[0].get_origin(), "alice");
    }

    #[test]
    fn test_preserves_admission_order() {
        let mut pool = MemoryPool::new();
        for id in ["c", "a", "b"] {
            pool.add(tx(id, "alice", 1.0));
        }
        let ids: Vec<String> = pool.get_all().iter().map(|t| t.get_id().to_string()).collect();
        assert_eq!(ids, vec!["c", "a", "b"]);
    }

    #[test]
    fn test_remove_confirmed() {
        let mut pool = MemoryPool::new();
        pool.add(tx("a", "alice", 1.0));
        pool.add(tx("b", "alice", 1.0));
        pool.add(tx("c", "alice", 1.0));

        let confirmed = vec![tx("a", "x", 5.0), tx("c", "y", 5.0), tx("z", "y", 5.0)];
        assert_eq!(pool.remove_confirmed(confirmed.iter()), 2);
        assert!(pool.contains("b"));
        assert!(!pool.contains("a"));
        assert!(!pool.contains("c"));
        assert_eq!(pool.len(), 1);
    }

    #[test]
    fn test_pending_debits() {
        let mut pool = MemoryPool::new();
        pool.add(tx("a", "alice", 1.5));
        pool.add(tx("b", "alice", 2.0));
        pool.add(tx("c", "carol", 7.0));
        assert_eq!(pool.pending_debits("alice"), 3.5);
        assert_eq!(pool.pending_debits("bob"), 0.0);
    }

    #[test]
    fn test_take_all_empties_pool() {
        let mut pool = MemoryPool::new();
        pool.add(tx("a", "alice", 1.0));
        pool.add(tx("b", "alice", 1.0));

        let rest = pool.take_all();
        assert_eq!(rest.len(), 2);
        assert!(pool.is_empty());
        assert!(!pool.contains("b"));
        // ids are free again once taken
        assert!(pool.add(tx("a", "alice", 1.0)));
    }
}
