use crate::config::Config;
use crate::core::{interrupt, Block, Blockchain, Miner, MiningOutcome, Transaction};
use crate::error::{BlockchainError, Result};
use crate::network::peers::PeerSet;
use crate::network::protocol::Message;
use crate::network::server;
use crate::storage::EventLog;
use log::{info, warn};
use std::net::{IpAddr, Ipv4Addr, SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread;

/// One running participant of the network.
///
/// Owns the ledger behind a single lock, the peer registry and the mining
/// state. Every operation goes through an `Arc<Node>` handle; there is no
/// process-wide state.
pub struct Node {
    address: String,
    bound_addr: SocketAddr,
    config: Config,
    ledger: Mutex<Blockchain>,
    peers: PeerSet,
    running: AtomicBool,
    mining: Mutex<bool>,
    cancel_mining: AtomicBool,
    events: EventLog,
}

impl Node {
    /// Bind the listening socket, start the accept loop and contact the
    /// bootstrap peers. Failing to bind is the only fatal error.
    pub fn start(config: Config) -> Result<Arc<Node>> {
        config.validate()?;

        let listener = TcpListener::bind(&config.listen_addr).map_err(|e| {
            BlockchainError::Network(format!("Failed to bind to {}: {e}", config.listen_addr))
        })?;
        let bound_addr = listener.local_addr()?;
        let address = config
            .advertised_addr
            .clone()
            .unwrap_or_else(|| bound_addr.to_string());

        let node = Arc::new(Node {
            peers: PeerSet::new(&address),
            ledger: Mutex::new(Blockchain::new(&config.difficulty)),
            events: EventLog::new(config.event_log_capacity),
            running: AtomicBool::new(true),
            mining: Mutex::new(false),
            cancel_mining: AtomicBool::new(false),
            address,
            bound_addr,
            config,
        });

        info!("Node {} listening on {bound_addr}", node.address);
        server::spawn_accept_loop(Arc::clone(&node), listener);

        for peer in node.config.bootstrap_peers.clone() {
            if node.peers.add(&peer) {
                node.note(format!("Registered bootstrap peer {peer}"));
            }
            let node = Arc::clone(&node);
            thread::spawn(move || server::connect_to_peer(&node, &peer));
        }

        Ok(node)
    }

    /// Address announced to peers as `sender`
    pub fn address(&self) -> &str {
        self.address.as_str()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn is_mining(&self) -> bool {
        *self.lock_mining()
    }

    pub(crate) fn lock_ledger(&self) -> MutexGuard<'_, Blockchain> {
        self.ledger
            .lock()
            .expect("Failed to acquire ledger lock - this should never happen")
    }

    pub(crate) fn peer_set(&self) -> &PeerSet {
        &self.peers
    }

    /// Log at info level and keep the line for the operator
    pub(crate) fn note(&self, line: String) {
        info!("[{}] {line}", self.address);
        self.events.record(line);
    }

    /// Create a transaction and offer it to the local ledger. When admitted
    /// it is broadcast to every peer. Malformed input is an error; a
    /// rejected admission is `Ok(false)`.
    pub fn submit_transaction(
        self: &Arc<Self>,
        origin: &str,
        destination: &str,
        amount: f64,
    ) -> Result<bool> {
        let tx = Transaction::create(origin, destination, amount, None, None)?;
        let admitted = self.lock_ledger().admit_transaction(tx.clone(), false);
        if admitted {
            self.note(format!(
                "Transaction {} admitted: {origin} -> {destination} {amount}",
                tx.get_id()
            ));
            server::broadcast(self, Message::NewTransaction(tx), None);
        } else {
            self.note(format!(
                "Transaction {origin} -> {destination} {amount} rejected"
            ));
        }
        Ok(admitted)
    }

    /// Start mining in the background. Returns false when a search is
    /// already running.
    pub fn start_mining(self: &Arc<Self>) -> bool {
        if !self.begin_mining() {
            return false;
        }

        let node = Arc::clone(self);
        thread::spawn(move || {
            if let Err(e) = node.run_miner() {
                warn!("Mining on {} failed: {e}", node.address);
            }
            node.finish_mining();
        });
        true
    }

    /// Mine one block on the calling thread.
    ///
    /// `Ok(None)` when the search was cancelled or the block went stale
    /// because the network extended the chain first.
    pub fn mine_block(self: &Arc<Self>) -> Result<Option<Block>> {
        if !self.begin_mining() {
            return Err(BlockchainError::Mining(
                "A mining task is already running".to_string(),
            ));
        }

        let result = self.run_miner();
        self.finish_mining();
        result
    }

    /// Ask a running search to stop. Returns false when nothing was mining.
    pub fn stop_mining(&self) -> bool {
        let mining = self.lock_mining();
        if !*mining {
            return false;
        }
        interrupt(&self.cancel_mining);
        true
    }

    fn lock_mining(&self) -> MutexGuard<'_, bool> {
        self.mining
            .lock()
            .expect("Failed to acquire mining lock - this should never happen")
    }

    /// Claim the single mining slot. The cancel flag is cleared while the
    /// slot lock is held, so a `stop_mining` that sees the claim always sticks.
    fn begin_mining(&self) -> bool {
        let mut mining = self.lock_mining();
        if *mining {
            return false;
        }
        *mining = true;
        self.cancel_mining.store(false, Ordering::SeqCst);
        true
    }

    fn finish_mining(&self) {
        *self.lock_mining() = false;
    }

    fn run_miner(self: &Arc<Self>) -> Result<Option<Block>> {
        let miner = Miner::new(
            &self.address,
            self.config.mining_reward,
            &self.config.difficulty,
        )
        .with_progress_interval(self.config.progress_interval);

        self.note(format!("Mining started at difficulty {:?}", miner.get_difficulty()));
        let on_progress = |attempts: u64| {
            self.events.record(format!("Mining: {attempts} nonces tried"));
        };
        let outcome = miner.mine(&self.ledger, &self.cancel_mining, Some(&on_progress))?;

        let block = match outcome {
            MiningOutcome::Mined(block) => block,
            MiningOutcome::Cancelled => {
                self.note("Mining cancelled".to_string());
                return Ok(None);
            }
        };

        let accepted = self.lock_ledger().admit_block(block.clone());
        if !accepted {
            self.note(format!(
                "Mined block #{} is stale, discarded",
                block.get_index()
            ));
            return Ok(None);
        }

        self.note(format!(
            "Mined block #{} {} (nonce {})",
            block.get_index(),
            block.get_hash(),
            block.get_nonce()
        ));
        server::broadcast(self, Message::NewBlock(block.clone()), None);
        Ok(Some(block))
    }

    pub fn list_chain(&self) -> Vec<Block> {
        self.lock_ledger().get_blocks().to_vec()
    }

    pub fn chain_len(&self) -> usize {
        self.lock_ledger().len()
    }

    pub fn pending_transactions(&self) -> Vec<Transaction> {
        self.lock_ledger().pending_transactions()
    }

    /// Ask every peer for its chain; longer valid replies replace ours
    pub fn request_sync(self: &Arc<Self>) {
        self.note(format!("Requesting chains from {} peers", self.peers.len()));
        server::broadcast(self, Message::RequestChain, None);
    }

    /// Spendable balance of this node's own address
    pub fn balance(&self) -> f64 {
        self.balance_of(&self.address)
    }

    pub fn balance_of(&self, address: &str) -> f64 {
        self.lock_ledger().balance_of(address)
    }

    pub fn peers(&self) -> Vec<String> {
        self.peers.snapshot()
    }

    pub fn recent_events(&self) -> Vec<String> {
        self.events.recent()
    }

    /// Stop accepting connections and cancel mining. Handlers already
    /// running finish on their own.
    pub fn shutdown(&self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            return;
        }
        interrupt(&self.cancel_mining);

        // wake the accept loop so it sees the flag
        let mut wake_addr = self.bound_addr;
        if wake_addr.ip().is_unspecified() {
            wake_addr.set_ip(IpAddr::V4(Ipv4Addr::LOCALHOST));
        }
        let _ = TcpStream::connect_timeout(&wake_addr, self.config.connect_timeout());
        self.note("Node shut down".to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testnet::{start_test_node, test_config, wait_until};
    use std::time::Duration;

    #[test]
    fn test_start_uses_bound_address() {
        let node = start_test_node(vec![]);
        assert!(node.address().starts_with("127.0.0.1:"));
        assert!(!node.address().ends_with(":0"));
        assert_eq!(node.chain_len(), 1);
        node.shutdown();
    }

    #[test]
    fn test_advertised_address_wins() {
        let config = Config {
            advertised_addr: Some("node-a.example:7000".to_string()),
            ..test_config(vec![])
        };
        let node = Node::start(config).unwrap();
        assert_eq!(node.address(), "node-a.example:7000");
        node.shutdown();
    }

    #[test]
    fn test_bind_failure_is_fatal() {
        let first = start_test_node(vec![]);
        let config = Config {
            listen_addr: first.bound_addr.to_string(),
            ..test_config(vec![])
        };
        assert!(matches!(
            Node::start(config),
            Err(BlockchainError::Network(_))
        ));
        first.shutdown();
    }

    #[test]
    fn test_submit_transaction_checks_balance() {
        let node = start_test_node(vec![]);
        assert!(!node.submit_transaction("alice", "bob", 5.0).unwrap());
        assert!(node.submit_transaction("genesis", "alice", 5.0).unwrap());
        assert!(node.submit_transaction("alice", "bob", 5.0).is_ok());
        assert!(matches!(
            node.submit_transaction("alice", "bob", -1.0),
            Err(BlockchainError::InvalidTransaction(_))
        ));
        node.shutdown();
    }

    #[test]
    fn test_mine_block_pays_reward() {
        let node = start_test_node(vec![]);
        let block = node.mine_block().unwrap().unwrap();
        assert_eq!(block.get_index(), 1);
        assert_eq!(node.chain_len(), 2);
        assert_eq!(node.balance(), node.config().mining_reward);
        assert!(node.recent_events().iter().any(|e| e.contains("Mined block #1")));
        node.shutdown();
    }

    #[test]
    fn test_background_mining_runs_once_at_a_time() {
        let config = Config {
            difficulty: "0000000000".to_string(),
            progress_interval: 1_000,
            ..test_config(vec![])
        };
        let node = Node::start(config).unwrap();
        assert!(node.start_mining());
        assert!(!node.start_mining());
        assert!(matches!(node.mine_block(), Err(BlockchainError::Mining(_))));

        assert!(node.stop_mining());
        assert!(wait_until(Duration::from_secs(5), || !node.is_mining()));
        assert_eq!(node.chain_len(), 1);
        assert!(node.recent_events().iter().any(|e| e == "Mining cancelled"));
        assert!(!node.stop_mining());
        node.shutdown();
    }

    #[test]
    fn test_stop_right_after_claim_is_not_lost() {
        let node = start_test_node(vec![]);
        assert!(node.begin_mining());
        assert!(node.stop_mining());
        // difficulty "0" would find a block at once unless the stop held
        assert_eq!(node.run_miner().unwrap(), None);
        node.finish_mining();
        assert_eq!(node.chain_len(), 1);

        // the next search starts clean
        assert!(node.mine_block().unwrap().is_some());
        node.shutdown();
    }

    #[test]
    fn test_shutdown_is_idempotent() {
        let node = start_test_node(vec![]);
        node.shutdown();
        node.shutdown();
        assert!(!node.is_running());
    }
}
