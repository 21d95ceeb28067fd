use std::sync::RwLock;

/// Known peer addresses in first-seen order.
///
/// Populated from the bootstrap list and from the `sender` of inbound
/// envelopes. Peers are never evicted; an offline peer just fails its next send.
pub struct PeerSet {
    own_addr: String,
    inner: RwLock<Vec<String>>,
}

impl PeerSet {
    pub fn new(own_addr: &str) -> PeerSet {
        PeerSet {
            own_addr: own_addr.to_string(),
            inner: RwLock::new(vec![]),
        }
    }

    /// Register `addr`. Returns true only when it was not known before.
    /// Empty addresses and our own address are ignored.
    pub fn add(&self, addr: &str) -> bool {
        let addr = addr.trim();
        if addr.is_empty() || addr == self.own_addr {
            return false;
        }
        let mut inner = self
            .inner
            .write()
            .expect("Failed to acquire write lock on peers - this should never happen");
        if inner.iter().any(|known| known == addr) {
            return false;
        }
        inner.push(addr.to_string());
        true
    }

    /// Copy of the current set, so callers never hold the lock while sending
    pub fn snapshot(&self) -> Vec<String> {
        self.inner
            .read()
            .expect("Failed to acquire read lock on peers - this should never happen")
            .clone()
    }

    pub fn len(&self) -> usize {
        self.inner
            .read()
            .expect("Failed to acquire read lock on peers - this should never happen")
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
