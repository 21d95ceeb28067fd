use crate::error::{BlockchainError, Result};
use crate::network::node::Node;
use crate::network::protocol::{read_envelope, write_envelope, Envelope, Message};
use log::{debug, error, info, warn};
use std::net::{Shutdown, SocketAddr, TcpListener, TcpStream, ToSocketAddrs};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Follow-up hops allowed when a reply triggers another request
const MAX_FOLLOW_UPS: usize = 2;

/// Accept connections until the node shuts down, one handler thread each
pub(crate) fn spawn_accept_loop(node: Arc<Node>, listener: TcpListener) -> JoinHandle<()> {
    thread::spawn(move || {
        for stream in listener.incoming() {
            if !node.is_running() {
                break;
            }
            match stream {
                Ok(stream) => {
                    let node = Arc::clone(&node);
                    thread::spawn(move || {
                        let peer_addr = stream
                            .peer_addr()
                            .map(|addr| addr.to_string())
                            .unwrap_or_else(|_| "unknown".to_string());
                        if let Err(e) = handle_connection(&node, stream) {
                            warn!("Dropped connection from {peer_addr}: {e}");
                        }
                    });
                }
                Err(e) => {
                    error!("Error accepting connection: {e}");
                }
            }
        }
        info!("Accept loop for {} stopped", node.address());
    })
}

/// Read one envelope, dispatch it and write the reply, if any, on the
/// same connection
fn handle_connection(node: &Arc<Node>, stream: TcpStream) -> Result<()> {
    stream
        .set_read_timeout(Some(node.config().read_timeout()))
        .map_err(|e| BlockchainError::Network(format!("Failed to set read timeout: {e}")))?;
    stream
        .set_write_timeout(Some(node.config().read_timeout()))
        .map_err(|e| BlockchainError::Network(format!("Failed to set write timeout: {e}")))?;

    let Some(envelope) = read_envelope(&mut &stream)? else {
        return Ok(());
    };
    debug!(
        "{} received {:?} from {:?}",
        node.address(),
        envelope.kind(),
        envelope.sender
    );

    if let Some(reply) = dispatch(node, envelope) {
        write_envelope(&mut &stream, &Envelope::new(node.address(), reply))?;
    }
    let _ = stream.shutdown(Shutdown::Both);
    Ok(())
}

/// Apply an envelope to the node and return the reply to send back.
///
/// Ledger work happens under the ledger lock, which is released before any
/// reply or broadcast goes out.
pub(crate) fn dispatch(node: &Arc<Node>, envelope: Envelope) -> Option<Message> {
    let sender = envelope.sender;
    if node.peer_set().add(&sender) {
        node.note(format!("Registered peer {sender}"));
    }
    let exclude = Some(sender.as_str()).filter(|s| !s.is_empty());

    match envelope.message {
        Message::NewTransaction(tx) => {
            let admitted = node.lock_ledger().admit_transaction(tx.clone(), false);
            if admitted {
                node.note(format!("Transaction {} received from {sender}", tx.get_id()));
                broadcast(node, Message::NewTransaction(tx), exclude);
            }
            None
        }
        Message::NewBlock(block) => {
            let index = block.get_index();
            let accepted = node.lock_ledger().admit_block(block.clone());
            if accepted {
                node.note(format!("Block #{index} accepted from {sender}"));
                broadcast(node, Message::NewBlock(block), exclude);
                None
            } else {
                node.note(format!(
                    "Block #{index} from {sender} rejected, asking for its chain"
                ));
                Some(Message::RequestChain)
            }
        }
        Message::RequestChain => Some(Message::ResponseChain(node.list_chain())),
        Message::ResponseChain(chain) => {
            let offered = chain.len();
            let replaced = node.lock_ledger().replace_chain(chain);
            if replaced {
                node.note(format!("Adopted chain of {offered} blocks from {sender}"));
            }
            None
        }
        Message::RequestMempool => Some(Message::ResponseMempool(node.pending_transactions())),
        Message::ResponseMempool(transactions) => {
            let admitted = {
                let mut ledger = node.lock_ledger();
                transactions
                    .into_iter()
                    .filter(|tx| ledger.admit_transaction(tx.clone(), false))
                    .count()
            };
            if admitted > 0 {
                node.note(format!("Admitted {admitted} pending transactions from {sender}"));
            }
            None
        }
        Message::Ping => Some(Message::Pong),
        Message::Pong => None,
        Message::DiscoverPeers => Some(Message::PeersList(node.peers())),
        Message::PeersList(peers) => {
            for peer in peers {
                if node.peer_set().add(&peer) {
                    node.note(format!("Registered peer {peer} from {sender}"));
                }
            }
            None
        }
    }
}

/// Send `message` to every known peer except `exclude`, one thread per peer.
/// Failures are logged and never reach the caller.
pub(crate) fn broadcast(node: &Arc<Node>, message: Message, exclude: Option<&str>) {
    let envelope = Envelope::new(node.address(), message);
    for peer in node.peers() {
        if exclude == Some(peer.as_str()) {
            continue;
        }
        let node = Arc::clone(node);
        let envelope = envelope.clone();
        thread::spawn(move || {
            if let Err(e) = send_envelope(&node, &peer, envelope) {
                warn!("Failed to send to {peer}: {e}");
            }
        });
    }
}

/// Startup handshake: register the peer and ask for its chain
pub(crate) fn connect_to_peer(node: &Arc<Node>, addr: &str) {
    if node.peer_set().add(addr) {
        node.note(format!("Registered peer {addr}"));
    }
    let envelope = Envelope::new(node.address(), Message::RequestChain);
    if let Err(e) = send_envelope(node, addr, envelope) {
        warn!("Bootstrap peer {addr} unreachable: {e}");
    }
}

/// Deliver `envelope` to `addr` and dispatch whatever comes back. A reply
/// that itself calls for an answer is sent to its sender on a new connection.
pub(crate) fn send_envelope(node: &Arc<Node>, addr: &str, envelope: Envelope) -> Result<()> {
    let config = node.config();
    let mut target = addr.to_string();
    let mut outgoing = envelope;

    for _ in 0..=MAX_FOLLOW_UPS {
        let reply = exchange(
            &target,
            &outgoing,
            config.connect_timeout(),
            config.read_timeout(),
        )?;
        let Some(reply) = reply else {
            return Ok(());
        };
        if !reply.sender.is_empty() {
            target = reply.sender.clone();
        }
        match dispatch(node, reply) {
            Some(answer) => outgoing = Envelope::new(node.address(), answer),
            None => return Ok(()),
        }
    }
    debug!("Stopped following replies from {addr}");
    Ok(())
}

/// One request on a fresh connection: write the envelope, then wait for an
/// optional reply bounded by `read_timeout`
pub fn exchange(
    addr: &str,
    envelope: &Envelope,
    connect_timeout: Duration,
    read_timeout: Duration,
) -> Result<Option<Envelope>> {
    let socket_addr = resolve(addr)?;
    let mut stream = TcpStream::connect_timeout(&socket_addr, connect_timeout)
        .map_err(|e| BlockchainError::Network(format!("Failed to connect to {addr}: {e}")))?;
    stream
        .set_write_timeout(Some(connect_timeout))
        .map_err(|e| BlockchainError::Network(format!("Failed to set write timeout: {e}")))?;
    stream
        .set_read_timeout(Some(read_timeout))
        .map_err(|e| BlockchainError::Network(format!("Failed to set read timeout: {e}")))?;

    write_envelope(&mut stream, envelope)?;
    // one envelope per connection
    let _ = stream.shutdown(Shutdown::Write);
    read_envelope(&mut stream)
}

fn resolve(addr: &str) -> Result<SocketAddr> {
    addr.to_socket_addrs()
        .map_err(|e| BlockchainError::Network(format!("Invalid address {addr}: {e}")))?
        .next()
        .ok_or_else(|| BlockchainError::Network(format!("Address {addr} did not resolve")))
}
