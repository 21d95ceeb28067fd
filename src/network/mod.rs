//! Peer-to-peer networking
//!
//! Length-prefixed JSON envelopes over short-lived TCP connections, one
//! envelope (plus an optional reply) per connection. The `Node` ties the
//! ledger, the peer registry and the miner together.

pub mod node;
pub mod peers;
pub mod protocol;
pub mod server;

pub use node::Node;
pub use peers::PeerSet;
pub use protocol::{read_envelope, write_envelope, Envelope, Message, MessageType, MAX_FRAME_LEN};
pub use server::exchange;
