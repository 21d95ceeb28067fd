//! Wire protocol between peers
//!
//! One envelope per frame: a 4-byte big-endian length followed by that many
//! bytes of UTF-8 JSON `{"type": .., "sender": .., "payload": {..}}`. Fields
//! are named rather than positional, so unknown optional fields are ignored.

use crate::core::{Block, Transaction};
use crate::error::{BlockchainError, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::io::{ErrorKind, Read, Write};

/// Largest body a peer may declare
pub const MAX_FRAME_LEN: usize = 16 * 1024 * 1024;

const LENGTH_PREFIX_LEN: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MessageType {
    NewTransaction,
    NewBlock,
    RequestChain,
    ResponseChain,
    RequestMempool,
    ResponseMempool,
    Ping,
    Pong,
    DiscoverPeers,
    PeersList,
}

/// Typed message body
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    NewTransaction(Transaction),
    NewBlock(Block),
    RequestChain,
    ResponseChain(Vec<Block>),
    RequestMempool,
    ResponseMempool(Vec<Transaction>),
    Ping,
    Pong,
    DiscoverPeers,
    PeersList(Vec<String>),
}

impl Message {
    pub fn kind(&self) -> MessageType {
        match self {
            Message::NewTransaction(_) => MessageType::NewTransaction,
            Message::NewBlock(_) => MessageType::NewBlock,
            Message::RequestChain => MessageType::RequestChain,
            Message::ResponseChain(_) => MessageType::ResponseChain,
            Message::RequestMempool => MessageType::RequestMempool,
            Message::ResponseMempool(_) => MessageType::ResponseMempool,
            Message::Ping => MessageType::Ping,
            Message::Pong => MessageType::Pong,
            Message::DiscoverPeers => MessageType::DiscoverPeers,
            Message::PeersList(_) => MessageType::PeersList,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Envelope {
    /// Address of the node that sent this hop; empty when unknown
    pub sender: String,
    pub message: Message,
}

#[derive(Serialize, Deserialize)]
struct WireEnvelope {
    #[serde(rename = "type")]
    kind: MessageType,
    #[serde(default)]
    sender: Option<String>,
    #[serde(default)]
    payload: Value,
}

#[derive(Serialize, Deserialize)]
struct TransactionPayload {
    transaction: Transaction,
}

#[derive(Serialize, Deserialize)]
struct BlockPayload {
    block: Block,
}

#[derive(Serialize, Deserialize)]
struct ChainPayload {
    chain: Vec<Block>,
}

#[derive(Serialize, Deserialize)]
struct MempoolPayload {
    transactions: Vec<Transaction>,
}

#[derive(Serialize, Deserialize)]
struct PeersPayload {
    peers: Vec<String>,
}

impl Envelope {
    pub fn new(sender: &str, message: Message) -> Envelope {
        Envelope {
            sender: sender.to_string(),
            message,
        }
    }

    pub fn kind(&self) -> MessageType {
        self.message.kind()
    }

    /// Length-prefixed frame ready to be written to a socket
    pub fn encode(&self) -> Result<Vec<u8>> {
        let body = self.encode_body()?;
        let len = u32::try_from(body.len())
            .ok()
            .filter(|len| *len as usize <= MAX_FRAME_LEN)
            .ok_or_else(|| {
                BlockchainError::Serialization(format!("Envelope too large: {} bytes", body.len()))
            })?;

        let mut frame = Vec::with_capacity(LENGTH_PREFIX_LEN + body.len());
        frame.extend(len.to_be_bytes());
        frame.extend(body);
        Ok(frame)
    }

    /// Decode a complete frame, length prefix included
    pub fn decode(frame: &[u8]) -> Result<Envelope> {
        if frame.len() < LENGTH_PREFIX_LEN {
            return Err(BlockchainError::MalformedEnvelope(format!(
                "Frame of {} bytes has no length prefix",
                frame.len()
            )));
        }
        let (prefix, body) = frame.split_at(LENGTH_PREFIX_LEN);
        let declared = declared_length(prefix)?;
        if declared != body.len() {
            return Err(BlockchainError::MalformedEnvelope(format!(
                "Declared {declared} bytes but frame carries {}",
                body.len()
            )));
        }
        Self::decode_body(body)
    }

    fn encode_body(&self) -> Result<Vec<u8>> {
        let payload = match &self.message {
            Message::NewTransaction(transaction) => serde_json::to_value(TransactionPayload {
                transaction: transaction.clone(),
            })?,
            Message::NewBlock(block) => serde_json::to_value(BlockPayload {
                block: block.clone(),
            })?,
            Message::ResponseChain(chain) => serde_json::to_value(ChainPayload {
                chain: chain.clone(),
            })?,
            Message::ResponseMempool(transactions) => serde_json::to_value(MempoolPayload {
                transactions: transactions.clone(),
            })?,
            Message::PeersList(peers) => serde_json::to_value(PeersPayload {
                peers: peers.clone(),
            })?,
            Message::RequestChain
            | Message::RequestMempool
            | Message::Ping
            | Message::Pong
            | Message::DiscoverPeers => Value::Object(serde_json::Map::new()),
        };

        let wire = WireEnvelope {
            kind: self.kind(),
            sender: Some(self.sender.clone()),
            payload,
        };
        Ok(serde_json::to_vec(&wire)?)
    }

    fn decode_body(body: &[u8]) -> Result<Envelope> {
        let wire: WireEnvelope = serde_json::from_slice(body)
            .map_err(|e| BlockchainError::MalformedEnvelope(format!("Unparseable body: {e}")))?;

        let message = match wire.kind {
            MessageType::NewTransaction => {
                Message::NewTransaction(payload::<TransactionPayload>(wire.payload)?.transaction)
            }
            MessageType::NewBlock => Message::NewBlock(payload::<BlockPayload>(wire.payload)?.block),
            MessageType::ResponseChain => {
                Message::ResponseChain(payload::<ChainPayload>(wire.payload)?.chain)
            }
            MessageType::ResponseMempool => {
                Message::ResponseMempool(payload::<MempoolPayload>(wire.payload)?.transactions)
            }
            MessageType::PeersList => Message::PeersList(payload::<PeersPayload>(wire.payload)?.peers),
            MessageType::RequestChain => Message::RequestChain,
            MessageType::RequestMempool => Message::RequestMempool,
            MessageType::Ping => Message::Ping,
            MessageType::Pong => Message::Pong,
            MessageType::DiscoverPeers => Message::DiscoverPeers,
        };

        Ok(Envelope {
            sender: wire.sender.unwrap_or_default(),
            message,
        })
    }
}

fn payload<T: for<'de> Deserialize<'de>>(value: Value) -> Result<T> {
    serde_json::from_value(value)
        .map_err(|e| BlockchainError::MalformedEnvelope(format!("Bad payload: {e}")))
}

fn declared_length(prefix: &[u8]) -> Result<usize> {
    let bytes: [u8; LENGTH_PREFIX_LEN] = prefix.try_into().map_err(|_| {
        BlockchainError::MalformedEnvelope("Length prefix must be 4 bytes".to_string())
    })?;
    let declared = u32::from_be_bytes(bytes) as usize;
    if declared > MAX_FRAME_LEN {
        return Err(BlockchainError::MalformedEnvelope(format!(
            "Declared length {declared} exceeds limit of {MAX_FRAME_LEN}"
        )));
    }
    Ok(declared)
}

/// Read one frame from `reader`.
///
/// Returns `Ok(None)` when the peer closed the stream before sending
/// anything, which is how a connection without a reply ends.
pub fn read_envelope<R: Read>(reader: &mut R) -> Result<Option<Envelope>> {
    let mut prefix = [0u8; LENGTH_PREFIX_LEN];
    let mut filled = 0;
    while filled < LENGTH_PREFIX_LEN {
        match reader.read(&mut prefix[filled..]) {
            Ok(0) if filled == 0 => return Ok(None),
            Ok(0) => {
                return Err(BlockchainError::MalformedEnvelope(format!(
                    "Stream closed after {filled} bytes of length prefix"
                )))
            }
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(read_error(e)),
        }
    }

    let declared = declared_length(&prefix)?;
    let mut body = vec![0u8; declared];
    reader.read_exact(&mut body).map_err(|e| {
        if e.kind() == ErrorKind::UnexpectedEof {
            BlockchainError::MalformedEnvelope(format!(
                "Stream closed before the declared {declared} bytes arrived"
            ))
        } else {
            read_error(e)
        }
    })?;

    Envelope::decode_body(&body).map(Some)
}

pub fn write_envelope<W: Write>(writer: &mut W, envelope: &Envelope) -> Result<()> {
    let frame = envelope.encode()?;
    writer
        .write_all(&frame)
        .map_err(|e| BlockchainError::Network(format!("Failed to send envelope: {e}")))?;
    writer
        .flush()
        .map_err(|e| BlockchainError::Network(format!("Failed to flush envelope: {e}")))
}

fn read_error(e: std::io::Error) -> BlockchainError {
    match e.kind() {
        ErrorKind::WouldBlock | ErrorKind::TimedOut => {
            BlockchainError::Network(format!("Timed out waiting for envelope: {e}"))
        }
        _ => BlockchainError::Network(format!("Failed to read envelope: {e}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testnet::build_chain;
    use std::io::Cursor;

    fn sample_messages() -> Vec<Message> {
        let chain = build_chain(2, "0");
        let tx = Transaction::new("alice", "bob", 2.5).unwrap();
        vec![
            Message::NewTransaction(tx.clone()),
            Message::NewBlock(chain.get_tip().clone()),
            Message::RequestChain,
            Message::ResponseChain(chain.get_blocks().to_vec()),
            Message::RequestMempool,
            Message::ResponseMempool(vec![tx]),
            Message::Ping,
            Message::Pong,
            Message::DiscoverPeers,
            Message::PeersList(vec!["127.0.0.1:5001".to_string()]),
        ]
    }

    #[test]
    fn test_round_trip_every_type() {
        for message in sample_messages() {
            let envelope = Envelope::new("127.0.0.1:5000", message);
            let decoded = Envelope::decode(&envelope.encode().unwrap()).unwrap();
            assert_eq!(decoded.kind(), envelope.kind());
            assert_eq!(decoded.sender, envelope.sender);
            assert_eq!(decoded.message, envelope.message);
        }
    }

    #[test]
    fn test_round_trip_preserves_block_hashes() {
        let chain = build_chain(3, "0");
        let envelope = Envelope::new("n", Message::ResponseChain(chain.get_blocks().to_vec()));
        let decoded = Envelope::decode(&envelope.encode().unwrap()).unwrap();
        match decoded.message {
            Message::ResponseChain(blocks) => assert!(chain.validate_full_chain(&blocks)),
            other => panic!("unexpected message {other:?}"),
        }
    }

    #[test]
    fn test_frame_layout() {
        let frame = Envelope::new("a", Message::Ping).encode().unwrap();
        let declared = u32::from_be_bytes([frame[0], frame[1], frame[2], frame[3]]) as usize;
        assert_eq!(declared, frame.len() - 4);

        let body: Value = serde_json::from_slice(&frame[4..]).unwrap();
        assert_eq!(body["type"], "PING");
        assert_eq!(body["sender"], "a");
        assert!(body["payload"].is_object());
    }

    #[test]
    fn test_length_mismatch_is_malformed() {
        let mut frame = Envelope::new("a", Message::Ping).encode().unwrap();
        frame.push(b' ');
        assert!(matches!(
            Envelope::decode(&frame),
            Err(BlockchainError::MalformedEnvelope(_))
        ));

        frame.truncate(frame.len() - 3);
        assert!(matches!(
            Envelope::decode(&frame),
            Err(BlockchainError::MalformedEnvelope(_))
        ));
    }

    #[test]
    fn test_unknown_type_is_malformed() {
        let body = br#"{"type":"SELF_DESTRUCT","sender":"x","payload":{}}"#;
        let mut frame = (body.len() as u32).to_be_bytes().to_vec();
        frame.extend_from_slice(body);
        assert!(matches!(
            Envelope::decode(&frame),
            Err(BlockchainError::MalformedEnvelope(_))
        ));
    }

    #[test]
    fn test_garbage_body_is_malformed() {
        let body = b"not json";
        let mut frame = (body.len() as u32).to_be_bytes().to_vec();
        frame.extend_from_slice(body);
        assert!(matches!(
            Envelope::decode(&frame),
            Err(BlockchainError::MalformedEnvelope(_))
        ));
    }

    #[test]
    fn test_missing_payload_and_sender_accepted() {
        let body = br#"{"type":"REQUEST_CHAIN"}"#;
        let mut frame = (body.len() as u32).to_be_bytes().to_vec();
        frame.extend_from_slice(body);
        let envelope = Envelope::decode(&frame).unwrap();
        assert_eq!(envelope.message, Message::RequestChain);
        assert!(envelope.sender.is_empty());
    }

    #[test]
    fn test_extra_fields_ignored() {
        let body = br#"{"type":"PING","sender":"x","payload":{},"ttl":3}"#;
        let mut frame = (body.len() as u32).to_be_bytes().to_vec();
        frame.extend_from_slice(body);
        assert_eq!(Envelope::decode(&frame).unwrap().message, Message::Ping);
    }

    #[test]
    fn test_bad_payload_is_malformed() {
        let body = br#"{"type":"NEW_BLOCK","sender":"x","payload":{"block":42}}"#;
        let mut frame = (body.len() as u32).to_be_bytes().to_vec();
        frame.extend_from_slice(body);
        assert!(matches!(
            Envelope::decode(&frame),
            Err(BlockchainError::MalformedEnvelope(_))
        ));
    }

    #[test]
    fn test_read_envelope_from_stream() {
        let first = Envelope::new("a", Message::Ping);
        let second = Envelope::new("b", Message::RequestMempool);
        let mut bytes = first.encode().unwrap();
        bytes.extend(second.encode().unwrap());

        let mut cursor = Cursor::new(bytes);
        assert_eq!(read_envelope(&mut cursor).unwrap(), Some(first));
        assert_eq!(read_envelope(&mut cursor).unwrap(), Some(second));
        assert_eq!(read_envelope(&mut cursor).unwrap(), None);
    }

    #[test]
    fn test_read_envelope_truncated_body() {
        let mut bytes = Envelope::new("a", Message::Ping).encode().unwrap();
        bytes.truncate(bytes.len() - 1);
        let mut cursor = Cursor::new(bytes);
        assert!(matches!(
            read_envelope(&mut cursor),
            Err(BlockchainError::MalformedEnvelope(_))
        ));
    }

    #[test]
    fn test_read_envelope_oversized_declaration() {
        let mut cursor = Cursor::new(u32::MAX.to_be_bytes().to_vec());
        assert!(matches!(
            read_envelope(&mut cursor),
            Err(BlockchainError::MalformedEnvelope(_))
        ));
    }

    #[test]
    fn test_write_envelope() {
        let envelope = Envelope::new("a", Message::Pong);
        let mut out = Vec::new();
        write_envelope(&mut out, &envelope).unwrap();
        assert_eq!(out, envelope.encode().unwrap());
    }
}
