use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::net::{IpAddr, SocketAddr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A reachable instance of the board. The host is fixed per node, so the
/// address is carried (and persisted) as its port alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PeerAddress(u16);

impl PeerAddress {
    pub fn new(port: u16) -> Self {
        Self(port)
    }

    pub fn port(self) -> u16 {
        self.0
    }

    pub fn socket_addr(self, host: IpAddr) -> SocketAddr {
        SocketAddr::new(host, self.0)
    }
}

impl From<u16> for PeerAddress {
    fn from(port: u16) -> Self {
        Self(port)
    }
}

impl fmt::Display for PeerAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Opaque, globally unique message key (a random UUIDv4).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(String);

impl MessageId {
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for MessageId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for MessageId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// An immutable board message. Field names on disk and on the wire follow the
/// long-standing file format (`messages` holds the body, `date` the timestamp).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageRecord {
    pub author_name: String,
    #[serde(rename = "messages")]
    pub body: String,
    #[serde(rename = "port")]
    pub origin_port: u16,
    /// UTC seconds since the epoch.
    #[serde(rename = "date")]
    pub created_at: i64,
}

impl MessageRecord {
    pub fn created_at_utc(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.created_at, 0)
    }
}

/// A record paired with its id, as handed to callers listing the board.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Message {
    pub id: MessageId,
    #[serde(flatten)]
    pub record: MessageRecord,
}

/// The full `{peers, messages}` value exchanged with peers and persisted to disk.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(rename = "ports", default)]
    pub peers: BTreeSet<PeerAddress>,
    #[serde(default)]
    pub messages: BTreeMap<MessageId, MessageRecord>,
}

impl Snapshot {
    pub fn is_empty(&self) -> bool {
        self.peers.is_empty() && self.messages.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record() -> MessageRecord {
        MessageRecord {
            author_name: "ada".into(),
            body: "hello".into(),
            origin_port: 5000,
            created_at: 1_700_000_000,
        }
    }

    #[test]
    fn snapshot_uses_legacy_field_names() {
        let mut snap = Snapshot::default();
        snap.peers.insert(PeerAddress::new(5001));
        snap.peers.insert(PeerAddress::new(5000));
        snap.messages.insert(MessageId::from("m1"), record());

        let value = serde_json::to_value(&snap).unwrap();
        assert_eq!(
            value,
            json!({
                "ports": [5000, 5001],
                "messages": {
                    "m1": {
                        "author_name": "ada",
                        "messages": "hello",
                        "port": 5000,
                        "date": 1_700_000_000
                    }
                }
            })
        );
    }

    #[test]
    fn snapshot_parse_collapses_duplicate_ports() {
        let snap: Snapshot =
            serde_json::from_str(r#"{"ports": [5000, 5000, 4999], "messages": {}}"#).unwrap();
        let ports: Vec<u16> = snap.peers.iter().map(|p| p.port()).collect();
        assert_eq!(ports, vec![4999, 5000]);
    }

    #[test]
    fn listed_message_flattens_record() {
        let msg = Message {
            id: MessageId::from("m1"),
            record: record(),
        };
        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(value["id"], "m1");
        assert_eq!(value["messages"], "hello");
        assert_eq!(value["port"], 5000);
    }

    #[test]
    fn generated_ids_are_distinct() {
        assert_ne!(MessageId::generate(), MessageId::generate());
    }

    #[test]
    fn created_at_converts_to_utc() {
        let dt = record().created_at_utc().unwrap();
        assert_eq!(dt.timestamp(), 1_700_000_000);
    }
}
