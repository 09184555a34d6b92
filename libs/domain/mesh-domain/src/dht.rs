// [libs/domain/mesh-domain/src/dht.rs]
/*!
 * DHT entry — a content-addressed, fully-replicated key/value record.
 * Every non-tombstoned entry must satisfy `SHA-256(value) == content_hash`;
 * violations are rejected at the gossip boundary rather than stored.
 */

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

pub fn sha256_hex(value: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(value);
    hex::encode(hasher.finalize())
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DhtEntry {
    pub key: String,
    pub value: Vec<u8>,
    pub content_hash: String,
    pub origin_node: Uuid,
    pub lamport_ts: i64,
    pub replica_count: u32,
    /// 0 means "never expires".
    pub ttl_secs: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub tombstone: bool,
}

impl DhtEntry {
    /// Put under a caller-supplied key.
    pub fn put_named(
        key: impl Into<String>,
        value: Vec<u8>,
        origin_node: Uuid,
        replica_count: u32,
        ttl_secs: u64,
        lamport_ts: i64,
    ) -> Self {
        let content_hash = sha256_hex(&value);
        let now = Utc::now();
        Self {
            key: key.into(),
            value,
            content_hash,
            origin_node,
            lamport_ts,
            replica_count,
            ttl_secs,
            created_at: now,
            updated_at: now,
            tombstone: false,
        }
    }

    /// Put content-addressed: the key *is* `SHA-256(value)`.
    pub fn put_content_addressed(
        value: Vec<u8>,
        origin_node: Uuid,
        replica_count: u32,
        ttl_secs: u64,
        lamport_ts: i64,
    ) -> Self {
        let content_hash = sha256_hex(&value);
        Self::put_named(content_hash.clone(), value, origin_node, replica_count, ttl_secs, lamport_ts)
    }

    /// `true` for non-tombstoned entries whose value hashes to `content_hash`.
    /// Tombstones carry an empty value and are not subject to this check.
    pub fn verify_integrity(&self) -> bool {
        if self.tombstone {
            return true;
        }
        sha256_hex(&self.value) == self.content_hash
    }

    pub fn is_ttl_expired(&self) -> bool {
        if self.ttl_secs == 0 {
            return false;
        }
        let age = Utc::now().signed_duration_since(self.updated_at);
        age.num_seconds() >= self.ttl_secs as i64
    }

    /// Returns a new tombstone record superseding this entry. The value is
    /// cleared but the content hash is preserved for audit purposes — the
    /// tombstone itself is exempt from integrity verification.
    pub fn tombstoned(&self, lamport_ts: i64) -> Self {
        Self {
            key: self.key.clone(),
            value: Vec::new(),
            content_hash: self.content_hash.clone(),
            origin_node: self.origin_node,
            lamport_ts,
            replica_count: self.replica_count,
            ttl_secs: self.ttl_secs,
            created_at: self.created_at,
            updated_at: Utc::now(),
            tombstone: true,
        }
    }

    pub fn is_tombstone_grace_expired(&self, grace_secs: i64) -> bool {
        self.tombstone
            && Utc::now().signed_duration_since(self.updated_at).num_seconds() >= grace_secs
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_addressed_key_is_the_hash() {
        let entry = DhtEntry::put_content_addressed(b"hello".to_vec(), Uuid::new_v4(), 3, 0, 1);
        assert_eq!(entry.key, sha256_hex(b"hello"));
        assert!(entry.verify_integrity());
    }

    #[test]
    fn tampered_value_fails_integrity_check() {
        let mut entry = DhtEntry::put_content_addressed(b"hello".to_vec(), Uuid::new_v4(), 3, 0, 1);
        entry.value = b"hell0".to_vec();
        assert!(!entry.verify_integrity());
    }

    #[test]
    fn tombstone_is_always_integrity_valid() {
        let entry = DhtEntry::put_named("k", b"v".to_vec(), Uuid::new_v4(), 1, 0, 1);
        let tomb = entry.tombstoned(2);
        assert!(tomb.tombstone);
        assert!(tomb.verify_integrity());
        assert!(tomb.value.is_empty());
    }

    #[test]
    fn zero_ttl_never_expires() {
        let entry = DhtEntry::put_named("k", b"v".to_vec(), Uuid::new_v4(), 1, 0, 1);
        assert!(!entry.is_ttl_expired());
    }
}
