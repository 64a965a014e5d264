//! Stable fake object ids for fixtures.
//!
//! Tests that need the same id in a stub and in a query ask an [`IdCache`]
//! for it by key instead of hard-coding hex strings.

use chrono::Utc;
use rand::Rng;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// A 12-byte document id rendered as 24 hex characters.
///
/// Layout: 4-byte big-endian UNIX seconds, 5 random bytes, 3-byte counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId([u8; 12]);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid object id {0:?}: expected 24 hex characters")]
pub struct ParseObjectIdError(String);

impl ObjectId {
    pub fn from_bytes(bytes: [u8; 12]) -> Self {
        Self(bytes)
    }

    pub fn bytes(&self) -> [u8; 12] {
        self.0
    }

    /// Seconds since the UNIX epoch stored in the id.
    pub fn timestamp(&self) -> u32 {
        u32::from_be_bytes([self.0[0], self.0[1], self.0[2], self.0[3]])
    }

    pub fn is_valid(s: &str) -> bool {
        s.parse::<ObjectId>().is_ok()
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl FromStr for ObjectId {
    type Err = ParseObjectIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut bytes = [0u8; 12];
        hex::decode_to_slice(s, &mut bytes).map_err(|_| ParseObjectIdError(s.to_string()))?;
        Ok(Self(bytes))
    }
}

impl Serialize for ObjectId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ObjectId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

impl From<ObjectId> for serde_json::Value {
    fn from(id: ObjectId) -> Self {
        serde_json::Value::String(id.to_string())
    }
}

/// Memoized id generator.
///
/// Owned by whichever harness needs it; nothing is shared between caches.
#[derive(Debug)]
pub struct IdCache {
    ids: HashMap<String, ObjectId>,
    process: [u8; 5],
    counter: u32,
}

impl IdCache {
    pub fn new() -> Self {
        let mut rng = rand::thread_rng();
        Self {
            ids: HashMap::new(),
            process: rng.gen(),
            counter: rng.gen_range(0..0x00ff_ffff),
        }
    }

    /// Id for `key`, generated on first use and reused afterwards.
    pub fn oid(&mut self, key: &str) -> ObjectId {
        if let Some(id) = self.ids.get(key) {
            return *id;
        }
        let id = self.fresh();
        self.ids.insert(key.to_string(), id);
        id
    }

    /// A new id that is not remembered.
    pub fn fresh(&mut self) -> ObjectId {
        self.counter = (self.counter + 1) & 0x00ff_ffff;
        let seconds = Utc::now().timestamp() as u32;

        let mut bytes = [0u8; 12];
        bytes[..4].copy_from_slice(&seconds.to_be_bytes());
        bytes[4..9].copy_from_slice(&self.process);
        bytes[9..].copy_from_slice(&self.counter.to_be_bytes()[1..]);
        ObjectId(bytes)
    }

    pub fn get(&self, key: &str) -> Option<ObjectId> {
        self.ids.get(key).copied()
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

impl Default for IdCache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generates_valid_ids() {
        let mut cache = IdCache::new();
        let id = cache.fresh();
        let s = id.to_string();
        assert_eq!(s.len(), 24);
        assert!(ObjectId::is_valid(&s));
        assert!(s.chars().all(|c| !c.is_ascii_uppercase()));
    }

    #[test]
    fn test_caches_by_key() {
        let mut cache = IdCache::new();
        let id1 = cache.oid("id1");
        assert_eq!(id1, cache.oid("id1"));
        assert_ne!(id1, cache.oid("id2"));
        assert_eq!(cache.get("id1"), Some(id1));
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_fresh_ids_are_distinct_and_uncached() {
        let mut cache = IdCache::new();
        let a = cache.fresh();
        let b = cache.fresh();
        assert_ne!(a, b);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_caches_are_independent() {
        let mut first = IdCache::new();
        let mut second = IdCache::new();
        assert_ne!(first.oid("user"), second.oid("user"));
    }

    #[test]
    fn test_timestamp_is_recent() {
        let mut cache = IdCache::new();
        let now = Utc::now().timestamp() as u32;
        let ts = cache.fresh().timestamp();
        assert!(ts <= now + 1 && ts + 5 >= now);
    }

    #[test]
    fn test_parse_round_trip() {
        let id: ObjectId = "507f1f77bcf86cd799439011".parse().unwrap();
        assert_eq!(id.to_string(), "507f1f77bcf86cd799439011");
        assert!("507f1f77bcf86cd79943901".parse::<ObjectId>().is_err());
        assert!("zz7f1f77bcf86cd799439011".parse::<ObjectId>().is_err());
        assert!("507f1f77bcf86cd79943901100".parse::<ObjectId>().is_err());
        assert!(!ObjectId::is_valid("507f1f77bcf86cd79943901"));
        assert!(ObjectId::is_valid("507F1F77BCF86CD799439011"));
    }

    #[test]
    fn test_json_value() {
        let id: ObjectId = "507f1f77bcf86cd799439011".parse().unwrap();
        assert_eq!(
            serde_json::Value::from(id),
            serde_json::json!("507f1f77bcf86cd799439011")
        );
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"507f1f77bcf86cd799439011\"");
        let back: ObjectId = serde_json::from_str("\"507f1f77bcf86cd799439011\"").unwrap();
        assert_eq!(back, id);
    }
}
