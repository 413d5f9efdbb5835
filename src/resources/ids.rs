//! Entity identifiers.
//!
//! Ids come from a monotonic counter owned by each [`World`](super::world::World),
//! so two worlds never share id state. They display (and serialize) as
//! upper-case base-36 strings, which keeps them short in logs and lets them
//! travel through the dynamic [`Value`] property bag.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

const DIGITS: &[u8; 36] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// Opaque handle to an entity in a [`World`](super::world::World).
///
/// Ordering follows creation order.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityId(u64);

impl EntityId {
    /// Wrap a raw counter value.
    pub const fn from_raw(raw: u64) -> Self {
        EntityId(raw)
    }

    /// The raw counter value.
    pub const fn raw(self) -> u64 {
        self.0
    }

    /// Parse the base-36 form produced by `Display`. Case-insensitive.
    pub fn parse(text: &str) -> Option<Self> {
        if text.is_empty() {
            return None;
        }
        u64::from_str_radix(text, 36).ok().map(EntityId)
    }

    /// Read an id back out of a property value or method argument.
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::String(s) => Self::parse(s),
            Value::Number(n) => n.as_u64().map(EntityId),
            _ => None,
        }
    }

    /// The id as a property value.
    pub fn to_value(self) -> Value {
        Value::String(self.to_string())
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut buf = [0u8; 13];
        let mut pos = buf.len();
        let mut n = self.0;
        loop {
            pos -= 1;
            buf[pos] = DIGITS[(n % 36) as usize];
            n /= 36;
            if n == 0 {
                break;
            }
        }
        // only ASCII digits were written
        f.write_str(std::str::from_utf8(&buf[pos..]).map_err(|_| fmt::Error)?)
    }
}

impl Serialize for EntityId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for EntityId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        EntityId::parse(&text)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid entity id: {text}")))
    }
}

/// Per-world id counter.
#[derive(Debug, Default)]
pub struct IdGenerator {
    last: u64,
}

impl IdGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hand out the next id. The first id is `1`.
    pub fn next_id(&mut self) -> EntityId {
        self.last += 1;
        EntityId(self.last)
    }
}
