//! Globally unique identifiers for stored chunks.
//!
//! An [`ObjectId`] is 12 bytes:
//!
//! ```text
//! | 4 bytes: seconds since epoch | 5 bytes: process entropy | 3 bytes: counter |
//! ```
//!
//! The process entropy is a blake3 digest of the process id and host name,
//! salted with the time the first id was requested. The counter is seeded from the same
//! digest and incremented atomically, so ids generated by one process never
//! repeat, even under concurrent callers.

use crate::error::{Result, StoreError};
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

const COUNTER_MASK: u32 = 0x00ff_ffff;

struct ProcessSeed {
    entropy: [u8; 5],
    counter: AtomicU32,
}

static SEED: LazyLock<ProcessSeed> = LazyLock::new(|| {
    let mut hasher = blake3::Hasher::new();
    hasher.update(&std::process::id().to_le_bytes());
    if let Ok(host) = std::env::var("HOSTNAME") {
        hasher.update(host.as_bytes());
    }
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    hasher.update(&nanos.to_le_bytes());
    let digest = hasher.finalize();
    let bytes = digest.as_bytes();

    let mut entropy = [0u8; 5];
    entropy.copy_from_slice(&bytes[..5]);
    let counter = u32::from_be_bytes([0, bytes[5], bytes[6], bytes[7]]);
    ProcessSeed {
        entropy,
        counter: AtomicU32::new(counter),
    }
});

/// 12 byte unique identifier, rendered as 24 lowercase hex characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId([u8; 12]);

impl ObjectId {
    /// Generate a new id
    pub fn new() -> Self {
        let seconds = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs() as u32;
        let count = SEED.counter.fetch_add(1, Ordering::Relaxed) & COUNTER_MASK;

        let mut bytes = [0u8; 12];
        bytes[..4].copy_from_slice(&seconds.to_be_bytes());
        bytes[4..9].copy_from_slice(&SEED.entropy);
        bytes[9..].copy_from_slice(&count.to_be_bytes()[1..]);
        Self(bytes)
    }

    pub fn from_bytes(bytes: [u8; 12]) -> Self {
        Self(bytes)
    }

    pub fn bytes(&self) -> [u8; 12] {
        self.0
    }

    /// Seconds since the epoch at which this id was generated
    pub fn timestamp(&self) -> u32 {
        u32::from_be_bytes([self.0[0], self.0[1], self.0[2], self.0[3]])
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl Default for ObjectId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl FromStr for ObjectId {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || StoreError::InvalidId {
            value: s.to_string(),
        };
        if s.len() != 24 {
            return Err(invalid());
        }
        let decoded = hex::decode(s).map_err(|_| invalid())?;
        let mut bytes = [0u8; 12];
        bytes.copy_from_slice(&decoded);
        Ok(Self(bytes))
    }
}
