//! Trust-on-first-use content hashing.
//!
//! The first SHA-256 seen for a chart id after a successful load becomes its
//! reference. Later loads of the same id must produce the same hash; the
//! reference is never replaced for the life of the registry.

use std::collections::HashMap;
use std::fmt;

use parking_lot::RwLock;
use sha2::{Digest, Sha256};

use crate::error::ChartLoadError;

/// SHA-256 digest of a chart payload.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContentHash([u8; 32]);

impl ContentHash {
    /// Hash `data`.
    pub fn of(data: &[u8]) -> Self {
        let mut digest = [0u8; 32];
        digest.copy_from_slice(&Sha256::digest(data));
        Self(digest)
    }

    /// Raw digest bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Lowercase hex form.
    pub fn to_hex(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.0 {
            write!(f, "{:02x}", byte)?;
        }
        Ok(())
    }
}

impl fmt::Debug for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContentHash({})", self)
    }
}

/// Chart id to first-observed content hash.
#[derive(Debug, Default)]
pub struct IntegrityRegistry {
    pinned: RwLock<HashMap<String, ContentHash>>,
}

impl IntegrityRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Compare `actual` against the pinned hash, if any.
    ///
    /// An unseen chart id always passes.
    pub fn check(&self, chart_id: &str, actual: &ContentHash) -> Result<(), ChartLoadError> {
        match self.pinned.read().get(chart_id) {
            Some(expected) if expected != actual => Err(mismatch(chart_id, expected, actual)),
            _ => Ok(()),
        }
    }

    /// Pin `hash` as the reference for `chart_id` unless one is already set.
    ///
    /// Check and insert happen under one write lock, so two racing loads of
    /// an unseen id cannot both pin different hashes.
    pub fn pin(&self, chart_id: &str, hash: ContentHash) -> Result<(), ChartLoadError> {
        let mut pinned = self.pinned.write();
        let expected = pinned.entry(chart_id.to_string()).or_insert(hash);
        if *expected != hash {
            return Err(mismatch(chart_id, expected, &hash));
        }
        Ok(())
    }

    /// The pinned hash for `chart_id`.
    pub fn get(&self, chart_id: &str) -> Option<ContentHash> {
        self.pinned.read().get(chart_id).copied()
    }

    /// Number of pinned chart ids.
    pub fn len(&self) -> usize {
        self.pinned.read().len()
    }

    /// Whether no chart id is pinned.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn mismatch(chart_id: &str, expected: &ContentHash, actual: &ContentHash) -> ChartLoadError {
    tracing::warn!(
        chart_id,
        expected = %expected,
        actual = %actual,
        "Chart content hash differs from pinned value"
    );
    ChartLoadError::Integrity {
        chart_id: chart_id.to_string(),
        expected: expected.to_hex(),
        actual: actual.to_hex(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_digest() {
        let hash = ContentHash::of(b"abc");
        assert_eq!(
            hash.to_hex(),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
        assert_eq!(
            ContentHash::of(b"").to_hex(),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn test_first_use_pins() {
        let registry = IntegrityRegistry::new();
        let a = ContentHash::of(b"chart A");
        let b = ContentHash::of(b"chart B");

        assert!(registry.check("US5MA10M", &a).is_ok());
        registry.pin("US5MA10M", a).unwrap();
        assert_eq!(registry.get("US5MA10M"), Some(a));

        // Same content again is fine, any number of times
        registry.check("US5MA10M", &a).unwrap();
        registry.pin("US5MA10M", a).unwrap();

        let err = registry.check("US5MA10M", &b).unwrap_err();
        assert_eq!(
            err,
            ChartLoadError::Integrity {
                chart_id: "US5MA10M".to_string(),
                expected: a.to_hex(),
                actual: b.to_hex(),
            }
        );
    }

    #[test]
    fn test_pin_never_overwrites() {
        let registry = IntegrityRegistry::new();
        let a = ContentHash::of(b"first");
        let b = ContentHash::of(b"second");

        registry.pin("X", a).unwrap();
        assert!(registry.pin("X", b).is_err());
        assert_eq!(registry.get("X"), Some(a));
        assert_eq!(registry.len(), 1);

        // Other ids are independent
        registry.pin("Y", b).unwrap();
        assert_eq!(registry.len(), 2);
    }
}
