//! In-memory implementation of the Ledger trait.
//!
//! This is primarily for testing. It stores the same canonical lines the
//! file backend writes, so decoding and verification behave identically.

use std::sync::RwLock;

use async_trait::async_trait;

use formula_chain_core::HmacKey;

use crate::error::Result;
use crate::traits::Ledger;

/// In-memory ledger.
///
/// All data is lost when the ledger is dropped. Thread-safe via RwLock.
#[derive(Debug, Default)]
pub struct MemoryLedger {
    lines: RwLock<Vec<Vec<u8>>>,
    key: Option<HmacKey>,
}

impl MemoryLedger {
    /// Create a new empty ledger without an HMAC key.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new empty ledger that seals and verifies with `key`.
    pub fn with_key(key: HmacKey) -> Self {
        Self {
            lines: RwLock::new(Vec::new()),
            key: Some(key),
        }
    }

    /// Build a ledger over existing raw lines (used to stage corrupt chains).
    pub fn from_lines(lines: Vec<Vec<u8>>, key: Option<HmacKey>) -> Self {
        Self {
            lines: RwLock::new(lines),
            key,
        }
    }

    /// Snapshot of the stored lines.
    pub fn lines(&self) -> Vec<Vec<u8>> {
        self.lines.read().unwrap().clone()
    }
}

#[async_trait]
impl Ledger for MemoryLedger {
    async fn read_lines(&self) -> Result<Vec<Vec<u8>>> {
        Ok(self.lines.read().unwrap().clone())
    }

    async fn write_line(&self, line: String) -> Result<()> {
        self.lines.write().unwrap().push(line.into_bytes());
        Ok(())
    }

    fn hmac_key(&self) -> Option<&HmacKey> {
        self.key.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use formula_chain_core::{encode_record, BlockBuilder, IntegrityError, Sha256Hash};

    fn fp() -> Sha256Hash {
        Sha256Hash::hash(b"tunables")
    }

    #[tokio::test]
    async fn test_memory_ledger_basic() {
        let ledger = MemoryLedger::new();
        let first = ledger
            .append(BlockBuilder::new(0, fp()).formula("x").build())
            .await
            .unwrap();
        let second = ledger
            .append(BlockBuilder::new(1, fp()).formula("x+1").build())
            .await
            .unwrap();

        assert_eq!(second.block.prev, Some(first.hash));
        assert_eq!(ledger.lines().len(), 2);
        assert_eq!(ledger.lines()[1], encode_record(&second).into_bytes());

        let summary = ledger.summarize(fp()).await.unwrap();
        assert_eq!(summary.height, 2);
        assert_eq!(summary.head_hash, Some(second.hash));
    }

    #[tokio::test]
    async fn test_append_record_preserves_hash() {
        let source = MemoryLedger::with_key(HmacKey::new(b"k".to_vec()));
        let record = source
            .append(BlockBuilder::new(0, fp()).build())
            .await
            .unwrap();

        let mirror = MemoryLedger::with_key(HmacKey::new(b"k".to_vec()));
        mirror.append_record(&record).await.unwrap();

        assert_eq!(mirror.lines(), source.lines());
        assert_eq!(mirror.load_all().await.unwrap(), vec![record]);
    }

    #[tokio::test]
    async fn test_step_gap_is_detected() {
        let ledger = MemoryLedger::new();
        ledger
            .append(BlockBuilder::new(0, fp()).build())
            .await
            .unwrap();
        // append does not validate linkage; verify does
        ledger
            .append(BlockBuilder::new(2, fp()).build())
            .await
            .unwrap();

        let failure = ledger.verify().await.unwrap().failure.unwrap();
        assert_eq!(failure.step, 1);
        assert_eq!(
            failure.error,
            IntegrityError::StepMismatch {
                expected: 1,
                got: 2
            }
        );
    }

    #[tokio::test]
    async fn test_stripped_hmac_is_detected() {
        let key = HmacKey::new(b"k".to_vec());
        let signed = MemoryLedger::with_key(key.clone());
        signed
            .append(BlockBuilder::new(0, fp()).build())
            .await
            .unwrap();

        let mut lines = signed.lines();
        let text = String::from_utf8(lines.remove(0)).unwrap();
        let start = text.find("\"hmac\":\"").unwrap() + "\"hmac\":\"".len();
        let stripped = format!("{}{}", &text[..start], "\"}");
        let ledger = MemoryLedger::from_lines(vec![stripped.into_bytes()], Some(key));

        let failure = ledger.verify().await.unwrap().failure.unwrap();
        assert_eq!(failure.step, 0);
        assert_eq!(failure.error, IntegrityError::HmacMissing);
    }
}
