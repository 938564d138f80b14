//! Ledger trait: the abstract interface for chain persistence.
//!
//! Backends only move raw lines. Sealing, decoding, summarizing and
//! verification are provided methods built on those two primitives, so every
//! backend has identical chain semantics.

use async_trait::async_trait;
use tracing::{debug, warn};

use formula_chain_core::{
    decode_record, encode_record, Block, ChainCursor, ChainRecord, ChainSummary, HmacKey,
    IntegrityError, Sha256Hash,
};

use crate::error::{Result, StoreError};

/// First integrity failure found by [`Ledger::verify`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifyFailure {
    /// Expected step of the failing line (its zero-based index).
    pub step: u64,
    pub error: IntegrityError,
}

/// Outcome of a full-chain replay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifyReport {
    /// Number of blocks that passed before the first failure (all of them on
    /// success).
    pub blocks: u64,
    /// Hash of the last block that passed.
    pub head: Option<Sha256Hash>,
    pub failure: Option<VerifyFailure>,
}

impl VerifyReport {
    /// True when every line passed.
    pub fn is_valid(&self) -> bool {
        self.failure.is_none()
    }
}

/// Replay raw chain lines from an empty head.
///
/// Each line is decoded and checked at its index; the first failure stops
/// the replay. An undecodable line is reported as `Malformed` at its index.
pub fn verify_lines<'a, I>(lines: I, key: Option<&HmacKey>) -> VerifyReport
where
    I: IntoIterator<Item = &'a [u8]>,
{
    let mut cursor = ChainCursor::new();

    for line in lines {
        let step = cursor.next_step;
        let outcome = decode_record(line)
            .map_err(IntegrityError::from)
            .and_then(|record| cursor.check(&record, key).map(|()| record));

        match outcome {
            Ok(record) => cursor.advance(&record),
            Err(error) => {
                return VerifyReport {
                    blocks: step,
                    head: cursor.head,
                    failure: Some(VerifyFailure { step, error }),
                }
            }
        }
    }

    VerifyReport {
        blocks: cursor.next_step,
        head: cursor.head,
        failure: None,
    }
}

fn decode_at(line: &[u8], index: usize) -> Result<ChainRecord> {
    decode_record(line).map_err(|source| StoreError::Malformed {
        line: index as u64,
        source,
    })
}

/// The Ledger trait: async interface for one append-only chain.
///
/// There is no index. Every read re-parses the whole chain, which keeps the
/// on-disk file the only source of truth.
///
/// The ledger takes no lock of its own. Callers that mutate the chain from
/// more than one task must serialize appends themselves.
#[async_trait]
pub trait Ledger: Send + Sync {
    // ─────────────────────────────────────────────────────────────────────────
    // Backend primitives
    // ─────────────────────────────────────────────────────────────────────────

    /// Every stored line in order, without line terminators.
    async fn read_lines(&self) -> Result<Vec<Vec<u8>>>;

    /// Write one line (without terminator) at the end of the chain.
    async fn write_line(&self, line: String) -> Result<()>;

    /// The HMAC key blocks are sealed and verified with, if any.
    fn hmac_key(&self) -> Option<&HmacKey>;

    // ─────────────────────────────────────────────────────────────────────────
    // Chain operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Parse every line in order. A malformed line is a hard failure.
    async fn load_all(&self) -> Result<Vec<ChainRecord>> {
        let lines = self.read_lines().await?;
        lines
            .iter()
            .enumerate()
            .map(|(i, line)| decode_at(line, i))
            .collect()
    }

    /// The last record, or `None` for an empty chain.
    async fn head(&self) -> Result<Option<ChainRecord>> {
        let lines = self.read_lines().await?;
        match lines.last() {
            Some(line) => decode_at(line, lines.len() - 1).map(Some),
            None => Ok(None),
        }
    }

    /// Seal a producer block onto the current head and write it.
    ///
    /// `prev` and `hmac_alg` are overwritten. The block's `step` and
    /// `parent` are taken as given; linkage is not validated here.
    async fn append(&self, block: Block) -> Result<ChainRecord> {
        let prev = self.head().await?.map(|r| r.hash);
        let record = ChainRecord::seal(block, prev, self.hmac_key());
        self.write_line(encode_record(&record)).await?;

        debug!(step = record.step(), hash = %record.hash, "appended block");
        Ok(record)
    }

    /// Write an already sealed record verbatim.
    ///
    /// Used for blocks accepted from peers, so their hashes are preserved.
    async fn append_record(&self, record: &ChainRecord) -> Result<()> {
        self.write_line(encode_record(record)).await?;
        debug!(step = record.step(), hash = %record.hash, "appended peer block");
        Ok(())
    }

    /// All records with `step >= from`, in chain order.
    async fn records_from(&self, from: u64) -> Result<Vec<ChainRecord>> {
        let mut records = self.load_all().await?;
        records.retain(|r| r.step() >= from);
        Ok(records)
    }

    /// Height and head hash of the chain, tagged with `fingerprint`.
    async fn summarize(&self, fingerprint: Sha256Hash) -> Result<ChainSummary> {
        let records = self.load_all().await?;
        Ok(ChainSummary {
            fingerprint,
            height: records.len() as u64,
            head_hash: records.last().map(|r| r.hash),
        })
    }

    /// Replay the whole chain and report the first integrity failure.
    ///
    /// Read-only. Only I/O problems surface as `Err`.
    async fn verify(&self) -> Result<VerifyReport> {
        let lines = self.read_lines().await?;
        let report = verify_lines(lines.iter().map(Vec::as_slice), self.hmac_key());

        if let Some(failure) = &report.failure {
            warn!(
                step = failure.step,
                reason = failure.error.reason(),
                "chain verification failed"
            );
        }
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use formula_chain_core::BlockBuilder;
    use proptest::prelude::*;

    fn fp() -> Sha256Hash {
        Sha256Hash::hash(b"tunables")
    }

    fn lines(n: u64, key: Option<&HmacKey>) -> Vec<Vec<u8>> {
        let mut prev = None;
        (0..n)
            .map(|step| {
                let block = BlockBuilder::new(step, fp()).formula("sin(x)").build();
                let record = ChainRecord::seal(block, prev, key);
                prev = Some(record.hash);
                encode_record(&record).into_bytes()
            })
            .collect()
    }

    #[test]
    fn test_verify_lines_empty() {
        let report = verify_lines(std::iter::empty(), None);
        assert!(report.is_valid());
        assert_eq!(report.blocks, 0);
        assert_eq!(report.head, None);
    }

    #[test]
    fn test_verify_lines_valid() {
        let chain = lines(4, None);
        let report = verify_lines(chain.iter().map(Vec::as_slice), None);
        assert!(report.is_valid());
        assert_eq!(report.blocks, 4);
        assert!(report.head.is_some());
    }

    #[test]
    fn test_verify_lines_malformed_reports_index() {
        let mut chain = lines(3, None);
        chain[1] = b"{not json".to_vec();
        let report = verify_lines(chain.iter().map(Vec::as_slice), None);
        let failure = report.failure.unwrap();
        assert_eq!(failure.step, 1);
        assert!(matches!(failure.error, IntegrityError::Malformed(_)));
        assert_eq!(report.blocks, 1);
    }

    #[test]
    fn test_verify_lines_missing_line_breaks_linkage() {
        let mut chain = lines(3, None);
        chain.remove(1);
        let report = verify_lines(chain.iter().map(Vec::as_slice), None);
        let failure = report.failure.unwrap();
        assert_eq!(failure.step, 1);
        assert!(matches!(failure.error, IntegrityError::PrevMismatch { .. }));
    }

    /// The chain as it sits on disk, plus the line each byte belongs to.
    fn file_image(n: u64, key: Option<&HmacKey>) -> (Vec<u8>, Vec<u64>) {
        let mut bytes = Vec::new();
        let mut owner = Vec::new();
        for (step, line) in lines(n, key).into_iter().enumerate() {
            owner.extend(std::iter::repeat(step as u64).take(line.len() + 1));
            bytes.extend_from_slice(&line);
            bytes.push(b'\n');
        }
        (bytes, owner)
    }

    fn verify_image(bytes: &[u8], key: Option<&HmacKey>) -> VerifyReport {
        let chain = crate::file::split_lines(bytes);
        verify_lines(chain.iter().map(Vec::as_slice), key)
    }

    #[test]
    fn test_every_flipped_byte_fails_at_its_step() {
        let key = HmacKey::new(b"k".to_vec());
        let (image, owner) = file_image(3, Some(&key));
        assert!(verify_image(&image, Some(&key)).is_valid());

        for (pos, step) in owner.iter().enumerate() {
            let mut tampered = image.clone();
            tampered[pos] ^= 0x01;
            let report = verify_image(&tampered, Some(&key));
            assert_eq!(
                report.failure.map(|f| f.step),
                Some(*step),
                "flip at byte {} ({:?})",
                pos,
                image[pos] as char
            );
        }
    }

    proptest! {
        #[test]
        fn prop_flipped_byte_detected_at_its_step(
            n in 1u64..6,
            pick in any::<prop::sample::Index>(),
            mask in 1u8..=255,
        ) {
            let key = HmacKey::new(b"k".to_vec());
            let (mut image, owner) = file_image(n, Some(&key));
            let pos = pick.index(image.len());
            image[pos] ^= mask;

            let report = verify_image(&image, Some(&key));
            prop_assert_eq!(report.failure.map(|f| f.step), Some(owner[pos]));
        }

        #[test]
        fn prop_edit_detected_at_its_step(
            n in 1u64..12,
            pick in any::<prop::sample::Index>(),
            keyed in any::<bool>(),
        ) {
            let key = keyed.then(|| HmacKey::new(b"k".to_vec()));
            let target = pick.index(n as usize);

            let mut chain = lines(n, key.as_ref());
            let edited = String::from_utf8(chain[target].clone())
                .unwrap()
                .replacen("sin(x)", "sin(y)", 1);
            chain[target] = edited.into_bytes();

            let report = verify_lines(chain.iter().map(Vec::as_slice), key.as_ref());
            prop_assert_eq!(report.failure.map(|f| f.step), Some(target as u64));
            prop_assert_eq!(report.blocks, target as u64);
        }
    }
}
