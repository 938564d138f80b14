//! Golden test vectors for deterministic verification.
//!
//! These vectors pin the canonical encoding, the SHA-256 block hash and the
//! HMAC tag. Any conformant encoder must reproduce them byte for byte.

use formula_chain_core::{
    canonical_payload, Block, BlockBuilder, ChainRecord, HmacKey, Sha256Hash, Tunables,
};

/// Fingerprint of `Tunables::default()`.
pub const DEFAULT_FINGERPRINT: &str =
    "87f8928b08788db24e82810599d06c9fec2116ec84cf8c2cf3575788d651503b";

/// Key used by the keyed vector.
pub const GOLDEN_KEY: &[u8] = b"golden-key";

/// A golden test vector.
#[derive(Debug, Clone)]
pub struct GoldenVector {
    /// Human-readable name for the vector.
    pub name: &'static str,
    /// Step of the block; the predecessor is vector 0.
    pub step: u64,
    /// HMAC key the block is sealed with.
    pub key: Option<&'static [u8]>,
    /// Expected canonical payload.
    pub expected_payload: &'static str,
    /// Expected SHA-256 of the payload (hex).
    pub expected_hash: &'static str,
    /// Expected HMAC-SHA256 of the payload (hex).
    pub expected_hmac: Option<&'static str>,
}

/// Get all golden test vectors, in chain order.
pub fn all_vectors() -> Vec<GoldenVector> {
    vec![
        GoldenVector {
            name: "keyed genesis with escapes and breakdown",
            step: 0,
            key: Some(GOLDEN_KEY),
            expected_payload: concat!(
                r#"{"step":0,"parent":-1,"seed":42,"run_id":"run-0001","fractal_addr":"r.0.1","#,
                r#""formula":"sin(x) + x^2","votes":[1,0,1,1,0.5,0,1,1,0.25,1],"eff":0.75,"#,
                r#""compl":7,"eff_breakdown":{"accuracy":0.90000000000000002,"#,
                r#""brevity":0.59999999999999998},"explain":"line1\nline2 \"quoted\"","#,
                r#""salt":"s4lt","prev":"","#,
                r#""config_fingerprint":"87f8928b08788db24e82810599d06c9fec2116ec84cf8c2cf3575788d651503b","#,
                r#""hmac_alg":"hmac-sha256"}"#,
            ),
            expected_hash: "d0a68cf82e9ac0d3621a882e085decd1f7b376b2a766d5f4c5c7efb27ae3e9b4",
            expected_hmac: Some(
                "f3d589a517086996e1b24d815bd4f376a0007094f2164e8cbc66d4950d7a46eb",
            ),
        },
        GoldenVector {
            name: "unkeyed successor linked to genesis",
            step: 1,
            key: None,
            expected_payload: concat!(
                r#"{"step":1,"parent":0,"seed":42,"run_id":"run-0001","fractal_addr":"r.0.1","#,
                r#""formula":"sin(x) + x^2","votes":[1,0,1,1,0.5,0,1,1,0.25,1],"eff":0.75,"#,
                r#""compl":7,"eff_breakdown":{"accuracy":0.90000000000000002,"#,
                r#""brevity":0.59999999999999998},"explain":"line1\nline2 \"quoted\"","#,
                r#""salt":"s4lt","#,
                r#""prev":"d0a68cf82e9ac0d3621a882e085decd1f7b376b2a766d5f4c5c7efb27ae3e9b4","#,
                r#""config_fingerprint":"87f8928b08788db24e82810599d06c9fec2116ec84cf8c2cf3575788d651503b","#,
                r#""hmac_alg":""}"#,
            ),
            expected_hash: "82c91ea63570ab2b1cae417c8bef4449b226e5797e028038dbefb922201c1c2f",
            expected_hmac: None,
        },
    ]
}

/// The fixed producer block behind every vector.
pub fn golden_block(step: u64) -> Block {
    BlockBuilder::new(step, Tunables::default().fingerprint())
        .seed(42)
        .run_id("run-0001")
        .fractal_addr("r.0.1")
        .formula("sin(x) + x^2")
        .votes([1.0, 0.0, 1.0, 1.0, 0.5, 0.0, 1.0, 1.0, 0.25, 1.0])
        .eff(0.75)
        .compl(7.0)
        .breakdown("accuracy", 0.9)
        .breakdown("brevity", 0.6)
        .explain("line1\nline2 \"quoted\"")
        .salt("s4lt")
        .build()
}

/// Seal every vector's block in chain order.
pub fn sealed_vectors() -> Vec<(GoldenVector, ChainRecord)> {
    let mut prev: Option<Sha256Hash> = None;
    all_vectors()
        .into_iter()
        .map(|vector| {
            let key = vector.key.map(HmacKey::new);
            let record = ChainRecord::seal(golden_block(vector.step), prev, key.as_ref());
            prev = Some(record.hash);
            (vector, record)
        })
        .collect()
}

/// Check every vector; returns `(name, passed, detail)` per vector.
pub fn verify_all_vectors() -> Vec<(String, bool, String)> {
    sealed_vectors()
        .into_iter()
        .map(|(vector, record)| {
            let payload = canonical_payload(&record.block);
            let hmac = record.hmac.map(|t| t.to_hex());

            let detail = if payload != vector.expected_payload {
                format!("payload mismatch: {}", payload)
            } else if record.hash.to_hex() != vector.expected_hash {
                format!("hash mismatch: {}", record.hash.to_hex())
            } else if hmac.as_deref() != vector.expected_hmac {
                format!("hmac mismatch: {:?}", hmac)
            } else {
                String::new()
            };

            (vector.name.to_string(), detail.is_empty(), detail)
        })
        .collect()
}
