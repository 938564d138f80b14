//! Golden vectors for cross-implementation verification.
//!
//! Every implementation of formula-chain must produce identical:
//! - canonical payload
//! - block hash
//! - HMAC tag
//! - chain-file line

use formula_chain::core::{
    canonical_tunables, decode_record, encode_record, ChainCursor, IntegrityError,
};
use formula_chain::store::verify_lines;
use formula_chain::{HmacKey, Sha256Hash, Tunables};
use formula_chain_testkit::vectors::{
    all_vectors, golden_block, sealed_vectors, verify_all_vectors, DEFAULT_FINGERPRINT,
    GOLDEN_KEY,
};

#[test]
fn test_vectors_pass() {
    let results = verify_all_vectors();
    assert_eq!(results.len(), all_vectors().len());
    for (name, passed, detail) in results {
        assert!(passed, "{}: {}", name, detail);
    }
}

#[test]
fn test_vectors_deterministic() {
    let a: Vec<String> = sealed_vectors()
        .iter()
        .map(|(_, r)| encode_record(r))
        .collect();
    let b: Vec<String> = sealed_vectors()
        .iter()
        .map(|(_, r)| encode_record(r))
        .collect();
    assert_eq!(a, b);
}

#[test]
fn test_default_tunables_encoding() {
    let tunables = Tunables::default();
    assert_eq!(
        canonical_tunables(&tunables),
        r#"{"decay":0.90000000000000002,"quorum":0.59999999999999998,"temperature":1,"threshold":0.5,"max_complexity":32,"seed":42,"steps":1000}"#
    );
    assert_eq!(tunables.fingerprint().to_hex(), DEFAULT_FINGERPRINT);
}

#[test]
fn test_chain_line_is_payload_plus_hash_and_hmac() {
    for (vector, record) in sealed_vectors() {
        let line = encode_record(&record);
        let payload_body = vector.expected_payload.trim_end_matches('}');
        let expected = format!(
            r#"{},"hash":"{}","hmac":"{}"}}"#,
            payload_body,
            vector.expected_hash,
            vector.expected_hmac.unwrap_or("")
        );
        assert_eq!(line, expected, "{}", vector.name);
    }
}

#[test]
fn test_decode_literal_line() {
    let (vector, _) = sealed_vectors().remove(1);
    let line = format!(
        r#"{},"hash":"{}","hmac":""}}"#,
        vector.expected_payload.trim_end_matches('}'),
        vector.expected_hash
    );

    let record = decode_record(line.as_bytes()).unwrap();
    assert_eq!(record.step(), 1);
    assert_eq!(record.block.parent, 0);
    assert_eq!(record.block.explain, "line1\nline2 \"quoted\"");
    assert_eq!(record.block.eff_breakdown["accuracy"], 0.9);
    assert_eq!(record.hmac, None);
    assert_eq!(record.hash.to_hex(), vector.expected_hash);
    assert_eq!(record.block.compute_hash(), record.hash);
    assert_eq!(encode_record(&record), line);
}

#[test]
fn test_vectors_form_a_valid_chain() {
    let lines: Vec<String> = sealed_vectors()
        .iter()
        .map(|(_, r)| encode_record(r))
        .collect();

    let report = verify_lines(lines.iter().map(|l| l.as_bytes()), None);
    assert!(report.is_valid(), "{:?}", report.failure);
    assert_eq!(report.blocks, 2);
    assert_eq!(
        report.head.map(|h| h.to_hex()).as_deref(),
        Some(all_vectors()[1].expected_hash)
    );
}

#[test]
fn test_keyed_verify_requires_tag_on_every_block() {
    let lines: Vec<String> = sealed_vectors()
        .iter()
        .map(|(_, r)| encode_record(r))
        .collect();
    let key = HmacKey::new(GOLDEN_KEY);

    let report = verify_lines(lines.iter().map(|l| l.as_bytes()), Some(&key));
    let failure = report.failure.expect("successor carries no tag");
    assert_eq!(failure.step, 1);
    assert!(matches!(failure.error, IntegrityError::HmacMissing));
}

#[test]
fn test_cursor_rejects_vector_out_of_order() {
    let vectors = sealed_vectors();
    let cursor = ChainCursor::new();
    assert!(cursor.check(&vectors[1].1, None).is_err());
    assert!(cursor.check(&vectors[0].1, None).is_ok());
}

#[test]
fn test_fingerprint_changes_hash() {
    let mut block = golden_block(0);
    let base = block.compute_hash();
    block.config_fingerprint = Sha256Hash::hash(b"other ruleset");
    assert_ne!(block.compute_hash(), base);
}

/// Dump the vectors as JSON for other implementations.
#[test]
fn print_golden_vectors_json() {
    let vectors: Vec<serde_json::Value> = sealed_vectors()
        .iter()
        .map(|(vector, record)| {
            serde_json::json!({
                "name": vector.name,
                "step": vector.step,
                "key": vector.key.map(|k| String::from_utf8_lossy(k).into_owned()),
                "payload": vector.expected_payload,
                "hash": vector.expected_hash,
                "hmac": vector.expected_hmac,
                "line": encode_record(record),
            })
        })
        .collect();

    let json = serde_json::to_string_pretty(&serde_json::json!({
        "version": 1,
        "config_fingerprint": DEFAULT_FINGERPRINT,
        "vectors": vectors,
    }))
    .unwrap();
    assert!(json.contains(DEFAULT_FINGERPRINT));
    println!("{}", json);
}
