//! Canonical JSON encoding for deterministic hashing.
//!
//! The canonical payload is the only input to a block's hash and HMAC, so
//! every conformant encoder must emit byte-identical output for the same
//! field values:
//! - Keys in the fixed order of [`keys::PAYLOAD_ORDER`], no whitespace
//! - Strings escape `"`, `\` and control characters only (fixed table)
//! - Integers in plain decimal
//! - Floats as C `%.17g` (17 significant digits); non-finite as `null`
//! - `votes` always has exactly 10 entries
//!
//! **CRITICAL**: This encoding is FROZEN. Changing it breaks every stored hash.
//!
//! Decoding is the strict left inverse: a record that parses but does not
//! re-encode to exactly the same bytes is rejected.

use std::collections::BTreeMap;
use std::fmt::Write;

use serde_json::{Map, Value};

use crate::block::{Block, ChainRecord, VOTE_COUNT};
use crate::crypto::{HmacTag, Sha256Hash};
use crate::error::CoreError;
use crate::tunables::Tunables;

/// JSON key names, in canonical order.
pub mod keys {
    pub const STEP: &str = "step";
    pub const PARENT: &str = "parent";
    pub const SEED: &str = "seed";
    pub const RUN_ID: &str = "run_id";
    pub const FRACTAL_ADDR: &str = "fractal_addr";
    pub const FORMULA: &str = "formula";
    pub const VOTES: &str = "votes";
    pub const EFF: &str = "eff";
    pub const COMPL: &str = "compl";
    pub const EFF_BREAKDOWN: &str = "eff_breakdown";
    pub const EXPLAIN: &str = "explain";
    pub const SALT: &str = "salt";
    pub const PREV: &str = "prev";
    pub const CONFIG_FINGERPRINT: &str = "config_fingerprint";
    pub const HMAC_ALG: &str = "hmac_alg";

    /// Record-only keys, appended after the payload.
    pub const HASH: &str = "hash";
    pub const HMAC: &str = "hmac";

    pub const PAYLOAD_ORDER: [&str; 15] = [
        STEP,
        PARENT,
        SEED,
        RUN_ID,
        FRACTAL_ADDR,
        FORMULA,
        VOTES,
        EFF,
        COMPL,
        EFF_BREAKDOWN,
        EXPLAIN,
        SALT,
        PREV,
        CONFIG_FINGERPRINT,
        HMAC_ALG,
    ];
}

/// Encode a block's payload fields to canonical JSON.
pub fn canonical_payload(block: &Block) -> String {
    let mut obj = ObjectWriter::new();
    write_payload_fields(&mut obj, block);
    obj.finish()
}

/// Encode a full chain record: payload fields followed by `hash` and `hmac`.
///
/// This is both the chain-file line (without its newline) and the body of a
/// `BLOCK` frame on the wire.
pub fn encode_record(record: &ChainRecord) -> String {
    let mut obj = ObjectWriter::new();
    write_payload_fields(&mut obj, &record.block);
    obj.key(keys::HASH);
    push_str(&mut obj.buf, &record.hash.to_hex());
    obj.key(keys::HMAC);
    let hmac = record.hmac.map(|t| t.to_hex()).unwrap_or_default();
    push_str(&mut obj.buf, &hmac);
    obj.finish()
}

/// Encode the tunable parameter set (fingerprint input).
pub fn canonical_tunables(t: &Tunables) -> String {
    let mut obj = ObjectWriter::new();
    obj.key("decay");
    push_f64(&mut obj.buf, t.decay);
    obj.key("quorum");
    push_f64(&mut obj.buf, t.quorum);
    obj.key("temperature");
    push_f64(&mut obj.buf, t.temperature);
    obj.key("threshold");
    push_f64(&mut obj.buf, t.threshold);
    obj.key("max_complexity");
    push_u64(&mut obj.buf, t.max_complexity.into());
    obj.key("seed");
    push_u64(&mut obj.buf, t.seed);
    obj.key("steps");
    push_u64(&mut obj.buf, t.steps);
    obj.finish()
}

fn write_payload_fields(obj: &mut ObjectWriter, b: &Block) {
    obj.key(keys::STEP);
    push_u64(&mut obj.buf, b.step);
    obj.key(keys::PARENT);
    let _ = write!(obj.buf, "{}", b.parent);
    obj.key(keys::SEED);
    push_u64(&mut obj.buf, b.seed);
    obj.key(keys::RUN_ID);
    push_str(&mut obj.buf, &b.run_id);
    obj.key(keys::FRACTAL_ADDR);
    push_str(&mut obj.buf, &b.fractal_addr);
    obj.key(keys::FORMULA);
    push_str(&mut obj.buf, &b.formula);

    obj.key(keys::VOTES);
    obj.buf.push('[');
    for (i, v) in b.votes.iter().enumerate() {
        if i > 0 {
            obj.buf.push(',');
        }
        push_f64(&mut obj.buf, *v);
    }
    obj.buf.push(']');

    obj.key(keys::EFF);
    push_f64(&mut obj.buf, b.eff);
    obj.key(keys::COMPL);
    push_f64(&mut obj.buf, b.compl);

    obj.key(keys::EFF_BREAKDOWN);
    let mut inner = ObjectWriter::new();
    for (name, value) in &b.eff_breakdown {
        inner.key(name);
        push_f64(&mut inner.buf, *value);
    }
    obj.buf.push_str(&inner.finish());

    obj.key(keys::EXPLAIN);
    push_str(&mut obj.buf, &b.explain);
    obj.key(keys::SALT);
    push_str(&mut obj.buf, &b.salt);
    obj.key(keys::PREV);
    let prev = b.prev.map(|h| h.to_hex()).unwrap_or_default();
    push_str(&mut obj.buf, &prev);
    obj.key(keys::CONFIG_FINGERPRINT);
    push_str(&mut obj.buf, &b.config_fingerprint.to_hex());
    obj.key(keys::HMAC_ALG);
    push_str(&mut obj.buf, &b.hmac_alg);
}

/// Minimal writer for a flat JSON object with caller-ordered keys.
struct ObjectWriter {
    buf: String,
    first: bool,
}

impl ObjectWriter {
    fn new() -> Self {
        Self {
            buf: String::from("{"),
            first: true,
        }
    }

    fn key(&mut self, key: &str) {
        if !self.first {
            self.buf.push(',');
        }
        self.first = false;
        push_str(&mut self.buf, key);
        self.buf.push(':');
    }

    fn finish(mut self) -> String {
        self.buf.push('}');
        self.buf
    }
}

fn push_u64(out: &mut String, n: u64) {
    let _ = write!(out, "{}", n);
}

/// Write a JSON string literal using the fixed escaping table.
fn push_str(out: &mut String, s: &str) {
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\u{08}' => out.push_str("\\b"),
            '\u{0c}' => out.push_str("\\f"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if (c as u32) < 0x20 => {
                let _ = write!(out, "\\u{:04x}", c as u32);
            }
            c => out.push(c),
        }
    }
    out.push('"');
}

/// Write a float the way C's `printf("%.17g")` does.
///
/// Seventeen significant digits round-trip every IEEE-754 double. Trailing
/// zeros are stripped; exponent form is used when the decimal exponent is
/// below -4 or at least 17.
fn push_f64(out: &mut String, v: f64) {
    if !v.is_finite() {
        out.push_str("null");
        return;
    }
    if v == 0.0 {
        out.push_str(if v.is_sign_negative() { "-0" } else { "0" });
        return;
    }

    // Rust's exact formatting: "-d.dddddddddddddddde<exp>"
    let sci = format!("{:.16e}", v);
    let (mantissa, exp) = sci.split_once('e').unwrap_or((sci.as_str(), "0"));
    let exp: i32 = exp.parse().unwrap_or(0);
    let negative = mantissa.starts_with('-');
    let digits: String = mantissa.chars().filter(char::is_ascii_digit).collect();

    if negative {
        out.push('-');
    }

    if !(-4..17).contains(&exp) {
        let (lead, rest) = digits.split_at(1);
        out.push_str(lead);
        let rest = rest.trim_end_matches('0');
        if !rest.is_empty() {
            out.push('.');
            out.push_str(rest);
        }
        let sign = if exp < 0 { '-' } else { '+' };
        let _ = write!(out, "e{}{:02}", sign, exp.unsigned_abs());
    } else if exp >= 0 {
        let (int_part, frac) = digits.split_at(exp as usize + 1);
        out.push_str(int_part);
        let frac = frac.trim_end_matches('0');
        if !frac.is_empty() {
            out.push('.');
            out.push_str(frac);
        }
    } else {
        out.push_str("0.");
        for _ in 0..(-exp - 1) {
            out.push('0');
        }
        out.push_str(digits.trim_end_matches('0'));
    }
}

/// Decode a chain record from its canonical bytes.
///
/// Fails unless re-encoding the parsed record reproduces `bytes` exactly.
pub fn decode_record(bytes: &[u8]) -> Result<ChainRecord, CoreError> {
    let value: Value =
        serde_json::from_slice(bytes).map_err(|e| CoreError::DecodingError(e.to_string()))?;
    let map = value
        .as_object()
        .ok_or_else(|| CoreError::MalformedRecord("expected object".into()))?;

    let block = Block {
        step: get_u64(map, keys::STEP)?,
        parent: get_i64(map, keys::PARENT)?,
        seed: get_u64(map, keys::SEED)?,
        run_id: get_str(map, keys::RUN_ID)?.to_string(),
        fractal_addr: get_str(map, keys::FRACTAL_ADDR)?.to_string(),
        formula: get_str(map, keys::FORMULA)?.to_string(),
        votes: get_votes(map)?,
        eff: get_f64(map, keys::EFF)?,
        compl: get_f64(map, keys::COMPL)?,
        eff_breakdown: get_breakdown(map)?,
        explain: get_str(map, keys::EXPLAIN)?.to_string(),
        salt: get_str(map, keys::SALT)?.to_string(),
        prev: get_opt_hash(map, keys::PREV)?,
        config_fingerprint: get_hash(map, keys::CONFIG_FINGERPRINT)?,
        hmac_alg: get_str(map, keys::HMAC_ALG)?.to_string(),
    };

    let hash = get_hash(map, keys::HASH)?;
    let hmac = match get_str(map, keys::HMAC)? {
        "" => None,
        s => Some(HmacTag::from_hex(s).map_err(|source| CoreError::InvalidHex {
            field: keys::HMAC,
            source,
        })?),
    };

    let record = ChainRecord { block, hash, hmac };
    if encode_record(&record).as_bytes() != bytes {
        return Err(CoreError::NonCanonical);
    }
    Ok(record)
}

fn get<'a>(map: &'a Map<String, Value>, key: &str) -> Result<&'a Value, CoreError> {
    map.get(key)
        .ok_or_else(|| CoreError::MalformedRecord(format!("missing `{}`", key)))
}

fn get_u64(map: &Map<String, Value>, key: &str) -> Result<u64, CoreError> {
    get(map, key)?
        .as_u64()
        .ok_or_else(|| CoreError::MalformedRecord(format!("`{}` is not an unsigned integer", key)))
}

fn get_i64(map: &Map<String, Value>, key: &str) -> Result<i64, CoreError> {
    get(map, key)?
        .as_i64()
        .ok_or_else(|| CoreError::MalformedRecord(format!("`{}` is not an integer", key)))
}

fn get_str<'a>(map: &'a Map<String, Value>, key: &str) -> Result<&'a str, CoreError> {
    get(map, key)?
        .as_str()
        .ok_or_else(|| CoreError::MalformedRecord(format!("`{}` is not a string", key)))
}

fn value_f64(value: &Value, key: &str) -> Result<f64, CoreError> {
    match value {
        Value::Null => Ok(f64::NAN),
        Value::Number(n) => n
            .as_f64()
            .ok_or_else(|| CoreError::MalformedRecord(format!("`{}` is out of range", key))),
        _ => Err(CoreError::MalformedRecord(format!("`{}` is not a number", key))),
    }
}

fn get_f64(map: &Map<String, Value>, key: &str) -> Result<f64, CoreError> {
    value_f64(get(map, key)?, key)
}

fn get_votes(map: &Map<String, Value>) -> Result<[f64; VOTE_COUNT], CoreError> {
    let arr = get(map, keys::VOTES)?
        .as_array()
        .ok_or_else(|| CoreError::MalformedRecord("`votes` is not an array".into()))?;
    if arr.len() != VOTE_COUNT {
        return Err(CoreError::MalformedRecord(format!(
            "`votes` has {} entries, expected {}",
            arr.len(),
            VOTE_COUNT
        )));
    }
    let mut votes = [0.0; VOTE_COUNT];
    for (slot, v) in votes.iter_mut().zip(arr) {
        *slot = value_f64(v, keys::VOTES)?;
    }
    Ok(votes)
}

fn get_breakdown(map: &Map<String, Value>) -> Result<BTreeMap<String, f64>, CoreError> {
    let obj = get(map, keys::EFF_BREAKDOWN)?
        .as_object()
        .ok_or_else(|| CoreError::MalformedRecord("`eff_breakdown` is not an object".into()))?;
    obj.iter()
        .map(|(k, v)| Ok((k.clone(), value_f64(v, keys::EFF_BREAKDOWN)?)))
        .collect()
}

fn get_hash(map: &Map<String, Value>, key: &'static str) -> Result<Sha256Hash, CoreError> {
    Sha256Hash::from_hex(get_str(map, key)?)
        .map_err(|source| CoreError::InvalidHex { field: key, source })
}

fn get_opt_hash(
    map: &Map<String, Value>,
    key: &'static str,
) -> Result<Option<Sha256Hash>, CoreError> {
    match get_str(map, key)? {
        "" => Ok(None),
        _ => get_hash(map, key).map(Some),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::BlockBuilder;
    use proptest::prelude::*;

    fn f(v: f64) -> String {
        let mut s = String::new();
        push_f64(&mut s, v);
        s
    }

    fn esc(v: &str) -> String {
        let mut s = String::new();
        push_str(&mut s, v);
        s
    }

    fn sample_block() -> Block {
        BlockBuilder::new(3, Sha256Hash::hash(b"fp"))
            .seed(11)
            .run_id("run-a")
            .fractal_addr("0.1.2")
            .formula("x*\"y\"\n")
            .votes([0.1, 0.2, 0.3, 0.4, 0.5, 0.6, 0.7, 0.8, 0.9, 1.0])
            .eff(0.75)
            .compl(7.0)
            .breakdown("fit", 0.5)
            .breakdown("acc", 0.25)
            .explain("tab\there")
            .salt("s")
            .build()
    }

    #[test]
    fn test_float_formatting_matches_printf_g17() {
        // Expected strings produced by C printf("%.17g")
        assert_eq!(f(0.0), "0");
        assert_eq!(f(-0.0), "-0");
        assert_eq!(f(1.0), "1");
        assert_eq!(f(-2.5), "-2.5");
        assert_eq!(f(0.5), "0.5");
        assert_eq!(f(0.1), "0.10000000000000001");
        assert_eq!(f(123.456), "123.456");
        assert_eq!(f(1e-5), "1.0000000000000001e-05");
        assert_eq!(f(0.0001), "0.0001");
        assert_eq!(f(1e16), "10000000000000000");
        assert_eq!(f(1e17), "1e+17");
        assert_eq!(f(1e20), "1e+20");
        assert_eq!(f(1.5e-300), "1.5000000000000001e-300");
        assert_eq!(f(f64::NAN), "null");
        assert_eq!(f(f64::INFINITY), "null");
    }

    proptest! {
        #[test]
        fn prop_float_text_is_exact(bits in any::<u64>()) {
            let v = f64::from_bits(bits);
            prop_assume!(v.is_finite());
            let back: f64 = f(v).parse().unwrap();
            prop_assert_eq!(back.to_bits(), v.to_bits());
        }
    }

    #[test]
    fn test_string_escaping_table() {
        assert_eq!(esc("plain"), "\"plain\"");
        assert_eq!(esc("a\"b\\c"), "\"a\\\"b\\\\c\"");
        assert_eq!(esc("\n\r\t\u{08}\u{0c}"), "\"\\n\\r\\t\\b\\f\"");
        assert_eq!(esc("\u{01}\u{1f}"), "\"\\u0001\\u001f\"");
        // No escaping for slash, DEL or non-ASCII
        assert_eq!(esc("a/b\u{7f}é∑"), "\"a/b\u{7f}é∑\"");
    }

    #[test]
    fn test_payload_key_order_is_fixed() {
        let payload = canonical_payload(&sample_block());
        let mut last = 0;
        for key in keys::PAYLOAD_ORDER {
            let needle = format!("\"{}\":", key);
            let pos = payload.find(&needle).expect("key present");
            assert!(pos >= last, "{} out of order", key);
            last = pos;
        }
        assert!(!payload.contains(' '));
        assert!(payload.contains("\"eff_breakdown\":{\"acc\":0.25,\"fit\":0.5}"));
    }

    #[test]
    fn test_payload_deterministic() {
        let a = canonical_payload(&sample_block());
        let b = canonical_payload(&sample_block());
        assert_eq!(a, b);
    }

    #[test]
    fn test_record_roundtrip() {
        let record = ChainRecord::seal(sample_block(), Some(Sha256Hash::hash(b"prev")), None);
        let line = encode_record(&record);
        let decoded = decode_record(line.as_bytes()).unwrap();
        assert_eq!(decoded, record);
    }

    #[test]
    fn test_non_finite_values_survive_decode() {
        let mut block = sample_block();
        block.eff = f64::NAN;
        let record = ChainRecord::seal(block, None, None);
        let line = encode_record(&record);
        assert!(line.contains("\"eff\":null"));

        let decoded = decode_record(line.as_bytes()).unwrap();
        assert!(decoded.block.eff.is_nan());
        assert_eq!(encode_record(&decoded), line);
        assert_eq!(decoded.block.compute_hash(), record.hash);
    }

    #[test]
    fn test_decode_rejects_whitespace() {
        let record = ChainRecord::seal(sample_block(), None, None);
        let line = encode_record(&record).replacen(":", ": ", 1);
        assert!(matches!(
            decode_record(line.as_bytes()),
            Err(CoreError::NonCanonical)
        ));
    }

    #[test]
    fn test_decode_rejects_uppercase_hex() {
        let record = ChainRecord::seal(sample_block(), None, None);
        let hex = record.hash.to_hex();
        let line = encode_record(&record).replace(&hex, &hex.to_uppercase());
        assert!(decode_record(line.as_bytes()).is_err());
    }

    #[test]
    fn test_decode_rejects_noncanonical_float() {
        let record = ChainRecord::seal(sample_block(), None, None);
        let line = encode_record(&record).replace("\"eff\":0.75", "\"eff\":0.750");
        assert!(matches!(
            decode_record(line.as_bytes()),
            Err(CoreError::NonCanonical)
        ));
    }

    #[test]
    fn test_decode_rejects_wrong_vote_count() {
        let record = ChainRecord::seal(sample_block(), None, None);
        let line = encode_record(&record).replace(",1],", "],");
        assert!(matches!(
            decode_record(line.as_bytes()),
            Err(CoreError::MalformedRecord(_))
        ));
    }

    #[test]
    fn test_decode_rejects_extra_key() {
        let record = ChainRecord::seal(sample_block(), None, None);
        let line = encode_record(&record).replacen("{", "{\"extra\":1,", 1);
        assert!(decode_record(line.as_bytes()).is_err());
    }

    #[test]
    fn test_tunables_encoding() {
        let t = Tunables {
            decay: 0.9,
            quorum: 0.5,
            temperature: 1.0,
            threshold: 0.25,
            max_complexity: 20,
            seed: 7,
            steps: 100,
        };
        assert_eq!(
            canonical_tunables(&t),
            "{\"decay\":0.90000000000000002,\"quorum\":0.5,\"temperature\":1,\"threshold\":0.25,\"max_complexity\":20,\"seed\":7,\"steps\":100}"
        );
    }
}
