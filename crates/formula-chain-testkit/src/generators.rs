//! Proptest generators for property-based testing.

use std::collections::BTreeMap;

use proptest::prelude::*;

use formula_chain_core::{Block, BlockBuilder, Sha256Hash, VOTE_COUNT};

/// Generate a random Sha256Hash.
pub fn sha256_hash() -> impl Strategy<Value = Sha256Hash> {
    any::<[u8; 32]>().prop_map(Sha256Hash::from_bytes)
}

/// Finite floats across many magnitudes, plus signed zero.
pub fn finite_f64() -> impl Strategy<Value = f64> {
    prop_oneof![
        Just(0.0),
        Just(-0.0),
        -1.0e3..1.0e3f64,
        any::<f64>().prop_filter("finite", |v| v.is_finite()),
    ]
}

/// Text with quotes, backslashes, control characters and non-ASCII.
pub fn field_text() -> impl Strategy<Value = String> {
    prop_oneof![
        "[a-z0-9 ()+*^.-]{0,24}".prop_map(String::from),
        any::<String>(),
    ]
}

/// Generate a vote vector.
pub fn votes() -> impl Strategy<Value = [f64; VOTE_COUNT]> {
    prop::array::uniform10(finite_f64())
}

/// Parameters for generating a producer block.
#[derive(Debug, Clone)]
pub struct BlockParams {
    pub step: u64,
    pub seed: u64,
    pub run_id: String,
    pub fractal_addr: String,
    pub formula: String,
    pub votes: [f64; VOTE_COUNT],
    pub eff: f64,
    pub compl: f64,
    pub eff_breakdown: BTreeMap<String, f64>,
    pub explain: String,
    pub salt: String,
    pub fingerprint: Sha256Hash,
}

impl Arbitrary for BlockParams {
    type Parameters = ();
    type Strategy = BoxedStrategy<Self>;

    fn arbitrary_with(_: Self::Parameters) -> Self::Strategy {
        (
            (0u64..10_000, any::<u64>()),
            (field_text(), field_text(), field_text()),
            (votes(), finite_f64(), finite_f64()),
            prop::collection::btree_map("[a-z_]{1,12}", finite_f64(), 0..4),
            (field_text(), "[0-9a-f]{0,16}", sha256_hash()),
        )
            .prop_map(|(ids, text, scores, eff_breakdown, tail)| {
                let (step, seed) = ids;
                let (run_id, fractal_addr, formula) = text;
                let (votes, eff, compl) = scores;
                let (explain, salt, fingerprint) = tail;
                BlockParams {
                    step,
                    seed,
                    run_id,
                    fractal_addr,
                    formula,
                    votes,
                    eff,
                    compl,
                    eff_breakdown,
                    explain,
                    salt,
                    fingerprint,
                }
            })
            .boxed()
    }
}

/// Generate a block from parameters.
pub fn block_from_params(params: &BlockParams) -> Block {
    let mut builder = BlockBuilder::new(params.step, params.fingerprint)
        .seed(params.seed)
        .run_id(params.run_id.clone())
        .fractal_addr(params.fractal_addr.clone())
        .formula(params.formula.clone())
        .votes(params.votes)
        .eff(params.eff)
        .compl(params.compl)
        .explain(params.explain.clone())
        .salt(params.salt.clone());

    for (name, value) in &params.eff_breakdown {
        builder = builder.breakdown(name.clone(), *value);
    }
    builder.build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use formula_chain_core::{
        canonical_payload, decode_record, encode_record, ChainRecord, HmacKey,
    };

    proptest! {
        #[test]
        fn test_payload_deterministic(params: BlockParams) {
            let b1 = block_from_params(&params);
            let b2 = block_from_params(&params);

            prop_assert_eq!(canonical_payload(&b1), canonical_payload(&b2));
            prop_assert_eq!(b1.compute_hash(), b2.compute_hash());
        }

        #[test]
        fn test_sealed_record_decodes_to_itself(
            params in any::<BlockParams>(),
            keyed in any::<bool>(),
        ) {
            let key = keyed.then(|| HmacKey::new(b"k".to_vec()));
            let record = ChainRecord::seal(block_from_params(&params), None, key.as_ref());
            let line = encode_record(&record);

            let decoded = decode_record(line.as_bytes()).unwrap();
            prop_assert_eq!(encode_record(&decoded), line);
            prop_assert_eq!(decoded.hash, record.hash);
        }

        #[test]
        fn test_hash_changes_with_formula(
            params in any::<BlockParams>(),
            other in "[a-z]{1,8}",
        ) {
            prop_assume!(params.formula != other);

            let b1 = block_from_params(&params);
            let mut b2 = b1.clone();
            b2.formula = other;

            prop_assert_ne!(b1.compute_hash(), b2.compute_hash());
        }
    }
}
