//! Verifiable shuffle — verify only. The core never proves a shuffle; it
//! checks a Groth16 proof attesting that a submitted output deck is an
//! ElGamal re-randomization of the input deck under the same per-hand
//! public key, permuted by some permutation the verifier never learns. The
//! proof's public inputs are one domain-separated scalar per deck
//! position, folding `(input_i, output_i)` together, so verification cost
//! is linear in deck size `N` as spec requires, without this crate ever
//! synthesizing or proving the R1CS relation itself.

use ark_bn254::{Bn254, Fr};
use ark_groth16::{Groth16, PreparedVerifyingKey, Proof, VerifyingKey};
use ark_serialize::CanonicalDeserialize;
use ark_snark::SNARK;
use thiserror::Error;

use crate::config::DOMAIN_SHUFFLE_CARD;
use crate::group::elgamal::ElGamalCiphertext;
use crate::group::{decode_point, encode_point, hash_to_scalar};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ShuffleError {
    #[error("input/output deck length mismatch: {input} vs {output}")]
    LengthMismatch { input: usize, output: usize },
    #[error("shuffle submission is truncated or malformed")]
    MalformedSubmission,
    #[error("shuffle proof failed verification")]
    VerifyFailed,
}

/// `output_deck(N ciphertexts, 64 bytes each) || groth16_proof_bytes`. Decoded
/// here and never stored decoded — only the verified output deck survives
/// past this module, per spec §9's "proofs are opaque byte buffers".
pub fn decode_submission(bytes: &[u8], deck_size: usize) -> Result<(Vec<ElGamalCiphertext>, Vec<u8>), ShuffleError> {
    let deck_bytes_len = deck_size
        .checked_mul(64)
        .ok_or(ShuffleError::MalformedSubmission)?;
    if bytes.len() < deck_bytes_len {
        return Err(ShuffleError::MalformedSubmission);
    }
    let (deck_bytes, proof_bytes) = bytes.split_at(deck_bytes_len);

    let mut output = Vec::with_capacity(deck_size);
    for chunk in deck_bytes.chunks_exact(64) {
        let c1 = decode_point(&chunk[0..32]).map_err(|_| ShuffleError::MalformedSubmission)?;
        let c2 = decode_point(&chunk[32..64]).map_err(|_| ShuffleError::MalformedSubmission)?;
        output.push(ElGamalCiphertext { c1, c2 });
    }
    Ok((output, proof_bytes.to_vec()))
}

/// Deserializes a compressed Groth16 verifying key (provisioned at genesis
/// in `ChainParams::shuffle_vk_bytes`) and prepares it for repeated
/// `verify_shuffle` calls. Preparation is the expensive half of verification
/// (pairing precomputation over the fixed half of the relation); doing it
/// once per process rather than once per submission is why callers hold a
/// `PreparedVerifyingKey` rather than re-preparing on every transaction.
pub fn prepare_vk(vk_bytes: &[u8]) -> Result<PreparedVerifyingKey<Bn254>, ShuffleError> {
    let vk = VerifyingKey::<Bn254>::deserialize_compressed(vk_bytes)
        .map_err(|_| ShuffleError::MalformedSubmission)?;
    Ok(vk.into())
}

fn public_inputs(input: &[ElGamalCiphertext], output: &[ElGamalCiphertext]) -> Vec<Fr> {
    input
        .iter()
        .zip(output.iter())
        .map(|(i, o)| {
            let i1 = encode_point(&i.c1);
            let i2 = encode_point(&i.c2);
            let o1 = encode_point(&o.c1);
            let o2 = encode_point(&o.c2);
            hash_to_scalar(DOMAIN_SHUFFLE_CARD, &[&i1, &i2, &o1, &o2])
        })
        .collect()
}

/// Decodes `submission_bytes` into an output deck + Groth16 proof and
/// verifies that the proof attests a valid re-randomized permutation of
/// `input_deck` toward that output deck under `vk`. Returns the validated
/// output deck on success.
pub fn verify_shuffle(
    vk: &PreparedVerifyingKey<Bn254>,
    input_deck: &[ElGamalCiphertext],
    submission_bytes: &[u8],
) -> Result<Vec<ElGamalCiphertext>, ShuffleError> {
    let (output_deck, proof_bytes) = decode_submission(submission_bytes, input_deck.len())?;
    if input_deck.len() != output_deck.len() {
        return Err(ShuffleError::LengthMismatch {
            input: input_deck.len(),
            output: output_deck.len(),
        });
    }

    let proof = Proof::<Bn254>::deserialize_compressed(&proof_bytes[..])
        .map_err(|_| ShuffleError::MalformedSubmission)?;
    let inputs = public_inputs(input_deck, &output_deck);

    let ok = Groth16::<Bn254>::verify_with_processed_vk(vk, &inputs, &proof)
        .map_err(|_| ShuffleError::VerifyFailed)?;
    if !ok {
        return Err(ShuffleError::VerifyFailed);
    }
    Ok(output_deck)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_submission_rejects_truncated_bytes() {
        let err = decode_submission(&[0u8; 10], 2).unwrap_err();
        assert_eq!(err, ShuffleError::MalformedSubmission);
    }

    #[test]
    fn decode_submission_round_trips_ciphertexts() {
        let ct = ElGamalCiphertext {
            c1: crate::group::card_to_point(3),
            c2: crate::group::card_to_point(9),
        };
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&encode_point(&ct.c1));
        bytes.extend_from_slice(&encode_point(&ct.c2));
        bytes.extend_from_slice(b"fake-proof-bytes");
        let (decoded, proof_bytes) = decode_submission(&bytes, 1).unwrap();
        assert_eq!(decoded.len(), 1);
        assert_eq!(decoded[0], ct);
        assert_eq!(proof_bytes, b"fake-proof-bytes");
    }

    // Constructing a real proving/verifying key pair requires a trusted
    // setup over the shuffle circuit, which is genesis tooling out of this
    // crate's scope (spec §1); end-to-end shuffle-accept/reject behavior is
    // exercised at the dealer::hand layer's fault-path tests instead, which
    // don't require a satisfying proof.
}
