//! Canonical sign-bytes, nonce replay protection, and account/validator key
//! registration. Built in the style of a `Signable` / `TranscriptBuilder`
//! pattern, but frozen to an exact byte layout: `DOMAIN || 0x00 || type ||
//! 0x00 || nonce || 0x00 || signer || 0x00 || SHA-256(value)`.

use std::collections::{BTreeMap, BTreeSet};

use ed25519_dalek::{Signature, Verifier, VerifyingKey};
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::config::DOMAIN_TX;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AuthError {
    #[error("nonce is not a valid decimal u64")]
    NonNumericNonce,
    #[error("signature is malformed")]
    MalformedSignature,
    #[error("public key is malformed")]
    MalformedPublicKey,
    #[error("signature does not verify")]
    BadSignature,
    #[error("signer has no registered public key")]
    UnknownSigner,
    #[error("nonce {nonce} already used by signer {signer}")]
    ReplayedNonce { signer: String, nonce: u64 },
    #[error("signer attempted to rotate their registered key")]
    KeyRotationAttempted,
}

/// Builds the canonical sign-bytes for one transaction.
///
/// `value` is the already-encoded opaque payload bytes; this function hashes
/// it exactly once under SHA-256 before folding it into the outer
/// transcript.
pub fn sign_bytes(tx_type: &str, nonce: &str, signer: &str, value: &[u8]) -> Vec<u8> {
    let value_hash = Sha256::digest(value);
    let mut out = Vec::with_capacity(
        DOMAIN_TX.len() + 1 + tx_type.len() + 1 + nonce.len() + 1 + signer.len() + 1 + 32,
    );
    out.extend_from_slice(DOMAIN_TX.as_bytes());
    out.push(0);
    out.extend_from_slice(tx_type.as_bytes());
    out.push(0);
    out.extend_from_slice(nonce.as_bytes());
    out.push(0);
    out.extend_from_slice(signer.as_bytes());
    out.push(0);
    out.extend_from_slice(&value_hash);
    out
}

/// Parses the decimal-string nonce, rejecting anything non-numeric
/// (leading zeros, signs, or whitespace all reject under `str::parse`).
pub fn parse_nonce(nonce: &str) -> Result<u64, AuthError> {
    nonce.parse::<u64>().map_err(|_| AuthError::NonNumericNonce)
}

pub fn decode_verifying_key(bytes: &[u8]) -> Result<VerifyingKey, AuthError> {
    let arr: [u8; 32] = bytes.try_into().map_err(|_| AuthError::MalformedPublicKey)?;
    VerifyingKey::from_bytes(&arr).map_err(|_| AuthError::MalformedPublicKey)
}

pub fn decode_signature(bytes: &[u8]) -> Result<Signature, AuthError> {
    let arr: [u8; 64] = bytes.try_into().map_err(|_| AuthError::MalformedSignature)?;
    Ok(Signature::from_bytes(&arr))
}

pub fn verify_signature(
    pubkey: &VerifyingKey,
    message: &[u8],
    sig: &Signature,
) -> Result<(), AuthError> {
    pubkey
        .verify(message, sig)
        .map_err(|_| AuthError::BadSignature)
}

/// Per-signer, per-nonce replay table. Backed by a `BTreeSet` so any future
/// state-hash projection over it iterates deterministically.
#[derive(Clone, Debug, Default)]
pub struct NonceTable {
    seen: BTreeSet<(String, u64)>,
}

impl NonceTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `(signer, nonce)`, failing if it was already recorded.
    pub fn check_and_record(&mut self, signer: &str, nonce: u64) -> Result<(), AuthError> {
        let key = (signer.to_string(), nonce);
        if self.seen.contains(&key) {
            return Err(AuthError::ReplayedNonce {
                signer: signer.to_string(),
                nonce,
            });
        }
        self.seen.insert(key);
        Ok(())
    }
}

/// Registered account/validator public keys. First use installs a key;
/// rotation is rejected — registration is idempotent, not mutable.
#[derive(Clone, Debug, Default)]
pub struct KeyRegistry {
    keys: BTreeMap<String, [u8; 32]>,
}

impl KeyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, signer: &str) -> Option<&[u8; 32]> {
        self.keys.get(signer)
    }

    /// Installs `pubkey` for `signer` if unset; if already set, succeeds
    /// silently when the bytes match and fails on any difference.
    pub fn register(&mut self, signer: &str, pubkey: [u8; 32]) -> Result<(), AuthError> {
        match self.keys.get(signer) {
            None => {
                self.keys.insert(signer.to_string(), pubkey);
                Ok(())
            }
            Some(existing) if *existing == pubkey => Ok(()),
            Some(_) => Err(AuthError::KeyRotationAttempted),
        }
    }

    pub fn iter_sorted(&self) -> impl Iterator<Item = (&String, &[u8; 32])> {
        self.keys.iter()
    }
}

/// Full authentication check for an incoming transaction envelope: parses
/// the nonce, looks up the signer's registered key, recomputes sign-bytes,
/// verifies the Ed25519 signature, then records the nonce. Returns the
/// parsed nonce on success so callers don't need to re-parse it.
pub fn authenticate(
    registry: &KeyRegistry,
    nonces: &mut NonceTable,
    tx_type: &str,
    nonce_str: &str,
    signer: &str,
    value: &[u8],
    sig_bytes: &[u8],
) -> Result<u64, AuthError> {
    let pubkey_bytes = registry.get(signer).ok_or(AuthError::UnknownSigner)?;
    authenticate_with_key(nonces, tx_type, nonce_str, signer, value, sig_bytes, pubkey_bytes)
}

/// Same check as [`authenticate`] but against an explicitly supplied
/// candidate public key rather than one already on file in a
/// [`KeyRegistry`]. Used by the self-attested registration transactions
/// (`auth/register_account`, `staking/register_validator`), which must
/// prove ownership of the key they are proposing to register before that
/// key exists anywhere in the registry — there is no prior entry to look
/// up yet.
pub fn authenticate_with_key(
    nonces: &mut NonceTable,
    tx_type: &str,
    nonce_str: &str,
    signer: &str,
    value: &[u8],
    sig_bytes: &[u8],
    pubkey_bytes: &[u8; 32],
) -> Result<u64, AuthError> {
    let nonce = parse_nonce(nonce_str)?;
    let pubkey = decode_verifying_key(pubkey_bytes)?;
    let sig = decode_signature(sig_bytes)?;
    let message = sign_bytes(tx_type, nonce_str, signer, value);
    verify_signature(&pubkey, &message, &sig)?;
    nonces.check_and_record(signer, nonce)?;
    Ok(nonce)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ed25519_dalek::{Signer, SigningKey};
    use rand::rngs::OsRng;

    #[test]
    fn sign_bytes_layout_matches_spec() {
        let bytes = sign_bytes("poker/act", "7", "alice", b"payload");
        let expected_hash = Sha256::digest(b"payload");
        let mut expected = Vec::new();
        expected.extend_from_slice(b"ocp/tx/v0");
        expected.push(0);
        expected.extend_from_slice(b"poker/act");
        expected.push(0);
        expected.extend_from_slice(b"7");
        expected.push(0);
        expected.extend_from_slice(b"alice");
        expected.push(0);
        expected.extend_from_slice(&expected_hash);
        assert_eq!(bytes, expected);
    }

    #[test]
    fn nonce_parsing_rejects_non_numeric() {
        assert!(parse_nonce("7").is_ok());
        assert!(parse_nonce("-7").is_err());
        assert!(parse_nonce("7a").is_err());
        assert!(parse_nonce("").is_err());
    }

    #[test]
    fn end_to_end_authentication_round_trips() {
        let mut csprng = OsRng;
        let signing_key = SigningKey::generate(&mut csprng);
        let verifying_key = signing_key.verifying_key();

        let mut registry = KeyRegistry::new();
        registry
            .register("alice", verifying_key.to_bytes())
            .unwrap();
        let mut nonces = NonceTable::new();

        let value = b"{\"to\":\"bob\",\"amount\":5}";
        let message = sign_bytes("bank/send", "1", "alice", value);
        let sig = signing_key.sign(&message);

        let nonce = authenticate(
            &registry,
            &mut nonces,
            "bank/send",
            "1",
            "alice",
            value,
            &sig.to_bytes(),
        )
        .unwrap();
        assert_eq!(nonce, 1);

        let replay = authenticate(
            &registry,
            &mut nonces,
            "bank/send",
            "1",
            "alice",
            value,
            &sig.to_bytes(),
        );
        assert_eq!(
            replay,
            Err(AuthError::ReplayedNonce {
                signer: "alice".to_string(),
                nonce: 1
            })
        );
    }

    #[test]
    fn key_rotation_is_rejected() {
        let mut registry = KeyRegistry::new();
        registry.register("alice", [1u8; 32]).unwrap();
        assert!(registry.register("alice", [1u8; 32]).is_ok());
        assert_eq!(
            registry.register("alice", [2u8; 32]),
            Err(AuthError::KeyRotationAttempted)
        );
    }
}
