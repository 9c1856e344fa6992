//! Chaum-Pedersen equality-of-discrete-log proof and the encrypted-share
//! proof used when a committee member hands a player their hole card.
//!
//! Both proofs are made non-interactive with a SHA-256 Fiat-Shamir
//! transcript rather than the arkworks Poseidon sponge, matching the rest of
//! this crate's preference for SHA-256 at every hash boundary.

use rand::Rng;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::{decode_point, encode_point, points_equal, random_scalar, GroupError, Point, Scalar};

fn challenge(domain: &str, points: &[&Point]) -> Scalar {
    let mut hasher = Sha256::new();
    hasher.update(domain.as_bytes());
    hasher.update([0u8]);
    for p in points {
        hasher.update(encode_point(p));
    }
    let digest = hasher.finalize();
    let mut wide = [0u8; 32];
    wide.copy_from_slice(&digest);
    // Reduce into the scalar field; a 32-byte SHA-256 digest is effectively
    // uniform there is no retry-for-zero requirement for a Fiat-Shamir
    // challenge (unlike hash_to_scalar, a zero challenge is merely unlucky,
    // not unsound, but it would make the proof trivially invalid, so no
    // special-casing is needed).
    ark_ff::PrimeField::from_le_bytes_mod_order(&wide)
}

/// Proves `Y = x*G ∧ S = x*C1` without revealing `x`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ChaumPedersenProof {
    #[serde(with = "crate::group::serde_point")]
    pub a: Point,
    #[serde(with = "crate::group::serde_point")]
    pub b: Point,
    #[serde(with = "crate::group::serde_scalar")]
    pub z: Scalar,
}

const CP_DOMAIN: &str = "ocp/v1/chaum_pedersen";

pub fn prove<R: Rng + ?Sized>(
    rng: &mut R,
    x: &Scalar,
    g: &Point,
    c1: &Point,
    y: &Point,
    s: &Point,
) -> ChaumPedersenProof {
    let w = random_scalar(rng);
    let a = *g * w;
    let b = *c1 * w;
    let c = challenge(CP_DOMAIN, &[y, c1, s, &a, &b]);
    let z = w + c * x;
    ChaumPedersenProof { a, b, z }
}

pub fn verify(
    proof: &ChaumPedersenProof,
    g: &Point,
    c1: &Point,
    y: &Point,
    s: &Point,
) -> bool {
    let c = challenge(CP_DOMAIN, &[y, c1, s, &proof.a, &proof.b]);
    let lhs_g = *g * proof.z;
    let rhs_g = proof.a + *y * c;
    let lhs_c1 = *c1 * proof.z;
    let rhs_c1 = proof.b + *s * c;
    points_equal(&lhs_g, &rhs_g) && points_equal(&lhs_c1, &rhs_c1)
}

impl ChaumPedersenProof {
    /// 2 commitment points + 1 response scalar, 32 bytes each.
    pub const BYTE_LEN: usize = 96;

    pub fn to_bytes(&self) -> [u8; Self::BYTE_LEN] {
        let mut out = [0u8; Self::BYTE_LEN];
        out[0..32].copy_from_slice(&encode_point(&self.a));
        out[32..64].copy_from_slice(&encode_point(&self.b));
        out[64..96].copy_from_slice(&super::encode_scalar(&self.z));
        out
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, GroupError> {
        if bytes.len() != Self::BYTE_LEN {
            return Err(GroupError::WrongLength {
                expected: Self::BYTE_LEN,
                got: bytes.len(),
            });
        }
        Ok(Self {
            a: decode_point(&bytes[0..32])?,
            b: decode_point(&bytes[32..64])?,
            z: super::decode_scalar(&bytes[64..96])?,
        })
    }
}

/// Encrypted-share proof (160 bytes on the wire): proves that `(U, V) =
/// (r*G, S + r*PK_player)` for `S = x*C1` with `Y = x*G`, i.e. a verifier-
/// blind re-encryption of a decrypt share toward a player's public key.
///
/// The verification equation only ever uses `B + D` together (never `B` or
/// `D` alone), so the proof carries their sum `t = B + D` instead of both
/// points — 3 commitment points + 2 response scalars, 32 bytes each.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EncryptedShareProof {
    #[serde(with = "crate::group::serde_point")]
    pub a: Point,
    #[serde(with = "crate::group::serde_point")]
    pub c: Point,
    #[serde(with = "crate::group::serde_point")]
    pub t: Point,
    #[serde(with = "crate::group::serde_scalar")]
    pub zx: Scalar,
    #[serde(with = "crate::group::serde_scalar")]
    pub zr: Scalar,
}

impl EncryptedShareProof {
    pub const BYTE_LEN: usize = 160;

    pub fn to_bytes(&self) -> [u8; Self::BYTE_LEN] {
        let mut out = [0u8; Self::BYTE_LEN];
        out[0..32].copy_from_slice(&encode_point(&self.a));
        out[32..64].copy_from_slice(&encode_point(&self.c));
        out[64..96].copy_from_slice(&encode_point(&self.t));
        out[96..128].copy_from_slice(&super::encode_scalar(&self.zx));
        out[128..160].copy_from_slice(&super::encode_scalar(&self.zr));
        out
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, GroupError> {
        if bytes.len() != Self::BYTE_LEN {
            return Err(GroupError::WrongLength {
                expected: Self::BYTE_LEN,
                got: bytes.len(),
            });
        }
        Ok(Self {
            a: decode_point(&bytes[0..32])?,
            c: decode_point(&bytes[32..64])?,
            t: decode_point(&bytes[64..96])?,
            zx: super::decode_scalar(&bytes[96..128])?,
            zr: super::decode_scalar(&bytes[128..160])?,
        })
    }
}

const ENC_SHARE_DOMAIN: &str = "ocp/v1/encrypted_share";

#[allow(clippy::too_many_arguments)]
pub fn prove_encrypted_share<R: Rng + ?Sized>(
    rng: &mut R,
    x: &Scalar,
    r: &Scalar,
    g: &Point,
    c1: &Point,
    pk_player: &Point,
    y: &Point,
    u: &Point,
    v: &Point,
) -> EncryptedShareProof {
    let wx = random_scalar(rng);
    let wr = random_scalar(rng);
    let a = *g * wx;
    let c = *g * wr;
    let t = *c1 * wx + *pk_player * wr;
    let chal = challenge(ENC_SHARE_DOMAIN, &[y, c1, pk_player, u, v, &a, &c, &t]);
    EncryptedShareProof {
        a,
        c,
        t,
        zx: wx + chal * x,
        zr: wr + chal * r,
    }
}

/// Verifies the proof without ever learning the decrypt share `S = x*C1`:
/// the two checks below are linear in the two responses `(zx, zr)` and
/// combine to confirm `V = x*C1 + r*PK_player` against the public `U = r*G`
/// and `Y = x*G`, so a verifier who only sees `(U, V)` — never `S` itself —
/// can still confirm the re-encryption is correct. This is what lets the
/// chain check the hand-off without learning the hole card.
pub fn verify_encrypted_share(
    proof: &EncryptedShareProof,
    g: &Point,
    c1: &Point,
    pk_player: &Point,
    y: &Point,
    u: &Point,
    v: &Point,
) -> bool {
    let chal = challenge(
        ENC_SHARE_DOMAIN,
        &[y, c1, pk_player, u, v, &proof.a, &proof.c, &proof.t],
    );
    let check_y = points_equal(&(*g * proof.zx), &(proof.a + *y * chal));
    let check_u = points_equal(&(*g * proof.zr), &(proof.c + *u * chal));
    let lhs = *c1 * proof.zx + *pk_player * proof.zr;
    let rhs = proof.t + *v * chal;
    check_y && check_u && points_equal(&lhs, &rhs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::group::{random_scalar, Scalar};
    use ark_ec::PrimeGroup;
    use rand::thread_rng;

    #[test]
    fn chaum_pedersen_round_trips() {
        let mut rng = thread_rng();
        let g = Point::generator();
        let c1 = Point::generator() * Scalar::from(9u64);
        let x = random_scalar(&mut rng);
        let y = g * x;
        let s = c1 * x;
        let proof = prove(&mut rng, &x, &g, &c1, &y, &s);
        assert!(verify(&proof, &g, &c1, &y, &s));
    }

    #[test]
    fn chaum_pedersen_rejects_wrong_statement() {
        let mut rng = thread_rng();
        let g = Point::generator();
        let c1 = Point::generator() * Scalar::from(9u64);
        let x = random_scalar(&mut rng);
        let y = g * x;
        let wrong_s = c1 * random_scalar(&mut rng);
        let proof = prove(&mut rng, &x, &g, &c1, &y, &(c1 * x));
        assert!(!verify(&proof, &g, &c1, &y, &wrong_s));
    }

    #[test]
    fn encrypted_share_round_trips() {
        let mut rng = thread_rng();
        let g = Point::generator();
        let c1 = Point::generator() * Scalar::from(3u64);
        let x = random_scalar(&mut rng);
        let y = g * x;
        let s = c1 * x;
        let r = random_scalar(&mut rng);
        let pk_player = g * random_scalar(&mut rng);
        let u = g * r;
        let v = s + pk_player * r;
        let proof = prove_encrypted_share(&mut rng, &x, &r, &g, &c1, &pk_player, &y, &u, &v);
        assert!(verify_encrypted_share(&proof, &g, &c1, &pk_player, &y, &u, &v));
        assert_eq!(proof.to_bytes().len(), EncryptedShareProof::BYTE_LEN);
    }

    #[test]
    fn encrypted_share_rejects_tampered_v() {
        let mut rng = thread_rng();
        let g = Point::generator();
        let c1 = Point::generator() * Scalar::from(3u64);
        let x = random_scalar(&mut rng);
        let y = g * x;
        let s = c1 * x;
        let r = random_scalar(&mut rng);
        let pk_player = g * random_scalar(&mut rng);
        let u = g * r;
        let v = s + pk_player * r;
        let proof = prove_encrypted_share(&mut rng, &x, &r, &g, &c1, &pk_player, &y, &u, &v);
        let tampered_v = v + g;
        assert!(!verify_encrypted_share(&proof, &g, &c1, &pk_player, &y, &u, &tampered_v));
    }
}
