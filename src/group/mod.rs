//! Scalar/point primitives shared by the dealer DKG, the hand pipeline, and
//! the shuffle verifier. The group is bn254's G1; every protocol value that
//! needs to travel in a transaction payload is 32 canonical bytes.

pub mod chaum_pedersen;
pub mod elgamal;

use ark_bn254::{Fr, G1Affine, G1Projective};
use ark_ec::{AffineRepr, CurveGroup, PrimeGroup};
use ark_ff::{Field, PrimeField, UniformRand, Zero};
use ark_serialize::{CanonicalDeserialize, CanonicalSerialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

pub type Scalar = Fr;
pub type Point = G1Projective;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum GroupError {
    #[error("point encoding has wrong length: expected {expected}, got {got}")]
    WrongLength { expected: usize, got: usize },
    #[error("point is not a canonical encoding")]
    NonCanonical,
    #[error("point is not in the prime-order subgroup")]
    NotInSubgroup,
}

/// Canonical, fixed-size byte encoding of a group element.
pub fn encode_point(p: &Point) -> [u8; 32] {
    let affine = p.into_affine();
    let mut buf = Vec::with_capacity(32);
    affine
        .serialize_compressed(&mut buf)
        .expect("G1 compressed serialization is infallible for valid points");
    let mut out = [0u8; 32];
    out.copy_from_slice(&buf);
    out
}

/// Decode a canonical 32-byte point, rejecting non-canonical or off-curve
/// encodings and points outside the prime-order subgroup.
pub fn decode_point(bytes: &[u8]) -> Result<Point, GroupError> {
    if bytes.len() != 32 {
        return Err(GroupError::WrongLength {
            expected: 32,
            got: bytes.len(),
        });
    }
    let affine = G1Affine::deserialize_compressed(bytes).map_err(|_| GroupError::NonCanonical)?;
    if !affine.is_on_curve() {
        return Err(GroupError::NonCanonical);
    }
    let point: Point = affine.into();
    if !point.into_affine().is_in_correct_subgroup_assuming_on_curve() {
        return Err(GroupError::NotInSubgroup);
    }
    Ok(point)
}

pub fn encode_scalar(s: &Scalar) -> [u8; 32] {
    let mut buf = Vec::with_capacity(32);
    s.serialize_compressed(&mut buf)
        .expect("scalar serialization is infallible");
    let mut out = [0u8; 32];
    out.copy_from_slice(&buf);
    out
}

pub fn decode_scalar(bytes: &[u8]) -> Result<Scalar, GroupError> {
    if bytes.len() != 32 {
        return Err(GroupError::WrongLength {
            expected: 32,
            got: bytes.len(),
        });
    }
    Scalar::deserialize_compressed(bytes).map_err(|_| GroupError::NonCanonical)
}

/// Constant-time-ish equality over the canonical encoding: compares every
/// byte rather than short-circuiting, so the loop is branch-free in timing
/// even though the accumulator isn't wrapped in a dedicated CT type.
pub fn points_equal(a: &Point, b: &Point) -> bool {
    let ea = encode_point(a);
    let eb = encode_point(b);
    let mut diff = 0u8;
    for (x, y) in ea.iter().zip(eb.iter()) {
        diff |= x ^ y;
    }
    diff == 0
}

pub fn is_identity(p: &Point) -> bool {
    p.into_affine().is_zero()
}

pub fn identity() -> Point {
    Point::zero()
}

/// `scalar * G`, the generator base point.
pub fn generator_mul(scalar: &Scalar) -> Point {
    Point::generator() * scalar
}

pub fn generator() -> Point {
    Point::generator()
}

/// Domain-separated hash-to-scalar: `SHA-256(domain || 0x00 || fields... ||
/// counter)` reduced mod the scalar field order, retrying with an
/// incrementing one-byte counter to avoid the zero scalar.
pub fn hash_to_scalar(domain: &str, fields: &[&[u8]]) -> Scalar {
    for counter in 0u8..=255 {
        let mut hasher = Sha256::new();
        hasher.update(domain.as_bytes());
        hasher.update([0u8]);
        for field in fields {
            hasher.update((field.len() as u32).to_be_bytes());
            hasher.update(field);
        }
        hasher.update([counter]);
        let digest = hasher.finalize();
        let scalar = Scalar::from_le_bytes_mod_order(&digest);
        if !scalar.is_zero() {
            return scalar;
        }
    }
    unreachable!("256 consecutive zero reductions is cryptographically impossible")
}

/// Card id `c` maps to the group element `(c+1)*G`.
pub fn card_to_point(card: u8) -> Point {
    Point::generator() * Scalar::from((card as u64) + 1)
}

/// Recover a card id from its group-element encoding by linear search over
/// `0..deck_size`. O(deck_size); fine for 52 cards.
pub fn point_to_card(point: &Point, deck_size: u8) -> Option<u8> {
    for c in 0..deck_size {
        if points_equal(point, &card_to_point(c)) {
            return Some(c);
        }
    }
    None
}

/// Lagrange coefficients at zero for a set of distinct member indices, used
/// to combine threshold decrypt-shares and to compute per-member public
/// shares in the DKG.
pub fn lagrange_at_zero(indices: &[u32]) -> Vec<Scalar> {
    let xs: Vec<Scalar> = indices.iter().map(|i| Scalar::from(*i as u64)).collect();
    xs.iter()
        .enumerate()
        .map(|(k, &x_k)| {
            let mut num = Scalar::from(1u64);
            let mut den = Scalar::from(1u64);
            for (j, &x_j) in xs.iter().enumerate() {
                if j == k {
                    continue;
                }
                num *= -x_j;
                den *= x_k - x_j;
            }
            num * den.inverse().expect("member indices must be distinct")
        })
        .collect()
}

/// `Σ_k λ_k · points[k] == f(0)·G` when `points[k] = f(i_k)·G`.
pub fn lagrange_combine_points(indices: &[u32], points: &[Point]) -> Point {
    assert_eq!(indices.len(), points.len());
    let coeffs = lagrange_at_zero(indices);
    coeffs
        .iter()
        .zip(points.iter())
        .fold(Point::zero(), |acc, (c, p)| acc + *p * c)
}

pub fn random_scalar<R: rand::Rng + ?Sized>(rng: &mut R) -> Scalar {
    Scalar::rand(rng)
}

/// Serde helpers encoding a group element as a 0x-prefixed hex string.
pub mod serde_point {
    use super::{decode_point, encode_point, Point};
    use serde::{de::Error as DeError, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Point, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format!("0x{}", hex::encode(encode_point(value))))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Point, D::Error> {
        let s = String::deserialize(deserializer)?;
        let hex_str = s.strip_prefix("0x").unwrap_or(&s);
        let bytes = hex::decode(hex_str).map_err(DeError::custom)?;
        decode_point(&bytes).map_err(DeError::custom)
    }
}

pub mod serde_scalar {
    use super::{decode_scalar, encode_scalar, Scalar};
    use serde::{de::Error as DeError, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Scalar, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format!("0x{}", hex::encode(encode_scalar(value))))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Scalar, D::Error> {
        let s = String::deserialize(deserializer)?;
        let hex_str = s.strip_prefix("0x").unwrap_or(&s);
        let bytes = hex::decode(hex_str).map_err(DeError::custom)?;
        decode_scalar(&bytes).map_err(DeError::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn point_round_trips_through_canonical_bytes() {
        let p = Point::generator() * Scalar::from(7u64);
        let bytes = encode_point(&p);
        let decoded = decode_point(&bytes).expect("valid encoding must decode");
        assert!(points_equal(&p, &decoded));
    }

    #[test]
    fn rejects_wrong_length() {
        let err = decode_point(&[0u8; 31]).unwrap_err();
        assert_eq!(
            err,
            GroupError::WrongLength {
                expected: 32,
                got: 31
            }
        );
    }

    #[test]
    fn hash_to_scalar_is_deterministic_and_nonzero() {
        let a = hash_to_scalar("ocp/v1/test", &[b"hello"]);
        let b = hash_to_scalar("ocp/v1/test", &[b"hello"]);
        assert_eq!(a, b);
        assert!(!a.is_zero());
        let c = hash_to_scalar("ocp/v1/test", &[b"world"]);
        assert_ne!(a, c);
    }

    #[test]
    fn card_point_round_trips() {
        for c in 0..52u8 {
            let p = card_to_point(c);
            assert_eq!(point_to_card(&p, 52), Some(c));
        }
    }

    #[test]
    fn lagrange_recovers_constant_polynomial_at_zero() {
        // f(x) = 5 (degree 0): any single point recovers f(0) = 5.
        let f0 = Scalar::from(5u64);
        let points = vec![Point::generator() * f0];
        let combined = lagrange_combine_points(&[1], &points);
        assert!(points_equal(&combined, &(Point::generator() * f0)));
    }

    #[test]
    fn lagrange_recovers_linear_polynomial_at_zero() {
        // f(x) = 3 + 2x. f(1) = 5, f(2) = 7. Recover f(0) = 3 from two shares.
        let f = |x: u64| Scalar::from(3u64) + Scalar::from(2u64) * Scalar::from(x);
        let points = vec![Point::generator() * f(1), Point::generator() * f(2)];
        let combined = lagrange_combine_points(&[1, 2], &points);
        assert!(points_equal(&combined, &(Point::generator() * f(0))));
    }
}
