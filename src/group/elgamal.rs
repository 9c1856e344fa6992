//! ElGamal ciphertexts over the deck group, in a plain native (non
//! R1CS-circuit) representation: this crate only ever verifies shuffles and
//! combines reveal shares, it never proves a shuffle itself.

use serde::{Deserialize, Serialize};

use super::{random_scalar, Point, Scalar};

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ElGamalCiphertext {
    #[serde(with = "crate::group::serde_point")]
    pub c1: Point,
    #[serde(with = "crate::group::serde_point")]
    pub c2: Point,
}

impl ElGamalCiphertext {
    pub fn encrypt(pk: &Point, message: &Point, r: &Scalar, g: &Point) -> Self {
        Self {
            c1: *g * r,
            c2: *message + *pk * r,
        }
    }

    pub fn encrypt_random<R: rand::Rng + ?Sized>(
        pk: &Point,
        message: &Point,
        g: &Point,
        rng: &mut R,
    ) -> Self {
        Self::encrypt(pk, message, &random_scalar(rng), g)
    }

    /// Re-randomizes this ciphertext under the same public key, producing a
    /// ciphertext that decrypts to the same plaintext with no visible link
    /// to the randomness used here.
    pub fn rerandomize(&self, pk: &Point, r: &Scalar, g: &Point) -> Self {
        Self {
            c1: self.c1 + *g * r,
            c2: self.c2 + *pk * r,
        }
    }

    /// Decrypt given the full private key (used only in tests and
    /// no-dealer/testing paths, never in the threshold pipeline).
    pub fn decrypt(&self, sk: &Scalar) -> Point {
        self.c2 - self.c1 * sk
    }

    /// Combine this ciphertext's c2 with an already-combined decrypt share
    /// `combined_share = x*c1` to recover the plaintext point.
    pub fn decrypt_with_share(&self, combined_share: &Point) -> Point {
        self.c2 - *combined_share
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::group::card_to_point;
    use ark_ec::PrimeGroup;
    use rand::thread_rng;

    #[test]
    fn encrypt_decrypt_round_trips() {
        let mut rng = thread_rng();
        let g = Point::generator();
        let sk = random_scalar(&mut rng);
        let pk = g * sk;
        let msg = card_to_point(17);
        let ct = ElGamalCiphertext::encrypt_random(&pk, &msg, &g, &mut rng);
        let recovered = ct.decrypt(&sk);
        assert_eq!(recovered, msg);
    }

    #[test]
    fn rerandomize_preserves_plaintext() {
        let mut rng = thread_rng();
        let g = Point::generator();
        let sk = random_scalar(&mut rng);
        let pk = g * sk;
        let msg = card_to_point(3);
        let ct = ElGamalCiphertext::encrypt_random(&pk, &msg, &g, &mut rng);
        let r2 = random_scalar(&mut rng);
        let ct2 = ct.rerandomize(&pk, &r2, &g);
        assert_ne!(ct.c1, ct2.c1);
        assert_eq!(ct2.decrypt(&sk), msg);
    }

    #[test]
    fn decrypt_with_share_matches_full_decrypt() {
        let mut rng = thread_rng();
        let g = Point::generator();
        let sk = random_scalar(&mut rng);
        let pk = g * sk;
        let msg = card_to_point(40);
        let ct = ElGamalCiphertext::encrypt_random(&pk, &msg, &g, &mut rng);
        let share = ct.c1 * sk;
        assert_eq!(ct.decrypt_with_share(&share), msg);
    }
}
