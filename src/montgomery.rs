//! Montgomery-form arithmetic shared by the host and the device contract.
//!
//! The radix is `r = 2^(32 * words_per_number)`, matching the word layout the
//! device works in. Elements travel to the device already in Montgomery form;
//! the host needs the same vocabulary for starting-point generation and for
//! chain replay.

use anyhow::{anyhow, ensure, Result};
use num_bigint::{BigInt, BigUint, Sign};
use num_traits::{One, Zero};

/// Computes `x` with `a * x = 1 (mod modulus)`, or `None` when `a` and
/// `modulus` are not coprime. Iterative extended Euclid; the result is
/// normalized to `[0, modulus)`.
pub fn mod_inverse(a: &BigUint, modulus: &BigUint) -> Option<BigUint> {
    if modulus.is_zero() {
        return None;
    }

    let m = BigInt::from(modulus.clone());
    let mut old_r = BigInt::from(a.clone()) % &m;
    let mut r = m.clone();
    let mut old_s = BigInt::one();
    let mut s = BigInt::zero();

    while !r.is_zero() {
        let quotient = &old_r / &r;
        let next_r = &old_r - &quotient * &r;
        old_r = std::mem::replace(&mut r, next_r);
        let next_s = &old_s - &quotient * &s;
        old_s = std::mem::replace(&mut s, next_s);
    }

    if !old_r.is_one() {
        return None;
    }

    let x = old_s % &m;
    let x = if x.sign() == Sign::Minus { x + &m } else { x };
    x.to_biguint()
}

/// Precomputed constants for Montgomery arithmetic modulo an odd modulus.
#[derive(Debug, Clone)]
pub struct Montgomery {
    modulus: BigUint,
    r_power: usize,
    r_mask: BigUint,
    modulus_prime: BigUint,
}

impl Montgomery {
    /// Derives the constants for `r = 2^(32 * words_per_number)`.
    ///
    /// The modulus must be odd; otherwise it shares a factor with the radix
    /// and `modulus_prime` does not exist.
    pub fn new(modulus: &BigUint, words_per_number: usize) -> Result<Self> {
        ensure!(
            modulus.bit(0),
            "modulus {} is even; Montgomery arithmetic over a power-of-two radix needs an odd modulus",
            modulus
        );

        let r_power = 32 * words_per_number;
        let r = BigUint::one() << r_power;
        let inverse = mod_inverse(modulus, &r)
            .ok_or_else(|| anyhow!("modulus {} has no inverse modulo 2^{}", modulus, r_power))?;
        let modulus_prime = &r - inverse;

        Ok(Montgomery {
            modulus: modulus.clone(),
            r_power,
            r_mask: r - 1u32,
            modulus_prime,
        })
    }

    /// `(x << r_power) mod modulus`, the Montgomery representation of `x`.
    pub fn to_montgomery(&self, x: &BigUint) -> BigUint {
        (x << self.r_power) % &self.modulus
    }

    /// Montgomery reduction: for `t` in the doubled range of a Montgomery
    /// multiply, returns `t * r^-1 mod modulus`, always in `[0, modulus)`.
    pub fn reduce(&self, t: &BigUint) -> BigUint {
        let m = ((t & &self.r_mask) * &self.modulus_prime) & &self.r_mask;
        let mut u = (t + m * &self.modulus) >> self.r_power;
        if u >= self.modulus {
            u -= &self.modulus;
        }
        u
    }

    /// Inverse of [`Montgomery::to_montgomery`].
    pub fn from_montgomery(&self, x: &BigUint) -> BigUint {
        self.reduce(x)
    }

    /// `-modulus^-1 mod r`, normalized to `[0, r)`.
    pub fn modulus_prime(&self) -> &BigUint {
        &self.modulus_prime
    }

    /// Low 32-bit word of `modulus_prime`; the word-serial reduction on the
    /// device only needs this much.
    pub fn modulus_prime_low_word(&self) -> u32 {
        self.modulus_prime.iter_u32_digits().next().unwrap_or(0)
    }

    pub fn modulus(&self) -> &BigUint {
        &self.modulus
    }
}
