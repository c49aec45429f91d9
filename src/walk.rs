//! The pseudorandom walk and the linear algebra it drags along.
//!
//! Every point the walk visits carries a representation `(a, b)` with
//! `point = generator^a * element^b` (up to Montgomery form). Two different
//! representations of the same point solve the instance, so the walk's only
//! job is to shuffle points around the group while keeping `(a, b)` honest.
//!
//! The device evaluates the same map in bulk. Points live in Montgomery
//! form on both sides; multiplying a Montgomery-form point by a plain-form
//! constant yields the Montgomery form of the product, which is why the host
//! multiplies by the plain generator/element while the device multiplies by
//! their Montgomery forms under a Montgomery reduce. The step values agree
//! bit for bit; any divergence here would silently corrupt every collision,
//! so the two evaluators must never be changed independently.

use crate::instance::DlpInstance;
use crate::montgomery::Montgomery;
use crate::words;
use anyhow::{bail, Result};
use num_bigint::BigUint;

/// Exponent pair `(a, b)` with `point = generator^a * element^b (mod modulus)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Representation {
    pub a: BigUint,
    pub b: BigUint,
}

/// Host-side evaluator of the walk: single steps, chain replay, and the
/// collision solve rule.
#[derive(Debug, Clone)]
pub struct Walk {
    modulus: BigUint,
    order: BigUint,
    generator: BigUint,
    element: BigUint,
    montgomery: Montgomery,
}

impl Walk {
    pub fn new(instance: &DlpInstance) -> Result<Self> {
        let words_per_number = words::words_per_number(&instance.modulus);
        let montgomery = Montgomery::new(&instance.modulus, words_per_number)?;
        Ok(Walk {
            modulus: instance.modulus.clone(),
            order: instance.order.clone(),
            generator: instance.generator.clone(),
            element: instance.element.clone(),
            montgomery,
        })
    }

    pub fn order(&self) -> &BigUint {
        &self.order
    }

    pub fn montgomery(&self) -> &Montgomery {
        &self.montgomery
    }

    /// Montgomery-form point for a representation:
    /// `to_montgomery(generator^a * element^b mod modulus)`.
    pub fn point_for(&self, rep: &Representation) -> BigUint {
        let plain = (self.generator.modpow(&rep.a, &self.modulus)
            * self.element.modpow(&rep.b, &self.modulus))
            % &self.modulus;
        self.montgomery.to_montgomery(&plain)
    }

    /// One step of the walk. The partition is the low 32-bit word of the
    /// point taken mod 3, which is exactly what the device computes.
    pub fn step(&self, point: &BigUint, rep: &Representation) -> (BigUint, Representation) {
        let low_word = point.iter_u32_digits().next().unwrap_or(0);
        match low_word % 3 {
            0 => (
                (point * &self.generator) % &self.modulus,
                Representation {
                    a: (&rep.a + 1u32) % &self.order,
                    b: rep.b.clone(),
                },
            ),
            1 => (
                (point * &self.element) % &self.modulus,
                Representation {
                    a: rep.a.clone(),
                    b: (&rep.b + 1u32) % &self.order,
                },
            ),
            _ => (
                self.montgomery.reduce(&(point * point)),
                Representation {
                    a: (&rep.a * 2u32) % &self.order,
                    b: (&rep.b * 2u32) % &self.order,
                },
            ),
        }
    }

    /// Replays the chain from `start` until it reaches `target`, returning
    /// the representation accumulated along the way.
    ///
    /// The device only reports chain endpoints; interior states are
    /// reconstructed here by deterministic re-simulation. `cap` bounds the
    /// replay: a genuine distinguished point is reached within the
    /// chain-length limit, so running past the cap means the two evaluators
    /// disagree and the result would be garbage.
    pub fn replay(
        &self,
        start: &BigUint,
        rep: &Representation,
        target: &BigUint,
        cap: u64,
    ) -> Result<Representation> {
        let mut point = start.clone();
        let mut rep = rep.clone();
        let mut steps = 0u64;
        while point != *target {
            if steps >= cap {
                bail!("chain replay did not reach its endpoint within {cap} steps");
            }
            let (next_point, next_rep) = self.step(&point, &rep);
            point = next_point;
            rep = next_rep;
            steps += 1;
        }
        Ok(rep)
    }

    /// Solve rule: two representations of the same point yield
    /// `x = (a1 - a2) * (b2 - b1)^(order - 2) mod order`.
    ///
    /// Returns `None` when `b1 == b2`; the difference is then not a unit and
    /// the pair carries no equation. The Fermat inverse is valid because the
    /// order is prime.
    pub fn solve(&self, rep1: &Representation, rep2: &Representation) -> Option<BigUint> {
        let a1 = &rep1.a % &self.order;
        let a2 = &rep2.a % &self.order;
        let b1 = &rep1.b % &self.order;
        let b2 = &rep2.b % &self.order;
        if b1 == b2 {
            return None;
        }

        let a_diff = (a1 + &self.order - a2) % &self.order;
        let b_diff = (b2 + &self.order - b1) % &self.order;
        let exponent = &self.order - 2u32;
        let inverse = b_diff.modpow(&exponent, &self.order);
        Some(a_diff * inverse % &self.order)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn big(n: u64) -> BigUint {
        BigUint::from(n)
    }

    /// modulus 23, generator 2 of prime order 11, element 2^7 = 13.
    fn instance() -> DlpInstance {
        DlpInstance::new(big(23), big(2), big(11), big(13))
    }

    #[test]
    fn representation_invariant_holds_along_the_walk() {
        let walk = Walk::new(&instance()).unwrap();
        let mut rep = Representation {
            a: big(3),
            b: big(5),
        };
        let mut point = walk.point_for(&rep);
        let mut partitions_seen = [false; 3];

        for _ in 0..200 {
            partitions_seen[(point.iter_u32_digits().next().unwrap_or(0) % 3) as usize] = true;
            let (next_point, next_rep) = walk.step(&point, &rep);
            point = next_point;
            rep = next_rep;
            assert_eq!(point, walk.point_for(&rep));
        }

        // 200 steps over a 23-element field hit all three branches.
        assert_eq!(partitions_seen, [true; 3]);
    }

    #[test]
    fn solve_recovers_the_exponent() {
        let walk = Walk::new(&instance()).unwrap();
        // x = 7. Two representations of the same point:
        // (a, b) and (a + x*t mod 11, b - t mod 11) for any t != 0.
        let rep1 = Representation {
            a: big(3),
            b: big(5),
        };
        let rep2 = Representation {
            a: (big(3) + big(7) * big(4)) % big(11),
            b: (big(5) + big(11) - big(4)) % big(11),
        };
        assert_eq!(walk.point_for(&rep1), walk.point_for(&rep2));

        let x = walk.solve(&rep1, &rep2).unwrap();
        assert_eq!(x, big(7));
        assert_eq!(big(2).modpow(&x, &big(23)), big(13));
    }

    #[test]
    fn solve_is_symmetric_in_its_arguments() {
        let walk = Walk::new(&instance()).unwrap();
        let rep1 = Representation {
            a: big(9),
            b: big(2),
        };
        let rep2 = Representation {
            a: (big(9) + big(7) * big(6)) % big(11),
            b: (big(2) + big(11) - big(6)) % big(11),
        };
        assert_eq!(walk.point_for(&rep1), walk.point_for(&rep2));

        let forward = walk.solve(&rep1, &rep2);
        let swapped = walk.solve(&rep2, &rep1);
        assert_eq!(forward, swapped);
        assert_eq!(forward, Some(big(7)));
    }

    #[test]
    fn solve_rejects_equal_b() {
        let walk = Walk::new(&instance()).unwrap();
        let rep1 = Representation {
            a: big(4),
            b: big(6),
        };
        let rep2 = Representation {
            a: big(8),
            b: big(6),
        };
        assert_eq!(walk.solve(&rep1, &rep2), None);
    }

    #[test]
    fn replay_reaches_a_forward_state() {
        let walk = Walk::new(&instance()).unwrap();
        let rep = Representation {
            a: big(1),
            b: big(0),
        };
        let start = walk.point_for(&rep);

        let mut point = start.clone();
        let mut ahead = rep.clone();
        for _ in 0..10 {
            let (next_point, next_rep) = walk.step(&point, &ahead);
            point = next_point;
            ahead = next_rep;
        }

        let replayed = walk.replay(&start, &rep, &point, 64).unwrap();
        assert_eq!(replayed, ahead);
    }

    #[test]
    fn replay_fails_past_its_cap() {
        let walk = Walk::new(&instance()).unwrap();
        let rep = Representation {
            a: big(1),
            b: big(0),
        };
        let start = walk.point_for(&rep);
        // 24 is not a group element, so the chain can never reach it.
        assert!(walk.replay(&start, &rep, &big(24), 100).is_err());
    }
}
