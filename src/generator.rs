//! Starting-point generation and the self-collision shortcut.
//!
//! Every chain the device runs begins at a point drawn here. The generator
//! keeps two things: the mapping from each point value to the `(a, b)` pair
//! it was built from (consulted again much later when chains are replayed),
//! and a host-side pool of encoded points ready to be shipped to the device.
//!
//! Drawing is where the search can end before it begins: two draws landing
//! on the same value with different `b` already form a collision, and the
//! solve rule applies immediately.

use crate::walk::{Representation, Walk};
use crate::words;
use anyhow::{ensure, Context, Result};
use log::{debug, info};
use num_bigint::{BigUint, RandBigInt};
use rand::RngCore;
use std::collections::hash_map::Entry;
use std::collections::HashMap;

/// Outcome of drawing a batch of fresh starting points.
pub enum Batch<T> {
    Points(T),
    /// A self-collision among the draws solved the instance outright.
    Solved(BigUint),
}

pub struct StartingPointGenerator {
    points: HashMap<BigUint, Representation>,
    pool: Vec<u32>,
    pool_points: usize,
    words_per_number: usize,
    walk: Walk,
    rng: Box<dyn RngCore>,
}

impl StartingPointGenerator {
    pub fn new(
        walk: Walk,
        words_per_number: usize,
        pool_points: usize,
        rng: Box<dyn RngCore>,
    ) -> Self {
        StartingPointGenerator {
            points: HashMap::new(),
            pool: vec![0u32; pool_points * words_per_number],
            pool_points,
            words_per_number,
            walk,
            rng,
        }
    }

    /// The point-to-representation mapping. Entries persist for the life of
    /// the search; chain replay reads them long after the points were
    /// consumed by the device.
    pub fn starting_points(&self) -> &HashMap<BigUint, Representation> {
        &self.points
    }

    /// Draws `amount` fresh starting points, registering each in the map.
    ///
    /// A draw whose value is already mapped with the same `b` adds no new
    /// equation; it is discarded and does not count towards `amount`. A draw
    /// whose value is already mapped with a different `b` is a collision and
    /// ends the search on the spot.
    fn create_starting_points(&mut self, amount: usize) -> Result<Batch<Vec<BigUint>>> {
        let order = self.walk.order().clone();
        let mut batch = Vec::with_capacity(amount);

        while batch.len() < amount {
            let a = self.rng.gen_biguint_below(&order);
            let b = self.rng.gen_biguint_below(&order);
            let rep = Representation { a, b };
            let z = self.walk.point_for(&rep);

            match self.points.entry(z) {
                Entry::Occupied(existing) => {
                    if existing.get().b == rep.b {
                        // No equation in this pair; replace the draw.
                        debug!("discarding duplicate starting point with equal b");
                        continue;
                    }
                    let answer = self
                        .walk
                        .solve(existing.get(), &rep)
                        .context("representations with distinct b must yield an answer")?;
                    info!("starting-point self-collision solved the instance before any chains ran");
                    return Ok(Batch::Solved(answer));
                }
                Entry::Vacant(slot) => {
                    batch.push(slot.key().clone());
                    slot.insert(rep);
                }
            }
        }

        Ok(Batch::Points(batch))
    }

    /// Refills the front of the host-side pool with `amount` fresh points,
    /// row-major. Returns the answer instead if drawing self-collided.
    pub fn fill_pool(&mut self, amount: usize) -> Result<Option<BigUint>> {
        ensure!(
            amount <= self.pool_points,
            "pool holds {} points, cannot fill {}",
            self.pool_points,
            amount
        );

        match self.create_starting_points(amount)? {
            Batch::Solved(answer) => Ok(Some(answer)),
            Batch::Points(points) => {
                let words = self.encode_batch(&points)?;
                self.pool[..words.len()].copy_from_slice(&words);
                Ok(None)
            }
        }
    }

    /// The first `amount` pool points as the device refill kernel expects
    /// them: row-major words.
    pub fn pool_words(&self, amount: usize) -> &[u32] {
        &self.pool[..amount * self.words_per_number]
    }

    /// Draws `amount` fresh points laid out vertically (column-major), the
    /// shape the per-lane state buffers are initialized with.
    pub fn vertical_seed_array(&mut self, amount: usize) -> Result<Batch<Vec<u32>>> {
        match self.create_starting_points(amount)? {
            Batch::Solved(answer) => Ok(Batch::Solved(answer)),
            Batch::Points(points) => {
                let rows = self.encode_batch(&points)?;
                Ok(Batch::Points(words::transpose_vertical(
                    &rows,
                    amount,
                    self.words_per_number,
                )))
            }
        }
    }

    fn encode_batch(&self, points: &[BigUint]) -> Result<Vec<u32>> {
        let mut rows = Vec::with_capacity(points.len() * self.words_per_number);
        for point in points {
            rows.extend(words::encode(point, self.words_per_number)?);
        }
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instance::DlpInstance;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn big(n: u64) -> BigUint {
        BigUint::from(n)
    }

    /// Two-word modulus with a huge order: 16 draws cannot realistically
    /// collide, so batches fill completely.
    fn wide_generator(seed: u64) -> StartingPointGenerator {
        let modulus = big(18_446_744_073_709_551_557);
        let instance = DlpInstance::new(modulus.clone(), big(3), &modulus - 2u32, big(5));
        let walk = Walk::new(&instance).unwrap();
        StartingPointGenerator::new(walk, 2, 16, Box::new(ChaCha8Rng::seed_from_u64(seed)))
    }

    #[test]
    fn fills_the_pool_and_registers_every_point() {
        let mut generator = wide_generator(7);
        assert!(generator.fill_pool(16).unwrap().is_none());
        assert_eq!(generator.starting_points().len(), 16);

        // Every pool row decodes back to a registered point.
        for row in generator.pool_words(16).chunks(2) {
            let point = words::decode(row);
            assert!(generator.starting_points().contains_key(&point));
        }
    }

    #[test]
    fn rejects_overfilling_the_pool() {
        let mut generator = wide_generator(8);
        assert!(generator.fill_pool(17).is_err());
    }

    #[test]
    fn vertical_seed_columns_decode_to_registered_points() {
        let mut generator = wide_generator(9);
        let Batch::Points(vertical) = generator.vertical_seed_array(3).unwrap() else {
            panic!("a 3-point draw from a 2^64-sized group cannot self-collide");
        };
        assert_eq!(vertical.len(), 6);

        for lane in 0..3 {
            let column = [vertical[lane], vertical[lane + 3]];
            let point = words::decode(&column);
            assert!(generator.starting_points().contains_key(&point));
        }
    }

    #[test]
    fn self_collision_in_a_tiny_group_short_circuits() {
        // Order 11: the group only has 11 reachable point values, so drawing
        // 16 distinct ones is impossible and a collision with differing b
        // must eventually surface.
        let instance = DlpInstance::new(big(23), big(2), big(11), big(13));
        let walk = Walk::new(&instance).unwrap();
        let mut generator =
            StartingPointGenerator::new(walk, 1, 16, Box::new(ChaCha8Rng::seed_from_u64(3)));

        let answer = generator
            .fill_pool(16)
            .unwrap()
            .expect("a 16-point draw from an 11-element group must self-collide");
        assert_eq!(big(2).modpow(&answer, &big(23)), big(13));
    }
}
