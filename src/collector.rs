//! Harvesting distinguished points and turning collisions into answers.
//!
//! The device reports each terminated chain as a (starting point,
//! distinguished point) pair. Pairs are grouped by distinguished-point
//! value; once two different chains have landed on the same value, replaying
//! both from their recorded starting points produces two representations of
//! that value, and the solve rule does the rest.

use crate::walk::{Representation, Walk};
use crate::words;
use anyhow::{Context, Result};
use log::debug;
use num_bigint::BigUint;
use num_traits::Zero;
use std::collections::HashMap;

/// What a collision scan found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CollisionOutcome {
    /// No distinguished point has two chains on record yet.
    NoCandidate,
    /// A candidate existed but both chains carried the same `b`; one of the
    /// offending starting points was dropped and the search continues.
    Degenerate,
    Solved(BigUint),
}

pub struct SpecialPointCollector {
    special_points: HashMap<BigUint, Vec<BigUint>>,
    words_per_number: usize,
}

impl SpecialPointCollector {
    pub fn new(words_per_number: usize) -> Self {
        SpecialPointCollector {
            special_points: HashMap::new(),
            words_per_number,
        }
    }

    /// Decodes `amount` (starting point, distinguished point) pairs from a
    /// harvested device buffer and files them. Pairs whose starting-point
    /// slot is all zeroes mark chains abandoned at the length limit and are
    /// skipped. Returns how many pairs were filed.
    pub fn collect(&mut self, buffer: &[u32], amount: usize) -> usize {
        let width = self.words_per_number;
        debug_assert!(buffer.len() >= 2 * amount * width);

        let mut filed = 0;
        for pair in 0..amount {
            let start = words::decode(&buffer[2 * pair * width..(2 * pair + 1) * width]);
            if start.is_zero() {
                continue;
            }
            let special = words::decode(&buffer[(2 * pair + 1) * width..(2 * pair + 2) * width]);
            self.special_points.entry(special).or_default().push(start);
            filed += 1;
        }
        filed
    }

    /// Scans for a distinguished point reached by at least two chains and
    /// tries to solve from it. At most one candidate is resolved per call;
    /// callers come back after the next harvest if nothing was found.
    ///
    /// The two replays are independent and read-only, so they run on both
    /// sides of a fork-join.
    pub fn find_collision(
        &mut self,
        walk: &Walk,
        starting_points: &HashMap<BigUint, Representation>,
        replay_cap: u64,
    ) -> Result<CollisionOutcome> {
        let Some((special, start0, start1)) =
            self.special_points.iter().find_map(|(special, starts)| {
                (starts.len() > 1)
                    .then(|| (special.clone(), starts[0].clone(), starts[1].clone()))
            })
        else {
            return Ok(CollisionOutcome::NoCandidate);
        };

        let rep0 = starting_points
            .get(&start0)
            .context("collided starting point was never registered")?;
        let rep1 = starting_points
            .get(&start1)
            .context("collided starting point was never registered")?;

        let (replayed0, replayed1) = rayon::join(
            || walk.replay(&start0, rep0, &special, replay_cap),
            || walk.replay(&start1, rep1, &special, replay_cap),
        );
        let (replayed0, replayed1) = (replayed0?, replayed1?);

        match walk.solve(&replayed0, &replayed1) {
            Some(answer) => Ok(CollisionOutcome::Solved(answer)),
            None => {
                // Both chains carry the same b; this pair can never produce
                // an equation, so one of the two starts has to go.
                debug!("degenerate collision (equal b), dropping one starting point");
                if let Some(starts) = self.special_points.get_mut(&special) {
                    if let Some(position) = starts.iter().position(|start| *start == start0) {
                        starts.remove(position);
                    }
                }
                Ok(CollisionOutcome::Degenerate)
            }
        }
    }
}
