//! The host/device search loop.
//!
//! One `DlpSolver` owns one search: the starting-point generator, the
//! distinguished-point collector, and every device-facing buffer. The loop
//! keeps `threads` device lanes walking, harvests terminated chains whenever
//! the device-side counter passes the threshold, and stops only when a
//! collision (or a lucky self-collision while drawing seeds) produces the
//! answer. There is deliberately no iteration bound: a caller wanting a time
//! limit terminates the process between iterations.

use crate::backend::{BufferUsage, ComputeBuffer, ComputeKernel, ComputeProgram};
use crate::collector::{CollisionOutcome, SpecialPointCollector};
use crate::generator::{Batch, StartingPointGenerator};
use crate::instance::{DlpInstance, SearchParams};
use crate::walk::Walk;
use crate::words;
use anyhow::{ensure, Result};
use log::{debug, info};
use num_bigint::BigUint;
use rand::RngCore;

/// Observable progress counters, updated as the loop runs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SolverMetrics {
    /// Completed `generate_chain` launches.
    pub kernel_launches: u64,
    /// Distinguished points filed by the collector (sentinel pairs excluded).
    pub distinguished_points: u64,
    /// Starting-point buffer refills (each also regenerates the host pool).
    pub pool_refills: u64,
    /// Collision candidates examined (entries with two chains on record).
    pub collision_candidates: u64,
    /// Candidates rejected because both chains carried the same `b`.
    pub degenerate_collisions: u64,
}

pub struct DlpSolver<P: ComputeProgram> {
    program: P,
    instance: DlpInstance,
    params: SearchParams,
    words_per_number: usize,
    walk: Walk,
    generator: StartingPointGenerator,
    collector: SpecialPointCollector,
    metrics: SolverMetrics,
}

impl<P: ComputeProgram> DlpSolver<P> {
    /// Builds a solver drawing randomness from the operating system.
    pub fn new(program: P, instance: DlpInstance, params: SearchParams) -> Result<Self> {
        Self::with_rng(program, instance, params, Box::new(rand::rngs::OsRng))
    }

    /// Builds a solver with caller-provided randomness (deterministic tests).
    pub fn with_rng(
        program: P,
        instance: DlpInstance,
        params: SearchParams,
        rng: Box<dyn RngCore>,
    ) -> Result<Self> {
        ensure!(params.threads > 0, "at least one device lane is required");
        ensure!(params.local_work_size > 0, "work-group size must be positive");
        ensure!(
            params.k < 60,
            "k = {} puts the chain-length limit past the 64-bit range",
            params.k
        );

        // Also validates that the modulus is odd.
        let walk = Walk::new(&instance)?;
        let words_per_number = words::words_per_number(&instance.modulus);
        let generator = StartingPointGenerator::new(
            walk.clone(),
            words_per_number,
            4 * params.threads,
            rng,
        );
        let collector = SpecialPointCollector::new(words_per_number);

        Ok(DlpSolver {
            program,
            instance,
            params,
            words_per_number,
            walk,
            generator,
            collector,
            metrics: SolverMetrics::default(),
        })
    }

    pub fn metrics(&self) -> &SolverMetrics {
        &self.metrics
    }

    /// Runs the search to completion and returns the discrete logarithm,
    /// normalized to `[0, order)`.
    pub fn solve(&mut self) -> Result<BigUint> {
        let lanes = self.params.threads;
        let pool_points = 4 * lanes;
        let width = self.words_per_number;

        info!("starting search: {}", self.instance);

        if let Some(answer) = self.generator.fill_pool(pool_points)? {
            return Ok(answer);
        }

        let montgomery = self.walk.montgomery().clone();
        let generator_m = montgomery.to_montgomery(&self.instance.generator);
        let element_m = montgomery.to_montgomery(&self.instance.element);

        // Device-facing buffers. The starting-point window and the pair
        // output are both sized for 4T points, which the harvest threshold
        // keeps sufficient.
        let starting_points = self
            .program
            .create_buffer(vec![0u32; pool_points * width], BufferUsage::ReadWrite)?;
        let special_points = self
            .program
            .create_buffer(vec![0u32; 2 * width * pool_points], BufferUsage::ReadWrite)?;
        let new_points = self
            .program
            .create_buffer(vec![0u32; pool_points * width], BufferUsage::ReadOnly)?;
        let modulus_buffer = self.program.create_buffer(
            words::encode(&self.instance.modulus, width)?,
            BufferUsage::ReadOnly,
        )?;
        let generator_buffer = self
            .program
            .create_buffer(words::encode(&generator_m, width)?, BufferUsage::ReadOnly)?;
        let element_buffer = self
            .program
            .create_buffer(words::encode(&element_m, width)?, BufferUsage::ReadOnly)?;
        let counter_buffer = self
            .program
            .create_buffer(vec![0i32; 1], BufferUsage::ReadWrite)?;

        // Each lane starts on a seed of its own; the same vertical array
        // initializes both the current point and the seed it came from.
        let seeds = match self.generator.vertical_seed_array(lanes)? {
            Batch::Solved(answer) => return Ok(answer),
            Batch::Points(seed_words) => seed_words,
        };
        let saved_numbers = self
            .program
            .create_buffer(seeds.clone(), BufferUsage::ReadWrite)?;
        let used_starting_points = self.program.create_buffer(seeds, BufferUsage::ReadWrite)?;
        let iteration_counts = self
            .program
            .create_buffer(vec![0i64; lanes], BufferUsage::ReadWrite)?;

        let mut refill_kernel = self.program.create_kernel("add_new_starting_points")?;
        refill_kernel.set_buffer(0, &starting_points)?;
        refill_kernel.set_buffer(1, &new_points)?;

        // Prime the device-side window with the pool drawn above.
        if let Some(answer) =
            self.refill_starting_points(&mut refill_kernel, &new_points, pool_points)?
        {
            return Ok(answer);
        }

        let mut kernel = self.program.create_kernel("generate_chain")?;
        kernel.set_buffer(0, &starting_points)?;
        kernel.set_buffer(1, &saved_numbers)?;
        kernel.set_buffer(2, &used_starting_points)?;
        kernel.set_local(3, (2 + 32) * width * std::mem::size_of::<u32>())?;
        kernel.set_buffer(4, &modulus_buffer)?;
        kernel.set_scalar(5, montgomery.modulus_prime_low_word())?;
        kernel.set_buffer(6, &generator_buffer)?;
        kernel.set_buffer(7, &element_buffer)?;
        kernel.set_buffer(8, &special_points)?;
        kernel.set_scalar(9, width as i32)?;
        kernel.set_buffer(10, &counter_buffer)?;
        kernel.set_buffer(11, &iteration_counts)?;
        kernel.set_scalar(12, self.params.max_chain_length())?;
        kernel.set_scalar(13, (self.params.k / 32) as i32)?;
        kernel.set_scalar(14, (self.params.k % 32) as i32)?;

        let mut counter_host = [0i32; 1];
        let mut pair_words = vec![0u32; 2 * width * pool_points];

        loop {
            debug!("launching kernel {}", self.metrics.kernel_launches);
            kernel.enqueue(lanes, Some(self.params.local_work_size))?;
            kernel.finish()?;
            self.metrics.kernel_launches += 1;

            counter_buffer.read(&mut counter_host)?;
            let terminated = counter_host[0].max(0) as usize;
            debug!("chains terminated since last harvest: {terminated}");

            if terminated <= lanes {
                continue;
            }

            let amount = terminated.min(pool_points);
            info!(
                "harvesting {amount} special points after launch {}",
                self.metrics.kernel_launches
            );

            if let Some(answer) =
                self.refill_starting_points(&mut refill_kernel, &new_points, amount)?
            {
                return Ok(answer);
            }

            special_points.read(&mut pair_words)?;
            let filed = self.collector.collect(&pair_words, amount);
            self.metrics.distinguished_points += filed as u64;

            let replay_cap = self.replay_cap();
            match self.collector.find_collision(
                &self.walk,
                self.generator.starting_points(),
                replay_cap,
            )? {
                CollisionOutcome::Solved(answer) => {
                    self.metrics.collision_candidates += 1;
                    info!(
                        "collision solved the instance after {} launches",
                        self.metrics.kernel_launches
                    );
                    return Ok(answer);
                }
                CollisionOutcome::Degenerate => {
                    self.metrics.collision_candidates += 1;
                    self.metrics.degenerate_collisions += 1;
                }
                CollisionOutcome::NoCandidate => {}
            }

            counter_host[0] = 0;
            counter_buffer.write(&counter_host)?;
        }
    }

    /// Ships `amount` pool points to the device's starting-point window and
    /// regenerates the pool behind them. Any self-collision found while
    /// redrawing is the answer.
    fn refill_starting_points(
        &mut self,
        refill_kernel: &mut P::Kernel,
        new_points: &P::Buffer<u32>,
        amount: usize,
    ) -> Result<Option<BigUint>> {
        new_points.write(self.generator.pool_words(amount))?;
        refill_kernel.set_scalar(2, amount as i32)?;
        refill_kernel.set_scalar(3, self.words_per_number as i32)?;
        refill_kernel.enqueue(self.params.local_work_size, None)?;

        // The device copies the shipped points while the host redraws.
        let redraw = self.generator.fill_pool(amount)?;
        refill_kernel.finish()?;

        self.metrics.pool_refills += 1;
        Ok(redraw)
    }

    /// A genuine distinguished point is reached within the chain-length
    /// limit; generous slack on top covers the steps a lane may run past a
    /// harvest before its chain is filed.
    fn replay_cap(&self) -> u64 {
        2 * self.params.max_chain_length() as u64
    }
}
