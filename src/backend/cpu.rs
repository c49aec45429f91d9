//! In-process reference implementation of the compute contract.
//!
//! `CpuProgram` runs the two protocol kernels on the host, one lane at a
//! time, against the exact buffer layouts and argument order a device
//! implementation would see. Its per-step arithmetic goes through the same
//! Montgomery routines the replay evaluator uses, so the walk values agree
//! between the two by construction.
//!
//! Lanes execute sequentially and deterministically; the atomic counter of
//! the contract degenerates to a plain increment. A launch advances every
//! lane by `steps_per_launch` steps, handling chain terminations inline.

use super::{BufferUsage, ComputeBuffer, ComputeKernel, ComputeProgram, DeviceScalar, ScalarArg};
use crate::montgomery::Montgomery;
use crate::words;
use anyhow::{anyhow, bail, ensure, Result};
use num_bigint::BigUint;
use std::any::Any;
use std::cell::RefCell;
use std::rc::Rc;

/// Host-side stand-in for a compiled device program.
#[derive(Debug, Clone)]
pub struct CpuProgram {
    steps_per_launch: u32,
}

impl CpuProgram {
    /// `steps_per_launch` is how far each lane advances per kernel launch.
    pub fn new(steps_per_launch: u32) -> Self {
        CpuProgram {
            steps_per_launch: steps_per_launch.max(1),
        }
    }
}

impl Default for CpuProgram {
    fn default() -> Self {
        CpuProgram::new(256)
    }
}

pub struct CpuBuffer<T> {
    data: Rc<RefCell<Vec<T>>>,
}

impl<T: DeviceScalar> ComputeBuffer<T> for CpuBuffer<T> {
    fn write(&self, source: &[T]) -> Result<()> {
        let mut data = self.data.borrow_mut();
        ensure!(
            source.len() <= data.len(),
            "write of {} elements into a buffer of {}",
            source.len(),
            data.len()
        );
        data[..source.len()].copy_from_slice(source);
        Ok(())
    }

    fn read(&self, destination: &mut [T]) -> Result<()> {
        let data = self.data.borrow();
        ensure!(
            destination.len() <= data.len(),
            "read of {} elements from a buffer of {}",
            destination.len(),
            data.len()
        );
        destination.copy_from_slice(&data[..destination.len()]);
        Ok(())
    }

    fn len(&self) -> usize {
        self.data.borrow().len()
    }
}

#[derive(Clone, Copy)]
enum EntryPoint {
    GenerateChain,
    AddNewStartingPoints,
}

enum Arg {
    Scalar(ScalarArg),
    Buffer(Rc<dyn Any>),
    Local(usize),
}

pub struct CpuKernel {
    entry: EntryPoint,
    steps_per_launch: u32,
    args: Vec<Option<Arg>>,
}

impl CpuKernel {
    fn set_arg(&mut self, index: usize, arg: Arg) {
        if self.args.len() <= index {
            self.args.resize_with(index + 1, || None);
        }
        self.args[index] = Some(arg);
    }

    fn buffer_arg<T: 'static>(&self, index: usize) -> Result<Rc<RefCell<Vec<T>>>> {
        match self.args.get(index).and_then(|arg| arg.as_ref()) {
            Some(Arg::Buffer(any)) => any
                .clone()
                .downcast::<RefCell<Vec<T>>>()
                .map_err(|_| anyhow!("kernel argument {index} has the wrong element type")),
            _ => bail!("kernel argument {index} is not a bound buffer"),
        }
    }

    fn scalar_arg(&self, index: usize) -> Result<ScalarArg> {
        match self.args.get(index).and_then(|arg| arg.as_ref()) {
            Some(Arg::Scalar(value)) => Ok(*value),
            _ => bail!("kernel argument {index} is not a bound scalar"),
        }
    }

    fn scalar_u32(&self, index: usize) -> Result<u32> {
        match self.scalar_arg(index)? {
            ScalarArg::U32(value) => Ok(value),
            other => bail!("kernel argument {index} is {other:?}, expected a u32"),
        }
    }

    fn scalar_i32(&self, index: usize) -> Result<i32> {
        match self.scalar_arg(index)? {
            ScalarArg::I32(value) => Ok(value),
            other => bail!("kernel argument {index} is {other:?}, expected an i32"),
        }
    }

    fn scalar_i64(&self, index: usize) -> Result<i64> {
        match self.scalar_arg(index)? {
            ScalarArg::I64(value) => Ok(value),
            other => bail!("kernel argument {index} is {other:?}, expected an i64"),
        }
    }

    fn run_generate_chain(&self, lanes: usize) -> Result<()> {
        let starting = self.buffer_arg::<u32>(0)?;
        let saved = self.buffer_arg::<u32>(1)?;
        let used = self.buffer_arg::<u32>(2)?;
        // Argument 3 is device-local scratch; nothing to emulate host-side.
        let modulus_buffer = self.buffer_arg::<u32>(4)?;
        let modulus_prime_low = self.scalar_u32(5)?;
        let generator_buffer = self.buffer_arg::<u32>(6)?;
        let element_buffer = self.buffer_arg::<u32>(7)?;
        let out = self.buffer_arg::<u32>(8)?;
        let width = usize::try_from(self.scalar_i32(9)?)?;
        let counter = self.buffer_arg::<i32>(10)?;
        let iterations = self.buffer_arg::<i64>(11)?;
        let max_chain_length = self.scalar_i64(12)?;
        let k_words = u64::try_from(self.scalar_i32(13)?)?;
        let k_bits = u64::try_from(self.scalar_i32(14)?)?;

        ensure!(width > 0, "wordsPerNumber must be positive");
        let modulus = words::decode(&modulus_buffer.borrow());
        let montgomery = Montgomery::new(&modulus, width)?;
        ensure!(
            montgomery.modulus_prime_low_word() == modulus_prime_low,
            "modulusPrime low word {} does not match the modulus",
            modulus_prime_low
        );
        let generator_m = words::decode(&generator_buffer.borrow());
        let element_m = words::decode(&element_buffer.borrow());
        let k = 32 * k_words + k_bits;

        let starting_words = starting.borrow().clone();
        let mut saved_words = saved.borrow().clone();
        let mut used_words = used.borrow().clone();
        let mut iteration_counts = iterations.borrow().clone();
        let mut out_words = out.borrow().clone();
        let mut count = counter.borrow()[0];

        ensure!(
            saved_words.len() == lanes * width && used_words.len() == lanes * width,
            "per-lane state buffers do not match {lanes} lanes of {width} words"
        );
        ensure!(
            iteration_counts.len() == lanes,
            "iteration-count buffer does not match {lanes} lanes"
        );
        let pool_slots = starting_words.len() / width;
        ensure!(pool_slots > 0, "starting-point buffer is empty");
        let pair_capacity = out_words.len() / (2 * width);

        for lane in 0..lanes {
            let mut point = load_column(&saved_words, lane, lanes, width);
            let mut seed = load_column(&used_words, lane, lanes, width);
            let mut chain_length = iteration_counts[lane];

            for _ in 0..self.steps_per_launch {
                point = montgomery_step(&montgomery, &generator_m, &element_m, &point);
                chain_length += 1;

                let distinguished = is_distinguished(&point, k);
                if distinguished || chain_length >= max_chain_length {
                    let slot = usize::try_from(count)?;
                    count += 1;
                    if slot < pair_capacity {
                        let start_words = if distinguished {
                            words::encode(&seed, width)?
                        } else {
                            // Abandoned at the length limit: zero sentinel.
                            vec![0u32; width]
                        };
                        let point_words = words::encode(&point, width)?;
                        out_words[2 * slot * width..(2 * slot + 1) * width]
                            .copy_from_slice(&start_words);
                        out_words[(2 * slot + 1) * width..(2 * slot + 2) * width]
                            .copy_from_slice(&point_words);
                    }

                    let next = (slot % pool_slots) * width;
                    point = words::decode(&starting_words[next..next + width]);
                    seed = point.clone();
                    chain_length = 0;
                }
            }

            store_column(&mut saved_words, lane, lanes, &words::encode(&point, width)?);
            store_column(&mut used_words, lane, lanes, &words::encode(&seed, width)?);
            iteration_counts[lane] = chain_length;
        }

        *saved.borrow_mut() = saved_words;
        *used.borrow_mut() = used_words;
        *iterations.borrow_mut() = iteration_counts;
        *out.borrow_mut() = out_words;
        counter.borrow_mut()[0] = count;
        Ok(())
    }

    fn run_add_new_starting_points(&self) -> Result<()> {
        let existing = self.buffer_arg::<u32>(0)?;
        let fresh = self.buffer_arg::<u32>(1)?;
        let amount = usize::try_from(self.scalar_i32(2)?)?;
        let width = usize::try_from(self.scalar_i32(3)?)?;

        let span = amount * width;
        let fresh_words = fresh.borrow();
        let mut existing_words = existing.borrow_mut();
        ensure!(
            span <= fresh_words.len() && span <= existing_words.len(),
            "refill of {amount} points does not fit the starting-point buffers"
        );
        existing_words[..span].copy_from_slice(&fresh_words[..span]);
        Ok(())
    }
}

impl ComputeKernel<CpuProgram> for CpuKernel {
    fn set_scalar<T: DeviceScalar>(&mut self, index: usize, value: T) -> Result<()> {
        self.set_arg(index, Arg::Scalar(value.into_arg()));
        Ok(())
    }

    fn set_buffer<T: DeviceScalar>(&mut self, index: usize, buffer: &CpuBuffer<T>) -> Result<()> {
        let data: Rc<RefCell<Vec<T>>> = buffer.data.clone();
        self.set_arg(index, Arg::Buffer(data));
        Ok(())
    }

    fn set_local(&mut self, index: usize, bytes: usize) -> Result<()> {
        self.set_arg(index, Arg::Local(bytes));
        Ok(())
    }

    fn enqueue(&mut self, global: usize, _local: Option<usize>) -> Result<()> {
        ensure!(global > 0, "kernel launched over zero work items");
        match self.entry {
            EntryPoint::GenerateChain => self.run_generate_chain(global),
            EntryPoint::AddNewStartingPoints => self.run_add_new_starting_points(),
        }
    }

    fn finish(&mut self) -> Result<()> {
        // Launches run synchronously; the queue is always drained.
        Ok(())
    }
}

impl ComputeProgram for CpuProgram {
    type Buffer<T: DeviceScalar> = CpuBuffer<T>;
    type Kernel = CpuKernel;

    fn create_buffer<T: DeviceScalar>(
        &self,
        initial: Vec<T>,
        _usage: BufferUsage,
    ) -> Result<CpuBuffer<T>> {
        Ok(CpuBuffer {
            data: Rc::new(RefCell::new(initial)),
        })
    }

    fn create_kernel(&self, name: &str) -> Result<CpuKernel> {
        let entry = match name {
            "generate_chain" => EntryPoint::GenerateChain,
            "add_new_starting_points" => EntryPoint::AddNewStartingPoints,
            _ => bail!("program defines no kernel named `{name}`"),
        };
        Ok(CpuKernel {
            entry,
            steps_per_launch: self.steps_per_launch,
            args: Vec::new(),
        })
    }
}

/// One device-side walk step: Montgomery multiply by the Montgomery-form
/// generator or element, or a Montgomery square, selected by the low word of
/// the point mod 3. Produces the same values as the host replay evaluator.
fn montgomery_step(
    montgomery: &Montgomery,
    generator_m: &BigUint,
    element_m: &BigUint,
    point: &BigUint,
) -> BigUint {
    let low_word = point.iter_u32_digits().next().unwrap_or(0);
    match low_word % 3 {
        0 => montgomery.reduce(&(point * generator_m)),
        1 => montgomery.reduce(&(point * element_m)),
        _ => montgomery.reduce(&(point * point)),
    }
}

/// Low `k` bits all zero.
fn is_distinguished(point: &BigUint, k: u64) -> bool {
    if k == 0 {
        return true;
    }
    match point.trailing_zeros() {
        None => true,
        Some(trailing) => trailing >= k,
    }
}

fn load_column(vertical: &[u32], lane: usize, lanes: usize, width: usize) -> BigUint {
    let column: Vec<u32> = (0..width).map(|j| vertical[lane + j * lanes]).collect();
    words::decode(&column)
}

fn store_column(vertical: &mut [u32], lane: usize, lanes: usize, row: &[u32]) {
    for (j, word) in row.iter().enumerate() {
        vertical[lane + j * lanes] = *word;
    }
}
