//! Compute-backend contract.
//!
//! The search loop talks to its device through these traits: allocate
//! buffers, fetch a named kernel, bind positional arguments, launch, wait.
//! Platform selection, context creation and kernel-source compilation belong
//! to the implementor; a failed lookup of a kernel name is the implementor's
//! way of reporting a malformed or miscompiled program.
//!
//! Two kernels make up the protocol:
//!
//! * `generate_chain(startingPoints, savedNumbers, usedStartingPoint,
//!   localScratch, modulus, modulusPrimeLowWord, generator, element,
//!   distinguishedPointsOut, wordsPerNumber, counter, iterationCounts,
//!   maxChainLength, kWords, kBits)` advances every lane's chain. A lane
//!   reaching a distinguished point (low `kWords * 32 + kBits` bits zero)
//!   atomically increments `counter` and writes its (starting point, current
//!   point) word pair into `distinguishedPointsOut` at the post-increment
//!   index, then picks a fresh seed from `startingPoints`; a lane exceeding
//!   `maxChainLength` does the same but writes the zero sentinel in the
//!   starting-point slot. Lanes mid-chain persist their state into
//!   `savedNumbers` / `usedStartingPoint` / `iterationCounts` for the next
//!   launch.
//! * `add_new_starting_points(existingStartingPoints, newStartingPoints,
//!   amount, wordsPerNumber)` overwrites the first `amount` slots of the
//!   active starting-point buffer with freshly generated seeds.

pub mod cpu;

use anyhow::Result;

/// Scalar argument kinds the kernel contract uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScalarArg {
    U32(u32),
    I32(i32),
    I64(i64),
}

/// Element types that can live in device buffers or be passed as scalar
/// kernel arguments.
pub trait DeviceScalar: Copy + 'static {
    fn into_arg(self) -> ScalarArg;
}

impl DeviceScalar for u32 {
    fn into_arg(self) -> ScalarArg {
        ScalarArg::U32(self)
    }
}

impl DeviceScalar for i32 {
    fn into_arg(self) -> ScalarArg {
        ScalarArg::I32(self)
    }
}

impl DeviceScalar for i64 {
    fn into_arg(self) -> ScalarArg {
        ScalarArg::I64(self)
    }
}

/// Access pattern hint for buffer allocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BufferUsage {
    ReadOnly,
    WriteOnly,
    #[default]
    ReadWrite,
}

/// A device-resident buffer with blocking host transfers.
pub trait ComputeBuffer<T> {
    /// Blocking host-to-device copy.
    fn write(&self, source: &[T]) -> Result<()>;
    /// Blocking device-to-host copy.
    fn read(&self, destination: &mut [T]) -> Result<()>;
    fn len(&self) -> usize;
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A kernel with positional arguments.
pub trait ComputeKernel<P: ComputeProgram> {
    fn set_scalar<T: DeviceScalar>(&mut self, index: usize, value: T) -> Result<()>;
    fn set_buffer<T: DeviceScalar>(&mut self, index: usize, buffer: &P::Buffer<T>) -> Result<()>;
    /// Binds device-local scratch of the given byte size.
    fn set_local(&mut self, index: usize, bytes: usize) -> Result<()>;
    /// Queues a launch over `global` work items. Launches are asynchronous;
    /// call [`ComputeKernel::finish`] before reading any buffer the kernel
    /// writes.
    fn enqueue(&mut self, global: usize, local: Option<usize>) -> Result<()>;
    /// Blocks until all queued work has completed.
    fn finish(&mut self) -> Result<()>;
}

/// A compiled device program: buffer factory plus kernel lookup.
pub trait ComputeProgram: Sized {
    type Buffer<T: DeviceScalar>: ComputeBuffer<T>;
    type Kernel: ComputeKernel<Self>;

    fn create_buffer<T: DeviceScalar>(
        &self,
        initial: Vec<T>,
        usage: BufferUsage,
    ) -> Result<Self::Buffer<T>>;

    /// Looks up a kernel by name; unknown names are a configuration error.
    fn create_kernel(&self, name: &str) -> Result<Self::Kernel>;
}
