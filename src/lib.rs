//! Discrete-logarithm solver for prime-order subgroups of `(Z/p)^*`.
//!
//! Implements the parallel variant of Pollard's rho with distinguished
//! points (van Oorschot and Wiener, 1999): a fleet of device lanes runs
//! independent pseudorandom walks, each lane reports the rare
//! "distinguished" points its chain reaches, and the host watches for two
//! chains landing on the same one. Replaying those two chains yields two
//! representations `g^a * y^b` of the same group element, from which the
//! discrete logarithm follows.
//!
//! The device is reached through the [`backend`] trait contract; the crate
//! ships [`backend::cpu::CpuProgram`], an in-process reference
//! implementation, so the engine runs (and is tested) without a GPU.
//!
//! ```no_run
//! use modp_dlog::{CpuProgram, DlpInstance, DlpSolver, SearchParams};
//! use num_bigint::BigUint;
//!
//! # fn main() -> anyhow::Result<()> {
//! let instance = DlpInstance::new(
//!     BigUint::from(10007u32), // modulus
//!     BigUint::from(25u32),    // generator
//!     BigUint::from(5003u32),  // prime order of the generator
//!     BigUint::from(8896u32),  // element = generator^x
//! );
//! let params = SearchParams::new(4).with_threads(64);
//! let mut solver = DlpSolver::new(CpuProgram::default(), instance, params)?;
//! let x = solver.solve()?;
//! # Ok(())
//! # }
//! ```

pub mod backend;
pub mod collector;
pub mod generator;
pub mod instance;
pub mod montgomery;
pub mod solver;
pub mod walk;
pub mod words;

pub use backend::cpu::CpuProgram;
pub use instance::{DlpInstance, SearchParams};
pub use solver::{DlpSolver, SolverMetrics};
pub use walk::{Representation, Walk};
