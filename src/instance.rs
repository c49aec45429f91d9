//! Problem statement and search tuning parameters.

use num_bigint::BigUint;
use std::fmt;

/// One instance of the discrete logarithm problem: find `x` with
/// `generator^x = element (mod modulus)`.
///
/// `order` is the order of `generator` and must be prime; together with the
/// oddness of `modulus` (checked at solver construction) these are the only
/// assumptions the search relies on. The values themselves are taken as
/// already validated by the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DlpInstance {
    pub modulus: BigUint,
    pub generator: BigUint,
    pub order: BigUint,
    pub element: BigUint,
}

impl DlpInstance {
    pub fn new(modulus: BigUint, generator: BigUint, order: BigUint, element: BigUint) -> Self {
        DlpInstance {
            modulus,
            generator,
            order,
            element,
        }
    }
}

impl fmt::Display for DlpInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "modulus: {}, generator: {}, order: {}, element: {}",
            self.modulus, self.generator, self.order, self.element
        )
    }
}

/// Default number of device lanes.
pub const DEFAULT_THREADS: usize = 2048;

/// Tuning knobs for the device-driven search.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchParams {
    /// Distinguished-point parameter: a point is distinguished when its low
    /// `k` bits are zero, so roughly one point in `2^k` qualifies.
    pub k: u32,
    /// Number of parallel device lanes.
    pub threads: usize,
    /// Work-group size for the chain kernel.
    pub local_work_size: usize,
}

impl SearchParams {
    pub fn new(k: u32) -> Self {
        SearchParams {
            k,
            threads: DEFAULT_THREADS,
            local_work_size: 32,
        }
    }

    pub fn with_threads(mut self, threads: usize) -> Self {
        self.threads = threads;
        self
    }

    /// Chains are abandoned after `16 * 2^k` steps; a chain that long has
    /// almost certainly entered a cycle with no distinguished point on it.
    pub fn max_chain_length(&self) -> i64 {
        1i64 << (self.k + 4)
    }
}
