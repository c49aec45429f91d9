//! End-to-end tests of the search loop against the in-process reference
//! device. Seeded randomness keeps the runs reproducible; the assertions
//! only ever check the defining property `generator^x = element`, which
//! holds whichever path (cross-chain collision or self-collision while
//! drawing seeds) produced the answer.

use modp_dlog::{CpuProgram, DlpInstance, DlpSolver, SearchParams};
use num_bigint::BigUint;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

fn big(n: u64) -> BigUint {
    BigUint::from(n)
}

fn solve_with_seed(
    instance: DlpInstance,
    params: SearchParams,
    steps_per_launch: u32,
    seed: u64,
) -> (BigUint, modp_dlog::SolverMetrics) {
    let mut solver = DlpSolver::with_rng(
        CpuProgram::new(steps_per_launch),
        instance,
        params,
        Box::new(ChaCha8Rng::seed_from_u64(seed)),
    )
    .unwrap();
    let answer = solver.solve().unwrap();
    (answer, solver.metrics().clone())
}

#[test]
fn solves_5_pow_x_equals_8_mod_23() {
    let instance = DlpInstance::new(big(23), big(5), big(11), big(8));
    let (x, _) = solve_with_seed(instance, SearchParams::new(1).with_threads(4), 16, 1);

    assert!(x < big(11));
    assert_eq!(big(5).modpow(&x, &big(23)), big(8));
}

#[test]
fn solves_2_pow_x_equals_13_mod_23() {
    let instance = DlpInstance::new(big(23), big(2), big(11), big(13));
    let (x, _) = solve_with_seed(instance, SearchParams::new(1).with_threads(4), 16, 2);

    // The discrete log is unique in [0, 11).
    assert_eq!(x, big(7));
}

#[test]
fn solves_a_six_digit_modulus_through_the_device_loop() {
    // 200087 = 2 * 100043 + 1 is a safe prime; 4 generates the subgroup of
    // prime order 100043, and 4^54321 = 168279 (mod 200087). The group is
    // far too large for the ~40 up-front seed draws to self-collide, so the
    // answer comes out of the chain machinery.
    let instance = DlpInstance::new(big(200_087), big(4), big(100_043), big(168_279));
    let (x, _) = solve_with_seed(instance, SearchParams::new(3).with_threads(8), 8, 5);

    assert_eq!(x, big(54_321));
}

#[test]
fn tiny_group_self_collides_before_any_device_work() {
    // Order 11 with 256 seeds drawn up front: the pool cannot fill without
    // two draws landing on the same value, so the generator short-circuits.
    let instance = DlpInstance::new(big(23), big(2), big(11), big(13));
    let (x, metrics) = solve_with_seed(instance, SearchParams::new(2).with_threads(64), 16, 7);

    assert_eq!(x, big(7));
    assert_eq!(metrics.kernel_launches, 0);
}

#[test]
fn rejects_an_even_modulus_up_front() {
    let instance = DlpInstance::new(big(24), big(5), big(11), big(7));
    let result = DlpSolver::new(CpuProgram::default(), instance, SearchParams::new(4));
    assert!(result.is_err());
}

#[test]
fn answers_are_stable_across_seeds() {
    for seed in [11, 23, 47] {
        let instance = DlpInstance::new(big(47), big(2), big(23), big(9));
        let (x, _) = solve_with_seed(instance, SearchParams::new(1).with_threads(4), 16, seed);
        // 2^15 = 9 (mod 47), and the log is unique in [0, 23).
        assert_eq!(x, big(15));
    }
}
