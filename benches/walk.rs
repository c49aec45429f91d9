use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion};
use modp_dlog::montgomery::Montgomery;
use modp_dlog::{CpuProgram, DlpInstance, DlpSolver, Representation, SearchParams, Walk};
use num_bigint::BigUint;

fn big(n: u64) -> BigUint {
    BigUint::from(n)
}

/// 25 generates the subgroup of prime order 5003 in (Z/10007)^*,
/// and 25^3677 = 8896 (mod 10007).
fn instance() -> DlpInstance {
    DlpInstance::new(big(10007), big(25), big(5003), big(8896))
}

fn bench_walk_step(c: &mut Criterion) {
    let walk = Walk::new(&instance()).unwrap();
    let rep = Representation {
        a: big(1234),
        b: big(567),
    };
    let point = walk.point_for(&rep);

    c.bench_function("walk step", |b| {
        b.iter(|| walk.step(black_box(&point), black_box(&rep)))
    });
}

fn bench_montgomery_reduce_256_bit(c: &mut Criterion) {
    // The secp256k1 field prime: eight words.
    let modulus = BigUint::parse_bytes(
        b"fffffffffffffffffffffffffffffffffffffffffffffffffffffffefffffc2f",
        16,
    )
    .unwrap();
    let montgomery = Montgomery::new(&modulus, 8).unwrap();
    let x = BigUint::parse_bytes(
        b"deadbeef0badcafe123456789abcdef0fedcba9876543210a5a5a5a55a5a5a5a",
        16,
    )
    .unwrap();
    let product = montgomery.to_montgomery(&x) * &x;

    c.bench_function("montgomery reduce, 256-bit modulus", |b| {
        b.iter(|| montgomery.reduce(black_box(&product)))
    });
}

fn bench_solve_small_instance(c: &mut Criterion) {
    c.bench_function("solve dlp, 14-bit modulus", |b| {
        b.iter_batched(
            || {
                DlpSolver::new(
                    CpuProgram::new(32),
                    instance(),
                    SearchParams::new(2).with_threads(8),
                )
                .unwrap()
            },
            |mut solver| solver.solve().unwrap(),
            BatchSize::SmallInput,
        )
    });
}

criterion_group!(
    benches,
    bench_walk_step,
    bench_montgomery_reduce_256_bit,
    bench_solve_small_instance
);
criterion_main!(benches);
