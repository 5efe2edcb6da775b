use std::time::Duration;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaChaRng;

use criterion::{
    criterion_group, criterion_main, measurement::WallTime, BenchmarkGroup, Criterion, SamplingMode,
};

use datakit::{Databox, MflexState, Multilist};

const SAMPLE_SIZE: usize = 30;
const WARM_UP_TIME: Duration = Duration::from_secs(5);
const MEASURE_TIME: Duration = Duration::from_secs(10);

const SEED_VALS: u64 = 334;
const SEED_QUERIES: u64 = 114514;

const NUM_VALS: &[usize] = &[1 << 10, 1 << 14, 1 << 17];
const NUM_QUERIES: usize = 1000;
const FILLS: &[u8] = &[0, 2, 5];

fn gen_random_ints(len: usize, min: usize, max: usize, seed: u64) -> Vec<usize> {
    let mut rng = ChaChaRng::seed_from_u64(seed);
    (0..len).map(|_| rng.gen_range(min..=max)).collect()
}

fn build(vals: &[usize], fill: u8, depth: u16, state: &mut MflexState) -> Multilist {
    let mut ml = Multilist::new(fill, depth);
    for &v in vals {
        ml.push_tail(state, &Databox::from(v as u64)).unwrap();
    }
    ml
}

fn criterion_multilist(c: &mut Criterion) {
    let mut group = c.benchmark_group("timing_multilist");
    group.sample_size(SAMPLE_SIZE);
    group.warm_up_time(WARM_UP_TIME);
    group.measurement_time(MEASURE_TIME);
    group.sampling_mode(SamplingMode::Flat);

    let max_nvals = *NUM_VALS.last().unwrap();
    let vals = gen_random_ints(max_nvals, 0, 1 << 40, SEED_VALS);

    perform_multilist(&mut group, &vals);
}

fn perform_multilist(group: &mut BenchmarkGroup<WallTime>, vals: &[usize]) {
    for &nvals in NUM_VALS {
        let vals = &vals[..nvals];
        let queries = gen_random_ints(NUM_QUERIES, 0, nvals - 1, SEED_QUERIES);

        for &fill in FILLS {
            let prefix = format!("n_{nvals}/fill_{fill}");

            group.bench_function(format!("{prefix}/push_tail"), |b| {
                let mut state = MflexState::new();
                b.iter(|| build(vals, fill, 0, &mut state));
            });

            group.bench_function(format!("{prefix}/get"), |b| {
                let mut state = MflexState::new();
                let ml = build(vals, fill, 0, &mut state);
                b.iter(|| {
                    let mut sum = 0;
                    for &q in &queries {
                        let v = ml.get(&mut state, q as isize).unwrap();
                        sum += v.and_then(|v| v.as_u64()).unwrap_or(0);
                    }
                    sum
                });
            });

            group.bench_function(format!("{prefix}/rotate_depth_1"), |b| {
                let mut state = MflexState::new();
                let mut ml = build(vals, fill, 1, &mut state);
                b.iter(|| {
                    for _ in 0..NUM_QUERIES {
                        ml.rotate(&mut state).unwrap();
                    }
                });
            });

            group.bench_function(format!("{prefix}/iter"), |b| {
                let mut state = MflexState::new();
                let ml = build(vals, fill, 0, &mut state);
                b.iter(|| ml.iter(&mut state).filter_map(|v| v.ok()).count());
            });
        }
    }
}

criterion_group!(benches, criterion_multilist);
criterion_main!(benches);
