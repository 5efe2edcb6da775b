use std::time::Duration;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaChaRng;

use criterion::{
    criterion_group, criterion_main, measurement::WallTime, BenchmarkGroup, Criterion, SamplingMode,
};

use datakit::Fenwick;

const SAMPLE_SIZE: usize = 30;
const WARM_UP_TIME: Duration = Duration::from_secs(5);
const MEASURE_TIME: Duration = Duration::from_secs(10);

const SEED_VALS: u64 = 334;
const SEED_QUERIES: u64 = 114514;

const NUM_VALS: &[usize] = &[1 << 10, 1 << 15, 1 << 20];
const NUM_QUERIES: usize = 1000;

fn gen_random_ints(len: usize, min: i64, max: i64, seed: u64) -> Vec<i64> {
    let mut rng = ChaChaRng::seed_from_u64(seed);
    (0..len).map(|_| rng.gen_range(min..=max)).collect()
}

fn criterion_fenwick(c: &mut Criterion) {
    let mut group = c.benchmark_group("timing_fenwick");
    group.sample_size(SAMPLE_SIZE);
    group.warm_up_time(WARM_UP_TIME);
    group.measurement_time(MEASURE_TIME);
    group.sampling_mode(SamplingMode::Flat);

    let max_nvals = *NUM_VALS.last().unwrap();
    let vals = gen_random_ints(max_nvals, 0, 1000, SEED_VALS);

    perform_fenwick(&mut group, &vals);
}

fn perform_fenwick(group: &mut BenchmarkGroup<WallTime>, vals: &[i64]) {
    for &nvals in NUM_VALS {
        let vals = &vals[..nvals];
        let queries: Vec<usize> = gen_random_ints(NUM_QUERIES, 0, nvals as i64 - 1, SEED_QUERIES)
            .into_iter()
            .map(|q| q as usize)
            .collect();
        let nvals_str = format!("n_{nvals}");

        group.bench_function(format!("{nvals_str}/update"), |b| {
            let mut fw = Fenwick::from_slice(vals);
            b.iter(|| {
                for &q in &queries {
                    fw.update(q, 1).unwrap();
                }
            });
        });

        group.bench_function(format!("{nvals_str}/query"), |b| {
            let fw = Fenwick::from_slice(vals);
            b.iter(|| queries.iter().map(|&q| fw.query(q)).sum::<i64>());
        });

        group.bench_function(format!("{nvals_str}/lower_bound"), |b| {
            let fw = Fenwick::from_slice(vals);
            let targets: Vec<i64> = queries.iter().map(|&q| fw.query(q)).collect();
            b.iter(|| {
                targets
                    .iter()
                    .filter_map(|&t| fw.lower_bound(t))
                    .sum::<usize>()
            });
        });
    }
}

criterion_group!(benches, criterion_fenwick);
criterion_main!(benches);
