use std::time::Duration;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaChaRng;

use criterion::{
    criterion_group, criterion_main, measurement::WallTime, BenchmarkGroup, Criterion, SamplingMode,
};

use datakit::varint::{external, Chained, Tagged, VarintCodec};

const SAMPLE_SIZE: usize = 30;
const WARM_UP_TIME: Duration = Duration::from_secs(5);
const MEASURE_TIME: Duration = Duration::from_secs(10);

const SEED_VALS: u64 = 113;
const NUM_VALS: usize = 10000;

/// Values whose magnitude is uniform in bits, so every encoded length is exercised.
fn gen_random_vals(len: usize, seed: u64) -> Vec<u64> {
    let mut rng = ChaChaRng::seed_from_u64(seed);
    (0..len)
        .map(|_| {
            let bits = rng.gen_range(1..=64);
            rng.gen::<u64>() >> (64 - bits)
        })
        .collect()
}

fn criterion_varint(c: &mut Criterion) {
    let mut group = c.benchmark_group("timing_varint");
    group.sample_size(SAMPLE_SIZE);
    group.warm_up_time(WARM_UP_TIME);
    group.measurement_time(MEASURE_TIME);
    group.sampling_mode(SamplingMode::Flat);

    let vals = gen_random_vals(NUM_VALS, SEED_VALS);
    perform_codec::<Tagged>(&mut group, "tagged", &vals);
    perform_codec::<Chained>(&mut group, "chained", &vals);
    perform_external(&mut group, &vals);
}

fn perform_codec<C: VarintCodec>(group: &mut BenchmarkGroup<WallTime>, name: &str, vals: &[u64]) {
    let mut buf = vec![0; vals.len() * C::MAX_LEN];

    group.bench_function(format!("{name}/encode"), |b| {
        b.iter(|| {
            let mut pos = 0;
            for &v in vals {
                pos += C::encode_into(v, &mut buf[pos..]).unwrap();
            }
            pos
        });
    });

    let mut pos = 0;
    for &v in vals {
        pos += C::encode_into(v, &mut buf[pos..]).unwrap();
    }
    let encoded = &buf[..pos];

    group.bench_function(format!("{name}/decode"), |b| {
        b.iter(|| {
            let mut sum = 0u64;
            let mut pos = 0;
            while pos < encoded.len() {
                let (v, len) = C::decode(&encoded[pos..]).unwrap();
                sum = sum.wrapping_add(v);
                pos += len;
            }
            if sum == 0 {
                panic!("Should not come.");
            }
        });
    });
}

fn perform_external(group: &mut BenchmarkGroup<WallTime>, vals: &[u64]) {
    let mut buf = vec![0; vals.len() * 8];

    group.bench_function("external/put_get_w8", |b| {
        b.iter(|| {
            for (i, &v) in vals.iter().enumerate() {
                external::put(&mut buf[i * 8..], 8, v).unwrap();
            }
            let mut sum = 0u64;
            for i in 0..vals.len() {
                sum = sum.wrapping_add(external::get(&buf[i * 8..], 8).unwrap());
            }
            sum
        });
    });
}

criterion_group!(benches, criterion_varint);
criterion_main!(benches);
