use rand::{Rng, SeedableRng};
use rand_chacha::ChaChaRng;

use datakit::{Databox, MflexState, Multilist};

const SEED_VALS: u64 = 113;
const NUM_VALS: usize = 1 << 17;
const FILLS: &[u8] = &[0, 1, 2, 3, 5, 8, 11];

fn main() {
    let mut rng = ChaChaRng::seed_from_u64(SEED_VALS);
    let small: Vec<u64> = (0..NUM_VALS).map(|_| rng.gen_range(0..1000)).collect();
    let words: Vec<String> = (0..NUM_VALS)
        .map(|i| format!("key:{}:{}", i % 97, rng.gen_range(0..10)))
        .collect();

    show_memories("small_ints", small.iter().map(|&v| Databox::from(v)));
    show_memories("words", words.iter().map(|w| Databox::from(w.as_str())));
}

fn show_memories<'a>(title: &str, vals: impl Iterator<Item = Databox<'a>> + Clone) {
    println!("[{title}]");
    for &fill in FILLS {
        for depth in [0, 1] {
            let mut state = MflexState::new();
            let mut ml = Multilist::new(fill, depth);
            for v in vals.clone() {
                ml.push_tail(&mut state, &v).unwrap();
            }
            print_memory(&format!("fill_{fill}/depth_{depth}"), &ml);
        }
    }
}

fn print_memory(name: &str, ml: &Multilist) {
    let n = ml.len() as f64;
    println!(
        "{}: {:.3} bytes/elem (raw {:.3}), {} chunks, {:?}",
        name,
        ml.bytes_actual() as f64 / n,
        ml.bytes() as f64 / n,
        ml.chunk_count(),
        ml.tier()
    );
}
