// Seeded when a seed is given, otherwise drawn from the OS so separate instances diverge.

use rand::{SeedableRng, rngs::StdRng};

pub fn rng_from_seed(seed: Option<u64>) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_os_rng(),
    }
}
