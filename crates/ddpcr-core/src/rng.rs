use rand::SeedableRng;
use rand_chacha::ChaCha12Rng;

/// Create a deterministic RNG from a seed.
pub fn create_rng(seed: u64) -> ChaCha12Rng {
    ChaCha12Rng::seed_from_u64(seed)
}

/// Derive an RNG for one replicate run, so replicates never share a stream.
pub fn derive_replicate_rng(base_seed: u64, replicate: usize) -> ChaCha12Rng {
    ChaCha12Rng::seed_from_u64(
        base_seed
            .wrapping_add((replicate as u64).wrapping_mul(crate::constants::RNG_DERIVATION_PRIME)),
    )
}
