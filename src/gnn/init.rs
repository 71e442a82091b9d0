//! Parameter initialization.

use ndarray::{Array1, Array2};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Random source for parameter initialization, seeded when reproducibility is needed.
pub fn param_rng(seed: Option<u64>) -> StdRng {
    match seed {
        Some(s) => StdRng::seed_from_u64(s),
        None => StdRng::from_entropy(),
    }
}

/// Glorot/Xavier uniform matrix of shape (fan_in x fan_out).
pub fn glorot<R: Rng>(rng: &mut R, fan_in: usize, fan_out: usize) -> Array2<f32> {
    let bound = (6.0 / (fan_in + fan_out) as f32).sqrt();
    Array2::from_shape_fn((fan_in, fan_out), |_| rng.gen_range(-bound..bound))
}

/// Glorot/Xavier uniform vector, treated as a (1 x len) attention vector.
pub fn glorot_vector<R: Rng>(rng: &mut R, len: usize) -> Array1<f32> {
    let bound = (6.0 / (1 + len) as f32).sqrt();
    Array1::from_shape_fn(len, |_| rng.gen_range(-bound..bound))
}

/// Uniform values in `[-1/sqrt(fan_in), 1/sqrt(fan_in))`.
pub fn fan_in_uniform<R: Rng>(rng: &mut R, fan_in: usize, shape: (usize, usize)) -> Array2<f32> {
    let bound = 1.0 / (fan_in.max(1) as f32).sqrt();
    Array2::from_shape_fn(shape, |_| rng.gen_range(-bound..bound))
}
