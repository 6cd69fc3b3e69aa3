use rand::Rng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::error::{LogmapError, Result};
use crate::logistic::generate;

/// Lag-shifted tuples of one growth rate, ready to be scattered against each other
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PoincareSet {
    pub growth: f64,
    pub lag: usize,
    pub points: Vec<Vec<f64>>,
}

/// Builds `lag`-wide tuples from consecutive values of a series.
///
/// Tuple `k` is `(series[k], series[k+1], ..., series[k+lag-1])` where `series` is `values`
/// without its first element when `skip_initial` is set. The initial condition is usually
/// not on the attractor, hence the option.
///
/// A series shorter than `lag` gives no tuple.
pub fn embed(values: &[f64], lag: usize, skip_initial: bool) -> Result<Vec<Vec<f64>>> {
    if lag == 0 {
        return Err(LogmapError::invalid("the embedding lag must be at least 1"));
    }

    let start = if skip_initial { 1 } else { 0 };
    let series = &values[start.min(values.len())..];

    Ok(series.windows(lag).map(|w| w.to_vec()).collect())
}

/// Poincaré tuples of a logistic-map run, leading initial condition dropped.
///
/// Generates `gens` generations from `init` at `growth` and returns `gens - lag` tuples,
/// tuple `k` being `(x[k+1], ..., x[k+lag])`. Use `lag = 2` for (x_t, x_t+1) pairs and
/// `lag = 3` for the 3-D attractor embedding.
///
/// # Errors
///
/// `InvalidArgument` when `gens` or `lag` is zero.
pub fn poincare_pairs(gens: usize, growth: f64, init: f64, lag: usize) -> Result<Vec<Vec<f64>>> {
    poincare_embedding(gens, growth, init, lag, true)
}

/// [`poincare_pairs`] with control over the initial condition: with `skip_initial = false`
/// the transient is kept and `gens - lag + 1` tuples are returned.
pub fn poincare_embedding(
    gens: usize,
    growth: f64,
    init: f64,
    lag: usize,
    skip_initial: bool,
) -> Result<Vec<Vec<f64>>> {
    if lag == 0 {
        return Err(LogmapError::invalid("the embedding lag must be at least 1"));
    }
    let seq = generate(gens, init, growth)?;
    embed(seq.values(), lag, skip_initial)
}

/// Embedding of `n` independent uniform draws in [0, 1), tuples built exactly as for the map.
///
/// Scattered next to a chaotic run, these fill the unit square (or cube) without the
/// parabola-shaped structure of the deterministic attractor.
pub fn random_reference(n: usize, lag: usize, rng: &mut ChaCha8Rng) -> Result<Vec<Vec<f64>>> {
    let draws: Vec<f64> = (0..n).map(|_| rng.gen_range(0.0..1.0)).collect();
    embed(&draws, lag, false)
}
