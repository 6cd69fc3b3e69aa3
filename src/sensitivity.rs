use log::debug;
use rayon::prelude::*;
use rayon::ThreadPoolBuilder;
use serde::{Deserialize, Serialize};

use crate::error::{LogmapError, Result};
use crate::logistic::{generate, Sequence};

/// Two runs of the map started from nearby initial populations
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DivergenceTrace {
    pub growth: f64,
    pub perturbation: f64,
    pub reference: Sequence,
    pub perturbed: Sequence,
    /// |reference - perturbed| for each generation
    pub difference: Vec<f64>,
}

impl DivergenceTrace {
    /// First generation where both runs are further apart than `threshold`
    pub fn first_exceeding(&self, threshold: f64) -> Option<usize> {
        self.difference.iter().position(|&d| d > threshold)
    }

    pub fn max_difference(&self) -> f64 {
        self.difference.iter().copied().fold(0.0, f64::max)
    }
}

/// Runs the map from `init` and from `init + perturbation` and records how far apart they drift.
///
/// In a chaotic regime the difference grows roughly like `perturbation * exp(lambda * t)`
/// until it saturates at the size of the attractor; in a stable one it shrinks to zero.
pub fn divergence(gens: usize, init: f64, perturbation: f64, growth: f64) -> Result<DivergenceTrace> {
    let reference = generate(gens, init, growth)?;
    let perturbed = generate(gens, init + perturbation, growth)?;
    let difference = reference
        .iter()
        .zip(perturbed.iter())
        .map(|(a, b)| (a - b).abs())
        .collect();

    Ok(DivergenceTrace { growth, perturbation, reference, perturbed, difference })
}

/// Lyapunov exponent of the logistic map at `growth`.
///
/// Averages `ln|growth * (1 - 2 x_t)|`, the log of the map derivative, over generations
/// `cutoff..gens`. Negative values mean nearby trajectories converge, positive ones that
/// they separate exponentially (chaos). An orbit passing exactly through 0.5 gives
/// negative infinity, a divergent one NaN or infinity.
///
/// # Errors
///
/// `InvalidArgument` when `gens` is zero or `cutoff >= gens`.
pub fn lyapunov_exponent(gens: usize, init: f64, growth: f64, cutoff: usize) -> Result<f64> {
    let seq = generate(gens, init, growth)?;
    let tail = seq.tail(cutoff);
    if tail.is_empty() {
        return Err(LogmapError::invalid(format!(
            "cutoff ({}) leaves no generation out of {}",
            cutoff, gens
        )));
    }

    let sum: f64 = tail.iter().map(|&x| (growth * (1.0 - 2.0 * x)).abs().ln()).sum();
    Ok(sum / tail.len() as f64)
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct LyapunovSample {
    pub growth: f64,
    pub exponent: f64,
}

/// Lyapunov exponent for each growth rate, computed in parallel, in `param_range` order
pub fn lyapunov_sweep(
    param_range: &[f64],
    gens: usize,
    init: f64,
    cutoff: usize,
    thread_number: usize,
) -> Result<Vec<LyapunovSample>> {
    let pool = ThreadPoolBuilder::new().num_threads(thread_number).build()?;

    let samples = pool.install(|| {
        param_range
            .par_iter()
            .map(|&growth| {
                lyapunov_exponent(gens, init, growth, cutoff).map(|exponent| LyapunovSample { growth, exponent })
            })
            .collect::<Result<Vec<LyapunovSample>>>()
    })?;

    debug!("Lyapunov sweep over {} growth rates", samples.len());
    Ok(samples)
}

/// Growth rates where the exponent changes sign between consecutive samples (onset or end of chaos)
pub fn sign_changes(samples: &[LyapunovSample]) -> Vec<f64> {
    samples
        .windows(2)
        .filter(|w| w[0].exponent.is_finite() && w[1].exponent.is_finite())
        .filter(|w| (w[0].exponent > 0.0) != (w[1].exponent > 0.0))
        .map(|w| w[1].growth)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_divergence_chaotic_regime() {
        let trace = divergence(200, 0.2, 1e-9, 3.9).unwrap();
        assert_eq!(trace.difference.len(), 200);
        assert!((trace.difference[0] - 1e-9).abs() < 1e-15);
        let onset = trace.first_exceeding(0.1).expect("a chaotic run must drift away");
        assert!(onset > 20 && onset < 50, "onset at generation {}", onset);
    }

    #[test]
    fn test_divergence_stable_regime() {
        let trace = divergence(200, 0.2, 1e-6, 2.5).unwrap();
        assert_eq!(trace.first_exceeding(1e-3), None);
        assert!(trace.max_difference() < 1e-5);
        assert!(trace.difference[199] < 1e-12, "both runs converge to the same fixed point");
    }

    #[test]
    fn test_divergence_keeps_both_runs() {
        let trace = divergence(10, 0.3, 0.01, 3.0).unwrap();
        assert_eq!(trace.reference, generate(10, 0.3, 3.0).unwrap());
        assert_eq!(trace.perturbed.init(), Some(0.3 + 0.01));
    }

    #[test]
    fn test_divergence_zero_gens() {
        assert!(matches!(divergence(0, 0.3, 0.01, 3.0), Err(LogmapError::InvalidArgument(_))));
    }

    #[test]
    fn test_lyapunov_sign() {
        let stable = lyapunov_exponent(1000, 0.5, 2.5, 100).unwrap();
        assert!(stable < 0.0);
        assert!((stable - (0.5_f64).ln()).abs() < 1e-6, "fixed point 0.6 gives ln|2.5 * (1 - 1.2)| = ln 0.5");

        let chaotic = lyapunov_exponent(1000, 0.2, 4.0, 100).unwrap();
        assert!(chaotic > 0.0);
        assert!((chaotic - 2.0_f64.ln()).abs() < 0.05, "r = 4 has exponent ln 2, got {}", chaotic);

        assert!(lyapunov_exponent(1000, 0.5, 3.2, 100).unwrap() < 0.0);
        assert!(lyapunov_exponent(1000, 0.5, 3.9, 100).unwrap() > 0.0);
    }

    #[test]
    fn test_lyapunov_invalid_cutoff() {
        assert!(matches!(lyapunov_exponent(10, 0.5, 3.9, 10), Err(LogmapError::InvalidArgument(_))));
        assert!(matches!(lyapunov_exponent(0, 0.5, 3.9, 0), Err(LogmapError::InvalidArgument(_))));
    }

    #[test]
    fn test_lyapunov_sweep_order_and_sign_changes() {
        let range = [2.5, 3.2, 3.5, 3.9, 3.83, 3.95];
        let samples = lyapunov_sweep(&range, 1000, 0.5, 100, 3).unwrap();
        let growths: Vec<f64> = samples.iter().map(|s| s.growth).collect();
        assert_eq!(growths, range.to_vec());
        for sample in &samples {
            assert_eq!(sample.exponent, lyapunov_exponent(1000, 0.5, sample.growth, 100).unwrap());
        }
        // stable -> chaotic at 3.9, back to the period-3 window at 3.83, chaotic again at 3.95
        assert_eq!(sign_changes(&samples), vec![3.9, 3.83, 3.95]);
    }
}
