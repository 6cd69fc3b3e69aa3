use log::debug;
use rayon::prelude::*;
use rayon::ThreadPoolBuilder;
use serde::{Deserialize, Serialize};

use crate::error::{LogmapError, Result};
use crate::logistic::generate;
use crate::utils;

/// One point of a bifurcation diagram: a growth rate and a post-transient population value
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct SamplePoint {
    pub growth: f64,
    pub population: f64,
}

/// Ordered growth rates over which sequences are regenerated
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ParameterSweep {
    values: Vec<f64>,
}

impl ParameterSweep {
    /// `steps` evenly spaced growth rates between `start` and `stop` (both included)
    pub fn linspace(start: f64, stop: f64, steps: usize) -> ParameterSweep {
        ParameterSweep { values: utils::linspace(start, stop, steps) }
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl From<Vec<f64>> for ParameterSweep {
    fn from(values: Vec<f64>) -> Self {
        ParameterSweep { values }
    }
}

impl AsRef<[f64]> for ParameterSweep {
    fn as_ref(&self) -> &[f64] {
        &self.values
    }
}

/// Long-run behaviour of the map for one growth rate
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Regime {
    /// Converges to a single value
    FixedPoint,
    /// Cycles through `period` values
    Periodic { period: usize },
    /// No period up to the searched limit
    Chaotic,
    /// Escaped to infinity or NaN
    Divergent,
}

impl Regime {
    /// Number of distinct values visited on the attractor, None when not periodic
    pub fn period(&self) -> Option<usize> {
        match self {
            Regime::FixedPoint => Some(1),
            Regime::Periodic { period } => Some(*period),
            Regime::Chaotic | Regime::Divergent => None,
        }
    }
}

impl std::fmt::Display for Regime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Regime::FixedPoint => write!(f, "fixed point"),
            Regime::Periodic { period } => write!(f, "period {}", period),
            Regime::Chaotic => write!(f, "chaotic"),
            Regime::Divergent => write!(f, "divergent"),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct RegimeSample {
    pub growth: f64,
    pub regime: Regime,
}

//-----------------------------------------------------------------------------
// Sampling

fn filtered_points(gens: usize, cutoff: usize, init: f64, growth: f64) -> Result<Vec<SamplePoint>> {
    let seq = generate(gens, init, growth)?;
    Ok(seq
        .tail(cutoff)
        .iter()
        .map(|&population| SamplePoint { growth, population })
        .collect())
}

/// Samples the bifurcation diagram of the logistic map.
///
/// For every growth rate of `param_range`, a sequence of `gens` generations is generated
/// from `init` and the values of generations `cutoff..gens` are emitted. The first `cutoff`
/// generations are the transient: they still carry the initial condition and are dropped.
///
/// Points are ordered by growth rate (in `param_range` order), then by generation.
/// A `cutoff >= gens` produces no point.
///
/// # Errors
///
/// `InvalidArgument` when `gens` is zero.
pub fn sweep_and_filter(param_range: &[f64], gens: usize, cutoff: usize, init: f64) -> Result<Vec<SamplePoint>> {
    if gens == 0 {
        return Err(LogmapError::invalid("the number of generations must be at least 1"));
    }

    let mut points = Vec::with_capacity(param_range.len() * gens.saturating_sub(cutoff));
    for &growth in param_range {
        points.extend(filtered_points(gens, cutoff, init, growth)?);
    }
    Ok(points)
}

/// Same result and ordering as [`sweep_and_filter`], each growth rate being computed on a
/// rayon pool of `thread_number` threads.
pub fn par_sweep_and_filter(
    param_range: &[f64],
    gens: usize,
    cutoff: usize,
    init: f64,
    thread_number: usize,
) -> Result<Vec<SamplePoint>> {
    if gens == 0 {
        return Err(LogmapError::invalid("the number of generations must be at least 1"));
    }

    let pool = ThreadPoolBuilder::new().num_threads(thread_number).build()?;

    let per_growth: Vec<Vec<SamplePoint>> = pool.install(|| {
        param_range
            .par_iter()
            .map(|&growth| filtered_points(gens, cutoff, init, growth))
            .collect::<Result<Vec<Vec<SamplePoint>>>>()
    })?;

    debug!(
        "Bifurcation sweep over {} growth rates on {} threads",
        param_range.len(),
        pool.current_num_threads()
    );

    Ok(per_growth.into_iter().flatten().collect())
}

//-----------------------------------------------------------------------------
// Regime classification

/// Finds the regime of a post-transient tail.
///
/// The period is the smallest `p <= max_period` for which every value matches the value
/// `p` generations later within `tolerance`. Any non-finite value makes the tail divergent.
///
/// # Errors
///
/// `InvalidArgument` when `max_period` is zero or when the tail holds fewer than
/// `2 * max_period` values (a cycle must be seen at least twice).
pub fn classify_regime(tail: &[f64], tolerance: f64, max_period: usize) -> Result<Regime> {
    if max_period == 0 {
        return Err(LogmapError::invalid("max_period must be at least 1"));
    }
    if tail.len() < 2 * max_period {
        return Err(LogmapError::invalid(format!(
            "{} post-transient values cannot reveal a period up to {} (at least {} needed)",
            tail.len(),
            max_period,
            2 * max_period
        )));
    }

    if tail.iter().any(|x| !x.is_finite()) {
        return Ok(Regime::Divergent);
    }

    for period in 1..=max_period {
        let cyclic = tail
            .iter()
            .zip(tail.iter().skip(period))
            .all(|(a, b)| (a - b).abs() <= tolerance);
        if cyclic {
            return Ok(if period == 1 { Regime::FixedPoint } else { Regime::Periodic { period } });
        }
    }

    Ok(Regime::Chaotic)
}

/// Classifies the regime of every growth rate of `param_range` from generations `cutoff..gens`.
pub fn regimes(
    param_range: &[f64],
    gens: usize,
    cutoff: usize,
    init: f64,
    tolerance: f64,
    max_period: usize,
) -> Result<Vec<RegimeSample>> {
    if cutoff >= gens {
        return Err(LogmapError::invalid(format!(
            "cutoff ({}) must be lower than the number of generations ({})",
            cutoff, gens
        )));
    }

    param_range
        .iter()
        .map(|&growth| {
            let seq = generate(gens, init, growth)?;
            let regime = classify_regime(seq.tail(cutoff), tolerance, max_period)?;
            Ok(RegimeSample { growth, regime })
        })
        .collect()
}

/// Consecutive growth rates whose regimes differ, as (growth before, growth after, regime before, regime after).
/// On an increasing sweep this locates the period-doubling cascade.
pub fn regime_transitions(samples: &[RegimeSample]) -> Vec<(f64, f64, Regime, Regime)> {
    samples
        .windows(2)
        .filter(|w| w[0].regime != w[1].regime)
        .map(|w| (w[0].growth, w[1].growth, w[0].regime, w[1].regime))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sweep_and_filter_keeps_post_cutoff_generations() {
        let points = sweep_and_filter(&[2.0], 10, 5, 0.5).unwrap();
        assert_eq!(points.len(), 5, "generations 5 to 9 should be kept");
        assert!(points.iter().all(|p| p.growth == 2.0));

        let seq = generate(10, 0.5, 2.0).unwrap();
        for (k, p) in points.iter().enumerate() {
            assert_eq!(p.population, seq.values()[5 + k]);
        }
    }

    #[test]
    fn test_sweep_and_filter_ordering() {
        let range = [2.5, 3.2, 3.9];
        let points = sweep_and_filter(&range, 20, 15, 0.5).unwrap();
        assert_eq!(points.len(), 15);
        for (i, chunk) in points.chunks(5).enumerate() {
            assert!(chunk.iter().all(|p| p.growth == range[i]), "points must follow the sweep order");
        }
    }

    #[test]
    fn test_sweep_and_filter_cutoff_beyond_gens() {
        let points = sweep_and_filter(&[2.0, 3.0], 10, 10, 0.5).unwrap();
        assert!(points.is_empty());
        let points = sweep_and_filter(&[2.0], 10, 0, 0.5).unwrap();
        assert_eq!(points.len(), 10);
    }

    #[test]
    fn test_sweep_and_filter_zero_gens() {
        assert!(matches!(sweep_and_filter(&[2.0], 0, 0, 0.5), Err(LogmapError::InvalidArgument(_))));
        assert!(matches!(par_sweep_and_filter(&[2.0], 0, 0, 0.5, 2), Err(LogmapError::InvalidArgument(_))));
    }

    #[test]
    fn test_sweep_and_filter_empty_range() {
        assert!(sweep_and_filter(&[], 10, 2, 0.5).unwrap().is_empty());
    }

    #[test]
    fn test_par_sweep_matches_sequential() {
        let sweep = ParameterSweep::linspace(2.4, 4.0, 97);
        let sequential = sweep_and_filter(sweep.values(), 300, 200, 0.5).unwrap();
        let parallel = par_sweep_and_filter(sweep.values(), 300, 200, 0.5, 4).unwrap();
        assert_eq!(sequential.len(), 97 * 100);
        let bits = |v: &Vec<SamplePoint>| -> Vec<(u64, u64)> {
            v.iter().map(|p| (p.growth.to_bits(), p.population.to_bits())).collect()
        };
        assert_eq!(bits(&sequential), bits(&parallel));
    }

    #[test]
    fn test_parameter_sweep() {
        let sweep = ParameterSweep::linspace(2.0, 4.0, 3);
        assert_eq!(sweep.values(), &[2.0, 3.0, 4.0]);
        assert_eq!(sweep.len(), 3);
        let explicit = ParameterSweep::from(vec![3.2, 2.8]);
        assert_eq!(explicit.as_ref(), &[3.2, 2.8]);
        assert!(ParameterSweep::linspace(2.0, 4.0, 0).is_empty());
    }

    #[test]
    fn test_classify_known_regimes() {
        let classify = |growth: f64| {
            let seq = generate(1000, 0.5, growth).unwrap();
            classify_regime(seq.tail(900), 1e-6, 16).unwrap()
        };
        assert_eq!(classify(2.8), Regime::FixedPoint);
        assert_eq!(classify(3.2), Regime::Periodic { period: 2 });
        assert_eq!(classify(3.5), Regime::Periodic { period: 4 });
        assert_eq!(classify(3.56), Regime::Periodic { period: 8 });
        assert_eq!(classify(3.83), Regime::Periodic { period: 3 });
        assert_eq!(classify(3.9), Regime::Chaotic);
    }

    #[test]
    fn test_classify_divergent() {
        let seq = generate(200, 0.5, 5.0).unwrap();
        assert_eq!(classify_regime(seq.tail(100), 1e-6, 8).unwrap(), Regime::Divergent);
    }

    #[test]
    fn test_classify_rejects_short_tail() {
        assert!(classify_regime(&[0.5, 0.5, 0.5], 1e-6, 2).is_err());
        assert!(classify_regime(&[], 1e-6, 1).is_err());
        assert!(classify_regime(&[0.5, 0.5], 1e-6, 0).is_err());
    }

    #[test]
    fn test_regimes_and_transitions() {
        let samples = regimes(&[2.8, 2.9, 3.2, 3.3, 3.5], 1000, 900, 0.5, 1e-6, 16).unwrap();
        let periods: Vec<Option<usize>> = samples.iter().map(|s| s.regime.period()).collect();
        assert_eq!(periods, vec![Some(1), Some(1), Some(2), Some(2), Some(4)]);

        let transitions = regime_transitions(&samples);
        assert_eq!(transitions.len(), 2);
        assert_eq!(transitions[0].0, 2.9);
        assert_eq!(transitions[0].1, 3.2);
        assert_eq!(transitions[1].3, Regime::Periodic { period: 4 });
    }

    #[test]
    fn test_regimes_rejects_cutoff_beyond_gens() {
        assert!(matches!(regimes(&[3.0], 100, 100, 0.5, 1e-6, 4), Err(LogmapError::InvalidArgument(_))));
    }

    #[test]
    fn test_regime_display() {
        assert_eq!(Regime::Periodic { period: 4 }.to_string(), "period 4");
        assert_eq!(Regime::Chaotic.to_string(), "chaotic");
        assert_eq!(Regime::Chaotic.period(), None);
    }
}
