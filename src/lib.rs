pub mod bifurcation;
pub mod error;
pub mod experiment;
pub mod logistic;
pub mod param;
pub mod poincare;
pub mod sensitivity;
pub mod utils;

use chrono::Local;
use log::{debug, warn};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::bifurcation::{par_sweep_and_filter, regimes};
use crate::error::{LogmapError, Result};
use crate::experiment::{BifurcationResult, Experiment};
use crate::logistic::{generate, Sequence};
use crate::param::{Analysis, Param};
use crate::poincare::{poincare_embedding, random_reference, PoincareSet};
use crate::sensitivity::{divergence, lyapunov_sweep, DivergenceTrace, LyapunovSample};

pub fn version() -> String {
    format!("{}#{}", env!("CARGO_PKG_VERSION"), option_env!("LOGMAP_GIT_SHA").unwrap_or("unknown"))
}

/// Runs every analysis listed in `param.general.analyses`, in order.
///
/// `running` is checked between analyses: once it is cleared (signal received) the remaining
/// analyses are skipped and the partial experiment is returned.
pub fn run(param: &Param, running: Arc<AtomicBool>) -> Result<Experiment> {
    let start = std::time::Instant::now();
    let timestamp = Local::now().format("%Y-%m-%d_%H-%M-%S").to_string();

    let stem = if param.general.save_exp.is_empty() {
        "logmap"
    } else {
        param.general.save_exp.split('.').next().unwrap_or("logmap")
    };
    let mut exp = Experiment::new(format!("{}_{}", stem, timestamp), version(), timestamp.clone(), param.clone());

    let mut rng = ChaCha8Rng::seed_from_u64(param.general.seed);

    for analysis in &param.general.analyses {
        if !running.load(Ordering::Relaxed) {
            warn!("Signal received, remaining analyses are skipped");
            break;
        }

        let step_start = std::time::Instant::now();
        match analysis {
            Analysis::sequence => exp.sequence = Some(run_sequence(param)?),
            Analysis::bifurcation => exp.bifurcation = Some(run_bifurcation(param)?),
            Analysis::poincare => {
                let (sets, reference) = run_poincare(param, &mut rng)?;
                exp.poincare = Some(sets);
                exp.random_reference = reference;
            }
            Analysis::sensitivity => exp.sensitivity = Some(run_sensitivity(param)?),
            Analysis::lyapunov => exp.lyapunov = Some(run_lyapunov(param)?),
        }
        debug!("{:?} analysis computed in {:.2?}", analysis, step_start.elapsed());
    }

    exp.execution_time = start.elapsed().as_secs_f64();
    Ok(exp)
}

/// Converts a configured generation count, rejecting non-positive values
fn generation_count(section: &str, gens: i64) -> Result<usize> {
    if gens < 1 {
        return Err(LogmapError::invalid(format!("{}.gens must be at least 1 (got {})", section, gens)));
    }
    Ok(gens as usize)
}

pub fn run_sequence(param: &Param) -> Result<Sequence> {
    let p = &param.sequence;
    cinfo!(
        param.general.display_colorful,
        "\x1b[1;93mSequence\x1b[0m r={} x0={} over {} generations",
        p.growth,
        p.init,
        p.gens
    );
    generate(generation_count("sequence", p.gens)?, p.init, p.growth)
}

pub fn run_bifurcation(param: &Param) -> Result<BifurcationResult> {
    let p = &param.bifurcation;
    let gens = generation_count("bifurcation", p.gens)?;
    let sweep = p.sweep();
    cinfo!(
        param.general.display_colorful,
        "\x1b[1;93mBifurcation\x1b[0m {} growth rates in [{}, {}], generations {}..{}",
        sweep.len(),
        sweep.values().first().copied().unwrap_or(f64::NAN),
        sweep.values().last().copied().unwrap_or(f64::NAN),
        p.cutoff,
        gens
    );

    let points = par_sweep_and_filter(sweep.values(), gens, p.cutoff, p.init, param.general.thread_number)?;

    let regimes = if gens.saturating_sub(p.cutoff) >= 2 * p.max_period {
        Some(regimes(sweep.values(), gens, p.cutoff, p.init, p.tolerance, p.max_period)?)
    } else {
        warn!("Post-transient window too short to classify regimes up to period {}", p.max_period);
        None
    };

    Ok(BifurcationResult { points, regimes })
}

/// Poincaré tuples for every configured growth rate, plus the uniform reference when requested.
/// The reference holds as many tuples as each growth rate.
pub fn run_poincare(param: &Param, rng: &mut ChaCha8Rng) -> Result<(Vec<PoincareSet>, Option<Vec<Vec<f64>>>)> {
    let p = &param.poincare;
    let gens = generation_count("poincare", p.gens)?;
    cinfo!(
        param.general.display_colorful,
        "\x1b[1;93mPoincare\x1b[0m lag {} for r in {:?}",
        p.lag,
        p.growth_rates
    );

    let sets = p
        .growth_rates
        .iter()
        .map(|&growth| {
            poincare_embedding(gens, growth, p.init, p.lag, p.skip_initial)
                .map(|points| PoincareSet { growth, lag: p.lag, points })
        })
        .collect::<Result<Vec<PoincareSet>>>()?;

    let reference = if p.random_reference {
        let draws = if p.skip_initial { gens - 1 } else { gens };
        Some(random_reference(draws, p.lag, rng)?)
    } else {
        None
    };

    Ok((sets, reference))
}

pub fn run_sensitivity(param: &Param) -> Result<DivergenceTrace> {
    let p = &param.sensitivity;
    let trace = divergence(generation_count("sensitivity", p.gens)?, p.init, p.perturbation, p.growth)?;
    match trace.first_exceeding(p.threshold) {
        Some(generation) => cinfo!(
            param.general.display_colorful,
            "\x1b[1;93mSensitivity\x1b[0m r={}: x0={} and x0+{:e} differ by more than {} at generation {}",
            p.growth,
            p.init,
            p.perturbation,
            p.threshold,
            generation
        ),
        None => cinfo!(
            param.general.display_colorful,
            "\x1b[1;93mSensitivity\x1b[0m r={}: runs stay within {} over {} generations",
            p.growth,
            p.threshold,
            p.gens
        ),
    }
    Ok(trace)
}

pub fn run_lyapunov(param: &Param) -> Result<Vec<LyapunovSample>> {
    let p = &param.lyapunov;
    let sweep = p.sweep();
    cinfo!(
        param.general.display_colorful,
        "\x1b[1;93mLyapunov\x1b[0m {} growth rates in [{}, {}]",
        sweep.len(),
        p.r_start,
        p.r_stop
    );
    let gens = generation_count("lyapunov", p.gens)?;
    lyapunov_sweep(sweep.values(), gens, p.init, p.cutoff, param.general.thread_number)
}
