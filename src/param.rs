use log::warn;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fs::File;
use std::io::BufReader;

use crate::bifurcation::ParameterSweep;
use crate::logistic::DEFAULT_INIT;

/// Analyses that a run can chain, executed in the listed order
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[allow(non_camel_case_types)]
pub enum Analysis {
    sequence,
    bifurcation,
    poincare,
    sensitivity,
    lyapunov,
}

// Field definitions and associated default values

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Param {
    #[serde(default)]
    pub general: General,
    #[serde(default)]
    pub sequence: SequenceParam,
    #[serde(default)]
    pub bifurcation: Bifurcation,
    #[serde(default)]
    pub poincare: Poincare,
    #[serde(default)]
    pub sensitivity: Sensitivity,
    #[serde(default)]
    pub lyapunov: Lyapunov,
    #[serde(default)]
    pub plot: Plot,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct General {
    #[serde(default = "seed_default")]
    pub seed: u64,
    #[serde(default = "analyses_default")]
    pub analyses: Vec<Analysis>,
    #[serde(default = "one_default")]
    pub thread_number: usize,
    #[serde(default = "log_base_default")]
    pub log_base: String,
    #[serde(default = "log_suffix_default")]
    pub log_suffix: String,
    #[serde(default = "log_level_default")]
    pub log_level: String,
    #[serde(default = "true_default")]
    pub display_colorful: bool,
    #[serde(default = "empty_string")]
    pub save_exp: String,
    #[serde(default = "empty_string")]
    pub export_dir: String,
}

// Generation counts are signed so that negative values in the YAML file reach validate()
// and get a readable message instead of a deserialisation error.

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct SequenceParam {
    #[serde(default = "sequence_gens_default")]
    pub gens: i64,
    #[serde(default = "init_default")]
    pub init: f64,
    #[serde(default = "sequence_growth_default")]
    pub growth: f64,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Bifurcation {
    #[serde(default = "r_start_default")]
    pub r_start: f64,
    #[serde(default = "r_stop_default")]
    pub r_stop: f64,
    #[serde(default = "r_steps_default")]
    pub r_steps: usize,
    /// When not empty, replaces the r_start/r_stop/r_steps grid
    #[serde(default = "empty_rates")]
    pub growth_rates: Vec<f64>,
    #[serde(default = "bifurcation_gens_default")]
    pub gens: i64,
    #[serde(default = "bifurcation_cutoff_default")]
    pub cutoff: usize,
    #[serde(default = "init_default")]
    pub init: f64,
    #[serde(default = "tolerance_default")]
    pub tolerance: f64,
    #[serde(default = "max_period_default")]
    pub max_period: usize,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Poincare {
    #[serde(default = "poincare_gens_default")]
    pub gens: i64,
    #[serde(default = "poincare_rates_default")]
    pub growth_rates: Vec<f64>,
    #[serde(default = "init_default")]
    pub init: f64,
    #[serde(default = "lag_default")]
    pub lag: usize,
    #[serde(default = "true_default")]
    pub skip_initial: bool,
    #[serde(default = "true_default")]
    pub random_reference: bool,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Sensitivity {
    #[serde(default = "sensitivity_gens_default")]
    pub gens: i64,
    #[serde(default = "sensitivity_growth_default")]
    pub growth: f64,
    #[serde(default = "sensitivity_init_default")]
    pub init: f64,
    #[serde(default = "perturbation_default")]
    pub perturbation: f64,
    #[serde(default = "threshold_default")]
    pub threshold: f64,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Lyapunov {
    #[serde(default = "r_start_default")]
    pub r_start: f64,
    #[serde(default = "r_stop_default")]
    pub r_stop: f64,
    #[serde(default = "r_steps_default")]
    pub r_steps: usize,
    #[serde(default = "bifurcation_gens_default")]
    pub gens: i64,
    #[serde(default = "bifurcation_cutoff_default")]
    pub cutoff: usize,
    #[serde(default = "sensitivity_init_default")]
    pub init: f64,
}

/// Axis labels handed to whatever tool plots the exported files
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Plot {
    #[serde(default = "growth_label_default")]
    pub growth_label: String,
    #[serde(default = "population_label_default")]
    pub population_label: String,
    #[serde(default = "generation_label_default")]
    pub generation_label: String,
}

// Default section definitions

impl Default for General {
    fn default() -> Self {
        serde_json::from_value(serde_json::json!({})).unwrap()
    }
}

impl Default for SequenceParam {
    fn default() -> Self {
        serde_json::from_value(serde_json::json!({})).unwrap()
    }
}

impl Default for Bifurcation {
    fn default() -> Self {
        serde_json::from_value(serde_json::json!({})).unwrap()
    }
}

impl Default for Poincare {
    fn default() -> Self {
        serde_json::from_value(serde_json::json!({})).unwrap()
    }
}

impl Default for Sensitivity {
    fn default() -> Self {
        serde_json::from_value(serde_json::json!({})).unwrap()
    }
}

impl Default for Lyapunov {
    fn default() -> Self {
        serde_json::from_value(serde_json::json!({})).unwrap()
    }
}

impl Default for Plot {
    fn default() -> Self {
        serde_json::from_value(serde_json::json!({})).unwrap()
    }
}

impl Default for Param {
    fn default() -> Self {
        serde_json::from_value(serde_json::json!({})).unwrap()
    }
}

impl Param {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Bifurcation {
    /// Growth rates to sweep: the explicit list when given, the linear grid otherwise
    pub fn sweep(&self) -> ParameterSweep {
        if self.growth_rates.is_empty() {
            ParameterSweep::linspace(self.r_start, self.r_stop, self.r_steps)
        } else {
            ParameterSweep::from(self.growth_rates.clone())
        }
    }
}

impl Lyapunov {
    pub fn sweep(&self) -> ParameterSweep {
        ParameterSweep::linspace(self.r_start, self.r_stop, self.r_steps)
    }
}

pub fn get(param_file: String) -> Result<Param, Box<dyn Error>> {
    let param_file_reader = File::open(param_file)?;
    let param_reader = BufReader::new(param_file_reader);

    let mut config: Param = serde_yaml::from_reader(param_reader)?;

    validate(&mut config)?;

    Ok(config)
}

pub fn validate(param: &mut Param) -> Result<(), String> {
    if !param.general.log_base.is_empty() {
        param.general.display_colorful = false;
    }

    if param.general.analyses.is_empty() {
        warn!("No analysis requested: the experiment will only hold its parameters.");
    }

    validate_gens("sequence", param.sequence.gens)?;
    validate_gens("bifurcation", param.bifurcation.gens)?;
    validate_gens("poincare", param.poincare.gens)?;
    validate_gens("sensitivity", param.sensitivity.gens)?;
    validate_gens("lyapunov", param.lyapunov.gens)?;

    let b = &param.bifurcation;
    validate_sweep("bifurcation", b.r_start, b.r_stop, b.r_steps, !b.growth_rates.is_empty())?;
    let l = &param.lyapunov;
    validate_sweep("lyapunov", l.r_start, l.r_stop, l.r_steps, false)?;

    if param.bifurcation.cutoff as i64 >= param.bifurcation.gens {
        warn!(
            "bifurcation.cutoff={} >= bifurcation.gens={}: the diagram will be empty.",
            param.bifurcation.cutoff, param.bifurcation.gens
        );
    }

    if param.bifurcation.max_period == 0 {
        return Err("Invalid bifurcation.max_period=0. Must be >= 1.".to_string());
    }

    if (param.bifurcation.gens - param.bifurcation.cutoff as i64) < 2 * param.bifurcation.max_period as i64 {
        warn!(
            "Only {} post-transient generations for periods up to {}: regimes will not be classified.",
            (param.bifurcation.gens - param.bifurcation.cutoff as i64).max(0),
            param.bifurcation.max_period
        );
    }

    if param.bifurcation.tolerance < 0.0 {
        return Err(format!(
            "Invalid bifurcation.tolerance={:e}. Must be >= 0.",
            param.bifurcation.tolerance
        ));
    }

    if param.lyapunov.cutoff as i64 >= param.lyapunov.gens {
        return Err(format!(
            "Invalid lyapunov.cutoff={}. Must be lower than lyapunov.gens={}.",
            param.lyapunov.cutoff, param.lyapunov.gens
        ));
    }

    if param.poincare.lag == 0 {
        return Err("Invalid poincare.lag=0. Must be >= 1 (2 for pairs, 3 for the attractor embedding).".to_string());
    }

    if param.sensitivity.threshold <= 0.0 {
        return Err(format!(
            "Invalid sensitivity.threshold={:e}. Must be > 0.",
            param.sensitivity.threshold
        ));
    }

    if param.sensitivity.perturbation == 0.0 {
        warn!("sensitivity.perturbation=0: both runs are identical and will never diverge.");
    }

    let mut rates = vec![
        param.sequence.growth,
        param.sensitivity.growth,
        param.lyapunov.r_start,
        param.lyapunov.r_stop,
    ];
    rates.extend(param.poincare.growth_rates.iter());
    rates.extend(param.bifurcation.sweep().values().iter());
    if rates.iter().any(|r| !(0.0..=4.0).contains(r)) {
        warn!("Growth rates outside [0, 4] requested: populations may leave [0, 1] and diverge.");
    }

    Ok(())
}

fn validate_gens(section: &str, gens: i64) -> Result<(), String> {
    if gens < 1 {
        return Err(format!("Invalid {}.gens={}. Must be >= 1.", section, gens));
    }
    Ok(())
}

fn validate_sweep(section: &str, start: f64, stop: f64, steps: usize, explicit: bool) -> Result<(), String> {
    if explicit {
        return Ok(());
    }

    if steps == 0 {
        return Err(format!("Invalid {}.r_steps=0. Must be >= 1.", section));
    }

    if start > stop {
        return Err(format!(
            "Invalid {} range: r_start={} > r_stop={}.",
            section, start, stop
        ));
    }

    Ok(())
}

// Default value definitions

fn seed_default() -> u64 {
    4815162342
}
fn empty_string() -> String {
    "".to_string()
}
fn empty_rates() -> Vec<f64> {
    Vec::new()
}
fn analyses_default() -> Vec<Analysis> {
    vec![Analysis::sequence, Analysis::bifurcation, Analysis::poincare, Analysis::sensitivity, Analysis::lyapunov]
}
fn log_base_default() -> String {
    "".to_string()
}
fn log_suffix_default() -> String {
    "log".to_string()
}
fn log_level_default() -> String {
    "info".to_string()
}
fn true_default() -> bool {
    true
}
fn one_default() -> usize {
    1
}
fn init_default() -> f64 {
    DEFAULT_INIT
}
fn sequence_gens_default() -> i64 {
    100
}
fn sequence_growth_default() -> f64 {
    3.7
}
fn r_start_default() -> f64 {
    2.4
}
fn r_stop_default() -> f64 {
    4.0
}
fn r_steps_default() -> usize {
    400
}
fn bifurcation_gens_default() -> i64 {
    1000
}
fn bifurcation_cutoff_default() -> usize {
    900
}
fn tolerance_default() -> f64 {
    1e-6
}
fn max_period_default() -> usize {
    16
}
fn poincare_gens_default() -> i64 {
    500
}
fn poincare_rates_default() -> Vec<f64> {
    vec![3.5, 3.83, 3.9, 4.0]
}
fn lag_default() -> usize {
    2
}
fn sensitivity_gens_default() -> i64 {
    60
}
fn sensitivity_growth_default() -> f64 {
    3.9
}
fn sensitivity_init_default() -> f64 {
    0.2
}
fn perturbation_default() -> f64 {
    1e-9
}
fn threshold_default() -> f64 {
    0.1
}
fn growth_label_default() -> String {
    "growth rate".to_string()
}
fn population_label_default() -> String {
    "population".to_string()
}
fn generation_label_default() -> String {
    "generation".to_string()
}
