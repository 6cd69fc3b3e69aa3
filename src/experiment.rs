use log::warn;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::bifurcation::{regime_transitions, Regime, RegimeSample, SamplePoint};
use crate::error::Result;
use crate::logistic::Sequence;
use crate::param::{Param, Plot};
use crate::poincare::PoincareSet;
use crate::sensitivity::{sign_changes, DivergenceTrace, LyapunovSample};
use crate::utils::{finite_range, mean_and_std};

//-----------------------------------------------------------------------------
// Result structures

/// Bifurcation diagram samples and, when the tail was long enough, the regime of each growth rate
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct BifurcationResult {
    pub points: Vec<SamplePoint>,
    pub regimes: Option<Vec<RegimeSample>>,
}

/// Everything a run produced, with the parameters and provenance needed to reproduce it
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Experiment {
    pub id: String,
    pub logmap_version: String,
    pub timestamp: String,
    pub execution_time: f64,
    pub parameters: Param,

    pub sequence: Option<Sequence>,
    pub bifurcation: Option<BifurcationResult>,
    pub poincare: Option<Vec<PoincareSet>>,
    pub random_reference: Option<Vec<Vec<f64>>>,
    pub sensitivity: Option<DivergenceTrace>,
    pub lyapunov: Option<Vec<LyapunovSample>>,
}

impl Experiment {
    pub fn new(id: String, logmap_version: String, timestamp: String, parameters: Param) -> Experiment {
        Experiment {
            id,
            logmap_version,
            timestamp,
            execution_time: 0.0,
            parameters,
            sequence: None,
            bifurcation: None,
            poincare: None,
            random_reference: None,
            sensitivity: None,
            lyapunov: None,
        }
    }

    /// Human readable summary of the available results
    pub fn display_results(&self) -> String {
        let colorful = self.parameters.general.display_colorful;
        let title = |s: &str| {
            if colorful {
                format!("\x1b[1;93m{}\x1b[0m", s)
            } else {
                s.to_string()
            }
        };

        let mut str = format!("Experiment {} (logmap {}, {:.3}s)", self.id, self.logmap_version, self.execution_time);

        if let Some(seq) = &self.sequence {
            let (mean, std) = mean_and_std(seq.values());
            str = format!(
                "{}\n{} r={} x0={} | {} generations | last {:.6} | mean {:.4} | std {:.4}",
                str,
                title("Sequence"),
                seq.growth(),
                seq.init().unwrap_or(f64::NAN),
                seq.len(),
                seq.last().unwrap_or(f64::NAN),
                mean,
                std
            );
        }

        if let Some(bifurcation) = &self.bifurcation {
            let populations: Vec<f64> = bifurcation.points.iter().map(|p| p.population).collect();
            let range = finite_range(&populations)
                .map(|(lo, hi)| format!("[{:.4}, {:.4}]", lo, hi))
                .unwrap_or_else(|| "none".to_string());
            str = format!(
                "{}\n{} {} points | population range {}",
                str,
                title("Bifurcation"),
                bifurcation.points.len(),
                range
            );

            if let Some(regimes) = &bifurcation.regimes {
                let chaotic = regimes.iter().filter(|s| s.regime == Regime::Chaotic).count();
                str = format!("{} | {}/{} chaotic growth rates", str, chaotic, regimes.len());
                let shown = self.parameters.bifurcation.max_period;
                for (before, after, from, to) in regime_transitions(regimes).iter().take(shown) {
                    str = format!("{}\n  {} -> {} between r={:.4} and r={:.4}", str, from, to, before, after);
                }
            }
        }

        if let Some(sets) = &self.poincare {
            for set in sets {
                str = format!(
                    "{}\n{} r={} | {} tuples of width {}",
                    str,
                    title("Poincare"),
                    set.growth,
                    set.points.len(),
                    set.lag
                );
            }
        }

        if let Some(reference) = &self.random_reference {
            str = format!("{}\n{} {} uniform tuples", str, title("Random reference"), reference.len());
        }

        if let Some(trace) = &self.sensitivity {
            let threshold = self.parameters.sensitivity.threshold;
            let onset = match trace.first_exceeding(threshold) {
                Some(generation) => format!("runs differ by more than {} from generation {}", threshold, generation),
                None => format!("runs stay within {}", threshold),
            };
            str = format!(
                "{}\n{} r={} perturbation {:e} | {} | max difference {:.4}",
                str,
                title("Sensitivity"),
                trace.growth,
                trace.perturbation,
                onset,
                trace.max_difference()
            );
        }

        if let Some(samples) = &self.lyapunov {
            let positive = samples.iter().filter(|s| s.exponent > 0.0).count();
            let changes: Vec<String> = sign_changes(samples).iter().map(|r| format!("{:.4}", r)).collect();
            str = format!(
                "{}\n{} {}/{} growth rates with a positive exponent | sign changes at r = {}",
                str,
                title("Lyapunov"),
                positive,
                samples.len(),
                if changes.is_empty() { "none".to_string() } else { changes.join(", ") }
            );
        }

        str
    }

    //-----------------------------------------------------------------------------
    // TSV export

    /// Writes every available result as a tab-separated file in `dir` (created if needed),
    /// using the plot labels as column headers. Returns the written paths.
    pub fn export_tsv<P: AsRef<Path>>(&self, dir: P) -> Result<Vec<PathBuf>> {
        let dir = dir.as_ref();
        std::fs::create_dir_all(dir)?;
        let labels = &self.parameters.plot;
        let mut written = Vec::new();

        if let Some(seq) = &self.sequence {
            let path = dir.join("sequence.tsv");
            let rows = seq.iter().enumerate().map(|(g, x)| vec![g.to_string(), x.to_string()]);
            write_tsv(&path, &[labels.generation_label.as_str(), labels.population_label.as_str()], rows)?;
            written.push(path);
        }

        if let Some(bifurcation) = &self.bifurcation {
            let path = dir.join("bifurcation.tsv");
            let rows = bifurcation.points.iter().map(|p| vec![p.growth.to_string(), p.population.to_string()]);
            write_tsv(&path, &[labels.growth_label.as_str(), labels.population_label.as_str()], rows)?;
            written.push(path);

            if let Some(regimes) = &bifurcation.regimes {
                let path = dir.join("regimes.tsv");
                let rows = regimes.iter().map(|s| {
                    let period = s.regime.period().map(|p| p.to_string()).unwrap_or_default();
                    vec![s.growth.to_string(), s.regime.to_string(), period]
                });
                write_tsv(&path, &[labels.growth_label.as_str(), "regime", "period"], rows)?;
                written.push(path);
            }
        }

        if let Some(sets) = &self.poincare {
            for (index, set) in sets.iter().enumerate() {
                // indexed so that repeated growth rates do not overwrite each other
                let path = dir.join(format!("poincare_{}_{}.tsv", index, set.growth));
                let header = lagged_header(labels, set.lag);
                let header: Vec<&str> = header.iter().map(|s| s.as_str()).collect();
                let rows = set.points.iter().map(|t| t.iter().map(|x| x.to_string()).collect());
                write_tsv(&path, &header, rows)?;
                written.push(path);
            }
        }

        if let Some(reference) = &self.random_reference {
            let path = dir.join("random_reference.tsv");
            let width = reference.first().map(|t| t.len()).unwrap_or(self.parameters.poincare.lag);
            let header = lagged_header(labels, width);
            let header: Vec<&str> = header.iter().map(|s| s.as_str()).collect();
            let rows = reference.iter().map(|t| t.iter().map(|x| x.to_string()).collect());
            write_tsv(&path, &header, rows)?;
            written.push(path);
        }

        if let Some(trace) = &self.sensitivity {
            let path = dir.join("sensitivity.tsv");
            let rows = trace
                .reference
                .iter()
                .zip(trace.perturbed.iter())
                .zip(trace.difference.iter())
                .enumerate()
                .map(|(g, ((a, b), d))| vec![g.to_string(), a.to_string(), b.to_string(), d.to_string()]);
            write_tsv(&path, &[labels.generation_label.as_str(), "reference", "perturbed", "difference"], rows)?;
            written.push(path);
        }

        if let Some(samples) = &self.lyapunov {
            let path = dir.join("lyapunov.tsv");
            let rows = samples.iter().map(|s| vec![s.growth.to_string(), s.exponent.to_string()]);
            write_tsv(&path, &[labels.growth_label.as_str(), "lyapunov exponent"], rows)?;
            written.push(path);
        }

        Ok(written)
    }

    //-----------------------------------------------------------------------------
    // Persistence

    /// Saves in the format given by the extension, MessagePack (with a `.mp` extension) otherwise.
    pub fn save_auto<P: AsRef<Path>>(&self, path: P) -> std::result::Result<(), Box<dyn std::error::Error>> {
        let path = path.as_ref();
        match Format::from_path(path) {
            Some(format) => self.save(path, format),
            None => {
                warn!("Unknown format. Saving experiment in msgpack.");
                self.save(path.with_extension("mp"), Format::MessagePack)
            }
        }
    }

    pub fn save<P: AsRef<Path>>(&self, path: P, format: Format) -> std::result::Result<(), Box<dyn std::error::Error>> {
        let bytes = match format {
            Format::Json => {
                warn!(
                    "JSON stores non-finite values (divergent runs, superstable orbits) as null. \
                     Prefer msgpack to reload the experiment."
                );
                serde_json::to_vec_pretty(self)?
            }
            Format::MessagePack => {
                let mut buf = Vec::new();
                self.serialize(&mut rmp_serde::Serializer::new(&mut buf).with_struct_map())?;
                buf
            }
            Format::Bincode => bincode::serialize(self)?,
        };
        std::fs::write(path, bytes)?;
        Ok(())
    }

    /// Loads in the format given by the extension; unknown extensions try msgpack, bincode, then JSON.
    pub fn load_auto<P: AsRef<Path>>(path: P) -> std::result::Result<Self, Box<dyn std::error::Error>> {
        let path = path.as_ref();
        let bytes = std::fs::read(path)?;
        match Format::from_path(path) {
            Some(format) => Self::decode(&bytes, format),
            None => [Format::MessagePack, Format::Bincode, Format::Json]
                .into_iter()
                .find_map(|format| Self::decode(&bytes, format).ok())
                .ok_or_else(|| format!("Unable to load the experiment from {}", path.display()).into()),
        }
    }

    pub fn load<P: AsRef<Path>>(path: P, format: Format) -> std::result::Result<Self, Box<dyn std::error::Error>> {
        Self::decode(&std::fs::read(path)?, format)
    }

    fn decode(bytes: &[u8], format: Format) -> std::result::Result<Self, Box<dyn std::error::Error>> {
        let experiment: Experiment = match format {
            Format::Json => serde_json::from_slice(bytes)?,
            Format::MessagePack => rmp_serde::from_slice(bytes)?,
            Format::Bincode => bincode::deserialize(bytes)?,
        };
        Ok(experiment)
    }
}

/// On-disk encodings of an [`Experiment`]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Format {
    /// Human readable, loses non-finite values
    Json,
    MessagePack,
    /// Compact, Rust-only
    Bincode,
}

impl Format {
    pub fn from_path(path: &Path) -> Option<Format> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "json" => Some(Format::Json),
            "msgpack" | "mp" => Some(Format::MessagePack),
            "bin" | "bincode" => Some(Format::Bincode),
            _ => None,
        }
    }
}

fn lagged_header(labels: &Plot, width: usize) -> Vec<String> {
    (0..width)
        .map(|i| {
            if i == 0 {
                format!("{} (t)", labels.population_label)
            } else {
                format!("{} (t+{})", labels.population_label, i)
            }
        })
        .collect()
}

fn write_tsv<I>(path: &Path, header: &[&str], rows: I) -> Result<()>
where
    I: Iterator<Item = Vec<String>>,
{
    let mut writer = csv::WriterBuilder::new().delimiter(b'\t').from_path(path)?;
    writer.write_record(header)?;
    for row in rows {
        writer.write_record(&row)?;
    }
    writer.flush()?;
    Ok(())
}
