//! Ensemble ranking: summary statistics to permutation to inverse-CDF table.
//!
//! Setup-phase half of the module. Given the loaded ensemble and the
//! resolved options this computes the sort key for the selected mode,
//! derives the `order` permutation (and its inverse, `rank`), gathers the
//! histograms and calibration biases into ranked order, and builds the
//! cumulative-weight table the sampler searches on every evaluation.
//!
//! Two mode families exist. Grouped modes rank whole realisations, so a
//! single permutation and weight table cover all tomographic bins. Separate
//! modes rank each bin's column independently, which allows tomographic-bin
//! mixing when sampling.

use std::fmt;
use std::str::FromStr;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::distance::ComovingDistance;
use crate::ensemble::Ensemble;
use crate::error::HyperrankError;

// ---------------------------------------------------------------------
//  Modes and options
// ---------------------------------------------------------------------

/// The seven ranking modes. A closed set; the configuration string is
/// parsed once and everything downstream dispatches exhaustively.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RankMode {
    /// Keep the input order exactly.
    NoRank,
    /// Sort by mean redshift averaged across tomographic bins.
    Unified,
    /// Sort each tomographic bin independently by its mean redshift.
    Separate,
    /// Like `Unified`, keyed on mean inverse comoving distance.
    InvChiUnified,
    /// Like `Separate`, keyed on mean inverse comoving distance.
    InvChiSeparate,
    /// Deterministic pseudo-random shuffle.
    Random,
    /// Sort key supplied by an external per-realisation table.
    External,
}

impl RankMode {
    /// Separate-family modes rank each tomographic bin on its own.
    pub fn is_separate(self) -> bool {
        matches!(self, RankMode::Separate | RankMode::InvChiSeparate)
    }

    /// Inv-chi modes need the external distance conversion.
    pub fn needs_distance(self) -> bool {
        matches!(self, RankMode::InvChiUnified | RankMode::InvChiSeparate)
    }
}

impl FromStr for RankMode {
    type Err = HyperrankError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "no-rank" => Ok(RankMode::NoRank),
            "unified" => Ok(RankMode::Unified),
            "separate" => Ok(RankMode::Separate),
            "inv-chi-unified" => Ok(RankMode::InvChiUnified),
            "inv-chi-separate" => Ok(RankMode::InvChiSeparate),
            "random" => Ok(RankMode::Random),
            "external" => Ok(RankMode::External),
            other => Err(HyperrankError::Configuration(format!(
                "invalid mode '{other}', expected one of (inv-chi-)unified, \
                 (inv-chi-)separate, random, external or no-rank"
            ))),
        }
    }
}

impl fmt::Display for RankMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RankMode::NoRank => "no-rank",
            RankMode::Unified => "unified",
            RankMode::Separate => "separate",
            RankMode::InvChiUnified => "inv-chi-unified",
            RankMode::InvChiSeparate => "inv-chi-separate",
            RankMode::Random => "random",
            RankMode::External => "external",
        };
        f.write_str(name)
    }
}

/// Resolved configuration surface for the module.
#[derive(Debug, Clone, Deserialize)]
pub struct RankerOptions {
    pub mode: RankMode,
    /// Dataset name; output lands under `NZ_<DATA_SET>`.
    pub data_set: String,
    /// Path to the ensemble source file.
    pub nz_file: String,
    /// Sub-binning factor for the histogram grid.
    #[serde(default = "default_upsampling")]
    pub upsampling: usize,
    /// Honor per-realisation weight attributes.
    #[serde(default)]
    pub weighting: bool,
    /// Extra diagnostics: setup summary, rank dump, fiducial comparison.
    #[serde(default)]
    pub verbose: bool,
    /// Section the per-bin calibration biases are written to.
    #[serde(default = "default_cal_section")]
    pub cal_section: String,
    /// Required iff `mode` is `external`.
    #[serde(default)]
    pub external_ranking_filename: Option<String>,
    /// Destination of the diagnostic rank dump (verbose only).
    #[serde(default)]
    pub rank_output: Option<String>,
    /// Explicit shuffle seed for `random` mode. When unset the seed falls
    /// back to the realisation count, which keeps independent pipeline
    /// processes aligned without coordination but collides for any two
    /// ensembles of the same size.
    #[serde(default)]
    pub seed: Option<u64>,
}

fn default_upsampling() -> usize {
    1
}

fn default_cal_section() -> String {
    "shear_calibration_parameters".to_string()
}

// ---------------------------------------------------------------------
//  Ranked output
// ---------------------------------------------------------------------

/// Permutation tables plus the gathered arrays, per mode family.
#[derive(Debug, Clone)]
pub enum RankTables {
    /// One permutation shared by all tomographic bins.
    Grouped {
        /// `order[k]` is the realisation placed at ranked position k.
        order: Vec<usize>,
        /// Inverse permutation: `rank[order[k]] == k`.
        rank: Vec<usize>,
        /// Non-decreasing inverse-CDF lookup table ending at 1.
        cumulative_weight: Vec<f64>,
        /// Histograms in ranked order, `[k][bin][hist]`.
        ranked_nz: Vec<Vec<Vec<f64>>>,
        /// Calibration biases in ranked order, `[k][bin]`.
        ranked_cal: Vec<Vec<f64>>,
        /// The sort key in ranked order, when the mode has one.
        ranked_statistic: Option<Vec<f64>>,
    },
    /// One independent permutation per tomographic bin.
    PerBin {
        /// `[bin][k]`.
        order: Vec<Vec<usize>>,
        /// `[bin][i]`.
        rank: Vec<Vec<usize>>,
        /// `[bin][k]`.
        cumulative_weight: Vec<Vec<f64>>,
        /// `[bin][k][hist]`.
        ranked_nz: Vec<Vec<Vec<f64>>>,
        /// `[bin][k]`.
        ranked_cal: Vec<Vec<f64>>,
        /// `[bin][k]`.
        ranked_statistic: Vec<Vec<f64>>,
    },
}

impl RankTables {
    /// Rank rows for the diagnostic dump: one row per realisation, one
    /// column per ranking group.
    pub fn rank_rows(&self) -> Vec<Vec<usize>> {
        match self {
            RankTables::Grouped { rank, .. } => rank.iter().map(|&r| vec![r]).collect(),
            RankTables::PerBin { rank, .. } => {
                let n = rank.first().map_or(0, |col| col.len());
                (0..n)
                    .map(|i| rank.iter().map(|col| col[i]).collect())
                    .collect()
            }
        }
    }
}

/// Immutable output of the setup phase, consumed by the sampler on every
/// pipeline evaluation.
#[derive(Debug, Clone)]
pub struct RankedEnsemble {
    pub mode: RankMode,
    /// Shared redshift grid of the (possibly upsampled) histograms.
    pub z: Vec<f64>,
    pub n_realisations: usize,
    pub n_bins: usize,
    pub n_hist: usize,
    pub tables: RankTables,
}

impl RankedEnsemble {
    /// Number of rank hyperparameters a single evaluation must supply.
    pub fn hyperparameters_required(&self) -> usize {
        match self.tables {
            RankTables::Grouped { .. } => 1,
            RankTables::PerBin { .. } => self.n_bins,
        }
    }
}

// ---------------------------------------------------------------------
//  Ranking
// ---------------------------------------------------------------------

/// Order the ensemble according to the selected mode and build the
/// cumulative-weight index.
///
/// `distance` is required for the inv-chi modes, `external` (one scalar per
/// realisation) for external mode; both are ignored otherwise.
pub fn rank_ensemble(
    ensemble: &Ensemble,
    options: &RankerOptions,
    distance: Option<&dyn ComovingDistance>,
    external: Option<&[f64]>,
) -> Result<RankedEnsemble, HyperrankError> {
    let n = ensemble.n_realisations();
    if n == 0 {
        return Err(HyperrankError::DataIntegrity(
            "ensemble file contains no realisations".to_string(),
        ));
    }
    let n_bins = ensemble.n_bins();

    let weights = ensemble.weights();
    validate_weights(&weights)?;

    let tables = match options.mode {
        RankMode::NoRank => {
            let order: Vec<usize> = (0..n).collect();
            grouped_tables(ensemble, &weights, order, None)
        }
        RankMode::Unified | RankMode::InvChiUnified => {
            let per_bin = mode_statistic(ensemble, options.mode, distance)?;
            let key: Vec<f64> = per_bin
                .iter()
                .map(|bins| bins.iter().sum::<f64>() / n_bins as f64)
                .collect();
            let order = argsort(&key);
            let ranked_statistic = gather(&key, &order);
            grouped_tables(ensemble, &weights, order, Some(ranked_statistic))
        }
        RankMode::Separate | RankMode::InvChiSeparate => {
            let per_bin = mode_statistic(ensemble, options.mode, distance)?;
            per_bin_tables(ensemble, &weights, &per_bin)
        }
        RankMode::External => {
            let key = external.ok_or_else(|| {
                HyperrankError::Configuration(
                    "external mode set but no ranking values supplied".to_string(),
                )
            })?;
            if key.len() != n {
                return Err(HyperrankError::DataIntegrity(format!(
                    "external ranking holds {} values for {} realisations",
                    key.len(),
                    n
                )));
            }
            let order = argsort(key);
            grouped_tables(ensemble, &weights, order, None)
        }
        RankMode::Random => {
            let seed = options.seed.unwrap_or(n as u64);
            let mut rng = StdRng::seed_from_u64(seed);
            let mut order: Vec<usize> = (0..n).collect();
            order.shuffle(&mut rng);
            grouped_tables(ensemble, &weights, order, None)
        }
    };

    Ok(RankedEnsemble {
        mode: options.mode,
        z: ensemble.z.clone(),
        n_realisations: n,
        n_bins,
        n_hist: ensemble.n_hist(),
        tables,
    })
}

/// Position a known reference statistic would take among the ranked keys,
/// via the same searchsorted lookup the sampler uses. Diagnostic only;
/// meaningful for the unified-family modes.
pub fn fiducial_position(ranked_statistic: &[f64], fiducial: f64) -> usize {
    ranked_statistic.partition_point(|&s| s < fiducial)
}

// ---------------------------------------------------------------------
//  Builders
// ---------------------------------------------------------------------

/// Per-realisation per-bin sort key for the statistic-driven modes.
fn mode_statistic(
    ensemble: &Ensemble,
    mode: RankMode,
    distance: Option<&dyn ComovingDistance>,
) -> Result<Vec<Vec<f64>>, HyperrankError> {
    if mode.needs_distance() {
        let distance = distance.ok_or_else(|| {
            HyperrankError::Configuration(format!(
                "mode '{mode}' needs a comoving-distance conversion"
            ))
        })?;
        Ok(ensemble.mean_inv_chi(distance))
    } else {
        Ok(ensemble.mean_redshift())
    }
}

fn validate_weights(weights: &[f64]) -> Result<(), HyperrankError> {
    if weights.iter().all(|&w| w == 0.0) {
        return Err(HyperrankError::DataIntegrity(
            "all realisations have zero weight; disable weighting or check \
             the weight attributes in the source file"
                .to_string(),
        ));
    }
    if weights.iter().any(|&w| w == 0.0) {
        warn!("one or more realisations have zero weight");
    }
    Ok(())
}

/// Stable ascending argsort; ties keep input order.
fn argsort(key: &[f64]) -> Vec<usize> {
    let mut order: Vec<usize> = (0..key.len()).collect();
    order.sort_by(|&a, &b| {
        key[a]
            .partial_cmp(&key[b])
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    order
}

/// Inverse permutation: `rank[order[k]] = k`.
fn invert(order: &[usize]) -> Vec<usize> {
    let mut rank = vec![0usize; order.len()];
    for (k, &i) in order.iter().enumerate() {
        rank[i] = k;
    }
    rank
}

fn gather<T: Clone>(values: &[T], order: &[usize]) -> Vec<T> {
    order.iter().map(|&i| values[i].clone()).collect()
}

/// Reorder weights, running-sum, normalize by the total.
fn cumulative_weights(weights: &[f64], order: &[usize]) -> Vec<f64> {
    let total: f64 = weights.iter().sum();
    let mut cum = 0.0;
    order
        .iter()
        .map(|&i| {
            cum += weights[i];
            cum / total
        })
        .collect()
}

fn grouped_tables(
    ensemble: &Ensemble,
    weights: &[f64],
    order: Vec<usize>,
    ranked_statistic: Option<Vec<f64>>,
) -> RankTables {
    let rank = invert(&order);
    let cumulative_weight = cumulative_weights(weights, &order);
    let ranked_nz = order
        .iter()
        .map(|&i| ensemble.realizations[i].nz.clone())
        .collect();
    let ranked_cal = order
        .iter()
        .map(|&i| ensemble.realizations[i].calibration_bias.clone())
        .collect();

    RankTables::Grouped {
        order,
        rank,
        cumulative_weight,
        ranked_nz,
        ranked_cal,
        ranked_statistic,
    }
}

fn per_bin_tables(ensemble: &Ensemble, weights: &[f64], statistic: &[Vec<f64>]) -> RankTables {
    let n_bins = ensemble.n_bins();

    let mut order = Vec::with_capacity(n_bins);
    let mut rank = Vec::with_capacity(n_bins);
    let mut cumulative_weight = Vec::with_capacity(n_bins);
    let mut ranked_nz = Vec::with_capacity(n_bins);
    let mut ranked_cal = Vec::with_capacity(n_bins);
    let mut ranked_statistic = Vec::with_capacity(n_bins);

    for b in 0..n_bins {
        let key: Vec<f64> = statistic.iter().map(|bins| bins[b]).collect();
        let order_b = argsort(&key);

        rank.push(invert(&order_b));
        cumulative_weight.push(cumulative_weights(weights, &order_b));
        ranked_nz.push(
            order_b
                .iter()
                .map(|&i| ensemble.realizations[i].nz[b].clone())
                .collect::<Vec<_>>(),
        );
        ranked_cal.push(
            order_b
                .iter()
                .map(|&i| ensemble.realizations[i].calibration_bias[b])
                .collect::<Vec<_>>(),
        );
        ranked_statistic.push(gather(&key, &order_b));
        order.push(order_b);
    }

    RankTables::PerBin {
        order,
        rank,
        cumulative_weight,
        ranked_nz,
        ranked_cal,
        ranked_statistic,
    }
}
