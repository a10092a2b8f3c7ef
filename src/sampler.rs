//! Execute-phase sampling: hyperparameters in [0, 1) to a concrete
//! realisation via inverse-CDF lookup.
//!
//! This is the hot path; it runs once per likelihood evaluation. Each call
//! does one binary search per ranking group plus a copy of the selected
//! histograms, and only reads the ranked ensemble, so calls may run from
//! independent threads if the host parallelizes evaluations.

use crate::error::HyperrankError;
use crate::histogram::ensure_starts_at_zero;
use crate::ranker::{RankTables, RankedEnsemble};

/// One evaluation's output: the selected histograms anchored at z = 0 and
/// the calibration bias of whichever realisation(s) were picked.
#[derive(Debug, Clone)]
pub struct SampledDistribution {
    pub z: Vec<f64>,
    /// `[bin][hist]`; all bins share `z`.
    pub nz: Vec<Vec<f64>>,
    /// One scalar per tomographic bin.
    pub calibration_bias: Vec<f64>,
}

/// Maps rank hyperparameters onto the ranked ensemble.
pub struct RankSampler<'a> {
    ranked: &'a RankedEnsemble,
}

impl<'a> RankSampler<'a> {
    pub fn new(ranked: &'a RankedEnsemble) -> Self {
        Self { ranked }
    }

    /// Number of hyperparameters `sample` expects: 1 for grouped modes, one
    /// per tomographic bin for separate modes.
    pub fn hyperparameters_required(&self) -> usize {
        self.ranked.hyperparameters_required()
    }

    /// Select histogram(s) for one evaluation.
    ///
    /// Grouped modes take a single hyperparameter and every tomographic bin
    /// follows the one selected realisation. Separate modes take one
    /// hyperparameter per bin and each bin does its own lookup, so the
    /// returned bins may come from different realisations.
    pub fn sample(&self, hyperparms: &[f64]) -> Result<SampledDistribution, HyperrankError> {
        let required = self.hyperparameters_required();
        if hyperparms.len() != required {
            return Err(HyperrankError::Configuration(format!(
                "mode '{}' requires {} rank hyperparameter(s), got {}",
                self.ranked.mode,
                required,
                hyperparms.len()
            )));
        }

        let (nz, calibration_bias) = match &self.ranked.tables {
            RankTables::Grouped {
                cumulative_weight,
                ranked_nz,
                ranked_cal,
                ..
            } => {
                let k = lookup(cumulative_weight, hyperparms[0], "rank_hyperparm_1")?;
                (ranked_nz[k].clone(), ranked_cal[k].clone())
            }
            RankTables::PerBin {
                cumulative_weight,
                ranked_nz,
                ranked_cal,
                ..
            } => {
                let mut nz = Vec::with_capacity(self.ranked.n_bins);
                let mut cal = Vec::with_capacity(self.ranked.n_bins);
                for (b, &h) in hyperparms.iter().enumerate() {
                    let group = format!("rank_hyperparm_{}", b + 1);
                    let k = lookup(&cumulative_weight[b], h, &group)?;
                    nz.push(ranked_nz[b][k].clone());
                    cal.push(ranked_cal[b][k]);
                }
                (nz, cal)
            }
        };

        let (z, nz) = ensure_starts_at_zero(&self.ranked.z, &nz);
        Ok(SampledDistribution {
            z,
            nz,
            calibration_bias,
        })
    }
}

/// Inverse-CDF lookup: first ranked index whose cumulative weight is >= h.
///
/// The table ends at 1.0 up to rounding, so a hyperparameter just below 1
/// can only overshoot the last slot through floating error; the index is
/// clamped to the last entry in that case.
fn lookup(cumulative_weight: &[f64], h: f64, group: &str) -> Result<usize, HyperrankError> {
    if !(0.0..1.0).contains(&h) {
        return Err(HyperrankError::Range {
            group: group.to_string(),
            value: h,
        });
    }
    let k = cumulative_weight.partition_point(|&w| w < h);
    Ok(k.min(cumulative_weight.len() - 1))
}
