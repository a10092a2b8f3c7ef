//! Ensemble data model and per-realisation summary statistics.
//!
//! An ensemble is N realisations of the same set of B tomographic n(z)
//! histograms on one shared redshift grid. Statistics computed here (mean
//! redshift, mean inverse comoving distance) are the sort keys the ranker
//! orders the pool by.

use tracing::warn;

use crate::distance::ComovingDistance;
use crate::error::HyperrankError;
use crate::histogram::load_histogram_form;
use crate::io::{NzFile, NzRecord};

/// One candidate set of tomographic distributions.
#[derive(Debug, Clone)]
pub struct Realization {
    /// Normalized density per tomographic bin, `[bin][hist]`.
    pub nz: Vec<Vec<f64>>,
    /// Calibration bias per tomographic bin (native mass minus 1).
    pub calibration_bias: Vec<f64>,
    /// Sampling weight. 1 unless weighting is enabled and the source record
    /// carries (or is missing) a weight attribute.
    pub weight: f64,
}

/// The full pool of realisations plus the shared grid and the optional
/// fiducial comparison record.
#[derive(Debug, Clone)]
pub struct Ensemble {
    /// Shared redshift grid (upsampled if requested at load time).
    pub z: Vec<f64>,
    pub realizations: Vec<Realization>,
    /// Fiducial n(z) on its native grid, `(z_mid, [bin][hist])`, kept only
    /// for the diagnostic rank comparison.
    pub fiducial: Option<(Vec<f64>, Vec<Vec<f64>>)>,
}

impl Ensemble {
    /// Build an ensemble from parsed source records.
    ///
    /// Every record must share the first record's bin count and histogram
    /// length. With `weighting` enabled a record without a weight attribute
    /// contributes weight 0 (logged, not fatal); with it disabled every
    /// realisation weighs 1.
    pub fn from_records(
        file: &NzFile,
        upsampling: usize,
        weighting: bool,
    ) -> Result<Self, HyperrankError> {
        if file.realisations.is_empty() {
            return Err(HyperrankError::DataIntegrity(
                "ensemble file contains no realisations".to_string(),
            ));
        }

        let first = &file.realisations[0];
        let n_bins = first.bins.len();
        let n_hist = first.z_mid.len();
        if n_bins == 0 || n_hist == 0 {
            return Err(HyperrankError::DataIntegrity(
                "first realisation has no tomographic bins or an empty grid".to_string(),
            ));
        }

        let mut z = Vec::new();
        let mut realizations = Vec::with_capacity(file.realisations.len());
        for (i, record) in file.realisations.iter().enumerate() {
            check_shape(record, i, n_bins, n_hist)?;

            let mut nz = Vec::with_capacity(n_bins);
            let mut calibration_bias = Vec::with_capacity(n_bins);
            for density in &record.bins {
                let form = load_histogram_form(
                    &record.z_low,
                    &record.z_high,
                    &record.z_mid,
                    density,
                    upsampling,
                )?;
                z = form.z;
                nz.push(form.nz);
                calibration_bias.push(form.bias);
            }

            let weight = if weighting {
                record.weight.unwrap_or_else(|| {
                    warn!(realisation = i, "no weight attribute, treating as zero");
                    0.0
                })
            } else {
                1.0
            };

            realizations.push(Realization {
                nz,
                calibration_bias,
                weight,
            });
        }

        let fiducial = file
            .fiducial
            .as_ref()
            .map(|rec| (rec.z_mid.clone(), rec.bins.clone()));

        Ok(Self {
            z,
            realizations,
            fiducial,
        })
    }

    pub fn n_realisations(&self) -> usize {
        self.realizations.len()
    }

    pub fn n_bins(&self) -> usize {
        self.realizations[0].nz.len()
    }

    pub fn n_hist(&self) -> usize {
        self.z.len()
    }

    /// Mean redshift per realisation per bin, `[realisation][bin]`.
    pub fn mean_redshift(&self) -> Vec<Vec<f64>> {
        self.realizations
            .iter()
            .map(|r| {
                r.nz.iter()
                    .map(|nz| mean_over_grid(&self.z, nz))
                    .collect()
            })
            .collect()
    }

    /// Mean inverse comoving distance per realisation per bin,
    /// `[realisation][bin]`, using the external distance conversion.
    pub fn mean_inv_chi(&self, distance: &dyn ComovingDistance) -> Vec<Vec<f64>> {
        self.realizations
            .iter()
            .map(|r| {
                r.nz.iter()
                    .map(|nz| {
                        let (chi, _gchi) = distance.nz_to_gchi(&self.z, nz);
                        mean_inverse(&chi, nz)
                    })
                    .collect()
            })
            .collect()
    }

    /// Per-bin mean and standard deviation of the calibration biases across
    /// the ensemble. Diagnostic only.
    pub fn calibration_summary(&self) -> Vec<(f64, f64)> {
        let n = self.n_realisations() as f64;
        (0..self.n_bins())
            .map(|b| {
                let mean = self
                    .realizations
                    .iter()
                    .map(|r| r.calibration_bias[b])
                    .sum::<f64>()
                    / n;
                let var = self
                    .realizations
                    .iter()
                    .map(|r| {
                        let d = r.calibration_bias[b] - mean;
                        d * d
                    })
                    .sum::<f64>()
                    / n;
                (mean, var.sqrt())
            })
            .collect()
    }

    /// Per-realisation weights in input order.
    pub fn weights(&self) -> Vec<f64> {
        self.realizations.iter().map(|r| r.weight).collect()
    }
}

fn check_shape(
    record: &NzRecord,
    index: usize,
    n_bins: usize,
    n_hist: usize,
) -> Result<(), HyperrankError> {
    if record.bins.len() != n_bins
        || record.z_mid.len() != n_hist
        || record.bins.iter().any(|b| b.len() != n_hist)
    {
        return Err(HyperrankError::DataIntegrity(format!(
            "realisation {index} does not match the ensemble shape \
             ({n_bins} bins x {n_hist} histogram points)"
        )));
    }
    Ok(())
}

/// `sum(nz * z)` over the histogram grid.
pub fn mean_over_grid(z: &[f64], nz: &[f64]) -> f64 {
    z.iter().zip(nz.iter()).map(|(&zi, &ni)| zi * ni).sum()
}

/// `sum(nz / chi)` over the histogram grid, skipping points where chi is not
/// yet positive (the grid may start at z = 0 where chi vanishes).
pub fn mean_inverse(chi: &[f64], nz: &[f64]) -> f64 {
    chi.iter()
        .zip(nz.iter())
        .filter(|(&c, _)| c > 0.0)
        .map(|(&c, &ni)| ni / c)
        .sum()
}
