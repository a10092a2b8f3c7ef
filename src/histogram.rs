//! Histogram-form helpers shared by the ranker and the sampler.
//!
//! A realisation's n(z) arrives as a step histogram over a shared redshift
//! grid. Before ranking we optionally upsample it to a finer grid (spline
//! consumers downstream want more points than the native binning), capture
//! the deviation of its total mass from 1 as a calibration bias, and
//! normalize. Before returning a sampled histogram we anchor it at z = 0 and
//! clamp negatives.

use crate::error::HyperrankError;

/// Grid points closer to zero than this are treated as already at z = 0.
const ZERO_EPS: f64 = 1e-8;

/// A single tomographic bin's histogram after bias extraction.
#[derive(Debug, Clone)]
pub struct HistogramForm {
    /// Redshift grid (native mid points, or the upsampled grid).
    pub z: Vec<f64>,
    /// Density, normalized to sum to 1.
    pub nz: Vec<f64>,
    /// Total mass before normalization minus 1.
    pub bias: f64,
}

/// Build the upsampled redshift grid: `factor * len(z_low)` points spanning
/// [0, z_high.last()] inclusive.
pub fn upsampled_grid(z_low: &[f64], z_high: &[f64], factor: usize) -> Vec<f64> {
    let n = z_low.len() * factor;
    let top = z_high.last().copied().unwrap_or(0.0);
    if n <= 1 {
        return vec![0.0];
    }
    let step = top / (n - 1) as f64;
    (0..n).map(|i| i as f64 * step).collect()
}

/// Index of the native bin containing `z`: the largest `i` with
/// `z_low[i] <= z`. Points below the first edge map to bin 0.
fn containing_bin(z_low: &[f64], z: f64) -> usize {
    let idx = z_low.partition_point(|&edge| edge <= z);
    idx.saturating_sub(1)
}

/// Load one bin's histogram in the form the rest of the module consumes.
///
/// With `upsampling == 1` the native mid-point grid and density are used
/// as-is. Otherwise the density is resampled onto the finer grid by
/// nearest-lower-bin lookup, so the step-function shape is preserved
/// exactly. Either way the calibration bias is the native histogram's total
/// mass minus 1 (invariant under upsampling) and the returned density is
/// normalized to unit sum on its own grid.
pub fn load_histogram_form(
    z_low: &[f64],
    z_high: &[f64],
    z_mid: &[f64],
    density: &[f64],
    upsampling: usize,
) -> Result<HistogramForm, HyperrankError> {
    let native_mass: f64 = density.iter().sum();
    if native_mass <= 0.0 {
        return Err(HyperrankError::DataIntegrity(
            "histogram has zero total mass, cannot normalize".to_string(),
        ));
    }
    let bias = native_mass - 1.0;

    let (z, mut nz) = if upsampling == 1 {
        (z_mid.to_vec(), density.to_vec())
    } else {
        let z = upsampled_grid(z_low, z_high, upsampling);
        let nz = z
            .iter()
            .map(|&zi| density[containing_bin(z_low, zi)])
            .collect();
        (z, nz)
    };

    let norm: f64 = nz.iter().sum();
    if norm <= 0.0 {
        return Err(HyperrankError::DataIntegrity(
            "histogram has zero total mass, cannot normalize".to_string(),
        ));
    }
    for v in &mut nz {
        *v /= norm;
    }

    Ok(HistogramForm { z, nz, bias })
}

/// Anchor a set of per-bin histograms at redshift zero.
///
/// If the grid does not start at (numerically) zero, a z = 0 point with zero
/// density is prepended to every bin. Negative densities, which upsampling
/// or prior interpolation can introduce, are clamped to zero in both cases.
/// Downstream spline consumers require both guarantees.
pub fn ensure_starts_at_zero(z: &[f64], nz: &[Vec<f64>]) -> (Vec<f64>, Vec<Vec<f64>>) {
    let clamp = |v: &f64| if *v < 0.0 { 0.0 } else { *v };

    if z.first().copied().unwrap_or(0.0) > ZERO_EPS {
        let mut z_new = Vec::with_capacity(z.len() + 1);
        z_new.push(0.0);
        z_new.extend_from_slice(z);

        let nz_new = nz
            .iter()
            .map(|bin| {
                let mut out = Vec::with_capacity(bin.len() + 1);
                out.push(0.0);
                out.extend(bin.iter().map(clamp));
                out
            })
            .collect();
        (z_new, nz_new)
    } else {
        let nz_new = nz
            .iter()
            .map(|bin| bin.iter().map(clamp).collect())
            .collect();
        (z.to_vec(), nz_new)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn native_form_extracts_bias_and_normalizes() {
        let z_low = [0.0, 1.0];
        let z_high = [1.0, 2.0];
        let z_mid = [0.5, 1.5];
        let density = [0.3, 0.9]; // mass 1.2 -> bias 0.2

        let form = load_histogram_form(&z_low, &z_high, &z_mid, &density, 1).unwrap();
        assert_eq!(form.z, vec![0.5, 1.5]);
        assert!((form.bias - 0.2).abs() < 1e-12);
        let total: f64 = form.nz.iter().sum();
        assert!((total - 1.0).abs() < 1e-12);
        assert!((form.nz[0] - 0.25).abs() < 1e-12);
    }

    #[test]
    fn zero_mass_histogram_is_rejected() {
        let err = load_histogram_form(&[0.0], &[1.0], &[0.5], &[0.0], 1).unwrap_err();
        assert!(matches!(err, HyperrankError::DataIntegrity(_)));
    }

    #[test]
    fn upsampling_preserves_step_function() {
        // 2 native bins on [0,1) and [1,2) with density 0.2 / 0.8.
        let z_low = [0.0, 1.0];
        let z_high = [1.0, 2.0];
        let z_mid = [0.5, 1.5];
        let density = [0.2, 0.8];

        let form = load_histogram_form(&z_low, &z_high, &z_mid, &density, 3).unwrap();
        assert_eq!(form.z.len(), 6);

        // Grid is [0, 0.4, 0.8, 1.2, 1.6, 2.0]: three fine points per coarse
        // bin, so after unit-sum normalization each fine point carries a
        // third of its coarse bin's density.
        for (&zi, &ni) in form.z.iter().zip(form.nz.iter()) {
            let expected = if zi < 1.0 { 0.2 / 3.0 } else { 0.8 / 3.0 };
            assert!((ni - expected).abs() < 1e-12, "z = {zi}");
        }

        let total: f64 = form.nz.iter().sum();
        assert!((total - 1.0).abs() < 1e-12);
    }

    #[test]
    fn calibration_bias_is_invariant_under_upsampling() {
        let z_low = [0.0, 1.0, 2.0];
        let z_high = [1.0, 2.0, 3.0];
        let z_mid = [0.5, 1.5, 2.5];
        let density = [0.1, 0.7, 0.3]; // mass 1.1 -> bias 0.1

        let native = load_histogram_form(&z_low, &z_high, &z_mid, &density, 1).unwrap();
        let fine = load_histogram_form(&z_low, &z_high, &z_mid, &density, 4).unwrap();

        assert!((native.bias - 0.1).abs() < 1e-12);
        assert!((fine.bias - native.bias).abs() < 1e-12);
    }

    #[test]
    fn zero_floor_prepends_anchor_point() {
        let z = [0.1, 0.2];
        let nz = vec![vec![0.4, 0.6]];
        let (z_new, nz_new) = ensure_starts_at_zero(&z, &nz);
        assert_eq!(z_new, vec![0.0, 0.1, 0.2]);
        assert_eq!(nz_new[0], vec![0.0, 0.4, 0.6]);
    }

    #[test]
    fn zero_floor_leaves_anchored_grid_alone_but_clamps() {
        let z = [0.0, 0.1, 0.2];
        let nz = vec![vec![0.5, -0.1, 0.6]];
        let (z_new, nz_new) = ensure_starts_at_zero(&z, &nz);
        assert_eq!(z_new, vec![0.0, 0.1, 0.2]);
        assert_eq!(nz_new[0], vec![0.5, 0.0, 0.6]);
    }
}
