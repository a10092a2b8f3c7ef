//! Seam for the external comoving-distance conversion.
//!
//! The inv-chi ranking modes need chi(z) for the ensemble's redshift grid.
//! The conversion itself is cosmology and lives outside this crate; the
//! ranker consumes it as a black box through this trait.

/// Converts a redshift histogram into comoving-distance space.
pub trait ComovingDistance {
    /// Given a redshift grid and a density defined on it, return the
    /// comoving distance at each grid point and the density re-expressed in
    /// distance space.
    fn nz_to_gchi(&self, z: &[f64], nz: &[f64]) -> (Vec<f64>, Vec<f64>);
}
