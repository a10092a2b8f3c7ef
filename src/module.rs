//! Pipeline-facing setup / execute pair.
//!
//! `setup` runs once per process: load the ensemble file, rank it, emit the
//! diagnostics. `execute` runs once per likelihood evaluation: read the
//! `rank_hyperparm_*` values the sampler placed in the datablock, pick the
//! realisation(s), and write the n(z) section and calibration biases back.

use tracing::info;

use crate::block::DataBlock;
use crate::distance::ComovingDistance;
use crate::ensemble::{mean_over_grid, Ensemble};
use crate::error::HyperrankError;
use crate::io;
use crate::ranker::{
    fiducial_position, rank_ensemble, RankMode, RankTables, RankedEnsemble, RankerOptions,
};
use crate::sampler::RankSampler;

/// Section the sampler writes hyperparameters into.
pub const RANKS_SECTION: &str = "ranks";

/// The configured and ranked module, held for the life of the pipeline run.
#[derive(Debug)]
pub struct HyperrankModule {
    options: RankerOptions,
    ranked: RankedEnsemble,
    /// Output section name, `NZ_<DATA_SET>`.
    pz_section: String,
}

impl HyperrankModule {
    /// Setup phase. `distance` is only consulted by the inv-chi modes.
    pub fn setup(
        options: RankerOptions,
        distance: Option<&dyn ComovingDistance>,
    ) -> Result<Self, HyperrankError> {
        let file = io::load_nz_file(&options.nz_file)?;
        let ensemble = Ensemble::from_records(&file, options.upsampling, options.weighting)?;

        info!(
            realisations = ensemble.n_realisations(),
            tomographic_bins = ensemble.n_bins(),
            histogram_points = ensemble.n_hist(),
            mode = %options.mode,
            "hyperrank ensemble loaded"
        );
        for (b, (mean, std_dev)) in ensemble.calibration_summary().into_iter().enumerate() {
            info!(bin = b + 1, mean, std_dev, "calibration bias summary");
        }

        let external = match options.mode {
            RankMode::External => {
                let path = options.external_ranking_filename.as_ref().ok_or_else(|| {
                    HyperrankError::Configuration(
                        "external mode set but no external_ranking_filename given".to_string(),
                    )
                })?;
                Some(io::load_external_ranking(path, ensemble.n_realisations())?)
            }
            _ => None,
        };

        let ranked = rank_ensemble(&ensemble, &options, distance, external.as_deref())?;

        if options.verbose {
            if let Some(path) = &options.rank_output {
                io::write_rank_output(path, &ranked.tables.rank_rows())?;
            }
            log_fiducial(&options, &ensemble, &ranked, distance);
        }

        let pz_section = format!("NZ_{}", options.data_set.to_uppercase());
        Ok(Self {
            options,
            ranked,
            pz_section,
        })
    }

    pub fn ranked(&self) -> &RankedEnsemble {
        &self.ranked
    }

    /// Execute phase: one sampling step against the datablock.
    pub fn execute(&self, block: &mut DataBlock) -> Result<(), HyperrankError> {
        let sampler = RankSampler::new(&self.ranked);
        let required = sampler.hyperparameters_required();

        let mut hyperparms = Vec::with_capacity(required);
        for i in 1..=required {
            let name = format!("rank_hyperparm_{i}");
            hyperparms.push(block.get_real(RANKS_SECTION, &name)?);
        }

        let sampled = sampler.sample(&hyperparms)?;

        let pz = self.pz_section.as_str();
        block.put_int(pz, "nbin", self.ranked.n_bins as i64);
        block.put_int(pz, "nz", sampled.z.len() as i64);
        block.put_real_array(pz, "z", sampled.z.clone());
        for (b, nz) in sampled.nz.iter().enumerate() {
            block.put_real_array(pz, &format!("bin_{}", b + 1), nz.clone());
        }
        for (b, &m) in sampled.calibration_bias.iter().enumerate() {
            block.put_real(&self.options.cal_section, &format!("m{}", b + 1), m);
        }
        Ok(())
    }
}

/// Log where the fiducial realisation would have ranked. Only the
/// unified-family modes carry a ranked statistic to compare against.
fn log_fiducial(
    options: &RankerOptions,
    ensemble: &Ensemble,
    ranked: &RankedEnsemble,
    distance: Option<&dyn ComovingDistance>,
) {
    let Some((fid_z, fid_bins)) = &ensemble.fiducial else {
        return;
    };
    let RankTables::Grouped {
        ranked_statistic: Some(stat),
        ..
    } = &ranked.tables
    else {
        return;
    };

    let per_bin: Vec<f64> = if ranked.mode.needs_distance() {
        let Some(distance) = distance else { return };
        fid_bins
            .iter()
            .map(|nz| {
                let (chi, _) = distance.nz_to_gchi(fid_z, nz);
                crate::ensemble::mean_inverse(&chi, nz)
            })
            .collect()
    } else {
        fid_bins
            .iter()
            .map(|nz| mean_over_grid(fid_z, nz))
            .collect()
    };
    if per_bin.is_empty() {
        return;
    }
    let fid_stat = per_bin.iter().sum::<f64>() / per_bin.len() as f64;

    let position = fiducial_position(stat, fid_stat);
    let approx_hyperparm = position as f64 / ranked.n_realisations as f64;
    info!(
        data_set = %options.data_set,
        position,
        approx_hyperparm,
        "fiducial realisation rank comparison"
    );
}
