use hyperrank::ranker::{fiducial_position, rank_ensemble, RankMode, RankTables, RankerOptions};
use hyperrank::{ComovingDistance, Ensemble, HyperrankError, Realization};

/// Identity conversion: chi(z) = z. Keeps the inv-chi sort key a pure
/// function of the histogram so orderings are predictable in tests.
struct IdentityDistance;

impl ComovingDistance for IdentityDistance {
    fn nz_to_gchi(&self, z: &[f64], nz: &[f64]) -> (Vec<f64>, Vec<f64>) {
        (z.to_vec(), nz.to_vec())
    }
}

fn options(mode: RankMode) -> RankerOptions {
    RankerOptions {
        mode,
        data_set: "source".to_string(),
        nz_file: "unused.json".to_string(),
        upsampling: 1,
        weighting: false,
        verbose: false,
        cal_section: "shear_calibration_parameters".to_string(),
        external_ranking_filename: None,
        rank_output: None,
        seed: None,
    }
}

/// Two-point histograms on z = [0, 1]: density [1 - m, m] has mean m, so a
/// list of per-bin means maps straight onto an ensemble.
fn ensemble_from_means(means: &[Vec<f64>]) -> Ensemble {
    let realizations = means
        .iter()
        .map(|bins| Realization {
            nz: bins.iter().map(|&m| vec![1.0 - m, m]).collect(),
            calibration_bias: vec![0.0; bins.len()],
            weight: 1.0,
        })
        .collect();
    Ensemble {
        z: vec![0.0, 1.0],
        realizations,
        fiducial: None,
    }
}

fn assert_permutation(order: &[usize], rank: &[usize]) {
    let n = order.len();
    let mut sorted = order.to_vec();
    sorted.sort_unstable();
    assert_eq!(sorted, (0..n).collect::<Vec<_>>());
    for (k, &i) in order.iter().enumerate() {
        assert_eq!(rank[i], k, "rank is not the inverse of order");
    }
}

#[test]
fn every_mode_produces_a_permutation() {
    let means: Vec<Vec<f64>> = vec![
        vec![0.3, 0.6],
        vec![0.1, 0.2],
        vec![0.4, 0.5],
        vec![0.2, 0.9],
        vec![0.35, 0.4],
    ];
    let ensemble = ensemble_from_means(&means);
    let external = vec![2.0, 0.5, 9.0, 1.0, 4.0];
    let dist = IdentityDistance;

    for mode in [
        RankMode::NoRank,
        RankMode::Unified,
        RankMode::Separate,
        RankMode::InvChiUnified,
        RankMode::InvChiSeparate,
        RankMode::Random,
        RankMode::External,
    ] {
        let ranked = rank_ensemble(
            &ensemble,
            &options(mode),
            Some(&dist),
            Some(&external),
        )
        .unwrap();

        match &ranked.tables {
            RankTables::Grouped { order, rank, .. } => assert_permutation(order, rank),
            RankTables::PerBin { order, rank, .. } => {
                assert_eq!(order.len(), 2);
                for (o, r) in order.iter().zip(rank.iter()) {
                    assert_permutation(o, r);
                }
            }
        }
    }
}

#[test]
fn no_rank_preserves_input_order() {
    let ensemble = ensemble_from_means(&[vec![0.9], vec![0.1], vec![0.5]]);
    let ranked = rank_ensemble(&ensemble, &options(RankMode::NoRank), None, None).unwrap();
    let RankTables::Grouped { order, .. } = &ranked.tables else {
        panic!("no-rank must be grouped");
    };
    assert_eq!(order, &vec![0, 1, 2]);
}

#[test]
fn unified_sorts_by_bin_averaged_mean_redshift() {
    // Per-realisation averaged means: 0.45, 0.15, 0.45, 0.25 -> stable sort
    // keeps realisation 0 ahead of realisation 2 on the tie.
    let means = vec![
        vec![0.3, 0.6],
        vec![0.1, 0.2],
        vec![0.4, 0.5],
        vec![0.2, 0.3],
    ];
    let ensemble = ensemble_from_means(&means);
    let ranked = rank_ensemble(&ensemble, &options(RankMode::Unified), None, None).unwrap();

    let RankTables::Grouped {
        order,
        ranked_statistic: Some(stat),
        ..
    } = &ranked.tables
    else {
        panic!("unified must be grouped with a statistic");
    };
    assert_eq!(order, &vec![1, 3, 0, 2]);
    for w in stat.windows(2) {
        assert!(w[0] <= w[1], "ranked statistic must be non-decreasing");
    }
}

#[test]
fn separate_ranks_each_bin_independently() {
    // Bin 2's means are the reverse of bin 1's, so the two order columns
    // must be reverses of each other.
    let means = vec![vec![0.1, 0.3], vec![0.2, 0.2], vec![0.3, 0.1]];
    let ensemble = ensemble_from_means(&means);
    let ranked = rank_ensemble(&ensemble, &options(RankMode::Separate), None, None).unwrap();

    let RankTables::PerBin {
        order,
        ranked_statistic,
        ..
    } = &ranked.tables
    else {
        panic!("separate must be per-bin");
    };

    let mut reversed = order[1].clone();
    reversed.reverse();
    assert_eq!(order[0], reversed);

    for col in ranked_statistic {
        for w in col.windows(2) {
            assert!(w[0] <= w[1]);
        }
    }
}

#[test]
fn inv_chi_unified_uses_the_distance_conversion() {
    let means = vec![vec![0.2], vec![0.8], vec![0.5]];
    let ensemble = ensemble_from_means(&means);
    let dist = IdentityDistance;

    let ranked = rank_ensemble(
        &ensemble,
        &options(RankMode::InvChiUnified),
        Some(&dist),
        None,
    )
    .unwrap();

    // With chi = z and the two-point form, sum(nz / chi) = m, so the
    // inv-chi ordering coincides with the mean-redshift ordering here.
    let RankTables::Grouped { order, .. } = &ranked.tables else {
        panic!("inv-chi-unified must be grouped");
    };
    assert_eq!(order, &vec![0, 2, 1]);
}

#[test]
fn inv_chi_without_distance_is_a_configuration_error() {
    let ensemble = ensemble_from_means(&[vec![0.2], vec![0.8]]);
    let err = rank_ensemble(&ensemble, &options(RankMode::InvChiUnified), None, None).unwrap_err();
    assert!(matches!(err, HyperrankError::Configuration(_)));
}

#[test]
fn external_sorts_by_the_supplied_key() {
    let ensemble = ensemble_from_means(&[vec![0.5], vec![0.5], vec![0.5]]);
    let external = vec![0.3, 0.1, 0.2];
    let ranked = rank_ensemble(
        &ensemble,
        &options(RankMode::External),
        None,
        Some(&external),
    )
    .unwrap();

    let RankTables::Grouped { order, .. } = &ranked.tables else {
        panic!("external must be grouped");
    };
    assert_eq!(order, &vec![1, 2, 0]);
}

#[test]
fn external_mode_without_values_fails() {
    let ensemble = ensemble_from_means(&[vec![0.5], vec![0.6]]);
    let err = rank_ensemble(&ensemble, &options(RankMode::External), None, None).unwrap_err();
    assert!(matches!(err, HyperrankError::Configuration(_)));
}

#[test]
fn external_length_mismatch_fails() {
    let ensemble = ensemble_from_means(&[vec![0.5], vec![0.6]]);
    let external = vec![1.0, 2.0, 3.0];
    let err = rank_ensemble(
        &ensemble,
        &options(RankMode::External),
        None,
        Some(&external),
    )
    .unwrap_err();
    assert!(matches!(err, HyperrankError::DataIntegrity(_)));
}

#[test]
fn random_mode_is_deterministic_in_the_realisation_count() {
    let means: Vec<Vec<f64>> = (0..20).map(|i| vec![i as f64 / 20.0]).collect();
    let ensemble = ensemble_from_means(&means);

    let first = rank_ensemble(&ensemble, &options(RankMode::Random), None, None).unwrap();
    let second = rank_ensemble(&ensemble, &options(RankMode::Random), None, None).unwrap();

    let (RankTables::Grouped { order: a, .. }, RankTables::Grouped { order: b, .. }) =
        (&first.tables, &second.tables)
    else {
        panic!("random must be grouped");
    };
    assert_eq!(a, b, "same N must reconstruct the same shuffle");
    assert_ne!(a, &(0..20).collect::<Vec<_>>(), "shuffle should move things");
}

#[test]
fn random_mode_honors_an_explicit_seed() {
    let means: Vec<Vec<f64>> = (0..20).map(|i| vec![i as f64 / 20.0]).collect();
    let ensemble = ensemble_from_means(&means);

    let mut opts = options(RankMode::Random);
    opts.seed = Some(99);
    let a = rank_ensemble(&ensemble, &opts, None, None).unwrap();
    let b = rank_ensemble(&ensemble, &opts, None, None).unwrap();

    let (RankTables::Grouped { order: oa, .. }, RankTables::Grouped { order: ob, .. }) =
        (&a.tables, &b.tables)
    else {
        panic!("random must be grouped");
    };
    assert_eq!(oa, ob);
}

#[test]
fn cumulative_weights_are_a_normalized_cdf() {
    let mut ensemble = ensemble_from_means(&[vec![0.4], vec![0.1], vec![0.3], vec![0.2]]);
    let w = [1.0, 2.0, 0.5, 0.5];
    for (r, &wi) in ensemble.realizations.iter_mut().zip(w.iter()) {
        r.weight = wi;
    }

    let ranked = rank_ensemble(&ensemble, &options(RankMode::Unified), None, None).unwrap();
    let RankTables::Grouped {
        cumulative_weight, ..
    } = &ranked.tables
    else {
        panic!()
    };

    assert!(cumulative_weight.iter().all(|&c| (0.0..=1.0 + 1e-12).contains(&c)));
    for pair in cumulative_weight.windows(2) {
        assert!(pair[0] <= pair[1]);
    }
    assert!((cumulative_weight.last().unwrap() - 1.0).abs() < 1e-12);
}

#[test]
fn empty_ensemble_is_a_data_integrity_error() {
    let ensemble = Ensemble {
        z: vec![0.0, 1.0],
        realizations: Vec::new(),
        fiducial: None,
    };
    for mode in [RankMode::NoRank, RankMode::Unified, RankMode::Random] {
        let err = rank_ensemble(&ensemble, &options(mode), None, None).unwrap_err();
        assert!(matches!(err, HyperrankError::DataIntegrity(_)), "{mode}");
    }
}

#[test]
fn all_zero_weights_abort_setup() {
    let mut ensemble = ensemble_from_means(&[vec![0.4], vec![0.1]]);
    for r in &mut ensemble.realizations {
        r.weight = 0.0;
    }
    let err = rank_ensemble(&ensemble, &options(RankMode::Unified), None, None).unwrap_err();
    assert!(matches!(err, HyperrankError::DataIntegrity(_)));
}

#[test]
fn fiducial_position_is_searchsorted_over_the_ranked_statistic() {
    let ranked = [0.1, 0.2, 0.3, 0.4];
    // Below the first key, between keys, on a key (left insertion), above.
    assert_eq!(fiducial_position(&ranked, 0.05), 0);
    assert_eq!(fiducial_position(&ranked, 0.25), 2);
    assert_eq!(fiducial_position(&ranked, 0.3), 2);
    assert_eq!(fiducial_position(&ranked, 0.9), 4);
}

#[test]
fn mode_strings_parse_to_the_closed_set() {
    for (s, mode) in [
        ("no-rank", RankMode::NoRank),
        ("unified", RankMode::Unified),
        ("separate", RankMode::Separate),
        ("inv-chi-unified", RankMode::InvChiUnified),
        ("inv-chi-separate", RankMode::InvChiSeparate),
        ("random", RankMode::Random),
        ("external", RankMode::External),
    ] {
        assert_eq!(s.parse::<RankMode>().unwrap(), mode);
        assert_eq!(mode.to_string(), s);
    }
    assert!(matches!(
        "alphabetical".parse::<RankMode>(),
        Err(HyperrankError::Configuration(_))
    ));
}
