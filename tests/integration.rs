//! Integration tests driving full greedy selection runs.
//!
//! The optimizer side is a minimal naive-greedy loop over the public
//! [`SubmodularObjective`] interface, the way an external optimizer would use
//! the crate.

use approx::assert_abs_diff_eq;
use facloc::{
    BackendKind, BackendPreference, CsrMatrix, DenseMatrix, FaclocError, FacilityLocation,
    InitialSubset, SaturatedCoverage, SelectionConfig, SubmodularObjective,
};
use tracing_subscriber::{filter::LevelFilter, fmt, prelude::*, EnvFilter};

// ─────────────────────────────────────────────────────────────────────────────
// Helpers
// ─────────────────────────────────────────────────────────────────────────────

/// Thread-local subscriber so log output lands in the test harness.
fn init_test_subscriber() -> tracing::subscriber::DefaultGuard {
    let fmt_layer = fmt::layer().with_target(true).with_test_writer();
    let filter_layer = EnvFilter::builder()
        .with_default_directive(LevelFilter::DEBUG.into())
        .from_env_lossy();
    tracing_subscriber::registry()
        .with(filter_layer)
        .with(fmt_layer)
        .set_default()
}

/// Reproducible nonnegative similarities, about a third of them zero.
fn lcg_matrix(nrows: usize, ncols: usize, seed: u64) -> DenseMatrix {
    let mut x = seed;
    let data = (0..nrows * ncols)
        .map(|_| {
            x = x.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
            let u = (x >> 11) as f64 / (1u64 << 53) as f64;
            if u < 0.33 {
                0.0
            } else {
                (u * 8.0).floor() / 4.0
            }
        })
        .collect();
    DenseMatrix::new(nrows, ncols, data).unwrap()
}

/// Naive greedy: score every remaining row, take the first maximum, commit.
fn greedy<O: SubmodularObjective>(f: &mut O, k: usize) -> Vec<(usize, f64)> {
    let mut picks = Vec::new();
    while picks.len() < k {
        let remaining = f.history().remaining();
        if remaining.is_empty() {
            break;
        }
        let gains = f.compute_gains(&remaining).unwrap();
        let mut best = 0;
        for (i, &g) in gains.iter().enumerate() {
            if g > gains[best] {
                best = i;
            }
        }
        f.commit(remaining[best], gains[best]).unwrap();
        picks.push((remaining[best], gains[best]));
    }
    picks
}

fn scenario() -> DenseMatrix {
    DenseMatrix::from_rows(&[
        [5.0, 1.0, 0.0, 2.0],
        [1.0, 4.0, 1.0, 0.0],
        [0.0, 1.0, 3.0, 1.0],
        [2.0, 0.0, 1.0, 6.0],
    ])
    .unwrap()
}

// ─────────────────────────────────────────────────────────────────────────────
// Facility location, end to end
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn e2e_scenario_ranking_on_every_preference() {
    let _guard = init_test_subscriber();
    for preference in [
        BackendPreference::Cpu,
        BackendPreference::Auto,
        BackendPreference::Device,
    ] {
        let config = SelectionConfig::default().with_backend(preference);
        let mut f = FacilityLocation::new(scenario(), config).unwrap();
        f.initialize(None).unwrap();
        let picks = greedy(&mut f, 4);
        assert_eq!(picks, vec![(3, 9.0), (0, 4.0), (1, 3.0), (2, 2.0)]);
        assert_eq!(f.value(), 18.0);
    }
}

#[test]
fn e2e_sparse_scenario() {
    let _guard = init_test_subscriber();
    let sparse = CsrMatrix::from_dense(&scenario()).unwrap();
    assert_eq!(sparse.nnz(), 12);
    let config = SelectionConfig::default().with_backend(BackendPreference::Device);
    let mut f = FacilityLocation::new(sparse, config).unwrap();
    assert_eq!(f.backend_kind(), BackendKind::Sparse);
    f.initialize(None).unwrap();
    let picks = greedy(&mut f, 4);
    assert_eq!(picks, vec![(3, 9.0), (0, 4.0), (1, 3.0), (2, 2.0)]);
}

#[test]
fn e2e_dense_and_sparse_pick_identically() {
    let x = lcg_matrix(120, 40, 7);
    let config = SelectionConfig::default().with_min_parallel_len(8);
    let mut fd = FacilityLocation::new(x.clone(), config).unwrap();
    let mut fs = FacilityLocation::new(CsrMatrix::from_dense(&x).unwrap(), config).unwrap();
    fd.initialize(Some(&InitialSubset::Indices(vec![5, 17]))).unwrap();
    fs.initialize(Some(&InitialSubset::Indices(vec![5, 17]))).unwrap();

    let pd = greedy(&mut fd, 25);
    let ps = greedy(&mut fs, 25);
    for ((id, gd), (is, gs)) in pd.iter().zip(&ps) {
        assert_eq!(id, is);
        assert_abs_diff_eq!(gd, gs, epsilon = 1e-9);
    }
    assert_abs_diff_eq!(fd.value(), fs.value(), epsilon = 1e-9);
}

#[test]
fn e2e_fused_matches_external_greedy() {
    let x = lcg_matrix(64, 24, 99);
    let mut external =
        FacilityLocation::new(x.clone(), SelectionConfig::default()).unwrap();
    let mut fused = FacilityLocation::new(
        x,
        SelectionConfig::default().with_backend(BackendPreference::Auto),
    )
    .unwrap();
    external.initialize(None).unwrap();
    fused.initialize(None).unwrap();

    let expected = greedy(&mut external, 64);
    let mut got = Vec::new();
    while let Some((idx, gain)) = fused.select_fused().unwrap() {
        fused.commit(idx, gain).unwrap();
        got.push((idx, gain));
    }
    assert_eq!(got.len(), expected.len());
    for ((ie, ge), (ig, gg)) in expected.iter().zip(&got) {
        assert_eq!(ie, ig);
        assert_abs_diff_eq!(ge, gg, epsilon = 1e-9);
    }
}

#[test]
fn e2e_gains_sum_to_objective() {
    let x = lcg_matrix(50, 30, 3);
    let mut f = FacilityLocation::new(x, SelectionConfig::default()).unwrap();
    f.initialize(None).unwrap();
    greedy(&mut f, 50);
    assert_abs_diff_eq!(f.history().objective_value(), f.value(), epsilon = 1e-9);
    let mut sorted = f.history().ranking().to_vec();
    sorted.sort_unstable();
    assert_eq!(sorted, (0..50).collect::<Vec<_>>());
}

#[test]
fn e2e_greedy_gains_non_increasing() {
    let x = lcg_matrix(80, 16, 11);
    let mut f = FacilityLocation::new(x, SelectionConfig::default()).unwrap();
    f.initialize(None).unwrap();
    let picks = greedy(&mut f, 80);
    for w in picks.windows(2) {
        assert!(w[1].1 <= w[0].1 + 1e-9, "{:?}", w);
    }
}

#[test]
fn e2e_seeded_run_skips_seed_value() {
    let mut f = FacilityLocation::new(scenario(), SelectionConfig::default()).unwrap();
    f.initialize(Some(&InitialSubset::from(vec![3]))).unwrap();
    assert_eq!(f.value(), 9.0);
    assert!(f.history().is_empty());
    let picks = greedy(&mut f, 1);
    assert_eq!(picks, vec![(0, 4.0)]);
}

#[test]
fn e2e_errors_surface_through_trait() {
    let mut f = FacilityLocation::new(scenario(), SelectionConfig::default()).unwrap();
    assert_eq!(f.compute_gains(&[0]), Err(FaclocError::NotInitialized));
    f.initialize(None).unwrap();
    assert_eq!(
        f.compute_gains(&[0, 4]),
        Err(FaclocError::IndexOutOfBounds { index: 4, len: 4 })
    );
    assert_eq!(
        f.commit(7, 1.0),
        Err(FaclocError::IndexOutOfBounds { index: 7, len: 4 })
    );
    assert!(f.history().is_empty());
}

// ─────────────────────────────────────────────────────────────────────────────
// Saturated coverage
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn e2e_saturated_spreads_selection() {
    let _guard = init_test_subscriber();
    // Rows 0 and 1 both load dimension 0; rows 2 and 3 cover the rest.
    let x = DenseMatrix::from_rows(&[
        [10.0, 0.0, 0.0],
        [9.0, 0.0, 0.0],
        [0.0, 3.0, 0.0],
        [0.0, 0.0, 2.0],
    ])
    .unwrap();
    let mut f = SaturatedCoverage::new(x, 0.5, SelectionConfig::default()).unwrap();
    f.initialize(None).unwrap();
    let picks = greedy(&mut f, 3);
    // Caps are [9.5, 1.5, 1.0]: after row 0 fills dimension 0, row 1 has
    // nothing left to add there.
    assert_eq!(picks.iter().map(|p| p.0).collect::<Vec<_>>(), vec![0, 2, 3]);
    assert_abs_diff_eq!(f.value(), 12.0, epsilon = 1e-12);
}

#[test]
fn e2e_saturated_sparse_matches_dense() {
    let x = lcg_matrix(60, 20, 5);
    let config = SelectionConfig::default().with_min_parallel_len(4);
    let mut fd = SaturatedCoverage::new(x.clone(), 0.2, config).unwrap();
    let mut fs = SaturatedCoverage::new(CsrMatrix::from_dense(&x).unwrap(), 0.2, config).unwrap();
    fd.initialize(None).unwrap();
    fs.initialize(None).unwrap();
    let pd = greedy(&mut fd, 15);
    let ps = greedy(&mut fs, 15);
    for ((id, gd), (is, gs)) in pd.iter().zip(&ps) {
        assert_eq!(id, is);
        assert_abs_diff_eq!(gd, gs, epsilon = 1e-9);
    }
}
