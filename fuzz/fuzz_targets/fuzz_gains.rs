#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use facloc::{
    CsrMatrix, DenseMatrix, FacilityLocation, InitialSubset, SelectionConfig,
    SubmodularObjective,
};

#[derive(Arbitrary, Debug)]
struct Run {
    ncols: u8,
    values: Vec<u8>,
    seed: Vec<u8>,
    picks: Vec<u8>,
}

fuzz_target!(|run: Run| {
    let ncols = usize::from(run.ncols % 16) + 1;
    let nrows = run.values.len() / ncols;
    if nrows == 0 {
        return;
    }
    let data: Vec<f64> = run.values[..nrows * ncols]
        .iter()
        .map(|&v| if v < 96 { 0.0 } else { f64::from(v) / 16.0 })
        .collect();
    let Ok(x) = DenseMatrix::new(nrows, ncols, data) else {
        return;
    };

    let config = SelectionConfig::default().with_min_parallel_len(1);
    let mut fd = FacilityLocation::new(x.clone(), config).unwrap();
    let mut fs = FacilityLocation::new(CsrMatrix::from_dense(&x).unwrap(), config).unwrap();

    // Seeds may be out of range; both layouts must reject them the same way
    let seed = InitialSubset::Indices(run.seed.iter().map(|&s| usize::from(s)).collect());
    let rd = fd.initialize(Some(&seed));
    let rs = fs.initialize(Some(&seed));
    assert_eq!(rd, rs);
    if rd.is_err() {
        fd.initialize(None).unwrap();
        fs.initialize(None).unwrap();
    }

    let all: Vec<usize> = (0..nrows).collect();
    for &p in &run.picks {
        let gd = fd.compute_gains(&all).unwrap();
        let gs = fs.compute_gains(&all).unwrap();
        for (a, b) in gd.iter().zip(&gs) {
            assert!((a - b).abs() < 1e-9, "dense {a} vs sparse {b}");
            assert!(*a >= -1e-9);
        }
        let idx = usize::from(p) % nrows;
        fd.commit(idx, gd[idx]).unwrap();
        fs.commit(idx, gs[idx]).unwrap();
    }
});
