#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use facloc::{CsrMatrix, FacilityLocation, SelectionConfig, SubmodularObjective};

#[derive(Arbitrary, Debug)]
struct RawRun {
    nrows: u8,
    ncols: u8,
    data: Vec<f64>,
    indices: Vec<u32>,
    indptr: Vec<usize>,
    commits: Vec<u16>,
}

fuzz_target!(|raw: RawRun| {
    // Should not panic on any input; rejected buffers just return Err
    let nrows = usize::from(raw.nrows);
    let ncols = usize::from(raw.ncols);
    let Ok(m) = CsrMatrix::new(nrows, ncols, raw.data, raw.indices, raw.indptr) else {
        return;
    };
    let Ok(mut f) = FacilityLocation::new(m, SelectionConfig::default()) else {
        return;
    };
    f.initialize(None).unwrap();

    let mut prev = f.coverage().clone();
    for &c in &raw.commits {
        let idx = usize::from(c);
        match f.commit(idx, 0.0) {
            Ok(()) => assert!(idx < nrows),
            Err(_) => assert!(idx >= nrows),
        }
        assert!(f.coverage().dominates(&prev));
        prev = f.coverage().clone();
    }
    assert_eq!(f.history().len(), raw.commits.iter().filter(|&&c| usize::from(c) < nrows).count());
});
