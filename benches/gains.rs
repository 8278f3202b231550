use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use facloc::{
    dense, simd, sparse, BackendPreference, CsrMatrix, DenseMatrix, FacilityLocation,
    SelectionConfig, SubmodularObjective,
};

fn random_vec(len: usize, seed: u64, density: f64) -> Vec<f64> {
    // Simple LCG for reproducible "random" similarities
    let mut x = seed;
    (0..len)
        .map(|_| {
            x = x.wrapping_mul(6364136223846793005).wrapping_add(1);
            let u = (x >> 11) as f64 / (1u64 << 53) as f64;
            if u < density {
                u / density
            } else {
                0.0
            }
        })
        .collect()
}

fn random_matrix(nrows: usize, ncols: usize, density: f64) -> DenseMatrix {
    DenseMatrix::new(nrows, ncols, random_vec(nrows * ncols, 42, density)).unwrap()
}

fn bench_simd(c: &mut Criterion) {
    let mut g = c.benchmark_group("simd");

    for &dim in &[128, 384, 1024, 4096] {
        let row = random_vec(dim, 1, 1.0);
        let cov = random_vec(dim, 2, 1.0);

        g.bench_with_input(BenchmarkId::new("max_sum", dim), &dim, |bench, _| {
            bench.iter(|| black_box(simd::max_sum(&row, &cov)));
        });
    }

    g.finish();
}

fn bench_kernels(c: &mut Criterion) {
    let mut g = c.benchmark_group("coverage_if_added");

    // 2000 candidates against 512 reference points, 5% dense
    let (n, d) = (2000, 512);
    let x = random_matrix(n, d, 0.05);
    let csr = CsrMatrix::from_dense(&x).unwrap();
    let cov = random_vec(d, 7, 0.5);
    let total: f64 = cov.iter().sum();
    let idxs: Vec<usize> = (0..n).collect();
    let mut out = vec![0.0; n];

    for &grain in &[1, 64, 512] {
        g.bench_with_input(BenchmarkId::new("dense", grain), &grain, |bench, &grain| {
            bench.iter(|| {
                dense::coverage_if_added(&x, &cov, &idxs, &mut out, grain);
                black_box(&out);
            });
        });

        g.bench_with_input(BenchmarkId::new("sparse", grain), &grain, |bench, &grain| {
            bench.iter(|| {
                sparse::coverage_if_added(&csr, &cov, total, &idxs, &mut out, grain);
                black_box(&out);
            });
        });
    }

    g.finish();
}

fn bench_greedy(c: &mut Criterion) {
    let mut g = c.benchmark_group("greedy_k32");
    g.sample_size(20);

    let x = random_matrix(1000, 256, 0.2);

    for (name, preference) in [
        ("cpu", BackendPreference::Cpu),
        ("auto", BackendPreference::Auto),
        ("device", BackendPreference::Device),
    ] {
        let config = SelectionConfig::default().with_backend(preference);
        let base = FacilityLocation::new(x.clone(), config).unwrap();

        g.bench_function(BenchmarkId::new("fused", name), |bench| {
            bench.iter(|| {
                let mut f = base.clone();
                f.initialize(None).unwrap();
                for _ in 0..32 {
                    if let Some((idx, gain)) = f.select_fused().unwrap() {
                        f.commit(idx, gain).unwrap();
                    }
                }
                black_box(f.value())
            });
        });
    }

    g.finish();
}

criterion_group!(benches, bench_simd, bench_kernels, bench_greedy);
criterion_main!(benches);
