//! Python bindings for facloc using PyO3.
//!
//! Exposes the objectives so a Python-side optimizer can drive the greedy
//! rounds itself.
//!
//! # Usage
//!
//! ```python
//! import facloc
//!
//! X = [[5.0, 1.0, 0.0, 2.0],
//!      [1.0, 4.0, 1.0, 0.0],
//!      [0.0, 1.0, 3.0, 1.0],
//!      [2.0, 0.0, 1.0, 6.0]]
//! f = facloc.FacilityLocation(X, backend="auto")
//! f.initialize()
//! gains = f.compute_gains([0, 1, 2, 3])   # [8.0, 6.0, 5.0, 9.0]
//! f.commit(3, 9.0)
//! idx, gain = f.select_fused()            # (0, 4.0)
//! ```

use ::facloc::{
    BackendPreference, CsrMatrix, DenseMatrix, FaclocError, FacilityLocation, InitialSubset,
    SaturatedCoverage, SelectionConfig, SimilarityMatrix, SubmodularObjective,
};
use pyo3::exceptions::PyValueError;
use pyo3::prelude::*;
use pyo3::types::PyList;

/// Python module for facloc.
#[pymodule]
#[pyo3(name = "facloc")]
fn facloc_module(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_class::<FacilityLocationPy>()?;
    m.add_class::<SaturatedCoveragePy>()?;
    Ok(())
}

fn to_py_err(e: FaclocError) -> PyErr {
    PyErr::new::<PyValueError, _>(e.to_string())
}

fn parse_backend(name: &str) -> PyResult<BackendPreference> {
    match name {
        "auto" => Ok(BackendPreference::Auto),
        "cpu" => Ok(BackendPreference::Cpu),
        "device" | "gpu" => Ok(BackendPreference::Device),
        other => Err(PyErr::new::<PyValueError, _>(format!(
            "unknown backend {other:?}, expected \"auto\", \"cpu\" or \"device\""
        ))),
    }
}

fn dense_from_list(rows: &Bound<'_, PyList>) -> PyResult<DenseMatrix> {
    let rows: Vec<Vec<f64>> = rows.extract()?;
    DenseMatrix::from_rows(&rows).map_err(to_py_err)
}

/// A seed is either a flat list of row indices or a list of example vectors.
fn parse_initial(initial: Option<&Bound<'_, PyList>>) -> PyResult<Option<InitialSubset>> {
    let Some(list) = initial else {
        return Ok(None);
    };
    if let Ok(idxs) = list.extract::<Vec<usize>>() {
        return Ok(Some(InitialSubset::Indices(idxs)));
    }
    let rows: Vec<Vec<f64>> = list.extract()?;
    Ok(Some(InitialSubset::Examples(rows)))
}

/// Facility location over a dense or CSR similarity matrix.
#[pyclass(name = "FacilityLocation")]
struct FacilityLocationPy {
    inner: FacilityLocation,
}

#[pymethods]
impl FacilityLocationPy {
    #[new]
    #[pyo3(signature = (similarity, *, backend = "cpu", min_parallel_len = 64))]
    fn new(similarity: &Bound<'_, PyList>, backend: &str, min_parallel_len: usize) -> PyResult<Self> {
        let config = SelectionConfig::new()
            .with_backend(parse_backend(backend)?)
            .with_min_parallel_len(min_parallel_len);
        let x = dense_from_list(similarity)?;
        Ok(Self {
            inner: FacilityLocation::new(x, config).map_err(to_py_err)?,
        })
    }

    /// Build from raw CSR buffers (`scipy.sparse.csr_matrix` fields).
    #[staticmethod]
    #[pyo3(signature = (data, indices, indptr, ncols, *, min_parallel_len = 64))]
    fn from_csr(
        data: Vec<f64>,
        indices: Vec<u32>,
        indptr: Vec<usize>,
        ncols: usize,
        min_parallel_len: usize,
    ) -> PyResult<Self> {
        let nrows = indptr.len().saturating_sub(1);
        let x = CsrMatrix::new(nrows, ncols, data, indices, indptr).map_err(to_py_err)?;
        let config = SelectionConfig::new().with_min_parallel_len(min_parallel_len);
        Ok(Self {
            inner: FacilityLocation::new(SimilarityMatrix::Sparse(x), config).map_err(to_py_err)?,
        })
    }

    #[pyo3(signature = (initial = None))]
    fn initialize(&mut self, initial: Option<&Bound<'_, PyList>>) -> PyResult<()> {
        let seed = parse_initial(initial)?;
        self.inner.initialize(seed.as_ref()).map_err(to_py_err)
    }

    fn compute_gains(&self, candidates: Vec<usize>) -> PyResult<Vec<f64>> {
        self.inner.compute_gains(&candidates).map_err(to_py_err)
    }

    fn commit(&mut self, index: usize, gain: f64) -> PyResult<()> {
        self.inner.commit(index, gain).map_err(to_py_err)
    }

    /// Best unselected `(index, gain)`, or `None` once every row is selected.
    fn select_fused(&self) -> PyResult<Option<(usize, f64)>> {
        self.inner.select_fused().map_err(to_py_err)
    }

    #[getter]
    fn ranking(&self) -> Vec<usize> {
        self.inner.history().ranking().to_vec()
    }

    #[getter]
    fn gains(&self) -> Vec<f64> {
        self.inner.history().gains().to_vec()
    }

    #[getter]
    fn coverage(&self) -> Vec<f64> {
        self.inner.coverage().to_vec()
    }

    #[getter]
    fn value(&self) -> f64 {
        self.inner.value()
    }

    #[getter]
    fn backend(&self) -> String {
        format!("{:?}", self.inner.backend_kind()).to_lowercase()
    }

    fn __len__(&self) -> usize {
        self.inner.n_candidates()
    }
}

/// Saturated coverage over a dense similarity matrix.
#[pyclass(name = "SaturatedCoverage")]
struct SaturatedCoveragePy {
    inner: SaturatedCoverage,
}

#[pymethods]
impl SaturatedCoveragePy {
    #[new]
    #[pyo3(signature = (similarity, *, alpha = 0.1, min_parallel_len = 64))]
    fn new(similarity: &Bound<'_, PyList>, alpha: f64, min_parallel_len: usize) -> PyResult<Self> {
        let config = SelectionConfig::new().with_min_parallel_len(min_parallel_len);
        let x = dense_from_list(similarity)?;
        Ok(Self {
            inner: SaturatedCoverage::new(x, alpha, config).map_err(to_py_err)?,
        })
    }

    #[pyo3(signature = (initial = None))]
    fn initialize(&mut self, initial: Option<&Bound<'_, PyList>>) -> PyResult<()> {
        let seed = parse_initial(initial)?;
        self.inner.initialize(seed.as_ref()).map_err(to_py_err)
    }

    fn compute_gains(&self, candidates: Vec<usize>) -> PyResult<Vec<f64>> {
        self.inner.compute_gains(&candidates).map_err(to_py_err)
    }

    fn commit(&mut self, index: usize, gain: f64) -> PyResult<()> {
        self.inner.commit(index, gain).map_err(to_py_err)
    }

    #[getter]
    fn ranking(&self) -> Vec<usize> {
        self.inner.history().ranking().to_vec()
    }

    #[getter]
    fn gains(&self) -> Vec<f64> {
        self.inner.history().gains().to_vec()
    }

    #[getter]
    fn value(&self) -> f64 {
        self.inner.value()
    }
}
