//! Device gain kernel: one fused pass over the whole candidate universe.
//!
//! The similarity matrix is uploaded once into a [`DeviceBlock`]: rows padded
//! to a whole number of lanes, plus a device-resident coverage vector and a
//! selection mask. Each round then runs
//!
//! ```text
//! gains = rowwise_sum(max(X, coverage)) * (1 - mask)
//! pick  = argmax(gains) over unmasked rows
//! ```
//!
//! Unlike the CPU kernels, which score a caller-chosen candidate subset and
//! leave the pick to the caller, this kernel scores every row and returns the
//! winner itself. That makes it a naive-greedy-only path.
//!
//! With the `cuda` feature the pass is two NVRTC-compiled kernels launched
//! through `cudarc`: a one-thread-per-row masked max-sum and a single-block
//! first-max reduction. Only the coverage vector and the mask travel to the
//! device after upload, and only the winning index comes back.
//!
//! Availability is decided once by [`DeviceCapability::detect`]. Without a
//! CUDA device (or without the feature) [`DeviceBlock::upload`] fails with
//! [`FaclocError::BackendUnavailable`]; [`DeviceBlock::host`] runs the same
//! fused pass on the host and is what the backend resolver falls back to.

use rayon::prelude::*;

use crate::matrix::DenseMatrix;
use crate::{simd, FaclocError, Result};

/// Row padding granularity, in `f64` lanes.
pub const LANES: usize = 4;

/// Device the block runs on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceCapability {
    /// CUDA device at this ordinal.
    Cuda {
        /// Device ordinal, as passed to the driver.
        ordinal: usize,
    },
}

impl DeviceCapability {
    /// Probe for a CUDA device. Returns `None` when the `cuda` feature is
    /// off, the driver cannot be loaded, or no device is visible.
    #[must_use]
    pub fn detect() -> Option<Self> {
        #[cfg(feature = "cuda")]
        {
            match cudarc::driver::CudaContext::device_count() {
                Ok(n) if n > 0 => return Some(Self::Cuda { ordinal: 0 }),
                Ok(_) => tracing::debug!("no CUDA device visible"),
                Err(err) => tracing::debug!(%err, "CUDA driver unavailable"),
            }
        }
        None
    }
}

/// Similarity block with coverage mirror and selection mask.
///
/// The host copies are always kept; on a CUDA block they mirror the device
/// buffers and serve [`row`](Self::row) and [`value_of`](Self::value_of).
#[derive(Debug, Clone)]
pub struct DeviceBlock {
    nrows: usize,
    ncols: usize,
    stride: usize,
    data: Vec<f64>,
    coverage: Vec<f64>,
    mask: Vec<f64>,
    #[cfg(feature = "cuda")]
    cuda: Option<cuda::CudaBlock>,
}

impl DeviceBlock {
    /// Upload a dense matrix onto the detected device.
    ///
    /// # Errors
    ///
    /// Returns [`FaclocError::BackendUnavailable`] if no CUDA device is
    /// present, or [`FaclocError::Device`] if the upload itself fails.
    pub fn upload(x: &DenseMatrix) -> Result<Self> {
        let capability = DeviceCapability::detect()
            .ok_or(FaclocError::BackendUnavailable("no CUDA device on this host"))?;
        Self::upload_with(x, capability)
    }

    /// Upload onto an explicitly chosen device.
    ///
    /// # Errors
    ///
    /// Returns [`FaclocError::BackendUnavailable`] when built without the
    /// `cuda` feature, or [`FaclocError::Device`] on a driver, compile or
    /// copy failure.
    pub fn upload_with(x: &DenseMatrix, capability: DeviceCapability) -> Result<Self> {
        #[cfg(feature = "cuda")]
        {
            let DeviceCapability::Cuda { ordinal } = capability;
            let mut block = Self::host(x);
            block.cuda = Some(cuda::CudaBlock::upload(
                ordinal,
                &block.data,
                block.nrows,
                block.stride,
            )?);
            tracing::debug!(ordinal, rows = block.nrows, stride = block.stride, "uploaded to CUDA");
            Ok(block)
        }
        #[cfg(not(feature = "cuda"))]
        {
            let _ = (x, capability);
            Err(FaclocError::BackendUnavailable("built without the `cuda` feature"))
        }
    }

    /// Host-resident block running the fused pass on the CPU.
    #[must_use]
    pub fn host(x: &DenseMatrix) -> Self {
        let nrows = x.nrows();
        let ncols = x.ncols();
        let stride = ncols.div_ceil(LANES) * LANES;
        let mut data = vec![0.0; nrows * stride];
        if stride > 0 {
            for (i, dst) in data.chunks_exact_mut(stride).enumerate() {
                dst[..ncols].copy_from_slice(x.row(i));
            }
        }
        Self {
            nrows,
            ncols,
            stride,
            data,
            coverage: vec![0.0; stride],
            mask: vec![0.0; nrows],
            #[cfg(feature = "cuda")]
            cuda: None,
        }
    }

    /// Number of rows.
    #[must_use]
    pub fn nrows(&self) -> usize {
        self.nrows
    }

    /// Number of reference dimensions (unpadded).
    #[must_use]
    pub fn ncols(&self) -> usize {
        self.ncols
    }

    /// Device the block lives on, or `None` for a host block.
    #[must_use]
    pub fn capability(&self) -> Option<DeviceCapability> {
        #[cfg(feature = "cuda")]
        {
            if let Some(c) = &self.cuda {
                return Some(DeviceCapability::Cuda { ordinal: c.ordinal });
            }
        }
        None
    }

    /// Row `i` without padding.
    #[inline]
    #[must_use]
    pub fn row(&self, i: usize) -> &[f64] {
        let start = i * self.stride;
        &self.data[start..start + self.ncols]
    }

    #[inline]
    fn mirror(&self) -> &[f64] {
        &self.coverage[..self.ncols]
    }

    /// `sum_k max(X[i, k], coverage[k])` for one row, reduced exactly as the
    /// dense kernel and [`Coverage::total`](crate::Coverage::total) reduce.
    #[inline]
    #[must_use]
    pub fn value_of(&self, i: usize) -> f64 {
        simd::max_sum(self.row(i), self.mirror())
    }

    /// Copy coverage into the mirror and onto the device. Padding stays zero.
    ///
    /// # Errors
    ///
    /// Returns [`FaclocError::Device`] if the copy to the device fails.
    pub fn load_coverage(&mut self, values: &[f64]) -> Result<()> {
        debug_assert_eq!(values.len(), self.ncols);
        self.coverage[..self.ncols].copy_from_slice(values);
        #[cfg(feature = "cuda")]
        {
            if let Some(c) = &mut self.cuda {
                c.write_coverage(&self.coverage)?;
            }
        }
        Ok(())
    }

    /// Exclude row `i` from future fused picks.
    ///
    /// # Errors
    ///
    /// Returns [`FaclocError::Device`] if the copy to the device fails.
    pub fn mark_selected(&mut self, i: usize) -> Result<()> {
        self.mask[i] = 1.0;
        #[cfg(feature = "cuda")]
        {
            if let Some(c) = &mut self.cuda {
                c.write_mask(&self.mask)?;
            }
        }
        Ok(())
    }

    /// Whether row `i` has been marked selected.
    #[must_use]
    pub fn is_selected(&self, i: usize) -> bool {
        self.mask[i] != 0.0
    }

    /// Clear the selection mask and zero the coverage mirror.
    ///
    /// # Errors
    ///
    /// Returns [`FaclocError::Device`] if the copy to the device fails.
    pub fn reset(&mut self) -> Result<()> {
        self.mask.iter_mut().for_each(|m| *m = 0.0);
        self.coverage.iter_mut().for_each(|c| *c = 0.0);
        #[cfg(feature = "cuda")]
        {
            if let Some(c) = &mut self.cuda {
                c.write_mask(&self.mask)?;
                c.write_coverage(&self.coverage)?;
            }
        }
        Ok(())
    }

    /// Coverage value of each listed row against the mirror, like the CPU
    /// kernels. Subset scoring always runs on the host copy.
    ///
    /// # Panics
    ///
    /// Panics if `out.len() != idxs.len()` or an index is out of bounds.
    pub fn coverage_if_added(&self, idxs: &[usize], out: &mut [f64], min_parallel_len: usize) {
        assert_eq!(out.len(), idxs.len(), "one output slot per candidate");
        out.par_iter_mut()
            .zip(idxs.par_iter())
            .with_min_len(min_parallel_len.max(1))
            .for_each(|(slot, &idx)| *slot = self.value_of(idx));
    }

    /// Fused pass: return the first unmasked row with the largest coverage
    /// value, or `None` when every row is masked.
    ///
    /// # Errors
    ///
    /// Returns [`FaclocError::Device`] if a kernel launch or copy fails.
    pub fn fused_argmax(&self, min_parallel_len: usize) -> Result<Option<usize>> {
        if self.nrows == 0 {
            return Ok(None);
        }
        #[cfg(feature = "cuda")]
        {
            if let Some(c) = &self.cuda {
                return c.fused_argmax(self.nrows, self.stride);
            }
        }
        let mut gains = vec![0.0; self.nrows];
        self.host_gains(&mut gains, min_parallel_len);
        Ok(first_unmasked_max(&gains, &self.mask))
    }

    /// Host rendition of the fused kernel's first stage: masked coverage
    /// values, one slot per row.
    ///
    /// # Panics
    ///
    /// Panics if `gains.len() != nrows`.
    pub fn host_gains(&self, gains: &mut [f64], min_parallel_len: usize) {
        assert_eq!(gains.len(), self.nrows, "one gain slot per row");
        gains
            .par_iter_mut()
            .zip(self.mask.par_iter())
            .enumerate()
            .with_min_len(min_parallel_len.max(1))
            .for_each(|(i, (g, &m))| *g = self.value_of(i) * (1.0 - m));
    }
}

/// Lowest index holding the maximum among rows whose mask is zero.
fn first_unmasked_max(gains: &[f64], mask: &[f64]) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (i, (&g, &m)) in gains.iter().zip(mask).enumerate() {
        if m != 0.0 {
            continue;
        }
        if best.map_or(true, |(_, b)| g > b) {
            best = Some((i, g));
        }
    }
    best.map(|(i, _)| i)
}

#[cfg(feature = "cuda")]
mod cuda {
    //! CUDA buffers and kernels behind [`DeviceBlock`](super::DeviceBlock).

    use std::sync::Arc;

    use cudarc::driver::{
        CudaContext, CudaFunction, CudaSlice, CudaStream, LaunchConfig, PushKernelArg,
    };
    use cudarc::nvrtc::compile_ptx;

    use crate::{FaclocError, Result};

    const BLOCK: u32 = 256;

    const KERNEL_SRC: &str = r#"
extern "C" __global__
void masked_max_sum(const double* x, const double* cov, const double* mask,
                    double* gains, int nrows, int stride)
{
    int i = blockIdx.x * blockDim.x + threadIdx.x;
    if (i >= nrows) return;
    const double* row = x + (size_t)i * (size_t)stride;
    double s = 0.0;
    for (int k = 0; k < stride; ++k) {
        s += fmax(row[k], cov[k]);
    }
    gains[i] = s * (1.0 - mask[i]);
}

extern "C" __global__
void first_unmasked_max(const double* gains, const double* mask, int n, int* out)
{
    __shared__ double best_v[256];
    __shared__ int best_i[256];
    int t = threadIdx.x;
    double bv = 0.0;
    int bi = -1;
    for (int i = t; i < n; i += blockDim.x) {
        if (mask[i] != 0.0) continue;
        double g = gains[i];
        if (bi < 0 || g > bv) { bv = g; bi = i; }
    }
    best_v[t] = bv;
    best_i[t] = bi;
    __syncthreads();
    for (int s = blockDim.x / 2; s > 0; s >>= 1) {
        if (t < s) {
            int oi = best_i[t + s];
            double ov = best_v[t + s];
            int mi = best_i[t];
            double mv = best_v[t];
            if (oi >= 0 && (mi < 0 || ov > mv || (ov == mv && oi < mi))) {
                best_v[t] = ov;
                best_i[t] = oi;
            }
        }
        __syncthreads();
    }
    if (t == 0) out[0] = best_i[0];
}
"#;

    fn device_err(err: impl std::fmt::Display) -> FaclocError {
        FaclocError::Device(err.to_string())
    }

    /// Zero-length device allocations are avoided; empty inputs get one
    /// unused slot.
    fn to_device(stream: &Arc<CudaStream>, host: &[f64]) -> Result<CudaSlice<f64>> {
        if host.is_empty() {
            stream.alloc_zeros::<f64>(1).map_err(device_err)
        } else {
            stream.clone_htod(host).map_err(device_err)
        }
    }

    fn as_i32(n: usize, what: &str) -> Result<i32> {
        i32::try_from(n).map_err(|_| FaclocError::Device(format!("{what} {n} exceeds kernel range")))
    }

    #[derive(Clone)]
    pub(super) struct CudaBlock {
        pub(super) ordinal: usize,
        stream: Arc<CudaStream>,
        masked_max_sum: CudaFunction,
        first_unmasked_max: CudaFunction,
        x: CudaSlice<f64>,
        coverage: CudaSlice<f64>,
        mask: CudaSlice<f64>,
    }

    impl std::fmt::Debug for CudaBlock {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.debug_struct("CudaBlock")
                .field("ordinal", &self.ordinal)
                .finish_non_exhaustive()
        }
    }

    impl CudaBlock {
        pub(super) fn upload(ordinal: usize, data: &[f64], nrows: usize, stride: usize) -> Result<Self> {
            as_i32(nrows, "row count")?;
            as_i32(stride, "row stride")?;
            let ctx = CudaContext::new(ordinal).map_err(device_err)?;
            let stream = ctx.default_stream();
            let ptx = compile_ptx(KERNEL_SRC).map_err(device_err)?;
            let module = ctx.load_module(ptx).map_err(device_err)?;
            let masked_max_sum = module.load_function("masked_max_sum").map_err(device_err)?;
            let first_unmasked_max = module
                .load_function("first_unmasked_max")
                .map_err(device_err)?;
            let x = to_device(&stream, data)?;
            let coverage = to_device(&stream, &vec![0.0; stride])?;
            let mask = to_device(&stream, &vec![0.0; nrows])?;
            Ok(Self {
                ordinal,
                stream,
                masked_max_sum,
                first_unmasked_max,
                x,
                coverage,
                mask,
            })
        }

        pub(super) fn write_coverage(&mut self, padded: &[f64]) -> Result<()> {
            if padded.is_empty() {
                return Ok(());
            }
            self.stream
                .memcpy_htod(padded, &mut self.coverage)
                .map_err(device_err)
        }

        pub(super) fn write_mask(&mut self, mask: &[f64]) -> Result<()> {
            if mask.is_empty() {
                return Ok(());
            }
            self.stream
                .memcpy_htod(mask, &mut self.mask)
                .map_err(device_err)
        }

        pub(super) fn fused_argmax(&self, nrows: usize, stride: usize) -> Result<Option<usize>> {
            let n = as_i32(nrows, "row count")?;
            let stride = as_i32(stride, "row stride")?;
            let mut gains: CudaSlice<f64> = self.stream.alloc_zeros(nrows).map_err(device_err)?;
            let mut best: CudaSlice<i32> = self.stream.alloc_zeros(1).map_err(device_err)?;

            let rows = LaunchConfig {
                grid_dim: (nrows.div_ceil(BLOCK as usize) as u32, 1, 1),
                block_dim: (BLOCK, 1, 1),
                shared_mem_bytes: 0,
            };
            let mut launch = self.stream.launch_builder(&self.masked_max_sum);
            launch.arg(&self.x);
            launch.arg(&self.coverage);
            launch.arg(&self.mask);
            launch.arg(&mut gains);
            launch.arg(&n);
            launch.arg(&stride);
            // SAFETY: argument order and types match `masked_max_sum`; the
            // grid covers `nrows` threads and every buffer holds the extents
            // the kernel indexes.
            unsafe { launch.launch(rows) }.map_err(device_err)?;

            let single = LaunchConfig {
                grid_dim: (1, 1, 1),
                block_dim: (BLOCK, 1, 1),
                shared_mem_bytes: 0,
            };
            let mut launch = self.stream.launch_builder(&self.first_unmasked_max);
            launch.arg(&gains);
            launch.arg(&self.mask);
            launch.arg(&n);
            launch.arg(&mut best);
            // SAFETY: one block of `BLOCK` threads matches the kernel's shared
            // arrays; `gains` and `mask` hold `nrows` entries.
            unsafe { launch.launch(single) }.map_err(device_err)?;

            let mut out = vec![0i32; 1];
            self.stream.memcpy_dtoh(&best, &mut out).map_err(device_err)?;
            Ok(usize::try_from(out[0]).ok())
        }
    }
}
