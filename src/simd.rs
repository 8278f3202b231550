//! Coverage reductions with SIMD acceleration.
//!
//! Provides `max_sum`, `max_assign`, and `sum` over `f64` slices with
//! automatic SIMD dispatch:
//! - AVX on `x86_64` (runtime detection)
//! - NEON on `aarch64`
//! - Portable fallback otherwise
//!
//! # Correctness
//!
//! All SIMD implementations are tested against the portable fallback.
//! `max_assign` is exact; the reductions may differ from the portable path by
//! summation order only.

/// `sum_k max(row[k], coverage[k])`.
///
/// If the slices have different lengths, uses the shorter length.
/// Returns 0.0 for empty input.
#[inline]
#[must_use]
pub fn max_sum(row: &[f64], coverage: &[f64]) -> f64 {
    #[cfg(target_arch = "x86_64")]
    {
        if is_x86_feature_detected!("avx") {
            // SAFETY: AVX availability verified at runtime.
            // The function handles mismatched lengths by using min(a.len(), b.len()).
            return unsafe { max_sum_avx(row, coverage) };
        }
    }
    #[cfg(target_arch = "aarch64")]
    {
        // SAFETY: NEON is always available on aarch64.
        return unsafe { max_sum_neon(row, coverage) };
    }
    #[allow(unreachable_code)]
    max_sum_portable(row, coverage)
}

/// `dst[k] = max(dst[k], src[k])` over the shorter length.
#[inline]
pub fn max_assign(dst: &mut [f64], src: &[f64]) {
    #[cfg(target_arch = "x86_64")]
    {
        if is_x86_feature_detected!("avx") {
            // SAFETY: AVX availability verified at runtime.
            unsafe { max_assign_avx(dst, src) };
            return;
        }
    }
    #[cfg(target_arch = "aarch64")]
    {
        // SAFETY: NEON is always available on aarch64.
        unsafe { max_assign_neon(dst, src) };
        return;
    }
    #[allow(unreachable_code)]
    max_assign_portable(dst, src);
}

/// Sum of all elements.
#[inline]
#[must_use]
pub fn sum(v: &[f64]) -> f64 {
    v.iter().sum()
}

// ─────────────────────────────────────────────────────────────────────────────
// Portable fallback
// ─────────────────────────────────────────────────────────────────────────────

/// Portable reference for [`max_sum`].
#[inline]
#[must_use]
pub(crate) fn max_sum_portable(row: &[f64], coverage: &[f64]) -> f64 {
    row.iter().zip(coverage).map(|(x, c)| x.max(*c)).sum()
}

/// Portable reference for [`max_assign`].
#[inline]
pub(crate) fn max_assign_portable(dst: &mut [f64], src: &[f64]) {
    for (d, s) in dst.iter_mut().zip(src) {
        *d = d.max(*s);
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// AVX (x86_64)
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(target_arch = "x86_64")]
#[target_feature(enable = "avx")]
unsafe fn max_sum_avx(a: &[f64], b: &[f64]) -> f64 {
    use std::arch::x86_64::{
        __m256d, _mm256_add_pd, _mm256_castpd256_pd128, _mm256_extractf128_pd, _mm256_loadu_pd,
        _mm256_max_pd, _mm256_setzero_pd, _mm_add_pd, _mm_add_sd, _mm_cvtsd_f64,
        _mm_unpackhi_pd,
    };

    let n = a.len().min(b.len());
    if n == 0 {
        return 0.0;
    }

    let chunks = n / 4;
    let remainder = n % 4;

    let mut acc: __m256d = _mm256_setzero_pd();

    let a_ptr = a.as_ptr();
    let b_ptr = b.as_ptr();

    // SAFETY: chunks*4 <= n <= min(a.len(), b.len()).
    for i in 0..chunks {
        let offset = i * 4;
        let va = _mm256_loadu_pd(a_ptr.add(offset));
        let vb = _mm256_loadu_pd(b_ptr.add(offset));
        acc = _mm256_add_pd(acc, _mm256_max_pd(va, vb));
    }

    // Horizontal sum: reduce 4 f64s to 1
    let hi = _mm256_extractf128_pd(acc, 1);
    let lo = _mm256_castpd256_pd128(acc);
    let sum128 = _mm_add_pd(lo, hi);
    let sum64 = _mm_add_sd(sum128, _mm_unpackhi_pd(sum128, sum128));
    let mut result = _mm_cvtsd_f64(sum64);

    let tail_start = chunks * 4;
    for i in 0..remainder {
        // SAFETY: tail_start + i < n
        result += a.get_unchecked(tail_start + i).max(*b.get_unchecked(tail_start + i));
    }

    result
}

#[cfg(target_arch = "x86_64")]
#[target_feature(enable = "avx")]
unsafe fn max_assign_avx(dst: &mut [f64], src: &[f64]) {
    use std::arch::x86_64::{_mm256_loadu_pd, _mm256_max_pd, _mm256_storeu_pd};

    let n = dst.len().min(src.len());
    let chunks = n / 4;

    let d_ptr = dst.as_mut_ptr();
    let s_ptr = src.as_ptr();

    // SAFETY: chunks*4 <= n <= min(dst.len(), src.len()).
    for i in 0..chunks {
        let offset = i * 4;
        let vd = _mm256_loadu_pd(d_ptr.add(offset));
        let vs = _mm256_loadu_pd(s_ptr.add(offset));
        _mm256_storeu_pd(d_ptr.add(offset), _mm256_max_pd(vd, vs));
    }

    let tail_start = chunks * 4;
    max_assign_portable(&mut dst[tail_start..n], &src[tail_start..n]);
}

// ─────────────────────────────────────────────────────────────────────────────
// NEON (aarch64)
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(target_arch = "aarch64")]
#[target_feature(enable = "neon")]
unsafe fn max_sum_neon(a: &[f64], b: &[f64]) -> f64 {
    use std::arch::aarch64::{float64x2_t, vaddq_f64, vaddvq_f64, vdupq_n_f64, vld1q_f64, vmaxq_f64};

    let n = a.len().min(b.len());
    if n == 0 {
        return 0.0;
    }

    let chunks = n / 2;
    let remainder = n % 2;

    let mut acc: float64x2_t = vdupq_n_f64(0.0);

    let a_ptr = a.as_ptr();
    let b_ptr = b.as_ptr();

    // SAFETY: chunks*2 <= n <= min(a.len(), b.len()).
    for i in 0..chunks {
        let offset = i * 2;
        let va = vld1q_f64(a_ptr.add(offset));
        let vb = vld1q_f64(b_ptr.add(offset));
        acc = vaddq_f64(acc, vmaxq_f64(va, vb));
    }

    let mut result = vaddvq_f64(acc);

    let tail_start = chunks * 2;
    for i in 0..remainder {
        // SAFETY: tail_start + i < n
        result += a.get_unchecked(tail_start + i).max(*b.get_unchecked(tail_start + i));
    }

    result
}

#[cfg(target_arch = "aarch64")]
#[target_feature(enable = "neon")]
unsafe fn max_assign_neon(dst: &mut [f64], src: &[f64]) {
    use std::arch::aarch64::{vld1q_f64, vmaxq_f64, vst1q_f64};

    let n = dst.len().min(src.len());
    let chunks = n / 2;

    let d_ptr = dst.as_mut_ptr();
    let s_ptr = src.as_ptr();

    // SAFETY: chunks*2 <= n <= min(dst.len(), src.len()).
    for i in 0..chunks {
        let offset = i * 2;
        let vd = vld1q_f64(d_ptr.add(offset));
        let vs = vld1q_f64(s_ptr.add(offset));
        vst1q_f64(d_ptr.add(offset), vmaxq_f64(vd, vs));
    }

    let tail_start = chunks * 2;
    max_assign_portable(&mut dst[tail_start..n], &src[tail_start..n]);
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────


// ─────────────────────────────────────────────────────────────────────────────
// Property Tests
// ─────────────────────────────────────────────────────────────────────────────
