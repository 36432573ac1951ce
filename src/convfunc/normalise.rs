// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Normalisation of convolution functions.
//!
//! Kernels are stored as quadrants indexed `[x, y, plane]`, with the kernel
//! centre at `[0, 0, plane]`.

use ndarray::prelude::*;
use num_complex::Complex64 as c64;

use super::ConvFuncError;

/// Divide every plane by the biggest centre-pixel magnitude over all planes,
/// and return that magnitude. The centre pixel stands in for the peak of each
/// plane.
///
/// A kernel that is zero at every centre is left untouched (and 0 is
/// returned); the support search will reject it.
pub fn normalise_peak(kernel: &mut Array3<c64>) -> f64 {
    let peak = kernel
        .slice(s![0, 0, ..])
        .iter()
        .map(|c| c.norm())
        .fold(0.0, f64::max);
    if peak > 0.0 && peak.is_finite() {
        let scale = 1.0 / peak;
        kernel.par_mapv_inplace(|c| c * scale);
    }
    peak
}

/// Sum the real part of plane 0 at every `sampling`-th pixel out to `support`
/// in each direction from the centre. This is how the gridder samples the
/// kernel. Pixels beyond the stored kernel count as 0.
pub fn sampled_area(kernel: ArrayView3<c64>, support: usize, sampling: usize) -> f64 {
    let plane = kernel.index_axis(Axis(2), 0);
    let support = support as isize;
    let mut sum = 0.0;
    for iy in -support..=support {
        for ix in -support..=support {
            let x = ix.unsigned_abs() * sampling;
            let y = iy.unsigned_abs() * sampling;
            if let Some(c) = plane.get([x, y]) {
                sum += c.re;
            }
        }
    }
    sum
}

/// Scale the whole kernel so that plane 0 has unit area when sampled the way
/// the gridder samples it (see [`sampled_area`]). The area before scaling is
/// returned.
pub fn normalise_area(
    kernel: &mut Array3<c64>,
    support: &[usize],
    sampling: usize,
) -> Result<f64, ConvFuncError> {
    let support_0 = match support.first() {
        Some(&s) => s,
        None => {
            return Err(ConvFuncError::InvalidParameters(
                "no supports were given".to_string(),
            ))
        }
    };
    let sum = sampled_area(kernel.view(), support_0, sampling);
    if sum > 0.0 {
        let scale = 1.0 / sum;
        kernel.par_mapv_inplace(|c| c * scale);
        Ok(sum)
    } else {
        Err(ConvFuncError::NonPositiveKernelIntegral { sum })
    }
}

/// Normalise a kernel to its peak, then to unit area. Returns the peak used.
pub fn normalise(
    kernel: &mut Array3<c64>,
    support: &[usize],
    sampling: usize,
) -> Result<f64, ConvFuncError> {
    let peak = normalise_peak(kernel);
    normalise_area(kernel, support, sampling)?;
    Ok(peak)
}
