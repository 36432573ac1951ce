// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Finding the support of convolution functions.

use ndarray::prelude::*;
use num_complex::Complex64 as c64;
use rayon::prelude::*;

use super::ConvFuncError;

/// The supports of all W planes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SupportSearch {
    /// One support per W plane \[un-oversampled pixels\].
    pub support: Vec<usize>,
    /// The number of planes whose support had to be clipped to fit in the
    /// allocated kernel.
    pub clipped: usize,
}

/// Finds supports of kernels stored as a quadrant: element `[0, 0]` of a plane
/// is the kernel centre, and element `[i, j]` is `(i, j)` oversampled pixels
/// from the centre.
#[derive(Debug, Clone, Copy)]
pub struct SupportFinder {
    /// Magnitudes at or below this are treated as zero.
    pub threshold: f64,
    /// The oversampling factor of the kernel.
    pub sampling: usize,
    /// The side length of the (uncropped) kernel \[oversampled pixels\].
    pub max_size: usize,
}

impl SupportFinder {
    /// Step in from the edge of the kernel along both axes, and return the
    /// support implied by the first pixel whose magnitude is above the
    /// threshold. Only the two axes are probed, not a full radial sweep.
    ///
    /// `plane` is only used to label an error.
    pub fn find(&self, plane: usize, kernel: ArrayView2<c64>) -> Result<usize, ConvFuncError> {
        let (n0, n1) = kernel.dim();
        let start = (self.max_size / 2).saturating_sub(2);
        for trial in (1..=start).rev() {
            let on_x = trial < n0 && kernel[[trial, 0]].norm() > self.threshold;
            let on_y = trial < n1 && kernel[[0, trial]].norm() > self.threshold;
            if on_x || on_y {
                let s = self.sampling as f64;
                return Ok((0.5 + trial as f64 / s) as usize + 1);
            }
        }
        Err(ConvFuncError::DegenerateKernel { plane })
    }

    /// The biggest support that fits in the allocated kernel.
    pub fn max_support(&self) -> usize {
        (self.max_size / 2 / self.sampling).saturating_sub(1)
    }

    /// Find the supports of all planes of `kernel` (indexed `[x, y, plane]`).
    /// The planes are probed in parallel; supports that don't fit in the
    /// allocated kernel are clipped to [`SupportFinder::max_support`] and
    /// counted.
    ///
    /// The first plane (in order) without a support is reported as an error.
    pub fn find_all(&self, kernel: ArrayView3<c64>) -> Result<SupportSearch, ConvFuncError> {
        let found: Vec<Result<usize, ConvFuncError>> = kernel
            .axis_iter(Axis(2))
            .into_par_iter()
            .enumerate()
            .map(|(plane, k)| self.find(plane, k))
            .collect();

        let mut support = Vec::with_capacity(found.len());
        let mut clipped = 0;
        for s in found {
            let mut s = s?;
            if s * self.sampling * 2 >= self.max_size {
                s = self.max_support();
                clipped += 1;
            }
            support.push(s);
        }
        Ok(SupportSearch { support, clipped })
    }
}
