// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! 2D FFTs of phase screens.

use std::sync::Arc;

use ndarray::prelude::*;
use num_complex::Complex64 as c64;
use rustfft::{Fft, FftPlanner};

/// A forward 2D complex FFT over a `size` by `size` grid. The plan is shared,
/// so one [`KernelFft`] can be used from many threads at once.
pub struct KernelFft {
    size: usize,
    fft: Arc<dyn Fft<f64>>,
}

impl std::fmt::Debug for KernelFft {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KernelFft").field("size", &self.size).finish()
    }
}

impl KernelFft {
    /// Plan a forward FFT for a `size` by `size` grid. The same 1D plan is
    /// used for both rows and columns.
    pub fn new(size: usize) -> KernelFft {
        let mut planner = FftPlanner::new();
        KernelFft {
            size,
            fft: planner.plan_fft_forward(size),
        }
    }

    /// The side length of the FFT grid \[pixels\].
    pub fn size(&self) -> usize {
        self.size
    }

    /// Zero-pad `screen` into the FFT grid and transform it.
    ///
    /// The screen centre `(n/2, n/2)` is placed at grid element `(0, 0)`
    /// (and the rest of the screen wraps around), so that element `(u, v)`
    /// of the output, for `u, v < size/2`, is the transform at offset
    /// `(u, v)` from the kernel centre. No FFT shifts are needed.
    ///
    /// # Panics
    ///
    /// Panics if the screen is bigger than the FFT grid.
    pub fn transform(&self, screen: ArrayView2<c64>) -> Array2<c64> {
        let size = self.size;
        let (n0, n1) = screen.dim();
        assert!(
            n0 <= size && n1 <= size,
            "a {n0}x{n1} screen can't be embedded in a {size}x{size} grid"
        );

        let mut grid = Array2::<c64>::zeros((size, size));
        let wrap = |i: usize, n: usize| {
            (i as isize - (n / 2) as isize).rem_euclid(size as isize) as usize
        };
        for ((i, j), &v) in screen.indexed_iter() {
            grid[[wrap(i, n0), wrap(j, n1)]] = v;
        }

        let mut scratch = vec![c64::default(); self.fft.get_inplace_scratch_len()];
        // Transform along the contiguous axis (each row) ...
        self.fft.process_with_scratch(
            grid.as_slice_mut()
                .expect("a freshly-allocated array is contiguous"),
            &mut scratch,
        );
        // ... then transpose to transform the other axis the same way.
        let mut grid = grid.reversed_axes().as_standard_layout().into_owned();
        self.fft.process_with_scratch(
            grid.as_slice_mut()
                .expect("a standard-layout array is contiguous"),
            &mut scratch,
        );
        grid.reversed_axes()
    }
}
