// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Image-plane phase screens for the W term.

use std::f64::consts::TAU;

use ndarray::prelude::*;
use num_complex::Complex64 as c64;

use super::taper::Taper;

/// Everything needed to make the phase screen of any W plane.
#[derive(Debug, Clone, Copy)]
pub struct WTermScreen {
    /// The side length of the screen \[pixels\].
    pub inner: usize,
    /// The direction-cosine increment per screen pixel on each axis.
    pub sampling_increment: (f64, f64),
    /// The total number of W planes.
    pub w_planes: usize,
    /// Plane `i` corresponds to `w = i^2 / w_scale` wavelengths.
    pub w_scale: f64,
}

impl WTermScreen {
    /// Build the tapered phase screen for W plane `plane`. The screen centre
    /// is at pixel `(inner/2, inner/2)`.
    ///
    /// Inside the unit disk (`l^2 + m^2 < 1`) the screen is
    /// `exp(2πi * w * (sqrt(1 - l^2 - m^2) - 1))` and it is zero outside.
    /// With only one W plane there is no W term, and the screen is just the
    /// taper.
    pub fn build<T: Taper + ?Sized>(&self, plane: usize, taper: &T) -> Array2<c64> {
        let inner = self.inner;
        let half = (inner / 2) as isize;
        let (dl, dm) = self.sampling_increment;
        let mut screen = Array2::<c64>::zeros((inner, inner));

        if self.w_planes > 1 {
            let two_pi_w = TAU * (plane * plane) as f64 / self.w_scale;
            for ((i, j), s) in screen.indexed_iter_mut() {
                let ix = i as isize - half;
                let iy = j as isize - half;
                let l = dl * ix as f64;
                let m = dm * iy as f64;
                let rsq = l * l + m * m;
                if rsq < 1.0 {
                    let phase = two_pi_w * ((1.0 - rsq).sqrt() - 1.0);
                    *s = c64::cis(phase) * taper.value(ix, iy);
                }
            }
        } else {
            for ((i, j), s) in screen.indexed_iter_mut() {
                let ix = i as isize - half;
                let iy = j as isize - half;
                *s = c64::new(taper.value(ix, iy), 0.0);
            }
        }

        screen
    }
}
