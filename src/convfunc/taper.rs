// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Anti-aliasing tapers applied to phase screens before they are Fourier
//! transformed.

/// Rational-approximation coefficients of the prolate spheroidal wave function
/// (support 6, alpha 1), for 0 <= nu < 0.75 (index 0) and 0.75 <= nu <= 1
/// (index 1).
const P: [[f64; 5]; 2] = [
    [8.203343e-2, -3.644705e-1, 6.278660e-1, -5.335581e-1, 2.312756e-1],
    [4.028559e-3, -3.697768e-2, 1.021332e-1, -1.201436e-1, 6.412774e-2],
];
const Q: [[f64; 3]; 2] = [
    [1.0, 8.212018e-1, 2.078043e-1],
    [1.0, 9.599102e-1, 2.918724e-1],
];

/// Evaluate the prolate spheroidal function at `nu`, the distance from the
/// centre in units of half the support. Outside `[0, 1]` the function is 0.
pub fn grdsf(nu: f64) -> f64 {
    let (part, nu_end) = if (0.0..0.75).contains(&nu) {
        (0, 0.75)
    } else if (0.75..=1.0).contains(&nu) {
        (1, 1.0)
    } else {
        return 0.0;
    };

    let del_nu_sq = nu * nu - nu_end * nu_end;
    let top = P[part]
        .iter()
        .rev()
        .fold(0.0, |acc, &p| acc * del_nu_sq + p);
    let bot = Q[part]
        .iter()
        .rev()
        .fold(0.0, |acc, &q| acc * del_nu_sq + q);
    if bot == 0.0 {
        0.0
    } else {
        top / bot
    }
}

/// The 1D anti-aliasing correction table for a screen with `size` pixels on a
/// side. Element `i` is the spheroidal function evaluated at
/// `|i - size/2| / (size/2)`.
///
/// # Panics
///
/// Panics if `size` is 0; asking for an empty table is a caller bug.
pub fn spheroidal_correction(size: usize) -> Vec<f64> {
    assert!(size > 0, "a correction table needs at least one element");
    let half = (size / 2).max(1) as f64;
    (0..size)
        .map(|i| {
            let offset = i as f64 - (size / 2) as f64;
            grdsf(offset.abs() / half)
        })
        .collect()
}

/// Something that weights a phase screen pixel. `ix` and `iy` are pixel
/// offsets from the screen centre.
pub trait Taper: Sync {
    fn value(&self, ix: isize, iy: isize) -> f64;
}

impl<F: Fn(isize, isize) -> f64 + Sync> Taper for F {
    fn value(&self, ix: isize, iy: isize) -> f64 {
        self(ix, iy)
    }
}

/// The separable spheroidal taper used for W projection.
#[derive(Debug, Clone)]
pub struct SpheroidalTaper {
    correction: Vec<f64>,
}

impl SpheroidalTaper {
    /// Create a taper for a screen of `size` by `size` pixels.
    pub fn new(size: usize) -> SpheroidalTaper {
        SpheroidalTaper {
            correction: spheroidal_correction(size),
        }
    }

    /// The 1D correction table this taper looks values up in.
    pub fn correction(&self) -> &[f64] {
        &self.correction
    }

    fn lookup(&self, offset: isize) -> f64 {
        let i = offset + (self.correction.len() / 2) as isize;
        if i < 0 {
            return 0.0;
        }
        self.correction.get(i as usize).copied().unwrap_or(0.0)
    }
}

impl Taper for SpheroidalTaper {
    fn value(&self, ix: isize, iy: isize) -> f64 {
        self.lookup(ix) * self.lookup(iy)
    }
}

#[cfg(test)]
mod tests {
    use approx::*;

    use super::*;

    #[test]
    fn test_grdsf_centre_and_edges() {
        assert_abs_diff_eq!(grdsf(0.0), 1.0, epsilon = 1e-5);
        // The two rational approximations should agree where they meet.
        assert_abs_diff_eq!(grdsf(0.75 - 1e-12), grdsf(0.75), epsilon = 1e-4);
        assert_abs_diff_eq!(grdsf(1.0), 4.028559e-3, epsilon = 1e-12);
        assert_eq!(grdsf(1.0 + 1e-9), 0.0);
        assert_eq!(grdsf(-0.1), 0.0);
    }

    #[test]
    fn test_grdsf_decreases() {
        let mut last = grdsf(0.0);
        for i in 1..=100 {
            let this = grdsf(i as f64 / 100.0);
            assert!(this < last, "grdsf is not decreasing at nu = {}", i as f64 / 100.0);
            last = this;
        }
    }

    #[test]
    fn test_correction_table() {
        let c = spheroidal_correction(64);
        assert_eq!(c.len(), 64);
        // The peak is at the centre.
        assert_abs_diff_eq!(c[32], grdsf(0.0));
        // Symmetric about the centre.
        for i in 1..32 {
            assert_abs_diff_eq!(c[32 - i], c[32 + i]);
        }
        // The first element is at the edge of the support.
        assert_abs_diff_eq!(c[0], grdsf(1.0));
    }

    #[test]
    #[should_panic]
    fn test_correction_table_empty() {
        spheroidal_correction(0);
    }

    #[test]
    fn test_spheroidal_taper_is_separable() {
        let t = SpheroidalTaper::new(32);
        let c = t.correction();
        assert_abs_diff_eq!(t.value(3, -5), c[16 + 3] * c[16 - 5]);
        assert_abs_diff_eq!(t.value(0, 0), c[16] * c[16]);
        // Off the end of the table.
        assert_eq!(t.value(16, 0), 0.0);
        assert_eq!(t.value(0, -17), 0.0);
    }

    #[test]
    fn test_closure_taper() {
        let disk = |ix: isize, iy: isize| if ix * ix + iy * iy < 4 { 1.0 } else { 0.0 };
        assert_eq!(disk.value(1, 1), 1.0);
        assert_eq!(disk.value(2, 0), 0.0);
    }
}
