// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Generic types.

use serde::{Deserialize, Serialize};

use crate::constants::KEY_SIGNIFICANT_DIGITS;

/// The geometry of the image (or padded grid) that a convolution function is
/// made for. Pixel increments are in radians per pixel; only their magnitudes
/// matter here.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ImageGeometry {
    pub nx: usize,
    pub ny: usize,
    pub incr_x: f64,
    pub incr_y: f64,
}

impl ImageGeometry {
    /// An image with `nx` by `ny` pixels, with pixel increments `incr_x` and
    /// `incr_y` \[radians\]. Increments may be negative (e.g. RA decreasing
    /// with pixel number); only their sizes matter here.
    pub fn new(nx: usize, ny: usize, incr_x: f64, incr_y: f64) -> ImageGeometry {
        ImageGeometry {
            nx,
            ny,
            incr_x,
            incr_y,
        }
    }

    /// Get the geometry of the grid used for this image when it is padded by
    /// `padding`. The pixel increments are unchanged; the pixel counts are
    /// grown to the next even number with no prime factors other than 2, 3
    /// and 5.
    pub fn padded(&self, padding: f64) -> ImageGeometry {
        let grow = |n: usize| {
            let wanted = (padding * n as f64 - 0.5).max(2.0) as usize;
            next_larger_even_composite(wanted)
        };
        ImageGeometry {
            nx: grow(self.nx),
            ny: grow(self.ny),
            incr_x: self.incr_x,
            incr_y: self.incr_y,
        }
    }

    /// The smaller of the two pixel counts.
    pub fn min_side(&self) -> usize {
        self.nx.min(self.ny)
    }

    /// Half of the larger field of view, in direction cosines. Never more
    /// than 1.
    pub(crate) fn half_fov(&self) -> f64 {
        let fov_x = self.nx as f64 * self.incr_x.abs();
        let fov_y = self.ny as f64 * self.incr_y.abs();
        (0.5 * fov_x.max(fov_y)).min(1.0)
    }

    /// Get the [`CacheKey`] for this geometry.
    pub fn cache_key(&self) -> CacheKey {
        CacheKey::new(self.nx, self.ny, self.incr_x, self.incr_y)
    }
}

/// A key used to access the convolution-function cache.
///
/// It is the geometry formatted with a fixed number of significant digits, so
/// images with increments that differ only by floating-point noise share a
/// key (and hence a convolution function).
#[derive(Hash, Debug, Clone, Eq, PartialEq, PartialOrd, Ord)]
pub struct CacheKey(String);

impl CacheKey {
    /// Create a new [`CacheKey`] from pixel counts and increments. Signs of the
    /// increments are ignored.
    pub fn new(nx: usize, ny: usize, incr_x: f64, incr_y: f64) -> Self {
        let prec = KEY_SIGNIFICANT_DIGITS - 1;
        Self(format!(
            "{nx}_{:.prec$e}_{ny}_{:.prec$e}",
            incr_x.abs(),
            incr_y.abs()
        ))
    }

    /// Re-create a key from its string form (e.g. from a saved record).
    pub(crate) fn from_string(s: String) -> Self {
        Self(s)
    }

    /// The formatted key, as stored in records.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Is `n` made only of the prime factors 2, 3 and 5?
fn is_235_composite(mut n: usize) -> bool {
    if n == 0 {
        return false;
    }
    for p in [2, 3, 5] {
        while n % p == 0 {
            n /= p;
        }
    }
    n == 1
}

/// The smallest even number >= `n` with no prime factors other than 2, 3 and
/// 5. These sizes are cheap to FFT.
pub(crate) fn next_larger_even_composite(n: usize) -> usize {
    let mut m = n.max(2);
    if m % 2 != 0 {
        m += 1;
    }
    while !is_235_composite(m) {
        m += 2;
    }
    m
}

#[cfg(test)]
mod tests {
    use super::*;

    fn geometry_1() -> ImageGeometry {
        ImageGeometry::new(100, 100, 1e-5, 1e-5)
    }

    fn geometry_2() -> ImageGeometry {
        ImageGeometry::new(100, 100, -1e-5, 1e-5)
    }

    fn geometry_3() -> ImageGeometry {
        ImageGeometry::new(100, 102, 1e-5, 1e-5)
    }

    fn geometry_4() -> ImageGeometry {
        ImageGeometry::new(100, 100, 1.00001e-5, 1e-5)
    }

    #[test]
    fn same() {
        assert_eq!(geometry_1().cache_key(), geometry_1().cache_key());
    }

    #[test]
    fn sign_is_ignored() {
        assert_eq!(geometry_1().cache_key(), geometry_2().cache_key());
    }

    #[test]
    fn different_size() {
        assert_ne!(geometry_1().cache_key(), geometry_3().cache_key());
    }

    #[test]
    fn different_increment() {
        // A change in the 6th significant digit is a different geometry.
        assert_ne!(geometry_1().cache_key(), geometry_4().cache_key());
    }

    #[test]
    fn floating_noise_is_absorbed() {
        let mut g = geometry_1();
        g.incr_x = 1e-5 * (1.0 + 1e-12);
        assert_eq!(geometry_1().cache_key(), g.cache_key());
    }

    #[test]
    fn key_format() {
        assert_eq!(geometry_1().cache_key().as_str(), "100_1.00000e-5_100_1.00000e-5");
    }

    #[test]
    fn test_next_larger_even_composite() {
        assert_eq!(next_larger_even_composite(0), 2);
        assert_eq!(next_larger_even_composite(7), 8);
        assert_eq!(next_larger_even_composite(100), 100);
        assert_eq!(next_larger_even_composite(101), 108);
        // 14 = 2 * 7 and 16 = 2^4.
        assert_eq!(next_larger_even_composite(13), 16);
        assert_eq!(next_larger_even_composite(119), 120);
    }

    #[test]
    fn test_padded() {
        let g = ImageGeometry::new(100, 50, 1e-5, 2e-5).padded(1.2);
        // 1.2 * 100 - 0.5 = 119.5 -> 119 -> 120.
        assert_eq!(g.nx, 120);
        // 1.2 * 50 - 0.5 = 59.5 -> 59 -> 60.
        assert_eq!(g.ny, 60);
        assert_eq!(g.incr_x, 1e-5);
        assert_eq!(g.incr_y, 2e-5);

        let g = ImageGeometry::new(256, 256, 1e-5, 1e-5).padded(1.0);
        assert_eq!(g.nx, 256);
    }
}
