// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Statistics of baseline W, used to choose the number of W planes and their
//! spacing.

use std::f64::consts::TAU;

use marlu::{constants::VEL_C, UVW};
use serde::{Deserialize, Serialize};

use crate::constants::MAX_AUTO_W_PLANES;

/// The minimum, maximum and RMS of baseline W over a dataset \[wavelengths\].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WStats {
    pub min: f64,
    pub max: f64,
    pub rms: f64,
}

impl WStats {
    pub fn new(min: f64, max: f64, rms: f64) -> WStats {
        WStats { min, max, rms }
    }

    /// Get statistics from W values \[wavelengths\]. Non-finite values are
    /// ignored; `None` is returned if there's nothing left.
    pub fn from_ws<I: IntoIterator<Item = f64>>(ws: I) -> Option<WStats> {
        let mut min = f64::INFINITY;
        let mut max = f64::NEG_INFINITY;
        let mut sum_sq = 0.0;
        let mut count = 0_usize;
        for w in ws.into_iter().filter(|w| w.is_finite()) {
            min = min.min(w);
            max = max.max(w);
            sum_sq += w * w;
            count += 1;
        }
        if count == 0 {
            None
        } else {
            Some(WStats {
                min,
                max,
                rms: (sum_sq / count as f64).sqrt(),
            })
        }
    }

    /// Get statistics from baselines \[metres\] observed at `freq_hz`.
    pub fn from_uvws(uvws: &[UVW], freq_hz: f64) -> Option<WStats> {
        WStats::from_ws(uvws.iter().map(|&uvw| {
            let UVW { w, .. } = uvw * freq_hz / VEL_C;
            w
        }))
    }

    /// The biggest |W| \[wavelengths\].
    pub fn max_abs(&self) -> f64 {
        self.min.abs().max(self.max.abs())
    }
}

/// The number of W planes needed to keep the W-term phase error below one
/// turn across a field with half-width `half_fov` (direction cosine).
/// Without statistics, there is only one plane.
pub fn auto_w_planes(stats: Option<&WStats>, half_fov: f64) -> usize {
    let w_max = match stats {
        Some(s) if s.max_abs() > 0.0 => s.max_abs(),
        _ => return 1,
    };
    let l_max = half_fov.abs().min(1.0);
    let turns = TAU * w_max * (1.0 - (1.0 - l_max * l_max).sqrt());
    if !turns.is_finite() {
        return MAX_AUTO_W_PLANES;
    }
    let planes = turns.ceil() as usize + 1;
    planes.clamp(1, MAX_AUTO_W_PLANES)
}

/// The biggest W to be gridded \[wavelengths\]. If the statistics don't give
/// one, it is estimated from the pixel size (`incr` in radians).
pub fn max_w(stats: Option<&WStats>, incr: f64) -> f64 {
    match stats {
        Some(s) if s.max_abs() > 0.0 => s.max_abs(),
        _ => 0.25 / incr.abs(),
    }
}

/// The W scaling for `w_planes` planes spread up to `max_w` wavelengths:
/// plane `i` corresponds to `w = i^2 / scale`.
pub fn w_scale(w_planes: usize, max_w: f64) -> f64 {
    if w_planes <= 1 || max_w <= 0.0 {
        0.0
    } else {
        let n = (w_planes - 1) as f64;
        n * n / max_w
    }
}
