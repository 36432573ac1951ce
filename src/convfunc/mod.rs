// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Synthesis of W-projection convolution functions.
//!
//! For each W plane, a tapered phase screen is made on the image plane and
//! Fourier transformed. The kernels of all planes are then normalised
//! together, their supports are found and the cube is cropped to the biggest
//! support.

mod error;
mod fft;
mod normalise;
mod screen;
mod support;
mod taper;

pub use error::{ConvFuncError, ConvFuncWarning};
pub use fft::KernelFft;
pub use normalise::{normalise, normalise_area, normalise_peak, sampled_area};
pub use screen::WTermScreen;
pub use support::{SupportFinder, SupportSearch};
pub use taper::{grdsf, spheroidal_correction, SpheroidalTaper, Taper};

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use log::{debug, info, trace, warn};
use ndarray::prelude::*;
use num_complex::Complex64 as c64;
use rayon::prelude::*;

use crate::{
    config::WProjectionConfig,
    constants::*,
    store::ConvFunctionStore,
    types::ImageGeometry,
};

/// Everything that determines the convolution functions of one grid.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SynthesisParams {
    /// The side length of the FFT grid and of the uncropped kernel
    /// \[oversampled pixels\]. Must be even.
    pub conv_size: usize,
    /// The oversampling factor.
    pub sampling: usize,
    /// The number of W planes.
    pub w_planes: usize,
    /// Plane `i` holds the kernel for `w = i^2 / w_scale` wavelengths.
    pub w_scale: f64,
    /// The direction-cosine increment per phase-screen pixel on each axis.
    pub sampling_increment: (f64, f64),
    /// The support-search threshold, relative to the kernel peak.
    pub threshold: f64,
    /// Kernel cubes bigger than this \[MB\] cause a warning.
    pub memory_budget_mb: usize,
}

impl SynthesisParams {
    /// Work out the synthesis parameters for a (padded) grid.
    pub fn for_grid(
        grid: &ImageGeometry,
        w_planes: usize,
        w_scale: f64,
        config: &WProjectionConfig,
    ) -> Result<SynthesisParams, ConvFuncError> {
        let min_side = grid.min_side();
        let mut conv_size = min_side;
        if w_planes > 1 {
            let cap = if w_planes > MANY_W_PLANES && config.memory_budget_mb <= BIG_MEMORY_MB {
                SMALL_KERNEL_SIZE
            } else {
                MAX_KERNEL_SIZE
            };
            conv_size = conv_size.min(cap);
        }
        if conv_size == 0 {
            return Err(ConvFuncError::InvalidParameters(format!(
                "the grid ({}x{}) has no pixels",
                grid.nx, grid.ny
            )));
        }

        let sampling = config.oversampling;
        let scale = sampling as f64 * min_side as f64 / conv_size as f64;
        let params = SynthesisParams {
            conv_size,
            sampling,
            w_planes,
            w_scale,
            sampling_increment: (grid.incr_x.abs() * scale, grid.incr_y.abs() * scale),
            threshold: config.threshold,
            memory_budget_mb: config.memory_budget_mb,
        };
        params.validate()?;
        Ok(params)
    }

    /// The side length of the phase screens.
    pub fn inner(&self) -> usize {
        self.conv_size / self.sampling.max(1)
    }

    /// Check that these parameters can make a kernel. Called by
    /// [`synthesise`] before any work is done.
    pub fn validate(&self) -> Result<(), ConvFuncError> {
        let invalid = |s: String| Err(ConvFuncError::InvalidParameters(s));
        if self.sampling == 0 {
            return invalid("the oversampling is 0".to_string());
        }
        if self.conv_size % 2 != 0 || self.conv_size < 8 {
            return invalid(format!(
                "the kernel size ({}) must be even and at least 8",
                self.conv_size
            ));
        }
        if self.inner() < 2 {
            return invalid(format!(
                "a kernel size of {} is too small for an oversampling of {}",
                self.conv_size, self.sampling
            ));
        }
        if self.w_planes == 0 {
            return invalid("there are no W planes".to_string());
        }
        if self.w_planes > 1 && !(self.w_scale.is_finite() && self.w_scale > 0.0) {
            return invalid(format!("{} is not a usable W scale", self.w_scale));
        }
        let (dl, dm) = self.sampling_increment;
        if !(dl.is_finite() && dl > 0.0 && dm.is_finite() && dm > 0.0) {
            return invalid(format!("({dl}, {dm}) are not usable pixel increments"));
        }
        if !(self.threshold > 0.0 && self.threshold < 1.0) {
            return invalid(format!("the threshold ({}) must be in (0, 1)", self.threshold));
        }
        Ok(())
    }
}

/// A flag that can be raised from any thread to stop a synthesis early.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    /// A flag that hasn't been raised.
    pub fn new() -> CancelFlag {
        CancelFlag::default()
    }

    /// Raise the flag. Syntheses using it stop before their next W plane.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    /// Has [`CancelFlag::cancel`] been called on this flag (or a clone of it)?
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// The result of a successful synthesis.
#[derive(Debug, Clone)]
pub struct Synthesis {
    pub store: ConvFunctionStore,
    /// Problems that didn't stop synthesis.
    pub warnings: Vec<ConvFuncWarning>,
}

/// Make the convolution functions of all W planes.
///
/// The screens of all planes are made and transformed in parallel; the
/// normalisation and support search only start once every plane is done.
/// Nothing is returned on failure; a half-made kernel is never exposed.
pub fn synthesise<T: Taper + ?Sized>(
    params: &SynthesisParams,
    taper: &T,
    cancel: Option<&CancelFlag>,
) -> Result<Synthesis, ConvFuncError> {
    params.validate()?;
    let conv_size = params.conv_size;
    let sampling = params.sampling;
    let side = conv_size / 2 - 1;
    debug!(
        "Synthesising {} W planes with a kernel size of {conv_size} and oversampling of {sampling}",
        params.w_planes
    );

    let screen = WTermScreen {
        inner: params.inner(),
        sampling_increment: params.sampling_increment,
        w_planes: params.w_planes,
        w_scale: params.w_scale,
    };
    let fft = KernelFft::new(conv_size);
    let is_cancelled = || cancel.map(|c| c.is_cancelled()).unwrap_or(false);

    let mut kernel = Array3::<c64>::zeros((side, side, params.w_planes));
    kernel
        .axis_iter_mut(Axis(2))
        .into_par_iter()
        .enumerate()
        .try_for_each(|(plane, mut out)| {
            if is_cancelled() {
                return Err(ConvFuncError::Cancelled);
            }
            let phase_screen = screen.build(plane, taper);
            let transformed = fft.transform(phase_screen.view());
            out.assign(&transformed.slice(s![..side, ..side]));
            trace!("Transformed W plane {plane}");
            Ok(())
        })?;

    let peak = normalise_peak(&mut kernel);
    debug!("Kernel peak before normalisation: {peak}");

    let finder = SupportFinder {
        threshold: params.threshold,
        sampling,
        max_size: conv_size,
    };
    let SupportSearch { support, clipped } = finder.find_all(kernel.view())?;
    let mut warnings = vec![];
    if clipped > MAX_CLIPPED_PLANES {
        let w = ConvFuncWarning::KernelOversize {
            clipped,
            max_size: conv_size,
        };
        warn!("{w}");
        warnings.push(w);
    }

    normalise_area(&mut kernel, &support, sampling)?;
    info!("Convolution support = {support:?} pixels in Fourier plane");

    // Crop to the biggest support.
    let max_support = support.iter().copied().max().unwrap_or(1);
    let new_size = 2 * (max_support + 2) * sampling;
    let (kernel, size) = if new_size < conv_size {
        let new_side = new_size / 2 - 1;
        debug!("Cropping kernels from {conv_size} to {new_size} pixels");
        (
            kernel.slice(s![..new_side, ..new_side, ..]).to_owned(),
            new_size,
        )
    } else {
        (kernel, conv_size)
    };

    let store = ConvFunctionStore::new(kernel, support, sampling, size, params.w_scale);
    let used_mb = store.memory_bytes() / 1024 / 1024;
    info!(
        "Memory used in gridding function = {used_mb} MB from maximum {} MB",
        params.memory_budget_mb
    );
    if used_mb > params.memory_budget_mb {
        let w = ConvFuncWarning::MemoryBudgetExceeded {
            used_mb,
            budget_mb: params.memory_budget_mb,
        };
        warn!("{w}");
        warnings.push(w);
    }

    if is_cancelled() {
        return Err(ConvFuncError::Cancelled);
    }
    Ok(Synthesis { store, warnings })
}
