// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! The product of convolution-function synthesis: a cube of W-projection
//! kernels, their supports, and everything a gridder needs to index them.

mod error;
#[cfg(test)]
mod tests;

pub use error::StoreError;

use ndarray::prelude::*;
use num_complex::Complex64 as c64;

use crate::record::{Record, RecordField};

/// Where a [`ConvFunctionStore`] is in its life.
///
/// A store only exists before synthesis (`Uninitialized`, e.g.
/// [`ConvFunctionStore::default`]) or after it (`Ready`). There are no
/// "synthesizing" or "failed" values: synthesis runs inside
/// [`crate::synthesise`], which hands back a `Ready` store on success. On
/// failure it returns an [`crate::ConvFuncError`] and no store at all, so
/// nothing half-built can be cached. A `Ready` store is never changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreState {
    /// No kernels, or parts that don't agree with each other.
    Uninitialized,
    /// A complete, consistent set of kernels.
    Ready,
}

/// W-projection convolution functions for one image geometry.
///
/// The kernels are stored as quadrants: `kernel[[x, y, plane]]` is the kernel
/// of W plane `plane` at `(x, y)` oversampled pixels from its centre. Only
/// one quadrant is needed because the gridder uses `|x|` and `|y|`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConvFunctionStore {
    kernel: Array3<c64>,
    /// One support per W plane \[un-oversampled pixels\].
    support: Vec<usize>,
    /// The oversampling factor.
    sampling: usize,
    /// The (possibly cropped) kernel side length \[oversampled pixels\].
    /// Always even; the stored quadrant is `size/2 - 1` on each side.
    size: usize,
    /// Plane `i` holds the kernel for `w = i^2 / w_scale` wavelengths.
    w_scale: f64,
}

impl ConvFunctionStore {
    /// Assemble a store. The caller is responsible for the parts being
    /// consistent (see [`ConvFunctionStore::state`]).
    pub(crate) fn new(
        kernel: Array3<c64>,
        support: Vec<usize>,
        sampling: usize,
        size: usize,
        w_scale: f64,
    ) -> ConvFunctionStore {
        ConvFunctionStore {
            kernel,
            support,
            sampling,
            size,
            w_scale,
        }
    }

    /// [`StoreState::Ready`] if every part of this store is present and
    /// consistent, otherwise [`StoreState::Uninitialized`].
    pub fn state(&self) -> StoreState {
        if self.check().is_ok() {
            StoreState::Ready
        } else {
            StoreState::Uninitialized
        }
    }

    /// The kernel cube, indexed `[x, y, plane]`.
    pub fn kernel(&self) -> ArrayView3<c64> {
        self.kernel.view()
    }

    /// The kernel quadrant of one W plane.
    ///
    /// # Panics
    ///
    /// Panics if `plane` is out of range.
    pub fn plane(&self, plane: usize) -> ArrayView2<c64> {
        self.kernel.index_axis(Axis(2), plane)
    }

    /// The support of each W plane \[un-oversampled pixels\]. The gridder
    /// uses `2 * support + 1` grid pixels on a side.
    pub fn support(&self) -> &[usize] {
        &self.support
    }

    /// The oversampling factor of the kernels.
    pub fn sampling(&self) -> usize {
        self.sampling
    }

    /// The side length of the full (not quadrant) kernel \[oversampled pixels\].
    pub fn size(&self) -> usize {
        self.size
    }

    /// Plane `i` holds the kernel for `w = i^2 / w_scale` wavelengths. 0 when
    /// there is only one plane.
    pub fn w_scale(&self) -> f64 {
        self.w_scale
    }

    /// The number of W planes.
    pub fn w_planes(&self) -> usize {
        self.kernel.len_of(Axis(2))
    }

    /// The W plane that a visibility with this `w` (wavelengths) should be
    /// gridded with. The sign of `w` is ignored, and the result is clamped to
    /// the available planes.
    ///
    /// # Examples
    ///
    /// ```
    /// use wproj_convfunc::{ImageGeometry, WProjectConvFunc, WProjectionConfig};
    ///
    /// let engine = WProjectConvFunc::new(WProjectionConfig {
    ///     w_planes: 4,
    ///     ..Default::default()
    /// })
    /// .unwrap();
    /// let image = ImageGeometry::new(64, 64, 1e-3, 1e-3);
    /// let store = engine.find_conv_function(&image, None).unwrap().store;
    ///
    /// // Plane 2 is centred on w = 4 / w_scale.
    /// let w = 4.0 / store.w_scale();
    /// assert_eq!(store.plane_for_w(w), 2);
    /// assert_eq!(store.plane_for_w(-w), 2);
    /// // Big W values get the last plane.
    /// assert_eq!(store.plane_for_w(1e12), 3);
    /// ```
    pub fn plane_for_w(&self, w: f64) -> usize {
        let n = self.w_planes();
        if n <= 1 || self.w_scale <= 0.0 {
            return 0;
        }
        // NaN becomes 0.
        let plane = (w.abs() * self.w_scale).sqrt().round() as usize;
        plane.min(n - 1)
    }

    /// The support to use for a visibility with this `w` (wavelengths).
    pub fn support_for_w(&self, w: f64) -> Option<usize> {
        self.support.get(self.plane_for_w(w)).copied()
    }

    /// The size of the kernel cube \[bytes\].
    pub fn memory_bytes(&self) -> usize {
        self.kernel.len() * std::mem::size_of::<c64>()
    }

    /// Check that all of the parts of this store agree with each other. On
    /// failure, the name of the offending record field and the reason are
    /// returned.
    fn check(&self) -> Result<(), (&'static str, String)> {
        let (n0, n1, n_planes) = self.kernel.dim();
        if self.kernel.is_empty() {
            return Err(("convfunc", "the kernel is empty".to_string()));
        }
        if self.sampling == 0 {
            return Err(("convsampling", "the oversampling is 0".to_string()));
        }
        if self.size < 4 || self.size % 2 != 0 {
            return Err((
                "convsize",
                format!("{} is not an even size of at least 4", self.size),
            ));
        }
        let side = self.size / 2 - 1;
        if n0 != side || n1 != side {
            return Err((
                "convfunc",
                format!(
                    "the kernel is {n0}x{n1}, but a size of {} needs {side}x{side}",
                    self.size
                ),
            ));
        }
        if self.support.len() != n_planes {
            return Err((
                "convsupport",
                format!(
                    "there are {} supports for {n_planes} W planes",
                    self.support.len()
                ),
            ));
        }
        if let Some(plane) = self.support.iter().position(|&s| s == 0) {
            return Err(("convsupport", format!("W plane {plane} has no support")));
        }
        if !self.w_scale.is_finite() || self.w_scale < 0.0 {
            return Err(("wscaler", format!("{} is not a valid W scale", self.w_scale)));
        }
        if self.kernel.iter().any(|c| !c.is_finite()) {
            return Err(("convfunc", "the kernel has non-finite values".to_string()));
        }
        Ok(())
    }

    /// Describe this store as a [`Record`]. Fails if the store isn't
    /// [`StoreState::Ready`].
    pub fn to_record(&self) -> Result<Record, StoreError> {
        self.check()
            .map_err(|(field, reason)| StoreError::Serialization(format!("{field}: {reason}")))?;

        let mut record = Record::new();
        record.define("convfunc", RecordField::from_cube(self.kernel.view()));
        record.define(
            "convsupport",
            RecordField::IntVec(self.support.iter().map(|&s| s as i64).collect()),
        );
        record.define("convsampling", RecordField::Int(self.sampling as i64));
        record.define("convsize", RecordField::Int(self.size as i64));
        record.define("wscaler", RecordField::Float(self.w_scale));
        Ok(record)
    }

    /// Restore a store from a [`Record`] made by
    /// [`ConvFunctionStore::to_record`].
    pub fn from_record(record: &Record) -> Result<ConvFunctionStore, StoreError> {
        let store = ConvFunctionStore {
            kernel: record.get_complex_cube("convfunc")?,
            support: record.get_usize_vec("convsupport")?,
            sampling: record.get_usize("convsampling")?,
            size: record.get_usize("convsize")?,
            w_scale: record.get_float("wscaler")?,
        };
        store
            .check()
            .map_err(|(field, reason)| StoreError::Deserialization {
                field: field.to_string(),
                reason,
            })?;
        Ok(store)
    }
}
