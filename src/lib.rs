// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

/*!
W-projection convolution functions for wide-field interferometric gridding.

A [`WProjectConvFunc`] makes (and caches) a cube of convolution functions,
one per W plane, for each image geometry it is given. Each convolution
function is the Fourier transform of a spheroidally-tapered W-term phase
screen, normalised to unit area and cropped to its support.
 */

pub mod cache;
pub mod config;
pub mod constants;
pub mod convfunc;
pub mod record;
pub mod store;
pub(crate) mod types;
pub mod wproject;
pub mod wstats;

pub use cache::KernelCache;
pub use config::{ConfigError, WProjectionConfig};
pub use convfunc::{
    synthesise, CancelFlag, ConvFuncError, ConvFuncWarning, Synthesis, SynthesisParams,
};
pub use record::{Record, RecordField};
pub use store::{ConvFunctionStore, StoreError, StoreState};
pub use types::{CacheKey, ImageGeometry};
pub use wproject::{ConvFuncLookup, WProjectConvFunc};
pub use wstats::WStats;

// Re-exports.
pub use marlu::UVW;
pub use num_complex::Complex64 as c64;
