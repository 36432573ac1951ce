// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Errors and warnings associated with convolution-function synthesis.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConvFuncError {
    #[error("Convolution function is misbehaved - support seems to be zero (W plane {plane})")]
    DegenerateKernel { plane: usize },

    #[error("Convolution function integral is not positive (got {sum})")]
    NonPositiveKernelIntegral { sum: f64 },

    #[error("Convolution-function synthesis was cancelled")]
    Cancelled,

    #[error("Invalid convolution-function parameters: {0}")]
    InvalidParameters(String),
}

/// Problems that don't stop a convolution function from being made, but that
/// the caller should know about.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConvFuncWarning {
    #[error("{clipped} of the convolution functions go beyond the {max_size} pixels allocated; you may consider reducing the size of your image or using facets")]
    KernelOversize { clipped: usize, max_size: usize },

    #[error("The convolution functions use {used_mb} MB, more than the budget of {budget_mb} MB")]
    MemoryBudgetExceeded { used_mb: usize, budget_mb: usize },
}
