// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

/*!
Useful constants.
 */

/// The default oversampling factor of a convolution function.
pub const DEFAULT_OVERSAMPLING: usize = 4;

/// Kernel magnitudes (relative to the peak) below this are treated as zero
/// when searching for the support.
pub const DEFAULT_SUPPORT_THRESHOLD: f64 = 1e-3;

/// The default padding factor applied to image sizes before gridding.
pub const DEFAULT_PADDING: f64 = 1.2;

/// The default memory budget for kernel cubes \[MB\].
pub const DEFAULT_MEMORY_BUDGET_MB: usize = 4096;

/// If more than this many planes have their support clipped, the caller is
/// warned.
pub(crate) const MAX_CLIPPED_PLANES: usize = 5;

/// More W planes than this are considered "many"; the kernel size is then
/// restricted further according to the memory budget.
pub(crate) const MANY_W_PLANES: usize = 256;

/// With many W planes, a memory budget above this \[MB\] allows the larger
/// kernel size.
pub(crate) const BIG_MEMORY_MB: usize = 4000;

/// The biggest kernel side length used with W projection.
pub(crate) const MAX_KERNEL_SIZE: usize = 1024;

/// The kernel side length used with many W planes and little memory.
pub(crate) const SMALL_KERNEL_SIZE: usize = 512;

/// The most W planes that will be chosen automatically.
pub(crate) const MAX_AUTO_W_PLANES: usize = 1024;

/// The number of significant digits used to format image increments into a
/// cache key.
pub(crate) const KEY_SIGNIFICANT_DIGITS: usize = 6;
