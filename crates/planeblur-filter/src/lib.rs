#![deny(missing_docs)]
#![doc = env!("CARGO_PKG_DESCRIPTION")]

/// mirrored border extension of image rows.
pub mod border;

/// exact gaussian convolution fused with subsampling.
pub mod convolve;

/// Error types for the filter module.
pub mod error;

/// recursive gaussian blur with runtime independent of sigma.
pub mod fast;

/// Filter kernels
pub mod kernels;

/// module containing parallelization utilities.
pub mod parallel;

/// Pyramid operations
pub mod pyramid;

/// coefficients of the recursive gaussian.
pub mod recursive;

pub use crate::error::BlurError;
