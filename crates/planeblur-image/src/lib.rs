#![deny(missing_docs)]
//! Aligned, row-padded `f32` image planes

/// memory allocation for image planes.
pub mod allocator;

/// Error types for the image module.
pub mod error;

/// image plane representation.
pub mod image;

pub use crate::error::ImageError;
pub use crate::image::{ImageF, ImageSize};
