//! Gaussian smoothing of `f32` image planes.
//!
//! Two paths are provided: an exact convolution with mirrored borders, fused
//! with integer subsampling ([`filter::convolve`]), and a recursive
//! approximation whose cost per pixel does not depend on sigma
//! ([`filter::fast`]).

#[doc(inline)]
pub use planeblur_image as image;

#[doc(inline)]
pub use planeblur_filter as filter;
