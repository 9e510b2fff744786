use num_traits::{Float, NumCast};

use crate::error::BlurError;

fn cast<T: Float>(val: f64) -> T {
    <T as NumCast>::from(val).unwrap_or_else(T::nan)
}

/// Create a normalized gaussian kernel.
///
/// Tap `i` (offset `-radius..=radius` from the center) is
/// `exp(-i^2 / (2 sigma^2))` divided by the sum of all taps. The sum is
/// accumulated in `f64` so that wide kernels stored as `f32` do not drift.
///
/// # Arguments
///
/// * `radius` - Half width of the kernel, the kernel has `2 * radius + 1` taps.
/// * `sigma` - The sigma of the gaussian kernel, must be finite and positive.
///
/// # Returns
///
/// A vector of the kernel taps.
///
/// # Errors
///
/// Returns [`BlurError::InvalidSigma`] for a non-positive sigma,
/// [`BlurError::KernelTooLarge`] if the tap count overflows and
/// [`BlurError::Allocation`] if the taps cannot be allocated.
///
/// # Example
///
/// ```
/// use planeblur_filter::kernels::gaussian_kernel;
///
/// let kernel = gaussian_kernel(2, 1.0f32).unwrap();
/// assert_eq!(kernel.len(), 5);
/// assert!((kernel.iter().sum::<f32>() - 1.0).abs() < 1e-6);
/// ```
pub fn gaussian_kernel<T: Float>(radius: usize, sigma: T) -> Result<Vec<T>, BlurError> {
    if !(sigma > T::zero()) || !sigma.is_finite() {
        return Err(BlurError::InvalidSigma(sigma.to_f64().unwrap_or(f64::NAN)));
    }

    let num_taps = radius
        .checked_mul(2)
        .and_then(|v| v.checked_add(1))
        .ok_or(BlurError::KernelTooLarge(radius))?;
    let mut kernel = Vec::new();
    kernel
        .try_reserve_exact(num_taps)
        .map_err(|e| BlurError::Allocation(num_taps, e))?;

    let scaler = -T::one() / (cast::<T>(2.0) * sigma * sigma);
    let mut sum = 0.0f64;
    for i in 0..num_taps {
        let x = cast::<T>(i as f64 - radius as f64);
        let val = (scaler * x * x).exp();
        sum += val.to_f64().unwrap_or(f64::NAN);
        kernel.push(val);
    }

    // normalize the kernel
    kernel
        .iter_mut()
        .for_each(|k| *k = cast(k.to_f64().unwrap_or(f64::NAN) / sum));

    log::trace!("gaussian kernel: radius={radius} sum={sum}");

    Ok(kernel)
}
