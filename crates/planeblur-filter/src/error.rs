use std::collections::TryReserveError;

use planeblur_image::ImageError;

use crate::parallel::ParallelError;

/// An error type for the filter module.
#[derive(thiserror::Error, Debug)]
pub enum BlurError {
    /// The standard deviation is not a finite positive number.
    #[error("sigma must be finite and > 0, got {0}")]
    InvalidSigma(f64),

    /// The kernel is empty or has an even number of taps.
    #[error("kernel length must be odd, got {0}")]
    InvalidKernelLength(usize),

    /// The image size is not a multiple of the sampling resolution.
    #[error("image size ({0}x{1}) is not divisible by the resolution {2}")]
    InvalidResolution(usize, usize, usize),

    /// The input row is empty or the output row has the wrong length.
    #[error("invalid row lengths: input {0}, output {1}")]
    InvalidRowLength(usize, usize),

    /// The recursive filter weights could not be derived for this sigma.
    #[error("recursive gaussian weights for sigma {0} are not normalized")]
    UnstableCoefficients(f64),

    /// The tap count of the kernel does not fit in memory.
    #[error("kernel radius {0} is too large")]
    KernelTooLarge(usize),

    /// The standard deviation is beyond the range the recursive filter supports.
    #[error("sigma {0} exceeds the supported maximum of {1}")]
    SigmaTooLarge(f64, f64),

    /// The kernel buffer could not be allocated.
    #[error("failed to allocate a kernel of {0} taps")]
    Allocation(usize, #[source] TryReserveError),

    /// An image operation failed.
    #[error(transparent)]
    Image(#[from] ImageError),

    /// The thread pool could not be set up.
    #[error(transparent)]
    Parallel(#[from] ParallelError),
}

impl BlurError {
    /// Whether the error reports a caller mistake rather than a runtime condition.
    ///
    /// Resource exhaustion returns `false`; such calls may succeed when retried
    /// with smaller inputs.
    pub fn is_precondition(&self) -> bool {
        match self {
            BlurError::InvalidSigma(_)
            | BlurError::InvalidKernelLength(_)
            | BlurError::InvalidResolution(..)
            | BlurError::InvalidRowLength(..)
            | BlurError::UnstableCoefficients(_)
            | BlurError::SigmaTooLarge(..) => true,
            BlurError::KernelTooLarge(_) | BlurError::Allocation(..) => false,
            BlurError::Image(err) => !matches!(err, ImageError::Allocation(_)),
            BlurError::Parallel(err) => matches!(err, ParallelError::InvalidThreadCount(_)),
        }
    }
}
