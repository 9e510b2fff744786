use planeblur_image::{
    allocator::{CpuAllocator, ImageAllocator},
    ImageF,
};

use crate::convolve::convolve_and_sample_with_pool;
use crate::error::BlurError;
use crate::kernels::gaussian_kernel;
use crate::parallel::ThreadPool;

/// Build a gaussian pyramid by repeated blur and decimation.
///
/// Level 0 is a copy of `src`; every further level is the previous one blurred
/// with mirrored borders and sampled at every second pixel, halving both
/// dimensions.
///
/// # Arguments
///
/// * `src` - The full resolution plane.
/// * `sigma` - The blur applied before each decimation, in pixels of the finer level.
/// * `levels` - The number of levels to return, including level 0.
/// * `pool` - The thread pool running the convolutions.
///
/// # Errors
///
/// Returns [`BlurError::InvalidSigma`] for an invalid sigma and
/// [`BlurError::InvalidResolution`] when a level to be decimated has an odd
/// width or height.
///
/// # Example
///
/// ```
/// use planeblur_filter::{parallel::ThreadPool, pyramid::gaussian_pyramid};
/// use planeblur_image::{allocator::CpuAllocator, ImageF, ImageSize};
///
/// let size = ImageSize { width: 32, height: 16 };
/// let image = ImageF::from_size_val(size, 1.0, CpuAllocator).unwrap();
///
/// let pyramid = gaussian_pyramid(&image, 1.0, 3, &ThreadPool::default()).unwrap();
/// assert_eq!(pyramid.len(), 3);
/// assert_eq!(pyramid[2].size(), ImageSize { width: 8, height: 4 });
/// ```
pub fn gaussian_pyramid<A: ImageAllocator>(
    src: &ImageF<A>,
    sigma: f32,
    levels: usize,
    pool: &ThreadPool,
) -> Result<Vec<ImageF>, BlurError> {
    let radius = (3.0 * sigma).ceil().max(0.0) as usize;
    let kernel = gaussian_kernel::<f32>(radius, sigma)?;

    log::debug!(
        "gaussian_pyramid: {} levels from {} sigma={sigma}",
        levels,
        src.size()
    );

    let mut pyramid: Vec<ImageF> = Vec::with_capacity(levels);
    if levels == 0 {
        return Ok(pyramid);
    }
    pyramid.push(ImageF::new(src.size(), src.to_vec(), CpuAllocator)?);

    for _ in 1..levels {
        let level = match pyramid.last() {
            Some(prev) => convolve_and_sample_with_pool(prev, &kernel, 2, pool)?,
            None => break,
        };
        pyramid.push(level);
    }

    Ok(pyramid)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::convolve::convolve_and_sample;
    use approx::assert_relative_eq;
    use planeblur_image::ImageSize;

    #[test]
    fn test_pyramid_sizes() -> Result<(), BlurError> {
        let size = ImageSize {
            width: 64,
            height: 40,
        };
        let image = ImageF::from_size_val(size, 0.25, CpuAllocator)?;
        let pyramid = gaussian_pyramid(&image, 1.0, 4, &ThreadPool::serial())?;

        let sizes: Vec<_> = pyramid.iter().map(|level| level.size()).collect();
        assert_eq!(
            sizes,
            vec![
                ImageSize::from([64, 40]),
                ImageSize::from([32, 20]),
                ImageSize::from([16, 10]),
                ImageSize::from([8, 5]),
            ]
        );
        for level in &pyramid {
            for v in level.to_vec() {
                assert_relative_eq!(v, 0.25, epsilon = 1e-5);
            }
        }
        Ok(())
    }

    #[test]
    fn test_pyramid_levels_are_decimated_blurs() -> Result<(), BlurError> {
        let size = ImageSize {
            width: 16,
            height: 8,
        };
        let data = (0..128).map(|i| (i % 13) as f32).collect();
        let image = ImageF::new(size, data, CpuAllocator)?;
        let pyramid = gaussian_pyramid(&image, 0.8, 2, &ThreadPool::default())?;

        assert_eq!(pyramid[0].to_vec(), image.to_vec());
        let kernel = gaussian_kernel::<f32>(3, 0.8)?;
        let expected = convolve_and_sample(&image, &kernel, 2)?;
        assert_eq!(pyramid[1].to_vec(), expected.to_vec());
        Ok(())
    }

    #[test]
    fn test_pyramid_odd_level() -> Result<(), BlurError> {
        let image = ImageF::from_size_val([12, 6].into(), 1.0, CpuAllocator)?;
        let res = gaussian_pyramid(&image, 1.0, 3, &ThreadPool::serial());
        assert!(matches!(res, Err(BlurError::InvalidResolution(6, 3, 2))));

        assert!(gaussian_pyramid(&image, 1.0, 0, &ThreadPool::serial())?.is_empty());
        assert!(matches!(
            gaussian_pyramid(&image, 0.0, 2, &ThreadPool::serial()),
            Err(BlurError::InvalidSigma(_))
        ));
        Ok(())
    }
}
