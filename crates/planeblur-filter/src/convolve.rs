use planeblur_image::{
    allocator::{CpuAllocator, ImageAllocator},
    ImageF, ImageSize,
};

use crate::border::{extrapolate_borders, mirror_index};
use crate::error::BlurError;
use crate::parallel::ThreadPool;

/// Convolve an image with a separable kernel and keep every `res`-th pixel.
///
/// Borders are mirrored about the edge samples (see [`crate::border`]). The
/// output pixel `(ox, oy)` is the 2D convolution evaluated at
/// `(ox * res, oy * res)`; with `res = 1` this is a plain blur.
///
/// # Arguments
///
/// * `src` - The input plane.
/// * `kernel` - The 1D kernel applied along both axes, odd length.
/// * `res` - The sampling step, dividing both dimensions of `src`.
///
/// # Returns
///
/// A new plane of size `width / res x height / res`.
///
/// # Errors
///
/// Returns [`BlurError::InvalidKernelLength`] for an empty or even kernel and
/// [`BlurError::InvalidResolution`] if `res` is zero or does not divide the
/// image size.
///
/// # Example
///
/// ```
/// use planeblur_filter::{convolve::convolve_and_sample, kernels::gaussian_kernel};
/// use planeblur_image::{allocator::CpuAllocator, ImageF, ImageSize};
///
/// let size = ImageSize { width: 8, height: 4 };
/// let image = ImageF::from_size_val(size, 2.0, CpuAllocator).unwrap();
/// let kernel = gaussian_kernel::<f32>(3, 1.0).unwrap();
///
/// let sampled = convolve_and_sample(&image, &kernel, 2).unwrap();
/// assert_eq!(sampled.size(), ImageSize { width: 4, height: 2 });
/// ```
pub fn convolve_and_sample<A: ImageAllocator>(
    src: &ImageF<A>,
    kernel: &[f32],
    res: usize,
) -> Result<ImageF, BlurError> {
    convolve_and_sample_with_pool(src, kernel, res, &ThreadPool::serial())
}

/// Same as [`convolve_and_sample`], distributing rows over `pool`.
///
/// The result does not depend on the pool strategy.
pub fn convolve_and_sample_with_pool<A: ImageAllocator>(
    src: &ImageF<A>,
    kernel: &[f32],
    res: usize,
    pool: &ThreadPool,
) -> Result<ImageF, BlurError> {
    if kernel.len() % 2 == 0 {
        return Err(BlurError::InvalidKernelLength(kernel.len()));
    }

    let (width, height) = (src.width(), src.height());
    if res == 0 || width % res != 0 || height % res != 0 {
        return Err(BlurError::InvalidResolution(width, height, res));
    }

    let radius = kernel.len() / 2;
    let out_size = ImageSize {
        width: width / res,
        height: height / res,
    };

    log::debug!(
        "convolve_and_sample: {width}x{height} -> {}x{} radius={radius} res={res}",
        out_size.width,
        out_size.height
    );

    let mut dst = ImageF::from_size_val(out_size, 0.0, CpuAllocator)?;
    if width == 0 || height == 0 {
        return Ok(dst);
    }

    // horizontal pass: full height, sampled columns
    let mut tmp = ImageF::from_size_val(
        ImageSize {
            width: out_size.width,
            height,
        },
        0.0,
        CpuAllocator,
    )?;

    let tasks: Vec<_> = src.rows().zip(tmp.rows_mut()).collect();
    pool.run_with_init(
        tasks,
        || vec![0.0f32; width + 2 * radius],
        |extended, (row_in, row_out)| {
            extrapolate_borders(row_in, extended, radius)?;
            for (ox, out) in row_out.iter_mut().enumerate() {
                let x = ox * res;
                *out = kernel
                    .iter()
                    .zip(&extended[x..x + kernel.len()])
                    .map(|(&k, &v)| k * v)
                    .sum();
            }
            Ok::<(), BlurError>(())
        },
    )?;

    // vertical pass: sampled rows only
    let tasks: Vec<_> = dst.rows_mut().enumerate().collect();
    pool.run(tasks, |(oy, row_out)| {
        let y = (oy * res) as isize;
        for (i, &k) in kernel.iter().enumerate() {
            let row_in = tmp.row(mirror_index(y + i as isize - radius as isize, height));
            row_out
                .iter_mut()
                .zip(row_in)
                .for_each(|(out, &v)| *out += k * v);
        }
        Ok::<(), BlurError>(())
    })?;

    Ok(dst)
}
