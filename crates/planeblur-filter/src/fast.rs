use planeblur_image::{
    allocator::{CpuAllocator, ImageAllocator},
    ImageError, ImageF, ImageSize,
};

use crate::error::BlurError;
use crate::parallel::ThreadPool;
use crate::recursive::{RecursiveGaussian, LANES, SECTIONS};

/// Number of columns filtered together by one task of the column pass.
const STRIP_WIDTH: usize = 128;

/// Order of the two passes of [`fast_gaussian_with_order`].
///
/// Both orders give the same result up to float rounding since each pass pads
/// its own dimension with zeros.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PassOrder {
    /// Filter rows into the scratch image, then columns into the output.
    #[default]
    RowsFirst,
    /// Filter columns into the scratch image, then rows into the output.
    ColumnsFirst,
}

#[derive(Default)]
struct SectionState {
    prev: [f32; SECTIONS],
    prev2: [f32; SECTIONS],
}

impl SectionState {
    /// Advance every section by one sample and return the summed output.
    #[inline(always)]
    fn step(&mut self, rg: &RecursiveGaussian, sum: f32) -> f32 {
        let mut total = 0.0;
        for s in 0..SECTIONS {
            let out = rg.n2[s][0] * sum - rg.d1[s][0] * self.prev[s] - self.prev2[s];
            self.prev2[s] = self.prev[s];
            self.prev[s] = out;
            total += out;
        }
        total
    }

    /// Advance every section by four samples using the lane tables.
    #[inline(always)]
    fn step4(&mut self, rg: &RecursiveGaussian, sum: &[f32; LANES]) -> [f32; LANES] {
        let mut total = [0.0; LANES];
        for s in 0..SECTIONS {
            let mul_in = &rg.mul_in[s];
            let mut out = [0.0; LANES];
            for (j, o) in out.iter_mut().enumerate() {
                let mut acc = rg.mul_prev2[s][j] * self.prev2[s] + rg.mul_prev[s][j] * self.prev[s];
                for k in 0..=j {
                    acc += mul_in[j - k] * sum[k];
                }
                *o = acc;
            }
            self.prev2[s] = out[2];
            self.prev[s] = out[3];
            total.iter_mut().zip(out).for_each(|(t, o)| *t += o);
        }
        total
    }
}

/// Blur a 1D signal with the recursive gaussian.
///
/// Samples outside of `input` are zero. Output `n` depends on the inputs
/// `n - N + 1 ..= n + N - 1` where `N` is [`RecursiveGaussian::radius`].
///
/// # Arguments
///
/// * `rg` - The coefficients for the desired sigma.
/// * `input` - The signal, at least one sample.
/// * `output` - The blurred signal, same length as `input`.
///
/// # Errors
///
/// Returns [`BlurError::InvalidRowLength`] if `input` is empty or the lengths
/// differ.
///
/// # Example
///
/// ```
/// use planeblur_filter::{fast::fast_gaussian_1d, recursive::RecursiveGaussian};
///
/// let rg = RecursiveGaussian::new(2.0).unwrap();
/// let input = vec![1.0f32; 64];
/// let mut output = vec![0.0f32; 64];
/// fast_gaussian_1d(&rg, &input, &mut output).unwrap();
///
/// assert!((output[32] - 1.0).abs() < 1e-4);
/// ```
pub fn fast_gaussian_1d(
    rg: &RecursiveGaussian,
    input: &[f32],
    output: &mut [f32],
) -> Result<(), BlurError> {
    if input.is_empty() || input.len() != output.len() {
        return Err(BlurError::InvalidRowLength(input.len(), output.len()));
    }

    let width = input.len() as isize;
    let radius = rg.radius as isize;
    let at = |i: isize| if (0..width).contains(&i) { input[i as usize] } else { 0.0 };

    let mut state = SectionState::default();
    let mut n = 1 - radius;

    // head: the trailing input is still left of the row
    let first_aligned = ((radius + 1) as usize).next_multiple_of(LANES) as isize;
    while n < first_aligned.min(width) {
        let total = state.step(rg, at(n - radius - 1) + at(n + radius - 1));
        if n >= 0 {
            output[n as usize] = total;
        }
        n += 1;
    }

    // body: both inputs of all four outputs are inside the row
    while n < width - radius + 1 - 3 {
        let (i, j) = ((n - radius - 1) as usize, (n + radius - 1) as usize);
        let (left, right) = (&input[i..i + LANES], &input[j..j + LANES]);
        let sum = [
            left[0] + right[0],
            left[1] + right[1],
            left[2] + right[2],
            left[3] + right[3],
        ];
        let total = state.step4(rg, &sum);
        output[n as usize..n as usize + LANES].copy_from_slice(&total);
        n += LANES as isize;
    }

    // tail: the leading input runs past the row
    while n < width {
        output[n as usize] = state.step(rg, at(n - radius - 1) + at(n + radius - 1));
        n += 1;
    }

    Ok(())
}

/// Blur an image plane with the recursive gaussian.
///
/// Shorthand for [`fast_gaussian_with_order`] with [`PassOrder::RowsFirst`].
pub fn fast_gaussian<A1, A2, A3>(
    rg: &RecursiveGaussian,
    src: &ImageF<A1>,
    pool: &ThreadPool,
    temp: &mut ImageF<A2>,
    dst: &mut ImageF<A3>,
) -> Result<(), BlurError>
where
    A1: ImageAllocator,
    A2: ImageAllocator,
    A3: ImageAllocator,
{
    fast_gaussian_with_order(rg, src, pool, temp, dst, PassOrder::RowsFirst)
}

/// Blur an image plane with the recursive gaussian.
///
/// The first pass writes into `temp`, the second reads `temp` and writes into
/// `dst`. Rows, respectively strips of columns, are distributed over `pool`;
/// the call returns once every task finished. Each dimension is zero padded.
///
/// # Arguments
///
/// * `rg` - The coefficients for the desired sigma.
/// * `src` - The input plane.
/// * `pool` - The thread pool running the passes.
/// * `temp` - Scratch plane of the same size as `src`.
/// * `dst` - The output plane of the same size as `src`.
/// * `order` - Which dimension is filtered first.
///
/// # Errors
///
/// Returns [`ImageError::InvalidImageSize`] if `temp` or `dst` differ in size
/// from `src`, before anything is written, and [`BlurError::InvalidRowLength`]
/// for an empty plane. If a worker fails, its error is returned and the
/// contents of `dst` are unspecified.
pub fn fast_gaussian_with_order<A1, A2, A3>(
    rg: &RecursiveGaussian,
    src: &ImageF<A1>,
    pool: &ThreadPool,
    temp: &mut ImageF<A2>,
    dst: &mut ImageF<A3>,
    order: PassOrder,
) -> Result<(), BlurError>
where
    A1: ImageAllocator,
    A2: ImageAllocator,
    A3: ImageAllocator,
{
    check_size(src.size(), temp.size())?;
    check_size(src.size(), dst.size())?;

    // a row or a column would be empty
    if src.width() == 0 || src.height() == 0 {
        return Err(BlurError::InvalidRowLength(0, 0));
    }

    log::debug!(
        "fast_gaussian: {} radius={} order={order:?} strategy={:?}",
        src.size(),
        rg.radius(),
        pool.strategy()
    );

    match order {
        PassOrder::RowsFirst => {
            row_pass(rg, src, pool, temp)?;
            column_pass(rg, temp, pool, dst)
        }
        PassOrder::ColumnsFirst => {
            column_pass(rg, src, pool, temp)?;
            row_pass(rg, temp, pool, dst)
        }
    }
}

fn check_size(expected: ImageSize, actual: ImageSize) -> Result<(), ImageError> {
    if expected != actual {
        return Err(ImageError::InvalidImageSize(
            actual.width,
            actual.height,
            expected.width,
            expected.height,
        ));
    }
    Ok(())
}

fn row_pass<A1: ImageAllocator, A2: ImageAllocator>(
    rg: &RecursiveGaussian,
    src: &ImageF<A1>,
    pool: &ThreadPool,
    dst: &mut ImageF<A2>,
) -> Result<(), BlurError> {
    log::trace!("row pass over {} rows", src.height());
    let tasks: Vec<_> = src.rows().zip(dst.rows_mut()).collect();
    pool.run(tasks, |(row_in, row_out)| fast_gaussian_1d(rg, row_in, row_out))
}

fn column_pass<A1: ImageAllocator, A2: ImageAllocator>(
    rg: &RecursiveGaussian,
    src: &ImageF<A1>,
    pool: &ThreadPool,
    dst: &mut ImageF<A2>,
) -> Result<(), BlurError> {
    let height = dst.height();
    let num_strips = dst.width().div_ceil(STRIP_WIDTH);
    log::trace!("column pass over {num_strips} strips");

    // every strip owns its part of each output row
    let mut strips: Vec<(usize, Vec<&mut [f32]>)> = (0..num_strips)
        .map(|i| (i * STRIP_WIDTH, Vec::with_capacity(height)))
        .collect();
    for row in dst.rows_mut() {
        strips
            .iter_mut()
            .zip(row.chunks_mut(STRIP_WIDTH))
            .for_each(|((_, rows), chunk)| rows.push(chunk));
    }

    pool.run(strips, |(x0, mut rows)| {
        column_strip(rg, src, x0, &mut rows);
        Ok::<(), BlurError>(())
    })
}

/// Runs the recursion down every column of one strip, one row at a time.
fn column_strip<A: ImageAllocator>(
    rg: &RecursiveGaussian,
    src: &ImageF<A>,
    x0: usize,
    rows: &mut [&mut [f32]],
) {
    let Some(width) = rows.first().map(|row| row.len()) else {
        return;
    };
    let height = rows.len() as isize;
    let radius = rg.radius as isize;

    let mut prev = [[0.0f32; STRIP_WIDTH]; SECTIONS];
    let mut prev2 = [[0.0f32; STRIP_WIDTH]; SECTIONS];
    let mut sum = [0.0f32; STRIP_WIDTH];
    let mut total = [0.0f32; STRIP_WIDTH];

    for n in (1 - radius)..height {
        let sum = &mut sum[..width];
        sum.fill(0.0);
        for y in [n - radius - 1, n + radius - 1] {
            if (0..height).contains(&y) {
                let row = &src.row(y as usize)[x0..x0 + width];
                sum.iter_mut().zip(row).for_each(|(s, &v)| *s += v);
            }
        }

        let total = &mut total[..width];
        total.fill(0.0);
        for s in 0..SECTIONS {
            let (n2, d1) = (rg.n2[s][0], rg.d1[s][0]);
            total
                .iter_mut()
                .zip(sum.iter())
                .zip(prev[s].iter_mut().zip(prev2[s].iter_mut()))
                .for_each(|((t, &x), (p, pp))| {
                    let out = n2 * x - d1 * *p - *pp;
                    *pp = *p;
                    *p = out;
                    *t += out;
                });
        }

        if n >= 0 {
            rows[n as usize].copy_from_slice(total);
        }
    }
}

/// A recursive gaussian bundled with a reusable scratch plane.
///
/// Convenient when many planes are blurred with the same sigma, e.g. every
/// channel of every frame.
///
/// # Example
///
/// ```
/// use planeblur_filter::{fast::FastGaussianBlur, parallel::ThreadPool};
/// use planeblur_image::{allocator::CpuAllocator, ImageF, ImageSize};
///
/// let size = ImageSize { width: 64, height: 48 };
/// let src = ImageF::from_size_val(size, 1.0, CpuAllocator).unwrap();
/// let mut dst = ImageF::from_size_val(size, 0.0, CpuAllocator).unwrap();
///
/// let mut blur = FastGaussianBlur::new(1.5, size).unwrap();
/// blur.blur(&src, &ThreadPool::default(), &mut dst).unwrap();
///
/// assert!((dst.get(32, 24).unwrap() - 1.0).abs() < 1e-4);
/// ```
#[derive(Debug)]
pub struct FastGaussianBlur {
    rg: RecursiveGaussian,
    temp: ImageF,
    order: PassOrder,
}

impl FastGaussianBlur {
    /// Derive the coefficients for `sigma` and allocate a scratch plane.
    ///
    /// # Errors
    ///
    /// Fails if the coefficients cannot be derived or the scratch plane cannot
    /// be allocated.
    pub fn new(sigma: f64, size: ImageSize) -> Result<Self, BlurError> {
        Ok(Self {
            rg: RecursiveGaussian::new(sigma)?,
            temp: ImageF::from_size_val(size, 0.0, CpuAllocator)?,
            order: PassOrder::default(),
        })
    }

    /// Set the order of the two passes.
    pub fn with_order(mut self, order: PassOrder) -> Self {
        self.order = order;
        self
    }

    /// The coefficients used by [`FastGaussianBlur::blur`].
    pub fn coefficients(&self) -> &RecursiveGaussian {
        &self.rg
    }

    /// Blur `src` into `dst`.
    ///
    /// The scratch plane is reallocated if `src` has another size than the
    /// previous plane.
    ///
    /// # Errors
    ///
    /// See [`fast_gaussian_with_order`].
    pub fn blur<A1: ImageAllocator, A2: ImageAllocator>(
        &mut self,
        src: &ImageF<A1>,
        pool: &ThreadPool,
        dst: &mut ImageF<A2>,
    ) -> Result<(), BlurError> {
        if self.temp.size() != src.size() {
            log::debug!("resizing scratch plane {} -> {}", self.temp.size(), src.size());
            self.temp = ImageF::from_size_val(src.size(), 0.0, CpuAllocator)?;
        }
        fast_gaussian_with_order(&self.rg, src, pool, &mut self.temp, dst, self.order)
    }
}
