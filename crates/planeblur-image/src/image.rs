use std::alloc::Layout;
use std::ptr::NonNull;

use crate::allocator::{CpuAllocator, ImageAllocator, ImageAllocatorError};
use crate::error::ImageError;

/// Alignment in bytes of the plane buffer and of every row start.
pub const ROW_ALIGN_BYTES: usize = 64;

/// Number of `f32` values the row stride is a multiple of.
pub const ROW_ALIGN_FLOATS: usize = ROW_ALIGN_BYTES / std::mem::size_of::<f32>();

/// Image size in pixels
///
/// A struct to represent the size of an image in pixels.
///
/// # Examples
///
/// ```
/// use planeblur_image::ImageSize;
///
/// let image_size = ImageSize {
///   width: 10,
///   height: 20,
/// };
///
/// assert_eq!(image_size.width, 10);
/// assert_eq!(image_size.height, 20);
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ImageSize {
    /// Width of the image in pixels
    pub width: usize,
    /// Height of the image in pixels
    pub height: usize,
}

impl std::fmt::Display for ImageSize {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(
            f,
            "ImageSize {{ width: {}, height: {} }}",
            self.width, self.height
        )
    }
}

impl From<[usize; 2]> for ImageSize {
    fn from(size: [usize; 2]) -> Self {
        ImageSize {
            width: size[0],
            height: size[1],
        }
    }
}

/// A single-channel `f32` image plane.
///
/// Pixels are stored row-major. Every row starts on a [`ROW_ALIGN_BYTES`]
/// boundary: the row stride is the width rounded up to a multiple of
/// [`ROW_ALIGN_FLOATS`] and the padding floats are zero. Rows are exposed as
/// slices of exactly `width` values, so padding is never observable through
/// the safe API.
pub struct ImageF<A: ImageAllocator = CpuAllocator> {
    ptr: NonNull<f32>,
    // None when the plane has no rows and nothing was allocated.
    layout: Option<Layout>,
    size: ImageSize,
    stride: usize,
    alloc: A,
}

// SAFETY: the plane uniquely owns its buffer, like a `Vec<f32>`; shared
// access only hands out `&[f32]` and mutation requires `&mut self`.
unsafe impl<A: ImageAllocator> Send for ImageF<A> {}

// SAFETY: see the `Send` impl above.
unsafe impl<A: ImageAllocator> Sync for ImageF<A> {}

impl<A: ImageAllocator> ImageF<A> {
    /// Create a new image plane from packed pixel data.
    ///
    /// # Arguments
    ///
    /// * `size` - The size of the image in pixels.
    /// * `data` - The pixel data, `width * height` values without padding.
    /// * `alloc` - The allocator for the plane buffer.
    ///
    /// # Errors
    ///
    /// If the length of the pixel data does not match the image size, or the
    /// buffer cannot be allocated, an error is returned.
    ///
    /// # Examples
    ///
    /// ```
    /// use planeblur_image::{allocator::CpuAllocator, ImageF, ImageSize};
    ///
    /// let image = ImageF::new(
    ///     ImageSize {
    ///         width: 3,
    ///         height: 2,
    ///     },
    ///     vec![0.0, 1.0, 2.0, 3.0, 4.0, 5.0],
    ///     CpuAllocator,
    /// ).unwrap();
    ///
    /// assert_eq!(image.row(1), &[3.0, 4.0, 5.0]);
    /// ```
    pub fn new(size: ImageSize, data: Vec<f32>, alloc: A) -> Result<Self, ImageError> {
        if data.len() != size.width * size.height {
            return Err(ImageError::InvalidDataLength(
                data.len(),
                size.width * size.height,
            ));
        }

        let mut image = Self::allocate(size, alloc)?;
        if size.width > 0 {
            image
                .rows_mut()
                .zip(data.chunks_exact(size.width))
                .for_each(|(dst, src)| dst.copy_from_slice(src));
        }

        Ok(image)
    }

    /// Create a new image plane with every pixel set to `val`.
    ///
    /// # Arguments
    ///
    /// * `size` - The size of the image in pixels.
    /// * `val` - The value of every pixel.
    /// * `alloc` - The allocator for the plane buffer.
    ///
    /// # Errors
    ///
    /// If the buffer cannot be allocated, an error is returned.
    pub fn from_size_val(size: ImageSize, val: f32, alloc: A) -> Result<Self, ImageError> {
        let mut image = Self::allocate(size, alloc)?;
        if val != 0.0 {
            image.rows_mut().for_each(|row| row.fill(val));
        }
        Ok(image)
    }

    fn allocate(size: ImageSize, alloc: A) -> Result<Self, ImageError> {
        let stride = size
            .width
            .div_ceil(ROW_ALIGN_FLOATS)
            .max(1)
            * ROW_ALIGN_FLOATS;
        let len = stride
            .checked_mul(size.height)
            .ok_or(ImageAllocatorError::OutOfMemory(usize::MAX))?;

        if len == 0 {
            return Ok(Self {
                ptr: NonNull::dangling(),
                layout: None,
                size,
                stride,
                alloc,
            });
        }

        let num_bytes = len
            .checked_mul(std::mem::size_of::<f32>())
            .ok_or(ImageAllocatorError::OutOfMemory(usize::MAX))?;
        let layout = Layout::from_size_align(num_bytes, ROW_ALIGN_BYTES)
            .map_err(ImageAllocatorError::LayoutError)?;
        let raw_ptr = alloc.alloc(layout)?;
        let ptr = NonNull::new(raw_ptr as *mut f32)
            .ok_or(ImageAllocatorError::OutOfMemory(num_bytes))?;

        // SAFETY: the allocator returned `num_bytes` writable bytes at `ptr`.
        // Zeroing them initializes every `f32` of the buffer, padding included.
        unsafe { std::ptr::write_bytes(ptr.as_ptr(), 0, len) };

        Ok(Self {
            ptr,
            layout: Some(layout),
            size,
            stride,
            alloc,
        })
    }

    /// Allocate a new plane with the same size and pixels.
    ///
    /// # Errors
    ///
    /// If the buffer cannot be allocated, an error is returned.
    pub fn try_clone(&self) -> Result<Self, ImageError> {
        let mut image = Self::allocate(self.size, self.alloc.clone())?;
        image.padded_mut().copy_from_slice(self.padded());
        Ok(image)
    }

    /// Get the size of the image in pixels.
    pub fn size(&self) -> ImageSize {
        self.size
    }

    /// Get the width of the image in pixels.
    pub fn width(&self) -> usize {
        self.size.width
    }

    /// Get the height of the image in pixels.
    pub fn height(&self) -> usize {
        self.size.height
    }

    /// Get the distance in floats between the starts of consecutive rows.
    pub fn stride(&self) -> usize {
        self.stride
    }

    fn padded(&self) -> &[f32] {
        match self.layout {
            // SAFETY: the buffer holds `stride * height` initialized floats.
            Some(_) => unsafe {
                std::slice::from_raw_parts(self.ptr.as_ptr(), self.stride * self.size.height)
            },
            None => &[],
        }
    }

    fn padded_mut(&mut self) -> &mut [f32] {
        match self.layout {
            // SAFETY: the buffer holds `stride * height` initialized floats and
            // `&mut self` guarantees exclusive access.
            Some(_) => unsafe {
                std::slice::from_raw_parts_mut(self.ptr.as_ptr(), self.stride * self.size.height)
            },
            None => &mut [],
        }
    }

    /// Get the pixels of row `y`.
    ///
    /// # Panics
    ///
    /// Panics if `y >= height`.
    pub fn row(&self, y: usize) -> &[f32] {
        assert!(y < self.size.height, "row {y} out of bounds");
        let start = y * self.stride;
        &self.padded()[start..start + self.size.width]
    }

    /// Get the pixels of row `y` mutably.
    ///
    /// # Panics
    ///
    /// Panics if `y >= height`.
    pub fn row_mut(&mut self, y: usize) -> &mut [f32] {
        assert!(y < self.size.height, "row {y} out of bounds");
        let start = y * self.stride;
        let width = self.size.width;
        &mut self.padded_mut()[start..start + width]
    }

    /// Iterate over the rows of the image, top to bottom.
    pub fn rows(&self) -> impl ExactSizeIterator<Item = &[f32]> + '_ {
        let width = self.size.width;
        self.padded()
            .chunks_exact(self.stride)
            .map(move |row| &row[..width])
    }

    /// Iterate mutably over the rows of the image, top to bottom.
    ///
    /// The rows are disjoint slices and may be handed to different threads.
    pub fn rows_mut(&mut self) -> impl ExactSizeIterator<Item = &mut [f32]> + '_ {
        let width = self.size.width;
        let stride = self.stride;
        self.padded_mut()
            .chunks_exact_mut(stride)
            .map(move |row| &mut row[..width])
    }

    /// Get the value of the pixel at `(x, y)`.
    ///
    /// # Errors
    ///
    /// If the coordinate lies outside the image, an error is returned.
    pub fn get(&self, x: usize, y: usize) -> Result<f32, ImageError> {
        if x >= self.size.width || y >= self.size.height {
            return Err(ImageError::PixelIndexOutOfBounds(
                x,
                y,
                self.size.width,
                self.size.height,
            ));
        }
        Ok(self.row(y)[x])
    }

    /// Copy the pixels into a packed row-major vector without padding.
    pub fn to_vec(&self) -> Vec<f32> {
        let mut data = Vec::with_capacity(self.size.width * self.size.height);
        self.rows().for_each(|row| data.extend_from_slice(row));
        data
    }
}

impl<A: ImageAllocator> std::fmt::Debug for ImageF<A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImageF")
            .field("size", &self.size)
            .field("stride", &self.stride)
            .finish()
    }
}

impl<A: ImageAllocator> Drop for ImageF<A> {
    fn drop(&mut self) {
        if let Some(layout) = self.layout {
            self.alloc.dealloc(self.ptr.as_ptr() as *mut u8, layout);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_image_size() {
        let image_size = ImageSize {
            width: 10,
            height: 20,
        };
        assert_eq!(image_size.width, 10);
        assert_eq!(image_size.height, 20);
        assert_eq!(ImageSize::from([10, 20]), image_size);
        assert_eq!(
            image_size.to_string(),
            "ImageSize { width: 10, height: 20 }"
        );
    }

    #[test]
    fn test_image_new() -> Result<(), ImageError> {
        let size = ImageSize {
            width: 3,
            height: 2,
        };
        let image = ImageF::new(size, vec![0.0, 1.0, 2.0, 3.0, 4.0, 5.0], CpuAllocator)?;

        assert_eq!(image.size(), size);
        assert_eq!(image.width(), 3);
        assert_eq!(image.height(), 2);
        assert_eq!(image.row(0), &[0.0, 1.0, 2.0]);
        assert_eq!(image.row(1), &[3.0, 4.0, 5.0]);
        assert_eq!(image.get(2, 1)?, 5.0);
        assert_eq!(image.to_vec(), vec![0.0, 1.0, 2.0, 3.0, 4.0, 5.0]);

        Ok(())
    }

    #[test]
    fn test_image_new_invalid_length() {
        let size = ImageSize {
            width: 3,
            height: 2,
        };
        let res = ImageF::new(size, vec![0.0; 5], CpuAllocator);
        assert_eq!(res.unwrap_err(), ImageError::InvalidDataLength(5, 6));
    }

    #[test]
    fn test_image_rows_are_aligned() -> Result<(), ImageError> {
        let size = ImageSize {
            width: 17,
            height: 5,
        };
        let image = ImageF::from_size_val(size, 1.5, CpuAllocator)?;

        assert_eq!(image.stride(), 32);
        assert_eq!(image.rows().len(), 5);
        for row in image.rows() {
            assert_eq!(row.len(), 17);
            assert_eq!(row.as_ptr() as usize % ROW_ALIGN_BYTES, 0);
            assert!(row.iter().all(|&v| v == 1.5));
        }

        Ok(())
    }

    #[test]
    fn test_image_rows_mut() -> Result<(), ImageError> {
        let size = ImageSize {
            width: 4,
            height: 3,
        };
        let mut image = ImageF::from_size_val(size, 0.0, CpuAllocator)?;
        image
            .rows_mut()
            .enumerate()
            .for_each(|(y, row)| row.fill(y as f32));
        image.row_mut(0)[3] = 7.0;

        assert_eq!(image.get(3, 0)?, 7.0);
        assert_eq!(image.get(0, 2)?, 2.0);
        assert_eq!(
            image.get(4, 0),
            Err(ImageError::PixelIndexOutOfBounds(4, 0, 4, 3))
        );

        let copy = image.try_clone()?;
        assert_eq!(copy.to_vec(), image.to_vec());

        Ok(())
    }

    /// Hands out memory filled with a NaN bit pattern instead of zeros.
    #[derive(Clone)]
    struct DirtyAllocator;

    impl ImageAllocator for DirtyAllocator {
        fn alloc(&self, layout: Layout) -> Result<*mut u8, ImageAllocatorError> {
            let ptr = CpuAllocator.alloc(layout)?;
            // SAFETY: ptr is valid for layout.size() bytes.
            unsafe { std::ptr::write_bytes(ptr, 0xFF, layout.size()) };
            Ok(ptr)
        }

        fn dealloc(&self, ptr: *mut u8, layout: Layout) {
            CpuAllocator.dealloc(ptr, layout)
        }
    }

    #[test]
    fn test_image_zeroes_allocator_memory() -> Result<(), ImageError> {
        let size = ImageSize {
            width: 5,
            height: 3,
        };
        let image = ImageF::from_size_val(size, 0.0, DirtyAllocator)?;
        assert!(image.to_vec().iter().all(|&v| v == 0.0));
        assert!(image.padded().iter().all(|&v| v == 0.0));

        let image = ImageF::new(size, vec![2.0; 15], DirtyAllocator)?;
        assert!(image.padded().iter().all(|&v| v == 0.0 || v == 2.0));

        let copy = image.try_clone()?;
        assert_eq!(copy.padded(), image.padded());
        Ok(())
    }

    #[test]
    fn test_image_empty() -> Result<(), ImageError> {
        let image = ImageF::from_size_val([0, 0].into(), 0.0, CpuAllocator)?;
        assert_eq!(image.rows().len(), 0);
        assert!(image.to_vec().is_empty());
        Ok(())
    }
}
