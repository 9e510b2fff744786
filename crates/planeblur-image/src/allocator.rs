use std::alloc;
use std::alloc::Layout;

use thiserror::Error;

/// An error type for image allocator operations.
#[derive(Debug, Error, PartialEq)]
pub enum ImageAllocatorError {
    /// The requested size and alignment do not form a valid layout.
    #[error("Invalid image layout {0}")]
    LayoutError(core::alloc::LayoutError),

    /// The allocator could not provide the requested memory.
    #[error("Allocation of {0} bytes failed")]
    OutOfMemory(usize),
}

/// A trait for allocating and deallocating the memory behind image planes.
///
/// # Safety
///
/// The image allocator must be thread-safe.
///
/// # Methods
///
/// * `alloc` - Allocates memory with the given layout. The contents may be uninitialized.
/// * `dealloc` - Deallocates memory previously returned by `alloc`.
pub trait ImageAllocator: Clone + Send + Sync {
    /// Allocates memory for an image with the given layout.
    ///
    /// The layout size is never zero. The returned memory need not be
    /// initialized, the image zeroes it before handing out any slice.
    fn alloc(&self, layout: Layout) -> Result<*mut u8, ImageAllocatorError>;

    /// Deallocates memory for an image with the given layout.
    fn dealloc(&self, ptr: *mut u8, layout: Layout);
}

#[derive(Clone, Copy, Debug, Default)]
/// An image allocator that uses the system allocator.
pub struct CpuAllocator;

impl ImageAllocator for CpuAllocator {
    /// Allocates memory for an image with the given layout.
    ///
    /// # Arguments
    ///
    /// * `layout` - The layout of the image buffer, size must be non-zero.
    ///
    /// # Returns
    ///
    /// A non-null pointer to the allocated memory if successful, otherwise an error.
    fn alloc(&self, layout: Layout) -> Result<*mut u8, ImageAllocatorError> {
        // SAFETY: callers never request zero-sized layouts.
        let ptr = unsafe { alloc::alloc(layout) };
        if ptr.is_null() {
            return Err(ImageAllocatorError::OutOfMemory(layout.size()));
        }
        Ok(ptr)
    }

    /// Deallocates memory for an image with the given layout.
    ///
    /// # Arguments
    ///
    /// * `ptr` - A pointer returned by [`CpuAllocator::alloc`] with the same layout.
    /// * `layout` - The layout of the image buffer.
    #[allow(clippy::not_unsafe_ptr_arg_deref)]
    fn dealloc(&self, ptr: *mut u8, layout: Layout) {
        if !ptr.is_null() {
            unsafe { alloc::dealloc(ptr, layout) }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cpu_allocator() -> Result<(), ImageAllocatorError> {
        let allocator = CpuAllocator;
        let layout = Layout::from_size_align(1024, 64).map_err(ImageAllocatorError::LayoutError)?;
        let ptr = allocator.alloc(layout)?;
        assert_eq!(ptr as usize % 64, 0);
        // SAFETY: ptr is valid for 1024 bytes and initialized before the read.
        let bytes = unsafe {
            std::ptr::write_bytes(ptr, 7, 1024);
            std::slice::from_raw_parts(ptr, 1024)
        };
        assert!(bytes.iter().all(|&b| b == 7));
        allocator.dealloc(ptr, layout);
        Ok(())
    }
}
