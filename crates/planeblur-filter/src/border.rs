//! Mirroring of image rows for convolution.
//!
//! All exact convolutions mirror the input about the edge samples, each edge
//! sample appearing once:
//!
//! ```text
//!     input:          [a0 a1 a2 ... aN]
//!     mirrored input: [aR ... a1 | a0 a1 a2 ... aN | aN-1 ... aN-R]
//! ```
//!
//! where `R` is the radius of the kernel (the kernel size is `2R + 1`). When
//! the row is not longer than `R` the mirrored indices are clamped into the row.

use crate::error::BlurError;

/// Maps index `i` into `[0, len)` by mirroring about the first and last sample.
///
/// Indices further than `len - 1` past either edge are clamped.
///
/// # Panics
///
/// Panics in debug builds if `len` is zero.
#[inline]
pub fn mirror_index(i: isize, len: usize) -> usize {
    debug_assert!(len > 0);
    let last = len as isize - 1;
    if i < 0 {
        (-i).min(last) as usize
    } else if i > last {
        (2 * last - i).max(0) as usize
    } else {
        i as usize
    }
}

/// Write `row_in` into the middle of `row_out` and fill `radius` mirrored
/// samples on each side.
///
/// # Arguments
///
/// * `row_in` - The source row, at least one sample.
/// * `row_out` - The extended row of length `row_in.len() + 2 * radius`.
/// * `radius` - Number of samples to add on each side.
///
/// # Errors
///
/// Returns [`BlurError::InvalidRowLength`] if `row_in` is empty or `row_out`
/// has the wrong length.
pub fn extrapolate_borders(
    row_in: &[f32],
    row_out: &mut [f32],
    radius: usize,
) -> Result<(), BlurError> {
    if row_in.is_empty() || row_out.len() != row_in.len() + 2 * radius {
        return Err(BlurError::InvalidRowLength(row_in.len(), row_out.len()));
    }

    let lastcol = row_in.len() - 1;
    let (left, rest) = row_out.split_at_mut(radius);
    let (center, right) = rest.split_at_mut(row_in.len());

    center.copy_from_slice(row_in);
    left.iter_mut()
        .rev()
        .enumerate()
        .for_each(|(x, v)| *v = row_in[(x + 1).min(lastcol)]);
    right
        .iter_mut()
        .enumerate()
        .for_each(|(x, v)| *v = row_in[lastcol.saturating_sub(x + 1)]);

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extrapolate(row: &[f32], radius: usize) -> Result<Vec<f32>, BlurError> {
        let mut out = vec![0.0; row.len() + 2 * radius];
        extrapolate_borders(row, &mut out, radius)?;
        Ok(out)
    }

    #[test]
    fn test_extrapolate_radius_one() -> Result<(), BlurError> {
        assert_eq!(extrapolate(&[1.0, 2.0, 3.0], 1)?, vec![2.0, 1.0, 2.0, 3.0, 2.0]);
        Ok(())
    }

    #[test]
    fn test_extrapolate_radius_two() -> Result<(), BlurError> {
        assert_eq!(
            extrapolate(&[10.0, 11.0, 12.0], 2)?,
            vec![12.0, 11.0, 10.0, 11.0, 12.0, 11.0, 10.0]
        );
        Ok(())
    }

    #[test]
    fn test_extrapolate_long_row() -> Result<(), BlurError> {
        let row: Vec<f32> = (0..8).map(|v| v as f32).collect();
        let out = extrapolate(&row, 3)?;

        #[rustfmt::skip]
        assert_eq!(
            out,
            vec![
                3.0, 2.0, 1.0,
                0.0, 1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0,
                6.0, 5.0, 4.0,
            ]
        );
        Ok(())
    }

    #[test]
    fn test_extrapolate_radius_zero() -> Result<(), BlurError> {
        assert_eq!(extrapolate(&[4.0, 5.0], 0)?, vec![4.0, 5.0]);
        Ok(())
    }

    #[test]
    fn test_extrapolate_clamps_short_rows() -> Result<(), BlurError> {
        assert_eq!(extrapolate(&[7.0], 2)?, vec![7.0; 5]);
        assert_eq!(
            extrapolate(&[1.0, 2.0], 3)?,
            vec![2.0, 2.0, 2.0, 1.0, 2.0, 1.0, 1.0, 1.0]
        );
        Ok(())
    }

    #[test]
    fn test_extrapolate_invalid_lengths() {
        let mut out = vec![0.0; 4];
        assert!(matches!(
            extrapolate_borders(&[1.0, 2.0], &mut out, 2),
            Err(BlurError::InvalidRowLength(2, 4))
        ));
        assert!(matches!(
            extrapolate_borders(&[], &mut out, 2),
            Err(BlurError::InvalidRowLength(0, 4))
        ));
    }

    #[test]
    fn test_mirror_index_matches_extrapolation() -> Result<(), BlurError> {
        for len in 1..6usize {
            let row: Vec<f32> = (0..len).map(|v| v as f32).collect();
            let radius = 4;
            let out = extrapolate(&row, radius)?;
            for (j, &v) in out.iter().enumerate() {
                let i = j as isize - radius as isize;
                assert_eq!(row[mirror_index(i, len)], v, "len {len} index {i}");
            }
        }
        Ok(())
    }
}
