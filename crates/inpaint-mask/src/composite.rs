//! Union of selected segmentation proposals into one binary mask.

use std::cmp::Reverse;

use crate::segmentation::{ALPHA_THRESHOLD, SegmentationMask, sample_pixel};
use crate::types::{Dimensions, GrayImage, MaskError};

/// Merge `selected` into a `natural`-sized black/white mask.
///
/// A pixel is black (0) when any selected mask has alpha above
/// [`ALPHA_THRESHOLD`] at the corresponding location of its own
/// resolution, white (255) otherwise. Undecoded masks contribute
/// nothing.
///
/// Masks are painted largest area first. Union does not depend on the
/// order; it is fixed so that a future overwrite-style compositing mode
/// keeps small proposals on top.
///
/// # Errors
///
/// Returns [`MaskError::InvalidDimensions`] if `natural` is empty.
pub fn merge(selected: &[&SegmentationMask], natural: Dimensions) -> Result<GrayImage, MaskError> {
    let natural = natural.validate()?;
    let mut ordered: Vec<_> = selected
        .iter()
        .filter_map(|m| m.alpha().map(|alpha| (m.id(), alpha)))
        .collect();
    ordered.sort_by_key(|(id, alpha)| (Reverse(alpha.area()), *id));

    let mut out = GrayImage::from_pixel(natural.width, natural.height, image::Luma([255]));
    for (id, alpha) in ordered {
        let dims = alpha.dimensions();
        // Per-axis lookup tables: every natural pixel index maps to one
        // source index, so each row reuses the same column table.
        let columns = lookup_table(natural.width, dims.width);
        let rows = lookup_table(natural.height, dims.height);
        let mut painted = 0_u64;
        for (y, sy) in rows.iter().enumerate() {
            for (x, sx) in columns.iter().enumerate() {
                if alpha.alpha_at(*sx, *sy) > ALPHA_THRESHOLD {
                    #[allow(clippy::cast_possible_truncation)]
                    out.put_pixel(x as u32, y as u32, image::Luma([0]));
                    painted += 1;
                }
            }
        }
        log::debug!("merged {id}: {painted} px from a {}x{} proposal", dims.width, dims.height);
    }
    Ok(out)
}

/// Source index for each of `natural_len` destination indices, sampled
/// at destination pixel centres.
fn lookup_table(natural_len: u32, mask_len: u32) -> Vec<u32> {
    (0..natural_len)
        .map(|i| sample_pixel(i, natural_len, mask_len))
        .collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::segmentation::{AlphaBuffer, MaskId};

    const NATURAL: Dimensions = Dimensions::new(20, 20);

    /// A `size × size` proposal opaque in `[x0, x0+w) × [y0, y0+h)`.
    fn block(id: u32, size: u32, x0: u32, y0: u32, w: u32, h: u32) -> SegmentationMask {
        let alpha = AlphaBuffer::new(GrayImage::from_fn(size, size, |x, y| {
            let inside = (x0..x0 + w).contains(&x) && (y0..y0 + h).contains(&y);
            image::Luma([if inside { 255 } else { 0 }])
        }));
        SegmentationMask::decoded(MaskId(id), format!("mask-{id}"), alpha)
    }

    fn black_pixels(img: &GrayImage) -> usize {
        img.pixels().filter(|px| px.0[0] == 0).count()
    }

    #[test]
    fn nested_masks_union_to_the_outer_area() {
        let a = block(0, 20, 2, 2, 10, 5); // 50
        let b = block(1, 20, 2, 2, 10, 8); // 80, contains a
        assert_eq!(a.area(), Some(50));
        assert_eq!(b.area(), Some(80));

        let merged = merge(&[&a, &b], NATURAL).unwrap();
        assert_eq!(black_pixels(&merged), 80);

        let again = merge(&[&a, &b], NATURAL).unwrap();
        assert_eq!(merged.as_raw(), again.as_raw());
    }

    #[test]
    fn disjoint_masks_add_up() {
        let a = block(0, 20, 0, 0, 5, 5);
        let b = block(1, 20, 10, 10, 5, 2);
        let merged = merge(&[&a, &b], NATURAL).unwrap();
        assert_eq!(black_pixels(&merged), 35);
        assert_eq!(merged.get_pixel(0, 0).0[0], 0);
        assert_eq!(merged.get_pixel(7, 7).0[0], 255);
    }

    #[test]
    fn selection_order_does_not_matter() {
        let a = block(0, 20, 0, 0, 12, 12);
        let b = block(1, 20, 6, 6, 10, 3);
        let ab = merge(&[&a, &b], NATURAL).unwrap();
        let ba = merge(&[&b, &a], NATURAL).unwrap();
        assert_eq!(ab.as_raw(), ba.as_raw());
    }

    #[test]
    fn lower_resolution_masks_are_upscaled() {
        // 10x10 proposal for a 20x20 image: each source pixel covers 2x2.
        let a = block(0, 10, 0, 0, 5, 10);
        let merged = merge(&[&a], NATURAL).unwrap();
        for (x, y, px) in merged.enumerate_pixels() {
            assert_eq!(px.0[0] == 0, x < 10, "pixel ({x}, {y})");
        }
        assert_eq!(black_pixels(&merged), 200);
    }

    #[test]
    fn empty_selection_is_all_white() {
        let merged = merge(&[], NATURAL).unwrap();
        assert_eq!(black_pixels(&merged), 0);
    }

    #[test]
    fn undecoded_masks_contribute_nothing() {
        let pending = SegmentationMask::pending(MaskId(9), "later");
        let merged = merge(&[&pending], NATURAL).unwrap();
        assert_eq!(black_pixels(&merged), 0);
    }

    #[test]
    fn empty_dimensions_are_rejected() {
        let result = merge(&[], Dimensions::new(10, 0));
        assert!(matches!(result, Err(MaskError::InvalidDimensions { .. })));
    }
}
