//! AI segmentation proposals and hit testing against them.
//!
//! Each proposal carries a one-byte-per-pixel alpha buffer at its own
//! resolution, which need not match the base image. Lookups map a
//! natural-space point into the mask's resolution with independent
//! per-axis factors and sample the nearest pixel. A pixel counts as
//! covered when its alpha is strictly above [`ALPHA_THRESHOLD`], which
//! ignores the faint halo around anti-aliased mask edges.
//!
//! The opaque area of every buffer is counted once at construction:
//! hit testing runs on pointer moves and must not rescan pixels.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::types::{Dimensions, GrayImage, ImagePoint, MaskError};

/// Alpha values at or below this are treated as transparent.
pub const ALPHA_THRESHOLD: u8 = 10;

/// Identifier of a segmentation proposal within one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct MaskId(pub u32);

impl fmt::Display for MaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "mask#{}", self.0)
    }
}

/// Decoded alpha channel of a segmentation proposal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlphaBuffer {
    alpha: GrayImage,
    area: u64,
}

impl AlphaBuffer {
    /// Wrap an alpha image, counting its opaque area.
    #[must_use]
    pub fn new(alpha: GrayImage) -> Self {
        let area = alpha
            .as_raw()
            .iter()
            .filter(|&&a| a > ALPHA_THRESHOLD)
            .count() as u64;
        Self { alpha, area }
    }

    /// Build from raw row-major alpha bytes.
    ///
    /// # Errors
    ///
    /// Returns [`MaskError::InvalidDimensions`] for a zero-sized buffer
    /// and [`MaskError::AlphaLength`] if `data` is not `width * height`
    /// bytes long.
    pub fn from_raw(width: u32, height: u32, data: Vec<u8>) -> Result<Self, MaskError> {
        let dims = Dimensions::new(width, height).validate()?;
        let actual = data.len() as u64;
        let alpha = GrayImage::from_raw(width, height, data).ok_or(MaskError::AlphaLength {
            expected: dims.pixel_count(),
            actual,
        })?;
        if actual != dims.pixel_count() {
            return Err(MaskError::AlphaLength {
                expected: dims.pixel_count(),
                actual,
            });
        }
        Ok(Self::new(alpha))
    }

    /// Decode an encoded mask image (PNG, JPEG, BMP, WebP).
    ///
    /// Images with an alpha channel contribute that channel. Images
    /// without one (plain grayscale or RGB proposals) use their
    /// luminance as alpha, so white marks the proposed region.
    ///
    /// # Errors
    ///
    /// Returns [`MaskError::EmptyInput`] if `bytes` is empty and
    /// [`MaskError::ImageDecode`] if the data cannot be decoded.
    pub fn decode(bytes: &[u8]) -> Result<Self, MaskError> {
        if bytes.is_empty() {
            return Err(MaskError::EmptyInput);
        }
        let img = image::load_from_memory(bytes)?;
        let alpha = if img.color().has_alpha() {
            let rgba = img.to_rgba8();
            GrayImage::from_fn(rgba.width(), rgba.height(), |x, y| {
                image::Luma([rgba.get_pixel(x, y).0[3]])
            })
        } else {
            img.to_luma8()
        };
        Dimensions::new(alpha.width(), alpha.height()).validate()?;
        Ok(Self::new(alpha))
    }

    /// Build from a row-major grid of 0/1 (or 0..=255) cells, the
    /// shape automatic segmenters return as `segmentation`.
    ///
    /// Non-zero cells become fully opaque.
    ///
    /// # Errors
    ///
    /// Returns [`MaskError::InvalidDimensions`] for an empty grid and
    /// [`MaskError::AlphaLength`] when rows have differing lengths.
    pub fn from_grid(rows: &[Vec<u8>]) -> Result<Self, MaskError> {
        let height = u32::try_from(rows.len()).map_err(|_| MaskError::InvalidDimensions {
            width: 0,
            height: u32::MAX,
        })?;
        let width = rows.first().map_or(0, Vec::len);
        let width = u32::try_from(width).map_err(|_| MaskError::InvalidDimensions {
            width: u32::MAX,
            height,
        })?;
        let data: Vec<u8> = rows
            .iter()
            .flat_map(|row| row.iter().map(|&cell| if cell > 0 { 255 } else { 0 }))
            .collect();
        Self::from_raw(width, height, data)
    }

    /// Buffer size in pixels.
    #[must_use]
    pub fn dimensions(&self) -> Dimensions {
        Dimensions::new(self.alpha.width(), self.alpha.height())
    }

    /// Number of pixels with alpha above [`ALPHA_THRESHOLD`].
    #[must_use]
    pub const fn area(&self) -> u64 {
        self.area
    }

    /// The raw alpha image.
    #[must_use]
    pub const fn as_image(&self) -> &GrayImage {
        &self.alpha
    }

    /// Alpha at a pixel of this buffer.
    #[must_use]
    pub fn alpha_at(&self, x: u32, y: u32) -> u8 {
        self.alpha.get_pixel(x, y).0[0]
    }

    /// Whether the natural-space `point` of an image sized `natural`
    /// falls on an opaque pixel of this buffer.
    #[must_use]
    pub fn covers(&self, point: ImagePoint, natural: Dimensions) -> bool {
        let (Some(x), Some(y)) = (
            sample_coord(point.image_x, natural.width, self.alpha.width()),
            sample_coord(point.image_y, natural.height, self.alpha.height()),
        ) else {
            return false;
        };
        self.alpha_at(x, y) > ALPHA_THRESHOLD
    }
}

/// Map a natural-space coordinate to the buffer pixel containing it,
/// for a buffer `mask_len` wide. `None` outside `[0, natural_len)`.
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]
pub(crate) fn sample_coord(v: f64, natural_len: u32, mask_len: u32) -> Option<u32> {
    if natural_len == 0 || mask_len == 0 || !(0.0..f64::from(natural_len)).contains(&v) {
        return None;
    }
    let scaled = (v * f64::from(mask_len) / f64::from(natural_len)).floor();
    Some((scaled as u32).min(mask_len - 1))
}

/// Buffer pixel under the centre of natural pixel `index`.
pub(crate) fn sample_pixel(index: u32, natural_len: u32, mask_len: u32) -> u32 {
    sample_coord(f64::from(index) + 0.5, natural_len, mask_len).unwrap_or(0)
}

/// One segmentation proposal. Its alpha buffer arrives asynchronously;
/// until then the mask is never a hit-test or merge candidate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentationMask {
    id: MaskId,
    source_url: String,
    alpha: Option<AlphaBuffer>,
}

impl SegmentationMask {
    /// A proposal whose image has not been decoded yet.
    #[must_use]
    pub fn pending(id: MaskId, source_url: impl Into<String>) -> Self {
        Self {
            id,
            source_url: source_url.into(),
            alpha: None,
        }
    }

    /// A proposal with its alpha buffer already decoded.
    #[must_use]
    pub fn decoded(id: MaskId, source_url: impl Into<String>, alpha: AlphaBuffer) -> Self {
        Self {
            id,
            source_url: source_url.into(),
            alpha: Some(alpha),
        }
    }

    /// Attach the decoded alpha buffer.
    pub fn set_alpha(&mut self, alpha: AlphaBuffer) {
        self.alpha = Some(alpha);
    }

    /// Identifier.
    #[must_use]
    pub const fn id(&self) -> MaskId {
        self.id
    }

    /// Where the mask image was fetched from.
    #[must_use]
    pub fn source_url(&self) -> &str {
        &self.source_url
    }

    /// The decoded alpha buffer, if available.
    #[must_use]
    pub const fn alpha(&self) -> Option<&AlphaBuffer> {
        self.alpha.as_ref()
    }

    /// Whether the alpha buffer has been decoded.
    #[must_use]
    pub const fn is_decoded(&self) -> bool {
        self.alpha.is_some()
    }

    /// Cached opaque area; `None` until decoded.
    #[must_use]
    pub fn area(&self) -> Option<u64> {
        self.alpha.as_ref().map(AlphaBuffer::area)
    }

    /// Whether this mask covers `point`. Undecoded masks never do.
    #[must_use]
    pub fn covers(&self, point: ImagePoint, natural: Dimensions) -> bool {
        self.alpha
            .as_ref()
            .is_some_and(|alpha| alpha.covers(point, natural))
    }
}

/// Identifiers of every decoded mask covering `point`, in input order.
#[must_use]
pub fn masks_under_point(
    point: ImagePoint,
    masks: &[SegmentationMask],
    natural: Dimensions,
) -> Vec<MaskId> {
    masks
        .iter()
        .filter(|m| m.covers(point, natural))
        .map(SegmentationMask::id)
        .collect()
}

/// The candidate with the smallest opaque area. Equal areas resolve to
/// the earliest candidate; undecoded candidates are skipped.
pub fn pick_tie_break_winner<'a>(
    candidates: impl IntoIterator<Item = &'a SegmentationMask>,
) -> Option<MaskId> {
    candidates
        .into_iter()
        .filter_map(|m| m.area().map(|area| (area, m.id())))
        .min_by_key(|&(area, _)| area)
        .map(|(_, id)| id)
}

/// The mask a click at `point` selects: the smallest covering mask.
#[must_use]
pub fn hit_test(
    point: ImagePoint,
    masks: &[SegmentationMask],
    natural: Dimensions,
) -> Option<MaskId> {
    pick_tie_break_winner(masks.iter().filter(|m| m.covers(point, natural)))
}
