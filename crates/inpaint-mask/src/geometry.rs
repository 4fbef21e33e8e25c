//! Display geometry and pointer-to-image coordinate mapping.
//!
//! The base image is drawn on a canvas scaled to fit its container,
//! optionally panned and zoomed by the host. A display-space pointer
//! position `p` relates to the natural image-space point `q` by
//!
//! ```text
//! p = q * scale * zoom + offset
//! ```
//!
//! [`CoordinateMapper`] owns both halves of that transform and inverts
//! it exactly, so strokes are stored in natural pixels regardless of
//! the on-screen fit.

use serde::{Deserialize, Serialize};

use crate::types::{Dimensions, ImagePoint, MaskError, Point};

/// On-screen size of the fitted base image.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DisplayGeometry {
    /// Displayed width in canvas pixels.
    pub display_width: f64,
    /// Displayed height in canvas pixels.
    pub display_height: f64,
    /// `display_width / natural_width`.
    pub scale: f64,
}

impl DisplayGeometry {
    /// Fit `natural` inside `container`, preserving aspect ratio.
    ///
    /// # Errors
    ///
    /// Returns [`MaskError::InvalidDimensions`] if either size is empty.
    pub fn fit(natural: Dimensions, container: Dimensions) -> Result<Self, MaskError> {
        let natural = natural.validate()?;
        let container = container.validate()?;
        let scale = (f64::from(container.width) / f64::from(natural.width))
            .min(f64::from(container.height) / f64::from(natural.height));
        Ok(Self::with_scale(natural, scale))
    }

    /// Geometry for an explicit scale factor.
    #[must_use]
    pub fn with_scale(natural: Dimensions, scale: f64) -> Self {
        Self {
            display_width: f64::from(natural.width) * scale,
            display_height: f64::from(natural.height) * scale,
            scale,
        }
    }
}

/// Host-controlled pan and zoom applied on top of the fit scale.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DisplayTransform {
    /// Horizontal translation in canvas pixels.
    pub offset_x: f64,
    /// Vertical translation in canvas pixels.
    pub offset_y: f64,
    /// Zoom multiplier (must be finite and positive).
    pub zoom: f64,
}

impl DisplayTransform {
    /// No pan, no zoom.
    pub const IDENTITY: Self = Self {
        offset_x: 0.0,
        offset_y: 0.0,
        zoom: 1.0,
    };
}

impl Default for DisplayTransform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// Converts between display-space pointer positions and natural
/// image-space points.
#[derive(Debug, Clone, PartialEq)]
pub struct CoordinateMapper {
    natural: Dimensions,
    container: Dimensions,
    geometry: DisplayGeometry,
    transform: DisplayTransform,
}

impl CoordinateMapper {
    /// Create a mapper for a base image shown inside `container`.
    ///
    /// # Errors
    ///
    /// Returns [`MaskError::InvalidDimensions`] if either size is empty.
    pub fn new(natural: Dimensions, container: Dimensions) -> Result<Self, MaskError> {
        Ok(Self {
            natural,
            container,
            geometry: DisplayGeometry::fit(natural, container)?,
            transform: DisplayTransform::IDENTITY,
        })
    }

    /// Natural size of the base image.
    #[must_use]
    pub const fn natural(&self) -> Dimensions {
        self.natural
    }

    /// Current container (canvas) size.
    #[must_use]
    pub const fn container(&self) -> Dimensions {
        self.container
    }

    /// Current fitted geometry.
    #[must_use]
    pub const fn geometry(&self) -> DisplayGeometry {
        self.geometry
    }

    /// Current pan/zoom.
    #[must_use]
    pub const fn transform(&self) -> DisplayTransform {
        self.transform
    }

    /// Recompute the geometry for a new container size.
    ///
    /// # Errors
    ///
    /// Returns [`MaskError::InvalidDimensions`] if `container` is empty;
    /// the previous geometry is kept.
    pub fn refit(&mut self, container: Dimensions) -> Result<(), MaskError> {
        self.geometry = DisplayGeometry::fit(self.natural, container)?;
        self.container = container;
        Ok(())
    }

    /// Replace the base image (e.g. after an upscale) and refit.
    ///
    /// # Errors
    ///
    /// Returns [`MaskError::InvalidDimensions`] if `natural` is empty.
    pub fn set_natural(&mut self, natural: Dimensions) -> Result<(), MaskError> {
        self.geometry = DisplayGeometry::fit(natural, self.container)?;
        self.natural = natural;
        Ok(())
    }

    /// Replace the pan/zoom transform.
    ///
    /// # Errors
    ///
    /// Returns [`MaskError::InvalidGeometry`] if the zoom is not finite
    /// and positive or an offset is not finite.
    pub fn set_transform(&mut self, transform: DisplayTransform) -> Result<(), MaskError> {
        if !(transform.zoom.is_finite() && transform.zoom > 0.0) {
            return Err(MaskError::InvalidGeometry(format!(
                "zoom must be finite and positive, got {}",
                transform.zoom
            )));
        }
        if !(transform.offset_x.is_finite() && transform.offset_y.is_finite()) {
            return Err(MaskError::InvalidGeometry("offset must be finite".into()));
        }
        self.transform = transform;
        Ok(())
    }

    /// Map a pointer position to natural image space.
    ///
    /// Returns `None` when no pointer position is available or it lies
    /// outside the canvas.
    #[must_use]
    pub fn to_image_space(&self, pointer: Option<Point>) -> Option<ImagePoint> {
        let p = pointer?;
        let inside = (0.0..=f64::from(self.container.width)).contains(&p.x)
            && (0.0..=f64::from(self.container.height)).contains(&p.y);
        if !inside {
            return None;
        }
        let factor = self.geometry.scale * self.transform.zoom;
        Some(ImagePoint::new(
            (p.x - self.transform.offset_x) / factor,
            (p.y - self.transform.offset_y) / factor,
        ))
    }

    /// Map a natural image-space point back to display space.
    #[must_use]
    pub fn to_display_space(&self, point: ImagePoint) -> Point {
        let factor = self.geometry.scale * self.transform.zoom;
        Point::new(
            point.image_x.mul_add(factor, self.transform.offset_x),
            point.image_y.mul_add(factor, self.transform.offset_y),
        )
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn mapper_800x600_in_400x300() -> CoordinateMapper {
        CoordinateMapper::new(Dimensions::new(800, 600), Dimensions::new(400, 300)).unwrap()
    }

    #[test]
    fn fit_scales_down_to_container() {
        let geometry = mapper_800x600_in_400x300().geometry();
        assert!((geometry.scale - 0.5).abs() < f64::EPSILON);
        assert!((geometry.display_width - 400.0).abs() < f64::EPSILON);
        assert!((geometry.display_height - 300.0).abs() < f64::EPSILON);
    }

    #[test]
    fn fit_uses_limiting_axis() {
        let geometry =
            DisplayGeometry::fit(Dimensions::new(1000, 500), Dimensions::new(500, 500)).unwrap();
        assert!((geometry.scale - 0.5).abs() < f64::EPSILON);
        assert!((geometry.display_height - 250.0).abs() < f64::EPSILON);
    }

    #[test]
    fn empty_container_is_rejected() {
        let result = CoordinateMapper::new(Dimensions::new(10, 10), Dimensions::new(0, 10));
        assert!(matches!(result, Err(MaskError::InvalidDimensions { .. })));
    }

    #[test]
    fn pointer_is_divided_by_scale() {
        let mapper = mapper_800x600_in_400x300();
        let p = mapper.to_image_space(Some(Point::new(50.0, 150.0))).unwrap();
        assert_eq!(p, ImagePoint::new(100.0, 300.0));
    }

    #[test]
    fn missing_pointer_maps_to_none() {
        assert!(mapper_800x600_in_400x300().to_image_space(None).is_none());
    }

    #[test]
    fn pointer_outside_canvas_maps_to_none() {
        let mapper = mapper_800x600_in_400x300();
        assert!(mapper.to_image_space(Some(Point::new(-1.0, 10.0))).is_none());
        assert!(mapper.to_image_space(Some(Point::new(10.0, 301.0))).is_none());
    }

    #[test]
    fn round_trip_with_pan_and_zoom() {
        let mut mapper = mapper_800x600_in_400x300();
        mapper
            .set_transform(DisplayTransform {
                offset_x: -37.5,
                offset_y: 12.25,
                zoom: 2.5,
            })
            .unwrap();
        for &(x, y) in &[(0.0, 0.0), (13.7, 291.3), (399.9, 0.1), (200.0, 150.0)] {
            let p = Point::new(x, y);
            let back = mapper.to_display_space(mapper.to_image_space(Some(p)).unwrap());
            assert!((back.x - p.x).abs() < 1e-9, "x drifted: {back:?} vs {p:?}");
            assert!((back.y - p.y).abs() < 1e-9, "y drifted: {back:?} vs {p:?}");
        }
    }

    #[test]
    fn zoom_must_be_positive() {
        let mut mapper = mapper_800x600_in_400x300();
        let result = mapper.set_transform(DisplayTransform {
            zoom: 0.0,
            ..DisplayTransform::IDENTITY
        });
        assert!(matches!(result, Err(MaskError::InvalidGeometry(_))));
        assert_eq!(mapper.transform(), DisplayTransform::IDENTITY);
    }

    #[test]
    fn refit_changes_scale() {
        let mut mapper = mapper_800x600_in_400x300();
        mapper.refit(Dimensions::new(800, 600)).unwrap();
        assert!((mapper.geometry().scale - 1.0).abs() < f64::EPSILON);
        let p = mapper.to_image_space(Some(Point::new(50.0, 50.0))).unwrap();
        assert_eq!(p, ImagePoint::new(50.0, 50.0));
    }
}
