//! Shared types for the mask authoring engine.

use serde::{Deserialize, Serialize};

/// Re-export `GrayImage` so downstream crates can hold exported masks
/// and alpha buffers without depending on `image` directly.
pub use image::GrayImage;

/// A 2D point in display (on-screen canvas) coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    /// Horizontal position (pixels from left edge).
    pub x: f64,
    /// Vertical position (pixels from top edge).
    pub y: f64,
}

impl Point {
    /// Create a new point.
    #[must_use]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// A 2D point in natural image space.
///
/// This is the only coordinate type the recorder, rasterizer and hit
/// tester accept. Pointer positions become `ImagePoint`s exclusively
/// through [`CoordinateMapper::to_image_space`](crate::CoordinateMapper::to_image_space).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ImagePoint {
    /// Horizontal position in natural-resolution pixels.
    pub image_x: f64,
    /// Vertical position in natural-resolution pixels.
    pub image_y: f64,
}

impl ImagePoint {
    /// Create a new image-space point.
    #[must_use]
    pub const fn new(image_x: f64, image_y: f64) -> Self {
        Self { image_x, image_y }
    }
}

/// Image dimensions in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimensions {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl Dimensions {
    /// Create new dimensions.
    #[must_use]
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Returns `true` if either side is zero.
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Total number of pixels.
    #[must_use]
    pub fn pixel_count(self) -> u64 {
        u64::from(self.width) * u64::from(self.height)
    }

    /// Fail with [`MaskError::InvalidDimensions`] when either side is zero.
    ///
    /// # Errors
    ///
    /// Returns [`MaskError::InvalidDimensions`] for zero-sized dimensions.
    pub const fn validate(self) -> Result<Self, MaskError> {
        if self.is_empty() {
            Err(MaskError::InvalidDimensions {
                width: self.width,
                height: self.height,
            })
        } else {
            Ok(self)
        }
    }
}

/// Which side of the mask a stroke paints.
///
/// Older stroke files name these by their paint colour, so `"black"`
/// and `"white"` are accepted as aliases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Polarity {
    /// Paints the region to regenerate (black).
    #[serde(alias = "black")]
    Include,
    /// Paints the region to keep (white).
    #[serde(alias = "white")]
    Exclude,
}

impl Polarity {
    /// Grayscale value this polarity paints in the exported mask.
    #[must_use]
    pub const fn luma(self) -> u8 {
        match self {
            Self::Include => 0,
            Self::Exclude => 255,
        }
    }
}

/// Active drawing tool.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tool {
    /// Paints [`Polarity::Include`].
    #[default]
    Brush,
    /// Paints [`Polarity::Exclude`].
    Eraser,
}

impl Tool {
    /// Polarity of strokes drawn with this tool.
    #[must_use]
    pub const fn polarity(self) -> Polarity {
        match self {
            Self::Brush => Polarity::Include,
            Self::Eraser => Polarity::Exclude,
        }
    }
}

/// Active drawing mode.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DrawMode {
    /// Open freehand strokes.
    #[default]
    Free,
    /// Freehand strokes closed into filled regions on release.
    Lasso,
    /// Axis-aligned drag rectangles, emitted as filled closed strokes.
    Rectangle,
}

/// A recorded brush, eraser, lasso or rectangle gesture.
///
/// Points are in the coordinate frame given by [`frame`](Self::frame),
/// which is the natural image size at capture time. The rasterizer
/// rescales from that frame to the export size, so strokes survive a
/// change of base image dimensions between drawing and export.
///
/// A closed stroke always ends on its first point. Rectangle strokes
/// additionally keep their outline inside the enclosed area, so the
/// painted region is exactly the selected box.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stroke {
    points: Vec<ImagePoint>,
    brush_size: u32,
    polarity: Polarity,
    #[serde(default)]
    closed: bool,
    #[serde(default)]
    clip_outline: bool,
    frame: Dimensions,
}

impl Stroke {
    /// Create an open stroke. A zero brush size is raised to 1.
    #[must_use]
    pub fn open(
        points: Vec<ImagePoint>,
        brush_size: u32,
        polarity: Polarity,
        frame: Dimensions,
    ) -> Self {
        Self {
            points,
            brush_size: brush_size.max(1),
            polarity,
            closed: false,
            clip_outline: false,
            frame,
        }
    }

    /// Create a closed stroke, appending the first point if the list
    /// does not already end on it.
    #[must_use]
    pub fn closed(
        points: Vec<ImagePoint>,
        brush_size: u32,
        polarity: Polarity,
        frame: Dimensions,
    ) -> Self {
        let mut stroke = Self::open(points, brush_size, polarity, frame);
        stroke.close();
        stroke
    }

    /// Create a closed stroke whose outline is confined to its interior.
    #[must_use]
    pub fn rectangle(
        points: Vec<ImagePoint>,
        brush_size: u32,
        polarity: Polarity,
        frame: Dimensions,
    ) -> Self {
        let mut stroke = Self::closed(points, brush_size, polarity, frame);
        stroke.clip_outline = true;
        stroke
    }

    /// Close the loop back to the first point.
    pub(crate) fn close(&mut self) {
        if let (Some(&first), Some(&last)) = (self.points.first(), self.points.last())
            && (self.points.len() == 1 || first != last)
        {
            self.points.push(first);
        }
        self.closed = true;
    }

    pub(crate) fn push(&mut self, point: ImagePoint) {
        self.points.push(point);
    }

    /// Stroke points in capture-frame coordinates.
    #[must_use]
    pub fn points(&self) -> &[ImagePoint] {
        &self.points
    }

    /// Brush diameter in capture-frame pixels (always at least 1).
    #[must_use]
    pub const fn brush_size(&self) -> u32 {
        self.brush_size
    }

    /// Which side of the mask this stroke paints.
    #[must_use]
    pub const fn polarity(&self) -> Polarity {
        self.polarity
    }

    /// Whether the stroke encloses a filled region.
    #[must_use]
    pub const fn is_closed(&self) -> bool {
        self.closed
    }

    /// Whether the outline is clipped to the enclosed area.
    #[must_use]
    pub const fn clips_outline(&self) -> bool {
        self.clip_outline
    }

    /// The coordinate frame the points were captured in.
    #[must_use]
    pub const fn frame(&self) -> Dimensions {
        self.frame
    }

    /// Per-axis scale from the capture frame to `target`.
    ///
    /// A degenerate frame (zero side) maps 1:1.
    #[must_use]
    pub fn scale_to(&self, target: Dimensions) -> (f64, f64) {
        if self.frame.is_empty() {
            return (1.0, 1.0);
        }
        (
            f64::from(target.width) / f64::from(self.frame.width),
            f64::from(target.height) / f64::from(self.frame.height),
        )
    }
}

/// Ephemeral rubber-band rectangle in image space.
///
/// Always well-formed: `width` and `height` are non-negative whatever
/// the drag direction.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RectSelection {
    /// Left edge.
    pub x: f64,
    /// Top edge.
    pub y: f64,
    /// Horizontal extent.
    pub width: f64,
    /// Vertical extent.
    pub height: f64,
}

impl RectSelection {
    /// Rectangle spanned by two opposite corners.
    #[must_use]
    pub fn from_corners(a: ImagePoint, b: ImagePoint) -> Self {
        Self {
            x: a.image_x.min(b.image_x),
            y: a.image_y.min(b.image_y),
            width: (b.image_x - a.image_x).abs(),
            height: (b.image_y - a.image_y).abs(),
        }
    }

    /// The four corners, clockwise from the top-left.
    #[must_use]
    pub fn corners(&self) -> [ImagePoint; 4] {
        let right = self.x + self.width;
        let bottom = self.y + self.height;
        [
            ImagePoint::new(self.x, self.y),
            ImagePoint::new(right, self.y),
            ImagePoint::new(right, bottom),
            ImagePoint::new(self.x, bottom),
        ]
    }
}

/// Errors that can occur while authoring or compositing masks.
///
/// Uses custom `Serialize`/`Deserialize` because `image::ImageError`
/// does not implement serde traits.
#[derive(Debug, thiserror::Error)]
pub enum MaskError {
    /// Failed to decode a mask or base image.
    #[error("failed to decode image: {0}")]
    ImageDecode(#[from] image::ImageError),

    /// A decode failure carried across a serialization boundary, where
    /// only the message survives.
    #[error("failed to decode image: {0}")]
    Decode(String),

    /// The input image bytes were empty.
    #[error("input image data is empty")]
    EmptyInput,

    /// A bitmap was requested with a zero-sized side.
    #[error("invalid dimensions {width}x{height}")]
    InvalidDimensions {
        /// Requested width.
        width: u32,
        /// Requested height.
        height: u32,
    },

    /// An alpha buffer did not match its declared dimensions.
    #[error("alpha buffer has {actual} bytes, expected {expected}")]
    AlphaLength {
        /// `width * height`.
        expected: u64,
        /// Bytes supplied.
        actual: u64,
    },

    /// Display geometry parameters are unusable (non-finite or non-positive).
    #[error("invalid display geometry: {0}")]
    InvalidGeometry(String),

    /// PNG encoding of the exported mask failed.
    #[error("PNG encoding failed: {0}")]
    PngEncode(String),
}

/// Serde-compatible proxy for `MaskError`.
#[derive(Serialize, Deserialize)]
enum MaskErrorProxy {
    ImageDecode(String),
    Decode(String),
    EmptyInput,
    InvalidDimensions { width: u32, height: u32 },
    AlphaLength { expected: u64, actual: u64 },
    InvalidGeometry(String),
    PngEncode(String),
}

impl Serialize for MaskError {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let proxy = match self {
            Self::ImageDecode(e) => MaskErrorProxy::ImageDecode(e.to_string()),
            Self::Decode(s) => MaskErrorProxy::Decode(s.clone()),
            Self::EmptyInput => MaskErrorProxy::EmptyInput,
            Self::InvalidDimensions { width, height } => MaskErrorProxy::InvalidDimensions {
                width: *width,
                height: *height,
            },
            Self::AlphaLength { expected, actual } => MaskErrorProxy::AlphaLength {
                expected: *expected,
                actual: *actual,
            },
            Self::InvalidGeometry(s) => MaskErrorProxy::InvalidGeometry(s.clone()),
            Self::PngEncode(s) => MaskErrorProxy::PngEncode(s.clone()),
        };
        proxy.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for MaskError {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let proxy = MaskErrorProxy::deserialize(deserializer)?;
        Ok(match proxy {
            // The typed `image::ImageError` cannot be rebuilt; keep the message.
            MaskErrorProxy::ImageDecode(msg) | MaskErrorProxy::Decode(msg) => Self::Decode(msg),
            MaskErrorProxy::EmptyInput => Self::EmptyInput,
            MaskErrorProxy::InvalidDimensions { width, height } => {
                Self::InvalidDimensions { width, height }
            }
            MaskErrorProxy::AlphaLength { expected, actual } => {
                Self::AlphaLength { expected, actual }
            }
            MaskErrorProxy::InvalidGeometry(s) => Self::InvalidGeometry(s),
            MaskErrorProxy::PngEncode(s) => Self::PngEncode(s),
        })
    }
}
