//! inpaint-mask: Interactive inpainting mask authoring engine (sans-IO).
//!
//! Turns pointer gestures over a displayed image into a binary mask at
//! the image's natural resolution, and composites AI segmentation
//! proposals into the same mask:
//!
//! pointer -> image space -> strokes -> rasterized mask -> PNG export
//!
//! Black (0) marks the region to regenerate, white (255) the region to
//! keep. Strokes are painted in order, so erasing is overpainting and
//! the latest stroke wins.
//!
//! This crate has **no I/O dependencies**: it consumes display-space
//! points, timestamps and decoded bytes, and hands PNG bytes to an
//! [`ExportSink`]. Talking to a segmentation service lives in
//! `inpaint-mask-client`.

pub mod composite;
pub mod geometry;
pub mod raster;
pub mod recorder;
pub mod segmentation;
pub mod session;
pub mod throttle;
pub mod types;

pub use geometry::{CoordinateMapper, DisplayGeometry, DisplayTransform};
pub use recorder::{RecorderState, StrokeRecorder, ToolPreset};
pub use segmentation::{ALPHA_THRESHOLD, AlphaBuffer, MaskId, SegmentationMask, hit_test};
pub use session::{
    ExportSink, ExportSource, ExportedMask, MaskSession, RequestToken, SessionConfig, encode_png,
};
pub use throttle::Throttle;
pub use types::{
    Dimensions, DrawMode, GrayImage, ImagePoint, MaskError, Point, Polarity, RectSelection,
    Stroke, Tool,
};
