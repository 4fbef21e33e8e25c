//! The mask authoring session: one explicit object owning every piece
//! of editor state.
//!
//! A [`MaskSession`] ties the coordinate mapper, stroke recorder,
//! segmentation proposals and selection together, and pushes a freshly
//! encoded PNG to its [`ExportSink`] every time the authored mask
//! changes. The host UI owns the session and feeds it pointer events
//! already reduced to optional display-space points.
//!
//! # Exported mask
//!
//! The exported mask comes from exactly one source at a time: the
//! stroke list, or the last merge of selected proposals. A merge
//! replaces the stroke rendering until the stroke list changes again.
//!
//! # Segmentation requests
//!
//! [`begin_segmentation`](MaskSession::begin_segmentation) hands out a
//! [`RequestToken`]. Results are only applied while that token is
//! current; [`reset`](MaskSession::reset) or a newer request makes it
//! stale and late results are dropped.
//!
//! # Geometry snapshots
//!
//! Container resizes and pan/zoom changes that arrive during a gesture
//! are parked and applied once the gesture ends, so one stroke is
//! always mapped with one geometry.

use std::collections::BTreeSet;
use std::time::Duration;

use image::ImageEncoder;
use serde::{Deserialize, Serialize};
use web_time::Instant;

use crate::composite;
use crate::geometry::{CoordinateMapper, DisplayTransform};
use crate::raster;
use crate::recorder::{
    Change, DEFAULT_BRUSH_SIZE, RECTANGLE_BRUSH_SIZE, StrokeRecorder, ToolPreset,
};
use crate::segmentation::{self, AlphaBuffer, MaskId, SegmentationMask};
use crate::throttle::Throttle;
use crate::types::{
    Dimensions, DrawMode, GrayImage, ImagePoint, MaskError, Point, RectSelection, Stroke, Tool,
};

/// Host-tunable session parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Initial (and post-reset) brush size, clamped to 1..=50.
    pub brush_size: u32,
    /// Outline width of rectangle strokes.
    pub rectangle_brush_size: u32,
    /// Minimum spacing of hover hit tests, in milliseconds.
    pub hover_interval_ms: u64,
    /// Minimum spacing of geometry recomputation on resize, in milliseconds.
    pub resize_interval_ms: u64,
    /// Host theme flag. Styling only; the engine ignores it.
    pub dark_mode: bool,
}

impl SessionConfig {
    /// Default brush size.
    pub const DEFAULT_BRUSH_SIZE: u32 = DEFAULT_BRUSH_SIZE;
    /// ~30 hover hit tests per second.
    pub const DEFAULT_HOVER_INTERVAL_MS: u64 = 33;
    /// ~10 geometry recomputations per second.
    pub const DEFAULT_RESIZE_INTERVAL_MS: u64 = 100;
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            brush_size: Self::DEFAULT_BRUSH_SIZE,
            rectangle_brush_size: RECTANGLE_BRUSH_SIZE,
            hover_interval_ms: Self::DEFAULT_HOVER_INTERVAL_MS,
            resize_interval_ms: Self::DEFAULT_RESIZE_INTERVAL_MS,
            dark_mode: false,
        }
    }
}

/// Where the current exported mask came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExportSource {
    /// Rendered from the stroke list.
    Strokes,
    /// Union of merged segmentation proposals.
    Merged,
}

/// The authored mask at natural resolution: white background, black
/// region to regenerate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportedMask {
    image: GrayImage,
    source: ExportSource,
}

impl ExportedMask {
    /// The mask bitmap.
    #[must_use]
    pub const fn image(&self) -> &GrayImage {
        &self.image
    }

    /// Which source produced it.
    #[must_use]
    pub const fn source(&self) -> ExportSource {
        self.source
    }

    /// Number of black (included) pixels.
    #[must_use]
    pub fn included_pixels(&self) -> usize {
        self.image.pixels().filter(|px| px.0[0] == 0).count()
    }

    /// Encode as an 8-bit grayscale PNG.
    ///
    /// # Errors
    ///
    /// Returns [`MaskError::PngEncode`] if encoding fails.
    pub fn to_png(&self) -> Result<Vec<u8>, MaskError> {
        encode_png(&self.image)
    }
}

/// Encode a grayscale mask as PNG bytes.
///
/// # Errors
///
/// Returns [`MaskError::PngEncode`] if encoding fails.
pub fn encode_png(image: &GrayImage) -> Result<Vec<u8>, MaskError> {
    let mut png = Vec::new();
    image::codecs::png::PngEncoder::new(&mut png)
        .write_image(
            image.as_raw(),
            image.width(),
            image.height(),
            image::ExtendedColorType::L8,
        )
        .map_err(|e| MaskError::PngEncode(e.to_string()))?;
    Ok(png)
}

/// Receives the PNG-encoded mask after every change.
pub trait ExportSink {
    /// Called with the full current mask; there is no separate
    /// finalize step.
    fn mask_exported(&mut self, png: &[u8]);
}

impl<F: FnMut(&[u8])> ExportSink for F {
    fn mask_exported(&mut self, png: &[u8]) {
        self(png);
    }
}

/// Collects every export, oldest first.
impl ExportSink for Vec<Vec<u8>> {
    fn mask_exported(&mut self, png: &[u8]) {
        self.push(png.to_vec());
    }
}

/// Ties asynchronous segmentation results to the request that started
/// them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RequestToken {
    generation: u64,
}

impl RequestToken {
    /// The request generation.
    #[must_use]
    pub const fn generation(self) -> u64 {
        self.generation
    }
}

/// Editor state for one base image.
pub struct MaskSession<S: ExportSink> {
    config: SessionConfig,
    mapper: CoordinateMapper,
    recorder: StrokeRecorder,
    masks: Vec<SegmentationMask>,
    selection: BTreeSet<MaskId>,
    hovered: Option<MaskId>,
    exported: ExportedMask,
    generation: u64,
    busy: bool,
    hover_throttle: Throttle,
    resize_throttle: Throttle,
    pending_container: Option<Dimensions>,
    pending_transform: Option<DisplayTransform>,
    sink: S,
}

impl<S: ExportSink> MaskSession<S> {
    /// Start a session for a base image of size `natural` displayed in
    /// `container`. The initial blank mask is exported immediately.
    ///
    /// # Errors
    ///
    /// Returns [`MaskError::InvalidDimensions`] if either size is empty,
    /// or [`MaskError::PngEncode`] if the initial export fails.
    pub fn new(
        natural: Dimensions,
        container: Dimensions,
        config: SessionConfig,
        sink: S,
    ) -> Result<Self, MaskError> {
        let mapper = CoordinateMapper::new(natural, container)?;
        let recorder = StrokeRecorder::new(config.brush_size, config.rectangle_brush_size);
        let exported = ExportedMask {
            image: raster::render(&[], natural)?,
            source: ExportSource::Strokes,
        };
        let mut session = Self {
            hover_throttle: Throttle::new(Duration::from_millis(config.hover_interval_ms)),
            resize_throttle: Throttle::new(Duration::from_millis(config.resize_interval_ms)),
            config,
            mapper,
            recorder,
            masks: Vec::new(),
            selection: BTreeSet::new(),
            hovered: None,
            exported,
            generation: 0,
            busy: false,
            pending_container: None,
            pending_transform: None,
            sink,
        };
        session.export()?;
        Ok(session)
    }

    // --- Accessors ---

    /// Session configuration.
    #[must_use]
    pub const fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Coordinate mapper (current geometry snapshot).
    #[must_use]
    pub const fn mapper(&self) -> &CoordinateMapper {
        &self.mapper
    }

    /// Natural size of the base image.
    #[must_use]
    pub const fn natural(&self) -> Dimensions {
        self.mapper.natural()
    }

    /// Recorded strokes, oldest first.
    #[must_use]
    pub fn strokes(&self) -> &[Stroke] {
        self.recorder.strokes()
    }

    /// Stroke recorder (tool, mode, brush and gesture state).
    #[must_use]
    pub const fn recorder(&self) -> &StrokeRecorder {
        &self.recorder
    }

    /// Live rectangle selection for the overlay.
    #[must_use]
    pub const fn rect_selection(&self) -> Option<RectSelection> {
        self.recorder.selection()
    }

    /// Current segmentation proposals, decoded or not.
    #[must_use]
    pub fn masks(&self) -> &[SegmentationMask] {
        &self.masks
    }

    /// Proposals chosen for merging.
    #[must_use]
    pub const fn selected(&self) -> &BTreeSet<MaskId> {
        &self.selection
    }

    /// Proposal under the pointer at the last hover test.
    #[must_use]
    pub const fn hovered(&self) -> Option<MaskId> {
        self.hovered
    }

    /// The current exported mask.
    #[must_use]
    pub const fn exported(&self) -> &ExportedMask {
        &self.exported
    }

    /// Whether a segmentation request is in flight.
    #[must_use]
    pub const fn is_busy(&self) -> bool {
        self.busy
    }

    /// The export sink.
    #[must_use]
    pub const fn sink(&self) -> &S {
        &self.sink
    }

    /// Whether `token` belongs to the latest segmentation request.
    #[must_use]
    pub const fn is_current(&self, token: RequestToken) -> bool {
        token.generation == self.generation
    }

    // --- Pointer ---

    /// Pointer pressed at `pointer` (display space).
    ///
    /// In free and lasso mode a press over a decoded proposal toggles
    /// that proposal's selection instead of starting a stroke.
    ///
    /// # Errors
    ///
    /// Returns [`MaskError::PngEncode`] if re-exporting fails.
    pub fn pointer_down(&mut self, pointer: Option<Point>) -> Result<(), MaskError> {
        let Some(point) = self.mapper.to_image_space(pointer) else {
            return Ok(());
        };
        if self.recorder.mode() != DrawMode::Rectangle
            && !self.recorder.is_drawing()
            && let Some(id) = segmentation::hit_test(point, &self.masks, self.natural())
        {
            self.toggle_mask(id);
            return Ok(());
        }
        let change = self.recorder.pointer_down(point, self.natural());
        self.apply(change)
    }

    /// Pointer moved to `pointer` at time `now`.
    ///
    /// Extends the gesture in progress; otherwise runs a throttled hover
    /// hit test.
    ///
    /// # Errors
    ///
    /// Returns [`MaskError::PngEncode`] if re-exporting fails.
    pub fn pointer_move(&mut self, pointer: Option<Point>, now: Instant) -> Result<(), MaskError> {
        let point = self.mapper.to_image_space(pointer);
        if self.recorder.is_drawing() {
            let Some(point) = point else {
                return Ok(());
            };
            let change = self.recorder.pointer_move(point);
            return self.apply(change);
        }
        if self.hover_throttle.ready(now) {
            self.hovered =
                point.and_then(|p| segmentation::hit_test(p, &self.masks, self.natural()));
        }
        Ok(())
    }

    /// Pointer released.
    ///
    /// # Errors
    ///
    /// Returns [`MaskError::PngEncode`] if re-exporting fails, or
    /// [`MaskError::InvalidDimensions`] if a parked resize is invalid.
    pub fn pointer_up(&mut self) -> Result<(), MaskError> {
        let change = self.recorder.pointer_up();
        self.apply_parked_geometry()?;
        self.apply(change)
    }

    // --- Tools ---

    /// Switch tool; finalizes a gesture in progress.
    ///
    /// # Errors
    ///
    /// Returns [`MaskError::PngEncode`] if re-exporting fails.
    pub fn set_tool(&mut self, tool: Tool) -> Result<(), MaskError> {
        let change = self.recorder.set_tool(tool);
        self.apply(change)
    }

    /// Switch mode; finalizes a gesture in progress.
    ///
    /// # Errors
    ///
    /// Returns [`MaskError::PngEncode`] if re-exporting fails.
    pub fn set_mode(&mut self, mode: DrawMode) -> Result<(), MaskError> {
        let change = self.recorder.set_mode(mode);
        self.apply(change)
    }

    /// Apply a toolbar preset; finalizes a gesture in progress.
    ///
    /// # Errors
    ///
    /// Returns [`MaskError::PngEncode`] if re-exporting fails.
    pub fn apply_preset(&mut self, preset: ToolPreset) -> Result<(), MaskError> {
        let change = self.recorder.apply_preset(preset);
        self.apply(change)
    }

    /// Set the brush size for subsequent strokes.
    pub fn set_brush_size(&mut self, size: u32) {
        self.recorder.set_brush_size(size);
    }

    // --- Geometry ---

    /// The container was resized to `container` at time `now`.
    ///
    /// Recomputation is throttled; a skipped size is kept and applied by
    /// [`flush_resize`](Self::flush_resize) or the end of the current
    /// gesture. Returns whether the geometry changed now.
    ///
    /// # Errors
    ///
    /// Returns [`MaskError::InvalidDimensions`] if `container` is empty.
    pub fn resize(&mut self, container: Dimensions, now: Instant) -> Result<bool, MaskError> {
        container.validate()?;
        self.pending_container = Some(container);
        self.flush_resize(now)
    }

    /// Apply a parked container size if the throttle interval allows.
    ///
    /// # Errors
    ///
    /// Returns [`MaskError::InvalidDimensions`] if the parked size is empty.
    pub fn flush_resize(&mut self, now: Instant) -> Result<bool, MaskError> {
        if self.pending_container.is_none()
            || self.recorder.is_drawing()
            || !self.resize_throttle.ready(now)
        {
            return Ok(false);
        }
        if let Some(container) = self.pending_container.take() {
            self.mapper.refit(container)?;
            log::debug!(
                "display geometry refit to {}x{}: scale {:.4}",
                container.width,
                container.height,
                self.mapper.geometry().scale
            );
        }
        Ok(true)
    }

    /// Set the host pan/zoom. Parked until the gesture ends if drawing.
    ///
    /// # Errors
    ///
    /// Returns [`MaskError::InvalidGeometry`] for a non-positive zoom or
    /// non-finite offsets.
    pub fn set_transform(&mut self, transform: DisplayTransform) -> Result<(), MaskError> {
        if self.recorder.is_drawing() {
            // Validate now so a bad transform is reported to its caller.
            self.mapper.clone().set_transform(transform)?;
            self.pending_transform = Some(transform);
            return Ok(());
        }
        self.mapper.set_transform(transform)
    }

    /// The base image was replaced by one of size `natural` (for
    /// example a full-resolution upscale). Proposals are discarded
    /// since they describe the old image; strokes are kept and the
    /// mask is re-rendered at the new size. Ends any gesture first.
    ///
    /// # Errors
    ///
    /// Returns [`MaskError::InvalidDimensions`] if `natural` is empty, or
    /// [`MaskError::PngEncode`] if re-exporting fails.
    pub fn set_natural(&mut self, natural: Dimensions) -> Result<(), MaskError> {
        natural.validate()?;
        self.recorder.pointer_up();
        self.apply_parked_geometry()?;
        self.mapper.set_natural(natural)?;
        self.generation += 1;
        self.masks.clear();
        self.selection.clear();
        self.hovered = None;
        self.busy = false;
        self.rerender()
    }

    fn apply_parked_geometry(&mut self) -> Result<(), MaskError> {
        if let Some(transform) = self.pending_transform.take() {
            self.mapper.set_transform(transform)?;
        }
        if let Some(container) = self.pending_container.take() {
            self.mapper.refit(container)?;
        }
        Ok(())
    }

    // --- Selection / merge ---

    /// Toggle `id` in the merge selection. Returns whether it is now
    /// selected. Unknown or undecoded ids are ignored.
    pub fn toggle_mask(&mut self, id: MaskId) -> bool {
        if !self.masks.iter().any(|m| m.id() == id && m.is_decoded()) {
            return false;
        }
        if self.selection.remove(&id) {
            log::debug!("deselected {id}");
            false
        } else {
            self.selection.insert(id);
            log::debug!("selected {id}");
            true
        }
    }

    /// Replace the exported mask with the union of the selected
    /// proposals and clear the selection.
    ///
    /// Returns `false` without exporting when nothing is selected.
    ///
    /// # Errors
    ///
    /// Returns [`MaskError::PngEncode`] if exporting fails.
    pub fn confirm_merge(&mut self) -> Result<bool, MaskError> {
        if self.selection.is_empty() {
            return Ok(false);
        }
        let selected: Vec<&SegmentationMask> = self
            .masks
            .iter()
            .filter(|m| self.selection.contains(&m.id()))
            .collect();
        let image = composite::merge(&selected, self.natural())?;
        log::debug!("merged {} proposals", selected.len());
        self.exported = ExportedMask {
            image,
            source: ExportSource::Merged,
        };
        self.selection.clear();
        self.export()?;
        Ok(true)
    }

    // --- Segmentation ---

    /// Start a new segmentation request: discards the current proposals
    /// and selection, marks the session busy and returns the token
    /// results must carry.
    pub fn begin_segmentation(&mut self) -> RequestToken {
        self.generation += 1;
        self.masks.clear();
        self.selection.clear();
        self.hovered = None;
        self.busy = true;
        RequestToken {
            generation: self.generation,
        }
    }

    /// The service returned proposal URLs; register them as pending.
    /// Identifiers are the URL positions. Returns `false` if stale.
    pub fn accept_mask_urls(&mut self, token: RequestToken, urls: &[String]) -> bool {
        if !self.guard(token, "mask list") {
            return false;
        }
        self.masks = urls
            .iter()
            .zip(0_u32..)
            .map(|(url, i)| SegmentationMask::pending(MaskId(i), url.clone()))
            .collect();
        true
    }

    /// One proposal finished decoding. Returns `false` if stale or the
    /// id is unknown.
    pub fn accept_decoded_mask(
        &mut self,
        token: RequestToken,
        id: MaskId,
        alpha: AlphaBuffer,
    ) -> bool {
        if !self.guard(token, "decoded mask") {
            return false;
        }
        match self.masks.iter_mut().find(|m| m.id() == id) {
            Some(mask) => {
                mask.set_alpha(alpha);
                true
            }
            None => {
                log::warn!("decoded alpha for unknown {id}, ignoring");
                false
            }
        }
    }

    /// The request completed with `masks`; replaces the proposal set and
    /// ends the busy state. Returns `false` if stale.
    pub fn accept_masks(&mut self, token: RequestToken, masks: Vec<SegmentationMask>) -> bool {
        if !self.guard(token, "segmentation result") {
            return false;
        }
        self.masks = masks;
        self.busy = false;
        true
    }

    /// End the busy state of the current request without proposals
    /// (submission rejected, polling timed out, ...). Stale tokens are
    /// ignored.
    pub fn finish_segmentation(&mut self, token: RequestToken) {
        if self.guard(token, "segmentation completion") {
            self.busy = false;
        }
    }

    fn guard(&self, token: RequestToken, what: &str) -> bool {
        let current = self.is_current(token);
        if !current {
            log::warn!(
                "dropping stale {what} from request {} (current {})",
                token.generation,
                self.generation
            );
        }
        current
    }

    // --- Reset ---

    /// Clear strokes, selections and proposals, restore the default
    /// tool, invalidate in-flight requests and export a blank mask.
    ///
    /// # Errors
    ///
    /// Returns [`MaskError::PngEncode`] if exporting fails.
    pub fn reset(&mut self) -> Result<(), MaskError> {
        self.recorder.reset();
        self.generation += 1;
        self.masks.clear();
        self.selection.clear();
        self.hovered = None;
        self.busy = false;
        self.hover_throttle.reset();
        self.apply_parked_geometry()?;
        self.rerender()
    }

    // --- Internals ---

    fn apply(&mut self, change: Change) -> Result<(), MaskError> {
        match change {
            Change::Strokes => self.rerender(),
            Change::Selection | Change::None => Ok(()),
        }
    }

    fn rerender(&mut self) -> Result<(), MaskError> {
        self.exported = ExportedMask {
            image: raster::render(self.recorder.strokes(), self.natural())?,
            source: ExportSource::Strokes,
        };
        self.export()
    }

    fn export(&mut self) -> Result<(), MaskError> {
        let png = self.exported.to_png()?;
        self.sink.mask_exported(&png);
        Ok(())
    }
}

/// Convenience for hosts that want to hit-test without a session.
#[must_use]
pub fn mask_at(
    mapper: &CoordinateMapper,
    pointer: Option<Point>,
    masks: &[SegmentationMask],
) -> Option<MaskId> {
    let point: ImagePoint = mapper.to_image_space(pointer)?;
    segmentation::hit_test(point, masks, mapper.natural())
}
