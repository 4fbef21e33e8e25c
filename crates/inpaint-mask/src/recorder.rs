//! Stroke capture: a per-gesture state machine over image-space points.
//!
//! ```text
//!            down (free)          up
//!   Idle ─────────────────► DrawingFree ──────► Idle
//!     │      down (lasso)        up (>2 pts: close loop)
//!     ├───────────────────► DrawingLasso ─────► Idle
//!     │      down (rect)         up (emit closed 4-corner stroke)
//!     └───────────────────► DrawingRect ──────► Idle
//! ```
//!
//! Every event reports a [`Change`] so the owner knows whether the
//! exported mask must be re-rendered ([`Change::Strokes`]) or only the
//! live overlay moved ([`Change::Selection`]).

use crate::types::{Dimensions, DrawMode, ImagePoint, Polarity, RectSelection, Stroke, Tool};

/// Smallest selectable brush size.
pub const MIN_BRUSH_SIZE: u32 = 1;
/// Largest selectable brush size.
pub const MAX_BRUSH_SIZE: u32 = 50;
/// Brush size used until the user picks another.
pub const DEFAULT_BRUSH_SIZE: u32 = 10;
/// Outline width of strokes emitted by the rectangle tool.
pub const RECTANGLE_BRUSH_SIZE: u32 = 2;

/// Recorder state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecorderState {
    /// No gesture in progress.
    Idle,
    /// Recording an open freehand stroke.
    DrawingFree,
    /// Recording a lasso outline.
    DrawingLasso,
    /// Dragging a rectangle selection.
    DrawingRect,
}

/// What an event changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Change {
    /// Nothing observable.
    None,
    /// Only the ephemeral rectangle selection.
    Selection,
    /// The stroke list (the exported mask is stale).
    Strokes,
}

impl Change {
    /// Combine two changes, keeping the more significant one.
    #[must_use]
    pub const fn and(self, other: Self) -> Self {
        match (self, other) {
            (Self::Strokes, _) | (_, Self::Strokes) => Self::Strokes,
            (Self::Selection, _) | (_, Self::Selection) => Self::Selection,
            (Self::None, Self::None) => Self::None,
        }
    }
}

/// Toolbar presets: each button picks a tool and a mode together.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolPreset {
    /// Brush tool, free mode.
    Brush,
    /// Eraser tool, free mode.
    Eraser,
    /// Free mode, brush tool.
    FreeDraw,
    /// Lasso mode, brush tool.
    Lasso,
    /// Rectangle mode, brush tool.
    Rectangle,
}

impl ToolPreset {
    /// The `(tool, mode)` pair this preset selects.
    #[must_use]
    pub const fn selection(self) -> (Tool, DrawMode) {
        match self {
            Self::Brush | Self::FreeDraw => (Tool::Brush, DrawMode::Free),
            Self::Eraser => (Tool::Eraser, DrawMode::Free),
            Self::Lasso => (Tool::Brush, DrawMode::Lasso),
            Self::Rectangle => (Tool::Brush, DrawMode::Rectangle),
        }
    }
}

/// Captures pointer gestures into an insertion-ordered stroke list.
#[derive(Debug, Clone)]
pub struct StrokeRecorder {
    strokes: Vec<Stroke>,
    state: RecorderState,
    tool: Tool,
    mode: DrawMode,
    brush_size: u32,
    default_brush_size: u32,
    rectangle_brush_size: u32,
    anchor: Option<ImagePoint>,
    selection: Option<RectSelection>,
    frame: Dimensions,
}

impl StrokeRecorder {
    /// Create an idle recorder with the brush tool in free mode.
    ///
    /// `brush_size` is clamped to [`MIN_BRUSH_SIZE`]..=[`MAX_BRUSH_SIZE`].
    #[must_use]
    pub fn new(brush_size: u32, rectangle_brush_size: u32) -> Self {
        let brush_size = brush_size.clamp(MIN_BRUSH_SIZE, MAX_BRUSH_SIZE);
        Self {
            strokes: Vec::new(),
            state: RecorderState::Idle,
            tool: Tool::default(),
            mode: DrawMode::default(),
            brush_size,
            default_brush_size: brush_size,
            rectangle_brush_size: rectangle_brush_size.max(1),
            anchor: None,
            selection: None,
            frame: Dimensions::new(0, 0),
        }
    }

    /// All recorded strokes, oldest first.
    #[must_use]
    pub fn strokes(&self) -> &[Stroke] {
        &self.strokes
    }

    /// Current state.
    #[must_use]
    pub const fn state(&self) -> RecorderState {
        self.state
    }

    /// Whether a gesture is in progress.
    #[must_use]
    pub fn is_drawing(&self) -> bool {
        self.state != RecorderState::Idle
    }

    /// Active tool.
    #[must_use]
    pub const fn tool(&self) -> Tool {
        self.tool
    }

    /// Active mode.
    #[must_use]
    pub const fn mode(&self) -> DrawMode {
        self.mode
    }

    /// Brush size for free and lasso strokes.
    #[must_use]
    pub const fn brush_size(&self) -> u32 {
        self.brush_size
    }

    /// The live rectangle selection, if dragging one.
    #[must_use]
    pub const fn selection(&self) -> Option<RectSelection> {
        self.selection
    }

    /// Set the brush size, clamped to the selectable range.
    ///
    /// Strokes already recorded keep their size.
    pub fn set_brush_size(&mut self, size: u32) {
        self.brush_size = size.clamp(MIN_BRUSH_SIZE, MAX_BRUSH_SIZE);
    }

    /// Switch tool. A gesture in progress is finalized first.
    pub fn set_tool(&mut self, tool: Tool) -> Change {
        let change = self.finish_gesture();
        self.tool = tool;
        change
    }

    /// Switch mode. A gesture in progress is finalized first.
    pub fn set_mode(&mut self, mode: DrawMode) -> Change {
        let change = self.finish_gesture();
        self.mode = mode;
        change
    }

    /// Apply a toolbar preset.
    pub fn apply_preset(&mut self, preset: ToolPreset) -> Change {
        let change = self.finish_gesture();
        (self.tool, self.mode) = preset.selection();
        change
    }

    /// Begin a gesture at `point`, captured in the `frame` coordinate space.
    ///
    /// A press that arrives while a gesture is still open (a lost
    /// release) finalizes that gesture first.
    pub fn pointer_down(&mut self, point: ImagePoint, frame: Dimensions) -> Change {
        let finished = self.finish_gesture();
        self.frame = frame;
        let started = match self.mode {
            DrawMode::Free | DrawMode::Lasso => {
                self.strokes.push(Stroke::open(
                    vec![point],
                    self.brush_size,
                    self.tool.polarity(),
                    frame,
                ));
                self.state = if self.mode == DrawMode::Lasso {
                    RecorderState::DrawingLasso
                } else {
                    RecorderState::DrawingFree
                };
                Change::Strokes
            }
            DrawMode::Rectangle => {
                self.anchor = Some(point);
                self.selection = Some(RectSelection::from_corners(point, point));
                self.state = RecorderState::DrawingRect;
                Change::Selection
            }
        };
        log::debug!("gesture started: {:?} at {point:?}", self.state);
        finished.and(started)
    }

    /// Extend the gesture in progress. Ignored when idle.
    pub fn pointer_move(&mut self, point: ImagePoint) -> Change {
        match self.state {
            RecorderState::Idle => Change::None,
            RecorderState::DrawingFree | RecorderState::DrawingLasso => {
                match self.strokes.last_mut() {
                    Some(stroke) => {
                        stroke.push(point);
                        Change::Strokes
                    }
                    None => Change::None,
                }
            }
            RecorderState::DrawingRect => match self.anchor {
                Some(anchor) => {
                    self.selection = Some(RectSelection::from_corners(anchor, point));
                    Change::Selection
                }
                None => Change::None,
            },
        }
    }

    /// Finish the gesture in progress. Ignored when idle.
    pub fn pointer_up(&mut self) -> Change {
        self.finish_gesture()
    }

    /// Drop all strokes and ephemeral state and restore the default
    /// tool, mode and the brush size the recorder was created with.
    pub fn reset(&mut self) {
        self.strokes.clear();
        self.state = RecorderState::Idle;
        self.tool = Tool::default();
        self.mode = DrawMode::default();
        self.brush_size = self.default_brush_size;
        self.anchor = None;
        self.selection = None;
    }

    fn finish_gesture(&mut self) -> Change {
        let state = std::mem::replace(&mut self.state, RecorderState::Idle);
        let change = match state {
            RecorderState::Idle => Change::None,
            RecorderState::DrawingFree => Change::Strokes,
            RecorderState::DrawingLasso => {
                if let Some(stroke) = self.strokes.last_mut()
                    && stroke.points().len() > 2
                {
                    stroke.close();
                }
                Change::Strokes
            }
            RecorderState::DrawingRect => {
                self.anchor = None;
                match self.selection.take() {
                    Some(rect) => {
                        self.strokes.push(Stroke::rectangle(
                            rect.corners().to_vec(),
                            self.rectangle_brush_size,
                            Polarity::Include,
                            self.frame,
                        ));
                        Change::Strokes
                    }
                    None => Change::Selection,
                }
            }
        };
        if state != RecorderState::Idle {
            log::debug!("gesture finished: {state:?}, {} strokes", self.strokes.len());
        }
        change
    }
}

impl Default for StrokeRecorder {
    fn default() -> Self {
        Self::new(DEFAULT_BRUSH_SIZE, RECTANGLE_BRUSH_SIZE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FRAME: Dimensions = Dimensions::new(200, 200);

    fn p(x: f64, y: f64) -> ImagePoint {
        ImagePoint::new(x, y)
    }

    #[test]
    fn free_stroke_records_points_in_order() {
        let mut rec = StrokeRecorder::default();
        assert_eq!(rec.pointer_down(p(1.0, 1.0), FRAME), Change::Strokes);
        assert_eq!(rec.state(), RecorderState::DrawingFree);
        assert_eq!(rec.pointer_move(p(2.0, 2.0)), Change::Strokes);
        assert_eq!(rec.pointer_move(p(3.0, 2.0)), Change::Strokes);
        assert_eq!(rec.pointer_up(), Change::Strokes);

        assert_eq!(rec.state(), RecorderState::Idle);
        let stroke = &rec.strokes()[0];
        assert_eq!(stroke.points(), &[p(1.0, 1.0), p(2.0, 2.0), p(3.0, 2.0)]);
        assert!(!stroke.is_closed());
        assert_eq!(stroke.polarity(), Polarity::Include);
        assert_eq!(stroke.brush_size(), DEFAULT_BRUSH_SIZE);
        assert_eq!(stroke.frame(), FRAME);
    }

    #[test]
    fn eraser_strokes_exclude() {
        let mut rec = StrokeRecorder::default();
        rec.apply_preset(ToolPreset::Eraser);
        rec.pointer_down(p(0.0, 0.0), FRAME);
        rec.pointer_up();
        assert_eq!(rec.strokes()[0].polarity(), Polarity::Exclude);
    }

    #[test]
    fn move_and_up_while_idle_are_ignored() {
        let mut rec = StrokeRecorder::default();
        assert_eq!(rec.pointer_move(p(1.0, 1.0)), Change::None);
        assert_eq!(rec.pointer_up(), Change::None);
        assert!(rec.strokes().is_empty());
    }

    #[test]
    fn lasso_with_more_than_two_points_closes() {
        let mut rec = StrokeRecorder::default();
        rec.apply_preset(ToolPreset::Lasso);
        rec.pointer_down(p(0.0, 0.0), FRAME);
        rec.pointer_move(p(10.0, 0.0));
        rec.pointer_move(p(10.0, 10.0));
        rec.pointer_up();

        let stroke = &rec.strokes()[0];
        assert!(stroke.is_closed());
        assert!(!stroke.clips_outline());
        assert_eq!(stroke.points().len(), 4);
        assert_eq!(stroke.points()[3], p(0.0, 0.0));
    }

    #[test]
    fn degenerate_lasso_stays_open() {
        let mut rec = StrokeRecorder::default();
        rec.apply_preset(ToolPreset::Lasso);
        rec.pointer_down(p(0.0, 0.0), FRAME);
        rec.pointer_move(p(10.0, 0.0));
        rec.pointer_up();

        let stroke = &rec.strokes()[0];
        assert!(!stroke.is_closed());
        assert_eq!(stroke.points().len(), 2);
    }

    #[test]
    fn rectangle_drag_tracks_selection_in_any_direction() {
        let mut rec = StrokeRecorder::default();
        rec.apply_preset(ToolPreset::Rectangle);
        assert_eq!(rec.pointer_down(p(50.0, 60.0), FRAME), Change::Selection);
        assert_eq!(
            rec.selection(),
            Some(RectSelection {
                x: 50.0,
                y: 60.0,
                width: 0.0,
                height: 0.0
            })
        );
        assert_eq!(rec.pointer_move(p(20.0, 100.0)), Change::Selection);
        assert_eq!(
            rec.selection(),
            Some(RectSelection {
                x: 20.0,
                y: 60.0,
                width: 30.0,
                height: 40.0
            })
        );
        assert!(rec.strokes().is_empty());
    }

    #[test]
    fn rectangle_release_emits_closed_corner_stroke() {
        let mut rec = StrokeRecorder::default();
        rec.set_brush_size(33);
        rec.apply_preset(ToolPreset::Rectangle);
        rec.pointer_down(p(10.0, 10.0), FRAME);
        rec.pointer_move(p(30.0, 20.0));
        assert_eq!(rec.pointer_up(), Change::Strokes);

        assert!(rec.selection().is_none());
        let stroke = &rec.strokes()[0];
        assert!(stroke.is_closed());
        assert!(stroke.clips_outline());
        assert_eq!(stroke.brush_size(), RECTANGLE_BRUSH_SIZE);
        assert_eq!(stroke.polarity(), Polarity::Include);
        assert_eq!(
            stroke.points(),
            &[
                p(10.0, 10.0),
                p(30.0, 10.0),
                p(30.0, 20.0),
                p(10.0, 20.0),
                p(10.0, 10.0)
            ]
        );
    }

    #[test]
    fn rectangle_ignores_eraser_polarity() {
        let mut rec = StrokeRecorder::default();
        rec.set_mode(DrawMode::Rectangle);
        rec.set_tool(Tool::Eraser);
        rec.pointer_down(p(0.0, 0.0), FRAME);
        rec.pointer_move(p(5.0, 5.0));
        rec.pointer_up();
        assert_eq!(rec.strokes()[0].polarity(), Polarity::Include);
    }

    #[test]
    fn switching_mode_mid_gesture_finalizes_stroke() {
        let mut rec = StrokeRecorder::default();
        rec.apply_preset(ToolPreset::Lasso);
        rec.pointer_down(p(0.0, 0.0), FRAME);
        rec.pointer_move(p(10.0, 0.0));
        rec.pointer_move(p(10.0, 10.0));

        assert_eq!(rec.set_mode(DrawMode::Free), Change::Strokes);
        assert_eq!(rec.state(), RecorderState::Idle);
        assert!(rec.strokes()[0].is_closed());

        // Later moves do not extend the finalized stroke.
        assert_eq!(rec.pointer_move(p(20.0, 20.0)), Change::None);
        assert_eq!(rec.strokes()[0].points().len(), 4);
    }

    #[test]
    fn switching_tool_mid_rectangle_emits_it() {
        let mut rec = StrokeRecorder::default();
        rec.apply_preset(ToolPreset::Rectangle);
        rec.pointer_down(p(0.0, 0.0), FRAME);
        rec.pointer_move(p(4.0, 4.0));
        assert_eq!(rec.apply_preset(ToolPreset::Brush), Change::Strokes);
        assert_eq!(rec.strokes().len(), 1);
        assert!(rec.selection().is_none());
    }

    #[test]
    fn brush_size_is_clamped() {
        let mut rec = StrokeRecorder::default();
        rec.set_brush_size(0);
        assert_eq!(rec.brush_size(), MIN_BRUSH_SIZE);
        rec.set_brush_size(500);
        assert_eq!(rec.brush_size(), MAX_BRUSH_SIZE);
    }

    #[test]
    fn reset_clears_everything_and_restores_defaults() {
        let mut rec = StrokeRecorder::default();
        rec.apply_preset(ToolPreset::Eraser);
        rec.set_brush_size(3);
        rec.pointer_down(p(0.0, 0.0), FRAME);
        rec.reset();

        assert!(rec.strokes().is_empty());
        assert_eq!(rec.state(), RecorderState::Idle);
        assert_eq!(rec.tool(), Tool::Brush);
        assert_eq!(rec.mode(), DrawMode::Free);
        assert_eq!(rec.brush_size(), DEFAULT_BRUSH_SIZE);
    }

    #[test]
    fn presets_pair_tool_and_mode() {
        assert_eq!(ToolPreset::Eraser.selection(), (Tool::Eraser, DrawMode::Free));
        assert_eq!(ToolPreset::Lasso.selection(), (Tool::Brush, DrawMode::Lasso));
        assert_eq!(
            ToolPreset::Rectangle.selection(),
            (Tool::Brush, DrawMode::Rectangle)
        );
    }
}
