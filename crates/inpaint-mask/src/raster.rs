//! Stroke rasterization into the exported binary mask.
//!
//! Strokes are painted in insertion order onto a white canvas at the
//! base image's natural resolution. `include` strokes paint black,
//! `exclude` strokes paint white, so an eraser pass is literal
//! overpainting and the latest stroke wins at every pixel.
//!
//! Rendering goes through `tiny-skia` with anti-aliasing disabled, so
//! every output pixel is exactly 0 or 255.

use tiny_skia::{
    Color, FillRule, LineCap, LineJoin, Mask, Paint, Path, PathBuilder, Pixmap, Stroke as Outline,
    Transform,
};

use crate::types::{Dimensions, GrayImage, MaskError, Polarity, Stroke};

/// Render `strokes` into a `natural.width × natural.height` binary mask.
///
/// White (255) is background, black (0) is the region to regenerate.
/// Each stroke is rescaled from its capture frame to `natural` here,
/// at render time, and its line width scales by the mean of the two
/// axis factors. Closed strokes are filled black and then stroked at
/// full brush width. Rectangle strokes clip that outline to their own
/// interior, so a rectangle covers exactly the box it encloses. Strokes
/// with fewer than two points paint nothing.
///
/// # Errors
///
/// Returns [`MaskError::InvalidDimensions`] if `natural` is empty.
pub fn render(strokes: &[Stroke], natural: Dimensions) -> Result<GrayImage, MaskError> {
    let natural = natural.validate()?;
    let mut pixmap = Pixmap::new(natural.width, natural.height).ok_or(
        MaskError::InvalidDimensions {
            width: natural.width,
            height: natural.height,
        },
    )?;
    pixmap.fill(Color::WHITE);

    for stroke in strokes {
        paint_stroke(&mut pixmap, stroke, natural);
    }

    Ok(pixmap_to_binary(&pixmap))
}

fn paint_stroke(pixmap: &mut Pixmap, stroke: &Stroke, natural: Dimensions) {
    let (scale_x, scale_y) = stroke.scale_to(natural);
    let Some(path) = build_path(stroke, scale_x, scale_y) else {
        return;
    };

    let outline = Outline {
        width: line_width(stroke.brush_size(), scale_x, scale_y),
        line_cap: LineCap::Round,
        line_join: LineJoin::Round,
        ..Outline::default()
    };
    let paint = solid_paint(stroke.polarity());

    if stroke.is_closed() {
        pixmap.fill_path(
            &path,
            &solid_paint(Polarity::Include),
            FillRule::Winding,
            Transform::identity(),
            None,
        );
    }
    let clip = if stroke.clips_outline() {
        interior_mask(&path, natural)
    } else {
        None
    };
    pixmap.stroke_path(&path, &paint, &outline, Transform::identity(), clip.as_ref());
}

#[allow(clippy::cast_possible_truncation)]
fn build_path(stroke: &Stroke, scale_x: f64, scale_y: f64) -> Option<Path> {
    let (first, rest) = stroke.points().split_first()?;
    if rest.is_empty() {
        return None;
    }
    let mut pb = PathBuilder::new();
    pb.move_to(
        (first.image_x * scale_x) as f32,
        (first.image_y * scale_y) as f32,
    );
    for p in rest {
        pb.line_to((p.image_x * scale_x) as f32, (p.image_y * scale_y) as f32);
    }
    if stroke.is_closed() {
        pb.close();
    }
    pb.finish()
}

#[allow(clippy::cast_possible_truncation)]
fn line_width(brush_size: u32, scale_x: f64, scale_y: f64) -> f32 {
    (f64::from(brush_size) * f64::midpoint(scale_x, scale_y)) as f32
}

fn solid_paint(polarity: Polarity) -> Paint<'static> {
    let v = polarity.luma();
    let mut paint = Paint::default();
    paint.set_color_rgba8(v, v, v, 255);
    paint.anti_alias = false;
    paint
}

/// Clip mask covering the inside of a closed path.
fn interior_mask(path: &Path, natural: Dimensions) -> Option<Mask> {
    let mut mask = Mask::new(natural.width, natural.height)?;
    mask.fill_path(path, FillRule::Winding, false, Transform::identity());
    Some(mask)
}

/// Collapse the opaque RGBA pixmap to a single 0/255 channel.
fn pixmap_to_binary(pixmap: &Pixmap) -> GrayImage {
    let data = pixmap.data();
    GrayImage::from_fn(pixmap.width(), pixmap.height(), |x, y| {
        let off = (y as usize * pixmap.width() as usize + x as usize) * 4;
        image::Luma([if data[off] >= 128 { 255 } else { 0 }])
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::types::ImagePoint;

    const SIZE: Dimensions = Dimensions::new(40, 40);

    fn p(x: f64, y: f64) -> ImagePoint {
        ImagePoint::new(x, y)
    }

    fn square(x0: f64, y0: f64, x1: f64, y1: f64) -> Stroke {
        Stroke::rectangle(
            vec![p(x0, y0), p(x1, y0), p(x1, y1), p(x0, y1)],
            2,
            Polarity::Include,
            SIZE,
        )
    }

    fn black_pixels(img: &GrayImage) -> usize {
        img.pixels().filter(|px| px.0[0] == 0).count()
    }

    #[test]
    fn no_strokes_renders_all_white() {
        let img = render(&[], SIZE).unwrap();
        assert_eq!(img.dimensions(), (40, 40));
        assert!(img.pixels().all(|px| px.0[0] == 255));
    }

    #[test]
    fn empty_dimensions_are_rejected() {
        let result = render(&[], Dimensions::new(0, 10));
        assert!(matches!(result, Err(MaskError::InvalidDimensions { .. })));
    }

    #[test]
    fn output_is_strictly_binary() {
        let strokes = vec![
            Stroke::open(vec![p(3.3, 4.1), p(31.7, 22.9)], 7, Polarity::Include, SIZE),
            Stroke::open(vec![p(0.0, 39.0), p(39.0, 0.0)], 3, Polarity::Exclude, SIZE),
        ];
        let img = render(&strokes, SIZE).unwrap();
        assert!(img.pixels().all(|px| px.0[0] == 0 || px.0[0] == 255));
        assert!(black_pixels(&img) > 0);
    }

    #[test]
    fn closed_square_fills_exactly_its_interior() {
        let img = render(&[square(10.0, 10.0, 30.0, 30.0)], SIZE).unwrap();
        for (x, y, px) in img.enumerate_pixels() {
            let inside = (10..30).contains(&x) && (10..30).contains(&y);
            assert_eq!(px.0[0] == 0, inside, "pixel ({x}, {y})");
        }
    }

    fn lasso(points: Vec<ImagePoint>, brush_size: u32) -> Stroke {
        Stroke::closed(points, brush_size, Polarity::Include, SIZE)
    }

    #[test]
    fn lasso_outline_extends_past_its_fill() {
        let corners = || vec![p(10.0, 10.0), p(30.0, 10.0), p(30.0, 30.0), p(10.0, 30.0)];
        let thin = render(&[lasso(corners(), 1)], SIZE).unwrap();
        let thick = render(&[lasso(corners(), 10)], SIZE).unwrap();

        assert!(black_pixels(&thick) > black_pixels(&thin));
        assert_eq!(thin.get_pixel(20, 20).0[0], 0);
        assert_eq!(thick.get_pixel(20, 20).0[0], 0);
        // Half the brush reaches outside the left edge.
        assert_eq!(thin.get_pixel(6, 20).0[0], 255);
        assert_eq!(thick.get_pixel(6, 20).0[0], 0);
        assert_eq!(thick.get_pixel(2, 20).0[0], 255);
    }

    #[test]
    fn degenerate_lasso_still_paints_its_outline() {
        // Collinear points enclose no area; the brush band remains.
        let img = render(&[lasso(vec![p(5.0, 20.0), p(20.0, 20.0), p(35.0, 20.0)], 4)], SIZE)
            .unwrap();
        assert_eq!(img.get_pixel(20, 20).0[0], 0);
        assert_eq!(img.get_pixel(20, 18).0[0], 0);
        assert_eq!(img.get_pixel(20, 25).0[0], 255);
        assert!(black_pixels(&img) >= 120);
    }

    #[test]
    fn single_point_stroke_paints_nothing() {
        let strokes = vec![Stroke::open(vec![p(20.0, 20.0)], 10, Polarity::Include, SIZE)];
        let img = render(&strokes, SIZE).unwrap();
        assert_eq!(black_pixels(&img), 0);
    }

    #[test]
    fn eraser_overpaints_earlier_strokes() {
        let strokes = vec![
            square(10.0, 10.0, 30.0, 30.0),
            Stroke::open(vec![p(0.0, 20.0), p(40.0, 20.0)], 4, Polarity::Exclude, SIZE),
        ];
        let img = render(&strokes, SIZE).unwrap();
        for (x, y, px) in img.enumerate_pixels() {
            let in_square = (10..30).contains(&x) && (10..30).contains(&y);
            let in_band = (18..22).contains(&y);
            let expect_black = in_square && !in_band;
            assert_eq!(px.0[0] == 0, expect_black, "pixel ({x}, {y})");
        }
    }

    #[test]
    fn later_include_wins_over_earlier_exclude() {
        let strokes = vec![
            Stroke::open(vec![p(0.0, 20.0), p(40.0, 20.0)], 4, Polarity::Exclude, SIZE),
            square(10.0, 10.0, 30.0, 30.0),
        ];
        let img = render(&strokes, SIZE).unwrap();
        assert_eq!(img.get_pixel(20, 20).0[0], 0);
        assert_eq!(black_pixels(&img), 400);
    }

    #[test]
    fn strokes_are_rescaled_from_capture_frame() {
        // Captured against a 20x20 frame, exported at 40x40.
        let stroke = Stroke::rectangle(
            vec![p(5.0, 5.0), p(15.0, 5.0), p(15.0, 15.0), p(5.0, 15.0)],
            1,
            Polarity::Include,
            Dimensions::new(20, 20),
        );
        let img = render(&[stroke], SIZE).unwrap();
        assert_eq!(black_pixels(&img), 400);
        assert_eq!(img.get_pixel(10, 10).0[0], 0);
        assert_eq!(img.get_pixel(29, 29).0[0], 0);
        assert_eq!(img.get_pixel(30, 30).0[0], 255);
    }

    #[test]
    fn rendering_is_deterministic() {
        let strokes = vec![
            Stroke::open(
                vec![p(1.5, 2.5), p(20.25, 30.75), p(35.0, 4.0)],
                6,
                Polarity::Include,
                SIZE,
            ),
            Stroke::closed(
                vec![p(5.0, 30.0), p(25.0, 35.0), p(12.0, 20.0)],
                3,
                Polarity::Exclude,
                SIZE,
            ),
        ];
        let a = render(&strokes, SIZE).unwrap();
        let b = render(&strokes, SIZE).unwrap();
        assert_eq!(a.as_raw(), b.as_raw());
    }
}
