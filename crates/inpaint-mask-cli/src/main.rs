//! Offline mask tooling: render saved strokes, merge segmentation
//! proposals and query which proposal sits under a point.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use inpaint_mask::{
    AlphaBuffer, Dimensions, ImagePoint, MaskId, SegmentationMask, Stroke, composite, encode_png,
    raster, segmentation,
};
use inpaint_mask_client::SamMaskRecord;
use serde::{Deserialize, Serialize};

/// Build binary inpainting masks (black = regenerate, white = keep).
#[derive(Parser)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Rasterize a stroke document into a mask PNG.
    Render {
        /// Stroke document (JSON).
        input: PathBuf,

        /// Output PNG path.
        #[arg(short, long)]
        output: PathBuf,

        /// Override the export size as "WxH" (defaults to the document's).
        #[arg(long, value_name = "WxH")]
        size: Option<String>,
    },
    /// Union segmentation proposals into a single mask PNG.
    Merge {
        #[command(flatten)]
        proposals: Proposals,

        /// Output PNG path.
        #[arg(short, long)]
        output: PathBuf,
    },
    /// Report the proposals covering a point and which one a click picks.
    Hit {
        #[command(flatten)]
        proposals: Proposals,

        /// Point in natural image coordinates as "X,Y".
        #[arg(long, value_name = "X,Y")]
        at: String,
    },
}

#[derive(Args)]
struct Proposals {
    /// Proposal files: PNG/JPEG/WebP images (alpha channel, or luminance
    /// when there is none) or JSON arrays of automatic-mask records.
    #[arg(required = true)]
    masks: Vec<PathBuf>,

    /// Natural size of the base image as "WxH".
    #[arg(long, value_name = "WxH")]
    size: String,
}

/// A saved editing session: the base image size and its strokes.
#[derive(Serialize, Deserialize)]
struct StrokeDocument {
    natural: Dimensions,
    strokes: Vec<Stroke>,
}

fn parse_size(s: &str) -> Result<Dimensions, String> {
    let (w, h) = s
        .split_once(['x', 'X'])
        .ok_or_else(|| format!("size must be 'WxH', got: '{s}'"))?;
    let width: u32 = w
        .trim()
        .parse()
        .map_err(|e| format!("invalid width '{w}': {e}"))?;
    let height: u32 = h
        .trim()
        .parse()
        .map_err(|e| format!("invalid height '{h}': {e}"))?;
    Dimensions::new(width, height)
        .validate()
        .map_err(|e| e.to_string())
}

fn parse_point(s: &str) -> Result<ImagePoint, String> {
    let (x, y) = s
        .split_once(',')
        .ok_or_else(|| format!("point must be 'X,Y', got: '{s}'"))?;
    let x: f64 = x
        .trim()
        .parse()
        .map_err(|e| format!("invalid X '{x}': {e}"))?;
    let y: f64 = y
        .trim()
        .parse()
        .map_err(|e| format!("invalid Y '{y}': {e}"))?;
    Ok(ImagePoint::new(x, y))
}

/// Load every proposal, numbering them in argument order. JSON files
/// contribute one proposal per record.
fn load_proposals(paths: &[PathBuf]) -> Result<Vec<SegmentationMask>, Box<dyn std::error::Error>> {
    let mut masks = Vec::new();
    let mut next_id = 0_u32;
    for path in paths {
        let bytes = std::fs::read(path)?;
        if is_json(path) {
            let records: Vec<SamMaskRecord> = serde_json::from_slice(&bytes)?;
            eprintln!("{}: {} records", path.display(), records.len());
            for record in records {
                masks.push(record.into_mask(MaskId(next_id))?);
                next_id += 1;
            }
        } else {
            let alpha = AlphaBuffer::decode(&bytes)?;
            let dims = alpha.dimensions();
            eprintln!(
                "{}: {}x{}, area {}",
                path.display(),
                dims.width,
                dims.height,
                alpha.area()
            );
            masks.push(SegmentationMask::decoded(
                MaskId(next_id),
                path.display().to_string(),
                alpha,
            ));
            next_id += 1;
        }
    }
    Ok(masks)
}

fn is_json(path: &Path) -> bool {
    path.extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"))
}

fn write_png(path: &Path, mask: &image::GrayImage) -> Result<(), Box<dyn std::error::Error>> {
    let png = encode_png(mask)?;
    std::fs::write(path, &png)?;
    let black = mask.pixels().filter(|px| px.0[0] == 0).count();
    eprintln!(
        "Saved {}x{} mask to {} ({black} px to regenerate, {} bytes)",
        mask.width(),
        mask.height(),
        path.display(),
        png.len()
    );
    Ok(())
}

fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Command::Render {
            input,
            output,
            size,
        } => {
            eprintln!("Reading strokes from {}", input.display());
            let doc: StrokeDocument = serde_json::from_slice(&std::fs::read(&input)?)?;
            let natural = match size {
                Some(s) => parse_size(&s).map_err(|e| format!("--size: {e}"))?,
                None => doc.natural,
            };
            eprintln!(
                "Rendering {} strokes at {}x{}...",
                doc.strokes.len(),
                natural.width,
                natural.height
            );
            let mask = raster::render(&doc.strokes, natural)?;
            write_png(&output, &mask)?;
        }
        Command::Merge { proposals, output } => {
            let natural = parse_size(&proposals.size).map_err(|e| format!("--size: {e}"))?;
            let masks = load_proposals(&proposals.masks)?;
            let selected: Vec<&SegmentationMask> = masks.iter().collect();
            eprintln!("Merging {} proposals...", selected.len());
            let mask = composite::merge(&selected, natural)?;
            write_png(&output, &mask)?;
        }
        Command::Hit { proposals, at } => {
            let natural = parse_size(&proposals.size).map_err(|e| format!("--size: {e}"))?;
            let point = parse_point(&at).map_err(|e| format!("--at: {e}"))?;
            let masks = load_proposals(&proposals.masks)?;
            for id in segmentation::masks_under_point(point, &masks, natural) {
                let area = masks
                    .iter()
                    .find(|m| m.id() == id)
                    .and_then(SegmentationMask::area)
                    .unwrap_or(0);
                println!("{id}\tarea {area}");
            }
            match segmentation::hit_test(point, &masks, natural) {
                Some(id) => println!("pick\t{id}"),
                None => println!("pick\tnone"),
            }
        }
    }
    eprintln!("Done.");
    Ok(())
}

fn main() -> ExitCode {
    match run(Cli::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn size_parses_both_separators() {
        assert_eq!(parse_size("800x600").unwrap(), Dimensions::new(800, 600));
        assert_eq!(parse_size(" 64 X 32 ").unwrap(), Dimensions::new(64, 32));
    }

    #[test]
    fn zero_size_is_rejected() {
        assert!(parse_size("0x10").is_err());
        assert!(parse_size("10").is_err());
    }

    #[test]
    fn point_parses() {
        assert_eq!(parse_point("12.5, 3").unwrap(), ImagePoint::new(12.5, 3.0));
        assert!(parse_point("12.5").is_err());
    }

    #[test]
    fn stroke_document_round_trips_through_render() {
        let json = r#"{
            "natural": {"width": 20, "height": 20},
            "strokes": [{
                "points": [
                    {"image_x": 5.0, "image_y": 5.0},
                    {"image_x": 15.0, "image_y": 5.0},
                    {"image_x": 15.0, "image_y": 15.0},
                    {"image_x": 5.0, "image_y": 15.0},
                    {"image_x": 5.0, "image_y": 5.0}
                ],
                "brush_size": 2,
                "polarity": "include",
                "closed": true,
                "clip_outline": true,
                "frame": {"width": 20, "height": 20}
            }]
        }"#;
        let doc: StrokeDocument = serde_json::from_str(json).unwrap();
        let mask = raster::render(&doc.strokes, doc.natural).unwrap();
        let black = mask.pixels().filter(|px| px.0[0] == 0).count();
        assert_eq!(black, 100);
    }

    #[test]
    fn cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
