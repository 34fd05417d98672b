// ============================================================================
// photoforge CLI: headless batch processing via command-line arguments
// ============================================================================
//
// Usage examples:
//   photoforge -i photo.png --op grayscale --op blur=3 -o result.png
//   photoforge -i *.jpg --op resize=800x --output-dir out/ -f png
//   photoforge -i scan.png --op magic-wand=0,0,40 --op delete-selection -o cut.png
//   photoforge -i a.png b.png --op select-rect=10,10,50,50 --op invert --output-dir out/
//   photoforge -i card.png --op shape=ellipse,10,10,80,40,#ff000080 -o card_out.png
//
// Every input gets its own editing session. Operations run in the order given.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Instant;

use anyhow::{Context, Result, anyhow, bail};
use clap::Parser;
use tracing::{error, info};

use photoforge::ops::filters::DEFAULT_BLUR_RADIUS;
use photoforge::ops::shapes::parse_hex_color;
use photoforge::{Editor, EditorConfig, ExportFormat, ImageSource, ShapeKind, ShapeStyle};

// ============================================================================
// CLI argument definition (clap Derive)
// ============================================================================

/// photoforge headless image processor.
#[derive(Parser, Debug)]
#[command(
    name = "photoforge",
    about = "Layered raster image editor, headless batch mode",
    long_about = "Apply filters, transforms and selection edits to image files.\n\
                  Reads PNG, JPEG, WEBP, BMP and GIF; writes PNG, JPEG and BMP.\n\n\
                  Example:\n  \
                  photoforge -i photo.png --op sepia --op rotate=90 -o result.png\n  \
                  photoforge -i *.jpg --op resize=x600 --output-dir out/ -f png"
)]
pub struct CliArgs {
    /// Input file(s). Glob patterns accepted (e.g. "*.png", "shots/*.jpg").
    #[arg(short, long, required = true, num_args = 1..)]
    pub input: Vec<String>,

    /// Output file path. Only valid for single-file input.
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Output directory for batch processing.
    #[arg(long, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// Output format: png, jpeg, bmp.
    /// When omitted, inferred from --output's extension, then from the config.
    #[arg(short, long, value_name = "FORMAT")]
    pub format: Option<String>,

    /// JPEG quality (1–100). Defaults to the config's quality.
    #[arg(short, long, value_name = "1-100", value_parser = clap::value_parser!(u8).range(1..=100))]
    pub quality: Option<u8>,

    /// Operation to apply, e.g. `blur=4`, `crop=0,0,100,100`. Repeatable.
    #[arg(long = "op", value_name = "NAME[=ARGS]")]
    pub ops: Vec<String>,

    /// JSON editor config (history depth, default tolerance, format, quality).
    #[arg(long, value_name = "FILE.json")]
    pub config: Option<PathBuf>,

    /// Print per-file timing and log at debug level.
    #[arg(short, long)]
    pub verbose: bool,

    /// Log file path (defaults to the platform data directory).
    #[arg(long, value_name = "PATH")]
    pub log_file: Option<PathBuf>,
}

// ============================================================================
// Operations
// ============================================================================

/// One `--op` argument, parsed.
#[derive(Clone, Debug, PartialEq)]
pub enum CliOp {
    Brightness(f32),
    Contrast(f32),
    Saturation(f32),
    Grayscale,
    Sepia,
    Invert,
    Blur(u32),
    Sharpen,
    EdgeDetect,
    Emboss,
    Resize { width: Option<u32>, height: Option<u32> },
    Crop { x: i64, y: i64, width: i64, height: i64 },
    Rotate(f32),
    FlipH,
    FlipV,
    SelectRect { x: f32, y: f32, width: f32, height: f32 },
    SelectEllipse { x: f32, y: f32, width: f32, height: f32 },
    MagicWand { x: i64, y: i64, tolerance: Option<f32>, contiguous: bool },
    Feather(u32),
    Grow(u32),
    Shrink(u32),
    InvertSelection,
    SelectAll,
    Deselect,
    Fill(String),
    Stroke { color: String, width: u32 },
    DeleteSelection,
    Shape { kind: ShapeKind, x: f32, y: f32, width: f32, height: f32, style: ShapeStyle },
    Undo,
    Redo,
}

fn number<T: std::str::FromStr>(text: &str, what: &str) -> Result<T> {
    text.trim().parse::<T>().map_err(|_| anyhow!("invalid {} '{}'", what, text))
}

fn numbers<T: std::str::FromStr>(args: &str, count: usize, what: &str) -> Result<Vec<T>> {
    let parts: Vec<&str> = args.split(',').collect();
    if parts.len() != count {
        bail!("expected {} comma-separated values, got '{}'", count, args);
    }
    parts.iter().map(|p| number(p, what)).collect()
}

/// Parse `NAME[=ARGS]`.
pub fn parse_op(text: &str) -> Result<CliOp> {
    let (name, args) = match text.split_once('=') {
        Some((n, a)) => (n.trim(), Some(a.trim())),
        None => (text.trim(), None),
    };
    let need = |what: &str| args.ok_or_else(|| anyhow!("'{}' needs {}", name, what));

    let op = match name.to_ascii_lowercase().as_str() {
        "brightness" => CliOp::Brightness(number(need("a value")?, "value")?),
        "contrast" => CliOp::Contrast(number(need("a value")?, "value")?),
        "saturation" => CliOp::Saturation(number(need("a value")?, "value")?),
        "grayscale" => CliOp::Grayscale,
        "sepia" => CliOp::Sepia,
        "invert" => CliOp::Invert,
        "blur" => match args {
            Some(r) => CliOp::Blur(number(r, "radius")?),
            None => CliOp::Blur(DEFAULT_BLUR_RADIUS),
        },
        "sharpen" => CliOp::Sharpen,
        "edge-detect" => CliOp::EdgeDetect,
        "emboss" => CliOp::Emboss,
        "resize" => {
            let arg = need("WxH")?;
            let (w, h) = arg
                .split_once(|c: char| c == 'x' || c == 'X')
                .ok_or_else(|| anyhow!("resize expects WxH, got '{}'", arg))?;
            let side = |s: &str| -> Result<Option<u32>> {
                if s.trim().is_empty() { Ok(None) } else { number(s, "size").map(Some) }
            };
            CliOp::Resize { width: side(w)?, height: side(h)? }
        }
        "crop" => {
            let v: Vec<i64> = numbers(need("X,Y,W,H")?, 4, "coordinate")?;
            CliOp::Crop { x: v[0], y: v[1], width: v[2], height: v[3] }
        }
        "rotate" => CliOp::Rotate(number(need("degrees")?, "angle")?),
        "flip-h" => CliOp::FlipH,
        "flip-v" => CliOp::FlipV,
        "select-rect" => {
            let v: Vec<f32> = numbers(need("X,Y,W,H")?, 4, "coordinate")?;
            CliOp::SelectRect { x: v[0], y: v[1], width: v[2], height: v[3] }
        }
        "select-ellipse" => {
            let v: Vec<f32> = numbers(need("X,Y,W,H")?, 4, "coordinate")?;
            CliOp::SelectEllipse { x: v[0], y: v[1], width: v[2], height: v[3] }
        }
        "magic-wand" => {
            let parts: Vec<&str> = need("X,Y")?.split(',').collect();
            if !(2..=4).contains(&parts.len()) {
                bail!("magic-wand expects X,Y[,TOL[,global]]");
            }
            let contiguous = match parts.get(3).map(|s| s.trim()) {
                None => true,
                Some("global") => false,
                Some(other) => bail!("unknown magic-wand mode '{}'", other),
            };
            CliOp::MagicWand {
                x: number(parts[0], "coordinate")?,
                y: number(parts[1], "coordinate")?,
                tolerance: parts.get(2).map(|t| number(t, "tolerance")).transpose()?,
                contiguous,
            }
        }
        "feather" => CliOp::Feather(number(need("a radius")?, "radius")?),
        "grow" => CliOp::Grow(number(need("pixels")?, "pixel count")?),
        "shrink" => CliOp::Shrink(number(need("pixels")?, "pixel count")?),
        "invert-selection" => CliOp::InvertSelection,
        "select-all" => CliOp::SelectAll,
        "deselect" => CliOp::Deselect,
        "fill" => CliOp::Fill(need("a #RRGGBB colour")?.to_string()),
        "stroke" => {
            let arg = need("#RRGGBB[,WIDTH]")?;
            let (color, width) = match arg.split_once(',') {
                Some((c, w)) => (c, number(w, "stroke width")?),
                None => (arg, 1),
            };
            CliOp::Stroke { color: color.trim().to_string(), width }
        }
        "delete-selection" => CliOp::DeleteSelection,
        "shape" => parse_shape(need("KIND,X,Y,W,H")?)?,
        "undo" => CliOp::Undo,
        "redo" => CliOp::Redo,
        _ => bail!("unknown operation '{}'", name),
    };
    Ok(op)
}

/// `KIND,X,Y,W,H[,#FILL[,#STROKE[,LINE_WIDTH]]]`. Without a fill colour the
/// shape is outlined only.
fn parse_shape(args: &str) -> Result<CliOp> {
    let parts: Vec<&str> = args.split(',').map(str::trim).collect();
    if !(5..=8).contains(&parts.len()) {
        bail!("shape expects KIND,X,Y,W,H[,FILL[,STROKE[,LINE_WIDTH]]], got '{}'", args);
    }
    let kind = ShapeKind::from_name(parts[0]).ok_or_else(|| {
        let known: Vec<&str> = ShapeKind::all().iter().map(|k| k.name()).collect();
        anyhow!("unknown shape '{}' (expected one of {})", parts[0], known.join(", "))
    })?;
    let mut style = ShapeStyle::default();
    if let Some(fill) = parts.get(5) {
        style.fill = Some(parse_hex_color(fill)?);
    }
    if let Some(stroke) = parts.get(6) {
        style.stroke = parse_hex_color(stroke)?;
    }
    if let Some(line) = parts.get(7) {
        style.line_width = number(line, "line width")?;
    }
    Ok(CliOp::Shape {
        kind,
        x: number(parts[1], "coordinate")?,
        y: number(parts[2], "coordinate")?,
        width: number(parts[3], "size")?,
        height: number(parts[4], "size")?,
        style,
    })
}

/// Run one parsed operation against the editor.
fn apply_op(editor: &mut Editor, op: &CliOp) -> photoforge::EditorResult<()> {
    match op {
        CliOp::Brightness(v) => editor.brightness(*v)?,
        CliOp::Contrast(v) => editor.contrast(*v)?,
        CliOp::Saturation(v) => editor.saturation(*v)?,
        CliOp::Grayscale => editor.grayscale()?,
        CliOp::Sepia => editor.sepia()?,
        CliOp::Invert => editor.invert()?,
        CliOp::Blur(r) => editor.blur(*r)?,
        CliOp::Sharpen => editor.sharpen()?,
        CliOp::EdgeDetect => editor.edge_detect()?,
        CliOp::Emboss => editor.emboss()?,
        CliOp::Resize { width, height } => {
            let keep_aspect = width.is_none() || height.is_none();
            editor.resize(*width, *height, keep_aspect)?;
        }
        CliOp::Crop { x, y, width, height } => {
            editor.crop(*x, *y, *width, *height)?;
        }
        CliOp::Rotate(deg) => {
            editor.rotate(*deg)?;
        }
        CliOp::FlipH => {
            editor.flip_horizontal()?;
        }
        CliOp::FlipV => {
            editor.flip_vertical()?;
        }
        CliOp::SelectRect { x, y, width, height } => {
            editor.select_rectangle(*x, *y, *width, *height)?;
        }
        CliOp::SelectEllipse { x, y, width, height } => {
            editor.select_ellipse(*x, *y, *width, *height)?;
        }
        CliOp::MagicWand { x, y, tolerance, contiguous } => {
            editor.magic_wand(*x, *y, *tolerance, *contiguous)?;
        }
        CliOp::Feather(r) => {
            editor.feather_selection(*r)?;
        }
        CliOp::Grow(p) => {
            editor.grow_selection(*p)?;
        }
        CliOp::Shrink(p) => {
            editor.shrink_selection(*p)?;
        }
        CliOp::InvertSelection => {
            editor.invert_selection()?;
        }
        CliOp::SelectAll => {
            editor.select_all()?;
        }
        CliOp::Deselect => {
            editor.deselect()?;
        }
        CliOp::Fill(color) => {
            editor.fill_selection(color)?;
        }
        CliOp::Stroke { color, width } => {
            editor.stroke_selection(color, *width)?;
        }
        CliOp::DeleteSelection => {
            editor.delete_selection()?;
        }
        CliOp::Shape { kind, x, y, width, height, style } => {
            editor.draw_shape(*kind, *x, *y, *width, *height, style)?;
        }
        CliOp::Undo => {
            editor.undo()?;
        }
        CliOp::Redo => {
            editor.redo()?;
        }
    }
    Ok(())
}

// ============================================================================
// Public entry point
// ============================================================================

/// Run all CLI processing and return an OS exit code.
/// `0` = all files succeeded, `1` = one or more files failed.
pub fn run(args: CliArgs) -> ExitCode {
    let config = match load_config(args.config.as_deref()) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("error: {:#}", e);
            return ExitCode::FAILURE;
        }
    };

    let inputs = resolve_inputs(&args.input);
    if inputs.is_empty() {
        eprintln!("error: no input files matched the given pattern(s).");
        return ExitCode::FAILURE;
    }

    if inputs.len() > 1 && args.output.is_some() && args.output_dir.is_none() {
        eprintln!(
            "error: {} input files given but --output only accepts a single file path.\n\
             Use --output-dir to specify a destination directory for batch processing.",
            inputs.len()
        );
        return ExitCode::FAILURE;
    }

    let format = match parse_format(args.format.as_deref(), args.output.as_deref(), &config) {
        Ok(f) => f,
        Err(e) => {
            eprintln!("error: {}", e);
            return ExitCode::FAILURE;
        }
    };
    let quality = args.quality.map_or(config.default_quality, |q| q as f32 / 100.0);

    if let Some(dir) = &args.output_dir
        && let Err(e) = fs::create_dir_all(dir)
    {
        eprintln!("error: could not create output directory '{}': {}", dir.display(), e);
        return ExitCode::FAILURE;
    }

    let total = inputs.len();
    let multi = total > 1;
    let mut any_failure = false;

    for (idx, input_path) in inputs.iter().enumerate() {
        if multi || args.verbose {
            println!("[{}/{}] {}", idx + 1, total, input_path.display());
        }
        let file_start = Instant::now();

        let Some(output_path) =
            build_output_path(input_path, args.output.as_deref(), args.output_dir.as_deref(), format)
        else {
            eprintln!("  error: cannot determine output path for '{}'.", input_path.display());
            any_failure = true;
            continue;
        };

        match run_one(input_path, &output_path, &args.ops, format, quality, &config) {
            Ok(()) => {
                info!(input = %input_path.display(), output = %output_path.display(), "file processed");
                if args.verbose || multi {
                    println!(
                        "  → {} ({:.0}ms)",
                        output_path.display(),
                        file_start.elapsed().as_secs_f64() * 1000.0
                    );
                }
            }
            Err(e) => {
                error!(input = %input_path.display(), error = %format!("{:#}", e), "file failed");
                eprintln!("  error: {:#}", e);
                any_failure = true;
            }
        }
    }

    if any_failure { ExitCode::FAILURE } else { ExitCode::SUCCESS }
}

// ============================================================================
// Per-file processing pipeline
// ============================================================================

fn run_one(
    input: &Path,
    output: &Path,
    ops: &[String],
    format: ExportFormat,
    quality: f32,
    config: &EditorConfig,
) -> Result<()> {
    let bytes = fs::read(input).with_context(|| format!("could not read '{}'", input.display()))?;

    let mut editor = Editor::new(config.clone());
    editor.load(ImageSource::Encoded(&bytes)).context("load failed")?;

    for raw in ops {
        let op = parse_op(raw).with_context(|| format!("bad --op '{}'", raw))?;
        apply_op(&mut editor, &op).with_context(|| format!("operation '{}' failed", raw))?;
    }

    let encoded = editor
        .get_buffer(Some(format.extension()), Some(quality))
        .context("save failed")?;
    fs::write(output, encoded).with_context(|| format!("could not write '{}'", output.display()))?;
    Ok(())
}

// ============================================================================
// Helpers
// ============================================================================

fn load_config(path: Option<&Path>) -> Result<EditorConfig> {
    let Some(path) = path else {
        return Ok(EditorConfig::default());
    };
    let text = fs::read_to_string(path).with_context(|| format!("could not read config '{}'", path.display()))?;
    EditorConfig::from_json(&text).with_context(|| format!("invalid config '{}'", path.display()))
}

/// Expand glob patterns and literal paths into a deduplicated, ordered list.
fn resolve_inputs(patterns: &[String]) -> Vec<PathBuf> {
    let mut result: Vec<PathBuf> = Vec::new();

    for pattern in patterns {
        let as_path = Path::new(pattern);

        if as_path.exists() {
            if !result.iter().any(|p| p.as_path() == as_path) {
                result.push(as_path.to_path_buf());
            }
            continue;
        }

        match glob::glob(pattern) {
            Ok(entries) => {
                let mut matched = false;
                for entry in entries.flatten() {
                    if !result.contains(&entry) {
                        result.push(entry);
                    }
                    matched = true;
                }
                if !matched {
                    eprintln!("warning: pattern '{}' matched no files.", pattern);
                }
            }
            Err(e) => {
                eprintln!("warning: invalid glob '{}': {}", pattern, e);
            }
        }
    }

    result
}

/// `--format` wins, then the output extension, then the config default.
fn parse_format(
    format_arg: Option<&str>,
    output: Option<&Path>,
    config: &EditorConfig,
) -> photoforge::EditorResult<ExportFormat> {
    if let Some(f) = format_arg {
        return ExportFormat::from_name(f);
    }
    if let Some(ext) = output.and_then(|o| o.extension()).and_then(|e| e.to_str()) {
        return ExportFormat::from_name(ext);
    }
    ExportFormat::from_name(&config.default_format)
}

/// Compute the output path for a single input file.
///
/// Priority:
/// 1. `--output` (explicit path, used for single-file input)
/// 2. `--output-dir` (batch directory, derives filename from input stem)
/// 3. Fallback: same directory as input, same stem, new extension
///    (appends `_out` to stem if it would collide with the input path)
fn build_output_path(
    input: &Path,
    output: Option<&Path>,
    output_dir: Option<&Path>,
    format: ExportFormat,
) -> Option<PathBuf> {
    if let Some(out) = output {
        return Some(out.to_path_buf());
    }

    let ext = format.extension();
    let stem = input.file_stem()?.to_string_lossy().into_owned();

    if let Some(dir) = output_dir {
        return Some(dir.join(format!("{}.{}", stem, ext)));
    }

    let parent = input.parent().unwrap_or(Path::new("."));
    let candidate = parent.join(format!("{}.{}", stem, ext));

    // Never overwrite the input.
    if candidate == input {
        Some(parent.join(format!("{}_out.{}", stem, ext)))
    } else {
        Some(candidate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_simple_and_argument_ops() {
        assert_eq!(parse_op("grayscale").unwrap(), CliOp::Grayscale);
        assert_eq!(parse_op("blur=3").unwrap(), CliOp::Blur(3));
        assert_eq!(parse_op("Brightness=-20").unwrap(), CliOp::Brightness(-20.0));
        assert_eq!(
            parse_op("crop=1,2,30,40").unwrap(),
            CliOp::Crop { x: 1, y: 2, width: 30, height: 40 }
        );
        assert_eq!(parse_op("fill=#ff0000").unwrap(), CliOp::Fill("#ff0000".to_string()));
        assert_eq!(parse_op("blur").unwrap(), CliOp::Blur(DEFAULT_BLUR_RADIUS));
        assert_eq!(
            parse_op("stroke=#00ff00,3").unwrap(),
            CliOp::Stroke { color: "#00ff00".to_string(), width: 3 }
        );
        assert_eq!(
            parse_op("stroke=#00ff00").unwrap(),
            CliOp::Stroke { color: "#00ff00".to_string(), width: 1 }
        );
    }

    #[test]
    fn shape_ops_resolve_kind_and_style() {
        let op = parse_op("shape=Ellipse,1,2,30,40,#ff000080").unwrap();
        let CliOp::Shape { kind, x, height, style, .. } = op else {
            panic!("expected a shape op");
        };
        assert_eq!(kind, ShapeKind::Ellipse);
        assert_eq!((x, height), (1.0, 40.0));
        assert_eq!(style.fill, Some(image::Rgba([255, 0, 0, 128])));
        assert_eq!(style.stroke, ShapeStyle::default().stroke);

        let op = parse_op("shape=rectangle,0,0,5,5,#000000,#ffffff,4").unwrap();
        assert!(matches!(op, CliOp::Shape { style: ShapeStyle { line_width: 4.0, .. }, .. }));

        assert!(parse_op("shape=star,0,0,5,5").is_err());
        assert!(parse_op("shape=circle,0,0,5").is_err());
        assert!(parse_op("shape=circle,0,0,5,5,red").is_err());
    }

    #[test]
    fn shape_op_paints_the_active_layer() {
        let mut editor = Editor::default();
        editor.new_blank(10, 10).unwrap();
        let op = parse_op("shape=rectangle,2,2,6,6,#0000ff").unwrap();
        apply_op(&mut editor, &op).unwrap();
        assert_eq!(editor.composite().unwrap().get_pixel(5, 5), image::Rgba([0, 0, 255, 255]));
        assert_eq!(editor.history_len(), 2);
    }

    #[test]
    fn resize_sides_are_optional() {
        assert_eq!(parse_op("resize=800x").unwrap(), CliOp::Resize { width: Some(800), height: None });
        assert_eq!(parse_op("resize=x600").unwrap(), CliOp::Resize { width: None, height: Some(600) });
        assert_eq!(
            parse_op("resize=10x20").unwrap(),
            CliOp::Resize { width: Some(10), height: Some(20) }
        );
        assert!(parse_op("resize=800").is_err());
    }

    #[test]
    fn magic_wand_variants() {
        assert_eq!(
            parse_op("magic-wand=3,4").unwrap(),
            CliOp::MagicWand { x: 3, y: 4, tolerance: None, contiguous: true }
        );
        assert_eq!(
            parse_op("magic-wand=3,4,10,global").unwrap(),
            CliOp::MagicWand { x: 3, y: 4, tolerance: Some(10.0), contiguous: false }
        );
        assert!(parse_op("magic-wand=3").is_err());
        assert!(parse_op("magic-wand=3,4,10,everywhere").is_err());
    }

    #[test]
    fn rejects_unknown_and_malformed() {
        assert!(parse_op("posterize").is_err());
        assert!(parse_op("blur=wide").is_err());
        assert!(parse_op("crop=1,2,3").is_err());
    }

    #[test]
    fn output_path_never_overwrites_input() {
        let p = build_output_path(Path::new("dir/a.png"), None, None, ExportFormat::Png).unwrap();
        assert_eq!(p, PathBuf::from("dir/a_out.png"));
        let p = build_output_path(Path::new("dir/a.png"), None, Some(Path::new("out")), ExportFormat::Jpeg)
            .unwrap();
        assert_eq!(p, PathBuf::from("out/a.jpg"));
    }

    #[test]
    fn format_inference() {
        let cfg = EditorConfig::default();
        assert_eq!(parse_format(None, Some(Path::new("x.JPG")), &cfg).unwrap(), ExportFormat::Jpeg);
        assert_eq!(parse_format(Some("bmp"), Some(Path::new("x.png")), &cfg).unwrap(), ExportFormat::Bmp);
        assert_eq!(parse_format(None, None, &cfg).unwrap(), ExportFormat::Png);
        assert!(parse_format(Some("webp"), None, &cfg).is_err());
    }
}
