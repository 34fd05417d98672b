use image::Rgba;
use rayon::prelude::*;

use crate::canvas::{BlendMode, PixelBuffer, blend_pixel};
use crate::error::{EditorError, EditorResult};

/// Available shape primitives.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ShapeKind {
    Rectangle,
    Circle,
    Ellipse,
}

impl ShapeKind {
    pub fn all() -> &'static [ShapeKind] {
        &[ShapeKind::Rectangle, ShapeKind::Circle, ShapeKind::Ellipse]
    }

    pub fn name(&self) -> &'static str {
        match self {
            ShapeKind::Rectangle => "rectangle",
            ShapeKind::Circle => "circle",
            ShapeKind::Ellipse => "ellipse",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        let lower = name.trim().to_ascii_lowercase();
        ShapeKind::all().iter().copied().find(|k| k.name() == lower)
    }
}

/// Paint settings for a rasterised shape.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ShapeStyle {
    pub fill: Option<Rgba<u8>>,
    pub stroke: Rgba<u8>,
    pub line_width: f32,
}

impl Default for ShapeStyle {
    fn default() -> Self {
        Self { fill: None, stroke: Rgba([0, 0, 0, 255]), line_width: 2.0 }
    }
}

/// Parse `#RRGGBB` or `#RRGGBBAA` (leading `#` optional).
pub fn parse_hex_color(text: &str) -> EditorResult<Rgba<u8>> {
    let hex = text.trim().trim_start_matches('#');
    let invalid = || EditorError::InvalidColor(text.to_string());
    if !(hex.len() == 6 || hex.len() == 8) || !hex.is_ascii() {
        return Err(invalid());
    }
    let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).map_err(|_| invalid());
    let a = if hex.len() == 8 { channel(6)? } else { 255 };
    Ok(Rgba([channel(0)?, channel(2)?, channel(4)?, a]))
}

// ---------------------------------------------------------------------------
//  Signed distance functions (negative inside)
// ---------------------------------------------------------------------------

#[inline]
fn sdf_box(px: f32, py: f32, hx: f32, hy: f32) -> f32 {
    let dx = px.abs() - hx;
    let dy = py.abs() - hy;
    let outside = (dx.max(0.0) * dx.max(0.0) + dy.max(0.0) * dy.max(0.0)).sqrt();
    let inside = dx.max(dy).min(0.0);
    outside + inside
}

/// SDF for an ellipse (first-order approximation).
#[inline]
fn sdf_ellipse(px: f32, py: f32, rx: f32, ry: f32) -> f32 {
    let nx = px / rx;
    let ny = py / ry;
    let len = (nx * nx + ny * ny).sqrt();
    if len < 1e-8 {
        return -rx.min(ry);
    }
    let scale = (rx * rx * ny * ny + ry * ry * nx * nx).sqrt() / (rx * ry * len);
    (len - 1.0) / scale
}

fn shape_sdf(kind: ShapeKind, px: f32, py: f32, hx: f32, hy: f32) -> f32 {
    match kind {
        ShapeKind::Rectangle => sdf_box(px, py, hx, hy),
        ShapeKind::Circle => {
            let r = hx.min(hy);
            (px * px + py * py).sqrt() - r
        }
        ShapeKind::Ellipse => sdf_ellipse(px, py, hx, hy),
    }
}

fn smoothstep(edge0: f32, edge1: f32, x: f32) -> f32 {
    let t = ((x - edge0) / (edge1 - edge0)).clamp(0.0, 1.0);
    t * t * (3.0 - 2.0 * t)
}

/// Rasterise a shape with its box at (x, y, width, height) and composite it
/// onto `target` (fill first, then a stroke centred on the outline).
pub fn draw_shape(
    target: &mut PixelBuffer,
    kind: ShapeKind,
    x: f32,
    y: f32,
    width: f32,
    height: f32,
    style: &ShapeStyle,
) {
    let hx = width.abs() * 0.5;
    let hy = height.abs() * 0.5;
    let cx = x + width * 0.5;
    let cy = y + height * 0.5;
    if hx <= 0.0 && hy <= 0.0 {
        return;
    }
    let outline_half = style.line_width.max(0.0) * 0.5;

    // Bounding box padded for stroke and anti-aliasing, clamped to the canvas.
    let pad = outline_half + 2.0;
    let (cw, ch) = (target.width() as i64, target.height() as i64);
    let x0 = ((cx - hx - pad).floor() as i64).max(0);
    let y0 = ((cy - hy - pad).floor() as i64).max(0);
    let x1 = ((cx + hx + pad).ceil() as i64).min(cw);
    let y1 = ((cy + hy + pad).ceil() as i64).min(ch);
    if x1 <= x0 || y1 <= y0 {
        return;
    }

    let stride = target.stride();
    let fill = style.fill;
    let stroke = style.stroke;
    let stroke_on = outline_half > 0.0;

    target
        .as_raw_mut()
        .par_chunks_mut(stride)
        .enumerate()
        .skip(y0 as usize)
        .take((y1 - y0) as usize)
        .for_each(|(row, row_buf)| {
            let py = row as f32 + 0.5 - cy;
            for col in x0 as usize..x1 as usize {
                let px = col as f32 + 0.5 - cx;
                let d = shape_sdf(kind, px, py, hx.max(1e-3), hy.max(1e-3));
                let idx = col * 4;
                let mut out = Rgba([row_buf[idx], row_buf[idx + 1], row_buf[idx + 2], row_buf[idx + 3]]);

                if let Some(color) = fill {
                    let cov = smoothstep(0.5, -0.5, d);
                    if cov > 0.001 {
                        out = blend_pixel(out, color, BlendMode::Normal, cov);
                    }
                }
                if stroke_on {
                    let band = d.abs() - outline_half;
                    let cov = smoothstep(0.5, -0.5, band);
                    if cov > 0.001 {
                        out = blend_pixel(out, stroke, BlendMode::Normal, cov);
                    }
                }
                row_buf[idx..idx + 4].copy_from_slice(&out.0);
            }
        });
}

#[cfg(test)]
mod tests {
    use super::*;

    const WHITE: Rgba<u8> = Rgba([255, 255, 255, 255]);
    const RED: Rgba<u8> = Rgba([255, 0, 0, 255]);
    const BLUE: Rgba<u8> = Rgba([0, 0, 255, 255]);

    #[test]
    fn hex_colors_parse() {
        assert_eq!(parse_hex_color("#ff0000").unwrap(), RED);
        assert_eq!(parse_hex_color("0000FF80").unwrap(), Rgba([0, 0, 255, 128]));
        assert!(matches!(parse_hex_color("#xyz"), Err(EditorError::InvalidColor(_))));
        assert!(parse_hex_color("#12345g").is_err());
    }

    #[test]
    fn filled_rectangle_with_stroke() {
        let mut buf = PixelBuffer::new_filled(20, 20, WHITE);
        let style = ShapeStyle { fill: Some(RED), stroke: BLUE, line_width: 2.0 };
        draw_shape(&mut buf, ShapeKind::Rectangle, 4.0, 4.0, 12.0, 12.0, &style);
        assert_eq!(buf.get_pixel(10, 10), RED);
        assert_eq!(buf.get_pixel(4, 10), BLUE);
        assert_eq!(buf.get_pixel(0, 0), WHITE);
    }

    #[test]
    fn circle_uses_smaller_side() {
        let mut buf = PixelBuffer::new_filled(30, 20, WHITE);
        let style = ShapeStyle { fill: Some(RED), stroke: RED, line_width: 0.0 };
        draw_shape(&mut buf, ShapeKind::Circle, 0.0, 0.0, 30.0, 20.0, &style);
        assert_eq!(buf.get_pixel(15, 10), RED);
        // Radius 10 around (15, 10): x = 2 is outside even though the box covers it.
        assert_eq!(buf.get_pixel(2, 10), WHITE);
    }

    #[test]
    fn shape_off_canvas_is_ignored() {
        let mut buf = PixelBuffer::new_filled(5, 5, WHITE);
        let before = buf.clone();
        draw_shape(&mut buf, ShapeKind::Ellipse, 100.0, 100.0, 10.0, 10.0, &ShapeStyle::default());
        assert_eq!(buf, before);
        assert_eq!(ShapeKind::from_name("Ellipse"), Some(ShapeKind::Ellipse));
        assert_eq!(ShapeKind::from_name("star"), None);
    }
}
