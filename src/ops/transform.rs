// ============================================================================
// TRANSFORM OPERATIONS: resize, crop, rotate for pixel buffers
// ============================================================================

use image::{Rgba, imageops};
use rayon::prelude::*;

use crate::canvas::{Dimensions, PixelBuffer, Rect};
use crate::error::{EditorError, EditorResult};
use crate::io::check_dimensions;

// ---------------------------------------------------------------------------
//  Geometry
// ---------------------------------------------------------------------------

/// Work out the output size of a resize. With `maintain_aspect` a single
/// given side determines the other from the current aspect ratio; without it
/// a missing side keeps its current value.
pub fn resize_target(
    current: Dimensions,
    width: Option<u32>,
    height: Option<u32>,
    maintain_aspect: bool,
) -> EditorResult<(u32, u32)> {
    let aspect = current.width as f64 / current.height.max(1) as f64;
    let (w, h) = match (width, height) {
        (None, None) => {
            return Err(EditorError::InvalidDimensions(
                "resize needs a width or a height".to_string(),
            ));
        }
        (Some(w), Some(h)) => (w, h),
        (Some(w), None) if maintain_aspect => (w, ((w as f64 / aspect).round() as u32).max(1)),
        (None, Some(h)) if maintain_aspect => (((h as f64 * aspect).round() as u32).max(1), h),
        (Some(w), None) => (w, current.height),
        (None, Some(h)) => (current.width, h),
    };
    if w == 0 || h == 0 {
        return Err(EditorError::InvalidDimensions(format!("{}x{}", w, h)));
    }
    Ok((w, h))
}

/// Intersect the requested crop with the canvas.
pub fn crop_rect(current: Dimensions, x: i64, y: i64, width: i64, height: i64) -> EditorResult<Rect> {
    Rect::clamp_signed(x, y, width, height, current.width, current.height).ok_or_else(|| {
        EditorError::InvalidDimensions(format!(
            "crop {},{} {}x{} does not overlap the {}x{} canvas",
            x, y, width, height, current.width, current.height
        ))
    })
}

/// Bounding box of a `width × height` image rotated by `degrees`.
pub fn rotated_size(width: u32, height: u32, degrees: f32) -> (u32, u32) {
    let (sin, cos) = degrees.to_radians().sin_cos();
    let (sin, cos) = (sin.abs() as f64, cos.abs() as f64);
    let (w, h) = (width as f64, height as f64);
    let nw = (w * cos + h * sin).round().max(1.0) as u32;
    let nh = (w * sin + h * cos).round().max(1.0) as u32;
    (nw, nh)
}

/// Output size of a rotation, rejected before any layer is allocated when it
/// would exceed the canvas pixel limit.
pub fn rotation_target(current: Dimensions, degrees: f32) -> EditorResult<(u32, u32)> {
    if !degrees.is_finite() {
        return Err(EditorError::InvalidDimensions(format!("rotation by {}", degrees)));
    }
    let (w, h) = rotated_size(current.width, current.height, degrees);
    check_dimensions(w, h)?;
    Ok((w, h))
}

// ---------------------------------------------------------------------------
//  Per-buffer transforms
// ---------------------------------------------------------------------------

/// Bilinear resample to the given size.
pub fn resize(src: &PixelBuffer, width: u32, height: u32) -> PixelBuffer {
    PixelBuffer::from_rgba_image(imageops::resize(
        src.as_image(),
        width,
        height,
        imageops::FilterType::Triangle,
    ))
}

pub fn crop(src: &PixelBuffer, rect: Rect) -> PixelBuffer {
    src.extract_region(rect)
}

/// Rotate clockwise by `degrees` onto an enlarged transparent canvas.
/// Quarter turns are exact pixel permutations.
pub fn rotate(src: &PixelBuffer, degrees: f32) -> PixelBuffer {
    let norm = degrees.rem_euclid(360.0);
    let quarter = (norm / 90.0).round();
    if (norm - quarter * 90.0).abs() < 1e-4 {
        return match quarter as u32 % 4 {
            0 => src.clone(),
            1 => PixelBuffer::from_rgba_image(imageops::rotate90(src.as_image())),
            2 => PixelBuffer::from_rgba_image(imageops::rotate180(src.as_image())),
            _ => PixelBuffer::from_rgba_image(imageops::rotate270(src.as_image())),
        };
    }

    let (nw, nh) = rotated_size(src.width(), src.height(), degrees);
    let mut dst = PixelBuffer::new(nw, nh);
    let (sin, cos) = degrees.to_radians().sin_cos();
    let ncx = nw as f32 * 0.5;
    let ncy = nh as f32 * 0.5;
    let ocx = src.width() as f32 * 0.5;
    let ocy = src.height() as f32 * 0.5;
    let row_bytes = dst.stride();

    dst.as_raw_mut().par_chunks_mut(row_bytes).enumerate().for_each(|(dy, row)| {
        let ry = dy as f32 + 0.5 - ncy;
        for dx in 0..nw as usize {
            let rx = dx as f32 + 0.5 - ncx;
            // Inverse rotation back into source space.
            let sx = cos * rx + sin * ry + ocx - 0.5;
            let sy = -sin * rx + cos * ry + ocy - 0.5;
            let p = bilinear_sample(src, sx, sy);
            row[dx * 4..dx * 4 + 4].copy_from_slice(&p.0);
        }
    });
    dst
}

/// Bilinear interpolation against a transparent background.
fn bilinear_sample(img: &PixelBuffer, x: f32, y: f32) -> Rgba<u8> {
    let x0 = x.floor() as i64;
    let y0 = y.floor() as i64;
    let fx = x - x0 as f32;
    let fy = y - y0 as f32;
    let (w, h) = (img.width() as i64, img.height() as i64);
    if x0 < -1 || y0 < -1 || x0 >= w || y0 >= h {
        return Rgba([0, 0, 0, 0]);
    }

    let sample = |sx: i64, sy: i64| -> [f32; 4] {
        if sx < 0 || sy < 0 || sx >= w || sy >= h {
            [0.0; 4]
        } else {
            let p = img.get_pixel(sx as u32, sy as u32);
            [p[0] as f32, p[1] as f32, p[2] as f32, p[3] as f32]
        }
    };

    let tl = sample(x0, y0);
    let tr = sample(x0 + 1, y0);
    let bl = sample(x0, y0 + 1);
    let br = sample(x0 + 1, y0 + 1);

    let lerp = |a: f32, b: f32, t: f32| a + (b - a) * t;
    let mut out = [0u8; 4];
    for c in 0..4 {
        let top = lerp(tl[c], tr[c], fx);
        let bot = lerp(bl[c], br[c], fx);
        out[c] = lerp(top, bot, fy).round().clamp(0.0, 255.0) as u8;
    }
    Rgba(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dims(width: u32, height: u32) -> Dimensions {
        Dimensions { width, height }
    }

    #[test]
    fn resize_target_keeps_aspect() {
        assert_eq!(resize_target(dims(200, 100), Some(50), None, true).unwrap(), (50, 25));
        assert_eq!(resize_target(dims(200, 100), None, Some(10), true).unwrap(), (20, 10));
        assert_eq!(resize_target(dims(200, 100), Some(50), None, false).unwrap(), (50, 100));
        assert_eq!(resize_target(dims(3, 1000), Some(1), None, true).unwrap(), (1, 333));
        assert!(resize_target(dims(10, 10), None, None, true).is_err());
        assert!(resize_target(dims(10, 10), Some(0), Some(4), false).is_err());
    }

    #[test]
    fn crop_clamps_to_canvas() {
        let r = crop_rect(dims(10, 10), 5, -3, 20, 6).unwrap();
        assert_eq!(r, Rect::new(5, 0, 5, 3));
        assert!(crop_rect(dims(10, 10), 10, 0, 5, 5).is_err());
        assert!(crop_rect(dims(10, 10), 2, 2, 0, 5).is_err());
    }

    #[test]
    fn crop_with_extreme_extents_saturates() {
        assert_eq!(crop_rect(dims(10, 5), 1, 0, i64::MAX, 5).unwrap(), Rect::new(1, 0, 9, 5));
        assert_eq!(crop_rect(dims(10, 5), i64::MIN, 0, i64::MAX, 5).ok(), None);
        assert_eq!(crop_rect(dims(10, 5), i64::MAX, i64::MAX, i64::MAX, i64::MAX).ok(), None);
    }

    #[test]
    fn rotation_past_pixel_limit_is_rejected() {
        // 16384² at 45° needs roughly 23170² pixels.
        assert!(matches!(
            rotation_target(dims(16384, 16384), 45.0),
            Err(EditorError::InvalidDimensions(_))
        ));
        assert_eq!(rotation_target(dims(16384, 8192), 90.0).unwrap(), (8192, 16384));
        assert!(rotation_target(dims(4, 4), f32::NAN).is_err());
    }

    #[test]
    fn quarter_turn_swaps_dimensions() {
        let mut src = PixelBuffer::new(4, 2);
        src.put_pixel(0, 0, Rgba([255, 0, 0, 255]));
        let out = rotate(&src, 90.0);
        assert_eq!(out.dimensions(), dims(2, 4));
        // Top-left moves to top-right under a clockwise turn.
        assert_eq!(out.get_pixel(1, 0), Rgba([255, 0, 0, 255]));
        assert_eq!(rotate(&src, 360.0), src);
        assert_eq!(rotate(&src, -90.0).dimensions(), dims(2, 4));
    }

    #[test]
    fn arbitrary_rotation_grows_canvas() {
        assert_eq!(rotated_size(100, 50, 45.0), (106, 106));
        let src = PixelBuffer::new_filled(10, 10, Rgba([9, 9, 9, 255]));
        let out = rotate(&src, 30.0);
        assert_eq!(out.dimensions(), dims(14, 14));
        // Corners fall outside the source and stay transparent.
        assert_eq!(out.get_pixel(0, 0)[3], 0);
        assert_eq!(out.get_pixel(7, 7), Rgba([9, 9, 9, 255]));
    }

    #[test]
    fn resize_changes_size() {
        let src = PixelBuffer::new_filled(8, 8, Rgba([50, 60, 70, 255]));
        let out = resize(&src, 4, 2);
        assert_eq!(out.dimensions(), dims(4, 2));
        assert_eq!(out.get_pixel(1, 1), Rgba([50, 60, 70, 255]));
    }
}
