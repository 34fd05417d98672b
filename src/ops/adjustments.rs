// ============================================================================
// COLOR ADJUSTMENTS: per-pixel tonal operations
// ============================================================================

use rayon::prelude::*;

use crate::canvas::PixelBuffer;

/// Apply a per-pixel transform to every pixel, in parallel by row.
/// Channels are passed as 0..255 floats; results are rounded and clamped.
pub fn apply_pixel_transform<F>(src: &PixelBuffer, transform: F) -> PixelBuffer
where
    F: Fn(f32, f32, f32, f32) -> (f32, f32, f32, f32) + Sync,
{
    let mut out = src.clone();
    let stride = out.stride();
    if stride == 0 || out.height() == 0 {
        return out;
    }

    out.as_raw_mut().par_chunks_mut(stride).for_each(|row| {
        for px in row.chunks_exact_mut(4) {
            let (nr, ng, nb, na) =
                transform(px[0] as f32, px[1] as f32, px[2] as f32, px[3] as f32);
            px[0] = nr.round().clamp(0.0, 255.0) as u8;
            px[1] = ng.round().clamp(0.0, 255.0) as u8;
            px[2] = nb.round().clamp(0.0, 255.0) as u8;
            px[3] = na.round().clamp(0.0, 255.0) as u8;
        }
    });
    out
}

/// Add `value` to R, G and B.
pub fn brightness(src: &PixelBuffer, value: f32) -> PixelBuffer {
    apply_pixel_transform(src, |r, g, b, a| (r + value, g + value, b + value, a))
}

/// Contrast stretch about mid-grey; `value` in -255..255.
pub fn contrast(src: &PixelBuffer, value: f32) -> PixelBuffer {
    // value == 259 would divide by zero.
    let value = value.clamp(-255.0, 258.0);
    let factor = (259.0 * (value + 255.0)) / (255.0 * (259.0 - value));
    apply_pixel_transform(src, |r, g, b, a| {
        (
            factor * (r - 128.0) + 128.0,
            factor * (g - 128.0) + 128.0,
            factor * (b - 128.0) + 128.0,
            a,
        )
    })
}

/// Scale each channel's distance from the pixel's luma. 0 = grey, 1 = identity.
pub fn saturation(src: &PixelBuffer, value: f32) -> PixelBuffer {
    apply_pixel_transform(src, |r, g, b, a| {
        let gray = 0.2989 * r + 0.5870 * g + 0.1140 * b;
        (
            gray + value * (r - gray),
            gray + value * (g - gray),
            gray + value * (b - gray),
            a,
        )
    })
}

/// Rec.601 luma to all three channels.
pub fn grayscale(src: &PixelBuffer) -> PixelBuffer {
    apply_pixel_transform(src, |r, g, b, a| {
        let gray = 0.299 * r + 0.587 * g + 0.114 * b;
        (gray, gray, gray, a)
    })
}

pub fn sepia(src: &PixelBuffer) -> PixelBuffer {
    apply_pixel_transform(src, |r, g, b, a| {
        let nr = (0.393 * r + 0.769 * g + 0.189 * b).min(255.0);
        let ng = (0.349 * r + 0.686 * g + 0.168 * b).min(255.0);
        let nb = (0.272 * r + 0.534 * g + 0.131 * b).min(255.0);
        (nr, ng, nb, a)
    })
}

/// Invert R, G, B. Alpha is preserved.
pub fn invert(src: &PixelBuffer) -> PixelBuffer {
    apply_pixel_transform(src, |r, g, b, a| (255.0 - r, 255.0 - g, 255.0 - b, a))
}
