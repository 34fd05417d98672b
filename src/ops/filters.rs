// ============================================================================
// IMAGE FILTERS: Gaussian blur and selection-scoped application
// ============================================================================

use rayon::prelude::*;

use crate::canvas::PixelBuffer;
use crate::selection::SelectionMask;

/// Default blur radius used when a caller does not pass one.
pub const DEFAULT_BLUR_RADIUS: u32 = 5;

/// Build a normalised 1-D Gaussian kernel of size `2 * radius + 1` with
/// sigma = radius / 3.
pub fn build_gaussian_kernel(radius: u32) -> Vec<f32> {
    if radius == 0 {
        return vec![1.0];
    }
    let sigma = radius as f32 / 3.0;
    let len = radius as usize * 2 + 1;
    let s2 = 2.0 * sigma * sigma;
    let mut kernel: Vec<f32> = (0..len)
        .map(|i| {
            let x = i as f32 - radius as f32;
            (-x * x / s2).exp()
        })
        .collect();
    let sum: f32 = kernel.iter().sum();
    let inv = 1.0 / sum;
    for v in &mut kernel {
        *v *= inv;
    }
    kernel
}

// ---------------------------------------------------------------------------
//  Parallel separable convolution (rayon)
// ---------------------------------------------------------------------------

/// Two-pass separable convolution over interleaved samples with `channels`
/// per pixel. Taps past the edge clamp to the border sample.
pub(crate) fn separable_blur(
    src: &[u8],
    width: usize,
    height: usize,
    channels: usize,
    kernel: &[f32],
) -> Vec<u8> {
    if width == 0 || height == 0 || kernel.len() <= 1 {
        return src.to_vec();
    }
    let radius = (kernel.len() / 2) as isize;
    let stride = width * channels;
    let buf_in: Vec<f32> = src.iter().map(|&b| b as f32).collect();

    // --- Horizontal pass (parallel by row) ---
    let mut buf_h = vec![0.0f32; buf_in.len()];
    buf_h.par_chunks_mut(stride).enumerate().for_each(|(y, row_out)| {
        let row_in = &buf_in[y * stride..(y + 1) * stride];
        for x in 0..width {
            for c in 0..channels {
                let mut acc = 0.0f32;
                for (ki, &kv) in kernel.iter().enumerate() {
                    let sx = (x as isize + ki as isize - radius).clamp(0, width as isize - 1) as usize;
                    acc += row_in[sx * channels + c] * kv;
                }
                row_out[x * channels + c] = acc;
            }
        }
    });

    // --- Vertical pass (parallel by row) ---
    let mut out = vec![0u8; buf_in.len()];
    out.par_chunks_mut(stride).enumerate().for_each(|(y, row_out)| {
        for x in 0..width {
            for c in 0..channels {
                let mut acc = 0.0f32;
                for (ki, &kv) in kernel.iter().enumerate() {
                    let sy = (y as isize + ki as isize - radius).clamp(0, height as isize - 1) as usize;
                    acc += buf_h[sy * stride + x * channels + c] * kv;
                }
                row_out[x * channels + c] = acc.round().clamp(0.0, 255.0) as u8;
            }
        }
    });

    out
}

/// Gaussian blur of all four channels. A radius of 0 returns a copy.
pub fn gaussian_blur(src: &PixelBuffer, radius: u32) -> PixelBuffer {
    if radius == 0 {
        return src.clone();
    }
    let kernel = build_gaussian_kernel(radius);
    let data = separable_blur(
        src.as_raw(),
        src.width() as usize,
        src.height() as usize,
        4,
        &kernel,
    );
    // Same length as the source, so the buffer invariant holds.
    PixelBuffer::from_raw(src.width(), src.height(), data).unwrap_or_else(|_| src.clone())
}

// ---------------------------------------------------------------------------
//  Selection-scoped application
// ---------------------------------------------------------------------------

/// Blend a full-buffer filter `result` back over `original` through the
/// selection. R, G and B are mixed by mask alpha; the alpha channel keeps the
/// original's value. With no active selection the result is returned as-is.
pub fn apply_masked(
    original: &PixelBuffer,
    mut result: PixelBuffer,
    mask: Option<&SelectionMask>,
) -> PixelBuffer {
    let Some(mask) = mask.filter(|m| m.is_active()) else {
        return result;
    };
    if mask.width() != original.width() || mask.height() != original.height() {
        return result;
    }
    let stride = original.stride();
    if stride == 0 {
        return result;
    }
    let width = original.width() as usize;
    let alpha = mask.alpha();
    let orig_raw = original.as_raw();

    result
        .as_raw_mut()
        .par_chunks_mut(stride)
        .enumerate()
        .for_each(|(y, row_out)| {
            let row_in = &orig_raw[y * stride..(y + 1) * stride];
            let mask_row = &alpha[y * width..(y + 1) * width];
            for x in 0..width {
                let pi = x * 4;
                let m = mask_row[x];
                if m == 255 {
                    row_out[pi + 3] = row_in[pi + 3];
                    continue;
                }
                if m == 0 {
                    row_out[pi..pi + 4].copy_from_slice(&row_in[pi..pi + 4]);
                    continue;
                }
                let a = m as f32 / 255.0;
                for c in 0..3 {
                    let v = row_in[pi + c] as f32 * (1.0 - a) + row_out[pi + c] as f32 * a;
                    row_out[pi + c] = v.round().clamp(0.0, 255.0) as u8;
                }
                row_out[pi + 3] = row_in[pi + 3];
            }
        });

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    #[test]
    fn kernel_is_normalised_and_symmetric() {
        let k = build_gaussian_kernel(4);
        assert_eq!(k.len(), 9);
        let sum: f32 = k.iter().sum();
        assert!((sum - 1.0).abs() < 1e-5);
        for i in 0..4 {
            assert!((k[i] - k[8 - i]).abs() < 1e-7);
        }
        assert!(k[4] > k[3]);
    }

    #[test]
    fn blurring_a_flat_image_is_identity() {
        let src = PixelBuffer::new_filled(7, 5, Rgba([40, 80, 120, 200]));
        let out = gaussian_blur(&src, 3);
        assert_eq!(out, src);
    }

    #[test]
    fn blur_spreads_a_single_bright_pixel() {
        let mut src = PixelBuffer::new_filled(9, 9, Rgba([0, 0, 0, 255]));
        src.put_pixel(4, 4, Rgba([255, 255, 255, 255]));
        let out = gaussian_blur(&src, 2);
        let centre = out.get_pixel(4, 4)[0];
        let near = out.get_pixel(5, 4)[0];
        assert!(centre < 255);
        assert!(near > 0);
        assert!(centre > near);
    }

    #[test]
    fn masked_result_leaves_outside_untouched() {
        let original = PixelBuffer::new_filled(4, 4, Rgba([10, 10, 10, 255]));
        let result = PixelBuffer::new_filled(4, 4, Rgba([200, 200, 200, 255]));
        let mut mask = SelectionMask::new(4, 4);
        mask.select_rectangle(0.0, 0.0, 2.0, 4.0);
        let out = apply_masked(&original, result, Some(&mask));
        assert_eq!(out.get_pixel(0, 0), Rgba([200, 200, 200, 255]));
        assert_eq!(out.get_pixel(3, 3), Rgba([10, 10, 10, 255]));
    }
}
