// ============================================================================
// EFFECTS: 3×3 convolution filters (sharpen, edge detect, emboss)
// ============================================================================
//
// Convolution reads RGB from the 3×3 neighbourhood and copies alpha from the
// centre pixel. The 1-pixel border has no full neighbourhood and keeps its
// source values.
// ============================================================================

use rayon::prelude::*;

use crate::canvas::PixelBuffer;

pub const SHARPEN_KERNEL: [f32; 9] = [0.0, -1.0, 0.0, -1.0, 5.0, -1.0, 0.0, -1.0, 0.0];
pub const EDGE_DETECT_KERNEL: [f32; 9] = [-1.0, -1.0, -1.0, -1.0, 8.0, -1.0, -1.0, -1.0, -1.0];
pub const EMBOSS_KERNEL: [f32; 9] = [-2.0, -1.0, 0.0, -1.0, 1.0, 1.0, 0.0, 1.0, 2.0];

/// Named convolution presets.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConvolutionKind {
    Sharpen,
    EdgeDetect,
    Emboss,
}

impl ConvolutionKind {
    pub fn kernel(&self) -> &'static [f32; 9] {
        match self {
            ConvolutionKind::Sharpen => &SHARPEN_KERNEL,
            ConvolutionKind::EdgeDetect => &EDGE_DETECT_KERNEL,
            ConvolutionKind::Emboss => &EMBOSS_KERNEL,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ConvolutionKind::Sharpen => "sharpen",
            ConvolutionKind::EdgeDetect => "edge-detect",
            ConvolutionKind::Emboss => "emboss",
        }
    }
}

/// Apply a spatial effect that reads neighbours, in parallel by row.
/// `processor` receives (source, x, y) for interior pixels only; the border
/// is copied through.
fn apply_spatial_effect<F>(src: &PixelBuffer, processor: F) -> PixelBuffer
where
    F: Fn(&PixelBuffer, u32, u32) -> [u8; 4] + Sync,
{
    let (w, h) = (src.width(), src.height());
    if w < 3 || h < 3 {
        return src.clone();
    }
    let mut out = src.clone();
    let stride = out.stride();

    out.as_raw_mut()
        .par_chunks_mut(stride)
        .enumerate()
        .for_each(|(y, row_out)| {
            let y = y as u32;
            if y == 0 || y == h - 1 {
                return;
            }
            for x in 1..w - 1 {
                let pi = x as usize * 4;
                row_out[pi..pi + 4].copy_from_slice(&processor(src, x, y));
            }
        });
    out
}

/// Direct 3×3 convolution of the RGB channels.
pub fn convolve3x3(src: &PixelBuffer, kernel: &[f32; 9]) -> PixelBuffer {
    let stride = src.stride();
    let raw = src.as_raw();
    apply_spatial_effect(src, |_, x, y| {
        let (x, y) = (x as usize, y as usize);
        let mut acc = [0.0f32; 3];
        for ky in 0..3 {
            let row = (y + ky - 1) * stride;
            for kx in 0..3 {
                let off = row + (x + kx - 1) * 4;
                let weight = kernel[ky * 3 + kx];
                acc[0] += raw[off] as f32 * weight;
                acc[1] += raw[off + 1] as f32 * weight;
                acc[2] += raw[off + 2] as f32 * weight;
            }
        }
        let centre = y * stride + x * 4;
        [
            acc[0].round().clamp(0.0, 255.0) as u8,
            acc[1].round().clamp(0.0, 255.0) as u8,
            acc[2].round().clamp(0.0, 255.0) as u8,
            raw[centre + 3],
        ]
    })
}

pub fn apply_convolution(src: &PixelBuffer, kind: ConvolutionKind) -> PixelBuffer {
    convolve3x3(src, kind.kernel())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    #[test]
    fn flat_image_survives_sharpen_and_zeroes_edges() {
        let src = PixelBuffer::new_filled(5, 5, Rgba([90, 90, 90, 200]));
        assert_eq!(apply_convolution(&src, ConvolutionKind::Sharpen), src);

        let edges = apply_convolution(&src, ConvolutionKind::EdgeDetect);
        assert_eq!(edges.get_pixel(2, 2), Rgba([0, 0, 0, 200]));
        // Border untouched.
        assert_eq!(edges.get_pixel(0, 0), Rgba([90, 90, 90, 200]));
        assert_eq!(edges.get_pixel(4, 2), Rgba([90, 90, 90, 200]));
    }

    #[test]
    fn tiny_buffers_are_returned_unchanged() {
        let src = PixelBuffer::new_filled(2, 7, Rgba([1, 2, 3, 4]));
        assert_eq!(apply_convolution(&src, ConvolutionKind::Emboss), src);
    }

    #[test]
    fn edge_detect_responds_to_a_spot() {
        let mut src = PixelBuffer::new_filled(5, 5, Rgba([0, 0, 0, 255]));
        src.put_pixel(2, 2, Rgba([20, 20, 20, 255]));
        let out = apply_convolution(&src, ConvolutionKind::EdgeDetect);
        assert_eq!(out.get_pixel(2, 2), Rgba([160, 160, 160, 255]));
        // Neighbour sees -20, clamped to 0.
        assert_eq!(out.get_pixel(1, 2), Rgba([0, 0, 0, 255]));
    }
}
