// ============================================================================
// SELECTION PAINT OPERATIONS: copy / cut / delete / fill / stroke
// ============================================================================
//
// Every function here is a no-op (returns `None` / `false`) when the mask is
// inactive or does not match the buffer size.

use image::Rgba;
use rayon::prelude::*;

use crate::canvas::{BlendMode, PixelBuffer, blend_pixel};
use crate::selection::SelectionMask;

fn usable<'a>(target: &PixelBuffer, mask: &'a SelectionMask) -> Option<&'a SelectionMask> {
    (mask.is_active() && mask.width() == target.width() && mask.height() == target.height())
        .then_some(mask)
}

/// Copy the selection's bounding box with each pixel's alpha scaled by the
/// mask weight.
pub fn copy_selection(src: &PixelBuffer, mask: &SelectionMask) -> Option<PixelBuffer> {
    let mask = usable(src, mask)?;
    let bounds = mask.bounds()?;
    let mut out = src.extract_region(bounds);
    let w = out.width() as usize;
    if w == 0 {
        return Some(out);
    }
    out.as_raw_mut()
        .chunks_exact_mut(w * 4)
        .enumerate()
        .for_each(|(row, px_row)| {
            for (col, px) in px_row.chunks_exact_mut(4).enumerate() {
                let m = mask.value(bounds.x + col as u32, bounds.y + row as u32) as u32;
                px[3] = ((px[3] as u32 * m + 127) / 255) as u8;
            }
        });
    Some(out)
}

/// Scale every channel by `1 - mask/255`, fading selected pixels to
/// transparent black.
pub fn delete_selection(target: &mut PixelBuffer, mask: &SelectionMask) -> bool {
    let Some(mask) = usable(target, mask) else {
        return false;
    };
    let stride = target.stride();
    let w = target.width() as usize;
    if stride == 0 {
        return false;
    }
    let alpha = mask.alpha();
    target
        .as_raw_mut()
        .par_chunks_mut(stride)
        .enumerate()
        .for_each(|(y, row)| {
            for (x, px) in row.chunks_exact_mut(4).enumerate() {
                let m = alpha[y * w + x];
                if m == 0 {
                    continue;
                }
                let keep = 1.0 - m as f32 / 255.0;
                for c in px.iter_mut() {
                    *c = (*c as f32 * keep).round() as u8;
                }
            }
        });
    true
}

/// Cut = copy followed by delete. `None` when nothing is selected.
pub fn cut_selection(target: &mut PixelBuffer, mask: &SelectionMask) -> Option<PixelBuffer> {
    let copied = copy_selection(target, mask)?;
    delete_selection(target, mask);
    Some(copied)
}

/// Mix `color` into every selected pixel by mask weight.
pub fn fill_selection(target: &mut PixelBuffer, mask: &SelectionMask, color: Rgba<u8>) -> bool {
    let Some(mask) = usable(target, mask) else {
        return false;
    };
    let stride = target.stride();
    let w = target.width() as usize;
    if stride == 0 {
        return false;
    }
    let alpha = mask.alpha();
    target
        .as_raw_mut()
        .par_chunks_mut(stride)
        .enumerate()
        .for_each(|(y, row)| {
            for (x, px) in row.chunks_exact_mut(4).enumerate() {
                let m = alpha[y * w + x];
                if m == 0 {
                    continue;
                }
                let a = m as f32 / 255.0;
                for c in 0..4 {
                    let v = color[c] as f32 * a + px[c] as f32 * (1.0 - a);
                    px[c] = v.round().clamp(0.0, 255.0) as u8;
                }
            }
        });
    true
}

/// Selected pixels with at least one in-canvas 4-neighbour that is unselected.
pub fn edge_pixels(mask: &SelectionMask) -> Vec<(u32, u32)> {
    let (w, h) = (mask.width() as usize, mask.height() as usize);
    let alpha = mask.alpha();
    let mut edges = Vec::new();
    for y in 0..h {
        for x in 0..w {
            let idx = y * w + x;
            if alpha[idx] == 0 {
                continue;
            }
            let is_edge = (x > 0 && alpha[idx - 1] == 0)
                || (x + 1 < w && alpha[idx + 1] == 0)
                || (y > 0 && alpha[idx - w] == 0)
                || (y + 1 < h && alpha[idx + w] == 0);
            if is_edge {
                edges.push((x as u32, y as u32));
            }
        }
    }
    edges
}

/// Outline the selection: a `width × width` square of `color` is stamped,
/// centred, on every edge pixel.
pub fn stroke_selection(
    target: &mut PixelBuffer,
    mask: &SelectionMask,
    color: Rgba<u8>,
    width: u32,
) -> bool {
    let Some(mask) = usable(target, mask) else {
        return false;
    };
    if mask.bounds().is_none() {
        return false;
    }
    let side = width.max(1) as i64;
    let before = (side - 1) / 2;
    let (cw, ch) = (target.width() as i64, target.height() as i64);

    let mut stamp = vec![false; (cw * ch) as usize];
    for (ex, ey) in edge_pixels(mask) {
        let x0 = (ex as i64 - before).max(0);
        let y0 = (ey as i64 - before).max(0);
        let x1 = (ex as i64 - before + side).min(cw);
        let y1 = (ey as i64 - before + side).min(ch);
        for y in y0..y1 {
            for x in x0..x1 {
                stamp[(y * cw + x) as usize] = true;
            }
        }
    }

    for (i, _) in stamp.iter().enumerate().filter(|&(_, &s)| s) {
        let (x, y) = ((i as i64 % cw) as u32, (i as i64 / cw) as u32);
        let out = blend_pixel(target.get_pixel(x, y), color, BlendMode::Normal, 1.0);
        target.put_pixel(x, y, out);
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canvas::Rect;

    const WHITE: Rgba<u8> = Rgba([255, 255, 255, 255]);

    fn rect_mask(w: u32, h: u32, r: (f32, f32, f32, f32)) -> SelectionMask {
        let mut mask = SelectionMask::new(w, h);
        mask.select_rectangle(r.0, r.1, r.2, r.3);
        mask
    }

    #[test]
    fn inactive_mask_is_a_noop() {
        let mut buf = PixelBuffer::new_filled(4, 4, WHITE);
        let mask = SelectionMask::new(4, 4);
        assert!(copy_selection(&buf, &mask).is_none());
        assert!(!delete_selection(&mut buf, &mask));
        assert!(!fill_selection(&mut buf, &mask, Rgba([0, 0, 0, 255])));
        assert!(!stroke_selection(&mut buf, &mask, Rgba([0, 0, 0, 255]), 1));
        assert_eq!(buf, PixelBuffer::new_filled(4, 4, WHITE));
    }

    #[test]
    fn cut_copies_then_clears() {
        let mut buf = PixelBuffer::new_filled(6, 6, WHITE);
        let mask = rect_mask(6, 6, (1.0, 1.0, 2.0, 3.0));
        let copied = cut_selection(&mut buf, &mask).unwrap();
        assert_eq!(copied.dimensions().width, 2);
        assert_eq!(copied.dimensions().height, 3);
        assert_eq!(copied.get_pixel(0, 0), WHITE);
        assert_eq!(buf.get_pixel(1, 1), Rgba([0, 0, 0, 0]));
        assert_eq!(buf.get_pixel(0, 0), WHITE);
    }

    #[test]
    fn fill_only_touches_selection() {
        let mut buf = PixelBuffer::new_filled(6, 6, WHITE);
        let mask = rect_mask(6, 6, (0.0, 0.0, 3.0, 6.0));
        let red = Rgba([255, 0, 0, 255]);
        assert!(fill_selection(&mut buf, &mask, red));
        assert_eq!(buf.get_pixel(2, 5), red);
        assert_eq!(buf.get_pixel(3, 0), WHITE);
    }

    #[test]
    fn stroke_marks_inner_edge() {
        let mut buf = PixelBuffer::new_filled(10, 10, WHITE);
        let mask = rect_mask(10, 10, (2.0, 2.0, 5.0, 5.0));
        let black = Rgba([0, 0, 0, 255]);
        assert!(stroke_selection(&mut buf, &mask, black, 1));
        assert_eq!(buf.get_pixel(2, 4), black);
        assert_eq!(buf.get_pixel(4, 4), WHITE);
        assert_eq!(buf.get_pixel(1, 4), WHITE);
        assert_eq!(edge_pixels(&mask).len(), 16);
        assert_eq!(mask.bounds(), Some(Rect::new(2, 2, 5, 5)));
    }
}
