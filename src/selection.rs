//! Selection mask: a per-pixel 0..255 weight over the canvas that scopes
//! filters and paint operations.
//!
//! Construction (`select_*`) replaces the whole mask and activates it.
//! Modifiers (invert, grow, shrink, feather, select similar, transform) are
//! no-ops while the selection is inactive. Bounds are always either the
//! tight box of non-zero pixels or the clamped shape box.

use std::collections::HashSet;

use image::GrayImage;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::canvas::{PixelBuffer, Rect};
use crate::error::{EditorError, EditorResult};
use crate::ops::filters::{build_gaussian_kernel, separable_blur};

/// Vertex of a freehand (lasso) outline, in canvas pixels.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// Selection summary handed to the host shell.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectionInfo {
    pub active: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bounds: Option<Rect>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub feather: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub has_path: Option<bool>,
}

impl SelectionInfo {
    pub fn inactive() -> Self {
        Self { active: false, bounds: None, feather: None, has_path: None }
    }
}

#[derive(Clone, Debug)]
pub struct SelectionMask {
    mask: GrayImage,
    bounds: Option<Rect>,
    feather: u32,
    active: bool,
    path: Option<Vec<Point>>,
}

impl SelectionMask {
    /// Empty, inactive mask of the canvas size.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            mask: GrayImage::new(width, height),
            bounds: None,
            feather: 0,
            active: false,
            path: None,
        }
    }

    pub fn width(&self) -> u32 {
        self.mask.width()
    }

    pub fn height(&self) -> u32 {
        self.mask.height()
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn bounds(&self) -> Option<Rect> {
        self.bounds
    }

    pub fn feather(&self) -> u32 {
        self.feather
    }

    pub fn has_path(&self) -> bool {
        self.path.is_some()
    }

    /// Row-major mask weights, one byte per pixel.
    pub fn alpha(&self) -> &[u8] {
        self.mask.as_raw()
    }

    /// Mask weight at (x, y); 0 outside the canvas.
    pub fn value(&self, x: u32, y: u32) -> u8 {
        self.mask.get_pixel_checked(x, y).map_or(0, |p| p[0])
    }

    /// True when the selection is active and (x, y) carries a non-zero weight.
    pub fn is_selected(&self, x: i64, y: i64) -> bool {
        if !self.active || x < 0 || y < 0 {
            return false;
        }
        self.value(x as u32, y as u32) > 0
    }

    pub fn info(&self) -> SelectionInfo {
        if !self.active {
            return SelectionInfo::inactive();
        }
        SelectionInfo {
            active: true,
            bounds: self.bounds,
            feather: Some(self.feather),
            has_path: Some(self.has_path()),
        }
    }

    /// White RGBA image carrying the mask as its alpha channel, for overlays.
    pub fn mask_rgba(&self) -> Option<PixelBuffer> {
        if !self.active {
            return None;
        }
        let mut out = PixelBuffer::new(self.width(), self.height());
        for (px, &a) in out.as_raw_mut().chunks_exact_mut(4).zip(self.alpha()) {
            px.copy_from_slice(&[255, 255, 255, a]);
        }
        Some(out)
    }

    /// Start a fresh shape: clear the mask and forget any path.
    fn begin_shape(&mut self) {
        for p in self.mask.iter_mut() {
            *p = 0;
        }
        self.feather = 0;
        self.path = None;
        self.active = true;
    }

    fn fill_rect(&mut self, rect: Rect) {
        let w = self.width() as usize;
        let raw: &mut [u8] = &mut self.mask;
        for y in rect.y..rect.bottom() {
            let row = y as usize * w;
            raw[row + rect.x as usize..row + rect.right() as usize].fill(255);
        }
    }

    /// Clamp a float rectangle to the canvas using floor/ceil on its edges.
    /// Edges are clamped before the integer cast so huge extents stay in range.
    fn clamp_float_rect(&self, x: f32, y: f32, width: f32, height: f32) -> Option<Rect> {
        let (w, h) = (self.width() as f32, self.height() as f32);
        let x1 = x.floor().clamp(0.0, w) as i64;
        let y1 = y.floor().clamp(0.0, h) as i64;
        let x2 = (x + width).ceil().clamp(0.0, w) as i64;
        let y2 = (y + height).ceil().clamp(0.0, h) as i64;
        Rect::clamp_signed(x1, y1, x2 - x1, y2 - y1, self.width(), self.height())
    }

    // ========================================================================
    // CONSTRUCTION
    // ========================================================================

    pub fn select_rectangle(&mut self, x: f32, y: f32, width: f32, height: f32) {
        self.begin_shape();
        self.bounds = self.clamp_float_rect(x, y, width, height);
        if let Some(rect) = self.bounds {
            self.fill_rect(rect);
        }
    }

    /// Ellipse inscribed in the given box. Degenerate radii select nothing.
    pub fn select_ellipse(&mut self, x: f32, y: f32, width: f32, height: f32) {
        self.begin_shape();
        self.bounds = self.clamp_float_rect(x, y, width, height);
        let Some(rect) = self.bounds else { return };
        let rx = width / 2.0;
        let ry = height / 2.0;
        if rx <= 0.0 || ry <= 0.0 {
            return;
        }
        let cx = x + rx;
        let cy = y + ry;
        for py in rect.y..rect.bottom() {
            let dy = (py as f32 - cy) / ry;
            for px in rect.x..rect.right() {
                let dx = (px as f32 - cx) / rx;
                if dx * dx + dy * dy <= 1.0 {
                    self.mask.put_pixel(px, py, image::Luma([255]));
                }
            }
        }
    }

    /// Even-odd scanline fill of a closed polygon. Fewer than three points
    /// leaves the selection untouched.
    pub fn select_path(&mut self, points: &[Point]) {
        if points.len() < 3 {
            return;
        }
        self.begin_shape();

        let (w, h) = (self.width() as i64, self.height() as i64);
        let min_y = points.iter().map(|p| p.y).fold(f32::INFINITY, f32::min);
        let max_y = points.iter().map(|p| p.y).fold(f32::NEG_INFINITY, f32::max);
        let stride = w as usize;
        let mut crossings: Vec<f32> = Vec::new();

        let y_start = min_y.floor().clamp(0.0, h as f32) as i64;
        let y_end = max_y.ceil().clamp(0.0, h as f32) as i64;
        for y in y_start..=y_end.min(h - 1) {
            let yf = y as f32;
            crossings.clear();
            for (i, p1) in points.iter().enumerate() {
                let p2 = &points[(i + 1) % points.len()];
                if (p1.y <= yf && p2.y > yf) || (p2.y <= yf && p1.y > yf) {
                    crossings.push(p1.x + (yf - p1.y) * (p2.x - p1.x) / (p2.y - p1.y));
                }
            }
            crossings.sort_by(|a, b| a.total_cmp(b));

            let row = y as usize * stride;
            let raw: &mut [u8] = &mut self.mask;
            for pair in crossings.chunks_exact(2) {
                let x1 = (pair[0].floor() as i64).max(0);
                let x2 = (pair[1].ceil() as i64).min(w);
                if x2 > x1 {
                    raw[row + x1 as usize..row + x2 as usize].fill(255);
                }
            }
        }

        self.path = Some(points.to_vec());
        self.update_bounds();
    }

    /// Magic wand. Selects pixels of `image` whose RGB distance to the seed
    /// colour is within `tolerance`, either 4-connected to the seed or
    /// anywhere on the canvas.
    pub fn select_color(
        &mut self,
        image: &PixelBuffer,
        x: i64,
        y: i64,
        tolerance: f32,
        contiguous: bool,
    ) -> EditorResult<()> {
        let (w, h) = (image.width(), image.height());
        if x < 0 || y < 0 || x >= w as i64 || y >= h as i64 {
            return Err(EditorError::OutOfBounds { x, y });
        }
        if w != self.width() || h != self.height() {
            self.mask = GrayImage::new(w, h);
        }
        self.begin_shape();

        let seed = image.get_pixel(x as u32, y as u32);
        let target = [seed[0], seed[1], seed[2]];
        let src = image.as_raw();
        let (wu, hu) = (w as usize, h as usize);

        if contiguous {
            let mut visited = vec![false; wu * hu];
            let mut stack: Vec<(usize, usize)> = vec![(x as usize, y as usize)];
            visited[y as usize * wu + x as usize] = true;
            let raw: &mut [u8] = &mut self.mask;

            while let Some((px, py)) = stack.pop() {
                let idx = py * wu + px;
                if !within_tolerance(&src[idx * 4..idx * 4 + 3], target, tolerance) {
                    continue;
                }
                raw[idx] = 255;

                let mut push = |nx: usize, ny: usize| {
                    let ni = ny * wu + nx;
                    if !visited[ni] {
                        visited[ni] = true;
                        stack.push((nx, ny));
                    }
                };
                if px + 1 < wu {
                    push(px + 1, py);
                }
                if px > 0 {
                    push(px - 1, py);
                }
                if py + 1 < hu {
                    push(px, py + 1);
                }
                if py > 0 {
                    push(px, py - 1);
                }
            }
        } else {
            let raw: &mut [u8] = &mut self.mask;
            raw.par_chunks_mut(wu).enumerate().for_each(|(py, row)| {
                for (px, m) in row.iter_mut().enumerate() {
                    let idx = (py * wu + px) * 4;
                    if within_tolerance(&src[idx..idx + 3], target, tolerance) {
                        *m = 255;
                    }
                }
            });
        }

        self.update_bounds();
        Ok(())
    }

    pub fn select_all(&mut self) {
        self.begin_shape();
        for p in self.mask.iter_mut() {
            *p = 255;
        }
        self.bounds = Some(Rect::new(0, 0, self.width(), self.height()))
            .filter(|r| !r.is_empty());
    }

    pub fn deselect(&mut self) {
        for p in self.mask.iter_mut() {
            *p = 0;
        }
        self.bounds = None;
        self.feather = 0;
        self.active = false;
        self.path = None;
    }

    // ========================================================================
    // MODIFIERS
    // ========================================================================

    pub fn invert(&mut self) {
        if !self.active {
            return;
        }
        for p in self.mask.iter_mut() {
            *p = 255 - *p;
        }
        self.update_bounds();
    }

    /// Dilate: every pixel within `pixels` (square window) of a selected
    /// pixel becomes fully selected.
    pub fn grow(&mut self, pixels: u32) {
        if !self.active {
            return;
        }
        let (w, h) = (self.width() as usize, self.height() as usize);
        if w == 0 || h == 0 {
            return;
        }
        let p = pixels as usize;
        let src = self.mask.as_raw();

        // Square windows are separable: any-selected along rows, then columns.
        let mut horiz = vec![0u8; w * h];
        horiz.par_chunks_mut(w).enumerate().for_each(|(y, row_out)| {
            let row_in = &src[y * w..(y + 1) * w];
            for (x, out) in row_out.iter_mut().enumerate() {
                let x0 = x.saturating_sub(p);
                let x1 = (x + p).min(w - 1);
                if row_in[x0..=x1].iter().any(|&v| v > 0) {
                    *out = 255;
                }
            }
        });

        let mut out = vec![0u8; w * h];
        out.par_chunks_mut(w).enumerate().for_each(|(y, row_out)| {
            let y0 = y.saturating_sub(p);
            let y1 = (y + p).min(h - 1);
            for (x, v) in row_out.iter_mut().enumerate() {
                if (y0..=y1).any(|yy| horiz[yy * w + x] > 0) {
                    *v = 255;
                }
            }
        });

        self.replace_mask(out);
    }

    /// Erode: a selected pixel survives only if its whole square window lies
    /// on the canvas and is selected. Survivors become fully selected.
    pub fn shrink(&mut self, pixels: u32) {
        if !self.active {
            return;
        }
        let (w, h) = (self.width() as usize, self.height() as usize);
        if w == 0 || h == 0 {
            return;
        }
        let p = pixels as usize;
        let src = self.mask.as_raw();

        let mut horiz = vec![0u8; w * h];
        horiz.par_chunks_mut(w).enumerate().for_each(|(y, row_out)| {
            let row_in = &src[y * w..(y + 1) * w];
            for (x, out) in row_out.iter_mut().enumerate() {
                if x < p || x + p >= w {
                    continue;
                }
                if row_in[x - p..=x + p].iter().all(|&v| v > 0) {
                    *out = 255;
                }
            }
        });

        let mut out = vec![0u8; w * h];
        out.par_chunks_mut(w).enumerate().for_each(|(y, row_out)| {
            if y < p || y + p >= h {
                return;
            }
            for (x, v) in row_out.iter_mut().enumerate() {
                if (y - p..=y + p).all(|yy| horiz[yy * w + x] > 0) {
                    *v = 255;
                }
            }
        });

        self.replace_mask(out);
    }

    /// Soften the mask edge with a Gaussian of the given radius.
    pub fn apply_feather(&mut self, radius: u32) {
        if !self.active || radius == 0 {
            return;
        }
        let kernel = build_gaussian_kernel(radius);
        let blurred = separable_blur(
            self.mask.as_raw(),
            self.width() as usize,
            self.height() as usize,
            1,
            &kernel,
        );
        self.feather = radius;
        if let Some(mask) = GrayImage::from_raw(self.width(), self.height(), blurred) {
            self.mask = mask;
        }
    }

    /// Add every pixel whose colour is within `tolerance` of any colour
    /// currently under the selection.
    pub fn select_similar(&mut self, image: &PixelBuffer, tolerance: f32) {
        if !self.active || image.width() != self.width() || image.height() != self.height() {
            return;
        }
        let src = image.as_raw();
        let palette: Vec<[u8; 3]> = self
            .alpha()
            .iter()
            .enumerate()
            .filter(|&(_, &m)| m > 0)
            .map(|(i, _)| [src[i * 4], src[i * 4 + 1], src[i * 4 + 2]])
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();
        if palette.is_empty() {
            return;
        }

        let w = self.width() as usize;
        let raw: &mut [u8] = &mut self.mask;
        raw.par_chunks_mut(w).enumerate().for_each(|(y, row)| {
            for (x, m) in row.iter_mut().enumerate() {
                let idx = (y * w + x) * 4;
                let rgb = &src[idx..idx + 3];
                if palette.iter().any(|&c| within_tolerance(rgb, c, tolerance)) {
                    *m = 255;
                }
            }
        });

        self.update_bounds();
    }

    /// Remap the selected region from its current bounds into the rectangle
    /// (x, y, width, height) with nearest-neighbour sampling.
    pub fn transform(&mut self, x: f32, y: f32, width: f32, height: f32) {
        if !self.active || width <= 0.0 || height <= 0.0 {
            return;
        }
        let Some(b) = self.bounds else { return };
        let sx = width / b.width as f32;
        let sy = height / b.height as f32;
        let (w, h) = (self.width() as usize, self.height() as usize);
        if w == 0 || h == 0 {
            return;
        }
        let src = self.mask.as_raw();

        let mut out = vec![0u8; w * h];
        out.par_chunks_mut(w).enumerate().for_each(|(py, row_out)| {
            let src_y = ((py as f32 - y) / sy + b.y as f32).floor();
            if src_y < 0.0 || src_y >= h as f32 {
                return;
            }
            let src_row = src_y as usize * w;
            for (px, v) in row_out.iter_mut().enumerate() {
                let src_x = ((px as f32 - x) / sx + b.x as f32).floor();
                if src_x >= 0.0 && src_x < w as f32 {
                    *v = src[src_row + src_x as usize];
                }
            }
        });

        if let Some(mask) = GrayImage::from_raw(self.width(), self.height(), out) {
            self.mask = mask;
        }
        self.update_bounds();
    }

    fn replace_mask(&mut self, data: Vec<u8>) {
        if let Some(mask) = GrayImage::from_raw(self.width(), self.height(), data) {
            self.mask = mask;
        }
        self.update_bounds();
    }

    /// Recompute the tight bounding box of non-zero weights.
    pub fn update_bounds(&mut self) {
        let (w, h) = (self.width(), self.height());
        let mut min_x = w;
        let mut min_y = h;
        let mut max_x = 0u32;
        let mut max_y = 0u32;
        let mut any = false;
        for (y, row) in self.mask.as_raw().chunks(w.max(1) as usize).enumerate() {
            let Some(first) = row.iter().position(|&v| v > 0) else {
                continue;
            };
            let last = row.iter().rposition(|&v| v > 0).unwrap_or(first);
            any = true;
            min_x = min_x.min(first as u32);
            max_x = max_x.max(last as u32);
            min_y = min_y.min(y as u32);
            max_y = max_y.max(y as u32);
        }
        self.bounds = any.then(|| Rect::new(min_x, min_y, max_x - min_x + 1, max_y - min_y + 1));
    }
}

fn within_tolerance(rgb: &[u8], target: [u8; 3], tolerance: f32) -> bool {
    let dr = rgb[0] as f32 - target[0] as f32;
    let dg = rgb[1] as f32 - target[1] as f32;
    let db = rgb[2] as f32 - target[2] as f32;
    (dr * dr + dg * dg + db * db).sqrt() <= tolerance
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    fn selected_count(mask: &SelectionMask) -> usize {
        mask.alpha().iter().filter(|&&v| v > 0).count()
    }

    #[test]
    fn rectangle_rounds_outward_and_clamps() {
        let mut mask = SelectionMask::new(10, 10);
        mask.select_rectangle(1.5, 2.2, 3.0, 3.0);
        assert_eq!(mask.bounds(), Some(Rect::new(1, 2, 4, 4)));
        assert_eq!(selected_count(&mask), 16);

        mask.select_rectangle(-5.0, -5.0, 8.0, 100.0);
        assert_eq!(mask.bounds(), Some(Rect::new(0, 0, 3, 10)));
        assert!(mask.is_active());
    }

    #[test]
    fn ellipse_stays_inside_its_box() {
        let mut mask = SelectionMask::new(20, 20);
        mask.select_ellipse(2.0, 2.0, 10.0, 10.0);
        assert!(mask.is_selected(7, 7));
        assert!(!mask.is_selected(2, 2));
        assert!(!mask.is_selected(13, 7));
        let b = mask.bounds().unwrap();
        assert_eq!(b, Rect::new(2, 2, 10, 10));
    }

    #[test]
    fn huge_extents_clamp_without_overflow() {
        let mut mask = SelectionMask::new(6, 5);
        mask.select_rectangle(-1e19, 0.0, 2e19, 5.0);
        assert_eq!(mask.bounds(), Some(Rect::new(0, 0, 6, 5)));
        assert_eq!(selected_count(&mask), 30);

        mask.select_ellipse(-1e19, 0.0, 2e19, 5.0);
        assert!(mask.is_active());
        assert_eq!(mask.bounds(), Some(Rect::new(0, 0, 6, 5)));

        mask.select_rectangle(1e19, 1e19, 10.0, 10.0);
        assert_eq!(mask.bounds(), None);
        assert_eq!(selected_count(&mask), 0);
    }

    #[test]
    fn degenerate_ellipse_selects_nothing() {
        let mut mask = SelectionMask::new(8, 8);
        mask.select_ellipse(2.0, 2.0, 0.0, 4.0);
        assert_eq!(selected_count(&mask), 0);
    }

    #[test]
    fn path_fill_and_short_paths() {
        let mut mask = SelectionMask::new(10, 10);
        mask.select_path(&[Point::new(0.0, 0.0), Point::new(1.0, 1.0)]);
        assert!(!mask.is_active());

        let square = [
            Point::new(2.0, 2.0),
            Point::new(6.0, 2.0),
            Point::new(6.0, 6.0),
            Point::new(2.0, 6.0),
        ];
        mask.select_path(&square);
        assert!(mask.has_path());
        assert_eq!(mask.bounds(), Some(Rect::new(2, 2, 4, 4)));
        assert_eq!(selected_count(&mask), 16);
    }

    #[test]
    fn path_outside_canvas_is_clipped() {
        let mut mask = SelectionMask::new(5, 5);
        let tri = [Point::new(-10.0, -10.0), Point::new(20.0, -10.0), Point::new(-10.0, 20.0)];
        mask.select_path(&tri);
        let b = mask.bounds().unwrap();
        assert!(b.right() <= 5 && b.bottom() <= 5);
    }

    #[test]
    fn tall_path_only_scans_canvas_rows() {
        let mut mask = SelectionMask::new(4, 4);
        let strip = [
            Point::new(1.0, -1e9),
            Point::new(3.0, -1e9),
            Point::new(3.0, 1e9),
            Point::new(1.0, 1e9),
        ];
        mask.select_path(&strip);
        assert_eq!(mask.bounds(), Some(Rect::new(1, 0, 2, 4)));
        assert_eq!(selected_count(&mask), 8);

        let below = [Point::new(0.0, 10.0), Point::new(4.0, 10.0), Point::new(2.0, 1e9)];
        mask.select_path(&below);
        assert_eq!(selected_count(&mask), 0);
    }

    #[test]
    fn mask_overlay_is_white_with_mask_alpha() {
        let mut mask = SelectionMask::new(3, 2);
        assert!(mask.mask_rgba().is_none());
        mask.select_rectangle(1.0, 0.0, 1.0, 1.0);
        let overlay = mask.mask_rgba().unwrap();
        assert_eq!((overlay.width(), overlay.height()), (3, 2));
        assert_eq!(overlay.get_pixel(1, 0), Rgba([255, 255, 255, 255]));
        assert_eq!(overlay.get_pixel(0, 0), Rgba([255, 255, 255, 0]));
        assert_eq!(overlay.get_pixel(2, 1)[3], 0);
    }

    #[test]
    fn magic_wand_contiguous_vs_global() {
        // Two red patches separated by a blue column.
        let mut img = PixelBuffer::new_filled(5, 1, Rgba([255, 0, 0, 255]));
        img.put_pixel(2, 0, Rgba([0, 0, 255, 255]));
        let mut mask = SelectionMask::new(5, 1);

        mask.select_color(&img, 0, 0, 10.0, true).unwrap();
        assert_eq!(selected_count(&mask), 2);

        mask.select_color(&img, 0, 0, 10.0, false).unwrap();
        assert_eq!(selected_count(&mask), 4);
        assert!(!mask.is_selected(2, 0));

        assert!(matches!(
            mask.select_color(&img, 9, 0, 10.0, true),
            Err(EditorError::OutOfBounds { x: 9, y: 0 })
        ));
    }

    #[test]
    fn invert_is_an_involution() {
        let mut mask = SelectionMask::new(6, 6);
        mask.select_rectangle(1.0, 1.0, 2.0, 3.0);
        let before = mask.alpha().to_vec();
        mask.invert();
        assert_eq!(mask.bounds(), Some(Rect::new(0, 0, 6, 6)));
        mask.invert();
        assert_eq!(mask.alpha(), &before[..]);
        assert_eq!(mask.bounds(), Some(Rect::new(1, 1, 2, 3)));
    }

    #[test]
    fn grow_then_shrink_restores_interior_rectangle() {
        let mut mask = SelectionMask::new(30, 30);
        mask.select_rectangle(10.0, 10.0, 6.0, 4.0);
        let before = mask.alpha().to_vec();
        mask.grow(3);
        assert_eq!(mask.bounds(), Some(Rect::new(7, 7, 12, 10)));
        mask.shrink(3);
        assert_eq!(mask.alpha(), &before[..]);
    }

    #[test]
    fn shrink_treats_canvas_edge_as_unselected() {
        let mut mask = SelectionMask::new(8, 8);
        mask.select_all();
        mask.shrink(1);
        assert_eq!(mask.bounds(), Some(Rect::new(1, 1, 6, 6)));
    }

    #[test]
    fn feather_softens_edges() {
        let mut mask = SelectionMask::new(20, 20);
        mask.select_rectangle(5.0, 5.0, 10.0, 10.0);
        mask.apply_feather(3);
        assert_eq!(mask.feather(), 3);
        let edge = mask.value(5, 10);
        assert!(edge > 0 && edge < 255);
        assert_eq!(mask.value(10, 10), 255);
    }

    #[test]
    fn modifiers_ignore_inactive_selection() {
        let mut mask = SelectionMask::new(4, 4);
        mask.invert();
        mask.grow(2);
        assert!(!mask.is_active());
        assert_eq!(selected_count(&mask), 0);
        assert_eq!(mask.info(), SelectionInfo::inactive());
    }

    #[test]
    fn select_similar_extends_to_matching_colours() {
        let mut img = PixelBuffer::new_filled(4, 4, Rgba([0, 0, 0, 255]));
        img.put_pixel(3, 3, Rgba([250, 250, 250, 255]));
        img.put_pixel(0, 0, Rgba([255, 255, 255, 255]));
        let mut mask = SelectionMask::new(4, 4);
        mask.select_rectangle(0.0, 0.0, 1.0, 1.0);
        mask.select_similar(&img, 16.0);
        assert!(mask.is_selected(3, 3));
        assert!(!mask.is_selected(1, 1));
        assert_eq!(mask.bounds(), Some(Rect::new(0, 0, 4, 4)));
    }

    #[test]
    fn transform_moves_and_scales() {
        let mut mask = SelectionMask::new(20, 20);
        mask.select_rectangle(2.0, 2.0, 2.0, 2.0);
        mask.transform(10.0, 10.0, 4.0, 4.0);
        assert_eq!(mask.bounds(), Some(Rect::new(10, 10, 4, 4)));
        assert!(!mask.is_selected(2, 2));
    }

    #[test]
    fn info_serialises_camel_case() {
        let mut mask = SelectionMask::new(4, 4);
        mask.select_all();
        let json = serde_json::to_value(mask.info()).unwrap();
        assert_eq!(json["active"], true);
        assert_eq!(json["hasPath"], false);
        assert_eq!(json["bounds"]["width"], 4);
    }
}
