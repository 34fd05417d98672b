use image::{Rgba, RgbaImage, imageops};
use rayon::prelude::*;
use serde::Serialize;

use crate::error::{EditorError, EditorResult};

/// Largest canvas accepted by the raw / blank constructors (256 megapixels).
pub const MAX_PIXELS: u64 = 256_000_000;

// ============================================================================
// GEOMETRY
// ============================================================================

/// Axis-aligned integer rectangle in canvas coordinates.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct Rect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Rect {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self { x, y, width, height }
    }

    /// Exclusive right edge.
    pub fn right(&self) -> u32 {
        self.x + self.width
    }

    /// Exclusive bottom edge.
    pub fn bottom(&self) -> u32 {
        self.y + self.height
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Intersect a signed rectangle with a `w`×`h` canvas.
    /// Returns `None` when nothing of it lies on the canvas.
    pub fn clamp_signed(x: i64, y: i64, width: i64, height: i64, w: u32, h: u32) -> Option<Rect> {
        let x1 = x.clamp(0, w as i64);
        let y1 = y.clamp(0, h as i64);
        let x2 = x.saturating_add(width).min(w as i64);
        let y2 = y.saturating_add(height).min(h as i64);
        if x2 <= x1 || y2 <= y1 {
            return None;
        }
        Some(Rect::new(x1 as u32, y1 as u32, (x2 - x1) as u32, (y2 - y1) as u32))
    }
}

/// Canvas dimensions reported to the host shell.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

// ============================================================================
// PIXEL BUFFER – flat RGBA storage
// ============================================================================

/// Owned `width × height` RGBA buffer. The sample count is always
/// `width * height * 4`; every constructor upholds it.
#[derive(Clone, Debug, PartialEq)]
pub struct PixelBuffer {
    image: RgbaImage,
}

impl PixelBuffer {
    /// Fully transparent buffer.
    pub fn new(width: u32, height: u32) -> Self {
        Self { image: RgbaImage::new(width, height) }
    }

    pub fn new_filled(width: u32, height: u32, color: Rgba<u8>) -> Self {
        Self { image: RgbaImage::from_pixel(width, height, color) }
    }

    /// Wrap raw RGBA bytes, validating the length against the dimensions.
    pub fn from_raw(width: u32, height: u32, data: Vec<u8>) -> EditorResult<Self> {
        let expected = width as usize * height as usize * 4;
        if data.len() != expected {
            return Err(EditorError::InvalidRawBuffer { expected, actual: data.len() });
        }
        RgbaImage::from_raw(width, height, data)
            .map(Self::from_rgba_image)
            .ok_or(EditorError::InvalidRawBuffer { expected, actual: expected })
    }

    pub fn from_rgba_image(image: RgbaImage) -> Self {
        Self { image }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn dimensions(&self) -> Dimensions {
        Dimensions { width: self.width(), height: self.height() }
    }

    pub fn as_image(&self) -> &RgbaImage {
        &self.image
    }

    pub fn as_raw(&self) -> &[u8] {
        self.image.as_raw()
    }

    pub fn as_raw_mut(&mut self) -> &mut [u8] {
        &mut self.image
    }

    /// Bytes per row.
    pub fn stride(&self) -> usize {
        self.width() as usize * 4
    }

    pub fn get_pixel(&self, x: u32, y: u32) -> Rgba<u8> {
        *self.image.get_pixel(x, y)
    }

    /// Out-of-range reads return `None` rather than panicking.
    pub fn get_pixel_checked(&self, x: u32, y: u32) -> Option<Rgba<u8>> {
        self.image.get_pixel_checked(x, y).copied()
    }

    /// Writes outside the buffer are ignored.
    pub fn put_pixel(&mut self, x: u32, y: u32, pixel: Rgba<u8>) {
        if x < self.width() && y < self.height() {
            self.image.put_pixel(x, y, pixel);
        }
    }

    pub fn fill(&mut self, color: Rgba<u8>) {
        for p in self.image.pixels_mut() {
            *p = color;
        }
    }

    /// Copy a sub-rectangle out into a new buffer. The rectangle is clamped to
    /// the buffer first, so the result may be smaller than requested.
    pub fn extract_region(&self, rect: Rect) -> PixelBuffer {
        match Rect::clamp_signed(
            rect.x as i64,
            rect.y as i64,
            rect.width as i64,
            rect.height as i64,
            self.width(),
            self.height(),
        ) {
            Some(r) => Self::from_rgba_image(
                imageops::crop_imm(&self.image, r.x, r.y, r.width, r.height).to_image(),
            ),
            None => PixelBuffer::new(0, 0),
        }
    }

    /// Overwrite the pixels at (`dst_x`, `dst_y`) with `src`, clipping to the
    /// buffer. No blending is performed.
    pub fn insert_region(&mut self, src: &PixelBuffer, dst_x: i64, dst_y: i64) {
        let Some(clip) = Rect::clamp_signed(
            dst_x,
            dst_y,
            src.width() as i64,
            src.height() as i64,
            self.width(),
            self.height(),
        ) else {
            return;
        };
        let src_off_x = (clip.x as i64 - dst_x) as usize;
        let src_off_y = (clip.y as i64 - dst_y) as usize;
        let row_bytes = clip.width as usize * 4;
        let dst_stride = self.stride();
        let src_stride = src.stride();
        let src_raw = src.as_raw();
        let dst_raw = self.as_raw_mut();
        for row in 0..clip.height as usize {
            let s = (src_off_y + row) * src_stride + src_off_x * 4;
            let d = (clip.y as usize + row) * dst_stride + clip.x as usize * 4;
            dst_raw[d..d + row_bytes].copy_from_slice(&src_raw[s..s + row_bytes]);
        }
    }

    pub fn flip_horizontal(&mut self) {
        imageops::flip_horizontal_in_place(&mut self.image);
    }

    pub fn flip_vertical(&mut self) {
        imageops::flip_vertical_in_place(&mut self.image);
    }

    /// Bytes of pixel data owned by this buffer.
    pub fn memory_bytes(&self) -> usize {
        self.as_raw().len()
    }
}

// ============================================================================
// BLEND MODES
// ============================================================================

/// Per-layer compositing function. Serialised with its CSS-style name.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum BlendMode {
    #[default]
    Normal,
    Multiply,
    Screen,
    Overlay,
    Darken,
    Lighten,
    ColorDodge,
    ColorBurn,
    HardLight,
    SoftLight,
    Difference,
    Exclusion,
    Hue,
    Saturation,
    Color,
    Luminosity,
}

impl BlendMode {
    /// Returns all blend modes in menu order.
    pub fn all() -> &'static [BlendMode] {
        &[
            BlendMode::Normal,
            BlendMode::Multiply,
            BlendMode::Screen,
            BlendMode::Overlay,
            BlendMode::Darken,
            BlendMode::Lighten,
            BlendMode::ColorDodge,
            BlendMode::ColorBurn,
            BlendMode::HardLight,
            BlendMode::SoftLight,
            BlendMode::Difference,
            BlendMode::Exclusion,
            BlendMode::Hue,
            BlendMode::Saturation,
            BlendMode::Color,
            BlendMode::Luminosity,
        ]
    }

    pub fn name(&self) -> &'static str {
        match self {
            BlendMode::Normal => "normal",
            BlendMode::Multiply => "multiply",
            BlendMode::Screen => "screen",
            BlendMode::Overlay => "overlay",
            BlendMode::Darken => "darken",
            BlendMode::Lighten => "lighten",
            BlendMode::ColorDodge => "color-dodge",
            BlendMode::ColorBurn => "color-burn",
            BlendMode::HardLight => "hard-light",
            BlendMode::SoftLight => "soft-light",
            BlendMode::Difference => "difference",
            BlendMode::Exclusion => "exclusion",
            BlendMode::Hue => "hue",
            BlendMode::Saturation => "saturation",
            BlendMode::Color => "color",
            BlendMode::Luminosity => "luminosity",
        }
    }

    /// Total lookup by name (case-insensitive). Unknown names map to Normal.
    pub fn from_name(name: &str) -> Self {
        let lower = name.trim().to_ascii_lowercase();
        BlendMode::all()
            .iter()
            .copied()
            .find(|m| m.name() == lower)
            .unwrap_or(BlendMode::Normal)
    }

    fn is_non_separable(&self) -> bool {
        matches!(
            self,
            BlendMode::Hue | BlendMode::Saturation | BlendMode::Color | BlendMode::Luminosity
        )
    }
}

// ---------------------------------------------------------------------------
//  Per-pixel blend math (normalised 0..1 channels)
// ---------------------------------------------------------------------------

/// Source-over composite of `top` onto `base` with the given blend mode and
/// global opacity in 0..1.
pub fn blend_pixel(base: Rgba<u8>, top: Rgba<u8>, mode: BlendMode, opacity: f32) -> Rgba<u8> {
    // Fast path: fully transparent top pixel: nothing to blend
    if top[3] == 0 || opacity <= 0.0 {
        return base;
    }

    // Fast path: Normal blend, full opacity, fully opaque top pixel, just overwrite
    if mode == BlendMode::Normal && opacity >= 1.0 && top[3] == 255 {
        return top;
    }

    let opacity = opacity.clamp(0.0, 1.0);

    let cb = [base[0] as f32 / 255.0, base[1] as f32 / 255.0, base[2] as f32 / 255.0];
    let base_a = base[3] as f32 / 255.0;
    let cs = [top[0] as f32 / 255.0, top[1] as f32 / 255.0, top[2] as f32 / 255.0];
    let top_a = (top[3] as f32 / 255.0) * opacity;

    let blended = if mode.is_non_separable() {
        non_separable(mode, cb, cs)
    } else {
        [
            separable(mode, cb[0], cs[0]),
            separable(mode, cb[1], cs[1]),
            separable(mode, cb[2], cs[2]),
        ]
    };

    let out_a = top_a + base_a * (1.0 - top_a);
    if out_a <= 0.0 {
        return Rgba([0, 0, 0, 0]);
    }

    let mut out = [0u8; 4];
    for c in 0..3 {
        // Where the backdrop is transparent the source shows through unblended.
        let mixed = (1.0 - base_a) * cs[c] + base_a * blended[c];
        let v = (mixed * top_a + cb[c] * base_a * (1.0 - top_a)) / out_a;
        out[c] = (v * 255.0).round().clamp(0.0, 255.0) as u8;
    }
    out[3] = (out_a * 255.0).round().clamp(0.0, 255.0) as u8;
    Rgba(out)
}

fn separable(mode: BlendMode, base: f32, top: f32) -> f32 {
    match mode {
        BlendMode::Normal => top,
        BlendMode::Multiply => base * top,
        BlendMode::Screen => 1.0 - (1.0 - base) * (1.0 - top),
        BlendMode::Overlay => hard_light_channel(top, base),
        BlendMode::Darken => base.min(top),
        BlendMode::Lighten => base.max(top),
        BlendMode::ColorDodge => color_dodge_channel(base, top),
        BlendMode::ColorBurn => color_burn_channel(base, top),
        BlendMode::HardLight => hard_light_channel(base, top),
        BlendMode::SoftLight => soft_light_channel(base, top),
        BlendMode::Difference => (base - top).abs(),
        BlendMode::Exclusion => base + top - 2.0 * base * top,
        BlendMode::Hue | BlendMode::Saturation | BlendMode::Color | BlendMode::Luminosity => top,
    }
}

fn hard_light_channel(base: f32, top: f32) -> f32 {
    if top <= 0.5 {
        base * 2.0 * top
    } else {
        let s = 2.0 * top - 1.0;
        base + s - base * s
    }
}

fn color_dodge_channel(base: f32, top: f32) -> f32 {
    if base <= 0.0 {
        0.0
    } else if top >= 1.0 {
        1.0
    } else {
        (base / (1.0 - top)).min(1.0)
    }
}

fn color_burn_channel(base: f32, top: f32) -> f32 {
    if base >= 1.0 {
        1.0
    } else if top <= 0.0 {
        0.0
    } else {
        1.0 - ((1.0 - base) / top).min(1.0)
    }
}

/// W3C Soft Light formula.
fn soft_light_channel(base: f32, top: f32) -> f32 {
    if top <= 0.5 {
        base - (1.0 - 2.0 * top) * base * (1.0 - base)
    } else {
        let d = if base <= 0.25 {
            ((16.0 * base - 12.0) * base + 4.0) * base
        } else {
            base.sqrt()
        };
        base + (2.0 * top - 1.0) * (d - base)
    }
}

// Non-separable modes work on whole colours through luminosity / saturation
// decomposition (W3C compositing luminosity weights).

fn lum(c: [f32; 3]) -> f32 {
    0.3 * c[0] + 0.59 * c[1] + 0.11 * c[2]
}

fn clip_color(c: [f32; 3]) -> [f32; 3] {
    let l = lum(c);
    let n = c[0].min(c[1]).min(c[2]);
    let x = c[0].max(c[1]).max(c[2]);
    let mut out = c;
    if n < 0.0 {
        for v in &mut out {
            *v = l + (*v - l) * l / (l - n);
        }
    }
    if x > 1.0 {
        for v in &mut out {
            *v = l + (*v - l) * (1.0 - l) / (x - l);
        }
    }
    out
}

fn set_lum(c: [f32; 3], l: f32) -> [f32; 3] {
    let d = l - lum(c);
    clip_color([c[0] + d, c[1] + d, c[2] + d])
}

fn sat(c: [f32; 3]) -> f32 {
    c[0].max(c[1]).max(c[2]) - c[0].min(c[1]).min(c[2])
}

fn set_sat(c: [f32; 3], s: f32) -> [f32; 3] {
    let max = c[0].max(c[1]).max(c[2]);
    let min = c[0].min(c[1]).min(c[2]);
    let range = max - min;
    if range <= 0.0 {
        return [0.0; 3];
    }
    let mut out = [0.0; 3];
    for i in 0..3 {
        out[i] = (c[i] - min) * s / range;
    }
    out
}

fn non_separable(mode: BlendMode, cb: [f32; 3], cs: [f32; 3]) -> [f32; 3] {
    match mode {
        BlendMode::Hue => set_lum(set_sat(cs, sat(cb)), lum(cb)),
        BlendMode::Saturation => set_lum(set_sat(cb, sat(cs)), lum(cb)),
        BlendMode::Color => set_lum(cs, lum(cb)),
        BlendMode::Luminosity => set_lum(cb, lum(cs)),
        _ => cs,
    }
}

// ============================================================================
// LAYERS
// ============================================================================

/// An independently editable pixel surface.
#[derive(Clone, Debug)]
pub struct Layer {
    pub id: u64,
    pub name: String,
    pub pixels: PixelBuffer,
    /// 0..=100
    pub opacity: f32,
    pub blend_mode: BlendMode,
    pub visible: bool,
    pub locked: bool,
    pub is_background: bool,
}

impl Layer {
    pub fn new(id: u64, name: String, width: u32, height: u32, fill_color: Rgba<u8>) -> Self {
        Self::with_pixels(id, name, PixelBuffer::new_filled(width, height, fill_color))
    }

    pub fn with_pixels(id: u64, name: String, pixels: PixelBuffer) -> Self {
        Self {
            id,
            name,
            pixels,
            opacity: 100.0,
            blend_mode: BlendMode::Normal,
            visible: true,
            locked: false,
            is_background: false,
        }
    }

    /// Background layers start locked.
    pub fn background(id: u64, pixels: PixelBuffer) -> Self {
        let mut layer = Self::with_pixels(id, "Background".to_string(), pixels);
        layer.locked = true;
        layer.is_background = true;
        layer
    }

    pub fn set_opacity(&mut self, opacity: f32) {
        self.opacity = if opacity.is_nan() { 100.0 } else { opacity.clamp(0.0, 100.0) };
    }
}

/// Draw `layer` onto `target` with the layer's opacity and blend mode.
/// Invisible layers and layers whose size differs from the target are skipped.
pub fn draw_layer(target: &mut PixelBuffer, layer: &Layer) {
    if !layer.visible || layer.opacity <= 0.0 {
        return;
    }
    if layer.pixels.dimensions() != target.dimensions() {
        tracing::warn!(
            layer = layer.id,
            "layer size {:?} does not match canvas {:?}; skipped",
            layer.pixels.dimensions(),
            target.dimensions()
        );
        return;
    }
    let stride = target.stride();
    if stride == 0 || target.height() == 0 {
        return;
    }
    let opacity = layer.opacity / 100.0;
    let mode = layer.blend_mode;
    let src_raw = layer.pixels.as_raw();

    target
        .as_raw_mut()
        .par_chunks_mut(stride)
        .zip(src_raw.par_chunks(stride))
        .for_each(|(dst_row, src_row)| {
            for (d, s) in dst_row.chunks_exact_mut(4).zip(src_row.chunks_exact(4)) {
                let out = blend_pixel(
                    Rgba([d[0], d[1], d[2], d[3]]),
                    Rgba([s[0], s[1], s[2], s[3]]),
                    mode,
                    opacity,
                );
                d.copy_from_slice(&out.0);
            }
        });
}

// ============================================================================
// LAYER STACK – arena of layers, bottom (index 0) to top
// ============================================================================

/// Ordered stack of layers with one active index. Always holds at least one
/// layer and the active index always points at one of them.
#[derive(Clone, Debug)]
pub struct LayerStack {
    pub(crate) layers: Vec<Layer>,
    pub(crate) active_index: usize,
    pub(crate) width: u32,
    pub(crate) height: u32,
    pub(crate) next_id: u64,
}

impl LayerStack {
    /// A stack holding a single background layer built from `pixels`.
    pub fn new(pixels: PixelBuffer) -> Self {
        let (width, height) = (pixels.width(), pixels.height());
        Self {
            layers: vec![Layer::background(1, pixels)],
            active_index: 0,
            width,
            height,
            next_id: 2,
        }
    }

    pub(crate) fn alloc_id(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn dimensions(&self) -> Dimensions {
        Dimensions { width: self.width, height: self.height }
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    /// Never true; present for API symmetry with `len`.
    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    pub fn layer(&self, index: usize) -> Option<&Layer> {
        self.layers.get(index)
    }

    pub fn layer_mut(&mut self, index: usize) -> Option<&mut Layer> {
        self.layers.get_mut(index)
    }

    pub fn active_index(&self) -> usize {
        self.active_index
    }

    pub fn active_layer(&self) -> &Layer {
        &self.layers[self.active_index]
    }

    pub fn active_layer_mut(&mut self) -> &mut Layer {
        &mut self.layers[self.active_index]
    }

    /// Blend every visible layer bottom-to-top onto a transparent canvas.
    pub fn composite(&self) -> PixelBuffer {
        let mut out = PixelBuffer::new(self.width, self.height);
        for layer in &self.layers {
            draw_layer(&mut out, layer);
        }
        out
    }

    /// Replace every layer's pixels with `f(pixels)` and adopt the new size.
    /// All results must share one size; the first result defines it.
    pub fn replace_all<F>(&mut self, f: F)
    where
        F: Fn(&PixelBuffer) -> PixelBuffer + Sync,
    {
        let new_pixels: Vec<PixelBuffer> = self.layers.par_iter().map(|l| f(&l.pixels)).collect();
        if let Some(first) = new_pixels.first() {
            self.width = first.width();
            self.height = first.height();
        }
        for (layer, px) in self.layers.iter_mut().zip(new_pixels) {
            layer.pixels = px;
        }
    }

    /// Bytes of pixel data held by all layers.
    pub fn memory_bytes(&self) -> usize {
        self.layers.iter().map(|l| l.pixels.memory_bytes() + l.name.len()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BLACK: Rgba<u8> = Rgba([0, 0, 0, 255]);
    const WHITE: Rgba<u8> = Rgba([255, 255, 255, 255]);

    #[test]
    fn raw_buffer_length_is_validated() {
        assert!(PixelBuffer::from_raw(2, 2, vec![0; 16]).is_ok());
        match PixelBuffer::from_raw(2, 2, vec![0; 15]) {
            Err(EditorError::InvalidRawBuffer { expected, actual }) => {
                assert_eq!(expected, 16);
                assert_eq!(actual, 15);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn extract_and_insert_region_clip() {
        let mut buf = PixelBuffer::new_filled(4, 4, BLACK);
        let patch = PixelBuffer::new_filled(3, 3, WHITE);
        buf.insert_region(&patch, 2, 2);
        assert_eq!(buf.get_pixel(1, 1), BLACK);
        assert_eq!(buf.get_pixel(2, 2), WHITE);
        assert_eq!(buf.get_pixel(3, 3), WHITE);

        let sub = buf.extract_region(Rect::new(2, 2, 10, 10));
        assert_eq!(sub.dimensions(), Dimensions { width: 2, height: 2 });
        assert!(sub.as_raw().chunks(4).all(|p| p == [255, 255, 255, 255]));
    }

    #[test]
    fn blend_lookup_is_total() {
        assert_eq!(BlendMode::from_name("color-dodge"), BlendMode::ColorDodge);
        assert_eq!(BlendMode::from_name("Luminosity"), BlendMode::Luminosity);
        assert_eq!(BlendMode::from_name("vivid-light"), BlendMode::Normal);
        assert_eq!(BlendMode::from_name(""), BlendMode::Normal);
        for mode in BlendMode::all() {
            assert_eq!(BlendMode::from_name(mode.name()), *mode);
        }
    }

    #[test]
    fn half_opacity_white_over_black_is_mid_grey() {
        let out = blend_pixel(BLACK, WHITE, BlendMode::Normal, 0.5);
        assert_eq!(out, Rgba([128, 128, 128, 255]));
    }

    #[test]
    fn multiply_over_transparent_shows_source() {
        let red = Rgba([255, 0, 0, 255]);
        let out = blend_pixel(Rgba([0, 0, 0, 0]), red, BlendMode::Multiply, 1.0);
        assert_eq!(out, red);
    }

    #[test]
    fn separable_modes_match_reference_values() {
        let grey = Rgba([128, 128, 128, 255]);
        assert_eq!(blend_pixel(WHITE, grey, BlendMode::Multiply, 1.0), grey);
        assert_eq!(blend_pixel(BLACK, grey, BlendMode::Screen, 1.0), grey);
        assert_eq!(blend_pixel(WHITE, WHITE, BlendMode::Difference, 1.0), BLACK);
        assert_eq!(blend_pixel(BLACK, WHITE, BlendMode::Darken, 1.0), BLACK);
        assert_eq!(blend_pixel(BLACK, WHITE, BlendMode::Lighten, 1.0), WHITE);
    }

    fn rgb(r: u8, g: u8, b: u8) -> Rgba<u8> {
        Rgba([r, g, b, 255])
    }

    #[test]
    fn contrast_modes_match_reference_values() {
        let (base, top) = (rgb(64, 128, 200), rgb(200, 64, 128));
        assert_eq!(blend_pixel(base, top, BlendMode::Overlay, 1.0), rgb(100, 65, 200));
        assert_eq!(blend_pixel(base, top, BlendMode::HardLight, 1.0), rgb(173, 64, 200));
        assert_eq!(blend_pixel(base, top, BlendMode::ColorDodge, 1.0), rgb(255, 171, 255));
        assert_eq!(blend_pixel(base, top, BlendMode::ColorBurn, 1.0), rgb(11, 0, 145));
        assert_eq!(blend_pixel(base, top, BlendMode::Exclusion, 1.0), rgb(164, 128, 127));
    }

    #[test]
    fn soft_light_covers_both_backdrop_ranges() {
        // Backdrops above 0.25 take the square-root branch.
        assert_eq!(
            blend_pixel(rgb(64, 128, 200), rgb(200, 64, 128), BlendMode::SoftLight, 1.0),
            rgb(100, 96, 200)
        );
        // Red backdrop 20/255 sits under 0.25 with a bright source: polynomial branch.
        assert_eq!(
            blend_pixel(rgb(20, 230, 90), rgb(240, 10, 100), BlendMode::SoftLight, 1.0),
            rgb(58, 209, 77)
        );
    }

    #[test]
    fn dodge_and_burn_limits() {
        assert_eq!(color_dodge_channel(1.0, 0.0), 1.0);
        assert_eq!(color_dodge_channel(0.0, 1.0), 0.0);
        assert_eq!(color_dodge_channel(0.5, 1.0), 1.0);
        assert_eq!(color_burn_channel(1.0, 0.0), 1.0);
        assert_eq!(color_burn_channel(0.5, 0.0), 0.0);
        assert_eq!(color_burn_channel(0.0, 1.0), 0.0);

        assert_eq!(blend_pixel(BLACK, WHITE, BlendMode::ColorDodge, 1.0), BLACK);
        assert_eq!(blend_pixel(WHITE, BLACK, BlendMode::ColorBurn, 1.0), WHITE);
    }

    #[test]
    fn hue_and_saturation_match_reference_values() {
        assert_eq!(
            blend_pixel(rgb(64, 128, 200), rgb(200, 64, 128), BlendMode::Hue, 1.0),
            rgb(205, 69, 133)
        );
        assert_eq!(
            blend_pixel(rgb(20, 230, 90), rgb(240, 10, 100), BlendMode::Saturation, 1.0),
            rgb(7, 237, 84)
        );
        // A grey source has zero saturation, so the result is grey at the backdrop's luminosity.
        let out = blend_pixel(rgb(255, 0, 0), rgb(128, 128, 128), BlendMode::Saturation, 1.0);
        assert!(out[0] == out[1] && out[1] == out[2]);
        assert!((76..=77).contains(&out[0]));
    }

    #[test]
    fn luminosity_of_grey_keeps_backdrop_hue() {
        let red = Rgba([255, 0, 0, 255]);
        let out = blend_pixel(red, WHITE, BlendMode::Luminosity, 1.0);
        // Luminosity of white clips to white.
        assert_eq!(out, WHITE);
        let out = blend_pixel(red, BLACK, BlendMode::Color, 1.0);
        // Black has no hue or saturation, so the backdrop's luminosity remains as grey.
        assert_eq!(out[0], out[1]);
        assert_eq!(out[1], out[2]);
    }

    #[test]
    fn composite_skips_invisible_layers() {
        let mut stack = LayerStack::new(PixelBuffer::new_filled(3, 3, BLACK));
        let mut top = Layer::new(9, "top".into(), 3, 3, WHITE);
        top.visible = false;
        stack.layers.push(top);
        let out = stack.composite();
        assert_eq!(out.dimensions(), stack.dimensions());
        assert_eq!(out.get_pixel(1, 1), BLACK);
    }

    #[test]
    fn opacity_setter_clamps() {
        let mut layer = Layer::new(1, "l".into(), 1, 1, WHITE);
        layer.set_opacity(140.0);
        assert_eq!(layer.opacity, 100.0);
        layer.set_opacity(-3.0);
        assert_eq!(layer.opacity, 0.0);
    }
}
