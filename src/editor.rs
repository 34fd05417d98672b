// ============================================================================
// EDITOR: one editing session (layers, selection, history, export)
// ============================================================================
//
// The host shell owns an `Editor` and drives it through the methods below.
// Every method except the constructors and the read-only history flags fails
// with `EditorError::NotLoaded` until `load` or `new_blank` has succeeded.
//
// Pixel and layer state is covered by undo/redo; the selection is not.

use image::Rgba;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::canvas::{Dimensions, LayerStack, PixelBuffer};
use crate::components::history::HistoryManager;
use crate::config::EditorConfig;
use crate::error::{EditorError, EditorResult};
use crate::io::{self, ExportFormat, ImageSource};
use crate::ops::adjustments;
use crate::ops::canvas_ops::LayerInfo;
use crate::ops::clipboard;
use crate::ops::effects::{self, ConvolutionKind};
use crate::ops::filters::{self, apply_masked};
use crate::ops::shapes::{self, ShapeKind, ShapeStyle, parse_hex_color};
use crate::ops::transform;
use crate::selection::{Point, SelectionInfo, SelectionMask};

const WHITE: Rgba<u8> = Rgba([255, 255, 255, 255]);

/// Live state of a loaded image.
struct Session {
    layers: LayerStack,
    selection: SelectionMask,
    history: HistoryManager,
    composite: PixelBuffer,
    original: PixelBuffer,
}

impl Session {
    fn start(pixels: PixelBuffer, max_history: usize) -> Self {
        let (w, h) = (pixels.width(), pixels.height());
        let layers = LayerStack::new(pixels.clone());
        let composite = layers.composite();
        let mut history = HistoryManager::new(max_history);
        history.save_state("Open image", &composite, &layers);
        Self {
            layers,
            selection: SelectionMask::new(w, h),
            history,
            composite,
            original: pixels,
        }
    }

    fn recomposite(&mut self) {
        self.composite = self.layers.composite();
    }

    /// Recomposite and push one history snapshot.
    fn commit(&mut self, description: &str) {
        self.recomposite();
        self.history.save_state(description, &self.composite, &self.layers);
    }

    /// Start a fresh, inactive selection if the canvas size changed.
    fn sync_selection(&mut self) {
        let (w, h) = (self.layers.width(), self.layers.height());
        if self.selection.width() != w || self.selection.height() != h {
            self.selection = SelectionMask::new(w, h);
        }
    }
}

/// A single editing session.
pub struct Editor {
    session_id: Uuid,
    config: EditorConfig,
    state: Option<Session>,
}

impl Default for Editor {
    fn default() -> Self {
        Self::new(EditorConfig::default())
    }
}

impl Editor {
    pub fn new(config: EditorConfig) -> Self {
        Self { session_id: Uuid::new_v4(), config: config.normalized(), state: None }
    }

    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    pub fn config(&self) -> &EditorConfig {
        &self.config
    }

    pub fn is_loaded(&self) -> bool {
        self.state.is_some()
    }

    fn session(&self) -> EditorResult<&Session> {
        self.state.as_ref().ok_or(EditorError::NotLoaded)
    }

    fn session_mut(&mut self) -> EditorResult<&mut Session> {
        self.state.as_mut().ok_or(EditorError::NotLoaded)
    }

    // ========================================================================
    // SESSION LIFECYCLE
    // ========================================================================

    /// Decode `source` and start a new session on it. On failure the editor
    /// keeps whatever state it had before the call.
    pub fn load(&mut self, source: ImageSource<'_>) -> EditorResult<Dimensions> {
        let pixels = io::decode(source).inspect_err(|e| warn!(error = %e, "image load failed"))?;
        Ok(self.begin(pixels))
    }

    /// Start a new session on a white canvas.
    pub fn new_blank(&mut self, width: u32, height: u32) -> EditorResult<Dimensions> {
        io::check_dimensions(width, height)?;
        Ok(self.begin(PixelBuffer::new_filled(width, height, WHITE)))
    }

    fn begin(&mut self, pixels: PixelBuffer) -> Dimensions {
        let dims = pixels.dimensions();
        self.session_id = Uuid::new_v4();
        self.state = Some(Session::start(pixels, self.config.max_history));
        info!(session = %self.session_id, width = dims.width, height = dims.height, "image loaded");
        dims
    }

    /// Throw away every edit and go back to the image as loaded.
    pub fn reset(&mut self) -> EditorResult<Dimensions> {
        let s = self.session_mut()?;
        s.layers = LayerStack::new(s.original.clone());
        s.sync_selection();
        s.commit("Reset");
        info!("editor reset to original image");
        Ok(s.layers.dimensions())
    }

    /// Step back one snapshot. `false` when there is nothing to undo.
    pub fn undo(&mut self) -> EditorResult<bool> {
        let s = self.session_mut()?;
        let Some(snapshot) = s.history.undo() else {
            return Ok(false);
        };
        s.layers = snapshot.layers().clone();
        s.composite = snapshot.composite().clone();
        debug!(state = snapshot.description(), "undo");
        s.sync_selection();
        Ok(true)
    }

    /// Step forward one snapshot. `false` when there is nothing to redo.
    pub fn redo(&mut self) -> EditorResult<bool> {
        let s = self.session_mut()?;
        let Some(snapshot) = s.history.redo() else {
            return Ok(false);
        };
        s.layers = snapshot.layers().clone();
        s.composite = snapshot.composite().clone();
        debug!(state = snapshot.description(), "redo");
        s.sync_selection();
        Ok(true)
    }

    // ========================================================================
    // FILTERS: applied to the active layer, scoped by the selection
    // ========================================================================

    fn apply_filter<F>(&mut self, description: &str, filter: F) -> EditorResult<()>
    where
        F: FnOnce(&PixelBuffer) -> PixelBuffer,
    {
        let s = self.session_mut()?;
        debug!(filter = description, layer = s.layers.active_index(), "applying filter");
        let source = &s.layers.active_layer().pixels;
        let result = apply_masked(source, filter(source), Some(&s.selection));
        s.layers.active_layer_mut().pixels = result;
        s.commit(description);
        Ok(())
    }

    pub fn brightness(&mut self, value: f32) -> EditorResult<()> {
        self.apply_filter("Brightness", |px| adjustments::brightness(px, value))
    }

    pub fn contrast(&mut self, value: f32) -> EditorResult<()> {
        self.apply_filter("Contrast", |px| adjustments::contrast(px, value))
    }

    pub fn saturation(&mut self, value: f32) -> EditorResult<()> {
        self.apply_filter("Saturation", |px| adjustments::saturation(px, value))
    }

    pub fn grayscale(&mut self) -> EditorResult<()> {
        self.apply_filter("Grayscale", adjustments::grayscale)
    }

    pub fn sepia(&mut self) -> EditorResult<()> {
        self.apply_filter("Sepia", adjustments::sepia)
    }

    pub fn invert(&mut self) -> EditorResult<()> {
        self.apply_filter("Invert Colors", adjustments::invert)
    }

    /// Gaussian blur. A radius of 0 changes nothing and records no history.
    pub fn blur(&mut self, radius: u32) -> EditorResult<()> {
        self.session()?;
        if radius == 0 {
            return Ok(());
        }
        self.apply_filter("Gaussian Blur", |px| filters::gaussian_blur(px, radius))
    }

    pub fn sharpen(&mut self) -> EditorResult<()> {
        self.convolve(ConvolutionKind::Sharpen)
    }

    pub fn edge_detect(&mut self) -> EditorResult<()> {
        self.convolve(ConvolutionKind::EdgeDetect)
    }

    pub fn emboss(&mut self) -> EditorResult<()> {
        self.convolve(ConvolutionKind::Emboss)
    }

    pub fn convolve(&mut self, kind: ConvolutionKind) -> EditorResult<()> {
        self.apply_filter(kind.name(), |px| effects::apply_convolution(px, kind))
    }

    // ========================================================================
    // TRANSFORMS: every layer, canvas size follows
    // ========================================================================

    fn apply_transform<F>(&mut self, description: &str, f: F) -> EditorResult<Dimensions>
    where
        F: FnOnce(&mut LayerStack),
    {
        let s = self.session_mut()?;
        f(&mut s.layers);
        s.sync_selection();
        s.commit(description);
        let dims = s.layers.dimensions();
        info!(op = description, width = dims.width, height = dims.height, "canvas transformed");
        Ok(dims)
    }

    pub fn resize(
        &mut self,
        width: Option<u32>,
        height: Option<u32>,
        maintain_aspect: bool,
    ) -> EditorResult<Dimensions> {
        let current = self.session()?.layers.dimensions();
        let (w, h) = transform::resize_target(current, width, height, maintain_aspect)?;
        io::check_dimensions(w, h)?;
        self.apply_transform("Resize Image", |layers| layers.resize_all(w, h))
    }

    /// Crop to the part of (x, y, width, height) that overlaps the canvas.
    pub fn crop(&mut self, x: i64, y: i64, width: i64, height: i64) -> EditorResult<Dimensions> {
        let current = self.session()?.layers.dimensions();
        let rect = transform::crop_rect(current, x, y, width, height)?;
        self.apply_transform("Crop", |layers| layers.replace_all(|px| transform::crop(px, rect)))
    }

    /// Clockwise rotation by `degrees`; the canvas grows to fit.
    pub fn rotate(&mut self, degrees: f32) -> EditorResult<Dimensions> {
        let current = self.session()?.layers.dimensions();
        transform::rotation_target(current, degrees)?;
        self.apply_transform("Rotate", |layers| layers.replace_all(|px| transform::rotate(px, degrees)))
    }

    pub fn flip_horizontal(&mut self) -> EditorResult<Dimensions> {
        self.apply_transform("Flip Horizontal", |layers| {
            layers.replace_all(|px| {
                let mut out = px.clone();
                out.flip_horizontal();
                out
            })
        })
    }

    pub fn flip_vertical(&mut self) -> EditorResult<Dimensions> {
        self.apply_transform("Flip Vertical", |layers| {
            layers.replace_all(|px| {
                let mut out = px.clone();
                out.flip_vertical();
                out
            })
        })
    }

    // ========================================================================
    // LAYERS
    // ========================================================================

    pub fn add_layer(&mut self, name: Option<&str>, insert_above: bool) -> EditorResult<Vec<LayerInfo>> {
        let s = self.session_mut()?;
        s.layers.add_layer(name, insert_above);
        s.commit("Add Layer");
        Ok(s.layers.layer_info())
    }

    pub fn delete_layer(&mut self, index: usize) -> EditorResult<Vec<LayerInfo>> {
        let s = self.session_mut()?;
        s.layers.delete_layer(index).inspect_err(|e| warn!(index, error = %e, "delete rejected"))?;
        s.commit("Delete Layer");
        Ok(s.layers.layer_info())
    }

    pub fn duplicate_layer(&mut self, index: usize) -> EditorResult<Vec<LayerInfo>> {
        let s = self.session_mut()?;
        s.layers.duplicate_layer(index)?;
        s.commit("Duplicate Layer");
        Ok(s.layers.layer_info())
    }

    /// Swap with the layer below. Only a real move is recorded.
    pub fn move_layer_up(&mut self, index: usize) -> EditorResult<Vec<LayerInfo>> {
        let s = self.session_mut()?;
        if s.layers.move_layer_up(index) {
            s.commit("Move Layer");
        }
        Ok(s.layers.layer_info())
    }

    /// Swap with the layer above. Only a real move is recorded.
    pub fn move_layer_down(&mut self, index: usize) -> EditorResult<Vec<LayerInfo>> {
        let s = self.session_mut()?;
        if s.layers.move_layer_down(index) {
            s.commit("Move Layer");
        }
        Ok(s.layers.layer_info())
    }

    pub fn set_active_layer(&mut self, index: usize) -> EditorResult<Vec<LayerInfo>> {
        let s = self.session_mut()?;
        s.layers.set_active_layer(index)?;
        Ok(s.layers.layer_info())
    }

    pub fn set_layer_opacity(&mut self, index: usize, opacity: f32) -> EditorResult<Vec<LayerInfo>> {
        let s = self.session_mut()?;
        if s.layers.set_layer_opacity(index, opacity) {
            s.commit("Layer Opacity");
        }
        Ok(s.layers.layer_info())
    }

    pub fn set_layer_blend_mode(&mut self, index: usize, mode: &str) -> EditorResult<Vec<LayerInfo>> {
        let s = self.session_mut()?;
        if s.layers.set_layer_blend_mode(index, mode) {
            s.commit("Blend Mode");
        }
        Ok(s.layers.layer_info())
    }

    /// Not recorded in history.
    pub fn toggle_layer_visibility(&mut self, index: usize) -> EditorResult<Vec<LayerInfo>> {
        let s = self.session_mut()?;
        if s.layers.toggle_layer_visibility(index) {
            s.recomposite();
        }
        Ok(s.layers.layer_info())
    }

    /// Not recorded in history.
    pub fn rename_layer(&mut self, index: usize, name: &str) -> EditorResult<Vec<LayerInfo>> {
        let s = self.session_mut()?;
        s.layers.rename_layer(index, name);
        Ok(s.layers.layer_info())
    }

    pub fn merge_down(&mut self, index: usize) -> EditorResult<Vec<LayerInfo>> {
        let s = self.session_mut()?;
        s.layers.merge_down(index)?;
        s.commit("Merge Down");
        Ok(s.layers.layer_info())
    }

    pub fn flatten(&mut self) -> EditorResult<Vec<LayerInfo>> {
        let s = self.session_mut()?;
        s.layers.flatten();
        s.commit("Flatten Image");
        Ok(s.layers.layer_info())
    }

    // ========================================================================
    // SELECTION: never recorded in history
    // ========================================================================

    fn with_selection<F>(&mut self, f: F) -> EditorResult<SelectionInfo>
    where
        F: FnOnce(&mut SelectionMask),
    {
        let s = self.session_mut()?;
        f(&mut s.selection);
        Ok(s.selection.info())
    }

    pub fn select_rectangle(&mut self, x: f32, y: f32, width: f32, height: f32) -> EditorResult<SelectionInfo> {
        self.with_selection(|m| m.select_rectangle(x, y, width, height))
    }

    pub fn select_ellipse(&mut self, x: f32, y: f32, width: f32, height: f32) -> EditorResult<SelectionInfo> {
        self.with_selection(|m| m.select_ellipse(x, y, width, height))
    }

    /// Freehand polygon; fewer than three points leave the selection alone.
    pub fn select_path(&mut self, points: &[Point]) -> EditorResult<SelectionInfo> {
        self.with_selection(|m| m.select_path(points))
    }

    /// Magic wand on the composite. `tolerance` defaults to the configured one.
    pub fn magic_wand(
        &mut self,
        x: i64,
        y: i64,
        tolerance: Option<f32>,
        contiguous: bool,
    ) -> EditorResult<SelectionInfo> {
        let tolerance = tolerance.unwrap_or(self.config.default_tolerance);
        let s = self.session_mut()?;
        s.selection.select_color(&s.composite, x, y, tolerance, contiguous)?;
        Ok(s.selection.info())
    }

    /// Extend the selection to every composite pixel matching a colour
    /// already under it.
    pub fn select_similar(&mut self, tolerance: Option<f32>) -> EditorResult<SelectionInfo> {
        let tolerance = tolerance.unwrap_or(self.config.default_tolerance);
        let s = self.session_mut()?;
        s.selection.select_similar(&s.composite, tolerance);
        Ok(s.selection.info())
    }

    pub fn select_all(&mut self) -> EditorResult<SelectionInfo> {
        self.with_selection(SelectionMask::select_all)
    }

    pub fn deselect(&mut self) -> EditorResult<SelectionInfo> {
        self.with_selection(SelectionMask::deselect)
    }

    pub fn invert_selection(&mut self) -> EditorResult<SelectionInfo> {
        self.with_selection(SelectionMask::invert)
    }

    pub fn grow_selection(&mut self, pixels: u32) -> EditorResult<SelectionInfo> {
        self.with_selection(|m| m.grow(pixels))
    }

    pub fn shrink_selection(&mut self, pixels: u32) -> EditorResult<SelectionInfo> {
        self.with_selection(|m| m.shrink(pixels))
    }

    pub fn feather_selection(&mut self, radius: u32) -> EditorResult<SelectionInfo> {
        self.with_selection(|m| m.apply_feather(radius))
    }

    /// Scale and move the selection so its bounds become (x, y, width, height).
    pub fn transform_selection(&mut self, x: f32, y: f32, width: f32, height: f32) -> EditorResult<SelectionInfo> {
        self.with_selection(|m| m.transform(x, y, width, height))
    }

    // ========================================================================
    // SELECTION PAINT OPS: act on the active layer
    // ========================================================================

    /// Fill with a `#RRGGBB` / `#RRGGBBAA` colour. `false` with no selection.
    pub fn fill_selection(&mut self, color: &str) -> EditorResult<bool> {
        self.session()?;
        let color = parse_hex_color(color)?;
        self.fill_selection_rgba(color)
    }

    pub fn fill_selection_rgba(&mut self, color: Rgba<u8>) -> EditorResult<bool> {
        let s = self.session_mut()?;
        let changed = clipboard::fill_selection(&mut s.layers.active_layer_mut().pixels, &s.selection, color);
        if changed {
            s.commit("Fill Selection");
        }
        Ok(changed)
    }

    pub fn delete_selection(&mut self) -> EditorResult<bool> {
        let s = self.session_mut()?;
        let changed = clipboard::delete_selection(&mut s.layers.active_layer_mut().pixels, &s.selection);
        if changed {
            s.commit("Delete Selection");
        }
        Ok(changed)
    }

    /// Selected part of the active layer, cropped to the selection bounds.
    pub fn copy_selection(&self) -> EditorResult<Option<PixelBuffer>> {
        let s = self.session()?;
        Ok(clipboard::copy_selection(&s.layers.active_layer().pixels, &s.selection))
    }

    pub fn cut_selection(&mut self) -> EditorResult<Option<PixelBuffer>> {
        let s = self.session_mut()?;
        let cut = clipboard::cut_selection(&mut s.layers.active_layer_mut().pixels, &s.selection);
        if cut.is_some() {
            s.commit("Cut Selection");
        }
        Ok(cut)
    }

    pub fn stroke_selection(&mut self, color: &str, width: u32) -> EditorResult<bool> {
        let s = self.session_mut()?;
        let color = parse_hex_color(color)?;
        let changed =
            clipboard::stroke_selection(&mut s.layers.active_layer_mut().pixels, &s.selection, color, width);
        if changed {
            s.commit("Stroke Selection");
        }
        Ok(changed)
    }

    /// Rasterise a shape onto the active layer.
    pub fn draw_shape(
        &mut self,
        kind: ShapeKind,
        x: f32,
        y: f32,
        width: f32,
        height: f32,
        style: &ShapeStyle,
    ) -> EditorResult<()> {
        let s = self.session_mut()?;
        shapes::draw_shape(&mut s.layers.active_layer_mut().pixels, kind, x, y, width, height, style);
        s.commit("Draw Shape");
        Ok(())
    }

    // ========================================================================
    // QUERIES
    // ========================================================================

    pub fn dimensions(&self) -> EditorResult<Dimensions> {
        Ok(self.session()?.layers.dimensions())
    }

    pub fn layer_info(&self) -> EditorResult<Vec<LayerInfo>> {
        Ok(self.session()?.layers.layer_info())
    }

    pub fn layers(&self) -> EditorResult<&LayerStack> {
        Ok(&self.session()?.layers)
    }

    pub fn selection_info(&self) -> EditorResult<SelectionInfo> {
        Ok(self.session()?.selection.info())
    }

    /// Raw mask alpha, row-major, when a selection is active.
    pub fn selection_mask(&self) -> EditorResult<Option<&[u8]>> {
        let selection = &self.session()?.selection;
        Ok(selection.is_active().then(|| selection.alpha()))
    }

    pub fn composite(&self) -> EditorResult<&PixelBuffer> {
        Ok(&self.session()?.composite)
    }

    pub fn history_len(&self) -> usize {
        self.state.as_ref().map_or(0, |s| s.history.len())
    }

    pub fn history_memory_usage(&self) -> usize {
        self.state.as_ref().map_or(0, |s| s.history.memory_usage())
    }

    pub fn can_undo(&self) -> bool {
        self.state.as_ref().is_some_and(|s| s.history.can_undo())
    }

    pub fn can_redo(&self) -> bool {
        self.state.as_ref().is_some_and(|s| s.history.can_redo())
    }

    // ========================================================================
    // EXPORT
    // ========================================================================

    fn export_settings(&self, format: Option<&str>, quality: Option<f32>) -> EditorResult<(ExportFormat, f32)> {
        let format = ExportFormat::from_name(format.unwrap_or(&self.config.default_format))?;
        Ok((format, quality.unwrap_or(self.config.default_quality)))
    }

    /// Encoded composite. `None` arguments use the configured defaults.
    pub fn get_buffer(&self, format: Option<&str>, quality: Option<f32>) -> EditorResult<Vec<u8>> {
        let s = self.session()?;
        let (format, quality) = self.export_settings(format, quality)?;
        let bytes = io::encode(&s.composite, format, quality)?;
        info!(format = format.extension(), bytes = bytes.len(), "composite exported");
        Ok(bytes)
    }

    pub fn get_data_url(&self, format: Option<&str>, quality: Option<f32>) -> EditorResult<String> {
        let s = self.session()?;
        let (format, quality) = self.export_settings(format, quality)?;
        io::encode_data_url(&s.composite, format, quality)
    }
}
