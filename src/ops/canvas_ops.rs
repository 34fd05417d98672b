// ============================================================================
// CANVAS-LEVEL OPERATIONS: add / delete / duplicate / reorder / merge layers
// ============================================================================

use image::Rgba;
use serde::Serialize;

use crate::canvas::{BlendMode, Layer, LayerStack, PixelBuffer, draw_layer};
use crate::error::{EditorError, EditorResult};
use crate::ops::transform;

/// Per-layer summary handed to the host shell, bottom layer first.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LayerInfo {
    pub id: u64,
    pub name: String,
    pub visible: bool,
    pub opacity: f32,
    pub blend_mode: BlendMode,
    pub locked: bool,
    pub is_background: bool,
    pub is_active: bool,
    pub index: usize,
}

impl LayerStack {
    pub fn layer_info(&self) -> Vec<LayerInfo> {
        self.layers
            .iter()
            .enumerate()
            .map(|(index, l)| LayerInfo {
                id: l.id,
                name: l.name.clone(),
                visible: l.visible,
                opacity: l.opacity,
                blend_mode: l.blend_mode,
                locked: l.locked,
                is_background: l.is_background,
                is_active: index == self.active_index,
                index,
            })
            .collect()
    }

    fn check_index(&self, index: usize) -> EditorResult<()> {
        if index >= self.layers.len() {
            return Err(EditorError::InvalidLayerIndex(index));
        }
        Ok(())
    }

    /// Add a transparent layer, directly above the active one or on top of
    /// the stack. The new layer becomes active; its index is returned.
    pub fn add_layer(&mut self, name: Option<&str>, insert_above: bool) -> usize {
        let name = match name {
            Some(n) if !n.is_empty() => n.to_string(),
            _ => format!("Layer {}", self.layers.len()),
        };
        let id = self.alloc_id();
        let layer = Layer::new(id, name, self.width, self.height, Rgba([0, 0, 0, 0]));
        let idx = if insert_above {
            (self.active_index + 1).min(self.layers.len())
        } else {
            self.layers.len()
        };
        self.layers.insert(idx, layer);
        self.active_index = idx;
        tracing::info!(index = idx, id, "layer added");
        idx
    }

    /// Remove a layer. The last remaining layer cannot be deleted, and neither
    /// can the background while other layers exist.
    pub fn delete_layer(&mut self, index: usize) -> EditorResult<()> {
        if self.layers.len() <= 1 {
            return Err(EditorError::CannotDeleteLastLayer);
        }
        self.check_index(index)?;
        if self.layers[index].is_background {
            return Err(EditorError::CannotDeleteBackground);
        }
        let removed = self.layers.remove(index);
        if self.active_index >= self.layers.len() {
            self.active_index = self.layers.len() - 1;
        }
        tracing::info!(index, id = removed.id, "layer deleted");
        Ok(())
    }

    /// Deep copy of a layer inserted directly above it; the copy becomes
    /// active. Returns the copy's index.
    pub fn duplicate_layer(&mut self, index: usize) -> EditorResult<usize> {
        self.check_index(index)?;
        let id = self.alloc_id();
        let src = &self.layers[index];
        let mut dup = Layer::with_pixels(id, format!("{} copy", src.name), src.pixels.clone());
        dup.opacity = src.opacity;
        dup.blend_mode = src.blend_mode;
        dup.visible = src.visible;

        let new_idx = index + 1;
        self.layers.insert(new_idx, dup);
        self.active_index = new_idx;
        tracing::info!(source = index, index = new_idx, id, "layer duplicated");
        Ok(new_idx)
    }

    /// Swap `index` with `index - 1`. False at the bottom or on a bad index.
    pub fn move_layer_up(&mut self, index: usize) -> bool {
        if index == 0 || index >= self.layers.len() {
            return false;
        }
        self.swap_layers(index, index - 1);
        true
    }

    /// Swap `index` with `index + 1`. False at the top or on a bad index.
    pub fn move_layer_down(&mut self, index: usize) -> bool {
        if index + 1 >= self.layers.len() {
            return false;
        }
        self.swap_layers(index, index + 1);
        true
    }

    fn swap_layers(&mut self, a: usize, b: usize) {
        self.layers.swap(a, b);
        if self.active_index == a {
            self.active_index = b;
        } else if self.active_index == b {
            self.active_index = a;
        }
    }

    pub fn set_active_layer(&mut self, index: usize) -> EditorResult<()> {
        self.check_index(index)?;
        self.active_index = index;
        Ok(())
    }

    /// Returns `false` for an out-of-range index.
    pub fn set_layer_opacity(&mut self, index: usize, opacity: f32) -> bool {
        match self.layers.get_mut(index) {
            Some(layer) => {
                layer.set_opacity(opacity);
                true
            }
            None => false,
        }
    }

    /// Unknown mode names fall back to normal.
    pub fn set_layer_blend_mode(&mut self, index: usize, mode: &str) -> bool {
        match self.layers.get_mut(index) {
            Some(layer) => {
                layer.blend_mode = BlendMode::from_name(mode);
                true
            }
            None => false,
        }
    }

    pub fn toggle_layer_visibility(&mut self, index: usize) -> bool {
        match self.layers.get_mut(index) {
            Some(layer) => {
                layer.visible = !layer.visible;
                true
            }
            None => false,
        }
    }

    pub fn rename_layer(&mut self, index: usize, name: &str) -> bool {
        match self.layers.get_mut(index) {
            Some(layer) => {
                layer.name = name.to_string();
                true
            }
            None => false,
        }
    }

    /// Composite `index` onto the layer beneath it (each with its own opacity
    /// and blend mode) and drop the upper layer.
    pub fn merge_down(&mut self, index: usize) -> EditorResult<()> {
        if index == 0 || index >= self.layers.len() {
            return Err(EditorError::CannotMerge(index));
        }
        let mut merged = PixelBuffer::new(self.width, self.height);
        draw_layer(&mut merged, &self.layers[index - 1]);
        draw_layer(&mut merged, &self.layers[index]);

        self.layers[index - 1].pixels = merged;
        self.layers.remove(index);
        if self.active_index >= self.layers.len() {
            self.active_index = self.layers.len() - 1;
        }
        tracing::info!(index, "layer merged down");
        Ok(())
    }

    /// Collapse every layer into a single locked background layer.
    pub fn flatten(&mut self) {
        let composite = self.composite();
        let id = self.alloc_id();
        self.layers = vec![Layer::background(id, composite)];
        self.active_index = 0;
        tracing::info!("image flattened");
    }

    /// Resample every layer to `width × height` with bilinear filtering.
    pub fn resize_all(&mut self, width: u32, height: u32) {
        self.replace_all(|px| transform::resize(px, width, height));
    }
}
