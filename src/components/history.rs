use std::collections::VecDeque;

use crate::canvas::{LayerStack, PixelBuffer};
use crate::config::DEFAULT_MAX_HISTORY;

// ============================================================================
// SNAPSHOT: full-canvas state captured after a destructive operation
// ============================================================================

/// Immutable deep copy of the editor's pixel state at one point in time.
#[derive(Clone, Debug)]
pub struct HistorySnapshot {
    description: String,
    composite: PixelBuffer,
    layers: LayerStack,
}

impl HistorySnapshot {
    pub fn capture(description: &str, composite: &PixelBuffer, layers: &LayerStack) -> Self {
        Self {
            description: description.to_string(),
            composite: composite.clone(),
            layers: layers.clone(),
        }
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn composite(&self) -> &PixelBuffer {
        &self.composite
    }

    pub fn layers(&self) -> &LayerStack {
        &self.layers
    }

    fn memory_bytes(&self) -> usize {
        self.composite.memory_bytes() + self.layers.memory_bytes() + self.description.len()
    }
}

// ============================================================================
// HISTORY MANAGER: bounded linear snapshot list with a cursor
// ============================================================================

/// Snapshot history. `snapshots[cursor]` is the state currently shown; the
/// first entry is the baseline and can never be undone past.
#[derive(Debug)]
pub struct HistoryManager {
    snapshots: VecDeque<HistorySnapshot>,
    cursor: usize,
    max_history_size: usize,
    /// Running memory total across all snapshots.
    total_memory: usize,
}

impl Default for HistoryManager {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_HISTORY)
    }
}

impl HistoryManager {
    pub fn new(max_history_size: usize) -> Self {
        Self {
            snapshots: VecDeque::new(),
            cursor: 0,
            max_history_size: max_history_size.max(1),
            total_memory: 0,
        }
    }

    /// Record a new state. Everything after the cursor (the redo tail) is
    /// discarded first.
    pub fn save_state(&mut self, description: &str, composite: &PixelBuffer, layers: &LayerStack) {
        if !self.snapshots.is_empty() {
            for dropped in self.snapshots.drain(self.cursor + 1..) {
                self.total_memory = self.total_memory.saturating_sub(dropped.memory_bytes());
            }
        }

        let snap = HistorySnapshot::capture(description, composite, layers);
        self.total_memory += snap.memory_bytes();
        self.snapshots.push_back(snap);
        self.cursor = self.snapshots.len() - 1;

        self.prune();
        tracing::debug!(
            description,
            entries = self.snapshots.len(),
            bytes = self.total_memory,
            "history saved"
        );
    }

    /// Step back one state. `None` when already at the baseline.
    pub fn undo(&mut self) -> Option<&HistorySnapshot> {
        if !self.can_undo() {
            return None;
        }
        self.cursor -= 1;
        self.snapshots.get(self.cursor)
    }

    /// Step forward one state. `None` when already at the newest state.
    pub fn redo(&mut self) -> Option<&HistorySnapshot> {
        if !self.can_redo() {
            return None;
        }
        self.cursor += 1;
        self.snapshots.get(self.cursor)
    }

    pub fn can_undo(&self) -> bool {
        self.cursor > 0
    }

    pub fn can_redo(&self) -> bool {
        self.cursor + 1 < self.snapshots.len()
    }

    /// The state the cursor points at.
    pub fn current(&self) -> Option<&HistorySnapshot> {
        self.snapshots.get(self.cursor)
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    /// Bytes held by all snapshots.
    pub fn memory_usage(&self) -> usize {
        self.total_memory
    }

    /// Drop the oldest snapshots until the count limit holds.
    fn prune(&mut self) {
        while self.snapshots.len() > self.max_history_size {
            if let Some(removed) = self.snapshots.pop_front() {
                self.total_memory = self.total_memory.saturating_sub(removed.memory_bytes());
                self.cursor = self.cursor.saturating_sub(1);
            }
        }
    }

    pub fn clear(&mut self) {
        self.snapshots.clear();
        self.cursor = 0;
        self.total_memory = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    fn stack_with(value: u8) -> (PixelBuffer, LayerStack) {
        let px = PixelBuffer::new_filled(2, 2, Rgba([value, value, value, 255]));
        (px.clone(), LayerStack::new(px))
    }

    fn grey_of(snap: &HistorySnapshot) -> u8 {
        snap.composite().get_pixel(0, 0)[0]
    }

    #[test]
    fn undo_stops_at_baseline() {
        let mut history = HistoryManager::new(20);
        let (c, l) = stack_with(0);
        history.save_state("Load", &c, &l);
        assert!(!history.can_undo());
        assert!(history.undo().is_none());

        let (c, l) = stack_with(10);
        history.save_state("Brightness", &c, &l);
        assert_eq!(history.undo().map(grey_of), Some(0));
        assert!(history.undo().is_none());
        assert_eq!(history.redo().map(grey_of), Some(10));
        assert!(history.redo().is_none());
    }

    #[test]
    fn save_after_undo_discards_redo_tail() {
        let mut history = HistoryManager::new(20);
        for v in 0..3 {
            let (c, l) = stack_with(v);
            history.save_state("step", &c, &l);
        }
        history.undo();
        history.undo();
        let (c, l) = stack_with(99);
        history.save_state("branch", &c, &l);
        assert_eq!(history.len(), 2);
        assert!(!history.can_redo());
        assert_eq!(history.undo().map(grey_of), Some(0));
    }

    #[test]
    fn overflow_drops_oldest() {
        let n = 20;
        let mut history = HistoryManager::new(n);
        for v in 0..(n + 5) {
            let (c, l) = stack_with(v as u8);
            history.save_state("step", &c, &l);
        }
        assert_eq!(history.len(), n);
        let mut undos = 0;
        while history.undo().is_some() {
            undos += 1;
        }
        assert_eq!(undos, n - 1);
        assert_eq!(history.current().map(grey_of), Some(5));
    }

    #[test]
    fn memory_tracks_entries() {
        let mut history = HistoryManager::new(2);
        assert_eq!(history.memory_usage(), 0);
        let (c, l) = stack_with(1);
        history.save_state("a", &c, &l);
        let one = history.memory_usage();
        assert!(one > 0);
        history.save_state("b", &c, &l);
        history.save_state("c", &c, &l);
        assert_eq!(history.memory_usage(), one * 2);
        history.clear();
        assert_eq!(history.memory_usage(), 0);
        assert!(history.is_empty());
    }
}
