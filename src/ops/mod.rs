pub mod adjustments;
pub mod canvas_ops;
pub mod clipboard;
pub mod effects;
pub mod filters;
pub mod shapes;
pub mod transform;
