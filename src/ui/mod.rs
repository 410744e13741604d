//! Host UI for the native map viewer.

mod canvas;
pub mod colors;

pub use canvas::{render_canvas, CanvasContext, EguiSurface, SurfaceState};
