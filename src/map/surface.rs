//! The render target the registry composites into.

use super::viewport::{CameraPose, Transition};
use crate::geo::{PickHit, Primitive, ProjectionMode};
use eframe::egui::{Pos2, Vec2};
use geo_types::Coord;
use serde::{Deserialize, Serialize};
use std::rc::Rc;

/// Light/dark color set selector.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Theme {
    #[default]
    Light,
    Dark,
}

impl Theme {
    pub fn from_dark_mode(dark: bool) -> Self {
        if dark {
            Theme::Dark
        } else {
            Theme::Light
        }
    }

    pub fn is_dark(&self) -> bool {
        *self == Theme::Dark
    }
}

/// Cursor state on the render root.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CursorStyle {
    #[default]
    Default,
    Pointer,
}

/// Raw pointer event forwarded to hover callbacks.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointerEvent {
    /// Screen position
    pub pos: Pos2,
    /// Geographic position under the pointer, if any
    pub geo: Option<Coord<f64>>,
}

/// Exclusively-owned render target.
///
/// The registry is the only writer; layer modules never touch it directly.
pub trait RenderSurface {
    /// Pixel size, `None` until the surface has been laid out.
    fn size(&self) -> Option<Vec2>;

    fn projection_mode(&self) -> ProjectionMode;

    /// Replaces the full draw list.
    fn set_layers(&mut self, layers: Vec<Rc<Primitive>>);

    /// Current camera, `None` before the first pose assignment.
    fn camera(&self) -> Option<CameraPose>;

    /// Jumps to `pose`, or animates there when `transition` is given.
    fn set_camera(&mut self, pose: CameraPose, transition: Option<Transition>);

    /// Hit test at a screen position.
    fn pick(&self, pos: Pos2) -> Option<PickHit>;

    fn set_cursor(&mut self, cursor: CursorStyle);
}
