//! Map core: layer registry, viewport control, render surface, widgets.

mod registry;
mod surface;
mod viewport;
mod widgets;

pub use registry::{LayerId, LayerModule, LayerRegistry};
pub use surface::{CursorStyle, PointerEvent, RenderSurface, Theme};
pub use viewport::{
    fit_bounds, transition_duration_ms, CameraMove, CameraPose, FitOptions, Padding, PendingFit,
    Transition, ViewportController, DEFAULT_POSE, HOME_ZOOM, MIN_PADDING, SINGLE_POINT_ZOOM,
    TRANSITION_MS_PER_OCTAVE,
};
pub use widgets::{
    GeoAnchoredOverlay, GeoWidget, OverlayProps, WidgetId, WidgetRegistry, HIDE_GRACE,
    OFFSCREEN_FACTOR,
};
