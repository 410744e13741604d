//! Layer modules that turn airports and legs into primitives.
//!
//! Each module registers with a [`LayerRegistry`](crate::map::LayerRegistry)
//! on construction, pushes its primitives on every render, and deregisters
//! on `destroy` or drop.

mod airport;
mod basemap;
mod leg;
mod overview;
mod picking;
mod style;

pub use airport::{AirportLayer, AirportPatch, AirportProps, HIGHLIGHT_LABEL_PRIORITY};
pub use basemap::{BaseMapLayer, BaseMapProps};
pub use leg::{LegLayer, LegPatch, LegProps};
pub use overview::{LegClass, OverviewLayer, OverviewPatch, OverviewProps, HIGHLIGHT_DELAY};
pub use picking::PickingColorMap;
pub use style::{
    point_pairs, style_spec, HaloPart, LayerStack, PickSettings, StackKey, StrokeSpec, StyleSpec,
    Technique, DEPTH_BIAS_STEP, ORDERING_EPSILON, PLAN_ELEVATION,
};

// Composite draw order; airports above legs
pub const BASEMAP_Z_ORDER: i32 = 0;
pub const OVERVIEW_Z_ORDER: i32 = 10;
pub const LEG_Z_ORDER: i32 = 20;
pub const AIRPORT_Z_ORDER: i32 = 30;
