//! Geographic primitives and math for the map surface.
//!
//! This module provides the coordinate helpers, the flat/globe projection,
//! the renderable primitive types pushed through the layer registry, and the
//! egui painter that draws a composited primitive list.

mod primitive;
pub(crate) mod projection;
mod renderer;

pub use primitive::{
    decode_pick_color, encode_pick_index, ArcPrimitive, ArcRow, ArcSpan, BackgroundFill,
    LabelObject, LabelPrimitive, MarkerObject, MarkerPrimitive, PathObject, PathPrimitive,
    PickHit, Primitive, PrimitiveBody, PrimitiveId, PrimitiveKind, Rgb, TileSource,
};
pub use projection::{MapProjection, ProjectionMode};
pub use renderer::{pick_primitives, render_primitives};

use geo_types::{Coord, Rect};

/// Mean earth radius in meters.
pub const EARTH_RADIUS_M: f64 = 6_371_008.8;

/// Equatorial circumference in meters (Web-Mercator scale reference).
pub const EARTH_CIRCUMFERENCE_M: f64 = 40_075_016.686;

/// Great-circle distance between two `(lon, lat)` coordinates, in kilometers.
///
/// Haversine formulation; well-conditioned for both tiny and antipodal spans.
pub fn great_circle_km(a: Coord<f64>, b: Coord<f64>) -> f64 {
    let lat1 = a.y.to_radians();
    let lat2 = b.y.to_radians();
    let dlat = lat2 - lat1;
    let dlon = (b.x - a.x).to_radians();

    let h = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
    let c = 2.0 * h.sqrt().min(1.0).asin();
    EARTH_RADIUS_M * c / 1000.0
}

/// Bounding box of a set of coordinates, `None` when the set is empty.
pub fn bounds_of<I>(coords: I) -> Option<Rect<f64>>
where
    I: IntoIterator<Item = Coord<f64>>,
{
    let mut iter = coords.into_iter().filter(|c| c.x.is_finite() && c.y.is_finite());
    let first = iter.next()?;
    let (min, max) = iter.fold((first, first), |(min, max), c| {
        (
            Coord {
                x: min.x.min(c.x),
                y: min.y.min(c.y),
            },
            Coord {
                x: max.x.max(c.x),
                y: max.y.max(c.y),
            },
        )
    });
    Some(Rect::new(min, max))
}

/// Whether a bounding box collapses to a single point.
pub fn is_degenerate(bounds: &Rect<f64>) -> bool {
    bounds.min() == bounds.max()
}
