//! Flight Map core: a layer registry that composites flight legs, airports
//! and a base map into one ordered primitive list, plus the camera framing
//! and geo-anchored widgets that go with it.

pub mod error;
pub mod geo;
pub mod layers;
pub mod map;
pub mod model;
pub mod settings;

#[cfg(test)]
mod testing;

pub use error::{MapError, MapResult};
pub use settings::MapSettings;
