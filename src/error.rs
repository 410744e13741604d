//! Error type shared by the map core.
//!
//! Nothing in the public registry/viewport surface returns these to the host:
//! they travel between internal steps and end up in a log line.

use crate::map::LayerId;

/// Errors raised inside the map core.
#[derive(Debug, thiserror::Error)]
pub enum MapError {
    /// A layer id that the registry does not (or no longer) know about.
    #[error("layer {0:?} is not registered")]
    UnknownLayer(LayerId),

    /// Composite requested without a base tile primitive to layer above.
    #[error("no base tile layer registered; nothing to composite above")]
    MissingBaseLayer,

    /// Bounding box could not be fitted into the viewport.
    #[error("cannot fit bounds: {0}")]
    FitFailed(String),

    /// Operation needs a render surface and none is attached.
    #[error("no render surface attached")]
    NoSurface,

    /// A layer module failed to produce primitives.
    #[error("layer '{name}' failed to render: {reason}")]
    Render { name: String, reason: String },

    /// Settings could not be read or written.
    #[error("settings error: {0}")]
    Settings(String),
}

pub type MapResult<T> = Result<T, MapError>;
