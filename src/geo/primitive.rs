//! Renderable primitives produced by layer modules.

use crate::map::LayerId;
use eframe::egui::Color32;
use geo_types::Coord;
use std::fmt;

/// Picking color, RGB only.
pub type Rgb = [u8; 3];

/// Encodes a picking index the way the surface primitives do internally.
///
/// Index `i` maps to `i + 1` packed little-endian into RGB; `[0, 0, 0]` is
/// reserved for "nothing picked".
pub fn encode_pick_index(index: u32) -> Rgb {
    let v = index + 1;
    [(v & 0xff) as u8, ((v >> 8) & 0xff) as u8, ((v >> 16) & 0xff) as u8]
}

/// Inverse of [`encode_pick_index`]; `None` for the reserved empty color.
pub fn decode_pick_color(color: Rgb) -> Option<u32> {
    let v = color[0] as u32 | (color[1] as u32) << 8 | (color[2] as u32) << 16;
    v.checked_sub(1)
}

/// Identity of a primitive within one render surface.
///
/// `generation` is the registry's identity token at render time; a surface
/// swap bumps it so nothing tied to the old surface is reused.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PrimitiveId {
    pub layer: LayerId,
    pub name: String,
    pub generation: u32,
}

impl PrimitiveId {
    pub fn new(layer: LayerId, name: impl Into<String>, generation: u32) -> Self {
        Self {
            layer,
            name: name.into(),
            generation,
        }
    }
}

impl fmt::Display for PrimitiveId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}#{}", self.layer.0, self.name, self.generation)
    }
}

/// Kind of primitive, independent of payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrimitiveKind {
    BaseTiles,
    Background,
    Paths,
    Arcs,
    Markers,
    Labels,
}

impl PrimitiveKind {
    /// Whether callers may supply their own picking colors for this kind.
    ///
    /// Arcs allocate colors internally from their row index; the overview
    /// layer must mirror that order when building its reverse map.
    pub fn supports_custom_pick_encoding(&self) -> bool {
        matches!(self, PrimitiveKind::Paths | PrimitiveKind::Markers)
    }
}

/// Raster base map.
#[derive(Debug, Clone, PartialEq)]
pub struct TileSource {
    pub url_template: String,
    pub min_zoom: u8,
    pub max_zoom: u8,
}

/// Full-sphere fill drawn under all content in globe mode.
#[derive(Debug, Clone, PartialEq)]
pub struct BackgroundFill {
    pub color: Color32,
}

/// One ground-hugging path.
#[derive(Debug, Clone, PartialEq)]
pub struct PathObject {
    /// Id of the domain object (leg) this path belongs to.
    pub owner: String,
    pub coords: Vec<Coord<f64>>,
    /// Explicit picking color; `None` when not pickable.
    pub pick_color: Option<Rgb>,
}

/// A batch of paths sharing stroke settings.
#[derive(Debug, Clone, PartialEq)]
pub struct PathPrimitive {
    pub width: f32,
    pub color: Color32,
    /// Depth offset per draw order, for depth-tested surfaces. The egui
    /// painter draws in list order and does not read it.
    pub depth_bias: f32,
    pub paths: Vec<PathObject>,
    pub pickable: bool,
    pub auto_highlight: bool,
    /// Owner whose paths are drawn in `highlight_color`.
    pub highlighted_owner: Option<String>,
    pub highlight_color: Color32,
}

impl PathPrimitive {
    pub fn is_highlighted(&self, path: &PathObject) -> bool {
        self.highlighted_owner.as_deref() == Some(path.owner.as_str())
    }
}

/// Two-point great-circle arc.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ArcSpan {
    pub source: Coord<f64>,
    pub target: Coord<f64>,
}

/// A data row of an arc batch; its picking color derives from its index.
#[derive(Debug, Clone, PartialEq)]
pub struct ArcRow {
    pub owner: String,
    pub spans: Vec<ArcSpan>,
}

/// A batch of geodesic arcs.
#[derive(Debug, Clone, PartialEq)]
pub struct ArcPrimitive {
    pub width: f32,
    pub color: Color32,
    /// Relative arc height; 0 hugs the ground.
    pub elevation: f32,
    pub rows: Vec<ArcRow>,
    pub pickable: bool,
    pub auto_highlight: bool,
    /// Owner whose rows are drawn in `highlight_color`.
    pub highlighted_owner: Option<String>,
    pub highlight_color: Color32,
}

impl ArcPrimitive {
    /// Picking color the arc primitive assigns to a row.
    pub fn internal_pick_color(row: usize) -> Rgb {
        encode_pick_index(row as u32)
    }

    pub fn span_count(&self) -> usize {
        self.rows.iter().map(|r| r.spans.len()).sum()
    }

    pub fn is_highlighted(&self, row: &ArcRow) -> bool {
        self.highlighted_owner.as_deref() == Some(row.owner.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MarkerObject {
    pub owner: String,
    pub coord: Coord<f64>,
    pub fill: Color32,
    pub line: Color32,
    pub radius: f32,
    pub pick_color: Option<Rgb>,
}

/// Point markers.
#[derive(Debug, Clone, PartialEq)]
pub struct MarkerPrimitive {
    pub markers: Vec<MarkerObject>,
    pub pickable: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LabelObject {
    pub text: String,
    pub coord: Coord<f64>,
    pub color: Color32,
    /// Higher wins label collisions.
    pub priority: f32,
}

/// Text labels with collision culling.
#[derive(Debug, Clone, PartialEq)]
pub struct LabelPrimitive {
    pub labels: Vec<LabelObject>,
    pub size: f32,
    /// Bumped to force collision recomputation without new geometry. The
    /// egui painter places labels every frame and does not read it.
    pub collision_trigger: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PrimitiveBody {
    BaseTiles(TileSource),
    Background(BackgroundFill),
    Paths(PathPrimitive),
    Arcs(ArcPrimitive),
    Markers(MarkerPrimitive),
    Labels(LabelPrimitive),
}

/// One renderable unit in the composited draw list.
#[derive(Debug, Clone, PartialEq)]
pub struct Primitive {
    pub id: PrimitiveId,
    pub body: PrimitiveBody,
}

impl Primitive {
    pub fn new(id: PrimitiveId, body: PrimitiveBody) -> Self {
        Self { id, body }
    }

    pub fn kind(&self) -> PrimitiveKind {
        match &self.body {
            PrimitiveBody::BaseTiles(_) => PrimitiveKind::BaseTiles,
            PrimitiveBody::Background(_) => PrimitiveKind::Background,
            PrimitiveBody::Paths(_) => PrimitiveKind::Paths,
            PrimitiveBody::Arcs(_) => PrimitiveKind::Arcs,
            PrimitiveBody::Markers(_) => PrimitiveKind::Markers,
            PrimitiveBody::Labels(_) => PrimitiveKind::Labels,
        }
    }

    pub fn supports_custom_pick_encoding(&self) -> bool {
        self.kind().supports_custom_pick_encoding()
    }

    /// Highlights every object owned by `owner` (or clears the highlight).
    ///
    /// Auto-highlight alone only tracks the object under the cursor in the
    /// primitive that was hit; sibling primitives (halo backs) need this.
    /// An owner with nothing drawn here leaves the primitive unhighlighted.
    pub fn set_highlighted_owner(&mut self, owner: Option<&str>) {
        match &mut self.body {
            PrimitiveBody::Paths(p) if p.auto_highlight => {
                p.highlighted_owner = owner
                    .filter(|o| p.paths.iter().any(|obj| obj.owner == *o))
                    .map(str::to_string);
            }
            PrimitiveBody::Arcs(a) if a.auto_highlight => {
                a.highlighted_owner = owner
                    .filter(|o| {
                        a.rows
                            .iter()
                            .any(|row| row.owner == *o && !row.spans.is_empty())
                    })
                    .map(str::to_string);
            }
            _ => {}
        }
    }

    /// Indices of the objects drawn highlighted.
    pub fn highlighted_objects(&self) -> Vec<usize> {
        match &self.body {
            PrimitiveBody::Paths(p) => p
                .paths
                .iter()
                .enumerate()
                .filter(|(_, path)| p.is_highlighted(path))
                .map(|(i, _)| i)
                .collect(),
            PrimitiveBody::Arcs(a) => a
                .rows
                .iter()
                .enumerate()
                .filter(|(_, row)| a.is_highlighted(row))
                .map(|(i, _)| i)
                .collect(),
            _ => Vec::new(),
        }
    }
}

/// Result of a surface hit test.
#[derive(Debug, Clone, PartialEq)]
pub struct PickHit {
    pub primitive: PrimitiveId,
    pub color: Rgb,
}
