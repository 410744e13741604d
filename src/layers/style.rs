//! Segment style table and primitive stacking.
//!
//! Every [`SegmentStyle`] maps to a render technique, a stacking ordering,
//! and a back/front stroke pair in light and dark color sets. Layer modules
//! batch segments per style, build one primitive per stroke, and let
//! [`LayerStack`] sort the result by an explicit sort key.

use crate::geo::{ArcPrimitive, ArcRow, ArcSpan, PathObject, PathPrimitive, Primitive};
use crate::geo::{PrimitiveBody, PrimitiveId, PrimitiveKind};
use crate::map::{LayerId, Theme};
use crate::model::{Segment, SegmentStyle};
use eframe::egui::Color32;
use std::cmp::Ordering;

/// Ordering increment for highlighted legs; keeps them just above their
/// unhighlighted counterparts without reaching the next style.
pub const ORDERING_EPSILON: f32 = 0.01;

/// Arc height for flight-plan arcs.
pub const PLAN_ELEVATION: f32 = 0.08;

/// Depth offset per position in the final stack.
pub const DEPTH_BIAS_STEP: f32 = 0.5;

/// How a style is drawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Technique {
    /// Ground-hugging polyline
    Path,
    /// Geodesic point-pair arcs
    Arc,
}

impl Technique {
    /// Primitive kind a batch of this technique becomes.
    pub fn kind(&self) -> PrimitiveKind {
        match self {
            Technique::Path => PrimitiveKind::Paths,
            Technique::Arc => PrimitiveKind::Arcs,
        }
    }
}

/// One stroke in both color sets.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StrokeSpec {
    pub width: f32,
    pub light: Color32,
    pub dark: Color32,
}

impl StrokeSpec {
    pub fn color(&self, theme: Theme) -> Color32 {
        match theme {
            Theme::Light => self.light,
            Theme::Dark => self.dark,
        }
    }
}

/// Render description of a segment style.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StyleSpec {
    pub technique: Technique,
    /// Stacking position; higher draws later.
    pub ordering: f32,
    /// Arc elevation, ignored for paths
    pub elevation: f32,
    /// Wider, duller halo drawn first
    pub back: Option<StrokeSpec>,
    /// Narrower, brighter stroke drawn on top
    pub front: StrokeSpec,
}

const fn stroke(width: f32, light: Color32, dark: Color32) -> StrokeSpec {
    StrokeSpec { width, light, dark }
}

/// Style table.
pub fn style_spec(style: SegmentStyle) -> StyleSpec {
    use SegmentStyle::*;
    match style {
        FlightPlan => StyleSpec {
            technique: Technique::Arc,
            ordering: 0.0,
            elevation: PLAN_ELEVATION,
            back: None,
            front: stroke(
                1.5,
                Color32::from_rgba_unmultiplied(90, 90, 110, 160),
                Color32::from_rgba_unmultiplied(170, 170, 190, 160),
            ),
        },
        Dimmed => StyleSpec {
            technique: Technique::Path,
            ordering: 1.0,
            elevation: 0.0,
            back: None,
            front: stroke(
                2.0,
                Color32::from_rgba_unmultiplied(120, 130, 150, 110),
                Color32::from_rgba_unmultiplied(90, 100, 120, 110),
            ),
        },
        UncertainDimmed => StyleSpec {
            technique: Technique::Arc,
            ordering: 1.5,
            elevation: 0.0,
            back: None,
            front: stroke(
                1.5,
                Color32::from_rgba_unmultiplied(150, 140, 120, 110),
                Color32::from_rgba_unmultiplied(110, 100, 80, 110),
            ),
        },
        Deadhead => StyleSpec {
            technique: Technique::Path,
            ordering: 2.0,
            elevation: 0.0,
            back: Some(stroke(
                5.0,
                Color32::from_rgb(235, 235, 240),
                Color32::from_rgb(30, 30, 40),
            )),
            front: stroke(
                2.5,
                Color32::from_rgb(130, 130, 150),
                Color32::from_rgb(150, 150, 170),
            ),
        },
        Alternate => StyleSpec {
            technique: Technique::Path,
            ordering: 3.0,
            elevation: 0.0,
            back: Some(stroke(
                5.0,
                Color32::from_rgb(250, 235, 215),
                Color32::from_rgb(60, 40, 20),
            )),
            front: stroke(
                2.5,
                Color32::from_rgb(210, 120, 30),
                Color32::from_rgb(240, 160, 60),
            ),
        },
        Normal => StyleSpec {
            technique: Technique::Path,
            ordering: 4.0,
            elevation: 0.0,
            back: Some(stroke(
                6.0,
                Color32::from_rgb(225, 235, 250),
                Color32::from_rgb(20, 35, 60),
            )),
            front: stroke(
                3.0,
                Color32::from_rgb(40, 100, 200),
                Color32::from_rgb(100, 170, 255),
            ),
        },
        Uncertain => StyleSpec {
            technique: Technique::Arc,
            ordering: 5.0,
            elevation: 0.0,
            back: Some(stroke(
                5.0,
                Color32::from_rgb(250, 240, 220),
                Color32::from_rgb(50, 40, 25),
            )),
            front: stroke(
                2.0,
                Color32::from_rgb(190, 140, 40),
                Color32::from_rgb(230, 190, 90),
            ),
        },
        Highlighted => StyleSpec {
            technique: Technique::Path,
            ordering: 6.0,
            elevation: 0.0,
            back: Some(stroke(
                8.0,
                Color32::from_rgb(255, 240, 200),
                Color32::from_rgb(70, 50, 10),
            )),
            front: stroke(
                4.0,
                Color32::from_rgb(230, 60, 40),
                Color32::from_rgb(255, 120, 80),
            ),
        },
        UncertainHighlighted => StyleSpec {
            technique: Technique::Arc,
            ordering: 7.0,
            elevation: 0.0,
            back: Some(stroke(
                7.0,
                Color32::from_rgb(255, 240, 200),
                Color32::from_rgb(70, 50, 10),
            )),
            front: stroke(
                3.0,
                Color32::from_rgb(240, 110, 30),
                Color32::from_rgb(255, 170, 70),
            ),
        },
    }
}

/// Which stroke of a style a primitive draws.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum HaloPart {
    Back,
    Front,
}

impl HaloPart {
    pub fn key(&self) -> &'static str {
        match self {
            HaloPart::Back => "back",
            HaloPart::Front => "front",
        }
    }
}

/// Stacking sort key: ordering first, then the style pair and halo part.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StackKey {
    pub ordering: f32,
    /// Style the stroke is drawn with
    pub style: SegmentStyle,
    /// Style the segments were tagged with
    pub source: SegmentStyle,
    pub part: HaloPart,
}

impl Eq for StackKey {}

impl PartialOrd for StackKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for StackKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.ordering
            .total_cmp(&other.ordering)
            .then(self.style.cmp(&other.style))
            .then(self.source.cmp(&other.source))
            .then(self.part.cmp(&other.part))
    }
}

/// Consecutive point pairs of a segment; fewer than two points yield none.
pub fn point_pairs(segment: &Segment) -> Vec<ArcSpan> {
    let coords: Vec<_> = segment.coords().collect();
    coords
        .windows(2)
        .map(|w| ArcSpan {
            source: w[0],
            target: w[1],
        })
        .collect()
}

/// Picking and highlight settings shared by a batch's primitives.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PickSettings {
    pub pickable: bool,
    pub auto_highlight: bool,
    pub highlight_color: Color32,
}

impl Default for PickSettings {
    fn default() -> Self {
        Self {
            pickable: false,
            auto_highlight: false,
            highlight_color: Color32::from_rgb(255, 215, 0),
        }
    }
}

/// Collects primitives with their sort keys and emits them in stack order.
pub struct LayerStack {
    layer: LayerId,
    generation: u32,
    theme: Theme,
    entries: Vec<(StackKey, Primitive)>,
}

impl LayerStack {
    pub fn new(layer: LayerId, generation: u32, theme: Theme) -> Self {
        Self {
            layer,
            generation,
            theme,
            entries: Vec::new(),
        }
    }

    fn strokes(spec: &StyleSpec) -> impl Iterator<Item = (HaloPart, StrokeSpec)> {
        spec.back
            .map(|b| (HaloPart::Back, b))
            .into_iter()
            .chain(std::iter::once((HaloPart::Front, spec.front)))
    }

    fn id(&self, key: &StackKey, suffix: &str) -> PrimitiveId {
        let name = if key.style == key.source {
            format!("{}-{}{}", key.style.key(), key.part.key(), suffix)
        } else {
            format!(
                "{}-{}-{}{}",
                key.style.key(),
                key.source.key(),
                key.part.key(),
                suffix
            )
        };
        PrimitiveId::new(self.layer, name, self.generation)
    }

    /// Adds back/front path primitives for one batch. Empty batches add nothing.
    pub fn add_paths(
        &mut self,
        style: SegmentStyle,
        source: SegmentStyle,
        ordering: f32,
        paths: &[PathObject],
        pick: PickSettings,
    ) {
        if paths.is_empty() {
            return;
        }
        let spec = style_spec(style);
        for (part, stroke) in Self::strokes(&spec) {
            let key = StackKey {
                ordering,
                style,
                source,
                part,
            };
            let body = PrimitiveBody::Paths(PathPrimitive {
                width: stroke.width,
                color: stroke.color(self.theme),
                depth_bias: 0.0,
                paths: paths.to_vec(),
                pickable: pick.pickable,
                auto_highlight: pick.auto_highlight,
                highlighted_owner: None,
                highlight_color: pick.highlight_color,
            });
            let primitive = Primitive::new(self.id(&key, ""), body);
            self.entries.push((key, primitive));
        }
    }

    /// Adds back/front arc primitives for one batch. Batches without a
    /// single span add nothing; empty rows are kept so row indices line up.
    pub fn add_arcs(
        &mut self,
        style: SegmentStyle,
        source: SegmentStyle,
        ordering: f32,
        rows: &[ArcRow],
        pick: PickSettings,
    ) {
        if rows.iter().all(|r| r.spans.is_empty()) {
            return;
        }
        let spec = style_spec(style);
        for (part, stroke) in Self::strokes(&spec) {
            let key = StackKey {
                ordering,
                style,
                source,
                part,
            };
            let body = PrimitiveBody::Arcs(ArcPrimitive {
                width: stroke.width,
                color: stroke.color(self.theme),
                elevation: spec.elevation,
                rows: rows.to_vec(),
                pickable: pick.pickable,
                auto_highlight: pick.auto_highlight,
                highlighted_owner: None,
                highlight_color: pick.highlight_color,
            });
            let primitive = Primitive::new(self.id(&key, "-arcs"), body);
            self.entries.push((key, primitive));
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Sorted primitives; paths get a depth bias by stack position.
    pub fn finish(mut self) -> Vec<Primitive> {
        self.entries.sort_by(|a, b| a.0.cmp(&b.0));
        self.entries
            .into_iter()
            .enumerate()
            .map(|(i, (_, mut primitive))| {
                if let PrimitiveBody::Paths(p) = &mut primitive.body {
                    p.depth_bias = i as f32 * DEPTH_BIAS_STEP;
                }
                primitive
            })
            .collect()
    }
}
