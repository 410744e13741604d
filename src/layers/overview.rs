//! Multi-leg overview with hit testing and highlight/dim mode.
//!
//! Segments from all legs are batched per style pair and drawn with halos.
//! Paths carry explicit picking colors from the [`PickingColorMap`]; arc
//! batches get one row per allocated leg, in allocation order, so their
//! internal row colors decode through the same map.

use super::picking::PickingColorMap;
use super::style::{
    point_pairs, style_spec, LayerStack, PickSettings, Technique, ORDERING_EPSILON,
};
use super::OVERVIEW_Z_ORDER;
use crate::error::MapResult;
use crate::geo::{bounds_of, ArcRow, ArcSpan, PathObject, PickHit, Primitive};
use crate::map::{CursorStyle, LayerId, LayerModule, LayerRegistry, PointerEvent};
use crate::model::{Leg, LegId, SegmentStyle};
use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::rc::{Rc, Weak};
use std::time::Duration;
use web_time::Instant;

/// Delay before a scheduled highlight change is applied.
pub const HIGHLIGHT_DELAY: Duration = Duration::from_millis(50);

/// How a leg is drawn in highlight mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LegClass {
    Highlighted,
    Dimmed,
    Unchanged,
}

impl LegClass {
    /// Style a segment of this class is drawn with.
    pub fn restyle(&self, source: SegmentStyle) -> SegmentStyle {
        use SegmentStyle::*;
        match (self, source) {
            (_, FlightPlan) => FlightPlan,
            (LegClass::Unchanged, s) => s,
            (LegClass::Highlighted, s) if s.is_uncertain() => UncertainHighlighted,
            (LegClass::Highlighted, _) => Highlighted,
            (LegClass::Dimmed, s) if s.is_uncertain() => UncertainDimmed,
            (LegClass::Dimmed, _) => Dimmed,
        }
    }
}

/// Overview layer properties.
#[derive(Debug, Clone, PartialEq)]
pub struct OverviewProps {
    pub legs: Vec<Leg>,
    /// Highlighted leg ids; empty disables highlight mode
    pub highlighted: HashSet<LegId>,
    /// Draw legs outside the highlight set muted
    pub dim_unhighlighted: bool,
    pub pickable: bool,
    pub show_flight_plan: bool,
}

impl Default for OverviewProps {
    fn default() -> Self {
        Self {
            legs: Vec::new(),
            highlighted: HashSet::new(),
            dim_unhighlighted: true,
            pickable: true,
            show_flight_plan: true,
        }
    }
}

/// Partial update; `None` fields are left alone.
#[derive(Debug, Clone, Default)]
pub struct OverviewPatch {
    pub legs: Option<Vec<Leg>>,
    pub highlighted: Option<HashSet<LegId>>,
    pub dim_unhighlighted: Option<bool>,
    pub pickable: Option<bool>,
    pub show_flight_plan: Option<bool>,
}

type HoverCallback = Box<dyn FnMut(Option<&str>, &PointerEvent)>;
type ClickCallback = Box<dyn FnMut(&str)>;

/// Batch identity: drawn style and tagged style.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct BatchKey {
    style: SegmentStyle,
    source: SegmentStyle,
    highlighted: bool,
}

struct Batch {
    paths: Vec<PathObject>,
    /// Spans per picking row
    rows: Vec<Vec<ArcSpan>>,
}

/// Highlight change waiting for its delay to pass.
#[derive(Debug, Clone)]
struct PendingHighlight {
    ids: HashSet<LegId>,
    due: Instant,
}

/// Draws many legs and reports which one is under the pointer.
pub struct OverviewLayer {
    id: LayerId,
    registry: Rc<LayerRegistry>,
    props: OverviewProps,
    picking: PickingColorMap,
    layers: Vec<Primitive>,
    hovered: Option<LegId>,
    pending_highlight: Option<PendingHighlight>,
    on_hover: Option<HoverCallback>,
    on_click: Option<ClickCallback>,
    registered: bool,
}

impl OverviewLayer {
    pub fn new(registry: &Rc<LayerRegistry>, props: OverviewProps) -> Rc<RefCell<Self>> {
        let layer = Rc::new_cyclic(|weak: &Weak<RefCell<Self>>| {
            let id = registry.register(weak.clone(), "overview", OVERVIEW_Z_ORDER);
            RefCell::new(Self {
                id,
                registry: registry.clone(),
                props,
                picking: PickingColorMap::default(),
                layers: Vec::new(),
                hovered: None,
                pending_highlight: None,
                on_hover: None,
                on_click: None,
                registered: true,
            })
        });
        if let Err(e) = layer.borrow_mut().render(false) {
            log::error!("{}", e);
        }
        layer
    }

    pub fn id(&self) -> LayerId {
        self.id
    }

    pub fn props(&self) -> &OverviewProps {
        &self.props
    }

    /// Primitives from the latest render, in stack order.
    pub fn layers(&self) -> &[Primitive] {
        &self.layers
    }

    pub fn picking(&self) -> &PickingColorMap {
        &self.picking
    }

    pub fn hovered(&self) -> Option<&str> {
        self.hovered.as_deref()
    }

    /// Callback invoked with the hovered leg id (or `None`).
    ///
    /// Runs while the layer is borrowed; it must not borrow the layer again.
    pub fn on_hover(&mut self, callback: impl FnMut(Option<&str>, &PointerEvent) + 'static) {
        self.on_hover = Some(Box::new(callback));
    }

    pub fn on_click(&mut self, callback: impl FnMut(&str) + 'static) {
        self.on_click = Some(Box::new(callback));
    }

    /// Applies changed fields and renders at most once.
    pub fn set_props(&mut self, patch: OverviewPatch) {
        let mut changed = false;

        if let Some(legs) = patch.legs {
            if legs != self.props.legs {
                self.props.legs = legs;
                changed = true;
            }
        }
        if let Some(highlighted) = patch.highlighted {
            if highlighted != self.props.highlighted {
                self.props.highlighted = highlighted;
                changed = true;
            }
        }
        if let Some(dim) = patch.dim_unhighlighted {
            if dim != self.props.dim_unhighlighted {
                self.props.dim_unhighlighted = dim;
                changed = true;
            }
        }
        if let Some(pickable) = patch.pickable {
            if pickable != self.props.pickable {
                self.props.pickable = pickable;
                changed = true;
            }
        }
        if let Some(show) = patch.show_flight_plan {
            if show != self.props.show_flight_plan {
                self.props.show_flight_plan = show;
                changed = true;
            }
        }

        if changed {
            if let Err(e) = self.render(false) {
                log::error!("{}", e);
            }
        }
    }

    /// Queues a highlight change; a newer call replaces an older one.
    pub fn schedule_highlight(&mut self, ids: HashSet<LegId>, now: Instant) {
        if self.pending_highlight.is_some() {
            log::debug!("Superseding pending highlight change");
        }
        self.pending_highlight = Some(PendingHighlight {
            ids,
            due: now + HIGHLIGHT_DELAY,
        });
    }

    /// Applies a due highlight change. Returns whether one was applied.
    pub fn poll(&mut self, now: Instant) -> bool {
        if !self
            .pending_highlight
            .as_ref()
            .is_some_and(|p| now >= p.due)
        {
            return false;
        }
        let Some(pending) = self.pending_highlight.take() else {
            return false;
        };
        self.set_props(OverviewPatch {
            highlighted: Some(pending.ids),
            ..Default::default()
        });
        true
    }

    pub fn has_pending_highlight(&self) -> bool {
        self.pending_highlight.is_some()
    }

    /// Classification of one leg under the current highlight set.
    pub fn classify(&self, leg: &str) -> LegClass {
        if self.props.highlighted.is_empty() {
            LegClass::Unchanged
        } else if self.props.highlighted.contains(leg) {
            LegClass::Highlighted
        } else if self.props.dim_unhighlighted {
            LegClass::Dimmed
        } else {
            LegClass::Unchanged
        }
    }

    /// Frames every non-plan position; goes home when there are no legs.
    pub fn translate_to(&self) {
        if self.props.legs.is_empty() {
            self.registry.translate_home();
            return;
        }
        match bounds_of(self.props.legs.iter().flat_map(|l| l.framing_coords())) {
            Some(bounds) => self.registry.transition_to(bounds),
            None => {
                log::debug!("Overview legs have no framing positions; going home");
                self.registry.translate_home();
            }
        }
    }

    fn build(&self) -> Vec<Primitive> {
        let rows = self.picking.len();
        let mut batches: HashMap<BatchKey, Batch> = HashMap::new();

        for leg in &self.props.legs {
            let Some(index) = self.picking.index_of(&leg.id) else {
                continue;
            };
            let class = self.classify(&leg.id);
            for segment in &leg.segments {
                if segment.style == SegmentStyle::FlightPlan && !self.props.show_flight_plan {
                    continue;
                }
                let style = class.restyle(segment.style);
                let key = BatchKey {
                    style,
                    source: segment.style,
                    highlighted: class == LegClass::Highlighted
                        && style != SegmentStyle::FlightPlan,
                };
                let batch = batches.entry(key).or_insert_with(|| Batch {
                    paths: Vec::new(),
                    rows: vec![Vec::new(); rows],
                });
                let technique = style_spec(style).technique;
                // Custom-encoding kinds carry the leg color per object; the
                // rest are decoded by row index in picking order.
                let custom_pick = technique.kind().supports_custom_pick_encoding();
                match technique {
                    Technique::Arc => batch.rows[index as usize].extend(point_pairs(segment)),
                    Technique::Path => {
                        if segment.positions.len() >= 2 {
                            batch.paths.push(PathObject {
                                owner: leg.id.clone(),
                                coords: segment.coords().collect(),
                                pick_color: (self.props.pickable && custom_pick)
                                    .then(|| self.picking.forward(index))
                                    .flatten(),
                            });
                        }
                    }
                }
            }
        }

        let pick = PickSettings {
            pickable: self.props.pickable,
            auto_highlight: self.props.pickable,
            ..Default::default()
        };
        let mut stack = LayerStack::new(
            self.id,
            self.registry.identity_token(),
            self.registry.theme(),
        );
        for (key, batch) in batches {
            let mut ordering = style_spec(key.source).ordering;
            if key.highlighted {
                ordering += ORDERING_EPSILON;
            }
            match style_spec(key.style).technique {
                Technique::Path => {
                    stack.add_paths(key.style, key.source, ordering, &batch.paths, pick)
                }
                Technique::Arc => {
                    let rows: Vec<ArcRow> = self
                        .picking
                        .order()
                        .iter()
                        .zip(batch.rows)
                        .map(|(owner, spans)| ArcRow {
                            owner: owner.clone(),
                            spans,
                        })
                        .collect();
                    stack.add_arcs(key.style, key.source, ordering, &rows, pick);
                }
            }
        }

        let mut layers = stack.finish();
        for layer in &mut layers {
            layer.set_highlighted_owner(self.hovered.as_deref());
        }
        layers
    }

    /// Points every primitive's highlight at the hovered leg and pushes.
    fn refresh_highlight(&mut self) {
        let owner = self.hovered.clone();
        for layer in &mut self.layers {
            layer.set_highlighted_owner(owner.as_deref());
        }
        self.registry.update_layer(self.id, self.layers.clone());
    }

    fn leg_for(&self, hit: &PickHit) -> Option<LegId> {
        self.picking.leg_for(hit.color).map(str::to_string)
    }

    pub fn destroy(&mut self) {
        if std::mem::take(&mut self.registered) {
            self.registry.deregister(self.id);
        }
    }
}

impl LayerModule for OverviewLayer {
    fn render(&mut self, regenerate: bool) -> MapResult<()> {
        if regenerate {
            self.hovered = None;
        }
        self.picking = PickingColorMap::allocate(&self.props.legs);
        if self
            .hovered
            .as_deref()
            .is_some_and(|h| self.picking.index_of(h).is_none())
        {
            self.hovered = None;
        }
        self.layers = self.build();
        log::debug!(
            "Overview rendered {} legs into {} primitives",
            self.picking.len(),
            self.layers.len()
        );
        self.registry.update_layer(self.id, self.layers.clone());
        Ok(())
    }

    fn hover(&mut self, hit: Option<&PickHit>, event: &PointerEvent) -> bool {
        let leg = if self.props.pickable {
            hit.and_then(|h| self.leg_for(h))
        } else {
            None
        };
        if let Some(callback) = self.on_hover.as_mut() {
            callback(leg.as_deref(), event);
        }
        if leg == self.hovered {
            return leg.is_some();
        }

        self.registry.set_cursor(if leg.is_some() {
            CursorStyle::Pointer
        } else {
            CursorStyle::Default
        });
        self.hovered = leg;
        self.refresh_highlight();
        self.hovered.is_some()
    }

    fn click(&mut self, hit: &PickHit) {
        if !self.props.pickable {
            return;
        }
        let Some(leg) = self.leg_for(hit) else {
            return;
        };
        if let Some(callback) = self.on_click.as_mut() {
            callback(&leg);
        }
    }
}

impl Drop for OverviewLayer {
    fn drop(&mut self) {
        self.destroy();
    }
}
