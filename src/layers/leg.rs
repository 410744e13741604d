//! Detail view of a single flight leg.

use super::style::{point_pairs, style_spec, LayerStack, PickSettings, Technique};
use super::LEG_Z_ORDER;
use crate::error::MapResult;
use crate::geo::{bounds_of, ArcRow, PathObject, Primitive};
use crate::map::{LayerId, LayerModule, LayerRegistry};
use crate::model::{Leg, SegmentStyle};
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::{Rc, Weak};

/// Single-leg layer properties.
#[derive(Debug, Clone, PartialEq)]
pub struct LegProps {
    pub leg: Option<Leg>,
    pub show_flight_plan: bool,
    /// Reframe the camera on every render
    pub follow: bool,
}

impl Default for LegProps {
    fn default() -> Self {
        Self {
            leg: None,
            show_flight_plan: true,
            follow: false,
        }
    }
}

/// Partial update; `None` fields are left alone.
#[derive(Debug, Clone, Default)]
pub struct LegPatch {
    pub leg: Option<Option<Leg>>,
    pub show_flight_plan: Option<bool>,
    pub follow: Option<bool>,
}

struct StyleBatch {
    paths: Vec<PathObject>,
    row: ArcRow,
}

/// Renders one leg as per-style batches with halos.
pub struct LegLayer {
    id: LayerId,
    registry: Rc<LayerRegistry>,
    props: LegProps,
    registered: bool,
}

impl LegLayer {
    pub fn new(registry: &Rc<LayerRegistry>, props: LegProps) -> Rc<RefCell<Self>> {
        let layer = Rc::new_cyclic(|weak: &Weak<RefCell<Self>>| {
            let id = registry.register(weak.clone(), "leg", LEG_Z_ORDER);
            RefCell::new(Self {
                id,
                registry: registry.clone(),
                props,
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

    pub fn props(&self) -> &LegProps {
        &self.props
    }

    /// Applies changed fields and renders at most once.
    pub fn set_props(&mut self, patch: LegPatch) {
        let mut changed = false;

        if let Some(leg) = patch.leg {
            if leg != self.props.leg {
                self.props.leg = leg;
                changed = true;
            }
        }
        if let Some(show) = patch.show_flight_plan {
            if show != self.props.show_flight_plan {
                self.props.show_flight_plan = show;
                changed = true;
            }
        }
        if let Some(follow) = patch.follow {
            if follow != self.props.follow {
                self.props.follow = follow;
                changed = true;
            }
        }

        if changed {
            if let Err(e) = self.render(false) {
                log::error!("{}", e);
            }
        }
    }

    /// Builds the primitive stack for the current leg.
    fn build(&self) -> Vec<Primitive> {
        let Some(leg) = &self.props.leg else {
            return Vec::new();
        };

        let mut batches: HashMap<SegmentStyle, StyleBatch> = HashMap::new();
        for segment in &leg.segments {
            if segment.style == SegmentStyle::FlightPlan && !self.props.show_flight_plan {
                continue;
            }
            let batch = batches.entry(segment.style).or_insert_with(|| StyleBatch {
                paths: Vec::new(),
                row: ArcRow {
                    owner: leg.id.clone(),
                    spans: Vec::new(),
                },
            });
            match style_spec(segment.style).technique {
                Technique::Arc => batch.row.spans.extend(point_pairs(segment)),
                Technique::Path => {
                    if segment.positions.len() >= 2 {
                        batch.paths.push(PathObject {
                            owner: leg.id.clone(),
                            coords: segment.coords().collect(),
                            pick_color: None,
                        });
                    }
                }
            }
        }

        let mut stack = LayerStack::new(
            self.id,
            self.registry.identity_token(),
            self.registry.theme(),
        );
        for (style, batch) in &batches {
            let spec = style_spec(*style);
            match spec.technique {
                Technique::Path => stack.add_paths(
                    *style,
                    *style,
                    spec.ordering,
                    &batch.paths,
                    PickSettings::default(),
                ),
                Technique::Arc => stack.add_arcs(
                    *style,
                    *style,
                    spec.ordering,
                    std::slice::from_ref(&batch.row),
                    PickSettings::default(),
                ),
            }
        }
        stack.finish()
    }

    fn follow(&self) {
        let Some(leg) = &self.props.leg else {
            return;
        };
        match bounds_of(leg.framing_coords()) {
            Some(bounds) => self.registry.transition_to(bounds),
            None => log::debug!("Leg '{}' has no framing positions", leg.id),
        }
    }

    pub fn destroy(&mut self) {
        if std::mem::take(&mut self.registered) {
            self.registry.deregister(self.id);
        }
    }
}

impl LayerModule for LegLayer {
    fn render(&mut self, _regenerate: bool) -> MapResult<()> {
        let layers = self.build();
        self.registry.update_layer(self.id, layers);
        if self.props.follow {
            self.follow();
        }
        Ok(())
    }
}

impl Drop for LegLayer {
    fn drop(&mut self) {
        self.destroy();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo::{PrimitiveBody, PrimitiveKind, ProjectionMode};
    use crate::map::Theme;
    use crate::model::Segment;
    use crate::settings::MapSettings;
    use crate::testing::RecordingSurface;

    fn registry() -> Rc<LayerRegistry> {
        LayerRegistry::new(&MapSettings::default())
    }

    fn build(leg: Leg, show_flight_plan: bool) -> Vec<Primitive> {
        let registry = registry();
        let layer = LegLayer::new(
            &registry,
            LegProps {
                leg: Some(leg),
                show_flight_plan,
                follow: false,
            },
        );
        let layers = layer.borrow().build();
        layers
    }

    fn names(layers: &[Primitive]) -> Vec<&str> {
        layers.iter().map(|p| p.id.name.as_str()).collect()
    }

    #[test]
    fn test_single_point_uncertain_segment_yields_no_arcs() {
        let leg = Leg::new("x", vec![Segment::new(SegmentStyle::Uncertain, vec![[1.0, 1.0]])]);
        let layers = build(leg, true);
        assert!(layers.iter().all(|p| p.kind() != PrimitiveKind::Arcs));
    }

    #[test]
    fn test_uncertain_split_into_point_pairs() {
        let leg = Leg::new(
            "x",
            vec![Segment::new(
                SegmentStyle::Uncertain,
                vec![[0.0, 0.0], [1.0, 1.0], [2.0, 0.0]],
            )],
        );
        let layers = build(leg, true);
        assert_eq!(names(&layers), vec!["uncertain-back-arcs", "uncertain-front-arcs"]);
        let PrimitiveBody::Arcs(arcs) = &layers[0].body else {
            panic!("expected arcs");
        };
        assert_eq!(arcs.span_count(), 2);
        assert_eq!(arcs.elevation, 0.0);
    }

    #[test]
    fn test_flight_plan_arcs_elevated_and_optional() {
        let leg = Leg::new(
            "x",
            vec![
                Segment::new(SegmentStyle::Normal, vec![[0.0, 0.0], [1.0, 1.0]]),
                Segment::new(SegmentStyle::FlightPlan, vec![[0.0, 0.0], [5.0, 5.0]]),
            ],
        );

        let shown = build(leg.clone(), true);
        assert_eq!(
            names(&shown),
            vec!["flight_plan-front-arcs", "normal-back", "normal-front"]
        );
        let PrimitiveBody::Arcs(plan) = &shown[0].body else {
            panic!("expected arcs");
        };
        assert!(plan.elevation > 0.0);

        let hidden = build(leg, false);
        assert_eq!(names(&hidden), vec!["normal-back", "normal-front"]);
    }

    #[test]
    fn test_stacking_independent_of_segment_order() {
        let a = Segment::new(SegmentStyle::Alternate, vec![[0.0, 0.0], [1.0, 1.0]]);
        let n = Segment::new(SegmentStyle::Normal, vec![[1.0, 1.0], [2.0, 2.0]]);
        let d = Segment::new(SegmentStyle::Deadhead, vec![[2.0, 2.0], [3.0, 3.0]]);

        let first = build(Leg::new("x", vec![n.clone(), a.clone(), d.clone()]), true);
        let second = build(Leg::new("x", vec![d, n, a]), true);
        assert_eq!(first, second);
        assert_eq!(
            names(&first),
            vec![
                "deadhead-back",
                "deadhead-front",
                "alternate-back",
                "alternate-front",
                "normal-back",
                "normal-front"
            ]
        );
    }

    #[test]
    fn test_follow_frames_without_flight_plan() {
        let registry = registry();
        let (surface, log) = RecordingSurface::new(ProjectionMode::Globe);
        registry.set_render_surface(Box::new(surface), Theme::Light);

        let leg = Leg::new(
            "x",
            vec![
                Segment::new(SegmentStyle::Normal, vec![[10.0, 10.0]]),
                Segment::new(SegmentStyle::FlightPlan, vec![[10.0, 10.0], [80.0, 60.0]]),
            ],
        );
        let _layer = LegLayer::new(
            &registry,
            LegProps {
                leg: Some(leg),
                show_flight_plan: true,
                follow: true,
            },
        );

        let (pose, _) = *log.borrow().cameras.last().unwrap();
        assert_eq!(pose.zoom, crate::map::SINGLE_POINT_ZOOM);
        assert!((pose.longitude - 10.0).abs() < 1e-6);
    }

    #[test]
    fn test_set_props_ignores_unchanged_fields() {
        let registry = registry();
        let layer = LegLayer::new(&registry, LegProps::default());
        layer.borrow_mut().set_props(LegPatch {
            show_flight_plan: Some(true),
            ..Default::default()
        });
        assert!(layer.borrow().props().show_flight_plan);
        layer.borrow_mut().destroy();
        assert!(registry.is_empty());
    }
}
