//! Airport markers and code labels.

use super::AIRPORT_Z_ORDER;
use crate::error::MapResult;
use crate::geo::{
    decode_pick_color, encode_pick_index, LabelObject, LabelPrimitive, MarkerObject,
    MarkerPrimitive, PickHit, Primitive, PrimitiveBody, PrimitiveId,
};
use crate::map::{LayerId, LayerModule, LayerRegistry, PointerEvent, Theme};
use crate::model::Airport;
use eframe::egui::Color32;
use std::cell::RefCell;
use std::collections::HashSet;
use std::rc::{Rc, Weak};

/// Label priority of highlighted airports; wins every collision.
pub const HIGHLIGHT_LABEL_PRIORITY: f32 = f32::MAX;

const MARKER_RADIUS: f32 = 5.0;
const LABEL_SIZE: f32 = 12.0;

/// Marker fill and outline per theme, before highlight inversion.
fn marker_colors(theme: Theme) -> (Color32, Color32) {
    match theme {
        Theme::Light => (Color32::WHITE, Color32::from_rgb(40, 60, 90)),
        Theme::Dark => (Color32::from_rgb(25, 30, 45), Color32::from_rgb(200, 215, 235)),
    }
}

fn label_color(theme: Theme) -> Color32 {
    match theme {
        Theme::Light => Color32::from_rgb(30, 40, 60),
        Theme::Dark => Color32::from_rgb(220, 225, 235),
    }
}

/// Same members, compared by size and mutual containment.
fn same_members(a: &HashSet<String>, b: &HashSet<String>) -> bool {
    a.len() == b.len() && a.iter().all(|id| b.contains(id)) && b.iter().all(|id| a.contains(id))
}

/// Airport layer properties.
#[derive(Debug, Clone, PartialEq)]
pub struct AirportProps {
    pub airports: Vec<Airport>,
    /// Airport ids drawn with inverted colors and winning labels
    pub highlighted: HashSet<String>,
    pub show_labels: bool,
    pub pickable: bool,
}

impl Default for AirportProps {
    fn default() -> Self {
        Self {
            airports: Vec::new(),
            highlighted: HashSet::new(),
            show_labels: true,
            pickable: true,
        }
    }
}

/// Partial update; `None` fields are left alone.
#[derive(Debug, Clone, Default)]
pub struct AirportPatch {
    pub airports: Option<Vec<Airport>>,
    pub highlighted: Option<HashSet<String>>,
    pub show_labels: Option<bool>,
    pub pickable: Option<bool>,
}

type HoverCallback = Box<dyn FnMut(Option<&str>, &PointerEvent)>;
type ClickCallback = Box<dyn FnMut(&str)>;

/// Produces a marker primitive and an optional label primitive.
pub struct AirportLayer {
    id: LayerId,
    registry: Rc<LayerRegistry>,
    props: AirportProps,
    shallow_update: u64,
    hovered: Option<String>,
    on_hover: Option<HoverCallback>,
    on_click: Option<ClickCallback>,
    registered: bool,
}

impl AirportLayer {
    pub fn new(registry: &Rc<LayerRegistry>, props: AirportProps) -> Rc<RefCell<Self>> {
        let layer = Rc::new_cyclic(|weak: &Weak<RefCell<Self>>| {
            let id = registry.register(weak.clone(), "airports", AIRPORT_Z_ORDER);
            RefCell::new(Self {
                id,
                registry: registry.clone(),
                props,
                shallow_update: 0,
                hovered: None,
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

    pub fn props(&self) -> &AirportProps {
        &self.props
    }

    /// Bumped whenever highlight membership changes.
    pub fn shallow_update(&self) -> u64 {
        self.shallow_update
    }

    pub fn on_hover(&mut self, callback: impl FnMut(Option<&str>, &PointerEvent) + 'static) {
        self.on_hover = Some(Box::new(callback));
    }

    pub fn on_click(&mut self, callback: impl FnMut(&str) + 'static) {
        self.on_click = Some(Box::new(callback));
    }

    /// Applies changed fields and renders at most once.
    pub fn set_props(&mut self, patch: AirportPatch) {
        let mut changed = false;

        if let Some(airports) = patch.airports {
            if airports != self.props.airports {
                self.props.airports = airports;
                changed = true;
            }
        }
        if let Some(highlighted) = patch.highlighted {
            if !same_members(&highlighted, &self.props.highlighted) {
                self.props.highlighted = highlighted;
                self.shallow_update += 1;
                changed = true;
            }
        }
        if let Some(show_labels) = patch.show_labels {
            if show_labels != self.props.show_labels {
                self.props.show_labels = show_labels;
                changed = true;
            }
        }
        if let Some(pickable) = patch.pickable {
            if pickable != self.props.pickable {
                self.props.pickable = pickable;
                changed = true;
            }
        }

        if changed {
            if let Err(e) = self.render(false) {
                log::error!("{}", e);
            }
        }
    }

    fn airport_for(&self, hit: &PickHit) -> Option<&Airport> {
        let index = decode_pick_color(hit.color)?;
        self.props.airports.get(index as usize)
    }

    fn markers(&self, theme: Theme) -> MarkerPrimitive {
        let (fill, line) = marker_colors(theme);
        let markers = self
            .props
            .airports
            .iter()
            .enumerate()
            .map(|(i, airport)| {
                let highlighted = self.props.highlighted.contains(&airport.id);
                let (fill, line) = if highlighted { (line, fill) } else { (fill, line) };
                MarkerObject {
                    owner: airport.id.clone(),
                    coord: airport.coord(),
                    fill,
                    line,
                    radius: MARKER_RADIUS,
                    pick_color: self.props.pickable.then(|| encode_pick_index(i as u32)),
                }
            })
            .collect();
        MarkerPrimitive {
            markers,
            pickable: self.props.pickable,
        }
    }

    fn labels(&self, theme: Theme) -> LabelPrimitive {
        let labels = self
            .props
            .airports
            .iter()
            .map(|airport| LabelObject {
                text: airport.code.clone(),
                coord: airport.coord(),
                color: label_color(theme),
                priority: if self.props.highlighted.contains(&airport.id) {
                    HIGHLIGHT_LABEL_PRIORITY
                } else {
                    0.0
                },
            })
            .collect();
        LabelPrimitive {
            labels,
            size: LABEL_SIZE,
            collision_trigger: self.shallow_update,
        }
    }

    pub fn destroy(&mut self) {
        if std::mem::take(&mut self.registered) {
            self.registry.deregister(self.id);
        }
    }
}

impl LayerModule for AirportLayer {
    fn render(&mut self, _regenerate: bool) -> MapResult<()> {
        let theme = self.registry.theme();
        let generation = self.registry.identity_token();

        let mut layers = vec![Primitive::new(
            PrimitiveId::new(self.id, "airport-markers", generation),
            PrimitiveBody::Markers(self.markers(theme)),
        )];
        if self.props.show_labels {
            layers.push(Primitive::new(
                PrimitiveId::new(self.id, "airport-labels", generation),
                PrimitiveBody::Labels(self.labels(theme)),
            ));
        }

        self.registry.update_layer(self.id, layers);
        Ok(())
    }

    fn hover(&mut self, hit: Option<&PickHit>, event: &PointerEvent) -> bool {
        let airport = hit.and_then(|h| self.airport_for(h)).map(|a| a.id.clone());
        if airport == self.hovered {
            return airport.is_some();
        }
        self.hovered = airport;
        if let Some(callback) = self.on_hover.as_mut() {
            callback(self.hovered.as_deref(), event);
        }
        self.hovered.is_some()
    }

    fn click(&mut self, hit: &PickHit) {
        let Some(id) = self.airport_for(hit).map(|a| a.id.clone()) else {
            return;
        };
        if let Some(callback) = self.on_click.as_mut() {
            callback(&id);
        }
    }
}

impl Drop for AirportLayer {
    fn drop(&mut self) {
        self.destroy();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::MapSettings;

    fn airport(id: &str, code: &str, lon: f64, lat: f64) -> Airport {
        Airport {
            id: id.into(),
            code: code.into(),
            name: String::new(),
            position: [lon, lat],
        }
    }

    fn setup() -> (Rc<LayerRegistry>, Rc<RefCell<AirportLayer>>) {
        let registry = LayerRegistry::new(&MapSettings::default());
        let layer = AirportLayer::new(
            &registry,
            AirportProps {
                airports: vec![
                    airport("1", "FRA", 8.57, 50.03),
                    airport("2", "JFK", -73.78, 40.64),
                ],
                ..Default::default()
            },
        );
        (registry, layer)
    }

    fn rendered(layer: &Rc<RefCell<AirportLayer>>) -> (MarkerPrimitive, Option<LabelPrimitive>) {
        let layer = layer.borrow_mut();
        let theme = layer.registry.theme();
        let labels = layer.props.show_labels.then(|| layer.labels(theme));
        (layer.markers(theme), labels)
    }

    #[test]
    fn test_highlight_inverts_colors_and_wins_labels() {
        let (_registry, layer) = setup();
        layer.borrow_mut().set_props(AirportPatch {
            highlighted: Some(HashSet::from(["2".to_string()])),
            ..Default::default()
        });

        let (markers, labels) = rendered(&layer);
        let (fill, line) = marker_colors(Theme::Light);
        assert_eq!((markers.markers[0].fill, markers.markers[0].line), (fill, line));
        assert_eq!((markers.markers[1].fill, markers.markers[1].line), (line, fill));

        let labels = labels.unwrap();
        assert_eq!(labels.labels[1].priority, HIGHLIGHT_LABEL_PRIORITY);
        assert_eq!(labels.labels[0].priority, 0.0);
    }

    #[test]
    fn test_shallow_update_only_on_membership_change() {
        let (_registry, layer) = setup();
        let set = |ids: &[&str]| AirportPatch {
            highlighted: Some(ids.iter().map(|s| s.to_string()).collect()),
            ..Default::default()
        };

        layer.borrow_mut().set_props(set(&["1", "2"]));
        assert_eq!(layer.borrow().shallow_update(), 1);

        // New set object, same members
        layer.borrow_mut().set_props(set(&["2", "1"]));
        assert_eq!(layer.borrow().shallow_update(), 1);

        layer.borrow_mut().set_props(set(&["1"]));
        assert_eq!(layer.borrow().shallow_update(), 2);
    }

    #[test]
    fn test_labels_omitted_when_disabled() {
        let (registry, layer) = setup();
        assert_eq!(registry.composite_snapshot().len(), 0);

        layer.borrow_mut().set_props(AirportPatch {
            show_labels: Some(false),
            ..Default::default()
        });
        let (_, labels) = rendered(&layer);
        assert!(labels.is_none());
    }

    #[test]
    fn test_hover_and_click_decode_marker_colors() {
        let (_registry, layer) = setup();
        let hovered = Rc::new(RefCell::new(Vec::new()));
        let clicked = Rc::new(RefCell::new(Vec::new()));
        {
            let hovered = hovered.clone();
            let clicked = clicked.clone();
            let mut l = layer.borrow_mut();
            l.on_hover(move |id, _| hovered.borrow_mut().push(id.map(str::to_string)));
            l.on_click(move |id| clicked.borrow_mut().push(id.to_string()));
        }

        let id = layer.borrow().id();
        let hit = PickHit {
            primitive: PrimitiveId::new(id, "airport-markers", 0),
            color: encode_pick_index(1),
        };
        let event = PointerEvent {
            pos: eframe::egui::Pos2::ZERO,
            geo: None,
        };
        assert!(layer.borrow_mut().hover(Some(&hit), &event));
        assert!(!layer.borrow_mut().hover(None, &event));
        layer.borrow_mut().click(&hit);

        assert_eq!(*hovered.borrow(), vec![Some("2".to_string()), None]);
        assert_eq!(*clicked.borrow(), vec!["2".to_string()]);
    }
}
