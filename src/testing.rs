//! Test doubles shared by the unit tests.

use crate::error::{MapError, MapResult};
use crate::geo::{
    PathObject, PathPrimitive, PickHit, Primitive, PrimitiveBody, PrimitiveId, ProjectionMode,
    TileSource,
};
use crate::map::{
    CameraPose, CursorStyle, LayerId, LayerModule, LayerRegistry, PointerEvent, RenderSurface,
    Transition,
};
use eframe::egui::{Color32, Pos2, Vec2};
use geo_types::Coord;
use std::cell::RefCell;
use std::rc::Rc;

/// Everything a [`RecordingSurface`] was told.
pub struct SurfaceLog {
    pub mode: ProjectionMode,
    pub size: Option<Vec2>,
    pub composites: Vec<Vec<Rc<Primitive>>>,
    pub camera: Option<CameraPose>,
    pub cameras: Vec<(CameraPose, Option<Transition>)>,
    pub cursor: CursorStyle,
    pub next_pick: Option<PickHit>,
}

/// Render surface that records calls into a shared log.
pub struct RecordingSurface {
    log: Rc<RefCell<SurfaceLog>>,
}

impl RecordingSurface {
    pub fn new(mode: ProjectionMode) -> (Self, Rc<RefCell<SurfaceLog>>) {
        let log = Rc::new(RefCell::new(SurfaceLog {
            mode,
            size: Some(Vec2::new(800.0, 600.0)),
            composites: Vec::new(),
            camera: None,
            cameras: Vec::new(),
            cursor: CursorStyle::Default,
            next_pick: None,
        }));
        (Self { log: log.clone() }, log)
    }
}

impl RenderSurface for RecordingSurface {
    fn size(&self) -> Option<Vec2> {
        self.log.borrow().size
    }

    fn projection_mode(&self) -> ProjectionMode {
        self.log.borrow().mode
    }

    fn set_layers(&mut self, layers: Vec<Rc<Primitive>>) {
        self.log.borrow_mut().composites.push(layers);
    }

    fn camera(&self) -> Option<CameraPose> {
        self.log.borrow().camera
    }

    fn set_camera(&mut self, pose: CameraPose, transition: Option<Transition>) {
        let mut log = self.log.borrow_mut();
        log.camera = Some(pose);
        log.cameras.push((pose, transition));
    }

    fn pick(&self, _pos: Pos2) -> Option<PickHit> {
        self.log.borrow().next_pick.clone()
    }

    fn set_cursor(&mut self, cursor: CursorStyle) {
        self.log.borrow_mut().cursor = cursor;
    }
}

/// Layer module that pushes a fixed list and records what it was asked.
pub struct StaticLayer {
    pub id: LayerId,
    registry: Rc<LayerRegistry>,
    pub layers: Vec<Primitive>,
    pub fail: bool,
    pub renders: Vec<bool>,
    pub hovers: Vec<Option<PickHit>>,
    pub clicks: Vec<PickHit>,
}

impl StaticLayer {
    pub fn new(registry: &Rc<LayerRegistry>, name: &str, z_order: i32) -> Rc<RefCell<Self>> {
        Rc::new_cyclic(|weak: &std::rc::Weak<RefCell<StaticLayer>>| {
            let id = registry.register(weak.clone(), name, z_order);
            RefCell::new(Self {
                id,
                registry: registry.clone(),
                layers: Vec::new(),
                fail: false,
                renders: Vec::new(),
                hovers: Vec::new(),
                clicks: Vec::new(),
            })
        })
    }

    /// Sets the list without pushing it.
    pub fn stage(layer: &Rc<RefCell<Self>>, build: impl FnOnce(LayerId) -> Vec<Primitive>) {
        let id = layer.borrow().id;
        layer.borrow_mut().layers = build(id);
    }

    /// Sets the list and pushes it to the registry.
    pub fn push(layer: &Rc<RefCell<Self>>, build: impl FnOnce(LayerId) -> Vec<Primitive>) {
        let id = layer.borrow().id;
        let layers = build(id);
        let registry = layer.borrow().registry.clone();
        layer.borrow_mut().layers = layers.clone();
        registry.update_layer(id, layers);
    }

    pub fn destroy(&mut self) {
        self.registry.deregister(self.id);
    }
}

impl LayerModule for StaticLayer {
    fn render(&mut self, regenerate: bool) -> MapResult<()> {
        self.renders.push(regenerate);
        if self.fail {
            return Err(MapError::Render {
                name: "static".into(),
                reason: "told to fail".into(),
            });
        }
        self.registry.update_layer(self.id, self.layers.clone());
        Ok(())
    }

    fn hover(&mut self, hit: Option<&PickHit>, _event: &PointerEvent) -> bool {
        self.hovers.push(hit.cloned());
        hit.is_some()
    }

    fn click(&mut self, hit: &PickHit) {
        self.clicks.push(hit.clone());
    }
}

pub fn base_tiles(layer: LayerId) -> Primitive {
    Primitive::new(
        PrimitiveId::new(layer, "tiles", 0),
        PrimitiveBody::BaseTiles(TileSource {
            url_template: "https://tiles.invalid/{z}/{x}/{y}.png".into(),
            min_zoom: 0,
            max_zoom: 19,
        }),
    )
}

pub fn path_primitive(layer: LayerId, name: &str) -> Primitive {
    Primitive::new(
        PrimitiveId::new(layer, name, 0),
        PrimitiveBody::Paths(PathPrimitive {
            width: 2.0,
            color: Color32::RED,
            depth_bias: 0.0,
            paths: vec![PathObject {
                owner: name.to_string(),
                coords: vec![Coord { x: 0.0, y: 0.0 }, Coord { x: 1.0, y: 1.0 }],
                pick_color: None,
            }],
            pickable: false,
            auto_highlight: false,
            highlighted_owner: None,
            highlight_color: Color32::YELLOW,
        }),
    )
}

/// Primitive names in draw order.
pub fn names(layers: &[Rc<Primitive>]) -> Vec<String> {
    layers.iter().map(|p| p.id.name.clone()).collect()
}
