//! Layer registry: the single owner of the render surface.
//!
//! Layer modules register here, push their primitive lists through
//! [`LayerRegistry::update_layer`], and the registry composites every list
//! into one z-ordered draw list for the surface.

use super::surface::{CursorStyle, PointerEvent, RenderSurface, Theme};
use super::viewport::{CameraMove, CameraPose, ViewportController};
use crate::error::{MapError, MapResult};
use crate::geo::{
    BackgroundFill, PickHit, Primitive, PrimitiveBody, PrimitiveId, PrimitiveKind, ProjectionMode,
};
use crate::settings::MapSettings;
use eframe::egui::{Color32, Pos2, Vec2};
use geo_types::Rect;
use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::rc::{Rc, Weak};
use web_time::Instant;

/// Registry-assigned layer id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LayerId(pub u32);

impl LayerId {
    /// Owner of primitives the registry injects itself.
    pub const REGISTRY: LayerId = LayerId(0);
}

/// A producer of primitives.
pub trait LayerModule {
    /// Recomputes primitives and pushes them via `update_layer`.
    ///
    /// `regenerate` asks for fresh primitive identities (surface swap).
    fn render(&mut self, regenerate: bool) -> MapResult<()>;

    /// Pointer moved; `hit` is set when one of this layer's primitives is
    /// under the pointer. Returns whether the layer reacted.
    fn hover(&mut self, _hit: Option<&PickHit>, _event: &PointerEvent) -> bool {
        false
    }

    fn click(&mut self, _hit: &PickHit) {}
}

struct LayerEntry {
    name: String,
    z_order: i32,
    layers: Vec<Rc<Primitive>>,
    module: Weak<RefCell<dyn LayerModule>>,
}

/// Background sphere colors per theme.
fn globe_background(theme: Theme) -> Color32 {
    match theme {
        Theme::Light => Color32::from_rgb(170, 211, 223),
        Theme::Dark => Color32::from_rgb(22, 30, 46),
    }
}

/// Owns the layer modules' output and the render surface.
///
/// Shared as `Rc<LayerRegistry>`; all state sits behind cells so modules can
/// call back in while the registry is driving them.
pub struct LayerRegistry {
    entries: RefCell<BTreeMap<LayerId, LayerEntry>>,
    next_id: Cell<u32>,
    defer_update: Cell<bool>,
    composite_pending: Cell<bool>,
    identity: Cell<u32>,
    projection: Cell<ProjectionMode>,
    theme: Cell<Theme>,
    cursor: Cell<CursorStyle>,
    surface: RefCell<Option<Box<dyn RenderSurface>>>,
    viewport: RefCell<ViewportController>,
    composite: RefCell<Vec<Rc<Primitive>>>,
}

impl LayerRegistry {
    pub fn new(settings: &MapSettings) -> Rc<Self> {
        Rc::new(Self {
            entries: RefCell::new(BTreeMap::new()),
            next_id: Cell::new(1),
            defer_update: Cell::new(false),
            composite_pending: Cell::new(false),
            identity: Cell::new(0),
            projection: Cell::new(settings.projection),
            theme: Cell::new(Theme::from_dark_mode(settings.dark_mode)),
            cursor: Cell::new(CursorStyle::Default),
            surface: RefCell::new(None),
            viewport: RefCell::new(ViewportController::new(
                settings.fit_options(),
                settings.home_coord(),
            )),
            composite: RefCell::new(Vec::new()),
        })
    }

    /// Adds an empty entry. Nothing is composited: the entry has no content.
    pub fn register(
        &self,
        module: Weak<RefCell<dyn LayerModule>>,
        name: &str,
        z_order: i32,
    ) -> LayerId {
        let id = LayerId(self.next_id.get());
        self.next_id.set(id.0 + 1);
        self.entries.borrow_mut().insert(
            id,
            LayerEntry {
                name: name.to_string(),
                z_order,
                layers: Vec::new(),
                module,
            },
        );
        log::debug!("Registered layer '{}' as {:?} (z={})", name, id, z_order);
        id
    }

    /// Removes an entry and recomposites without it.
    pub fn deregister(&self, id: LayerId) {
        let removed = self.entries.borrow_mut().remove(&id);
        match removed {
            Some(entry) => {
                log::debug!("Deregistered layer '{}' ({:?})", entry.name, id);
                self.request_composite();
            }
            None => log::error!("{}", MapError::UnknownLayer(id)),
        }
    }

    /// Replaces a layer's primitive list; unknown ids are logged and ignored.
    pub fn update_layer(&self, id: LayerId, layers: Vec<Primitive>) {
        {
            let mut entries = self.entries.borrow_mut();
            let Some(entry) = entries.get_mut(&id) else {
                log::error!("update_layer: {}", MapError::UnknownLayer(id));
                return;
            };
            entry.layers = layers.into_iter().map(Rc::new).collect();
        }
        self.request_composite();
    }

    pub fn is_registered(&self, id: LayerId) -> bool {
        self.entries.borrow().contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }

    /// Current identity token; changes on every surface swap.
    pub fn identity_token(&self) -> u32 {
        self.identity.get()
    }

    pub fn theme(&self) -> Theme {
        self.theme.get()
    }

    pub fn projection(&self) -> ProjectionMode {
        self.projection.get()
    }

    /// Swaps the render surface and re-renders every module once.
    ///
    /// Modules drop their hover state when regenerating, so the cursor
    /// starts over at the default on the new surface.
    pub fn set_render_surface(&self, mut surface: Box<dyn RenderSurface>, theme: Theme) {
        let size = surface.size();
        self.identity.set(self.identity.get().wrapping_add(1));
        self.projection.set(surface.projection_mode());
        self.theme.set(theme);
        self.cursor.set(CursorStyle::Default);
        surface.set_cursor(CursorStyle::Default);
        *self.surface.borrow_mut() = Some(surface);
        log::info!(
            "Render surface attached ({:?}, {:?}, identity {})",
            self.projection.get(),
            theme,
            self.identity.get()
        );

        self.deferred(|| {
            self.composite_pending.set(true);
            self.render_all(true);
        });

        if let Some(size) = size {
            self.resize(size);
        }
    }

    /// Switches the color set; every module re-renders, one composite.
    pub fn set_theme(&self, theme: Theme) {
        if self.theme.get() == theme {
            return;
        }
        self.theme.set(theme);
        self.deferred(|| {
            self.composite_pending.set(true);
            self.render_all(false);
        });
    }

    /// Runs `f` with compositing deferred; composites once afterwards if any
    /// update arrived. Nested calls composite only at the outermost level.
    pub fn deferred<R>(&self, f: impl FnOnce() -> R) -> R {
        let was_deferred = self.defer_update.replace(true);
        let result = f();
        if !was_deferred {
            self.defer_update.set(false);
            if self.composite_pending.replace(false) {
                self.composite();
            }
        }
        result
    }

    pub fn is_deferred(&self) -> bool {
        self.defer_update.get()
    }

    fn render_all(&self, regenerate: bool) {
        let modules: Vec<(String, Weak<RefCell<dyn LayerModule>>)> = self
            .entries
            .borrow()
            .values()
            .map(|e| (e.name.clone(), e.module.clone()))
            .collect();

        for (name, module) in modules {
            let Some(module) = module.upgrade() else {
                log::warn!("Layer '{}' was dropped without deregistering", name);
                continue;
            };
            let Ok(mut module) = module.try_borrow_mut() else {
                log::warn!("Layer '{}' is busy; keeping its previous primitives", name);
                continue;
            };
            if let Err(e) = module.render(regenerate) {
                log::error!("{}", e);
            }
        }
    }

    fn request_composite(&self) {
        if self.defer_update.get() {
            self.composite_pending.set(true);
        } else {
            self.composite();
        }
    }

    /// Composites all entries and pushes the result to the surface.
    fn composite(&self) {
        let layers = match self.build_composite() {
            Ok(layers) => layers,
            Err(e) => {
                log::error!("Composite skipped: {}", e);
                return;
            }
        };
        *self.composite.borrow_mut() = layers.clone();
        if let Some(surface) = self.surface.borrow_mut().as_mut() {
            surface.set_layers(layers);
        }
    }

    fn build_composite(&self) -> MapResult<Vec<Rc<Primitive>>> {
        let entries = self.entries.borrow();
        let mut ordered: Vec<&LayerEntry> = entries.values().collect();
        // Stable: equal z keeps registration (id) order
        ordered.sort_by_key(|e| e.z_order);

        let mut layers: Vec<Rc<Primitive>> = ordered
            .iter()
            .flat_map(|e| e.layers.iter().cloned())
            .collect();

        let base = layers
            .iter()
            .position(|p| p.kind() == PrimitiveKind::BaseTiles)
            .ok_or(MapError::MissingBaseLayer)?;

        if self.projection.get() == ProjectionMode::Globe {
            let background = Primitive::new(
                PrimitiveId::new(LayerId::REGISTRY, "globe-background", self.identity.get()),
                PrimitiveBody::Background(BackgroundFill {
                    color: globe_background(self.theme.get()),
                }),
            );
            layers.insert(base + 1, Rc::new(background));
        }
        Ok(layers)
    }

    /// Last composite pushed to the surface.
    pub fn composite_snapshot(&self) -> Vec<Rc<Primitive>> {
        self.composite.borrow().clone()
    }

    // ------------------------------------------------------------------
    // Pointer routing

    /// Hit tests `pos` and forwards hover to every registered layer.
    pub fn pointer_moved(&self, pos: Pos2, event: &PointerEvent) {
        let hit = self.surface.borrow().as_ref().and_then(|s| s.pick(pos));
        for (id, module) in self.modules() {
            let own_hit = hit.as_ref().filter(|h| h.primitive.layer == id);
            match module.try_borrow_mut() {
                Ok(mut m) => {
                    m.hover(own_hit, event);
                }
                Err(_) => log::warn!("Layer {:?} is busy; hover dropped", id),
            }
        }
    }

    /// Hit tests `pos` and routes a click to the owning layer.
    pub fn clicked(&self, pos: Pos2) {
        let Some(hit) = self.surface.borrow().as_ref().and_then(|s| s.pick(pos)) else {
            return;
        };
        let owner = self
            .entries
            .borrow()
            .get(&hit.primitive.layer)
            .and_then(|e| e.module.upgrade());
        let Some(owner) = owner else {
            log::debug!("Click on unowned primitive {}", hit.primitive);
            return;
        };
        match owner.try_borrow_mut() {
            Ok(mut module) => module.click(&hit),
            Err(_) => log::warn!("Layer {:?} is busy; click dropped", hit.primitive.layer),
        };
    }

    fn modules(&self) -> Vec<(LayerId, Rc<RefCell<dyn LayerModule>>)> {
        self.entries
            .borrow()
            .iter()
            .filter_map(|(id, e)| e.module.upgrade().map(|m| (*id, m)))
            .collect()
    }

    /// Sets the cursor on the render root.
    pub fn set_cursor(&self, cursor: CursorStyle) {
        if self.cursor.replace(cursor) == cursor {
            return;
        }
        if let Some(surface) = self.surface.borrow_mut().as_mut() {
            surface.set_cursor(cursor);
        }
    }

    pub fn cursor(&self) -> CursorStyle {
        self.cursor.get()
    }

    // ------------------------------------------------------------------
    // Camera

    /// Surface size changed; resolves any fit parked before a size existed.
    pub fn resize(&self, size: Vec2) {
        let pose = self.viewport.borrow_mut().on_resize(size);
        if let Some(pose) = pose {
            self.apply_camera(CameraMove {
                pose,
                transition: None,
            });
        }
    }

    /// Animates (or jumps) the camera to frame `bounds`.
    pub fn transition_to(&self, bounds: Rect<f64>) {
        let (camera, size) = self.surface_camera();
        let planned = self
            .viewport
            .borrow_mut()
            .transition_to(bounds, camera, size, Instant::now());
        if let Some(mv) = planned {
            self.apply_camera(mv);
        }
    }

    /// Flies to the configured home point; no-op without one.
    pub fn translate_home(&self) {
        let (camera, _) = self.surface_camera();
        let planned = self
            .viewport
            .borrow_mut()
            .translate_home(camera, Instant::now());
        match planned {
            Some(mv) => self.apply_camera(mv),
            None => log::debug!("No home point configured"),
        }
    }

    fn surface_camera(&self) -> (Option<CameraPose>, Option<Vec2>) {
        match self.surface.borrow().as_ref() {
            Some(s) => (s.camera(), s.size()),
            None => (None, None),
        }
    }

    fn apply_camera(&self, mv: CameraMove) {
        match self.surface.borrow_mut().as_mut() {
            Some(surface) => surface.set_camera(mv.pose, mv.transition),
            None => log::debug!("{}; camera pose {:?} not applied", MapError::NoSurface, mv.pose),
        }
    }

    /// The first pose the camera was given.
    pub fn start_view(&self) -> CameraPose {
        self.viewport.borrow().start_view()
    }

    /// Current camera pose (start view until the surface reports one).
    pub fn viewport(&self) -> CameraPose {
        self.surface_camera().0.unwrap_or_else(|| self.start_view())
    }

    /// Direct access to the controller for hosts that tune fit options.
    pub fn viewport_controller(&self) -> &RefCell<ViewportController> {
        &self.viewport
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::map::DEFAULT_POSE;
    use crate::testing::{base_tiles, names, path_primitive, RecordingSurface, StaticLayer};
    use geo_types::Coord;

    fn registry() -> Rc<LayerRegistry> {
        LayerRegistry::new(&MapSettings {
            projection: ProjectionMode::Flat,
            ..Default::default()
        })
    }

    #[test]
    fn test_register_does_not_composite() {
        let reg = registry();
        let (surface, log) = RecordingSurface::new(ProjectionMode::Flat);
        reg.set_render_surface(Box::new(surface), Theme::Light);
        let before = log.borrow().composites.len();
        let _layer = StaticLayer::new(&reg, "a", 5);
        assert_eq!(log.borrow().composites.len(), before);
    }

    #[test]
    fn test_composite_orders_by_z_then_registration() {
        let reg = registry();
        let base = StaticLayer::new(&reg, "base", 0);
        let high = StaticLayer::new(&reg, "high", 30);
        let mid_a = StaticLayer::new(&reg, "mid_a", 10);
        let mid_b = StaticLayer::new(&reg, "mid_b", 10);

        StaticLayer::push(&base, |id| vec![base_tiles(id)]);
        StaticLayer::push(&high, |id| vec![path_primitive(id, "high")]);
        StaticLayer::push(&mid_b, |id| vec![path_primitive(id, "mid_b")]);
        StaticLayer::push(&mid_a, |id| vec![path_primitive(id, "mid_a")]);

        assert_eq!(
            names(&reg.composite_snapshot()),
            vec!["tiles", "mid_a", "mid_b", "high"]
        );

        mid_a.borrow_mut().destroy();
        assert_eq!(names(&reg.composite_snapshot()), vec!["tiles", "mid_b", "high"]);
    }

    #[test]
    fn test_globe_injects_background_above_tiles() {
        let reg = LayerRegistry::new(&MapSettings::default());
        let legs = StaticLayer::new(&reg, "legs", 10);
        let base = StaticLayer::new(&reg, "base", 0);
        StaticLayer::push(&legs, |id| vec![path_primitive(id, "legs")]);
        StaticLayer::push(&base, |id| vec![base_tiles(id)]);

        let layers = reg.composite_snapshot();
        assert_eq!(names(&layers), vec!["tiles", "globe-background", "legs"]);
        assert_eq!(layers[1].id.layer, LayerId::REGISTRY);
    }

    #[test]
    fn test_background_reidentified_on_surface_swap() {
        let reg = LayerRegistry::new(&MapSettings::default());
        let base = StaticLayer::new(&reg, "base", 0);
        StaticLayer::stage(&base, |id| vec![base_tiles(id)]);

        let (surface, _) = RecordingSurface::new(ProjectionMode::Globe);
        reg.set_render_surface(Box::new(surface), Theme::Light);
        let first = reg.composite_snapshot()[1].id.clone();

        let (surface, _) = RecordingSurface::new(ProjectionMode::Globe);
        reg.set_render_surface(Box::new(surface), Theme::Dark);
        let second = reg.composite_snapshot()[1].id.clone();

        assert_eq!(first.name, "globe-background");
        assert_ne!(first, second);
    }

    #[test]
    fn test_missing_base_layer_leaves_composite_unchanged() {
        let reg = registry();
        let (surface, log) = RecordingSurface::new(ProjectionMode::Flat);
        reg.set_render_surface(Box::new(surface), Theme::Light);
        let layer = StaticLayer::new(&reg, "legs", 10);
        StaticLayer::push(&layer, |id| vec![path_primitive(id, "legs")]);

        assert!(reg.composite_snapshot().is_empty());
        assert!(log.borrow().composites.is_empty());
    }

    #[test]
    fn test_unknown_layer_update_is_ignored() {
        let reg = registry();
        reg.update_layer(LayerId(99), vec![base_tiles(LayerId(99))]);
        reg.deregister(LayerId(99));
        assert!(reg.composite_snapshot().is_empty());
        assert!(reg.is_empty());
    }

    #[test]
    fn test_surface_swap_rerenders_once_with_fresh_identity() {
        let reg = registry();
        let base = StaticLayer::new(&reg, "base", 0);
        let a = StaticLayer::new(&reg, "a", 10);
        let b = StaticLayer::new(&reg, "b", 10);
        StaticLayer::stage(&base, |id| vec![base_tiles(id)]);
        StaticLayer::stage(&a, |id| vec![path_primitive(id, "a")]);
        StaticLayer::stage(&b, |id| vec![path_primitive(id, "b")]);

        let token = reg.identity_token();
        let (surface, log) = RecordingSurface::new(ProjectionMode::Flat);
        reg.set_render_surface(Box::new(surface), Theme::Dark);

        assert_ne!(reg.identity_token(), token);
        assert_eq!(log.borrow().composites.len(), 1);
        assert_eq!(names(&log.borrow().composites[0]), vec!["tiles", "a", "b"]);
        for layer in [&base, &a, &b] {
            assert_eq!(layer.borrow().renders, vec![true]);
        }
        assert!(!reg.is_deferred());
    }

    #[test]
    fn test_failing_module_keeps_last_good_layers() {
        let reg = registry();
        let base = StaticLayer::new(&reg, "base", 0);
        let bad = StaticLayer::new(&reg, "bad", 10);
        StaticLayer::stage(&base, |id| vec![base_tiles(id)]);
        StaticLayer::push(&bad, |id| vec![path_primitive(id, "bad")]);
        bad.borrow_mut().fail = true;

        let (surface, log) = RecordingSurface::new(ProjectionMode::Flat);
        reg.set_render_surface(Box::new(surface), Theme::Light);
        assert_eq!(names(&log.borrow().composites[0]), vec!["tiles", "bad"]);
    }

    #[test]
    fn test_deferred_batches_into_one_composite() {
        let reg = registry();
        let (surface, log) = RecordingSurface::new(ProjectionMode::Flat);
        reg.set_render_surface(Box::new(surface), Theme::Light);
        let base = StaticLayer::new(&reg, "base", 0);
        let a = StaticLayer::new(&reg, "a", 10);
        let before = log.borrow().composites.len();

        reg.deferred(|| {
            StaticLayer::push(&base, |id| vec![base_tiles(id)]);
            StaticLayer::push(&a, |id| vec![path_primitive(id, "a")]);
            reg.deferred(|| StaticLayer::push(&a, |id| vec![path_primitive(id, "a2")]));
            assert_eq!(log.borrow().composites.len(), before);
        });
        assert_eq!(log.borrow().composites.len(), before + 1);
        assert_eq!(names(&reg.composite_snapshot()), vec!["tiles", "a2"]);
    }

    #[test]
    fn test_set_theme_rerenders_without_new_identity() {
        let reg = registry();
        let base = StaticLayer::new(&reg, "base", 0);
        StaticLayer::stage(&base, |id| vec![base_tiles(id)]);
        let (surface, log) = RecordingSurface::new(ProjectionMode::Flat);
        reg.set_render_surface(Box::new(surface), Theme::Light);
        let token = reg.identity_token();

        reg.set_theme(Theme::Dark);
        assert_eq!(reg.theme(), Theme::Dark);
        assert_eq!(reg.identity_token(), token);
        assert_eq!(base.borrow().renders, vec![true, false]);
        assert_eq!(log.borrow().composites.len(), 2);
    }

    #[test]
    fn test_pending_fit_applied_on_resize() {
        let reg = registry();
        let (surface, log) = RecordingSurface::new(ProjectionMode::Flat);
        log.borrow_mut().size = None;
        reg.set_render_surface(Box::new(surface), Theme::Light);

        let bounds = Rect::new(Coord { x: 10.0, y: 10.0 }, Coord { x: 10.0, y: 10.0 });
        reg.transition_to(bounds);
        assert!(log.borrow().cameras.is_empty());

        log.borrow_mut().size = Some(Vec2::new(800.0, 600.0));
        reg.resize(Vec2::new(800.0, 600.0));
        let (pose, transition) = log.borrow().cameras[0];
        assert!(transition.is_none());
        assert_eq!(pose.zoom, crate::map::SINGLE_POINT_ZOOM);
        assert_eq!(reg.start_view(), pose);
        assert_eq!(reg.viewport(), pose);
    }

    #[test]
    fn test_viewport_defaults_without_surface() {
        let reg = registry();
        assert_eq!(reg.viewport(), DEFAULT_POSE);
        reg.translate_home();
        assert_eq!(reg.viewport(), DEFAULT_POSE);
    }

    #[test]
    fn test_pointer_routes_hit_to_owner_only() {
        let reg = registry();
        let (surface, log) = RecordingSurface::new(ProjectionMode::Flat);
        reg.set_render_surface(Box::new(surface), Theme::Light);
        let a = StaticLayer::new(&reg, "a", 10);
        let b = StaticLayer::new(&reg, "b", 10);
        let hit = PickHit {
            primitive: PrimitiveId::new(b.borrow().id, "b", 0),
            color: [1, 0, 0],
        };
        log.borrow_mut().next_pick = Some(hit.clone());

        let event = PointerEvent {
            pos: Pos2::ZERO,
            geo: None,
        };
        reg.pointer_moved(Pos2::ZERO, &event);
        assert_eq!(a.borrow().hovers, vec![None]);
        assert_eq!(b.borrow().hovers, vec![Some(hit.clone())]);

        reg.clicked(Pos2::ZERO);
        assert!(a.borrow().clicks.is_empty());
        assert_eq!(b.borrow().clicks, vec![hit]);
    }

    #[test]
    fn test_surface_swap_resets_cursor() {
        let reg = registry();
        let (surface, _) = RecordingSurface::new(ProjectionMode::Flat);
        reg.set_render_surface(Box::new(surface), Theme::Light);
        reg.set_cursor(CursorStyle::Pointer);

        let (surface, log) = RecordingSurface::new(ProjectionMode::Flat);
        reg.set_render_surface(Box::new(surface), Theme::Light);
        assert_eq!(reg.cursor(), CursorStyle::Default);

        reg.set_cursor(CursorStyle::Pointer);
        assert_eq!(log.borrow().cursor, CursorStyle::Pointer);
    }

    #[test]
    fn test_cursor_forwarded_on_change() {
        let reg = registry();
        let (surface, log) = RecordingSurface::new(ProjectionMode::Flat);
        reg.set_render_surface(Box::new(surface), Theme::Light);
        reg.set_cursor(CursorStyle::Pointer);
        assert_eq!(log.borrow().cursor, CursorStyle::Pointer);
        assert_eq!(reg.cursor(), CursorStyle::Pointer);
    }
}
