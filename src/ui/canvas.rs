//! Central canvas: the egui render surface and map interaction.

use super::colors;
use eframe::egui::{self, Align2, Color32, FontId, Pos2, Rect, Sense, Vec2};
use flightmap::geo::{
    pick_primitives, render_primitives, MapProjection, PickHit, Primitive, ProjectionMode,
};
use flightmap::map::{
    CameraPose, CursorStyle, GeoAnchoredOverlay, LayerRegistry, PointerEvent, RenderSurface,
    Transition, WidgetRegistry, DEFAULT_POSE,
};
use std::cell::RefCell;
use std::rc::Rc;
use web_time::Instant;

/// Zoom change per scrolled point.
const SCROLL_ZOOM_RATE: f64 = 0.005;

/// Surface state shared between the registry's surface handle and the canvas.
pub struct SurfaceState {
    pub mode: ProjectionMode,
    pub rect: Option<Rect>,
    pub layers: Vec<Rc<Primitive>>,
    pub camera: Option<CameraPose>,
    pub transition: Option<Transition>,
    pub cursor: CursorStyle,
}

impl SurfaceState {
    /// Displayed pose, following any running transition.
    pub fn current_pose(&self, now: Instant) -> Option<CameraPose> {
        match &self.transition {
            Some(t) if !t.is_finished(now) => Some(t.pose_at(now)),
            _ => self.camera,
        }
    }

    pub fn projection(&self, now: Instant) -> Option<MapProjection> {
        let rect = self.rect?;
        let pose = self.current_pose(now).unwrap_or(DEFAULT_POSE);
        Some(MapProjection::new(pose, self.mode, rect))
    }
}

/// Render surface backed by an egui painter.
pub struct EguiSurface {
    state: Rc<RefCell<SurfaceState>>,
}

impl EguiSurface {
    pub fn new(mode: ProjectionMode) -> (Self, Rc<RefCell<SurfaceState>>) {
        let state = Rc::new(RefCell::new(SurfaceState {
            mode,
            rect: None,
            layers: Vec::new(),
            camera: None,
            transition: None,
            cursor: CursorStyle::Default,
        }));
        (
            Self {
                state: state.clone(),
            },
            state,
        )
    }
}

impl RenderSurface for EguiSurface {
    fn size(&self) -> Option<Vec2> {
        self.state.borrow().rect.map(|r| r.size())
    }

    fn projection_mode(&self) -> ProjectionMode {
        self.state.borrow().mode
    }

    fn set_layers(&mut self, layers: Vec<Rc<Primitive>>) {
        self.state.borrow_mut().layers = layers;
    }

    fn camera(&self) -> Option<CameraPose> {
        self.state.borrow().current_pose(Instant::now())
    }

    fn set_camera(&mut self, pose: CameraPose, transition: Option<Transition>) {
        let mut state = self.state.borrow_mut();
        state.camera = Some(pose);
        state.transition = transition;
    }

    fn pick(&self, pos: Pos2) -> Option<PickHit> {
        let state = self.state.borrow();
        let projection = state.projection(Instant::now())?;
        pick_primitives(&state.layers, &projection, pos)
    }

    fn set_cursor(&mut self, cursor: CursorStyle) {
        self.state.borrow_mut().cursor = cursor;
    }
}

/// Everything the canvas needs for one frame.
pub struct CanvasContext<'a> {
    pub registry: &'a Rc<LayerRegistry>,
    pub surface: &'a Rc<RefCell<SurfaceState>>,
    pub widgets: &'a Rc<WidgetRegistry>,
    pub overlay: &'a Rc<RefCell<GeoAnchoredOverlay>>,
    pub max_zoom: f64,
}

/// Render the map canvas and route pointer input to the registry.
pub fn render_canvas(ctx: &egui::Context, canvas: CanvasContext<'_>) {
    egui::CentralPanel::default()
        .frame(egui::Frame::NONE)
        .show(ctx, |ui| {
            let available_size = ui.available_size();
            let (response, painter) =
                ui.allocate_painter(available_size, Sense::click_and_drag());
            let rect = response.rect;
            let now = Instant::now();

            // Size changes resolve any fit parked before layout
            let resized = {
                let mut state = canvas.surface.borrow_mut();
                let changed = state.rect.map(|r| r.size()) != Some(rect.size());
                state.rect = Some(rect);
                changed
            };
            if resized {
                log::debug!("Canvas resized to {:?}", rect.size());
                canvas.registry.resize(rect.size());
            }

            handle_canvas_interaction(ui, &response, &canvas, now);

            let Some(projection) = canvas.surface.borrow().projection(now) else {
                return;
            };
            {
                let state = canvas.surface.borrow();
                render_primitives(&painter, &state.layers, &projection, canvas.registry.theme());
                if state.cursor == CursorStyle::Pointer {
                    ctx.set_cursor_icon(egui::CursorIcon::PointingHand);
                }
                if state.transition.is_some_and(|t| !t.is_finished(now)) {
                    ctx.request_repaint();
                }
            }

            canvas.widgets.tick(&projection, now);
            draw_overlay(&painter, &canvas.overlay.borrow());
            draw_camera_info(&painter, rect, &projection.pose);
        });
}

fn handle_canvas_interaction(
    ui: &egui::Ui,
    response: &egui::Response,
    canvas: &CanvasContext<'_>,
    now: Instant,
) {
    let projection = canvas.surface.borrow().projection(now);
    let Some(projection) = projection else {
        return;
    };

    // Drag pans by moving the point under the drag start to the pointer
    if response.dragged() {
        let delta = response.drag_delta();
        let center = projection.screen_rect.center();
        if let Some(geo) = projection.screen_to_geo(center - delta) {
            let mut state = canvas.surface.borrow_mut();
            let mut pose = projection.pose;
            pose.longitude = geo.x;
            pose.latitude = geo.y.clamp(-85.0, 85.0);
            state.camera = Some(pose);
            state.transition = None;
        }
    }

    let scroll = ui.input(|i| i.smooth_scroll_delta.y);
    if response.hovered() && scroll != 0.0 {
        let mut state = canvas.surface.borrow_mut();
        let mut pose = projection.pose;
        pose.zoom = (pose.zoom + scroll as f64 * SCROLL_ZOOM_RATE).clamp(0.0, canvas.max_zoom);
        state.camera = Some(pose);
        state.transition = None;
    }

    if let Some(pos) = response.hover_pos() {
        let event = PointerEvent {
            pos,
            geo: projection.screen_to_geo(pos),
        };
        canvas.registry.pointer_moved(pos, &event);
    }

    if response.clicked() {
        if let Some(pos) = response.interact_pointer_pos() {
            canvas.registry.clicked(pos);
        }
    }
}

/// Draws the hovered-airport overlay at its tracked screen position.
fn draw_overlay(painter: &egui::Painter, overlay: &GeoAnchoredOverlay) {
    if !overlay.is_visible() {
        return;
    }
    let Some(pos) = overlay.screen_pos() else {
        return;
    };
    let text = overlay.props().content.as_str();
    let galley = painter.layout_no_wrap(
        text.to_string(),
        FontId::proportional(13.0),
        colors::overlay::TEXT.gamma_multiply(overlay.opacity()),
    );
    let anchor = pos + Vec2::new(0.0, -14.0);
    let rect = Align2::CENTER_BOTTOM.anchor_size(anchor, galley.size() + Vec2::splat(8.0));
    painter.rect_filled(
        rect,
        4.0,
        colors::overlay::BACKGROUND.gamma_multiply(overlay.opacity()),
    );
    painter.galley(rect.min + Vec2::splat(4.0), galley, Color32::WHITE);
}

fn draw_camera_info(painter: &egui::Painter, rect: Rect, pose: &CameraPose) {
    painter.text(
        rect.left_bottom() + Vec2::new(10.0, -10.0),
        Align2::LEFT_BOTTOM,
        format!(
            "{:.3}°, {:.3}°  z{:.1}",
            pose.latitude, pose.longitude, pose.zoom
        ),
        FontId::monospace(11.0),
        colors::canvas::INFO_TEXT,
    );
}
