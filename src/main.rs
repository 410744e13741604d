#![warn(clippy::all)]

//! Flight Map - interactive globe/flat map of flight legs and airports.
//!
//! Hosts the map core inside a native eframe window: airports, an overview
//! of every leg, and a detail layer for the selected leg, all sharing one
//! layer registry and camera.

mod ui;

use eframe::egui;
use flightmap::layers::{
    AirportLayer, AirportProps, BaseMapLayer, BaseMapProps, LegLayer, LegPatch, LegProps,
    OverviewLayer, OverviewProps,
};
use flightmap::map::{GeoAnchoredOverlay, LayerRegistry, OverlayProps, Theme, WidgetRegistry};
use flightmap::model::{Airport, Leg};
use flightmap::MapSettings;
use geo_types::Coord;
use serde::Deserialize;
use std::cell::RefCell;
use std::collections::HashSet;
use std::path::PathBuf;
use std::rc::Rc;
use ui::{CanvasContext, EguiSurface, SurfaceState};
use web_time::Instant;

/// Settings file looked up in the working directory.
const SETTINGS_FILE: &str = "flightmap.json";

// Embedded sample data
static SAMPLE_FLIGHTS: &str = include_str!("../assets/sample_flights.json");

/// Airports and legs as supplied by the flight collaborators.
#[derive(Debug, Default, Deserialize)]
struct SampleData {
    #[serde(default)]
    airports: Vec<Airport>,
    #[serde(default)]
    legs: Vec<Leg>,
}

impl SampleData {
    fn load() -> Self {
        match serde_json::from_str(SAMPLE_FLIGHTS) {
            Ok(data) => data,
            Err(e) => {
                log::error!("Failed to parse sample flights: {}", e);
                Self::default()
            }
        }
    }
}

// Native entry point
fn main() -> eframe::Result<()> {
    env_logger::init();

    let native_options = eframe::NativeOptions::default();

    eframe::run_native(
        "Flight Map",
        native_options,
        Box::new(|cc| Ok(Box::new(FlightMapApp::new(cc)))),
    )
}

/// Values written by layer callbacks, read back by the app each frame.
#[derive(Default)]
struct Interaction {
    hovered_airport: Option<String>,
    clicked_leg: Option<String>,
}

/// Main application state and logic.
pub struct FlightMapApp {
    settings: MapSettings,
    settings_path: PathBuf,

    registry: Rc<LayerRegistry>,
    surface: Rc<RefCell<SurfaceState>>,
    widgets: Rc<WidgetRegistry>,

    _basemap: Rc<RefCell<BaseMapLayer>>,
    overview: Rc<RefCell<OverviewLayer>>,
    leg: Rc<RefCell<LegLayer>>,
    airports: Rc<RefCell<AirportLayer>>,
    airport_overlay: Rc<RefCell<GeoAnchoredOverlay>>,

    legs: Vec<Leg>,
    interaction: Rc<RefCell<Interaction>>,
}

impl FlightMapApp {
    pub fn new(cc: &eframe::CreationContext<'_>) -> Self {
        let settings_path = PathBuf::from(SETTINGS_FILE);
        let settings = MapSettings::load(&settings_path);
        let theme = Theme::from_dark_mode(settings.dark_mode);
        apply_visuals(&cc.egui_ctx, theme);

        let data = SampleData::load();
        log::info!(
            "Loaded {} airports and {} legs",
            data.airports.len(),
            data.legs.len()
        );

        let registry = LayerRegistry::new(&settings);
        let widgets = WidgetRegistry::new();
        let interaction = Rc::new(RefCell::new(Interaction::default()));

        let basemap = BaseMapLayer::new(&registry, BaseMapProps::new(settings.tile_url.clone()));
        let overview = OverviewLayer::new(
            &registry,
            OverviewProps {
                legs: data.legs.clone(),
                dim_unhighlighted: settings.dim_unhighlighted,
                ..Default::default()
            },
        );
        let leg = LegLayer::new(&registry, LegProps::default());
        let airports = AirportLayer::new(
            &registry,
            AirportProps {
                airports: data.airports.clone(),
                ..Default::default()
            },
        );

        {
            let interaction = interaction.clone();
            airports.borrow_mut().on_hover(move |id, _event| {
                interaction.borrow_mut().hovered_airport = id.map(str::to_string);
            });
        }
        {
            let interaction = interaction.clone();
            overview.borrow_mut().on_click(move |id| {
                interaction.borrow_mut().clicked_leg = Some(id.to_string());
            });
        }
        overview.borrow_mut().on_hover(|id, event| {
            if let Some(id) = id {
                log::trace!("Hovering leg {} at {:?}", id, event.geo);
            }
        });

        let airport_overlay = GeoAnchoredOverlay::new(
            &widgets,
            OverlayProps {
                hidden: true,
                fade: settings.overlay_fade,
                anchor: Coord { x: 0.0, y: 0.0 },
                content: String::new(),
            },
        );

        // Attaching the surface re-renders every layer with fresh identities
        let (surface, surface_state) = EguiSurface::new(settings.projection);
        registry.set_render_surface(Box::new(surface), theme);

        overview.borrow().translate_to();

        Self {
            settings,
            settings_path,
            registry,
            surface: surface_state,
            widgets,
            _basemap: basemap,
            overview,
            leg,
            airports,
            airport_overlay,
            legs: data.legs,
            interaction,
        }
    }

    fn handle_keyboard(&mut self, ctx: &egui::Context) {
        let (home, toggle_theme) =
            ctx.input(|i| (i.key_pressed(egui::Key::H), i.key_pressed(egui::Key::T)));

        if home {
            if self.settings.home.is_some() {
                self.registry.translate_home();
            } else {
                self.overview.borrow().translate_to();
            }
        }

        if toggle_theme {
            self.settings.dark_mode = !self.settings.dark_mode;
            let theme = Theme::from_dark_mode(self.settings.dark_mode);
            apply_visuals(ctx, theme);
            self.registry.set_theme(theme);
            self.settings.save(&self.settings_path);
        }
    }

    /// Applies what the layer callbacks reported during this frame.
    fn apply_interaction(&mut self, now: Instant) {
        let (hovered_airport, clicked_leg) = {
            let mut interaction = self.interaction.borrow_mut();
            (
                interaction.hovered_airport.clone(),
                interaction.clicked_leg.take(),
            )
        };

        let overlay_props = match hovered_airport.as_deref().and_then(|id| {
            self.airports
                .borrow()
                .props()
                .airports
                .iter()
                .find(|a| a.id == id)
                .cloned()
        }) {
            Some(airport) => OverlayProps {
                hidden: false,
                fade: self.settings.overlay_fade,
                anchor: airport.coord(),
                content: format!("{} {}", airport.code, airport.name),
            },
            None => OverlayProps {
                hidden: true,
                ..self.airport_overlay.borrow().props().clone()
            },
        };
        self.airport_overlay.borrow_mut().set_props(overlay_props);

        if let Some(id) = clicked_leg {
            log::info!("Selected leg {}", id);
            let selected = self.legs.iter().find(|l| l.id == id).cloned();
            self.overview
                .borrow_mut()
                .schedule_highlight(HashSet::from([id]), now);
            self.leg.borrow_mut().set_props(LegPatch {
                leg: Some(selected),
                follow: Some(true),
                ..Default::default()
            });
        }

        if self.overview.borrow_mut().poll(now) {
            log::debug!("Applied highlight change");
        }
    }
}

fn apply_visuals(ctx: &egui::Context, theme: Theme) {
    ctx.set_visuals(if theme.is_dark() {
        egui::Visuals::dark()
    } else {
        egui::Visuals::light()
    });
}

impl eframe::App for FlightMapApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        let now = Instant::now();

        self.handle_keyboard(ctx);

        ui::render_canvas(
            ctx,
            CanvasContext {
                registry: &self.registry,
                surface: &self.surface,
                widgets: &self.widgets,
                overlay: &self.airport_overlay,
                max_zoom: self.settings.max_zoom,
            },
        );

        self.apply_interaction(now);

        // egui idles between input events, so wake up for the delayed highlight
        if self.overview.borrow().has_pending_highlight() {
            ctx.request_repaint_after(flightmap::layers::HIGHLIGHT_DELAY);
        }
    }
}
