//! Map configuration.
//!
//! Settings are read from a JSON file so the host can tweak framing and
//! theme without rebuilding.

use crate::error::{MapError, MapResult};
use crate::geo::ProjectionMode;
use crate::map::{FitOptions, Padding};
use eframe::egui::Vec2;
use geo_types::Coord;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Map settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MapSettings {
    /// Globe or flat camera.
    pub projection: ProjectionMode,
    /// Use the dark color set.
    pub dark_mode: bool,
    /// Home point as `[longitude, latitude]`.
    pub home: Option<[f64; 2]>,
    /// Upper zoom bound for every automatic fit.
    pub max_zoom: f64,
    /// Padding around fitted bounds, in pixels.
    pub fit_padding: f32,
    /// Base map tile URL with `{z}/{x}/{y}` placeholders.
    pub tile_url: String,
    /// Fade geo-anchored overlays out instead of hiding them at once.
    pub overlay_fade: bool,
    /// Dim legs outside the highlight set in the overview.
    pub dim_unhighlighted: bool,
}

impl Default for MapSettings {
    fn default() -> Self {
        Self {
            projection: ProjectionMode::Globe,
            dark_mode: false,
            home: None,
            max_zoom: 12.0,
            fit_padding: 40.0,
            tile_url: "https://tile.openstreetmap.org/{z}/{x}/{y}.png".to_string(),
            overlay_fade: true,
            dim_unhighlighted: true,
        }
    }
}

impl MapSettings {
    /// Creates new settings with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load settings from a JSON file, falling back to defaults.
    pub fn load(path: &Path) -> Self {
        match Self::try_load(path) {
            Ok(settings) => {
                log::info!("Loaded map settings from {}", path.display());
                settings
            }
            Err(e) => {
                log::warn!("Using default map settings: {}", e);
                Self::default()
            }
        }
    }

    fn try_load(path: &Path) -> MapResult<Self> {
        let json = std::fs::read_to_string(path)
            .map_err(|e| MapError::Settings(format!("{}: {}", path.display(), e)))?;
        serde_json::from_str(&json)
            .map_err(|e| MapError::Settings(format!("failed to parse {}: {}", path.display(), e)))
    }

    /// Save settings as pretty JSON.
    pub fn save(&self, path: &Path) {
        let json = match serde_json::to_string_pretty(self) {
            Ok(s) => s,
            Err(e) => {
                log::warn!("Failed to serialize map settings: {}", e);
                return;
            }
        };

        if let Err(e) = std::fs::write(path, json) {
            log::warn!("Failed to save map settings: {:?}", e);
        } else {
            log::info!("Saved map settings to {}", path.display());
        }
    }

    pub fn home_coord(&self) -> Option<Coord<f64>> {
        self.home.map(|[lon, lat]| Coord { x: lon, y: lat })
    }

    /// Fit options derived from these settings.
    pub fn fit_options(&self) -> FitOptions {
        FitOptions {
            padding: Padding::uniform(self.fit_padding),
            offset: Vec2::ZERO,
            max_zoom: self.max_zoom,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_json_fills_defaults() {
        let settings: MapSettings =
            serde_json::from_str(r#"{"projection": "flat", "home": [8.57, 50.03]}"#).unwrap();
        assert_eq!(settings.projection, ProjectionMode::Flat);
        assert_eq!(settings.home_coord(), Some(Coord { x: 8.57, y: 50.03 }));
        assert_eq!(settings.max_zoom, MapSettings::default().max_zoom);
    }

    #[test]
    fn test_missing_file_yields_defaults() {
        let settings = MapSettings::load(Path::new("/nonexistent/flightmap/settings.json"));
        assert_eq!(settings, MapSettings::default());
    }

    #[test]
    fn test_save_then_load() {
        let file = format!("flightmap-settings-{}.json", std::process::id());
        let path = std::env::temp_dir().join(file);
        let settings = MapSettings {
            dark_mode: true,
            max_zoom: 8.0,
            ..Default::default()
        };
        settings.save(&path);
        assert_eq!(MapSettings::load(&path), settings);
        let _ = std::fs::remove_file(&path);
    }
}
