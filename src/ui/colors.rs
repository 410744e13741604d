//! Centralized color constants for the host UI.

use eframe::egui::Color32;

/// Colors for the map canvas chrome.
pub mod canvas {
    use super::Color32;

    /// Camera readout in the bottom-left corner.
    pub const INFO_TEXT: Color32 = Color32::from_rgb(140, 140, 160);
}

/// Colors for geo-anchored overlays.
pub mod overlay {
    use super::Color32;

    /// Tooltip background.
    pub const BACKGROUND: Color32 = Color32::from_rgba_premultiplied(20, 24, 36, 220);
    /// Tooltip text.
    pub const TEXT: Color32 = Color32::from_rgb(230, 232, 240);
}
