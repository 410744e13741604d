//! Map projection and coordinate transformation.
//!
//! Handles converting between geographic coordinates (lat/lon) and
//! screen coordinates for both the flat Web-Mercator view and the globe.

use super::{great_circle_km, EARTH_CIRCUMFERENCE_M, EARTH_RADIUS_M};
use crate::map::CameraPose;
use eframe::egui::{Pos2, Rect, Vec2};
use geo_types::Coord;
use glam::{DQuat, DVec3};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// World size in pixels at zoom 0.
pub const TILE_SIZE: f64 = 512.0;

/// Mercator latitude limit.
const MAX_MERCATOR_LAT: f64 = 85.051_128_779_806_6;

/// Camera height above the surface, in viewport heights.
const CAMERA_ALTITUDE_SCREENS: f64 = 1.5;

/// Camera mode.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProjectionMode {
    #[default]
    Globe,
    Flat,
}

/// Map projection for converting geographic to screen coordinates.
#[derive(Debug, Clone)]
pub struct MapProjection {
    /// Camera pose the projection was built from
    pub pose: CameraPose,
    /// Flat or globe
    pub mode: ProjectionMode,
    /// Screen rectangle for the canvas
    pub screen_rect: Rect,
}

impl MapProjection {
    pub fn new(pose: CameraPose, mode: ProjectionMode, screen_rect: Rect) -> Self {
        Self {
            pose,
            mode,
            screen_rect,
        }
    }

    /// Zoom scale factor (`2^zoom`).
    pub fn scale(&self) -> f64 {
        2f64.powf(self.pose.zoom)
    }

    fn center_coord(&self) -> Coord<f64> {
        Coord {
            x: self.pose.longitude,
            y: self.pose.latitude,
        }
    }

    /// Globe radius in screen pixels at the current zoom.
    pub fn globe_radius_px(&self) -> f64 {
        TILE_SIZE * self.scale() / (2.0 * PI)
    }

    fn globe_rotation(&self) -> DQuat {
        DQuat::from_rotation_x(self.pose.latitude.to_radians())
            * DQuat::from_rotation_y(-self.pose.longitude.to_radians())
    }

    fn rotate_screen(&self, offset: Vec2) -> Vec2 {
        if self.pose.bearing == 0.0 {
            return offset;
        }
        let (s, c) = (-self.pose.bearing.to_radians() as f32).sin_cos();
        Vec2::new(offset.x * c - offset.y * s, offset.x * s + offset.y * c)
    }

    fn unrotate_screen(&self, offset: Vec2) -> Vec2 {
        if self.pose.bearing == 0.0 {
            return offset;
        }
        let (s, c) = (self.pose.bearing.to_radians() as f32).sin_cos();
        Vec2::new(offset.x * c - offset.y * s, offset.x * s + offset.y * c)
    }

    /// Converts geographic coordinates (lon, lat) to screen position.
    ///
    /// Returns `None` for points on the far side of the globe.
    pub fn geo_to_screen(&self, coord: Coord<f64>) -> Option<Pos2> {
        let offset = match self.mode {
            ProjectionMode::Flat => {
                let p = mercator_world(coord);
                let c = mercator_world(self.center_coord());
                let mut dx = p.x - c.x;
                // Take the short way round the antimeridian
                if dx > TILE_SIZE / 2.0 {
                    dx -= TILE_SIZE;
                } else if dx < -TILE_SIZE / 2.0 {
                    dx += TILE_SIZE;
                }
                let dy = p.y - c.y;
                Vec2::new((dx * self.scale()) as f32, (dy * self.scale()) as f32)
            }
            ProjectionMode::Globe => {
                let v = self.globe_rotation() * unit_vector(coord);
                if v.z < 0.0 {
                    return None;
                }
                let r = self.globe_radius_px();
                Vec2::new((v.x * r) as f32, (-v.y * r) as f32)
            }
        };
        Some(self.screen_rect.center() + self.rotate_screen(offset))
    }

    /// Converts screen position to geographic coordinates (lon, lat).
    ///
    /// Returns `None` when the position misses the globe.
    pub fn screen_to_geo(&self, pos: Pos2) -> Option<Coord<f64>> {
        let offset = self.unrotate_screen(pos - self.screen_rect.center());
        match self.mode {
            ProjectionMode::Flat => {
                let c = mercator_world(self.center_coord());
                let x = c.x + offset.x as f64 / self.scale();
                let y = c.y + offset.y as f64 / self.scale();
                Some(mercator_unworld(Coord { x, y }))
            }
            ProjectionMode::Globe => {
                let r = self.globe_radius_px();
                let x = offset.x as f64 / r;
                let y = -offset.y as f64 / r;
                let d2 = x * x + y * y;
                if d2 > 1.0 {
                    return None;
                }
                let v = self.globe_rotation().inverse() * DVec3::new(x, y, (1.0 - d2).sqrt());
                Some(from_unit_vector(v))
            }
        }
    }

    /// Ground resolution at the view center.
    pub fn meters_per_pixel(&self) -> f64 {
        let base = EARTH_CIRCUMFERENCE_M / (TILE_SIZE * self.scale());
        match self.mode {
            ProjectionMode::Flat => base * self.pose.latitude.to_radians().cos(),
            ProjectionMode::Globe => base,
        }
    }

    /// Camera distance from the surface, in screen pixels.
    pub fn camera_distance_px(&self) -> f64 {
        CAMERA_ALTITUDE_SCREENS * self.screen_rect.height() as f64
    }

    /// Camera altitude above the surface in meters.
    pub fn camera_altitude_m(&self) -> f64 {
        self.camera_distance_px() * self.meters_per_pixel()
    }

    /// Ground distance from the view center to the visibility horizon, in km.
    pub fn horizon_km(&self) -> f64 {
        let r = EARTH_RADIUS_M;
        let altitude = self.camera_altitude_m().max(0.0);
        r * (r / (r + altitude)).acos() / 1000.0
    }

    /// Whether a coordinate lies within the camera's visibility horizon.
    pub fn is_on_visible_hemisphere(&self, coord: Coord<f64>) -> bool {
        great_circle_km(self.center_coord(), coord) <= self.horizon_km()
    }
}

/// Web-Mercator world pixel position at zoom 0.
pub fn mercator_world(coord: Coord<f64>) -> Coord<f64> {
    let lat = coord.y.clamp(-MAX_MERCATOR_LAT, MAX_MERCATOR_LAT).to_radians();
    Coord {
        x: TILE_SIZE * (coord.x + 180.0) / 360.0,
        y: TILE_SIZE * (0.5 - (PI / 4.0 + lat / 2.0).tan().ln() / (2.0 * PI)),
    }
}

/// Inverse of [`mercator_world`].
pub fn mercator_unworld(world: Coord<f64>) -> Coord<f64> {
    let lon = world.x / TILE_SIZE * 360.0 - 180.0;
    let n = PI * (1.0 - 2.0 * world.y / TILE_SIZE);
    let lat = n.sinh().atan().to_degrees();
    Coord { x: lon, y: lat }
}

/// Unit vector on the sphere for a (lon, lat) coordinate.
pub(crate) fn unit_vector(coord: Coord<f64>) -> DVec3 {
    let lat = coord.y.to_radians();
    let lon = coord.x.to_radians();
    DVec3::new(lat.cos() * lon.sin(), lat.sin(), lat.cos() * lon.cos())
}

pub(crate) fn from_unit_vector(v: DVec3) -> Coord<f64> {
    let v = v.normalize_or_zero();
    Coord {
        x: v.x.atan2(v.z).to_degrees(),
        y: v.y.clamp(-1.0, 1.0).asin().to_degrees(),
    }
}
