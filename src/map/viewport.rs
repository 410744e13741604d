//! Camera framing and animated transitions.
//!
//! Turns geographic bounds or points into camera poses. Fitting never fails
//! outward: a failed fit retries with minimal padding, then falls back to a
//! fixed default pose.

use crate::error::{MapError, MapResult};
use crate::geo::projection::{mercator_unworld, mercator_world};
use crate::geo::{great_circle_km, is_degenerate};
use eframe::egui::emath::easing;
use eframe::egui::Vec2;
use geo_types::{Coord, Rect};
use serde::{Deserialize, Serialize};
use web_time::Instant;

/// Zoom used when the bounds collapse to a single point.
pub const SINGLE_POINT_ZOOM: f64 = 6.0;

/// Padding for the second fit attempt, in pixels.
pub const MIN_PADDING: f32 = 5.0;

/// Zoom used when flying to the configured home point.
pub const HOME_ZOOM: f64 = 4.0;

/// Transition length per doubling of the travelled distance.
pub const TRANSITION_MS_PER_OCTAVE: f64 = 300.0;

/// Pose used when nothing else can be computed: equator, low zoom.
pub const DEFAULT_POSE: CameraPose = CameraPose {
    latitude: 0.0,
    longitude: 0.0,
    zoom: 1.0,
    pitch: 0.0,
    bearing: 0.0,
};

/// Camera position and orientation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CameraPose {
    pub latitude: f64,
    pub longitude: f64,
    pub zoom: f64,
    /// Tilt in degrees
    #[serde(default)]
    pub pitch: f64,
    /// Rotation in degrees clockwise from north
    #[serde(default)]
    pub bearing: f64,
}

impl CameraPose {
    pub fn center(&self) -> Coord<f64> {
        Coord {
            x: self.longitude,
            y: self.latitude,
        }
    }

    /// Same orientation as `self`, different center/zoom.
    fn with_orientation_of(mut self, other: &CameraPose) -> Self {
        self.pitch = other.pitch;
        self.bearing = other.bearing;
        self
    }
}

/// Viewport padding in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Padding {
    pub top: f32,
    pub bottom: f32,
    pub left: f32,
    pub right: f32,
}

impl Padding {
    pub const fn uniform(px: f32) -> Self {
        Self {
            top: px,
            bottom: px,
            left: px,
            right: px,
        }
    }
}

impl Default for Padding {
    fn default() -> Self {
        Self::uniform(40.0)
    }
}

/// Fit parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FitOptions {
    pub padding: Padding,
    pub offset: Vec2,
    pub max_zoom: f64,
}

impl Default for FitOptions {
    fn default() -> Self {
        Self {
            padding: Padding::default(),
            offset: Vec2::ZERO,
            max_zoom: 12.0,
        }
    }
}

/// A fit requested before the surface size was known.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingFit {
    pub bounds: Rect<f64>,
    pub options: FitOptions,
}

/// An animated camera move.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transition {
    pub from: CameraPose,
    pub to: CameraPose,
    pub duration_ms: f64,
    pub started: Instant,
}

impl Transition {
    /// Progress in `[0, 1]` at `now`.
    pub fn progress(&self, now: Instant) -> f64 {
        if self.duration_ms <= 0.0 {
            return 1.0;
        }
        let elapsed = now.saturating_duration_since(self.started).as_secs_f64() * 1000.0;
        (elapsed / self.duration_ms).clamp(0.0, 1.0)
    }

    pub fn is_finished(&self, now: Instant) -> bool {
        self.progress(now) >= 1.0
    }

    /// Eased pose along the transition.
    pub fn pose_at(&self, now: Instant) -> CameraPose {
        let progress = self.progress(now);
        if progress >= 1.0 {
            return self.to;
        }
        let t = easing::cubic_in_out(progress as f32) as f64;
        let lerp = |a: f64, b: f64| a + (b - a) * t;

        // Shortest way round in longitude
        let mut dlon = self.to.longitude - self.from.longitude;
        if dlon > 180.0 {
            dlon -= 360.0;
        } else if dlon < -180.0 {
            dlon += 360.0;
        }
        let mut longitude = self.from.longitude + dlon * t;
        if longitude > 180.0 {
            longitude -= 360.0;
        } else if longitude < -180.0 {
            longitude += 360.0;
        }

        CameraPose {
            latitude: lerp(self.from.latitude, self.to.latitude),
            longitude,
            zoom: lerp(self.from.zoom, self.to.zoom),
            pitch: lerp(self.from.pitch, self.to.pitch),
            bearing: lerp(self.from.bearing, self.to.bearing),
        }
    }
}

/// Camera assignment produced by the controller.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraMove {
    pub pose: CameraPose,
    pub transition: Option<Transition>,
}

impl CameraMove {
    fn jump(pose: CameraPose) -> Self {
        Self {
            pose,
            transition: None,
        }
    }
}

/// Fits `bounds` into a viewport of `size`, Web-Mercator style.
///
/// Degenerate bounds get [`SINGLE_POINT_ZOOM`] instead of the (infinite)
/// best-fit zoom. The result is clamped to `max_zoom`.
pub fn fit_bounds(
    bounds: &Rect<f64>,
    size: Vec2,
    padding: Padding,
    offset: Vec2,
    max_zoom: f64,
) -> MapResult<CameraPose> {
    let (min, max) = (bounds.min(), bounds.max());
    if !(min.x.is_finite() && min.y.is_finite() && max.x.is_finite() && max.y.is_finite()) {
        return Err(MapError::FitFailed("non-finite bounds".into()));
    }

    let nw = mercator_world(Coord { x: min.x, y: max.y });
    let se = mercator_world(Coord { x: max.x, y: min.y });
    let span_x = (se.x - nw.x).abs();
    let span_y = (se.y - nw.y).abs();

    let target_w = size.x - padding.left - padding.right - (2.0 * offset.x).abs();
    let target_h = size.y - padding.top - padding.bottom - (2.0 * offset.y).abs();
    if target_w <= 0.0 || target_h <= 0.0 {
        return Err(MapError::FitFailed(format!(
            "padding leaves no room ({target_w}x{target_h})"
        )));
    }

    let scale_x = target_w as f64 / span_x;
    let scale_y = target_h as f64 / span_y;
    let scale = scale_x.min(scale_y);

    let degenerate = is_degenerate(bounds);
    let zoom = if degenerate {
        SINGLE_POINT_ZOOM
    } else {
        scale.abs().log2()
    };
    if !zoom.is_finite() {
        return Err(MapError::FitFailed(format!("zoom is {zoom}")));
    }

    let (shift_x, shift_y) = if degenerate || !scale.is_finite() {
        (0.0, 0.0)
    } else {
        (
            (padding.right - padding.left) as f64 / 2.0 / scale,
            (padding.bottom - padding.top) as f64 / 2.0 / scale,
        )
    };
    let center = mercator_unworld(Coord {
        x: (nw.x + se.x) / 2.0 + shift_x,
        y: (nw.y + se.y) / 2.0 + shift_y,
    });

    Ok(CameraPose {
        latitude: center.y,
        longitude: center.x,
        zoom: zoom.min(max_zoom),
        pitch: 0.0,
        bearing: 0.0,
    })
}

/// Transition duration between two poses, in milliseconds.
///
/// `log2` of the great-circle distance in km; distances under 1 km give 0.
pub fn transition_duration_ms(from: &CameraPose, to: &CameraPose) -> MapResult<f64> {
    let km = great_circle_km(from.center(), to.center());
    if !km.is_finite() {
        return Err(MapError::FitFailed(format!("distance is {km}")));
    }
    Ok(km.max(1.0).log2() * TRANSITION_MS_PER_OCTAVE)
}

/// Resolves bounds into camera poses and plans transitions.
#[derive(Debug, Default)]
pub struct ViewportController {
    /// Fit options used by the registry helpers
    pub options: FitOptions,
    /// Configured home point
    pub home: Option<Coord<f64>>,
    pending: Option<PendingFit>,
    start_view: Option<CameraPose>,
}

impl ViewportController {
    pub fn new(options: FitOptions, home: Option<Coord<f64>>) -> Self {
        Self {
            options,
            home,
            pending: None,
            start_view: None,
        }
    }

    /// Fits `bounds` now, or parks the request until a size is known.
    ///
    /// A new request replaces any parked one.
    pub fn resolve_bounds(
        &mut self,
        bounds: Rect<f64>,
        size: Option<Vec2>,
        options: FitOptions,
    ) -> Option<CameraPose> {
        match size.filter(|s| s.x > 0.0 && s.y > 0.0) {
            Some(size) => {
                self.pending = None;
                Some(Self::fit_with_fallback(&bounds, size, &options))
            }
            None => {
                log::debug!("Surface size unknown; deferring fit of {:?}", bounds);
                self.pending = Some(PendingFit { bounds, options });
                None
            }
        }
    }

    /// Resolves a parked fit once the surface has a size.
    pub fn on_resize(&mut self, size: Vec2) -> Option<CameraPose> {
        if size.x <= 0.0 || size.y <= 0.0 {
            return None;
        }
        let pending = self.pending.take()?;
        let pose = Self::fit_with_fallback(&pending.bounds, size, &pending.options);
        self.start_view.get_or_insert(pose);
        Some(pose)
    }

    pub fn has_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// The first pose ever assigned, or the default pose.
    pub fn start_view(&self) -> CameraPose {
        self.start_view.unwrap_or(DEFAULT_POSE)
    }

    fn fit_with_fallback(bounds: &Rect<f64>, size: Vec2, options: &FitOptions) -> CameraPose {
        match fit_bounds(bounds, size, options.padding, options.offset, options.max_zoom) {
            Ok(pose) => pose,
            Err(first) => {
                log::debug!("Fit failed ({first}); retrying with minimal padding");
                match fit_bounds(
                    bounds,
                    size,
                    Padding::uniform(MIN_PADDING),
                    options.offset,
                    options.max_zoom,
                ) {
                    Ok(pose) => pose,
                    Err(second) => {
                        log::debug!("Fit failed again ({second}); using default pose");
                        CameraPose {
                            zoom: DEFAULT_POSE.zoom.min(options.max_zoom),
                            ..DEFAULT_POSE
                        }
                    }
                }
            }
        }
    }

    /// Plans a move to `bounds`.
    ///
    /// Without a current camera this is a plain, non-animated fit (or a
    /// parked one when the size is unknown).
    pub fn transition_to(
        &mut self,
        bounds: Rect<f64>,
        current: Option<CameraPose>,
        size: Option<Vec2>,
        now: Instant,
    ) -> Option<CameraMove> {
        let options = self.options;
        let (Some(current), Some(size)) = (current, size) else {
            let pose = self.resolve_bounds(bounds, size, options)?;
            self.start_view.get_or_insert(pose);
            return Some(CameraMove::jump(pose));
        };

        // An unusable size parks the fit; the camera stays put until resize
        let target = self
            .resolve_bounds(bounds, Some(size), options)?
            .with_orientation_of(&current);
        Some(Self::animate(current, target, now))
    }

    /// Plans a move to the configured home point; `None` without one.
    pub fn translate_home(
        &mut self,
        current: Option<CameraPose>,
        now: Instant,
    ) -> Option<CameraMove> {
        let home = self.home?;
        let target = CameraPose {
            latitude: home.y,
            longitude: home.x,
            zoom: HOME_ZOOM.min(self.options.max_zoom),
            ..DEFAULT_POSE
        };
        match current {
            Some(current) => Some(Self::animate(
                current,
                target.with_orientation_of(&current),
                now,
            )),
            None => {
                self.start_view.get_or_insert(target);
                Some(CameraMove::jump(target))
            }
        }
    }

    fn animate(from: CameraPose, to: CameraPose, now: Instant) -> CameraMove {
        match transition_duration_ms(&from, &to) {
            Ok(duration_ms) => CameraMove {
                pose: to,
                transition: Some(Transition {
                    from,
                    to,
                    duration_ms,
                    started: now,
                }),
            },
            Err(e) => {
                log::debug!("Cannot animate camera ({e}); jumping instead");
                CameraMove::jump(to)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn point_bounds(lon: f64, lat: f64) -> Rect<f64> {
        Rect::new(Coord { x: lon, y: lat }, Coord { x: lon, y: lat })
    }

    fn size() -> Vec2 {
        Vec2::new(800.0, 600.0)
    }

    #[test]
    fn test_single_point_uses_fixed_zoom() {
        let mut vc = ViewportController::default();
        let pose = vc
            .resolve_bounds(point_bounds(10.0, 10.0), Some(size()), FitOptions::default())
            .unwrap();
        assert_eq!(pose.zoom, SINGLE_POINT_ZOOM);
        assert!((pose.latitude - 10.0).abs() < 1e-9);
        assert!((pose.longitude - 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_single_point_zoom_respects_max_zoom() {
        let options = FitOptions {
            max_zoom: 3.0,
            ..Default::default()
        };
        let pose = fit_bounds(
            &point_bounds(1.0, 1.0),
            size(),
            options.padding,
            options.offset,
            options.max_zoom,
        )
        .unwrap();
        assert_eq!(pose.zoom, 3.0);
    }

    #[test]
    fn test_deferred_fit_matches_immediate_fit() {
        let bounds = Rect::new(Coord { x: -10.0, y: 35.0 }, Coord { x: 30.0, y: 60.0 });
        let mut immediate = ViewportController::default();
        let expected = immediate
            .resolve_bounds(bounds, Some(size()), FitOptions::default())
            .unwrap();

        let mut deferred = ViewportController::default();
        assert!(deferred
            .resolve_bounds(bounds, None, FitOptions::default())
            .is_none());
        assert!(deferred.has_pending());
        let resolved = deferred.on_resize(size()).unwrap();
        assert_eq!(resolved, expected);
        assert!(!deferred.has_pending());
    }

    #[test]
    fn test_newer_pending_fit_replaces_older() {
        let mut vc = ViewportController::default();
        vc.resolve_bounds(point_bounds(1.0, 1.0), None, FitOptions::default());
        vc.resolve_bounds(point_bounds(20.0, 30.0), None, FitOptions::default());
        let pose = vc.on_resize(size()).unwrap();
        assert!((pose.longitude - 20.0).abs() < 1e-9);
        assert!(vc.on_resize(size()).is_none());
    }

    #[test]
    fn test_oversized_padding_falls_back_to_min_padding() {
        let options = FitOptions {
            padding: Padding::uniform(500.0),
            ..Default::default()
        };
        let bounds = Rect::new(Coord { x: 0.0, y: 0.0 }, Coord { x: 10.0, y: 10.0 });
        let mut vc = ViewportController::default();
        let pose = vc.resolve_bounds(bounds, Some(size()), options).unwrap();
        let expected = fit_bounds(
            &bounds,
            size(),
            Padding::uniform(MIN_PADDING),
            Vec2::ZERO,
            options.max_zoom,
        )
        .unwrap();
        assert_eq!(pose, expected);
    }

    #[test]
    fn test_tiny_viewport_falls_back_to_default_pose() {
        let bounds = Rect::new(Coord { x: 0.0, y: 0.0 }, Coord { x: 10.0, y: 10.0 });
        let mut vc = ViewportController::default();
        let pose = vc
            .resolve_bounds(bounds, Some(Vec2::new(4.0, 4.0)), FitOptions::default())
            .unwrap();
        assert_eq!(pose, DEFAULT_POSE);
    }

    #[test]
    fn test_fit_zoom_clamped() {
        let bounds = Rect::new(Coord { x: 0.0, y: 0.0 }, Coord { x: 0.001, y: 0.001 });
        let pose = fit_bounds(&bounds, size(), Padding::default(), Vec2::ZERO, 9.0).unwrap();
        assert_eq!(pose.zoom, 9.0);
    }

    #[test]
    fn test_world_fit_is_low_zoom() {
        let bounds = Rect::new(Coord { x: -170.0, y: -60.0 }, Coord { x: 170.0, y: 70.0 });
        let pose = fit_bounds(&bounds, size(), Padding::default(), Vec2::ZERO, 12.0).unwrap();
        assert!(pose.zoom < 1.5, "zoom {}", pose.zoom);
        assert!(pose.longitude.abs() < 1e-6);
    }

    #[test]
    fn test_transition_to_same_pose_has_zero_duration() {
        let pose = CameraPose {
            latitude: 48.0,
            longitude: 11.0,
            zoom: 5.0,
            ..Default::default()
        };
        let d = transition_duration_ms(&pose, &pose).unwrap();
        assert!(d.is_finite());
        assert!(d >= 0.0);
        assert!(d < 1e-9);
    }

    #[test]
    fn test_transition_duration_scales_with_log_distance() {
        let a = CameraPose::default();
        let b = CameraPose {
            longitude: 90.0,
            ..Default::default()
        };
        let d = transition_duration_ms(&a, &b).unwrap();
        // ~10,000 km -> log2 ~ 13.3
        assert!((d - 13.29 * 300.0).abs() < 30.0, "got {d}");
    }

    #[test]
    fn test_transition_without_camera_jumps() {
        let mut vc = ViewportController::default();
        let mv = vc
            .transition_to(point_bounds(5.0, 5.0), None, Some(size()), Instant::now())
            .unwrap();
        assert!(mv.transition.is_none());
        assert_eq!(vc.start_view(), mv.pose);
    }

    #[test]
    fn test_transition_with_zero_size_parks_fit() {
        let mut vc = ViewportController::default();
        let current = CameraPose {
            latitude: 40.0,
            longitude: -74.0,
            zoom: 5.0,
            ..DEFAULT_POSE
        };
        let bounds = point_bounds(8.57, 50.03);
        let mv = vc.transition_to(bounds, Some(current), Some(Vec2::ZERO), Instant::now());
        assert!(mv.is_none());
        assert!(vc.has_pending());

        let pose = vc.on_resize(size()).unwrap();
        assert!((pose.longitude - 8.57).abs() < 1e-6);
        assert!(!vc.has_pending());
    }

    #[test]
    fn test_transition_keeps_current_orientation() {
        let mut vc = ViewportController::default();
        let current = CameraPose {
            pitch: 30.0,
            bearing: 15.0,
            ..DEFAULT_POSE
        };
        let mv = vc
            .transition_to(point_bounds(40.0, 40.0), Some(current), Some(size()), Instant::now())
            .unwrap();
        assert_eq!(mv.pose.pitch, 30.0);
        assert_eq!(mv.pose.bearing, 15.0);
        let t = mv.transition.unwrap();
        assert!(t.duration_ms > 0.0);
    }

    #[test]
    fn test_transition_to_current_center_is_immediate() {
        let mut vc = ViewportController::default();
        let current = CameraPose {
            latitude: 10.0,
            longitude: 10.0,
            zoom: SINGLE_POINT_ZOOM,
            ..Default::default()
        };
        let now = Instant::now();
        let mv = vc
            .transition_to(point_bounds(10.0, 10.0), Some(current), Some(size()), now)
            .unwrap();
        let t = mv.transition.unwrap();
        assert!(!t.duration_ms.is_nan());
        assert!(t.duration_ms >= 0.0 && t.duration_ms < 1e-6);
        assert!(t.is_finished(now));
        assert_eq!(t.pose_at(now), mv.pose);
    }

    #[test]
    fn test_transition_eases_between_poses() {
        let from = CameraPose {
            longitude: 170.0,
            zoom: 2.0,
            ..Default::default()
        };
        let to = CameraPose {
            longitude: -170.0,
            zoom: 4.0,
            ..Default::default()
        };
        let started = Instant::now();
        let t = Transition {
            from,
            to,
            duration_ms: 1000.0,
            started,
        };
        let mid = t.pose_at(started + std::time::Duration::from_millis(500));
        // Crosses the antimeridian instead of sweeping across the globe
        assert!(mid.longitude.abs() > 170.0 - 1e-6);
        assert!((mid.zoom - 3.0).abs() < 1e-3);
        assert_eq!(t.pose_at(started + std::time::Duration::from_secs(2)), to);
    }

    #[test]
    fn test_translate_home() {
        let mut vc = ViewportController::default();
        assert!(vc.translate_home(None, Instant::now()).is_none());

        vc.home = Some(Coord { x: 8.57, y: 50.03 });
        let mv = vc.translate_home(Some(DEFAULT_POSE), Instant::now()).unwrap();
        assert_eq!(mv.pose.zoom, HOME_ZOOM);
        assert!(mv.transition.is_some());
    }
}
