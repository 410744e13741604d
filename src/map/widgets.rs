//! Screen-space widgets anchored to geographic points.
//!
//! Independent of the layer registry: widgets are repositioned on every
//! redraw tick by projecting their anchor through the current camera.

use crate::geo::{MapProjection, ProjectionMode};
use eframe::egui::Pos2;
use geo_types::Coord;
use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::fmt;
use std::rc::{Rc, Weak};
use std::time::Duration;
use web_time::Instant;

/// How long a faded-out overlay keeps tracking before it suspends.
pub const HIDE_GRACE: Duration = Duration::from_millis(600);

/// Anchors further off-screen than this many viewport sizes are culled.
pub const OFFSCREEN_FACTOR: f32 = 3.0;

/// Registry-assigned widget id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WidgetId(pub u32);

/// Something repositioned on every redraw tick.
pub trait GeoWidget {
    fn update(&mut self, projection: &MapProjection, now: Instant);
}

/// Registry of geo-anchored widgets.
#[derive(Default)]
pub struct WidgetRegistry {
    widgets: RefCell<BTreeMap<WidgetId, Weak<RefCell<dyn GeoWidget>>>>,
    next_id: Cell<u32>,
}

impl WidgetRegistry {
    pub fn new() -> Rc<Self> {
        Rc::new(Self::default())
    }

    pub fn register(&self, widget: Weak<RefCell<dyn GeoWidget>>) -> WidgetId {
        let id = WidgetId(self.next_id.get());
        self.next_id.set(id.0 + 1);
        self.widgets.borrow_mut().insert(id, widget);
        id
    }

    pub fn deregister(&self, id: WidgetId) {
        if self.widgets.borrow_mut().remove(&id).is_none() {
            log::error!("Widget {:?} is not registered", id);
        }
    }

    pub fn len(&self) -> usize {
        self.widgets.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.widgets.borrow().is_empty()
    }

    /// Redraw tick: repositions every live widget, drops dead ones.
    pub fn tick(&self, projection: &MapProjection, now: Instant) {
        let widgets: Vec<(WidgetId, Weak<RefCell<dyn GeoWidget>>)> = self
            .widgets
            .borrow()
            .iter()
            .map(|(id, w)| (*id, w.clone()))
            .collect();

        for (id, widget) in widgets {
            match widget.upgrade() {
                Some(widget) => match widget.try_borrow_mut() {
                    Ok(mut w) => w.update(projection, now),
                    Err(_) => log::warn!("Widget {:?} is busy; skipping tick", id),
                },
                None => {
                    log::debug!("Dropping dead widget {:?}", id);
                    self.widgets.borrow_mut().remove(&id);
                }
            }
        }
    }
}

/// Overlay properties.
#[derive(Debug, Clone, PartialEq)]
pub struct OverlayProps {
    /// Hide regardless of position
    pub hidden: bool,
    /// Fade out with a grace window instead of suspending at once
    pub fade: bool,
    /// Geographic anchor
    pub anchor: Coord<f64>,
    /// Text shown by the host
    pub content: String,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum TrackingState {
    Tracking,
    Fading { since: Instant },
    Suspended,
}

/// Screen-space element pinned to a geographic point.
pub struct GeoAnchoredOverlay {
    props: OverlayProps,
    state: TrackingState,
    screen_pos: Option<Pos2>,
    opacity: f32,
    id: Option<WidgetId>,
    registry: Option<Rc<WidgetRegistry>>,
}

impl fmt::Debug for GeoAnchoredOverlay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GeoAnchoredOverlay")
            .field("props", &self.props)
            .field("state", &self.state)
            .field("screen_pos", &self.screen_pos)
            .field("opacity", &self.opacity)
            .field("id", &self.id)
            .finish_non_exhaustive()
    }
}

impl GeoAnchoredOverlay {
    /// Creates an overlay and registers it for redraw ticks.
    pub fn new(registry: &Rc<WidgetRegistry>, props: OverlayProps) -> Rc<RefCell<Self>> {
        let overlay = Rc::new(RefCell::new(Self::detached(props)));
        let weak: Weak<RefCell<dyn GeoWidget>> = Rc::downgrade(&overlay) as _;
        let id = registry.register(weak);
        {
            let mut o = overlay.borrow_mut();
            o.id = Some(id);
            o.registry = Some(registry.clone());
        }
        overlay
    }

    /// An overlay that is not attached to any registry.
    pub fn detached(props: OverlayProps) -> Self {
        Self {
            opacity: if props.hidden { 0.0 } else { 1.0 },
            props,
            state: TrackingState::Tracking,
            screen_pos: None,
            id: None,
            registry: None,
        }
    }

    pub fn props(&self) -> &OverlayProps {
        &self.props
    }

    pub fn set_props(&mut self, props: OverlayProps) {
        if props == self.props {
            return;
        }
        if !props.fade {
            if let TrackingState::Fading { .. } = self.state {
                self.state = TrackingState::Suspended;
            }
        }
        if props.hidden {
            self.opacity = 0.0;
        } else if self.state == TrackingState::Tracking {
            self.opacity = 1.0;
        }
        self.props = props;
    }

    pub fn screen_pos(&self) -> Option<Pos2> {
        self.screen_pos
    }

    pub fn opacity(&self) -> f32 {
        self.opacity
    }

    /// Position updates are suspended until the anchor is visible again.
    pub fn is_suspended(&self) -> bool {
        self.state == TrackingState::Suspended
    }

    pub fn is_visible(&self) -> bool {
        self.opacity > 0.0 && self.screen_pos.is_some()
    }

    /// Whether the anchor is beyond the horizon or far off-screen (globe only).
    fn is_too_distant(&self, projection: &MapProjection, pos: Option<Pos2>) -> bool {
        if projection.mode != ProjectionMode::Globe {
            return false;
        }
        if !projection.is_on_visible_hemisphere(self.props.anchor) {
            return true;
        }
        let Some(pos) = pos else {
            return true;
        };
        let rect = projection.screen_rect;
        !rect.expand2(rect.size() * OFFSCREEN_FACTOR).contains(pos)
    }

    /// Disconnects from the widget registry.
    pub fn destroy(&mut self) {
        if let (Some(id), Some(registry)) = (self.id.take(), self.registry.take()) {
            registry.deregister(id);
        }
    }
}

impl GeoWidget for GeoAnchoredOverlay {
    fn update(&mut self, projection: &MapProjection, now: Instant) {
        let pos = projection.geo_to_screen(self.props.anchor);

        if !self.is_too_distant(projection, pos) {
            self.state = TrackingState::Tracking;
            self.screen_pos = pos;
            self.opacity = if self.props.hidden { 0.0 } else { 1.0 };
            return;
        }

        self.opacity = 0.0;
        match self.state {
            TrackingState::Tracking if self.props.fade => {
                self.state = TrackingState::Fading { since: now };
                self.screen_pos = pos;
            }
            TrackingState::Tracking => self.state = TrackingState::Suspended,
            TrackingState::Fading { since } => {
                if now.saturating_duration_since(since) >= HIDE_GRACE {
                    self.state = TrackingState::Suspended;
                } else {
                    self.screen_pos = pos;
                }
            }
            TrackingState::Suspended => {}
        }
    }
}

impl Drop for GeoAnchoredOverlay {
    fn drop(&mut self) {
        self.destroy();
    }
}
