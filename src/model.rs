//! Domain shapes handed to the map by the flight/duty collaborators.
//!
//! These are already-shaped geographic primitives: the map never validates
//! or persists them, it only turns them into renderable batches.

use geo_types::Coord;
use serde::{Deserialize, Serialize};

/// Opaque leg identifier.
pub type LegId = String;

/// Visual style tag carried by every segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SegmentStyle {
    Normal,
    Deadhead,
    Alternate,
    Uncertain,
    FlightPlan,
    Highlighted,
    Dimmed,
    UncertainHighlighted,
    UncertainDimmed,
}

impl SegmentStyle {
    /// Stable key used in primitive names and as a stacking tie-break.
    pub fn key(&self) -> &'static str {
        match self {
            SegmentStyle::Normal => "normal",
            SegmentStyle::Deadhead => "deadhead",
            SegmentStyle::Alternate => "alternate",
            SegmentStyle::Uncertain => "uncertain",
            SegmentStyle::FlightPlan => "flight_plan",
            SegmentStyle::Highlighted => "highlighted",
            SegmentStyle::Dimmed => "dimmed",
            SegmentStyle::UncertainHighlighted => "uncertain_highlighted",
            SegmentStyle::UncertainDimmed => "uncertain_dimmed",
        }
    }

    /// Whether this is one of the uncertain variants.
    pub fn is_uncertain(&self) -> bool {
        matches!(
            self,
            SegmentStyle::Uncertain
                | SegmentStyle::UncertainHighlighted
                | SegmentStyle::UncertainDimmed
        )
    }

    pub fn all() -> &'static [SegmentStyle] {
        &[
            SegmentStyle::Normal,
            SegmentStyle::Deadhead,
            SegmentStyle::Alternate,
            SegmentStyle::Uncertain,
            SegmentStyle::FlightPlan,
            SegmentStyle::Highlighted,
            SegmentStyle::Dimmed,
            SegmentStyle::UncertainHighlighted,
            SegmentStyle::UncertainDimmed,
        ]
    }
}

/// A run of positions sharing one style.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub style: SegmentStyle,
    /// `[longitude, latitude]` pairs in flight order.
    pub positions: Vec<[f64; 2]>,
}

impl Segment {
    pub fn new(style: SegmentStyle, positions: Vec<[f64; 2]>) -> Self {
        Self { style, positions }
    }

    pub fn coords(&self) -> impl Iterator<Item = Coord<f64>> + '_ {
        self.positions.iter().map(|p| Coord { x: p[0], y: p[1] })
    }
}

/// One flight leg: an ordered sequence of styled segments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Leg {
    pub id: LegId,
    #[serde(default)]
    pub segments: Vec<Segment>,
}

impl Leg {
    pub fn new(id: impl Into<LegId>, segments: Vec<Segment>) -> Self {
        Self {
            id: id.into(),
            segments,
        }
    }

    /// True when any segment of this leg is uncertain.
    pub fn has_uncertain(&self) -> bool {
        self.segments.iter().any(|s| s.style.is_uncertain())
    }

    /// Positions that count for camera framing (flight-plan data excluded).
    pub fn framing_coords(&self) -> impl Iterator<Item = Coord<f64>> + '_ {
        self.segments
            .iter()
            .filter(|s| s.style != SegmentStyle::FlightPlan)
            .flat_map(|s| s.coords())
    }
}

/// An airport marker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Airport {
    pub id: String,
    /// IATA/ICAO code shown as the label.
    pub code: String,
    #[serde(default)]
    pub name: String,
    /// `[longitude, latitude]`
    pub position: [f64; 2],
}

impl Airport {
    pub fn coord(&self) -> Coord<f64> {
        Coord {
            x: self.position[0],
            y: self.position[1],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_leg_deserializes_snake_case_styles() {
        let json = r#"{
            "id": "LH400",
            "segments": [
                {"style": "normal", "positions": [[8.57, 50.03], [-73.78, 40.64]]},
                {"style": "flight_plan", "positions": [[8.57, 50.03], [-30.0, 55.0]]}
            ]
        }"#;
        let leg: Leg = serde_json::from_str(json).unwrap();
        assert_eq!(leg.id, "LH400");
        assert_eq!(leg.segments[1].style, SegmentStyle::FlightPlan);
        assert!(!leg.has_uncertain());
    }

    #[test]
    fn test_framing_coords_skip_flight_plan() {
        let leg = Leg::new(
            "A",
            vec![
                Segment::new(SegmentStyle::Normal, vec![[1.0, 2.0]]),
                Segment::new(SegmentStyle::FlightPlan, vec![[50.0, 50.0]]),
                Segment::new(SegmentStyle::Uncertain, vec![[3.0, 4.0]]),
            ],
        );
        let coords: Vec<_> = leg.framing_coords().collect();
        assert_eq!(coords.len(), 2);
        assert!(leg.has_uncertain());
    }
}
