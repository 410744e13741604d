//! Picking color allocation for leg batches.
//!
//! Path primitives accept explicit picking colors, arc primitives do not:
//! an arc batch colors its rows by index. The map is therefore allocated in
//! the row order the overview gives its arc batches (legs with uncertain
//! segments first, then the rest, each in input order) so that one reverse
//! lookup serves both kinds.

use crate::geo::{decode_pick_color, encode_pick_index, Rgb};
use crate::model::{Leg, LegId};
use std::collections::HashMap;

/// Forward (index -> color) and reverse (color -> leg) maps for one pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PickingColorMap {
    forward: Vec<Rgb>,
    order: Vec<LegId>,
    reverse: HashMap<Rgb, LegId>,
    index_of: HashMap<LegId, u32>,
}

impl PickingColorMap {
    /// Allocates one color per leg, uncertain legs first.
    pub fn allocate(legs: &[Leg]) -> Self {
        let mut map = Self::default();
        let uncertain = legs.iter().filter(|l| l.has_uncertain());
        let certain = legs.iter().filter(|l| !l.has_uncertain());
        for leg in uncertain.chain(certain) {
            if map.index_of.contains_key(&leg.id) {
                log::warn!("Duplicate leg id '{}' ignored for picking", leg.id);
                continue;
            }
            let index = map.forward.len() as u32;
            let color = encode_pick_index(index);
            map.forward.push(color);
            map.order.push(leg.id.clone());
            map.reverse.insert(color, leg.id.clone());
            map.index_of.insert(leg.id.clone(), index);
        }
        map
    }

    pub fn len(&self) -> usize {
        self.forward.len()
    }

    pub fn is_empty(&self) -> bool {
        self.forward.is_empty()
    }

    /// Color for an allocated index.
    pub fn forward(&self, index: u32) -> Option<Rgb> {
        self.forward.get(index as usize).copied()
    }

    /// Index for a color, if it was allocated in this pass.
    pub fn decode(&self, color: Rgb) -> Option<u32> {
        decode_pick_color(color).filter(|i| (*i as usize) < self.forward.len())
    }

    pub fn leg_for(&self, color: Rgb) -> Option<&str> {
        self.reverse.get(&color).map(String::as_str)
    }

    pub fn index_of(&self, leg: &str) -> Option<u32> {
        self.index_of.get(leg).copied()
    }

    /// Leg ids in allocation (row) order.
    pub fn order(&self) -> &[LegId] {
        &self.order
    }
}
