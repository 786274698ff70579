use std::collections::btree_map::Entry;
use std::collections::BTreeMap;

use ordered_float::OrderedFloat;

use crate::data::{Side, Zone};

/// Price-ordered, first-writer-wins zone collection for one side.
///
/// Supply zones are keyed by `low`, demand zones by `-high`, so ascending key
/// order visits the zone nearest to price first on both sides.
#[derive(Debug, Clone)]
pub struct ZoneStore {
    side: Side,
    zones: BTreeMap<OrderedFloat<f64>, Zone>,
}

impl ZoneStore {
    pub fn new(side: Side) -> Self {
        Self {
            side,
            zones: BTreeMap::new(),
        }
    }

    pub fn side(&self) -> Side {
        self.side
    }

    pub fn key_for(&self, zone: &Zone) -> OrderedFloat<f64> {
        match self.side {
            Side::Supply => OrderedFloat(zone.low),
            Side::Demand => OrderedFloat(-zone.high),
        }
    }

    /// Returns `false` and leaves the store untouched when the key is taken.
    pub fn insert(&mut self, zone: Zone) -> bool {
        let key = self.key_for(&zone);
        match self.zones.entry(key) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(zone);
                true
            }
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Zone> {
        self.zones.values()
    }

    pub fn len(&self) -> usize {
        self.zones.len()
    }

    pub fn is_empty(&self) -> bool {
        self.zones.is_empty()
    }

    pub fn clear(&mut self) {
        self.zones.clear();
    }
}
