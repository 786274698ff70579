use crate::analysis::store::ZoneStore;
use crate::data::{Side, Zone};

/// Price has not yet traded into the zone from the side it approaches.
pub fn is_active(side: Side, zone: &Zone, price: f64) -> bool {
    match side {
        Side::Supply => zone.low > price,
        Side::Demand => zone.high < price,
    }
}

/// Walk the store nearest-first and keep up to `max_zones` unviolated zones.
/// Violated zones are skipped without counting toward the cap.
pub fn select_zones(store: &ZoneStore, price: f64, max_zones: usize) -> Vec<Zone> {
    store
        .iter()
        .filter(|zone| is_active(store.side(), zone, price))
        .take(max_zones)
        .copied()
        .collect()
}
