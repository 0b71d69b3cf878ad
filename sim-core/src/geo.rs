//! Haversine distance with a pair-symmetric cache.

use std::cell::RefCell;
use std::collections::HashMap;

use crate::types::NodeId;

const EARTH_RADIUS_KM: f64 = 6371.0;

pub fn haversine_km(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let (lat1, lon1, lat2, lon2) = (
        lat1.to_radians(),
        lon1.to_radians(),
        lat2.to_radians(),
        lon2.to_radians(),
    );
    let dlat = lat2 - lat1;
    let dlon = lon2 - lon1;
    let a = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().asin();
    EARTH_RADIUS_KM * c
}

fn symmetric_key(a: NodeId, b: NodeId) -> (NodeId, NodeId) {
    use slotmap::Key;
    if a.data().as_ffi() <= b.data().as_ffi() {
        (a, b)
    } else {
        (b, a)
    }
}

/// Memoizes [`haversine_km`] results per unordered node pair.
#[derive(Default)]
pub struct DistanceCache {
    cache: RefCell<HashMap<(NodeId, NodeId), f64>>,
}

impl DistanceCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn distance(
        &self,
        a: NodeId,
        a_lat: f64,
        a_lon: f64,
        b: NodeId,
        b_lat: f64,
        b_lon: f64,
    ) -> f64 {
        let key = symmetric_key(a, b);
        if let Some(d) = self.cache.borrow().get(&key) {
            return *d;
        }
        let d = haversine_km(a_lat, a_lon, b_lat, b_lon);
        self.cache.borrow_mut().insert(key, d);
        d
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_distance_for_identical_points() {
        assert!(haversine_km(47.0, 19.0, 47.0, 19.0) < 1e-9);
    }

    #[test]
    fn budapest_to_vienna_is_roughly_right() {
        // Budapest (47.4979, 19.0402) to Vienna (48.2082, 16.3738)
        let d = haversine_km(47.4979, 19.0402, 48.2082, 16.3738);
        assert!((200.0..230.0).contains(&d), "distance was {d}");
    }
}
