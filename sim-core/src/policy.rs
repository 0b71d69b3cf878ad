//! Pluggable per-role decisions (§4.8): target-level / reorder-point
//! sizing and peer selection. Exposed as plain functions rather than trait
//! objects — the crate ships exactly one implementation of each family,
//! matching the reference behavior, but every node operation calls through
//! this module rather than inlining the arithmetic so an alternate
//! strategy only has to replace a handful of call sites.

use std::rc::Rc;

use crate::node::DemandPoint;
use crate::sim::Sim;
use crate::types::{NodeId, RouteId};

pub const PRODUCTION_S_MULT: f64 = 2.0;
pub const PRODUCTION_S_CAP_MULT: f64 = 4.0;
pub const DC_S_MULT: f64 = 2.0;
pub const DC_S_CAP_MULT: f64 = 10.0;
pub const COLLECTION_S_MULT: f64 = 10.0;
pub const RECOVERY_S_MULT: f64 = 10.0;

/// Shared "average recent demand" estimator used by every target-level and
/// reorder-point policy.
pub fn average_recent_demand(history: &[DemandPoint]) -> f64 {
    if history.is_empty() {
        return 0.0;
    }
    let total: f64 = history.iter().map(|d| d.quantity).sum();
    let first = history.iter().map(|d| d.time).fold(f64::INFINITY, f64::min);
    let last = history.iter().map(|d| d.time).fold(f64::NEG_INFINITY, f64::max);
    total / (last - first + 1.0)
}

/// (s,S) reorder-point policy: order nothing while position is at or above
/// `s`; otherwise order up to the cap.
pub fn order_up_to(history: &[DemandPoint], position: f64, s_mult: f64, cap_mult: f64) -> f64 {
    let avg = average_recent_demand(history);
    let s = (s_mult * avg).round();
    if position >= s {
        return 0.0;
    }
    let cap = (cap_mult * avg).round();
    cap - position
}

/// Forward-all-above-target policy used by collection centers and recovery
/// plants: ship (or disassemble) everything once on-hand crosses `S`.
pub fn forward_all_above_target(history: &[DemandPoint], on_hand: f64, s_mult: f64) -> f64 {
    let s = (s_mult * average_recent_demand(history)).round();
    if on_hand < s {
        return 0.0;
    }
    on_hand
}

pub struct PeerChoice {
    pub route: RouteId,
    pub peer: NodeId,
}

/// Supply-side peer selection (§4.8): the buyer walks its inbound routes,
/// keeping the cheapest `eligible` candidate. `eligible` returns the
/// candidate's unit price when it can supply `material`, `None` otherwise.
/// Transport cost is added only when the route's cost center is the buyer's
/// own (the buyer is paying for transport).
pub fn select_upstream_peer(
    sim: &Rc<Sim>,
    buyer: NodeId,
    quantity: f64,
    eligible: impl Fn(NodeId) -> Option<f64>,
) -> Option<PeerChoice> {
    let now = sim.kernel.now();
    let (buyer_cc, route_ends, buyer_lat, buyer_lon) = {
        let node = sim.nodes.nodes[buyer].borrow();
        (node.costcenter, node.route_ends.clone(), node.lat, node.lon)
    };

    let mut best: Option<(PeerChoice, f64)> = None;
    for route_id in route_ends {
        let route = sim.data.routes[route_id];
        let candidate = route.source;
        let candidate_valid = sim.nodes.nodes[candidate].borrow().is_valid(now);
        if !candidate_valid {
            continue;
        }
        let Some(unit_price) = eligible(candidate) else {
            continue;
        };
        let mut cost = quantity * unit_price;
        if route.costcenter == buyer_cc {
            let (cand_lat, cand_lon) = {
                let node = sim.nodes.nodes[candidate].borrow();
                (node.lat, node.lon)
            };
            let distance = sim
                .distances
                .distance(buyer, buyer_lat, buyer_lon, candidate, cand_lat, cand_lon);
            let mode = &sim.data.transport_modes[route.mode];
            cost += mode.fixed_cost + mode.distance_cost * distance;
        }
        if best.as_ref().map(|(_, c)| cost < *c).unwrap_or(true) {
            best = Some((
                PeerChoice {
                    route: route_id,
                    peer: candidate,
                },
                cost,
            ));
        }
    }
    best.map(|(choice, _)| choice)
}

/// Disposal-side peer selection (§4.8): the sender walks its outbound
/// routes looking for the cheapest role-compatible, valid, `eligible`
/// destination; cost is transport-only (there is no sale price on a return
/// flow).
pub fn select_downstream_peer(
    sim: &Rc<Sim>,
    sender: NodeId,
    eligible: impl Fn(NodeId) -> bool,
) -> Option<PeerChoice> {
    let now = sim.kernel.now();
    let (route_starts, sender_lat, sender_lon) = {
        let node = sim.nodes.nodes[sender].borrow();
        (node.route_starts.clone(), node.lat, node.lon)
    };

    let mut best: Option<(PeerChoice, f64)> = None;
    for route_id in route_starts {
        let route = sim.data.routes[route_id];
        let candidate = route.destination;
        let candidate_valid = sim.nodes.nodes[candidate].borrow().is_valid(now);
        if !candidate_valid || !eligible(candidate) {
            continue;
        }
        let (cand_lat, cand_lon) = {
            let node = sim.nodes.nodes[candidate].borrow();
            (node.lat, node.lon)
        };
        let distance = sim
            .distances
            .distance(sender, sender_lat, sender_lon, candidate, cand_lat, cand_lon);
        let mode = &sim.data.transport_modes[route.mode];
        let cost = mode.fixed_cost + mode.distance_cost * distance;
        if best.as_ref().map(|(_, c)| cost < *c).unwrap_or(true) {
            best = Some((
                PeerChoice {
                    route: route_id,
                    peer: candidate,
                },
                cost,
            ));
        }
    }
    best.map(|(choice, _)| choice)
}
