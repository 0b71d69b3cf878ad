//! Role-specific behavior (§4.3-4.7), dispatched from the shared node
//! operations in [`crate::sim`] by matching on [`crate::types::RoleKind`].

pub mod collection_center;
pub mod customer;
pub mod distribution_center;
pub mod production;
pub mod recovery_plant;

use std::rc::Rc;

use crate::node::Order;
use crate::sim::Sim;
use crate::types::{MaterialId, NodeId, RoleKind};

/// §4.3/4.4/4.7 `order_management`: only roles that sell to someone else
/// implement it. Customers and collection centers never receive an
/// `Order` (they only ever `shipment_receive`).
pub fn order_management(sim: &Rc<Sim>, seller: NodeId, order: Order) {
    let role_kind = sim.nodes.nodes[seller].borrow().role_kind();
    match role_kind {
        RoleKind::ProductionSite => production::order_management(sim, seller, order),
        RoleKind::DistributionCenter => distribution_center::order_management(sim, seller, order),
        RoleKind::RecoveryPlant => recovery_plant::order_management(sim, seller, order),
        RoleKind::Customer | RoleKind::CollectionCenter => {
            sim.abort(crate::error::SimError::Invariant(format!(
                "order_management invoked on '{}', a role that never sells",
                sim.node_name(seller)
            )));
        }
    }
}

/// §4.2 `shipment_receive`: default no-op, overridden by every role that
/// can be a delivery destination.
pub fn shipment_receive(sim: &Rc<Sim>, node: NodeId, material: MaterialId, quantity: f64) {
    let role_kind = sim.nodes.nodes[node].borrow().role_kind();
    match role_kind {
        RoleKind::ProductionSite => production::shipment_receive(sim, node, material, quantity),
        RoleKind::DistributionCenter => distribution_center::shipment_receive(sim, node, material, quantity),
        RoleKind::CollectionCenter => collection_center::shipment_receive(sim, node, material, quantity),
        RoleKind::RecoveryPlant => recovery_plant::shipment_receive(sim, node, material, quantity),
        RoleKind::Customer => {}
    }
}
