//! §4.5 customer: the only role with no inventory of its own. Each demand
//! record drives its own independent task, generating an outbound order and
//! (when the demand produces waste) a return shipment to a collection
//! center, then sleeping until the next ordering cycle.

use std::rc::Rc;

use crate::distribution;
use crate::log::{EventKind, LogEntry};
use crate::node::{Order, Role};
use crate::policy::{self, PeerChoice};
use crate::roles;
use crate::sim::{delivery, Sim, SimHandle};
use crate::types::{MaterialId, NodeId};

fn select_distribution_center(
    sim: &Rc<Sim>,
    customer: NodeId,
    material: MaterialId,
    quantity: f64,
    is_backlog: bool,
) -> Option<PeerChoice> {
    policy::select_upstream_peer(sim, customer, quantity, |candidate| {
        let node = sim.nodes.nodes[candidate].borrow();
        match &node.role {
            Role::Distribution(_) => {
                if !is_backlog && node.on_hand(material) < quantity {
                    None
                } else {
                    Some(node.price(material))
                }
            }
            _ => None,
        }
    })
}

fn select_collection_center(sim: &Rc<Sim>, customer: NodeId) -> Option<PeerChoice> {
    policy::select_downstream_peer(sim, customer, |candidate| {
        matches!(sim.nodes.nodes[candidate].borrow().role, Role::Collection(_))
    })
}

fn place_order(sim: &Rc<Sim>, customer: NodeId, material: MaterialId) {
    let now = sim.now();
    let (quantity_distribution, additional_trend, multiplicative_trend, is_backlog, waste_production) = {
        let node = sim.nodes.nodes[customer].borrow();
        let demand = &node.role.as_customer().unwrap().demand[&material];
        (
            demand.quantity_distribution,
            demand.additional_trend,
            demand.multiplicative_trend,
            demand.is_backlog,
            demand.waste_production,
        )
    };

    let quantity = {
        let mut rng = sim.rng.borrow_mut();
        distribution::generate_order_quantity(
            &quantity_distribution,
            additional_trend,
            multiplicative_trend,
            1.0,
            now,
            &mut *rng,
        )
    };

    let customer_name = sim.node_name(customer);
    let customer_role = sim.node_role_str(customer);
    let material_name = sim.material_name(material);

    if quantity > 0.0 {
        match select_distribution_center(sim, customer, material, quantity, is_backlog) {
            Some(choice) => {
                let peer_name = sim.node_name(choice.peer);
                let price = sim.nodes.nodes[choice.peer].borrow().price(material);
                sim.record(
                    LogEntry::new(now, &customer_name, customer_role, EventKind::Order)
                        .quantity(quantity)
                        .material(&material_name)
                        .peer(peer_name)
                        .cost(price * quantity)
                        .costcenter(&customer_name),
                );
                roles::order_management(
                    sim,
                    choice.peer,
                    Order {
                        origin: Some(customer),
                        material,
                        quantity,
                        route: Some(choice.route),
                    },
                );
            }
            None => {
                sim.record(
                    LogEntry::new(now, &customer_name, customer_role, EventKind::Order)
                        .quantity(quantity)
                        .material(&material_name)
                        .comment("Lost sale"),
                );
            }
        }
    }

    if waste_production <= 0.0 {
        return;
    }
    let return_qty = {
        let mut rng = sim.rng.borrow_mut();
        distribution::generate_disassembly_quantity(&quantity_distribution, waste_production, &mut *rng)
    };
    if return_qty <= 0.0 {
        return;
    }
    let Some(choice) = select_collection_center(sim, customer) else {
        sim.record(
            LogEntry::new(now, &customer_name, customer_role, EventKind::Return)
                .quantity(return_qty)
                .material(&material_name)
                .comment("Lost return"),
        );
        return;
    };
    sim.record(
        LogEntry::new(now, &customer_name, customer_role, EventKind::Return)
            .quantity(return_qty)
            .material(&material_name)
            .peer(sim.node_name(choice.peer)),
    );
    sim.kernel.clone().spawn(delivery(
        Rc::clone(sim),
        customer,
        choice.peer,
        material,
        return_qty,
        Some(choice.route),
        true,
    ));
}

/// One independent task per `(customer, material)` demand record (§6
/// bootstrap). Runs for the lifetime of the simulation.
pub async fn demand_loop(sim: SimHandle, customer: NodeId, material: MaterialId) {
    loop {
        let now = sim.now();
        let valid = sim.nodes.nodes[customer].borrow().is_valid(now);
        if valid {
            place_order(&sim, customer, material);
        }
        let frequency = {
            let node = sim.nodes.nodes[customer].borrow();
            node.role.as_customer().unwrap().demand[&material].frequency
        };
        sim.kernel.clone().timeout(frequency).await;
    }
}
