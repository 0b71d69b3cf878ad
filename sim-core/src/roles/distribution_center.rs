//! §4.4 distribution center: resells a single tier of finished materials,
//! replenished from a production site, no BOM explosion of its own.

use std::rc::Rc;

use crate::log::{EventKind, LogEntry};
use crate::node::{Order, Role};
use crate::policy::{self, PeerChoice};
use crate::sim::{delivery, Sim};
use crate::types::{MaterialId, NodeId};

fn select_plant(sim: &Rc<Sim>, buyer: NodeId, material: MaterialId, quantity: f64) -> Option<PeerChoice> {
    policy::select_upstream_peer(sim, buyer, quantity, |candidate| {
        let node = sim.nodes.nodes[candidate].borrow();
        match &node.role {
            Role::Production(p) if p.produced_materials.contains_key(&material) => Some(node.price(material)),
            _ => None,
        }
    })
}

/// §4.4 `order_management`. Immediate fulfillment requires strictly more
/// on-hand stock than the order (a DC always keeps at least one unit of
/// buffer for itself), unlike the non-strict check at a production site.
pub fn order_management(sim: &Rc<Sim>, seller: NodeId, order: Order) {
    let now = sim.now();
    let material_name = sim.material_name(order.material);
    let seller_name = sim.node_name(seller);
    let seller_role = sim.node_role_str(seller);

    let price = {
        let mut node = sim.nodes.nodes[seller].borrow_mut();
        node.record_demand(order.material, now, order.quantity);
        node.price(order.material)
    };
    sim.record(
        LogEntry::new(now, &seller_name, seller_role, EventKind::Income)
            .quantity(order.quantity)
            .material(&material_name)
            .cost(price * order.quantity)
            .costcenter(&seller_name),
    );

    let (on_hand, position) = {
        let node = sim.nodes.nodes[seller].borrow();
        (node.on_hand(order.material), node.inventory_position(order.material))
    };

    if on_hand > order.quantity && position >= order.quantity {
        let deducted = {
            let mut node = sim.nodes.nodes[seller].borrow_mut();
            node.apply_inventory_delta(order.material, -order.quantity)
        };
        match deducted {
            Ok(new_qty) => sim.log_inventory(&seller_name, seller_role, order.material, new_qty),
            Err(e) => {
                sim.abort(e);
                return;
            }
        }
        let peer = order.origin.expect("customer order always carries an origin");
        sim.kernel.clone().spawn(delivery(
            Rc::clone(sim),
            seller,
            peer,
            order.material,
            order.quantity,
            order.route,
            false,
        ));
    } else {
        let mut node = sim.nodes.nodes[seller].borrow_mut();
        node.correct_inventory_position(order.material, -order.quantity);
        node.open_customer_orders.push(order.clone());
    }

    replenish(sim, seller, order.material);
}

fn replenish(sim: &Rc<Sim>, seller: NodeId, material: MaterialId) {
    let (history, position) = {
        let node = sim.nodes.nodes[seller].borrow();
        (node.demand_history_for(material).to_vec(), node.inventory_position(material))
    };
    let q = policy::order_up_to(&history, position, policy::DC_S_MULT, policy::DC_S_CAP_MULT);
    if q <= 0.0 {
        return;
    }

    {
        let mut node = sim.nodes.nodes[seller].borrow_mut();
        node.correct_inventory_position(material, q);
    }

    if let Some(choice) = select_plant(sim, seller, material, q) {
        let seller_name = sim.node_name(seller);
        let seller_role = sim.node_role_str(seller);
        let peer_name = sim.node_name(choice.peer);
        let price = sim.nodes.nodes[choice.peer].borrow().price(material);
        let mode_name = sim.data.transport_modes[sim.data.routes[choice.route].mode].name.clone();
        sim.record(
            LogEntry::new(sim.now(), &seller_name, seller_role, EventKind::Order)
                .quantity(q)
                .material(sim.material_name(material))
                .peer(peer_name)
                .mode(mode_name)
                .cost(price * q)
                .costcenter(&seller_name),
        );
        crate::roles::order_management(
            sim,
            choice.peer,
            Order {
                origin: Some(seller),
                material,
                quantity: q,
                route: Some(choice.route),
            },
        );
    } else {
        sim.record(
            LogEntry::new(
                sim.now(),
                &sim.node_name(seller),
                sim.node_role_str(seller),
                EventKind::Order,
            )
            .quantity(q)
            .material(sim.material_name(material))
            .comment("Lost order"),
        );
    }
}

/// §4.4 `shipment_receive`: a replenishment arrival re-checks every queued
/// customer order, allowing transit loss on the replay (§9 open question 1
/// applies uniformly to every hop, including this second leg).
pub fn shipment_receive(sim: &Rc<Sim>, node_id: NodeId, material: MaterialId, quantity: f64) {
    let node_name = sim.node_name(node_id);
    let node_role = sim.node_role_str(node_id);
    let result = {
        let mut node = sim.nodes.nodes[node_id].borrow_mut();
        let r = node.apply_inventory_delta(material, quantity);
        node.correct_inventory_position(material, -quantity);
        r
    };
    match result {
        Ok(new_qty) => sim.log_inventory(&node_name, node_role, material, new_qty),
        Err(e) => {
            sim.abort(e);
            return;
        }
    }

    loop {
        let orders = { sim.nodes.nodes[node_id].borrow().open_customer_orders.clone() };
        let mut remaining = Vec::new();
        let mut progressed = false;
        for order in orders {
            let on_hand = sim.nodes.nodes[node_id].borrow().on_hand(order.material);
            if on_hand >= order.quantity {
                let result = {
                    let mut node = sim.nodes.nodes[node_id].borrow_mut();
                    node.correct_inventory_position(order.material, order.quantity);
                    node.apply_inventory_delta(order.material, -order.quantity)
                };
                match result {
                    Ok(new_qty) => sim.log_inventory(&node_name, node_role, order.material, new_qty),
                    Err(e) => {
                        sim.abort(e);
                        return;
                    }
                }
                progressed = true;
                let peer = order.origin.expect("queued customer order carries an origin");
                sim.kernel.clone().spawn(delivery(
                    Rc::clone(sim),
                    node_id,
                    peer,
                    order.material,
                    order.quantity,
                    order.route,
                    true,
                ));
            } else {
                remaining.push(order);
            }
        }
        {
            sim.nodes.nodes[node_id].borrow_mut().open_customer_orders = remaining;
        }
        if !progressed {
            break;
        }
    }
}
