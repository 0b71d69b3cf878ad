//! §4.7 recovery plant: disassembles collected material into its
//! component materials (stochastic yield per component) and resells those
//! components back upstream to production sites.

use std::collections::BTreeMap;
use std::rc::Rc;

use crate::distribution;
use crate::log::{EventKind, LogEntry};
use crate::node::Order;
use crate::policy;
use crate::roles::production::check_open_customer_orders;
use crate::sim::{delivery, Sim, SimHandle};
use crate::types::{MaterialId, NodeId};

/// §4.7 `order_management`: a production site buying a recycled component.
/// No replenishment policy fires here — stock only grows through
/// [`disassembly`].
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

    let on_hand = { sim.nodes.nodes[seller].borrow().on_hand(order.material) };
    if on_hand >= order.quantity {
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
        let peer = order.origin.expect("order always carries an origin");
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
        node.open_customer_orders.push(order);
    }
}

/// §4.7 `shipment_receive`: a collected batch may cross the target level
/// for one or more of the materials this plant knows how to disassemble.
pub fn shipment_receive(sim: &Rc<Sim>, node_id: NodeId, material: MaterialId, quantity: f64) {
    let node_name = sim.node_name(node_id);
    let node_role = sim.node_role_str(node_id);
    let now = sim.now();
    let result = {
        let mut node = sim.nodes.nodes[node_id].borrow_mut();
        let r = node.apply_inventory_delta(material, quantity);
        node.record_demand(material, now, quantity);
        r
    };
    match result {
        Ok(new_qty) => sim.log_inventory(&node_name, node_role, material, new_qty),
        Err(e) => {
            sim.abort(e);
            return;
        }
    }

    let (history, on_hand) = {
        let node = sim.nodes.nodes[node_id].borrow();
        (node.demand_history_for(material).to_vec(), node.on_hand(material))
    };
    let q = policy::forward_all_above_target(&history, on_hand, policy::RECOVERY_S_MULT);
    if q <= 0.0 {
        return;
    }

    let has_recipe = {
        let node = sim.nodes.nodes[node_id].borrow();
        node.role.as_recovery().unwrap().disassembled_materials.contains_key(&material)
    };
    if !has_recipe {
        return;
    }

    let deducted = {
        let mut node = sim.nodes.nodes[node_id].borrow_mut();
        node.apply_inventory_delta(material, -q)
    };
    match deducted {
        Ok(new_qty) => sim.log_inventory(&node_name, node_role, material, new_qty),
        Err(e) => {
            sim.abort(e);
            return;
        }
    }

    sim.kernel.clone().spawn(disassembly(Rc::clone(sim), node_id, material, q));
}

/// §4.7 `disassembly`: the suspension point is the disassembly duration
/// plus any drawn disturbance duration; yield per component is stochastic
/// and independent per [`crate::data::InverseBom`] entry.
pub async fn disassembly(sim: SimHandle, node_id: NodeId, material: MaterialId, quantity: f64) {
    let node_name = sim.node_name(node_id);
    let node_role = sim.node_role_str(node_id);
    let material_name = sim.material_name(material);

    sim.record(
        LogEntry::new(sim.now(), &node_name, node_role, EventKind::DisassemblyStart)
            .quantity(quantity)
            .material(&material_name),
    );

    let disturbance = { sim.nodes.nodes[node_id].borrow().disturbance.clone() };
    let (duration, loss) = sim.draw_disturbance(&disturbance, true);
    if loss > 0.0 {
        sim.record(
            LogEntry::new(sim.now(), &node_name, node_role, EventKind::Disturbance)
                .quantity((quantity * loss).round())
                .material(&material_name),
        );
    }

    let (unit_cost, unit_time, properties, inverse_bom) = {
        let node = sim.nodes.nodes[node_id].borrow();
        let dm = &node.role.as_recovery().unwrap().disassembled_materials[&material];
        (dm.cost, dm.time, dm.properties.clone(), dm.inverse_bom.clone())
    };

    sim.kernel.clone().timeout(unit_time + duration).await;

    // §9 open question 2: the disturbance loss is logged but NOT subtracted
    // from the disassembled quantity. Preserved as specified.
    let scaled_properties: BTreeMap<String, f64> =
        properties.iter().map(|(name, rate)| (name.clone(), rate * quantity)).collect();
    sim.record(
        LogEntry::new(sim.now(), &node_name, node_role, EventKind::DisassemblyEnd)
            .quantity(quantity)
            .material(&material_name)
            .cost(unit_cost * quantity)
            .costcenter(&node_name)
            .properties(scaled_properties),
    );

    for (component, inverse) in &inverse_bom {
        let yield_qty = {
            let mut rng = sim.rng.borrow_mut();
            distribution::generate_disassembly_quantity(&inverse.quantity_distribution, quantity, &mut *rng)
        };
        if yield_qty <= 0.0 {
            continue;
        }
        let result = {
            let mut node = sim.nodes.nodes[node_id].borrow_mut();
            let on_hand = node.on_hand(*component);
            node.set_inventory(*component, on_hand, inverse.price);
            node.apply_inventory_delta(*component, yield_qty)
        };
        match result {
            Ok(new_qty) => sim.log_inventory(&node_name, node_role, *component, new_qty),
            Err(e) => {
                sim.abort(e);
                return;
            }
        }
    }

    check_open_customer_orders(&sim, node_id);
}
