//! §4.3 production site: order intake, (s,S) replenishment, multi-level
//! BOM explosion, component procurement and the production task itself.

use std::collections::BTreeMap;
use std::rc::Rc;

use crate::error::SimError;
use crate::log::{EventKind, LogEntry};
use crate::node::{Order, Role};
use crate::policy::{self, PeerChoice};
use crate::sim::{delivery, Sim, SimHandle};
use crate::types::{MaterialId, NodeId};

fn select_supplier(sim: &Rc<Sim>, buyer: NodeId, material: MaterialId, quantity: f64) -> Option<PeerChoice> {
    policy::select_upstream_peer(sim, buyer, quantity, |candidate| {
        let node = sim.nodes.nodes[candidate].borrow();
        match &node.role {
            Role::Production(p) if p.produced_materials.contains_key(&material) => Some(node.price(material)),
            Role::Recovery(_) if node.on_hand(material) >= quantity => Some(node.price(material)),
            _ => None,
        }
    })
}

/// §4.3 `order_management`.
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

    if on_hand >= order.quantity && position >= order.quantity {
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
        {
            let mut node = sim.nodes.nodes[seller].borrow_mut();
            node.correct_inventory_position(order.material, -order.quantity);
        }
        let self_produced = {
            let node = sim.nodes.nodes[seller].borrow();
            node.role
                .as_production()
                .map(|p| p.produced_materials.contains_key(&order.material))
                .unwrap_or(false)
        };
        if self_produced {
            let mut node = sim.nodes.nodes[seller].borrow_mut();
            node.open_customer_orders.push(order.clone());
        } else {
            sim.abort(SimError::Invariant(format!(
                "order for non-produced material '{}' at production site '{}'",
                material_name, seller_name
            )));
            return;
        }
    }

    inventory_management(sim, seller, order.material, order.quantity);
}

/// §4.3 `inventory_management`: decides whether/how much to produce and
/// recursively procures any missing BOM component.
pub fn inventory_management(sim: &Rc<Sim>, seller: NodeId, material: MaterialId, _demand_qty: f64) {
    let (history, position) = {
        let node = sim.nodes.nodes[seller].borrow();
        (node.demand_history_for(material).to_vec(), node.inventory_position(material))
    };
    let q = policy::order_up_to(
        &history,
        position,
        policy::PRODUCTION_S_MULT,
        policy::PRODUCTION_S_CAP_MULT,
    );
    if q <= 0.0 {
        return;
    }

    let now = sim.now();
    let bom: Vec<(MaterialId, u32)> = sim.data.materials[material]
        .bom
        .iter()
        .map(|(c, n)| (*c, *n))
        .collect();

    let mut required: Vec<(MaterialId, f64)> = Vec::with_capacity(bom.len());
    for (component, per_unit) in &bom {
        let amount = (*per_unit as f64) * q;
        required.push((*component, amount));
        let mut node = sim.nodes.nodes[seller].borrow_mut();
        node.record_demand(*component, now, amount);
        node.correct_inventory_position(*component, -amount);
    }

    let mut deficient: Vec<MaterialId> = Vec::new();
    {
        let node = sim.nodes.nodes[seller].borrow();
        for (component, amount) in &required {
            if node.on_hand(*component) < *amount || node.inventory_position(*component) < 0.0 {
                deficient.push(*component);
            }
        }
    }
    let canproduce = deficient.is_empty();

    for component in &deficient {
        let (chistory, cposition) = {
            let node = sim.nodes.nodes[seller].borrow();
            (
                node.demand_history_for(*component).to_vec(),
                node.inventory_position(*component),
            )
        };
        let order_qty = policy::order_up_to(
            &chistory,
            cposition,
            policy::PRODUCTION_S_MULT,
            policy::PRODUCTION_S_CAP_MULT,
        );
        if order_qty <= 0.0 {
            continue;
        }
        {
            let mut node = sim.nodes.nodes[seller].borrow_mut();
            node.correct_inventory_position(*component, order_qty);
        }

        let self_produced = {
            let node = sim.nodes.nodes[seller].borrow();
            node.role
                .as_production()
                .map(|p| p.produced_materials.contains_key(component))
                .unwrap_or(false)
        };
        if self_produced {
            let seller_name = sim.node_name(seller);
            let seller_role = sim.node_role_str(seller);
            sim.record(
                LogEntry::new(sim.now(), &seller_name, seller_role, EventKind::Order)
                    .quantity(order_qty)
                    .material(sim.material_name(*component))
                    .peer(&seller_name),
            );
            order_management(
                sim,
                seller,
                Order {
                    origin: Some(seller),
                    material: *component,
                    quantity: order_qty,
                    route: None,
                },
            );
        } else if let Some(choice) = select_supplier(sim, seller, *component, order_qty) {
            let supplier = choice.peer;
            let seller_name = sim.node_name(seller);
            let seller_role = sim.node_role_str(seller);
            let peer_name = sim.node_name(supplier);
            let price = sim.nodes.nodes[supplier].borrow().price(*component);
            let mode_name = sim.data.transport_modes[sim.data.routes[choice.route].mode].name.clone();
            sim.record(
                LogEntry::new(sim.now(), &seller_name, seller_role, EventKind::Order)
                    .quantity(order_qty)
                    .material(sim.material_name(*component))
                    .peer(peer_name)
                    .mode(mode_name)
                    .cost(price * order_qty)
                    .costcenter(&seller_name),
            );
            crate::roles::order_management(
                sim,
                supplier,
                Order {
                    origin: Some(seller),
                    material: *component,
                    quantity: order_qty,
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
                .quantity(order_qty)
                .material(sim.material_name(*component))
                .comment("Lost order"),
            );
        }
    }

    {
        let mut node = sim.nodes.nodes[seller].borrow_mut();
        node.correct_inventory_position(material, q);
    }

    if canproduce {
        let seller_name = sim.node_name(seller);
        let seller_role = sim.node_role_str(seller);
        let mut new_qtys = Vec::with_capacity(required.len());
        {
            let mut node = sim.nodes.nodes[seller].borrow_mut();
            for (component, amount) in &required {
                match node.apply_inventory_delta(*component, -*amount) {
                    Ok(new_qty) => new_qtys.push((*component, new_qty)),
                    Err(e) => {
                        drop(node);
                        sim.abort(e);
                        return;
                    }
                }
            }
        }
        for (component, new_qty) in new_qtys {
            sim.log_inventory(&seller_name, seller_role, component, new_qty);
        }
        sim.kernel.clone().spawn(production(Rc::clone(sim), seller, material, q));
    } else {
        let mut node = sim.nodes.nodes[seller].borrow_mut();
        node.role.as_production_mut().unwrap().open_production_orders.push(Order {
            origin: Some(seller),
            material,
            quantity: q,
            route: None,
        });
    }
}

/// §4.3 `production`: the suspension point is the production duration plus
/// any drawn disturbance duration.
pub async fn production(sim: SimHandle, seller: NodeId, material: MaterialId, qty: f64) {
    let seller_name = sim.node_name(seller);
    let seller_role = sim.node_role_str(seller);
    let material_name = sim.material_name(material);

    sim.record(
        LogEntry::new(sim.now(), &seller_name, seller_role, EventKind::ProductionStart)
            .quantity(qty)
            .material(&material_name),
    );

    let disturbance = { sim.nodes.nodes[seller].borrow().disturbance.clone() };
    let (duration, loss) = sim.draw_disturbance(&disturbance, true);
    if loss > 0.0 {
        sim.record(
            LogEntry::new(sim.now(), &seller_name, seller_role, EventKind::Disturbance)
                .quantity((qty * loss).round())
                .material(&material_name),
        );
    }

    let (unit_cost, unit_time, properties) = {
        let node = sim.nodes.nodes[seller].borrow();
        let pm = &node.role.as_production().unwrap().produced_materials[&material];
        (pm.cost, pm.time, pm.properties.clone())
    };

    sim.kernel.clone().timeout(unit_time + duration).await;

    // §9 open question 2: the disturbance loss is logged but NOT subtracted
    // from the produced quantity. Preserved as specified.
    let scaled_properties: BTreeMap<String, f64> =
        properties.iter().map(|(name, rate)| (name.clone(), rate * qty)).collect();
    sim.record(
        LogEntry::new(sim.now(), &seller_name, seller_role, EventKind::ProductionEnd)
            .quantity(qty)
            .material(&material_name)
            .cost(unit_cost * qty)
            .costcenter(&seller_name)
            .properties(scaled_properties),
    );

    let result = {
        let mut node = sim.nodes.nodes[seller].borrow_mut();
        let r = node.apply_inventory_delta(material, qty);
        node.correct_inventory_position(material, -qty);
        r
    };
    match result {
        Ok(new_qty) => sim.log_inventory(&seller_name, seller_role, material, new_qty),
        Err(e) => {
            sim.abort(e);
            return;
        }
    }

    check_open_customer_orders(&sim, seller);
}

/// §4.3 `check_open_customer_orders`: re-runs until a full pass makes no
/// further progress.
pub fn check_open_customer_orders(sim: &Rc<Sim>, seller: NodeId) {
    let seller_name = sim.node_name(seller);
    let seller_role = sim.node_role_str(seller);
    loop {
        let orders = {
            let node = sim.nodes.nodes[seller].borrow();
            node.open_customer_orders.clone()
        };
        let mut remaining = Vec::new();
        let mut progressed = false;
        for order in orders {
            let on_hand = sim.nodes.nodes[seller].borrow().on_hand(order.material);
            if on_hand >= order.quantity {
                let result = {
                    let mut node = sim.nodes.nodes[seller].borrow_mut();
                    node.correct_inventory_position(order.material, order.quantity);
                    node.apply_inventory_delta(order.material, -order.quantity)
                };
                match result {
                    Ok(new_qty) => sim.log_inventory(&seller_name, seller_role, order.material, new_qty),
                    Err(e) => {
                        sim.abort(e);
                        return;
                    }
                }
                progressed = true;
                let peer = order.origin.expect("queued customer order carries an origin");
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
                remaining.push(order);
            }
        }
        {
            let mut node = sim.nodes.nodes[seller].borrow_mut();
            node.open_customer_orders = remaining;
        }
        if !progressed {
            break;
        }
    }
}

/// §4.3 `shipment_receive`: a received component may unblock one or more
/// stalled productions.
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
        let orders = {
            let node = sim.nodes.nodes[node_id].borrow();
            node.role.as_production().unwrap().open_production_orders.clone()
        };
        let mut remaining = Vec::new();
        let mut progressed = false;
        for order in orders {
            let bom: Vec<(MaterialId, u32)> = sim.data.materials[order.material]
                .bom
                .iter()
                .map(|(c, n)| (*c, *n))
                .collect();
            let required: Vec<(MaterialId, f64)> =
                bom.iter().map(|(c, n)| (*c, (*n as f64) * order.quantity)).collect();
            let sufficient = {
                let node = sim.nodes.nodes[node_id].borrow();
                required.iter().all(|(c, r)| node.on_hand(*c) >= *r)
            };
            if sufficient {
                let mut failed = None;
                let mut new_qtys = Vec::with_capacity(required.len());
                {
                    let mut node = sim.nodes.nodes[node_id].borrow_mut();
                    for (component, amount) in &required {
                        match node.apply_inventory_delta(*component, -*amount) {
                            Ok(new_qty) => new_qtys.push((*component, new_qty)),
                            Err(e) => {
                                failed = Some(e);
                                break;
                            }
                        }
                    }
                }
                if let Some(e) = failed {
                    sim.abort(e);
                    return;
                }
                for (component, new_qty) in new_qtys {
                    sim.log_inventory(&node_name, node_role, component, new_qty);
                }
                progressed = true;
                sim.kernel
                    .clone()
                    .spawn(production(Rc::clone(sim), node_id, order.material, order.quantity));
            } else {
                remaining.push(order);
            }
        }
        {
            let mut node = sim.nodes.nodes[node_id].borrow_mut();
            node.role.as_production_mut().unwrap().open_production_orders = remaining;
        }
        if !progressed {
            break;
        }
    }
}
