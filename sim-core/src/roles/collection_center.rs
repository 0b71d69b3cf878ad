//! §4.6 collection center: a pure consolidation point between customer
//! returns and the recovery plant, forwarding everything once its target
//! level is crossed.

use std::rc::Rc;

use crate::log::{EventKind, LogEntry};
use crate::node::Role;
use crate::policy::{self, PeerChoice};
use crate::sim::{delivery, Sim};
use crate::types::{MaterialId, NodeId};

fn select_recovery_plant(sim: &Rc<Sim>, sender: NodeId) -> Option<PeerChoice> {
    policy::select_downstream_peer(sim, sender, |candidate| {
        matches!(sim.nodes.nodes[candidate].borrow().role, Role::Recovery(_))
    })
}

/// §4.6 `shipment_receive`: accumulate returns, then forward the whole
/// on-hand balance once it crosses the target level.
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
    let q = policy::forward_all_above_target(&history, on_hand, policy::COLLECTION_S_MULT);
    if q <= 0.0 {
        return;
    }

    let Some(choice) = select_recovery_plant(sim, node_id) else {
        sim.record(
            LogEntry::new(
                sim.now(),
                &sim.node_name(node_id),
                sim.node_role_str(node_id),
                EventKind::Return,
            )
            .quantity(q)
            .material(sim.material_name(material))
            .comment("Lost return"),
        );
        return;
    };

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

    sim.record(
        LogEntry::new(sim.now(), &node_name, node_role, EventKind::Return)
            .quantity(q)
            .material(sim.material_name(material))
            .peer(sim.node_name(choice.peer)),
    );

    sim.kernel
        .clone()
        .spawn(delivery(Rc::clone(sim), node_id, choice.peer, material, q, Some(choice.route), true));
}
