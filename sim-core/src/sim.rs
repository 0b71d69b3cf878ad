//! The shared simulation handle: scheduler, master data, node registry,
//! distance cache, log and RNG all live behind one `Rc<Sim>` so every task
//! and every node-logic function can reach them. [`delivery`] is the one
//! piece of behavior genuinely shared across all five roles (§4.2) and
//! lives here rather than under `roles/`.

use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::rc::Rc;

use chrono::NaiveDate;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::data::{Disturbance, MasterData};
use crate::error::SimError;
use crate::geo::DistanceCache;
use crate::kernel::Kernel;
use crate::log::{EventKind, LogEntry, Recorder};
use crate::node::NodeRegistry;
use crate::roles;
use crate::types::{MaterialId, NodeId, RouteId};

pub struct Sim {
    pub kernel: Rc<Kernel>,
    pub data: MasterData,
    pub nodes: NodeRegistry,
    pub distances: DistanceCache,
    pub log: RefCell<Recorder>,
    pub rng: RefCell<StdRng>,
    pub start_date: NaiveDate,
    /// Set by [`Sim::abort`] on the first fatal invariant violation (§4.9,
    /// §7). Once set, the kernel stops dispatching any further task.
    pub aborted: Cell<bool>,
    fatal_error: RefCell<Option<SimError>>,
}

pub type SimHandle = Rc<Sim>;

impl Sim {
    /// Assembles the shared handle from already-built master data and node
    /// registry (§6 loader contract). The kernel starts at `t=0`.
    pub fn new(data: MasterData, nodes: NodeRegistry, seed: u64, start_date: NaiveDate) -> Rc<Sim> {
        Rc::new(Sim {
            kernel: Kernel::new(),
            data,
            nodes,
            distances: DistanceCache::new(),
            log: RefCell::new(Recorder::new()),
            rng: RefCell::new(StdRng::seed_from_u64(seed)),
            start_date,
            aborted: Cell::new(false),
            fatal_error: RefCell::new(None),
        })
    }

    pub fn now(&self) -> f64 {
        self.kernel.now()
    }

    pub fn record(&self, entry: LogEntry) {
        self.log.borrow_mut().log(entry);
    }

    pub fn material_name(&self, material: MaterialId) -> String {
        self.data.material_name(material).to_string()
    }

    pub fn node_name(&self, node: NodeId) -> String {
        self.nodes.name_of(node)
    }

    pub fn node_role_str(&self, node: NodeId) -> &'static str {
        self.nodes.nodes[node].borrow().role_kind().as_str()
    }

    /// Records a fatal invariant violation and stops the kernel from
    /// dispatching any further task (§4.9, §7). Idempotent: only the first
    /// call is retained.
    pub fn abort(&self, err: SimError) {
        if self.fatal_error.borrow().is_none() {
            self.fatal_error.replace(Some(err));
        }
        self.aborted.set(true);
    }

    pub fn take_fatal_error(&self) -> Option<SimError> {
        self.fatal_error.borrow_mut().take()
    }

    /// §4.2 `change_inventory`: emits the `INVENTORY` log entry for a
    /// completed on-hand mutation, carrying the resulting level rather than
    /// the delta.
    pub fn log_inventory(&self, node_name: &str, node_role: &'static str, material: MaterialId, new_qty: f64) {
        let material_name = self.material_name(material);
        self.record(
            LogEntry::new(self.now(), node_name, node_role, EventKind::Inventory)
                .material(&material_name)
                .quantity(new_qty),
        );
    }

    /// Draws a (duration, loss) pair from an optional disturbance, per
    /// §4.2 `get_disturbance`. `allow_loss` gates whether a fired
    /// disturbance is allowed to destroy material (customer-bound
    /// shipments never apply loss on the first hop; replayed backlog
    /// shipments do).
    pub fn draw_disturbance(&self, disturbance: &Option<Disturbance>, allow_loss: bool) -> (f64, f64) {
        let Some(disturbance) = disturbance else {
            return (0.0, 0.0);
        };
        let mut rng = self.rng.borrow_mut();
        if rng.random::<f64>() >= disturbance.probability {
            return (0.0, 0.0);
        }
        let duration = disturbance.duration.sample(&mut *rng).unwrap_or(0.0);
        let loss = if allow_loss { disturbance.loss } else { 0.0 };
        (duration, loss)
    }
}

/// §4.2 `get_transportation_time`: sub-day unit times are treated as a rate
/// per 100 km, whole-or-greater unit times are a flat nominal duration.
pub fn transportation_time(unit_time: f64, distance: f64) -> f64 {
    if unit_time < 1.0 {
        unit_time * distance / 100.0
    } else {
        unit_time
    }
}

/// §4.2 `delivery`: the outbound shipment protocol shared by every role.
/// `seller` is the node whose on-hand stock already reflects the
/// deduction for this shipment; `peer` receives it on arrival.
pub async fn delivery(
    sim: SimHandle,
    seller: NodeId,
    peer: NodeId,
    material: MaterialId,
    quantity: f64,
    route: Option<RouteId>,
    allow_loss: bool,
) {
    let material_name = sim.material_name(material);
    let seller_name = sim.node_name(seller);
    let seller_role = sim.node_role_str(seller);
    let peer_name = sim.node_name(peer);

    struct RouteInfo {
        mode_name: String,
        transport_time: f64,
        disturbance_duration: f64,
        loss: f64,
        cost: f64,
        costcenter_name: Option<String>,
        properties: BTreeMap<String, f64>,
    }

    let info = match route {
        Some(route_id) => {
            let route = sim.data.routes[route_id];
            let (seller_lat, seller_lon) = {
                let n = sim.nodes.nodes[seller].borrow();
                (n.lat, n.lon)
            };
            let (peer_lat, peer_lon) = {
                let n = sim.nodes.nodes[peer].borrow();
                (n.lat, n.lon)
            };
            let distance = sim
                .distances
                .distance(seller, seller_lat, seller_lon, peer, peer_lat, peer_lon);
            let mode = &sim.data.transport_modes[route.mode];
            let (disturbance_duration, loss) = sim.draw_disturbance(&mode.disturbance, allow_loss);
            let cost = mode.fixed_cost + mode.distance_cost * distance;
            let properties = mode
                .properties
                .iter()
                .map(|(name, rate)| (name.clone(), rate * distance))
                .collect();
            RouteInfo {
                mode_name: mode.name.clone(),
                transport_time: transportation_time(mode.time, distance),
                disturbance_duration,
                loss,
                cost,
                costcenter_name: Some(sim.data.cost_centers[route.costcenter].name.clone()),
                properties,
            }
        }
        None => RouteInfo {
            mode_name: String::new(),
            transport_time: 0.0,
            disturbance_duration: 0.0,
            loss: 0.0,
            cost: 0.0,
            costcenter_name: None,
            properties: BTreeMap::new(),
        },
    };

    let mut start_log = LogEntry::new(sim.now(), &seller_name, seller_role, EventKind::TransportStart)
        .quantity(quantity)
        .material(&material_name)
        .peer(&peer_name);
    if !info.mode_name.is_empty() {
        start_log = start_log.mode(&info.mode_name);
    }
    sim.record(start_log);

    if info.loss > 0.0 {
        sim.record(
            LogEntry::new(sim.now(), &seller_name, seller_role, EventKind::Disturbance)
                .quantity((quantity * info.loss).round())
                .material(&material_name),
        );
    }

    sim.kernel
        .clone()
        .timeout(info.transport_time + info.disturbance_duration)
        .await;

    // §9 open question 1: the loss factor is rounded *before* multiplying,
    // collapsing partial loss to all-or-nothing. Preserved as specified.
    let post_loss_qty = quantity * (1.0 - info.loss).round();

    let mut end_log = LogEntry::new(sim.now(), &seller_name, seller_role, EventKind::TransportEnd)
        .quantity(post_loss_qty)
        .material(&material_name)
        .peer(&peer_name)
        .cost(info.cost)
        .properties(info.properties);
    if !info.mode_name.is_empty() {
        end_log = end_log.mode(&info.mode_name);
    }
    if let Some(cc) = info.costcenter_name {
        end_log = end_log.costcenter(cc);
    }
    sim.record(end_log);

    roles::shipment_receive(&sim, peer, material, post_loss_qty);
}
