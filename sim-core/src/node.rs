//! Node state shared by all five roles, plus the tagged-variant role
//! extension. A node's mutable state (inventory, position correction,
//! queues, demand history) evolves over simulated time; everything it
//! references in [`crate::data::MasterData`] is immutable.

use std::collections::BTreeMap;

use slotmap::SlotMap;

use crate::data::{DemandSpec, DisassembledMaterial, Disturbance, ProducedMaterial};
use crate::error::{LoaderError, SimError};
use crate::types::{CostCenterId, MaterialId, NodeId, Price, PropertyRates, Quantity, RoleKind, RouteId};

#[derive(Debug, Clone, Copy, Default)]
pub struct Inventory {
    pub quantity: Quantity,
    pub price: Price,
}

/// A half-open (or closed, or unbounded) validity window. `None` on a bound
/// means that side is unconstrained.
#[derive(Debug, Clone, Copy)]
pub struct ValidityWindow {
    pub start: Option<f64>,
    pub end: Option<f64>,
}

impl ValidityWindow {
    pub fn contains(&self, now: f64) -> bool {
        match (self.start, self.end) {
            (Some(s), Some(e)) => now >= s && now <= e,
            (Some(s), None) => now >= s,
            (None, Some(e)) => now <= e,
            (None, None) => true,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct DemandPoint {
    pub time: f64,
    pub quantity: f64,
}

#[derive(Debug, Clone)]
pub struct Order {
    pub origin: Option<NodeId>,
    pub material: MaterialId,
    pub quantity: f64,
    pub route: Option<RouteId>,
}

pub struct ProductionRole {
    pub capacity: f64,
    pub produced_materials: BTreeMap<MaterialId, ProducedMaterial>,
    pub open_production_orders: Vec<Order>,
}

pub struct DistributionRole {
    pub capacity: f64,
    pub properties: PropertyRates,
}

pub struct CustomerRole {
    pub demand: BTreeMap<MaterialId, DemandSpec>,
}

pub struct CollectionRole {
    pub capacity: f64,
}

pub struct RecoveryRole {
    pub capacity: f64,
    pub disassembled_materials: BTreeMap<MaterialId, DisassembledMaterial>,
}

pub enum Role {
    Production(ProductionRole),
    Distribution(DistributionRole),
    Customer(CustomerRole),
    Collection(CollectionRole),
    Recovery(RecoveryRole),
}

impl Role {
    pub fn kind(&self) -> RoleKind {
        match self {
            Role::Production(_) => RoleKind::ProductionSite,
            Role::Distribution(_) => RoleKind::DistributionCenter,
            Role::Customer(_) => RoleKind::Customer,
            Role::Collection(_) => RoleKind::CollectionCenter,
            Role::Recovery(_) => RoleKind::RecoveryPlant,
        }
    }

    pub fn as_production(&self) -> Option<&ProductionRole> {
        match self {
            Role::Production(r) => Some(r),
            _ => None,
        }
    }
    pub fn as_production_mut(&mut self) -> Option<&mut ProductionRole> {
        match self {
            Role::Production(r) => Some(r),
            _ => None,
        }
    }
    pub fn as_recovery(&self) -> Option<&RecoveryRole> {
        match self {
            Role::Recovery(r) => Some(r),
            _ => None,
        }
    }
    pub fn as_recovery_mut(&mut self) -> Option<&mut RecoveryRole> {
        match self {
            Role::Recovery(r) => Some(r),
            _ => None,
        }
    }
    pub fn as_customer(&self) -> Option<&CustomerRole> {
        match self {
            Role::Customer(r) => Some(r),
            _ => None,
        }
    }
}

pub struct Node {
    pub id: NodeId,
    pub name: String,
    pub lat: f64,
    pub lon: f64,
    pub costcenter: CostCenterId,
    pub disturbance: Option<Disturbance>,
    pub inventory: BTreeMap<MaterialId, Inventory>,
    pub position_correction: BTreeMap<MaterialId, f64>,
    pub route_starts: Vec<RouteId>,
    pub route_ends: Vec<RouteId>,
    pub validity: Vec<ValidityWindow>,
    pub demand_history: BTreeMap<MaterialId, Vec<DemandPoint>>,
    pub open_customer_orders: Vec<Order>,
    pub role: Role,
}

impl Node {
    pub fn role_kind(&self) -> RoleKind {
        self.role.kind()
    }

    pub fn set_inventory(&mut self, material: MaterialId, quantity: f64, price: f64) {
        self.inventory.insert(material, Inventory { quantity, price });
    }

    pub fn on_hand(&self, material: MaterialId) -> f64 {
        self.inventory.get(&material).map(|i| i.quantity).unwrap_or(0.0)
    }

    pub fn price(&self, material: MaterialId) -> f64 {
        self.inventory.get(&material).map(|i| i.price).unwrap_or(0.0)
    }

    pub fn position_correction_of(&self, material: MaterialId) -> f64 {
        *self.position_correction.get(&material).unwrap_or(&0.0)
    }

    /// §3 invariant 2: on-hand plus in-flight commitments; may go negative
    /// transiently, unlike on-hand.
    pub fn inventory_position(&self, material: MaterialId) -> f64 {
        self.on_hand(material) + self.position_correction_of(material)
    }

    pub fn correct_inventory_position(&mut self, material: MaterialId, delta: f64) {
        *self.position_correction.entry(material).or_insert(0.0) += delta;
    }

    /// §4.2 `is_valid`: empty window list means always valid; otherwise any
    /// one window containing `now` suffices.
    pub fn is_valid(&self, now: f64) -> bool {
        self.validity.is_empty() || self.validity.iter().any(|w| w.contains(now))
    }

    pub fn record_demand(&mut self, material: MaterialId, now: f64, quantity: f64) {
        self.demand_history
            .entry(material)
            .or_default()
            .push(DemandPoint { time: now, quantity });
    }

    pub fn demand_history_for(&self, material: MaterialId) -> &[DemandPoint] {
        self.demand_history
            .get(&material)
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    /// §4.2 `change_inventory`: mutate on-hand, refusing to let it go
    /// negative. Logging the resulting `INVENTORY` level is the caller's
    /// responsibility (it needs the shared recorder, which a `Node` does
    /// not own).
    pub fn apply_inventory_delta(&mut self, material: MaterialId, delta: f64) -> Result<f64, SimError> {
        let inv = self.inventory.entry(material).or_insert(Inventory::default());
        let new_qty = inv.quantity + delta;
        if new_qty < -1e-6 {
            return Err(SimError::Invariant(format!(
                "node '{}' inventory would go negative for the material being adjusted",
                self.name
            )));
        }
        inv.quantity = new_qty.max(0.0);
        Ok(inv.quantity)
    }
}

/// The full set of nodes plus name-based lookup; built once via
/// [`NodeRegistryBuilder`] after [`crate::data::MasterData`] exists so
/// routes and cost centers can be validated against both.
pub struct NodeRegistry {
    pub nodes: SlotMap<NodeId, std::cell::RefCell<Node>>,
    pub node_by_name: std::collections::HashMap<String, NodeId>,
}

impl NodeRegistry {
    pub fn id_by_name(&self, name: &str) -> Option<NodeId> {
        self.node_by_name.get(name).copied()
    }

    pub fn name_of(&self, id: NodeId) -> String {
        self.nodes[id].borrow().name.clone()
    }
}

#[derive(Default)]
pub struct NodeRegistryBuilder {
    nodes: SlotMap<NodeId, std::cell::RefCell<Node>>,
    node_by_name: std::collections::HashMap<String, NodeId>,
}

impl NodeRegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    #[allow(clippy::too_many_arguments)]
    pub fn add_node(
        &mut self,
        name: impl Into<String>,
        lat: f64,
        lon: f64,
        costcenter: CostCenterId,
        disturbance: Option<Disturbance>,
        validity: Vec<ValidityWindow>,
        role: Role,
    ) -> Result<NodeId, LoaderError> {
        let name = name.into();
        if self.node_by_name.contains_key(&name) {
            return Err(LoaderError::DuplicateNode(name));
        }
        let id = self.nodes.insert_with_key(|id| {
            std::cell::RefCell::new(Node {
                id,
                name: name.clone(),
                lat,
                lon,
                costcenter,
                disturbance,
                inventory: BTreeMap::new(),
                position_correction: BTreeMap::new(),
                route_starts: Vec::new(),
                route_ends: Vec::new(),
                validity,
                demand_history: BTreeMap::new(),
                open_customer_orders: Vec::new(),
                role,
            })
        });
        self.node_by_name.insert(name, id);
        Ok(id)
    }

    pub fn set_inventory(&mut self, node: NodeId, material: MaterialId, quantity: f64, price: f64) {
        self.nodes[node].borrow_mut().set_inventory(material, quantity, price);
    }

    pub fn register_route(&mut self, route: RouteId, source: NodeId, destination: NodeId) {
        self.nodes[source].borrow_mut().route_starts.push(route);
        self.nodes[destination].borrow_mut().route_ends.push(route);
    }

    pub fn id_by_name(&self, name: &str) -> Option<NodeId> {
        self.node_by_name.get(name).copied()
    }

    /// Validates that every non-customer node has an inventory entry for
    /// every material it can produce, disassemble, or hold (the loader
    /// contract in §6). Routes are validated at construction time since
    /// `register_route` requires both endpoints to already exist.
    pub fn build(self) -> Result<NodeRegistry, LoaderError> {
        for node in self.nodes.values() {
            let node = node.borrow();
            let required: Vec<MaterialId> = match &node.role {
                Role::Production(p) => p.produced_materials.keys().copied().collect(),
                Role::Recovery(r) => r
                    .disassembled_materials
                    .values()
                    .flat_map(|d| d.inverse_bom.keys().copied())
                    .collect(),
                _ => Vec::new(),
            };
            for material in required {
                if !node.inventory.contains_key(&material) {
                    return Err(LoaderError::MissingInventory {
                        node: node.name.clone(),
                        material: format!("{material:?}"),
                    });
                }
            }
        }
        Ok(NodeRegistry {
            nodes: self.nodes,
            node_by_name: self.node_by_name,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validity_window_conventions() {
        let both = ValidityWindow { start: Some(5.0), end: Some(10.0) };
        assert!(!both.contains(4.0));
        assert!(both.contains(5.0));
        assert!(both.contains(10.0));
        assert!(!both.contains(10.1));

        let start_only = ValidityWindow { start: Some(5.0), end: None };
        assert!(!start_only.contains(4.9));
        assert!(start_only.contains(100.0));

        let end_only = ValidityWindow { start: None, end: Some(5.0) };
        assert!(end_only.contains(0.0));
        assert!(!end_only.contains(5.1));
    }

    #[test]
    fn inventory_position_combines_on_hand_and_correction() {
        let mut nodes = NodeRegistryBuilder::new();
        let cc = CostCenterId::default();
        let id = nodes
            .add_node(
                "dc1",
                0.0,
                0.0,
                cc,
                None,
                vec![],
                Role::Distribution(DistributionRole {
                    capacity: 100.0,
                    properties: Default::default(),
                }),
            )
            .unwrap();
        let material = MaterialId::default();
        nodes.set_inventory(id, material, 5.0, 1.0);
        let registry = nodes.build().unwrap();
        let mut node = registry.nodes[id].borrow_mut();
        node.correct_inventory_position(material, -3.0);
        assert_eq!(node.inventory_position(material), 2.0);
        assert!(node.apply_inventory_delta(material, -10.0).is_err());
    }
}
