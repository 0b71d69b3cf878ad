//! Immutable reference data: materials, routes, transport modes and the
//! disturbances/distributions attached to them. Everything here is built
//! once by [`MasterDataBuilder`] and never mutated again; node state that
//! *does* evolve over simulated time lives in [`crate::node`].

use std::collections::{BTreeMap, HashMap};

use slotmap::SlotMap;

use crate::distribution::Distribution;
use crate::error::LoaderError;
use crate::types::{CostCenterId, MaterialId, NodeId, PropertyRates, RouteId, TransportModeId};

#[derive(Debug, Clone)]
pub struct CostCenter {
    pub name: String,
}

/// A Bernoulli event attached to a transport mode, a production site or a
/// recovery plant's disassembly operation.
#[derive(Debug, Clone)]
pub struct Disturbance {
    pub probability: f64,
    pub duration: Distribution,
    pub loss: f64,
}

#[derive(Debug, Clone, Default)]
pub struct Material {
    pub name: String,
    pub volume: f64,
    pub mass: f64,
    /// component -> quantity required per unit produced.
    pub bom: BTreeMap<MaterialId, u32>,
    pub properties: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct TransportMode {
    pub name: String,
    pub fixed_cost: f64,
    pub distance_cost: f64,
    /// Nominal per-unit transit time; see [`crate::node::transportation_time`].
    pub time: f64,
    pub disturbance: Option<Disturbance>,
    pub properties: PropertyRates,
}

#[derive(Debug, Clone, Copy)]
pub struct Route {
    pub source: NodeId,
    pub destination: NodeId,
    pub mode: TransportModeId,
    pub costcenter: CostCenterId,
}

#[derive(Debug, Clone)]
pub struct ProducedMaterial {
    pub cost: f64,
    pub time: f64,
    pub capacity_usage: f64,
    pub price: f64,
    pub properties: PropertyRates,
}

#[derive(Debug, Clone)]
pub struct InverseBom {
    pub quantity_distribution: Distribution,
    pub price: f64,
}

#[derive(Debug, Clone)]
pub struct DisassembledMaterial {
    pub cost: f64,
    pub time: f64,
    pub capacity_usage: f64,
    pub properties: PropertyRates,
    /// component -> yield distribution + sell price.
    pub inverse_bom: BTreeMap<MaterialId, InverseBom>,
}

#[derive(Debug, Clone)]
pub struct DemandSpec {
    pub material: MaterialId,
    pub frequency: f64,
    pub quantity_distribution: Distribution,
    pub is_backlog: bool,
    pub additional_trend: f64,
    pub multiplicative_trend: f64,
    pub duedate: Option<f64>,
    pub waste_production: f64,
}

/// Immutable reference data, built once by [`MasterDataBuilder::build`] and
/// shared for the lifetime of a run.
pub struct MasterData {
    pub cost_centers: SlotMap<CostCenterId, CostCenter>,
    pub materials: SlotMap<MaterialId, Material>,
    pub transport_modes: SlotMap<TransportModeId, TransportMode>,
    pub routes: SlotMap<RouteId, Route>,
    pub material_by_name: HashMap<String, MaterialId>,
    pub cost_center_by_name: HashMap<String, CostCenterId>,
    pub transport_mode_by_name: HashMap<String, TransportModeId>,
}

impl MasterData {
    pub fn material_name(&self, id: MaterialId) -> &str {
        &self.materials[id].name
    }
}

#[derive(Default)]
pub struct MasterDataBuilder {
    cost_centers: SlotMap<CostCenterId, CostCenter>,
    materials: SlotMap<MaterialId, Material>,
    transport_modes: SlotMap<TransportModeId, TransportMode>,
    routes: SlotMap<RouteId, Route>,
    material_by_name: HashMap<String, MaterialId>,
    cost_center_by_name: HashMap<String, CostCenterId>,
    transport_mode_by_name: HashMap<String, TransportModeId>,
}

impl MasterDataBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_cost_center(&mut self, name: impl Into<String>) -> CostCenterId {
        let name = name.into();
        if let Some(id) = self.cost_center_by_name.get(&name) {
            return *id;
        }
        let id = self.cost_centers.insert(CostCenter { name: name.clone() });
        self.cost_center_by_name.insert(name, id);
        id
    }

    pub fn add_material(&mut self, name: impl Into<String>, volume: f64, mass: f64) -> Result<MaterialId, LoaderError> {
        let name = name.into();
        if self.material_by_name.contains_key(&name) {
            return Err(LoaderError::DuplicateMaterial(name));
        }
        let id = self.materials.insert(Material {
            name: name.clone(),
            volume,
            mass,
            ..Default::default()
        });
        self.material_by_name.insert(name, id);
        Ok(id)
    }

    pub fn add_bom_entry(&mut self, product: MaterialId, component: MaterialId, quantity: u32) {
        self.materials[product].bom.insert(component, quantity);
    }

    pub fn add_transport_mode(
        &mut self,
        name: impl Into<String>,
        fixed_cost: f64,
        distance_cost: f64,
        time: f64,
        disturbance: Option<Disturbance>,
        properties: PropertyRates,
    ) -> TransportModeId {
        let name = name.into();
        let id = self.transport_modes.insert(TransportMode {
            name: name.clone(),
            fixed_cost,
            distance_cost,
            time,
            disturbance,
            properties,
        });
        self.transport_mode_by_name.insert(name, id);
        id
    }

    pub fn add_route(
        &mut self,
        source: NodeId,
        destination: NodeId,
        mode: TransportModeId,
        costcenter: CostCenterId,
    ) -> RouteId {
        self.routes.insert(Route {
            source,
            destination,
            mode,
            costcenter,
        })
    }

    pub fn material_id(&self, name: &str) -> Option<MaterialId> {
        self.material_by_name.get(name).copied()
    }

    pub fn cost_center_id(&self, name: &str) -> Option<CostCenterId> {
        self.cost_center_by_name.get(name).copied()
    }

    /// Validates that every BOM reference resolves to a material registered
    /// in the same builder, then freezes the data. Node-level validation
    /// (inventory coverage, dangling route endpoints) happens in
    /// [`crate::node::NodeRegistryBuilder::build`] since it needs the node
    /// set, which this builder does not own.
    pub fn build(self) -> Result<MasterData, LoaderError> {
        for material in self.materials.values() {
            for component in material.bom.keys() {
                if !self.materials.contains_key(*component) {
                    return Err(LoaderError::UnknownMaterial(format!(
                        "dangling BOM component id in '{}'",
                        material.name
                    )));
                }
            }
        }
        Ok(MasterData {
            cost_centers: self.cost_centers,
            materials: self.materials,
            transport_modes: self.transport_modes,
            routes: self.routes,
            material_by_name: self.material_by_name,
            cost_center_by_name: self.cost_center_by_name,
            transport_mode_by_name: self.transport_mode_by_name,
        })
    }
}
