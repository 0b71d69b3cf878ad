//! Arena identities and small value types shared across the crate.
//!
//! Cross-referencing entities (nodes hold routes, routes refer to nodes,
//! recipes refer to materials) are modeled as slotmap keys rather than
//! `Rc`/`RefCell` graphs, per the redesign guidance: lookups always go
//! through [`crate::data::MasterData`], which breaks cycles and keeps
//! iteration order deterministic.

use serde::{Deserialize, Serialize};
use slotmap::new_key_type;

new_key_type! {
    pub struct NodeId;
    pub struct MaterialId;
    pub struct RouteId;
    pub struct TransportModeId;
    pub struct CostCenterId;
}

pub type Quantity = f64;
pub type Price = f64;
pub type SimTime = f64;

/// The role a node carries; exactly one per node, carrying role-specific
/// state (see [`crate::node::Role`]). Kept separately as a tag so logging
/// and peer-selection can match on it without borrowing the full node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RoleKind {
    ProductionSite,
    DistributionCenter,
    Customer,
    CollectionCenter,
    RecoveryPlant,
}

impl RoleKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RoleKind::ProductionSite => "ProductionSite",
            RoleKind::DistributionCenter => "DistributionCenter",
            RoleKind::Customer => "Customer",
            RoleKind::CollectionCenter => "CollectionCenter",
            RoleKind::RecoveryPlant => "RecoveryPlant",
        }
    }
}

/// A single per-distance (or per-unit) environmental/operational rate, e.g.
/// `{name: "emission", rate: 0.4}` scaled by distance or quantity at the
/// point of use.
pub type PropertyRates = std::collections::BTreeMap<String, f64>;
