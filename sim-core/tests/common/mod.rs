//! Network builders shared by the scenario and property tests. Each
//! builder assembles the smallest network a given test family needs
//! directly through the public `MasterDataBuilder`/`NodeRegistryBuilder`
//! API — the same API a real loader would call.

use loopnet_sim_core::data::{DemandSpec, MasterData, MasterDataBuilder, ProducedMaterial};
use loopnet_sim_core::distribution::Distribution;
use loopnet_sim_core::node::{
    CustomerRole, DistributionRole, NodeId, NodeRegistry, NodeRegistryBuilder, ProductionRole, Role,
};

/// One production site, one distribution center and one customer, trading
/// a single no-BOM material with instantaneous production and transport
/// (every transit/production time is zero, so every cascade a single order
/// triggers resolves within the same simulated instant it was placed).
/// Plant sells at 10/unit, DC resells at 12/unit. Customer demand is
/// `normal(10, 0)` (deterministic), `frequency = 5`, `waste = 0`.
#[allow(dead_code)]
pub fn build_single_tier_network(include_dc_customer_route: bool) -> (MasterData, NodeRegistry, NodeIds) {
    let mut data = MasterDataBuilder::new();
    let cc = data.add_cost_center("main");
    let widget = data.add_material("widget", 1.0, 1.0).unwrap();
    let mode = data.add_transport_mode("instant", 0.0, 0.0, 0.0, None, Default::default());

    let mut nodes = NodeRegistryBuilder::new();

    let plant = nodes
        .add_node(
            "plant",
            0.0,
            0.0,
            cc,
            None,
            vec![],
            Role::Production(ProductionRole {
                capacity: 1_000_000.0,
                produced_materials: [(
                    widget,
                    ProducedMaterial {
                        cost: 4.0,
                        time: 0.0,
                        capacity_usage: 1.0,
                        price: 10.0,
                        properties: Default::default(),
                    },
                )]
                .into_iter()
                .collect(),
                open_production_orders: Vec::new(),
            }),
        )
        .unwrap();
    nodes.set_inventory(plant, widget, 0.0, 10.0);

    let dc = nodes
        .add_node(
            "dc",
            0.0,
            0.0,
            cc,
            None,
            vec![],
            Role::Distribution(DistributionRole {
                capacity: 1_000_000.0,
                properties: Default::default(),
            }),
        )
        .unwrap();
    nodes.set_inventory(dc, widget, 0.0, 12.0);

    let customer = nodes
        .add_node(
            "customer",
            0.0,
            0.0,
            cc,
            None,
            vec![],
            Role::Customer(CustomerRole {
                demand: [(
                    widget,
                    DemandSpec {
                        material: widget,
                        frequency: 5.0,
                        quantity_distribution: Distribution::normal(10.0, 0.0),
                        is_backlog: true,
                        additional_trend: 0.0,
                        multiplicative_trend: 1.0,
                        duedate: None,
                        waste_production: 0.0,
                    },
                )]
                .into_iter()
                .collect(),
            }),
        )
        .unwrap();

    let route_plant_dc = data.add_route(plant, dc, mode, cc);
    nodes.register_route(route_plant_dc, plant, dc);
    if include_dc_customer_route {
        let route_dc_customer = data.add_route(dc, customer, mode, cc);
        nodes.register_route(route_dc_customer, dc, customer);
    }

    (
        data.build().unwrap(),
        nodes.build().unwrap(),
        NodeIds { plant, dc, customer, widget },
    )
}

#[allow(dead_code)]
pub struct NodeIds {
    pub plant: NodeId,
    pub dc: NodeId,
    pub customer: NodeId,
    pub widget: loopnet_sim_core::types::MaterialId,
}
