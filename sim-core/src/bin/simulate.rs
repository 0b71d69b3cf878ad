//! `simulate`: CLI entry point (§2.1 configuration surface). Builds a small
//! closed-loop network — one raw material, one finished product, one node
//! per role — and runs it to the requested horizon. The random data
//! generator and the relational persistence layer that normally seed a run
//! are out of scope (§1); this demo network exercises the same in-process
//! builder API a real loader would call.

use chrono::{Local, NaiveDate};
use clap::Parser;

use loopnet_sim_core::data::{
    DemandSpec, DisassembledMaterial, InverseBom, MasterData, MasterDataBuilder, ProducedMaterial,
};
use loopnet_sim_core::distribution::Distribution;
use loopnet_sim_core::node::{
    CollectionRole, CustomerRole, DistributionRole, NodeRegistry, NodeRegistryBuilder, ProductionRole,
    RecoveryRole, Role,
};
use loopnet_sim_core::runner::{run, RunConfig};

#[derive(Parser)]
#[command(name = "simulate", about = "Run a closed-loop supply chain simulation")]
struct Cli {
    /// Simulated time units to run for.
    #[arg(long, default_value_t = 365.0)]
    horizon: f64,
    /// RNG seed for reproducible runs.
    #[arg(long, default_value_t = 0)]
    seed: u64,
    /// Calendar date simulated time 0 maps to. Defaults to today.
    #[arg(long)]
    start_date: Option<NaiveDate>,
}

fn main() {
    #[cfg(feature = "instrument")]
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let start_date = cli.start_date.unwrap_or_else(|| Local::now().date_naive());

    let (master_data, nodes) = demo_network();
    let config = RunConfig {
        master_data,
        nodes,
        horizon: cli.horizon,
        seed: cli.seed,
        start_date,
    };

    match run(config) {
        Ok(report) => {
            println!("{} log entries", report.entries.len());
            for (costcenter, summary) in &report.summary {
                println!(
                    "{costcenter}: income={:.2} cost={:.2} profit={:.2}",
                    summary.income,
                    summary.cost,
                    summary.profit()
                );
            }
        }
        Err(err) => {
            eprintln!("simulation aborted: {err}");
            std::process::exit(1);
        }
    }
}

fn demo_network() -> (MasterData, NodeRegistry) {
    let mut data = MasterDataBuilder::new();
    let cc = data.add_cost_center("main");
    let steel = data.add_material("steel", 1.0, 1.0).expect("unique material name");
    let widget = data.add_material("widget", 2.0, 3.0).expect("unique material name");
    data.add_bom_entry(widget, steel, 2);
    let truck = data.add_transport_mode("truck", 50.0, 0.8, 0.5, None, Default::default());

    let mut nodes = NodeRegistryBuilder::new();

    let plant = nodes
        .add_node(
            "plant",
            52.52,
            13.40,
            cc,
            None,
            vec![],
            Role::Production(ProductionRole {
                capacity: 1000.0,
                produced_materials: [(
                    widget,
                    ProducedMaterial {
                        cost: 4.0,
                        time: 2.0,
                        capacity_usage: 1.0,
                        price: 12.0,
                        properties: Default::default(),
                    },
                )]
                .into_iter()
                .collect(),
                open_production_orders: Vec::new(),
            }),
        )
        .expect("unique node name");
    nodes.set_inventory(plant, widget, 50.0, 12.0);
    nodes.set_inventory(plant, steel, 200.0, 3.0);

    let dc = nodes
        .add_node(
            "dc",
            52.0,
            13.0,
            cc,
            None,
            vec![],
            Role::Distribution(DistributionRole {
                capacity: 500.0,
                properties: Default::default(),
            }),
        )
        .expect("unique node name");
    nodes.set_inventory(dc, widget, 30.0, 15.0);

    let customer = nodes
        .add_node(
            "customer",
            51.5,
            12.5,
            cc,
            None,
            vec![],
            Role::Customer(CustomerRole {
                demand: [(
                    widget,
                    DemandSpec {
                        material: widget,
                        frequency: 7.0,
                        quantity_distribution: Distribution::normal(10.0, 2.0),
                        is_backlog: false,
                        additional_trend: 0.0,
                        multiplicative_trend: 1.0,
                        duedate: None,
                        waste_production: 0.8,
                    },
                )]
                .into_iter()
                .collect(),
            }),
        )
        .expect("unique node name");

    let collection = nodes
        .add_node(
            "collection",
            51.0,
            12.0,
            cc,
            None,
            vec![],
            Role::Collection(CollectionRole { capacity: 200.0 }),
        )
        .expect("unique node name");

    let recovery = nodes
        .add_node(
            "recovery",
            50.5,
            11.5,
            cc,
            None,
            vec![],
            Role::Recovery(RecoveryRole {
                capacity: 200.0,
                disassembled_materials: [(
                    widget,
                    DisassembledMaterial {
                        cost: 1.0,
                        time: 1.0,
                        capacity_usage: 1.0,
                        properties: Default::default(),
                        inverse_bom: [(
                            steel,
                            InverseBom {
                                quantity_distribution: Distribution::normal(1.5, 0.2),
                                price: 2.0,
                            },
                        )]
                        .into_iter()
                        .collect(),
                    },
                )]
                .into_iter()
                .collect(),
            }),
        )
        .expect("unique node name");
    nodes.set_inventory(recovery, steel, 0.0, 2.0);

    let route_plant_dc = data.add_route(plant, dc, truck, cc);
    let route_plant_customer = data.add_route(plant, customer, truck, cc);
    let route_dc_customer = data.add_route(dc, customer, truck, cc);
    let route_customer_collection = data.add_route(customer, collection, truck, cc);
    let route_collection_recovery = data.add_route(collection, recovery, truck, cc);
    let route_recovery_plant = data.add_route(recovery, plant, truck, cc);

    nodes.register_route(route_plant_dc, plant, dc);
    nodes.register_route(route_plant_customer, plant, customer);
    nodes.register_route(route_dc_customer, dc, customer);
    nodes.register_route(route_customer_collection, customer, collection);
    nodes.register_route(route_collection_recovery, collection, recovery);
    nodes.register_route(route_recovery_plant, recovery, plant);

    (
        data.build().expect("demo network master data is internally consistent"),
        nodes.build().expect("demo network inventories cover every produced/disassembled material"),
    )
}
