//! Closed-loop supply chain discrete-event simulation.
//!
//! A small, cooperative, single-threaded executor ([`kernel`]) drives five
//! kinds of node — production site, distribution center, customer,
//! collection center and recovery plant ([`roles`]) — through an ordering,
//! replenishment, transport, production and disassembly protocol shared via
//! one [`sim::Sim`] handle. Every state-changing step is recorded as a
//! structured [`log::LogEntry`]; [`runner::run`] is the entry point that
//! turns a built network into a finished run.
//!
//! ## Module structure
//!
//! - `kernel`       Discrete-event scheduler (FIFO ready queue + sleep heap)
//! - `error`        Fatal (`SimError`) and recoverable (`LoaderError`,
//!                  `SamplingError`) failure taxonomy
//! - `distribution` Parametric distributions and demand/disassembly draws
//! - `log`          Structured event log and cost-center KPI rollup
//! - `types`        Arena identities and small shared value types
//! - `data`         Immutable reference data (materials, routes, transport)
//! - `geo`          Haversine distance with a pair-symmetric cache
//! - `node`         Mutable per-node state and the five role extensions
//! - `policy`       (s,S) sizing and peer-selection decisions
//! - `sim`          The shared simulation handle and the `delivery` protocol
//! - `roles`        Per-role order/shipment/production/disassembly logic
//! - `runner`       Run configuration and the top-level `run` entry point

pub mod data;
pub mod distribution;
pub mod error;
pub mod geo;
#[cfg(feature = "instrument")]
pub use instrument;
pub mod kernel;
pub mod log;
pub mod node;
pub mod policy;
pub mod roles;
pub mod runner;
pub mod sim;
pub mod types;

pub use data::{MasterData, MasterDataBuilder};
pub use error::{LoaderError, SamplingError, SimError};
pub use kernel::Kernel;
pub use log::{CostCenterSummary, EventKind, LogEntry, Recorder};
pub use node::{Node, NodeRegistry, NodeRegistryBuilder, Order, Role};
pub use runner::{run, RunConfig, RunReport};
pub use sim::{Sim, SimHandle};
pub use types::{CostCenterId, MaterialId, NodeId, RoleKind, RouteId, TransportModeId};
