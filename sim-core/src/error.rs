//! Error taxonomy for the simulation core.
//!
//! Only two of the four failure kinds ever surface as a `Result::Err`:
//! routing/availability failures are logged as "Lost ..." entries and
//! sampling failures degrade to a diagnostic and a zero draw, both handled
//! at the point of occurrence. Invariant violations and loader failures are
//! fatal and propagate out of [`crate::runner::run`].

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SimError {
    #[error("invariant violated: {0}")]
    Invariant(String),
    #[error(transparent)]
    Loader(#[from] LoaderError),
}

/// Raised while assembling a [`crate::data::MasterData`] from loader calls.
#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum LoaderError {
    #[error("material '{0}' referenced but never defined")]
    UnknownMaterial(String),
    #[error("node '{0}' referenced but never defined")]
    UnknownNode(String),
    #[error("transport mode '{0}' referenced but never defined")]
    UnknownTransportMode(String),
    #[error("cost center '{0}' referenced but never defined")]
    UnknownCostCenter(String),
    #[error("distribution '{0}' referenced but never defined")]
    UnknownDistribution(String),
    #[error("node '{node}' is missing an inventory entry for material '{material}'")]
    MissingInventory { node: String, material: String },
    #[error("duplicate node name '{0}'")]
    DuplicateNode(String),
    #[error("duplicate material name '{0}'")]
    DuplicateMaterial(String),
}

/// Raised when a [`crate::distribution::Distribution`] is sampled without
/// its required parameters. Always caught internally; never escapes to a
/// caller of the simulation.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("distribution missing required parameters")]
pub struct SamplingError;
