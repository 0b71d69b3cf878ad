//! Parametric distributions and the demand/disassembly quantity generators
//! built on top of them.

use rand::Rng;
use rand_distr::{Distribution as _, Normal};
use serde::{Deserialize, Serialize};

use crate::error::SamplingError;

/// Time-varying scaling is applied on top of every demand draw.
pub const TREND_PERIODICITY: f64 = 30.0;

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub enum Distribution {
    Uniform { min: Option<f64>, max: Option<f64> },
    Normal { avg: Option<f64>, std: Option<f64> },
}

impl Distribution {
    pub fn uniform(min: f64, max: f64) -> Self {
        Distribution::Uniform {
            min: Some(min),
            max: Some(max),
        }
    }

    pub fn normal(avg: f64, std: f64) -> Self {
        Distribution::Normal {
            avg: Some(avg),
            std: Some(std),
        }
    }

    /// Draw one value. Missing parameters are a recoverable sampling error
    /// rather than a panic.
    pub fn sample(&self, rng: &mut impl Rng) -> Result<f64, SamplingError> {
        match *self {
            Distribution::Uniform {
                min: Some(min),
                max: Some(max),
            } => {
                if min >= max {
                    Ok(min)
                } else {
                    Ok(rng.random_range(min..=max))
                }
            }
            Distribution::Normal {
                avg: Some(avg),
                std: Some(std),
            } => {
                if std <= 0.0 {
                    Ok(avg)
                } else {
                    let normal = Normal::new(avg, std).map_err(|_| SamplingError)?;
                    Ok(normal.sample(rng))
                }
            }
            _ => Err(SamplingError),
        }
    }
}

/// Quantity a customer orders (or returns) at `now`, incorporating additive
/// and multiplicative trend. Traps a sampling failure, logs a diagnostic and
/// returns 0 rather than propagating the error.
pub fn generate_order_quantity(
    quantity_distribution: &Distribution,
    additional_trend: f64,
    multiplicative_trend: f64,
    multiplier: f64,
    now: f64,
    rng: &mut impl Rng,
) -> f64 {
    match quantity_distribution.sample(rng) {
        Ok(q) => {
            let period = now / TREND_PERIODICITY;
            let trended = q * multiplicative_trend.powf(period) + additional_trend * period;
            (trended * multiplier).round()
        }
        Err(_) => {
            tracing_unavailable_distribution();
            0.0
        }
    }
}

/// Component quantity yielded from disassembling one unit, scaled by the
/// number of units disassembled.
pub fn generate_disassembly_quantity(
    distribution: &Distribution,
    multiplier: f64,
    rng: &mut impl Rng,
) -> f64 {
    match distribution.sample(rng) {
        Ok(q) => (q * multiplier).round(),
        Err(_) => {
            tracing_unavailable_distribution();
            0.0
        }
    }
}

fn tracing_unavailable_distribution() {
    #[cfg(feature = "instrument")]
    tracing::warn!("error with distribution: missing required parameters");
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn zero_std_normal_is_deterministic() {
        let mut rng = StdRng::seed_from_u64(1);
        let d = Distribution::normal(10.0, 0.0);
        assert_eq!(d.sample(&mut rng).unwrap(), 10.0);
    }

    #[test]
    fn missing_parameters_is_a_sampling_error() {
        let mut rng = StdRng::seed_from_u64(1);
        let d = Distribution::Uniform {
            min: None,
            max: Some(1.0),
        };
        assert!(d.sample(&mut rng).is_err());
    }

    #[test]
    fn order_quantity_applies_trend() {
        let mut rng = StdRng::seed_from_u64(1);
        let d = Distribution::normal(10.0, 0.0);
        let q = generate_order_quantity(&d, 1.0, 1.0, 1.0, 90.0, &mut rng);
        assert_eq!(q, (10.0 + 1.0 * (90.0 / 30.0)).round());
    }

    #[test]
    fn missing_distribution_degrades_to_zero() {
        let mut rng = StdRng::seed_from_u64(1);
        let d = Distribution::Uniform {
            min: None,
            max: None,
        };
        assert_eq!(generate_order_quantity(&d, 0.0, 1.0, 1.0, 0.0, &mut rng), 0.0);
        assert_eq!(generate_disassembly_quantity(&d, 1.0, &mut rng), 0.0);
    }
}
