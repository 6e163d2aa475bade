pub mod pinhole;

pub use pinhole::*;

use serde::{Deserialize, Serialize};

/// Lens distortion parameterization. The coefficient count is a property of
/// the model and is never guessed from array lengths inside the solver.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "snake_case")]
pub enum DistortionModel {
    /// k1, k2, p1, p2
    RadTan4,
    /// k1, k2, p1, p2, k3
    #[default]
    RadTan5,
    /// k1, k2, p1, p2, k3, k4, k5, k6 with rational radial term
    Rational8,
}

impl DistortionModel {
    pub fn coeff_count(&self) -> usize {
        match self {
            DistortionModel::RadTan4 => 4,
            DistortionModel::RadTan5 => 5,
            DistortionModel::Rational8 => 8,
        }
    }

    /// Only for reading files that do not record their model.
    pub fn from_coeff_count(n: usize) -> Option<DistortionModel> {
        match n {
            4 => Some(DistortionModel::RadTan4),
            5 => Some(DistortionModel::RadTan5),
            8 => Some(DistortionModel::Rational8),
            _ => None,
        }
    }
}
