//! Offspring susceptibility of sibling families to the resident and to a foreign pathogen.

use ndarray::{Array1, ArrayView1, Axis};

use crate::core::genotypes::{GENERAL_LOCUS, Pathogen};
use crate::core::Model;
use crate::errors::{CoevolutionError, Result};

/// General resistance must be at least this polymorphic for a slope to be reported.
const MIN_POLYMORPHISM: f64 = 1e-2;

/// Expected offspring susceptibilities and frequency of every family.
#[derive(Clone, Debug, PartialEq)]
pub struct FamilyTable {
    /// Susceptibility to the resident pathogen mixture.
    pub endemic: Array1<f64>,
    /// Susceptibility to the foreign pathogen.
    pub foreign: Array1<f64>,
    pub frequency: Array1<f64>,
}

impl FamilyTable {
    pub fn len(&self) -> usize {
        self.frequency.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frequency.is_empty()
    }

    /// Frequency weighted slope of foreign against endemic susceptibility.
    pub fn slope(&self) -> f64 {
        weighted_slope(
            self.endemic.view(),
            self.foreign.view(),
            self.frequency.view(),
        )
    }
}

/// Full-sib families are indexed by `paternal * |G| + maternal`, half-sib families by the
/// paternal genotype.
#[derive(Clone, Debug, PartialEq)]
pub struct Transitivity {
    pub full_sib: FamilyTable,
    pub half_sib: FamilyTable,
}

impl Transitivity {
    pub fn new(
        model: &Model,
        susceptible: ArrayView1<f64>,
        infected: ArrayView1<f64>,
    ) -> Result<Self> {
        let n_genotypes = model.n_genotypes();
        let total_susceptible = susceptible.sum();
        let total_infected = infected.sum();
        if total_susceptible <= 0. || total_infected <= 0. {
            return Err(CoevolutionError::NumericalError(format!(
                "Transitivity needs positive host and pathogen abundances, got {total_susceptible} and {total_infected}"
            )));
        }

        let transmission = model.transmission();
        let mating = model.mating();
        let resident = transmission.dot(&(&infected / total_infected));

        let frequency: Array1<f64> = susceptible
            .iter()
            .flat_map(|&paternal| susceptible.iter().map(move |&maternal| paternal * maternal))
            .map(|pair| pair / (total_susceptible * total_susceptible))
            .collect();
        let full_sib = FamilyTable {
            endemic: mating.dot(&resident),
            foreign: mating.dot(&transmission.column(Pathogen::Foreign.index())),
            frequency,
        };

        let shape = (n_genotypes, n_genotypes);
        let blocks = |values: &Array1<f64>| {
            values
                .view()
                .into_shape_with_order(shape)
                .map(|blocks| blocks.to_owned())
                .map_err(|err| CoevolutionError::NumericalError(format!("{}", err)))
        };
        let half_sib = FamilyTable {
            endemic: blocks(&full_sib.endemic)?
                .mean_axis(Axis(1))
                .unwrap_or_default(),
            foreign: blocks(&full_sib.foreign)?
                .mean_axis(Axis(1))
                .unwrap_or_default(),
            frequency: blocks(&full_sib.frequency)?.sum_axis(Axis(1)),
        };

        Ok(Self { full_sib, half_sib })
    }

    pub fn full_sib_slope(&self) -> f64 {
        self.full_sib.slope()
    }

    pub fn half_sib_slope(&self) -> f64 {
        self.half_sib.slope()
    }
}

/// Least squares slope of `y` against `x` with residuals weighted by `weights`.
///
/// Each residual is multiplied by its weight before squaring, so a point contributes with the
/// square of its weight. Returns 0 when `x` has no spread under the weights.
pub fn weighted_slope(x: ArrayView1<f64>, y: ArrayView1<f64>, weights: ArrayView1<f64>) -> f64 {
    let effective = weights.mapv(|w| w * w);
    let total = effective.sum();
    if !(total > 0.) {
        return 0.;
    }
    let mean_x = (&effective * &x).sum() / total;
    let mean_y = (&effective * &y).sum() / total;

    let (covariance, variance) = x.iter().zip(y.iter()).zip(effective.iter()).fold(
        (0., 0.),
        |(covariance, variance), ((&x, &y), &w)| {
            (
                covariance + w * (x - mean_x) * (y - mean_y),
                variance + w * (x - mean_x) * (x - mean_x),
            )
        },
    );

    let scale = mean_x.abs().max(1.);
    if !(variance / total > (1e-12 * scale).powi(2)) {
        return 0.;
    }
    covariance / variance
}

/// Full-sib transitivity slope, or 0 if general resistance is (nearly) fixed or absent.
pub fn transitivity_slope(
    model: &Model,
    susceptible: ArrayView1<f64>,
    infected: ArrayView1<f64>,
) -> Result<f64> {
    let general = model
        .space()
        .allele_frequency(susceptible, GENERAL_LOCUS);
    if !(MIN_POLYMORPHISM < general && general < 1. - MIN_POLYMORPHISM) {
        log::debug!("General resistance at frequency {general} is not polymorphic");
        return Ok(0.);
    }
    Ok(Transitivity::new(model, susceptible, infected)?.full_sib_slope())
}
