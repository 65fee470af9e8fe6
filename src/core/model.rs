use ndarray::{Array1, Array2, ArrayView1, ArrayView2};

use super::genotypes::{GENERAL_LOCUS, GenotypeSpace, N_LOCI, SPECIFIC_LOCUS};
use super::mating::mating_matrix;
use super::transmission::transmission_matrix;
use crate::config::Parameters;

/// Model parameters together with the genotype space and all matrices derived from them.
///
/// The derived matrices are built once on construction; a model never changes afterwards. To
/// explore a different parameter set, build a new model.
#[derive(Clone, Debug)]
pub struct Model {
    parameters: Parameters,
    space: GenotypeSpace,
    costs: Array1<f64>,
    transmission: Array2<f64>,
    mating: Array2<f64>,
}

impl Model {
    pub fn new(parameters: Parameters) -> Self {
        let space = GenotypeSpace::new(N_LOCI);
        let costs = cost_vector(&space, &parameters);
        let transmission = transmission_matrix(&space, &parameters);
        let mating = mating_matrix(&space, &parameters.rho);
        Self {
            parameters,
            space,
            costs,
            transmission,
            mating,
        }
    }

    pub fn parameters(&self) -> &Parameters {
        &self.parameters
    }

    pub fn space(&self) -> &GenotypeSpace {
        &self.space
    }

    pub fn n_genotypes(&self) -> usize {
        self.space.len()
    }

    /// Fecundity retained by each host genotype, `C`.
    pub fn costs(&self) -> ArrayView1<'_, f64> {
        self.costs.view()
    }

    /// Host genotype by pathogen genotype transmission rates, `B`.
    pub fn transmission(&self) -> ArrayView2<'_, f64> {
        self.transmission.view()
    }

    /// Offspring distribution per (paternal, maternal) pairing, `M`.
    pub fn mating(&self) -> ArrayView2<'_, f64> {
        self.mating.view()
    }
}

/// Multiplicative fecundity of every genotype: the product of `1 - cost` over all resistance
/// alleles it carries.
fn cost_vector(space: &GenotypeSpace, parameters: &Parameters) -> Array1<f64> {
    space
        .iter()
        .map(|genotype| {
            let mut fecundity = 1.;
            if genotype.carries(GENERAL_LOCUS) {
                fecundity *= 1. - parameters.c_g;
            }
            if genotype.carries(SPECIFIC_LOCUS) {
                fecundity *= 1. - parameters.c_s;
            }
            fecundity
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ParameterName;

    #[test]
    fn costs() {
        let model = Model::new(Parameters::default());
        let expected = [1., 0.8, 0.9, 0.72, 1., 0.8, 0.9, 0.72];
        for (cost, expected) in model.costs().iter().zip(expected) {
            assert!((cost - expected).abs() < 1e-12);
        }
    }

    #[test]
    fn costs_within_unit_interval() {
        for c_g in [0., 0.1, 0.5, 0.99] {
            for c_s in [0., 0.2, 0.7, 0.99] {
                let parameters = Parameters::default()
                    .with(ParameterName::CostGeneral, c_g)
                    .with(ParameterName::CostSpecific, c_s);
                let model = Model::new(parameters);
                assert_eq!(model.costs()[0], 1.);
                assert!(model.costs().iter().all(|&c| c > 0. && c <= 1.));
            }
        }
    }

    #[test]
    fn shapes() {
        let model = Model::new(Parameters::default());
        assert_eq!(model.n_genotypes(), 8);
        assert_eq!(model.transmission().shape(), &[8, 3]);
        assert_eq!(model.mating().shape(), &[64, 8]);
    }

    #[test]
    fn rebuild_is_identical() {
        let first = Model::new(Parameters::default());
        let second = Model::new(Parameters::default());
        assert_eq!(first.costs(), second.costs());
        assert_eq!(first.transmission(), second.transmission());
        assert_eq!(first.mating(), second.mating());
    }
}
