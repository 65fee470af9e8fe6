use ndarray::ArrayView1;

use crate::core::genotypes::{GenotypeSpace, Pathogen};

/// Derived allele frequency at every locus.
pub fn allele_frequencies(space: &GenotypeSpace, susceptible: ArrayView1<f64>) -> Vec<f64> {
    (0..space.n_loci())
        .map(|locus| space.allele_frequency(susceptible, locus))
        .collect()
}

/// Share of the avirulent pathogen among all infections.
pub fn avirulent_frequency(infected: ArrayView1<f64>) -> f64 {
    infected[Pathogen::Avirulent.index()] / infected.sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn allele_frequencies_per_locus() {
        let space = GenotypeSpace::new(3);
        let susceptible = array![1., 1., 0., 0., 2., 0., 0., 4.];
        let frequencies = allele_frequencies(&space, susceptible.view());
        assert_eq!(frequencies, vec![0.75, 0.5, 0.625]);
    }

    #[test]
    fn avirulent_share() {
        assert_eq!(avirulent_frequency(array![3., 1., 0.].view()), 0.75);
        assert!(avirulent_frequency(array![0., 0., 0.].view()).is_nan());
    }
}
