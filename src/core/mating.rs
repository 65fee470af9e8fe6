//! Offspring genotype distribution of every parental pairing.
//!
//! An offspring inherits each locus from one of its two parents. An inheritance path is a binary
//! vector over the loci, `0` selecting the paternal and `1` the maternal allele. The modifier locus
//! and the first resistance locus are drawn independently with probability one half. Every
//! further locus is inherited from the same parent as the previous locus unless a crossover
//! occurs between them. The crossover probability is the recombination rate selected by the
//! maternal modifier allele.
//!
//! The three way distribution over (paternal, maternal, offspring) genotypes is stored as a matrix
//! of shape `(|G|², |G|)`. Row `paternal * |G| + maternal` holds the offspring distribution of
//! that pairing, so a row vector of pairing frequencies flattened in the same row major order can
//! be multiplied with it directly.

use ndarray::Array2;

use super::genotypes::{Genotype, GenotypeSpace, MODIFIER_LOCUS};
use crate::config::Recombination;

/// Probability of each inheritance path for either maternal modifier allele.
fn path_probabilities(paths: &GenotypeSpace, recombination: &Recombination) -> [Vec<f64>; 2] {
    [0u8, 1].map(|modifier_allele| {
        let rate = recombination.rate(modifier_allele);
        paths
            .iter()
            .map(|path| {
                (0..paths.n_loci())
                    .map(|locus| match locus {
                        0 | 1 => 0.5,
                        _ if path[locus] == path[locus - 1] => 1. - rate,
                        _ => rate,
                    })
                    .product::<f64>()
            })
            .collect()
    })
}

/// Build the mating matrix `M` for all ordered (paternal, maternal) pairs of `space`.
pub fn mating_matrix(space: &GenotypeSpace, recombination: &Recombination) -> Array2<f64> {
    let n_genotypes = space.len();
    let paths = GenotypeSpace::new(space.n_loci());
    let probabilities = path_probabilities(&paths, recombination);

    let mut mating = Array2::zeros((n_genotypes * n_genotypes, n_genotypes));
    for (paternal_idx, paternal) in space.iter().enumerate() {
        for (maternal_idx, maternal) in space.iter().enumerate() {
            let path_probability = &probabilities[maternal[MODIFIER_LOCUS] as usize];
            let mut row = mating.row_mut(paternal_idx * n_genotypes + maternal_idx);
            for (path_idx, path) in paths.iter().enumerate() {
                let offspring: Vec<u8> = path
                    .iter()
                    .zip(paternal.iter().zip(maternal.iter()))
                    .map(|(&origin, (&p, &m))| if origin == 0 { p } else { m })
                    .collect();
                let offspring_idx = space
                    .index_of(&Genotype::from(offspring))
                    .expect("offspring is part of the genotype space");
                row[offspring_idx] += path_probability[path_idx];
            }
        }
    }

    log::debug!(
        "Built mating matrix of shape {:?} with recombination rates {:?}",
        mating.shape(),
        recombination.rates()
    );

    mating
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::genotypes::{GENERAL_LOCUS, SPECIFIC_LOCUS};

    fn pair_row(space: &GenotypeSpace, paternal: &[u8], maternal: &[u8]) -> usize {
        let paternal = space.index_of(&Genotype::new(paternal)).unwrap();
        let maternal = space.index_of(&Genotype::new(maternal)).unwrap();
        paternal * space.len() + maternal
    }

    #[test]
    fn shape() {
        let space = GenotypeSpace::new(3);
        let mating = mating_matrix(&space, &Recombination::default());
        assert_eq!(mating.shape(), &[64, 8]);
    }

    #[test]
    fn rows_are_distributions() {
        for n_loci in 1..=4 {
            let space = GenotypeSpace::new(n_loci);
            for recombination in [
                Recombination::Uniform(0.),
                Recombination::Uniform(0.5),
                Recombination::Modified([0.05, 0.]),
                Recombination::Modified([0.3, 0.1]),
            ] {
                let mating = mating_matrix(&space, &recombination);
                for row in mating.rows() {
                    assert!((row.sum() - 1.).abs() < 1e-9);
                    assert!(row.iter().all(|&p| p >= 0.));
                }
            }
        }
    }

    #[test]
    fn identical_parents_breed_true() {
        let space = GenotypeSpace::new(3);
        let mating = mating_matrix(&space, &Recombination::Modified([0.3, 0.1]));
        for idx in 0..space.len() {
            let row = mating.row(idx * space.len() + idx);
            assert!((row[idx] - 1.).abs() < 1e-12);
        }
    }

    #[test]
    fn no_recombination_keeps_resistance_block() {
        let space = GenotypeSpace::new(3);
        let mating = mating_matrix(&space, &Recombination::Modified([0., 0.]));
        for (paternal_idx, paternal) in space.iter().enumerate() {
            for (maternal_idx, maternal) in space.iter().enumerate() {
                let row = mating.row(paternal_idx * space.len() + maternal_idx);
                for (offspring_idx, &p) in row.iter().enumerate() {
                    if p == 0. {
                        continue;
                    }
                    let offspring = space.get(offspring_idx);
                    let block = |g: &Genotype| (g[GENERAL_LOCUS], g[SPECIFIC_LOCUS]);
                    assert!(block(offspring) == block(paternal) || block(offspring) == block(maternal));
                }
            }
        }

        // the same modifier allele but different resistance blocks leaves two offspring types
        let row = mating.row(pair_row(&space, &[0, 1, 1], &[0, 0, 0]));
        let nonzero: Vec<usize> = row
            .iter()
            .enumerate()
            .filter(|(_, p)| **p > 0.)
            .map(|(idx, _)| idx)
            .collect();
        assert_eq!(nonzero, vec![0, 3]);
        assert!((row[0] - 0.5).abs() < 1e-12);
        assert!((row[3] - 0.5).abs() < 1e-12);
    }

    #[test]
    fn maternal_modifier_selects_rate() {
        let space = GenotypeSpace::new(3);
        let mating = mating_matrix(&space, &Recombination::Modified([0.2, 0.]));

        // G s x g S with maternal modifier 0: recombinants GS and gs appear at rate 0.2
        let row = mating.row(pair_row(&space, &[0, 1, 0], &[0, 0, 1]));
        assert!((row[space.index_of(&Genotype::new(&[0, 1, 1])).unwrap()] - 0.1).abs() < 1e-12);
        assert!((row[space.index_of(&Genotype::new(&[0, 0, 0])).unwrap()] - 0.1).abs() < 1e-12);
        assert!((row[space.index_of(&Genotype::new(&[0, 1, 0])).unwrap()] - 0.4).abs() < 1e-12);

        // the same cross with maternal modifier 1 does not recombine
        let row = mating.row(pair_row(&space, &[1, 1, 0], &[1, 0, 1]));
        assert_eq!(row[space.index_of(&Genotype::new(&[1, 1, 1])).unwrap()], 0.);
        assert_eq!(row[space.index_of(&Genotype::new(&[1, 0, 0])).unwrap()], 0.);
        assert!((row[space.index_of(&Genotype::new(&[1, 1, 0])).unwrap()] - 0.5).abs() < 1e-12);
    }

    #[test]
    fn rebuild_is_identical() {
        let space = GenotypeSpace::new(3);
        let recombination = Recombination::Modified([0.05, 0.05]);
        assert_eq!(
            mating_matrix(&space, &recombination),
            mating_matrix(&space, &recombination)
        );
    }
}
