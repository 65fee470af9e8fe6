use ndarray::ArrayView1;

use crate::core::genotypes::{GENERAL_LOCUS, GenotypeSpace, SPECIFIC_LOCUS};

/// Loci with an allele closer than this to fixation are reported as unlinked.
const MIN_FREQUENCY: f64 = 1e-2;

/// Normalized disequilibrium `D'` from the allele frequencies `p`, `q` at two loci and the
/// frequency `joint` of carriers of both alleles.
///
/// `D = joint - p q` is divided by the largest value of the same sign that the marginal
/// frequencies allow, so `D'` lies in `[-1, 1]` and keeps the sign of `D`.
pub fn normalized_disequilibrium(p: f64, q: f64, joint: f64) -> f64 {
    let min_frequency = p.min(q).min(1. - p).min(1. - q);
    // 1 - 0.99 rounds above 0.01
    if min_frequency <= MIN_FREQUENCY + 1e-12 {
        return 0.;
    }

    let d = joint - p * q;
    if d > 0. {
        d / (p * (1. - q)).min((1. - p) * q)
    } else if d < 0. {
        d / (p * q).min((1. - p) * (1. - q))
    } else {
        0.
    }
}

/// `D'` between general and specific resistance in a vector of host genotype abundances.
pub fn linkage_disequilibrium(space: &GenotypeSpace, susceptible: ArrayView1<f64>) -> f64 {
    normalized_disequilibrium(
        space.allele_frequency(susceptible, GENERAL_LOCUS),
        space.allele_frequency(susceptible, SPECIFIC_LOCUS),
        space.joint_frequency(susceptible, GENERAL_LOCUS, SPECIFIC_LOCUS),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn bounded_on_a_grid() {
        let steps = 40;
        for i in 1..steps {
            for j in 1..steps {
                let p = i as f64 / steps as f64;
                let q = j as f64 / steps as f64;
                let lower = (p + q - 1.).max(0.);
                let upper = p.min(q);
                for k in 0..=steps {
                    let joint = lower + (upper - lower) * k as f64 / steps as f64;
                    let d = normalized_disequilibrium(p, q, joint);
                    assert!((-1. - 1e-12..=1. + 1e-12).contains(&d), "{p} {q} {joint} {d}");
                }
            }
        }
    }

    #[test]
    fn near_fixation_is_zero() {
        assert_eq!(normalized_disequilibrium(0.005, 0.5, 0.005), 0.);
        assert_eq!(normalized_disequilibrium(0.5, 0.995, 0.5), 0.);
        assert_eq!(normalized_disequilibrium(0.01, 0.5, 0.01), 0.);
        assert_eq!(normalized_disequilibrium(0.4, 0.99, 0.4), 0.);
        assert_eq!(normalized_disequilibrium(0.99, 0.5, 0.5), 0.);
        assert_eq!(normalized_disequilibrium(0.99, 0.99, 0.99), 0.);
        assert!(normalized_disequilibrium(0.98, 0.5, 0.5) > 0.);
    }

    #[test]
    fn coupling_and_repulsion() {
        let space = GenotypeSpace::new(3);
        // only 000 and 011
        let coupled = array![5., 0., 0., 5., 0., 0., 0., 0.];
        assert!((linkage_disequilibrium(&space, coupled.view()) - 1.).abs() < 1e-12);
        // only 001 and 010, spread over both modifier alleles
        let repulsed = array![0., 2., 3., 0., 0., 3., 2., 0.];
        assert!((linkage_disequilibrium(&space, repulsed.view()) + 1.).abs() < 1e-12);
    }

    #[test]
    fn linkage_equilibrium_is_zero() {
        let space = GenotypeSpace::new(3);
        // general at 0.3 and specific at 0.6, independently
        let (p, q) = (0.3, 0.6);
        let abundances = array![
            (1. - p) * (1. - q),
            (1. - p) * q,
            p * (1. - q),
            p * q,
            0.,
            0.,
            0.,
            0.
        ];
        assert!(linkage_disequilibrium(&space, abundances.view()).abs() < 1e-12);
    }
}
