//! Host genotype by pathogen genotype transmission rates.

use ndarray::Array2;

use super::genotypes::{GENERAL_LOCUS, GenotypeSpace, N_PATHOGENS, Pathogen, SPECIFIC_LOCUS};
use crate::config::{Parameters, Selection};

/// Build the transmission matrix `B` with one row per host genotype and one column per pathogen
/// genotype.
///
/// Starting from `beta` everywhere, the foreign column is discounted by `1 - nh`, general
/// resistance discounts the whole row by `1 - g` and specific resistance discounts the avirulent
/// column by `1 - s`. The virulence discount `1 - v` on the virulent column depends on the
/// selection regime: under soft selection it only applies on hosts without specific resistance,
/// under hard selection it applies on every host.
pub fn transmission_matrix(space: &GenotypeSpace, parameters: &Parameters) -> Array2<f64> {
    let avirulent = Pathogen::Avirulent.index();
    let virulent = Pathogen::Virulent.index();
    let foreign = Pathogen::Foreign.index();

    let mut transmission = Array2::from_elem((space.len(), N_PATHOGENS), parameters.beta);
    transmission
        .column_mut(foreign)
        .mapv_inplace(|rate| rate * (1. - parameters.nh));

    if parameters.sel == Selection::Hard {
        transmission
            .column_mut(virulent)
            .mapv_inplace(|rate| rate * (1. - parameters.v));
    }

    for (idx, host) in space.iter().enumerate() {
        let mut row = transmission.row_mut(idx);
        if host.carries(GENERAL_LOCUS) {
            row.mapv_inplace(|rate| rate * (1. - parameters.g));
        }

        if host.carries(SPECIFIC_LOCUS) {
            row[avirulent] *= 1. - parameters.s;
        } else if parameters.sel == Selection::Soft {
            row[virulent] *= 1. - parameters.v;
        }
    }

    transmission
}
