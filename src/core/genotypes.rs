//! Host and pathogen genotype spaces.
//!
//! Host genotypes are binary vectors over a fixed number of loci. The canonical ordering is the
//! lexicographic enumeration of `{0, 1}^n_loci` with the last locus varying fastest, so the
//! genotype at index `i` carries allele `(i >> (n_loci - 1 - locus)) & 1` at `locus`. Every
//! matrix and abundance vector in this crate is indexed by this ordering.

use derive_more::{Deref, Display};
use itertools::Itertools;
use ndarray::{Array2, ArrayView1, ArrayView2};
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::fmt;

/// Locus of the allele that modifies recombination between the resistance loci.
pub const MODIFIER_LOCUS: usize = 0;

/// Locus of the general resistance allele.
pub const GENERAL_LOCUS: usize = 1;

/// Locus of the specific resistance allele.
pub const SPECIFIC_LOCUS: usize = 2;

/// Number of host loci in the realized model.
pub const N_LOCI: usize = 3;

/// Number of pathogen genotypes.
pub const N_PATHOGENS: usize = 3;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Deref, Serialize, Deserialize)]
pub struct Genotype(SmallVec<[u8; 4]>);

impl Genotype {
    pub fn new(alleles: &[u8]) -> Self {
        Self(SmallVec::from_slice(alleles))
    }

    #[inline]
    pub fn carries(&self, locus: usize) -> bool {
        self.0[locus] == 1
    }

    /// Allele string, e.g. `011` for a genotype carrying both resistance alleles.
    pub fn label(&self) -> String {
        self.0.iter().map(|allele| allele.to_string()).collect()
    }
}

impl From<Vec<u8>> for Genotype {
    fn from(alleles: Vec<u8>) -> Self {
        Self(SmallVec::from_vec(alleles))
    }
}

impl fmt::Display for Genotype {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Pathogen genotypes, in the column order of the transmission matrix.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Display, Serialize, Deserialize)]
pub enum Pathogen {
    /// Recognized by the specific resistance allele.
    #[display("avirulent")]
    Avirulent,

    /// Evades specific resistance at a cost.
    #[display("virulent")]
    Virulent,

    /// Nonhost-restricted pathogen, only tracked to measure a hypothetical invasion.
    #[display("foreign")]
    Foreign,
}

impl Pathogen {
    pub const ALL: [Pathogen; N_PATHOGENS] =
        [Pathogen::Avirulent, Pathogen::Virulent, Pathogen::Foreign];

    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }
}

/// Ordered enumeration of all host genotypes.
#[derive(Clone, Debug, PartialEq)]
pub struct GenotypeSpace {
    n_loci: usize,
    genotypes: Vec<Genotype>,
}

impl GenotypeSpace {
    pub fn new(n_loci: usize) -> Self {
        let genotypes = (0..n_loci)
            .map(|_| 0u8..=1)
            .multi_cartesian_product()
            .map(Genotype::from)
            .collect();
        Self { n_loci, genotypes }
    }

    pub fn n_loci(&self) -> usize {
        self.n_loci
    }

    pub fn len(&self) -> usize {
        self.genotypes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.genotypes.is_empty()
    }

    pub fn get(&self, index: usize) -> &Genotype {
        &self.genotypes[index]
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Genotype> {
        self.genotypes.iter()
    }

    /// Position of a genotype in the canonical ordering.
    pub fn index_of(&self, genotype: &Genotype) -> Option<usize> {
        if genotype.len() != self.n_loci || genotype.iter().any(|&allele| allele > 1) {
            return None;
        }
        Some(
            genotype
                .iter()
                .fold(0, |index, &allele| (index << 1) | allele as usize),
        )
    }

    /// Indices of all genotypes carrying the derived allele at `locus`.
    pub fn carriers(&self, locus: usize) -> impl Iterator<Item = usize> + '_ {
        self.genotypes
            .iter()
            .enumerate()
            .filter(move |(_, genotype)| genotype.carries(locus))
            .map(|(index, _)| index)
    }

    /// Frequency of the derived allele at `locus` in a vector of genotype abundances.
    pub fn allele_frequency(&self, abundances: ArrayView1<f64>, locus: usize) -> f64 {
        let total = abundances.sum();
        self.carriers(locus).map(|idx| abundances[idx]).sum::<f64>() / total
    }

    /// Frequency of genotypes carrying the derived alleles at both loci.
    pub fn joint_frequency(
        &self,
        abundances: ArrayView1<f64>,
        locus_a: usize,
        locus_b: usize,
    ) -> f64 {
        let total = abundances.sum();
        self.carriers(locus_a)
            .filter(|&idx| self.genotypes[idx].carries(locus_b))
            .map(|idx| abundances[idx])
            .sum::<f64>()
            / total
    }

    /// Merge genotypes that only differ at `locus`.
    ///
    /// `abundances` has one row per genotype of this space (columns are typically time points).
    /// Returns the summed abundances together with the reduced genotype space.
    pub fn collapse_locus(
        &self,
        abundances: ArrayView2<f64>,
        locus: usize,
    ) -> (Array2<f64>, GenotypeSpace) {
        let reduced = GenotypeSpace::new(self.n_loci - 1);
        let mut collapsed = Array2::zeros((reduced.len(), abundances.ncols()));
        for (idx, genotype) in self.genotypes.iter().enumerate() {
            let mut alleles = genotype.0.clone();
            alleles.remove(locus);
            let target = reduced
                .index_of(&Genotype(alleles))
                .expect("reduced genotype is part of the reduced space");
            let mut row = collapsed.row_mut(target);
            row += &abundances.row(idx);
        }
        (collapsed, reduced)
    }
}

impl<'a> IntoIterator for &'a GenotypeSpace {
    type Item = &'a Genotype;
    type IntoIter = std::slice::Iter<'a, Genotype>;

    fn into_iter(self) -> Self::IntoIter {
        self.genotypes.iter()
    }
}
