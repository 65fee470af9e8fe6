//! This module contains the model and the numerical engine.

pub mod dynamics;
pub mod equilibrium;
pub mod genotypes;
pub mod integrator;
pub mod mating;
pub mod model;
pub mod transmission;

pub use dynamics::{Dynamics, Trajectory, simulate};
pub use equilibrium::{Eigenvalue, EquilibriumResult, find_equilibrium, integrate_to_equilibrium};
pub use genotypes::{Genotype, GenotypeSpace, Pathogen};
pub use integrator::{DormandPrince, IntegratorOptions, OdeSystem, Solution};
pub use model::Model;
