//! Population dynamics of uninfected hosts per genotype and infected hosts per pathogen.
//!
//! The state vector is `X = [S, I]` where `S` holds uninfected host abundances in the canonical
//! genotype order and `I` holds infected host abundances per pathogen genotype. With
//! `N = ΣS + ΣI` and genotype frequencies `f = S / ΣS`:
//!
//! ```text
//! dS = b·ΣS·(vec((C ⊙ f) ⊗ f) · M) − S ⊙ (k·N + μ + B·I / N)
//! dI = I ⊙ (Bᵀ·S / N − μ)
//! ```
//!
//! The right-hand side is undefined when `ΣS = 0`.

use ndarray::{Array1, Array2, ArrayView1, ArrayViewMut1, Axis, Zip, s};

use super::genotypes::N_PATHOGENS;
use super::integrator::{DormandPrince, IntegratorOptions, OdeSystem};
use super::model::Model;
use crate::errors::{CoevolutionError, Result};

pub struct Dynamics<'a> {
    model: &'a Model,
}

impl<'a> Dynamics<'a> {
    pub fn new(model: &'a Model) -> Self {
        Self { model }
    }

    pub fn model(&self) -> &Model {
        self.model
    }

    /// Index of the foreign pathogen in the state vector.
    pub fn foreign_index(&self) -> usize {
        self.model.n_genotypes() + N_PATHOGENS - 1
    }

    /// Right-hand side as a new vector.
    pub fn evaluate(&self, x: ArrayView1<f64>) -> Array1<f64> {
        let mut dx = Array1::zeros(x.len());
        self.derivative(0., x, dx.view_mut());
        dx
    }
}

impl OdeSystem for Dynamics<'_> {
    fn dimension(&self) -> usize {
        self.model.n_genotypes() + N_PATHOGENS
    }

    fn derivative(&self, _t: f64, x: ArrayView1<f64>, dx: ArrayViewMut1<f64>) {
        let parameters = self.model.parameters();
        let n_genotypes = self.model.n_genotypes();
        let transmission = self.model.transmission();

        let (susceptible, infected) = x.split_at(Axis(0), n_genotypes);
        let total_susceptible = susceptible.sum();
        let total = total_susceptible + infected.sum();

        let frequencies = &susceptible / total_susceptible;
        let fecund = &frequencies * &self.model.costs();

        // flattened in the row layout of the mating matrix: paternal * |G| + maternal
        let pair_frequencies: Array1<f64> = fecund
            .iter()
            .flat_map(|&paternal| frequencies.iter().map(move |&maternal| paternal * maternal))
            .collect();
        let births = pair_frequencies.dot(&self.model.mating()) * (parameters.b * total_susceptible);
        let force_of_infection = transmission.dot(&infected) / total;
        let infection_rates = transmission.t().dot(&susceptible) / total;
        let mortality = parameters.k * total + parameters.mu;

        let (ds, di) = dx.split_at(Axis(0), n_genotypes);
        Zip::from(ds)
            .and(&births)
            .and(&susceptible)
            .and(&force_of_infection)
            .for_each(|d, &birth, &s, &force| *d = birth - s * (mortality + force));
        Zip::from(di)
            .and(&infected)
            .and(&infection_rates)
            .for_each(|d, &i, &rate| *d = i * (rate - parameters.mu));
    }
}

/// Abundances over time as returned by [`simulate`].
#[derive(Clone, Debug)]
pub struct Trajectory {
    pub times: Array1<f64>,
    /// Uninfected host abundances, one row per genotype and one column per time point.
    pub susceptible: Array2<f64>,
    /// Infected host abundances, one row per pathogen genotype and one column per time point.
    pub infected: Array2<f64>,
}

impl Trajectory {
    pub fn len(&self) -> usize {
        self.times.len()
    }

    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }

    /// State vector `[S, I]` at the last time point.
    pub fn last_state(&self) -> Array1<f64> {
        let last = self.len() - 1;
        self.susceptible
            .column(last)
            .iter()
            .chain(self.infected.column(last).iter())
            .copied()
            .collect()
    }

    pub fn final_susceptible(&self) -> ArrayView1<'_, f64> {
        self.susceptible.column(self.len() - 1)
    }

    pub fn final_infected(&self) -> ArrayView1<'_, f64> {
        self.infected.column(self.len() - 1)
    }

    /// Total abundance of all hosts at every time point.
    pub fn total_abundance(&self) -> Array1<f64> {
        self.susceptible.sum_axis(Axis(0)) + self.infected.sum_axis(Axis(0))
    }

    /// Smallest abundance of any class at any time point.
    pub fn min_abundance(&self) -> f64 {
        self.susceptible
            .iter()
            .chain(self.infected.iter())
            .copied()
            .fold(f64::INFINITY, f64::min)
    }
}

/// Check an initial state and join it into a single state vector.
pub fn initial_state(
    model: &Model,
    susceptible: ArrayView1<f64>,
    infected: ArrayView1<f64>,
) -> Result<Array1<f64>> {
    if susceptible.len() != model.n_genotypes() || infected.len() != N_PATHOGENS {
        return Err(CoevolutionError::InitializationError(format!(
            "Initial state has shape ({}, {}) instead of ({}, {})",
            susceptible.len(),
            infected.len(),
            model.n_genotypes(),
            N_PATHOGENS
        )));
    }
    if susceptible.sum() <= 0. {
        return Err(CoevolutionError::InitializationError(
            "Initial uninfected host population must be positive".to_string(),
        ));
    }
    Ok(susceptible
        .iter()
        .chain(infected.iter())
        .copied()
        .collect())
}

/// Integrate the model from the given initial abundances over `(0, horizon)`.
pub fn simulate(
    model: &Model,
    susceptible: ArrayView1<f64>,
    infected: ArrayView1<f64>,
    horizon: f64,
    options: IntegratorOptions,
) -> Result<Trajectory> {
    let x0 = initial_state(model, susceptible, infected)?;
    let dynamics = Dynamics::new(model);
    let solution = DormandPrince::new(&dynamics, options).integrate(0., horizon, x0.view())?;

    let n_genotypes = model.n_genotypes();
    let states = solution.states.t();
    let trajectory = Trajectory {
        times: solution.times,
        susceptible: states.slice(s![..n_genotypes, ..]).to_owned(),
        infected: states.slice(s![n_genotypes.., ..]).to_owned(),
    };

    let min_abundance = trajectory.min_abundance();
    if min_abundance < 0. {
        log::warn!("Trajectory reached negative abundance {min_abundance:e}");
    }
    log::info!(
        "Simulated {} time points up to t={}",
        trajectory.len(),
        horizon
    );

    Ok(trajectory)
}
