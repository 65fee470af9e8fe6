//! Fixed points of the population dynamics and their local stability.

use nalgebra::{DMatrix, DVector, Schur};
use ndarray::{Array1, ArrayView1, s};
use serde::{Deserialize, Serialize};

use super::dynamics::{Dynamics, initial_state, simulate};
use super::integrator::IntegratorOptions;
use super::model::Model;
use crate::errors::{CoevolutionError, Result};

const RESIDUAL_TOLERANCE: f64 = 1e-10;
const STEP_TOLERANCE: f64 = 1e-10;
const MAX_ITERATIONS: usize = 200;
const MIN_DAMPING: f64 = 1. / 1024.;
const MAX_SCHUR_ITERATIONS: usize = 10_000;

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq)]
pub struct Eigenvalue {
    pub re: f64,
    pub im: f64,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct EquilibriumResult {
    pub susceptible: Vec<f64>,
    pub infected: Vec<f64>,
    /// Eigenvalues of the full Jacobian at the returned state, empty if they could not be
    /// computed.
    pub eigenvalues: Vec<Eigenvalue>,
    /// Growth rate of the foreign pathogen when rare.
    pub invasion_rate: f64,
    /// All eigenvalues apart from the foreign pathogen coordinate have negative real part.
    pub stable: bool,
    pub converged: bool,
    /// Largest absolute entry of the right-hand side at the returned state.
    pub residual: f64,
    pub message: String,
}

/// Forward difference Jacobian of the right-hand side at `x`.
pub fn jacobian(dynamics: &Dynamics, x: ArrayView1<f64>) -> DMatrix<f64> {
    let dim = x.len();
    let f0 = dynamics.evaluate(x);
    let mut jacobian = DMatrix::zeros(dim, dim);
    let mut shifted = x.to_owned();
    for j in 0..dim {
        let h = f64::EPSILON.sqrt() * x[j].abs().max(1.);
        shifted[j] = x[j] + h;
        let f1 = dynamics.evaluate(shifted.view());
        shifted[j] = x[j];
        for i in 0..dim {
            jacobian[(i, j)] = (f1[i] - f0[i]) / h;
        }
    }
    jacobian
}

/// Eigenvalues of `matrix`, or `None` if the Schur decomposition does not converge.
fn eigenvalues(matrix: DMatrix<f64>) -> Option<Vec<Eigenvalue>> {
    if matrix.iter().any(|value| !value.is_finite()) {
        return None;
    }
    let schur = Schur::try_new(matrix, f64::EPSILON, MAX_SCHUR_ITERATIONS)?;
    Some(
        schur
            .complex_eigenvalues()
            .iter()
            .map(|value| Eigenvalue {
                re: value.re,
                im: value.im,
            })
            .collect(),
    )
}

/// Eigenvalues, foreign invasion rate and stability of a Jacobian whose coordinate `foreign`
/// belongs to the foreign pathogen.
pub fn classify(jacobian: &DMatrix<f64>, foreign: usize) -> (Vec<Eigenvalue>, f64, bool) {
    let all = eigenvalues(jacobian.clone()).unwrap_or_else(|| {
        log::warn!("Eigenvalues of the Jacobian are not available");
        Vec::new()
    });

    let resident = jacobian.clone().remove_row(foreign).remove_column(foreign);
    let stable = eigenvalues(resident)
        .is_some_and(|values| values.iter().all(|value| value.re < 0.));

    (all, jacobian[(foreign, foreign)], stable)
}

fn max_norm(values: &Array1<f64>) -> f64 {
    values
        .iter()
        .fold(0., |norm: f64, value| norm.max(value.abs()))
}

/// Refine `state` to a root of the right-hand side by damped Newton iteration.
///
/// Failure to converge is not an error: the best iterate is returned with `converged` unset and
/// the reason in `message`.
pub fn find_equilibrium(model: &Model, state: ArrayView1<f64>) -> Result<EquilibriumResult> {
    newton(model, state, MAX_ITERATIONS)
}

fn newton(
    model: &Model,
    state: ArrayView1<f64>,
    max_iterations: usize,
) -> Result<EquilibriumResult> {
    let n_genotypes = model.n_genotypes();
    if state.len() != n_genotypes + super::genotypes::N_PATHOGENS {
        return Err(CoevolutionError::InitializationError(format!(
            "State has length {} instead of {}",
            state.len(),
            n_genotypes + super::genotypes::N_PATHOGENS
        )));
    }
    let mut x = initial_state(
        model,
        state.slice(s![..n_genotypes]),
        state.slice(s![n_genotypes..]),
    )?;

    let dynamics = Dynamics::new(model);
    let dim = x.len();
    let mut f = dynamics.evaluate(x.view());
    let mut residual = max_norm(&f);
    let mut best = (x.clone(), residual);
    let mut converged = residual <= RESIDUAL_TOLERANCE;
    let mut message = String::from("Initial state is an equilibrium");
    let mut iterations = 0;

    while !converged {
        if iterations == max_iterations {
            message = format!("No convergence after {max_iterations} iterations");
            break;
        }
        iterations += 1;

        let rhs = DVector::from_iterator(dim, f.iter().map(|value| -value));
        let Some(step) = jacobian(&dynamics, x.view()).lu().solve(&rhs) else {
            message = format!("Singular Jacobian at iteration {iterations}");
            break;
        };
        let step = Array1::from_iter(step.iter().copied());

        // backtrack while the residual grows, full step if no damping helps
        let mut damping = 1.;
        let mut stalled = false;
        let (candidate, candidate_f, candidate_residual) = loop {
            let candidate = &x + &(&step * damping);
            let candidate_f = dynamics.evaluate(candidate.view());
            let candidate_residual = max_norm(&candidate_f);
            if candidate_residual < residual {
                break (candidate, candidate_f, candidate_residual);
            }
            if damping <= MIN_DAMPING {
                log::trace!("Backtracking stalled at iteration {iterations}, taking a full step");
                damping = 1.;
                stalled = true;
                let candidate = &x + &step;
                let candidate_f = dynamics.evaluate(candidate.view());
                let candidate_residual = max_norm(&candidate_f);
                break (candidate, candidate_f, candidate_residual);
            }
            damping *= 0.5;
        };
        if !candidate_residual.is_finite() {
            message = format!("Newton step left the finite range at iteration {iterations}");
            break;
        }

        let small_step = step
            .iter()
            .zip(x.iter())
            .all(|(dx, x)| (damping * dx).abs() <= STEP_TOLERANCE * x.abs().max(1.));
        x = candidate;
        f = candidate_f;
        residual = candidate_residual;
        if residual < best.1 {
            best = (x.clone(), residual);
        }

        if residual <= RESIDUAL_TOLERANCE || (small_step && !stalled) {
            converged = true;
            message = format!("Converged after {iterations} iterations");
        }
    }

    if converged {
        log::debug!("{message} with residual {residual:e}");
    } else {
        (x, residual) = best;
        log::warn!("Equilibrium search failed: {message} (residual {residual:e})");
    }

    let (eigenvalues, invasion_rate, stable) =
        classify(&jacobian(&dynamics, x.view()), dynamics.foreign_index());

    Ok(EquilibriumResult {
        susceptible: x.slice(s![..n_genotypes]).to_vec(),
        infected: x.slice(s![n_genotypes..]).to_vec(),
        eigenvalues,
        invasion_rate,
        stable,
        converged,
        residual,
        message,
    })
}

/// Integrate over `(0, horizon)` and refine the final state to an equilibrium.
pub fn integrate_to_equilibrium(
    model: &Model,
    susceptible: ArrayView1<f64>,
    infected: ArrayView1<f64>,
    horizon: f64,
    options: IntegratorOptions,
) -> Result<EquilibriumResult> {
    let trajectory = simulate(model, susceptible, infected, horizon, options)?;
    find_equilibrium(model, trajectory.last_state().view())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Parameters;
    use ndarray::array;

    fn monomorphic(abundance: f64) -> Array1<f64> {
        let mut state = Array1::zeros(11);
        state[0] = abundance;
        state
    }

    #[test]
    fn disease_free_monomorphic_equilibrium() {
        let model = Model::new(Parameters::default());
        let result = find_equilibrium(&model, monomorphic(500.).view()).unwrap();

        assert!(result.converged, "{}", result.message);
        // carrying capacity (b - mu) / k
        assert!((result.susceptible[0] - 800.).abs() < 1e-6);
        assert!(result.susceptible[1..].iter().all(|&s| s.abs() < 1e-9));
        assert!(result.infected.iter().all(|&i| i.abs() < 1e-12));

        // foreign pathogen grows at beta * (1 - nh) - mu on an uninfected susceptible population
        assert!((result.invasion_rate - (0.5 * 0.9 - 0.2)).abs() < 1e-5);
        // and so does the avirulent pathogen, so the disease free state is unstable
        assert!(!result.stable);
        assert_eq!(result.eigenvalues.len(), 11);
    }

    #[test]
    fn foreign_row_decouples_when_absent() {
        let model = Model::new(Parameters::default());
        let dynamics = Dynamics::new(&model);
        let mut state = monomorphic(300.);
        state[3] = 40.;
        state[8] = 20.;
        state[9] = 15.;
        let jacobian = jacobian(&dynamics, state.view());
        let foreign = dynamics.foreign_index();
        for j in 0..11 {
            if j != foreign {
                assert_eq!(jacobian[(foreign, j)], 0.);
            }
        }
    }

    #[test]
    fn jacobian_matches_linear_dynamics() {
        let parameters = Parameters {
            k: 0.,
            beta: 0.,
            ..Parameters::default()
        };
        let model = Model::new(parameters);
        let dynamics = Dynamics::new(&model);
        let state = monomorphic(100.);
        let jacobian = jacobian(&dynamics, state.view());
        // without transmission the infected classes only die
        for i in 8..11 {
            assert!((jacobian[(i, i)] + 0.2).abs() < 1e-9);
        }
        // a monomorphic population without costs grows at b - mu
        assert!((jacobian[(0, 0)] - 0.8).abs() < 1e-6);
    }

    #[test]
    fn classify_excludes_foreign_coordinate() {
        let jacobian = DMatrix::from_diagonal(&DVector::from_vec(vec![-1., -2., 0.5]));
        let (eigenvalues, invasion_rate, stable) = classify(&jacobian, 2);
        assert_eq!(eigenvalues.len(), 3);
        assert_eq!(invasion_rate, 0.5);
        assert!(stable);

        let jacobian = DMatrix::from_diagonal(&DVector::from_vec(vec![-1., 0.1, -3.]));
        let (_, invasion_rate, stable) = classify(&jacobian, 2);
        assert_eq!(invasion_rate, -3.);
        assert!(!stable);
    }

    #[test]
    fn complex_pair_is_reported() {
        let jacobian = DMatrix::from_row_slice(3, 3, &[-0.1, 1., 0., -1., -0.1, 0., 0., 0., -1.]);
        let (eigenvalues, _, stable) = classify(&jacobian, 2);
        assert!(stable);
        let complex: Vec<&Eigenvalue> = eigenvalues.iter().filter(|e| e.im != 0.).collect();
        assert_eq!(complex.len(), 2);
        for eigenvalue in complex {
            assert!((eigenvalue.re + 0.1).abs() < 1e-9);
            assert!((eigenvalue.im.abs() - 1.).abs() < 1e-9);
        }
    }

    #[test]
    fn extinct_hosts_are_rejected() {
        let model = Model::new(Parameters::default());
        let mut state = Array1::zeros(11);
        state[8] = 10.;
        assert!(matches!(
            find_equilibrium(&model, state.view()),
            Err(CoevolutionError::InitializationError(_))
        ));
        assert!(find_equilibrium(&model, array![1., 2.].view()).is_err());
    }

    #[test]
    fn integrate_then_refine() {
        let model = Model::new(Parameters::default());
        let susceptible = Array1::from_elem(8, 10.);
        let infected = array![10., 10., 0.];
        let result = integrate_to_equilibrium(
            &model,
            susceptible.view(),
            infected.view(),
            5000.,
            IntegratorOptions::default(),
        )
        .unwrap();

        assert!(result.converged, "{}", result.message);
        assert!(result.residual <= 1e-10);
        assert_eq!(result.eigenvalues.len(), 11);
        // the modifier is lost and both resident pathogens persist
        let expected = [72.8, 23.5, 213.3, 36.9];
        for (s, e) in result.susceptible.iter().zip(expected) {
            assert!((s - e).abs() < 0.1, "{:?}", result.susceptible);
        }
        assert!(result.susceptible[4..].iter().all(|&s| s.abs() < 1e-3));
        assert!((result.infected[0] - 159.7).abs() < 0.1, "{:?}", result.infected);
        assert!((result.infected[1] - 61.3).abs() < 0.1, "{:?}", result.infected);
        assert!(result.infected[2].abs() < 1e-12);
    }

    #[test]
    fn iteration_cap_returns_best_iterate() {
        let model = Model::new(Parameters::default());
        let dynamics = Dynamics::new(&model);
        let mut state = monomorphic(500.);
        state[8] = 10.;
        state[9] = 10.;
        let initial_residual = max_norm(&dynamics.evaluate(state.view()));

        let result = newton(&model, state.view(), 1).unwrap();
        assert!(!result.converged);
        assert_eq!(result.message, "No convergence after 1 iterations");
        assert!(result.residual <= initial_residual);

        let returned: Array1<f64> = result
            .susceptible
            .iter()
            .chain(result.infected.iter())
            .copied()
            .collect();
        let residual = max_norm(&dynamics.evaluate(returned.view()));
        assert!((residual - result.residual).abs() <= 1e-12 * residual.max(1.));
        assert!(result.residual > RESIDUAL_TOLERANCE);
    }
}
