//! Adaptive explicit Runge-Kutta integration.
//!
//! Implements the Dormand-Prince 5(4) embedded pair with first-same-as-last stages and a
//! standard local error controller on a mixed absolute and relative tolerance.

use ndarray::{Array1, Array2, ArrayView1, ArrayViewMut1};

use crate::config::Tolerances;
use crate::errors::{CoevolutionError, Result};

/// An autonomous or time dependent system of ordinary differential equations.
pub trait OdeSystem {
    /// Number of state variables.
    fn dimension(&self) -> usize;

    /// Write `dx/dt` evaluated at `(t, x)` into `dx`.
    fn derivative(&self, t: f64, x: ArrayView1<f64>, dx: ArrayViewMut1<f64>);
}

const NODES: [f64; 7] = [0., 1. / 5., 3. / 10., 4. / 5., 8. / 9., 1., 1.];

const COUPLING: [[f64; 6]; 7] = [
    [0., 0., 0., 0., 0., 0.],
    [1. / 5., 0., 0., 0., 0., 0.],
    [3. / 40., 9. / 40., 0., 0., 0., 0.],
    [44. / 45., -56. / 15., 32. / 9., 0., 0., 0.],
    [
        19372. / 6561.,
        -25360. / 2187.,
        64448. / 6561.,
        -212. / 729.,
        0.,
        0.,
    ],
    [
        9017. / 3168.,
        -355. / 33.,
        46732. / 5247.,
        49. / 176.,
        -5103. / 18656.,
        0.,
    ],
    [
        35. / 384.,
        0.,
        500. / 1113.,
        125. / 192.,
        -2187. / 6784.,
        11. / 84.,
    ],
];

/// Difference between the fifth and the embedded fourth order weights.
const ERROR_WEIGHTS: [f64; 7] = [
    71. / 57600.,
    0.,
    -71. / 16695.,
    71. / 1920.,
    -17253. / 339200.,
    22. / 525.,
    -1. / 40.,
];

const SAFETY: f64 = 0.9;
const MIN_FACTOR: f64 = 0.2;
const MAX_FACTOR: f64 = 10.;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct IntegratorOptions {
    pub rtol: f64,
    pub atol: f64,
    pub max_step: Option<f64>,
    pub max_steps: usize,
}

impl IntegratorOptions {
    pub fn new(tolerances: &Tolerances, max_step: Option<f64>) -> Self {
        Self {
            rtol: tolerances.rtol,
            atol: tolerances.atol,
            max_step,
            ..Self::default()
        }
    }
}

impl Default for IntegratorOptions {
    fn default() -> Self {
        let tolerances = Tolerances::default();
        Self {
            rtol: tolerances.rtol,
            atol: tolerances.atol,
            max_step: None,
            max_steps: 10_000_000,
        }
    }
}

/// States at every accepted step, one row per time point.
#[derive(Clone, Debug)]
pub struct Solution {
    pub times: Array1<f64>,
    pub states: Array2<f64>,
}

pub struct DormandPrince<'a, S: OdeSystem> {
    system: &'a S,
    options: IntegratorOptions,
}

impl<'a, S: OdeSystem> DormandPrince<'a, S> {
    pub fn new(system: &'a S, options: IntegratorOptions) -> Self {
        Self { system, options }
    }

    /// Integrate from `t0` to `t1` starting at `x0`.
    pub fn integrate(&self, t0: f64, t1: f64, x0: ArrayView1<f64>) -> Result<Solution> {
        let dim = self.system.dimension();
        if x0.len() != dim {
            return Err(CoevolutionError::InitializationError(format!(
                "Initial state has length {} instead of {}",
                x0.len(),
                dim
            )));
        }
        if t1 < t0 {
            return Err(CoevolutionError::InitializationError(format!(
                "Integration interval ({t0}, {t1}) is reversed"
            )));
        }

        let mut t = t0;
        let mut x = x0.to_owned();
        let mut x_new = Array1::zeros(dim);
        let mut stage = Array1::zeros(dim);
        let mut error = Array1::zeros(dim);
        let mut k: [Array1<f64>; 7] = std::array::from_fn(|_| Array1::zeros(dim));

        let mut times = vec![t];
        let mut data = x.to_vec();

        self.system.derivative(t, x.view(), k[0].view_mut());
        let mut h = if t1 > t0 {
            self.initial_step(t0, x.view(), k[0].view(), t1 - t0)
        } else {
            0.
        };

        let mut n_accepted = 0;
        let mut n_rejected = 0;
        let mut rejected_last = false;

        while t < t1 {
            if n_accepted + n_rejected >= self.options.max_steps {
                return Err(CoevolutionError::IntegrationError(format!(
                    "Step budget of {} exhausted at t={t}",
                    self.options.max_steps
                )));
            }

            if let Some(max_step) = self.options.max_step {
                h = h.min(max_step);
            }
            let remaining = t1 - t;
            let last = h >= remaining;
            if last {
                h = remaining;
            } else if h <= 16. * f64::EPSILON * t.abs().max(1.) {
                return Err(CoevolutionError::IntegrationError(format!(
                    "Step size underflow at t={t} (h={h:e})"
                )));
            }

            for s in 1..7 {
                stage.assign(&x);
                for (j, &a) in COUPLING[s][..s].iter().enumerate() {
                    if a != 0. {
                        stage.scaled_add(h * a, &k[j]);
                    }
                }
                if s == 6 {
                    x_new.assign(&stage);
                }
                self.system
                    .derivative(t + NODES[s] * h, stage.view(), k[s].view_mut());
            }

            error.fill(0.);
            for (j, &e) in ERROR_WEIGHTS.iter().enumerate() {
                if e != 0. {
                    error.scaled_add(h * e, &k[j]);
                }
            }
            let error_norm = self.error_norm(x.view(), x_new.view(), error.view());

            if error_norm <= 1. {
                // the final step lands on t1 exactly
                t = if last { t1 } else { t + h };
                std::mem::swap(&mut x, &mut x_new);
                k.swap(0, 6);
                n_accepted += 1;

                if x.iter().any(|v| !v.is_finite()) {
                    return Err(CoevolutionError::IntegrationError(format!(
                        "State became non-finite at t={t}"
                    )));
                }
                times.push(t);
                data.extend(x.iter());

                let mut factor = if error_norm == 0. {
                    MAX_FACTOR
                } else {
                    (SAFETY * error_norm.powf(-0.2)).clamp(MIN_FACTOR, MAX_FACTOR)
                };
                if rejected_last {
                    factor = factor.min(1.);
                }
                rejected_last = false;
                h *= factor;
            } else {
                n_rejected += 1;
                rejected_last = true;
                h *= (SAFETY * error_norm.powf(-0.2)).max(MIN_FACTOR);
            }
        }

        log::debug!(
            "Integrated ({t0}, {t1}) with {n_accepted} accepted and {n_rejected} rejected steps"
        );

        let n_points = times.len();
        let states = Array2::from_shape_vec((n_points, dim), data)
            .map_err(|err| CoevolutionError::IntegrationError(format!("{}", err)))?;
        Ok(Solution {
            times: Array1::from_vec(times),
            states,
        })
    }

    fn scale(&self, x: ArrayView1<f64>, x_new: ArrayView1<f64>) -> Array1<f64> {
        ndarray::Zip::from(&x)
            .and(&x_new)
            .map_collect(|a, b| self.options.atol + self.options.rtol * a.abs().max(b.abs()))
    }

    fn error_norm(
        &self,
        x: ArrayView1<f64>,
        x_new: ArrayView1<f64>,
        error: ArrayView1<f64>,
    ) -> f64 {
        let scaled = &error / &self.scale(x, x_new);
        rms(scaled.view())
    }

    /// Starting step size following Hairer, Nørsett and Wanner.
    fn initial_step(&self, t0: f64, x0: ArrayView1<f64>, f0: ArrayView1<f64>, span: f64) -> f64 {
        let scale = self.scale(x0, x0);
        let d0 = rms((&x0 / &scale).view());
        let d1 = rms((&f0 / &scale).view());
        let h0 = if d0 < 1e-5 || d1 < 1e-5 {
            1e-6
        } else {
            0.01 * d0 / d1
        };

        let x1 = &x0 + &(&f0 * h0);
        let mut f1 = Array1::zeros(x0.len());
        self.system.derivative(t0 + h0, x1.view(), f1.view_mut());
        let d2 = rms(((&f1 - &f0) / &scale).view()) / h0;

        let h1 = if d1.max(d2) <= 1e-15 {
            (h0 * 1e-3).max(1e-6)
        } else {
            (0.01 / d1.max(d2)).powf(0.2)
        };
        (100. * h0).min(h1).min(span)
    }
}

fn rms(values: ArrayView1<f64>) -> f64 {
    if values.is_empty() {
        return 0.;
    }
    (values.mapv(|v| v * v).sum() / values.len() as f64).sqrt()
}
