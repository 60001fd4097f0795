use serde::{Deserialize, Serialize};
use tracing::{debug, trace, warn};

use super::objective::{vec_dot, Objective};
use crate::config::SolverSettings;
use crate::error::MarkowitzError;
use crate::MarkowitzResult;

const INITIAL_STEP: f64 = 1.0;
const MAX_STEP: f64 = 1e6;
const MIN_STEP: f64 = 1e-14;
/// Relative slack on the sufficient-decrease test, so rounding in the
/// objective cannot stall the line search near the optimum.
const DECREASE_SLACK: f64 = 1e-14;
const PROJECTION_ITERATIONS: usize = 200;
/// Stationarity measure below which a step without representable decrease
/// counts as convergence. Objective values carry about 1e-16 relative
/// precision, so weights are only resolved to about its square root.
const STALL_DELTA: f64 = 1e-6;

// ---------------------------------------------------------------------------
// Constraints
// ---------------------------------------------------------------------------

/// Budget and per-asset box constraints: `Σw = budget`, `lower <= w_i <= upper`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WeightConstraints {
    pub budget: f64,
    pub lower: f64,
    pub upper: f64,
}

impl Default for WeightConstraints {
    fn default() -> Self {
        WeightConstraints::long_only()
    }
}

impl WeightConstraints {
    /// Fully invested, no shorting, no leverage.
    pub fn long_only() -> Self {
        WeightConstraints {
            budget: 1.0,
            lower: 0.0,
            upper: 1.0,
        }
    }

    /// The feasible set for `n` assets must be non-empty.
    pub fn validate(&self, n: usize) -> MarkowitzResult<()> {
        if n == 0 {
            return Err(MarkowitzError::DegenerateInput(
                "At least one asset required".into(),
            ));
        }
        if self.lower > self.upper {
            return Err(MarkowitzError::config(
                "constraints",
                format!("lower bound {} exceeds upper bound {}", self.lower, self.upper),
            ));
        }
        let nf = n as f64;
        if self.budget < nf * self.lower || self.budget > nf * self.upper {
            return Err(MarkowitzError::config(
                "constraints",
                format!(
                    "budget {} unreachable with {} assets in [{}, {}]",
                    self.budget, n, self.lower, self.upper
                ),
            ));
        }
        Ok(())
    }

    /// Whether `weights` satisfies the constraints within `tolerance`.
    pub fn is_satisfied(&self, weights: &[f64], tolerance: f64) -> bool {
        let total: f64 = weights.iter().sum();
        (total - self.budget).abs() <= tolerance
            && weights
                .iter()
                .all(|w| w.is_finite() && *w >= self.lower - tolerance && *w <= self.upper + tolerance)
    }

    /// Euclidean projection onto the feasible set.
    ///
    /// Finds the shift `tau` with `Σ clamp(v_i - tau, lower, upper) = budget`
    /// by bisection.
    pub fn project(&self, v: &[f64]) -> Vec<f64> {
        if v.len() == 1 {
            return vec![self.budget];
        }
        let clamped_sum = |tau: f64| -> f64 {
            v.iter()
                .map(|x| (x - tau).clamp(self.lower, self.upper))
                .sum()
        };
        let v_min = v.iter().copied().fold(f64::INFINITY, f64::min);
        let v_max = v.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        // clamped_sum(lo) = n * upper >= budget, clamped_sum(hi) = n * lower <= budget
        let mut lo = v_min - self.upper;
        let mut hi = v_max - self.lower;
        for _ in 0..PROJECTION_ITERATIONS {
            let mid = 0.5 * (lo + hi);
            if mid <= lo || mid >= hi {
                break;
            }
            if clamped_sum(mid) > self.budget {
                lo = mid;
            } else {
                hi = mid;
            }
        }
        let tau = 0.5 * (lo + hi);
        v.iter()
            .map(|x| (x - tau).clamp(self.lower, self.upper))
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Solver interface
// ---------------------------------------------------------------------------

/// Outcome of a local minimization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Minimization {
    pub weights: Vec<f64>,
    /// Objective value at `weights`, in the objective's own direction.
    pub value: f64,
    pub iterations: u32,
    /// Size of the last projected-gradient step measure.
    pub last_delta: f64,
    pub converged: bool,
}

/// A constrained local optimizer over weight vectors.
pub trait Solver: Sync {
    /// Minimize the oriented objective from `initial` subject to `constraints`.
    ///
    /// A run that exhausts its budget is reported with `converged = false`,
    /// not as an error; errors are reserved for inputs the solver cannot
    /// start from.
    fn minimize(
        &self,
        objective: &dyn Objective,
        initial: &[f64],
        constraints: &WeightConstraints,
    ) -> MarkowitzResult<Minimization>;
}

/// Projected-gradient descent with backtracking line search.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProjectedGradient {
    pub settings: SolverSettings,
}

impl ProjectedGradient {
    pub fn new(settings: SolverSettings) -> Self {
        ProjectedGradient { settings }
    }
}

impl Solver for ProjectedGradient {
    fn minimize(
        &self,
        objective: &dyn Objective,
        initial: &[f64],
        constraints: &WeightConstraints,
    ) -> MarkowitzResult<Minimization> {
        constraints.validate(initial.len())?;
        let direction = objective.direction();
        let eval = |w: &[f64]| -> Option<f64> {
            objective
                .value(w)
                .map(|v| direction.orient(v))
                .filter(|v| v.is_finite())
        };
        let oriented_gradient = |w: &[f64]| -> MarkowitzResult<Vec<f64>> {
            let g = objective.gradient(w).ok_or_else(|| {
                MarkowitzError::DegenerateInput(format!(
                    "{} gradient is undefined at the current weights",
                    objective.name()
                ))
            })?;
            if g.iter().any(|x| !x.is_finite()) {
                return Err(MarkowitzError::DegenerateInput(format!(
                    "{} gradient is not finite",
                    objective.name()
                )));
            }
            Ok(g.into_iter().map(|x| direction.orient(x)).collect())
        };

        let mut w = constraints.project(initial);
        let mut f = eval(&w).ok_or_else(|| {
            MarkowitzError::DegenerateInput(format!(
                "{} is undefined at the initial weights (zero-risk portfolio?)",
                objective.name()
            ))
        })?;
        let mut step = INITIAL_STEP;
        let mut last_delta = f64::INFINITY;

        for iteration in 0..self.settings.max_iterations {
            let g = oriented_gradient(&w)?;

            let projected = constraints.project(&axpy(&w, -1.0, &g));
            last_delta = inf_norm_diff(&projected, &w);
            if last_delta <= self.settings.tolerance {
                debug!(
                    objective = objective.name(),
                    iterations = iteration,
                    value = direction.orient(f),
                    "solver converged"
                );
                return Ok(Minimization {
                    weights: w,
                    value: direction.orient(f),
                    iterations: iteration,
                    last_delta,
                    converged: true,
                });
            }

            let accepted = loop {
                let candidate = constraints.project(&axpy(&w, -step, &g));
                let d: Vec<f64> = candidate.iter().zip(w.iter()).map(|(c, x)| c - x).collect();
                if let Some(fc) = eval(&candidate) {
                    let model = f + vec_dot(&g, &d) + vec_dot(&d, &d) / (2.0 * step);
                    if fc <= model + DECREASE_SLACK * (1.0 + f.abs()) {
                        break Some((candidate, fc));
                    }
                }
                step *= 0.5;
                if step < MIN_STEP {
                    break None;
                }
            };

            // Near a stationary point the objective stops resolving changes in
            // the weights; a step with no representable decrease ends the run.
            let resolved = match accepted {
                Some((ref candidate, fc)) => {
                    f - fc <= DECREASE_SLACK * (1.0 + f.abs()) || candidate == &w
                }
                None => true,
            };
            if resolved && last_delta <= STALL_DELTA {
                debug!(
                    objective = objective.name(),
                    iterations = iteration,
                    delta = last_delta,
                    "solver converged at objective resolution"
                );
                return Ok(Minimization {
                    weights: w,
                    value: direction.orient(f),
                    iterations: iteration,
                    last_delta,
                    converged: true,
                });
            }

            match accepted {
                Some((candidate, fc)) => {
                    trace!(iteration, step, value = fc, delta = last_delta, "solver step");
                    w = candidate;
                    f = fc;
                    step = (step * 2.0).min(MAX_STEP);
                }
                None => {
                    warn!(
                        objective = objective.name(),
                        iterations = iteration,
                        delta = last_delta,
                        "line search stalled"
                    );
                    return Ok(Minimization {
                        weights: w,
                        value: direction.orient(f),
                        iterations: iteration,
                        last_delta,
                        converged: false,
                    });
                }
            }
        }

        warn!(
            objective = objective.name(),
            iterations = self.settings.max_iterations,
            delta = last_delta,
            "iteration budget exhausted"
        );
        Ok(Minimization {
            weights: w,
            value: direction.orient(f),
            iterations: self.settings.max_iterations,
            last_delta,
            converged: false,
        })
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// `x + alpha * y`
fn axpy(x: &[f64], alpha: f64, y: &[f64]) -> Vec<f64> {
    x.iter().zip(y.iter()).map(|(a, b)| a + alpha * b).collect()
}

fn inf_norm_diff(a: &[f64], b: &[f64]) -> f64 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| (x - y).abs())
        .fold(0.0, f64::max)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
