//! Explicit Runge-Kutta methods with embedded error estimation and adaptive step size.

use std::fmt;

use log::{debug, trace, warn};

use crate::butcher_tableau::ButcherTableau;
use crate::controller::{Controller, ControllerConfig};
use crate::rk_shared::*;

use nalgebra::{allocator::Allocator, DefaultAllocator, Dim, OVector};

/// Maximum number of attempts of a single step before the last candidate is
/// committed without meeting the tolerance.
pub const MAX_ATTEMPTS: u32 = 1_000_000;

/// Maximum number of steps taken by [`AdaptiveIntegrator::integrate`].
pub const MAX_STEPS: u32 = 100_000;

/// Error estimate of one attempted step, taken at the component with the
/// largest estimated error.
#[derive(Debug, Clone, Copy)]
struct ErrorEstimate<T> {
    err: T,
    err_y: T,
    err_dydt: T,
}

/// Structure containing the parameters for the numerical integration.
pub struct AdaptiveIntegrator<T, V, F>
where
    F: System<T, V>,
{
    f: F,
    x: T,
    y: V,
    h: T,
    h_last: T,
    tableau: ButcherTableau<T>,
    berr: Vec<T>,
    controller: Controller<T>,
    max_attempts: u32,
    n_max: u32,
    k: Vec<V>,
    slope: V,
    y_trial: V,
    y_next: V,
    x_out: Vec<T>,
    y_out: Vec<V>,
    stats: Stats,
}

impl<T, D: Dim, F> AdaptiveIntegrator<T, OVector<T, D>, F>
where
    T: FloatNumber,
    F: System<T, OVector<T, D>>,
    DefaultAllocator: Allocator<D>,
{
    /// Default initializer for the structure
    ///
    /// # Arguments
    ///
    /// * `f`       - Structure implementing the System trait
    /// * `x`       - Initial value of the independent variable (usually time)
    /// * `y`       - Initial value of the dependent variable(s)
    /// * `h`       - Initial step size, clamped into `[min_dt, max_dt]`
    /// * `tableau` - Coefficients of an embedded Runge-Kutta pair
    /// * `config`  - Tolerances and step bounds of the step size controller
    ///
    pub fn new(
        f: F,
        x: T,
        y: OVector<T, D>,
        h: T,
        tableau: ButcherTableau<T>,
        config: ControllerConfig<T>,
    ) -> Result<Self, ConfigError> {
        let berr = tableau
            .berr()
            .ok_or(ConfigError::MissingErrorEstimate)?
            .to_vec();
        if !(h > T::zero() && h.is_finite()) {
            return Err(ConfigError::NonPositiveStep { dt: to_f64(h) });
        }
        let controller = Controller::new(config)?;
        let h = controller.clamp(h);

        let (rows, cols) = y.shape_generic();
        let zeros = OVector::zeros_generic(rows, cols);
        Ok(Self {
            f,
            x,
            h,
            h_last: T::zero(),
            k: vec![zeros.clone(); tableau.num_stages()],
            slope: zeros.clone(),
            y_trial: zeros.clone(),
            y_next: zeros,
            y,
            tableau,
            berr,
            controller,
            max_attempts: MAX_ATTEMPTS,
            n_max: MAX_STEPS,
            x_out: Vec::new(),
            y_out: Vec::new(),
            stats: Stats::new(),
        })
    }

    /// Sets the number of attempts of a single step. Default is 1,000,000
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    /// Sets the maximum number of steps taken by `integrate`. Default is 100,000
    pub fn with_max_steps(mut self, n_max: u32) -> Self {
        self.n_max = n_max;
        self
    }

    /// Performs one adaptive step and commits it.
    ///
    /// The step is retried with a rescaled step size until the controller
    /// accepts it. If the step size is pinned at `min_dt` and the next
    /// candidate is rejected again, it is committed anyway
    /// ([`StepOutcome::ForcedAccept`]); if the
    /// retry budget runs out the last candidate is committed anyway
    /// ([`StepOutcome::NotConverged`]). A non-finite candidate is never
    /// committed.
    pub fn step(&mut self) -> Result<StepOutcome, IntegrationError> {
        // y and t do not change between attempts, neither does the first stage.
        self.f.system(self.x, &self.y, &mut self.k[0]);
        self.stats.num_eval += 1;

        let q = self.tableau.order();
        let mut outcome = StepOutcome::NotConverged;
        let mut clamped = false;
        let mut h = self.h;

        for _ in 0..self.max_attempts {
            h = self.h;
            self.evaluate_stages(h);
            let estimate = self.combine_stages(h);

            if !estimate.err.is_finite() || self.y_next.iter().any(|v| !v.is_finite()) {
                return Err(IntegrationError::NumericalDivergence { x: to_f64(self.x) });
            }

            let check = self.controller.check_error(
                &mut self.h,
                estimate.err,
                estimate.err_y,
                estimate.err_dydt,
                q,
            );
            if check.accepted {
                outcome = StepOutcome::Accepted;
                break;
            }

            if clamped {
                warn!(
                    "t = {}: step size pinned at {}, accepting error {} above tolerance",
                    self.x, h, estimate.err
                );
                outcome = StepOutcome::ForcedAccept;
                break;
            }

            debug!(
                "t = {}: rejected dt = {} (err = {}), retrying with dt = {}",
                self.x, h, estimate.err, self.h
            );
            self.stats.rejected_steps += 1;
            clamped = check.clamped;
        }

        if outcome == StepOutcome::NotConverged {
            warn!(
                "t = {}: no acceptable step after {} attempts, committing dt = {}",
                self.x, self.max_attempts, h
            );
        }

        std::mem::swap(&mut self.y, &mut self.y_next);
        self.x += h;
        self.h_last = h;
        self.stats.record(outcome);
        trace!("{}", self);

        Ok(outcome)
    }

    /// Evaluates the stages after the first one with step size `h`.
    fn evaluate_stages(&mut self, h: T) {
        for i in 1..self.k.len() {
            let row = &self.tableau.a()[i - 1];
            self.slope.fill(T::zero());
            for (k, &a) in self.k[..i].iter().zip(row) {
                self.slope += k * a;
            }
            self.y_trial.copy_from(&self.y);
            self.y_trial += &self.slope * h;
            self.f.system(
                self.x + h * self.tableau.c()[i - 1],
                &self.y_trial,
                &mut self.k[i],
            );
        }
        self.stats.num_eval += (self.k.len() - 1) as u32;
    }

    /// Forms the candidate solution in `y_next` and the error estimate.
    ///
    /// The error weights are applied to the stage derivatives without the
    /// factor `h`, while the candidate uses the usual `y + h * sum(b * k)`.
    fn combine_stages(&mut self, h: T) -> ErrorEstimate<T> {
        let weights = self.tableau.b();
        let mut estimate = ErrorEstimate {
            err: T::zero(),
            err_y: T::zero(),
            err_dydt: T::zero(),
        };

        for j in 0..self.y.len() {
            let mut dydt = T::zero();
            let mut err_sum = T::zero();
            for ((k, &b), &e) in self.k.iter().zip(weights).zip(&self.berr) {
                dydt += b * k[j];
                err_sum += e * k[j];
            }
            self.y_next[j] = self.y[j] + h * dydt;

            // Keep the first component with the largest error; NaN wins so
            // that it is reported.
            if j == 0 || err_sum.abs() > estimate.err || err_sum.is_nan() {
                estimate = ErrorEstimate {
                    err: err_sum.abs(),
                    err_y: self.y_next[j].abs(),
                    err_dydt: dydt.abs(),
                };
            }
        }
        estimate
    }

    /// Integrates until the independent variable reaches `x_end`.
    ///
    /// Every committed point is recorded in [`x_out`](Self::x_out) and
    /// [`y_out`](Self::y_out). There is no interpolation: the last step may
    /// overshoot `x_end`. The integration also stops as soon as
    /// [`System::solout`] returns true.
    pub fn integrate(&mut self, x_end: T) -> Result<Stats, IntegrationError> {
        // Save initial values
        self.x_out.push(self.x);
        self.y_out.push(self.y.clone());

        let mut n_step = 0;
        while self.x < x_end {
            if n_step >= self.n_max {
                return Err(IntegrationError::MaxNumStepReached {
                    x: to_f64(self.x),
                    n_step,
                });
            }
            n_step += 1;

            self.step()?;
            self.x_out.push(self.x);
            self.y_out.push(self.y.clone());

            self.f.system(self.x, &self.y, &mut self.k[0]);
            self.stats.num_eval += 1;
            if self.f.solout(self.x, &self.y, &self.k[0]) {
                break;
            }
        }
        Ok(self.stats)
    }

    /// Returns the state after the last committed step.
    pub fn current_y(&self) -> &OVector<T, D> {
        &self.y
    }

    /// Returns the independent variable after the last committed step.
    pub fn current_time(&self) -> T {
        self.x
    }

    /// Step size that the next call to `step` starts with.
    pub fn time_step(&self) -> T {
        self.h
    }

    /// Step size of the last committed step, zero before the first step.
    pub fn last_step_size(&self) -> T {
        self.h_last
    }

    /// Getter for the step size controller.
    pub fn controller(&self) -> &Controller<T> {
        &self.controller
    }

    /// Getter for the coefficients of the embedded pair.
    pub fn tableau(&self) -> &ButcherTableau<T> {
        &self.tableau
    }

    /// Returns the statistics gathered so far.
    pub fn stats(&self) -> Stats {
        self.stats
    }

    /// Getter for the independent variable's output.
    pub fn x_out(&self) -> &Vec<T> {
        &self.x_out
    }

    /// Getter for the dependent variables' output.
    pub fn y_out(&self) -> &Vec<OVector<T, D>> {
        &self.y_out
    }
}

impl<T, D: Dim, F> fmt::Display for AdaptiveIntegrator<T, OVector<T, D>, F>
where
    T: FloatNumber,
    F: System<T, OVector<T, D>>,
    DefaultAllocator: Allocator<D>,
{
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write_trace(f, self.x, self.h, self.y.iter())
    }
}
