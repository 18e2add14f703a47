//! Shared traits and structures for the fixed-step and adaptive integrators.

use std::fmt;

use num_traits::{Float, NumCast};
use serde::{Deserialize, Serialize};
use simba::scalar::{ClosedAddAssign, ClosedMulAssign, ClosedNeg, ClosedSubAssign};
use thiserror::Error;

use nalgebra::Scalar;

/// Scalar type the integrators work with (in practice `f32` or `f64`).
pub trait FloatNumber:
    Float + Scalar + ClosedAddAssign + ClosedMulAssign + ClosedSubAssign + ClosedNeg + fmt::Display
{
}

impl<T> FloatNumber for T where
    T: Float
        + Scalar
        + ClosedAddAssign
        + ClosedMulAssign
        + ClosedSubAssign
        + ClosedNeg
        + fmt::Display
{
}

/// Converts a coefficient or constant to the working scalar type.
///
/// Values that cannot be represented become NaN and surface later as a
/// divergence instead of a panic.
pub(crate) fn cast<T: FloatNumber>(value: f64) -> T {
    <T as NumCast>::from(value).unwrap_or_else(T::nan)
}

/// Converts a scalar to `f64` for error reporting.
pub(crate) fn to_f64<T: FloatNumber>(value: T) -> f64 {
    value.to_f64().unwrap_or(f64::NAN)
}

/// Trait needed to be implemented by the user.
///
/// Closures of the form `|x, y, dy| { ... }` implement it automatically.
pub trait System<T, V> {
    /// System of ordinary differential equations. Must be free of side effects:
    /// the integrators call it repeatedly with the same arguments.
    fn system(&self, x: T, y: &V, dy: &mut V);
    /// Stop function called after every committed step of `integrate`.
    /// The integration is stopped when this function returns true.
    fn solout(&mut self, _x: T, _y: &V, _dy: &V) -> bool {
        false
    }
}

impl<T, V, F> System<T, V> for F
where
    F: Fn(T, &V, &mut V),
{
    fn system(&self, x: T, y: &V, dy: &mut V) {
        self(x, y, dy)
    }
}

/// Result of a single adaptive step. The state is committed in every case.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StepOutcome {
    /// The error estimate was within tolerance.
    Accepted,
    /// The step size was already pinned at `min_dt` and the step was taken
    /// without meeting the tolerance.
    ForcedAccept,
    /// The retry budget ran out; the last candidate was committed anyway.
    NotConverged,
}

impl StepOutcome {
    /// Returns true if the committed step met the requested tolerance.
    pub fn is_accepted(&self) -> bool {
        *self == StepOutcome::Accepted
    }
}

/// Enumeration of the errors that may arise during integration.
#[derive(Debug, Error)]
pub enum IntegrationError {
    #[error("Stopped at x = {x}. Need more than {n_step} steps.")]
    MaxNumStepReached { x: f64, n_step: u32 },
    #[error("Stopped at x = {x}. The solution is no longer finite.")]
    NumericalDivergence { x: f64 },
}

/// Enumeration of the errors caught when setting up an integrator.
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("Malformed Butcher tableau: {reason}.")]
    MalformedTableau { reason: String },
    #[error("The tableau has no embedded error estimate and cannot drive an adaptive step.")]
    MissingErrorEstimate,
    #[error(
        "Tolerances must be finite, non-negative and not both zero \
         (eps_abs = {eps_abs}, eps_rel = {eps_rel})."
    )]
    InvalidTolerance { eps_abs: f64, eps_rel: f64 },
    #[error(
        "Step bounds must satisfy 0 <= min_dt <= max_dt and max_dt > 0 \
         (min_dt = {min_dt}, max_dt = {max_dt})."
    )]
    InvalidStepBounds { min_dt: f64, max_dt: f64 },
    #[error("The step size must be positive and finite, got {dt}.")]
    NonPositiveStep { dt: f64 },
}

/// Contains some statistics of the integration.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stats {
    pub num_eval: u32,
    pub accepted_steps: u32,
    pub rejected_steps: u32,
    pub forced_steps: u32,
    pub unconverged_steps: u32,
}

impl Stats {
    pub(crate) fn new() -> Stats {
        Stats::default()
    }

    /// Number of steps committed to the state, whatever their outcome.
    pub fn committed_steps(&self) -> u32 {
        self.accepted_steps + self.forced_steps + self.unconverged_steps
    }

    pub(crate) fn record(&mut self, outcome: StepOutcome) {
        match outcome {
            StepOutcome::Accepted => self.accepted_steps += 1,
            StepOutcome::ForcedAccept => self.forced_steps += 1,
            StepOutcome::NotConverged => self.unconverged_steps += 1,
        }
    }
}

impl fmt::Display for Stats {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f, "Number of function evaluations: {}", self.num_eval)?;
        writeln!(f, "Number of accepted steps: {}", self.accepted_steps)?;
        writeln!(f, "Number of rejected steps: {}", self.rejected_steps)?;
        writeln!(f, "Number of forced steps: {}", self.forced_steps)?;
        write!(f, "Number of unconverged steps: {}", self.unconverged_steps)
    }
}

/// Writes the `t = <t> dt = <dt> y = <y0> <y1> ...` trace line.
pub(crate) fn write_trace<'a, T, I>(f: &mut fmt::Formatter, t: T, dt: T, y: I) -> fmt::Result
where
    T: fmt::Display + 'a,
    I: IntoIterator<Item = &'a T>,
{
    write!(f, "t = {} dt = {} y =", t, dt)?;
    for value in y {
        write!(f, " {}", value)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stats_count_every_outcome() {
        let mut stats = Stats::new();
        stats.record(StepOutcome::Accepted);
        stats.record(StepOutcome::Accepted);
        stats.record(StepOutcome::ForcedAccept);
        stats.record(StepOutcome::NotConverged);
        assert_eq!(stats.accepted_steps, 2);
        assert_eq!(stats.forced_steps, 1);
        assert_eq!(stats.unconverged_steps, 1);
        assert_eq!(stats.committed_steps(), 4);
    }

    #[test]
    fn stats_display_lists_counters() {
        let stats = Stats {
            num_eval: 12,
            accepted_steps: 3,
            rejected_steps: 1,
            forced_steps: 0,
            unconverged_steps: 0,
        };
        let text = stats.to_string();
        assert!(text.starts_with("Number of function evaluations: 12"));
        assert!(text.contains("Number of rejected steps: 1"));
        assert!(text.ends_with("Number of unconverged steps: 0"));
    }

    #[test]
    fn closures_implement_system() {
        let decay = |_x: f64, y: &f64, dy: &mut f64| *dy = -2.0 * *y;
        let mut dy = 0.0;
        decay.system(0.0, &3.0, &mut dy);
        assert_eq!(dy, -6.0);
    }

    #[test]
    fn cast_keeps_f64_constants_exact() {
        assert_eq!(cast::<f64>(1.0 / 3.0), 1.0 / 3.0);
        assert_eq!(cast::<f32>(0.5), 0.5_f32);
    }
}
