//! Adaptive step size control.

use serde::{Deserialize, Serialize};

use crate::rk_shared::{cast, to_f64, ConfigError, FloatNumber};

/// Safety factor applied to every rescaled step.
const SAFETY_FACTOR: f64 = 0.9;
/// Error ratios above this value reject the step.
const REJECT_RATIO: f64 = 1.1;
/// Error ratios below this value let the step grow.
const GROW_RATIO: f64 = 0.5;

/// Tolerances and step bounds of the step size controller.
///
/// The tolerance of a step is
/// `eps_abs + eps_rel * (a_y * |y| + dt * a_dydt * |dy/dt|)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ControllerConfig<T> {
    /// Absolute tolerance
    pub eps_abs: T,
    /// Relative tolerance
    pub eps_rel: T,
    /// Smallest step size the controller may pick
    pub min_dt: T,
    /// Largest step size the controller may pick
    pub max_dt: T,
    /// Weight of the state in the relative tolerance. Default is 1.0
    pub a_y: T,
    /// Weight of the derivative in the relative tolerance. Default is 0.0
    pub a_dydt: T,
}

impl<T: FloatNumber> ControllerConfig<T> {
    /// Creates a configuration with the default weights `a_y = 1` and `a_dydt = 0`.
    ///
    /// # Arguments
    ///
    /// * `eps_abs` - Absolute tolerance
    /// * `eps_rel` - Relative tolerance
    /// * `max_dt`  - Maximum step size
    /// * `min_dt`  - Minimum step size
    ///
    pub fn new(eps_abs: T, eps_rel: T, max_dt: T, min_dt: T) -> Self {
        Self {
            eps_abs,
            eps_rel,
            min_dt,
            max_dt,
            a_y: T::one(),
            a_dydt: T::zero(),
        }
    }

    /// Replaces the weights of the state and of its derivative in the relative tolerance.
    pub fn with_weights(mut self, a_y: T, a_dydt: T) -> Self {
        self.a_y = a_y;
        self.a_dydt = a_dydt;
        self
    }

    /// Checks that the tolerances and the step bounds are usable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let tolerance_ok = |tol: T| tol.is_finite() && tol >= T::zero();
        if !tolerance_ok(self.eps_abs)
            || !tolerance_ok(self.eps_rel)
            || (self.eps_abs == T::zero() && self.eps_rel == T::zero())
        {
            return Err(ConfigError::InvalidTolerance {
                eps_abs: to_f64(self.eps_abs),
                eps_rel: to_f64(self.eps_rel),
            });
        }

        if !(self.min_dt >= T::zero() && self.max_dt > T::zero() && self.min_dt <= self.max_dt)
            || !self.max_dt.is_finite()
        {
            return Err(ConfigError::InvalidStepBounds {
                min_dt: to_f64(self.min_dt),
                max_dt: to_f64(self.max_dt),
            });
        }

        if !tolerance_ok(self.a_y) || !tolerance_ok(self.a_dydt) {
            return Err(ConfigError::InvalidTolerance {
                eps_abs: to_f64(self.eps_abs),
                eps_rel: to_f64(self.eps_rel),
            });
        }
        Ok(())
    }
}

/// Decision taken by the controller for one attempted step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ErrorCheck {
    /// The step may be committed.
    pub accepted: bool,
    /// The rescaled step size hit `min_dt` or `max_dt`.
    pub clamped: bool,
}

/// Used for adaptive step size control
#[derive(Debug, Clone)]
pub struct Controller<T> {
    config: ControllerConfig<T>,
    safety_factor: T,
}

impl<T: FloatNumber> Controller<T> {
    /// Creates a controller responsible for adaptive step size control.
    pub fn new(config: ControllerConfig<T>) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            config,
            safety_factor: cast(SAFETY_FACTOR),
        })
    }

    /// Determines if the step must be accepted or rejected and rescales `dt` accordingly.
    ///
    /// # Arguments
    ///
    /// * `dt`       - Step size used for the attempt, replaced by the step size to use next
    /// * `err`      - Magnitude of the largest error estimate component
    /// * `err_y`    - Magnitude of the candidate state at that component
    /// * `err_dydt` - Magnitude of the weighted derivative at that component
    /// * `q`        - Order of the scheme
    ///
    pub fn check_error(&self, dt: &mut T, err: T, err_y: T, err_dydt: T, q: u32) -> ErrorCheck {
        let cfg = &self.config;
        let tolerance =
            cfg.eps_abs + cfg.eps_rel * (cfg.a_y * err_y + *dt * cfg.a_dydt * err_dydt);
        let ratio = err / tolerance;
        let q: T = cast(f64::from(q));

        if ratio > cast(REJECT_RATIO) {
            // Reject step
            *dt = self.safety_factor * *dt / ratio.powf(q.recip());
            let clamped = *dt < cfg.min_dt;
            if clamped {
                *dt = cfg.min_dt;
            }
            return ErrorCheck {
                accepted: false,
                clamped,
            };
        }

        // Accept step
        let mut clamped = false;
        if ratio < cast(GROW_RATIO) {
            *dt = self.safety_factor * *dt / ratio.powf((q + T::one()).recip());
            if *dt > cfg.max_dt {
                *dt = cfg.max_dt;
                clamped = true;
            } else if *dt < cfg.min_dt {
                *dt = cfg.min_dt;
                clamped = true;
            }
        }
        ErrorCheck {
            accepted: true,
            clamped,
        }
    }

    /// Getter for the tolerances and step bounds.
    pub fn config(&self) -> &ControllerConfig<T> {
        &self.config
    }

    /// Returns the maximum step size allowed.
    pub fn max_dt(&self) -> T {
        self.config.max_dt
    }

    /// Returns the minimum step size allowed.
    pub fn min_dt(&self) -> T {
        self.config.min_dt
    }

    /// Clamps a step size into `[min_dt, max_dt]`.
    pub fn clamp(&self, dt: T) -> T {
        dt.max(self.config.min_dt).min(self.config.max_dt)
    }
}
