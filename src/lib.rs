//! # RK Solvers
//! `rk_solvers` integrates systems of ordinary differential equations with explicit
//! Runge-Kutta methods, either with a fixed step size or with an embedded pair
//! driving an adaptive step size.

// Re-export from external crate
use nalgebra as na;
pub use crate::na::{
    DVector, OVector, SVector, Vector1, Vector2, Vector3, Vector4, Vector5, Vector6,
};

// Declare modules
pub mod adaptive;
pub mod butcher_tableau;
pub mod controller;
pub mod fixed_step;
pub mod rk_shared;

pub use adaptive::AdaptiveIntegrator;
pub use butcher_tableau::ButcherTableau;
pub use controller::{Controller, ControllerConfig};
pub use fixed_step::FixedStepIntegrator;

pub use rk_shared::{ConfigError, FloatNumber, IntegrationError, Stats, StepOutcome, System};
