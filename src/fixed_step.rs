//! Explicit Runge-Kutta methods with fixed step size.

use std::fmt;

use crate::butcher_tableau::ButcherTableau;
use crate::rk_shared::{to_f64, write_trace, FloatNumber, Stats, System};

use nalgebra::{allocator::Allocator, DefaultAllocator, Dim, OVector};

/// Structure containing the parameters for the numerical integration.
pub struct FixedStepIntegrator<T, V, F>
where
    F: System<T, V>,
{
    f: F,
    x: T,
    y: V,
    step_size: T,
    tableau: ButcherTableau<T>,
    k: Vec<V>,
    slope: V,
    y_trial: V,
    x_out: Vec<T>,
    y_out: Vec<V>,
    stats: Stats,
}

impl<T, D: Dim, F> FixedStepIntegrator<T, OVector<T, D>, F>
where
    T: FloatNumber,
    F: System<T, OVector<T, D>>,
    DefaultAllocator: Allocator<D>,
{
    /// Default initializer for the structure
    ///
    /// # Arguments
    ///
    /// * `f`           - Structure implementing the System trait
    /// * `x`           - Initial value of the independent variable (usually time)
    /// * `y`           - Initial value of the dependent variable(s)
    /// * `step_size`   - Step size used in the method
    /// * `tableau`     - Coefficients of the Runge-Kutta scheme
    ///
    pub fn new(f: F, x: T, y: OVector<T, D>, step_size: T, tableau: ButcherTableau<T>) -> Self {
        let (rows, cols) = y.shape_generic();
        let zeros = OVector::zeros_generic(rows, cols);
        Self {
            f,
            x,
            k: vec![zeros.clone(); tableau.num_stages()],
            slope: zeros.clone(),
            y_trial: zeros,
            y,
            step_size,
            tableau,
            x_out: Vec::new(),
            y_out: Vec::new(),
            stats: Stats::new(),
        }
    }

    /// Integrates up to `x_end` with `ceil((x_end - x) / step_size)` steps.
    pub fn integrate(&mut self, x_end: T) -> Stats {
        // Save initial values
        self.x_out.push(self.x);
        self.y_out.push(self.y.clone());

        let num_steps = ((x_end - self.x) / self.step_size)
            .ceil()
            .to_usize()
            .unwrap_or(0);
        for _ in 0..num_steps {
            self.step();
            self.x_out.push(self.x);
            self.y_out.push(self.y.clone());
        }
        self.stats
    }

    /// Performs one step of the scheme and commits it.
    pub fn step(&mut self) {
        let h = self.step_size;

        self.f.system(self.x, &self.y, &mut self.k[0]);
        for i in 1..self.k.len() {
            self.slope.fill(T::zero());
            for (k, &a) in self.k[..i].iter().zip(&self.tableau.a()[i - 1]) {
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

        self.slope.fill(T::zero());
        for (k, &b) in self.k.iter().zip(self.tableau.b()) {
            self.slope += k * b;
        }
        self.y += &self.slope * h;
        self.x += h;

        self.stats.num_eval += self.k.len() as u32;
        self.stats.accepted_steps += 1;
    }

    /// Returns the state after the last step.
    pub fn current_y(&self) -> &OVector<T, D> {
        &self.y
    }

    /// Returns the independent variable after the last step.
    pub fn current_time(&self) -> T {
        self.x
    }

    /// Step size used by every step.
    pub fn time_step(&self) -> T {
        self.step_size
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

impl<T, D: Dim, F> fmt::Display for FixedStepIntegrator<T, OVector<T, D>, F>
where
    T: FloatNumber,
    F: System<T, OVector<T, D>>,
    DefaultAllocator: Allocator<D>,
{
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write_trace(f, self.x, self.step_size, self.y.iter())
    }
}

impl<T, D: Dim, F> fmt::Debug for FixedStepIntegrator<T, OVector<T, D>, F>
where
    T: FloatNumber,
    F: System<T, OVector<T, D>>,
    DefaultAllocator: Allocator<D>,
{
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("FixedStepIntegrator")
            .field("x", &to_f64(self.x))
            .field("step_size", &to_f64(self.step_size))
            .field("stages", &self.tableau.num_stages())
            .finish()
    }
}
