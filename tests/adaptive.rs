use approx::assert_relative_eq;
use nalgebra::{DVector, Vector2};
use rk_solvers::{
    AdaptiveIntegrator, ButcherTableau, ControllerConfig, FixedStepIntegrator, StepOutcome, System,
};

const EPS_ABS: f64 = 1e-6;
const MAX_DT: f64 = 0.1;
const MIN_DT: f64 = 1e-4;
const DT0: f64 = 0.005;
const T_END: f64 = 3.0;

type State = Vector2<f64>;
type Time = f64;

/// Predator-prey model.
struct LotkaVolterra {
    alpha: f64,
    beta: f64,
    gamma: f64,
    delta: f64,
}

impl Default for LotkaVolterra {
    fn default() -> Self {
        Self {
            alpha: 1.5,
            beta: 1.0,
            gamma: 3.0,
            delta: 1.0,
        }
    }
}

impl System<Time, State> for LotkaVolterra {
    fn system(&self, _t: Time, y: &State, dy: &mut State) {
        dy[0] = y[0] * (self.alpha - self.beta * y[1]);
        dy[1] = y[1] * (self.delta * y[0] - self.gamma);
    }
}

impl System<Time, DVector<f64>> for LotkaVolterra {
    fn system(&self, _t: Time, y: &DVector<f64>, dy: &mut DVector<f64>) {
        dy[0] = y[0] * (self.alpha - self.beta * y[1]);
        dy[1] = y[1] * (self.delta * y[0] - self.gamma);
    }
}

fn config() -> ControllerConfig<f64> {
    ControllerConfig::new(EPS_ABS, 0.0, MAX_DT, MIN_DT)
}

fn lotka_volterra(
    tableau: ButcherTableau<f64>,
) -> AdaptiveIntegrator<f64, State, LotkaVolterra> {
    AdaptiveIntegrator::new(
        LotkaVolterra::default(),
        0.0,
        State::new(0.5, 0.5),
        DT0,
        tableau,
        config(),
    )
    .unwrap()
}

fn assert_populations_stay_positive(tableau: ButcherTableau<f64>) {
    let mut stepper = lotka_volterra(tableau);
    while stepper.current_time() < T_END {
        stepper.step().unwrap();
        let y = stepper.current_y();
        assert!(
            y[0] > 0.0 && y[1] > 0.0,
            "population vanished at t = {}: {}",
            stepper.current_time(),
            stepper
        );
    }
}

#[test]
fn test_lotka_volterra_fehlberg_stays_positive() {
    assert_populations_stay_positive(ButcherTableau::fehlberg45());
}

#[test]
fn test_lotka_volterra_heun_euler_stays_positive() {
    assert_populations_stay_positive(ButcherTableau::heun_euler());
}

#[test]
fn test_step_size_stays_within_bounds() {
    for tableau in [ButcherTableau::fehlberg45(), ButcherTableau::heun_euler()] {
        let mut stepper = lotka_volterra(tableau);
        while stepper.current_time() < T_END {
            let outcome = stepper.step().unwrap();
            let dt = stepper.last_step_size();
            assert!(
                (MIN_DT..=MAX_DT).contains(&dt),
                "{:?} step with dt = {}",
                outcome,
                dt
            );
            let next = stepper.time_step();
            assert!((MIN_DT..=MAX_DT).contains(&next), "next dt = {}", next);
        }
    }
}

#[test]
fn test_fehlberg_meets_tolerance_on_lotka_volterra() {
    let mut stepper = lotka_volterra(ButcherTableau::fehlberg45());
    let stats = stepper.integrate(T_END).unwrap();
    assert_eq!(stats.forced_steps, 0);
    assert_eq!(stats.unconverged_steps, 0);
    assert!(stats.accepted_steps > 10);

    // Compare with a fine fixed-step reference at the same final time.
    let t_final = stepper.current_time();
    let n = 20_000;
    let mut reference = FixedStepIntegrator::new(
        LotkaVolterra::default(),
        0.0,
        State::new(0.5, 0.5),
        t_final / n as f64,
        ButcherTableau::rk4(),
    );
    for _ in 0..n {
        reference.step();
    }
    assert_relative_eq!(
        *stepper.current_y(),
        *reference.current_y(),
        epsilon = 1e-4
    );
}

#[test]
fn test_heun_euler_is_pinned_at_min_dt() {
    let mut stepper = lotka_volterra(ButcherTableau::heun_euler());
    let outcome = stepper.step().unwrap();
    // The unscaled error estimate of a first order pair is far above 1e-6
    // for any step size the bounds allow.
    assert_eq!(outcome, StepOutcome::ForcedAccept);
    assert_eq!(stepper.last_step_size(), MIN_DT);
}

#[test]
fn test_repeated_runs_are_bit_identical() {
    let trajectory = |tableau: ButcherTableau<f64>| {
        let mut stepper = lotka_volterra(tableau);
        let mut points = Vec::new();
        for _ in 0..200 {
            let outcome = stepper.step().unwrap();
            points.push((
                outcome,
                stepper.current_time(),
                stepper.time_step(),
                *stepper.current_y(),
            ));
        }
        points
    };
    for tableau in [ButcherTableau::fehlberg45(), ButcherTableau::heun_euler()] {
        let first = trajectory(tableau.clone());
        let second = trajectory(tableau);
        assert_eq!(first.len(), second.len());
        for (a, b) in first.iter().zip(&second) {
            assert_eq!(a.0, b.0);
            assert_eq!(a.1.to_bits(), b.1.to_bits());
            assert_eq!(a.2.to_bits(), b.2.to_bits());
            assert_eq!(a.3[0].to_bits(), b.3[0].to_bits());
            assert_eq!(a.3[1].to_bits(), b.3[1].to_bits());
        }
    }
}

#[test]
fn test_dynamic_and_static_vectors_agree() {
    let mut fixed = lotka_volterra(ButcherTableau::fehlberg45());
    let mut dynamic = AdaptiveIntegrator::new(
        LotkaVolterra::default(),
        0.0,
        DVector::from(vec![0.5, 0.5]),
        DT0,
        ButcherTableau::fehlberg45(),
        config(),
    )
    .unwrap();
    for _ in 0..50 {
        fixed.step().unwrap();
        dynamic.step().unwrap();
    }
    assert_eq!(fixed.current_time(), dynamic.current_time());
    assert_eq!(fixed.current_y()[0], dynamic.current_y()[0]);
    assert_eq!(fixed.current_y()[1], dynamic.current_y()[1]);
}

#[test]
fn test_single_precision() {
    let decay = |_t: f32, y: &nalgebra::Vector1<f32>, dy: &mut nalgebra::Vector1<f32>| {
        dy[0] = -y[0];
    };
    let mut stepper = AdaptiveIntegrator::new(
        decay,
        0.0_f32,
        nalgebra::Vector1::new(1.0_f32),
        0.01,
        ButcherTableau::fehlberg45(),
        ControllerConfig::new(1e-5_f32, 0.0, 0.1, 1e-4),
    )
    .unwrap();
    stepper.integrate(1.0).unwrap();
    let t = stepper.current_time();
    assert!((stepper.current_y()[0] - (-t).exp()).abs() < 1e-4);
}
