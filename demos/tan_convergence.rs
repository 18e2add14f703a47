// Convergence of the fixed-step schemes on dy/dt = tan(y) + 1, y(1) = 1,
// integrated up to t = 1.1.

use rk_solvers::*;

type State = Vector1<f64>;

fn solve(tableau: ButcherTableau<f64>, num_steps: usize) -> f64 {
    let tangent = |_t: f64, y: &State, dy: &mut State| dy[0] = y[0].tan() + 1.0;
    let mut stepper =
        FixedStepIntegrator::new(tangent, 1.0, State::new(1.0), 0.1 / num_steps as f64, tableau);
    for _ in 0..num_steps {
        stepper.step();
    }
    stepper.current_y()[0]
}

fn main() {
    let reference = solve(ButcherTableau::rk4(), 1 << 14);
    println!("y(1.1) = {}", reference);

    let schemes: [(&str, fn() -> ButcherTableau<f64>); 5] = [
        ("rk4", ButcherTableau::rk4),
        ("rk4_mod", ButcherTableau::rk4_mod),
        ("midpoint", ButcherTableau::midpoint),
        ("heun", ButcherTableau::heun),
        ("ralston", ButcherTableau::ralston),
    ];
    for (name, tableau) in schemes {
        let mut previous: Option<f64> = None;
        for num_steps in [5, 10, 20, 40] {
            let error = (solve(tableau(), num_steps) - reference).abs();
            match previous {
                Some(prev) => println!(
                    "{:>8} n = {:>3} error = {:.3e} ratio = {:.4}",
                    name,
                    num_steps,
                    error,
                    error / prev
                ),
                None => println!("{:>8} n = {:>3} error = {:.3e}", name, num_steps, error),
            }
            previous = Some(error);
        }
    }
}
