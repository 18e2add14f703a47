// Predator-prey model integrated with both embedded pairs, printing one trace
// line per committed step. Run with RUST_LOG=warn to see forced steps.

use rk_solvers::*;

type State = Vector2<f64>;
type Time = f64;

struct LotkaVolterra {
    alpha: f64,
    beta: f64,
    gamma: f64,
    delta: f64,
}

impl System<Time, State> for LotkaVolterra {
    fn system(&self, _t: Time, y: &State, dy: &mut State) {
        dy[0] = y[0] * (self.alpha - self.beta * y[1]);
        dy[1] = y[1] * (self.delta * y[0] - self.gamma);
    }
}

fn run(name: &str, tableau: ButcherTableau<f64>) -> Result<(), Box<dyn std::error::Error>> {
    let system = LotkaVolterra {
        alpha: 1.5,
        beta: 1.0,
        gamma: 3.0,
        delta: 1.0,
    };
    let config = ControllerConfig::new(1e-6, 0.0, 0.1, 1e-4);
    let mut stepper =
        AdaptiveIntegrator::new(system, 0.0, State::new(0.5, 0.5), 0.005, tableau, config)?;

    println!("# {}", name);
    while stepper.current_time() < 3.0 {
        let outcome = stepper.step()?;
        if outcome.is_accepted() {
            println!("{}", stepper);
        }
    }
    println!("{}\n", stepper.stats());
    Ok(())
}

fn main() {
    env_logger::init();

    for (name, tableau) in [
        ("Fehlberg 4(5)", ButcherTableau::fehlberg45()),
        ("Heun-Euler 1(2)", ButcherTableau::heun_euler()),
    ] {
        if let Err(e) = run(name, tableau) {
            println!("An error occured: {}", e);
        }
    }
}
