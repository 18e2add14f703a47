// Lorenz attractor

use rk_solvers::*;

use std::{fs::File, io::BufWriter, io::Write, path::Path};

type State = Vector3<f64>;
type Time = f64;

fn main() {
    env_logger::init();

    // Initial state
    let y0 = State::new(1.0, 1.0, 1.0);

    // Define problem specific constants
    let system = LorenzAttractor {
        sigma: 10.,
        beta: 8. / 3.,
        rho: 28.,
    };

    // Create stepper and integrate
    let config = ControllerConfig::new(1e-6, 1e-6, 0.01, 1e-6);
    let mut stepper =
        match AdaptiveIntegrator::new(system, 0.0, y0, 1e-3, ButcherTableau::fehlberg45(), config)
        {
            Ok(stepper) => stepper,
            Err(e) => {
                println!("Invalid configuration: {}", e);
                return;
            }
        };
    let res = stepper.integrate(25.0);

    // Handle result
    match res {
        Ok(stats) => {
            println!("{}", stats);
            let path = Path::new("./outputs/lorenz_fehlberg45.dat");
            save(stepper.x_out(), stepper.y_out(), path);
            println!("Results saved in: {:?}", path);
        }
        Err(e) => println!("An error occured: {}", e),
    }
}

struct LorenzAttractor {
    sigma: f64,
    beta: f64,
    rho: f64,
}

impl System<Time, State> for LorenzAttractor {
    fn system(&self, _t: Time, y: &State, dy: &mut State) {
        dy[0] = self.sigma * (y[1] - y[0]);
        dy[1] = y[0] * (self.rho - y[2]) - y[1];
        dy[2] = y[0] * y[1] - self.beta * y[2];
    }
}

pub fn save(times: &[Time], states: &[State], filename: &Path) {
    // Create or open file
    let file = match File::create(filename) {
        Err(e) => {
            println!("Could not open file. Error: {:?}", e);
            return;
        }
        Ok(buf) => buf,
    };
    let mut buf = BufWriter::new(file);

    // Write time and state vector in a csv format
    for (time, state) in times.iter().zip(states) {
        if let Err(e) = write_row(&mut buf, *time, state) {
            println!("Could not write to file. Error: {:?}", e);
            return;
        }
    }
    if let Err(e) = buf.flush() {
        println!("Could not write to file. Error: {:?}", e);
    }
}

fn write_row(buf: &mut impl Write, time: Time, state: &State) -> std::io::Result<()> {
    write!(buf, "{}", time)?;
    for val in state.iter() {
        write!(buf, ", {}", val)?;
    }
    writeln!(buf)
}
