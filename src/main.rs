use std::{sync::Arc, time::Instant};

use log::info;

use prime_tour_core::{
    Instance, Result, SolverOptions, Strategy, logging, read_cities, solve, write_tour,
};

fn main() -> Result<()> {
    let now = Instant::now();
    let options = SolverOptions::from_args()?;
    logging::init_logger(&options)?;

    info!("options: {options}");

    let cities = read_cities(options.input_path())?;
    let instance = Arc::new(Instance::new(cities));
    let strategy = Strategy::from_options(&options);

    let solution = solve(&instance, &strategy)?;
    write_tour(options.output_path(), &solution.tour)?;

    let elapsed = now.elapsed().as_secs_f32();
    info!(
        "output: n={} cost={:.3} time={elapsed:.2}s",
        solution.tour.len(),
        solution.cost
    );
    eprintln!("cost={:.3} time={elapsed:.2}s", solution.cost);

    Ok(())
}
