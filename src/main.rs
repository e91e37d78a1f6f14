use std::process::ExitCode;

use env_logger::Env;
use log::{error, info};
use optical_link_sim::params::Configuration;
use optical_link_sim::surface::SurfacePlot;
use optical_link_sim::{app, calc, sweep, LinkResult};
use rand::rngs::StdRng;
use rand::SeedableRng;

fn main() -> ExitCode {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{err}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> LinkResult<()> {
    let config = Configuration::default();
    info!(
        "Link: Pt {:.1} dBm, noise {:.1} dBm, Cn² {:e}, apertures {} m / {} m",
        calc::watt_to_dbm(config.power_transmitted),
        calc::watt_to_dbm(config.receiver_noise),
        config.refractive_index_structure,
        config.aperture_diameter,
        config.receiver_diameter
    );

    let mut rng = StdRng::from_entropy();
    let grid = sweep::run(&config, &mut rng)?;

    let parameters = app::parameter_rows(&config);
    let plot = SurfacePlot::from_sweep(&config, grid)?;
    app::render(plot, parameters)
}
