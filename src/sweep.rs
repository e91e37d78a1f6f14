//! Wavelength x distance sweep of the link model.
//!
//! Every cell of the grid is independent: it needs the configuration and one
//! turbulence draw. [`run`] walks the cells in ascending order drawing from a
//! single injected generator. [`run_parallel`] spreads rows over the rayon
//! pool and gives every cell its own ChaCha stream, so the grid only depends
//! on the seed.

use log::{debug, info, trace};
use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;

use crate::calc;
use crate::error::{LinkError, LinkResult};
use crate::params::Configuration;

/// BER values indexed by (wavelength index, distance index).
#[derive(Clone, Debug, PartialEq)]
pub struct ResultGrid {
    rows: usize,
    cols: usize,
    values: Vec<f64>,
}

impl ResultGrid {
    /// Builds a grid from one row per wavelength.
    pub fn from_rows(rows: Vec<Vec<f64>>) -> LinkResult<Self> {
        let cols = rows.first().map_or(0, Vec::len);
        if let Some(bad) = rows.iter().find(|row| row.len() != cols) {
            return Err(LinkError::ShapeMismatch {
                expected: (rows.len(), cols),
                actual: (rows.len(), bad.len()),
            });
        }
        Ok(Self {
            rows: rows.len(),
            cols,
            values: rows.into_iter().flatten().collect(),
        })
    }

    /// (wavelength count, distance count)
    pub fn shape(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    pub fn get(&self, wavelength_index: usize, distance_index: usize) -> Option<f64> {
        if wavelength_index >= self.rows || distance_index >= self.cols {
            return None;
        }
        self.values.get(wavelength_index * self.cols + distance_index).copied()
    }

    pub fn row(&self, wavelength_index: usize) -> Option<&[f64]> {
        if wavelength_index >= self.rows {
            return None;
        }
        let start = wavelength_index * self.cols;
        self.values.get(start..start + self.cols)
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn summary(&self) -> GridSummary {
        GridSummary::of(&self.values)
    }
}

/// Range and mean of a set of BER values.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GridSummary {
    pub min: f64,
    pub max: f64,
    pub mean: f64,
}

impl GridSummary {
    pub fn of(values: &[f64]) -> Self {
        if values.is_empty() {
            return Self { min: f64::NAN, max: f64::NAN, mean: f64::NAN };
        }
        let min = values.iter().copied().fold(f64::INFINITY, f64::min);
        let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let mean = values.iter().sum::<f64>() / values.len() as f64;
        Self { min, max, mean }
    }
}

/// Received power and BER of cell (i, j); faults carry the cell coordinates.
pub fn evaluate_cell<R: Rng + ?Sized>(
    config: &Configuration,
    wavelength_index: usize,
    distance_index: usize,
    rng: &mut R,
) -> LinkResult<f64> {
    let (Some(&wavelength), Some(&distance)) = (
        config.wavelengths.get(wavelength_index),
        config.distances.get(distance_index),
    ) else {
        return Err(LinkError::CellOutOfRange {
            wavelength_index,
            distance_index,
            shape: config.grid_shape(),
        });
    };

    calc::received_power(config, distance, wavelength, rng)
        .and_then(|power| {
            trace!(
                "cell ({wavelength_index}, {distance_index}): received {:.2} dBm",
                calc::watt_to_dbm(power)
            );
            calc::bit_error_rate(power, config)
        })
        .map_err(|source| LinkError::Cell {
            wavelength_index,
            distance_index,
            wavelength,
            distance,
            source: Box::new(source),
        })
}

/// Fills the grid sequentially, wavelength-major, one draw per cell.
///
/// Stops at the first failing cell.
pub fn run<R: Rng + ?Sized>(config: &Configuration, rng: &mut R) -> LinkResult<ResultGrid> {
    config.validate()?;
    let (rows, cols) = config.grid_shape();
    info!("Sweeping {rows} wavelengths x {cols} distances");

    let mut values = Vec::with_capacity(rows * cols);
    for i in 0..rows {
        for j in 0..cols {
            values.push(evaluate_cell(config, i, j, rng)?);
        }
        let row = &values[i * cols..];
        let summary = GridSummary::of(row);
        debug!(
            "{:.1} nm: BER {:.3e}..{:.3e}",
            config.wavelengths[i] * 1e9,
            summary.min,
            summary.max
        );
    }

    let grid = ResultGrid { rows, cols, values };
    log_summary(&grid);
    Ok(grid)
}

/// Fills the grid on the rayon pool.
///
/// Cell (i, j) samples from a `ChaCha8Rng` seeded with `seed` on stream
/// `i * cols + j`. Which failing cell gets reported is not deterministic when
/// several fail.
pub fn run_parallel(config: &Configuration, seed: u64) -> LinkResult<ResultGrid> {
    config.validate()?;
    let (rows, cols) = config.grid_shape();
    info!(
        "Sweeping {rows} wavelengths x {cols} distances on {} threads",
        rayon::current_num_threads()
    );

    let grid = (0..rows)
        .into_par_iter()
        .map(|i| {
            (0..cols)
                .map(|j| {
                    let mut rng = ChaCha8Rng::seed_from_u64(seed);
                    rng.set_stream((i * cols + j) as u64);
                    evaluate_cell(config, i, j, &mut rng)
                })
                .collect::<LinkResult<Vec<f64>>>()
        })
        .collect::<LinkResult<Vec<Vec<f64>>>>()
        .and_then(ResultGrid::from_rows)?;

    log_summary(&grid);
    Ok(grid)
}

fn log_summary(grid: &ResultGrid) {
    let summary = grid.summary();
    info!(
        "Sweep done: {} cells, BER min {:.3e}, max {:.3e}, mean {:.3e}",
        grid.values.len(),
        summary.min,
        summary.max,
        summary.mean
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::linspace;
    use rand::rngs::StdRng;

    fn small_config() -> Configuration {
        Configuration {
            wavelengths: linspace(800e-9, 1600e-9, 4),
            distances: linspace(1e3, 50e3, 7),
            refractive_index_structure: 1e-30,
            power_transmitted: 1e-2,
            ..Configuration::default()
        }
    }

    #[test]
    fn test_grid_shape_matches_axes() {
        for (n_wl, n_d) in [(1, 1), (3, 5), (50, 100)] {
            let config = Configuration {
                wavelengths: linspace(800e-9, 1600e-9, n_wl),
                distances: linspace(1e3, 1000e3, n_d),
                ..Configuration::default()
            };
            let mut rng = StdRng::seed_from_u64(0);
            let grid = run(&config, &mut rng).unwrap();
            assert_eq!(grid.shape(), (n_wl, n_d));
            assert_eq!(grid.values().len(), n_wl * n_d);
        }
    }

    #[test]
    fn test_default_sweep_values_are_probabilities() {
        let config = Configuration::default();
        let mut rng = StdRng::seed_from_u64(11);
        let grid = run(&config, &mut rng).unwrap();
        assert!(grid.values().iter().all(|ber| (0.0..=0.5).contains(ber)));
    }

    #[test]
    fn test_sweep_matches_cell_order() {
        let config = small_config();
        let mut rng = StdRng::seed_from_u64(42);
        let grid = run(&config, &mut rng).unwrap();

        let mut replay = StdRng::seed_from_u64(42);
        for i in 0..config.wavelengths.len() {
            for j in 0..config.distances.len() {
                let power = calc::received_power(
                    &config,
                    config.distances[j],
                    config.wavelengths[i],
                    &mut replay,
                )
                .unwrap();
                let ber = calc::bit_error_rate(power, &config).unwrap();
                assert_eq!(grid.get(i, j), Some(ber));
            }
        }
        assert_eq!(grid.get(4, 0), None);
    }

    #[test]
    fn test_ber_grows_with_distance() {
        let config = small_config();
        let mut rng = StdRng::seed_from_u64(8);
        let grid = run(&config, &mut rng).unwrap();
        for i in 0..config.wavelengths.len() {
            let row = grid.row(i).unwrap();
            assert!(row.windows(2).all(|w| w[1] >= w[0]), "row {i}: {row:?}");
        }
    }

    #[test]
    fn test_sweep_fails_fast_on_domain_fault() {
        let calm = Configuration {
            refractive_index_structure: 0.0,
            ..small_config()
        };
        let mut rng = StdRng::seed_from_u64(0);
        let err = run(&calm, &mut rng).unwrap_err();
        match &err {
            LinkError::Cell { wavelength_index, distance_index, .. } => {
                assert_eq!((*wavelength_index, *distance_index), (0, 0));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(err.is_domain_fault());
    }

    #[test]
    fn test_sweep_rejects_invalid_configuration() {
        let broken = Configuration {
            distances: vec![],
            ..Configuration::default()
        };
        let mut rng = StdRng::seed_from_u64(0);
        assert!(matches!(run(&broken, &mut rng), Err(LinkError::InvalidConfig(_))));
        assert!(matches!(run_parallel(&broken, 0), Err(LinkError::InvalidConfig(_))));
    }

    #[test]
    fn test_parallel_sweep_is_reproducible() {
        let config = small_config();
        let a = run_parallel(&config, 2024).unwrap();
        let b = run_parallel(&config, 2024).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.shape(), config.grid_shape());
    }

    #[test]
    fn test_parallel_cells_use_own_streams() {
        let config = small_config();
        let grid = run_parallel(&config, 9).unwrap();

        let (i, j) = (2, 5);
        let mut rng = ChaCha8Rng::seed_from_u64(9);
        rng.set_stream((i * config.distances.len() + j) as u64);
        let expected = evaluate_cell(&config, i, j, &mut rng).unwrap();
        assert_eq!(grid.get(i, j), Some(expected));
    }

    #[test]
    fn test_out_of_range_cell_is_an_error() {
        let config = Configuration::default();
        let mut rng = StdRng::seed_from_u64(0);
        for (i, j) in [(50, 0), (0, 100), (50, 100)] {
            let err = evaluate_cell(&config, i, j, &mut rng).unwrap_err();
            assert!(matches!(err, LinkError::CellOutOfRange { shape: (50, 100), .. }), "{err}");
        }
        assert!(evaluate_cell(&config, 49, 99, &mut rng).is_ok());
    }

    #[test]
    fn test_row_out_of_range() {
        let grid = ResultGrid::from_rows(vec![vec![0.5, 0.25], vec![0.0, 0.25]]).unwrap();
        assert_eq!(grid.row(1), Some(&[0.0, 0.25][..]));
        assert_eq!(grid.row(2), None);
    }

    #[test]
    fn test_from_rows_rejects_ragged_input() {
        let err = ResultGrid::from_rows(vec![vec![0.1, 0.2], vec![0.3]]).unwrap_err();
        assert!(matches!(err, LinkError::ShapeMismatch { .. }));
    }

    #[test]
    fn test_summary() {
        let grid = ResultGrid::from_rows(vec![vec![0.5, 0.25], vec![0.0, 0.25]]).unwrap();
        let summary = grid.summary();
        assert_eq!(summary.min, 0.0);
        assert_eq!(summary.max, 0.5);
        assert_eq!(summary.mean, 0.25);
    }
}
