//! Free-space optical link model.
//!
//! Sweeps a ground-to-space optical link over wavelength and distance and
//! reports the BPSK bit error rate of every combination, accounting for
//! geometric spreading, an approximate Fried-parameter atmospheric loss and
//! log-normal turbulence fading.
//!
//! ```no_run
//! use optical_link_sim::{params::Configuration, sweep};
//! use rand::SeedableRng;
//!
//! let config = Configuration::default();
//! let mut rng = rand::rngs::StdRng::seed_from_u64(0);
//! let grid = sweep::run(&config, &mut rng).unwrap();
//! assert_eq!(grid.shape(), (50, 100));
//! ```

pub mod app;
pub mod calc;
pub mod error;
pub mod params;
pub mod surface;
pub mod sweep;

pub use error::{LinkError, LinkResult};
