use serde::{Deserialize, Serialize};

use crate::error::{LinkError, LinkResult};

pub const SPEED_OF_LIGHT: f64 = 3e8; // m/s

/// Immutable parameter set for one simulation run.
///
/// `Default` yields the reference ground-to-space link: 50 wavelengths across
/// 800-1600 nm and 100 distances across 1-1000 km.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Configuration {
    pub speed_of_light: f64,      // m/s
    pub wavelengths: Vec<f64>,    // meter, ascending
    pub aperture_diameter: f64,   // meter
    pub receiver_diameter: f64,   // meter
    pub distances: Vec<f64>,      // meter, ascending
    pub power_transmitted: f64,   // Watt
    pub refractive_index_structure: f64, // Cn^2, m^(-2/3)
    pub receiver_noise: f64,      // Watt
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            speed_of_light: SPEED_OF_LIGHT,
            wavelengths: linspace(800e-9, 1600e-9, 50),
            aperture_diameter: 0.1,
            receiver_diameter: 0.1,
            distances: linspace(1e3, 1000e3, 100),
            power_transmitted: 1.0,
            refractive_index_structure: 1e-14,
            receiver_noise: 1e-12,
        }
    }
}

impl Configuration {
    /// Checks the data model invariants.
    ///
    /// Cn² may be zero here: the atmospheric model reports that case itself
    /// when a cell is evaluated.
    pub fn validate(&self) -> LinkResult<()> {
        let positive = [
            ("speed_of_light", self.speed_of_light),
            ("aperture_diameter", self.aperture_diameter),
            ("receiver_diameter", self.receiver_diameter),
            ("power_transmitted", self.power_transmitted),
            ("receiver_noise", self.receiver_noise),
        ];
        for (name, value) in positive {
            if !(value.is_finite() && value > 0.0) {
                return Err(LinkError::InvalidConfig(format!(
                    "{name} must be positive and finite, got {value:e}"
                )));
            }
        }

        let cn2 = self.refractive_index_structure;
        if !(cn2.is_finite() && cn2 >= 0.0) {
            return Err(LinkError::InvalidConfig(format!(
                "refractive_index_structure must be non-negative, got {cn2:e}"
            )));
        }

        check_sweep("wavelengths", &self.wavelengths)?;
        check_sweep("distances", &self.distances)?;
        Ok(())
    }

    /// Grid dimensions: (wavelength count, distance count).
    pub fn grid_shape(&self) -> (usize, usize) {
        (self.wavelengths.len(), self.distances.len())
    }
}

fn check_sweep(name: &str, values: &[f64]) -> LinkResult<()> {
    if values.is_empty() {
        return Err(LinkError::InvalidConfig(format!("{name} sweep is empty")));
    }
    if let Some(bad) = values.iter().find(|v| !(v.is_finite() && **v > 0.0)) {
        return Err(LinkError::InvalidConfig(format!(
            "{name} sweep contains non-positive value {bad:e}"
        )));
    }
    if values.windows(2).any(|w| w[1] <= w[0]) {
        return Err(LinkError::InvalidConfig(format!(
            "{name} sweep is not strictly increasing"
        )));
    }
    Ok(())
}

/// `count` evenly spaced values from `start` to `end`, both included.
pub fn linspace(start: f64, end: f64, count: usize) -> Vec<f64> {
    match count {
        0 => Vec::new(),
        1 => vec![start],
        _ => {
            let step = (end - start) / (count - 1) as f64;
            (0..count)
                .map(|i| if i == count - 1 { end } else { start + step * i as f64 })
                .collect()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_parameters() {
        let config = Configuration::default();
        assert_eq!(config.speed_of_light, 3e8);
        assert_eq!(config.grid_shape(), (50, 100));
        assert_eq!(config.wavelengths[0], 800e-9);
        assert_eq!(config.wavelengths[49], 1600e-9);
        assert_eq!(config.distances[0], 1e3);
        assert_eq!(config.distances[99], 1000e3);
        assert_eq!(config.aperture_diameter, 0.1);
        assert_eq!(config.receiver_diameter, 0.1);
        assert_eq!(config.power_transmitted, 1.0);
        assert_eq!(config.refractive_index_structure, 1e-14);
        assert_eq!(config.receiver_noise, 1e-12);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_default_is_deterministic() {
        assert_eq!(Configuration::default(), Configuration::default());
    }

    #[test]
    fn test_linspace() {
        let v = linspace(0.0, 1.0, 5);
        assert_eq!(v, vec![0.0, 0.25, 0.5, 0.75, 1.0]);
        assert_eq!(linspace(2.0, 3.0, 1), vec![2.0]);
        assert!(linspace(2.0, 3.0, 0).is_empty());

        let d = linspace(1e3, 1000e3, 100);
        assert!((d[1] - d[0] - 10_090.909_090_909_09).abs() < 1e-6);
    }

    #[test]
    fn test_validate_rejects_broken_invariants() {
        let empty = Configuration {
            wavelengths: vec![],
            ..Configuration::default()
        };
        assert!(matches!(empty.validate(), Err(LinkError::InvalidConfig(_))));

        let unordered = Configuration {
            distances: vec![2e3, 1e3],
            ..Configuration::default()
        };
        assert!(unordered.validate().is_err());

        let zero_distance = Configuration {
            distances: vec![0.0, 1e3],
            ..Configuration::default()
        };
        assert!(zero_distance.validate().is_err());

        let no_noise = Configuration {
            receiver_noise: 0.0,
            ..Configuration::default()
        };
        assert!(no_noise.validate().is_err());

        let negative_cn2 = Configuration {
            refractive_index_structure: -1e-14,
            ..Configuration::default()
        };
        assert!(negative_cn2.validate().is_err());
    }

    #[test]
    fn test_validate_allows_zero_cn2() {
        let calm = Configuration {
            refractive_index_structure: 0.0,
            ..Configuration::default()
        };
        assert!(calm.validate().is_ok());
    }
}
