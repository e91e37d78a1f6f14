use std::f64::consts::{FRAC_2_SQRT_PI, PI};

use rand::Rng;
use rand_distr::{Distribution, LogNormal};

use crate::error::{LinkError, LinkResult};
use crate::params::Configuration;

pub fn watt_to_dbm(power: f64) -> f64 {
    10.0 * f64::log10(power * 1000.0)
}

/// Complementary error function.
///
/// Power series of erf below 2, continued fraction (modified Lentz) above.
/// Both branches hold close to machine precision, and `erfc(0.0)` is
/// exactly 1.
pub fn erfc(x: f64) -> f64 {
    if x.is_nan() {
        return x;
    }
    if x < 0.0 {
        return 2.0 - erfc(-x);
    }
    if x < 2.0 {
        1.0 - erf_series(x)
    } else if x < 27.0 {
        erfc_continued_fraction(x)
    } else {
        // exp(-x²) is below the smallest subnormal
        0.0
    }
}

fn erf_series(x: f64) -> f64 {
    let x2 = x * x;
    let mut term = x;
    let mut sum = x;
    for n in 1..200 {
        term *= -x2 / n as f64;
        let contribution = term / (2 * n + 1) as f64;
        sum += contribution;
        if contribution.abs() <= f64::EPSILON * 1e-2 * sum.abs() {
            break;
        }
    }
    FRAC_2_SQRT_PI * sum
}

fn erfc_continued_fraction(x: f64) -> f64 {
    // erfc(x) = exp(-x²)/√π · 1 / (x + (1/2)/(x + 1/(x + (3/2)/(x + ...))))
    const TINY: f64 = 1e-300;
    let mut f = x;
    let mut c = f;
    let mut d = 0.0;
    for n in 1..500 {
        let a = n as f64 / 2.0;
        d = x + a * d;
        if d == 0.0 {
            d = TINY;
        }
        c = x + a / c;
        if c == 0.0 {
            c = TINY;
        }
        d = 1.0 / d;
        let delta = c * d;
        f *= delta;
        if (delta - 1.0).abs() < f64::EPSILON {
            break;
        }
    }
    (-x * x).exp() * (FRAC_2_SQRT_PI / 2.0) / f
}

pub mod atmosphere {
    use super::*;

    /// Fried coherence-length estimate r0 (m) for a horizontal path.
    pub fn fried_parameter(cn2: f64, distance: f64, wavelength: f64) -> LinkResult<f64> {
        if !(wavelength > 0.0) {
            return Err(LinkError::InvalidDomain { quantity: "wavelength", value: wavelength });
        }
        let wave_number = 2.0 * PI / wavelength;
        let base = 0.423 * wave_number.powi(2) * cn2 * distance;
        if !(base > 0.0) {
            return Err(LinkError::InvalidDomain { quantity: "0.423 k² Cn² d", value: base });
        }
        if base.is_infinite() {
            return Err(LinkError::Overflow { quantity: "0.423 k² Cn² d", value: base });
        }

        let r0 = base.powf(-3.0 / 5.0);
        if !(r0 > 0.0 && r0.is_finite()) {
            return Err(LinkError::Overflow { quantity: "r0", value: r0 });
        }
        Ok(r0)
    }

    /// Approximate atmospheric attenuation factor, `exp(-d / r0)`.
    ///
    /// Deep attenuation underflows to `0.0`, which is a valid result.
    pub fn loss(config: &Configuration, distance: f64, wavelength: f64) -> LinkResult<f64> {
        let r0 = fried_parameter(config.refractive_index_structure, distance, wavelength)?;
        let loss = (-distance / r0).exp();
        if loss.is_nan() {
            return Err(LinkError::Overflow { quantity: "atmospheric loss", value: loss });
        }
        Ok(loss)
    }
}

pub mod turbulence {
    use super::*;

    /// Log-amplitude standard deviation, sqrt(Cn² · d^(7/6)).
    pub fn sigma(cn2: f64, distance: f64) -> f64 {
        (cn2 * distance.powf(7.0 / 6.0)).sqrt()
    }

    /// Draws one log-normal fading multiplier.
    pub fn fading<R: Rng + ?Sized>(
        config: &Configuration,
        distance: f64,
        rng: &mut R,
    ) -> LinkResult<f64> {
        let sigma = sigma(config.refractive_index_structure, distance);
        let distribution = LogNormal::new(0.0, sigma)
            .map_err(|_| LinkError::InvalidDomain { quantity: "turbulence sigma", value: sigma })?;
        let fading = distribution.sample(rng);
        if !fading.is_finite() {
            return Err(LinkError::Overflow { quantity: "turbulence fading", value: fading });
        }
        Ok(fading)
    }

    /// Analytic mean of the fading multiplier, exp(σ²/2).
    pub fn mean(cn2: f64, distance: f64) -> f64 {
        (sigma(cn2, distance).powi(2) / 2.0).exp()
    }
}

/// Aperture coupling over distance, `(Dtx · Drx) / d²`.
pub fn geometric_loss(config: &Configuration, distance: f64) -> LinkResult<f64> {
    if !(distance > 0.0) {
        return Err(LinkError::InvalidDomain { quantity: "distance", value: distance });
    }
    Ok((config.aperture_diameter * config.receiver_diameter) / distance.powi(2))
}

/// Received optical power (W) for one draw of the turbulence.
pub fn received_power<R: Rng + ?Sized>(
    config: &Configuration,
    distance: f64,
    wavelength: f64,
    rng: &mut R,
) -> LinkResult<f64> {
    let geometric = geometric_loss(config, distance)?;
    let attenuation = atmosphere::loss(config, distance, wavelength)?;
    let fading = turbulence::fading(config, distance, rng)?;

    let power = config.power_transmitted * geometric * attenuation * fading;
    if !power.is_finite() {
        return Err(LinkError::Overflow { quantity: "received power", value: power });
    }
    Ok(power)
}

/// BPSK bit error probability, `0.5 · erfc(√SNR)`.
pub fn bit_error_rate(received_power: f64, config: &Configuration) -> LinkResult<f64> {
    let noise = config.receiver_noise;
    if !(noise > 0.0) {
        return Err(LinkError::InvalidDomain { quantity: "receiver noise", value: noise });
    }
    if !(received_power >= 0.0) {
        return Err(LinkError::InvalidDomain {
            quantity: "received power",
            value: received_power,
        });
    }
    let snr = received_power / noise;
    Ok(0.5 * erfc(snr.sqrt()))
}
