//! Geometry of the BER surface plot.
//!
//! Everything here is independent of the window: the renderer in `app` only
//! turns [`Quad`]s and tick positions into egui shapes.

use egui::{pos2, Color32, Pos2};
use serde::{Deserialize, Serialize};

use crate::error::{LinkError, LinkResult};
use crate::params::Configuration;
use crate::sweep::ResultGrid;

pub const TITLE: &str = "BER vs Distance and Wavelength";
pub const DISTANCE_LABEL: &str = "Distance (km)";
pub const WAVELENGTH_LABEL: &str = "Wavelength (nm)";
pub const BER_LABEL: &str = "Bit Error Rate";

const LOG_FLOOR: f64 = 1e-300;

/// Renderer input: both axes in display units plus the finished grid.
#[derive(Clone, Debug, PartialEq)]
pub struct SurfacePlot {
    distances_km: Vec<f64>,
    wavelengths_nm: Vec<f64>,
    grid: ResultGrid,
}

impl SurfacePlot {
    /// The grid must be indexed `[wavelength][distance]`.
    pub fn new(
        distances_km: Vec<f64>,
        wavelengths_nm: Vec<f64>,
        grid: ResultGrid,
    ) -> LinkResult<Self> {
        let expected = (wavelengths_nm.len(), distances_km.len());
        if expected != grid.shape() || expected.0 == 0 || expected.1 == 0 {
            return Err(LinkError::ShapeMismatch { expected, actual: grid.shape() });
        }
        Ok(Self { distances_km, wavelengths_nm, grid })
    }

    /// Converts the sweep axes from metres to km and nm.
    pub fn from_sweep(config: &Configuration, grid: ResultGrid) -> LinkResult<Self> {
        Self::new(
            config.distances.iter().map(|d| d / 1e3).collect(),
            config.wavelengths.iter().map(|w| w * 1e9).collect(),
            grid,
        )
    }

    pub fn distances_km(&self) -> &[f64] {
        &self.distances_km
    }

    pub fn wavelengths_nm(&self) -> &[f64] {
        &self.wavelengths_nm
    }

    pub fn grid(&self) -> &ResultGrid {
        &self.grid
    }

    /// Data bounds of the three axes for the given z scale.
    pub fn bounds(&self, scale: ZScale) -> [Bounds; 3] {
        [
            Bounds::of(self.distances_km.iter().copied()),
            Bounds::of(self.wavelengths_nm.iter().copied()),
            Bounds::of(self.grid.values().iter().map(|&ber| scale.apply(ber))),
        ]
    }
}

/// How BER maps onto the vertical axis.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ZScale {
    #[default]
    Linear,
    Log10,
}

impl ZScale {
    pub fn apply(self, ber: f64) -> f64 {
        match self {
            ZScale::Linear => ber,
            ZScale::Log10 => ber.max(LOG_FLOOR).log10(),
        }
    }

    pub fn tick_label(self, value: f64, step: f64) -> String {
        match self {
            ZScale::Linear => format_tick(value, step),
            ZScale::Log10 => format!("1e{}", format_tick(value, step)),
        }
    }
}

/// Closed value range of one axis, never empty.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Bounds {
    pub min: f64,
    pub max: f64,
}

impl Bounds {
    /// Range of the finite values; a flat range is padded around its value.
    pub fn of(values: impl IntoIterator<Item = f64>) -> Self {
        let (min, max) = values
            .into_iter()
            .filter(|v| v.is_finite())
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| (lo.min(v), hi.max(v)));
        if min > max {
            return Self { min: 0.0, max: 1.0 };
        }
        if max - min <= f64::EPSILON * max.abs().max(1.0) {
            let pad = if min == 0.0 { 0.5 } else { 0.1 * min.abs() };
            return Self { min: min - pad, max: max + pad };
        }
        Self { min, max }
    }

    /// Position of `value` inside the range, 0 at `min` and 1 at `max`.
    pub fn normalize(&self, value: f64) -> f64 {
        (value - self.min) / (self.max - self.min)
    }
}

/// Orthographic camera around the unit cube centred on the origin.
#[derive(Clone, Copy, Debug)]
pub struct Projection {
    azimuth: f64,
    elevation: f64,
    center: Pos2,
    scale: f32,
}

impl Projection {
    pub fn new(azimuth_deg: f32, elevation_deg: f32, center: Pos2, scale: f32) -> Self {
        Self {
            azimuth: f64::from(azimuth_deg).to_radians(),
            elevation: f64::from(elevation_deg).to_radians(),
            center,
            scale,
        }
    }

    /// Screen position and depth of a cube point; larger depth is farther away.
    pub fn project(&self, p: [f64; 3]) -> (Pos2, f64) {
        let (sin_a, cos_a) = self.azimuth.sin_cos();
        let (sin_e, cos_e) = self.elevation.sin_cos();
        let x = p[0] * cos_a - p[1] * sin_a;
        let y = p[0] * sin_a + p[1] * cos_a;
        let up = p[2] * cos_e + y * sin_e;
        let depth = y * cos_e - p[2] * sin_e;
        (
            pos2(
                self.center.x + self.scale * x as f32,
                self.center.y - self.scale * up as f32,
            ),
            depth,
        )
    }

    pub fn point(&self, p: [f64; 3]) -> Pos2 {
        self.project(p).0
    }
}

/// One projected face of the surface.
#[derive(Clone, Copy, Debug)]
pub struct Quad {
    pub corners: [Pos2; 4],
    pub depth: f64,
    /// Mean normalized height of the corners, for the colormap.
    pub level: f64,
}

/// Cube coordinates of every grid vertex, `[wavelength][distance]` order.
pub fn vertices(plot: &SurfacePlot, scale: ZScale) -> Vec<Vec<[f64; 3]>> {
    let [x, y, z] = plot.bounds(scale);
    plot.wavelengths_nm
        .iter()
        .enumerate()
        .map(|(i, &wavelength)| {
            plot.grid
                .row(i)
                .unwrap_or_default()
                .iter()
                .zip(&plot.distances_km)
                .map(|(&ber, &distance)| {
                    [
                        x.normalize(distance) - 0.5,
                        y.normalize(wavelength) - 0.5,
                        z.normalize(scale.apply(ber)).clamp(0.0, 1.0) - 0.5,
                    ]
                })
                .collect()
        })
        .collect()
}

/// Surface faces sorted back to front.
pub fn surface_quads(plot: &SurfacePlot, scale: ZScale, projection: &Projection) -> Vec<Quad> {
    let vertices = vertices(plot, scale);
    let mut quads = Vec::new();
    for pair in vertices.windows(2) {
        let (lower, upper) = (&pair[0], &pair[1]);
        for j in 0..lower.len().saturating_sub(1) {
            let cell = [lower[j], lower[j + 1], upper[j + 1], upper[j]];
            let projected = cell.map(|p| projection.project(p));
            quads.push(Quad {
                corners: projected.map(|(pos, _)| pos),
                depth: projected.iter().map(|(_, depth)| depth).sum::<f64>() / 4.0,
                level: cell.iter().map(|p| p[2] + 0.5).sum::<f64>() / 4.0,
            });
        }
    }
    quads.sort_by(|a, b| b.depth.total_cmp(&a.depth));
    quads
}

/// Round tick values covering `[min, max]`, about `target` of them.
pub fn nice_ticks(min: f64, max: f64, target: usize) -> (Vec<f64>, f64) {
    if !(min.is_finite() && max.is_finite() && max > min) {
        return (vec![min], 1.0);
    }
    let raw = (max - min) / target.max(1) as f64;
    let magnitude = 10f64.powf(raw.log10().floor());
    let step = [1.0, 2.0, 5.0, 10.0]
        .iter()
        .map(|m| m * magnitude)
        .find(|s| *s >= raw)
        .unwrap_or(10.0 * magnitude);
    let first = (min / step).ceil() as i64;
    let last = (max / step).floor() as i64;
    ((first..=last).map(|k| k as f64 * step).collect(), step)
}

pub fn format_tick(value: f64, step: f64) -> String {
    if value.abs() < step * 1e-9 {
        return "0".to_owned();
    }
    if value.abs() < 1e-3 {
        return format!("{value:.1e}");
    }
    let decimals = (-step.log10().floor()).max(0.0) as usize;
    format!("{value:.decimals$}")
}

// Matplotlib's viridis sampled at nine evenly spaced stops.
const VIRIDIS: [(u8, u8, u8); 9] = [
    (68, 1, 84),
    (71, 44, 122),
    (59, 81, 139),
    (44, 113, 142),
    (33, 144, 141),
    (39, 173, 129),
    (92, 200, 99),
    (170, 220, 50),
    (253, 231, 37),
];

pub fn viridis(t: f64) -> Color32 {
    let t = if t.is_finite() { t.clamp(0.0, 1.0) } else { 0.0 };
    let scaled = t * (VIRIDIS.len() - 1) as f64;
    let index = (scaled.floor() as usize).min(VIRIDIS.len() - 2);
    let frac = scaled - index as f64;
    let (r0, g0, b0) = VIRIDIS[index];
    let (r1, g1, b1) = VIRIDIS[index + 1];
    let mix = |a: u8, b: u8| (f64::from(a) + (f64::from(b) - f64::from(a)) * frac).round() as u8;
    Color32::from_rgb(mix(r0, r1), mix(g0, g1), mix(b0, b1))
}
